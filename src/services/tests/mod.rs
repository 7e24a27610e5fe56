// Сценарные тесты сервисов: генерация, хранение и обработка аудио
// поверх in-memory хранилищ и фейковых провайдеров.

mod support;
mod test_processing;
