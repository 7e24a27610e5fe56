use bytes::Bytes;
use log::debug;
use reqwest::Client;
use reqwest::header::USER_AGENT;

use super::SpeechProvider;
use crate::config::{TtsConfig, TtsEngine};
use crate::errors::{AppError, AppResult};

// Без браузерного User-Agent endpoint отвечает 403
const BROWSER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Google Translate TTS: без ключа и лимитов, но простой голос и
/// ограничение длины текста на один запрос.
pub struct GoogleTranslateProvider {
    client: Client,
    endpoint: String,
    language: String,
    max_chars: usize,
}

impl GoogleTranslateProvider {
    pub fn new(client: Client, config: &TtsConfig) -> Self {
        Self {
            client,
            endpoint: config.google_endpoint.clone(),
            language: config.google_language.clone(),
            max_chars: config.fallback_chunk_chars,
        }
    }
}

#[async_trait::async_trait]
impl SpeechProvider for GoogleTranslateProvider {
    fn name(&self) -> &str {
        TtsEngine::GoogleTranslate.as_str()
    }

    fn max_text_length(&self) -> Option<usize> {
        Some(self.max_chars)
    }

    // Голос не выбирается, только язык
    async fn synthesize(&self, text: &str, _voice_id: &str) -> AppResult<Bytes> {
        debug!("Requesting {} characters from Google Translate TTS", text.chars().count());
        let response = self
            .client
            .get(&self.endpoint)
            .header(USER_AGENT, BROWSER_AGENT)
            .query(&[
                ("ie", "UTF-8"),
                ("tl", self.language.as_str()),
                ("q", text),
                ("client", "tw-ob"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ProviderFailure(format!(
                "Google Translate TTS returned status {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?)
    }
}
