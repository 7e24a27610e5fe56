pub mod keys;
pub mod logger;
pub mod text;
pub mod tools;
