// Voxnova: quota-limited, cached text-to-speech with voice transformations

pub mod config;
pub mod errors;
pub mod http;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AppConfig;
pub use errors::{AppError, AppResult};
