use bytes::Bytes;
use log::info;
use reqwest::Client;

use super::SpeechProvider;
use crate::config::{TtsConfig, TtsEngine};
use crate::errors::{AppError, AppResult};

/// VoiceRSS: лучше качество, но запросы лимитированы и нужен ключ
pub struct VoiceRssProvider {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    language: String,
    format: String,
}

impl VoiceRssProvider {
    pub fn new(client: Client, config: &TtsConfig) -> Self {
        Self {
            client,
            api_key: config.voicerss_api_key.clone().filter(|key| !key.trim().is_empty()),
            endpoint: config.voicerss_endpoint.clone(),
            language: config.voicerss_language.clone(),
            format: config.voicerss_format.clone(),
        }
    }
}

#[async_trait::async_trait]
impl SpeechProvider for VoiceRssProvider {
    fn name(&self) -> &str {
        TtsEngine::VoiceRss.as_str()
    }

    async fn synthesize(&self, text: &str, voice_id: &str) -> AppResult<Bytes> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Configuration("VoiceRSS API key is not set".to_string()))?;

        let mut form: Vec<(&str, &str)> = vec![
            ("key", api_key),
            ("src", text),
            ("hl", self.language.as_str()),
            ("r", "0"),
            ("c", "mp3"),
            ("f", self.format.as_str()),
        ];
        if !voice_id.is_empty() && voice_id != "default" {
            form.push(("v", voice_id));
        }

        info!("Requesting {} characters from VoiceRSS", text.chars().count());
        let response = self.client.post(&self.endpoint).form(&form).send().await?;

        if !response.status().is_success() {
            return Err(AppError::ProviderFailure(format!(
                "VoiceRSS returned status {}",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        // Ошибки VoiceRSS приходят с кодом 200 и текстом "ERROR: ..."
        if body.starts_with(b"ERROR") {
            return Err(AppError::ProviderFailure(
                String::from_utf8_lossy(&body).trim().to_string(),
            ));
        }
        Ok(body)
    }
}
