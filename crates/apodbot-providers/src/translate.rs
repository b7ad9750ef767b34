//! Translation backends for the picture explanation.
//!
//! DeepL is preferred when configured, then Baidu. When neither is usable the
//! [`IdentityTranslator`] passes text through unchanged.

use std::sync::Arc;

use apodbot_core::config::{BaiduConfig, DeepLConfig, TranslateConfig};
use apodbot_core::error::{ApodError, Result};
use apodbot_core::traits::Translator;
use async_trait::async_trait;
use md5::{Digest, Md5};
use rand::Rng;
use serde::Deserialize;

/// DeepL REST API (`/v2/translate`).
pub struct DeepLTranslator {
    api_key: String,
    endpoint: String,
    target_lang: String,
    client: reqwest::Client,
}

impl DeepLTranslator {
    pub fn new(config: &DeepLConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
            target_lang: config.target_lang.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
}

#[async_trait]
impl Translator for DeepLTranslator {
    fn name(&self) -> &str {
        "deepl"
    }

    async fn translate(&self, text: &str) -> Result<String> {
        let body = serde_json::json!({
            "text": [text],
            "target_lang": self.target_lang,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ApodError::Translate(format!("DeepL request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ApodError::Translate(format!("DeepL error {status}: {text}")));
        }

        let parsed: DeepLResponse = response
            .json()
            .await
            .map_err(|e| ApodError::Translate(format!("Invalid DeepL response: {e}")))?;

        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| ApodError::Translate("DeepL returned no translations".into()))
    }
}

/// Baidu general translation API.
pub struct BaiduTranslator {
    appid: String,
    api_key: String,
    endpoint: String,
    to_lang: String,
    client: reqwest::Client,
}

impl BaiduTranslator {
    pub fn new(config: &BaiduConfig) -> Self {
        Self {
            appid: config.appid.clone(),
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
            to_lang: config.to_lang.clone(),
            client: reqwest::Client::new(),
        }
    }
}

/// `md5(appid + q + salt + key)` as lowercase hex.
pub fn baidu_sign(appid: &str, query: &str, salt: &str, key: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(appid.as_bytes());
    hasher.update(query.as_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Deserialize)]
struct BaiduResponse {
    #[serde(default)]
    trans_result: Vec<BaiduLine>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BaiduLine {
    dst: String,
}

impl BaiduResponse {
    fn into_text(self) -> Result<String> {
        if let Some(msg) = self.error_msg {
            let code = self.error_code.unwrap_or_default();
            return Err(ApodError::Translate(format!("Baidu error {code}: {msg}")));
        }
        if self.trans_result.is_empty() {
            return Err(ApodError::Translate("Baidu returned no lines".into()));
        }
        Ok(self
            .trans_result
            .into_iter()
            .map(|line| line.dst)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[async_trait]
impl Translator for BaiduTranslator {
    fn name(&self) -> &str {
        "baidu"
    }

    async fn translate(&self, text: &str) -> Result<String> {
        let salt = rand::thread_rng().gen_range(32768..65536).to_string();
        let sign = baidu_sign(&self.appid, text, &salt, &self.api_key);
        let form = [
            ("appid", self.appid.as_str()),
            ("q", text),
            ("from", "auto"),
            ("to", self.to_lang.as_str()),
            ("salt", salt.as_str()),
            ("sign", sign.as_str()),
        ];

        let response = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| ApodError::Translate(format!("Baidu request failed: {e}")))?;

        let parsed: BaiduResponse = response
            .json()
            .await
            .map_err(|e| ApodError::Translate(format!("Invalid Baidu response: {e}")))?;
        parsed.into_text()
    }
}

/// Pass-through used when no backend is configured.
pub struct IdentityTranslator;

#[async_trait]
impl Translator for IdentityTranslator {
    fn name(&self) -> &str {
        "identity"
    }

    async fn translate(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Pick the translation backend from config.
pub fn build_translator(config: &TranslateConfig) -> Arc<dyn Translator> {
    if config.deepl.enabled {
        if !config.deepl.api_key.is_empty() {
            tracing::info!("🌐 Translator: DeepL ({})", config.deepl.target_lang);
            return Arc::new(DeepLTranslator::new(&config.deepl));
        }
        tracing::warn!("DeepL enabled but api_key is empty, skipping");
    }
    if config.baidu.enabled {
        if !config.baidu.appid.is_empty() && !config.baidu.api_key.is_empty() {
            tracing::info!("🌐 Translator: Baidu ({})", config.baidu.to_lang);
            return Arc::new(BaiduTranslator::new(&config.baidu));
        }
        tracing::warn!("Baidu enabled but appid/api_key missing, skipping");
    }
    tracing::info!("🌐 Translator: none, explanations stay untranslated");
    Arc::new(IdentityTranslator)
}
