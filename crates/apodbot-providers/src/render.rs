//! HTML-to-image render service client.
//!
//! `POST <endpoint>` with `{"html", "css", "width"}`; the response body is the
//! PNG screenshot.

use std::time::Duration;

use apodbot_core::config::RenderConfig;
use apodbot_core::error::{ApodError, Result};
use apodbot_core::traits::Renderer;
use async_trait::async_trait;

/// Stylesheet for the composed card, light theme.
pub const LIGHT_CSS: &str = include_str!("../assets/light.css");
/// Stylesheet for the composed card, dark theme.
pub const DARK_CSS: &str = include_str!("../assets/dark.css");

pub fn stylesheet(dark_mode: bool) -> &'static str {
    if dark_mode { DARK_CSS } else { LIGHT_CSS }
}

pub struct HtmlRenderClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HtmlRenderClient {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl Renderer for HtmlRenderClient {
    async fn render(&self, html: &str, css: &str, width: u32) -> Result<Vec<u8>> {
        if self.endpoint.is_empty() {
            return Err(ApodError::Compose("render endpoint not configured".into()));
        }

        let body = serde_json::json!({ "html": html, "css": css, "width": width });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApodError::Compose(format!("Render request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApodError::Compose(format!("Render error {status}: {text}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApodError::Compose(format!("Render body: {e}")))?;
        if bytes.is_empty() {
            return Err(ApodError::Compose("Render service returned an empty image".into()));
        }
        tracing::debug!("🖼️ Rendered card: {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HtmlRenderClient {
        HtmlRenderClient::new(&RenderConfig {
            endpoint: format!("{}/render", server.uri()),
        })
    }

    #[tokio::test]
    async fn test_empty_endpoint_is_compose_error() {
        let client = HtmlRenderClient::new(&RenderConfig::default());
        let err = client.render("<p/>", LIGHT_CSS, 600).await.unwrap_err();
        assert!(matches!(err, ApodError::Compose(_)));
    }

    #[test]
    fn test_stylesheet_selection() {
        assert!(stylesheet(true).contains("#1e1e1e"));
        assert!(stylesheet(false).contains("#ffffff"));
    }

    #[tokio::test]
    async fn test_render_posts_html_css_width() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .and(body_partial_json(json!({"html": "<p/>", "css": DARK_CSS, "width": 720})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let png = client(&server).render("<p/>", DARK_CSS, 720).await.unwrap();
        assert_eq!(png, b"\x89PNG");
    }

    #[tokio::test]
    async fn test_render_failures_are_compose_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client.render("<p/>", LIGHT_CSS, 600).await.unwrap_err();
        assert!(matches!(err, ApodError::Compose(ref msg) if msg.contains("502")));
        let err = client.render("<p/>", LIGHT_CSS, 600).await.unwrap_err();
        assert!(matches!(err, ApodError::Compose(ref msg) if msg.contains("empty")));
    }
}
