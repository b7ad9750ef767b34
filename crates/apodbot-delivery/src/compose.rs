//! Puzzle-mode card composition: translate, fill the HTML template, render.

use std::sync::Arc;

use apodbot_core::error::Result;
use apodbot_core::traits::{Renderer, Translator};
use apodbot_core::types::PictureOfDay;
use apodbot_providers::stylesheet;

/// Translate `text`, falling back to the original on any translator error.
pub async fn translate_or_original(translator: &dyn Translator, text: &str) -> String {
    match translator.translate(text).await {
        Ok(translated) => translated,
        Err(e) => {
            tracing::warn!("⚠️ {} translation failed, using original text: {e}", translator.name());
            text.to_string()
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The card body for one picture. `explanation` is already translated.
pub fn card_html(picture: &PictureOfDay, explanation: &str) -> String {
    let url = picture.url.as_deref().unwrap_or_default();
    let copyright = picture
        .copyright
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("无");

    format!(
        r#"<div class="container">
    <h1>今日天文一图</h1>
    <h2>{title}</h2>
    <div class="image-container">
        <img src="{url}" alt="APOD">
    </div>
    <p class="explanation">{explanation}</p>
    <div class="meta">
        <p><strong>版权：</strong> {copyright}</p>
        <p><strong>日期：</strong> {date}</p>
    </div>
</div>
"#,
        title = escape_html(&picture.title),
        url = escape_html(url),
        explanation = escape_html(explanation),
        copyright = escape_html(copyright),
        date = escape_html(&picture.date),
    )
}

/// Builds the rendered card for puzzle mode.
pub struct Composer {
    translator: Arc<dyn Translator>,
    renderer: Arc<dyn Renderer>,
    dark_mode: bool,
    width: u32,
}

impl Composer {
    pub fn new(
        translator: Arc<dyn Translator>,
        renderer: Arc<dyn Renderer>,
        dark_mode: bool,
        width: u32,
    ) -> Self {
        Self {
            translator,
            renderer,
            dark_mode,
            width,
        }
    }

    pub async fn compose(&self, picture: &PictureOfDay) -> Result<Vec<u8>> {
        let explanation = translate_or_original(self.translator.as_ref(), &picture.explanation).await;
        let html = card_html(picture, &explanation);
        self.renderer
            .render(&html, stylesheet(self.dark_mode), self.width)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apodbot_core::error::ApodError;
    use apodbot_core::types::MediaType;
    use async_trait::async_trait;

    struct Broken;

    #[async_trait]
    impl Translator for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        async fn translate(&self, _: &str) -> Result<String> {
            Err(ApodError::Translate("quota exceeded".into()))
        }
    }

    fn picture() -> PictureOfDay {
        PictureOfDay {
            title: "Stars & <Dust>".into(),
            explanation: "Dust lanes.".into(),
            date: "2024-03-01".into(),
            media_type: MediaType::Image,
            url: Some("https://apod/d.jpg".into()),
            hdurl: None,
            copyright: None,
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_translator_failure_falls_back() {
        assert_eq!(translate_or_original(&Broken, "hello").await, "hello");
    }

    #[test]
    fn test_card_html_fields() {
        let html = card_html(&picture(), "尘埃带");
        assert!(html.contains("Stars &amp; &lt;Dust&gt;"));
        assert!(html.contains(r#"<img src="https://apod/d.jpg""#));
        assert!(html.contains("尘埃带"));
        assert!(html.contains("<strong>版权：</strong> 无"));
        assert!(html.contains("2024-03-01"));
    }

    #[test]
    fn test_card_html_keeps_copyright() {
        let mut pic = picture();
        pic.copyright = Some("\nJane Doe\n".into());
        assert!(card_html(&pic, "").contains("<strong>版权：</strong> Jane Doe"));
    }
}
