//! NASA APOD client.
//!
//! `GET <endpoint>?api_key=<key>` returns today's entry as an object,
//! `&date=YYYY-MM-DD` returns an object (older deployments wrap it in a list),
//! and `&count=1` returns a one-element list. [`normalize`] flattens all three.

use std::time::Duration;

use apodbot_core::config::NasaConfig;
use apodbot_core::error::{ApodError, Result};
use apodbot_core::traits::PictureSource;
use apodbot_core::types::PictureOfDay;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

/// HTTP client for the APOD API.
pub struct ApodClient {
    api_key: String,
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl ApodClient {
    pub fn new(config: &NasaConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, extra: &[(&str, String)]) -> Result<Value> {
        let mut query = vec![("api_key", self.api_key.clone())];
        query.extend(extra.iter().map(|(k, v)| (*k, v.clone())));

        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ApodError::Fetch(format!("APOD request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApodError::Fetch(format!("APOD API error {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| ApodError::Fetch(format!("Invalid APOD response: {e}")))
    }
}

/// Accept an object or a list of objects; an empty list means "no entry".
pub fn normalize(value: Value) -> Result<Option<PictureOfDay>> {
    let entry = match value {
        Value::Array(items) => match items.into_iter().next() {
            Some(first) => first,
            None => return Ok(None),
        },
        obj @ Value::Object(_) => obj,
        other => {
            return Err(ApodError::Fetch(format!(
                "Unexpected APOD payload: {other}"
            )));
        }
    };
    serde_json::from_value(entry)
        .map(Some)
        .map_err(|e| ApodError::Fetch(format!("Malformed APOD entry: {e}")))
}

#[async_trait]
impl PictureSource for ApodClient {
    async fn fetch_today(&self) -> Result<PictureOfDay> {
        let value = self.get(&[]).await?;
        let picture = normalize(value)?
            .ok_or_else(|| ApodError::Fetch("APOD returned no entry for today".into()))?;
        tracing::info!("🔭 Fetched APOD {}: {}", picture.date, picture.title);
        Ok(picture)
    }

    async fn fetch_by_date(&self, date: NaiveDate) -> Result<Option<PictureOfDay>> {
        let value = self.get(&[("date", date.format("%Y-%m-%d").to_string())]).await?;
        normalize(value)
    }

    async fn fetch_random(&self) -> Result<Option<PictureOfDay>> {
        let value = self.get(&[("count", "1".into())]).await?;
        normalize(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry() -> Value {
        json!({
            "title": "Orion",
            "explanation": "A nebula.",
            "date": "2023-10-01",
            "media_type": "image",
            "url": "https://apod.nasa.gov/orion.jpg"
        })
    }

    #[test]
    fn test_normalize_object() {
        let pic = normalize(entry()).unwrap().unwrap();
        assert_eq!(pic.title, "Orion");
    }

    #[test]
    fn test_normalize_singleton_list() {
        let pic = normalize(json!([entry()])).unwrap().unwrap();
        assert_eq!(pic.date, "2023-10-01");
    }

    #[test]
    fn test_normalize_empty_list() {
        assert!(normalize(json!([])).unwrap().is_none());
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(matches!(normalize(json!("oops")), Err(ApodError::Fetch(_))));
        assert!(matches!(
            normalize(json!({"code": 400, "msg": "bad date"})),
            Err(ApodError::Fetch(_))
        ));
    }

    fn client(server: &MockServer) -> ApodClient {
        ApodClient::new(&NasaConfig {
            api_key: "DEMO_KEY".into(),
            endpoint: format!("{}/planetary/apod", server.uri()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_server_error_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/planetary/apod"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).fetch_today().await.unwrap_err();
        assert!(matches!(err, ApodError::Fetch(ref msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_fetch_by_date_sends_key_and_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/planetary/apod"))
            .and(query_param("api_key", "DEMO_KEY"))
            .and(query_param("date", "2023-10-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(entry()))
            .expect(1)
            .mount(&server)
            .await;

        let date = NaiveDate::from_ymd_opt(2023, 10, 1).unwrap();
        let pic = client(&server).fetch_by_date(date).await.unwrap().unwrap();
        assert_eq!(pic.title, "Orion");
        assert_eq!(pic.image_url(), Some("https://apod.nasa.gov/orion.jpg"));
    }

    #[tokio::test]
    async fn test_fetch_random_asks_for_one() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/planetary/apod"))
            .and(query_param("api_key", "DEMO_KEY"))
            .and(query_param("count", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([entry()])))
            .expect(1)
            .mount(&server)
            .await;

        let pic = client(&server).fetch_random().await.unwrap().unwrap();
        assert_eq!(pic.date, "2023-10-01");
    }

    #[tokio::test]
    async fn test_today_without_entry_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/planetary/apod"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = client(&server).fetch_today().await.unwrap_err();
        assert!(matches!(err, ApodError::Fetch(_)));
    }
}
