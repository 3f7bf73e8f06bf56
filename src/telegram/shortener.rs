//! Optional URL shortening for deep links shown in inline results.

use reqwest::Client;
use serde_json::Value;

use crate::core::config;
use crate::core::error::AppResult;

/// JSON fields shortener services put the short link in.
const SHORT_URL_FIELDS: [&str; 4] = ["shortenedUrl", "shortlink", "result_url", "shorturl"];

#[derive(Clone)]
pub struct Shortener {
    client: Client,
    api_template: String,
    api_key: String,
}

impl Shortener {
    /// `api_template` may contain `{link}` (URL-encoded long link) and `{api}` (the key).
    pub fn new(api_template: impl Into<String>, api_key: impl Into<String>) -> AppResult<Self> {
        let client = Client::builder().timeout(config::network::timeout()).build()?;
        Ok(Self {
            client,
            api_template: api_template.into(),
            api_key: api_key.into(),
        })
    }

    /// Builds the shortener from the environment, `None` when disabled or incomplete.
    ///
    /// Without `SHORTENER_API`, a `SHORTENER_DOMAIN` is queried with the common
    /// `https://<domain>/api?api=<key>&url=<link>` layout.
    pub fn from_config() -> Option<Self> {
        if !*config::shortener::ENABLED {
            return None;
        }
        let key = config::shortener::API_KEY.clone().unwrap_or_default();
        let template = match (
            config::shortener::API_URL.as_deref(),
            config::shortener::DOMAIN.as_deref(),
        ) {
            (Some(template), _) => template.to_string(),
            (None, Some(domain)) if !key.is_empty() => format!("https://{}/api?api={{api}}&url={{link}}", domain),
            _ => {
                log::warn!("SHORTENER_ENABLED is set but no SHORTENER_API or SHORTENER_DOMAIN/SHORTENER_API_KEY");
                return None;
            }
        };
        match Self::new(template, key) {
            Ok(shortener) => Some(shortener),
            Err(e) => {
                log::error!("Failed to build shortener client: {}", e);
                None
            }
        }
    }

    fn request_url(&self, link: &str) -> String {
        self.api_template
            .replace("{link}", &urlencoding::encode(link))
            .replace("{api}", &self.api_key)
    }

    async fn try_shorten(&self, link: &str) -> AppResult<Option<String>> {
        let body: Value = self
            .client
            .get(self.request_url(link))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(extract_short_url(&body))
    }

    /// Short form of `link`; any failure yields `link` unchanged.
    pub async fn shorten(&self, link: &str) -> String {
        match self.try_shorten(link).await {
            Ok(Some(short)) => short,
            Ok(None) => {
                log::warn!("Shortener response had no short link for {}", link);
                link.to_string()
            }
            Err(e) => {
                log::warn!("Shortening {} failed: {}", link, e);
                link.to_string()
            }
        }
    }
}

pub fn extract_short_url(body: &Value) -> Option<String> {
    SHORT_URL_FIELDS
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .find(|value| !value.trim().is_empty())
        .map(str::to_string)
}

/// Shortens through `shortener` when one is configured.
pub async fn maybe_shorten(shortener: Option<&Shortener>, link: &str) -> String {
    match shortener {
        Some(shortener) => shortener.shorten(link).await,
        None => link.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LONG: &str = "https://t.me/coursebot?start=course_abc";

    #[test]
    fn test_extract_known_fields() {
        assert_eq!(extract_short_url(&json!({"shortenedUrl": "https://s.io/a"})).as_deref(), Some("https://s.io/a"));
        assert_eq!(extract_short_url(&json!({"status": "ok", "shortlink": "https://s.io/b"})).as_deref(), Some("https://s.io/b"));
        assert_eq!(extract_short_url(&json!({"result_url": ""})), None);
        assert_eq!(extract_short_url(&json!({"error": "bad key"})), None);
    }

    #[test]
    fn test_request_url_substitutes_placeholders() {
        let shortener = Shortener::new("https://sh.example/api?key={api}&u={link}", "K1").unwrap();
        assert_eq!(
            shortener.request_url("https://t.me/x?start=a"),
            "https://sh.example/api?key=K1&u=https%3A%2F%2Ft.me%2Fx%3Fstart%3Da"
        );
    }

    #[tokio::test]
    async fn test_shorten_reads_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("api", "secret"))
            .and(query_param("url", LONG))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"shortenedUrl": "https://sh.rt/xyz"})))
            .mount(&server)
            .await;

        let shortener = Shortener::new(format!("{}/api?api={{api}}&url={{link}}", server.uri()), "secret").unwrap();
        assert_eq!(shortener.shorten(LONG).await, "https://sh.rt/xyz");
    }

    #[tokio::test]
    async fn test_shorten_falls_back_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let shortener = Shortener::new(format!("{}/api?url={{link}}", server.uri()), "").unwrap();
        assert_eq!(shortener.shorten(LONG).await, LONG);
    }

    #[tokio::test]
    async fn test_no_shortener_returns_link() {
        assert_eq!(maybe_shorten(None, LONG).await, LONG);
    }
}
