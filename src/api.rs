use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};

const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Authenticated JSON client for the Crisma backend.
///
/// Every non-2xx response becomes [`AppError::Api`] carrying the most
/// specific message the server gave: the `error` field of a JSON body,
/// then the raw body text, then a generic status line.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        token: Option<SecretString>,
        user_agent: &str,
    ) -> AppResult<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|err| AppError::Config(format!("invalid API base URL: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "invalid API base URL: {base_url}"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn from_config(config: &AppConfig, token: Option<SecretString>) -> AppResult<Self> {
        Self::new(&config.api_base_url, token, &config.user_agent)
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self.send(Method::GET, path, |req| req).await?;
        decode_body(path, &response.text().await?)
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> AppResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.send(Method::POST, path, |req| req.json(body)).await?;
        decode_body(path, &response.text().await?)
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> AppResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.send(Method::PUT, path, |req| req.json(body)).await?;
        decode_body(path, &response.text().await?)
    }

    /// POST whose success carries no entity (membership and sacrament links).
    pub async fn post_unit<B>(&self, path: &str, body: &B) -> AppResult<()>
    where
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, path, |req| req.json(body)).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> AppResult<()> {
        self.send(Method::DELETE, path, |req| req).await?;
        Ok(())
    }

    /// Sends `body` verbatim as `text/plain` and decodes a JSON reply.
    pub async fn post_text<T: DeserializeOwned>(&self, path: &str, body: String) -> AppResult<T> {
        let response = self
            .send(Method::POST, path, |req| {
                req.header(CONTENT_TYPE, TEXT_PLAIN_UTF8).body(body)
            })
            .await?;
        decode_body(path, &response.text().await?)
    }

    fn url(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| AppError::Config(format!("invalid API path {path}: {err}")))
    }

    async fn send<F>(&self, method: Method, path: &str, build: F) -> AppResult<Response>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let url = self.url(path)?;
        debug!(target: "api", %method, path, "sending request");

        let mut request = self.http.request(method.clone(), url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = build(request).send().await.map_err(|err| {
            warn!(target: "api", %method, path, error = %err, "request failed to send");
            AppError::from(err)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status.as_u16(), &body);
        warn!(
            target: "api",
            %method,
            path,
            status = status.as_u16(),
            message = %message,
            "request rejected"
        );
        Err(AppError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

pub(crate) fn error_message(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        match &value {
            Value::Object(map) => {
                for key in ["error", "message"] {
                    if let Some(Value::String(text)) = map.get(key) {
                        if !text.trim().is_empty() {
                            return text.trim().to_string();
                        }
                    }
                }
            }
            Value::String(text) if !text.trim().is_empty() => {
                return text.trim().to_string();
            }
            _ => {}
        }
    }

    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    format!("Request failed with status {status}")
}

fn decode_body<T: DeserializeOwned>(path: &str, body: &str) -> AppResult<T> {
    if body.trim().is_empty() {
        warn!(target: "api", path, "successful response with empty body");
        return Err(AppError::EmptyResponse);
    }
    serde_json::from_str(body).map_err(|err| {
        warn!(target: "api", path, error = %err, "unparsable response body");
        AppError::Decode(err.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_structured_error_field() {
        assert_eq!(
            error_message(422, r#"{"error":"Email already registered"}"#),
            "Email already registered"
        );
        assert_eq!(
            error_message(400, r#"{"message":"Bad date"}"#),
            "Bad date"
        );
    }

    #[test]
    fn falls_back_to_raw_text_then_status() {
        assert_eq!(error_message(404, "Not found"), "Not found");
        assert_eq!(error_message(500, "  \n"), "Request failed with status 500");
        assert_eq!(error_message(400, r#"{"detail":1}"#), r#"{"detail":1}"#);
    }

    #[test]
    fn empty_body_is_an_error_when_content_is_required() {
        let result: AppResult<Value> = decode_body("/api/confirmands", "");
        assert!(matches!(result, Err(AppError::EmptyResponse)));

        let result: AppResult<Vec<u32>> = decode_body("/api/confirmands", "<html>");
        assert!(matches!(result, Err(AppError::Decode(_))));
    }

    #[test]
    fn base_url_keeps_its_path_prefix() {
        let client = ApiClient::new("http://localhost:3001/crisma", None, "test").unwrap();
        let url = client.url("/api/confirmands/7").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3001/crisma/api/confirmands/7");
        assert!(!client.has_token());
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(matches!(
            ApiClient::new("not a url", None, "test"),
            Err(AppError::Config(_))
        ));
    }
}
