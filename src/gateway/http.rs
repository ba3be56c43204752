//! HTTP implementation of the tutoring gateway.
//!
//! Thin `reqwest` wrapper over the backend's JSON endpoints. Every call but
//! sign-in/sign-up carries `Authorization: Bearer <token>` read from the
//! client store at call time, so signing in or out takes effect without
//! rebuilding the gateway. Pure status/body handling lives in `parse_reply`
//! for testability.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{
    AuthReply, ChatReply, ChatRequest, CourseList, CourseReply, CourseRequest, Credentials, DoubtList,
    GenerateCourseReply, GenerateReply, HomeworkSet, ProfileReply, Registration, SubmitReply, SubmitRequest,
};
use super::{AuthGateway, CourseGateway, GatewayError, TutorGateway};
use crate::config::ClientConfig;
use crate::store::{Storage, TOKEN_KEY};

const CHAT_PATH: &[&str] = &["api", "chat"];
const SIGNIN_PATH: &[&str] = &["api", "auth", "signin"];
const SIGNUP_PATH: &[&str] = &["api", "auth", "signup"];

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpGateway {
    http: reqwest::Client,
    base: Url,
    storage: Arc<dyn Storage>,
}

impl HttpGateway {
    /// Build a gateway for `config.api_base_url`, reading the token from `storage`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::HttpClientBuild`] if the HTTP client fails to
    /// build or the base URL cannot carry a path.
    pub fn new(config: &ClientConfig, storage: Arc<dyn Storage>) -> Result<Self, GatewayError> {
        let base = Url::parse(&config.api_base_url)
            .map_err(|e| GatewayError::HttpClientBuild(format!("invalid base url: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(GatewayError::HttpClientBuild(format!("invalid base url: {base}")));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| GatewayError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base, storage })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Append `segments` to the base URL, percent-encoding each one so ids
    /// can never introduce extra path segments or a query string.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn bearer_token(&self) -> Result<String, GatewayError> {
        match self.storage.get(TOKEN_KEY) {
            Ok(Some(token)) if !token.trim().is_empty() => Ok(token.trim().to_owned()),
            Ok(_) => Err(GatewayError::MissingToken),
            Err(e) => {
                warn!(error = %e, "gateway: token read failed");
                Err(GatewayError::MissingToken)
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T, GatewayError> {
        let token = self.bearer_token()?;
        let url = self.url(path);
        debug!(%url, "gateway: GET");
        self.execute(self.http.get(url).bearer_auth(token)).await
    }

    async fn post_json<B, T>(&self, path: &[&str], body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.bearer_token()?;
        let url = self.url(path);
        debug!(%url, "gateway: POST");
        self.execute(self.http.post(url).bearer_auth(token).json(body)).await
    }

    async fn post_anonymous<B, T>(&self, path: &[&str], body: &B) -> Result<T, GatewayError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "gateway: POST (anonymous)");
        self.execute(self.http.post(url).json(body)).await
    }

    async fn execute<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        parse_reply(status, &text)
    }
}

#[async_trait::async_trait]
impl TutorGateway for HttpGateway {
    async fn send_chat_message(&self, request: &ChatRequest) -> Result<ChatReply, GatewayError> {
        self.post_json(CHAT_PATH, request).await
    }

    async fn fetch_homework(&self, chapter_id: &str) -> Result<HomeworkSet, GatewayError> {
        self.get_json(&["api", "homework", chapter_id]).await
    }

    async fn generate_homework(&self, chapter_id: &str) -> Result<GenerateReply, GatewayError> {
        self.post_json(&["api", "homework", "generate", chapter_id], &serde_json::json!({}))
            .await
    }

    async fn submit_homework(&self, chapter_id: &str, request: &SubmitRequest) -> Result<SubmitReply, GatewayError> {
        self.post_json(&["api", "homework", chapter_id], request).await
    }

    async fn fetch_doubts(&self, chapter_id: &str) -> Result<DoubtList, GatewayError> {
        self.get_json(&["api", "doubts", chapter_id]).await
    }
}

#[async_trait::async_trait]
impl CourseGateway for HttpGateway {
    async fn list_courses(&self) -> Result<CourseList, GatewayError> {
        self.get_json(&["api", "course", "list"]).await
    }

    async fn generate_course(&self, request: &CourseRequest) -> Result<GenerateCourseReply, GatewayError> {
        self.post_json(&["api", "course", "generate"], request).await
    }

    async fn fetch_course(&self, course_id: &str) -> Result<CourseReply, GatewayError> {
        self.get_json(&["api", "course", course_id]).await
    }

    async fn fetch_profile(&self) -> Result<ProfileReply, GatewayError> {
        self.get_json(&["api", "user", "profile"]).await
    }
}

#[async_trait::async_trait]
impl AuthGateway for HttpGateway {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthReply, GatewayError> {
        self.post_anonymous(SIGNIN_PATH, credentials).await
    }

    async fn sign_up(&self, registration: &Registration) -> Result<AuthReply, GatewayError> {
        self.post_anonymous(SIGNUP_PATH, registration).await
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Turn a status code and raw body into a typed reply.
///
/// Non-2xx becomes [`GatewayError::Server`] carrying the body's `error`
/// field when present. A 2xx body with `"success": false` becomes
/// [`GatewayError::Rejected`].
fn parse_reply<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, GatewayError> {
    let value: Option<Value> = serde_json::from_str(body).ok();

    if !(200..300).contains(&status) {
        let message = value
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| format!("HTTP {status}"));
        return Err(GatewayError::Server { status, message });
    }

    let value = value.ok_or_else(|| GatewayError::Decode("response body is not JSON".to_owned()))?;
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = error_message(&value).unwrap_or_else(|| "request was not successful".to_owned());
        return Err(GatewayError::Rejected(message));
    }

    serde_json::from_value(value).map_err(|e| GatewayError::Decode(e.to_string()))
}

fn error_message(value: &Value) -> Option<String> {
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
