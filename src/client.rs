//! HTTP client for the chat backend.
//!
//! [`ChatClient`] speaks the backend's four endpoints: form-encoded login,
//! bearer-authenticated session listing and history fetches, and the
//! streaming chat call whose response body feeds the frame decoder. The
//! [`ChatTransport`] trait is the seam the conversation layer talks
//! through, so tests can substitute a scripted transport.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use url::Url;

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability;
use crate::sse;
use crate::token::TokenProvider;
use crate::types::{AuthResponse, ChatRequest, Session, SessionMessage};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A boxed, ordered stream of decoded response frames.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// The network surface the conversation layer depends on.
///
/// [`ChatClient`] is the production implementation; tests use scripted
/// implementations to exercise streaming and failure paths without a
/// server.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends a question and returns the decoded frame stream of the reply.
    async fn stream_chat(&self, question: &str, session_id: u64) -> Result<FrameStream>;

    /// Lists the caller's sessions, most recent first.
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// Fetches the stored history of one session.
    async fn session_messages(&self, session_id: u64) -> Result<Vec<SessionMessage>>;
}

/// Client for a session-based chat backend.
#[derive(Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
    logger: Option<Arc<dyn ClientLogger>>,
    timeout: Duration,
}

impl ChatClient {
    /// Create a new client for the backend at `base_url`.
    pub fn new(base_url: &str, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Self::with_options(base_url, tokens, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        base_url: &str,
        tokens: Arc<dyn TokenProvider>,
        timeout: Option<Duration>,
        logger: Option<Arc<dyn ClientLogger>>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(format!("failed to build HTTP client: {e}"), Some(Box::new(e)))
            })?;

        Ok(Self {
            client,
            base_url,
            tokens,
            logger,
            timeout,
        })
    }

    /// The base URL this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(Error::from)
    }

    /// Headers for bearer-authenticated requests.
    ///
    /// Fails before any network traffic when no token is stored.
    fn bearer_headers(&self) -> Result<HeaderMap> {
        let token = self
            .tokens
            .token()
            .ok_or_else(|| Error::authentication("no bearer token stored"))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| Error::authentication("stored token is not a valid header value"))?,
        );
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type.
    ///
    /// An unauthorized status is additionally forwarded to the token
    /// provider so stored credentials get cleared; the client itself never
    /// retries.
    async fn process_error_response(&self, response: Response) -> Error {
        let status_code = response.status().as_u16();

        #[derive(Deserialize)]
        struct ErrorResponse {
            detail: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let message = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.detail)
            .unwrap_or(error_body);

        match status_code {
            400 => Error::bad_request(message, None),
            401 => {
                observability::CLIENT_AUTH_FAILURES.click();
                self.tokens.on_auth_failure(401);
                Error::authentication(message)
            }
            408 => Error::timeout(message, Some(self.timeout.as_secs_f64())),
            _ => Error::api(status_code, message),
        }
    }

    /// Log in with username and password, storing the issued token.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse> {
        observability::CLIENT_REQUESTS.click();
        let url = self.endpoint("login")?;

        let response = self
            .client
            .post(url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .inspect_err(|_| observability::CLIENT_REQUEST_ERRORS.click())?;

        if !response.status().is_success() {
            observability::CLIENT_REQUEST_ERRORS.click();
            return Err(self.process_error_response(response).await);
        }

        let auth: AuthResponse = response.json().await.map_err(|e| {
            Error::serialization(format!("failed to parse login response: {e}"), Some(Box::new(e)))
        })?;
        self.tokens.store(&auth.access_token, &auth.token_type);
        Ok(auth)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        observability::CLIENT_REQUESTS.click();
        let url = self.endpoint(path)?;
        let headers = self.bearer_headers()?;

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .inspect_err(|_| observability::CLIENT_REQUEST_ERRORS.click())?;

        if !response.status().is_success() {
            observability::CLIENT_REQUEST_ERRORS.click();
            return Err(self.process_error_response(response).await);
        }

        response.json::<T>().await.map_err(|e| {
            Error::serialization(format!("failed to parse response: {e}"), Some(Box::new(e)))
        })
    }
}

#[async_trait]
impl ChatTransport for ChatClient {
    async fn stream_chat(&self, question: &str, session_id: u64) -> Result<FrameStream> {
        observability::CLIENT_REQUESTS.click();
        let url = self.endpoint("chat/sse")?;
        let mut headers = self.bearer_headers()?;
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );

        if let Some(logger) = &self.logger {
            logger.log_request(question);
        }

        let body = ChatRequest {
            question: question.to_string(),
            session_id,
        };

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .inspect_err(|_| observability::CLIENT_REQUEST_ERRORS.click())?;

        if !response.status().is_success() {
            observability::CLIENT_REQUEST_ERRORS.click();
            return Err(self.process_error_response(response).await);
        }

        let bytes = response.bytes_stream().map(|chunk| {
            if let Ok(chunk) = &chunk {
                observability::STREAM_BYTES.count(chunk.len() as u64);
            }
            chunk
        });

        let logger = self.logger.clone();
        let frames = sse::frame_stream(Box::pin(bytes)).map(move |frame| {
            match &frame {
                Ok(frame) => {
                    observability::STREAM_FRAMES.click();
                    if let Some(logger) = &logger {
                        logger.log_frame(frame);
                    }
                }
                Err(_) => observability::STREAM_ERRORS.click(),
            }
            frame
        });

        Ok(Box::pin(frames))
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.get_json("session").await
    }

    async fn session_messages(&self, session_id: u64) -> Result<Vec<SessionMessage>> {
        self.get_json(&format!("session/{session_id}")).await
    }
}
