use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Map, Value, json};

use crate::config::Credentials;
use crate::error::LoaderError;
use crate::record::{GraphRecord, Target};

const PAGE_SIZE: usize = 1000;
const SLOW_REQUEST: Duration = Duration::from_millis(2000);

/// Request/response interface of the remote graph store.
pub trait GraphStore: Send + Sync {
    /// Inserts a record. A uniqueness violation is reported as [`LoaderError::Conflict`].
    fn create(&self, target: Target, content: &Map<String, Value>) -> Result<GraphRecord, LoaderError>;

    /// All records of `target` matching `filters`, with linked records expanded one level.
    fn query(&self, target: Target, filters: &Value) -> Result<Vec<GraphRecord>, LoaderError>;

    fn update(
        &self,
        target: Target,
        rid: &str,
        content: &Map<String, Value>,
    ) -> Result<GraphRecord, LoaderError>;
}

impl<T: GraphStore + ?Sized> GraphStore for &T {
    fn create(&self, target: Target, content: &Map<String, Value>) -> Result<GraphRecord, LoaderError> {
        (**self).create(target, content)
    }

    fn query(&self, target: Target, filters: &Value) -> Result<Vec<GraphRecord>, LoaderError> {
        (**self).query(target, filters)
    }

    fn update(
        &self,
        target: Target,
        rid: &str,
        content: &Map<String, Value>,
    ) -> Result<GraphRecord, LoaderError> {
        (**self).update(target, rid, content)
    }
}

pub struct GraphKbHttpClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    token: Mutex<Option<String>>,
}

impl GraphKbHttpClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, LoaderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kb-loader/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| LoaderError::GraphKbHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| LoaderError::GraphKbHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Exchanges the configured credentials for an API token.
    pub fn login(&self) -> Result<String, LoaderError> {
        let url = format!("{}/token", self.base_url);
        let body = json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
        });
        let response = self.send_with_retries(|| self.client.post(&url).json(&body))?;
        let response = handle_status(response, None)?;
        let payload: Value = response
            .json()
            .map_err(|err| LoaderError::Authentication(err.to_string()))?;
        let token = payload
            .get("kbToken")
            .and_then(Value::as_str)
            .ok_or_else(|| LoaderError::Authentication("response did not include a token".to_string()))?
            .to_string();
        tracing::info!(user = %self.credentials.username, "logged in to GraphKB");
        self.store_token(Some(token.clone()));
        Ok(token)
    }

    fn store_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = token;
        }
    }

    fn current_token(&self) -> Result<String, LoaderError> {
        let cached = self.token.lock().ok().and_then(|guard| guard.clone());
        match cached {
            Some(token) => Ok(token),
            None => self.login(),
        }
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        body: &Value,
        target: Option<Target>,
    ) -> Result<Value, LoaderError> {
        let url = format!("{}{path}", self.base_url);
        let mut relogged = false;
        loop {
            let token = self.current_token()?;
            let started = Instant::now();
            let response = self.send_with_retries(|| {
                self.client
                    .request(method.clone(), &url)
                    .header(AUTHORIZATION, token.as_str())
                    .json(body)
            })?;
            let elapsed = started.elapsed();
            if elapsed > SLOW_REQUEST {
                tracing::warn!(%method, path, elapsed_ms = elapsed.as_millis() as u64, "slow GraphKB request");
            }

            if response.status().as_u16() == 401 && !relogged {
                relogged = true;
                self.store_token(None);
                continue;
            }
            let response = handle_status(response, target)?;
            let payload: Value = response
                .json()
                .map_err(|err| LoaderError::GraphKbHttp(err.to_string()))?;
            return Ok(payload.get("result").cloned().unwrap_or(Value::Null));
        }
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, LoaderError>
    where
        F: FnMut() -> RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        tracing::warn!(status, attempt, "retrying GraphKB request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        tracing::warn!(error = %err, attempt, "retrying GraphKB request");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(LoaderError::GraphKbHttp(err.to_string()));
                }
            }
        }
    }
}

impl GraphStore for GraphKbHttpClient {
    fn create(&self, target: Target, content: &Map<String, Value>) -> Result<GraphRecord, LoaderError> {
        let body = Value::Object(content.clone());
        let result = self.request(Method::POST, target.route(), &body, Some(target))?;
        GraphRecord::from_value(result)
    }

    fn query(&self, target: Target, filters: &Value) -> Result<Vec<GraphRecord>, LoaderError> {
        let mut records = Vec::new();
        let mut skip = 0usize;
        loop {
            let body = json!({
                "target": target.as_str(),
                "filters": filters,
                "neighbors": 1,
                "limit": PAGE_SIZE,
                "skip": skip,
            });
            let result = self.request(Method::POST, "/query", &body, Some(target))?;
            let page = match result {
                Value::Array(items) => items,
                Value::Null => Vec::new(),
                other => {
                    return Err(LoaderError::GraphKbHttp(format!(
                        "expected a list of {target} records, found {other}"
                    )));
                }
            };
            let count = page.len();
            for item in page {
                records.push(GraphRecord::from_value(item)?);
            }
            if count < PAGE_SIZE {
                break;
            }
            skip += count;
        }
        Ok(records)
    }

    fn update(
        &self,
        target: Target,
        rid: &str,
        content: &Map<String, Value>,
    ) -> Result<GraphRecord, LoaderError> {
        let path = format!("{}/{}", target.route(), rid.trim_start_matches('#'));
        let body = Value::Object(content.clone());
        let result = self.request(Method::PATCH, &path, &body, Some(target))?;
        GraphRecord::from_value(result)
    }
}

fn handle_status(response: Response, target: Option<Target>) -> Result<Response, LoaderError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "GraphKB request failed".to_string());
    match status {
        409 => Err(LoaderError::Conflict {
            target: target.map(|t| t.to_string()).unwrap_or_default(),
            message,
        }),
        401 | 403 => Err(LoaderError::Authentication(message)),
        _ => Err(LoaderError::GraphKbStatus { status, message }),
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
