//! Asynchronous request execution with cooperative cancellation.
//!
//! Every call to [`RequestExecutor::execute`] spawns one task that performs a
//! single HTTP request and reports back over a oneshot channel, so a
//! [`RequestHandle`] completes exactly once: with the response, a transport
//! failure, or [`Completion::Cancelled`].

use reqwest::{Client, Method};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Connect timeout applied to every request
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport-level failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request did not complete within its timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection refused, DNS or TLS failure
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Any other failure while sending or reading the response
    #[error("Request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Terminal state of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A response arrived; `status` may still be an HTTP error
    Success { status: u16, body: Vec<u8> },
    /// The transport failed
    Failure(TransportError),
    /// The caller aborted the request before it completed
    Cancelled,
}

impl Completion {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Completion::Cancelled)
    }
}

/// Description of one request to issue
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    /// GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// POST request with a JSON body
    pub fn post_json(url: impl Into<String>, body: &serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(body.to_string().into_bytes()),
            timeout: None,
        }
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the whole-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Value of a header, matched case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Issues requests on a shared reqwest client
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
}

impl RequestExecutor {
    /// Create an executor with the crate's user agent
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self { client })
    }

    /// Start a request that can only be cancelled through its handle
    pub fn execute(&self, spec: RequestSpec) -> RequestHandle {
        self.execute_with(spec, &CancellationToken::new())
    }

    /// Start a request that is also cancelled when `parent` is
    pub fn execute_with(&self, spec: RequestSpec, parent: &CancellationToken) -> RequestHandle {
        let token = parent.child_token();
        let (tx, rx) = oneshot::channel();

        let target = spec.url.clone();
        let method = spec.method.clone();

        tracing::debug!(method = %method, url = %target, "Issuing request");

        let client = self.client.clone();
        let task_token = token.clone();
        tokio::spawn(async move {
            let completion = tokio::select! {
                biased;
                _ = task_token.cancelled() => Completion::Cancelled,
                completion = perform(client, spec) => completion,
            };
            // The receiver is gone only if the handle was dropped
            let _ = tx.send(completion);
        });

        RequestHandle {
            target,
            method,
            token: token.clone(),
            receiver: rx,
            _guard: token.drop_guard(),
        }
    }
}

async fn perform(client: Client, spec: RequestSpec) -> Completion {
    let mut request = client.request(spec.method, &spec.url);
    for (name, value) in &spec.headers {
        request = request.header(name.as_str(), value.as_str());
    }
    if let Some(body) = spec.body {
        request = request.body(body);
    }
    if let Some(timeout) = spec.timeout {
        request = request.timeout(timeout);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return Completion::Failure(e.into()),
    };

    let status = response.status().as_u16();
    match response.bytes().await {
        Ok(body) => Completion::Success {
            status,
            body: body.to_vec(),
        },
        Err(e) => Completion::Failure(e.into()),
    }
}

/// One outstanding request
///
/// Dropping the handle aborts the request.
#[derive(Debug)]
pub struct RequestHandle {
    target: String,
    method: Method,
    token: CancellationToken,
    receiver: oneshot::Receiver<Completion>,
    _guard: DropGuard,
}

impl RequestHandle {
    /// URL the request was sent to
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Abort the request; its completion becomes [`Completion::Cancelled`]
    /// unless it had already finished.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the single completion event
    pub async fn completion(self) -> Completion {
        match self.receiver.await {
            Ok(completion) => completion,
            Err(_) => Completion::Failure(TransportError::Request(
                "request task ended without a result".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Server that accepts connections and never answers
    async fn hanging_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_success_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/echo")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(serde_json::json!({"a": 1})))
            .with_status(201)
            .with_body("created")
            .create_async()
            .await;

        let executor = RequestExecutor::new().unwrap();
        let spec = RequestSpec::post_json(
            format!("{}/echo", server.url()),
            &serde_json::json!({"a": 1}),
        );
        let handle = executor.execute(spec);
        assert_eq!(handle.method(), &Method::POST);

        match handle.completion().await {
            Completion::Success { status, body } => {
                assert_eq!(status, 201);
                assert_eq!(body, b"created");
            }
            other => panic!("unexpected completion: {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_still_a_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let executor = RequestExecutor::new().unwrap();
        let completion = executor
            .execute(RequestSpec::get(format!("{}/missing", server.url())))
            .completion()
            .await;
        assert!(matches!(completion, Completion::Success { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let url = hanging_server().await;
        let executor = RequestExecutor::new().unwrap();

        let completion = executor
            .execute(RequestSpec::get(url).timeout(Duration::from_millis(200)))
            .completion()
            .await;
        assert!(matches!(
            completion,
            Completion::Failure(TransportError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let executor = RequestExecutor::new().unwrap();
        let completion = executor
            .execute(RequestSpec::get(format!("http://{}/", addr)))
            .completion()
            .await;
        assert!(matches!(completion, Completion::Failure(_)));
    }

    #[tokio::test]
    async fn test_cancel_in_flight() {
        let url = hanging_server().await;
        let executor = RequestExecutor::new().unwrap();

        let handle = executor.execute(RequestSpec::get(url));
        assert!(handle.target().starts_with("http://127.0.0.1"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
        assert_eq!(handle.completion().await, Completion::Cancelled);
    }

    #[tokio::test]
    async fn test_parent_token_cancels() {
        let url = hanging_server().await;
        let executor = RequestExecutor::new().unwrap();
        let parent = CancellationToken::new();

        let handle = executor.execute_with(RequestSpec::get(url), &parent);
        let canceller = parent.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let completion = tokio::time::timeout(Duration::from_secs(5), handle.completion())
            .await
            .unwrap();
        assert!(completion.is_cancelled());
    }

    #[tokio::test]
    async fn test_already_cancelled_parent_never_sends() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/").expect(0).create_async().await;

        let parent = CancellationToken::new();
        parent.cancel();

        let executor = RequestExecutor::new().unwrap();
        let completion = executor
            .execute_with(RequestSpec::get(server.url()), &parent)
            .completion()
            .await;
        assert_eq!(completion, Completion::Cancelled);
        mock.assert_async().await;
    }

    #[test]
    fn test_header_lookup() {
        let spec = RequestSpec::get("http://x").header("X-API-Key", "k");
        assert_eq!(spec.header_value("x-api-key"), Some("k"));
        assert_eq!(spec.header_value("authorization"), None);
    }
}
