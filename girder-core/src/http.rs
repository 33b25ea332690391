// HTTP request and response handles consumed by the binding layer

use crate::{Error, MediaType, Result};
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// A chunked request body as delivered by the transport.
pub type BodyStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Raw request payload. Can be read exactly once.
pub enum Body {
    Empty,
    Full(Bytes),
    Stream(BodyStream),
}

impl Body {
    /// Wrap a stream of chunks.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        Body::Stream(Box::pin(stream))
    }

    /// Collect the whole body. A `limit` of 0 disables the size check.
    async fn collect(self, limit: usize) -> Result<Bytes> {
        let too_large = |len: usize| {
            Error::PayloadTooLarge(format!(
                "request body of at least {} bytes exceeds the limit of {} bytes",
                len, limit
            ))
        };

        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Full(bytes) => {
                if limit > 0 && bytes.len() > limit {
                    return Err(too_large(bytes.len()));
                }
                Ok(bytes)
            }
            Body::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk?;
                    if limit > 0 && buf.len() + chunk.len() > limit {
                        return Err(too_large(buf.len() + chunk.len()));
                    }
                    buf.extend_from_slice(&chunk);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Body::Empty"),
            Body::Full(bytes) => write!(f, "Body::Full({} bytes)", bytes.len()),
            Body::Stream(_) => f.write_str("Body::Stream(..)"),
        }
    }
}

/// HTTP request handle shared by every binder working on one request.
///
/// Header names are stored lowercase. The body sits behind a lock so that
/// whichever formatter ends up reading it can take it out of a shared
/// (`Arc`) handle; the lock is never held across an await.
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub path_params: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    body: Mutex<Option<Body>>,
    aborted: CancellationToken,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HashMap::new(),
            path_params: HashMap::new(),
            query_params: HashMap::new(),
            body: Mutex::new(Some(Body::Empty)),
            aborted: CancellationToken::new(),
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        self.with_header("content-type", content_type)
    }

    pub fn with_body(self, body: impl Into<Bytes>) -> Self {
        *self.body.lock() = Some(Body::Full(body.into()));
        self
    }

    pub fn with_streaming_body(self, body: Body) -> Self {
        *self.body.lock() = Some(body);
        self
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Parse a raw query string (`a=1&b=two`) into the query parameters.
    pub fn with_query(mut self, raw: &str) -> Result<Self> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw.trim_start_matches('?'))
            .map_err(|e| Error::Deserialization(e.to_string()))?;
        self.query_params.extend(pairs);
        Ok(self)
    }

    /// Tie the request to an abort signal owned by the transport.
    pub fn with_abort_token(mut self, token: CancellationToken) -> Self {
        self.aborted = token;
        self
    }

    /// Get a header by (case-insensitive) name
    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    /// Get a path parameter by name
    pub fn param(&self, name: &str) -> Option<&String> {
        self.path_params.get(name)
    }

    /// Get a query parameter by name
    pub fn query(&self, name: &str) -> Option<&String> {
        self.query_params.get(name)
    }

    /// The declared `Content-Type`, if present and well-formed.
    pub fn content_type(&self) -> Option<MediaType> {
        self.header("content-type").and_then(|v| MediaType::parse(v))
    }

    /// Token that is cancelled when the client aborts the request.
    pub fn abort_token(&self) -> &CancellationToken {
        &self.aborted
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_cancelled()
    }

    /// Read the whole body, racing it against request abort.
    ///
    /// The body is handed out once; later calls fail with
    /// [`Error::BodyConsumed`]. A `limit` of 0 disables the size check.
    pub async fn read_body(&self, limit: usize) -> Result<Bytes> {
        let body = self.body.lock().take().ok_or(Error::BodyConsumed)?;

        if self.aborted.is_cancelled() {
            return Err(Error::RequestAborted);
        }

        tokio::select! {
            biased;
            _ = self.aborted.cancelled() => Err(Error::RequestAborted),
            result = body.collect(limit) => result,
        }
    }
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("path_params", &self.path_params)
            .field("query_params", &self.query_params)
            .field("aborted", &self.aborted.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// HTTP response produced by actions and filters
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    pub fn bad_request() -> Self {
        Self::new(400)
    }

    pub fn unsupported_media_type() -> Self {
        Self::new(415)
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self> {
        self.body = serde_json::to_vec(value).map_err(|e| Error::Internal(e.to_string()))?;
        self.headers
            .insert("content-type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn with_header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn test_read_full_body_once() {
        let request = HttpRequest::new("POST", "/people").with_body(&b"{}"[..]);

        let body = request.read_body(0).await.unwrap();
        assert_eq!(&body[..], b"{}");

        assert!(matches!(
            request.read_body(0).await,
            Err(Error::BodyConsumed)
        ));
    }

    #[tokio::test]
    async fn test_read_streaming_body() {
        let chunks = vec![
            Ok(Bytes::from_static(b"{\"name\":")),
            Ok(Bytes::from_static(b"\"Ada\"}")),
        ];
        let request = HttpRequest::new("POST", "/people")
            .with_streaming_body(Body::from_stream(stream::iter(chunks)));

        let body = request.read_body(1024).await.unwrap();
        assert_eq!(&body[..], b"{\"name\":\"Ada\"}");
    }

    #[tokio::test]
    async fn test_body_limit() {
        let request = HttpRequest::new("POST", "/upload").with_body(vec![0u8; 16]);
        let err = request.read_body(8).await.unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge(_)));
    }

    #[tokio::test]
    async fn test_streaming_io_error_propagates() {
        let chunks = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let request = HttpRequest::new("POST", "/")
            .with_streaming_body(Body::from_stream(stream::iter(chunks)));

        assert!(matches!(request.read_body(0).await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_abort_before_read() {
        let token = CancellationToken::new();
        let request = HttpRequest::new("POST", "/")
            .with_body(&b"data"[..])
            .with_abort_token(token.clone());

        token.cancel();
        assert!(request.is_aborted());
        assert!(matches!(
            request.read_body(0).await,
            Err(Error::RequestAborted)
        ));
    }

    #[tokio::test]
    async fn test_abort_while_pending() {
        let token = CancellationToken::new();
        let request = HttpRequest::new("POST", "/")
            .with_streaming_body(Body::from_stream(stream::pending()))
            .with_abort_token(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            token.cancel();
        });

        assert!(matches!(
            request.read_body(0).await,
            Err(Error::RequestAborted)
        ));
        canceller.await.unwrap();
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let request = HttpRequest::new("POST", "/").with_content_type("Application/Json");
        assert_eq!(request.header("Content-Type").unwrap(), "Application/Json");
        assert_eq!(request.content_type(), Some(MediaType::json()));
    }

    #[test]
    fn test_query_parsing() {
        let request = HttpRequest::new("GET", "/search")
            .with_query("?q=rust+lang&page=2")
            .unwrap();
        assert_eq!(request.query("q").unwrap(), "rust lang");
        assert_eq!(request.query("page").unwrap(), "2");
    }

    #[test]
    fn test_response_json() {
        let response = HttpResponse::ok()
            .with_json(&serde_json::json!({"ok": true}))
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.headers.get("content-type").unwrap(), "application/json");
    }
}
