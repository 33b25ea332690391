//! Input formatters: pluggable readers that turn a request body into a
//! typed model.
//!
//! A formatter advertises the media types it reads and which target types
//! it can materialize. [`InputFormatter::read`] is the single suspension
//! point of a body bind; it reads the whole body through the request's
//! cancellable read and either produces a [`BoundModel`] or fails.
//!
//! Built-in formatters:
//!
//! | Formatter | Media types | Targets |
//! |-----------|-------------|---------|
//! | [`JsonInputFormatter`] | `application/json`, `text/json`, `application/*+json` | any deserializable type |
//! | [`FormInputFormatter`] | `application/x-www-form-urlencoded` | any deserializable type |
//! | [`PlainTextInputFormatter`] | `text/plain` | `String` |

use crate::FormatterSelectionContext;
use async_trait::async_trait;
use bytes::Bytes;
use girder_core::{BoundModel, Error, HttpRequest, MediaType, ModelType, Result};

/// Everything a formatter may look at while reading.
#[derive(Debug, Clone, Copy)]
pub struct InputFormatterContext<'a> {
    pub request: &'a HttpRequest,
    pub model_type: &'a ModelType,
    pub model_name: &'a str,
    pub content_type: Option<&'a MediaType>,
    /// Body size limit in bytes; 0 means unlimited.
    pub max_body_size: usize,
}

impl InputFormatterContext<'_> {
    /// Read the raw body. Fails fast if the request is aborted mid-read.
    pub async fn read_body(&self) -> Result<Bytes> {
        self.request.read_body(self.max_body_size).await
    }

    /// Reject charsets other than UTF-8 (and its ASCII subset).
    pub fn ensure_utf8(&self) -> Result<()> {
        match self.content_type.and_then(MediaType::charset) {
            None => Ok(()),
            Some(charset)
                if ["utf-8", "utf8", "us-ascii"]
                    .iter()
                    .any(|ok| charset.eq_ignore_ascii_case(ok)) =>
            {
                Ok(())
            }
            Some(charset) => Err(Error::UnsupportedEncoding(format!(
                "charset '{}' is not supported",
                charset
            ))),
        }
    }
}

/// A reader for one family of content types.
#[async_trait]
pub trait InputFormatter: Send + Sync {
    /// Media types this formatter accepts. `*/*` makes it eligible for
    /// requests that declare no content type.
    fn supported_media_types(&self) -> &[MediaType];

    /// Whether this formatter can materialize `model_type` at all.
    fn can_read_type(&self, model_type: &ModelType) -> bool {
        model_type.is_decodable()
    }

    /// Whether this formatter can read the request described by `context`.
    fn can_read(&self, context: &FormatterSelectionContext<'_>) -> bool {
        if !self.can_read_type(context.model_type) {
            return false;
        }
        let supported = self.supported_media_types();
        match context.content_type {
            Some(requested) => supported.iter().any(|media| media.accepts(requested)),
            None => supported.iter().any(MediaType::is_any),
        }
    }

    /// Read the body into a model. Called at most once per bind attempt.
    async fn read(&self, context: &InputFormatterContext<'_>) -> Result<BoundModel>;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Reads JSON bodies with `serde_json`.
#[derive(Debug, Clone)]
pub struct JsonInputFormatter {
    media_types: Vec<MediaType>,
}

impl JsonInputFormatter {
    pub fn new() -> Self {
        Self {
            media_types: vec![MediaType::json(), MediaType::text_json(), MediaType::any_json()],
        }
    }

    /// Also accept `media_type`.
    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_types.push(media_type);
        self
    }
}

impl Default for JsonInputFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputFormatter for JsonInputFormatter {
    fn supported_media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    async fn read(&self, context: &InputFormatterContext<'_>) -> Result<BoundModel> {
        context.ensure_utf8()?;
        let body = context.read_body().await?;
        if body.is_empty() {
            return Err(Error::Deserialization(
                "a non-empty request body is required".to_string(),
            ));
        }
        context.model_type.decode_json(&body)
    }
}

// ============================================================================
// URL-encoded form
// ============================================================================

/// Reads `application/x-www-form-urlencoded` bodies.
#[derive(Debug, Clone)]
pub struct FormInputFormatter {
    media_types: Vec<MediaType>,
}

impl FormInputFormatter {
    pub fn new() -> Self {
        Self {
            media_types: vec![MediaType::form_urlencoded()],
        }
    }
}

impl Default for FormInputFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputFormatter for FormInputFormatter {
    fn supported_media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    async fn read(&self, context: &InputFormatterContext<'_>) -> Result<BoundModel> {
        context.ensure_utf8()?;
        let body = context.read_body().await?;
        context.model_type.decode_form(&body)
    }
}

// ============================================================================
// Plain text
// ============================================================================

/// Reads `text/plain` bodies into a `String`.
#[derive(Debug, Clone)]
pub struct PlainTextInputFormatter {
    media_types: Vec<MediaType>,
}

impl PlainTextInputFormatter {
    pub fn new() -> Self {
        Self {
            media_types: vec![MediaType::plain_text()],
        }
    }
}

impl Default for PlainTextInputFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputFormatter for PlainTextInputFormatter {
    fn supported_media_types(&self) -> &[MediaType] {
        &self.media_types
    }

    fn can_read_type(&self, model_type: &ModelType) -> bool {
        model_type.is::<String>()
    }

    async fn read(&self, context: &InputFormatterContext<'_>) -> Result<BoundModel> {
        context.ensure_utf8()?;
        let body = context.read_body().await?;
        String::from_utf8(body.to_vec())
            .map(BoundModel::new)
            .map_err(|e| Error::UnsupportedEncoding(format!("body is not valid UTF-8: {}", e)))
    }
}
