//! Binding contexts.
//!
//! [`OperationBindingContext`] is created once per request and shared
//! read-only (`Arc`) by every bind attempt for that request. A
//! [`ModelBindingContext`] is created per attempt and owned by the binder
//! processing it; it borrows the request's model state mutably for the
//! duration of the attempt, so there is only ever one writer.

use crate::{
    CompositeModelBinder, CompositeValueProvider, DefaultInputFormatterSelector,
    DefaultModelMetadataProvider, InputFormatter, InputFormatterSelector, ModelBinder,
    ModelMetadata, ModelMetadataProvider, ModelStateDictionary, ModelValidationState,
    ValueProvider,
};
use girder_core::options::DEFAULT_MAX_REQUEST_BODY_SIZE;
use girder_core::{BoundModel, HttpRequest};
use std::fmt;
use std::sync::Arc;

/// Ambient, per-request binding state.
#[derive(Clone)]
pub struct OperationBindingContext {
    pub request: Arc<HttpRequest>,
    /// Registered formatters in priority order.
    pub input_formatters: Arc<[Arc<dyn InputFormatter>]>,
    pub formatter_selector: Arc<dyn InputFormatterSelector>,
    pub metadata_provider: Arc<dyn ModelMetadataProvider>,
    /// The binder chain; sibling binders may recurse through it.
    pub model_binder: Arc<dyn ModelBinder>,
    pub value_provider: Arc<dyn ValueProvider>,
    /// Body size limit in bytes; 0 means unlimited.
    pub max_request_body_size: usize,
}

impl OperationBindingContext {
    /// A context with no formatters, an empty binder chain and request-backed
    /// value providers. Usually built through `BindingServices` instead.
    pub fn new(request: Arc<HttpRequest>) -> Self {
        let value_provider = Arc::new(CompositeValueProvider::from_request(&request));
        Self {
            request,
            input_formatters: Arc::from(Vec::<Arc<dyn InputFormatter>>::new()),
            formatter_selector: Arc::new(DefaultInputFormatterSelector),
            metadata_provider: Arc::new(DefaultModelMetadataProvider::new()),
            model_binder: Arc::new(CompositeModelBinder::new()),
            value_provider,
            max_request_body_size: DEFAULT_MAX_REQUEST_BODY_SIZE,
        }
    }

    pub fn with_input_formatters(mut self, formatters: Vec<Arc<dyn InputFormatter>>) -> Self {
        self.input_formatters = Arc::from(formatters);
        self
    }

    pub fn with_formatter_selector(mut self, selector: Arc<dyn InputFormatterSelector>) -> Self {
        self.formatter_selector = selector;
        self
    }

    pub fn with_metadata_provider(mut self, provider: Arc<dyn ModelMetadataProvider>) -> Self {
        self.metadata_provider = provider;
        self
    }

    pub fn with_model_binder(mut self, binder: Arc<dyn ModelBinder>) -> Self {
        self.model_binder = binder;
        self
    }

    pub fn with_value_provider(mut self, provider: Arc<dyn ValueProvider>) -> Self {
        self.value_provider = provider;
        self
    }

    pub fn with_max_request_body_size(mut self, bytes: usize) -> Self {
        self.max_request_body_size = bytes;
        self
    }
}

impl fmt::Debug for OperationBindingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationBindingContext")
            .field("request", &self.request)
            .field(
                "input_formatters",
                &self
                    .input_formatters
                    .iter()
                    .map(|formatter| formatter.name())
                    .collect::<Vec<_>>(),
            )
            .field("max_request_body_size", &self.max_request_body_size)
            .finish_non_exhaustive()
    }
}

/// State for one bind attempt.
pub struct ModelBindingContext<'a> {
    pub model_metadata: Arc<ModelMetadata>,
    /// Key into model state for diagnostics about this target.
    pub model_name: String,
    /// Set by the binder that handles the attempt.
    pub model: Option<BoundModel>,
    pub model_state: &'a mut ModelStateDictionary,
    pub value_provider: Arc<dyn ValueProvider>,
    pub operation: Arc<OperationBindingContext>,
}

impl<'a> ModelBindingContext<'a> {
    pub fn new(
        operation: Arc<OperationBindingContext>,
        model_metadata: Arc<ModelMetadata>,
        model_name: impl Into<String>,
        model_state: &'a mut ModelStateDictionary,
    ) -> Self {
        Self {
            value_provider: Arc::clone(&operation.value_provider),
            model_metadata,
            model_name: model_name.into(),
            model: None,
            model_state,
            operation,
        }
    }

    /// Key used for value lookups: the metadata override or the model name.
    pub fn lookup_name(&self) -> &str {
        self.model_metadata
            .binder_model_name
            .as_deref()
            .unwrap_or(&self.model_name)
    }

    pub fn is_model_set(&self) -> bool {
        self.model.is_some()
    }

    /// Whether a handled attempt failed, per the convention that a failed
    /// bind leaves at least one error under the model name.
    pub fn has_errors(&self) -> bool {
        !self.model_state.errors_for(&self.model_name).is_empty()
            || self.model_state.validation_state(&self.model_name) == ModelValidationState::Invalid
    }
}

impl fmt::Debug for ModelBindingContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBindingContext")
            .field("model_name", &self.model_name)
            .field("model_metadata", &self.model_metadata)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
