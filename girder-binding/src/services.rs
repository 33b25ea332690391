//! Process-wide binding services.
//!
//! [`BindingServices`] owns everything that is registered once at startup
//! (formatters, selector, metadata provider, binder chain, options) and
//! hands out a fresh [`OperationBindingContext`] per request.

use crate::{
    BindingResult, BodyModelBinder, CompositeModelBinder, CompositeValueProvider,
    DefaultInputFormatterSelector, DefaultModelMetadataProvider, FormInputFormatter,
    InputFormatter, InputFormatterSelector, JsonInputFormatter, ModelBinder, ModelBindingContext,
    ModelMetadata, ModelMetadataProvider, ModelStateDictionary, OperationBindingContext,
    PlainTextInputFormatter, SimpleTypeModelBinder,
};
use girder_core::{BinderMetadata, BoundModel, GirderOptions, HttpRequest, ModelType, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of binding one parameter.
#[derive(Debug)]
pub struct BindingOutcome {
    pub result: BindingResult,
    pub model: Option<BoundModel>,
}

impl BindingOutcome {
    /// Whether a binder produced a model.
    pub fn is_bound(&self) -> bool {
        self.model.is_some()
    }
}

/// Startup-time registry for model binding.
#[derive(Clone)]
pub struct BindingServices {
    options: Arc<GirderOptions>,
    input_formatters: Arc<[Arc<dyn InputFormatter>]>,
    formatter_selector: Arc<dyn InputFormatterSelector>,
    metadata_provider: Arc<dyn ModelMetadataProvider>,
    model_binder: Arc<dyn ModelBinder>,
}

impl BindingServices {
    pub fn builder() -> BindingServicesBuilder {
        BindingServicesBuilder::default()
    }

    pub fn options(&self) -> &GirderOptions {
        &self.options
    }

    pub fn input_formatters(&self) -> &[Arc<dyn InputFormatter>] {
        &self.input_formatters
    }

    pub fn metadata_provider(&self) -> &Arc<dyn ModelMetadataProvider> {
        &self.metadata_provider
    }

    /// Shared context for every bind attempt on `request`.
    pub fn operation_context(&self, request: Arc<HttpRequest>) -> Arc<OperationBindingContext> {
        let value_provider = Arc::new(CompositeValueProvider::from_request(&request));
        Arc::new(OperationBindingContext {
            request,
            input_formatters: Arc::clone(&self.input_formatters),
            formatter_selector: Arc::clone(&self.formatter_selector),
            metadata_provider: Arc::clone(&self.metadata_provider),
            model_binder: Arc::clone(&self.model_binder),
            value_provider,
            max_request_body_size: self.options.max_request_body_size,
        })
    }

    /// Empty model state capped at the configured error limit.
    pub fn new_model_state(&self) -> ModelStateDictionary {
        ModelStateDictionary::with_max_errors(self.options.max_model_state_errors)
    }

    /// Bind one action parameter through the binder chain.
    ///
    /// A marker declared on the parameter overrides one registered for the
    /// type. Failures are recorded in `model_state` under `name`.
    ///
    /// ```
    /// use girder_binding::BindingServices;
    /// use girder_core::{FromBody, HttpRequest, ModelType};
    /// use std::sync::Arc;
    ///
    /// # tokio_test::block_on(async {
    /// let services = BindingServices::builder().build().unwrap();
    /// let request = HttpRequest::new("POST", "/tags")
    ///     .with_content_type("application/json")
    ///     .with_body(r#"["rust","web"]"#);
    /// let operation = services.operation_context(Arc::new(request));
    /// let mut state = services.new_model_state();
    ///
    /// let tags = ModelType::of::<Vec<String>>();
    /// let outcome = services
    ///     .bind_parameter(&operation, "tags", &tags, Some(Arc::new(FromBody)), &mut state)
    ///     .await;
    /// let tags = outcome.model.unwrap().downcast::<Vec<String>>().unwrap();
    /// assert_eq!(tags, ["rust", "web"]);
    /// # });
    /// ```
    pub async fn bind_parameter(
        &self,
        operation: &Arc<OperationBindingContext>,
        name: &str,
        model_type: &ModelType,
        binder_metadata: Option<Arc<dyn BinderMetadata>>,
        model_state: &mut ModelStateDictionary,
    ) -> BindingOutcome {
        let metadata = operation
            .metadata_provider
            .metadata_for_parameter(model_type, binder_metadata);
        self.bind_with_metadata(operation, name, metadata, model_state)
            .await
    }

    /// Bind a target whose metadata is already resolved.
    pub async fn bind_with_metadata(
        &self,
        operation: &Arc<OperationBindingContext>,
        name: &str,
        metadata: Arc<ModelMetadata>,
        model_state: &mut ModelStateDictionary,
    ) -> BindingOutcome {
        let mut context =
            ModelBindingContext::new(Arc::clone(operation), metadata, name, model_state);
        let result = operation.model_binder.bind_model(&mut context).await;
        if !result.is_handled() {
            debug!(model_name = name, "parameter left unbound");
        }
        BindingOutcome {
            result,
            model: context.model.take(),
        }
    }
}

impl fmt::Debug for BindingServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingServices")
            .field("options", &self.options)
            .field(
                "input_formatters",
                &self
                    .input_formatters
                    .iter()
                    .map(|formatter| formatter.name())
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Builder for [`BindingServices`].
///
/// With nothing registered, `build` installs the JSON, form and plain-text
/// formatters and the body-then-simple-type binder chain.
#[derive(Default)]
pub struct BindingServicesBuilder {
    options: Option<GirderOptions>,
    input_formatters: Vec<Arc<dyn InputFormatter>>,
    formatter_selector: Option<Arc<dyn InputFormatterSelector>>,
    metadata_provider: Option<Arc<dyn ModelMetadataProvider>>,
    model_binders: Vec<Arc<dyn ModelBinder>>,
}

impl BindingServicesBuilder {
    pub fn options(mut self, options: GirderOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Register a formatter. Registration order is selection priority.
    pub fn formatter(mut self, formatter: impl InputFormatter + 'static) -> Self {
        self.input_formatters.push(Arc::new(formatter));
        self
    }

    pub fn formatter_arc(mut self, formatter: Arc<dyn InputFormatter>) -> Self {
        self.input_formatters.push(formatter);
        self
    }

    /// Append the built-in formatters after any already registered.
    pub fn with_default_formatters(self) -> Self {
        self.formatter(JsonInputFormatter::new())
            .formatter(FormInputFormatter::new())
            .formatter(PlainTextInputFormatter::new())
    }

    pub fn selector(mut self, selector: impl InputFormatterSelector + 'static) -> Self {
        self.formatter_selector = Some(Arc::new(selector));
        self
    }

    pub fn metadata_provider(mut self, provider: impl ModelMetadataProvider + 'static) -> Self {
        self.metadata_provider = Some(Arc::new(provider));
        self
    }

    /// Append a binder to the chain.
    pub fn binder(mut self, binder: impl ModelBinder + 'static) -> Self {
        self.model_binders.push(Arc::new(binder));
        self
    }

    pub fn build(self) -> Result<BindingServices> {
        let options = self.options.unwrap_or_default();
        options.validate()?;

        let input_formatters = if self.input_formatters.is_empty() {
            BindingServicesBuilder::default()
                .with_default_formatters()
                .input_formatters
        } else {
            self.input_formatters
        };

        let binders = if self.model_binders.is_empty() {
            vec![
                Arc::new(BodyModelBinder::new()) as Arc<dyn ModelBinder>,
                Arc::new(SimpleTypeModelBinder),
            ]
        } else {
            self.model_binders
        };
        let model_binder = binders
            .into_iter()
            .fold(CompositeModelBinder::new(), |chain, binder| {
                chain.with_binder_arc(binder)
            });

        info!(
            formatters = input_formatters.len(),
            binders = model_binder.len(),
            "model binding services ready"
        );

        Ok(BindingServices {
            options: Arc::new(options),
            input_formatters: Arc::from(input_formatters),
            formatter_selector: self
                .formatter_selector
                .unwrap_or_else(|| Arc::new(DefaultInputFormatterSelector)),
            metadata_provider: self
                .metadata_provider
                .unwrap_or_else(|| Arc::new(DefaultModelMetadataProvider::new())),
            model_binder: Arc::new(model_binder),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use girder_core::{FromBody, FromRoute};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Order {
        sku: String,
        quantity: u32,
    }

    #[test]
    fn test_builder_defaults() {
        let services = BindingServices::builder().build().unwrap();
        assert_eq!(services.input_formatters().len(), 3);
        assert_eq!(
            services.options().max_model_state_errors,
            girder_core::options::DEFAULT_MAX_MODEL_STATE_ERRORS
        );
    }

    #[test]
    fn test_builder_rejects_invalid_options() {
        let options = GirderOptions::new().max_model_state_errors(0);
        assert!(BindingServices::builder().options(options).build().is_err());
    }

    #[test]
    fn test_model_state_uses_configured_cap() {
        let services = BindingServices::builder()
            .options(GirderOptions::new().max_model_state_errors(2))
            .build()
            .unwrap();
        assert_eq!(services.new_model_state().max_allowed_errors(), 2);
    }

    #[tokio::test]
    async fn test_binds_body_and_route_parameters() {
        let services = BindingServices::builder().build().unwrap();
        let request = HttpRequest::new("POST", "/orders/12")
            .with_path_param("id", "12")
            .with_content_type("application/json; charset=utf-8")
            .with_body(r#"{"sku":"A-1","quantity":3}"#);
        let operation = services.operation_context(Arc::new(request));
        let mut state = services.new_model_state();

        let order = services
            .bind_parameter(
                &operation,
                "order",
                &ModelType::of::<Order>(),
                Some(Arc::new(FromBody)),
                &mut state,
            )
            .await;
        let id = services
            .bind_parameter(
                &operation,
                "id",
                &ModelType::of::<u64>(),
                Some(Arc::new(FromRoute::new())),
                &mut state,
            )
            .await;

        assert!(order.result.is_handled());
        let order = order.model.unwrap().downcast::<Order>().unwrap();
        assert_eq!(order.sku, "A-1");
        assert_eq!(order.quantity, 3);
        assert_eq!(id.model.unwrap().downcast_ref::<u64>(), Some(&12));
        assert!(state.is_valid());
    }

    #[tokio::test]
    async fn test_unbound_parameter_is_not_handled() {
        let services = BindingServices::builder().build().unwrap();
        let operation = services.operation_context(Arc::new(HttpRequest::new("GET", "/")));
        let mut state = services.new_model_state();

        let outcome = services
            .bind_parameter(&operation, "page", &ModelType::of::<u32>(), None, &mut state)
            .await;

        assert_eq!(outcome.result, BindingResult::NotHandled);
        assert!(!outcome.is_bound());
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_custom_formatter_order_is_priority() {
        let services = BindingServices::builder()
            .formatter(PlainTextInputFormatter::new())
            .with_default_formatters()
            .build()
            .unwrap();
        assert_eq!(services.input_formatters().len(), 4);
        assert!(
            services.input_formatters()[0]
                .name()
                .ends_with("PlainTextInputFormatter")
        );
    }
}
