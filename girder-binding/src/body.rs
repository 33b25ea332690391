//! Body binding.
//!
//! [`BodyModelBinder`] claims targets whose metadata carries a body marker,
//! picks an input formatter for the request and reads the body with it.
//! Every request-time failure ends up as a keyed model-state error; nothing
//! escapes the binder as an `Err`.

use crate::{
    BindingResult, FormatterSelectionContext, InputFormatterContext, ModelBinder,
    ModelBindingContext, ModelErrorKind,
};
use async_trait::async_trait;
use girder_core::Error;
use std::sync::Arc;
use tracing::{debug, trace};

/// Binds a model from the request body using the registered input
/// formatters.
///
/// # Examples
///
/// ```no_run
/// use girder_binding::{BodyModelBinder, CompositeModelBinder, SimpleTypeModelBinder};
///
/// let chain = CompositeModelBinder::new()
///     .with_binder(BodyModelBinder::new())
///     .with_binder(SimpleTypeModelBinder);
/// # let _ = chain;
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct BodyModelBinder;

impl BodyModelBinder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ModelBinder for BodyModelBinder {
    async fn bind_model(&self, context: &mut ModelBindingContext<'_>) -> BindingResult {
        if !context.model_metadata.is_from_body() {
            return BindingResult::NotHandled;
        }

        let operation = Arc::clone(&context.operation);
        let metadata = Arc::clone(&context.model_metadata);
        let request = operation.request.as_ref();
        let content_type = request.content_type();

        let selection = FormatterSelectionContext {
            request,
            model_type: &metadata.model_type,
            content_type: content_type.as_ref(),
        };
        let Some(formatter) = operation
            .formatter_selector
            .select_formatter(&operation.input_formatters, &selection)
        else {
            let declared = request
                .header("content-type")
                .map(String::as_str)
                .unwrap_or("(none)");
            debug!(
                model_name = %context.model_name,
                content_type = declared,
                "no input formatter accepts request"
            );
            context.model = None;
            context.model_state.add_binding_failure(
                context.model_name.clone(),
                ModelErrorKind::UnsupportedMediaType,
                Error::UnsupportedMediaType(format!("Unsupported content type '{}'.", declared))
                    .to_string(),
            );
            return BindingResult::Handled;
        };

        trace!(
            model_name = %context.model_name,
            formatter = formatter.name(),
            model_type = metadata.model_type.name(),
            "reading request body"
        );
        let formatter_context = InputFormatterContext {
            request,
            model_type: &metadata.model_type,
            model_name: &context.model_name,
            content_type: content_type.as_ref(),
            max_body_size: operation.max_request_body_size,
        };
        let outcome = formatter.read(&formatter_context).await;

        match outcome {
            Ok(model) => {
                context.model = Some(model);
                context.model_state.mark_valid(context.model_name.clone());
            }
            Err(error) => {
                debug!(
                    model_name = %context.model_name,
                    formatter = formatter.name(),
                    error = %error,
                    "input formatter failed"
                );
                context.model = None;
                context.model_state.add_binding_failure(
                    context.model_name.clone(),
                    ModelErrorKind::ReadFailure,
                    error.to_string(),
                );
            }
        }
        BindingResult::Handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DefaultInputFormatterSelector, InputFormatter, InputFormatterSelector, JsonInputFormatter,
        ModelMetadata, ModelStateDictionary, OperationBindingContext,
    };
    use girder_core::{
        BoundModel, FromBody, FromQuery, HttpRequest, MediaType, ModelType, Result,
    };
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Person {
        name: String,
    }

    /// Returns a fixed person and counts reads.
    struct FixedPersonFormatter {
        media_types: Vec<MediaType>,
        reads: AtomicUsize,
    }

    impl FixedPersonFormatter {
        fn new() -> Self {
            Self {
                media_types: vec![MediaType::json()],
                reads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl InputFormatter for FixedPersonFormatter {
        fn supported_media_types(&self) -> &[MediaType] {
            &self.media_types
        }

        async fn read(&self, _context: &InputFormatterContext<'_>) -> Result<BoundModel> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(BoundModel::new(Person {
                name: "Ada".to_string(),
            }))
        }
    }

    /// Delegates to the default selector and counts calls.
    #[derive(Default)]
    struct CountingSelector {
        calls: AtomicUsize,
    }

    impl InputFormatterSelector for CountingSelector {
        fn select_formatter(
            &self,
            formatters: &[Arc<dyn InputFormatter>],
            context: &FormatterSelectionContext<'_>,
        ) -> Option<Arc<dyn InputFormatter>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            DefaultInputFormatterSelector.select_formatter(formatters, context)
        }
    }

    fn person_metadata() -> Arc<ModelMetadata> {
        Arc::new(ModelMetadata::for_type(ModelType::of::<Person>()).with_binder_metadata(FromBody))
    }

    fn json_request(body: &str) -> Arc<HttpRequest> {
        Arc::new(
            HttpRequest::new("POST", "/people")
                .with_content_type("application/json")
                .with_body(body.to_string()),
        )
    }

    #[tokio::test]
    async fn test_binds_person_with_accepting_formatter() {
        let formatter = Arc::new(FixedPersonFormatter::new());
        let operation = Arc::new(
            OperationBindingContext::new(json_request("{}"))
                .with_input_formatters(vec![formatter.clone() as Arc<dyn InputFormatter>]),
        );
        let mut state = ModelStateDictionary::new();
        let mut context =
            ModelBindingContext::new(operation, person_metadata(), "person", &mut state);

        let result = BodyModelBinder.bind_model(&mut context).await;

        assert_eq!(result, BindingResult::Handled);
        let model = context.model.take().unwrap();
        assert_eq!(model.downcast_ref::<Person>().unwrap().name, "Ada");
        assert_eq!(formatter.reads.load(Ordering::SeqCst), 1);
        assert_eq!(state.error_count(), 0);
        assert!(state.is_valid());
    }

    #[tokio::test]
    async fn test_no_formatter_records_error_under_model_name() {
        let operation = Arc::new(OperationBindingContext::new(json_request("{}")));
        let mut state = ModelStateDictionary::new();
        let mut context =
            ModelBindingContext::new(operation, person_metadata(), "someName", &mut state);

        let result = BodyModelBinder.bind_model(&mut context).await;

        assert_eq!(result, BindingResult::Handled);
        assert!(!context.is_model_set());
        drop(context);
        assert_eq!(state.len(), 1);
        let errors = state.errors_for("someName");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ModelErrorKind::UnsupportedMediaType);
        assert!(errors[0].message.contains("application/json"));
    }

    #[tokio::test]
    async fn test_non_body_marker_is_not_handled() {
        let formatter = Arc::new(FixedPersonFormatter::new());
        let selector = Arc::new(CountingSelector::default());
        let operation = Arc::new(
            OperationBindingContext::new(json_request("{}"))
                .with_input_formatters(vec![formatter.clone() as Arc<dyn InputFormatter>])
                .with_formatter_selector(selector.clone()),
        );
        let metadata = Arc::new(
            ModelMetadata::for_type(ModelType::of::<Person>())
                .with_binder_metadata(FromQuery::new()),
        );
        let mut state = ModelStateDictionary::new();
        let mut context = ModelBindingContext::new(operation, metadata, "person", &mut state);

        let result = BodyModelBinder.bind_model(&mut context).await;

        assert!(!result.is_handled());
        assert!(!context.is_model_set());
        drop(context);
        assert!(state.is_empty());
        assert_eq!(selector.calls.load(Ordering::SeqCst), 0);
        assert_eq!(formatter.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unmarked_target_is_not_handled() {
        let operation = Arc::new(OperationBindingContext::new(json_request("{}")));
        let metadata = Arc::new(ModelMetadata::for_type(ModelType::of::<Person>()));
        let mut state = ModelStateDictionary::new();
        let mut context = ModelBindingContext::new(operation, metadata, "person", &mut state);

        assert_eq!(
            BodyModelBinder.bind_model(&mut context).await,
            BindingResult::NotHandled
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_becomes_read_failure() {
        let operation = Arc::new(
            OperationBindingContext::new(json_request("{\"name\": "))
                .with_input_formatters(vec![Arc::new(JsonInputFormatter::new()) as Arc<dyn InputFormatter>]),
        );
        let mut state = ModelStateDictionary::new();
        let mut context =
            ModelBindingContext::new(operation, person_metadata(), "person", &mut state);

        let result = BodyModelBinder.bind_model(&mut context).await;

        assert!(result.is_handled());
        assert!(context.has_errors());
        assert!(!context.is_model_set());
        drop(context);
        assert_eq!(state.errors_for("person")[0].kind, ModelErrorKind::ReadFailure);
    }

    #[tokio::test]
    async fn test_unsupported_media_type_recorded_when_error_cap_reached() {
        let operation = Arc::new(OperationBindingContext::new(json_request("{}")));
        let mut state = ModelStateDictionary::with_max_errors(1);
        state.add_error("unrelated", ModelErrorKind::Custom, "already failed");
        let mut context =
            ModelBindingContext::new(operation, person_metadata(), "someName", &mut state);

        let result = BodyModelBinder.bind_model(&mut context).await;

        assert_eq!(result, BindingResult::Handled);
        assert!(!context.is_model_set());
        assert!(context.has_errors());
        drop(context);
        let errors = state.errors_for("someName");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ModelErrorKind::UnsupportedMediaType);
        assert_eq!(state.errors_for(crate::TOO_MANY_ERRORS_KEY).len(), 1);
    }

    #[tokio::test]
    async fn test_read_failure_recorded_when_error_cap_reached() {
        let operation = Arc::new(
            OperationBindingContext::new(json_request("not json"))
                .with_input_formatters(vec![Arc::new(JsonInputFormatter::new()) as Arc<dyn InputFormatter>]),
        );
        let mut state = ModelStateDictionary::with_max_errors(1);
        state.add_error("unrelated", ModelErrorKind::Custom, "already failed");
        let mut context =
            ModelBindingContext::new(operation, person_metadata(), "person", &mut state);

        let result = BodyModelBinder.bind_model(&mut context).await;

        assert!(result.is_handled());
        assert!(context.has_errors());
        drop(context);
        assert_eq!(state.errors_for("person")[0].kind, ModelErrorKind::ReadFailure);
        assert!(!state.is_valid());
    }

    #[tokio::test]
    async fn test_json_formatter_reads_body() {
        let operation = Arc::new(
            OperationBindingContext::new(json_request(r#"{"name":"Grace"}"#))
                .with_input_formatters(vec![Arc::new(JsonInputFormatter::new()) as Arc<dyn InputFormatter>]),
        );
        let mut state = ModelStateDictionary::new();
        let mut context =
            ModelBindingContext::new(operation, person_metadata(), "person", &mut state);

        BodyModelBinder.bind_model(&mut context).await;

        let person = context.model.take().unwrap().downcast::<Person>().unwrap();
        assert_eq!(
            person,
            Person {
                name: "Grace".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_aborted_request_is_recorded_not_raised() {
        let token = CancellationToken::new();
        token.cancel();
        let request = HttpRequest::new("POST", "/people")
            .with_content_type("application/json")
            .with_body(r#"{"name":"Grace"}"#)
            .with_abort_token(token);
        let operation = Arc::new(
            OperationBindingContext::new(Arc::new(request))
                .with_input_formatters(vec![Arc::new(JsonInputFormatter::new()) as Arc<dyn InputFormatter>]),
        );
        let mut state = ModelStateDictionary::new();
        let mut context =
            ModelBindingContext::new(operation, person_metadata(), "person", &mut state);

        let result = BodyModelBinder.bind_model(&mut context).await;

        assert!(result.is_handled());
        assert!(!context.is_model_set());
        drop(context);
        let errors = state.errors_for("person");
        assert_eq!(errors[0].kind, ModelErrorKind::ReadFailure);
        assert_eq!(errors[0].message, Error::RequestAborted.to_string());
    }
}
