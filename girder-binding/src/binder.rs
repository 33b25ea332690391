//! The model binder chain.
//!
//! Binders are consulted in order. A binder that does not apply to the
//! target returns [`BindingResult::NotHandled`] without touching the
//! context; the first binder to return [`BindingResult::Handled`] ends the
//! chain, whether or not it produced a model.

use crate::{ModelBindingContext, ValueProvider};
use async_trait::async_trait;
use girder_core::BindingSource;
use std::sync::Arc;
use tracing::{debug, trace};

/// Outcome of one binder's attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResult {
    /// The binder does not apply; try the next one.
    NotHandled,
    /// The binder claimed the target. The model may still be unset when the
    /// attempt failed; failures are recorded in model state.
    Handled,
}

impl BindingResult {
    pub fn is_handled(self) -> bool {
        matches!(self, BindingResult::Handled)
    }
}

#[async_trait]
pub trait ModelBinder: Send + Sync {
    async fn bind_model(&self, context: &mut ModelBindingContext<'_>) -> BindingResult;
}

/// Runs binders in registration order until one handles the target.
#[derive(Clone, Default)]
pub struct CompositeModelBinder {
    binders: Vec<Arc<dyn ModelBinder>>,
}

impl CompositeModelBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_binder(mut self, binder: impl ModelBinder + 'static) -> Self {
        self.binders.push(Arc::new(binder));
        self
    }

    pub fn with_binder_arc(mut self, binder: Arc<dyn ModelBinder>) -> Self {
        self.binders.push(binder);
        self
    }

    pub fn len(&self) -> usize {
        self.binders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binders.is_empty()
    }
}

#[async_trait]
impl ModelBinder for CompositeModelBinder {
    async fn bind_model(&self, context: &mut ModelBindingContext<'_>) -> BindingResult {
        for binder in &self.binders {
            if binder.bind_model(context).await.is_handled() {
                return BindingResult::Handled;
            }
        }
        trace!(model_name = %context.model_name, "no binder handled model");
        BindingResult::NotHandled
    }
}

/// Binds a single value from route values, the query string or headers.
///
/// Applies to targets with no binder marker, or a query/route/header
/// marker. Targets whose type cannot be decoded from text are left to other
/// binders.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleTypeModelBinder;

impl SimpleTypeModelBinder {
    fn lookup(
        provider: &dyn ValueProvider,
        source: Option<&BindingSource>,
        key: &str,
    ) -> Option<String> {
        let result = match source {
            Some(source) => provider.get_value_from(source, key),
            None => provider.get_value(key),
        }?;
        result.first_value().map(str::to_string)
    }
}

#[async_trait]
impl ModelBinder for SimpleTypeModelBinder {
    async fn bind_model(&self, context: &mut ModelBindingContext<'_>) -> BindingResult {
        let source = context.model_metadata.binding_source();
        match &source {
            None | Some(BindingSource::Query | BindingSource::Route | BindingSource::Header) => {}
            Some(_) => return BindingResult::NotHandled,
        }
        if !context.model_metadata.model_type.is_decodable() {
            return BindingResult::NotHandled;
        }

        let key = context.lookup_name().to_string();
        let Some(raw) = Self::lookup(context.value_provider.as_ref(), source.as_ref(), &key) else {
            trace!(model_name = %context.model_name, key = %key, "no value found");
            return BindingResult::NotHandled;
        };

        context
            .model_state
            .set_attempted_value(context.model_name.clone(), raw.clone());
        match context.model_metadata.model_type.decode_raw(&raw) {
            Ok(model) => {
                context.model = Some(model);
                context.model_state.mark_valid(context.model_name.clone());
            }
            Err(error) => {
                debug!(
                    model_name = %context.model_name,
                    error = %error,
                    "value conversion failed"
                );
                context.model_state.add_binding_failure(
                    context.model_name.clone(),
                    crate::ModelErrorKind::ValueConversion,
                    format!("The value '{}' is not valid for {}.", raw, context.model_name),
                );
            }
        }
        BindingResult::Handled
    }
}
