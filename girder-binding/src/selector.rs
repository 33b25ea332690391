//! Input formatter selection.
//!
//! Given the registered formatters and what the request declares, pick the
//! one that will read the body. Registration order is priority: the first
//! formatter that can read the request wins. Finding nothing is a normal
//! outcome, not an error; the caller decides what "no reader" means.

use crate::InputFormatter;
use girder_core::{HttpRequest, MediaType, ModelType};
use std::sync::Arc;

/// What a selector knows about the read it is choosing a formatter for.
#[derive(Debug, Clone, Copy)]
pub struct FormatterSelectionContext<'a> {
    pub request: &'a HttpRequest,
    /// Type the formatter must materialize.
    pub model_type: &'a ModelType,
    /// Declared content type. `None` when the request declares none.
    pub content_type: Option<&'a MediaType>,
}

/// Strategy for choosing an input formatter.
pub trait InputFormatterSelector: Send + Sync {
    /// Pure function of its inputs; returns `None` when no candidate applies.
    fn select_formatter(
        &self,
        formatters: &[Arc<dyn InputFormatter>],
        context: &FormatterSelectionContext<'_>,
    ) -> Option<Arc<dyn InputFormatter>>;
}

/// First registered formatter whose [`InputFormatter::can_read`] accepts.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultInputFormatterSelector;

impl InputFormatterSelector for DefaultInputFormatterSelector {
    fn select_formatter(
        &self,
        formatters: &[Arc<dyn InputFormatter>],
        context: &FormatterSelectionContext<'_>,
    ) -> Option<Arc<dyn InputFormatter>> {
        formatters
            .iter()
            .find(|formatter| formatter.can_read(context))
            .cloned()
    }
}
