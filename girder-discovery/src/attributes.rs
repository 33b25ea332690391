//! Declarative metadata attached to reflected types, methods and
//! parameters.
//!
//! An [`Attribute`] is a bag of optional capabilities. Discovery never
//! asks "what kind of attribute is this"; it asks each attribute whether it
//! provides a filter, a route template, a route constraint and so on, and
//! one attribute may provide several.

use crate::FilterMetadata;
use girder_core::{BinderMetadata, HttpRequest};
use std::fmt;
use std::sync::Arc;

/// Capability queries over one declared attribute.
///
/// Every query defaults to "not provided". Queries that hand out shared
/// capability objects take `self: Arc<Self>` so the attribute can return
/// itself.
pub trait Attribute: Send + Sync + fmt::Debug {
    /// Name used in diagnostics.
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Reject malformed declarations. The reason ends up in
    /// `Error::InvalidAttribute`.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }

    fn as_action_constraint(self: Arc<Self>) -> Option<Arc<dyn ActionConstraint>> {
        None
    }

    fn as_filter(self: Arc<Self>) -> Option<Arc<dyn FilterMetadata>> {
        None
    }

    fn as_route_constraint(self: Arc<Self>) -> Option<Arc<dyn RouteConstraintProvider>> {
        None
    }

    fn as_route_template(self: Arc<Self>) -> Option<Arc<dyn RouteTemplateProvider>> {
        None
    }

    fn as_binder_metadata(self: Arc<Self>) -> Option<Arc<dyn BinderMetadata>> {
        None
    }

    /// HTTP methods this attribute restricts an action to.
    fn as_http_methods(&self) -> Option<&[String]> {
        None
    }

    /// `Some(false)` hides the target from API descriptions.
    fn as_api_visibility(&self) -> Option<bool> {
        None
    }

    fn as_api_group_name(&self) -> Option<&str> {
        None
    }

    fn as_action_name(&self) -> Option<&str> {
        None
    }

    fn is_non_action(&self) -> bool {
        false
    }
}

/// Decides whether an action is a candidate for a request.
pub trait ActionConstraint: Send + Sync + fmt::Debug {
    fn order(&self) -> i32 {
        0
    }

    fn accept(&self, request: &HttpRequest) -> bool;
}

/// Requires a route value to be present with a fixed value.
pub trait RouteConstraintProvider: Send + Sync + fmt::Debug {
    fn route_key(&self) -> &str;
    fn route_value(&self) -> &str;
}

/// Declares an attribute route.
pub trait RouteTemplateProvider: Send + Sync + fmt::Debug {
    fn template(&self) -> Option<&str>;

    fn order(&self) -> Option<i32> {
        None
    }

    fn route_name(&self) -> Option<&str> {
        None
    }
}

/// Balanced, non-empty `{param}` segments.
fn validate_template(template: &str) -> std::result::Result<(), String> {
    let mut open: Option<usize> = None;
    for (index, ch) in template.char_indices() {
        match ch {
            '{' if open.is_some() => {
                return Err(format!("nested '{{' at position {} in '{}'", index, template));
            }
            '{' => open = Some(index),
            '}' => match open.take() {
                Some(start) if index == start + 1 => {
                    return Err(format!("empty route parameter in '{}'", template));
                }
                Some(_) => {}
                None => {
                    return Err(format!("unmatched '}}' at position {} in '{}'", index, template));
                }
            },
            _ => {}
        }
    }
    match open {
        Some(start) => Err(format!("unclosed '{{' at position {} in '{}'", start, template)),
        None => Ok(()),
    }
}

// ============================================================================
// Routing
// ============================================================================

/// `#[route("api/[controller]")]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAttribute {
    pub template: String,
    pub order: Option<i32>,
    pub name: Option<String>,
}

impl RouteAttribute {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            order: None,
            name: None,
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Attribute for RouteAttribute {
    fn validate(&self) -> std::result::Result<(), String> {
        validate_template(&self.template)
    }

    fn as_route_template(self: Arc<Self>) -> Option<Arc<dyn RouteTemplateProvider>> {
        Some(self)
    }
}

impl RouteTemplateProvider for RouteAttribute {
    fn template(&self) -> Option<&str> {
        Some(&self.template)
    }

    fn order(&self) -> Option<i32> {
        self.order
    }

    fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// `#[http_get]`, `#[http_post("{id}")]` and friends.
///
/// With a template the attribute defines its own route; without one it only
/// restricts the HTTP methods of the routes declared elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMethodAttribute {
    pub methods: Vec<String>,
    pub template: Option<String>,
    pub order: Option<i32>,
    pub name: Option<String>,
}

impl HttpMethodAttribute {
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
            template: None,
            order: None,
            name: None,
        }
    }

    pub fn get() -> Self {
        Self::new(["GET"])
    }

    pub fn post() -> Self {
        Self::new(["POST"])
    }

    pub fn put() -> Self {
        Self::new(["PUT"])
    }

    pub fn delete() -> Self {
        Self::new(["DELETE"])
    }

    pub fn patch() -> Self {
        Self::new(["PATCH"])
    }

    pub fn head() -> Self {
        Self::new(["HEAD"])
    }

    pub fn options() -> Self {
        Self::new(["OPTIONS"])
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Attribute for HttpMethodAttribute {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.methods.is_empty() {
            return Err("at least one HTTP method is required".to_string());
        }
        if let Some(bad) = self
            .methods
            .iter()
            .find(|m| m.is_empty() || !m.bytes().all(|b| b.is_ascii_alphabetic()))
        {
            return Err(format!("'{}' is not an HTTP method", bad));
        }
        match &self.template {
            Some(template) => validate_template(template),
            None => Ok(()),
        }
    }

    fn as_route_template(self: Arc<Self>) -> Option<Arc<dyn RouteTemplateProvider>> {
        if self.template.is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn as_http_methods(&self) -> Option<&[String]> {
        Some(&self.methods)
    }
}

impl RouteTemplateProvider for HttpMethodAttribute {
    fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    fn order(&self) -> Option<i32> {
        self.order
    }

    fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Places a controller or action in an area (`area` route value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaAttribute {
    pub area: String,
}

impl AreaAttribute {
    pub fn new(area: impl Into<String>) -> Self {
        Self { area: area.into() }
    }
}

impl Attribute for AreaAttribute {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.area.trim().is_empty() {
            return Err("area name must not be empty".to_string());
        }
        Ok(())
    }

    fn as_route_constraint(self: Arc<Self>) -> Option<Arc<dyn RouteConstraintProvider>> {
        Some(self)
    }
}

impl RouteConstraintProvider for AreaAttribute {
    fn route_key(&self) -> &str {
        "area"
    }

    fn route_value(&self) -> &str {
        &self.area
    }
}

/// Matches requests whose method is one of `methods` (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMethodConstraint {
    pub methods: Vec<String>,
}

impl HttpMethodConstraint {
    /// Same order as the constraint generated for verb attributes.
    pub const ORDER: i32 = 100;

    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }
}

impl ActionConstraint for HttpMethodConstraint {
    fn order(&self) -> i32 {
        Self::ORDER
    }

    fn accept(&self, request: &HttpRequest) -> bool {
        self.methods.is_empty()
            || self
                .methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&request.method))
    }
}

impl Attribute for HttpMethodConstraint {
    fn as_action_constraint(self: Arc<Self>) -> Option<Arc<dyn ActionConstraint>> {
        Some(self)
    }
}

// ============================================================================
// API description
// ============================================================================

/// Controls whether and how a target shows up in API descriptions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiExplorerSettings {
    pub ignore_api: bool,
    pub group_name: Option<String>,
}

impl ApiExplorerSettings {
    pub fn ignored() -> Self {
        Self {
            ignore_api: true,
            group_name: None,
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            ignore_api: false,
            group_name: Some(name.into()),
        }
    }
}

impl Attribute for ApiExplorerSettings {
    fn as_api_visibility(&self) -> Option<bool> {
        Some(!self.ignore_api)
    }

    fn as_api_group_name(&self) -> Option<&str> {
        self.group_name.as_deref()
    }
}

// ============================================================================
// Actions and parameters
// ============================================================================

/// Overrides the action name derived from the method name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionName(pub String);

impl ActionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl Attribute for ActionName {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.0.trim().is_empty() {
            return Err("action name must not be empty".to_string());
        }
        Ok(())
    }

    fn as_action_name(&self) -> Option<&str> {
        Some(&self.0)
    }
}

/// Excludes a public method from action discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NonAction;

impl Attribute for NonAction {
    fn is_non_action(&self) -> bool {
        true
    }
}

/// Selects the binder for a parameter, e.g. `BindAttribute::new(FromBody)`.
#[derive(Debug, Clone)]
pub struct BindAttribute {
    marker: Arc<dyn BinderMetadata>,
}

impl BindAttribute {
    pub fn new(marker: impl BinderMetadata + 'static) -> Self {
        Self {
            marker: Arc::new(marker),
        }
    }

    pub fn marker(&self) -> &Arc<dyn BinderMetadata> {
        &self.marker
    }
}

impl Attribute for BindAttribute {
    fn as_binder_metadata(self: Arc<Self>) -> Option<Arc<dyn BinderMetadata>> {
        Some(Arc::clone(&self.marker))
    }
}

/// Attaches a filter instance.
#[derive(Debug, Clone)]
pub struct FilterAttribute {
    filter: Arc<dyn FilterMetadata>,
}

impl FilterAttribute {
    pub fn new(filter: impl FilterMetadata + 'static) -> Self {
        Self {
            filter: Arc::new(filter),
        }
    }

    pub fn from_arc(filter: Arc<dyn FilterMetadata>) -> Self {
        Self { filter }
    }
}

impl Attribute for FilterAttribute {
    fn as_filter(self: Arc<Self>) -> Option<Arc<dyn FilterMetadata>> {
        Some(Arc::clone(&self.filter))
    }
}
