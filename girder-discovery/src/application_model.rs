//! The application model: controllers, their actions and everything
//! attached to them.
//!
//! Built once at startup and shared read-only afterwards. Each
//! [`ActionModel`] points back at its owning [`ControllerModel`] through a
//! `Weak` reference; the controller owns the actions.

use crate::{
    ActionConstraint, Attribute, FilterMetadata, MethodDescriptor, RouteConstraintProvider,
    RouteTemplateProvider, TypeDescriptor,
};
use girder_core::{BinderMetadata, BindingSource, ModelType};
use std::fmt;
use std::sync::{Arc, Weak};

/// An attribute route as declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeRouteModel {
    pub template: Option<String>,
    pub order: Option<i32>,
    pub name: Option<String>,
}

impl AttributeRouteModel {
    pub fn from_provider(provider: &dyn RouteTemplateProvider) -> Self {
        Self {
            template: provider.template().map(str::to_string),
            order: provider.order(),
            name: provider.route_name().map(str::to_string),
        }
    }

    /// Whether the template ignores the controller prefix.
    pub fn is_absolute(&self) -> bool {
        self.template
            .as_deref()
            .is_some_and(|t| t.starts_with('/') || t.starts_with("~/"))
    }

    /// Combine a controller route with an action route.
    ///
    /// An absolute action template replaces the prefix; otherwise the two
    /// are joined with `/`. The action's order and name win when present.
    pub fn combine(
        controller: Option<&AttributeRouteModel>,
        action: Option<&AttributeRouteModel>,
    ) -> Option<AttributeRouteModel> {
        match (controller, action) {
            (None, None) => None,
            (Some(left), None) => Some(left.clone()),
            (None, Some(right)) => Some(right.clone()),
            (Some(_), Some(right)) if right.is_absolute() => Some(right.clone()),
            (Some(left), Some(right)) => {
                let template = match (left.template.as_deref(), right.template.as_deref()) {
                    (Some(l), Some(r)) => Some(join_templates(l, r)),
                    (l, r) => l.or(r).map(str::to_string),
                };
                Some(AttributeRouteModel {
                    template,
                    order: right.order.or(left.order),
                    name: right.name.clone().or_else(|| left.name.clone()),
                })
            }
        }
    }
}

fn join_templates(prefix: &str, suffix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let suffix = suffix.trim_start_matches('/');
    match (prefix.is_empty(), suffix.is_empty()) {
        (true, _) => suffix.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}/{}", prefix, suffix),
    }
}

/// API description metadata. `None` means "not declared".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiExplorerModel {
    pub is_visible: Option<bool>,
    pub group_name: Option<String>,
}

impl ApiExplorerModel {
    /// First declared visibility and group name, each looked up
    /// independently.
    pub fn from_attributes(attributes: &[Arc<dyn Attribute>]) -> Self {
        Self {
            is_visible: attributes.iter().find_map(|a| a.as_api_visibility()),
            group_name: attributes
                .iter()
                .find_map(|a| a.as_api_group_name().map(str::to_string)),
        }
    }
}

/// An action parameter.
#[derive(Debug, Clone)]
pub struct ParameterModel {
    pub name: String,
    pub model_type: ModelType,
    pub attributes: Vec<Arc<dyn Attribute>>,
    /// Marker selecting the binder, drawn from the parameter's attributes.
    pub binder_metadata: Option<Arc<dyn BinderMetadata>>,
    pub is_optional: bool,
}

impl ParameterModel {
    pub fn binding_source(&self) -> Option<BindingSource> {
        self.binder_metadata.as_ref().map(|m| m.binding_source())
    }
}

/// One routable action.
pub struct ActionModel {
    pub method: MethodDescriptor,
    pub action_name: String,
    pub attributes: Vec<Arc<dyn Attribute>>,
    pub filters: Vec<Arc<dyn FilterMetadata>>,
    pub action_constraints: Vec<Arc<dyn ActionConstraint>>,
    pub route_constraints: Vec<Arc<dyn RouteConstraintProvider>>,
    pub attribute_route: Option<AttributeRouteModel>,
    pub http_methods: Vec<String>,
    pub parameters: Vec<ParameterModel>,
    pub api_explorer: ApiExplorerModel,
    pub(crate) controller: Weak<ControllerModel>,
}

impl ActionModel {
    /// An action not yet attached to a controller.
    pub fn new(method: MethodDescriptor, action_name: impl Into<String>) -> Self {
        Self {
            method,
            action_name: action_name.into(),
            attributes: Vec::new(),
            filters: Vec::new(),
            action_constraints: Vec::new(),
            route_constraints: Vec::new(),
            attribute_route: None,
            http_methods: Vec::new(),
            parameters: Vec::new(),
            api_explorer: ApiExplorerModel::default(),
            controller: Weak::new(),
        }
    }

    /// The owning controller, while the application model is alive.
    pub fn controller(&self) -> Option<Arc<ControllerModel>> {
        self.controller.upgrade()
    }

    pub fn belongs_to(&self, controller: &Arc<ControllerModel>) -> bool {
        Weak::ptr_eq(&self.controller, &Arc::downgrade(controller))
    }

    /// Empty `http_methods` accepts every method.
    pub fn accepts_method(&self, method: &str) -> bool {
        self.http_methods.is_empty()
            || self
                .http_methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(method))
    }
}

impl fmt::Debug for ActionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionModel")
            .field("action_name", &self.action_name)
            .field("method", &self.method.name)
            .field("http_methods", &self.http_methods)
            .field("attribute_route", &self.attribute_route)
            .field("parameters", &self.parameters.len())
            .field("filters", &self.filters.len())
            .field("attached", &(self.controller.strong_count() > 0))
            .finish()
    }
}

/// A discovered controller.
pub struct ControllerModel {
    pub controller_type: Arc<TypeDescriptor>,
    /// Type name with the controller suffix stripped.
    pub controller_name: String,
    pub attributes: Vec<Arc<dyn Attribute>>,
    pub action_constraints: Vec<Arc<dyn ActionConstraint>>,
    pub filters: Vec<Arc<dyn FilterMetadata>>,
    pub route_constraints: Vec<Arc<dyn RouteConstraintProvider>>,
    pub attribute_routes: Vec<AttributeRouteModel>,
    pub api_explorer: ApiExplorerModel,
    pub actions: Vec<Arc<ActionModel>>,
}

impl ControllerModel {
    pub fn action(&self, name: &str) -> Option<&Arc<ActionModel>> {
        self.actions
            .iter()
            .find(|action| action.action_name.eq_ignore_ascii_case(name))
    }
}

impl fmt::Debug for ControllerModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerModel")
            .field("controller_name", &self.controller_name)
            .field("controller_type", &self.controller_type.full_name())
            .field("filters", &self.filters)
            .field("attribute_routes", &self.attribute_routes)
            .field("api_explorer", &self.api_explorer)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

/// A resolved (method, route) pair for one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub controller: String,
    pub action: String,
    pub http_methods: Vec<String>,
    pub template: Option<String>,
}

/// Every discovered controller.
#[derive(Debug, Clone, Default)]
pub struct ApplicationModel {
    controllers: Vec<Arc<ControllerModel>>,
}

impl ApplicationModel {
    pub fn new(controllers: Vec<Arc<ControllerModel>>) -> Self {
        Self { controllers }
    }

    pub fn controllers(&self) -> &[Arc<ControllerModel>] {
        &self.controllers
    }

    /// Look a controller up by name (case-insensitive).
    pub fn controller(&self, name: &str) -> Option<&Arc<ControllerModel>> {
        self.controllers
            .iter()
            .find(|c| c.controller_name.eq_ignore_ascii_case(name))
    }

    pub fn actions(&self) -> impl Iterator<Item = &Arc<ActionModel>> {
        self.controllers.iter().flat_map(|c| c.actions.iter())
    }

    /// Attribute-routed endpoints with controller and action routes
    /// combined. A controller with several routes yields one endpoint per
    /// controller route.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints = Vec::new();
        for controller in &self.controllers {
            let prefixes: Vec<Option<&AttributeRouteModel>> =
                if controller.attribute_routes.is_empty() {
                    vec![None]
                } else {
                    controller.attribute_routes.iter().map(Some).collect()
                };
            for action in &controller.actions {
                for prefix in &prefixes {
                    let Some(route) =
                        AttributeRouteModel::combine(*prefix, action.attribute_route.as_ref())
                    else {
                        continue;
                    };
                    endpoints.push(Endpoint {
                        controller: controller.controller_name.clone(),
                        action: action.action_name.clone(),
                        http_methods: action.http_methods.clone(),
                        template: route.template,
                    });
                }
            }
        }
        endpoints
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(template: &str) -> AttributeRouteModel {
        AttributeRouteModel {
            template: Some(template.to_string()),
            ..AttributeRouteModel::default()
        }
    }

    #[test]
    fn test_combine_joins_relative_templates() {
        let combined =
            AttributeRouteModel::combine(Some(&route("api/products/")), Some(&route("/{id}")));
        // Leading slash makes the action absolute.
        assert_eq!(combined.unwrap().template.as_deref(), Some("/{id}"));

        let combined =
            AttributeRouteModel::combine(Some(&route("api/products/")), Some(&route("{id}")));
        assert_eq!(combined.unwrap().template.as_deref(), Some("api/products/{id}"));
    }

    #[test]
    fn test_combine_prefers_action_order_and_name() {
        let controller = AttributeRouteModel {
            template: Some("api".to_string()),
            order: Some(1),
            name: Some("c".to_string()),
        };
        let action = AttributeRouteModel {
            template: None,
            order: Some(5),
            name: None,
        };
        let combined = AttributeRouteModel::combine(Some(&controller), Some(&action)).unwrap();
        assert_eq!(combined.template.as_deref(), Some("api"));
        assert_eq!(combined.order, Some(5));
        assert_eq!(combined.name.as_deref(), Some("c"));
        assert!(AttributeRouteModel::combine(None, None).is_none());
    }

    #[test]
    fn test_detached_action() {
        let action = ActionModel::new(MethodDescriptor::new("index"), "index");
        assert!(action.controller().is_none());
        assert!(action.accepts_method("DELETE"));
    }

    #[test]
    fn test_api_explorer_from_attributes() {
        let attributes: Vec<Arc<dyn Attribute>> = vec![
            Arc::new(crate::ApiExplorerSettings::group("v2")),
            Arc::new(crate::ApiExplorerSettings::ignored()),
        ];
        let model = ApiExplorerModel::from_attributes(&attributes);
        assert_eq!(model.is_visible, Some(true));
        assert_eq!(model.group_name.as_deref(), Some("v2"));
        assert_eq!(ApiExplorerModel::from_attributes(&[]), ApiExplorerModel::default());
    }
}
