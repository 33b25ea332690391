//! Action discovery: turns a controller method into zero or more
//! [`ActionModel`]s.

use crate::{
    ActionModel, ApiExplorerModel, Attribute, AttributeRouteModel, HttpMethodConstraint,
    MethodDescriptor, ParameterModel, TypeDescriptor,
};
use girder_core::Result;
use std::sync::Arc;
use tracing::trace;

/// Builds the action models for one method.
///
/// Must be deterministic and free of side effects. An empty result means
/// the method is not an action. The returned models are not yet attached
/// to a controller.
pub trait ActionModelBuilder: Send + Sync {
    fn build_action_models(
        &self,
        controller_type: &TypeDescriptor,
        method: &MethodDescriptor,
    ) -> Result<Vec<ActionModel>>;
}

/// Convention-based action discovery.
///
/// A method is an action when it is public, an instance method, not
/// generic, not a special-name accessor, not inherited from the root object
/// type, and not marked [`NonAction`](crate::NonAction). Each attribute
/// route produces one action model; a method without attribute routes
/// produces a single conventionally routed model.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultActionModelBuilder;

impl DefaultActionModelBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Shape checks that need no attributes.
    pub fn is_action_candidate(method: &MethodDescriptor) -> bool {
        method.is_public()
            && !method.is_static
            && !method.is_generic()
            && !method.is_special_name
            && !method.inherited_from_root
    }

    fn parameters(method: &MethodDescriptor) -> Result<Vec<ParameterModel>> {
        method
            .parameters
            .iter()
            .map(|parameter| {
                let attributes = parameter.custom_attributes(&method.name)?;
                let binder_metadata = attributes
                    .iter()
                    .find_map(|a| Arc::clone(a).as_binder_metadata());
                Ok(ParameterModel {
                    name: parameter.name.clone(),
                    model_type: parameter.model_type.clone(),
                    attributes,
                    binder_metadata,
                    is_optional: parameter.is_optional,
                })
            })
            .collect()
    }
}

fn push_unique(methods: &mut Vec<String>, method: &str) {
    if !methods.iter().any(|m| m.eq_ignore_ascii_case(method)) {
        methods.push(method.to_ascii_uppercase());
    }
}

impl ActionModelBuilder for DefaultActionModelBuilder {
    fn build_action_models(
        &self,
        controller_type: &TypeDescriptor,
        method: &MethodDescriptor,
    ) -> Result<Vec<ActionModel>> {
        if !Self::is_action_candidate(method) {
            trace!(method = %method.name, "method is not an action candidate");
            return Ok(Vec::new());
        }

        let attributes = method.custom_attributes(controller_type)?;
        if attributes.iter().any(|a| a.is_non_action()) {
            trace!(method = %method.name, "method excluded by NonAction");
            return Ok(Vec::new());
        }

        let action_name = attributes
            .iter()
            .find_map(|a| a.as_action_name())
            .unwrap_or(method.name.as_str())
            .to_string();
        let parameters = Self::parameters(method)?;
        let api_explorer = ApiExplorerModel::from_attributes(&attributes);

        let filters: Vec<_> = attributes
            .iter()
            .filter_map(|a| Arc::clone(a).as_filter())
            .collect();
        let action_constraints: Vec<_> = attributes
            .iter()
            .filter_map(|a| Arc::clone(a).as_action_constraint())
            .collect();
        let route_constraints: Vec<_> = attributes
            .iter()
            .filter_map(|a| Arc::clone(a).as_route_constraint())
            .collect();

        // Route-defining attributes carry their own verbs; template-less verb
        // attributes apply to the plain routes.
        let mut routes: Vec<(AttributeRouteModel, Option<&[String]>)> = Vec::new();
        let mut unrouted_methods: Vec<String> = Vec::new();
        for attribute in &attributes {
            match Arc::clone(attribute).as_route_template() {
                Some(provider) => routes.push((
                    AttributeRouteModel::from_provider(provider.as_ref()),
                    attribute.as_http_methods(),
                )),
                None => {
                    for verb in attribute.as_http_methods().unwrap_or_default() {
                        push_unique(&mut unrouted_methods, verb);
                    }
                }
            }
        }

        let selectors: Vec<(Option<AttributeRouteModel>, Vec<String>)> = if routes.is_empty() {
            vec![(None, unrouted_methods)]
        } else {
            routes
                .into_iter()
                .map(|(route, own_methods)| {
                    let methods = match own_methods {
                        Some(own) => {
                            let mut methods = Vec::new();
                            for verb in own {
                                push_unique(&mut methods, verb);
                            }
                            methods
                        }
                        None => unrouted_methods.clone(),
                    };
                    (Some(route), methods)
                })
                .collect()
        };

        let models = selectors
            .into_iter()
            .map(|(attribute_route, http_methods)| {
                let mut constraints = action_constraints.clone();
                if !http_methods.is_empty() {
                    constraints.push(Arc::new(HttpMethodConstraint::new(http_methods.clone())));
                }
                let mut model = ActionModel::new(method.clone(), action_name.clone());
                model.attributes = attributes.clone();
                model.filters = filters.clone();
                model.action_constraints = constraints;
                model.route_constraints = route_constraints.clone();
                model.attribute_route = attribute_route;
                model.http_methods = http_methods;
                model.parameters = parameters.clone();
                model.api_explorer = api_explorer.clone();
                model
            })
            .collect::<Vec<_>>();

        trace!(
            method = %method.name,
            action = %action_name,
            count = models.len(),
            "built action models"
        );
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ActionName, BindAttribute, HttpMethodAttribute, NonAction, ParameterDescriptor,
        RouteAttribute, Visibility,
    };
    use girder_core::{BindingSource, Error, FromBody, ModelType};

    fn controller() -> TypeDescriptor {
        TypeDescriptor::class("ProductsController")
    }

    fn build(method: MethodDescriptor) -> Vec<ActionModel> {
        DefaultActionModelBuilder
            .build_action_models(&controller(), &method)
            .unwrap()
    }

    #[test]
    fn test_non_actions_yield_nothing() {
        assert!(build(MethodDescriptor::new("helper").visibility(Visibility::Private)).is_empty());
        assert!(build(MethodDescriptor::new("create").static_method()).is_empty());
        assert!(build(MethodDescriptor::new("map").generic_parameter("T")).is_empty());
        assert!(build(MethodDescriptor::new("get_name").special_name()).is_empty());
        assert!(build(MethodDescriptor::new("clone").inherited_from_root()).is_empty());
        assert!(build(MethodDescriptor::new("reset").attribute(NonAction)).is_empty());
    }

    #[test]
    fn test_conventional_action_collects_all_verbs() {
        let models = build(
            MethodDescriptor::new("save")
                .attribute(HttpMethodAttribute::post())
                .attribute(HttpMethodAttribute::put())
                .attribute(HttpMethodAttribute::new(["post"])),
        );
        assert_eq!(models.len(), 1);
        let model = &models[0];
        assert_eq!(model.action_name, "save");
        assert!(model.attribute_route.is_none());
        assert_eq!(model.http_methods, vec!["POST", "PUT"]);
        assert_eq!(model.action_constraints.len(), 1);
        assert!(model.controller().is_none());
    }

    #[test]
    fn test_one_model_per_attribute_route() {
        let models = build(
            MethodDescriptor::new("list")
                .attribute(HttpMethodAttribute::get().with_template("products"))
                .attribute(RouteAttribute::new("items").with_name("items"))
                .attribute(HttpMethodAttribute::head()),
        );
        assert_eq!(models.len(), 2);

        assert_eq!(
            models[0].attribute_route.as_ref().unwrap().template.as_deref(),
            Some("products")
        );
        assert_eq!(models[0].http_methods, vec!["GET"]);

        let plain = models[1].attribute_route.as_ref().unwrap();
        assert_eq!(plain.template.as_deref(), Some("items"));
        assert_eq!(plain.name.as_deref(), Some("items"));
        assert_eq!(models[1].http_methods, vec!["HEAD"]);
    }

    #[test]
    fn test_action_name_override_and_parameters() {
        let models = build(
            MethodDescriptor::new("create_product")
                .attribute(ActionName::new("Create"))
                .parameter(
                    ParameterDescriptor::new("product", ModelType::of::<String>())
                        .attribute(BindAttribute::new(FromBody)),
                )
                .parameter(ParameterDescriptor::new("dry_run", ModelType::of::<bool>()).optional()),
        );
        let model = &models[0];
        assert_eq!(model.action_name, "Create");
        assert_eq!(model.parameters.len(), 2);
        assert_eq!(model.parameters[0].binding_source(), Some(BindingSource::Body));
        assert!(model.parameters[1].binding_source().is_none());
        assert!(model.parameters[1].is_optional);
        assert!(model.accepts_method("PATCH"));
    }

    #[test]
    fn test_malformed_method_attribute_propagates() {
        let result = DefaultActionModelBuilder.build_action_models(
            &controller(),
            &MethodDescriptor::new("broken").attribute(RouteAttribute::new("{")),
        );
        assert!(matches!(result, Err(Error::InvalidAttribute { .. })));
    }
}
