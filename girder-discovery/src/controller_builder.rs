//! Controller discovery.
//!
//! Classification is a pure function of a [`TypeDescriptor`]: a type is a
//! controller when no [`ControllerRejection`] reason applies. Eligible types
//! are turned into a [`ControllerModel`] with their attributes partitioned
//! by capability and their actions attached.

use crate::{
    ActionConstraint, ActionModel, ActionModelBuilder, ApiExplorerModel, AttributeRouteModel,
    ControllerActionFilter, ControllerModel, ControllerResultFilter, DefaultActionModelBuilder,
    FilterMetadata, RouteConstraintProvider, TypeCapabilities, TypeDescriptor,
};
use bitflags::bitflags;
use girder_core::{GirderOptions, Result};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

bitflags! {
    /// Why a type is not a controller. Several reasons can apply at once.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControllerRejection: u8 {
        /// Interfaces, structs and enums are never controllers.
        const NOT_CLASS = 1 << 0;
        const ABSTRACT = 1 << 1;
        const NOT_PUBLIC = 1 << 2;
        /// Declared inside another type.
        const NESTED = 1 << 3;
        /// Has unbound generic parameters.
        const OPEN_GENERIC = 1 << 4;
        /// Named exactly like a reserved base name.
        const RESERVED_NAME = 1 << 5;
        /// Neither carries the suffix nor derives from the base controller.
        const MISSING_SUFFIX = 1 << 6;
    }
}

/// Builds a controller model from a reflected type.
pub trait ControllerModelBuilder: Send + Sync {
    /// `Ok(None)` when the type is not a controller. Malformed attributes
    /// are errors.
    fn build_controller_model(
        &self,
        controller_type: &Arc<TypeDescriptor>,
    ) -> Result<Option<Arc<ControllerModel>>>;
}

/// Strip `suffix` from the end of `name`, ignoring ASCII case.
fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(suffix.len())?;
    if !name.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = name.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

/// Convention-based controller discovery.
pub struct DefaultControllerModelBuilder {
    controller_suffix: String,
    reserved_names: Vec<String>,
    suppress_implicit_filters: bool,
    action_builder: Arc<dyn ActionModelBuilder>,
}

impl DefaultControllerModelBuilder {
    pub fn new(options: &GirderOptions) -> Self {
        Self {
            controller_suffix: options.controller_suffix.clone(),
            reserved_names: options.reserved_controller_names.clone(),
            suppress_implicit_filters: options.suppress_implicit_controller_filters,
            action_builder: Arc::new(DefaultActionModelBuilder::new()),
        }
    }

    pub fn with_action_builder(mut self, action_builder: Arc<dyn ActionModelBuilder>) -> Self {
        self.action_builder = action_builder;
        self
    }

    /// Every reason `controller_type` is not a controller; empty when it is.
    pub fn classify(&self, controller_type: &TypeDescriptor) -> ControllerRejection {
        let mut rejection = ControllerRejection::empty();
        if !controller_type.is_class() {
            rejection |= ControllerRejection::NOT_CLASS;
        }
        if controller_type.is_abstract {
            rejection |= ControllerRejection::ABSTRACT;
        }
        if controller_type.visibility != crate::Visibility::Public {
            rejection |= ControllerRejection::NOT_PUBLIC;
        }
        if controller_type.declaring_type.is_some() {
            rejection |= ControllerRejection::NESTED;
        }
        if controller_type.is_open_generic() {
            rejection |= ControllerRejection::OPEN_GENERIC;
        }
        if self
            .reserved_names
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(&controller_type.name))
        {
            rejection |= ControllerRejection::RESERVED_NAME;
        }
        if strip_suffix_ignore_case(&controller_type.name, &self.controller_suffix).is_none()
            && !controller_type.has_capability(TypeCapabilities::CONTROLLER_BASE)
        {
            rejection |= ControllerRejection::MISSING_SUFFIX;
        }
        rejection
    }

    pub fn is_controller(&self, controller_type: &TypeDescriptor) -> bool {
        self.classify(controller_type).is_empty()
    }

    /// Type name without the controller suffix.
    pub fn controller_name(&self, controller_type: &TypeDescriptor) -> String {
        match strip_suffix_ignore_case(&controller_type.name, &self.controller_suffix) {
            Some(stripped) if !stripped.is_empty() => stripped.to_string(),
            _ => controller_type.name.clone(),
        }
    }

    fn implicit_filters(&self, controller_type: &TypeDescriptor) -> Vec<Arc<dyn FilterMetadata>> {
        let mut filters: Vec<Arc<dyn FilterMetadata>> = Vec::new();
        if self.suppress_implicit_filters {
            return filters;
        }
        if controller_type.has_capability(TypeCapabilities::ACTION_FILTER) {
            filters.push(Arc::new(ControllerActionFilter));
        }
        if controller_type.has_capability(TypeCapabilities::RESULT_FILTER) {
            filters.push(Arc::new(ControllerResultFilter));
        }
        filters
    }
}

impl Default for DefaultControllerModelBuilder {
    fn default() -> Self {
        Self::new(&GirderOptions::default())
    }
}

impl ControllerModelBuilder for DefaultControllerModelBuilder {
    fn build_controller_model(
        &self,
        controller_type: &Arc<TypeDescriptor>,
    ) -> Result<Option<Arc<ControllerModel>>> {
        let rejection = self.classify(controller_type);
        if !rejection.is_empty() {
            trace!(
                type_name = %controller_type,
                rejection = ?rejection,
                "type is not a controller"
            );
            return Ok(None);
        }

        let attributes = controller_type.custom_attributes()?;

        let action_constraints: Vec<Arc<dyn ActionConstraint>> = attributes
            .iter()
            .filter_map(|a| Arc::clone(a).as_action_constraint())
            .collect();
        let mut filters: Vec<Arc<dyn FilterMetadata>> = attributes
            .iter()
            .filter_map(|a| Arc::clone(a).as_filter())
            .collect();
        let route_constraints: Vec<Arc<dyn RouteConstraintProvider>> = attributes
            .iter()
            .filter_map(|a| Arc::clone(a).as_route_constraint())
            .collect();
        let attribute_routes: Vec<AttributeRouteModel> = attributes
            .iter()
            .filter_map(|a| Arc::clone(a).as_route_template())
            .map(|provider| AttributeRouteModel::from_provider(provider.as_ref()))
            .collect();
        let api_explorer = ApiExplorerModel::from_attributes(&attributes);
        filters.extend(self.implicit_filters(controller_type));

        let mut actions: Vec<ActionModel> = Vec::new();
        for method in &controller_type.methods {
            actions.extend(
                self.action_builder
                    .build_action_models(controller_type, method)?,
            );
        }

        let controller_name = self.controller_name(controller_type);
        let model = Arc::new_cyclic(|controller: &Weak<ControllerModel>| {
            let actions = actions
                .into_iter()
                .map(|mut action| {
                    action.controller = controller.clone();
                    Arc::new(action)
                })
                .collect();
            ControllerModel {
                controller_type: Arc::clone(controller_type),
                controller_name,
                attributes,
                action_constraints,
                filters,
                route_constraints,
                attribute_routes,
                api_explorer,
                actions,
            }
        });

        debug!(
            controller = %model.controller_name,
            type_name = %controller_type,
            actions = model.actions.len(),
            filters = model.filters.len(),
            "built controller model"
        );
        Ok(Some(model))
    }
}
