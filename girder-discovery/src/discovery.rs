//! Startup discovery: a catalog of candidate types and the builder that
//! turns it into an [`ApplicationModel`].
//!
//! Types reach the catalog either by explicit registration or through
//! [`register_type!`](crate::register_type), which submits a
//! [`TypeRegistration`] to `inventory` at link time.

use crate::{ApplicationModel, ControllerModelBuilder, DefaultControllerModelBuilder, TypeDescriptor};
use girder_core::{Error, GirderOptions, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// A link-time registered type description.
pub struct TypeRegistration {
    /// Registering crate, for diagnostics.
    pub origin: &'static str,
    pub describe: fn() -> TypeDescriptor,
}

inventory::collect!(TypeRegistration);

impl TypeRegistration {
    pub const fn new(origin: &'static str, describe: fn() -> TypeDescriptor) -> Self {
        Self { origin, describe }
    }
}

/// Register a type description for discovery.
///
/// ```ignore
/// fn products() -> TypeDescriptor {
///     TypeDescriptor::class("ProductsController").in_module(module_path!())
/// }
///
/// girder_discovery::register_type!(products);
/// ```
#[macro_export]
macro_rules! register_type {
    ($describe:path) => {
        $crate::inventory::submit! {
            $crate::TypeRegistration::new(module_path!(), $describe)
        }
    };
}

/// Candidate types in registration order.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    types: Vec<Arc<TypeDescriptor>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding every `register_type!` submission.
    pub fn from_registry() -> Self {
        Self::new().with_registered()
    }

    /// Append every `register_type!` submission.
    pub fn with_registered(mut self) -> Self {
        for registration in inventory::iter::<TypeRegistration> {
            let descriptor = (registration.describe)();
            debug!(
                type_name = %descriptor,
                origin = registration.origin,
                "collected registered type"
            );
            self.types.push(Arc::new(descriptor));
        }
        self
    }

    pub fn register(&mut self, descriptor: TypeDescriptor) -> &mut Self {
        self.types.push(Arc::new(descriptor));
        self
    }

    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn types(&self) -> &[Arc<TypeDescriptor>] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Runs controller discovery over a [`TypeCatalog`].
pub struct ApplicationModelBuilder {
    controller_builder: Arc<dyn ControllerModelBuilder>,
}

impl ApplicationModelBuilder {
    pub fn new(options: &GirderOptions) -> Self {
        Self {
            controller_builder: Arc::new(DefaultControllerModelBuilder::new(options)),
        }
    }

    pub fn with_controller_builder(mut self, builder: Arc<dyn ControllerModelBuilder>) -> Self {
        self.controller_builder = builder;
        self
    }

    /// Build the application model. The first discovery error aborts the
    /// build, as does a type registered twice under the same full name.
    pub fn build(&self, catalog: &TypeCatalog) -> Result<ApplicationModel> {
        let mut seen = HashSet::new();
        let mut controllers = Vec::new();

        for descriptor in catalog.types() {
            let full_name = descriptor.full_name();
            if !seen.insert(full_name.clone()) {
                return Err(Error::Discovery(format!(
                    "type '{}' is registered more than once",
                    full_name
                )));
            }
            if let Some(controller) = self.controller_builder.build_controller_model(descriptor)? {
                controllers.push(controller);
            }
        }

        let model = ApplicationModel::new(controllers);
        info!(
            types = catalog.len(),
            controllers = model.controllers().len(),
            actions = model.actions().count(),
            "application model built"
        );
        Ok(model)
    }
}

impl Default for ApplicationModelBuilder {
    fn default() -> Self {
        Self::new(&GirderOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpMethodAttribute, MethodDescriptor, RouteAttribute};

    fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with_type(
                TypeDescriptor::class("ProductsController")
                    .in_module("shop")
                    .attribute(RouteAttribute::new("api/products"))
                    .method(MethodDescriptor::new("list").attribute(HttpMethodAttribute::get()))
                    .method(
                        MethodDescriptor::new("detail")
                            .attribute(HttpMethodAttribute::get().with_template("{id}")),
                    ),
            )
            .with_type(TypeDescriptor::class("PriceCalculator").in_module("shop"))
            .with_type(
                TypeDescriptor::class("OrdersController")
                    .in_module("shop")
                    .method(MethodDescriptor::new("place").attribute(HttpMethodAttribute::post())),
            )
    }

    #[test]
    fn test_builds_controllers_in_catalog_order() {
        let model = ApplicationModelBuilder::default().build(&catalog()).unwrap();
        let names: Vec<_> = model
            .controllers()
            .iter()
            .map(|c| c.controller_name.as_str())
            .collect();
        assert_eq!(names, vec!["Products", "Orders"]);
        assert_eq!(model.actions().count(), 3);
        assert!(model.controller("products").is_some());
        assert!(model.controller("PriceCalculator").is_none());
    }

    #[test]
    fn test_endpoints_combine_routes() {
        let model = ApplicationModelBuilder::default().build(&catalog()).unwrap();
        let endpoints = model.endpoints();
        let products: Vec<_> = endpoints
            .iter()
            .filter(|e| e.controller == "Products")
            .map(|e| (e.action.as_str(), e.template.as_deref()))
            .collect();
        assert_eq!(
            products,
            vec![
                ("list", Some("api/products")),
                ("detail", Some("api/products/{id}")),
            ]
        );
        assert!(endpoints.iter().all(|e| e.controller != "Orders"));
    }

    #[test]
    fn test_duplicate_registration_is_discovery_error() {
        let catalog = TypeCatalog::new()
            .with_type(TypeDescriptor::class("HomeController"))
            .with_type(TypeDescriptor::class("HomeController"));
        assert!(matches!(
            ApplicationModelBuilder::default().build(&catalog),
            Err(Error::Discovery(_))
        ));
    }

    #[test]
    fn test_empty_catalog() {
        let model = ApplicationModelBuilder::default()
            .build(&TypeCatalog::new())
            .unwrap();
        assert!(model.is_empty());
    }
}
