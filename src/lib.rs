// Girder - the request model layer of a web framework
//
// Binds action arguments from request bodies through pluggable input
// formatters, and discovers controllers and actions from type descriptions.

//! # Girder
//!
//! ```
//! use girder::prelude::*;
//! use serde::Deserialize;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Deserialize, PartialEq)]
//! struct Person {
//!     name: String,
//! }
//!
//! # tokio_test::block_on(async {
//! let services = BindingServices::builder().build().unwrap();
//! let body = serde_json::to_vec(&serde_json::json!({ "name": "Ada" })).unwrap();
//! let request = HttpRequest::new("POST", "/people")
//!     .with_content_type("application/json")
//!     .with_body(body);
//!
//! let operation = services.operation_context(Arc::new(request));
//! let mut state = services.new_model_state();
//! let outcome = services
//!     .bind_parameter(
//!         &operation,
//!         "person",
//!         &ModelType::of::<Person>(),
//!         Some(Arc::new(FromBody)),
//!         &mut state,
//!     )
//!     .await;
//!
//! assert!(state.is_valid());
//! let person = outcome.model.unwrap().downcast::<Person>().unwrap();
//! assert_eq!(person.name, "Ada");
//! # });
//! ```

// Re-export core functionality
pub use girder_core::*;

pub use girder_binding as binding;

#[cfg(feature = "discovery")]
pub use girder_discovery as discovery;

// Prelude for common imports
pub mod prelude {
    pub use async_trait::async_trait;

    pub use crate::binding::{
        BindingOutcome, BindingResult, BindingServices, BodyModelBinder, InputFormatter,
        InputFormatterContext, ModelBinder, ModelBindingContext, ModelMetadata,
        ModelStateDictionary, OperationBindingContext,
    };
    pub use crate::{
        BoundModel, Error, FromBody, FromHeader, FromQuery, FromRoute, GirderOptions, HttpRequest,
        HttpResponse, MediaType, ModelType, Result,
    };

    #[cfg(feature = "discovery")]
    pub use crate::discovery::{
        ApplicationModel, ApplicationModelBuilder, ControllerModelBuilder, HttpMethodAttribute,
        MethodDescriptor, ParameterDescriptor, RouteAttribute, TypeCapabilities, TypeCatalog,
        TypeDescriptor, register_type,
    };
}
