// Controller discovery for the Girder framework
// Builds the immutable application model from reflected type descriptions

pub mod action_builder;
pub mod application_model;
pub mod attributes;
pub mod controller_builder;
pub mod discovery;
pub mod filters;
pub mod reflection;

pub use action_builder::*;
pub use application_model::*;
pub use attributes::*;
pub use controller_builder::*;
pub use discovery::*;
pub use filters::*;
pub use reflection::*;

// Used by `register_type!`.
#[doc(hidden)]
pub use inventory;
