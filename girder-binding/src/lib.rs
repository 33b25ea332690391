// Model binding for the Girder framework
// Turns request payloads and values into typed action arguments

pub mod binder;
pub mod body;
pub mod context;
pub mod formatter;
pub mod metadata;
pub mod model_state;
pub mod selector;
pub mod services;
pub mod value_provider;

pub use binder::*;
pub use body::BodyModelBinder;
pub use context::*;
pub use formatter::*;
pub use metadata::*;
pub use model_state::*;
pub use selector::*;
pub use services::*;
pub use value_provider::*;
