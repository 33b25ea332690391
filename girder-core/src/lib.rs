// Core library for the Girder framework
// Shared request handles, media types, bind-target descriptors, configuration and logging

pub mod error;
pub mod http;
pub mod logging;
pub mod media_type;
pub mod model;
pub mod options;

// Re-export commonly used types
pub use error::*;
pub use http::*;
pub use media_type::MediaType;
pub use model::*;
pub use options::GirderOptions;
