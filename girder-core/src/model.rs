//! Bind-target descriptors and binder-selection markers.
//!
//! There is no runtime reflection to ask "what type should this request
//! body become", so a bind target is described by a [`ModelType`]: the
//! target's `TypeId`, its name, and the decoders formatters use to
//! materialize it. Bound values travel type-erased as [`BoundModel`].
//!
//! [`BinderMetadata`] is the opaque marker that decides which binder in a
//! chain claims a target. The built-in markers mirror the usual sources:
//! [`FromBody`], [`FromQuery`], [`FromRoute`], [`FromHeader`] and
//! [`FromForm`].

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

// ============================================================================
// Model Type
// ============================================================================

/// Decodes raw payloads into a type-erased model.
trait ModelDecoder: Send + Sync {
    fn from_json(&self, bytes: &[u8]) -> Result<BoundModel>;
    fn from_form(&self, bytes: &[u8]) -> Result<BoundModel>;
    fn from_raw(&self, raw: &str) -> Result<BoundModel>;
}

struct SerdeDecoder<T>(PhantomData<fn() -> T>);

impl<T> ModelDecoder for SerdeDecoder<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn from_json(&self, bytes: &[u8]) -> Result<BoundModel> {
        serde_json::from_slice::<T>(bytes)
            .map(BoundModel::new)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }

    fn from_form(&self, bytes: &[u8]) -> Result<BoundModel> {
        serde_urlencoded::from_bytes::<T>(bytes)
            .map(BoundModel::new)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }

    fn from_raw(&self, raw: &str) -> Result<BoundModel> {
        // Numbers and booleans parse as JSON literals; anything else is
        // treated as a bare string.
        serde_json::from_str::<T>(raw)
            .or_else(|_| serde_json::from_value::<T>(serde_json::Value::String(raw.to_string())))
            .map(BoundModel::new)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Describes the type a binder should materialize.
#[derive(Clone)]
pub struct ModelType {
    id: TypeId,
    name: &'static str,
    decoder: Option<Arc<dyn ModelDecoder>>,
}

impl ModelType {
    /// Describe a deserializable type.
    pub fn of<T>() -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            decoder: Some(Arc::new(SerdeDecoder::<T>(PhantomData))),
        }
    }

    /// Describe a type that formatters cannot produce (services, handles).
    pub fn opaque<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            decoder: None,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Short name without the module path, e.g. `Person`.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }

    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Whether payload decoders exist for this type.
    pub fn is_decodable(&self) -> bool {
        self.decoder.is_some()
    }

    fn decoder(&self) -> Result<&dyn ModelDecoder> {
        self.decoder.as_deref().ok_or_else(|| {
            Error::Deserialization(format!("type '{}' cannot be read from a request", self.name))
        })
    }

    pub fn decode_json(&self, bytes: &[u8]) -> Result<BoundModel> {
        self.decoder()?.from_json(bytes)
    }

    pub fn decode_form(&self, bytes: &[u8]) -> Result<BoundModel> {
        self.decoder()?.from_form(bytes)
    }

    pub fn decode_raw(&self, raw: &str) -> Result<BoundModel> {
        self.decoder()?.from_raw(raw)
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModelType {}

impl Hash for ModelType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelType").field(&self.name).finish()
    }
}

// ============================================================================
// Bound Model
// ============================================================================

/// A type-erased model value produced by a binder.
pub struct BoundModel {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl BoundModel {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take the value out, or get `self` back if the type does not match.
    pub fn downcast<T: Any>(self) -> std::result::Result<T, Self> {
        let type_name = self.type_name;
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Self { value, type_name }),
        }
    }
}

impl fmt::Debug for BoundModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoundModel").field(&self.type_name).finish()
    }
}

// ============================================================================
// Binder Selection Metadata
// ============================================================================

/// Where a binder should look for a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingSource {
    Body,
    Query,
    Route,
    Header,
    Form,
    Custom(String),
}

impl BindingSource {
    pub fn is_body(&self) -> bool {
        matches!(self, BindingSource::Body)
    }

    pub fn display_name(&self) -> &str {
        match self {
            BindingSource::Body => "Body",
            BindingSource::Query => "Query",
            BindingSource::Route => "Route",
            BindingSource::Header => "Header",
            BindingSource::Form => "Form",
            BindingSource::Custom(name) => name,
        }
    }
}

/// Marker capability that selects a binder for a target.
pub trait BinderMetadata: Send + Sync + fmt::Debug {
    fn binding_source(&self) -> BindingSource;

    /// Overrides the key a value is looked up under.
    fn binder_model_name(&self) -> Option<&str> {
        None
    }
}

/// Bind the target from the request body through an input formatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FromBody;

impl BinderMetadata for FromBody {
    fn binding_source(&self) -> BindingSource {
        BindingSource::Body
    }
}

/// Bind the target from the form body.
#[derive(Debug, Clone, Copy, Default)]
pub struct FromForm;

impl BinderMetadata for FromForm {
    fn binding_source(&self) -> BindingSource {
        BindingSource::Form
    }
}

macro_rules! keyed_marker {
    ($(#[$doc:meta])* $name:ident, $source:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default)]
        pub struct $name {
            pub name: Option<String>,
        }

        impl $name {
            pub fn new() -> Self {
                Self::default()
            }

            /// Look the value up under `name` instead of the model name.
            pub fn named(name: impl Into<String>) -> Self {
                Self {
                    name: Some(name.into()),
                }
            }
        }

        impl BinderMetadata for $name {
            fn binding_source(&self) -> BindingSource {
                $source
            }

            fn binder_model_name(&self) -> Option<&str> {
                self.name.as_deref()
            }
        }
    };
}

keyed_marker!(
    /// Bind the target from the query string.
    FromQuery,
    BindingSource::Query
);
keyed_marker!(
    /// Bind the target from route values.
    FromRoute,
    BindingSource::Route
);
keyed_marker!(
    /// Bind the target from a request header.
    FromHeader,
    BindingSource::Header
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Person {
        name: String,
        age: Option<u32>,
    }

    #[test]
    fn test_decode_json() {
        let ty = ModelType::of::<Person>();
        let model = ty.decode_json(br#"{"name":"Ada","age":36}"#).unwrap();
        assert_eq!(
            model.downcast_ref::<Person>(),
            Some(&Person {
                name: "Ada".into(),
                age: Some(36)
            })
        );
    }

    #[test]
    fn test_decode_form() {
        let ty = ModelType::of::<Person>();
        let model = ty.decode_form(b"name=Grace").unwrap();
        assert_eq!(model.downcast::<Person>().unwrap().name, "Grace");
    }

    #[test]
    fn test_decode_raw_values() {
        assert_eq!(
            ModelType::of::<u32>().decode_raw("42").unwrap().downcast::<u32>().unwrap(),
            42
        );
        assert_eq!(
            ModelType::of::<String>()
                .decode_raw("hello")
                .unwrap()
                .downcast::<String>()
                .unwrap(),
            "hello"
        );
        assert!(ModelType::of::<u32>().decode_raw("forty-two").is_err());
    }

    #[test]
    fn test_opaque_type_cannot_decode() {
        struct Service;
        let ty = ModelType::opaque::<Service>();
        assert!(!ty.is_decodable());
        assert!(matches!(ty.decode_json(b"{}"), Err(Error::Deserialization(_))));
    }

    #[test]
    fn test_model_type_identity() {
        assert_eq!(ModelType::of::<Person>(), ModelType::of::<Person>());
        assert_ne!(ModelType::of::<Person>(), ModelType::of::<String>());
        assert!(ModelType::of::<Person>().is::<Person>());
        assert_eq!(ModelType::of::<Person>().short_name(), "Person");
    }

    #[test]
    fn test_downcast_mismatch_returns_model() {
        let model = BoundModel::new(7u8);
        let model = model.downcast::<String>().unwrap_err();
        assert!(model.is::<u8>());
        assert_eq!(model.type_name(), "u8");
    }

    #[test]
    fn test_markers() {
        assert!(FromBody.binding_source().is_body());
        assert!(!FromForm.binding_source().is_body());
        assert_eq!(FromQuery::named("q").binder_model_name(), Some("q"));
        assert_eq!(FromRoute::new().binder_model_name(), None);
        assert_eq!(FromHeader::new().binding_source(), BindingSource::Header);
    }
}
