//! Model metadata: what the binding layer knows about a bind target.
//!
//! Metadata is produced by a [`ModelMetadataProvider`] and cached per
//! `(container type, model type)`. The provider is populated at startup and
//! read concurrently afterwards.

use girder_core::{BinderMetadata, BindingSource, ModelType};
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Describes one bind target (a type, a property, or a parameter).
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    /// Type declaring the property, when this describes a property.
    pub container_type: Option<ModelType>,
    pub model_type: ModelType,
    pub property_name: Option<String>,
    /// Marker selecting which binder claims this target.
    pub binder_metadata: Option<Arc<dyn BinderMetadata>>,
    /// Key override for value lookups.
    pub binder_model_name: Option<String>,
    pub exclude_from_validation: bool,
    pub is_required: bool,
}

impl ModelMetadata {
    pub fn for_type(model_type: ModelType) -> Self {
        Self {
            container_type: None,
            model_type,
            property_name: None,
            binder_metadata: None,
            binder_model_name: None,
            exclude_from_validation: false,
            is_required: false,
        }
    }

    pub fn with_binder_metadata(mut self, metadata: impl BinderMetadata + 'static) -> Self {
        self.set_binder_metadata(Arc::new(metadata));
        self
    }

    pub fn with_binder_metadata_arc(mut self, metadata: Arc<dyn BinderMetadata>) -> Self {
        self.set_binder_metadata(metadata);
        self
    }

    fn set_binder_metadata(&mut self, metadata: Arc<dyn BinderMetadata>) {
        if let Some(name) = metadata.binder_model_name() {
            self.binder_model_name = Some(name.to_string());
        }
        self.binder_metadata = Some(metadata);
    }

    pub fn excluded_from_validation(mut self) -> Self {
        self.exclude_from_validation = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    /// Source declared by the binder marker, if any.
    pub fn binding_source(&self) -> Option<BindingSource> {
        self.binder_metadata.as_ref().map(|m| m.binding_source())
    }

    /// Whether the target opts into body binding.
    pub fn is_from_body(&self) -> bool {
        self.binding_source().is_some_and(|source| source.is_body())
    }
}

/// Produces metadata for bind targets.
pub trait ModelMetadataProvider: Send + Sync {
    /// Deterministic for a given `(container_type, model_type)`.
    fn metadata_for_type(
        &self,
        container_type: Option<&ModelType>,
        model_type: &ModelType,
    ) -> Arc<ModelMetadata>;

    /// Metadata for a property of `container_type`.
    fn metadata_for_property(
        &self,
        container_type: &ModelType,
        model_type: &ModelType,
        property_name: &str,
    ) -> Arc<ModelMetadata> {
        let mut metadata = (*self.metadata_for_type(Some(container_type), model_type)).clone();
        metadata.property_name = Some(property_name.to_string());
        Arc::new(metadata)
    }

    /// Metadata for an action parameter; a parameter-level marker wins over
    /// one registered for the type.
    fn metadata_for_parameter(
        &self,
        model_type: &ModelType,
        binder_metadata: Option<Arc<dyn BinderMetadata>>,
    ) -> Arc<ModelMetadata> {
        let base = self.metadata_for_type(None, model_type);
        match binder_metadata {
            Some(marker) => Arc::new((*base).clone().with_binder_metadata_arc(marker)),
            None => base,
        }
    }
}

type Configure = Arc<dyn Fn(ModelMetadata) -> ModelMetadata + Send + Sync>;

/// Metadata provider backed by per-type registrations.
///
/// Unregistered types get plain metadata with no binder marker.
#[derive(Default)]
pub struct DefaultModelMetadataProvider {
    registrations: HashMap<TypeId, Configure>,
    cache: RwLock<HashMap<(Option<TypeId>, TypeId), Arc<ModelMetadata>>>,
}

impl DefaultModelMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register how metadata for `model_type` is shaped.
    ///
    /// ```
    /// use girder_binding::{DefaultModelMetadataProvider, ModelMetadataProvider};
    /// use girder_core::{FromBody, ModelType};
    ///
    /// #[derive(serde::Deserialize)]
    /// struct Order { id: u64 }
    ///
    /// let mut provider = DefaultModelMetadataProvider::new();
    /// provider.register(ModelType::of::<Order>(), |m| m.with_binder_metadata(FromBody));
    ///
    /// let metadata = provider.metadata_for_type(None, &ModelType::of::<Order>());
    /// assert!(metadata.is_from_body());
    /// ```
    pub fn register<F>(&mut self, model_type: ModelType, configure: F) -> &mut Self
    where
        F: Fn(ModelMetadata) -> ModelMetadata + Send + Sync + 'static,
    {
        self.registrations
            .insert(model_type.type_id(), Arc::new(configure));
        self.cache.get_mut().clear();
        self
    }

    /// Number of cached metadata entries.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    fn create(&self, container_type: Option<&ModelType>, model_type: &ModelType) -> ModelMetadata {
        let mut metadata = ModelMetadata::for_type(model_type.clone());
        metadata.container_type = container_type.cloned();
        match self.registrations.get(&model_type.type_id()) {
            Some(configure) => configure(metadata),
            None => metadata,
        }
    }
}

impl ModelMetadataProvider for DefaultModelMetadataProvider {
    fn metadata_for_type(
        &self,
        container_type: Option<&ModelType>,
        model_type: &ModelType,
    ) -> Arc<ModelMetadata> {
        let key = (container_type.map(ModelType::type_id), model_type.type_id());

        if let Some(metadata) = self.cache.read().get(&key) {
            return Arc::clone(metadata);
        }

        let created = Arc::new(self.create(container_type, model_type));
        Arc::clone(self.cache.write().entry(key).or_insert(created))
    }
}
