//! Value providers expose keyed request values (query string, route values,
//! headers) to binders that bind one value at a time. Body binding does not
//! use them.

use girder_core::{BindingSource, HttpRequest};
use std::collections::HashMap;
use std::sync::Arc;

/// Raw values found for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueProviderResult {
    pub values: Vec<String>,
}

impl ValueProviderResult {
    pub fn single(value: impl Into<String>) -> Self {
        Self {
            values: vec![value.into()],
        }
    }

    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

pub trait ValueProvider: Send + Sync {
    /// Whether any key equals `prefix` or starts with `prefix.` / `prefix[`.
    /// The empty prefix matches any non-empty provider.
    fn contains_prefix(&self, prefix: &str) -> bool;

    fn get_value(&self, key: &str) -> Option<ValueProviderResult>;

    /// Source this provider reads from; `None` for aggregates.
    fn binding_source(&self) -> Option<BindingSource> {
        None
    }

    /// Look `key` up only among providers reading from `source`.
    fn get_value_from(&self, source: &BindingSource, key: &str) -> Option<ValueProviderResult> {
        if self.binding_source().as_ref() == Some(source) {
            self.get_value(key)
        } else {
            None
        }
    }
}

/// A provider over a flat string map.
#[derive(Debug, Clone)]
pub struct DictionaryValueProvider {
    source: BindingSource,
    values: HashMap<String, String>,
    case_insensitive: bool,
}

impl DictionaryValueProvider {
    pub fn new(source: BindingSource, values: HashMap<String, String>) -> Self {
        Self {
            source,
            values,
            case_insensitive: false,
        }
    }

    pub fn query(request: &HttpRequest) -> Self {
        Self::new(BindingSource::Query, request.query_params.clone())
    }

    pub fn route(request: &HttpRequest) -> Self {
        Self::new(BindingSource::Route, request.path_params.clone())
    }

    /// Header names are matched case-insensitively.
    pub fn headers(request: &HttpRequest) -> Self {
        Self {
            source: BindingSource::Header,
            values: request.headers.clone(),
            case_insensitive: true,
        }
    }

    fn normalize<'k>(&self, key: &'k str) -> std::borrow::Cow<'k, str> {
        if self.case_insensitive {
            std::borrow::Cow::Owned(key.to_ascii_lowercase())
        } else {
            std::borrow::Cow::Borrowed(key)
        }
    }
}

impl ValueProvider for DictionaryValueProvider {
    fn contains_prefix(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return !self.values.is_empty();
        }
        let prefix = self.normalize(prefix);
        self.values.keys().any(|key| {
            key == &*prefix
                || key
                    .strip_prefix(&*prefix)
                    .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
        })
    }

    fn get_value(&self, key: &str) -> Option<ValueProviderResult> {
        self.values
            .get(&*self.normalize(key))
            .map(|value| ValueProviderResult::single(value.clone()))
    }

    fn binding_source(&self) -> Option<BindingSource> {
        Some(self.source.clone())
    }
}

/// Consults providers in order; the first hit wins.
#[derive(Clone, Default)]
pub struct CompositeValueProvider {
    providers: Vec<Arc<dyn ValueProvider>>,
}

impl CompositeValueProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route values, then query string, then headers.
    pub fn from_request(request: &HttpRequest) -> Self {
        Self::new()
            .with_provider(DictionaryValueProvider::route(request))
            .with_provider(DictionaryValueProvider::query(request))
            .with_provider(DictionaryValueProvider::headers(request))
    }

    pub fn with_provider(mut self, provider: impl ValueProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl ValueProvider for CompositeValueProvider {
    fn contains_prefix(&self, prefix: &str) -> bool {
        self.providers.iter().any(|p| p.contains_prefix(prefix))
    }

    fn get_value(&self, key: &str) -> Option<ValueProviderResult> {
        self.providers.iter().find_map(|p| p.get_value(key))
    }

    fn get_value_from(&self, source: &BindingSource, key: &str) -> Option<ValueProviderResult> {
        self.providers
            .iter()
            .find_map(|p| p.get_value_from(source, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> HttpRequest {
        HttpRequest::new("GET", "/people/7")
            .with_path_param("id", "7")
            .with_header("X-Tenant", "acme")
            .with_query("id=99&filter.name=ada")
            .unwrap()
    }

    #[test]
    fn test_route_wins_over_query() {
        let provider = CompositeValueProvider::from_request(&request());
        assert_eq!(provider.get_value("id").unwrap().first_value(), Some("7"));
        assert_eq!(
            provider
                .get_value_from(&BindingSource::Query, "id")
                .unwrap()
                .first_value(),
            Some("99")
        );
    }

    #[test]
    fn test_headers_case_insensitive() {
        let provider = DictionaryValueProvider::headers(&request());
        assert_eq!(provider.get_value("x-tenant").unwrap().first_value(), Some("acme"));
        assert_eq!(provider.get_value("X-TENANT").unwrap().first_value(), Some("acme"));
        assert!(provider.contains_prefix("X-Tenant"));
    }

    #[test]
    fn test_contains_prefix() {
        let provider = DictionaryValueProvider::query(&request());
        assert!(provider.contains_prefix("filter"));
        assert!(provider.contains_prefix("filter.name"));
        assert!(!provider.contains_prefix("filt"));
        assert!(provider.contains_prefix(""));
        assert!(!DictionaryValueProvider::new(BindingSource::Query, HashMap::new()).contains_prefix(""));
    }

    #[test]
    fn test_source_filtering() {
        let provider = DictionaryValueProvider::route(&request());
        assert!(provider.get_value_from(&BindingSource::Route, "id").is_some());
        assert!(provider.get_value_from(&BindingSource::Query, "id").is_none());
        assert!(
            CompositeValueProvider::from_request(&request())
                .get_value_from(&BindingSource::Header, "x-tenant")
                .is_some()
        );
    }
}
