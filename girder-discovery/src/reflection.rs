//! Reflected type descriptions.
//!
//! Rust has no runtime reflection, so discovery works over plain value
//! objects that describe a type: its name, shape, declared capabilities,
//! attributes and methods. They are produced by hand, by registration
//! macros, or by test fixtures, and classified without touching the types
//! they describe.

use crate::Attribute;
use bitflags::bitflags;
use girder_core::{Error, ModelType, Result};
use std::fmt;
use std::sync::Arc;

bitflags! {
    /// Framework capabilities a type implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeCapabilities: u8 {
        /// Derives from the framework's base controller.
        const CONTROLLER_BASE = 1 << 0;
        /// Implements the action filter hooks itself.
        const ACTION_FILTER = 1 << 1;
        /// Implements the result filter hooks itself.
        const RESULT_FILTER = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
    Struct,
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Crate,
    Private,
}

/// Validate every attribute, failing on the first malformed one.
fn checked_attributes(
    target: &str,
    attributes: &[Arc<dyn Attribute>],
) -> Result<Vec<Arc<dyn Attribute>>> {
    for attribute in attributes {
        attribute
            .validate()
            .map_err(|reason| Error::InvalidAttribute {
                attribute: attribute.name().to_string(),
                target: target.to_string(),
                reason,
            })?;
    }
    Ok(attributes.to_vec())
}

/// A reflected type.
#[derive(Debug, Clone, Default)]
pub struct TypeDescriptor {
    pub name: String,
    pub module_path: String,
    pub kind: TypeKind,
    pub is_abstract: bool,
    pub visibility: Visibility,
    /// Enclosing type for nested declarations.
    pub declaring_type: Option<String>,
    /// Unbound generic parameters.
    pub generic_parameters: Vec<String>,
    pub capabilities: TypeCapabilities,
    pub attributes: Vec<Arc<dyn Attribute>>,
    pub methods: Vec<MethodDescriptor>,
}

impl TypeDescriptor {
    /// A public, top-level, concrete class.
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn in_module(mut self, module_path: impl Into<String>) -> Self {
        self.module_path = module_path.into();
        self
    }

    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn nested_in(mut self, declaring_type: impl Into<String>) -> Self {
        self.declaring_type = Some(declaring_type.into());
        self
    }

    pub fn generic_parameter(mut self, name: impl Into<String>) -> Self {
        self.generic_parameters.push(name.into());
        self
    }

    pub fn capability(mut self, capability: TypeCapabilities) -> Self {
        self.capabilities |= capability;
        self
    }

    pub fn attribute(mut self, attribute: impl Attribute + 'static) -> Self {
        self.attributes.push(Arc::new(attribute));
        self
    }

    pub fn attribute_arc(mut self, attribute: Arc<dyn Attribute>) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// `module::Name`, or just `Name` at the crate root.
    pub fn full_name(&self) -> String {
        match (&self.declaring_type, self.module_path.is_empty()) {
            (Some(outer), true) => format!("{}::{}", outer, self.name),
            (Some(outer), false) => format!("{}::{}::{}", self.module_path, outer, self.name),
            (None, true) => self.name.clone(),
            (None, false) => format!("{}::{}", self.module_path, self.name),
        }
    }

    pub fn is_class(&self) -> bool {
        self.kind == TypeKind::Class
    }

    /// Public and not nested inside another type.
    pub fn is_top_level_public(&self) -> bool {
        self.visibility == Visibility::Public && self.declaring_type.is_none()
    }

    pub fn is_open_generic(&self) -> bool {
        !self.generic_parameters.is_empty()
    }

    pub fn has_capability(&self, capability: TypeCapabilities) -> bool {
        self.capabilities.contains(capability)
    }

    /// Declared attributes in order, after validation.
    pub fn custom_attributes(&self) -> Result<Vec<Arc<dyn Attribute>>> {
        checked_attributes(&self.full_name(), &self.attributes)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())?;
        if self.is_open_generic() {
            write!(f, "<{}>", self.generic_parameters.join(", "))?;
        }
        Ok(())
    }
}

/// A reflected method.
#[derive(Debug, Clone, Default)]
pub struct MethodDescriptor {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub generic_parameters: Vec<String>,
    /// Compiler-generated accessor or operator.
    pub is_special_name: bool,
    /// Declared by the root object type rather than by user code.
    pub inherited_from_root: bool,
    pub attributes: Vec<Arc<dyn Attribute>>,
    pub parameters: Vec<ParameterDescriptor>,
}

impl MethodDescriptor {
    /// A public instance method.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn generic_parameter(mut self, name: impl Into<String>) -> Self {
        self.generic_parameters.push(name.into());
        self
    }

    pub fn special_name(mut self) -> Self {
        self.is_special_name = true;
        self
    }

    pub fn inherited_from_root(mut self) -> Self {
        self.inherited_from_root = true;
        self
    }

    pub fn attribute(mut self, attribute: impl Attribute + 'static) -> Self {
        self.attributes.push(Arc::new(attribute));
        self
    }

    pub fn attribute_arc(mut self, attribute: Arc<dyn Attribute>) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn is_generic(&self) -> bool {
        !self.generic_parameters.is_empty()
    }

    pub fn custom_attributes(&self, declaring_type: &TypeDescriptor) -> Result<Vec<Arc<dyn Attribute>>> {
        let target = format!("{}::{}", declaring_type.full_name(), self.name);
        checked_attributes(&target, &self.attributes)
    }
}

/// A reflected method parameter.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: String,
    pub model_type: ModelType,
    pub attributes: Vec<Arc<dyn Attribute>>,
    pub is_optional: bool,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, model_type: ModelType) -> Self {
        Self {
            name: name.into(),
            model_type,
            attributes: Vec::new(),
            is_optional: false,
        }
    }

    pub fn attribute(mut self, attribute: impl Attribute + 'static) -> Self {
        self.attributes.push(Arc::new(attribute));
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }

    pub fn custom_attributes(&self, method: &str) -> Result<Vec<Arc<dyn Attribute>>> {
        checked_attributes(&format!("{}({})", method, self.name), &self.attributes)
    }
}
