//! Runtime Errors
//!
//! All failures raised by the composition runtime. Errors are local to one
//! element's setup; previously constructed siblings stay valid.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// A host directive declaration graph contains a cycle. Detected at
    /// graph-build time, before any instantiation.
    #[error("circular host directive composition: {}", .cycle.join(" -> "))]
    CircularComposition { cycle: Vec<String> },

    /// Injection requests formed a cycle during construction.
    #[error("circular dependency while constructing: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// The requested token has no visible provider for the requester.
    #[error("no provider for \"{token}\" (requested by {requester})")]
    ProviderNotFound { token: String, requester: String },

    /// A provider exists but holds a value of a different type than requested.
    #[error("provider for \"{token}\" is not of the requested type")]
    TokenTypeMismatch { token: String },

    /// A forward-referenced host directive never resolved to a registered
    /// definition by first use.
    #[error("forward reference \"{name}\" never resolved to a registered directive")]
    UnresolvedForwardRef { name: String },

    #[error("invalid selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("directive \"{name}\" is already registered")]
    DuplicateDirectiveName { name: String },

    #[error("invalid directive definition \"{name}\": {reason}")]
    InvalidDefinition { name: String, reason: String },

    /// A host directive entry exposes an input or output the referenced
    /// definition does not declare.
    #[error("host directive \"{directive}\" does not declare a binding named \"{binding}\"")]
    UnknownHostDirectiveBinding { directive: String, binding: String },

    #[error("element is not part of this application")]
    UnknownElement,

    #[error("element has been destroyed")]
    DestroyedElement,
}
