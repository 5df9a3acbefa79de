#![deny(clippy::all)]

//! Host-directive composition runtime.
//!
//! Given directive and component definitions that statically compose other
//! directives onto their host element, this crate computes the flattened
//! matched set per element, the merged host-binding table, the injection
//! visibility between composed directives, and the lifecycle hook ordering
//! across the composed graph and the render tree. Setup is synchronous and
//! deterministic; per-element state is built once and treated as immutable
//! until the element is destroyed.

pub mod composition;
pub mod core;
pub mod definition;
pub mod element;
pub mod errors;
pub mod host_bindings;
pub mod injector;
pub mod lifecycle;
pub mod registry;
pub mod selector;

pub use composition::{build_matched_set, MatchedEntry, MatchedSet, MatchedSummary};
pub use crate::core::{
    DefId, Directive, DirectiveHandle, ElementId, HookFlags, InjectFlags, MatchSource, TokenKey,
};
pub use definition::{
    DirectiveDefinition, DirectiveFactory, DirectiveRef, ForwardRef, HostDirectiveEntry, Provider,
};
pub use element::Application;
pub use errors::{Result, RuntimeError};
pub use host_bindings::{merge_bindings, BindingSnapshot, HostBindingsSpec, MergedBindingTable};
pub use injector::{ConstructionInjector, NodeInjector};
pub use lifecycle::creation_sequence;
pub use registry::DirectiveRegistry;
pub use selector::{CssSelector, SelectorMatcher};
