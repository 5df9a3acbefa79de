//! Core Runtime Types
//!
//! Identity handles and shared enums used across the composition runtime.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Identity of a registered directive definition within one application.
///
/// All deduplication and injection-visibility checks compare `DefId`s, never
/// names or selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DefId(pub(crate) usize);

impl DefId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Interned injection token. Tokens are application-scoped; two lookups of
/// the same token name yield the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenKey(pub(crate) usize);

/// Identity of an element in the render tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub(crate) usize);

bitflags! {
    /// Lifecycle hooks a directive type declares. The sequencer dispatches a
    /// hook only when the definition declares it, so a no-op default
    /// implementation on the trait never gets called by accident.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HookFlags: u8 {
        const ON_INIT = 1 << 0;
        const AFTER_VIEW_INIT = 1 << 1;
        const ON_DESTROY = 1 << 2;
    }
}

bitflags! {
    /// Flags qualifying an injection request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InjectFlags: u8 {
        /// Return `None` instead of failing when no provider is visible.
        const OPTIONAL = 1 << 0;
        /// Restrict the lookup to the requesting element's own scope.
        const SELF = 1 << 1;
        /// Start the lookup at the parent element.
        const SKIP_SELF = 1 << 2;
    }
}

/// Possible ways that a directive can join an element's matched set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchSource {
    /// The directive was matched by its selector.
    #[default]
    Selector,
    /// The directive was applied as a host directive.
    HostDirective,
}

/// Runtime behavior of a directive instance.
///
/// Hooks default to no-ops; which ones actually run is decided by the
/// `HookFlags` on the owning definition.
pub trait Directive: Any {
    fn on_init(&mut self) {}
    fn after_view_init(&mut self) {}
    fn on_destroy(&mut self) {}
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Shared handle to an instantiated directive. One instance exists per
/// definition per element; the handle is what injection hands out.
pub type DirectiveHandle = Rc<RefCell<Box<dyn Directive>>>;
