//! Lifecycle Sequencer
//!
//! Computes per-element hook invocation order. Creation-phase hooks run in
//! matched-set order, so every composed host directive initializes before
//! the directive composing it and the principal runs last within its branch.
//! The post-view phase additionally bubbles depth-first through the render
//! tree (children complete before ancestors); that traversal is driven by
//! the element tree, which calls into this module per element.

use smallvec::SmallVec;

use crate::composition::MatchedSet;
use crate::core::HookFlags;
use crate::registry::DirectiveRegistry;

/// Matched-set positions whose definitions declare `hook`, in matched-set
/// order. Deterministic for a fixed declaration graph.
pub fn creation_sequence(
    registry: &DirectiveRegistry,
    matched: &MatchedSet,
    hook: HookFlags,
) -> SmallVec<[usize; 8]> {
    matched
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, entry)| registry.def(entry.def).hooks.contains(hook))
        .map(|(idx, _)| idx)
        .collect()
}
