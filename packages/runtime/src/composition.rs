//! Host-Directive Graph Builder
//!
//! Expands the host-directive declarations of the directives matched on an
//! element into the flattened, ordered, deduplicated matched set. Expansion
//! is depth-first: a directive's own host directives surface before the
//! directive itself, so the innermost composed directive comes first and
//! each composer follows everything it composes.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::{DefId, MatchSource};
use crate::errors::{Result, RuntimeError};
use crate::registry::DirectiveRegistry;

/// One directive applying to an element.
#[derive(Debug, Clone)]
pub struct MatchedEntry {
    pub def: DefId,
    pub source: MatchSource,
    /// Matched-set position of the directive that composed this one, or
    /// `None` for selector-matched entries.
    pub parent: Option<usize>,
    /// Input/output aliases exposed by the composing declaration. Empty for
    /// selector-matched entries.
    pub exposed_inputs: IndexMap<String, String>,
    pub exposed_outputs: IndexMap<String, String>,
}

/// Serializable summary of one matched entry, for introspection tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedSummary {
    pub name: String,
    pub source: MatchSource,
}

/// The flattened, ordered, deduplicated list of directives applying to one
/// element. Built once at element setup; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct MatchedSet {
    entries: SmallVec<[MatchedEntry; 8]>,
    component: Option<usize>,
    principal: Option<usize>,
}

impl MatchedSet {
    pub fn entries(&self) -> &[MatchedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Matched-set position of the component, if one applies.
    pub fn component(&self) -> Option<usize> {
        self.component
    }

    /// The entry whose host bindings take final precedence: the component,
    /// or the sole selector-matched directive when the match is unambiguous.
    pub fn principal(&self) -> Option<usize> {
        self.principal
    }

    pub fn position(&self, def: DefId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.def == def)
    }

    pub fn def_ids(&self) -> Vec<DefId> {
        self.entries.iter().map(|entry| entry.def).collect()
    }

    /// Topmost composer of the entry at `idx` (itself when selector-matched).
    pub fn root_of(&self, mut idx: usize) -> usize {
        while let Some(parent) = self.entries[idx].parent {
            idx = parent;
        }
        idx
    }

    /// Whether the entry at `idx` is transitively composed by `ancestor`.
    pub fn is_in_subtree(&self, ancestor: usize, mut idx: usize) -> bool {
        while let Some(parent) = self.entries[idx].parent {
            if parent == ancestor {
                return true;
            }
            idx = parent;
        }
        false
    }

    pub fn describe(&self, registry: &DirectiveRegistry) -> Vec<MatchedSummary> {
        self.entries
            .iter()
            .map(|entry| MatchedSummary {
                name: registry.name_of(entry.def).to_string(),
                source: entry.source,
            })
            .collect()
    }
}

/// Build the matched set for one element from its selector-matched
/// definitions, expanding every declared host directive.
///
/// The component (when present) is moved to the front of the selector-matched
/// entries; each entry's composed host directives land immediately before it.
/// Duplicates reachable through multiple composition paths appear once, at
/// their first position. A definition that transitively composes itself
/// fails with `CircularComposition` naming the cycle.
pub fn build_matched_set(
    registry: &DirectiveRegistry,
    selector_matched: &[DefId],
) -> Result<MatchedSet> {
    let mut set = MatchedSet::default();
    let mut placed: HashMap<DefId, usize> = HashMap::new();
    let mut stack: Vec<DefId> = Vec::new();

    let mut roots: Vec<DefId> = selector_matched.to_vec();
    roots.sort_by_key(|id| !registry.def(*id).is_component);

    for def in roots {
        expand(
            registry,
            def,
            MatchSource::Selector,
            IndexMap::new(),
            IndexMap::new(),
            &mut set,
            &mut placed,
            &mut stack,
        )?;
    }

    set.principal = set.component.or_else(|| {
        let mut selector_roots = set
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.parent.is_none());
        match (selector_roots.next(), selector_roots.next()) {
            (Some((idx, _)), None) => Some(idx),
            _ => None,
        }
    });

    Ok(set)
}

#[allow(clippy::too_many_arguments)]
fn expand(
    registry: &DirectiveRegistry,
    def: DefId,
    source: MatchSource,
    exposed_inputs: IndexMap<String, String>,
    exposed_outputs: IndexMap<String, String>,
    set: &mut MatchedSet,
    placed: &mut HashMap<DefId, usize>,
    stack: &mut Vec<DefId>,
) -> Result<Option<usize>> {
    // Identity dedup: the first occurrence wins and is never re-expanded.
    if placed.contains_key(&def) {
        return Ok(None);
    }

    if let Some(start) = stack.iter().position(|&d| d == def) {
        let mut cycle: Vec<String> = stack[start..]
            .iter()
            .map(|&d| registry.name_of(d).to_string())
            .collect();
        cycle.push(registry.name_of(def).to_string());
        return Err(RuntimeError::CircularComposition { cycle });
    }

    stack.push(def);
    let definition = registry.def(def);

    let mut child_indices: SmallVec<[usize; 4]> = SmallVec::new();
    for entry in &definition.host_directives {
        let child = entry.directive.resolve(registry)?;
        validate_aliases(registry, child, entry)?;
        if let Some(child_idx) = expand(
            registry,
            child,
            MatchSource::HostDirective,
            entry.exposed_inputs.clone(),
            entry.exposed_outputs.clone(),
            set,
            placed,
            stack,
        )? {
            child_indices.push(child_idx);
        }
    }

    stack.pop();

    let idx = set.entries.len();
    set.entries.push(MatchedEntry {
        def,
        source,
        parent: None,
        exposed_inputs,
        exposed_outputs,
    });
    for child_idx in child_indices {
        set.entries[child_idx].parent = Some(idx);
    }
    placed.insert(def, idx);

    if definition.is_component && set.component.is_none() {
        set.component = Some(idx);
    }

    Ok(Some(idx))
}

fn validate_aliases(
    registry: &DirectiveRegistry,
    child: DefId,
    entry: &crate::definition::HostDirectiveEntry,
) -> Result<()> {
    let definition = registry.def(child);
    for name in entry.exposed_inputs.keys() {
        if !definition.inputs.contains(name) {
            return Err(RuntimeError::UnknownHostDirectiveBinding {
                directive: definition.name.clone(),
                binding: name.clone(),
            });
        }
    }
    for name in entry.exposed_outputs.keys() {
        if !definition.outputs.contains(name) {
            return Err(RuntimeError::UnknownHostDirectiveBinding {
                directive: definition.name.clone(),
                binding: name.clone(),
            });
        }
    }
    Ok(())
}
