//! Host Binding Merger
//!
//! Folds the host attribute/class/style/listener declarations of every entry
//! in a matched set into one table per element. Plain attributes follow
//! last-applied-wins with the principal's bindings applied after everything
//! else; classes and styles are unioned; listeners are additive.

use std::collections::HashSet;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::composition::MatchedSet;
use crate::core::Directive;
use crate::registry::DirectiveRegistry;

/// Host listener callback, invoked with the contributing directive instance.
pub type ListenerFn = Rc<dyn Fn(&mut dyn Directive)>;

/// One event listener declared in a directive's host bindings.
#[derive(Clone)]
pub struct HostListener {
    pub event: String,
    pub(crate) handler: ListenerFn,
}

impl std::fmt::Debug for HostListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostListener")
            .field("event", &self.event)
            .finish()
    }
}

/// Host bindings declared by one directive definition.
#[derive(Debug, Clone, Default)]
pub struct HostBindingsSpec {
    pub attributes: IndexMap<String, String>,
    pub class_names: Vec<String>,
    pub styles: IndexMap<String, String>,
    pub listeners: Vec<HostListener>,
}

impl HostBindingsSpec {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
            && self.class_names.is_empty()
            && self.styles.is_empty()
            && self.listeners.is_empty()
    }
}

/// The merged per-element binding table. Built once at element setup and
/// read-only afterwards.
#[derive(Clone, Default)]
pub struct MergedBindingTable {
    pub attributes: IndexMap<String, String>,
    pub classes: IndexSet<String>,
    pub styles: IndexMap<String, String>,
    /// Listeners per event name, tagged with the contributing matched-set
    /// position, in contribution order.
    pub(crate) listeners: IndexMap<String, Vec<(usize, ListenerFn)>>,
}

impl MergedBindingTable {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|v| v.as_str())
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains(name)
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        self.styles.get(property).map(|v| v.as_str())
    }

    pub fn listener_events(&self) -> Vec<&str> {
        self.listeners.keys().map(|k| k.as_str()).collect()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map(|l| l.len()).unwrap_or(0)
    }

    /// Serializable view of the table, without the listener closures.
    pub fn snapshot(&self) -> BindingSnapshot {
        BindingSnapshot {
            attributes: self
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            classes: self.classes.iter().cloned().collect(),
            styles: self
                .styles
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            events: self.listeners.keys().cloned().collect(),
        }
    }
}

impl std::fmt::Debug for MergedBindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergedBindingTable")
            .field("attributes", &self.attributes)
            .field("classes", &self.classes)
            .field("styles", &self.styles)
            .field("events", &self.listener_events())
            .finish()
    }
}

/// Snapshot of a merged binding table for debug tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSnapshot {
    pub attributes: Vec<(String, String)>,
    pub classes: Vec<String>,
    pub styles: Vec<(String, String)>,
    pub events: Vec<String>,
}

/// Fold the host bindings of every matched entry into one table.
///
/// `static_attributes` are the attributes declared in markup; they seed the
/// table and are never overwritten by directive host bindings. The `class`
/// attribute is split into the class union instead. Among directives,
/// later-applied attribute values win and land after earlier ones, with the
/// principal (the component, when present) applied last.
pub fn merge_bindings(
    registry: &DirectiveRegistry,
    matched: &MatchedSet,
    static_attributes: &[(String, String)],
) -> MergedBindingTable {
    let mut table = MergedBindingTable::default();

    let mut static_keys: HashSet<&str> = HashSet::new();
    for (name, value) in static_attributes {
        if name == "class" {
            for class_name in value.split_whitespace() {
                table.classes.insert(class_name.to_string());
            }
        } else {
            table.attributes.insert(name.clone(), value.clone());
            static_keys.insert(name.as_str());
        }
    }

    let principal = matched.principal();
    let order = (0..matched.len())
        .filter(|idx| Some(*idx) != principal)
        .chain(principal);

    for idx in order {
        let def = registry.def(matched.entries()[idx].def);
        let host = &def.host;

        for (name, value) in &host.attributes {
            if static_keys.contains(name.as_str()) {
                continue;
            }
            // Re-insert so the winning value also lands last in render order.
            table.attributes.shift_remove(name);
            table.attributes.insert(name.clone(), value.clone());
        }

        for class_name in &host.class_names {
            table.classes.insert(class_name.clone());
        }

        for (property, value) in &host.styles {
            table.styles.insert(property.clone(), value.clone());
        }

        for listener in &host.listeners {
            table
                .listeners
                .entry(listener.event.clone())
                .or_default()
                .push((idx, listener.handler.clone()));
        }
    }

    table
}
