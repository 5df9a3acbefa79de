//! Element Tree and Instantiation
//!
//! Owns the registry and the render-tree arena, drives element setup
//! (selector matching, matched-set building, binding merge, instance
//! construction), the caller-driven change-detection pass that dispatches
//! lifecycle hooks, event dispatch and the introspection accessors.
//! Everything runs synchronously on the calling thread.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use crate::composition::{build_matched_set, MatchedSet, MatchedSummary};
use crate::core::{DefId, DirectiveHandle, ElementId, HookFlags, TokenKey};
use crate::definition::DirectiveDefinition;
use crate::errors::{Result, RuntimeError};
use crate::host_bindings::{merge_bindings, BindingSnapshot, ListenerFn, MergedBindingTable};
use crate::injector::NodeInjector;
use crate::lifecycle::creation_sequence;
use crate::registry::DirectiveRegistry;
use crate::selector::CssSelector;

pub(crate) struct ElementData {
    pub(crate) tag: String,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) parent: Option<ElementId>,
    pub(crate) children: Vec<ElementId>,
    pub(crate) matched: MatchedSet,
    pub(crate) bindings: MergedBindingTable,
    pub(crate) instances: Vec<Option<DirectiveHandle>>,
    pub(crate) constructing: Vec<bool>,
    /// Per-element memoization of factory providers, keyed by
    /// (entry, view-scope, token).
    pub(crate) memoized_providers: HashMap<(usize, bool, TokenKey), Rc<dyn Any>>,
    pub(crate) init_done: bool,
    pub(crate) view_init_done: bool,
    pub(crate) destroyed: bool,
}

/// One application context: a directive registry plus a render tree.
pub struct Application {
    pub(crate) registry: DirectiveRegistry,
    pub(crate) elements: Vec<ElementData>,
    pub(crate) roots: Vec<ElementId>,
    pub(crate) construction_stack: Vec<(ElementId, usize)>,
}

impl Application {
    pub fn new(registry: DirectiveRegistry) -> Self {
        Application {
            registry,
            elements: Vec::new(),
            roots: Vec::new(),
            construction_stack: Vec::new(),
        }
    }

    pub fn registry(&self) -> &DirectiveRegistry {
        &self.registry
    }

    /// Mutable registry access, e.g. to register the target of a forward
    /// reference before the first element using it is created.
    pub fn registry_mut(&mut self) -> &mut DirectiveRegistry {
        &mut self.registry
    }

    pub fn register(&mut self, definition: DirectiveDefinition) -> Result<DefId> {
        self.registry.register(definition)
    }

    pub fn token(&mut self, name: &str) -> TokenKey {
        self.registry.token(name)
    }

    pub fn create_root(&mut self, tag: &str, attributes: &[(&str, &str)]) -> Result<ElementId> {
        self.create_element(None, tag, attributes)
    }

    pub fn create_child(
        &mut self,
        parent: ElementId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> Result<ElementId> {
        self.element(parent)?;
        self.create_element(Some(parent), tag, attributes)
    }

    fn create_element(
        &mut self,
        parent: Option<ElementId>,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> Result<ElementId> {
        let attributes: Vec<(String, String)> = attributes
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let mut target = CssSelector::new();
        target.set_element(tag);
        for (name, value) in &attributes {
            if name == "class" {
                for class_name in value.split_whitespace() {
                    target.add_class_name(class_name);
                }
            }
            target.add_attribute(name, value);
        }

        let selector_matched = self.registry.match_element(&target);
        let matched = build_matched_set(&self.registry, &selector_matched)?;
        let bindings = merge_bindings(&self.registry, &matched, &attributes);
        let count = matched.len();

        let id = ElementId(self.elements.len());
        self.elements.push(ElementData {
            tag: tag.to_string(),
            attributes,
            parent,
            children: Vec::new(),
            matched,
            bindings,
            instances: vec![None; count],
            constructing: vec![false; count],
            memoized_providers: HashMap::new(),
            init_done: false,
            view_init_done: false,
            destroyed: false,
        });
        match parent {
            Some(parent) => self.elements[parent.0].children.push(id),
            None => self.roots.push(id),
        }

        for entry in 0..count {
            if let Err(error) = self.construct_entry(id, entry) {
                // A failed setup must not corrupt siblings: drop the element
                // from the tree and surface the error.
                self.detach(id);
                self.elements[id.0].destroyed = true;
                self.elements[id.0].instances.iter_mut().for_each(|i| *i = None);
                return Err(error);
            }
        }

        Ok(id)
    }

    /// Caller-driven synchronous pass: runs pending creation hooks in
    /// element-creation order, then bubbles post-view hooks depth-first from
    /// the leaves so a child element completes before any ancestor.
    pub fn detect_changes(&mut self) {
        for index in 0..self.elements.len() {
            let id = ElementId(index);
            if self.elements[index].destroyed || self.elements[index].init_done {
                continue;
            }
            self.run_hooks(id, HookFlags::ON_INIT);
            self.elements[index].init_done = true;
        }

        for root in self.roots.clone() {
            self.run_after_view(root);
        }
    }

    fn run_after_view(&mut self, el: ElementId) {
        for child in self.elements[el.0].children.clone() {
            self.run_after_view(child);
        }
        if !self.elements[el.0].destroyed && !self.elements[el.0].view_init_done {
            self.run_hooks(el, HookFlags::AFTER_VIEW_INIT);
            self.elements[el.0].view_init_done = true;
        }
    }

    fn run_hooks(&mut self, el: ElementId, hook: HookFlags) {
        let sequence = creation_sequence(&self.registry, &self.elements[el.0].matched, hook);
        for entry in sequence {
            let instance = self.elements[el.0].instances[entry].clone();
            if let Some(instance) = instance {
                let mut guard = instance.borrow_mut();
                if hook.contains(HookFlags::ON_INIT) {
                    guard.on_init();
                } else if hook.contains(HookFlags::AFTER_VIEW_INIT) {
                    guard.after_view_init();
                } else if hook.contains(HookFlags::ON_DESTROY) {
                    guard.on_destroy();
                }
            }
        }
    }

    /// Fire the merged listeners for `event`, in contribution order with the
    /// principal's handler last. Returns how many handlers ran.
    pub fn dispatch(&mut self, el: ElementId, event: &str) -> Result<usize> {
        let handlers: Vec<(usize, ListenerFn)> = self
            .element(el)?
            .bindings
            .listeners
            .get(event)
            .cloned()
            .unwrap_or_default();

        let mut fired = 0;
        for (entry, handler) in handlers {
            if let Some(instance) = self.elements[el.0].instances[entry].clone() {
                let mut guard = instance.borrow_mut();
                (*handler)(&mut **guard);
                fired += 1;
            }
        }
        Ok(fired)
    }

    /// Destroy an element and its subtree. Destroy hooks run depth-first,
    /// children before parents, matched-set order within an element.
    pub fn destroy(&mut self, el: ElementId) -> Result<()> {
        self.element(el)?;
        self.detach(el);
        self.destroy_recursive(el);
        Ok(())
    }

    fn detach(&mut self, el: ElementId) {
        match self.elements[el.0].parent {
            Some(parent) => self.elements[parent.0].children.retain(|&child| child != el),
            None => self.roots.retain(|&root| root != el),
        }
    }

    fn destroy_recursive(&mut self, el: ElementId) {
        for child in self.elements[el.0].children.clone() {
            self.destroy_recursive(child);
        }
        self.run_hooks(el, HookFlags::ON_DESTROY);
        let data = &mut self.elements[el.0];
        data.destroyed = true;
        data.children.clear();
        data.instances.iter_mut().for_each(|instance| *instance = None);
        data.memoized_providers.clear();
        data.bindings = MergedBindingTable::default();
    }

    // --- introspection -----------------------------------------------------

    /// All directives attached to an element, host directives included, in
    /// matched-set order.
    pub fn directives_on(&self, el: ElementId) -> Result<Vec<DefId>> {
        Ok(self.element(el)?.matched.def_ids())
    }

    pub fn directive_names_on(&self, el: ElementId) -> Result<Vec<String>> {
        Ok(self
            .element(el)?
            .matched
            .entries()
            .iter()
            .map(|entry| self.registry.name_of(entry.def).to_string())
            .collect())
    }

    pub fn matched_summary(&self, el: ElementId) -> Result<Vec<MatchedSummary>> {
        Ok(self.element(el)?.matched.describe(&self.registry))
    }

    /// The component owning an element, if one applies to it.
    pub fn component_of(&self, el: ElementId) -> Result<Option<DefId>> {
        let data = self.element(el)?;
        Ok(data
            .matched
            .component()
            .map(|idx| data.matched.entries()[idx].def))
    }

    pub fn component_instance(&self, el: ElementId) -> Result<Option<DirectiveHandle>> {
        let data = self.element(el)?;
        Ok(data
            .matched
            .component()
            .and_then(|idx| data.instances[idx].clone()))
    }

    /// Instance of a directive on this element, if it is part of the matched
    /// set.
    pub fn instance(&self, el: ElementId, def: DefId) -> Result<Option<DirectiveHandle>> {
        let data = self.element(el)?;
        Ok(data
            .matched
            .position(def)
            .and_then(|idx| data.instances[idx].clone()))
    }

    pub fn bindings(&self, el: ElementId) -> Result<&MergedBindingTable> {
        Ok(&self.element(el)?.bindings)
    }

    pub fn binding_snapshot(&self, el: ElementId) -> Result<BindingSnapshot> {
        Ok(self.element(el)?.bindings.snapshot())
    }

    pub fn tag(&self, el: ElementId) -> Result<&str> {
        Ok(self.element(el)?.tag.as_str())
    }

    pub fn children(&self, el: ElementId) -> Result<Vec<ElementId>> {
        Ok(self.element(el)?.children.clone())
    }

    pub fn parent(&self, el: ElementId) -> Result<Option<ElementId>> {
        Ok(self.element(el)?.parent)
    }

    /// Injector scoped to one element, for embedding code and debug tooling.
    pub fn injector(&mut self, el: ElementId) -> Result<NodeInjector<'_>> {
        self.element(el)?;
        Ok(NodeInjector { app: self, element: el })
    }

    pub(crate) fn element(&self, el: ElementId) -> Result<&ElementData> {
        let data = self.elements.get(el.0).ok_or(RuntimeError::UnknownElement)?;
        if data.destroyed {
            return Err(RuntimeError::DestroyedElement);
        }
        Ok(data)
    }
}
