//! Injection Scope Resolver
//!
//! Visibility rules between a directive, the host directives it composes,
//! the other directives on its element and ancestor elements:
//!
//! - a directive resolves tokens from itself and its composed subtree,
//!   nearest declarer first;
//! - a selector-matched directive (a composition root) additionally sees
//!   every other entry on its element;
//! - a composed host directive may inject its root's instance, but none of
//!   the root's providers;
//! - view providers of a component are visible to the component itself and
//!   to descendant elements, never to other directives on the host element;
//! - lookups then ascend the element tree.
//!
//! Instantiation is demand-driven: injecting a directive that has not been
//! constructed yet constructs it on the spot. An under-construction marker
//! per entry turns construction cycles into `CircularDependency` errors that
//! report the whole chain.

use std::any::Any;
use std::rc::Rc;

use smallvec::{smallvec, SmallVec};

use crate::composition::MatchedSet;
use crate::core::{DefId, DirectiveHandle, ElementId, InjectFlags, TokenKey};
use crate::definition::ProviderValue;
use crate::element::Application;
use crate::errors::{Result, RuntimeError};

/// Provider scan order within one element for a given requester.
///
/// `None` stands for an external or descendant lookup, which sees every
/// entry, most recently applied first. For a concrete requester the order is
/// the requester itself, then its composed subtree by composition depth
/// (declaration order within a depth), then — for composition roots only —
/// the remaining matched set in reverse order.
fn provider_scan_order(matched: &MatchedSet, requester: Option<usize>) -> SmallVec<[usize; 8]> {
    let len = matched.len();
    let requester = match requester {
        None => return (0..len).rev().collect(),
        Some(r) => r,
    };

    let mut order: SmallVec<[usize; 8]> = smallvec![requester];
    let mut frontier: SmallVec<[usize; 8]> = smallvec![requester];
    while !frontier.is_empty() {
        let mut next: SmallVec<[usize; 8]> = SmallVec::new();
        for (idx, entry) in matched.entries().iter().enumerate() {
            if let Some(parent) = entry.parent {
                if frontier.contains(&parent) {
                    next.push(idx);
                }
            }
        }
        order.extend(next.iter().copied());
        frontier = next;
    }

    if matched.entries()[requester].parent.is_none() {
        for idx in (0..len).rev() {
            if !order.contains(&idx) {
                order.push(idx);
            }
        }
    }

    order
}

impl Application {
    /// Resolve a value token for a requester. `Ok(None)` is only returned
    /// under `InjectFlags::OPTIONAL`.
    pub(crate) fn resolve_token(
        &mut self,
        element: ElementId,
        requester: Option<usize>,
        token: TokenKey,
        flags: InjectFlags,
    ) -> Result<Option<Rc<dyn Any>>> {
        let mut current = Some(element);
        let mut is_start = true;
        if flags.contains(InjectFlags::SKIP_SELF) {
            current = self.elements[element.0].parent;
            is_start = false;
        }

        while let Some(el) = current {
            if let Some(value) = self.find_provider_at(el, requester, token, is_start) {
                return Ok(Some(value));
            }
            if flags.contains(InjectFlags::SELF) && is_start {
                break;
            }
            current = self.elements[el.0].parent;
            is_start = false;
        }

        if flags.contains(InjectFlags::OPTIONAL) {
            Ok(None)
        } else {
            Err(RuntimeError::ProviderNotFound {
                token: self.registry.token_name(token).to_string(),
                requester: self.requester_name(element, requester),
            })
        }
    }

    fn find_provider_at(
        &mut self,
        el: ElementId,
        requester: Option<usize>,
        token: TokenKey,
        is_start: bool,
    ) -> Option<Rc<dyn Any>> {
        let component = self.elements[el.0].matched.component();

        // View providers: visible to the component itself and to lookups
        // ascending from descendant elements. They take precedence over
        // directive-contributed providers within the view.
        let view_visible = if is_start {
            requester.is_some() && requester == component
        } else {
            true
        };
        if view_visible {
            if let Some(component_idx) = component {
                if let Some(value) = self.materialize_provider(el, component_idx, true, token) {
                    return Some(value);
                }
            }
        }

        let scan_requester = if is_start { requester } else { None };
        let order = provider_scan_order(&self.elements[el.0].matched, scan_requester);
        for idx in order {
            if let Some(value) = self.materialize_provider(el, idx, false, token) {
                return Some(value);
            }
        }
        None
    }

    /// Look `token` up in one entry's provider list (later declarations win
    /// within a list). Factory providers are materialized once per element.
    fn materialize_provider(
        &mut self,
        el: ElementId,
        entry: usize,
        view_scope: bool,
        token: TokenKey,
    ) -> Option<Rc<dyn Any>> {
        let key = (entry, view_scope, token);
        if let Some(value) = self.elements[el.0].memoized_providers.get(&key) {
            return Some(value.clone());
        }

        let def = self.registry.def(self.elements[el.0].matched.entries()[entry].def);
        let list = if view_scope {
            &def.view_providers
        } else {
            &def.providers
        };

        for provider in list.iter().rev() {
            if provider.token != token {
                continue;
            }
            return Some(match &provider.value {
                ProviderValue::Value(value) => value.clone(),
                ProviderValue::Factory(factory) => {
                    let value = factory();
                    self.elements[el.0]
                        .memoized_providers
                        .insert(key, value.clone());
                    value
                }
            });
        }
        None
    }

    /// Resolve a directive instance for a requester, constructing it on
    /// demand. `Ok(None)` is only returned under `InjectFlags::OPTIONAL`.
    pub(crate) fn resolve_directive(
        &mut self,
        element: ElementId,
        requester: Option<usize>,
        target: DefId,
        flags: InjectFlags,
    ) -> Result<Option<DirectiveHandle>> {
        let mut current = Some(element);
        let mut is_start = true;
        if flags.contains(InjectFlags::SKIP_SELF) {
            current = self.elements[element.0].parent;
            is_start = false;
        }

        while let Some(el) = current {
            if let Some(position) = self.elements[el.0].matched.position(target) {
                let visible = if !is_start {
                    true
                } else {
                    match requester {
                        None => true,
                        Some(r) => {
                            let matched = &self.elements[el.0].matched;
                            position == r
                                || matched.entries()[r].parent.is_none()
                                || matched.is_in_subtree(r, position)
                                || matched.root_of(r) == position
                        }
                    }
                };
                if visible {
                    return self.construct_entry(el, position).map(Some);
                }
            }
            if flags.contains(InjectFlags::SELF) && is_start {
                break;
            }
            current = self.elements[el.0].parent;
            is_start = false;
        }

        if flags.contains(InjectFlags::OPTIONAL) {
            Ok(None)
        } else {
            Err(RuntimeError::ProviderNotFound {
                token: self.registry.name_of(target).to_string(),
                requester: self.requester_name(element, requester),
            })
        }
    }

    /// Construct the instance at one matched-set position, recursing through
    /// whatever its factory injects.
    pub(crate) fn construct_entry(
        &mut self,
        el: ElementId,
        entry: usize,
    ) -> Result<DirectiveHandle> {
        if let Some(instance) = self.elements[el.0].instances[entry].clone() {
            return Ok(instance);
        }

        if self.elements[el.0].constructing[entry] {
            let mut chain: Vec<String> = self
                .construction_stack
                .iter()
                .map(|&(stack_el, stack_entry)| self.entry_name(stack_el, stack_entry))
                .collect();
            chain.push(self.entry_name(el, entry));
            return Err(RuntimeError::CircularDependency { chain });
        }

        self.elements[el.0].constructing[entry] = true;
        self.construction_stack.push((el, entry));

        let def = self.registry.def(self.elements[el.0].matched.entries()[entry].def);
        let factory = def.factory.clone();
        let result = {
            let mut injector = ConstructionInjector {
                app: self,
                element: el,
                entry,
            };
            factory(&mut injector)
        };

        self.construction_stack.pop();
        self.elements[el.0].constructing[entry] = false;

        let instance: DirectiveHandle = Rc::new(std::cell::RefCell::new(result?));
        self.elements[el.0].instances[entry] = Some(instance.clone());
        Ok(instance)
    }

    fn entry_name(&self, el: ElementId, entry: usize) -> String {
        self.registry
            .name_of(self.elements[el.0].matched.entries()[entry].def)
            .to_string()
    }

    fn requester_name(&self, element: ElementId, requester: Option<usize>) -> String {
        match requester {
            Some(entry) => self.entry_name(element, entry),
            None => "external injector".to_string(),
        }
    }
}

fn downcast<T: Any>(token: &str, value: Rc<dyn Any>) -> Result<Rc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| RuntimeError::TokenTypeMismatch {
            token: token.to_string(),
        })
}

/// Injector handed to directive factories during construction. Requests are
/// scoped to the directive under construction.
pub struct ConstructionInjector<'a> {
    pub(crate) app: &'a mut Application,
    pub(crate) element: ElementId,
    pub(crate) entry: usize,
}

impl ConstructionInjector<'_> {
    pub fn get<T: Any>(&mut self, token: TokenKey) -> Result<Rc<T>> {
        let value = self
            .app
            .resolve_token(self.element, Some(self.entry), token, InjectFlags::empty())?
            .ok_or_else(|| RuntimeError::ProviderNotFound {
                token: self.app.registry.token_name(token).to_string(),
                requester: self.app.requester_name(self.element, Some(self.entry)),
            })?;
        downcast(self.app.registry.token_name(token), value)
    }

    pub fn get_optional<T: Any>(&mut self, token: TokenKey) -> Result<Option<Rc<T>>> {
        self.get_with(token, InjectFlags::OPTIONAL)
    }

    pub fn get_with<T: Any>(&mut self, token: TokenKey, flags: InjectFlags) -> Result<Option<Rc<T>>> {
        match self
            .app
            .resolve_token(self.element, Some(self.entry), token, flags)?
        {
            Some(value) => Ok(Some(downcast(self.app.registry.token_name(token), value)?)),
            None => Ok(None),
        }
    }

    pub fn directive(&mut self, target: DefId) -> Result<DirectiveHandle> {
        match self
            .app
            .resolve_directive(self.element, Some(self.entry), target, InjectFlags::empty())?
        {
            Some(instance) => Ok(instance),
            None => Err(RuntimeError::ProviderNotFound {
                token: self.app.registry.name_of(target).to_string(),
                requester: self.app.requester_name(self.element, Some(self.entry)),
            }),
        }
    }

    pub fn optional_directive(&mut self, target: DefId) -> Result<Option<DirectiveHandle>> {
        self.app
            .resolve_directive(self.element, Some(self.entry), target, InjectFlags::OPTIONAL)
    }

    pub fn directive_with(
        &mut self,
        target: DefId,
        flags: InjectFlags,
    ) -> Result<Option<DirectiveHandle>> {
        self.app
            .resolve_directive(self.element, Some(self.entry), target, flags)
    }

    /// Instance of the topmost directive composing the one under
    /// construction (the requester itself when selector-matched).
    pub fn host(&mut self) -> Result<DirectiveHandle> {
        let root = self.app.elements[self.element.0]
            .matched
            .root_of(self.entry);
        let target = self.app.elements[self.element.0].matched.entries()[root].def;
        self.directive(target)
    }
}

/// Externally-usable injector for one element, exposed to debugging tools
/// and embedding code. Sees the element's full scope.
pub struct NodeInjector<'a> {
    pub(crate) app: &'a mut Application,
    pub(crate) element: ElementId,
}

impl NodeInjector<'_> {
    pub fn get<T: Any>(&mut self, token: TokenKey) -> Result<Rc<T>> {
        let value = self
            .app
            .resolve_token(self.element, None, token, InjectFlags::empty())?
            .ok_or_else(|| RuntimeError::ProviderNotFound {
                token: self.app.registry.token_name(token).to_string(),
                requester: "external injector".to_string(),
            })?;
        downcast(self.app.registry.token_name(token), value)
    }

    pub fn get_with<T: Any>(&mut self, token: TokenKey, flags: InjectFlags) -> Result<Option<Rc<T>>> {
        match self.app.resolve_token(self.element, None, token, flags)? {
            Some(value) => Ok(Some(downcast(self.app.registry.token_name(token), value)?)),
            None => Ok(None),
        }
    }

    pub fn directive(&mut self, target: DefId) -> Result<DirectiveHandle> {
        match self
            .app
            .resolve_directive(self.element, None, target, InjectFlags::empty())?
        {
            Some(instance) => Ok(instance),
            None => Err(RuntimeError::ProviderNotFound {
                token: self.app.registry.name_of(target).to_string(),
                requester: "external injector".to_string(),
            }),
        }
    }

    pub fn directive_with(
        &mut self,
        target: DefId,
        flags: InjectFlags,
    ) -> Result<Option<DirectiveHandle>> {
        self.app.resolve_directive(self.element, None, target, flags)
    }
}
