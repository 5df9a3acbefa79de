//! Directive Registry
//!
//! Application-scoped store of directive definitions, the token interner and
//! the selector index. Each test or embedding constructs its own registry;
//! there is no process-wide state.

use std::collections::HashMap;
use std::rc::Rc;

use crate::core::{DefId, TokenKey};
use crate::definition::{DirectiveDefinition, DirectiveRef};
use crate::errors::{Result, RuntimeError};
use crate::selector::{CssSelector, SelectorMatcher};

pub struct DirectiveRegistry {
    definitions: Vec<Rc<DirectiveDefinition>>,
    by_name: HashMap<String, DefId>,
    token_names: Vec<String>,
    tokens_by_name: HashMap<String, TokenKey>,
    matcher: SelectorMatcher<DefId>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        DirectiveRegistry {
            definitions: Vec::new(),
            by_name: HashMap::new(),
            token_names: Vec::new(),
            tokens_by_name: HashMap::new(),
            matcher: SelectorMatcher::new(),
        }
    }

    /// Register a definition, validating its selector and name. Returns the
    /// identity all later lookups key on.
    pub fn register(&mut self, definition: DirectiveDefinition) -> Result<DefId> {
        if self.by_name.contains_key(&definition.name) {
            return Err(RuntimeError::DuplicateDirectiveName {
                name: definition.name.clone(),
            });
        }
        if !definition.is_component && !definition.view_providers.is_empty() {
            return Err(RuntimeError::InvalidDefinition {
                name: definition.name.clone(),
                reason: "view providers are only valid on components".to_string(),
            });
        }
        if definition.is_component && definition.selector.is_none() {
            return Err(RuntimeError::InvalidDefinition {
                name: definition.name.clone(),
                reason: "components require a selector".to_string(),
            });
        }

        let id = DefId(self.definitions.len());

        if let Some(ref selector) = definition.selector {
            for parsed in CssSelector::parse(selector)? {
                self.matcher.add_selectable(parsed, id);
            }
        }

        self.by_name.insert(definition.name.clone(), id);
        self.definitions.push(Rc::new(definition));
        Ok(id)
    }

    /// Intern a token by name. Repeated calls return the same key.
    pub fn token(&mut self, name: &str) -> TokenKey {
        if let Some(&key) = self.tokens_by_name.get(name) {
            return key;
        }
        let key = TokenKey(self.token_names.len());
        self.token_names.push(name.to_string());
        self.tokens_by_name.insert(name.to_string(), key);
        key
    }

    pub fn token_name(&self, token: TokenKey) -> &str {
        &self.token_names[token.0]
    }

    pub fn def(&self, id: DefId) -> Rc<DirectiveDefinition> {
        self.definitions[id.0].clone()
    }

    pub fn name_of(&self, id: DefId) -> &str {
        &self.definitions[id.0].name
    }

    pub fn find(&self, name: &str) -> Option<DefId> {
        self.by_name.get(name).copied()
    }

    pub fn resolve_ref(&self, reference: &DirectiveRef) -> Result<DefId> {
        reference.resolve(self)
    }

    /// All definitions whose selector matches the given element selector, in
    /// registration order with the component (if any) first.
    pub fn match_element(&self, target: &CssSelector) -> Vec<DefId> {
        let mut matched: Vec<DefId> = Vec::new();
        self.matcher.match_selector(target, |_, &id| {
            if !matched.contains(&id) {
                matched.push(id);
            }
        });
        matched.sort_unstable();
        // Component first among selector-matched directives.
        matched.sort_by_key(|id| !self.definitions[id.0].is_component);
        matched
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        Self::new()
    }
}
