//! Selector Parsing and Matching
//!
//! A reduced CSS selector dialect for matching directives against elements:
//! element tags, `.class`, `#id`, `[attr]`, `[attr=value]` and
//! comma-separated lists. Tags and attribute names match case-sensitively;
//! class names and attribute values case-insensitively.

use std::collections::{HashMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, RuntimeError};

static SELECTOR_REGEXP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:([.#]?)([-\w]+))|(?:\[([-\w]+)(?:=(?:"([^"]*)"|'([^']*)'|([^\]]*)))?\])|(\s*,\s*)"#)
        .unwrap()
});

// Capture group indices in SELECTOR_REGEXP.
const GROUP_PREFIX: usize = 1;
const GROUP_NAME: usize = 2;
const GROUP_ATTR: usize = 3;
const GROUP_ATTR_VALUE_DOUBLE: usize = 4;
const GROUP_ATTR_VALUE_SINGLE: usize = 5;
const GROUP_ATTR_VALUE_UNQUOTED: usize = 6;
const GROUP_SEPARATOR: usize = 7;

/// One parsed selector: an optional element tag plus required classes and
/// attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CssSelector {
    pub element: Option<String>,
    pub class_names: Vec<String>,
    pub attrs: Vec<(String, String)>,
}

impl CssSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a selector string into one `CssSelector` per comma-separated
    /// alternative.
    pub fn parse(selector: &str) -> Result<Vec<CssSelector>> {
        let invalid = |reason: &str| RuntimeError::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        };

        let mut results = Vec::new();
        let mut current = CssSelector::new();

        for cap in SELECTOR_REGEXP.captures_iter(selector) {
            if let Some(name) = cap.get(GROUP_NAME) {
                let prefix = cap.get(GROUP_PREFIX).map(|m| m.as_str()).unwrap_or("");
                match prefix {
                    "." => current.add_class_name(name.as_str()),
                    "#" => current.add_attribute("id", name.as_str()),
                    _ => {
                        if current.element.is_some() {
                            return Err(invalid("only one element tag is allowed"));
                        }
                        current.set_element(name.as_str());
                    }
                }
            }

            if let Some(attr) = cap.get(GROUP_ATTR) {
                let value = cap
                    .get(GROUP_ATTR_VALUE_DOUBLE)
                    .or_else(|| cap.get(GROUP_ATTR_VALUE_SINGLE))
                    .or_else(|| cap.get(GROUP_ATTR_VALUE_UNQUOTED))
                    .map(|m| m.as_str())
                    .unwrap_or("");
                current.add_attribute(attr.as_str(), value);
            }

            if cap.get(GROUP_SEPARATOR).is_some() {
                if current.is_empty() {
                    return Err(invalid("empty selector before \",\""));
                }
                results.push(std::mem::take(&mut current));
            }
        }

        if current.is_empty() {
            return Err(invalid("empty selector"));
        }
        results.push(current);
        Ok(results)
    }

    pub fn set_element(&mut self, element: &str) {
        self.element = Some(element.to_string());
    }

    pub fn add_class_name(&mut self, name: &str) {
        self.class_names.push(name.to_lowercase());
    }

    pub fn add_attribute(&mut self, name: &str, value: &str) {
        self.attrs.push((name.to_string(), value.to_lowercase()));
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.element.is_none() && self.class_names.is_empty() && self.attrs.is_empty()
    }
}

impl fmt::Display for CssSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref element) = self.element {
            write!(f, "{}", element)?;
        }
        for class_name in &self.class_names {
            write!(f, ".{}", class_name)?;
        }
        for (name, value) in &self.attrs {
            if value.is_empty() {
                write!(f, "[{}]", name)?;
            } else {
                write!(f, "[{}={}]", name, value)?;
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
struct SelectorEntry<T> {
    selector: CssSelector,
    data: T,
    id: usize,
}

/// Indexes selectors by element tag, class name and attribute name, and
/// matches a concrete element selector against them.
///
/// Matches are reported at most once per registered selectable, ordered by
/// registration.
pub struct SelectorMatcher<T> {
    element_map: HashMap<String, Vec<SelectorEntry<T>>>,
    class_map: HashMap<String, Vec<SelectorEntry<T>>>,
    attr_map: HashMap<String, Vec<SelectorEntry<T>>>,
    next_id: usize,
}

impl<T: Clone> SelectorMatcher<T> {
    pub fn new() -> Self {
        SelectorMatcher {
            element_map: HashMap::new(),
            class_map: HashMap::new(),
            attr_map: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn add_selectable(&mut self, selector: CssSelector, data: T) {
        let entry = SelectorEntry {
            selector,
            data,
            id: self.next_id,
        };
        self.next_id += 1;

        if let Some(ref element) = entry.selector.element {
            self.element_map
                .entry(element.clone())
                .or_default()
                .push(entry.clone());
        }
        for class_name in &entry.selector.class_names {
            self.class_map
                .entry(class_name.clone())
                .or_default()
                .push(entry.clone());
        }
        for (name, _) in &entry.selector.attrs {
            self.attr_map
                .entry(name.clone())
                .or_default()
                .push(entry.clone());
        }
    }

    /// Match `target` against all indexed selectors, invoking `callback` once
    /// per matching selectable in registration order. Returns whether
    /// anything matched.
    pub fn match_selector<F>(&self, target: &CssSelector, mut callback: F) -> bool
    where
        F: FnMut(&CssSelector, &T),
    {
        let mut groups: Vec<&Vec<SelectorEntry<T>>> = Vec::new();
        if let Some(ref element) = target.element {
            if let Some(group) = self.element_map.get(element) {
                groups.push(group);
            }
        }
        for class_name in &target.class_names {
            if let Some(group) = self.class_map.get(class_name) {
                groups.push(group);
            }
        }
        for (name, _) in &target.attrs {
            if let Some(group) = self.attr_map.get(name) {
                groups.push(group);
            }
        }

        let mut seen: HashSet<usize> = HashSet::new();
        let mut candidates: Vec<&SelectorEntry<T>> = Vec::new();
        for group in groups {
            for entry in group {
                if seen.insert(entry.id) {
                    candidates.push(entry);
                }
            }
        }
        candidates.sort_by_key(|entry| entry.id);

        let mut matched = false;
        for entry in candidates {
            if selector_matches(target, &entry.selector) {
                callback(&entry.selector, &entry.data);
                matched = true;
            }
        }
        matched
    }
}

impl<T: Clone> Default for SelectorMatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `pattern` applies to the concrete element selector `target`.
fn selector_matches(target: &CssSelector, pattern: &CssSelector) -> bool {
    if let Some(ref pattern_element) = pattern.element {
        if target.element.as_deref() != Some(pattern_element.as_str()) {
            return false;
        }
    }

    for class_name in &pattern.class_names {
        if !target.class_names.contains(class_name) {
            return false;
        }
    }

    for (name, value) in &pattern.attrs {
        let found = target.attrs.iter().any(|(target_name, target_value)| {
            target_name == name && (value.is_empty() || target_value.eq_ignore_ascii_case(value))
        });
        if !found {
            return false;
        }
    }

    true
}
