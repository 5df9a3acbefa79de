//! Directive Definitions
//!
//! The static description of a directive or component: selector, host
//! bindings, providers, composed host directives and declared lifecycle
//! hooks. Definitions are immutable once registered; instances are produced
//! by the definition's factory during element setup.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;

use crate::core::{DefId, Directive, HookFlags, TokenKey};
use crate::errors::{Result, RuntimeError};
use crate::host_bindings::{HostBindingsSpec, HostListener};
use crate::injector::ConstructionInjector;
use crate::registry::DirectiveRegistry;

/// Constructor for a directive instance. Receives a construction-scoped
/// injector for resolving the dependencies the directive declares.
pub type DirectiveFactory =
    Rc<dyn Fn(&mut ConstructionInjector<'_>) -> Result<Box<dyn Directive>>>;

/// Reference to a directive definition, possibly deferred.
#[derive(Clone)]
pub enum DirectiveRef {
    Direct(DefId),
    Forward(Rc<ForwardRef>),
}

impl DirectiveRef {
    pub fn resolve(&self, registry: &DirectiveRegistry) -> Result<DefId> {
        match self {
            DirectiveRef::Direct(id) => Ok(*id),
            DirectiveRef::Forward(handle) => handle.resolve(registry),
        }
    }
}

impl From<DefId> for DirectiveRef {
    fn from(id: DefId) -> Self {
        DirectiveRef::Direct(id)
    }
}

impl From<Rc<ForwardRef>> for DirectiveRef {
    fn from(handle: Rc<ForwardRef>) -> Self {
        DirectiveRef::Forward(handle)
    }
}

impl fmt::Debug for DirectiveRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveRef::Direct(id) => write!(f, "DirectiveRef::Direct({:?})", id),
            DirectiveRef::Forward(handle) => {
                write!(f, "DirectiveRef::Forward({:?})", handle.label)
            }
        }
    }
}

/// Lazily-resolved directive reference.
///
/// Holds a resolver evaluated against the registry on first use; the result
/// is memoized, so resolution is idempotent and the resolver runs at most
/// once.
pub struct ForwardRef {
    label: String,
    cell: OnceCell<DefId>,
    resolver: Box<dyn Fn(&DirectiveRegistry) -> Option<DefId>>,
}

impl ForwardRef {
    pub fn new(
        label: impl Into<String>,
        resolver: impl Fn(&DirectiveRegistry) -> Option<DefId> + 'static,
    ) -> Rc<Self> {
        Rc::new(ForwardRef {
            label: label.into(),
            cell: OnceCell::new(),
            resolver: Box::new(resolver),
        })
    }

    /// Forward reference resolved by directive name at first use.
    pub fn by_name(name: &str) -> Rc<Self> {
        let lookup = name.to_string();
        Self::new(name, move |registry| registry.find(&lookup))
    }

    pub fn resolve(&self, registry: &DirectiveRegistry) -> Result<DefId> {
        self.cell
            .get_or_try_init(|| {
                (self.resolver)(registry).ok_or_else(|| RuntimeError::UnresolvedForwardRef {
                    name: self.label.clone(),
                })
            })
            .copied()
    }
}

/// One host directive applied by a definition, with the inputs/outputs it
/// chooses to expose under optional aliases.
#[derive(Debug, Clone)]
pub struct HostDirectiveEntry {
    pub directive: DirectiveRef,
    /// Binding name on the host directive -> name exposed on the composer.
    pub exposed_inputs: IndexMap<String, String>,
    pub exposed_outputs: IndexMap<String, String>,
}

impl HostDirectiveEntry {
    pub fn new(directive: impl Into<DirectiveRef>) -> Self {
        HostDirectiveEntry {
            directive: directive.into(),
            exposed_inputs: IndexMap::new(),
            exposed_outputs: IndexMap::new(),
        }
    }

    pub fn expose_input(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.exposed_inputs.insert(name.into(), alias.into());
        self
    }

    pub fn expose_output(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.exposed_outputs.insert(name.into(), alias.into());
        self
    }
}

#[derive(Clone)]
pub(crate) enum ProviderValue {
    Value(Rc<dyn Any>),
    Factory(Rc<dyn Fn() -> Rc<dyn Any>>),
}

/// A DI provider declared by a directive definition.
#[derive(Clone)]
pub struct Provider {
    pub token: TokenKey,
    pub(crate) value: ProviderValue,
}

impl Provider {
    pub fn value<T: Any>(token: TokenKey, value: T) -> Self {
        Provider {
            token,
            value: ProviderValue::Value(Rc::new(value)),
        }
    }

    pub fn shared(token: TokenKey, value: Rc<dyn Any>) -> Self {
        Provider {
            token,
            value: ProviderValue::Value(value),
        }
    }

    /// Provider materialized on first resolution, once per element.
    pub fn factory(token: TokenKey, factory: impl Fn() -> Rc<dyn Any> + 'static) -> Self {
        Provider {
            token,
            value: ProviderValue::Factory(Rc::new(factory)),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").field("token", &self.token).finish()
    }
}

/// Static description of a directive or component.
#[derive(Clone)]
pub struct DirectiveDefinition {
    /// Name of the directive type. Unique per application; forward
    /// references resolve by it.
    pub name: String,
    /// Unparsed selector, or `None` for a pure host directive.
    pub selector: Option<String>,
    pub is_component: bool,
    /// Binding names of the inputs this directive declares.
    pub inputs: Vec<String>,
    /// Binding names of the outputs this directive declares.
    pub outputs: Vec<String>,
    /// Mappings applied to the host element.
    pub host: HostBindingsSpec,
    pub providers: Vec<Provider>,
    /// Providers scoped to the rendered view. Components only.
    pub view_providers: Vec<Provider>,
    /// Additional directives composed onto this definition's host element.
    pub host_directives: Vec<HostDirectiveEntry>,
    /// Lifecycle hooks instances of this definition implement.
    pub hooks: HookFlags,
    pub(crate) factory: DirectiveFactory,
}

impl DirectiveDefinition {
    pub fn directive(name: impl Into<String>) -> Self {
        DirectiveDefinition {
            name: name.into(),
            selector: None,
            is_component: false,
            inputs: Vec::new(),
            outputs: Vec::new(),
            host: HostBindingsSpec::default(),
            providers: Vec::new(),
            view_providers: Vec::new(),
            host_directives: Vec::new(),
            hooks: HookFlags::empty(),
            factory: Rc::new(|_| Ok(Box::new(NullDirective))),
        }
    }

    pub fn component(name: impl Into<String>) -> Self {
        let mut def = Self::directive(name);
        def.is_component = true;
        def
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    pub fn host_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.host.attributes.insert(name.into(), value.into());
        self
    }

    pub fn host_class(mut self, name: impl Into<String>) -> Self {
        self.host.class_names.push(name.into());
        self
    }

    pub fn host_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.host.styles.insert(property.into(), value.into());
        self
    }

    pub fn host_listener(
        mut self,
        event: impl Into<String>,
        handler: impl Fn(&mut dyn Directive) + 'static,
    ) -> Self {
        self.host.listeners.push(HostListener {
            event: event.into(),
            handler: Rc::new(handler),
        });
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn view_provider(mut self, provider: Provider) -> Self {
        self.view_providers.push(provider);
        self
    }

    /// Compose a host directive onto this definition's host element.
    pub fn compose(mut self, entry: impl Into<HostDirectiveEntry>) -> Self {
        self.host_directives.push(entry.into());
        self
    }

    pub fn hooks(mut self, hooks: HookFlags) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn factory(
        mut self,
        factory: impl Fn(&mut ConstructionInjector<'_>) -> Result<Box<dyn Directive>> + 'static,
    ) -> Self {
        self.factory = Rc::new(factory);
        self
    }
}

impl From<DefId> for HostDirectiveEntry {
    fn from(id: DefId) -> Self {
        HostDirectiveEntry::new(id)
    }
}

impl From<Rc<ForwardRef>> for HostDirectiveEntry {
    fn from(handle: Rc<ForwardRef>) -> Self {
        HostDirectiveEntry::new(handle)
    }
}

impl fmt::Debug for DirectiveDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveDefinition")
            .field("name", &self.name)
            .field("selector", &self.selector)
            .field("is_component", &self.is_component)
            .field("host_directives", &self.host_directives)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Instance used when a definition declares no factory.
struct NullDirective;

impl Directive for NullDirective {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
