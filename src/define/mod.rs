//! The definition builder: composable blueprints for object types.
//!
//! A [`Definition`] collects own members, an ordered trait list, declared
//! virtual members and flags, then `load()` runs it through the
//! composition engine and wraps the result in the access guard.

pub mod locator;
pub mod namespace;

use std::cell::RefCell;
use std::panic::Location;
use std::rc::Rc;

use log::{debug, trace};

use crate::compose::{Blueprint, Composer, ConflictPolicy, DefaultComposer};
use crate::define::namespace::{Namespace, ResolvedModule};
use crate::ds::error::ClaspError;
use crate::ds::instance::ScopeId;
use crate::ds::member::{Members, MembersSource, VirtualMembers};
use crate::ds::value::Value;
use crate::guard::Handle;

/// Source accepted by [`Definition::with_trait`].
pub enum TraitSource {
    /// A literal member map, merged as an anonymous level.
    Members(Members),
    /// Another definition, merged with all of its own traits.
    Definition(Definition),
    /// A registered name, or failing that a caller-relative path for the
    /// module resolver chain.
    Named(String),
}

impl From<Members> for TraitSource {
    fn from(members: Members) -> Self {
        TraitSource::Members(members)
    }
}

impl From<Definition> for TraitSource {
    fn from(definition: Definition) -> Self {
        TraitSource::Definition(definition)
    }
}

impl From<&Definition> for TraitSource {
    fn from(definition: &Definition) -> Self {
        TraitSource::Definition(definition.clone())
    }
}

impl From<&str> for TraitSource {
    fn from(name: &str) -> Self {
        TraitSource::Named(name.to_string())
    }
}

impl From<String> for TraitSource {
    fn from(name: String) -> Self {
        TraitSource::Named(name)
    }
}

/// Source accepted by [`Definition::extend`]: the child's own members.
pub enum ExtendSource {
    Members(Members),
    /// A caller-relative path that must resolve to a member map.
    Named(String),
}

impl From<Members> for ExtendSource {
    fn from(members: Members) -> Self {
        ExtendSource::Members(members)
    }
}

impl From<&str> for ExtendSource {
    fn from(name: &str) -> Self {
        ExtendSource::Named(name.to_string())
    }
}

impl From<String> for ExtendSource {
    fn from(name: String) -> Self {
        ExtendSource::Named(name)
    }
}

struct DefinitionState {
    name: Option<String>,
    scope: ScopeId,
    own: Vec<MembersSource>,
    traits: Vec<Definition>,
    virtuals: VirtualMembers,
    parent: Option<Definition>,
    singleton: bool,
    cache: Option<Handle>,
    policy: ConflictPolicy,
    composer: Rc<dyn Composer>,
    namespace: Namespace,
}

/// A composable blueprint for an object type: own members plus an ordered
/// trait list plus flags. Cheaply clonable; clones share state, so a
/// definition can be used as a trait of several others.
#[derive(Clone)]
pub struct Definition {
    state: Rc<RefCell<DefinitionState>>,
}

impl Definition {
    /// A definition bound to a fresh private namespace. Use
    /// [`Namespace::define`] to share a registry between definitions.
    pub fn new() -> Definition {
        Namespace::new().define()
    }

    pub(crate) fn bound_to(namespace: Namespace) -> Definition {
        Definition {
            state: Rc::new(RefCell::new(DefinitionState {
                name: None,
                scope: ScopeId::mint(),
                own: Vec::new(),
                traits: Vec::new(),
                virtuals: VirtualMembers::default(),
                parent: None,
                singleton: false,
                cache: None,
                policy: ConflictPolicy::default(),
                composer: Rc::new(DefaultComposer),
                namespace,
            })),
        }
    }

    /// Sets a debug name. Chainable.
    pub fn named<S: Into<String>>(&self, name: S) -> &Self {
        self.state.borrow_mut().name = Some(name.into());
        self
    }

    /// Merges own members from a literal map. Own members always override
    /// every trait. Chainable; repeated calls merge.
    pub fn define<S: Into<Members>>(&self, members: S) -> &Self {
        self.state
            .borrow_mut()
            .own
            .push(MembersSource::Map(members.into()));
        self
    }

    /// Merges own members from a factory run once per instantiation, for
    /// members that need fresh per-instance state.
    pub fn define_with<F: Fn() -> Members + 'static>(&self, factory: F) -> &Self {
        self.state
            .borrow_mut()
            .own
            .push(MembersSource::Factory(Rc::new(factory)));
        self
    }

    /// Appends to the ordered trait list. Later traits override earlier
    /// ones; own members override all. String sources try the namespace
    /// registry first, then resolve as a path relative to the calling
    /// source file.
    #[track_caller]
    pub fn with_trait<S: Into<TraitSource>>(&self, source: S) -> Result<&Self, ClaspError> {
        let caller_file = Location::caller().file();
        self.add_trait(source.into(), caller_file)
    }

    fn add_trait(&self, source: TraitSource, caller_file: &str) -> Result<&Self, ClaspError> {
        let definition = match source {
            TraitSource::Definition(definition) => definition,
            TraitSource::Members(members) => self.anonymous_trait(members),
            TraitSource::Named(name) => self.resolve_named(&name, caller_file)?,
        };
        self.state.borrow_mut().traits.push(definition);
        Ok(self)
    }

    fn anonymous_trait(&self, members: Members) -> Definition {
        let namespace = self.state.borrow().namespace.clone();
        let definition = Definition::bound_to(namespace);
        definition.define(members);
        definition
    }

    fn resolve_named(&self, name: &str, caller_file: &str) -> Result<Definition, ClaspError> {
        let namespace = self.state.borrow().namespace.clone();
        if let Some(definition) = namespace.lookup(name) {
            trace!("trait '{}' found in namespace", name);
            return Ok(definition);
        }
        match locator::resolve_relative(caller_file, name, &namespace)? {
            ResolvedModule::Definition(definition) => Ok(definition),
            ResolvedModule::Members(members) => Ok(self.anonymous_trait(members)),
        }
    }

    /// Creates a child definition: own members from `source`, sole trait
    /// this definition, tagged so instances expose exactly one ancestor
    /// level.
    #[track_caller]
    pub fn extend<S: Into<ExtendSource>>(&self, source: S) -> Result<Definition, ClaspError> {
        let caller_file = Location::caller().file();
        let members = match source.into() {
            ExtendSource::Members(members) => members,
            ExtendSource::Named(name) => {
                let namespace = self.state.borrow().namespace.clone();
                if namespace.lookup(&name).is_some() {
                    return Err(ClaspError::Resolution(format!(
                        "extend source '{}' resolves to a definition, not a member map",
                        name
                    )));
                }
                match locator::resolve_relative(caller_file, &name, &namespace)? {
                    ResolvedModule::Members(members) => members,
                    ResolvedModule::Definition(_) => {
                        return Err(ClaspError::Resolution(format!(
                            "extend source '{}' resolves to a definition, not a member map",
                            name
                        )))
                    }
                }
            }
        };
        let namespace = self.state.borrow().namespace.clone();
        let child = Definition::bound_to(namespace);
        {
            let mut state = child.state.borrow_mut();
            state.own.push(MembersSource::Map(members));
            state.traits.push(self.clone());
            state.parent = Some(self.clone());
        }
        Ok(child)
    }

    /// Publishes this definition into its namespace for later string-based
    /// trait lookups. Last registration under a name wins. Chainable.
    pub fn register<S: Into<String>>(&self, name: S) -> &Self {
        let namespace = self.state.borrow().namespace.clone();
        namespace.register(name, self.clone());
        self
    }

    /// Toggles single-shared-instance semantics. Chainable.
    pub fn singleton(&self, singleton: bool) -> &Self {
        self.state.borrow_mut().singleton = singleton;
        self
    }

    /// Declares the virtual-member capability. Replaces any previously
    /// declared set for this level. Chainable.
    pub fn virtuals(&self, virtuals: VirtualMembers) -> &Self {
        self.state.borrow_mut().virtuals = virtuals;
        self
    }

    /// Chooses how member-name collisions across levels are resolved.
    /// Chainable.
    pub fn conflict_policy(&self, policy: ConflictPolicy) -> &Self {
        self.state.borrow_mut().policy = policy;
        self
    }

    /// Swaps the composition engine. Chainable.
    pub fn with_composer(&self, composer: Rc<dyn Composer>) -> &Self {
        self.state.borrow_mut().composer = composer;
        self
    }

    pub fn name(&self) -> Option<String> {
        self.state.borrow().name.clone()
    }

    /// Identity of this definition level.
    pub fn scope(&self) -> ScopeId {
        self.state.borrow().scope
    }

    /// The ordered trait list.
    pub fn parents(&self) -> Vec<Definition> {
        self.state.borrow().traits.clone()
    }

    /// The immediate parent, present only on `extend`-created definitions.
    pub fn parent(&self) -> Option<Definition> {
        self.state.borrow().parent.clone()
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.state.borrow().policy
    }

    pub fn own_sources(&self) -> Vec<MembersSource> {
        self.state.borrow().own.clone()
    }

    pub fn declared_virtuals(&self) -> VirtualMembers {
        self.state.borrow().virtuals.clone()
    }

    /// Composes the reusable loader for this definition.
    pub fn blueprint(&self) -> Result<Blueprint, ClaspError> {
        let composer = self.state.borrow().composer.clone();
        let mut blueprint = composer.compose(self)?;
        blueprint.set_interception(composer.supports_interception());
        Ok(blueprint)
    }

    /// Obtains an instance: composes, instantiates and wraps it in the
    /// access guard. On a singleton definition the first instance is
    /// memoized for the life of the definition and later calls return it,
    /// ignoring their arguments.
    pub fn load(&self, args: &[Value]) -> Result<Handle, ClaspError> {
        let (singleton, cached) = {
            let state = self.state.borrow();
            (state.singleton, state.cache.clone())
        };
        if singleton {
            if let Some(handle) = cached {
                debug!(
                    "singleton reuse of '{}'; arguments ignored",
                    self.name().unwrap_or_else(|| "<unnamed>".to_string())
                );
                return Ok(handle);
            }
        }
        let handle = self.blueprint()?.instantiate(args)?;
        if singleton {
            self.state.borrow_mut().cache = Some(handle.clone());
        }
        Ok(handle)
    }
}

impl Default for Definition {
    fn default() -> Self {
        Definition::new()
    }
}

impl std::fmt::Debug for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        write!(
            f,
            "Definition(name={:?}, traits={}, singleton={})",
            state.name,
            state.traits.len(),
            state.singleton
        )
    }
}
