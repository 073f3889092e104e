//! Explicit name registry and module resolution.
//!
//! Definitions registered under a name can be pulled in as traits by that
//! name; string sources that are not registered names fall back to
//! caller-relative paths answered by the resolver chain. A namespace is an
//! ordinary value shared by `Rc` clone; there is no process-wide table.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, trace};

use crate::define::Definition;
use crate::ds::member::Members;

/// What a module resolver materializes for a resolved path.
pub enum ResolvedModule {
    Definition(Definition),
    Members(Members),
}

/// Resolves absolute-ish paths produced by the caller locator into
/// definitions or member maps.
///
/// Resolvers are queried in registration order; the first resolver that
/// claims a path wins.
pub trait ModuleResolver {
    /// Does this resolver claim the given path? Should be a cheap check
    /// and must not materialize the module.
    fn can_resolve(&self, path: &str) -> bool;

    /// Materialize the module. Called only after `can_resolve` returned
    /// `true`; `None` means the claim could not be honored after all.
    fn resolve(&self, path: &str) -> Option<ResolvedModule>;

    /// Human-readable name for debugging/logging.
    fn name(&self) -> &str;
}

struct NamespaceState {
    definitions: RefCell<HashMap<String, Definition>>,
    resolvers: RefCell<Vec<Box<dyn ModuleResolver>>>,
}

/// Name → definition table plus the ordered module-resolver chain.
/// Cheaply clonable; clones share the same tables.
#[derive(Clone)]
pub struct Namespace {
    state: Rc<NamespaceState>,
}

impl Namespace {
    pub fn new() -> Self {
        Namespace {
            state: Rc::new(NamespaceState {
                definitions: RefCell::new(HashMap::new()),
                resolvers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// A fresh definition builder bound to this namespace.
    pub fn define(&self) -> Definition {
        Definition::bound_to(self.clone())
    }

    /// Publishes a definition under a name. Last registration wins.
    pub fn register<S: Into<String>>(&self, name: S, definition: Definition) {
        let name = name.into();
        if self
            .state
            .definitions
            .borrow_mut()
            .insert(name.clone(), definition)
            .is_some()
        {
            debug!("re-registered definition '{}'", name);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Definition> {
        self.state.definitions.borrow().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.state.definitions.borrow().keys().cloned().collect()
    }

    pub fn add_resolver(&self, resolver: Box<dyn ModuleResolver>) {
        self.state.resolvers.borrow_mut().push(resolver);
    }

    /// Asks the resolver chain, in order, to materialize a path.
    pub fn resolve_path(&self, path: &str) -> Option<ResolvedModule> {
        for resolver in self.state.resolvers.borrow().iter() {
            if resolver.can_resolve(path) {
                trace!("path '{}' claimed by resolver '{}'", path, resolver.name());
                return resolver.resolve(path);
            }
        }
        None
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace::new()
    }
}
