//! Instance access mediation.
//!
//! Every object produced by [`crate::define::Definition::load`] comes back
//! as a [`Handle`]. When the composed instance declares at least one
//! virtual member the handle mediates all five operations (read, write,
//! enumerate, has, delete) plus method dispatch; when it declares none, the
//! raw instance is handed out and nothing is intercepted. That skip is a
//! documented constraint of the system, not an optimization to second-guess:
//! protected/private enforcement is only active when a hook exists.
//!
//! Internal callers are recognized by an identity token, never by call-stack
//! inspection: dispatch binds every method invocation to the [`ScopeId`] of
//! the definition level that declared the method, and the guard compares
//! tokens against the instance's lineage.

use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, trace, warn};

use crate::ds::error::ClaspError;
use crate::ds::instance::{InstanceRef, ScopeId};
use crate::ds::member::{classify, is_constant, BoundMethod, SetHook, Slot, Visibility};
use crate::ds::value::Value;

/// Who is performing a guard operation.
#[derive(Clone, Copy)]
pub(crate) enum Caller {
    External,
    Internal(ScopeId),
}

impl Caller {
    fn is_internal(&self) -> bool {
        match self {
            Caller::Internal(_) => true,
            Caller::External => false,
        }
    }
}

/// Whether a materialized slot resolves raw for this caller.
///
/// Reserved and Public names always do. Protected needs any internal token.
/// Private needs the token of the exact level that declared the slot, so a
/// private member never crosses a class boundary.
fn slot_visible(name: &str, slot: &Slot, caller: Caller) -> bool {
    match classify(name) {
        Visibility::Public | Visibility::Reserved => true,
        Visibility::Protected => caller.is_internal(),
        Visibility::Private => match caller {
            Caller::Internal(token) => token == slot.scope,
            Caller::External => false,
        },
    }
}

fn public_keys(instance: &InstanceRef) -> Vec<String> {
    instance
        .borrow()
        .slots
        .keys()
        .filter(|name| classify(name) == Visibility::Public)
        .cloned()
        .collect()
}

pub(crate) fn read(instance: &InstanceRef, name: &str, caller: Caller) -> Option<Value> {
    let hook = {
        let state = instance.borrow();
        if let Some(slot) = state.slots.get(name) {
            if slot_visible(name, slot, caller) {
                return Some(slot.value.clone());
            }
        }
        if caller.is_internal() {
            // Internal misses resolve raw; hooks are not consulted.
            return None;
        }
        state.virtuals.get.clone()
    };
    match hook {
        Some((hook, scope)) => {
            trace!("read '{}' delegated to get hook", name);
            let mut cs = CallScope::new(instance.clone(), scope);
            hook(&mut cs, name)
        }
        None => None,
    }
}

enum WriteAction {
    Done,
    Direct(ScopeId),
    Hook(SetHook, ScopeId),
}

pub(crate) fn write(instance: &InstanceRef, name: &str, value: Value, caller: Caller) {
    let action = {
        let state = instance.borrow();
        let existing = state.slots.get(name).map(|slot| slot.scope);
        if existing.is_some() && is_constant(name) {
            debug!("write to constant '{}' ignored", name);
            WriteAction::Done
        } else if let Some(scope) = existing {
            WriteAction::Direct(scope)
        } else if let Caller::Internal(token) = caller {
            // A fresh slot belongs to the level of the writing method, so a
            // private member it creates stays readable at that level only.
            WriteAction::Direct(token)
        } else {
            match state.virtuals.set.clone() {
                Some((hook, scope)) => WriteAction::Hook(hook, scope),
                // Leniency over strictness: no hook means the external
                // write lands in storage instead of failing.
                None => WriteAction::Direct(state.leaf_scope()),
            }
        }
    };
    match action {
        WriteAction::Done => {}
        WriteAction::Direct(scope) => {
            instance
                .borrow_mut()
                .slots
                .insert(name.to_string(), Slot { value, scope });
        }
        WriteAction::Hook(hook, scope) => {
            trace!("write '{}' delegated to set hook", name);
            let mut cs = CallScope::new(instance.clone(), scope);
            hook(&mut cs, name, value);
        }
    }
}

pub(crate) fn enumerate(instance: &InstanceRef) -> Vec<String> {
    let hook = { instance.borrow().virtuals.enumerate.clone() };
    match hook {
        Some((hook, scope)) => {
            let mut cs = CallScope::new(instance.clone(), scope);
            hook(&mut cs)
        }
        None => public_keys(instance),
    }
}

/// Membership test. Unlike `read`, the hookless default is a plain
/// ownership check that does not hide protected or private names. The
/// asymmetry is observed behavior of the system and is kept as-is.
pub(crate) fn has(instance: &InstanceRef, name: &str) -> bool {
    if classify(name) == Visibility::Reserved {
        return instance.borrow().slots.contains_key(name);
    }
    let hook = { instance.borrow().virtuals.has.clone() };
    match hook {
        Some((hook, scope)) => {
            let mut cs = CallScope::new(instance.clone(), scope);
            hook(&mut cs, name)
        }
        None => instance.borrow().slots.contains_key(name),
    }
}

pub(crate) fn delete(instance: &InstanceRef, name: &str, caller: Caller) {
    let hook = {
        let mut state = instance.borrow_mut();
        if state.slots.contains_key(name) || classify(name) == Visibility::Reserved {
            state.slots.shift_remove(name);
            return;
        }
        if caller.is_internal() {
            None
        } else {
            state.virtuals.delete.clone()
        }
    };
    if let Some((hook, scope)) = hook {
        trace!("delete '{}' delegated to delete hook", name);
        let mut cs = CallScope::new(instance.clone(), scope);
        hook(&mut cs, name);
    }
    // No hook and nothing materialized: a no-op, not an error.
}

pub(crate) fn call(
    instance: &InstanceRef,
    name: &str,
    args: &[Value],
    caller: Caller,
) -> Result<Value, ClaspError> {
    let resolved = {
        let state = instance.borrow();
        match state.slots.get(name) {
            Some(slot) if slot_visible(name, slot, caller) => match &slot.value {
                Value::Method(func) => Some(BoundMethod {
                    func: func.clone(),
                    scope: slot.scope,
                }),
                _ => return Err(ClaspError::NotCallable(name.to_string())),
            },
            _ => None,
        }
    };
    let bound = match resolved {
        Some(bound) => bound,
        None => {
            // A get hook may produce a callable; it runs with the leaf
            // scope since no level materialized it.
            let leaf = instance.borrow().leaf_scope();
            match read(instance, name, caller) {
                Some(Value::Method(func)) => BoundMethod { func, scope: leaf },
                _ => return Err(ClaspError::NotCallable(name.to_string())),
            }
        }
    };
    let mut cs = CallScope::new(instance.clone(), bound.scope);
    (bound.func)(&mut cs, args)
}

/// Internal-context view of an instance, handed to every method and hook
/// invocation. Operations carry the capability token of the declaring
/// level, so protected members resolve and private members resolve exactly
/// at their own level.
pub struct CallScope {
    instance: InstanceRef,
    token: ScopeId,
}

impl CallScope {
    pub(crate) fn new(instance: InstanceRef, token: ScopeId) -> Self {
        CallScope { instance, token }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        read(&self.instance, name, Caller::Internal(self.token))
    }

    pub fn set<V: Into<Value>>(&mut self, name: &str, value: V) {
        write(
            &self.instance,
            name,
            value.into(),
            Caller::Internal(self.token),
        );
    }

    pub fn has(&self, name: &str) -> bool {
        has(&self.instance, name)
    }

    pub fn keys(&self) -> Vec<String> {
        enumerate(&self.instance)
    }

    pub fn remove(&mut self, name: &str) {
        delete(&self.instance, name, Caller::Internal(self.token));
    }

    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value, ClaspError> {
        call(&self.instance, name, args, Caller::Internal(self.token))
    }

    /// Single-level view of the immediate parent's member set, present only
    /// on instances of `extend`-created definitions.
    pub fn ancestor(&self) -> Option<AncestorScope> {
        let members = self.instance.borrow().ancestor.clone()?;
        Some(AncestorScope {
            instance: self.instance.clone(),
            token: self.token,
            members,
        })
    }
}

/// Controlled view of the ancestor's member set.
///
/// Lookups go against the parent's merge state, so a member the child
/// overrides still resolves to its parent version. The visibility check
/// still uses the *calling* method's token: an inherited protected member
/// resolves, a parent private member does not.
pub struct AncestorScope {
    instance: InstanceRef,
    token: ScopeId,
    members: Rc<IndexMap<String, Slot>>,
}

impl AncestorScope {
    fn lookup(&self, name: &str) -> Option<Slot> {
        self.members.get(name).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let slot = self.lookup(name)?;
        if slot_visible(name, &slot, Caller::Internal(self.token)) {
            Some(slot.value)
        } else {
            None
        }
    }

    /// Ownership check against the parent level only. Like [`Handle::has`],
    /// it does not hide protected or private names.
    pub fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, ClaspError> {
        let slot = self
            .lookup(name)
            .ok_or_else(|| ClaspError::NotCallable(name.to_string()))?;
        if !slot_visible(name, &slot, Caller::Internal(self.token)) {
            return Err(ClaspError::NotCallable(name.to_string()));
        }
        match slot.value {
            Value::Method(func) => {
                // The parent method runs with its own declaring scope, so
                // it keeps access to the parent's private members.
                let mut cs = CallScope::new(self.instance.clone(), slot.scope);
                func(&mut cs, args)
            }
            _ => Err(ClaspError::NotCallable(name.to_string())),
        }
    }
}

/// Stateless mediation wrapper: exactly one reference to its instance,
/// created once per instance.
#[derive(Clone)]
pub struct Guard {
    instance: InstanceRef,
}

/// The caller-visible instance.
#[derive(Clone)]
pub enum Handle {
    /// No virtual members declared: zero interception.
    Raw(InstanceRef),
    /// At least one virtual member declared: all operations are mediated.
    Guarded(Guard),
}

impl Handle {
    /// Wraps a freshly constructed instance. With no virtual members the
    /// raw instance is returned; with virtual members but no interception
    /// support from the host engine, construction fails; degrading
    /// silently would change observable visibility behavior.
    pub(crate) fn wrap(instance: InstanceRef, interception: bool) -> Result<Handle, ClaspError> {
        let hooked = !instance.borrow().virtuals.is_empty();
        if !hooked {
            debug!("no virtual members declared; guard skipped");
            return Ok(Handle::Raw(instance));
        }
        if !interception {
            warn!("virtual members declared but composition engine offers no interception");
            return Err(ClaspError::HostCapability(
                "instance declares virtual members but the composition engine \
                 offers no interception mechanism"
                    .to_string(),
            ));
        }
        Ok(Handle::Guarded(Guard { instance }))
    }

    fn instance(&self) -> &InstanceRef {
        match self {
            Handle::Raw(instance) => instance,
            Handle::Guarded(guard) => &guard.instance,
        }
    }

    pub fn is_guarded(&self) -> bool {
        match self {
            Handle::Guarded(_) => true,
            Handle::Raw(_) => false,
        }
    }

    /// Instance identity: two handles are the same object when they share
    /// storage.
    pub fn same(&self, other: &Handle) -> bool {
        Rc::ptr_eq(self.instance(), other.instance())
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        match self {
            Handle::Raw(instance) => instance.borrow().slots.get(name).map(|s| s.value.clone()),
            Handle::Guarded(guard) => read(&guard.instance, name, Caller::External),
        }
    }

    pub fn set<V: Into<Value>>(&self, name: &str, value: V) {
        match self {
            Handle::Raw(instance) => {
                // Constant patrol applies at the storage level even without
                // mediation.
                let scope = {
                    let state = instance.borrow();
                    if state.slots.contains_key(name) && is_constant(name) {
                        debug!("write to constant '{}' ignored", name);
                        return;
                    }
                    state
                        .slots
                        .get(name)
                        .map(|s| s.scope)
                        .unwrap_or_else(|| state.leaf_scope())
                };
                instance.borrow_mut().slots.insert(
                    name.to_string(),
                    Slot {
                        value: value.into(),
                        scope,
                    },
                );
            }
            Handle::Guarded(guard) => {
                write(&guard.instance, name, value.into(), Caller::External)
            }
        }
    }

    /// Default enumeration: public own member names in declaration order.
    /// Protected/Private/Reserved are excluded purely by name shape.
    pub fn keys(&self) -> Vec<String> {
        match self {
            Handle::Raw(instance) => public_keys(instance),
            Handle::Guarded(guard) => enumerate(&guard.instance),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        match self {
            Handle::Raw(instance) => instance.borrow().slots.contains_key(name),
            Handle::Guarded(guard) => has(&guard.instance, name),
        }
    }

    pub fn remove(&self, name: &str) {
        match self {
            Handle::Raw(instance) => {
                instance.borrow_mut().slots.shift_remove(name);
            }
            Handle::Guarded(guard) => delete(&guard.instance, name, Caller::External),
        }
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, ClaspError> {
        match self {
            Handle::Raw(instance) => {
                // Zero interception: resolve against storage directly.
                let bound = {
                    let state = instance.borrow();
                    match state.slots.get(name) {
                        Some(slot) => match &slot.value {
                            Value::Method(func) => BoundMethod {
                                func: func.clone(),
                                scope: slot.scope,
                            },
                            _ => return Err(ClaspError::NotCallable(name.to_string())),
                        },
                        None => return Err(ClaspError::NotCallable(name.to_string())),
                    }
                };
                let mut cs = CallScope::new(instance.clone(), bound.scope);
                (bound.func)(&mut cs, args)
            }
            Handle::Guarded(guard) => call(&guard.instance, name, args, Caller::External),
        }
    }

    /// Runs the reserved `___construct` initializer if the instance has
    /// one. Called exactly once, at instantiation.
    pub(crate) fn run_construct(&self, args: &[Value]) -> Result<(), ClaspError> {
        let has_construct = {
            let state = self.instance().borrow();
            match state.slots.get(crate::ds::member::CONSTRUCT_MEMBER) {
                Some(slot) => match slot.value {
                    Value::Method(_) => true,
                    _ => false,
                },
                None => false,
            }
        };
        if has_construct {
            self.call(crate::ds::member::CONSTRUCT_MEMBER, args)?;
        }
        Ok(())
    }
}
