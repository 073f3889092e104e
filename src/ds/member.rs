use std::rc::Rc;

use indexmap::IndexMap;

use crate::ds::instance::ScopeId;
use crate::ds::value::{MethodFn, Value};
use crate::guard::CallScope;

/// Name of the reserved one-shot initializer member.
pub const CONSTRUCT_MEMBER: &str = "___construct";

/// Member visibility, derived purely from the shape of the member name:
/// the number of leading underscore markers. Storage location never
/// contributes to classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// No marker prefix. Always readable.
    Public,
    /// Single marker prefix (`_name`). Visible to methods of any level of
    /// the instance.
    Protected,
    /// Double marker prefix (`__name`). Visible only to methods declared at
    /// the exact level that declared the member.
    Private,
    /// Triple (or longer) marker prefix (`___name`). Internal names: always
    /// guard-visible, excluded from default enumeration.
    Reserved,
}

/// Classifies a member name by its marker prefix.
pub fn classify(name: &str) -> Visibility {
    match name.chars().take_while(|c| *c == '_').count() {
        0 => Visibility::Public,
        1 => Visibility::Protected,
        2 => Visibility::Private,
        _ => Visibility::Reserved,
    }
}

/// All-caps member names are constants: once materialized, writes to them
/// are silently ignored.
pub fn is_constant(name: &str) -> bool {
    let mut has_letter = false;
    for c in name.chars() {
        match c {
            'A'..='Z' => has_letter = true,
            '0'..='9' | '_' => {}
            _ => return false,
        }
    }
    has_letter
}

/// A stored member cell: the value plus the identity of the definition
/// level that declared it. The declaring scope drives the private-member
/// exact-level visibility rule.
#[derive(Clone)]
pub struct Slot {
    pub value: Value,
    pub scope: ScopeId,
}

/// An insertion-ordered member map. Declaration order is preserved through
/// trait merging and default enumeration.
#[derive(Clone, Default)]
pub struct Members {
    entries: IndexMap<String, Value>,
}

impl Members {
    pub fn new() -> Self {
        Members {
            entries: IndexMap::new(),
        }
    }

    /// Adds or replaces a member. Chainable.
    pub fn set<K: Into<String>, V: Into<Value>>(mut self, name: K, value: V) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    /// Adds a method member. Chainable sugar over [`Value::method`].
    pub fn method<K, F>(self, name: K, f: F) -> Self
    where
        K: Into<String>,
        F: Fn(&mut CallScope, &[Value]) -> Result<Value, crate::ds::error::ClaspError> + 'static,
    {
        self.set(name, Value::method(f))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

impl IntoIterator for Members {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl From<IndexMap<String, Value>> for Members {
    fn from(entries: IndexMap<String, Value>) -> Self {
        Members { entries }
    }
}

/// Source of own members for one definition level: a literal map or a
/// factory producing one. Literal maps are deep-cloned per instantiation so
/// instances never share nested state; factories run per instantiation.
#[derive(Clone)]
pub enum MembersSource {
    Map(Members),
    Factory(Rc<dyn Fn() -> Members>),
}

impl MembersSource {
    /// Produces a fresh member map for one instance.
    pub fn materialize(&self) -> Members {
        match self {
            MembersSource::Map(members) => Members {
                entries: members
                    .entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.deep_clone()))
                    .collect(),
            },
            MembersSource::Factory(f) => f(),
        }
    }
}

pub type GetHook = Rc<dyn Fn(&mut CallScope, &str) -> Option<Value>>;
pub type SetHook = Rc<dyn Fn(&mut CallScope, &str, Value)>;
pub type EnumerateHook = Rc<dyn Fn(&mut CallScope) -> Vec<String>>;
pub type HasHook = Rc<dyn Fn(&mut CallScope, &str) -> bool>;
pub type DeleteHook = Rc<dyn Fn(&mut CallScope, &str)>;

/// The declared virtual-member capability of a definition level.
///
/// A definition opts into interception by declaring one or more of the five
/// hooks; nothing is detected by member-name sniffing. When an instance ends
/// up with no hooks at all, the guard is skipped entirely and the raw
/// instance is returned; protected/private enforcement is only active when
/// at least one hook exists. That constraint is deliberate and documented.
#[derive(Clone, Default)]
pub struct VirtualMembers {
    pub(crate) get: Option<GetHook>,
    pub(crate) set: Option<SetHook>,
    pub(crate) enumerate: Option<EnumerateHook>,
    pub(crate) has: Option<HasHook>,
    pub(crate) delete: Option<DeleteHook>,
}

impl VirtualMembers {
    pub fn new() -> Self {
        VirtualMembers::default()
    }

    pub fn on_get<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CallScope, &str) -> Option<Value> + 'static,
    {
        self.get = Some(Rc::new(f));
        self
    }

    pub fn on_set<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CallScope, &str, Value) + 'static,
    {
        self.set = Some(Rc::new(f));
        self
    }

    pub fn on_enumerate<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CallScope) -> Vec<String> + 'static,
    {
        self.enumerate = Some(Rc::new(f));
        self
    }

    pub fn on_has<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CallScope, &str) -> bool + 'static,
    {
        self.has = Some(Rc::new(f));
        self
    }

    pub fn on_delete<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut CallScope, &str) + 'static,
    {
        self.delete = Some(Rc::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.get.is_none()
            && self.set.is_none()
            && self.enumerate.is_none()
            && self.has.is_none()
            && self.delete.is_none()
    }
}

/// The composed hook table of an instance. Each entry remembers the scope
/// of the level that declared it so hooks run with that level's token.
#[derive(Clone, Default)]
pub struct VirtualTable {
    pub(crate) get: Option<(GetHook, ScopeId)>,
    pub(crate) set: Option<(SetHook, ScopeId)>,
    pub(crate) enumerate: Option<(EnumerateHook, ScopeId)>,
    pub(crate) has: Option<(HasHook, ScopeId)>,
    pub(crate) delete: Option<(DeleteHook, ScopeId)>,
}

impl VirtualTable {
    pub fn is_empty(&self) -> bool {
        self.get.is_none()
            && self.set.is_none()
            && self.enumerate.is_none()
            && self.has.is_none()
            && self.delete.is_none()
    }

    /// Folds one level's declared hooks into the table. With `overwrite`
    /// a declared hook replaces an earlier level's; without it the earlier
    /// declaration stands.
    pub fn apply(&mut self, level: &VirtualMembers, scope: ScopeId, overwrite: bool) {
        if let Some(h) = &level.get {
            if overwrite || self.get.is_none() {
                self.get = Some((h.clone(), scope));
            }
        }
        if let Some(h) = &level.set {
            if overwrite || self.set.is_none() {
                self.set = Some((h.clone(), scope));
            }
        }
        if let Some(h) = &level.enumerate {
            if overwrite || self.enumerate.is_none() {
                self.enumerate = Some((h.clone(), scope));
            }
        }
        if let Some(h) = &level.has {
            if overwrite || self.has.is_none() {
                self.has = Some((h.clone(), scope));
            }
        }
        if let Some(h) = &level.delete {
            if overwrite || self.delete.is_none() {
                self.delete = Some((h.clone(), scope));
            }
        }
    }
}

/// A method paired with the token of its declaring level, as handed to the
/// guard's dispatch. This is the identity-checked replacement for marker
/// strings in dispatch wrappers.
#[derive(Clone)]
pub struct BoundMethod {
    pub func: MethodFn,
    pub scope: ScopeId,
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn classify_by_marker_prefix() {
        assert_eq!(classify("name"), Visibility::Public);
        assert_eq!(classify("_name"), Visibility::Protected);
        assert_eq!(classify("__name"), Visibility::Private);
        assert_eq!(classify("___construct"), Visibility::Reserved);
        assert_eq!(classify("____deep"), Visibility::Reserved);
    }

    #[test]
    fn constant_names_are_all_caps() {
        assert!(is_constant("SOME_CONSTANT"));
        assert!(is_constant("A1"));
        assert!(!is_constant("someConstant"));
        assert!(!is_constant("___construct"));
        assert!(!is_constant("123"));
        assert!(!is_constant(""));
    }
}
