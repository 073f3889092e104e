//! # clasp - classical visibility for dynamic objects
//!
//! Emulates classical object-oriented member visibility
//! (public/protected/private) and multi-trait inheritance over dynamic
//! member maps, on top of a value model with no native visibility
//! enforcement. Every constructed object is wrapped in an access-mediation
//! layer, the guard, that classifies members by name shape, distinguishes
//! internal callers from external ones by identity tokens, and delegates to
//! optional virtual members (get/set/enumerate/has/delete hooks) in place
//! of hidden storage.
//!
//! ## Quick Start
//!
//! ### Defining and loading
//!
//! ```
//! use clasp::{ClaspError, Definition, Members, Value};
//!
//! let counter = Definition::new();
//! counter.define(
//!     Members::new()
//!         .set("count", 0)
//!         .set("_step", 2)
//!         .method("bump", |scope, _args| {
//!             let step = scope.get("_step").and_then(|v| v.as_int()).unwrap_or(1);
//!             let count = scope.get("count").and_then(|v| v.as_int()).unwrap_or(0);
//!             scope.set("count", count + step);
//!             scope
//!                 .get("count")
//!                 .ok_or_else(|| ClaspError::Runtime("count vanished".to_string()))
//!         }),
//! );
//!
//! let instance = counter.load(&[]).unwrap();
//! instance.call("bump", &[]).unwrap();
//! assert_eq!(instance.get("count"), Some(Value::Int(2)));
//! ```
//!
//! ### Virtual members
//!
//! A definition opts into interception by declaring virtual members; with
//! none declared the raw instance is returned and nothing is mediated.
//!
//! ```
//! use clasp::{Definition, Members, Value, VirtualMembers};
//!
//! let store = Definition::new();
//! store
//!     .define(Members::new().set("data", Value::empty_map()))
//!     .virtuals(
//!         VirtualMembers::new()
//!             .on_get(|scope, name| {
//!                 scope.get("data")?.as_map()?.borrow().get(name).cloned()
//!             })
//!             .on_set(|scope, name, value| {
//!                 if let Some(Value::Map(map)) = scope.get("data") {
//!                     map.borrow_mut().insert(name.to_string(), value);
//!                 }
//!             }),
//!     );
//!
//! let instance = store.load(&[]).unwrap();
//! instance.set("foo", 2);
//! assert_eq!(instance.get("foo"), Some(Value::Int(2)));
//! ```
//!
//! ## Visibility
//!
//! Visibility derives purely from the member name's marker prefix:
//!
//! - `name`: Public, always readable;
//! - `_name`: Protected, readable by methods of any merged level;
//! - `__name`: Private, readable only by methods declared at the exact
//!   level that declared the member;
//! - `___name`: Reserved, internal names such as `___construct`, always
//!   guard-visible and excluded from default enumeration.
//!
//! Internal callers are recognized by capability tokens stamped onto every
//! method at composition time and checked by identity, never by call-stack
//! inspection or marker strings.
//!
//! ## Architecture
//!
//! - **[`ds`]** - data structures (values, members, instances, errors)
//! - **[`compose`]** - composition engine seam and the default
//!   left-to-right trait merger
//! - **[`guard`]** - the access-mediation layer around every instance
//! - **[`define`]** - the chainable definition builder, namespace registry
//!   and caller locator

pub mod compose;
pub mod define;
pub mod ds;
pub mod guard;

pub use compose::{Blueprint, Composer, ConflictPolicy, DefaultComposer, Level};
pub use define::namespace::{ModuleResolver, Namespace, ResolvedModule};
pub use define::{Definition, ExtendSource, TraitSource};
pub use ds::error::ClaspError;
pub use ds::instance::ScopeId;
pub use ds::member::{classify, Members, VirtualMembers, Visibility};
pub use ds::value::Value;
pub use guard::{AncestorScope, CallScope, Handle};

/// Convenience constructor: a fresh definition with `members` as its own
/// member map.
pub fn define(members: Members) -> Definition {
    let definition = Definition::new();
    definition.define(members);
    definition
}
