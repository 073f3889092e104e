use std::cell::RefCell;
use std::fmt;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::ds::member::{Slot, VirtualTable};

/// Identity of one definition level. Minted once per level at build time
/// and compared by identity, never by inspecting anything textual. A method
/// proves it is an internal caller by presenting the ScopeId it was bound
/// with; the guard checks it against the instance's lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(Uuid);

impl ScopeId {
    pub fn mint() -> Self {
        ScopeId(Uuid::new_v4())
    }
}

impl Display for ScopeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "scope({})", self.0.to_hyphenated())
    }
}

/// Shared handle to instance state. Everything is single-threaded `Rc`;
/// nothing here is designed to cross a thread boundary.
pub type InstanceRef = Rc<RefCell<InstanceState>>;

/// The raw object produced by invoking a blueprint: member storage cells,
/// the composed virtual-member table, the ordered lineage of merged levels,
/// and (for `extend`-created definitions) the immediate parent's member
/// set: one ancestor level, not a flattened trait list. The ancestor set
/// is the merge state as of the parent's last level, so a member the child
/// overrides is still reachable in its parent version.
pub struct InstanceState {
    pub(crate) slots: IndexMap<String, Slot>,
    pub(crate) virtuals: VirtualTable,
    pub(crate) lineage: Vec<ScopeId>,
    pub(crate) ancestor: Option<Rc<IndexMap<String, Slot>>>,
}

impl InstanceState {
    pub fn new(
        slots: IndexMap<String, Slot>,
        virtuals: VirtualTable,
        lineage: Vec<ScopeId>,
        ancestor: Option<Rc<IndexMap<String, Slot>>>,
    ) -> InstanceRef {
        Rc::new(RefCell::new(InstanceState {
            slots,
            virtuals,
            lineage,
            ancestor,
        }))
    }

    /// The scope stamped onto slots created by external writes: the last
    /// (own) level. Internal writes use the writing method's own token.
    pub(crate) fn leaf_scope(&self) -> ScopeId {
        *self
            .lineage
            .last()
            .expect("an instance always has at least one level")
    }
}
