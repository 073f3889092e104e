//! Trait composition: flattening a definition's trait graph into an
//! ordered list of levels and materializing instances from it.
//!
//! The [`Composer`] trait is the seam to the composition engine; the
//! default engine merges strictly left-to-right by declaration order with
//! own members applied last, so precedence is fully deterministic.

use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;
use log::debug;

use crate::define::Definition;
use crate::ds::error::ClaspError;
use crate::ds::instance::{InstanceState, ScopeId};
use crate::ds::member::{MembersSource, Slot, VirtualMembers, VirtualTable};
use crate::ds::value::Value;
use crate::guard::Handle;

/// Named policy for member-name collisions across levels. Collisions are
/// resolved over the explicit ordered level list, never by implicit deep
/// merging of nested structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// A later level's member replaces an earlier one. Own members, merged
    /// last, override all traits. Default.
    LastWins,
    /// The first level to declare a name keeps it.
    FirstWins,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        ConflictPolicy::LastWins
    }
}

/// One definition level in merge order: its identity, its own member
/// sources, and its declared virtual members.
pub struct Level {
    scope: ScopeId,
    sources: Vec<MembersSource>,
    virtuals: VirtualMembers,
}

impl Level {
    pub fn new(scope: ScopeId, sources: Vec<MembersSource>, virtuals: VirtualMembers) -> Self {
        Level {
            scope,
            sources,
            virtuals,
        }
    }
}

/// The reusable loader produced by composition. Each `instantiate` call
/// materializes every level afresh (factories re-run and literal maps are
/// deep-cloned), so instances never share nested state.
///
/// `ancestor` names the scopes of the immediate parent's levels; while
/// merging, the slot state as of the parent's last level is snapshotted as
/// the instance's single ancestor view.
pub struct Blueprint {
    levels: Vec<Level>,
    ancestor: Option<Vec<ScopeId>>,
    policy: ConflictPolicy,
    interception: bool,
}

impl Blueprint {
    pub fn new(levels: Vec<Level>, ancestor: Option<Vec<ScopeId>>, policy: ConflictPolicy) -> Self {
        Blueprint {
            levels,
            ancestor,
            policy,
            interception: true,
        }
    }

    pub(crate) fn set_interception(&mut self, interception: bool) {
        self.interception = interception;
    }

    /// Ordered scope lineage of the composed levels.
    pub fn lineage(&self) -> Vec<ScopeId> {
        self.levels.iter().map(|level| level.scope).collect()
    }

    pub fn instantiate(&self, args: &[Value]) -> Result<Handle, ClaspError> {
        let mut slots: IndexMap<String, Slot> = IndexMap::new();
        let mut virtuals = VirtualTable::default();
        let mut ancestor: Option<Rc<IndexMap<String, Slot>>> = None;
        let ancestor_scopes: Option<HashSet<ScopeId>> = self
            .ancestor
            .as_ref()
            .map(|scopes| scopes.iter().copied().collect());
        let mut merged_scopes: HashSet<ScopeId> = HashSet::new();
        let overwrite = self.policy == ConflictPolicy::LastWins;
        for level in &self.levels {
            for source in &level.sources {
                for (name, value) in source.materialize() {
                    let slot = Slot {
                        value,
                        scope: level.scope,
                    };
                    match self.policy {
                        ConflictPolicy::LastWins => {
                            // IndexMap keeps the first insertion position,
                            // so precedence changes the value, not the
                            // enumeration order.
                            slots.insert(name, slot);
                        }
                        ConflictPolicy::FirstWins => {
                            slots.entry(name).or_insert(slot);
                        }
                    }
                }
            }
            virtuals.apply(&level.virtuals, level.scope, overwrite);
            merged_scopes.insert(level.scope);
            if let Some(scopes) = &ancestor_scopes {
                if merged_scopes == *scopes {
                    // Parent fully merged: this is the ancestor member set.
                    ancestor = Some(Rc::new(slots.clone()));
                }
            }
        }
        debug!(
            "instantiated {} level(s) into {} slot(s)",
            self.levels.len(),
            slots.len()
        );
        let instance = InstanceState::new(slots, virtuals, self.lineage(), ancestor);
        let handle = Handle::wrap(instance, self.interception)?;
        handle.run_construct(args)?;
        Ok(handle)
    }
}

/// The composition engine contract. `compose` turns a definition into a
/// reusable [`Blueprint`]; `supports_interception` reports whether the
/// engine can honor declared virtual members. An engine answering `false`
/// makes loading a hooked definition fail with
/// [`ClaspError::HostCapability`].
pub trait Composer {
    fn compose(&self, definition: &Definition) -> Result<Blueprint, ClaspError>;

    fn supports_interception(&self) -> bool {
        true
    }
}

/// Default engine: depth-first, left-to-right flatten of the trait graph,
/// own level last. A visited set keeps diamond reuse (and accidental
/// cycles) from merging the same level twice.
pub struct DefaultComposer;

impl Composer for DefaultComposer {
    fn compose(&self, definition: &Definition) -> Result<Blueprint, ClaspError> {
        let mut levels = Vec::new();
        let mut visited = HashSet::new();
        flatten(definition, &mut visited, &mut levels);
        let ancestor = definition.parent().map(|parent| {
            let mut parent_levels = Vec::new();
            let mut parent_visited = HashSet::new();
            flatten(&parent, &mut parent_visited, &mut parent_levels);
            parent_levels.iter().map(|level| level.scope).collect()
        });
        Ok(Blueprint::new(levels, ancestor, definition.policy()))
    }
}

fn flatten(definition: &Definition, visited: &mut HashSet<ScopeId>, out: &mut Vec<Level>) {
    if !visited.insert(definition.scope()) {
        return;
    }
    for parent in definition.parents() {
        flatten(&parent, visited, out);
    }
    out.push(Level::new(
        definition.scope(),
        definition.own_sources(),
        definition.declared_virtuals(),
    ));
}
