//! Membership lists. These never own units; they index into the
//! container's pools.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::handle::{AnalogId, BindingId, FillerId, GroupId, RoleId, TokenRef};

/// Units currently in one processing region.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionSet {
    pub groups: Vec<GroupId>,
    pub roles: Vec<RoleId>,
    pub bindings: Vec<BindingId>,
    pub fillers: Vec<FillerId>,
    pub analogs: Vec<AnalogId>,
}

impl RegionSet {
    pub fn insert(&mut self, r: TokenRef) {
        match r {
            TokenRef::Group(id) => push_unique(&mut self.groups, id),
            TokenRef::Role(id) => push_unique(&mut self.roles, id),
            TokenRef::Binding(id) => push_unique(&mut self.bindings, id),
            TokenRef::Filler(id) => push_unique(&mut self.fillers, id),
        }
    }

    pub fn remove(&mut self, r: TokenRef) {
        match r {
            TokenRef::Group(id) => self.groups.retain(|&x| x != id),
            TokenRef::Role(id) => self.roles.retain(|&x| x != id),
            TokenRef::Binding(id) => self.bindings.retain(|&x| x != id),
            TokenRef::Filler(id) => self.fillers.retain(|&x| x != id),
        }
    }

    pub fn contains(&self, r: TokenRef) -> bool {
        match r {
            TokenRef::Group(id) => self.groups.contains(&id),
            TokenRef::Role(id) => self.roles.contains(&id),
            TokenRef::Binding(id) => self.bindings.contains(&id),
            TokenRef::Filler(id) => self.fillers.contains(&id),
        }
    }

    pub fn add_analog(&mut self, id: AnalogId) {
        push_unique(&mut self.analogs, id);
    }

    pub fn remove_analog(&mut self, id: AnalogId) {
        self.analogs.retain(|&a| a != id);
    }

    pub fn len(&self) -> usize {
        self.groups.len() + self.roles.len() + self.bindings.len() + self.fillers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every member, groups first and fillers last.
    pub fn tokens(&self) -> impl Iterator<Item = TokenRef> + '_ {
        self.groups
            .iter()
            .map(|&g| TokenRef::Group(g))
            .chain(self.roles.iter().map(|&r| TokenRef::Role(r)))
            .chain(self.bindings.iter().map(|&b| TokenRef::Binding(b)))
            .chain(self.fillers.iter().map(|&f| TokenRef::Filler(f)))
    }
}

/// Units that entered the network together.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Analog {
    pub name: String,
    pub groups: Vec<GroupId>,
    pub roles: Vec<RoleId>,
    pub bindings: Vec<BindingId>,
    pub fillers: Vec<FillerId>,

    pub total_act: f32,
    pub num_units: Option<usize>,
    /// Retrieval competition input, `total_act / num_units`.
    pub normalized_retrieval_act: Option<f32>,
}

impl Analog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn insert(&mut self, r: TokenRef) {
        match r {
            TokenRef::Group(id) => push_unique(&mut self.groups, id),
            TokenRef::Role(id) => push_unique(&mut self.roles, id),
            TokenRef::Binding(id) => push_unique(&mut self.bindings, id),
            TokenRef::Filler(id) => push_unique(&mut self.fillers, id),
        }
    }

    /// Roles, bindings and fillers; groups do not count towards retrieval.
    pub fn count_units(&mut self) -> usize {
        let n = self.roles.len() + self.bindings.len() + self.fillers.len();
        self.num_units = Some(n);
        n
    }

    pub fn tokens(&self) -> impl Iterator<Item = TokenRef> + '_ {
        self.groups
            .iter()
            .map(|&g| TokenRef::Group(g))
            .chain(self.roles.iter().map(|&r| TokenRef::Role(r)))
            .chain(self.bindings.iter().map(|&b| TokenRef::Binding(b)))
            .chain(self.fillers.iter().map(|&f| TokenRef::Filler(f)))
    }
}

fn push_unique<T: PartialEq>(v: &mut Vec<T>, x: T) {
    if !v.contains(&x) {
        v.push(x);
    }
}
