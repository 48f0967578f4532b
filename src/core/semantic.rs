#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::handle::{FillerId, GroupId, LinkId, Polarity, Region, RoleId, SemanticId};
use crate::network::Network;

/// Token side of a semantic link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkOwner {
    Filler(FillerId),
    Group(GroupId),
}

/// Weighted edge from a token (and the role it serves) to a semantic.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Link {
    owner: LinkOwner,
    role: Option<RoleId>,
    semantic: SemanticId,
    weight: f32,
}

impl Link {
    pub fn new(owner: LinkOwner, role: Option<RoleId>, semantic: SemanticId, weight: f32) -> Self {
        Self {
            owner,
            role,
            semantic,
            weight,
        }
    }

    pub fn owner(&self) -> LinkOwner {
        self.owner
    }

    pub fn role(&self) -> Option<RoleId> {
        self.role
    }

    pub fn semantic(&self) -> SemanticId {
        self.semantic
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }
}

/// What a semantic feature codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OntStatus {
    /// Presence of a property.
    #[default]
    State,
    /// An absolute value on a dimension.
    Value,
    /// more/less/same/different.
    Comparative,
}

/// Which fillers a semantic listens to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SemanticFilter {
    /// Only predicate fillers drive semantics.
    pub ignore_objects: bool,
    /// Long-term-memory fillers are excluded.
    pub ignore_memory: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Semantic {
    pub name: String,
    pub dimension: Option<String>,
    pub amount: Option<f32>,
    pub ont_status: OntStatus,

    pub input: f32,
    /// Network-wide maximum semantic input seen by the last normalization pass.
    pub max_input: f32,
    pub act: f32,

    /// Links from tokens into this semantic.
    pub links: Vec<LinkId>,
}

impl Semantic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension: None,
            amount: None,
            ont_status: OntStatus::State,
            input: 0.0,
            max_input: 0.0,
            act: 0.0,
            links: Vec::new(),
        }
    }

    pub fn with_dimension(mut self, dimension: impl Into<String>, amount: Option<f32>) -> Self {
        self.dimension = Some(dimension.into());
        self.amount = amount;
        self.ont_status = if amount.is_some() {
            OntStatus::Value
        } else {
            OntStatus::State
        };
        self
    }

    pub fn with_ont_status(mut self, status: OntStatus) -> Self {
        self.ont_status = status;
        self
    }

    /// Sum of `filler act * weight` over filler links, read from the frozen
    /// network. Emerging fillers never contribute.
    pub fn accumulate_input(&self, net: &Network, filter: SemanticFilter) -> f32 {
        let mut total = 0.0;
        for &lid in &self.links {
            let link = net.link(lid);
            let LinkOwner::Filler(fid) = link.owner() else {
                continue;
            };
            let filler = net.filler(fid);
            match filler.token.region {
                Region::Emerging => continue,
                Region::Memory if filter.ignore_memory => continue,
                _ => {}
            }
            if filter.ignore_objects && filler.polarity == Polarity::Object {
                continue;
            }
            total += filler.token.act() * link.weight();
        }
        total
    }

    pub fn set_max_input(&mut self, max_input: f32) {
        self.max_input = max_input;
    }

    /// Divisive normalization against the network-wide maximum input.
    pub fn update_activation(&mut self) {
        self.act = if self.max_input > 0.0 {
            self.input / self.max_input
        } else {
            0.0
        };
    }

    pub fn reset(&mut self) {
        self.act = 0.0;
        self.input = 0.0;
    }

    pub fn reset_input(&mut self, refresh: f32) {
        self.input = refresh;
    }
}
