//! Activation propagation for a symbolic-connectionist token network.
//!
//! Propositions are encoded as a hierarchy of token units (groups, roles,
//! bindings, fillers) over a shared pool of semantic features. Each
//! [`Network::tick`](network::Network::tick) gathers every unit's input from
//! the state at the start of the tick, commits it, and then updates
//! activations and inhibitors.

#[path = "core/handle.rs"]
pub mod handle;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/token.rs"]
pub mod token;

#[path = "core/semantic.rs"]
pub mod semantic;

#[path = "core/filler.rs"]
pub mod filler;

#[path = "core/binding.rs"]
pub mod binding;

#[path = "core/role.rs"]
pub mod role;

#[path = "core/group.rs"]
pub mod group;

#[path = "core/mapping.rs"]
pub mod mapping;

#[path = "core/inhibitor.rs"]
pub mod inhibitor;

#[path = "core/region.rs"]
pub mod region;

#[path = "core/network.rs"]
pub mod network;

#[path = "core/prng.rs"]
pub mod prng;

pub mod observer;

pub mod prelude {
    pub use crate::config::{Gains, InhibitorThresholds, SimConfig};
    pub use crate::error::NetError;
    pub use crate::handle::{
        AnalogId, BindingId, Competition, FillerId, GroupId, Mode, Polarity, Region, RoleId,
        SemanticId, TokenRef, UnitKind,
    };
    pub use crate::network::{Network, TickReport};
    pub use crate::semantic::Semantic;
    pub use crate::token::{TokenSpec, Unit};
}
