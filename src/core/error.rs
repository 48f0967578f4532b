use thiserror::Error;

use crate::handle::{Region, UnitKind};

/// Failures surfaced by the propagation engine.
///
/// Every variant is a broken precondition of the caller (network
/// construction or control logic); numeric overshoot is clamped and never
/// reported here.
#[derive(Debug, Error)]
pub enum NetError {
    #[error("filler '{filler}' has zero semantic normalization")]
    ZeroSemanticNormalization { filler: String },

    #[error("{kind} '{name}' is in the {region} region and has no region input")]
    InactiveRegion {
        kind: UnitKind,
        name: String,
        region: Region,
    },

    #[error("mapping endpoint '{name}' must be in the {expected} region, found {found}")]
    MappingRegion {
        name: String,
        expected: Region,
        found: Region,
    },

    #[error("mapping connects a {driver} to a {recipient}")]
    MappingKindMismatch { driver: UnitKind, recipient: UnitKind },

    #[error("unknown {kind} handle {index}")]
    UnknownUnit { kind: &'static str, index: usize },

    #[error("a unit named '{0}' already exists")]
    DuplicateName(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[cfg(feature = "serde")]
    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, NetError>;
