//! Typed handles into the network's unit pools, plus the small enums every
//! unit kind shares.
//!
//! The container owns every unit in flat `Vec`s; cross references between
//! units are plain indices wrapped in a newtype per pool so a filler handle
//! can never be used to index the binding pool.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $name(pub usize);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

handle!(
    /// Group unit in `Network::groups`.
    GroupId
);
handle!(
    /// Role (P) unit in `Network::roles`.
    RoleId
);
handle!(
    /// Binding (RB) unit in `Network::bindings`.
    BindingId
);
handle!(
    /// Filler (PO) unit in `Network::fillers`.
    FillerId
);
handle!(SemanticId);
handle!(LinkId);
handle!(AnalogId);
handle!(MappingId);
handle!(HypothesisId);

/// Partition a token currently belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Region {
    Driver,
    Recipient,
    /// Units inferred during the current run (the "new set").
    Emerging,
    /// Long-term memory; dormant for propagation.
    Memory,
}

impl Region {
    /// Driver and recipient units are the only ones the tick processes.
    pub fn is_processing(self) -> bool {
        matches!(self, Region::Driver | Region::Recipient)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Region::Driver => "driver",
            Region::Recipient => "recipient",
            Region::Emerging => "emerging",
            Region::Memory => "memory",
        };
        f.write_str(s)
    }
}

/// Whether a filler codes a predicate or an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Polarity {
    Predicate,
    Object,
}

/// Structural mode of a role or binding unit, re-resolved every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    Parent,
    Child,
    #[default]
    Neutral,
}

/// Lateral competition regime.
///
/// `Fine` is the DORA regime (units sharing a binding also compete),
/// `Coarse` is the LISA regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Competition {
    #[default]
    Fine,
    Coarse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnitKind {
    Group,
    Role,
    Binding,
    Filler,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitKind::Group => "group",
            UnitKind::Role => "role",
            UnitKind::Binding => "binding",
            UnitKind::Filler => "filler",
        };
        f.write_str(s)
    }
}

/// Handle to any token unit, regardless of pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TokenRef {
    Group(GroupId),
    Role(RoleId),
    Binding(BindingId),
    Filler(FillerId),
}

impl TokenRef {
    pub fn kind(self) -> UnitKind {
        match self {
            TokenRef::Group(_) => UnitKind::Group,
            TokenRef::Role(_) => UnitKind::Role,
            TokenRef::Binding(_) => UnitKind::Binding,
            TokenRef::Filler(_) => UnitKind::Filler,
        }
    }
}

impl From<GroupId> for TokenRef {
    fn from(id: GroupId) -> Self {
        TokenRef::Group(id)
    }
}

impl From<RoleId> for TokenRef {
    fn from(id: RoleId) -> Self {
        TokenRef::Role(id)
    }
}

impl From<BindingId> for TokenRef {
    fn from(id: BindingId) -> Self {
        TokenRef::Binding(id)
    }
}

impl From<FillerId> for TokenRef {
    fn from(id: FillerId) -> Self {
        TokenRef::Filler(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_ref_reports_its_pool() {
        assert_eq!(TokenRef::from(FillerId(3)).kind(), UnitKind::Filler);
        assert_eq!(TokenRef::from(RoleId(0)).kind(), UnitKind::Role);
        assert_ne!(TokenRef::from(BindingId(1)), TokenRef::from(GroupId(1)));
    }

    #[test]
    fn only_driver_and_recipient_are_processed() {
        assert!(Region::Driver.is_processing());
        assert!(Region::Recipient.is_processing());
        assert!(!Region::Emerging.is_processing());
        assert!(!Region::Memory.is_processing());
    }
}
