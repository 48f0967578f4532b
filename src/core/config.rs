#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::NetError;
use crate::handle::{Competition, UnitKind};

/// Magnitudes of every excitatory gain and inhibitory weight used by the
/// input-aggregation rules.
///
/// Defaults are the published model values. Within-binding filler
/// competition in particular is still being tuned against behavioural data.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Gains {
    /// Top-down gain from a binding into its predicate filler.
    pub predicate_td: f32,
    /// Top-down gain from a binding into its object filler.
    pub object_td: f32,

    /// Driver filler inhibition from fillers outside its bindings.
    pub driver_filler_lateral: f32,
    /// Driver filler inhibition from fillers sharing a binding (fine mode only).
    pub driver_filler_same_binding: f32,
    /// Multiplier on the lateral level for recipient fillers sharing a binding
    /// (fine mode only).
    pub recipient_filler_same_binding: f32,
    /// Recipient filler inhibition from child-mode roles (fine mode).
    ///
    /// Unlike the plain rule, where every child-mode role subtracts
    /// `lateral_level * act`, roles whose parent bindings include one of the
    /// filler's own bindings are skipped here, and the rest subtract
    /// `recipient_filler_child_role * act`.
    pub recipient_filler_child_role: f32,
    /// Recipient filler top-down inhibition from bindings it is not part of
    /// (fine mode, phase set >= 1).
    pub unbound_binding_td: f32,

    pub driver_binding_lateral: f32,

    pub driver_parent_role_lateral: f32,
    pub driver_child_role_lateral: f32,
    /// Child-mode role inhibition from fillers.
    pub child_role_filler_lateral: f32,

    pub driver_group_lateral: f32,

    /// Inhibition a unit receives from its own fired inhibitor.
    pub inhibitor: f32,
    /// Reward on `weight * partner_act` in the competitive mapping term.
    pub mapping: f32,
}

impl Default for Gains {
    fn default() -> Self {
        Self {
            predicate_td: 2.0,
            object_td: 1.0,
            driver_filler_lateral: 3.0,
            driver_filler_same_binding: 3.0,
            recipient_filler_same_binding: 2.0,
            recipient_filler_child_role: 3.0,
            unbound_binding_td: 1.0,
            driver_binding_lateral: 10.0,
            driver_parent_role_lateral: 3.0,
            driver_child_role_lateral: 1.0,
            child_role_filler_lateral: 1.0,
            driver_group_lateral: 3.0,
            inhibitor: 10.0,
            mapping: 3.0,
        }
    }
}

/// Accumulated activation at which a unit's own inhibitor switches on.
/// `None` disables the inhibitor for that kind.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InhibitorThresholds {
    pub group: Option<f32>,
    pub role: Option<f32>,
    pub binding: Option<f32>,
    pub filler: Option<f32>,
}

impl Default for InhibitorThresholds {
    fn default() -> Self {
        Self {
            group: None,
            role: Some(440.0),
            binding: Some(160.0),
            filler: Some(110.0),
        }
    }
}

impl InhibitorThresholds {
    pub fn for_kind(&self, kind: UnitKind) -> Option<f32> {
        match kind {
            UnitKind::Group => self.group,
            UnitKind::Role => self.role,
            UnitKind::Binding => self.binding,
            UnitKind::Filler => self.filler,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimConfig {
    /// Growth rate (gamma) of the activation equation.
    pub growth_rate: f32,
    /// Decay rate (delta) of the activation equation.
    pub decay_rate: f32,
    /// Weight applied to mapping input when forming net input.
    pub mapping_bias: f32,
    /// Strength of lateral inhibition in the recipient.
    pub lateral_level: f32,

    pub competition: Competition,

    /// Phase set counter (0-based). Some top-down terms only switch on from
    /// the second phase set.
    pub phase_set: u32,

    /// Fillers only compete with fillers of their own polarity, and only
    /// predicates drive semantics.
    pub ignore_object_semantics: bool,
    /// Semantics ignore long-term-memory fillers.
    pub ignore_memory_semantics: bool,

    /// Zero every processed unit's inputs before committing a tick's deltas.
    pub clear_inputs_each_tick: bool,

    /// Units of this kind have their lateral input zeroed after each commit,
    /// letting them fire in synchrony.
    pub synchrony_level: Option<UnitKind>,

    /// Links at or below this weight do not count towards semantic input.
    pub semantic_significance: f32,

    pub gains: Gains,
    pub thresholds: InhibitorThresholds,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            growth_rate: 0.3,
            decay_rate: 0.1,
            mapping_bias: 0.5,
            lateral_level: 1.0,
            competition: Competition::Fine,
            phase_set: 0,
            ignore_object_semantics: false,
            ignore_memory_semantics: false,
            clear_inputs_each_tick: true,
            synchrony_level: None,
            semantic_significance: 0.1,
            gains: Gains::default(),
            thresholds: InhibitorThresholds::default(),
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), NetError> {
        if !self.growth_rate.is_finite() || self.growth_rate < 0.0 {
            return Err(NetError::InvalidConfig("growth_rate must be finite and >= 0"));
        }
        if !self.decay_rate.is_finite() || self.decay_rate < 0.0 {
            return Err(NetError::InvalidConfig("decay_rate must be finite and >= 0"));
        }
        if !self.mapping_bias.is_finite() {
            return Err(NetError::InvalidConfig("mapping_bias must be finite"));
        }
        if !self.lateral_level.is_finite() || self.lateral_level < 0.0 {
            return Err(NetError::InvalidConfig("lateral_level must be finite and >= 0"));
        }
        if !(0.0..1.0).contains(&self.semantic_significance) {
            return Err(NetError::InvalidConfig(
                "semantic_significance must be in [0, 1)",
            ));
        }
        let t = &self.thresholds;
        for th in [t.group, t.role, t.binding, t.filler].into_iter().flatten() {
            if !th.is_finite() || th <= 0.0 {
                return Err(NetError::InvalidConfig("inhibitor thresholds must be > 0"));
            }
        }
        Ok(())
    }

    pub fn with_rates(mut self, growth_rate: f32, decay_rate: f32) -> Self {
        self.growth_rate = growth_rate;
        self.decay_rate = decay_rate;
        self
    }

    pub fn with_competition(mut self, competition: Competition) -> Self {
        self.competition = competition;
        self
    }

    pub fn with_phase_set(mut self, phase_set: u32) -> Self {
        self.phase_set = phase_set;
        self
    }

    pub fn with_lateral_level(mut self, level: f32) -> Self {
        self.lateral_level = level;
        self
    }

    pub fn with_synchrony_level(mut self, kind: Option<UnitKind>) -> Self {
        self.synchrony_level = kind;
        self
    }

    #[cfg(feature = "serde")]
    pub fn from_json_str(s: &str) -> Result<Self, NetError> {
        let cfg: SimConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[cfg(feature = "serde")]
    pub fn load_json(path: impl AsRef<std::path::Path>) -> Result<Self, NetError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
