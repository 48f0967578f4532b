//! State and update equation shared by every token unit (group, role,
//! binding, filler).
//!
//! Per-kind input rules live with each kind; they never mutate anything.
//! A rule reads the frozen network and returns an [`InputDelta`], which the
//! container commits for all units at once before any activation changes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{Gains, SimConfig};
use crate::error::{NetError, Result};
use crate::handle::{AnalogId, Competition, HypothesisId, MappingId, Region, TokenRef, UnitKind};
use crate::network::Network;

/// Activation sits on an asymptote slightly above the clamp so strong input
/// can actually drive a unit to 1.0.
pub const ACT_CEILING: f32 = 1.1;

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TokenState {
    pub act: f32,
    pub td_input: f32,
    pub bu_input: f32,
    pub lateral_input: f32,
    pub map_input: f32,
    pub net_input: f32,
    /// Top-down drive restored whenever inputs are cleared, set by
    /// [`Token::reset_input`].
    pub carry_td: f32,

    /// Integrated activation feeding this unit's own inhibitor.
    pub inhibitor_input: f32,
    /// Latched once `inhibitor_input` crosses the kind's threshold.
    pub inhibitor_act: bool,
}

/// Mapping bookkeeping; the records themselves live in the container.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MappingBook {
    pub connections: Vec<MappingId>,
    pub hypotheses: Vec<HypothesisId>,
    /// Partner this unit maps to most strongly.
    pub max_map_unit: Option<TokenRef>,
    pub max_map: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Provenance {
    /// Inferred during the current cycle; cleared by the control loop.
    pub inferred: bool,
    /// Created during this run. Unlike `inferred` this is never cleared.
    pub sim_made: bool,
    pub retrieved: bool,
    pub copied_for_working_memory: bool,
    /// Index of the working-memory copy, if one was made.
    pub copied_index: Option<usize>,
    /// Unit whose firing caused this one to be inferred.
    pub maker: Option<TokenRef>,
    /// Unit this one caused to be inferred.
    pub made: Option<TokenRef>,
}

/// Arguments shared by every unit constructor.
#[derive(Debug, Clone)]
pub struct TokenSpec {
    pub name: String,
    pub region: Region,
    pub analog: Option<AnalogId>,
    pub inferred: bool,
}

impl TokenSpec {
    pub fn new(name: impl Into<String>, region: Region) -> Self {
        Self {
            name: name.into(),
            region,
            analog: None,
            inferred: false,
        }
    }

    pub fn in_analog(mut self, analog: AnalogId) -> Self {
        self.analog = Some(analog);
        self
    }

    pub fn inferred(mut self, inferred: bool) -> Self {
        self.inferred = inferred;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Token {
    pub name: String,
    pub region: Region,
    pub analog: Option<AnalogId>,
    pub state: TokenState,
    pub mapping: MappingBook,
    pub provenance: Provenance,
}

impl Token {
    pub fn new(spec: TokenSpec) -> Self {
        Self {
            name: spec.name,
            region: spec.region,
            analog: spec.analog,
            state: TokenState::default(),
            mapping: MappingBook::default(),
            provenance: Provenance {
                inferred: spec.inferred,
                sim_made: spec.inferred,
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn act(&self) -> f32 {
        self.state.act
    }

    /// Zero bottom-up, lateral, mapping and net input; top-down input is set
    /// to `carry_td` so an external drive can survive the reset. The carry
    /// sticks: later per-tick clears restore it until it is reset to 0.
    pub fn reset_input(&mut self, carry_td: f32) {
        let s = &mut self.state;
        s.carry_td = carry_td;
        s.td_input = carry_td;
        s.bu_input = 0.0;
        s.lateral_input = 0.0;
        s.map_input = 0.0;
        s.net_input = 0.0;
    }

    /// Per-tick clear, keeping the stored top-down carry.
    pub fn clear_input(&mut self) {
        let carry = self.state.carry_td;
        self.reset_input(carry);
    }

    pub fn reset_activation(&mut self) {
        self.reset_input(0.0);
        self.state.act = 0.0;
    }

    pub fn reset_state(&mut self) {
        self.reset_activation();
        self.provenance.retrieved = false;
    }

    /// Leaky integrator:
    /// `act += growth * net * (1.1 - act) - decay * act`, clamped to [0, 1].
    pub fn update_activation(&mut self, growth_rate: f32, decay_rate: f32, mapping_bias: f32) {
        let s = &mut self.state;
        s.net_input = s.td_input + s.bu_input + s.lateral_input + s.map_input * mapping_bias;
        let delta = growth_rate * s.net_input * (ACT_CEILING - s.act) - decay_rate * s.act;
        let next = s.act + delta;
        // NaN would otherwise survive `clamp`.
        s.act = if next.is_nan() { 0.0 } else { next.clamp(0.0, 1.0) };
    }

    pub fn zero_lateral_input(&mut self) {
        self.state.lateral_input = 0.0;
    }

    pub fn accumulate_inhibitor_input(&mut self) {
        self.state.inhibitor_input += self.state.act;
    }

    /// Latch the inhibitor once the accumulator reaches `threshold`.
    /// Never unlatches; only [`Token::reset_inhibitor`] clears it.
    pub fn update_inhibitor_act(&mut self, threshold: Option<f32>) {
        if let Some(th) = threshold {
            if self.state.inhibitor_input >= th {
                self.state.inhibitor_act = true;
            }
        }
    }

    pub fn reset_inhibitor(&mut self) {
        self.state.inhibitor_input = 0.0;
        self.state.inhibitor_act = false;
    }

    /// `gain` if the inhibitor has latched, else 0.
    #[inline]
    pub fn inhibitor_drive(&self, gain: f32) -> f32 {
        if self.state.inhibitor_act {
            gain
        } else {
            0.0
        }
    }

    /// Add one tick's aggregated contributions onto the accumulators.
    pub fn apply(&mut self, delta: &InputDelta) {
        let s = &mut self.state;
        s.td_input += delta.td;
        s.bu_input = match delta.semantic_bu {
            Some(sem) => sem + delta.bu,
            None => s.bu_input + delta.bu,
        };
        s.lateral_input += delta.lateral;
        s.map_input += delta.map;
    }
}

/// One tick's worth of input for a single unit, computed from the frozen
/// network and applied later.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputDelta {
    pub td: f32,
    pub bu: f32,
    pub lateral: f32,
    pub map: f32,
    /// Normalized semantic input. Replaces the accumulated bottom-up input
    /// instead of adding to it, so it never compounds across ticks.
    pub semantic_bu: Option<f32>,
}

/// Parameters of the input-aggregation rules for one tick.
#[derive(Debug, Clone, Copy)]
pub struct InputContext {
    pub competition: Competition,
    pub phase_set: u32,
    pub lateral_level: f32,
    pub ignore_object_semantics: bool,
    pub semantic_significance: f32,
    pub gains: Gains,
}

impl InputContext {
    pub fn from_config(cfg: &SimConfig) -> Self {
        Self {
            competition: cfg.competition,
            phase_set: cfg.phase_set,
            lateral_level: cfg.lateral_level,
            ignore_object_semantics: cfg.ignore_object_semantics,
            semantic_significance: cfg.semantic_significance,
            gains: cfg.gains,
        }
    }

    #[inline]
    pub fn fine(&self) -> bool {
        self.competition == Competition::Fine
    }

    /// Gated top-down terms switch on from the second phase set.
    #[inline]
    pub fn late_phase(&self) -> bool {
        self.phase_set >= 1
    }
}

/// Behaviour every token kind provides on top of the shared [`Token`].
pub trait Unit {
    const KIND: UnitKind;

    fn token(&self) -> &Token;
    fn token_mut(&mut self) -> &mut Token;

    fn gather_driver(&self, net: &Network, ctx: &InputContext) -> Result<InputDelta>;
    fn gather_recipient(&self, net: &Network, ctx: &InputContext) -> Result<InputDelta>;

    /// Region-dispatched input aggregation.
    fn gather(&self, net: &Network, ctx: &InputContext) -> Result<InputDelta> {
        let token = self.token();
        match token.region {
            Region::Driver => self.gather_driver(net, ctx),
            Region::Recipient => self.gather_recipient(net, ctx),
            region => Err(NetError::InactiveRegion {
                kind: Self::KIND,
                name: token.name.clone(),
                region,
            }),
        }
    }
}
