#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::handle::{BindingId, FillerId, Mode, RoleId, TokenRef, UnitKind};
use crate::network::Network;
use crate::token::{InputContext, InputDelta, Token, TokenSpec, Unit};

/// Role-binding unit (RB): ties a predicate filler to an object filler or to
/// a child role.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Binding {
    pub id: BindingId,
    pub token: Token,

    pub parent_roles: Vec<RoleId>,
    pub predicate: Option<FillerId>,
    pub object: Option<FillerId>,
    /// Role this binding takes as its argument (higher-order structure).
    pub child_role: Option<RoleId>,

    pub parent_bindings: Vec<BindingId>,
    pub child_bindings: Vec<BindingId>,

    pub times_fired: u32,
    pub mode: Mode,
}

impl Binding {
    pub fn new(id: BindingId, spec: TokenSpec) -> Self {
        Self {
            id,
            token: Token::new(spec),
            parent_roles: Vec::new(),
            predicate: None,
            object: None,
            child_role: None,
            parent_bindings: Vec::new(),
            child_bindings: Vec::new(),
            times_fired: 0,
            mode: Mode::Neutral,
        }
    }

    /// Parent if the bindings below outweigh the bindings above; child if
    /// active with at least one binding above; neutral otherwise.
    pub fn resolve_mode(&self, net: &Network) -> Mode {
        let parent_input: f32 = self
            .child_bindings
            .iter()
            .map(|&b| net.binding(b).token.act())
            .sum();
        let child_input: f32 = self
            .parent_bindings
            .iter()
            .map(|&b| net.binding(b).token.act())
            .sum();
        if parent_input > child_input {
            Mode::Parent
        } else if self.token.act() > 0.0 && !self.parent_bindings.is_empty() {
            Mode::Child
        } else {
            Mode::Neutral
        }
    }

    pub fn reset_mode(&mut self) {
        self.mode = Mode::Neutral;
    }

    pub fn increment_fire_count(&mut self) {
        self.times_fired += 1;
    }

    pub fn reset_fire_count(&mut self) {
        self.times_fired = 0;
    }

    /// Predicate, object and child role activations, where present.
    fn argument_input(&self, net: &Network) -> f32 {
        let mut bu = 0.0;
        if let Some(p) = self.predicate {
            bu += net.filler(p).token.act();
        }
        if let Some(o) = self.object {
            bu += net.filler(o).token.act();
        }
        if let Some(r) = self.child_role {
            bu += net.role(r).token.act();
        }
        bu
    }

    fn parent_role_input(&self, net: &Network) -> f32 {
        self.parent_roles.iter().map(|&r| net.role(r).token.act()).sum()
    }
}

impl Unit for Binding {
    const KIND: UnitKind = UnitKind::Binding;

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }

    fn gather_driver(&self, net: &Network, ctx: &InputContext) -> Result<InputDelta> {
        let g = &ctx.gains;
        let mut d = InputDelta {
            td: self.parent_role_input(net),
            bu: self.argument_input(net),
            ..Default::default()
        };

        for &other in &net.driver().bindings {
            if other != self.id {
                d.lateral -= net.binding(other).token.act() * g.driver_binding_lateral;
            }
        }
        d.lateral -= self.token.inhibitor_drive(g.inhibitor);
        Ok(d)
    }

    fn gather_recipient(&self, net: &Network, ctx: &InputContext) -> Result<InputDelta> {
        let g = &ctx.gains;
        let mut d = InputDelta::default();

        if ctx.late_phase() {
            d.td = self.parent_role_input(net);
        }

        d.bu = self.argument_input(net);
        if let Some(&child) = self.child_bindings.first() {
            d.bu += net.binding(child).token.act();
        }

        d.map = net.mapping_input(TokenRef::Binding(self.id), g.mapping, |_, p| {
            matches!(p, TokenRef::Binding(_))
        });

        for &other in &net.recipient().bindings {
            if other == self.id || self.parent_bindings.contains(&other) {
                continue;
            }
            let rb = net.binding(other);
            if rb.mode != Mode::Child {
                d.lateral -= rb.token.act() * ctx.lateral_level;
            }
        }
        d.lateral -= self.token.inhibitor_drive(g.inhibitor);
        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::handle::{Polarity, Region};

    #[test]
    fn mode_resolution_covers_all_three_branches() {
        let mut net = Network::default();
        let top = net.add_binding(TokenSpec::new("top", Region::Driver)).unwrap();
        let mid = net.add_binding(TokenSpec::new("mid", Region::Driver)).unwrap();
        let low = net.add_binding(TokenSpec::new("low", Region::Driver)).unwrap();
        net.connect_binding_child(top, mid).unwrap();
        net.connect_binding_child(mid, low).unwrap();

        // below 0.6 > above 0.2
        net.binding_mut(top).token.state.act = 0.2;
        net.binding_mut(low).token.state.act = 0.6;
        assert_eq!(net.binding(mid).resolve_mode(&net), Mode::Parent);

        // below 0.1 < above 0.5, active, has a parent binding
        net.binding_mut(top).token.state.act = 0.5;
        net.binding_mut(low).token.state.act = 0.1;
        net.binding_mut(mid).token.state.act = 0.3;
        assert_eq!(net.binding(mid).resolve_mode(&net), Mode::Child);

        // inactive with a parent: neutral
        net.binding_mut(mid).token.state.act = 0.0;
        assert_eq!(net.binding(mid).resolve_mode(&net), Mode::Neutral);

        // active but no parent binding: neutral
        net.binding_mut(low).token.state.act = 0.0;
        net.binding_mut(top).token.state.act = 0.7;
        assert_eq!(net.binding(top).resolve_mode(&net), Mode::Neutral);
    }

    #[test]
    fn driver_input_sums_roles_and_arguments() {
        let mut net = Network::default();
        let p = net.add_role(TokenSpec::new("P", Region::Driver)).unwrap();
        let rb = net.add_binding(TokenSpec::new("rb", Region::Driver)).unwrap();
        let rival = net.add_binding(TokenSpec::new("rival", Region::Driver)).unwrap();
        let pred = net
            .add_filler(TokenSpec::new("pred", Region::Driver), Polarity::Predicate)
            .unwrap();
        let obj = net
            .add_filler(TokenSpec::new("obj", Region::Driver), Polarity::Object)
            .unwrap();
        net.connect_role_binding(p, rb).unwrap();
        net.connect_binding_filler(rb, pred).unwrap();
        net.connect_binding_filler(rb, obj).unwrap();

        net.role_mut(p).token.state.act = 0.4;
        net.filler_mut(pred).token.state.act = 0.3;
        net.filler_mut(obj).token.state.act = 0.2;
        net.binding_mut(rival).token.state.act = 0.1;

        let ctx = InputContext::from_config(net.config());
        let d = net.binding(rb).gather(&net, &ctx).unwrap();
        assert!((d.td - 0.4).abs() < 1e-6);
        assert!((d.bu - 0.5).abs() < 1e-6);
        assert!((d.lateral - -1.0).abs() < 1e-6);
    }

    #[test]
    fn recipient_lateral_skips_child_mode_and_parents() {
        let mut net = Network::new(SimConfig::default().with_lateral_level(2.0)).unwrap();
        let parent = net.add_binding(TokenSpec::new("parent", Region::Recipient)).unwrap();
        let me = net.add_binding(TokenSpec::new("me", Region::Recipient)).unwrap();
        let child = net.add_binding(TokenSpec::new("kid", Region::Recipient)).unwrap();
        let plain = net.add_binding(TokenSpec::new("plain", Region::Recipient)).unwrap();
        net.connect_binding_child(parent, me).unwrap();
        net.binding_mut(parent).token.state.act = 0.9;
        net.binding_mut(child).token.state.act = 0.8;
        net.binding_mut(child).mode = Mode::Child;
        net.binding_mut(plain).token.state.act = 0.25;

        let ctx = InputContext::from_config(net.config());
        let d = net.binding(me).gather(&net, &ctx).unwrap();
        assert!((d.lateral - -0.5).abs() < 1e-6);
        // Phase set 0: no top-down from parent roles.
        assert_eq!(d.td, 0.0);
    }

    #[test]
    fn fire_count_bookkeeping() {
        let mut b = Binding::new(BindingId(0), TokenSpec::new("rb", Region::Driver));
        b.increment_fire_count();
        b.increment_fire_count();
        assert_eq!(b.times_fired, 2);
        b.reset_fire_count();
        assert_eq!(b.times_fired, 0);
        b.mode = Mode::Parent;
        b.reset_mode();
        assert_eq!(b.mode, Mode::Neutral);
    }
}
