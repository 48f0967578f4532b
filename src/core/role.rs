#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::filler::Filler;
use crate::handle::{BindingId, GroupId, Mode, Polarity, RoleId, TokenRef, UnitKind};
use crate::network::Network;
use crate::token::{InputContext, InputDelta, Token, TokenSpec, Unit};

/// Proposition-level role unit (P).
///
/// A role heads its own bindings (`bindings`) and can itself be the argument
/// of other bindings (`parent_bindings`). Which side currently dominates
/// decides whether it takes parent-mode or child-mode input.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Role {
    pub id: RoleId,
    pub token: Token,

    pub bindings: Vec<BindingId>,
    pub parent_bindings: Vec<BindingId>,
    pub groups: Vec<GroupId>,

    pub mode: Mode,
}

impl Role {
    pub fn new(id: RoleId, spec: TokenSpec) -> Self {
        Self {
            id,
            token: Token::new(spec),
            bindings: Vec::new(),
            parent_bindings: Vec::new(),
            groups: Vec::new(),
            mode: Mode::Neutral,
        }
    }

    pub fn resolve_mode(&self, net: &Network) -> Mode {
        let below: f32 = self
            .bindings
            .iter()
            .map(|&b| net.binding(b).token.act())
            .sum();
        let above: f32 = self
            .parent_bindings
            .iter()
            .map(|&b| net.binding(b).token.act())
            .sum();
        if below > above {
            Mode::Parent
        } else if above > below {
            Mode::Child
        } else {
            Mode::Neutral
        }
    }

    pub fn reset_mode(&mut self) {
        self.mode = Mode::Neutral;
    }

    pub fn shares_binding_with(&self, filler: &Filler) -> bool {
        self.bindings.iter().any(|b| filler.bindings.contains(b))
    }

    fn group_input(&self, net: &Network) -> f32 {
        self.groups.iter().map(|&g| net.group(g).token.act()).sum()
    }

    fn binding_input(&self, net: &Network) -> f32 {
        self.bindings.iter().map(|&b| net.binding(b).token.act()).sum()
    }

    fn parent_binding_input(&self, net: &Network) -> f32 {
        self.parent_bindings
            .iter()
            .map(|&b| net.binding(b).token.act())
            .sum()
    }

    /// `-gain * act` from every other role of `mode` in `roles`.
    fn same_mode_lateral(&self, net: &Network, roles: &[RoleId], mode: Mode, gain: f32) -> f32 {
        roles
            .iter()
            .filter(|&&r| r != self.id)
            .map(|&r| net.role(r))
            .filter(|r| r.mode == mode)
            .map(|r| -r.token.act() * gain)
            .sum()
    }

    fn mapping(&self, net: &Network, ctx: &InputContext) -> f32 {
        net.mapping_input(TokenRef::Role(self.id), ctx.gains.mapping, |_, p| {
            matches!(p, TokenRef::Role(_))
        })
    }

    fn driver_parent(&self, net: &Network, ctx: &InputContext) -> InputDelta {
        InputDelta {
            td: self.group_input(net),
            bu: self.binding_input(net),
            lateral: self.same_mode_lateral(
                net,
                &net.driver().roles,
                Mode::Parent,
                ctx.gains.driver_parent_role_lateral,
            ),
            map: 0.0,
            semantic_bu: None,
        }
    }

    fn driver_child(&self, net: &Network, ctx: &InputContext) -> InputDelta {
        let g = &ctx.gains;
        let driver = net.driver();
        let mut d = InputDelta {
            td: self.parent_binding_input(net) + self.group_input(net),
            lateral: self.same_mode_lateral(
                net,
                &driver.roles,
                Mode::Child,
                g.driver_child_role_lateral,
            ),
            ..Default::default()
        };
        for &f in &driver.fillers {
            let po = net.filler(f);
            if po.polarity != Polarity::Object {
                continue;
            }
            if ctx.fine() || !self.shares_binding_with(po) {
                d.lateral -= po.token.act() * g.child_role_filler_lateral;
            }
        }
        d
    }

    fn recipient_parent(&self, net: &Network, ctx: &InputContext) -> InputDelta {
        let g = &ctx.gains;
        let mut td = self.group_input(net);
        if ctx.late_phase() {
            td += self.binding_input(net);
        }
        let lateral = self.same_mode_lateral(
            net,
            &net.recipient().roles,
            Mode::Parent,
            ctx.lateral_level,
        ) - self.token.inhibitor_drive(g.inhibitor);
        InputDelta {
            td,
            bu: self.binding_input(net),
            lateral,
            map: self.mapping(net, ctx),
            semantic_bu: None,
        }
    }

    fn recipient_child(&self, net: &Network, ctx: &InputContext) -> InputDelta {
        let g = &ctx.gains;
        let recipient = net.recipient();
        let mut td = self.group_input(net);
        if ctx.late_phase() {
            td += self.parent_binding_input(net);
        }
        let mut lateral =
            self.same_mode_lateral(net, &recipient.roles, Mode::Child, ctx.lateral_level);
        for &f in &recipient.fillers {
            let po = net.filler(f);
            let shares = self.shares_binding_with(po);
            let inhibits = if ctx.fine() {
                shares || po.polarity == Polarity::Object
            } else {
                po.polarity == Polarity::Object
            };
            if inhibits {
                lateral -= po.token.act() * g.child_role_filler_lateral;
            }
        }
        InputDelta {
            td,
            bu: 0.0,
            lateral,
            map: self.mapping(net, ctx),
            semantic_bu: None,
        }
    }
}

impl Unit for Role {
    const KIND: UnitKind = UnitKind::Role;

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }

    /// Neutral roles take no input this tick.
    fn gather_driver(&self, net: &Network, ctx: &InputContext) -> Result<InputDelta> {
        Ok(match self.mode {
            Mode::Parent => self.driver_parent(net, ctx),
            Mode::Child => self.driver_child(net, ctx),
            Mode::Neutral => InputDelta::default(),
        })
    }

    fn gather_recipient(&self, net: &Network, ctx: &InputContext) -> Result<InputDelta> {
        Ok(match self.mode {
            Mode::Parent => self.recipient_parent(net, ctx),
            Mode::Child => self.recipient_child(net, ctx),
            Mode::Neutral => InputDelta::default(),
        })
    }
}
