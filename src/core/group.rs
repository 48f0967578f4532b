#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::handle::{BindingId, GroupId, LinkId, RoleId, TokenRef, UnitKind};
use crate::network::Network;
use crate::semantic::Link;
use crate::token::{InputContext, InputDelta, Token, TokenSpec, Unit};

/// Higher-order grouping unit. Layer 1 groups take roles as children; a
/// group over groups sits one layer above its highest child.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Group {
    pub id: GroupId,
    pub token: Token,
    pub layer: u32,

    pub parent_groups: Vec<GroupId>,
    pub child_groups: Vec<GroupId>,
    pub roles: Vec<RoleId>,
    /// Bindings taken directly, for single-place predicates.
    pub bindings: Vec<BindingId>,
    pub links: Vec<LinkId>,

    pub sem_normalization: Option<f32>,
}

impl Group {
    pub fn new(id: GroupId, spec: TokenSpec, layer: u32) -> Self {
        Self {
            id,
            token: Token::new(spec),
            layer,
            parent_groups: Vec::new(),
            child_groups: Vec::new(),
            roles: Vec::new(),
            bindings: Vec::new(),
            links: Vec::new(),
            sem_normalization: None,
        }
    }

    pub fn recompute_semantic_normalization(&mut self, links: &[Link], significance: f32) {
        let norm = self
            .links
            .iter()
            .map(|l| links[l.index()].weight())
            .filter(|&w| w > significance)
            .sum();
        self.sem_normalization = Some(norm);
    }

    fn top_down(&self, net: &Network) -> f32 {
        self.parent_groups
            .iter()
            .map(|&g| net.group(g).token.act())
            .sum()
    }

    fn bottom_up(&self, net: &Network) -> f32 {
        let groups: f32 = self
            .child_groups
            .iter()
            .map(|&g| net.group(g).token.act())
            .sum();
        let roles: f32 = self.roles.iter().map(|&r| net.role(r).token.act()).sum();
        let bindings: f32 = self
            .bindings
            .iter()
            .map(|&b| net.binding(b).token.act())
            .sum();
        groups + roles + bindings
    }

    /// Semantic input is optional for groups: without significant links
    /// it is simply zero.
    fn semantic_input(&self, net: &Network, significance: f32) -> f32 {
        let norm = self.sem_normalization.unwrap_or(0.0);
        if norm <= 0.0 {
            return 0.0;
        }
        let sum: f32 = self
            .links
            .iter()
            .map(|&l| net.link(l))
            .filter(|l| l.weight() > significance)
            .map(|l| l.weight() * net.semantic(l.semantic()).act)
            .sum();
        sum / norm
    }

    fn layer_lateral(&self, net: &Network, pool: &[GroupId], gain: f32) -> f32 {
        pool.iter()
            .filter(|&&g| g != self.id)
            .map(|&g| net.group(g))
            .filter(|g| g.layer == self.layer)
            .map(|g| -g.token.act() * gain)
            .sum()
    }
}

impl Unit for Group {
    const KIND: UnitKind = UnitKind::Group;

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }

    fn gather_driver(&self, net: &Network, ctx: &InputContext) -> Result<InputDelta> {
        let g = &ctx.gains;
        Ok(InputDelta {
            td: self.top_down(net),
            bu: self.bottom_up(net),
            lateral: self.layer_lateral(net, &net.driver().groups, g.driver_group_lateral)
                - self.token.inhibitor_drive(g.inhibitor),
            map: 0.0,
            semantic_bu: None,
        })
    }

    fn gather_recipient(&self, net: &Network, ctx: &InputContext) -> Result<InputDelta> {
        let g = &ctx.gains;
        let td = if ctx.late_phase() {
            self.top_down(net)
        } else {
            0.0
        };
        Ok(InputDelta {
            td,
            bu: self.bottom_up(net) + self.semantic_input(net, ctx.semantic_significance),
            lateral: self.layer_lateral(net, &net.recipient().groups, ctx.lateral_level)
                - self.token.inhibitor_drive(g.inhibitor),
            map: net.mapping_input(TokenRef::Group(self.id), g.mapping, |_, p| {
                matches!(p, TokenRef::Group(_))
            }),
            semantic_bu: None,
        })
    }
}
