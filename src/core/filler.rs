#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::Gains;
use crate::error::{NetError, Result};
use crate::handle::{BindingId, FillerId, LinkId, Mode, Polarity, TokenRef, UnitKind};
use crate::network::Network;
use crate::semantic::Link;
use crate::token::{InputContext, InputDelta, Token, TokenSpec, Unit};

/// Predicate or object unit (PO).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Filler {
    pub id: FillerId,
    pub token: Token,
    pub polarity: Polarity,

    pub bindings: Vec<BindingId>,
    /// Fillers attached to at least one of this filler's bindings.
    pub same_binding: Vec<FillerId>,
    pub links: Vec<LinkId>,

    /// Divisor for bottom-up semantic input: summed weight of significant links.
    pub sem_normalization: Option<f32>,
    pub max_sem_weight: Option<f32>,
}

impl Filler {
    pub fn new(id: FillerId, spec: TokenSpec, polarity: Polarity) -> Self {
        Self {
            id,
            token: Token::new(spec),
            polarity,
            bindings: Vec::new(),
            same_binding: Vec::new(),
            links: Vec::new(),
            sem_normalization: None,
            max_sem_weight: None,
        }
    }

    pub fn is_predicate(&self) -> bool {
        self.polarity == Polarity::Predicate
    }

    fn td_gain(&self, gains: &Gains) -> f32 {
        match self.polarity {
            Polarity::Predicate => gains.predicate_td,
            Polarity::Object => gains.object_td,
        }
    }

    pub fn shares_binding_with(&self, other: FillerId) -> bool {
        self.same_binding.contains(&other)
    }

    /// Sum of link weights above `significance`.
    pub fn recompute_semantic_normalization(&mut self, links: &[Link], significance: f32) {
        let norm = self
            .links
            .iter()
            .map(|l| links[l.index()].weight())
            .filter(|&w| w > significance)
            .sum();
        self.sem_normalization = Some(norm);
    }

    pub fn recompute_max_semantic_weight(&mut self, links: &[Link]) {
        let max = self
            .links
            .iter()
            .map(|l| links[l.index()].weight())
            .fold(0.0f32, f32::max);
        self.max_sem_weight = Some(max);
    }

    /// Normalized bottom-up input from significant semantic links.
    ///
    /// A zero (or never computed) normalization means the network was built
    /// inconsistently and is reported rather than divided through.
    pub fn semantic_input(&self, net: &Network, significance: f32) -> Result<f32> {
        let norm = self.sem_normalization.unwrap_or(0.0);
        if norm == 0.0 {
            return Err(NetError::ZeroSemanticNormalization {
                filler: self.token.name.clone(),
            });
        }
        let sum: f32 = self
            .links
            .iter()
            .map(|&l| net.link(l))
            .filter(|l| l.weight() > significance)
            .map(|l| l.weight() * net.semantic(l.semantic()).act)
            .sum();
        Ok(sum / norm)
    }
}

impl Unit for Filler {
    const KIND: UnitKind = UnitKind::Filler;

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }

    fn gather_driver(&self, net: &Network, ctx: &InputContext) -> Result<InputDelta> {
        let g = &ctx.gains;
        let mut d = InputDelta::default();

        let gain = self.td_gain(g);
        for &b in &self.bindings {
            d.td += net.binding(b).token.act() * gain;
        }

        for &other in &net.driver().fillers {
            if other == self.id {
                continue;
            }
            let act = net.filler(other).token.act();
            if self.shares_binding_with(other) {
                if ctx.fine() {
                    d.lateral -= act * g.driver_filler_same_binding;
                }
            } else {
                d.lateral -= act * g.driver_filler_lateral;
            }
        }

        d.lateral -= self.token.inhibitor_drive(g.inhibitor);
        Ok(d)
    }

    fn gather_recipient(&self, net: &Network, ctx: &InputContext) -> Result<InputDelta> {
        // Freshly inferred fillers keep whatever input they were given.
        if self.token.provenance.inferred {
            return Ok(InputDelta::default());
        }

        let g = &ctx.gains;
        let level = ctx.lateral_level;
        let mut d = InputDelta::default();

        if ctx.late_phase() {
            let gain = self.td_gain(g);
            for &b in &self.bindings {
                d.td += net.binding(b).token.act() * gain;
            }
        }

        d.semantic_bu = Some(self.semantic_input(net, ctx.semantic_significance)?);

        let polarity = self.polarity;
        d.map = net.mapping_input(TokenRef::Filler(self.id), g.mapping, |net, partner| {
            matches!(partner, TokenRef::Filler(f) if net.filler(f).polarity == polarity)
        });

        let recipient = net.recipient();
        for &other in &recipient.fillers {
            if other == self.id {
                continue;
            }
            let po = net.filler(other);
            if self.shares_binding_with(other) {
                if ctx.fine() {
                    d.lateral -= po.token.act() * level * g.recipient_filler_same_binding;
                }
            } else if !ctx.ignore_object_semantics || po.polarity == self.polarity {
                d.lateral -= po.token.act() * level;
            }
        }

        for &rid in &recipient.roles {
            let role = net.role(rid);
            if role.mode != Mode::Child {
                continue;
            }
            if ctx.fine() {
                let related = self
                    .bindings
                    .iter()
                    .any(|b| role.parent_bindings.contains(b));
                if !related {
                    d.lateral -= role.token.act() * g.recipient_filler_child_role;
                }
            } else if self.polarity == Polarity::Object {
                d.lateral -= role.token.act() * level;
            }
        }

        if ctx.fine() && ctx.late_phase() {
            for &b in &recipient.bindings {
                if !self.bindings.contains(&b) {
                    d.td -= net.binding(b).token.act() * g.unbound_binding_td;
                }
            }
        }

        d.lateral -= self.token.inhibitor_drive(g.inhibitor);
        Ok(d)
    }
}
