//! Cross-region mapping connections and the competitive mapping-input term.
//!
//! Connections and hypotheses are populated by the mapping subsystem; the
//! propagation engine only reads them.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::handle::TokenRef;
use crate::network::Network;

/// Weighted correspondence between a driver token and a recipient token of
/// the same kind.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MappingConnection {
    pub driver: TokenRef,
    pub recipient: TokenRef,
    pub weight: f32,
}

impl MappingConnection {
    /// The endpoint that is not `me`, if `me` is an endpoint at all.
    pub fn partner_of(&self, me: TokenRef) -> Option<TokenRef> {
        if self.recipient == me {
            Some(self.driver)
        } else if self.driver == me {
            Some(self.recipient)
        } else {
            None
        }
    }
}

/// Evidence accumulated for a candidate mapping between two tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MappingHypothesis {
    pub driver: TokenRef,
    pub recipient: TokenRef,
    pub evidence: f32,
}

/// `gain*w*p - own_max*p - partner_max*p`.
///
/// Rewards a strong, mutually preferred mapping and penalizes either side
/// having a stronger alternative.
#[inline]
pub fn competitive_input(
    weight: f32,
    partner_act: f32,
    own_max: f32,
    partner_max: f32,
    gain: f32,
) -> f32 {
    gain * weight * partner_act - own_max * partner_act - partner_max * partner_act
}

impl Network {
    /// Mapping input for `me`, summed over its connections whose partner
    /// passes `accept`.
    pub(crate) fn mapping_input(
        &self,
        me: TokenRef,
        gain: f32,
        accept: impl Fn(&Network, TokenRef) -> bool,
    ) -> f32 {
        let own = self.token(me);
        let mut total = 0.0;
        for &mid in &own.mapping.connections {
            let conn = self.mapping(mid);
            let Some(partner) = conn.partner_of(me) else {
                continue;
            };
            if !accept(self, partner) {
                continue;
            }
            let p = self.token(partner);
            total += competitive_input(
                conn.weight,
                p.act(),
                own.mapping.max_map,
                p.mapping.max_map,
                gain,
            );
        }
        total
    }

    /// Recompute each token's strongest mapping weight and partner from its
    /// connections.
    pub fn refresh_max_maps(&mut self) {
        let refs: Vec<TokenRef> = self.all_token_refs().collect();
        for r in refs {
            let mut best: Option<(TokenRef, f32)> = None;
            for &mid in &self.token(r).mapping.connections {
                let conn = self.mapping(mid);
                let Some(partner) = conn.partner_of(r) else {
                    continue;
                };
                if best.map_or(true, |(_, w)| conn.weight > w) {
                    best = Some((partner, conn.weight));
                }
            }
            let book = &mut self.token_mut(r).mapping;
            book.max_map_unit = best.map(|(p, _)| p);
            book.max_map = best.map_or(0.0, |(_, w)| w);
        }
    }
}
