//! Local (filler-level) and global (binding-level) reset controllers.
//!
//! Each controller watches the latched inhibitors of one driver population.
//! Once any of them has latched, the controller switches on and a fire
//! zeroes the activation of its target population in one pass.

use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::network::Network;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalInhibitor {
    pub act: f32,
}

impl LocalInhibitor {
    pub fn is_active(&self) -> bool {
        self.act > 0.0
    }

    pub fn reset(&mut self) {
        self.act = 0.0;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlobalInhibitor {
    pub act: f32,
}

impl GlobalInhibitor {
    pub fn is_active(&self) -> bool {
        self.act > 0.0
    }

    pub fn reset(&mut self) {
        self.act = 0.0;
    }
}

/// Which controllers fired during a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InhibitorReport {
    pub local_fired: bool,
    pub global_fired: bool,
}

impl Network {
    /// Switch the local inhibitor on if any driver filler has latched.
    /// Never switches it off.
    pub fn check_local_inhibitor(&mut self) -> bool {
        let triggered = self
            .driver
            .fillers
            .iter()
            .any(|&f| self.fillers[f.index()].token.state.inhibitor_act);
        if triggered {
            self.local.act = 1.0;
        }
        self.local.is_active()
    }

    /// Zero every driver and recipient filler and every semantic. Bindings,
    /// roles and groups are left alone.
    pub fn fire_local_inhibitor(&mut self) -> &mut Self {
        for &f in self.driver.fillers.iter().chain(&self.recipient.fillers) {
            self.fillers[f.index()].token.reset_activation();
        }
        for s in &mut self.semantics {
            s.reset();
        }
        debug!(tick = self.age_ticks, "local inhibitor fired");
        self
    }

    /// Switch the global inhibitor on if any driver binding has latched.
    pub fn check_global_inhibitor(&mut self) -> bool {
        let triggered = self
            .driver
            .bindings
            .iter()
            .any(|&b| self.bindings[b.index()].token.state.inhibitor_act);
        if triggered {
            self.global.act = 1.0;
        }
        self.global.is_active()
    }

    /// Zero every driver and recipient role, binding and filler, and every
    /// semantic.
    pub fn fire_global_inhibitor(&mut self) -> &mut Self {
        for set in [&self.driver, &self.recipient] {
            for &r in &set.roles {
                self.roles[r.index()].token.reset_activation();
            }
            for &b in &set.bindings {
                self.bindings[b.index()].token.reset_activation();
            }
            for &f in &set.fillers {
                self.fillers[f.index()].token.reset_activation();
            }
        }
        for s in &mut self.semantics {
            s.reset();
        }
        debug!(tick = self.age_ticks, "global inhibitor fired");
        self
    }

    /// Check both controllers and fire whichever switched on. A fire ends
    /// the controller's epoch: it switches off and the driver population it
    /// watches has its inhibitors cleared.
    pub fn run_inhibitors(&mut self) -> InhibitorReport {
        let mut report = InhibitorReport::default();

        if self.check_local_inhibitor() {
            self.fire_local_inhibitor();
            self.local.reset();
            for &f in &self.driver.fillers {
                self.fillers[f.index()].token.reset_inhibitor();
            }
            report.local_fired = true;
        }

        if self.check_global_inhibitor() {
            self.fire_global_inhibitor();
            self.global.reset();
            for &b in &self.driver.bindings {
                self.bindings[b.index()].token.reset_inhibitor();
            }
            report.global_fired = true;
        }

        report
    }
}
