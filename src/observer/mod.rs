use crate::handle::{Region, TokenRef, UnitKind};
use crate::inhibitor::InhibitorReport;
use crate::network::Network;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A read-only snapshot of what the network is doing.
///
/// - Observers cannot mutate or steer the network.
/// - Snapshotting is on-demand and allocates; the tick loop is unaffected.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkSnapshot {
    pub age_ticks: u64,
    pub phase_set: u32,
    pub local_inhibitor: f32,
    pub global_inhibitor: f32,
    pub max_semantic_input: f32,

    pub driver: RegionSummary,
    pub recipient: RegionSummary,

    /// Most active semantics, strongest first.
    pub top_semantics: Vec<(String, f32)>,
    pub analogs: Vec<AnalogSummary>,
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionSummary {
    pub units: usize,
    pub mean_group_act: f32,
    pub mean_role_act: f32,
    pub mean_binding_act: f32,
    pub mean_filler_act: f32,
    /// Name and activation of the most active unit, if any is above zero.
    pub most_active: Option<(String, f32)>,
    /// Units whose inhibitor has latched.
    pub latched: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalogSummary {
    pub name: String,
    pub total_act: f32,
    pub normalized_retrieval_act: Option<f32>,
}

pub struct NetworkAdapter<'a> {
    net: &'a Network,
    top_semantics: usize,
}

impl<'a> NetworkAdapter<'a> {
    pub fn new(net: &'a Network) -> Self {
        Self {
            net,
            top_semantics: 8,
        }
    }

    pub fn with_top_semantics(mut self, n: usize) -> Self {
        self.top_semantics = n;
        self
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        let net = self.net;

        let mut semantics: Vec<(String, f32)> = net
            .semantics()
            .iter()
            .filter(|s| s.act > 0.0)
            .map(|s| (s.name.clone(), s.act))
            .collect();
        semantics.sort_by(|a, b| b.1.total_cmp(&a.1));
        semantics.truncate(self.top_semantics);

        NetworkSnapshot {
            age_ticks: net.age_ticks(),
            phase_set: net.config().phase_set,
            local_inhibitor: net.local_inhibitor().act,
            global_inhibitor: net.global_inhibitor().act,
            max_semantic_input: net.max_semantic_input(),
            driver: summarize(net, Region::Driver),
            recipient: summarize(net, Region::Recipient),
            top_semantics: semantics,
            analogs: net
                .analogs()
                .iter()
                .map(|a| AnalogSummary {
                    name: a.name.clone(),
                    total_act: a.total_act,
                    normalized_retrieval_act: a.normalized_retrieval_act,
                })
                .collect(),
        }
    }
}

fn summarize(net: &Network, region: Region) -> RegionSummary {
    let Some(set) = net.region_set(region) else {
        return RegionSummary::default();
    };
    let refs: Vec<TokenRef> = set.tokens().collect();

    let most_active = refs
        .iter()
        .map(|&r| net.token(r))
        .filter(|t| t.act() > 0.0)
        .max_by(|a, b| a.act().total_cmp(&b.act()))
        .map(|t| (t.name.clone(), t.act()));

    let latched = refs
        .iter()
        .map(|&r| net.token(r))
        .filter(|t| t.state.inhibitor_act)
        .map(|t| t.name.clone())
        .collect();

    RegionSummary {
        units: refs.len(),
        mean_group_act: net.mean_activation(region, UnitKind::Group),
        mean_role_act: net.mean_activation(region, UnitKind::Role),
        mean_binding_act: net.mean_activation(region, UnitKind::Binding),
        mean_filler_act: net.mean_activation(region, UnitKind::Filler),
        most_active,
        latched,
    }
}

/// One line per tick for log output.
pub fn describe_tick(report: &crate::network::TickReport) -> String {
    let InhibitorReport {
        local_fired,
        global_fired,
    } = report.inhibitors;
    let mut s = format!(
        "tick {} processed={} max_sem={:.3}",
        report.tick, report.processed, report.max_semantic_input
    );
    if local_fired {
        s.push_str(" local-fire");
    }
    if global_fired {
        s.push_str(" global-fire");
    }
    s
}
