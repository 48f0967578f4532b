use hashbrown::HashMap;
use tracing::{debug, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::binding::Binding;
use crate::config::SimConfig;
use crate::error::{NetError, Result};
use crate::filler::Filler;
use crate::group::Group;
use crate::handle::{
    AnalogId, BindingId, FillerId, GroupId, HypothesisId, LinkId, MappingId, Polarity, Region,
    RoleId, SemanticId, TokenRef, UnitKind,
};
use crate::inhibitor::{GlobalInhibitor, InhibitorReport, LocalInhibitor};
use crate::mapping::{MappingConnection, MappingHypothesis};
use crate::region::{Analog, RegionSet};
use crate::role::Role;
use crate::semantic::{Link, LinkOwner, Semantic, SemanticFilter};
use crate::token::{InputContext, InputDelta, Token, TokenSpec, Unit};

/// Inputs gathered from a frozen network, waiting to be committed.
///
/// Only valid for the network (and topology) it was gathered from.
#[derive(Debug, Clone, Default)]
pub struct PendingInputs {
    pub tokens: Vec<(TokenRef, InputDelta)>,
    /// One entry per semantic, in pool order.
    pub semantic_inputs: Vec<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TickReport {
    pub tick: u64,
    /// Driver and recipient tokens updated this tick.
    pub processed: usize,
    pub max_semantic_input: f32,
    pub inhibitors: InhibitorReport,
}

/// Owner of every unit, link and mapping record, plus both inhibitors.
#[derive(Debug, Clone)]
pub struct Network {
    cfg: SimConfig,

    pub(crate) groups: Vec<Group>,
    pub(crate) roles: Vec<Role>,
    pub(crate) bindings: Vec<Binding>,
    pub(crate) fillers: Vec<Filler>,
    pub(crate) semantics: Vec<Semantic>,
    pub(crate) links: Vec<Link>,

    pub(crate) mappings: Vec<MappingConnection>,
    pub(crate) hypotheses: Vec<MappingHypothesis>,
    pub(crate) analogs: Vec<Analog>,

    pub(crate) local: LocalInhibitor,
    pub(crate) global: GlobalInhibitor,

    pub(crate) driver: RegionSet,
    pub(crate) recipient: RegionSet,
    pub(crate) emerging: RegionSet,

    names: HashMap<String, TokenRef>,

    max_semantic_input: f32,
    pub(crate) age_ticks: u64,
}

impl Default for Network {
    fn default() -> Self {
        Self::with_config(SimConfig::default())
    }
}

impl Network {
    pub fn new(cfg: SimConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self::with_config(cfg))
    }

    fn with_config(cfg: SimConfig) -> Self {
        Self {
            cfg,
            groups: Vec::new(),
            roles: Vec::new(),
            bindings: Vec::new(),
            fillers: Vec::new(),
            semantics: Vec::new(),
            links: Vec::new(),
            mappings: Vec::new(),
            hypotheses: Vec::new(),
            analogs: Vec::new(),
            local: LocalInhibitor::default(),
            global: GlobalInhibitor::default(),
            driver: RegionSet::default(),
            recipient: RegionSet::default(),
            emerging: RegionSet::default(),
            names: HashMap::new(),
            max_semantic_input: 0.0,
            age_ticks: 0,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    pub fn set_config(&mut self, cfg: SimConfig) -> Result<()> {
        cfg.validate()?;
        self.cfg = cfg;
        Ok(())
    }

    pub fn set_phase_set(&mut self, phase_set: u32) {
        self.cfg.phase_set = phase_set;
    }

    pub fn age_ticks(&self) -> u64 {
        self.age_ticks
    }

    pub fn max_semantic_input(&self) -> f32 {
        self.max_semantic_input
    }

    pub fn local_inhibitor(&self) -> &LocalInhibitor {
        &self.local
    }

    pub fn global_inhibitor(&self) -> &GlobalInhibitor {
        &self.global
    }

    // ------------------------------------------------------------------
    // Pool access
    // ------------------------------------------------------------------

    pub fn group(&self, id: GroupId) -> &Group {
        &self.groups[id.index()]
    }

    pub fn group_mut(&mut self, id: GroupId) -> &mut Group {
        &mut self.groups[id.index()]
    }

    pub fn role(&self, id: RoleId) -> &Role {
        &self.roles[id.index()]
    }

    pub fn role_mut(&mut self, id: RoleId) -> &mut Role {
        &mut self.roles[id.index()]
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        &self.bindings[id.index()]
    }

    pub fn binding_mut(&mut self, id: BindingId) -> &mut Binding {
        &mut self.bindings[id.index()]
    }

    pub fn filler(&self, id: FillerId) -> &Filler {
        &self.fillers[id.index()]
    }

    pub fn filler_mut(&mut self, id: FillerId) -> &mut Filler {
        &mut self.fillers[id.index()]
    }

    pub fn semantic(&self, id: SemanticId) -> &Semantic {
        &self.semantics[id.index()]
    }

    pub fn semantic_mut(&mut self, id: SemanticId) -> &mut Semantic {
        &mut self.semantics[id.index()]
    }

    pub fn semantics(&self) -> &[Semantic] {
        &self.semantics
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.index()]
    }

    pub fn mapping(&self, id: MappingId) -> &MappingConnection {
        &self.mappings[id.index()]
    }

    /// Mapping weights are owned by the mapping subsystem and may change
    /// between ticks.
    pub fn set_mapping_weight(&mut self, id: MappingId, weight: f32) {
        self.mappings[id.index()].weight = weight;
    }

    pub fn hypothesis(&self, id: HypothesisId) -> &MappingHypothesis {
        &self.hypotheses[id.index()]
    }

    pub fn hypothesis_mut(&mut self, id: HypothesisId) -> &mut MappingHypothesis {
        &mut self.hypotheses[id.index()]
    }

    pub fn analog(&self, id: AnalogId) -> &Analog {
        &self.analogs[id.index()]
    }

    pub fn analogs(&self) -> &[Analog] {
        &self.analogs
    }

    pub fn driver(&self) -> &RegionSet {
        &self.driver
    }

    pub fn recipient(&self) -> &RegionSet {
        &self.recipient
    }

    pub fn emerging(&self) -> &RegionSet {
        &self.emerging
    }

    /// Memory has no set: it is everything not in the other three.
    pub fn region_set(&self, region: Region) -> Option<&RegionSet> {
        match region {
            Region::Driver => Some(&self.driver),
            Region::Recipient => Some(&self.recipient),
            Region::Emerging => Some(&self.emerging),
            Region::Memory => None,
        }
    }

    fn region_set_mut(&mut self, region: Region) -> Option<&mut RegionSet> {
        match region {
            Region::Driver => Some(&mut self.driver),
            Region::Recipient => Some(&mut self.recipient),
            Region::Emerging => Some(&mut self.emerging),
            Region::Memory => None,
        }
    }

    pub fn token(&self, r: TokenRef) -> &Token {
        match r {
            TokenRef::Group(id) => &self.groups[id.index()].token,
            TokenRef::Role(id) => &self.roles[id.index()].token,
            TokenRef::Binding(id) => &self.bindings[id.index()].token,
            TokenRef::Filler(id) => &self.fillers[id.index()].token,
        }
    }

    pub fn token_mut(&mut self, r: TokenRef) -> &mut Token {
        match r {
            TokenRef::Group(id) => &mut self.groups[id.index()].token,
            TokenRef::Role(id) => &mut self.roles[id.index()].token,
            TokenRef::Binding(id) => &mut self.bindings[id.index()].token,
            TokenRef::Filler(id) => &mut self.fillers[id.index()].token,
        }
    }

    pub fn act(&self, r: TokenRef) -> f32 {
        self.token(r).act()
    }

    pub fn lookup(&self, name: &str) -> Option<TokenRef> {
        self.names.get(name).copied()
    }

    pub fn all_token_refs(&self) -> impl Iterator<Item = TokenRef> {
        let groups = (0..self.groups.len()).map(|i| TokenRef::Group(GroupId(i)));
        let roles = (0..self.roles.len()).map(|i| TokenRef::Role(RoleId(i)));
        let bindings = (0..self.bindings.len()).map(|i| TokenRef::Binding(BindingId(i)));
        let fillers = (0..self.fillers.len()).map(|i| TokenRef::Filler(FillerId(i)));
        groups.chain(roles).chain(bindings).chain(fillers)
    }

    /// Driver then recipient members, in pool order.
    pub fn processing_tokens(&self) -> Vec<TokenRef> {
        self.driver.tokens().chain(self.recipient.tokens()).collect()
    }

    fn ensure(&self, r: TokenRef) -> Result<()> {
        let (kind, index, len) = match r {
            TokenRef::Group(id) => ("group", id.index(), self.groups.len()),
            TokenRef::Role(id) => ("role", id.index(), self.roles.len()),
            TokenRef::Binding(id) => ("binding", id.index(), self.bindings.len()),
            TokenRef::Filler(id) => ("filler", id.index(), self.fillers.len()),
        };
        if index < len {
            Ok(())
        } else {
            Err(NetError::UnknownUnit { kind, index })
        }
    }

    fn ensure_semantic(&self, id: SemanticId) -> Result<()> {
        if id.index() < self.semantics.len() {
            Ok(())
        } else {
            Err(NetError::UnknownUnit {
                kind: "semantic",
                index: id.index(),
            })
        }
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    pub fn add_analog(&mut self, name: impl Into<String>) -> AnalogId {
        let id = AnalogId(self.analogs.len());
        self.analogs.push(Analog::new(name));
        id
    }

    /// Name check shared by every token constructor; runs before anything
    /// is pushed so a failed add leaves the network untouched.
    fn check_spec(&self, spec: &TokenSpec) -> Result<()> {
        if self.names.contains_key(&spec.name) {
            return Err(NetError::DuplicateName(spec.name.clone()));
        }
        if let Some(a) = spec.analog {
            if a.index() >= self.analogs.len() {
                return Err(NetError::UnknownUnit {
                    kind: "analog",
                    index: a.index(),
                });
            }
        }
        Ok(())
    }

    fn register(&mut self, r: TokenRef) {
        let token = self.token(r);
        let (name, region, analog) = (token.name.clone(), token.region, token.analog);
        self.names.insert(name, r);
        if let Some(set) = self.region_set_mut(region) {
            set.insert(r);
        }
        if let Some(a) = analog {
            self.analogs[a.index()].insert(r);
            if let Some(set) = self.region_set_mut(region) {
                set.add_analog(a);
            }
        }
    }

    pub fn add_group(&mut self, spec: TokenSpec, layer: u32) -> Result<GroupId> {
        self.check_spec(&spec)?;
        let id = GroupId(self.groups.len());
        self.groups.push(Group::new(id, spec, layer));
        self.register(id.into());
        Ok(id)
    }

    pub fn add_role(&mut self, spec: TokenSpec) -> Result<RoleId> {
        self.check_spec(&spec)?;
        let id = RoleId(self.roles.len());
        self.roles.push(Role::new(id, spec));
        self.register(id.into());
        Ok(id)
    }

    pub fn add_binding(&mut self, spec: TokenSpec) -> Result<BindingId> {
        self.check_spec(&spec)?;
        let id = BindingId(self.bindings.len());
        self.bindings.push(Binding::new(id, spec));
        self.register(id.into());
        Ok(id)
    }

    pub fn add_filler(&mut self, spec: TokenSpec, polarity: Polarity) -> Result<FillerId> {
        self.check_spec(&spec)?;
        let id = FillerId(self.fillers.len());
        self.fillers.push(Filler::new(id, spec, polarity));
        self.register(id.into());
        Ok(id)
    }

    pub fn add_semantic(&mut self, semantic: Semantic) -> SemanticId {
        let id = SemanticId(self.semantics.len());
        self.semantics.push(semantic);
        id
    }

    /// `role` heads `binding`.
    pub fn connect_role_binding(&mut self, role: RoleId, binding: BindingId) -> Result<()> {
        self.ensure(role.into())?;
        self.ensure(binding.into())?;
        push_unique(&mut self.roles[role.index()].bindings, binding);
        push_unique(&mut self.bindings[binding.index()].parent_roles, role);
        Ok(())
    }

    /// Attach `filler` to the predicate or object slot of `binding`,
    /// according to its polarity.
    pub fn connect_binding_filler(&mut self, binding: BindingId, filler: FillerId) -> Result<()> {
        self.ensure(binding.into())?;
        self.ensure(filler.into())?;

        let rb = &mut self.bindings[binding.index()];
        let slot = match self.fillers[filler.index()].polarity {
            Polarity::Predicate => &mut rb.predicate,
            Polarity::Object => &mut rb.object,
        };
        if let Some(prev) = slot.replace(filler) {
            if prev != filler {
                warn!(
                    binding = %rb.token.name,
                    "binding slot reassigned; previous filler keeps stale same-binding links"
                );
            }
        }
        let mates: Vec<FillerId> = [rb.predicate, rb.object]
            .into_iter()
            .flatten()
            .filter(|&m| m != filler)
            .collect();

        push_unique(&mut self.fillers[filler.index()].bindings, binding);
        for m in mates {
            push_unique(&mut self.fillers[filler.index()].same_binding, m);
            push_unique(&mut self.fillers[m.index()].same_binding, filler);
        }
        Ok(())
    }

    /// `binding` takes `role` as its argument.
    pub fn connect_child_role(&mut self, binding: BindingId, role: RoleId) -> Result<()> {
        self.ensure(binding.into())?;
        self.ensure(role.into())?;
        self.bindings[binding.index()].child_role = Some(role);
        push_unique(&mut self.roles[role.index()].parent_bindings, binding);
        Ok(())
    }

    pub fn connect_binding_child(&mut self, parent: BindingId, child: BindingId) -> Result<()> {
        self.ensure(parent.into())?;
        self.ensure(child.into())?;
        push_unique(&mut self.bindings[parent.index()].child_bindings, child);
        push_unique(&mut self.bindings[child.index()].parent_bindings, parent);
        Ok(())
    }

    pub fn connect_group_role(&mut self, group: GroupId, role: RoleId) -> Result<()> {
        self.ensure(group.into())?;
        self.ensure(role.into())?;
        push_unique(&mut self.groups[group.index()].roles, role);
        push_unique(&mut self.roles[role.index()].groups, group);
        Ok(())
    }

    pub fn connect_group_binding(&mut self, group: GroupId, binding: BindingId) -> Result<()> {
        self.ensure(group.into())?;
        self.ensure(binding.into())?;
        push_unique(&mut self.groups[group.index()].bindings, binding);
        Ok(())
    }

    pub fn connect_groups(&mut self, parent: GroupId, child: GroupId) -> Result<()> {
        self.ensure(parent.into())?;
        self.ensure(child.into())?;
        push_unique(&mut self.groups[parent.index()].child_groups, child);
        push_unique(&mut self.groups[child.index()].parent_groups, parent);
        Ok(())
    }

    /// Link a filler to a semantic and refresh the filler's normalization.
    pub fn link_filler_semantic(
        &mut self,
        filler: FillerId,
        role: Option<RoleId>,
        semantic: SemanticId,
        weight: f32,
    ) -> Result<LinkId> {
        self.ensure(filler.into())?;
        self.ensure_semantic(semantic)?;
        if let Some(r) = role {
            self.ensure(r.into())?;
        }
        let id = LinkId(self.links.len());
        self.links
            .push(Link::new(LinkOwner::Filler(filler), role, semantic, weight));
        self.semantics[semantic.index()].links.push(id);

        let significance = self.cfg.semantic_significance;
        let f = &mut self.fillers[filler.index()];
        f.links.push(id);
        f.recompute_semantic_normalization(&self.links, significance);
        f.recompute_max_semantic_weight(&self.links);
        Ok(id)
    }

    pub fn link_group_semantic(
        &mut self,
        group: GroupId,
        semantic: SemanticId,
        weight: f32,
    ) -> Result<LinkId> {
        self.ensure(group.into())?;
        self.ensure_semantic(semantic)?;
        let id = LinkId(self.links.len());
        self.links
            .push(Link::new(LinkOwner::Group(group), None, semantic, weight));
        self.semantics[semantic.index()].links.push(id);

        let significance = self.cfg.semantic_significance;
        let g = &mut self.groups[group.index()];
        g.links.push(id);
        g.recompute_semantic_normalization(&self.links, significance);
        Ok(id)
    }

    /// Recompute normalization (and max link weight) for every filler and
    /// group, e.g. after changing the significance threshold.
    pub fn refresh_semantic_normalization(&mut self) {
        let significance = self.cfg.semantic_significance;
        for f in &mut self.fillers {
            f.recompute_semantic_normalization(&self.links, significance);
            f.recompute_max_semantic_weight(&self.links);
        }
        for g in &mut self.groups {
            g.recompute_semantic_normalization(&self.links, significance);
        }
    }

    fn check_mapping_endpoint(&self, r: TokenRef, expected: Region) -> Result<()> {
        self.ensure(r)?;
        let t = self.token(r);
        if t.region != expected {
            return Err(NetError::MappingRegion {
                name: t.name.clone(),
                expected,
                found: t.region,
            });
        }
        Ok(())
    }

    pub fn connect_mapping(
        &mut self,
        driver: TokenRef,
        recipient: TokenRef,
        weight: f32,
    ) -> Result<MappingId> {
        if driver.kind() != recipient.kind() {
            return Err(NetError::MappingKindMismatch {
                driver: driver.kind(),
                recipient: recipient.kind(),
            });
        }
        self.check_mapping_endpoint(driver, Region::Driver)?;
        self.check_mapping_endpoint(recipient, Region::Recipient)?;

        let id = MappingId(self.mappings.len());
        self.mappings.push(MappingConnection {
            driver,
            recipient,
            weight,
        });
        self.token_mut(driver).mapping.connections.push(id);
        self.token_mut(recipient).mapping.connections.push(id);
        Ok(id)
    }

    pub fn add_hypothesis(
        &mut self,
        driver: TokenRef,
        recipient: TokenRef,
        evidence: f32,
    ) -> Result<HypothesisId> {
        if driver.kind() != recipient.kind() {
            return Err(NetError::MappingKindMismatch {
                driver: driver.kind(),
                recipient: recipient.kind(),
            });
        }
        self.ensure(driver)?;
        self.ensure(recipient)?;
        let id = HypothesisId(self.hypotheses.len());
        self.hypotheses.push(MappingHypothesis {
            driver,
            recipient,
            evidence,
        });
        self.token_mut(driver).mapping.hypotheses.push(id);
        self.token_mut(recipient).mapping.hypotheses.push(id);
        Ok(id)
    }

    /// Record that firing `maker` produced the inferred unit `made`.
    pub fn record_inference(&mut self, maker: TokenRef, made: TokenRef) -> Result<()> {
        self.ensure(maker)?;
        self.ensure(made)?;
        let p = &mut self.token_mut(made).provenance;
        p.inferred = true;
        p.sim_made = true;
        p.maker = Some(maker);
        self.token_mut(maker).provenance.made = Some(made);
        Ok(())
    }

    /// End of an inference cycle: units stop counting as freshly inferred.
    /// `sim_made` is kept.
    pub fn clear_inferred(&mut self) {
        for r in self.all_token_refs().collect::<Vec<_>>() {
            self.token_mut(r).provenance.inferred = false;
        }
    }

    // ------------------------------------------------------------------
    // Region membership
    // ------------------------------------------------------------------

    /// Move one token, updating its tag and the region lists together.
    pub fn move_token(&mut self, r: TokenRef, to: Region) -> Result<()> {
        self.ensure(r)?;
        let from = self.token(r).region;
        if from == to {
            return Ok(());
        }
        if let Some(set) = self.region_set_mut(from) {
            set.remove(r);
        }
        if let Some(set) = self.region_set_mut(to) {
            set.insert(r);
        }
        self.token_mut(r).region = to;
        debug!(unit = %self.token(r).name, %from, %to, "moved unit");
        Ok(())
    }

    /// Move every token of an analog and re-home the analog itself.
    pub fn move_analog(&mut self, analog: AnalogId, to: Region) -> Result<()> {
        if analog.index() >= self.analogs.len() {
            return Err(NetError::UnknownUnit {
                kind: "analog",
                index: analog.index(),
            });
        }
        let members: Vec<TokenRef> = self.analogs[analog.index()].tokens().collect();
        for r in members {
            self.move_token(r, to)?;
        }
        for region in [Region::Driver, Region::Recipient, Region::Emerging] {
            if let Some(set) = self.region_set_mut(region) {
                if region == to {
                    set.add_analog(analog);
                } else {
                    set.remove_analog(analog);
                }
            }
        }
        Ok(())
    }

    /// Roll up unit counts and summed activation for every analog.
    pub fn refresh_analogs(&mut self) {
        for i in 0..self.analogs.len() {
            let a = &self.analogs[i];
            let total: f32 = a
                .roles
                .iter()
                .map(|&r| self.roles[r.index()].token.act())
                .chain(a.bindings.iter().map(|&b| self.bindings[b.index()].token.act()))
                .chain(a.fillers.iter().map(|&f| self.fillers[f.index()].token.act()))
                .sum();
            let a = &mut self.analogs[i];
            let n = a.count_units();
            a.total_act = total;
            a.normalized_retrieval_act = if n > 0 { Some(total / n as f32) } else { None };
        }
    }

    // ------------------------------------------------------------------
    // Bulk resets used by the control loop
    // ------------------------------------------------------------------

    pub fn reset_inputs(&mut self, carry_td: f32) {
        for r in self.processing_tokens() {
            self.token_mut(r).reset_input(carry_td);
        }
        for s in &mut self.semantics {
            s.reset_input(0.0);
        }
    }

    pub fn reset_activations(&mut self) {
        for r in self.processing_tokens() {
            self.token_mut(r).reset_activation();
        }
        for s in &mut self.semantics {
            s.reset();
        }
    }

    pub fn reset_inhibitors(&mut self) {
        for r in self.processing_tokens() {
            self.token_mut(r).reset_inhibitor();
        }
        self.local.reset();
        self.global.reset();
    }

    // ------------------------------------------------------------------
    // Tick pipeline
    // ------------------------------------------------------------------

    /// Re-resolve role and binding modes from current activations.
    pub fn resolve_modes(&mut self) {
        let roles: Vec<_> = self
            .driver
            .roles
            .iter()
            .chain(&self.recipient.roles)
            .map(|&r| (r, self.roles[r.index()].resolve_mode(self)))
            .collect();
        let bindings: Vec<_> = self
            .driver
            .bindings
            .iter()
            .chain(&self.recipient.bindings)
            .map(|&b| (b, self.bindings[b.index()].resolve_mode(self)))
            .collect();
        for (r, mode) in roles {
            self.roles[r.index()].mode = mode;
        }
        for (b, mode) in bindings {
            self.bindings[b.index()].mode = mode;
        }
    }

    /// Aggregate every processing unit's input and every semantic's input
    /// from the current state, without mutating anything.
    pub fn gather_inputs(&self) -> Result<PendingInputs> {
        let ctx = InputContext::from_config(&self.cfg);
        let refs = self.processing_tokens();
        let mut tokens = Vec::with_capacity(refs.len());
        for r in refs {
            let delta = match r {
                TokenRef::Group(id) => self.groups[id.index()].gather(self, &ctx)?,
                TokenRef::Role(id) => self.roles[id.index()].gather(self, &ctx)?,
                TokenRef::Binding(id) => self.bindings[id.index()].gather(self, &ctx)?,
                TokenRef::Filler(id) => self.fillers[id.index()].gather(self, &ctx)?,
            };
            tokens.push((r, delta));
        }

        let filter = SemanticFilter {
            ignore_objects: self.cfg.ignore_object_semantics,
            ignore_memory: self.cfg.ignore_memory_semantics,
        };
        let semantic_inputs = self
            .semantics
            .iter()
            .map(|s| s.accumulate_input(self, filter))
            .collect();

        Ok(PendingInputs {
            tokens,
            semantic_inputs,
        })
    }

    /// Apply gathered inputs and run the network-wide semantic max pass.
    pub fn commit_inputs(&mut self, pending: PendingInputs) {
        if self.cfg.clear_inputs_each_tick {
            for &(r, _) in &pending.tokens {
                self.token_mut(r).clear_input();
            }
        }
        for (r, delta) in &pending.tokens {
            self.token_mut(*r).apply(delta);
        }
        if let Some(kind) = self.cfg.synchrony_level {
            for &(r, _) in &pending.tokens {
                if r.kind() == kind {
                    self.token_mut(r).zero_lateral_input();
                }
            }
        }

        let max = pending.semantic_inputs.iter().copied().fold(0.0f32, f32::max);
        for (s, input) in self.semantics.iter_mut().zip(pending.semantic_inputs) {
            s.input = input;
            s.set_max_input(max);
        }
        self.max_semantic_input = max;
    }

    pub fn update_activations(&mut self) {
        let (growth, decay, bias) = (
            self.cfg.growth_rate,
            self.cfg.decay_rate,
            self.cfg.mapping_bias,
        );
        for r in self.processing_tokens() {
            self.token_mut(r).update_activation(growth, decay, bias);
        }
        for s in &mut self.semantics {
            s.update_activation();
        }
    }

    /// Integrate the new activations into each unit's inhibitor and latch
    /// those that crossed their kind's threshold.
    pub fn update_inhibitors(&mut self) {
        let thresholds = self.cfg.thresholds;
        for r in self.processing_tokens() {
            let threshold = thresholds.for_kind(r.kind());
            let t = self.token_mut(r);
            t.accumulate_inhibitor_input();
            t.update_inhibitor_act(threshold);
        }
    }

    /// One synchronous sweep. Every input is computed from the state at
    /// the start of the tick before any activation changes.
    pub fn tick(&mut self) -> Result<TickReport> {
        let processed = self.driver.len() + self.recipient.len();
        if processed == 0 {
            warn!("tick with no driver or recipient units");
        }

        self.resolve_modes();
        let pending = self.gather_inputs()?;
        self.commit_inputs(pending);
        self.update_activations();
        self.update_inhibitors();
        let inhibitors = self.run_inhibitors();

        self.age_ticks = self.age_ticks.wrapping_add(1);
        let report = TickReport {
            tick: self.age_ticks,
            processed,
            max_semantic_input: self.max_semantic_input,
            inhibitors,
        };
        trace!(
            tick = report.tick,
            processed,
            max_semantic_input = report.max_semantic_input,
            local = inhibitors.local_fired,
            global = inhibitors.global_fired,
            "tick"
        );
        Ok(report)
    }

    /// Run `n` ticks, stopping at the first error.
    pub fn run(&mut self, n: usize) -> Result<Vec<TickReport>> {
        let mut reports = Vec::with_capacity(n);
        for _ in 0..n {
            reports.push(self.tick()?);
        }
        Ok(reports)
    }

    /// Mean activation of one kind within a region; 0 for an empty pool.
    pub fn mean_activation(&self, region: Region, kind: UnitKind) -> f32 {
        let acts: Vec<f32> = match self.region_set(region) {
            Some(set) => set
                .tokens()
                .filter(|r| r.kind() == kind)
                .map(|r| self.act(r))
                .collect(),
            None => self
                .all_token_refs()
                .filter(|&r| r.kind() == kind && self.token(r).region == Region::Memory)
                .map(|r| self.act(r))
                .collect(),
        };
        if acts.is_empty() {
            0.0
        } else {
            acts.iter().sum::<f32>() / acts.len() as f32
        }
    }
}

fn push_unique<T: PartialEq>(v: &mut Vec<T>, x: T) {
    if !v.contains(&x) {
        v.push(x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Mode;

    #[test]
    fn duplicate_names_are_rejected() {
        let mut net = Network::default();
        net.add_role(TokenSpec::new("P", Region::Driver)).unwrap();
        let err = net.add_binding(TokenSpec::new("P", Region::Driver)).unwrap_err();
        assert!(matches!(err, NetError::DuplicateName(_)));
        assert_eq!(net.bindings.len(), 0);
    }

    #[test]
    fn constructors_register_region_and_analog() {
        let mut net = Network::default();
        let a = net.add_analog("story");
        let f = net
            .add_filler(
                TokenSpec::new("john", Region::Recipient).in_analog(a),
                Polarity::Object,
            )
            .unwrap();
        assert!(net.recipient().contains(f.into()));
        assert!(net.recipient().analogs.contains(&a));
        assert_eq!(net.analog(a).fillers, vec![f]);
        assert_eq!(net.lookup("john"), Some(TokenRef::Filler(f)));
    }

    #[test]
    fn same_binding_lists_are_symmetric() {
        let mut net = Network::default();
        let rb = net.add_binding(TokenSpec::new("rb", Region::Driver)).unwrap();
        let p = net
            .add_filler(TokenSpec::new("p", Region::Driver), Polarity::Predicate)
            .unwrap();
        let o = net
            .add_filler(TokenSpec::new("o", Region::Driver), Polarity::Object)
            .unwrap();
        net.connect_binding_filler(rb, p).unwrap();
        net.connect_binding_filler(rb, o).unwrap();
        assert_eq!(net.filler(p).same_binding, vec![o]);
        assert_eq!(net.filler(o).same_binding, vec![p]);
        assert_eq!(net.binding(rb).predicate, Some(p));
        assert_eq!(net.binding(rb).object, Some(o));
    }

    #[test]
    fn mapping_endpoints_are_validated() {
        let mut net = Network::default();
        let d = net
            .add_filler(TokenSpec::new("d", Region::Driver), Polarity::Object)
            .unwrap();
        let r = net
            .add_filler(TokenSpec::new("r", Region::Recipient), Polarity::Object)
            .unwrap();
        let rb = net.add_binding(TokenSpec::new("rb", Region::Recipient)).unwrap();

        assert!(matches!(
            net.connect_mapping(d.into(), rb.into(), 0.5),
            Err(NetError::MappingKindMismatch { .. })
        ));
        assert!(matches!(
            net.connect_mapping(r.into(), d.into(), 0.5),
            Err(NetError::MappingRegion { .. })
        ));
        let m = net.connect_mapping(d.into(), r.into(), 0.5).unwrap();
        assert_eq!(net.filler(d).token.mapping.connections, vec![m]);
        assert_eq!(net.filler(r).token.mapping.connections, vec![m]);
    }

    #[test]
    fn max_maps_track_the_strongest_partner() {
        let mut net = Network::default();
        let d1 = net.add_role(TokenSpec::new("d1", Region::Driver)).unwrap();
        let d2 = net.add_role(TokenSpec::new("d2", Region::Driver)).unwrap();
        let r = net.add_role(TokenSpec::new("r", Region::Recipient)).unwrap();
        net.connect_mapping(d1.into(), r.into(), 0.3).unwrap();
        net.connect_mapping(d2.into(), r.into(), 0.7).unwrap();
        net.refresh_max_maps();
        let book = &net.role(r).token.mapping;
        assert_eq!(book.max_map, 0.7);
        assert_eq!(book.max_map_unit, Some(TokenRef::Role(d2)));
        assert_eq!(net.role(d1).token.mapping.max_map, 0.3);
    }

    #[test]
    fn move_token_updates_tag_and_lists() {
        let mut net = Network::default();
        let f = net
            .add_filler(TokenSpec::new("f", Region::Memory), Polarity::Object)
            .unwrap();
        assert!(net.driver().is_empty());
        net.move_token(f.into(), Region::Driver).unwrap();
        assert_eq!(net.filler(f).token.region, Region::Driver);
        assert!(net.driver().contains(f.into()));
        net.move_token(f.into(), Region::Recipient).unwrap();
        assert!(!net.driver().contains(f.into()));
        assert!(net.recipient().contains(f.into()));
    }

    #[test]
    fn move_analog_rehomes_every_member() {
        let mut net = Network::default();
        let a = net.add_analog("a");
        let p = net.add_role(TokenSpec::new("P", Region::Memory).in_analog(a)).unwrap();
        let rb = net.add_binding(TokenSpec::new("rb", Region::Memory).in_analog(a)).unwrap();
        net.move_analog(a, Region::Recipient).unwrap();
        assert!(net.recipient().contains(p.into()));
        assert!(net.recipient().contains(rb.into()));
        assert!(net.recipient().analogs.contains(&a));
        net.move_analog(a, Region::Driver).unwrap();
        assert!(!net.recipient().analogs.contains(&a));
        assert!(net.driver().analogs.contains(&a));
    }

    #[test]
    fn analog_rollup_normalizes_by_unit_count() {
        let mut net = Network::default();
        let a = net.add_analog("a");
        let p = net.add_role(TokenSpec::new("P", Region::Driver).in_analog(a)).unwrap();
        let rb = net.add_binding(TokenSpec::new("rb", Region::Driver).in_analog(a)).unwrap();
        net.role_mut(p).token.state.act = 0.4;
        net.binding_mut(rb).token.state.act = 0.2;
        net.refresh_analogs();
        let analog = net.analog(a);
        assert_eq!(analog.num_units, Some(2));
        assert!((analog.total_act - 0.6).abs() < 1e-6);
        assert!((analog.normalized_retrieval_act.unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn memory_units_are_not_ticked_but_error_if_gathered_directly() {
        let mut net = Network::default();
        let f = net
            .add_filler(TokenSpec::new("f", Region::Memory), Polarity::Object)
            .unwrap();
        net.filler_mut(f).token.state.act = 0.5;
        net.filler_mut(f).token.state.td_input = 5.0;
        net.tick().unwrap();
        assert_eq!(net.filler(f).token.act(), 0.5);

        let ctx = InputContext::from_config(net.config());
        assert!(matches!(
            net.filler(f).gather(&net, &ctx),
            Err(NetError::InactiveRegion { .. })
        ));
    }

    #[test]
    fn semantics_follow_driver_fillers_and_skip_emerging() {
        let mut net = Network::default();
        let s1 = net.add_semantic(Semantic::new("a"));
        let s2 = net.add_semantic(Semantic::new("b"));
        let f = net
            .add_filler(TokenSpec::new("f", Region::Driver), Polarity::Predicate)
            .unwrap();
        let e = net
            .add_filler(TokenSpec::new("e", Region::Emerging), Polarity::Predicate)
            .unwrap();
        net.link_filler_semantic(f, None, s1, 1.0).unwrap();
        net.link_filler_semantic(f, None, s2, 0.5).unwrap();
        net.link_filler_semantic(e, None, s2, 1.0).unwrap();
        net.filler_mut(f).token.state.act = 0.8;
        net.filler_mut(e).token.state.act = 1.0;

        net.tick().unwrap();
        assert!((net.max_semantic_input() - 0.8).abs() < 1e-6);
        assert!((net.semantic(s1).act - 1.0).abs() < 1e-6);
        assert!((net.semantic(s2).act - 0.5).abs() < 1e-6);
    }

    #[test]
    fn object_semantics_can_be_ignored() {
        let mut cfg = SimConfig::default();
        cfg.ignore_object_semantics = true;
        let mut net = Network::new(cfg).unwrap();
        let s = net.add_semantic(Semantic::new("s"));
        let o = net
            .add_filler(TokenSpec::new("o", Region::Driver), Polarity::Object)
            .unwrap();
        net.link_filler_semantic(o, None, s, 1.0).unwrap();
        net.filler_mut(o).token.state.act = 1.0;
        let pending = net.gather_inputs().unwrap();
        assert_eq!(pending.semantic_inputs, vec![0.0]);
    }

    #[test]
    fn modes_are_resolved_before_inputs_are_gathered() {
        let mut net = Network::default();
        let p = net.add_role(TokenSpec::new("P", Region::Driver)).unwrap();
        let rb = net.add_binding(TokenSpec::new("rb", Region::Driver)).unwrap();
        net.connect_role_binding(p, rb).unwrap();
        net.binding_mut(rb).token.state.act = 0.5;

        net.tick().unwrap();
        assert_eq!(net.role(p).mode, Mode::Parent);
        // Parent-mode driver role: bottom-up from its binding.
        assert!((net.role(p).token.state.bu_input - 0.5).abs() < 1e-6);
    }

    #[test]
    fn synchrony_level_zeroes_lateral_input() {
        let cfg = SimConfig::default().with_synchrony_level(Some(UnitKind::Filler));
        let mut net = Network::new(cfg).unwrap();
        let a = net
            .add_filler(TokenSpec::new("a", Region::Driver), Polarity::Object)
            .unwrap();
        let b = net
            .add_filler(TokenSpec::new("b", Region::Driver), Polarity::Object)
            .unwrap();
        net.filler_mut(a).token.state.act = 0.5;
        net.filler_mut(b).token.state.act = 0.5;
        net.tick().unwrap();
        assert_eq!(net.filler(a).token.state.lateral_input, 0.0);
        assert_eq!(net.filler(b).token.state.lateral_input, 0.0);
    }

    #[test]
    fn inhibitor_accumulates_until_local_fire() {
        let mut cfg = SimConfig::default();
        cfg.thresholds.filler = Some(1.5);
        let mut net = Network::new(cfg).unwrap();
        let rb = net.add_binding(TokenSpec::new("rb", Region::Driver)).unwrap();
        let f = net
            .add_filler(TokenSpec::new("f", Region::Driver), Polarity::Predicate)
            .unwrap();
        net.connect_binding_filler(rb, f).unwrap();

        let mut fired_at = None;
        for i in 0..20 {
            // Hold the binding on so the filler keeps receiving top-down input.
            net.binding_mut(rb).token.state.act = 1.0;
            let report = net.tick().unwrap();
            if report.inhibitors.local_fired {
                fired_at = Some(i);
                break;
            }
        }
        assert!(fired_at.is_some());
        assert_eq!(net.filler(f).token.act(), 0.0);
        assert_eq!(net.filler(f).token.state.inhibitor_input, 0.0);
    }

    #[test]
    fn inference_links_maker_and_made() {
        let mut net = Network::default();
        let rb = net.add_binding(TokenSpec::new("rb", Region::Driver)).unwrap();
        let new = net
            .add_filler(TokenSpec::new("new", Region::Recipient), Polarity::Object)
            .unwrap();
        net.record_inference(rb.into(), new.into()).unwrap();
        let p = &net.filler(new).token.provenance;
        assert!(p.inferred && p.sim_made);
        assert_eq!(p.maker, Some(TokenRef::Binding(rb)));
        assert_eq!(net.binding(rb).token.provenance.made, Some(TokenRef::Filler(new)));

        net.clear_inferred();
        let p = &net.filler(new).token.provenance;
        assert!(!p.inferred);
        assert!(p.sim_made);
    }

    #[test]
    fn hypotheses_are_indexed_from_both_ends() {
        let mut net = Network::default();
        let d = net.add_binding(TokenSpec::new("d", Region::Driver)).unwrap();
        let r = net.add_binding(TokenSpec::new("r", Region::Recipient)).unwrap();
        let h = net.add_hypothesis(d.into(), r.into(), 0.0).unwrap();
        net.hypothesis_mut(h).evidence += 0.4;
        assert_eq!(net.binding(d).token.mapping.hypotheses, vec![h]);
        assert_eq!(net.binding(r).token.mapping.hypotheses, vec![h]);
        assert_eq!(net.hypothesis(h).evidence, 0.4);
    }

    #[test]
    fn reweighting_a_mapping_moves_the_max() {
        let mut net = Network::default();
        let d = net.add_role(TokenSpec::new("d", Region::Driver)).unwrap();
        let r = net.add_role(TokenSpec::new("r", Region::Recipient)).unwrap();
        let m = net.connect_mapping(d.into(), r.into(), 0.2).unwrap();
        net.refresh_max_maps();
        assert_eq!(net.role(r).token.mapping.max_map, 0.2);
        net.set_mapping_weight(m, 0.9);
        net.refresh_max_maps();
        assert_eq!(net.role(r).token.mapping.max_map, 0.9);
    }

    #[test]
    fn significance_change_needs_a_refresh() {
        let mut net = Network::default();
        let f = net
            .add_filler(TokenSpec::new("f", Region::Recipient), Polarity::Object)
            .unwrap();
        let s1 = net.add_semantic(Semantic::new("a"));
        let s2 = net.add_semantic(Semantic::new("b"));
        net.link_filler_semantic(f, None, s1, 0.3).unwrap();
        net.link_filler_semantic(f, None, s2, 0.6).unwrap();
        assert!((net.filler(f).sem_normalization.unwrap() - 0.9).abs() < 1e-6);

        let mut cfg = *net.config();
        cfg.semantic_significance = 0.5;
        net.set_config(cfg).unwrap();
        net.refresh_semantic_normalization();
        assert!((net.filler(f).sem_normalization.unwrap() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn group_binding_feeds_bottom_up() {
        let mut net = Network::default();
        let g = net.add_group(TokenSpec::new("g", Region::Driver), 1).unwrap();
        let rb = net.add_binding(TokenSpec::new("rb", Region::Driver)).unwrap();
        net.connect_group_binding(g, rb).unwrap();
        net.binding_mut(rb).token.state.act = 0.3;
        let pending = net.gather_inputs().unwrap();
        let (_, d) = pending
            .tokens
            .iter()
            .find(|(r, _)| *r == TokenRef::Group(g))
            .unwrap();
        assert!((d.bu - 0.3).abs() < 1e-6);
    }

    #[test]
    fn bulk_resets_cover_processing_units_only() {
        let mut net = Network::default();
        let d = net
            .add_filler(TokenSpec::new("d", Region::Driver), Polarity::Object)
            .unwrap();
        let m = net
            .add_filler(TokenSpec::new("m", Region::Memory), Polarity::Object)
            .unwrap();
        for f in [d, m] {
            let st = &mut net.filler_mut(f).token.state;
            st.act = 0.5;
            st.bu_input = 1.0;
            st.td_input = 1.0;
            st.inhibitor_act = true;
        }

        net.reset_inputs(0.25);
        assert_eq!(net.filler(d).token.state.bu_input, 0.0);
        assert_eq!(net.filler(d).token.state.td_input, 0.25);
        assert_eq!(net.filler(m).token.state.bu_input, 1.0);

        net.reset_inhibitors();
        assert!(!net.filler(d).token.state.inhibitor_act);
        assert!(net.filler(m).token.state.inhibitor_act);

        net.reset_activations();
        assert_eq!(net.filler(d).token.act(), 0.0);
        assert_eq!(net.filler(m).token.act(), 0.5);
    }

    #[test]
    fn unknown_handles_are_reported() {
        let mut net = Network::default();
        let rb = net.add_binding(TokenSpec::new("rb", Region::Driver)).unwrap();
        assert!(matches!(
            net.connect_binding_filler(rb, FillerId(9)),
            Err(NetError::UnknownUnit { kind: "filler", index: 9 })
        ));
        assert!(net.set_config(SimConfig::default().with_rates(-1.0, 0.1)).is_err());
    }

    #[test]
    fn recipient_semantic_input_holds_steady_without_per_tick_clear() {
        let mut cfg = SimConfig::default();
        cfg.clear_inputs_each_tick = false;
        let mut net = Network::new(cfg).unwrap();
        let f = net
            .add_filler(TokenSpec::new("f", Region::Recipient), Polarity::Object)
            .unwrap();
        let s = net.add_semantic(Semantic::new("s"));
        net.link_filler_semantic(f, None, s, 1.0).unwrap();

        for _ in 0..3 {
            net.semantic_mut(s).act = 1.0;
            net.tick().unwrap();
            assert!((net.filler(f).token.state.bu_input - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn carried_top_down_survives_the_per_tick_clear() {
        let mut net = Network::default();
        let f = net
            .add_filler(TokenSpec::new("lonely", Region::Driver), Polarity::Object)
            .unwrap();
        net.reset_inputs(0.5);
        net.tick().unwrap();

        let st = &net.filler(f).token.state;
        assert_eq!(st.td_input, 0.5);
        // 0.3 * 0.5 * (1.1 - 0.0)
        assert!((st.act - 0.165).abs() < 1e-6);

        net.reset_activations();
        net.tick().unwrap();
        assert_eq!(net.filler(f).token.act(), 0.0);
    }
}
