//! Criterion benchmarks for the propagation tick.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use relnet::config::SimConfig;
use relnet::handle::{Competition, Polarity, Region, TokenRef};
use relnet::network::Network;
use relnet::prng::Prng;
use relnet::semantic::Semantic;
use relnet::token::TokenSpec;

/// `props` two-place propositions in each of driver and recipient, over a
/// shared pool of semantics, with one-to-one mappings between them.
fn make_network(props: usize, semantics: usize, cfg: SimConfig, seed: u64) -> Network {
    let mut rng = Prng::new(seed);
    let mut net = Network::new(cfg).unwrap();
    let sems: Vec<_> = (0..semantics)
        .map(|i| net.add_semantic(Semantic::new(format!("s{i}"))))
        .collect();

    let mut sides = Vec::new();
    for region in [Region::Driver, Region::Recipient] {
        let mut units: Vec<TokenRef> = Vec::new();
        for p in 0..props {
            let name = |what: &str, i: usize| format!("{region}-{p}-{what}{i}");
            let role = net.add_role(TokenSpec::new(name("P", 0), region)).unwrap();
            units.push(role.into());
            for slot in 0..2 {
                let rb = net.add_binding(TokenSpec::new(name("rb", slot), region)).unwrap();
                let pred = net
                    .add_filler(TokenSpec::new(name("pred", slot), region), Polarity::Predicate)
                    .unwrap();
                let obj = net
                    .add_filler(TokenSpec::new(name("obj", slot), region), Polarity::Object)
                    .unwrap();
                net.connect_role_binding(role, rb).unwrap();
                net.connect_binding_filler(rb, pred).unwrap();
                net.connect_binding_filler(rb, obj).unwrap();
                for f in [pred, obj] {
                    for _ in 0..4 {
                        let s = sems[rng.gen_range_usize(0, sems.len())];
                        let w = rng.gen_range_f32(0.2, 1.0);
                        net.link_filler_semantic(f, None, s, w).unwrap();
                    }
                }
                units.extend([TokenRef::from(rb), pred.into(), obj.into()]);
            }
        }
        sides.push(units);
    }

    for (&d, &r) in sides[0].iter().zip(&sides[1]) {
        let w = rng.gen_range_f32(0.1, 1.0);
        net.connect_mapping(d, r, w).unwrap();
    }
    net.refresh_max_maps();
    net
}

fn fire_first_binding(net: &mut Network) {
    if let Some(&rb) = net.driver().bindings.first() {
        net.binding_mut(rb).token.state.act = 1.0;
    }
}

/// Benchmark tick() with varying network sizes.
fn bench_tick_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_size");

    for props in [4usize, 16, 64, 128].iter() {
        // 7 tokens per proposition per side.
        group.throughput(Throughput::Elements((*props * 14) as u64));

        group.bench_with_input(BenchmarkId::new("fine", props), props, |b, &props| {
            let mut net = make_network(props, 64, SimConfig::default(), 42);
            b.iter(|| {
                fire_first_binding(&mut net);
                let report = net.tick().unwrap();
                black_box(report.max_semantic_input)
            });
        });
    }

    group.finish();
}

/// Benchmark the two competition regimes at a fixed size.
fn bench_competition(c: &mut Criterion) {
    let mut group = c.benchmark_group("competition");
    let props = 32;

    for (label, competition) in [("fine", Competition::Fine), ("coarse", Competition::Coarse)] {
        group.bench_function(label, |b| {
            let cfg = SimConfig::default()
                .with_competition(competition)
                .with_phase_set(1);
            let mut net = make_network(props, 64, cfg, 7);
            b.iter(|| {
                fire_first_binding(&mut net);
                let report = net.tick().unwrap();
                black_box(report.processed)
            });
        });
    }

    group.finish();
}

/// Gather alone, without committing.
fn bench_gather(c: &mut Criterion) {
    let mut group = c.benchmark_group("gather");

    for props in [16usize, 64].iter() {
        group.bench_with_input(BenchmarkId::new("inputs", props), props, |b, &props| {
            let mut net = make_network(props, 64, SimConfig::default(), 42);
            // Warm up so activations are non-trivial.
            for _ in 0..20 {
                fire_first_binding(&mut net);
                net.tick().unwrap();
            }
            b.iter(|| {
                let pending = net.gather_inputs().unwrap();
                black_box(pending.tokens.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tick_sizes, bench_competition, bench_gather);
criterion_main!(benches);
