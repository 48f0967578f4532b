use relnet::observer::{describe_tick, NetworkAdapter};
use relnet::prelude::*;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Driver proposition `loves(John, Mary)` against recipient `likes(Bill, Sally)`.
struct Scenario {
    net: Network,
    /// Driver bindings in firing order.
    firing: Vec<BindingId>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut config_path: Option<String> = None;
    let mut ticks: usize = 120;
    let mut ticks_per_binding: usize = 30;

    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            "--config" => config_path = it.next().cloned(),
            "--ticks" => ticks = parse_count(it.next(), "--ticks")?,
            "--phase-ticks" => ticks_per_binding = parse_count(it.next(), "--phase-ticks")?.max(1),
            other => {
                eprintln!("Unknown argument: {other}");
                print_help();
                std::process::exit(2);
            }
        }
    }

    let cfg = match &config_path {
        Some(path) => SimConfig::load_json(path)?,
        None => SimConfig::default(),
    };
    info!(
        growth = cfg.growth_rate,
        decay = cfg.decay_rate,
        competition = ?cfg.competition,
        "configuration loaded"
    );

    let Scenario { mut net, firing } = build_scenario(cfg)?;

    let mut current = 0usize;
    let advance = |net: &mut Network, current: &mut usize| {
        net.binding_mut(firing[*current]).increment_fire_count();
        *current = (*current + 1) % firing.len();
        if *current == 0 {
            // Every driver binding has fired once: gated top-down input on.
            let next = net.config().phase_set + 1;
            net.set_phase_set(next);
            info!(phase_set = next, "phase set complete");
        }
    };

    for t in 0..ticks {
        if t > 0 && t % ticks_per_binding == 0 {
            advance(&mut net, &mut current);
        }
        net.binding_mut(firing[current]).token.state.act = 1.0;

        let report = net.tick()?;
        debug!("{}", describe_tick(&report));
        if report.inhibitors.global_fired {
            info!(tick = report.tick, "global inhibitor ended the phase");
            advance(&mut net, &mut current);
        }
    }

    net.refresh_analogs();
    let snapshot = NetworkAdapter::new(&net).snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn parse_count(value: Option<&String>, flag: &str) -> Result<usize, String> {
    value
        .ok_or_else(|| format!("{flag} expects a value"))?
        .parse()
        .map_err(|e| format!("{flag}: {e}"))
}

fn print_help() {
    println!("relnet (token network propagation demo)");
    println!("usage:");
    println!("  cargo run -- [--config sim.json] [--ticks N] [--phase-ticks N]");
    println!("  cargo run -- --help");
    println!();
    println!("Logging follows RUST_LOG (e.g. RUST_LOG=relnet=debug).");
}

fn build_scenario(cfg: SimConfig) -> relnet::error::Result<Scenario> {
    let mut net = Network::new(cfg)?;

    let person = net.add_semantic(Semantic::new("person"));
    let male = net.add_semantic(Semantic::new("male"));
    let female = net.add_semantic(Semantic::new("female"));
    let emotion = net.add_semantic(Semantic::new("emotion"));
    let positive = net.add_semantic(Semantic::new("positive"));
    let strong = net.add_semantic(Semantic::new("strong").with_dimension("intensity", Some(0.9)));
    let mild = net.add_semantic(Semantic::new("mild").with_dimension("intensity", Some(0.4)));
    let agent = net.add_semantic(Semantic::new("agent"));
    let patient = net.add_semantic(Semantic::new("patient"));

    let source = net.add_analog("loves");
    let target = net.add_analog("likes");

    let d = build_proposition(
        &mut net,
        Region::Driver,
        source,
        ["loves", "lover", "beloved", "john", "mary"],
    )?;
    let r = build_proposition(
        &mut net,
        Region::Recipient,
        target,
        ["likes", "liker", "liked", "bill", "sally"],
    )?;

    for (side, intensity) in [(&d, strong), (&r, mild)] {
        for (sem, w) in [(emotion, 1.0), (positive, 1.0), (intensity, 0.8), (agent, 1.0)] {
            net.link_filler_semantic(side.agent_role, Some(side.role), sem, w)?;
        }
        for (sem, w) in [(emotion, 1.0), (positive, 1.0), (intensity, 0.8), (patient, 1.0)] {
            net.link_filler_semantic(side.patient_role, Some(side.role), sem, w)?;
        }
    }
    for (obj, gender) in [(d.agent, male), (d.patient, female), (r.agent, male), (r.patient, female)] {
        net.link_filler_semantic(obj, None, person, 1.0)?;
        net.link_filler_semantic(obj, None, gender, 1.0)?;
    }

    let pairs: [(TokenRef, TokenRef); 7] = [
        (d.role.into(), r.role.into()),
        (d.agent_binding.into(), r.agent_binding.into()),
        (d.patient_binding.into(), r.patient_binding.into()),
        (d.agent_role.into(), r.agent_role.into()),
        (d.patient_role.into(), r.patient_role.into()),
        (d.agent.into(), r.agent.into()),
        (d.patient.into(), r.patient.into()),
    ];
    for (dr, rr) in pairs {
        net.connect_mapping(dr, rr, 0.8)?;
    }
    // Weak cross mappings give the competitive term something to suppress.
    net.connect_mapping(d.agent.into(), r.patient.into(), 0.2)?;
    net.connect_mapping(d.patient.into(), r.agent.into(), 0.2)?;
    net.refresh_max_maps();

    Ok(Scenario {
        net,
        firing: vec![d.agent_binding, d.patient_binding],
    })
}

struct Proposition {
    role: RoleId,
    agent_binding: BindingId,
    patient_binding: BindingId,
    agent_role: FillerId,
    patient_role: FillerId,
    agent: FillerId,
    patient: FillerId,
}

/// `rel(agent, patient)`: one role over two bindings, each binding a
/// predicate filler plus an object filler.
fn build_proposition(
    net: &mut Network,
    region: Region,
    analog: AnalogId,
    [rel, agent_pred, patient_pred, agent, patient]: [&str; 5],
) -> relnet::error::Result<Proposition> {
    let spec = |name: String| TokenSpec::new(name, region).in_analog(analog);

    let role = net.add_role(spec(format!("{rel}({agent},{patient})")))?;
    let agent_binding = net.add_binding(spec(format!("{agent_pred}+{agent}")))?;
    let patient_binding = net.add_binding(spec(format!("{patient_pred}+{patient}")))?;
    let agent_role = net.add_filler(spec(agent_pred.to_string()), Polarity::Predicate)?;
    let patient_role = net.add_filler(spec(patient_pred.to_string()), Polarity::Predicate)?;
    let agent = net.add_filler(spec(agent.to_string()), Polarity::Object)?;
    let patient = net.add_filler(spec(patient.to_string()), Polarity::Object)?;

    net.connect_role_binding(role, agent_binding)?;
    net.connect_role_binding(role, patient_binding)?;
    net.connect_binding_filler(agent_binding, agent_role)?;
    net.connect_binding_filler(agent_binding, agent)?;
    net.connect_binding_filler(patient_binding, patient_role)?;
    net.connect_binding_filler(patient_binding, patient)?;

    Ok(Proposition {
        role,
        agent_binding,
        patient_binding,
        agent_role,
        patient_role,
        agent,
        patient,
    })
}
