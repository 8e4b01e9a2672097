//! Evacuation Simulator
//!
//! Run a scenario to completion and print a summary.
//!
//! Usage: `evac-sim [agents] [seed] [config.json | scenario.txt]`
//!
//! A `.json` path is read as a [`SimulationConfig`]; any other path is read
//! as a scenario drawing and replaces the demo hall. The `seed` argument
//! overrides the seed of a JSON config. The event timeline is only kept when
//! a JSON config asks for it. Set `RUST_LOG=debug` to follow the run tick by
//! tick.

use std::env;
use std::fs;

use evac_sim::{AgentKind, Outcome, Scenario, SimulationConfig, TickReport};

type Settings = (SimulationConfig, Option<Scenario>);

const DEFAULT_AGENT_COUNT: usize = 40;
const DEFAULT_SEED: u64 = 42;
const MAX_TICKS: u64 = 50_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();

    let agent_count: usize = args
        .get(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_AGENT_COUNT);

    let seed: u64 = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SEED);

    let file = match args.get(3) {
        Some(path) => Some((path.as_str(), fs::read_to_string(path)?)),
        None => None,
    };
    let (config, scenario) = configure(seed, file.as_ref().map(|(p, t)| (*p, t.as_str())))?;
    let scenario = match scenario {
        Some(s) => s,
        None => Scenario::demo(agent_count, seed)?,
    };

    println!("Evacuation Simulator");
    println!("====================");
    println!();
    println!("Agents: {}", scenario.agents().len());
    println!("Seed:   {}", config.seed);
    println!();

    let mut sim = scenario.build(config)?;
    let total = sim.remaining();
    let mut pairs_formed = 0;
    let mut contested = 0;
    let mut observer = |report: &TickReport| {
        pairs_formed += report.pairs_formed;
        contested += report.contested;
        if report.evacuated_this_tick > 0 && report.evacuated_total % 10 == 0 {
            println!(
                "  tick {:>6}: {} / {} evacuated",
                report.tick, report.evacuated_total, total
            );
        }
    };
    let outcome = sim.run_with(MAX_TICKS, &mut observer)?;

    println!();
    match outcome {
        Outcome::Evacuated { ticks } => println!("Evacuation complete after {} ticks", ticks),
        Outcome::TickLimit { ticks, remaining } => {
            println!("Stopped after {} ticks with {} agents inside", ticks, remaining)
        }
    }
    println!("  Evacuated:       {}", sim.evacuated());
    for kind in [AgentKind::Leader, AgentKind::Solitary, AgentKind::PairedLeader, AgentKind::PairedPartner] {
        if let Some(n) = sim.evacuated_by_kind().get(&kind) {
            println!("    {:<14} {}", format!("{kind}:"), n);
        }
    }
    println!("  Pairs formed:    {}", pairs_formed);
    println!("  Contested cells: {}", contested);
    if sim.config().record_events {
        println!("  Events:          {}", sim.events().len());
    }

    Ok(())
}

/// Config and optional scenario for a run, from the seed and an optional
/// `(path, contents)` file argument.
fn configure(seed: u64, file: Option<(&str, &str)>) -> evac_sim::Result<Settings> {
    match file {
        Some((path, text)) if path.ends_with(".json") => {
            let config = SimulationConfig::from_json_str(text)?.with_seed(seed);
            Ok((config, None))
        }
        Some((_, text)) => Ok((default_config(seed), Some(Scenario::parse(text)?))),
        None => Ok((default_config(seed), None)),
    }
}

fn default_config(seed: u64) -> SimulationConfig {
    SimulationConfig::default().with_seed(seed).with_events(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_seed_overrides_json() {
        let (config, scenario) =
            configure(7, Some(("run.json", r#"{ "seed": 99, "pairing": false }"#))).unwrap();
        assert_eq!(config.seed, 7);
        assert!(!config.pairing);
        assert!(config.record_events);
        assert!(scenario.is_none());
    }

    #[test]
    fn built_in_config_skips_the_timeline() {
        let (config, scenario) = configure(3, None).unwrap();
        assert_eq!(config.seed, 3);
        assert!(!config.record_events);
        assert!(scenario.is_none());

        let (config, scenario) = configure(3, Some(("hall.txt", "#####\n#a..G\n#####"))).unwrap();
        assert!(!config.record_events);
        assert_eq!(scenario.map(|s| s.agents().len()), Some(1));
    }
}
