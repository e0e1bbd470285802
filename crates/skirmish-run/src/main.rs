//! Runs a battle between the sample robots and prints the ranking.
//!
//! ```text
//! skirmish [rules.json]
//! ```
//!
//! The optional argument is a JSON file of battle rules; fields left out
//! keep their defaults. Set `RUST_LOG` to filter logs and `LOG_FORMAT=json`
//! for structured output.

use std::path::Path;

use anyhow::{Context, Result};
use skirmish_core::samples::{Fire, RamFire, SittingDuck, SpinBot, Walls};
use skirmish_core::{Battle, BattleResults, BattleRules};
use tracing::info;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

fn load_rules(path: &Path) -> Result<BattleRules> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading rules from {}", path.display()))?;
    let rules: BattleRules = serde_json::from_str(&text)
        .with_context(|| format!("parsing rules from {}", path.display()))?;
    rules
        .validate()
        .with_context(|| format!("checking rules from {}", path.display()))?;
    Ok(rules)
}

fn print_ranking(results: &BattleResults) {
    println!(
        "{:<4} {:<12} {:>7} {:>8} {:>7} {:>7} {:>7} {:>7} {:>4} {:>4} {:>4}",
        "Rank", "Robot", "Score", "Survival", "Surv+", "Bullet", "Ram", "Kills", "1st", "2nd", "3rd"
    );
    for c in &results.contestants {
        println!(
            "{:<4} {:<12} {:>7.0} {:>8.0} {:>7.0} {:>7.0} {:>7.0} {:>7.0} {:>4} {:>4} {:>4}",
            c.rank,
            c.name,
            c.score,
            c.survival,
            c.last_survivor_bonus,
            c.bullet_damage,
            c.ram_damage,
            c.bullet_kill_bonus + c.ram_kill_bonus,
            c.firsts,
            c.seconds,
            c.thirds,
        );
    }
}

fn main() -> Result<()> {
    init_tracing();

    let rules = match std::env::args_os().nth(1) {
        Some(path) => load_rules(Path::new(&path))?,
        None => BattleRules::default(),
    };
    info!(
        width = rules.battlefield_width,
        height = rules.battlefield_height,
        rounds = rules.num_rounds,
        seed = rules.seed,
        "rules loaded"
    );

    let results = Battle::new(rules)
        .with_robot(SittingDuck::spec("SittingDuck"))
        .with_robot(SpinBot::spec("SpinBot"))
        .with_robot(Walls::spec("Walls"))
        .with_robot(Fire::spec("Fire"))
        .with_robot(RamFire::spec("RamFire"))
        .run()
        .context("battle failed")?;

    println!("Results after {} rounds", results.rounds);
    print_ranking(&results);
    Ok(())
}
