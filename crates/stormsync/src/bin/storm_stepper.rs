//! # Storm Stepper
//!
//! Runs a synthetic multi-storm simulation on the threading core: every step
//! each storm integrates on its own thread, the storms meet at the barrier,
//! then take privilege one after another in storm order.
//!
//! ## Usage
//!
//! ```bash
//! # Layout from ./namelist.input, or a built-in two-storm layout; 3 steps
//! ./storm_stepper
//!
//! # Explicit run config and step count
//! ./storm_stepper run.toml 10
//!
//! # Per-step and per-domain logs
//! RUST_LOG=debug ./storm_stepper run.toml
//! ```

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use stormsync::config::{
    ConfigError, ConfigResult, NamelistSummary, RunConfig, ThreadingDecision, ThreadingMode,
    DEFAULT_NAMELIST,
};
use stormsync::core::{DomainId, IntegrationContext};
use stormsync::{StepStats, StormStepper};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_STEPS: usize = 3;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("   ✗ FATAL: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next();
    let steps = match args.next() {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|e| format!("invalid step count {raw:?}: {e}"))?,
        None => DEFAULT_STEPS,
    };

    println!("═══════════════════════════════════════════════════════════════════");
    println!("                    STORMSYNC STORM STEPPER v0.1.0");
    println!("═══════════════════════════════════════════════════════════════════");
    println!();

    // === CONFIGURATION ===
    let config = load_config(config_path.as_deref())?;
    println!("  Domains:  {}", config.max_domains);
    println!("  Storms:   {} {:?}", config.storm_count(), config.first_domains);
    println!("  Rank:     {}", config.local_rank);

    let mode = match ThreadingDecision::from_environment(DEFAULT_NAMELIST) {
        Ok(decision) => decision.mode,
        Err(ConfigError::NamelistNotFound { .. }) => {
            ThreadingMode::for_storm_count(config.storm_count())
        }
        Err(e) => return Err(e.into()),
    };
    println!("  Mode:     {mode}");
    if mode != ThreadingMode::Multiple && config.storm_count() > 1 {
        println!("  ⚠ {mode} with {} storms: workers will contend", config.storm_count());
    }

    // === INITIALIZATION ===
    println!();
    let ctx = IntegrationContext::initialize(config.to_settings()?)?;
    match ctx.affinity().process_core() {
        Some(core) => println!("   ✓ Controller pinned to core {core}"),
        None => println!("   ✓ Controller unpinned"),
    }
    for warning in ctx.affinity().warnings() {
        println!("   ⚠ Affinity entry skipped: {warning}");
    }
    println!(
        "   ✓ Barrier sized for {} storm thread(s)",
        ctx.barrier().parties()
    );

    // === MAIN STEP LOOP ===
    println!();
    let mut stepper = StormStepper::new(ctx, Arc::new(synthetic_integration));
    let mut total = Duration::ZERO;
    for _ in 0..steps {
        let stats = stepper.step()?;
        total += stats.elapsed;
        print_step(&stats);
    }

    println!();
    println!("═══════════════════════════════════════════════════════════════════");
    let per_step = total / u32::try_from(steps.max(1)).unwrap_or(u32::MAX);
    println!(
        "  {} step(s) in {:.2} ms ({:.2} ms/step)",
        stepper.steps_run(),
        total.as_secs_f64() * 1000.0,
        per_step.as_secs_f64() * 1000.0
    );
    println!("═══════════════════════════════════════════════════════════════════");
    Ok(())
}

/// Run config from `path`, else the local namelist, else the built-in layout.
fn load_config(path: Option<&str>) -> ConfigResult<RunConfig> {
    if let Some(path) = path {
        return RunConfig::from_file(path);
    }
    match std::fs::read_to_string(DEFAULT_NAMELIST) {
        Ok(text) => Ok(RunConfig::from_namelist(&NamelistSummary::parse(&text)?)),
        Err(_) => Ok(RunConfig {
            first_domains: vec![2, 4],
            ..RunConfig::new(5)
        }),
    }
}

/// Stand-in for a nest integration: a few milliseconds of work that varies
/// by domain and step.
fn synthetic_integration(domain: DomainId, step: usize) {
    let millis = (u64::from(domain.get()) + step as u64) % 5 + 1;
    std::thread::sleep(Duration::from_millis(millis));
    debug!(%domain, step, millis, "synthetic integration done");
}

fn print_step(stats: &StepStats) {
    let order: Vec<String> = stats
        .privilege_order
        .iter()
        .map(ToString::to_string)
        .collect();
    let serial = stats
        .serial_domain
        .map_or_else(|| "-".to_owned(), |d| d.to_string());
    println!(
        "   step {:>4}: privilege {} │ serial d{} │ {:.2} ms",
        stats.step,
        if order.is_empty() { "-".to_owned() } else { order.join(" → ") },
        serial,
        stats.elapsed.as_secs_f64() * 1000.0
    );
}
