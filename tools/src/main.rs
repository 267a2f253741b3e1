//! etl-runner: one-shot anonymization run from the command line.
//!
//! Usage:
//!   etl-runner --source data/credit_union.db --analytics data/analytics.db
//!   etl-runner --config etl.json --workers 8 --sample 0.05 --seed 7
//!   etl-runner --no-audit --json
//!
//! Flags override values from `--config`; anything unset falls back to the
//! built-in defaults.

use anonymizer_core::{
    config::EtlConfig,
    pipeline::EtlPipeline,
    run_control::{RunController, RunState, RunStatus, StartOutcome},
};
use anyhow::{anyhow, bail, Result};
use std::{env, fmt::Display, str::FromStr};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut config = match string_arg(&args, "--config")? {
        Some(path) => EtlConfig::load(path)?,
        None => EtlConfig::default(),
    };

    if let Some(p) = string_arg(&args, "--source")? {
        config.source_db = p.to_string();
    }
    if let Some(p) = string_arg(&args, "--analytics")? {
        config.analytics_db = p.to_string();
    }
    if let Some(p) = string_arg(&args, "--links")? {
        config.link_db = p.to_string();
    }
    config.run.worker_count = parse_arg(&args, "--workers", config.run.worker_count)?;
    config.run.batch_size = parse_arg(&args, "--batch-size", config.run.batch_size)?;
    config.run.sample_fraction = parse_arg(&args, "--sample", config.run.sample_fraction)?;
    if args.iter().any(|a| a == "--no-audit") {
        config.run.audit_enabled = false;
    }
    if let Some(year) = opt_arg(&args, "--reference-year")? {
        config.reference_year = Some(year);
    }
    if let Some(seed) = opt_arg(&args, "--seed")? {
        config.audit_seed = Some(seed);
    }
    let json = args.iter().any(|a| a == "--json");
    log::debug!("effective config: {config:?}");
    config.run.validate()?;

    if !json {
        println!("etl-runner");
        println!("  source:     {}", config.source_db);
        println!("  analytics:  {}", config.analytics_db);
        println!("  links:      {}", config.link_db);
        println!("  workers:    {}", config.run.worker_count);
        println!("  batch size: {}", config.run.batch_size);
        if config.run.audit_enabled {
            println!("  audit:      {:.2}% sample", config.run.sample_fraction * 100.0);
        } else {
            println!("  audit:      off");
        }
        println!();
    }

    let pipeline = EtlPipeline::open(&config)?;
    let controller = RunController::new();
    let outcome = controller.run(&pipeline, config.run.clone());

    let status = controller.snapshot();
    if json {
        println!("{}", status.to_json()?);
    } else {
        print_summary(&status);
        if status.state == RunState::Completed {
            print_sample(&pipeline)?;
        }
    }

    match outcome? {
        StartOutcome::Accepted(_) => {}
        StartOutcome::AlreadyRunning => bail!("a run is already in progress"),
    }
    if status.critical_findings() > 0 {
        bail!("{} critical schema findings", status.critical_findings());
    }
    Ok(())
}

fn print_summary(status: &RunStatus) {
    let elapsed = match (status.started_at, status.completed_at) {
        (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
        _ => 0.0,
    };
    println!("=== RUN SUMMARY ===");
    println!("  state:      {:?} ({elapsed:.1}s)", status.state);
    println!("  members:    {}", status.members_processed);
    println!("  loans:      {}", status.loans_processed);
    println!("  links:      {}", status.links_created);
    if let Some(err) = &status.error {
        println!("  error:      {err}");
    }
    if status.pii_sample_size > 0 {
        println!("  audited:    {} sampled rows", status.pii_sample_size);
    }
    println!();

    let schema: Vec<_> = status.schema_findings().collect();
    let pii: Vec<_> = status.pii_findings().collect();
    if schema.is_empty() && pii.is_empty() {
        if status.state == RunState::Completed {
            println!("Validation: PASS (schema clean, no PII in sample)");
        }
        return;
    }

    for f in &schema {
        println!("  [schema] {}", f.message());
    }
    if !pii.is_empty() {
        println!("WARNING: {} PII findings in clean data", pii.len());
        for f in pii.iter().take(10) {
            println!(
                "  [{}.{}] {}: '{}' (score={:.2})",
                f.table, f.field, f.entity_type, f.matched_text, f.confidence
            );
        }
    }
}

fn print_sample(pipeline: &EtlPipeline) -> Result<()> {
    let source = pipeline.source();
    let analytics = pipeline.analytics();
    println!();
    println!(
        "Source store:    {} members, {} loans",
        source.member_count()?,
        source.loan_count()?
    );
    println!(
        "Analytics store: {} members, {} loans",
        analytics.member_count()?,
        analytics.loan_count()?
    );
    println!("Sample (first 3 members):");
    for id in analytics.analytics_ids()?.iter().take(3) {
        if let Some(m) = analytics.get_member(id)? {
            println!(
                "  {} | {} | {} {} | since {} ({}y) | {} | {}",
                m.analytics_id,
                m.age_bracket,
                m.state,
                m.region,
                m.membership_year,
                m.tenure_years,
                m.account_type,
                m.credit_tier
            );
        }
    }
    Ok(())
}

/// Value following `flag`. A flag given as the last argument has no value
/// and is an error.
fn string_arg<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>> {
    match args.iter().position(|a| a == flag) {
        None => Ok(None),
        Some(i) => match args.get(i + 1) {
            Some(v) => Ok(Some(v.as_str())),
            None => bail!("{flag} needs a value"),
        },
    }
}

fn opt_arg<T>(args: &[String], flag: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match string_arg(args, flag)? {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("invalid value '{v}' for {flag}: {e}")),
    }
}

fn parse_arg<T>(args: &[String], flag: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(opt_arg(args, flag)?.unwrap_or(default))
}
