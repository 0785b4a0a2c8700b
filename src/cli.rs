use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use std::path::PathBuf;
use tracing::info;

use crate::audit::Evaluator;
use crate::config::{self, parse_date};
use crate::providers;
use crate::report;

#[derive(Debug, Default, PartialEq)]
pub struct Options {
    pub config: Option<PathBuf>,
    pub project: Option<String>,
    pub since: Option<NaiveDate>,
    pub snapshot: Option<PathBuf>,
    pub rules: Vec<String>,
    pub json: bool,
    pub list_rules: bool,
    pub help: bool,
}

/// Parse `tidy` arguments, not including the program name.
pub fn parse_args(args: &[String]) -> Result<Options> {
    let mut opts = Options::default();
    let mut i = 0;

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "-h" | "--help" => opts.help = true,
            "--json" => opts.json = true,
            "--list-rules" => opts.list_rules = true,
            "-c" | "--config" | "-p" | "--project" | "--since" | "-s" | "--snapshot" | "-r"
            | "--rule" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    bail!("Missing value for {flag}");
                };
                match flag {
                    "-c" | "--config" => opts.config = Some(PathBuf::from(value)),
                    "-p" | "--project" => opts.project = Some(value.clone()),
                    "--since" => opts.since = Some(parse_date(value)?),
                    "-s" | "--snapshot" => opts.snapshot = Some(PathBuf::from(value)),
                    _ => opts.rules.push(value.clone()),
                }
            }
            other => bail!("Unknown argument '{other}'. Run `tidy --help` for usage."),
        }
        i += 1;
    }

    Ok(opts)
}

/// Run one audit. Returns whether every rule passed or was skipped.
pub async fn run(args: &[String]) -> Result<bool> {
    let opts = parse_args(args)?;
    if opts.help {
        print_help();
        return Ok(true);
    }

    let mut config = config::load_config(opts.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(project) = opts.project {
        config.jira.project = Some(project);
    }
    if let Some(since) = opts.since {
        config.jira.start_date = Some(since);
    }

    let mut evaluator = Evaluator::new(config.thresholds.clone());
    if !opts.rules.is_empty() {
        let unknown = evaluator.retain(&opts.rules);
        if !unknown.is_empty() {
            bail!(
                "Unknown rule id(s): {}. Run `tidy --list-rules` to see them.",
                unknown.join(", ")
            );
        }
    }

    if opts.list_rules {
        for rule in evaluator.rules() {
            let gate = if rule.requires_elevated_access() {
                "  (needs role access)"
            } else {
                ""
            };
            println!("{:<26}{}{gate}", rule.id(), rule.description());
        }
        return Ok(true);
    }

    let provider = providers::create_provider(&config, opts.snapshot)?;
    info!(provider = provider.name(), "fetching snapshot");
    let snapshot = provider
        .fetch_snapshot(Utc::now())
        .await
        .with_context(|| format!("Failed to fetch snapshot from {}", provider.name()))?;

    let report = evaluator
        .evaluate(&snapshot)
        .with_context(|| format!("Cannot audit project '{}'", snapshot.project))?;

    if opts.json {
        println!("{}", report::render_json(&report)?);
    } else {
        print!("{}", report::render_text(&report));
    }
    Ok(report.is_clean())
}

pub fn print_help() {
    println!("tidy: audit an issue-tracker project against hygiene rules\n");
    println!("USAGE:");
    println!("  tidy [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -c, --config <path>     Config file (default: <config dir>/tracker-tidy/config.toml)");
    println!("  -p, --project <key>     Project to audit (overrides JIRA_PROJECT)");
    println!("      --since <date>      Only audit issues created after YYYY-MM-DD");
    println!("  -s, --snapshot <file>   Audit a saved JSON snapshot instead of the tracker");
    println!("  -r, --rule <id>         Run only this rule; repeat for more");
    println!("      --json              Print the report as JSON");
    println!("      --list-rules        List rule ids and exit");
    println!("  -h, --help              Show this help");
    println!();
    println!("ENVIRONMENT:");
    println!("  JIRA_URL, JIRA_PROJECT, JIRA_START_DATE");
    println!("  JIRA_API_TOKEN, or JIRA_USERNAME and JIRA_PASSWORD");
    println!("  TIDY_LOG                Log filter, e.g. info or tidy=debug");
    println!();
    println!("Exits 1 when any rule reports a finding.");
}
