//! Policy check CLI
//!
//! Evaluates a rule from a JSON policy file for a target and credentials
//! given as JSON objects.

use anyhow::{bail, Context, Result};
use authz_policy::{Attributes, Decision, Enforcer, EnforcerConfig, ParseMode};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info};

/// Evaluate authorization rules from the command line
#[derive(Parser)]
#[command(name = "policy-check")]
#[command(about = "Evaluate a policy rule for a target and credentials")]
#[command(version)]
struct Cli {
    /// JSON file mapping rule names to expressions
    #[arg(short, long, env = "POLICY_FILE")]
    policy: PathBuf,

    /// TOML enforcer configuration
    #[arg(short, long, env = "POLICY_CONFIG")]
    config: Option<PathBuf>,

    /// Deny on malformed or unknown rules instead of failing
    #[arg(long)]
    permissive: bool,

    /// Target as a JSON object
    #[arg(short, long, default_value = "{}")]
    target: String,

    /// Credentials as a JSON object
    #[arg(short = 'C', long, default_value = "{}")]
    credentials: String,

    /// Report a denial as an error
    #[arg(long)]
    raise: bool,

    /// Print the parsed rules and exit
    #[arg(long)]
    dump: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Rule name or raw rule expression
    #[arg(required_unless_present = "dump")]
    rule: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EnforcerConfig::default(),
    };
    if cli.permissive {
        config.mode = ParseMode::Permissive;
    }

    let enforcer = Enforcer::load_file(&cli.policy, config)
        .with_context(|| format!("failed to load policy file {}", cli.policy.display()))?;

    for (name, err) in enforcer.rules().errors() {
        info!(rule = %name, "invalid rule: {}", err.reason);
    }

    if cli.dump {
        println!("{}", enforcer.rules());
        return Ok(true);
    }

    let Some(rule) = cli.rule.as_deref() else {
        bail!("no rule given");
    };
    let target = parse_attributes("target", &cli.target)?;
    let credentials = parse_attributes("credentials", &cli.credentials)?;

    debug!(rule = %rule, %target, %credentials, "checking policy");

    let (allowed, verdict) = check(&enforcer, rule, &target, &credentials, cli.raise)?;
    println!("{}", verdict);
    Ok(allowed)
}

/// Evaluates `rule`, returning whether it held and the line to print
///
/// A denial is a verdict in both modes; only evaluation failures are errors.
fn check(
    enforcer: &Enforcer,
    rule: &str,
    target: &Attributes,
    credentials: &Attributes,
    raise: bool,
) -> Result<(bool, String)> {
    if raise {
        return match enforcer.enforce(rule, target, credentials, true) {
            Ok(_) => Ok((true, "allowed".to_string())),
            Err(err) if err.is_denial() => Ok((false, format!("denied: {}", err))),
            Err(err) => Err(err.into()),
        };
    }

    match enforcer.authorize(rule, target, credentials)? {
        Decision::Allow => Ok((true, "allowed".to_string())),
        Decision::Deny(denial) => Ok((false, format!("denied: {}", denial))),
    }
}

fn load_config(path: &Path) -> Result<EnforcerConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("invalid config {}", path.display()))
}

fn parse_attributes(what: &str, raw: &str) -> Result<Attributes> {
    let value: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("{} is not valid JSON", what))?;
    match Attributes::try_from(value) {
        Ok(attrs) => Ok(attrs),
        Err(other) => bail!("{} must be a JSON object, got {}", what, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enforcer() -> Enforcer {
        Enforcer::from_definitions(
            [("admin_only", "role:admin"), ("broken", "rule:nowhere")],
            EnforcerConfig::default(),
        )
    }

    #[test]
    fn test_denial_is_a_verdict_with_raise() {
        let enforcer = enforcer();
        let creds = Attributes::new().with("roles", vec!["user"]);

        for raise in [false, true] {
            let (allowed, verdict) =
                check(&enforcer, "admin_only", &Attributes::new(), &creds, raise).unwrap();
            assert!(!allowed);
            assert!(verdict.starts_with("denied: admin_only"), "{}", verdict);
        }
    }

    #[test]
    fn test_allow_with_raise() {
        let creds = Attributes::new().with("roles", vec!["admin"]);
        let (allowed, verdict) =
            check(&enforcer(), "admin_only", &Attributes::new(), &creds, true).unwrap();
        assert!(allowed);
        assert_eq!(verdict, "allowed");
    }

    #[test]
    fn test_evaluation_failure_is_an_error_with_raise() {
        let creds = Attributes::new().with("roles", vec!["admin"]);
        let err = check(&enforcer(), "broken", &Attributes::new(), &creds, true).unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }
}
