use std::path::Path;

use {anyhow::Result, clap::Subcommand};

use tgsync_config::{SyncConfig, load_config, upgrade};

#[derive(Clone, Subcommand)]
pub enum ConfigAction {
    /// Check the configuration file and report what the next start repairs.
    Check,
    /// Print the effective configuration (token redacted).
    Show,
    /// Print the configuration file path.
    Path,
}

/// ANSI color codes.
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub fn handle_config(action: ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Check => check(path),
        ConfigAction::Show => show(path),
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        },
    }
}

fn load(path: &Path) -> Result<SyncConfig> {
    if path.exists() {
        load_config(path)
    } else {
        eprintln!("No config file at {}; using defaults.\n", path.display());
        Ok(SyncConfig::default())
    }
}

fn check(path: &Path) -> Result<()> {
    eprintln!("Checking {}\n", path.display());
    let mut config = load(path)?;
    let findings = findings(&mut config);

    for finding in &findings {
        eprintln!("  {BOLD}{YELLOW}warning{RESET} {finding}");
    }
    if findings.is_empty() {
        eprintln!("{GREEN}No issues found.{RESET}");
    } else {
        eprintln!("\n{} warning(s); they are repaired on the next start", findings.len());
    }
    Ok(())
}

fn findings(config: &mut SyncConfig) -> Vec<String> {
    let mut findings = Vec::new();
    if config.has_bot_token() && !config.bot_token_encrypted {
        findings.push("bot_token is stored in plain text".to_string());
    }
    if config.encryption_by_pin_code && !config.bot_token_encrypted {
        findings.push("encryption_by_pin_code is set but the token is not sealed yet".to_string());
    }
    let report = upgrade(config);
    if report.default_rule_added {
        findings.push("message_distribution_rules is empty".to_string());
    }
    if report.rules_repaired > 0 {
        findings.push(format!(
            "{} distribution rule(s) lack a filter or a destination",
            report.rules_repaired
        ));
    }
    findings
}

fn show(path: &Path) -> Result<()> {
    let mut config = load(path)?;
    if config.has_bot_token() {
        config.bot_token = "[REDACTED]".into();
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
