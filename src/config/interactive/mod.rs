#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{Config, ConfigError, MongoConfig};
use crate::database::Session;
use crate::schema::CreationPolicy;

const POLICIES: [(CreationPolicy, &str); 2] = [
    (
        CreationPolicy::SkipExisting,
        "skip-existing (leave existing collections and indexes alone)",
    ),
    (
        CreationPolicy::Strict,
        "strict (fail when a collection or index already exists)",
    ),
];

#[inline]
pub async fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 PDET GeoDB Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("MongoDB Connection").bold().yellow());
    eprintln!("Credentials can also be supplied through the PDET_MONGO_URI environment variable.");
    eprintln!();

    configure_mongo(&mut config.mongo)?;
    config.schema.policy = select_policy(config.schema.policy)?;

    eprintln!();
    eprintln!("{}", style("Testing connection...").yellow());

    match Session::connect(&config.mongo).await {
        Ok(session) => {
            let version = session.server_version().await.unwrap_or_else(|_| "unknown".to_string());
            session.close().await;
            eprintln!(
                "{}",
                style(format!("✓ Connected to MongoDB {version}")).green()
            );
        }
        Err(e) => {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to MongoDB").yellow()
            );
            eprintln!("  {e:#}");
            eprintln!("You can continue, but make sure the server is reachable before running init.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("MongoDB Settings:").bold().yellow());
    eprintln!("  URI: {}", style(config.mongo.redacted_uri()).cyan());
    eprintln!("  Database: {}", style(&config.mongo.database).cyan());
    eprintln!("  App name: {}", style(&config.mongo.app_name).cyan());
    eprintln!(
        "  Timeouts: connect {}s, server selection {}s",
        style(config.mongo.connect_timeout_secs).cyan(),
        style(config.mongo.server_selection_timeout_secs).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Schema:").bold().yellow());
    eprintln!("  Creation policy: {}", style(policy_name(config.schema.policy)).cyan());

    eprintln!();
    eprintln!("{}", style("Report:").bold().yellow());
    eprintln!("  Region pattern: {}", style(&config.report.region_pattern).cyan());
    eprintln!("  Sample limit: {}", style(config.report.sample_limit).cyan());
    eprintln!("  Top limit: {}", style(config.report.top_limit).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
}

fn policy_name(policy: CreationPolicy) -> &'static str {
    match policy {
        CreationPolicy::SkipExisting => "skip-existing",
        CreationPolicy::Strict => "strict",
    }
}

/// The stored configuration without environment overrides, so they never end up in the file.
fn load_existing_config(config_dir: &Path) -> Config {
    Config::load_with_env(config_dir, |_| None).map_or_else(
        |e| {
            eprintln!(
                "{}",
                style(format!("Could not load existing configuration ({e:#}). Using defaults."))
                    .yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            if config.config_file_path().exists() {
                eprintln!("{}", style("Found existing configuration.").green());
            }
            config
        },
    )
}

fn configure_mongo(mongo: &mut MongoConfig) -> Result<()> {
    let template = mongo.clone();
    let uri: String = Input::new()
        .with_prompt("MongoDB URI")
        .default(mongo.uri.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            MongoConfig {
                uri: input.clone(),
                ..template.clone()
            }
            .validate()
        })
        .interact_text()?;

    let database: String = Input::new()
        .with_prompt("Database name")
        .default(mongo.database.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            MongoConfig {
                database: input.clone(),
                ..template.clone()
            }
            .validate()
        })
        .interact_text()?;

    let connect_timeout_secs: u64 = Input::new()
        .with_prompt("Connect timeout (seconds)")
        .default(mongo.connect_timeout_secs)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=300).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 300 seconds")
            }
        })
        .interact_text()?;

    mongo.set_uri(uri)?;
    mongo.set_database(database)?;
    mongo.connect_timeout_secs = connect_timeout_secs;

    Ok(())
}

fn select_policy(current: CreationPolicy) -> Result<CreationPolicy> {
    let labels: Vec<&str> = POLICIES.iter().map(|(_, label)| *label).collect();
    let default_index = POLICIES
        .iter()
        .position(|(policy, _)| *policy == current)
        .unwrap_or(0);

    let index = Select::new()
        .with_prompt("Creation policy for init")
        .default(default_index)
        .items(&labels)
        .interact()?;

    Ok(POLICIES[index].0)
}
