//! Config command handlers

use std::path::Path;

use anyhow::{bail, Context, Result};

use treekv_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config: &Config, output: &Output) -> Result<()> {
    let cache = config.cache();
    let cache_root = cache.root().map(|p| p.display().to_string());

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "default_store": config.default_store,
                    "cache_dir": cache_root,
                    "log_level": config.log_level,
                })
            );
        }
        OutputFormat::Quiet => {
            if let Some(ref store) = config.default_store {
                println!("{}", store);
            }
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!(
                "  default_store: {}",
                config.default_store.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  cache_dir:     {}",
                cache_root.as_deref().unwrap_or("(disabled)")
            );
            println!("  log_level:     {}", config.log_level);
            println!();
            output.message(&format!(
                "Config file: {}",
                Config::config_file_path().display()
            ));
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, config_path: &Path, output: &Output) -> Result<()> {
    let mut config = Config::load_from_path(config_path).context("Failed to load configuration")?;
    apply(&mut config, &key, &value)?;

    config
        .save_to_path(config_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let unset = value.is_empty() || value == "none";
    match key {
        "default_store" => {
            if !unset {
                // reject URIs the dispatcher can't parse before saving them
                value
                    .parse::<treekv_core::StoreUri>()
                    .with_context(|| format!("Invalid store URI '{}'", value))?;
            }
            config.default_store = (!unset).then(|| value.to_string());
        }
        "cache_dir" => {
            config.cache_dir = (!unset).then(|| value.into());
        }
        "log_level" => {
            if unset {
                bail!("log_level can't be empty");
            }
            config.log_level = value.to_string();
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: default_store, cache_dir, log_level",
                key
            );
        }
    }
    Ok(())
}
