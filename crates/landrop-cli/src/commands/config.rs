//! Config command implementation.

use anyhow::{Context, Result};

use landrop_core::config::Config;

use super::{ConfigAction, ConfigArgs};

/// Run the config command.
pub async fn run(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Get { key } => {
            let config = super::load_config();
            println!("{}", get_value(&config, &key)?);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load().context("Failed to load configuration")?;
            config.set(&key, &value)?;
            config.save().context("Failed to save configuration")?;
            println!("  {} = {}", key, get_value(&config, &key)?);
        }
        ConfigAction::Show => {
            let config = super::load_config();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
        }
        ConfigAction::Reset => {
            Config::default()
                .save()
                .context("Failed to save configuration")?;
            println!("  Configuration reset to defaults.");
        }
    }

    Ok(())
}

/// Look up a dotted key such as `network.discoverable`.
fn get_value(config: &Config, key: &str) -> Result<String> {
    let root = toml::Value::try_from(config)?;
    let mut value = &root;
    for part in key.split('.') {
        value = value
            .get(part)
            .with_context(|| format!("Unknown configuration key: {}", key))?;
    }

    Ok(match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_value() {
        let mut config = Config::default();
        config.general.device_name = "desk".to_string();

        assert_eq!(get_value(&config, "general.device_name").unwrap(), "desk");
        assert_eq!(get_value(&config, "network.discoverable").unwrap(), "true");
        assert_eq!(get_value(&config, "transfer.chunk_size").unwrap(), "64000");
        assert_eq!(get_value(&config, "network.connect_timeout").unwrap(), "5s");
        assert!(get_value(&config, "network.nope").is_err());
    }
}
