use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use cairn_pins::PinSetConfig;
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use toml_edit::{DocumentMut, Item, Table};
use tracing::info;

/// Contents of `config.toml`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CairnConfig {
    pub store: StoreConfig,
    pub pins: PinSetConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding `cairn.redb`; defaults to `<data dir>/repo`
    pub path: Option<PathBuf>,
}

impl CairnConfig {
    /// Reads `path`, falling back to defaults when it doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("invalid config file {path:?}"))?;
        config.pins.validate()?;
        Ok(config)
    }

    pub fn store_path(&self, local_data_dir: &Path) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| local_data_dir.join("repo"))
    }
}

#[derive(Subcommand)]
pub enum CmdConfig {
    /// Creates the config file if it doesn't exist and fills in defaults
    Init,
}

impl CmdConfig {
    pub fn run(self, config_file: PathBuf, local_data_dir: &Path) -> anyhow::Result<()> {
        let mut doc = if config_file.exists() {
            fs::read_to_string(&config_file)?
        } else {
            if let Some(parent) = config_file.parent() {
                fs::create_dir_all(parent)?;
            }
            "".to_owned()
        }
        .parse::<DocumentMut>()
        .context("could not parse config file")?;

        match self {
            Self::Init => {
                let store_path = local_data_dir.join("repo");
                let store = doc
                    .entry("store")
                    .or_insert(Item::Table(Table::new()))
                    .as_table_mut()
                    .context("`store` in config file is not a table")?;
                if !store.contains_key("path") {
                    let path = store_path
                        .to_str()
                        .context("data directory is not valid UTF-8")?;
                    store.insert("path", path.into());
                }

                let defaults = PinSetConfig::default();
                let pins = doc
                    .entry("pins")
                    .or_insert(Item::Table(Table::new()))
                    .as_table_mut()
                    .context("`pins` in config file is not a table")?;
                if !pins.contains_key("fanout") {
                    pins.insert("fanout", (defaults.fanout as i64).into());
                }
                if !pins.contains_key("max_items") {
                    pins.insert("max_items", (defaults.max_items as i64).into());
                }
            }
        }

        info!("writing to config file {config_file:?}");

        let tmp_path = config_file.with_extension("tmp");
        let mut tmp = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        tmp.write_all(doc.to_string().as_bytes())?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, config_file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CairnConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, CairnConfig::default());
        assert_eq!(config.store_path(dir.path()), dir.path().join("repo"));
    }

    #[test]
    fn partial_pins_table_keeps_defaults() {
        let config: CairnConfig = toml::from_str("[pins]\nfanout = 16\n").unwrap();
        assert_eq!(config.pins.fanout, 16);
        assert_eq!(config.pins.max_items, PinSetConfig::default().max_items);
        assert_eq!(config.store.path, None);
    }

    #[test]
    fn invalid_pins_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[pins]\nfanout = 0\n").unwrap();
        assert!(CairnConfig::load(&path).is_err());
    }

    #[test]
    fn init_writes_defaults_and_keeps_user_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("config.toml");
        let data = dir.path().join("data");

        CmdConfig::Init.run(path.clone(), &data).unwrap();
        let config = CairnConfig::load(&path).unwrap();
        assert_eq!(config.pins, PinSetConfig::default());
        assert_eq!(config.store.path, Some(data.join("repo")));

        fs::write(&path, "[pins]\nfanout = 8\n").unwrap();
        CmdConfig::Init.run(path.clone(), &data).unwrap();
        let config = CairnConfig::load(&path).unwrap();
        assert_eq!(config.pins.fanout, 8);
        assert_eq!(config.pins.max_items, PinSetConfig::default().max_items);
    }
}
