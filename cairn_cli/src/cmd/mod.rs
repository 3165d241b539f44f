use std::path::{Path, PathBuf};

use anyhow::Result;
use cairn_pins::PinManager;
use cairn_store_redb::{RedbDag, RedbDatastore, RedbStore};
use tracing::debug;

use crate::init_config::CairnConfig;

mod object;
mod pin;

pub use object::run_object;
pub use pin::run_pin;

/// The manager over the local repository.
pub type LocalPins = PinManager<RedbDag, RedbDatastore>;

pub async fn run_command(
    config_file: PathBuf,
    local_data_dir: &Path,
    cmd: crate::Commands,
) -> Result<()> {
    if let crate::Commands::Config { cmd } = cmd {
        return cmd.run(config_file, local_data_dir);
    }

    let config = CairnConfig::load(&config_file)?;
    let store_path = config.store_path(local_data_dir);
    debug!("opening repository at {store_path:?}");
    let store = RedbStore::open(&store_path)?;

    let pins = PinManager::new(store.dag(), store.datastore(), config.pins);
    pins.load().await?;

    let result = match cmd {
        crate::Commands::Object { cmd } => run_object(cmd, &pins).await,
        crate::Commands::Pin { cmd } => run_pin(cmd, &pins).await,
        crate::Commands::Config { .. } => unreachable!(),
    };
    pins.close().await;
    result
}
