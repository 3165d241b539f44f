use anyhow::Result;
use cairn_pins::{PinType, resolve_paths};
use tracing::info;

use super::LocalPins;
use crate::PinCmd;

pub async fn run_pin(cmd: PinCmd, pins: &LocalPins) -> Result<()> {
    match cmd {
        PinCmd::Add { cids, direct } => {
            let cids = resolve_paths(pins.dag(), &cids).await?;
            for cid in pins.add(&cids, !direct).await? {
                println!("pinned {cid}");
            }
        }
        PinCmd::Rm { cids, direct } => {
            let cids = resolve_paths(pins.dag(), &cids).await?;
            for cid in pins.remove(&cids, !direct).await? {
                println!("unpinned {cid}");
            }
        }
        PinCmd::Ls { cids, pin_type } => {
            let pin_type: PinType = pin_type.parse()?;
            let cids = resolve_paths(pins.dag(), &cids).await?;
            let filter = (!cids.is_empty()).then_some(cids.as_slice());
            for entry in pins.list(filter, pin_type).await? {
                println!("{} {}", entry.cid, entry.reason);
            }
        }
        PinCmd::Flush => {
            let root = pins.flush().await?;
            info!("flushed pin state");
            println!("{root}");
        }
    }
    Ok(())
}
