use anyhow::{Context, Result};
use bytes::Bytes;
use cairn_core::{DagLink, DagNode, DagService};

use super::LocalPins;
use crate::ObjectCmd;
use crate::helpers::{parse_cid, parse_link};

pub async fn run_object(cmd: ObjectCmd, pins: &LocalPins) -> Result<()> {
    let dag = pins.dag();
    match cmd {
        ObjectCmd::Put { data, links } => {
            let mut node_links = Vec::with_capacity(links.len());
            for arg in &links {
                let (name, cid) = parse_link(arg)?;
                let target = dag
                    .get(&cid)
                    .await
                    .with_context(|| format!("link target {cid} is not in the repository"))?;
                node_links.push(DagLink::new(name, target.size(), cid));
            }
            let node = DagNode::new(Bytes::from(data), node_links);
            let cid = dag.put(&node).await?;
            println!("{cid}");
        }
        ObjectCmd::Get { cid } => {
            let cid = parse_cid(&cid)?;
            let node = dag.get(&cid).await?;
            println!("data: {}", String::from_utf8_lossy(&node.data));
            println!("size: {}", node.size());
            for link in &node.links {
                println!("link: {:?} {} {}", link.name, link.cid, link.size);
            }
        }
    }
    Ok(())
}
