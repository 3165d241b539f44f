use anyhow::{Context, Result, anyhow};
use cairn_core::Cid;

pub fn parse_cid(s: &str) -> Result<Cid> {
    let s = s.trim();
    s.parse::<Cid>()
        .with_context(|| format!("invalid content identifier '{s}'"))
}

/// Parses a `NAME=CID` link argument. The name may be empty.
pub fn parse_link(s: &str) -> Result<(String, Cid)> {
    let (name, cid) = s
        .rsplit_once('=')
        .ok_or_else(|| anyhow!("expected NAME=CID, got '{s}'"))?;
    Ok((name.to_owned(), parse_cid(cid)?))
}
