use cairn_core::Cid;
use std::fmt;
use std::str::FromStr;

use crate::PinError;

/// Category filter for pin queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PinType {
    Direct,
    Recursive,
    Indirect,
    Internal,
    #[default]
    All,
}

impl PinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PinType::Direct => "direct",
            PinType::Recursive => "recursive",
            PinType::Indirect => "indirect",
            PinType::Internal => "internal",
            PinType::All => "all",
        }
    }

    /// Whether the filter admits `other`; `All` admits everything.
    pub fn includes(&self, other: PinType) -> bool {
        *self == PinType::All || *self == other
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PinType {
    type Err = PinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(PinType::Direct),
            "recursive" => Ok(PinType::Recursive),
            "indirect" => Ok(PinType::Indirect),
            "internal" => Ok(PinType::Internal),
            "all" => Ok(PinType::All),
            _ => Err(PinError::InvalidPinType(s.to_owned())),
        }
    }
}

/// Why an identifier is pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinReason {
    Direct,
    Recursive,
    Internal,
    /// Reachable from the given recursive pin.
    Indirect(Cid),
}

impl PinReason {
    pub fn pin_type(&self) -> PinType {
        match self {
            PinReason::Direct => PinType::Direct,
            PinReason::Recursive => PinType::Recursive,
            PinReason::Internal => PinType::Internal,
            PinReason::Indirect(_) => PinType::Indirect,
        }
    }
}

impl fmt::Display for PinReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinReason::Indirect(ancestor) => write!(f, "indirect through {ancestor}"),
            other => f.write_str(other.pin_type().as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinEntry {
    pub cid: Cid,
    pub reason: PinReason,
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::Cid;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Recursive".parse::<PinType>().unwrap(), PinType::Recursive);
        assert_eq!("ALL".parse::<PinType>().unwrap(), PinType::All);
        for ty in [
            PinType::Direct,
            PinType::Recursive,
            PinType::Indirect,
            PinType::Internal,
            PinType::All,
        ] {
            assert_eq!(ty.to_string().parse::<PinType>().unwrap(), ty);
        }
    }

    #[test]
    fn unknown_type_names_the_input() {
        let err = "sideways".parse::<PinType>().unwrap_err();
        assert!(matches!(&err, PinError::InvalidPinType(s) if s == "sideways"));
        assert!(err.to_string().contains("must be one of"));
    }

    #[test]
    fn indirect_reason_names_its_ancestor() {
        let reason = PinReason::Indirect(Cid::empty());
        assert_eq!(reason.to_string(), format!("indirect through {}", Cid::empty()));
        assert_eq!(PinReason::Direct.to_string(), "direct");
    }

    #[test]
    fn all_includes_every_category() {
        assert!(PinType::All.includes(PinType::Internal));
        assert!(PinType::Direct.includes(PinType::Direct));
        assert!(!PinType::Direct.includes(PinType::Recursive));
    }
}
