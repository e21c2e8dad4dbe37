//! Debater identity shared across core components.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stance assigned to one debater for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Pro,
    Con,
}

impl Side {
    /// Canonical uppercase label used in prompts and tag reconciliation.
    pub fn label(self) -> &'static str {
        match self {
            Side::Pro => "PRO",
            Side::Con => "CON",
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::Pro => Side::Con,
            Side::Con => Side::Pro,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_uppercase() {
        assert_eq!(Side::Pro.label(), "PRO");
        assert_eq!(Side::Con.label(), "CON");
    }

    #[test]
    fn opponent_flips() {
        assert_eq!(Side::Pro.opponent(), Side::Con);
        assert_eq!(Side::Con.opponent(), Side::Pro);
    }

    #[test]
    fn serializes_as_uppercase() {
        assert_eq!(serde_json::to_string(&Side::Pro).expect("json"), "\"PRO\"");
    }
}
