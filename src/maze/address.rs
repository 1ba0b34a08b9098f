//! Hierarchical tile addresses: world:sector:arena:game_object

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::error::ReverieError;

/// Address depth, from coarsest to finest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressLevel {
    World = 1,
    Sector = 2,
    Arena = 3,
    GameObject = 4,
}

/// A 1 to 4 level address path
///
/// Levels are filled left to right: an arena is only set when the sector is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    parts: Vec<String>,
}

impl Address {
    pub fn world(world: impl Into<String>) -> Self {
        Self {
            parts: vec![world.into()],
        }
    }

    pub fn from_parts<I, S>(parts: I) -> Result<Self, ReverieError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(|p| p.into().trim().to_string()).collect();
        if parts.is_empty() || parts.len() > 4 {
            return Err(ReverieError::Validation(format!(
                "address must have 1 to 4 levels, got {}",
                parts.len()
            )));
        }
        if parts.iter().any(|p| p.is_empty() || p.contains(':')) {
            return Err(ReverieError::Validation(format!(
                "address levels must be non-empty and free of ':' ({:?})",
                parts
            )));
        }
        Ok(Self { parts })
    }

    /// Extend this address one level deeper
    pub fn child(&self, name: impl Into<String>) -> Result<Self, ReverieError> {
        let mut parts = self.parts.clone();
        parts.push(name.into());
        Self::from_parts(parts)
    }

    pub fn depth(&self) -> usize {
        self.parts.len()
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn level(&self, level: AddressLevel) -> Option<&str> {
        self.parts.get(level as usize - 1).map(String::as_str)
    }

    /// The prefix of this address down to `level`, if it is that deep
    pub fn truncated(&self, level: AddressLevel) -> Option<Address> {
        let depth = level as usize;
        (self.parts.len() >= depth).then(|| Address {
            parts: self.parts[..depth].to_vec(),
        })
    }

    /// Every non-empty prefix, coarsest first (including self)
    pub fn prefixes(&self) -> impl Iterator<Item = Address> + '_ {
        (1..=self.parts.len()).map(|depth| Address {
            parts: self.parts[..depth].to_vec(),
        })
    }

    pub fn starts_with(&self, prefix: &Address) -> bool {
        self.parts.len() >= prefix.parts.len() && self.parts[..prefix.parts.len()] == prefix.parts[..]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join(":"))
    }
}

impl FromStr for Address {
    type Err = ReverieError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_parts(s.split(':'))
    }
}

impl TryFrom<String> for Address {
    type Error = ReverieError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_address() {
        let address: Address = "the ville:cafe:kitchen:stove".parse().unwrap();
        assert_eq!(address.depth(), 4);
        assert_eq!(address.level(AddressLevel::Sector), Some("cafe"));
        assert_eq!(address.level(AddressLevel::GameObject), Some("stove"));
        assert_eq!(address.to_string(), "the ville:cafe:kitchen:stove");
    }

    #[test]
    fn test_reject_bad_addresses() {
        assert!("".parse::<Address>().is_err());
        assert!("a::c".parse::<Address>().is_err());
        assert!("a:b:c:d:e".parse::<Address>().is_err());
    }

    #[test]
    fn test_truncated_and_prefixes() {
        let address: Address = "w:s:a:o".parse().unwrap();
        assert_eq!(
            address.truncated(AddressLevel::Arena).unwrap().to_string(),
            "w:s:a"
        );
        let short: Address = "w:s".parse().unwrap();
        assert!(short.truncated(AddressLevel::Arena).is_none());

        let prefixes: Vec<String> = address.prefixes().map(|p| p.to_string()).collect();
        assert_eq!(prefixes, vec!["w", "w:s", "w:s:a", "w:s:a:o"]);
        assert!(address.starts_with(&short));
        assert!(!short.starts_with(&address));
    }

    #[test]
    fn test_serde_as_string() {
        let address: Address = "w:s:a".parse().unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"w:s:a\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
