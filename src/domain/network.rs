// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32 for IPv4)")]
    InvalidPrefixLength(u8),

    #[error("Address range {range} cannot hold subnet #{index} of size /{prefix_length}")]
    Exhausted {
        range: String,
        index: u32,
        prefix_length: u8,
    },

    #[error("Invalid zone count: {0} (must be 1-6)")]
    InvalidZoneCount(usize),

    #[error("Invalid NAT gateway count: {nat} (must be 1-{zones})")]
    InvalidNatCount { nat: usize, zones: usize },
}

/// IPv4 address range in CIDR notation
///
/// Invariants:
/// - Valid IPv4 network address
/// - Prefix length 0-32
/// - No host bits set below the prefix
///
/// # Examples
///
/// ```rust
/// use gitops_platform::domain::Ipv4Cidr;
///
/// let range = Ipv4Cidr::new("10.0.0.0/16").unwrap();
/// assert_eq!(range.prefix_length(), 16);
/// assert_eq!(range.subnet(24, 3).unwrap().to_string(), "10.0.3.0/24");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix_length: u8,
}

impl Ipv4Cidr {
    /// Parse a CIDR block such as `10.0.0.0/16`
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let cidr = cidr.as_ref();

        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| NetworkError::InvalidCidr(cidr.to_string()))?;

        let network = Ipv4Addr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidIpAddress(addr_str.to_string()))?;

        let prefix_length = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

        Self::from_parts(network, prefix_length)
    }

    /// Create from separate network address and prefix
    pub fn from_parts(network: Ipv4Addr, prefix_length: u8) -> Result<Self, NetworkError> {
        if prefix_length > 32 {
            return Err(NetworkError::InvalidPrefixLength(prefix_length));
        }

        // Invariant: host bits must be clear
        if u32::from(network) & !Self::mask(prefix_length) != 0 {
            return Err(NetworkError::InvalidCidr(format!(
                "{}/{} has host bits set",
                network, prefix_length
            )));
        }

        Ok(Self {
            network,
            prefix_length,
        })
    }

    fn mask(prefix_length: u8) -> u32 {
        u32::MAX
            .checked_shl(32 - u32::from(prefix_length))
            .unwrap_or(0)
    }

    /// Get the network address
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Get the prefix length
    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    /// Number of addresses in the range
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_length))
    }

    /// Check whether `other` lies entirely within this range
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.prefix_length >= self.prefix_length
            && u32::from(other.network) & Self::mask(self.prefix_length) == u32::from(self.network)
    }

    /// Check whether two ranges share any address
    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// The `index`-th block of size `/prefix_length` inside this range
    ///
    /// # Invariants
    /// - `prefix_length` must not be shorter than this range's prefix
    /// - The block must fit inside this range
    pub fn subnet(&self, prefix_length: u8, index: u32) -> Result<Ipv4Cidr, NetworkError> {
        if prefix_length > 32 || prefix_length < self.prefix_length {
            return Err(NetworkError::InvalidPrefixLength(prefix_length));
        }

        let available = 1u64 << u32::from(prefix_length - self.prefix_length);
        if u64::from(index) >= available {
            return Err(NetworkError::Exhausted {
                range: self.to_string(),
                index,
                prefix_length,
            });
        }

        let block = 1u64 << (32 - u32::from(prefix_length));
        let base = u64::from(u32::from(self.network)) + u64::from(index) * block;
        // base < 2^32 because the block fits inside this range
        Self::from_parts(Ipv4Addr::from(base as u32), prefix_length)
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_length)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ipv4Cidr> for String {
    fn from(cidr: Ipv4Cidr) -> Self {
        cidr.to_string()
    }
}

/// Number of availability zones a network boundary spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct ZoneCount(usize);

impl ZoneCount {
    /// Minimum zone count
    pub const MIN: usize = 1;

    /// Maximum zone count
    pub const MAX: usize = 6;

    pub fn new(count: usize) -> Result<Self, NetworkError> {
        if !(Self::MIN..=Self::MAX).contains(&count) {
            return Err(NetworkError::InvalidZoneCount(count));
        }
        Ok(Self(count))
    }

    pub fn value(&self) -> usize {
        self.0
    }

    /// Availability zone names for a region, in allocation order
    pub fn zone_names(&self, region: &str) -> Vec<String> {
        ('a'..='z')
            .take(self.0)
            .map(|suffix| format!("{}{}", region, suffix))
            .collect()
    }
}

impl TryFrom<usize> for ZoneCount {
    type Error = NetworkError;

    fn try_from(count: usize) -> Result<Self, Self::Error> {
        Self::new(count)
    }
}

impl From<ZoneCount> for usize {
    fn from(zones: ZoneCount) -> Self {
        zones.0
    }
}

impl Default for ZoneCount {
    fn default() -> Self {
        Self(2)
    }
}

impl fmt::Display for ZoneCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_cidr_parsing() {
        let range = Ipv4Cidr::new("10.0.0.0/16").unwrap();
        assert_eq!(range.network().to_string(), "10.0.0.0");
        assert_eq!(range.prefix_length(), 16);
        assert_eq!(range.size(), 65536);
        assert_eq!(range.to_string(), "10.0.0.0/16");
    }

    #[test_case("10.0.0.0" ; "missing prefix")]
    #[test_case("10.0.0.0/33" ; "prefix too long")]
    #[test_case("999.0.0.0/8" ; "bad address")]
    #[test_case("10.0.0.1/16" ; "host bits set")]
    #[test_case("10.0.0.0/x" ; "non numeric prefix")]
    fn test_invalid_cidr(input: &str) {
        assert!(Ipv4Cidr::new(input).is_err());
    }

    #[test]
    fn test_subnet_allocation() {
        let range = Ipv4Cidr::new("10.0.0.0/16").unwrap();
        assert_eq!(range.subnet(24, 0).unwrap().to_string(), "10.0.0.0/24");
        assert_eq!(range.subnet(24, 1).unwrap().to_string(), "10.0.1.0/24");
        assert_eq!(range.subnet(24, 255).unwrap().to_string(), "10.0.255.0/24");
        assert!(matches!(
            range.subnet(24, 256),
            Err(NetworkError::Exhausted { .. })
        ));
        assert!(range.subnet(8, 0).is_err());
    }

    #[test]
    fn test_contains_and_overlaps() {
        let range = Ipv4Cidr::new("10.0.0.0/16").unwrap();
        let inside = Ipv4Cidr::new("10.0.4.0/24").unwrap();
        let outside = Ipv4Cidr::new("10.1.0.0/24").unwrap();

        assert!(range.contains(&inside));
        assert!(!range.contains(&outside));
        assert!(!inside.contains(&range));
        assert!(inside.overlaps(&range));
        assert!(!inside.overlaps(&outside));
    }

    #[test]
    fn test_cidr_serde_as_string() {
        let range = Ipv4Cidr::new("10.0.0.0/16").unwrap();
        let json = serde_json::to_string(&range).unwrap();
        assert_eq!(json, "\"10.0.0.0/16\"");
        let back: Ipv4Cidr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, range);
        assert!(serde_json::from_str::<Ipv4Cidr>("\"10.0.0.1/16\"").is_err());
    }

    #[test]
    fn test_zone_count() {
        assert!(ZoneCount::new(0).is_err());
        assert!(ZoneCount::new(7).is_err());
        assert_eq!(ZoneCount::default().value(), 2);
        assert_eq!(
            ZoneCount::new(3).unwrap().zone_names("ap-southeast-2"),
            vec!["ap-southeast-2a", "ap-southeast-2b", "ap-southeast-2c"]
        );
    }

    #[test]
    fn test_zone_count_serde_validates() {
        let zones: ZoneCount = serde_json::from_str("3").unwrap();
        assert_eq!(zones.value(), 3);
        assert_eq!(serde_json::to_string(&zones).unwrap(), "3");

        assert!(serde_json::from_str::<ZoneCount>("0").is_err());
        assert!(serde_json::from_str::<ZoneCount>("200").is_err());
    }
}
