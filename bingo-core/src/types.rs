use crate::error::BingoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Wei = u128;
pub type ProposalId = u64;
pub type GameId = u64;
pub type TokenId = u64;

pub const WEI_PER_ETHER: Wei = 1_000_000_000_000_000_000;

/// Converts a decimal ether string such as `"0.0045"` into wei.
pub fn parse_ether(value: &str) -> Option<Wei> {
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if frac.len() > 18 || (whole.is_empty() && frac.is_empty()) {
        return None;
    }
    let whole: Wei = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac_wei: Wei = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<18}", frac);
        padded.parse().ok()?
    };
    whole.checked_mul(WEI_PER_ETHER)?.checked_add(frac_wei)
}

/// Account identifier on the ledger (20 bytes, `0x` hex).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address whose trailing eight bytes hold `n` big-endian.
    pub fn from_low_u64_be(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = BingoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let decoded = hex::decode(raw).map_err(|e| BingoError::InvalidAddress(format!("{}: {}", s, e)))?;
        let bytes: [u8; 20] = decoded
            .try_into()
            .map_err(|_| BingoError::InvalidAddress(format!("{}: expected 20 bytes", s)))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = BingoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}
