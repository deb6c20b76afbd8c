use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::Error;

// ==================== Addresses ====================

fn address_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").ok())
        .as_ref()
}

/// Returns true for a `0x`-prefixed 20-byte hex string.
pub fn is_address(text: &str) -> bool {
    address_pattern().is_some_and(|re| re.is_match(text))
}

/// Account or contract identity.
///
/// The original spelling is kept for display; equality, hashing and ordering
/// ignore ASCII case so checksummed and lower-case forms compare equal.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(text: &str) -> Result<Self, Error> {
        let text = text.trim();
        if !is_address(text) {
            return Err(Error::InvalidAddress(text.to_string()));
        }
        Ok(Self(text.to_string()))
    }

    /// The zero address, used on-chain for "no buyer yet".
    pub fn zero() -> Self {
        Self(format!("0x{}", "0".repeat(40)))
    }

    /// Deterministic address for the `n`-th generated account or contract.
    pub fn from_index(n: u64) -> Self {
        Self(format!("0x{:040x}", n))
    }

    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_lowercase(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_lowercase().cmp(&other.to_lowercase())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

// ==================== Amounts ====================

const ETHER_DECIMALS: usize = 18;
const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Amount in wei.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Wei(pub u128);

impl Wei {
    pub const ZERO: Wei = Wei(0);

    /// Parses a decimal ether amount such as `"0.25"` into wei.
    pub fn parse_ether(text: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidAmount(text.to_string());
        let trimmed = text.trim();
        let (whole, frac) = match trimmed.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (trimmed, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > ETHER_DECIMALS {
            return Err(invalid());
        }

        let whole_wei = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .ok()
                .and_then(|w| w.checked_mul(WEI_PER_ETHER))
                .ok_or_else(invalid)?
        };
        let frac_wei = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = ETHER_DECIMALS);
            padded.parse::<u128>().map_err(|_| invalid())?
        };
        whole_wei.checked_add(frac_wei).map(Wei).ok_or_else(invalid)
    }

    /// Formats as decimal ether, always with at least one fractional digit.
    pub fn to_ether_string(&self) -> String {
        let whole = self.0 / WEI_PER_ETHER;
        let frac = self.0 % WEI_PER_ETHER;
        let frac = format!("{:018}", frac);
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() {
            format!("{}.0", whole)
        } else {
            format!("{}.{}", whole, frac)
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ETH", self.to_ether_string())
    }
}

// ==================== Hashes ====================

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// keccak-256 commitment to a benchmark.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BenchmarkHash(pub [u8; 32]);

impl BenchmarkHash {
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(text: &str) -> Result<Self, Error> {
        let raw = hex::decode(text.trim_start_matches("0x"))
            .map_err(|e| Error::Remote(format!("bad hash {}: {}", text, e)))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| Error::Remote(format!("bad hash length: {}", text)))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for BenchmarkHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ==================== Listing-side values ====================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ApprovalKind {
    Release,
    Refund,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ApprovalCounts {
    pub release: u32,
    pub refund: u32,
}

impl ApprovalCounts {
    pub fn get(&self, kind: ApprovalKind) -> u32 {
        match kind {
            ApprovalKind::Release => self.release,
            ApprovalKind::Refund => self.refund,
        }
    }

    /// Both sides have approved something: buyer and seller disagree.
    pub fn is_contested(&self) -> bool {
        self.release > 0 && self.refund > 0
    }
}

/// Listing life cycle as observed from this client.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ListingStatus {
    Created,
    Deposited,
    ReleasePending,
    RefundPending,
    Disputed,
    Released,
    Refunded,
}

impl ListingStatus {
    pub fn derive(deposited: bool, counts: ApprovalCounts, quorum: u32) -> Self {
        if counts.release >= quorum {
            ListingStatus::Released
        } else if counts.refund >= quorum {
            ListingStatus::Refunded
        } else if !deposited {
            ListingStatus::Created
        } else if counts.is_contested() {
            ListingStatus::Disputed
        } else if counts.release > 0 {
            ListingStatus::ReleasePending
        } else if counts.refund > 0 {
            ListingStatus::RefundPending
        } else {
            ListingStatus::Deposited
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, ListingStatus::Released | ListingStatus::Refunded)
    }
}

/// Entry on the browse page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingRecord {
    pub uuid: String,
    pub price: Wei,
    pub contract: Address,
}

/// Construction parameters of a listing contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingParams {
    pub arbiter: Address,
    pub price: Wei,
    pub commission_percent: u8,
    pub registration: Address,
}

/// Result of `getDetails()` on a registration contract.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrationDetails {
    pub uuid: String,
    pub owners: Vec<Address>,
    pub hashes: Vec<BenchmarkHash>,
}

impl RegistrationDetails {
    pub fn latest_hash(&self) -> Option<&BenchmarkHash> {
        self.hashes.last()
    }

    pub fn current_owner(&self) -> Option<&Address> {
        self.owners.last()
    }
}

/// A GPU held by an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InventoryEntry {
    pub uuid: String,
    pub registration: Address,
    pub benchmark_hash: BenchmarkHash,
    /// `None` for GPUs registered by the owner.
    pub price: Option<Wei>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}
