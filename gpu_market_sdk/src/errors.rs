use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::types::Address;

/// Wallet code for a request the user declined.
pub const CODE_USER_REJECTED: i64 = 4001;
/// Wallet code for a chain the wallet has never seen.
pub const CODE_UNRECOGNIZED_CHAIN: i64 = 4902;
/// Node code for a balance below `gas * price + value`.
pub const CODE_INSUFFICIENT_FUNDS: i64 = -32003;
/// Symbolic code some signers report instead of 4001.
pub const ACTION_REJECTED: &str = "ACTION_REJECTED";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    // --- Declined by the user (1) ---
    #[error("request rejected in the wallet")]
    UserRejected,

    // --- Funds (2) ---
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    // --- Remote / network (3–6) ---
    #[error("remote call failed: {0}")]
    Remote(String),
    #[error("chain {0} is not known to the wallet")]
    UnrecognizedChain(String),
    #[error("no wallet provider available")]
    WalletUnavailable,
    #[error("geocoding failed: {0}")]
    Geocode(String),

    // --- Authorization (7–8) ---
    #[error("account {0} is not the arbiter")]
    NotArbiter(Address),
    #[error("no account connected")]
    NotConnected,

    // --- Local validation (9–16) ---
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("benchmark has not been run")]
    BenchmarkMissing,
    #[error("GPU {0} is already listed for sale")]
    AlreadyListed(String),
    #[error("listing {0} has no deposit")]
    NotDeposited(Address),
    #[error("listing {0} is already sold")]
    AlreadySold(Address),
    #[error("listing {0} is unknown or still being checked")]
    UnknownListing(Address),

    // --- Configuration (17) ---
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// The four failure classes surfaced to the user, plus local validation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Declined,
    InsufficientFunds,
    Remote,
    Denied,
    Invalid,
}

impl Error {
    pub fn code(&self) -> u32 {
        match self {
            Error::UserRejected => 1,
            Error::InsufficientFunds(_) => 2,
            Error::Remote(_) => 3,
            Error::UnrecognizedChain(_) => 4,
            Error::WalletUnavailable => 5,
            Error::Geocode(_) => 6,
            Error::NotArbiter(_) => 7,
            Error::NotConnected => 8,
            Error::InvalidAddress(_) => 9,
            Error::InvalidAmount(_) => 10,
            Error::MissingField(_) => 11,
            Error::BenchmarkMissing => 12,
            Error::AlreadyListed(_) => 13,
            Error::NotDeposited(_) => 14,
            Error::AlreadySold(_) => 15,
            Error::UnknownListing(_) => 16,
            Error::Config(_) => 17,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Error::UserRejected => ErrorClass::Declined,
            Error::InsufficientFunds(_) => ErrorClass::InsufficientFunds,
            Error::Remote(_)
            | Error::UnrecognizedChain(_)
            | Error::WalletUnavailable
            | Error::Geocode(_) => ErrorClass::Remote,
            Error::NotArbiter(_) | Error::NotConnected => ErrorClass::Denied,
            _ => ErrorClass::Invalid,
        }
    }

    /// Whether the flow should end quietly (user chose to stop).
    pub fn is_user_abort(&self) -> bool {
        self.class() == ErrorClass::Declined
    }
}

/// Recovery hint shown alongside an error.
pub fn get_suggestion(error: &Error) -> &'static str {
    match error {
        Error::UserRejected => "The request was cancelled in your wallet.",
        Error::InsufficientFunds(_) => {
            "You don't have enough test ETH in your wallet. Get some from a faucet and try again."
        }
        Error::UnrecognizedChain(_) => "Add the test network to your wallet and retry.",
        Error::WalletUnavailable => "Install a browser wallet extension.",
        Error::NotArbiter(_) => "Access denied: not the arbiter.",
        Error::NotConnected => "Connect a wallet account first.",
        Error::BenchmarkMissing => "Run the benchmark first.",
        Error::MissingField(_) => "UUID, registration address and price are required.",
        Error::AlreadyListed(_) => "This GPU is already listed for sale.",
        Error::NotDeposited(_) => "Wait until the buyer has deposited.",
        Error::AlreadySold(_) | Error::UnknownListing(_) => "Pick another listing.",
        Error::InvalidAddress(_) | Error::InvalidAmount(_) => "Check the value you entered.",
        Error::Remote(_) | Error::Geocode(_) | Error::Config(_) => "Try again later.",
    }
}

/// Error code as reported by a wallet or node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RpcCode {
    Numeric(i64),
    Named(String),
}

/// Raw failure from a wallet or node, before classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcFailure {
    pub code: Option<RpcCode>,
    pub message: String,
}

impl RpcFailure {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(RpcCode::Numeric(code)),
            message: message.into(),
        }
    }

    pub fn named(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(RpcCode::Named(code.into())),
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    fn numeric(&self) -> Option<i64> {
        match self.code {
            Some(RpcCode::Numeric(code)) => Some(code),
            _ => None,
        }
    }
}

fn insufficient_funds_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)insufficient funds").ok())
        .as_ref()
}

impl From<RpcFailure> for Error {
    fn from(failure: RpcFailure) -> Self {
        let numeric = failure.numeric();
        if numeric == Some(CODE_INSUFFICIENT_FUNDS)
            || insufficient_funds_pattern().is_some_and(|re| re.is_match(&failure.message))
        {
            return Error::InsufficientFunds(failure.message);
        }
        if numeric == Some(CODE_USER_REJECTED)
            || matches!(&failure.code, Some(RpcCode::Named(name)) if name == ACTION_REJECTED)
        {
            return Error::UserRejected;
        }
        if numeric == Some(CODE_UNRECOGNIZED_CHAIN) {
            return Error::UnrecognizedChain(failure.message);
        }
        Error::Remote(failure.message)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Geocode(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
