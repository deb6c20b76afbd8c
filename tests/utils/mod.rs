/// Testing utilities for market flows
/// Fixtures spin up a shared mock chain and one market per session

pub mod assertions;
pub mod test_fixtures;

pub use test_fixtures::*;

/// Common test constants
pub mod constants {
    pub const LISTING_PRICE: &str = "1.5";
    pub const OTHER_PRICE: &str = "0.25";
}
