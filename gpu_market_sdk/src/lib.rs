//! Client-side synchronization for GPU escrow listings.
//!
//! Keeps a per-session view of remote listing and registration contracts
//! consistent with the chain: typed contract proxies, a snapshot store
//! refreshed after every write, a quorum-driven completion trigger and an
//! arbiter-only dispute view.


pub mod benchmark;
pub mod completion;
pub mod config;
pub mod contract;
pub mod dispute;
mod errors;
pub mod geocode;
pub mod inventory;
pub mod market;
pub mod snapshot;
mod types;
pub mod wallet;

#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

pub use benchmark::{Benchmark, BenchmarkBook, BenchmarkRun};
pub use completion::{Completion, CompletionEvent, CompletionTrigger};
pub use config::{MarketConfig, NetworkConfig};
pub use contract::{
    ContractProvider, ListingContract, PendingTransaction, RegistrationContract, TxReceipt,
};
pub use dispute::{merge_disputes, ArbiterAccess, DisputeAggregator, RaisedDisputes};
pub use errors::{get_suggestion, Error, ErrorClass, RpcCode, RpcFailure};
pub use geocode::{Geocoder, HttpGeocoder, ShippingMap, StaticGeocoder};
pub use inventory::Inventory;
pub use market::{AppState, ApprovalOutcome, ListingDetail, Market, OwnedGpu, SaleState};
pub use snapshot::{ListingSnapshot, Refresh, SnapshotStore};
pub use types::{
    is_address, Address, ApprovalCounts, ApprovalKind, BenchmarkHash, InventoryEntry, LatLng,
    ListingParams, ListingRecord, ListingStatus, RegistrationDetails, TxHash, Wei,
};
pub use wallet::{ensure_network, Session, WalletProvider};

pub mod error_codes {
    pub use crate::errors::{
        ACTION_REJECTED, CODE_INSUFFICIENT_FUNDS, CODE_UNRECOGNIZED_CHAIN, CODE_USER_REJECTED,
    };
}
