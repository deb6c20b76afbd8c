//! Typed interfaces of the remote escrow and registration contracts.
//!
//! Implementations sit on top of a signing client chosen by the embedding
//! application. Reads hit the chain every time; writes return a pending
//! transaction the caller must confirm before treating the action as done.

#![allow(async_fn_in_trait)]

use crate::errors::Error;
use crate::types::{Address, BenchmarkHash, ListingParams, RegistrationDetails, TxHash, Wei};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: TxHash,
    pub block_number: u64,
}

pub trait PendingTransaction {
    fn hash(&self) -> &TxHash;

    /// Waits for inclusion. No local timeout is applied.
    async fn confirm(self) -> Result<TxReceipt, Error>;
}

/// `GPUListing` escrow contract.
pub trait ListingContract {
    type Tx: PendingTransaction;

    fn address(&self) -> &Address;

    async fn seller(&self) -> Result<Address, Error>;
    async fn arbiter(&self) -> Result<Address, Error>;
    /// Zero address until someone deposits.
    async fn buyer(&self) -> Result<Address, Error>;
    async fn deposited(&self) -> Result<bool, Error>;
    async fn release_approval_count(&self) -> Result<u32, Error>;
    async fn refund_approval_count(&self) -> Result<u32, Error>;
    async fn price(&self) -> Result<Wei, Error>;
    async fn gpu_registration(&self) -> Result<Address, Error>;
    async fn approved_release(&self, party: &Address) -> Result<bool, Error>;
    async fn approved_refund(&self, party: &Address) -> Result<bool, Error>;

    async fn deposit(&self, value: Wei) -> Result<Self::Tx, Error>;
    async fn approve_release(&self) -> Result<Self::Tx, Error>;
    async fn approve_refund(&self) -> Result<Self::Tx, Error>;
}

/// `GPURegistration` ownership record.
pub trait RegistrationContract {
    fn address(&self) -> &Address;

    async fn get_details(&self) -> Result<RegistrationDetails, Error>;
}

/// Signing client able to attach to and deploy both contracts.
pub trait ContractProvider {
    type Listing: ListingContract;
    type Registration: RegistrationContract;

    /// Account whose key signs every write.
    fn signer(&self) -> &Address;

    fn listing(&self, at: &Address) -> Self::Listing;
    fn registration(&self, at: &Address) -> Self::Registration;

    /// Deploys a listing and waits for the deployment to be mined.
    async fn deploy_listing(&self, params: &ListingParams) -> Result<Address, Error>;

    /// Deploys a registration and waits for the deployment to be mined.
    async fn deploy_registration(
        &self,
        uuid: &str,
        benchmark_hash: &BenchmarkHash,
    ) -> Result<Address, Error>;
}
