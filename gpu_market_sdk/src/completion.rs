use tracing::info;

use crate::contract::{ContractProvider, ListingContract, RegistrationContract};
use crate::errors::Error;
use crate::types::{Address, ApprovalCounts, ApprovalKind, BenchmarkHash, InventoryEntry, Wei};

/// Ownership transfer derived from a release quorum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionEvent {
    pub listing: Address,
    pub uuid: String,
    pub registration: Address,
    pub benchmark_hash: BenchmarkHash,
    pub price: Wei,
    pub buyer: Address,
}

impl CompletionEvent {
    pub fn inventory_entry(&self) -> InventoryEntry {
        InventoryEntry {
            uuid: self.uuid.clone(),
            registration: self.registration.clone(),
            benchmark_hash: self.benchmark_hash,
            price: Some(self.price),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    Released(CompletionEvent),
    /// Refund quorum: the listing is no longer deposited. No inventory change.
    Refunded { listing: Address },
}

#[derive(Copy, Clone, Debug)]
pub struct CompletionTrigger {
    quorum: u32,
}

impl CompletionTrigger {
    pub fn new(quorum: u32) -> Self {
        Self { quorum }
    }

    pub fn quorum(&self) -> u32 {
        self.quorum
    }

    /// True only on the step that reaches the quorum.
    pub fn crossed(&self, before: u32, after: u32) -> bool {
        before < self.quorum && after >= self.quorum
    }

    pub fn detect(
        &self,
        previous: ApprovalCounts,
        current: ApprovalCounts,
    ) -> Option<ApprovalKind> {
        if self.crossed(previous.release, current.release) {
            Some(ApprovalKind::Release)
        } else if self.crossed(previous.refund, current.refund) {
            Some(ApprovalKind::Refund)
        } else {
            None
        }
    }

    /// Turns a count transition into a completion, fetching what the
    /// inventory needs on a release.
    pub async fn observe<P: ContractProvider>(
        &self,
        provider: &P,
        listing: &P::Listing,
        previous: ApprovalCounts,
        current: ApprovalCounts,
    ) -> Result<Option<Completion>, Error> {
        match self.detect(previous, current) {
            Some(ApprovalKind::Release) => {
                let event = completion_event(provider, listing).await?;
                info!(
                    listing = %event.listing,
                    uuid = %event.uuid,
                    buyer = %event.buyer,
                    "release quorum reached"
                );
                Ok(Some(Completion::Released(event)))
            }
            Some(ApprovalKind::Refund) => {
                info!(listing = %listing.address(), "refund quorum reached");
                Ok(Some(Completion::Refunded {
                    listing: listing.address().clone(),
                }))
            }
            None => Ok(None),
        }
    }
}

async fn completion_event<P: ContractProvider>(
    provider: &P,
    listing: &P::Listing,
) -> Result<CompletionEvent, Error> {
    let (registration, price, buyer) =
        tokio::join!(listing.gpu_registration(), listing.price(), listing.buyer());
    let registration = registration?;
    let details = provider.registration(&registration).get_details().await?;
    let benchmark_hash = details.latest_hash().copied().ok_or_else(|| {
        Error::Remote(format!("registration {} has no benchmark hash", registration))
    })?;
    Ok(CompletionEvent {
        listing: listing.address().clone(),
        uuid: details.uuid,
        registration,
        benchmark_hash,
        price: price?,
        buyer: buyer?,
    })
}
