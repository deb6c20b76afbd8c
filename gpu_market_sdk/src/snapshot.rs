use std::collections::HashMap;

use tracing::debug;

use crate::contract::ListingContract;
use crate::errors::Error;
use crate::types::{Address, ApprovalCounts, ListingStatus, Wei};

/// Last-fetched view of a listing's on-chain fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingSnapshot {
    pub address: Address,
    pub seller: Address,
    pub arbiter: Address,
    pub buyer: Address,
    pub price: Wei,
    pub registration: Address,
    pub deposited: bool,
    pub counts: ApprovalCounts,
}

impl ListingSnapshot {
    /// Reads every field, issuing the reads concurrently.
    pub async fn fetch<L: ListingContract>(listing: &L) -> Result<Self, Error> {
        let (seller, arbiter, buyer, deposited, release, refund, price, registration) =
            tokio::join!(
                listing.seller(),
                listing.arbiter(),
                listing.buyer(),
                listing.deposited(),
                listing.release_approval_count(),
                listing.refund_approval_count(),
                listing.price(),
                listing.gpu_registration(),
            );
        Ok(Self {
            address: listing.address().clone(),
            seller: seller?,
            arbiter: arbiter?,
            buyer: buyer?,
            price: price?,
            registration: registration?,
            deposited: deposited?,
            counts: ApprovalCounts {
                release: release?,
                refund: refund?,
            },
        })
    }

    pub fn status(&self, quorum: u32) -> ListingStatus {
        ListingStatus::derive(self.deposited, self.counts, quorum)
    }

    pub fn has_buyer(&self) -> bool {
        !self.buyer.is_zero()
    }

    pub fn is_party(&self, account: &Address) -> bool {
        account == &self.seller
            || account == &self.arbiter
            || (self.has_buyer() && account == &self.buyer)
    }
}

/// Counts before and after a refresh.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Refresh {
    /// `None` when the listing had never been loaded.
    pub previous: Option<ApprovalCounts>,
    pub current: ApprovalCounts,
    pub deposited: bool,
}

impl Refresh {
    pub fn previous_or_zero(&self) -> ApprovalCounts {
        self.previous.unwrap_or_default()
    }
}

/// Per-session listing snapshots. Last write wins.
#[derive(Clone, Debug, Default)]
pub struct SnapshotStore {
    snapshots: HashMap<Address, ListingSnapshot>,
}

impl SnapshotStore {
    pub fn get(&self, listing: &Address) -> Option<&ListingSnapshot> {
        self.snapshots.get(listing)
    }

    pub fn insert(&mut self, snapshot: ListingSnapshot) {
        self.snapshots.insert(snapshot.address.clone(), snapshot);
    }

    /// Fetches the full view and replaces any stored snapshot.
    pub async fn load<L: ListingContract>(
        &mut self,
        listing: &L,
    ) -> Result<ListingSnapshot, Error> {
        let snapshot = ListingSnapshot::fetch(listing).await?;
        self.insert(snapshot.clone());
        Ok(snapshot)
    }

    /// Full load that also reports the counts it replaced.
    pub async fn reload<L: ListingContract>(
        &mut self,
        listing: &L,
    ) -> Result<(ListingSnapshot, Refresh), Error> {
        let previous = self.snapshots.get(listing.address()).map(|s| s.counts);
        let snapshot = self.load(listing).await?;
        let refresh = Refresh {
            previous,
            current: snapshot.counts,
            deposited: snapshot.deposited,
        };
        Ok((snapshot, refresh))
    }

    /// Re-reads the deposited flag and both approval counts.
    ///
    /// A listing that was never loaded gets a full load instead.
    pub async fn refresh<L: ListingContract>(&mut self, listing: &L) -> Result<Refresh, Error> {
        let address = listing.address();
        let previous = self.snapshots.get(address).map(|s| s.counts);
        if previous.is_none() {
            let snapshot = self.load(listing).await?;
            return Ok(Refresh {
                previous: None,
                current: snapshot.counts,
                deposited: snapshot.deposited,
            });
        }

        let (deposited, release, refund) = tokio::join!(
            listing.deposited(),
            listing.release_approval_count(),
            listing.refund_approval_count(),
        );
        let deposited = deposited?;
        let current = ApprovalCounts {
            release: release?,
            refund: refund?,
        };
        if let Some(snapshot) = self.snapshots.get_mut(address) {
            snapshot.deposited = deposited;
            snapshot.counts = current;
        }
        debug!(
            listing = %address,
            release = current.release,
            refund = current.refund,
            deposited,
            "listing refreshed"
        );
        Ok(Refresh {
            previous,
            current,
            deposited,
        })
    }

    /// Local status flip after a refund quorum.
    pub fn mark_refunded(&mut self, listing: &Address) {
        if let Some(snapshot) = self.snapshots.get_mut(listing) {
            snapshot.deposited = false;
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
