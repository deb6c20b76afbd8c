use std::collections::HashSet;

use tracing::{debug, warn};

use crate::contract::{ContractProvider, ListingContract};
use crate::errors::Error;
use crate::types::{Address, ApprovalCounts};

/// Listings flagged through "raise dispute". Insertion order, no duplicates.
#[derive(Clone, Debug, Default)]
pub struct RaisedDisputes {
    listings: Vec<Address>,
}

impl RaisedDisputes {
    pub fn raise(&mut self, listing: Address) -> bool {
        if self.contains(&listing) {
            return false;
        }
        self.listings.push(listing);
        true
    }

    pub fn contains(&self, listing: &Address) -> bool {
        self.listings.contains(listing)
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.listings
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

/// Union of chain-inferred and raised disputes, first-seen order.
pub fn merge_disputes(on_chain: &[Address], raised: &RaisedDisputes) -> Vec<Address> {
    let mut seen = HashSet::new();
    on_chain
        .iter()
        .chain(raised.as_slice())
        .filter(|a| seen.insert((*a).clone()))
        .cloned()
        .collect()
}

#[derive(Clone, Debug)]
pub struct DisputeAggregator {
    arbiter: Address,
}

impl DisputeAggregator {
    pub fn new(arbiter: Address) -> Self {
        Self { arbiter }
    }

    pub fn arbiter(&self) -> &Address {
        &self.arbiter
    }

    /// Grants the arbiter view to the configured arbiter only.
    pub fn authorize(&self, account: &Address) -> Result<ArbiterAccess<'_>, Error> {
        if account != &self.arbiter {
            warn!(account = %account, "arbiter view denied");
            return Err(Error::NotArbiter(account.clone()));
        }
        Ok(ArbiterAccess { aggregator: self })
    }

    /// Buyer and seller pulled in opposite directions on a funded listing
    /// that this arbiter oversees.
    pub fn infers_dispute(
        &self,
        arbiter: &Address,
        deposited: bool,
        counts: ApprovalCounts,
    ) -> bool {
        arbiter == &self.arbiter && deposited && counts.is_contested()
    }

    async fn inspect<L: ListingContract>(&self, listing: &L) -> Result<bool, Error> {
        let (arbiter, deposited) = tokio::join!(listing.arbiter(), listing.deposited());
        let (arbiter, deposited) = (arbiter?, deposited?);
        if arbiter != self.arbiter || !deposited {
            return Ok(false);
        }
        let (release, refund) = tokio::join!(
            listing.release_approval_count(),
            listing.refund_approval_count()
        );
        let counts = ApprovalCounts {
            release: release?,
            refund: refund?,
        };
        Ok(self.infers_dispute(&arbiter, deposited, counts))
    }

    async fn collect_on_chain<P: ContractProvider>(
        &self,
        provider: &P,
        listings: &[Address],
    ) -> Result<Vec<Address>, Error> {
        let mut out = Vec::new();
        for address in listings {
            if self.inspect(&provider.listing(address)).await? {
                out.push(address.clone());
            }
        }
        debug!(inspected = listings.len(), disputed = out.len(), "on-chain disputes collected");
        Ok(out)
    }
}

/// Proof that the connected account passed the arbiter check.
#[derive(Debug)]
pub struct ArbiterAccess<'a> {
    aggregator: &'a DisputeAggregator,
}

impl ArbiterAccess<'_> {
    pub fn arbiter(&self) -> &Address {
        self.aggregator.arbiter()
    }

    pub async fn disputes<P: ContractProvider>(
        &self,
        provider: &P,
        listings: &[Address],
        raised: &RaisedDisputes,
    ) -> Result<Vec<Address>, Error> {
        let on_chain = self.aggregator.collect_on_chain(provider, listings).await?;
        Ok(merge_disputes(&on_chain, raised))
    }
}
