use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::benchmark::{run_benchmark, Benchmark, BenchmarkBook, BenchmarkRun};
use crate::completion::{Completion, CompletionTrigger};
use crate::config::MarketConfig;
use crate::contract::{
    ContractProvider, ListingContract, PendingTransaction, RegistrationContract, TxReceipt,
};
use crate::dispute::{DisputeAggregator, RaisedDisputes};
use crate::errors::{Error, ErrorClass};
use crate::geocode::{Geocoder, ShippingMap};
use crate::inventory::Inventory;
use crate::snapshot::{ListingSnapshot, Refresh, SnapshotStore};
use crate::types::{
    Address, ApprovalCounts, ApprovalKind, BenchmarkHash, InventoryEntry, ListingParams,
    ListingRecord, ListingStatus, RegistrationDetails, Wei,
};
use crate::wallet::Session;

// ==================== State ====================

/// Browse-page sale state of a listing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SaleState {
    /// Deposited flag not read yet; buying is disabled.
    Checking,
    Available,
    Sold,
}

/// Everything the views render. Replaced wholesale by each action.
#[derive(Clone, Debug, Default)]
pub struct AppState {
    pub listings: Vec<ListingRecord>,
    pub snapshots: SnapshotStore,
    pub inventory: Inventory,
    pub benchmarks: BenchmarkBook,
    pub disputes: RaisedDisputes,
    pub sold: HashMap<Address, bool>,
}

impl AppState {
    pub fn listing(&self, contract: &Address) -> Option<&ListingRecord> {
        self.listings.iter().find(|l| &l.contract == contract)
    }

    pub fn is_listed(&self, uuid: &str) -> bool {
        self.listings.iter().any(|l| l.uuid == uuid)
    }

    pub fn sale_state(&self, contract: &Address) -> SaleState {
        match self.sold.get(contract) {
            None => SaleState::Checking,
            Some(false) => SaleState::Available,
            Some(true) => SaleState::Sold,
        }
    }

    pub fn listing_addresses(&self) -> Vec<Address> {
        self.listings.iter().map(|l| l.contract.clone()).collect()
    }
}

// ==================== Outcomes ====================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisteredGpu {
    pub registration: Address,
    pub uuid: String,
    pub benchmark_hash: BenchmarkHash,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositOutcome {
    pub receipt: TxReceipt,
    pub snapshot: ListingSnapshot,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalOutcome {
    pub receipt: TxReceipt,
    pub counts: ApprovalCounts,
    pub status: ListingStatus,
    pub completion: Option<Completion>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListingDetail {
    pub snapshot: ListingSnapshot,
    pub status: ListingStatus,
    pub registration: RegistrationDetails,
    pub map: ShippingMap,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OwnedGpu {
    pub entry: InventoryEntry,
    pub benchmark: Option<Benchmark>,
    pub listed: bool,
    pub explorer_url: Option<String>,
}

fn failed(action: &'static str, err: Error) -> Error {
    match err.class() {
        ErrorClass::Declined => info!(action, "cancelled by user"),
        ErrorClass::Invalid | ErrorClass::Denied => {
            warn!(action, code = err.code(), reason = %err, "rejected")
        }
        ErrorClass::InsufficientFunds | ErrorClass::Remote => {
            warn!(action, code = err.code(), reason = %err, "remote failure")
        }
    }
    err
}

// ==================== Controller ====================

/// Single owner of the session's application state.
///
/// Each action follows submit, confirm, re-read, then publishes a new
/// [`AppState`] built only from what was read back.
pub struct Market<P: ContractProvider> {
    config: MarketConfig,
    session: Session,
    provider: P,
    trigger: CompletionTrigger,
    aggregator: DisputeAggregator,
    state: Arc<AppState>,
}

impl<P: ContractProvider> Market<P> {
    pub fn new(config: MarketConfig, session: Session, provider: P) -> Result<Self, Error> {
        config.validate()?;
        if provider.signer() != session.account() {
            return Err(Error::Config(format!(
                "signer {} does not match connected account {}",
                provider.signer(),
                session.account()
            )));
        }
        Ok(Self {
            trigger: CompletionTrigger::new(config.quorum),
            aggregator: DisputeAggregator::new(config.arbiter.clone()),
            config,
            session,
            provider,
            state: Arc::new(AppState::default()),
        })
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    pub fn account(&self) -> &Address {
        self.session.account()
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Rebinds to another account after a wallet switch. Session data stays.
    pub fn switch_account(&mut self, session: Session, provider: P) -> Result<(), Error> {
        if provider.signer() != session.account() {
            return Err(Error::Config("signer does not match connected account".into()));
        }
        info!(account = %session.account(), "market rebound to account");
        self.session = session;
        self.provider = provider;
        Ok(())
    }

    fn commit(&mut self, next: AppState) -> Arc<AppState> {
        self.state = Arc::new(next);
        self.state()
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    pub async fn run_benchmark(&self) -> BenchmarkRun {
        run_benchmark(Duration::from_millis(self.config.benchmark_delay_ms)).await
    }

    /// Deploys a registration committing to the run's benchmark hash.
    pub async fn register_gpu(
        &mut self,
        run: Option<&BenchmarkRun>,
    ) -> Result<RegisteredGpu, Error> {
        self.register_inner(run)
            .await
            .map_err(|e| failed("register", e))
    }

    async fn register_inner(&mut self, run: Option<&BenchmarkRun>) -> Result<RegisteredGpu, Error> {
        let run = run
            .filter(|r| !r.uuid.trim().is_empty())
            .ok_or(Error::BenchmarkMissing)?;
        let hash = run.benchmark.commitment()?;
        let registration = self.provider.deploy_registration(&run.uuid, &hash).await?;
        info!(uuid = %run.uuid, registration = %registration, hash = %hash, "gpu registered");

        let mut next = (*self.state).clone();
        next.benchmarks.insert(hash, run.benchmark.clone());
        next.inventory.record(
            self.session.account(),
            InventoryEntry {
                uuid: run.uuid.clone(),
                registration: registration.clone(),
                benchmark_hash: hash,
                price: None,
            },
        );
        self.commit(next);
        Ok(RegisteredGpu {
            registration,
            uuid: run.uuid.clone(),
            benchmark_hash: hash,
        })
    }

    // ------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------

    /// Deploys an escrow listing for a registered GPU.
    pub async fn list_gpu(
        &mut self,
        uuid: &str,
        price: &str,
        registration: Option<&str>,
    ) -> Result<ListingRecord, Error> {
        self.list_inner(uuid, price, registration)
            .await
            .map_err(|e| failed("list", e))
    }

    async fn list_inner(
        &mut self,
        uuid: &str,
        price: &str,
        registration: Option<&str>,
    ) -> Result<ListingRecord, Error> {
        let uuid = uuid.trim();
        if uuid.is_empty() {
            return Err(Error::MissingField("uuid"));
        }
        if price.trim().is_empty() {
            return Err(Error::MissingField("price"));
        }
        let registration = registration
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or(Error::MissingField("registration"))?;
        let registration = Address::parse(registration)?;
        let price = Wei::parse_ether(price)?;
        if price.is_zero() {
            return Err(Error::InvalidAmount("price must be positive".into()));
        }
        if self.state.is_listed(uuid) {
            return Err(Error::AlreadyListed(uuid.to_string()));
        }

        let params = ListingParams {
            arbiter: self.config.arbiter.clone(),
            price,
            commission_percent: self.config.commission_percent,
            registration,
        };
        let contract = self.provider.deploy_listing(&params).await?;
        info!(uuid, listing = %contract, price = %price, "listing deployed");

        let record = ListingRecord {
            uuid: uuid.to_string(),
            price,
            contract: contract.clone(),
        };
        let mut next = (*self.state).clone();
        next.listings.push(record.clone());
        self.commit(next);
        self.check_sold(&contract).await;
        Ok(record)
    }

    /// Adds a listing deployed elsewhere (for example, opened from a shared
    /// link) to the browse list.
    pub async fn track_listing(&mut self, listing: &Address) -> Result<ListingRecord, Error> {
        if let Some(record) = self.state.listing(listing) {
            return Ok(record.clone());
        }
        let contract = self.provider.listing(listing);
        let mut next = (*self.state).clone();
        let snapshot = self
            .reload(&mut next, &contract)
            .await
            .map_err(|e| failed("track", e))?;
        let details = self
            .provider
            .registration(&snapshot.registration)
            .get_details()
            .await
            .map_err(|e| failed("track", e))?;
        let record = ListingRecord {
            uuid: details.uuid,
            price: snapshot.price,
            contract: listing.clone(),
        };
        next.listings.push(record.clone());
        next.sold.insert(listing.clone(), snapshot.deposited);
        self.commit(next);
        Ok(record)
    }

    /// Reads the deposited flag of every listing. A failing read counts
    /// as not deposited.
    pub async fn check_sold_status(&mut self) -> Arc<AppState> {
        let mut sold = HashMap::new();
        for address in self.state.listing_addresses() {
            let deposited = self.read_deposited(&address).await;
            sold.insert(address, deposited);
        }
        let mut next = (*self.state).clone();
        next.sold = sold;
        self.commit(next)
    }

    async fn check_sold(&mut self, listing: &Address) {
        let deposited = self.read_deposited(listing).await;
        let mut next = (*self.state).clone();
        next.sold.insert(listing.clone(), deposited);
        self.commit(next);
    }

    async fn read_deposited(&self, listing: &Address) -> bool {
        match self.provider.listing(listing).deposited().await {
            Ok(deposited) => deposited,
            Err(err) => {
                warn!(listing = %listing, reason = %err, "could not read deposited flag");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Purchase
    // ------------------------------------------------------------------

    /// Pays the listing price into escrow.
    pub async fn deposit(&mut self, listing: &Address) -> Result<DepositOutcome, Error> {
        self.deposit_inner(listing)
            .await
            .map_err(|e| failed("deposit", e))
    }

    async fn deposit_inner(&mut self, listing: &Address) -> Result<DepositOutcome, Error> {
        let record = self
            .state
            .listing(listing)
            .cloned()
            .ok_or_else(|| Error::UnknownListing(listing.clone()))?;
        match self.state.sale_state(listing) {
            SaleState::Checking => return Err(Error::UnknownListing(listing.clone())),
            SaleState::Sold => return Err(Error::AlreadySold(listing.clone())),
            SaleState::Available => {}
        }

        let contract = self.provider.listing(listing);
        let tx = contract.deposit(record.price).await?;
        info!(listing = %listing, tx = %tx.hash(), value = %record.price, "deposit submitted");
        let receipt = tx.confirm().await?;
        info!(listing = %listing, block = receipt.block_number, "deposit confirmed");

        self.check_sold_status().await;
        let mut next = (*self.state).clone();
        let snapshot = self.reload(&mut next, &contract).await?;
        self.commit(next);
        Ok(DepositOutcome { receipt, snapshot })
    }

    // ------------------------------------------------------------------
    // Approvals
    // ------------------------------------------------------------------

    pub async fn approve_release(&mut self, listing: &Address) -> Result<ApprovalOutcome, Error> {
        self.approve(listing, ApprovalKind::Release).await
    }

    pub async fn approve_refund(&mut self, listing: &Address) -> Result<ApprovalOutcome, Error> {
        self.approve(listing, ApprovalKind::Refund).await
    }

    /// Submits an approval, waits for it, then re-reads the counts and
    /// runs the completion trigger on the observed transition.
    pub async fn approve(
        &mut self,
        listing: &Address,
        kind: ApprovalKind,
    ) -> Result<ApprovalOutcome, Error> {
        self.approve_inner(listing, kind)
            .await
            .map_err(|e| failed("approve", e))
    }

    async fn approve_inner(
        &mut self,
        listing: &Address,
        kind: ApprovalKind,
    ) -> Result<ApprovalOutcome, Error> {
        let contract = self.provider.listing(listing);
        let mut next = (*self.state).clone();
        let snapshot = match next.snapshots.get(listing) {
            Some(snapshot) => snapshot.clone(),
            None => next.snapshots.load(&contract).await?,
        };
        if !snapshot.deposited {
            return Err(Error::NotDeposited(listing.clone()));
        }

        let tx = match kind {
            ApprovalKind::Release => contract.approve_release().await?,
            ApprovalKind::Refund => contract.approve_refund().await?,
        };
        info!(listing = %listing, ?kind, tx = %tx.hash(), "approval submitted");
        let receipt = tx.confirm().await?;

        let refresh = next.snapshots.refresh(&contract).await?;
        let completion = self
            .apply_transition(&mut next, &contract, refresh)
            .await?;
        let status = next
            .snapshots
            .get(listing)
            .map(|s| s.status(self.config.quorum))
            .unwrap_or(ListingStatus::Created);
        self.commit(next);
        Ok(ApprovalOutcome {
            receipt,
            counts: refresh.current,
            status,
            completion,
        })
    }

    /// Re-reads a listing and applies any quorum crossing seen since the
    /// last read.
    pub async fn refresh_listing(
        &mut self,
        listing: &Address,
    ) -> Result<Option<Completion>, Error> {
        let contract = self.provider.listing(listing);
        let mut next = (*self.state).clone();
        let refresh = next
            .snapshots
            .refresh(&contract)
            .await
            .map_err(|e| failed("refresh", e))?;
        let completion = if refresh.previous.is_some() {
            self.apply_transition(&mut next, &contract, refresh)
                .await
                .map_err(|e| failed("refresh", e))?
        } else {
            None
        };
        self.commit(next);
        Ok(completion)
    }

    async fn apply_transition(
        &self,
        next: &mut AppState,
        contract: &P::Listing,
        refresh: Refresh,
    ) -> Result<Option<Completion>, Error> {
        let completion = self
            .trigger
            .observe(&self.provider, contract, refresh.previous_or_zero(), refresh.current)
            .await?;
        match &completion {
            Some(Completion::Released(event)) => {
                if !next.inventory.record_completion(event) {
                    info!(uuid = %event.uuid, owner = %event.buyer, "completion already recorded");
                }
            }
            Some(Completion::Refunded { listing }) => {
                next.snapshots.mark_refunded(listing);
                next.sold.insert(listing.clone(), false);
            }
            None => {}
        }
        Ok(completion)
    }

    /// Full re-read of a listing. A quorum crossing since the stored
    /// snapshot goes through the completion trigger like a refresh.
    async fn reload(
        &self,
        next: &mut AppState,
        contract: &P::Listing,
    ) -> Result<ListingSnapshot, Error> {
        let (snapshot, refresh) = next.snapshots.reload(contract).await?;
        if refresh.previous.is_none() {
            return Ok(snapshot);
        }
        self.apply_transition(next, contract, refresh).await?;
        Ok(next
            .snapshots
            .get(&snapshot.address)
            .cloned()
            .unwrap_or(snapshot))
    }

    // ------------------------------------------------------------------
    // Disputes
    // ------------------------------------------------------------------

    /// Flags a funded listing for the arbiter. Returns false if it was
    /// already flagged.
    pub async fn raise_dispute(&mut self, listing: &Address) -> Result<bool, Error> {
        let contract = self.provider.listing(listing);
        let mut next = (*self.state).clone();
        let deposited = match next.snapshots.get(listing) {
            Some(snapshot) => snapshot.deposited,
            None => {
                next.snapshots
                    .load(&contract)
                    .await
                    .map_err(|e| failed("raise_dispute", e))?
                    .deposited
            }
        };
        if !deposited {
            return Err(failed("raise_dispute", Error::NotDeposited(listing.clone())));
        }
        let raised = next.disputes.raise(listing.clone());
        if raised {
            info!(listing = %listing, by = %self.account(), "dispute raised");
        }
        self.commit(next);
        Ok(raised)
    }

    /// Disputed listings, visible to the configured arbiter only.
    pub async fn arbiter_disputes(&self) -> Result<Vec<Address>, Error> {
        let access = self
            .aggregator
            .authorize(self.account())
            .map_err(|e| failed("arbiter_disputes", e))?;
        access
            .disputes(&self.provider, &self.state.listing_addresses(), &self.state.disputes)
            .await
            .map_err(|e| failed("arbiter_disputes", e))
    }

    /// Arbiter's release or refund vote on a disputed listing.
    pub async fn arbiter_approve(
        &mut self,
        listing: &Address,
        kind: ApprovalKind,
    ) -> Result<ApprovalOutcome, Error> {
        self.aggregator
            .authorize(self.account())
            .map_err(|e| failed("arbiter_approve", e))?;
        self.approve(listing, kind).await
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Full listing view with ownership history and the seller's location.
    pub async fn listing_detail<G: Geocoder>(
        &mut self,
        listing: &Address,
        geocoder: &G,
    ) -> Result<ListingDetail, Error> {
        let contract = self.provider.listing(listing);
        let mut next = (*self.state).clone();
        let snapshot = self
            .reload(&mut next, &contract)
            .await
            .map_err(|e| failed("listing_detail", e))?;
        let registration = self
            .provider
            .registration(&snapshot.registration)
            .get_details()
            .await
            .map_err(|e| failed("listing_detail", e))?;
        let seller_location = match geocoder.geocode(snapshot.seller.as_str()).await {
            Ok(found) => found.map(|m| m.position),
            Err(err) => {
                warn!(seller = %snapshot.seller, reason = %err, "seller location unavailable");
                None
            }
        };
        self.commit(next);
        Ok(ListingDetail {
            status: snapshot.status(self.config.quorum),
            snapshot,
            registration,
            map: ShippingMap::new(seller_location),
        })
    }

    /// GPUs held by `owner`, joined with their benchmarks.
    pub fn owned_gpus(&self, owner: &Address) -> Vec<OwnedGpu> {
        self.state
            .inventory
            .owned_by(owner)
            .iter()
            .map(|entry| OwnedGpu {
                benchmark: self.state.benchmarks.get(&entry.benchmark_hash).cloned(),
                listed: self.state.is_listed(&entry.uuid),
                explorer_url: self.config.network.explorer_address_url(&entry.registration),
                entry: entry.clone(),
            })
            .collect()
    }
}
