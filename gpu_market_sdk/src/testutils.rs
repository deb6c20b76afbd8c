//! In-memory stand-ins for the chain and the wallet extension.
//!
//! The chain double follows the observable behaviour of the deployed
//! escrow: deposits must match the price, each party approves at most once,
//! and the second release or refund approval settles the listing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::NetworkConfig;
use crate::contract::{
    ContractProvider, ListingContract, PendingTransaction, RegistrationContract, TxReceipt,
};
use crate::errors::{Error, RpcFailure, CODE_INSUFFICIENT_FUNDS, CODE_UNRECOGNIZED_CHAIN};
use crate::types::{Address, BenchmarkHash, ListingParams, RegistrationDetails, TxHash, Wei};
use crate::wallet::WalletProvider;

/// Quorum the chain double settles at.
pub const SETTLEMENT_APPROVALS: usize = 2;
/// Starting balance of generated accounts: 100 ETH.
pub const DEFAULT_BALANCE: Wei = Wei(100_000_000_000_000_000_000);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn revert(reason: &str) -> Error {
    Error::Remote(format!("execution reverted: {}", reason))
}

#[derive(Clone, Debug)]
struct ListingState {
    seller: Address,
    arbiter: Address,
    buyer: Address,
    price: Wei,
    registration: Address,
    deposited: bool,
    release: Vec<Address>,
    refund: Vec<Address>,
    settled: bool,
}

impl ListingState {
    fn is_party(&self, who: &Address) -> bool {
        who == &self.seller || who == &self.arbiter || (!self.buyer.is_zero() && who == &self.buyer)
    }
}

#[derive(Default)]
struct ChainState {
    next_index: u64,
    block: u64,
    listings: HashMap<Address, ListingState>,
    registrations: HashMap<Address, RegistrationDetails>,
    balances: HashMap<Address, Wei>,
    write_failures: VecDeque<RpcFailure>,
    broken_reads: HashSet<Address>,
    reads: u64,
}

impl ChainState {
    fn next_address(&mut self) -> Address {
        self.next_index += 1;
        Address::from_index(self.next_index)
    }

    fn next_tx(&mut self) -> MockTx {
        self.block += 1;
        MockTx {
            hash: TxHash(format!("0x{:064x}", self.block)),
            block: self.block,
        }
    }

    fn take_failure(&mut self) -> Result<(), Error> {
        match self.write_failures.pop_front() {
            Some(failure) => Err(failure.into()),
            None => Ok(()),
        }
    }

    fn listing(&mut self, at: &Address) -> Result<&mut ListingState, Error> {
        if self.broken_reads.contains(at) {
            return Err(Error::Remote(format!("could not reach {}", at)));
        }
        self.listings
            .get_mut(at)
            .ok_or_else(|| Error::Remote(format!("no listing contract at {}", at)))
    }

    fn debit(&mut self, who: &Address, amount: Wei) -> Result<(), Error> {
        let balance = self.balances.get(who).copied().unwrap_or(Wei::ZERO);
        if balance < amount {
            return Err(RpcFailure::new(
                CODE_INSUFFICIENT_FUNDS,
                "insufficient funds for gas * price + value",
            )
            .into());
        }
        self.balances.insert(who.clone(), Wei(balance.0 - amount.0));
        Ok(())
    }

    fn credit(&mut self, who: &Address, amount: Wei) {
        let balance = self.balances.entry(who.clone()).or_default();
        balance.0 = balance.0.saturating_add(amount.0);
    }
}

/// Shared in-memory chain. Clones see the same state.
#[derive(Clone, Default)]
pub struct MockChain {
    state: Arc<Mutex<ChainState>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// New funded account.
    pub fn generate_account(&self) -> Address {
        let mut state = lock(&self.state);
        let account = state.next_address();
        state.balances.insert(account.clone(), DEFAULT_BALANCE);
        account
    }

    pub fn provider(&self, signer: &Address) -> MockProvider {
        MockProvider {
            chain: self.clone(),
            signer: signer.clone(),
        }
    }

    pub fn set_balance(&self, who: &Address, amount: Wei) {
        lock(&self.state).balances.insert(who.clone(), amount);
    }

    pub fn balance(&self, who: &Address) -> Wei {
        lock(&self.state).balances.get(who).copied().unwrap_or(Wei::ZERO)
    }

    /// The next write fails with `failure` before touching state.
    pub fn fail_next_write(&self, failure: RpcFailure) {
        lock(&self.state).write_failures.push_back(failure);
    }

    /// Every read of `listing` fails until [`MockChain::heal_reads`].
    pub fn break_reads(&self, listing: &Address) {
        lock(&self.state).broken_reads.insert(listing.clone());
    }

    pub fn heal_reads(&self, listing: &Address) {
        lock(&self.state).broken_reads.remove(listing);
    }

    /// Number of listing reads served so far.
    pub fn read_count(&self) -> u64 {
        lock(&self.state).reads
    }

    pub fn registration_details(&self, at: &Address) -> Option<RegistrationDetails> {
        lock(&self.state).registrations.get(at).cloned()
    }

    pub fn deployed_listings(&self) -> usize {
        lock(&self.state).listings.len()
    }
}

#[derive(Clone)]
pub struct MockProvider {
    chain: MockChain,
    signer: Address,
}

impl ContractProvider for MockProvider {
    type Listing = MockListing;
    type Registration = MockRegistration;

    fn signer(&self) -> &Address {
        &self.signer
    }

    fn listing(&self, at: &Address) -> MockListing {
        MockListing {
            chain: self.chain.clone(),
            address: at.clone(),
            signer: self.signer.clone(),
        }
    }

    fn registration(&self, at: &Address) -> MockRegistration {
        MockRegistration {
            chain: self.chain.clone(),
            address: at.clone(),
        }
    }

    async fn deploy_listing(&self, params: &ListingParams) -> Result<Address, Error> {
        let mut state = lock(&self.chain.state);
        state.take_failure()?;
        if !state.registrations.contains_key(&params.registration) {
            return Err(revert("unknown registration"));
        }
        let address = state.next_address();
        state.listings.insert(
            address.clone(),
            ListingState {
                seller: self.signer.clone(),
                arbiter: params.arbiter.clone(),
                buyer: Address::zero(),
                price: params.price,
                registration: params.registration.clone(),
                deposited: false,
                release: Vec::new(),
                refund: Vec::new(),
                settled: false,
            },
        );
        state.block += 1;
        Ok(address)
    }

    async fn deploy_registration(
        &self,
        uuid: &str,
        benchmark_hash: &BenchmarkHash,
    ) -> Result<Address, Error> {
        let mut state = lock(&self.chain.state);
        state.take_failure()?;
        let address = state.next_address();
        state.registrations.insert(
            address.clone(),
            RegistrationDetails {
                uuid: uuid.to_string(),
                owners: vec![self.signer.clone()],
                hashes: vec![*benchmark_hash],
            },
        );
        state.block += 1;
        Ok(address)
    }
}

pub struct MockTx {
    hash: TxHash,
    block: u64,
}

impl PendingTransaction for MockTx {
    fn hash(&self) -> &TxHash {
        &self.hash
    }

    async fn confirm(self) -> Result<TxReceipt, Error> {
        Ok(TxReceipt {
            hash: self.hash,
            block_number: self.block,
        })
    }
}

pub struct MockListing {
    chain: MockChain,
    address: Address,
    signer: Address,
}

impl MockListing {
    fn read<T>(&self, f: impl FnOnce(&ListingState) -> T) -> Result<T, Error> {
        let mut state = lock(&self.chain.state);
        state.reads += 1;
        Ok(f(state.listing(&self.address)?))
    }

    fn approve(&self, refund: bool) -> Result<MockTx, Error> {
        let mut state = lock(&self.chain.state);
        state.take_failure()?;
        let signer = self.signer.clone();
        let listing = state.listing(&self.address)?;
        if !listing.deposited {
            return Err(revert("nothing deposited"));
        }
        if listing.settled {
            return Err(revert("escrow already settled"));
        }
        if !listing.is_party(&signer) {
            return Err(revert("caller is not a party"));
        }
        let votes = if refund {
            &mut listing.refund
        } else {
            &mut listing.release
        };
        if votes.contains(&signer) {
            return Err(revert("already approved"));
        }
        votes.push(signer);

        let settle = votes.len() >= SETTLEMENT_APPROVALS;
        let (buyer, seller, price, registration) = (
            listing.buyer.clone(),
            listing.seller.clone(),
            listing.price,
            listing.registration.clone(),
        );
        if settle {
            listing.settled = true;
            if refund {
                listing.deposited = false;
                state.credit(&buyer, price);
            } else {
                state.credit(&seller, price);
                if let Some(reg) = state.registrations.get_mut(&registration) {
                    if let Some(latest) = reg.hashes.last().copied() {
                        reg.hashes.push(latest);
                    }
                    reg.owners.push(buyer);
                }
            }
        }
        Ok(state.next_tx())
    }
}

impl ListingContract for MockListing {
    type Tx = MockTx;

    fn address(&self) -> &Address {
        &self.address
    }

    async fn seller(&self) -> Result<Address, Error> {
        self.read(|l| l.seller.clone())
    }

    async fn arbiter(&self) -> Result<Address, Error> {
        self.read(|l| l.arbiter.clone())
    }

    async fn buyer(&self) -> Result<Address, Error> {
        self.read(|l| l.buyer.clone())
    }

    async fn deposited(&self) -> Result<bool, Error> {
        self.read(|l| l.deposited)
    }

    async fn release_approval_count(&self) -> Result<u32, Error> {
        self.read(|l| l.release.len() as u32)
    }

    async fn refund_approval_count(&self) -> Result<u32, Error> {
        self.read(|l| l.refund.len() as u32)
    }

    async fn price(&self) -> Result<Wei, Error> {
        self.read(|l| l.price)
    }

    async fn gpu_registration(&self) -> Result<Address, Error> {
        self.read(|l| l.registration.clone())
    }

    async fn approved_release(&self, party: &Address) -> Result<bool, Error> {
        self.read(|l| l.release.contains(party))
    }

    async fn approved_refund(&self, party: &Address) -> Result<bool, Error> {
        self.read(|l| l.refund.contains(party))
    }

    async fn deposit(&self, value: Wei) -> Result<MockTx, Error> {
        let mut state = lock(&self.chain.state);
        state.take_failure()?;
        let listing = state.listing(&self.address)?;
        if listing.deposited || listing.settled {
            return Err(revert("already deposited"));
        }
        if listing.seller == self.signer {
            return Err(revert("seller cannot buy"));
        }
        if listing.price != value {
            return Err(revert("incorrect price"));
        }
        state.debit(&self.signer, value)?;
        let listing = state.listing(&self.address)?;
        listing.deposited = true;
        listing.buyer = self.signer.clone();
        Ok(state.next_tx())
    }

    async fn approve_release(&self) -> Result<MockTx, Error> {
        self.approve(false)
    }

    async fn approve_refund(&self) -> Result<MockTx, Error> {
        self.approve(true)
    }
}

pub struct MockRegistration {
    chain: MockChain,
    address: Address,
}

impl RegistrationContract for MockRegistration {
    fn address(&self) -> &Address {
        &self.address
    }

    async fn get_details(&self) -> Result<RegistrationDetails, Error> {
        lock(&self.chain.state)
            .registrations
            .get(&self.address)
            .cloned()
            .ok_or_else(|| Error::Remote(format!("no registration contract at {}", self.address)))
    }
}

// ==================== Wallet ====================

#[derive(Default)]
struct WalletState {
    known_chains: Vec<String>,
    current_chain: Option<String>,
    selected: usize,
    requests: Vec<&'static str>,
    reject_accounts: bool,
}

/// Wallet extension double holding a fixed list of accounts.
pub struct MockWallet {
    accounts: Vec<Address>,
    state: Mutex<WalletState>,
}

impl MockWallet {
    pub fn new(accounts: Vec<Address>) -> Self {
        Self {
            accounts,
            state: Mutex::new(WalletState::default()),
        }
    }

    /// Pre-registers a chain so switching to it succeeds directly.
    pub fn with_known_chain(self, chain_id: &str) -> Self {
        lock(&self.state).known_chains.push(chain_id.to_string());
        self
    }

    /// Makes the account prompt fail as if the user closed it.
    pub fn rejecting_accounts(self) -> Self {
        lock(&self.state).reject_accounts = true;
        self
    }

    pub fn current_chain(&self) -> Option<String> {
        lock(&self.state).current_chain.clone()
    }

    /// Names of the requests received, in order.
    pub fn requests(&self) -> Vec<&'static str> {
        lock(&self.state).requests.clone()
    }
}

impl WalletProvider for MockWallet {
    async fn switch_chain(&self, chain_id: &str) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state.requests.push("wallet_switchEthereumChain");
        if !state.known_chains.iter().any(|c| c == chain_id) {
            return Err(RpcFailure::new(CODE_UNRECOGNIZED_CHAIN, "Unrecognized chain ID").into());
        }
        state.current_chain = Some(chain_id.to_string());
        Ok(())
    }

    async fn add_chain(&self, network: &NetworkConfig) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state.requests.push("wallet_addEthereumChain");
        state.known_chains.push(network.chain_id.clone());
        state.current_chain = Some(network.chain_id.clone());
        Ok(())
    }

    async fn request_permissions(&self) -> Result<(), Error> {
        let mut state = lock(&self.state);
        state.requests.push("wallet_requestPermissions");
        if !self.accounts.is_empty() {
            state.selected = (state.selected + 1) % self.accounts.len();
        }
        Ok(())
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, Error> {
        let mut state = lock(&self.state);
        state.requests.push("eth_requestAccounts");
        if state.reject_accounts {
            return Err(RpcFailure::new(4001, "User rejected the request.").into());
        }
        Ok(self.accounts.get(state.selected).cloned().into_iter().collect())
    }
}
