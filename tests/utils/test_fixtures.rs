//! Test fixtures for market parties and listed GPUs
#![allow(clippy::unwrap_used)]

use gpu_market_sdk::testutils::{MockChain, MockProvider, MockWallet};
use gpu_market_sdk::{Address, BenchmarkRun, Market, MarketConfig, NetworkConfig, Session};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Party roles around one listing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Seller,
    Buyer,
    Arbiter,
    Outsider,
}

/// A GPU registered and listed by the seller
#[derive(Clone, Debug)]
pub struct ListedGpu {
    pub uuid: String,
    pub registration: Address,
    pub listing: Address,
}

/// One mock chain, four funded accounts and a config naming the arbiter
pub struct MarketFixture {
    pub chain: MockChain,
    pub seller: Address,
    pub buyer: Address,
    pub arbiter: Address,
    pub outsider: Address,
    pub config: MarketConfig,
}

impl Default for MarketFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketFixture {
    pub fn new() -> Self {
        let chain = MockChain::new();
        let seller = chain.generate_account();
        let buyer = chain.generate_account();
        let arbiter = chain.generate_account();
        let outsider = chain.generate_account();
        let config = MarketConfig {
            arbiter: arbiter.clone(),
            benchmark_delay_ms: 0,
            ..MarketConfig::default()
        };
        Self {
            chain,
            seller,
            buyer,
            arbiter,
            outsider,
            config,
        }
    }

    pub fn account(&self, role: Role) -> &Address {
        match role {
            Role::Seller => &self.seller,
            Role::Buyer => &self.buyer,
            Role::Arbiter => &self.arbiter,
            Role::Outsider => &self.outsider,
        }
    }

    /// Connects a wallet holding only `role`'s account
    pub async fn session(&self, role: Role) -> Session {
        let wallet = MockWallet::new(vec![self.account(role).clone()]);
        Session::connect(&wallet, &NetworkConfig::sepolia())
            .await
            .unwrap()
    }

    /// Fresh market session for `role`
    pub async fn market(&self, role: Role) -> Market<MockProvider> {
        let session = self.session(role).await;
        Market::new(
            self.config.clone(),
            session,
            self.chain.provider(self.account(role)),
        )
        .unwrap()
    }

    /// Rebinds an existing market, as the wallet switch button does
    pub async fn switch(&self, market: &mut Market<MockProvider>, role: Role) {
        let session = self.session(role).await;
        market
            .switch_account(session, self.chain.provider(self.account(role)))
            .unwrap();
    }

    /// Registers a freshly benchmarked GPU and lists it from `market`,
    /// which must be bound to the seller
    pub async fn list_gpu(
        &self,
        market: &mut Market<MockProvider>,
        seed: u64,
        price: &str,
    ) -> ListedGpu {
        let run = benchmark_run(seed);
        let gpu = market.register_gpu(Some(&run)).await.unwrap();
        let record = market
            .list_gpu(&gpu.uuid, price, Some(gpu.registration.as_str()))
            .await
            .unwrap();
        ListedGpu {
            uuid: gpu.uuid,
            registration: gpu.registration,
            listing: record.contract,
        }
    }
}

/// Deterministic benchmark run
pub fn benchmark_run(seed: u64) -> BenchmarkRun {
    BenchmarkRun::generate(&mut StdRng::seed_from_u64(seed))
}
