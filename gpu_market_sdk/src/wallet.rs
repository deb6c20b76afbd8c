#![allow(async_fn_in_trait)]

use tracing::{info, warn};

use crate::config::NetworkConfig;
use crate::errors::Error;
use crate::types::Address;

/// Browser wallet extension, seen through its request API.
pub trait WalletProvider {
    async fn switch_chain(&self, chain_id: &str) -> Result<(), Error>;
    async fn add_chain(&self, network: &NetworkConfig) -> Result<(), Error>;
    async fn request_permissions(&self) -> Result<(), Error>;
    async fn request_accounts(&self) -> Result<Vec<Address>, Error>;
}

/// Switches the wallet to `network`, registering it first if the wallet
/// does not know the chain.
pub async fn ensure_network<W: WalletProvider>(
    wallet: &W,
    network: &NetworkConfig,
) -> Result<(), Error> {
    match wallet.switch_chain(&network.chain_id).await {
        Ok(()) => Ok(()),
        Err(Error::UnrecognizedChain(_)) => {
            info!(chain_id = %network.chain_id, "adding chain to wallet");
            wallet.add_chain(network).await
        }
        Err(err) => {
            warn!(chain_id = %network.chain_id, reason = %err, "could not switch chain");
            Err(err)
        }
    }
}

/// Connected account for the lifetime of the page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    account: Address,
}

impl Session {
    /// Switches network, then asks for account access once.
    pub async fn connect<W: WalletProvider>(
        wallet: &W,
        network: &NetworkConfig,
    ) -> Result<Self, Error> {
        ensure_network(wallet, network).await?;
        let account = first_account(wallet.request_accounts().await?)?;
        info!(account = %account, "wallet connected");
        Ok(Self { account })
    }

    /// Re-prompts for permissions so the user can pick another account.
    pub async fn switch_wallet<W: WalletProvider>(&mut self, wallet: &W) -> Result<(), Error> {
        wallet.request_permissions().await?;
        let account = first_account(wallet.request_accounts().await?)?;
        info!(from = %self.account, to = %account, "wallet switched");
        self.account = account;
        Ok(())
    }

    pub fn account(&self) -> &Address {
        &self.account
    }
}

fn first_account(accounts: Vec<Address>) -> Result<Address, Error> {
    accounts.into_iter().next().ok_or(Error::NotConnected)
}
