#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use gpu_market_sdk::error_codes::{ACTION_REJECTED, CODE_USER_REJECTED};
use gpu_market_sdk::{
    get_suggestion, Address, Error, ErrorClass, RpcFailure, SaleState, Wei,
};
use gpu_market_tests::utils::constants::LISTING_PRICE;
use gpu_market_tests::utils::{MarketFixture, Role};
use gpu_market_tests::{assert_error_class, assert_market_error, assert_success};

fn every_error() -> Vec<Error> {
    let addr = Address::from_index(1);
    vec![
        Error::UserRejected,
        Error::InsufficientFunds("x".into()),
        Error::Remote("x".into()),
        Error::UnrecognizedChain("0x1".into()),
        Error::WalletUnavailable,
        Error::Geocode("x".into()),
        Error::NotArbiter(addr.clone()),
        Error::NotConnected,
        Error::InvalidAddress("x".into()),
        Error::InvalidAmount("x".into()),
        Error::MissingField("price"),
        Error::BenchmarkMissing,
        Error::AlreadyListed("GPU-1".into()),
        Error::NotDeposited(addr.clone()),
        Error::AlreadySold(addr.clone()),
        Error::UnknownListing(addr),
        Error::Config("x".into()),
    ]
}

#[test]
fn test_error_codes_are_unique_and_dense() {
    let codes: HashSet<u32> = every_error().iter().map(Error::code).collect();
    assert_eq!(codes.len(), every_error().len());
    assert_eq!(codes.iter().min(), Some(&1));
    assert_eq!(codes.iter().max(), Some(&17));
}

#[test]
fn test_every_error_has_a_suggestion() {
    for err in every_error() {
        assert!(!get_suggestion(&err).is_empty(), "no suggestion for {:?}", err);
        assert!(!err.to_string().is_empty());
    }
}

#[test]
fn test_only_rejection_is_a_user_abort() {
    let aborts: Vec<_> = every_error()
        .into_iter()
        .filter(Error::is_user_abort)
        .collect();
    assert_eq!(aborts, vec![Error::UserRejected]);
}

#[test]
fn test_wallet_failures_classify() {
    let cases = [
        (RpcFailure::new(CODE_USER_REJECTED, "denied"), ErrorClass::Declined),
        (RpcFailure::named(ACTION_REJECTED, "denied"), ErrorClass::Declined),
        (
            RpcFailure::message("sender doesn't have enough funds: insufficient funds"),
            ErrorClass::InsufficientFunds,
        ),
        (RpcFailure::new(-32603, "internal error"), ErrorClass::Remote),
        (RpcFailure::named("CALL_EXCEPTION", "reverted"), ErrorClass::Remote),
    ];
    for (failure, class) in cases {
        let err: Error = failure.clone().into();
        assert_eq!(err.class(), class, "{:?}", failure);
    }
}

#[tokio::test]
async fn test_failed_deposit_keeps_listing_available() {
    let fx = MarketFixture::new();
    let mut market = fx.market(Role::Seller).await;
    let gpu = fx.list_gpu(&mut market, 21, LISTING_PRICE).await;
    fx.switch(&mut market, Role::Buyer).await;

    fx.chain.set_balance(&fx.buyer, Wei::parse_ether("0.1").unwrap());
    assert_error_class!(market.deposit(&gpu.listing).await, ErrorClass::InsufficientFunds);

    fx.chain.set_balance(&fx.buyer, Wei::parse_ether("10").unwrap());
    fx.chain
        .fail_next_write(RpcFailure::new(CODE_USER_REJECTED, "User denied transaction signature"));
    assert_market_error!(market.deposit(&gpu.listing).await, Error::UserRejected);

    assert_eq!(market.state().sale_state(&gpu.listing), SaleState::Available);
    assert_success!(market.deposit(&gpu.listing).await);
}

#[tokio::test]
async fn test_rejected_approval_changes_nothing() {
    let fx = MarketFixture::new();
    let mut market = fx.market(Role::Seller).await;
    let gpu = fx.list_gpu(&mut market, 22, LISTING_PRICE).await;
    fx.switch(&mut market, Role::Buyer).await;
    assert_success!(market.deposit(&gpu.listing).await);

    fx.chain
        .fail_next_write(RpcFailure::named(ACTION_REJECTED, "user rejected transaction"));
    assert_market_error!(market.approve_release(&gpu.listing).await, Error::UserRejected);

    let snapshot = market.state().snapshots.get(&gpu.listing).cloned().unwrap();
    assert_eq!(snapshot.counts.release, 0);
    let vote = market.approve_release(&gpu.listing).await.unwrap();
    assert_eq!(vote.counts.release, 1);
}

#[tokio::test]
async fn test_outsider_approval_reverts() {
    let fx = MarketFixture::new();
    let mut market = fx.market(Role::Seller).await;
    let gpu = fx.list_gpu(&mut market, 23, LISTING_PRICE).await;
    fx.switch(&mut market, Role::Buyer).await;
    assert_success!(market.deposit(&gpu.listing).await);

    fx.switch(&mut market, Role::Outsider).await;
    assert_error_class!(market.approve_refund(&gpu.listing).await, ErrorClass::Remote);
}

#[tokio::test]
async fn test_unreachable_listing_reads() {
    let fx = MarketFixture::new();
    let mut market = fx.market(Role::Seller).await;
    let gpu = fx.list_gpu(&mut market, 24, LISTING_PRICE).await;
    fx.chain.break_reads(&gpu.listing);

    let state = market.check_sold_status().await;
    assert_eq!(state.sale_state(&gpu.listing), SaleState::Available);
    assert_error_class!(market.refresh_listing(&gpu.listing).await, ErrorClass::Remote);
    assert_error_class!(
        market
            .listing_detail(&gpu.listing, &gpu_market_sdk::StaticGeocoder::new())
            .await,
        ErrorClass::Remote
    );

    fx.chain.heal_reads(&gpu.listing);
    assert_success!(market.refresh_listing(&gpu.listing).await);
}
