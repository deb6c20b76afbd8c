#![allow(clippy::unwrap_used)]

use gpu_market_sdk::{
    ApprovalCounts, Completion, Error, ListingStatus, SaleState, StaticGeocoder, Wei,
};
use gpu_market_tests::utils::constants::{LISTING_PRICE, OTHER_PRICE};
use gpu_market_tests::utils::{MarketFixture, Role};
use gpu_market_tests::{assert_market_error, assert_status, assert_success};

fn price() -> Wei {
    Wei::parse_ether(LISTING_PRICE).unwrap()
}

// ==================== Single browser session ====================

#[tokio::test]
async fn test_purchase_and_release_with_wallet_switching() {
    let fx = MarketFixture::new();
    let mut market = fx.market(Role::Seller).await;
    let gpu = fx.list_gpu(&mut market, 1, LISTING_PRICE).await;
    let seller_start = fx.chain.balance(&fx.seller);

    fx.switch(&mut market, Role::Buyer).await;
    let state = market.check_sold_status().await;
    assert_eq!(state.sale_state(&gpu.listing), SaleState::Available);

    let deposit = market.deposit(&gpu.listing).await.unwrap();
    assert!(deposit.snapshot.deposited);
    assert_eq!(deposit.snapshot.buyer, fx.buyer);
    assert_eq!(deposit.snapshot.arbiter, fx.arbiter);

    let vote = market.approve_release(&gpu.listing).await.unwrap();
    assert_status!(vote, ListingStatus::ReleasePending);

    fx.switch(&mut market, Role::Seller).await;
    let vote = market.approve_release(&gpu.listing).await.unwrap();
    assert_status!(vote, ListingStatus::Released);
    assert!(matches!(vote.completion, Some(Completion::Released(_))));

    assert_eq!(fx.chain.balance(&fx.seller), Wei(seller_start.0 + price().0));
    let owned = market.owned_gpus(&fx.buyer);
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].entry.uuid, gpu.uuid);
    assert_eq!(owned[0].entry.registration, gpu.registration);
    assert_eq!(owned[0].entry.price, Some(price()));
    // Seller's session also knows the benchmark behind the hash.
    assert!(owned[0].benchmark.is_some());
}

#[tokio::test]
async fn test_arbiter_can_break_the_tie() {
    let fx = MarketFixture::new();
    let mut market = fx.market(Role::Seller).await;
    let gpu = fx.list_gpu(&mut market, 2, LISTING_PRICE).await;

    fx.switch(&mut market, Role::Buyer).await;
    assert_success!(market.deposit(&gpu.listing).await);
    assert_success!(market.approve_release(&gpu.listing).await);

    fx.switch(&mut market, Role::Arbiter).await;
    let vote = market
        .arbiter_approve(&gpu.listing, gpu_market_sdk::ApprovalKind::Release)
        .await
        .unwrap();
    assert_status!(vote, ListingStatus::Released);
    assert_eq!(market.owned_gpus(&fx.buyer).len(), 1);
}

// ==================== Separate sessions ====================

#[tokio::test]
async fn test_each_observing_session_records_once() {
    let fx = MarketFixture::new();
    let mut seller = fx.market(Role::Seller).await;
    let gpu = fx.list_gpu(&mut seller, 3, LISTING_PRICE).await;

    let mut buyer = fx.market(Role::Buyer).await;
    buyer.track_listing(&gpu.listing).await.unwrap();
    assert_success!(buyer.deposit(&gpu.listing).await);
    assert_success!(buyer.approve_release(&gpu.listing).await);

    // Seller's first read already shows one approval: no crossing yet.
    assert_eq!(seller.refresh_listing(&gpu.listing).await.unwrap(), None);
    let vote = seller.approve_release(&gpu.listing).await.unwrap();
    assert!(matches!(vote.completion, Some(Completion::Released(_))));

    // Buyer sees 1 -> 2 on its next refresh, exactly once.
    let seen = buyer.refresh_listing(&gpu.listing).await.unwrap();
    match seen {
        Some(Completion::Released(event)) => {
            assert_eq!(event.buyer, fx.buyer);
            assert_eq!(event.uuid, gpu.uuid);
        }
        other => panic!("expected release, got {:?}", other),
    }
    assert_eq!(buyer.refresh_listing(&gpu.listing).await.unwrap(), None);
    assert_eq!(buyer.owned_gpus(&fx.buyer).len(), 1);
    assert_eq!(seller.owned_gpus(&fx.buyer).len(), 1);
}

#[tokio::test]
async fn test_second_buyer_cannot_deposit() {
    let fx = MarketFixture::new();
    let mut seller = fx.market(Role::Seller).await;
    let gpu = fx.list_gpu(&mut seller, 4, LISTING_PRICE).await;

    let mut buyer = fx.market(Role::Buyer).await;
    buyer.track_listing(&gpu.listing).await.unwrap();
    let mut outsider = fx.market(Role::Outsider).await;
    outsider.track_listing(&gpu.listing).await.unwrap();

    assert_success!(buyer.deposit(&gpu.listing).await);
    // The outsider's browse view is stale until it re-checks.
    let err = outsider.deposit(&gpu.listing).await.unwrap_err();
    assert!(matches!(err, Error::Remote(ref msg) if msg.contains("already deposited")));

    outsider.check_sold_status().await;
    assert_market_error!(
        outsider.deposit(&gpu.listing).await,
        Error::AlreadySold(gpu.listing.clone())
    );
}

#[tokio::test]
async fn test_listing_detail_records_release_seen_on_full_read() {
    let fx = MarketFixture::new();
    let mut seller = fx.market(Role::Seller).await;
    let gpu = fx.list_gpu(&mut seller, 8, LISTING_PRICE).await;

    let mut buyer = fx.market(Role::Buyer).await;
    buyer.track_listing(&gpu.listing).await.unwrap();
    assert_success!(buyer.deposit(&gpu.listing).await);
    assert_success!(buyer.approve_release(&gpu.listing).await);
    seller.refresh_listing(&gpu.listing).await.unwrap();
    assert_success!(seller.approve_release(&gpu.listing).await);

    // Buyer's stored counts are 1/0; the detail page reads 2/0.
    let detail = buyer
        .listing_detail(&gpu.listing, &StaticGeocoder::new())
        .await
        .unwrap();
    assert_eq!(detail.status, ListingStatus::Released);
    let owned = buyer.owned_gpus(&fx.buyer);
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].entry.uuid, gpu.uuid);

    assert_eq!(buyer.refresh_listing(&gpu.listing).await.unwrap(), None);
    assert_success!(buyer.listing_detail(&gpu.listing, &StaticGeocoder::new()).await);
    assert_eq!(buyer.owned_gpus(&fx.buyer).len(), 1);
}

// ==================== Refunds ====================

#[tokio::test]
async fn test_refund_returns_funds_and_reopens() {
    let fx = MarketFixture::new();
    let mut market = fx.market(Role::Seller).await;
    let gpu = fx.list_gpu(&mut market, 5, LISTING_PRICE).await;
    let buyer_start = fx.chain.balance(&fx.buyer);

    fx.switch(&mut market, Role::Buyer).await;
    assert_success!(market.deposit(&gpu.listing).await);
    assert_eq!(fx.chain.balance(&fx.buyer), Wei(buyer_start.0 - price().0));
    let vote = market.approve_refund(&gpu.listing).await.unwrap();
    assert_status!(vote, ListingStatus::RefundPending);

    fx.switch(&mut market, Role::Seller).await;
    let vote = market.approve_refund(&gpu.listing).await.unwrap();
    assert_eq!(vote.counts, ApprovalCounts { release: 0, refund: 2 });
    assert_status!(vote, ListingStatus::Refunded);

    assert_eq!(fx.chain.balance(&fx.buyer), buyer_start);
    assert_eq!(market.state().sale_state(&gpu.listing), SaleState::Available);
    assert!(market.owned_gpus(&fx.buyer).is_empty());
    assert_eq!(market.owned_gpus(&fx.seller).len(), 1);
}

#[tokio::test]
async fn test_listing_detail_reopens_after_refund_seen_on_full_read() {
    let fx = MarketFixture::new();
    let mut seller = fx.market(Role::Seller).await;
    let gpu = fx.list_gpu(&mut seller, 9, LISTING_PRICE).await;

    let mut buyer = fx.market(Role::Buyer).await;
    buyer.track_listing(&gpu.listing).await.unwrap();
    assert_success!(buyer.deposit(&gpu.listing).await);
    assert_success!(buyer.approve_refund(&gpu.listing).await);
    assert_eq!(buyer.state().sale_state(&gpu.listing), SaleState::Sold);
    seller.refresh_listing(&gpu.listing).await.unwrap();
    assert_success!(seller.approve_refund(&gpu.listing).await);

    let detail = buyer
        .listing_detail(&gpu.listing, &StaticGeocoder::new())
        .await
        .unwrap();
    assert_eq!(detail.status, ListingStatus::Refunded);
    assert!(!detail.snapshot.deposited);
    assert_eq!(buyer.state().sale_state(&gpu.listing), SaleState::Available);
    assert!(buyer.owned_gpus(&fx.buyer).is_empty());
}

#[tokio::test]
async fn test_sold_status_across_listings() {
    let fx = MarketFixture::new();
    let mut market = fx.market(Role::Seller).await;
    let first = fx.list_gpu(&mut market, 6, LISTING_PRICE).await;
    let second = fx.list_gpu(&mut market, 7, OTHER_PRICE).await;

    fx.switch(&mut market, Role::Buyer).await;
    assert_success!(market.deposit(&second.listing).await);

    let state = market.check_sold_status().await;
    assert_eq!(state.sale_state(&first.listing), SaleState::Available);
    assert_eq!(state.sale_state(&second.listing), SaleState::Sold);
    assert_eq!(state.listings.len(), 2);
    assert_eq!(
        state.listing(&second.listing).unwrap().price,
        Wei::parse_ether(OTHER_PRICE).unwrap()
    );
}
