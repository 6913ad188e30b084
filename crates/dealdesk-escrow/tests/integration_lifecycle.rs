//! # Deal lifecycle integration tests
//!
//! End-to-end flows through the [`Desk`]: listing → deal → payment claim →
//! release / cancel / expiry / appeal, checking listing quantity and ledger
//! balances at each step.

use chrono::{DateTime, Duration, Utc};
use dealdesk_escrow::{Desk, FixedPriceSource, OpenDeal};
use dealdesk_types::*;
use rust_decimal::Decimal;

fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

struct Market {
    desk: Desk,
    seller: UserId,
    buyer: UserId,
    listing: ListingId,
    method: PaymentMethodId,
    t0: DateTime<Utc>,
}

/// A seller offering `quantity` USDT at 95 RUB, paid via SBP.
fn market(quantity: i64) -> Market {
    let prices = FixedPriceSource::new().with_price("USDT", "RUB", dec(100));
    let mut desk = Desk::new(DeskConfig::default(), Box::new(prices)).unwrap();
    let seller = UserId::new();
    let t0 = Utc::now();
    let method = desk.add_payment_method(seller, "SBP", "+7 900 123").unwrap();
    let listing = desk
        .create_listing(seller, ListingDraft::sample_sell(dec(quantity), dec(95)), t0)
        .unwrap();
    Market {
        desk,
        seller,
        buyer: UserId::new(),
        listing: listing.id,
        method: method.id,
        t0,
    }
}

impl Market {
    fn open_as(&mut self, actor: UserId, quantity: Decimal) -> Result<Deal> {
        let request = OpenDeal {
            listing_id: self.listing,
            quantity,
            payment_method_id: self.method,
            expected_fiat_total: None,
        };
        self.desk.open_deal(actor, request, self.t0)
    }

    fn open(&mut self, quantity: Decimal) -> Result<Deal> {
        self.open_as(self.buyer, quantity)
    }

    fn available(&self) -> Decimal {
        self.desk.listing(self.listing).unwrap().available_quantity
    }
}

#[test]
fn full_quantity_deal_exhausts_listing() {
    let mut m = market(100);
    m.open(dec(100)).unwrap();
    assert_eq!(m.available(), Decimal::ZERO);

    let err = m.open_as(UserId::new(), dec(1)).unwrap_err();
    assert!(
        matches!(err, DealDeskError::InsufficientListingQuantity { .. }),
        "Expected InsufficientListingQuantity, got: {err:?}"
    );
    m.desk.verify_invariants().unwrap();
}

#[test]
fn happy_path_credits_buyer_once() {
    let mut m = market(100);
    let deal = m.open(dec(10)).unwrap();
    m.desk.confirm_payment(deal.id, m.buyer, m.t0).unwrap();

    let done = m.desk.release(deal.id, m.seller, m.t0).unwrap();
    assert_eq!(done.state, DealState::Completed);
    assert!(done.closed_at.is_some());

    // Second release: success, no second credit.
    m.desk.release(deal.id, m.seller, m.t0).unwrap();
    assert_eq!(m.desk.ledger().balance(m.buyer, "USDT"), dec(10));
    assert_eq!(m.available(), dec(90));
    m.desk.verify_invariants().unwrap();
}

#[test]
fn cancel_after_completion_is_invalid_state() {
    let mut m = market(100);
    let deal = m.open(dec(10)).unwrap();
    m.desk.confirm_payment(deal.id, m.buyer, m.t0).unwrap();
    m.desk.release(deal.id, m.seller, m.t0).unwrap();

    for actor in [m.buyer, m.seller] {
        let err = m.desk.cancel_deal(deal.id, actor, None, m.t0).unwrap_err();
        assert!(matches!(err, DealDeskError::InvalidState { .. }));
    }
    assert_eq!(m.desk.deal(deal.id, m.t0).unwrap().state, DealState::Completed);
}

#[test]
fn overdue_deal_reads_as_timed_out() {
    let mut m = market(100);
    let deal = m.open(dec(25)).unwrap();
    assert_eq!(m.available(), dec(75));

    let later = m.t0 + Duration::minutes(16);
    let seen = m.desk.deal(deal.id, later).unwrap();
    assert_eq!(seen.state, DealState::Cancelled);
    assert_eq!(seen.cancellation_reason.as_deref(), Some("timeout"));
    assert_eq!(m.available(), dec(100));

    // The buyer's late confirmation is rejected.
    let err = m.desk.confirm_payment(deal.id, m.buyer, later).unwrap_err();
    assert!(matches!(err, DealDeskError::InvalidState { .. }));
    m.desk.verify_invariants().unwrap();
}

#[test]
fn cancel_on_overdue_deal_returns_timed_out_deal() {
    let mut m = market(100);
    let deal = m.open(dec(25)).unwrap();
    let later = m.t0 + Duration::minutes(16);

    let err = m
        .desk
        .cancel_deal(deal.id, UserId::new(), None, later)
        .unwrap_err();
    assert!(matches!(err, DealDeskError::NotAuthorized { .. }));

    let cancelled = m
        .desk
        .cancel_deal(deal.id, m.buyer, Some("changed my mind".into()), later)
        .unwrap();
    assert_eq!(cancelled.state, DealState::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("timeout"));
    assert_eq!(m.available(), dec(100));
    m.desk.verify_invariants().unwrap();
}

#[test]
fn overdue_reservation_is_reclaimed_without_sweep() {
    let mut m = market(100);
    let stale = m.open(dec(100)).unwrap();
    let later = m.t0 + Duration::minutes(16);

    let quotes = m
        .desk
        .search_listings(&ListingFilter::side(ListingSide::Sell), later);
    let quote = quotes
        .iter()
        .find(|q| q.listing.id == m.listing)
        .expect("listing is searchable again");
    assert_eq!(quote.listing.available_quantity, dec(100));

    let request = OpenDeal {
        listing_id: m.listing,
        quantity: dec(100),
        payment_method_id: m.method,
        expected_fiat_total: None,
    };
    let fresh = m.desk.open_deal(UserId::new(), request, later).unwrap();
    assert_eq!(fresh.state, DealState::PendingPayment);
    assert_eq!(m.available(), Decimal::ZERO);
    assert_eq!(
        m.desk.deal(stale.id, later).unwrap().cancellation_reason.as_deref(),
        Some("timeout")
    );
    m.desk.verify_invariants().unwrap();
}

#[test]
fn open_reclaims_overdue_reservation_on_its_own() {
    let mut m = market(100);
    m.open(dec(100)).unwrap();
    let later = m.t0 + Duration::minutes(16);

    let request = OpenDeal {
        listing_id: m.listing,
        quantity: dec(40),
        payment_method_id: m.method,
        expected_fiat_total: None,
    };
    m.desk.open_deal(UserId::new(), request, later).unwrap();
    assert_eq!(m.available(), dec(60));
}

#[test]
fn sweep_expires_only_overdue() {
    let mut m = market(100);
    let stale = m.open(dec(10)).unwrap();
    let fresh = m
        .desk
        .open_deal(
            UserId::new(),
            OpenDeal {
                listing_id: m.listing,
                quantity: dec(5),
                payment_method_id: m.method,
                expected_fiat_total: None,
            },
            m.t0 + Duration::minutes(10),
        )
        .unwrap();

    let expired = m.desk.expire_overdue(m.t0 + Duration::minutes(20));
    assert_eq!(expired, vec![stale.id]);
    assert_eq!(m.available(), dec(95));
    let fresh = m.desk.deal(fresh.id, m.t0 + Duration::minutes(20)).unwrap();
    assert_eq!(fresh.state, DealState::PendingPayment);
}

#[test]
fn seller_cannot_confirm_payment() {
    let mut m = market(100);
    let deal = m.open(dec(10)).unwrap();

    let err = m.desk.confirm_payment(deal.id, m.seller, m.t0).unwrap_err();
    assert!(matches!(err, DealDeskError::NotAuthorized { .. }));

    let claimed = m.desk.confirm_payment(deal.id, m.buyer, m.t0).unwrap();
    assert_eq!(claimed.state, DealState::PaymentClaimed);
}

#[test]
fn mutual_cancel_after_claim() {
    let mut m = market(100);
    let deal = m.open(dec(10)).unwrap();
    m.desk.confirm_payment(deal.id, m.buyer, m.t0).unwrap();

    let asked = m
        .desk
        .cancel_deal(deal.id, m.seller, Some("no payment received".into()), m.t0)
        .unwrap();
    assert_eq!(asked.state, DealState::PaymentClaimed);
    assert_eq!(asked.cancel_requested_by, Some(DealParty::Seller));
    assert_eq!(m.available(), dec(90));

    let cancelled = m.desk.cancel_deal(deal.id, m.buyer, None, m.t0).unwrap();
    assert_eq!(cancelled.state, DealState::Cancelled);
    assert_eq!(m.available(), dec(100));
}

#[test]
fn unilateral_cancel_after_claim_window() {
    let mut m = market(100);
    let deal = m.open(dec(10)).unwrap();
    m.desk.confirm_payment(deal.id, m.buyer, m.t0).unwrap();

    let window = i64::from(m.desk.config().post_claim_cancel_minutes);
    let too_early = m.t0 + Duration::minutes(window - 1);
    let still = m.desk.cancel_deal(deal.id, m.seller, None, too_early).unwrap();
    assert_eq!(still.state, DealState::PaymentClaimed);

    // A repeat by the same party does not count as agreement.
    let still = m.desk.cancel_deal(deal.id, m.seller, None, too_early).unwrap();
    assert_eq!(still.state, DealState::PaymentClaimed);

    let late = m.t0 + Duration::minutes(window);
    let cancelled = m.desk.cancel_deal(deal.id, m.seller, None, late).unwrap();
    assert_eq!(cancelled.state, DealState::Cancelled);
}

#[test]
fn dispute_blocks_release_and_cancel() {
    let mut m = market(100);
    let deal = m.open(dec(10)).unwrap();
    m.desk.confirm_payment(deal.id, m.buyer, m.t0).unwrap();
    let appeal = m
        .desk
        .raise_appeal(deal.id, m.buyer, "seller went silent", m.t0)
        .unwrap();
    assert_eq!(m.desk.deal(deal.id, m.t0).unwrap().state, DealState::Disputed);

    assert!(m.desk.release(deal.id, m.seller, m.t0).is_err());
    assert!(m.desk.cancel_deal(deal.id, m.buyer, None, m.t0).is_err());

    m.desk
        .resolve_appeal(appeal.id, AppealOutcome::ReleaseToBuyer, m.t0)
        .unwrap();
    assert_eq!(m.desk.deal(deal.id, m.t0).unwrap().state, DealState::Completed);
    assert_eq!(m.desk.ledger().balance(m.buyer, "USDT"), dec(10));
    assert_eq!(m.desk.appeals_for_deal(deal.id).unwrap().len(), 1);
    m.desk.verify_invariants().unwrap();
}

#[test]
fn appeal_on_pending_deal_rejected() {
    let mut m = market(100);
    let deal = m.open(dec(10)).unwrap();
    let err = m.desk.raise_appeal(deal.id, m.buyer, "early", m.t0).unwrap_err();
    assert!(matches!(err, DealDeskError::InvalidState { .. }));
    assert!(m.desk.appeals_for_deal(deal.id).unwrap().is_empty());
}

#[test]
fn buy_listing_makes_opener_the_seller() {
    let mut desk = Desk::new(DeskConfig::default(), Box::new(FixedPriceSource::new())).unwrap();
    let t0 = Utc::now();
    let wants_crypto = UserId::new();
    let has_crypto = UserId::new();

    let mut draft = ListingDraft::sample_sell(dec(50), dec(95));
    draft.side = ListingSide::Buy;
    let listing = desk.create_listing(wants_crypto, draft, t0).unwrap();

    // The listing owner's own method is not the seller's.
    let owners = desk.add_payment_method(wants_crypto, "SBP", "").unwrap();
    let sellers = desk.add_payment_method(has_crypto, "SBP", "+7 901").unwrap();
    let request = |method| OpenDeal {
        listing_id: listing.id,
        quantity: dec(5),
        payment_method_id: method,
        expected_fiat_total: Some(dec(475)),
    };
    assert!(desk.open_deal(has_crypto, request(owners.id), t0).is_err());

    let deal = desk.open_deal(has_crypto, request(sellers.id), t0).unwrap();
    assert_eq!(deal.buyer_id, wants_crypto);
    assert_eq!(deal.seller_id, has_crypto);

    desk.confirm_payment(deal.id, wants_crypto, t0).unwrap();
    desk.release(deal.id, has_crypto, t0).unwrap();
    assert_eq!(desk.ledger().balance(wants_crypto, "USDT"), dec(5));
}

#[test]
fn market_relative_price_snapshotted() {
    let mut m = market(100);
    let mut draft = ListingDraft::sample_sell(dec(10), dec(1));
    draft.price = PriceSpec::MarketRelative {
        premium_percent: dec(-5),
    };
    let relative = m.desk.create_listing(m.seller, draft, m.t0).unwrap();

    let deal = m
        .desk
        .open_deal(
            m.buyer,
            OpenDeal {
                listing_id: relative.id,
                quantity: dec(2),
                payment_method_id: m.method,
                expected_fiat_total: Some(dec(190)),
            },
            m.t0,
        )
        .unwrap();
    assert_eq!(deal.unit_price_snapshot, dec(95));
    assert_eq!(deal.fiat_total, dec(190));
}

#[test]
fn inactive_listing_cannot_be_traded_or_removed_while_open() {
    let mut m = market(100);
    let deal = m.open(dec(10)).unwrap();

    let err = m.desk.remove_listing(m.listing, m.seller, m.t0).unwrap_err();
    assert!(matches!(err, DealDeskError::InvalidState { .. }));

    m.desk
        .set_listing_status(m.listing, m.seller, ListingStatus::Inactive, m.t0)
        .unwrap();
    let err = m.open_as(UserId::new(), dec(1)).unwrap_err();
    assert!(matches!(err, DealDeskError::InvalidState { .. }));

    // The open deal still settles normally.
    m.desk.confirm_payment(deal.id, m.buyer, m.t0).unwrap();
    m.desk.release(deal.id, m.seller, m.t0).unwrap();
    m.desk.remove_listing(m.listing, m.seller, m.t0).unwrap();
    assert!(matches!(
        m.desk.listing(m.listing).unwrap_err(),
        DealDeskError::ListingNotFound(_)
    ));
}

#[test]
fn deposit_confirmation_is_idempotent() {
    let mut m = market(1);
    let first = m
        .desk
        .confirm_deposit(m.buyer, "ton", dec(40), "0xabc", m.t0)
        .unwrap();
    assert!(first.credited);
    let again = m
        .desk
        .confirm_deposit(m.buyer, "TON", dec(40), " 0xabc ", m.t0)
        .unwrap();
    assert!(!again.credited);
    assert_eq!(again.balance, dec(40));
    assert_eq!(m.desk.balances(m.buyer).len(), 1);
}

#[test]
fn withdrawal_refund_restores_balance() {
    let mut m = market(1);
    m.desk
        .confirm_deposit(m.buyer, "BTC", dec(3), "tx-1", m.t0)
        .unwrap();

    let err = m.desk.debit_withdrawal(m.buyer, "BTC", dec(5), m.t0).unwrap_err();
    assert!(matches!(err, DealDeskError::InsufficientFunds { .. }));

    let ticket = m.desk.debit_withdrawal(m.buyer, "BTC", dec(2), m.t0).unwrap();
    assert_eq!(ticket.balance, Decimal::ONE);

    assert_eq!(m.desk.refund_withdrawal(&ticket, m.t0).unwrap(), dec(3));
    assert!(m.desk.refund_withdrawal(&ticket, m.t0).is_err());
    assert_eq!(m.desk.ledger().balance(m.buyer, "BTC"), dec(3));
    m.desk.verify_invariants().unwrap();
}
