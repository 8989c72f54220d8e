//! Referral bonus processing, triggered after every flower purchase.
//!
//! Each player carries at most one sponsor link, set at registration and
//! never reassigned. The first bonus a sponsor earns from a given buyer
//! uses the first-purchase rate plus a fixed top-up; every later purchase
//! pays the recurring rate. A purchase is credited at most once, keyed by
//! its purchase id on the buyer's link.
//!
//! The buyer's lock and the sponsor's lock are never held together. The
//! bonus is committed on the buyer's link first; the sponsor credit is
//! then applied best effort, and a failure there (a deleted sponsor, an
//! overflowing balance) is logged rather than unwinding the purchase.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use apiary_types::{Currency, PlayerId, PurchaseId};

use apiary_economy::{balances, bonus, EconomyConfig};

use crate::error::LedgerError;
use crate::store::LedgerStore;

/// The bonus credited to a sponsor for one purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralCredit {
    /// Who received the bonus.
    pub sponsor: PlayerId,
    /// Flower amount credited.
    pub amount: Decimal,
    /// Whether this was the one-time first-purchase bonus.
    pub first_purchase: bool,
}

/// Applies referral bonuses as a side effect of completed purchases.
#[derive(Debug)]
pub struct ReferralProcessor {
    store: Arc<LedgerStore>,
    config: Arc<EconomyConfig>,
}

impl ReferralProcessor {
    /// Create a processor over the given store and economy rules.
    pub fn new(store: Arc<LedgerStore>, config: Arc<EconomyConfig>) -> Self {
        Self { store, config }
    }

    /// Process one completed purchase by `buyer` worth `amount` flowers.
    ///
    /// Returns `Ok(None)` when the buyer has no sponsor or the purchase
    /// was already credited. The bonus is first recorded on the buyer's
    /// link, which makes replays no-ops, and the sponsor is credited
    /// afterwards without holding the buyer's lock.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::PlayerNotFound`] for an unknown buyer and
    /// propagates arithmetic failures from the bonus computation.
    pub async fn process_purchase(
        &self,
        buyer: PlayerId,
        purchase: PurchaseId,
        amount: Decimal,
    ) -> Result<Option<ReferralCredit>, LedgerError> {
        let config = Arc::clone(&self.config);

        // Phase one: decide and record the bonus under the buyer's lock.
        let mut credit: Option<ReferralCredit> = None;
        self.store
            .update(buyer, |rec| {
                let Some(link) = rec.referral.as_mut() else {
                    return Ok(());
                };
                if link.processed_purchases.contains(&purchase) {
                    return Ok(());
                }

                let (bonus_amount, first_purchase) = if link.first_purchase_done {
                    (bonus::recurring_bonus(amount, &config)?, false)
                } else {
                    (bonus::first_purchase_bonus(amount, &config)?, true)
                };

                link.processed_purchases.insert(purchase);
                link.first_purchase_done = true;
                link.earned = link
                    .earned
                    .checked_add(bonus_amount)
                    .ok_or_else(|| apiary_economy::EconomyError::ArithmeticOverflow {
                        context: "referral link earnings".to_owned(),
                    })?;
                credit = Some(ReferralCredit {
                    sponsor: link.sponsor,
                    amount: bonus_amount,
                    first_purchase,
                });
                Ok(())
            })
            .await?;

        let Some(credit) = credit else {
            return Ok(None);
        };

        // Phase two: credit the sponsor, best effort.
        let outcome = self
            .store
            .update(credit.sponsor, |rec| {
                balances::credit(&mut rec.ledger, Currency::Flowers, credit.amount)?;
                rec.ledger.referral_earnings = rec
                    .ledger
                    .referral_earnings
                    .checked_add(credit.amount)
                    .ok_or_else(|| apiary_economy::EconomyError::ArithmeticOverflow {
                        context: "sponsor referral earnings".to_owned(),
                    })?;
                Ok(())
            })
            .await;

        match outcome {
            Ok(()) => {
                debug!(
                    buyer = %buyer,
                    sponsor = %credit.sponsor,
                    amount = %credit.amount,
                    first_purchase = credit.first_purchase,
                    "referral bonus credited"
                );
                Ok(Some(credit))
            }
            Err(err) => {
                warn!(
                    buyer = %buyer,
                    sponsor = %credit.sponsor,
                    amount = %credit.amount,
                    error = %err,
                    "referral bonus could not be credited to sponsor"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    async fn linked_pair(store: &LedgerStore) -> (PlayerId, PlayerId) {
        let sponsor = PlayerId::new();
        let buyer = PlayerId::new();
        let now = Utc::now();
        store.create_if_absent(sponsor, now).await;
        store.create_if_absent(buyer, now).await;
        store
            .link_sponsor(
                buyer,
                apiary_types::ReferralLink::new(sponsor, String::from("BEE-123"), now),
            )
            .await
            .ok();
        (sponsor, buyer)
    }

    #[tokio::test]
    async fn first_then_recurring_rates() {
        let store = Arc::new(LedgerStore::new());
        let config = Arc::new(EconomyConfig::default());
        let (sponsor, buyer) = linked_pair(&store).await;
        let processor = ReferralProcessor::new(Arc::clone(&store), config);

        // First purchase: floor(200 * 0.1) + 100 = 120.
        let first = processor
            .process_purchase(buyer, PurchaseId::new(), Decimal::new(200, 0))
            .await;
        assert_eq!(
            first.ok().flatten().map(|c| (c.amount, c.first_purchase)),
            Some((Decimal::new(120, 0), true)),
        );

        // Recurring: floor(200 * 0.05) = 10.
        let second = processor
            .process_purchase(buyer, PurchaseId::new(), Decimal::new(200, 0))
            .await;
        assert_eq!(
            second.ok().flatten().map(|c| (c.amount, c.first_purchase)),
            Some((Decimal::new(10, 0), false)),
        );

        let ledger = store.get(sponsor).await.ok();
        assert_eq!(
            ledger.as_ref().map(|l| l.flowers),
            Some(Decimal::new(130, 0)),
        );
        assert_eq!(
            ledger.map(|l| l.referral_earnings),
            Some(Decimal::new(130, 0)),
        );
    }

    #[tokio::test]
    async fn same_purchase_credited_at_most_once() {
        let store = Arc::new(LedgerStore::new());
        let config = Arc::new(EconomyConfig::default());
        let (sponsor, buyer) = linked_pair(&store).await;
        let processor = ReferralProcessor::new(Arc::clone(&store), config);

        let purchase = PurchaseId::new();
        let first = processor
            .process_purchase(buyer, purchase, Decimal::new(200, 0))
            .await;
        assert!(first.ok().flatten().is_some());

        let replay = processor
            .process_purchase(buyer, purchase, Decimal::new(200, 0))
            .await;
        assert_eq!(replay.ok().flatten(), None);

        let ledger = store.get(sponsor).await.ok();
        assert_eq!(ledger.map(|l| l.flowers), Some(Decimal::new(120, 0)));
    }

    #[tokio::test]
    async fn no_sponsor_is_a_noop() {
        let store = Arc::new(LedgerStore::new());
        let config = Arc::new(EconomyConfig::default());
        let buyer = PlayerId::new();
        store.create_if_absent(buyer, Utc::now()).await;
        let processor = ReferralProcessor::new(Arc::clone(&store), config);

        let credit = processor
            .process_purchase(buyer, PurchaseId::new(), Decimal::new(200, 0))
            .await;
        assert_eq!(credit.ok().flatten(), None);
    }

    #[tokio::test]
    async fn link_earnings_track_lifetime_total() {
        let store = Arc::new(LedgerStore::new());
        let config = Arc::new(EconomyConfig::default());
        let (_, buyer) = linked_pair(&store).await;
        let processor = ReferralProcessor::new(Arc::clone(&store), config);

        processor
            .process_purchase(buyer, PurchaseId::new(), Decimal::new(200, 0))
            .await
            .ok();
        processor
            .process_purchase(buyer, PurchaseId::new(), Decimal::new(400, 0))
            .await
            .ok();

        let record = store.get_record(buyer).await.ok();
        let earned = record.and_then(|r| r.referral.map(|l| l.earned));
        // 120 first + floor(400 * 0.05) = 20 recurring.
        assert_eq!(earned, Some(Decimal::new(140, 0)));
    }
}
