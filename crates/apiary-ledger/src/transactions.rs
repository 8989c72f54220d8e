//! The transaction lifecycle manager: escrowed withdrawals, declared
//! deposits, and the pending -> approved/rejected state machine.
//!
//! # Escrow semantics
//!
//! A withdrawal debits the requested amount the moment it is created, so
//! the funds cannot be spent twice while an administrator reviews it.
//! Approval changes no balance (the escrow leaves the ledger for good);
//! rejection credits the exact escrowed amount back, always in the same
//! currency that was debited. Deposits are the mirror image: creation
//! changes no balance, approval credits the declared amount minus the
//! flat fee, rejection only clears the pending gate.
//!
//! Terminal transactions are immutable; a second transition attempt is
//! an error, never a silent no-op.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::info;

use apiary_types::{
    Currency, NewDeposit, NewWithdrawal, PlayerId, RequestToken, Transaction, TransactionEvent,
    TransactionId, TransactionKind, TransactionStatus,
};

use apiary_economy::{conversion, EconomyConfig};

use crate::error::LedgerError;
use crate::store::LedgerStore;

/// Capacity of the broadcast channel for transaction events.
///
/// A subscriber that falls behind by more than this many messages
/// receives a lagged error and skips to the newest event.
const EVENT_CAPACITY: usize = 256;

/// Creates, approves, and rejects transactions against the ledger store.
#[derive(Debug)]
pub struct TransactionManager {
    store: Arc<LedgerStore>,
    config: Arc<EconomyConfig>,
    transactions: RwLock<BTreeMap<TransactionId, Transaction>>,
    events: broadcast::Sender<TransactionEvent>,
}

impl TransactionManager {
    /// Create a manager over the given store and economy rules.
    pub fn new(store: Arc<LedgerStore>, config: Arc<EconomyConfig>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            config,
            transactions: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    /// Subscribe to transaction lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<TransactionEvent> {
        self.events.subscribe()
    }

    /// Create a pending withdrawal, escrowing the requested amount.
    ///
    /// The debit and the insertion of the pending record happen before
    /// the call returns; if the debit fails, no transaction exists.
    ///
    /// # Errors
    ///
    /// Returns the pricing error (empty address, below rail minimum),
    /// [`apiary_economy::EconomyError::InsufficientBalance`] if the
    /// escrow cannot be covered, [`LedgerError::DuplicateRequest`] on a
    /// replayed token, or [`LedgerError::PlayerNotFound`].
    pub async fn create_withdrawal(
        &self,
        player: PlayerId,
        token: RequestToken,
        request: NewWithdrawal,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let quote =
            conversion::quote_withdrawal(request.currency, request.amount, &request.address, &self.config)?;

        let escrow_currency = request.currency.escrow_currency();
        self.store
            .mutate(player, token, |rec| {
                apiary_economy::balances::debit(&mut rec.ledger, escrow_currency, request.amount)?;
                Ok(())
            })
            .await?;

        let transaction = Transaction {
            id: TransactionId::new(),
            player,
            kind: TransactionKind::Withdrawal {
                currency: request.currency,
                address: request.address,
            },
            requested: request.amount,
            converted: quote.converted,
            fee: quote.fee,
            net: quote.net,
            status: TransactionStatus::Pending,
            created_at: now,
            processed_at: None,
        };

        let mut transactions = self.transactions.write().await;
        transactions.insert(transaction.id, transaction.clone());
        drop(transactions);

        info!(
            transaction = %transaction.id,
            player = %player,
            currency = ?request.currency,
            requested = %transaction.requested,
            "withdrawal created, escrow debited"
        );
        let _ = self.events.send(TransactionEvent::Created {
            transaction: transaction.clone(),
        });
        Ok(transaction)
    }

    /// Declare an external deposit. No balance changes until approval;
    /// the player's funds-pending gate is raised so only one declaration
    /// can be in flight.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DepositPending`] if a declaration is
    /// already pending, the pricing error if the declared amount does
    /// not clear the flat fee, [`LedgerError::DuplicateRequest`] on a
    /// replayed token, or [`LedgerError::PlayerNotFound`].
    pub async fn declare_deposit(
        &self,
        player: PlayerId,
        token: RequestToken,
        request: NewDeposit,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let net = conversion::deposit_credit(request.amount, &self.config)?;

        self.store
            .mutate(player, token, |rec| {
                if rec.ledger.funds_pending {
                    return Err(LedgerError::DepositPending);
                }
                rec.ledger.funds_pending = true;
                Ok(())
            })
            .await?;

        let fee = self.config.withdrawal.deposit_flat_fee;
        let transaction = Transaction {
            id: TransactionId::new(),
            player,
            kind: TransactionKind::Deposit {
                reference: request.reference,
            },
            requested: request.amount,
            converted: request.amount,
            fee,
            net,
            status: TransactionStatus::Pending,
            created_at: now,
            processed_at: None,
        };

        let mut transactions = self.transactions.write().await;
        transactions.insert(transaction.id, transaction.clone());
        drop(transactions);

        info!(
            transaction = %transaction.id,
            player = %player,
            declared = %transaction.requested,
            "deposit declared, awaiting review"
        );
        let _ = self.events.send(TransactionEvent::Created {
            transaction: transaction.clone(),
        });
        Ok(transaction)
    }

    /// Approve a pending transaction.
    ///
    /// Withdrawals: the escrow becomes a permanent debit, no balance
    /// change. Deposits: the net declared amount is credited and the
    /// funds-pending gate cleared.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TransactionNotFound`] for unknown IDs and
    /// [`LedgerError::InvalidState`] if the transaction is terminal.
    pub async fn approve(
        &self,
        id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .get_mut(&id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        if transaction.status.is_terminal() {
            return Err(LedgerError::InvalidState {
                id,
                status: transaction.status,
            });
        }

        if let TransactionKind::Deposit { .. } = transaction.kind {
            let net = transaction.net;
            self.store
                .update(transaction.player, |rec| {
                    apiary_economy::balances::credit(&mut rec.ledger, Currency::Flowers, net)?;
                    rec.ledger.funds_pending = false;
                    Ok(())
                })
                .await?;
        }

        transaction.status = TransactionStatus::Approved;
        transaction.processed_at = Some(now);
        let approved = transaction.clone();
        drop(transactions);

        info!(transaction = %id, "transaction approved");
        let _ = self.events.send(TransactionEvent::Approved {
            transaction: approved.clone(),
        });
        Ok(approved)
    }

    /// Reject a pending transaction.
    ///
    /// Withdrawals: the exact escrowed amount is credited back in the
    /// currency that was debited. Deposits: nothing was escrowed, so
    /// only the funds-pending gate is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TransactionNotFound`] for unknown IDs and
    /// [`LedgerError::InvalidState`] if the transaction is terminal.
    pub async fn reject(
        &self,
        id: TransactionId,
        now: DateTime<Utc>,
    ) -> Result<Transaction, LedgerError> {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .get_mut(&id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        if transaction.status.is_terminal() {
            return Err(LedgerError::InvalidState {
                id,
                status: transaction.status,
            });
        }

        match &transaction.kind {
            TransactionKind::Withdrawal { currency, .. } => {
                let refund_currency = currency.escrow_currency();
                let refund = transaction.requested;
                self.store
                    .update(transaction.player, |rec| {
                        apiary_economy::balances::credit(&mut rec.ledger, refund_currency, refund)?;
                        Ok(())
                    })
                    .await?;
            }
            TransactionKind::Deposit { .. } => {
                self.store
                    .update(transaction.player, |rec| {
                        rec.ledger.funds_pending = false;
                        Ok(())
                    })
                    .await?;
            }
        }

        transaction.status = TransactionStatus::Rejected;
        transaction.processed_at = Some(now);
        let rejected = transaction.clone();
        drop(transactions);

        info!(transaction = %id, "transaction rejected, escrow refunded");
        let _ = self.events.send(TransactionEvent::Rejected {
            transaction: rejected.clone(),
        });
        Ok(rejected)
    }

    /// All transactions still awaiting review, oldest first.
    pub async fn pending(&self) -> Vec<Transaction> {
        let transactions = self.transactions.read().await;
        let mut pending: Vec<Transaction> = transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|t| t.created_at);
        pending
    }

    /// All transactions belonging to `player`, newest first.
    pub async fn for_player(&self, player: PlayerId) -> Vec<Transaction> {
        let transactions = self.transactions.read().await;
        let mut list: Vec<Transaction> = transactions
            .values()
            .filter(|t| t.player == player)
            .cloned()
            .collect();
        list.sort_by_key(|t| std::cmp::Reverse(t.created_at));
        list
    }

    /// Look up a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::TransactionNotFound`] for unknown IDs.
    pub async fn get(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        let transactions = self.transactions.read().await;
        transactions
            .get(&id)
            .cloned()
            .ok_or(LedgerError::TransactionNotFound(id))
    }
}
