// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Transfer transactions.
//!
//! A [`Transaction`] moves money from a buyer to a seller at most once:
//!
//! ```text
//! Initial ──valid, wallet accepts──► Executed (idempotent)
//!    │
//!    ├──older than the expiry window──► Expired
//!    ├──valid, wallet refuses──► Failed
//!    └──invalid fields──► Initial (error returned)
//! ```
//!
//! `Expired` and `Failed` are not retried automatically, but calling
//! [`Transaction::execute`] again re-runs the expiry check and the wallet call.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use wallet_transfer::{StaticWallet, Transaction, TransactionStatus, UserId};
//!
//! let tx = Transaction::new(
//!     "",
//!     UserId::from("b1"),
//!     UserId::from("s1"),
//!     "p1",
//!     "o1",
//!     100,
//!     Arc::new(StaticWallet::succeeding("tx-abc123")),
//! );
//!
//! assert_eq!(tx.execute(), Ok(true));
//! assert_eq!(tx.status(), TransactionStatus::Executed);
//! assert_eq!(tx.wallet_transaction_id().as_deref(), Some("tx-abc123"));
//! assert!(tx.id().as_str().starts_with("t_"));
//! ```

use crate::TransactionError;
use crate::base::{TransactionId, UserId};
use crate::wallet::WalletRpc;
use chrono::{DateTime, TimeDelta, Utc};
use log::debug;
use parking_lot::Mutex;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Initial,
    Executed,
    Expired,
    Failed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "initial",
            Self::Executed => "executed",
            Self::Expired => "expired",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Plain-data description of a transfer, before it becomes a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Caller-supplied id; may be empty.
    pub id: String,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub product_id: String,
    pub order_id: String,
    pub amount: i64,
}

#[derive(Debug)]
struct ExecutionState {
    status: TransactionStatus,
    wallet_transaction_id: Option<String>,
}

/// A money transfer executed at most once through a [`WalletRpc`].
///
/// `execute` takes `&self`, so one transaction can be shared through an
/// [`Arc`] and executed from many threads.
///
/// # Invariants
///
/// - Once `Executed`, the status never changes and the wallet reference is set.
/// - The wallet is called at most once per successful execution.
/// - Status and wallet reference only change while `state` is locked.
pub struct Transaction {
    id: TransactionId,
    buyer_id: UserId,
    seller_id: UserId,
    product_id: String,
    order_id: String,
    amount: i64,
    created_at: DateTime<Utc>,
    expiry: TimeDelta,
    wallet: Arc<dyn WalletRpc>,
    /// Mirrors `state.status == Executed` for the lock-free fast path.
    executed: AtomicBool,
    state: Mutex<ExecutionState>,
}

impl Transaction {
    pub const DEFAULT_EXPIRY_DAYS: i64 = 14;

    /// Creates a transaction in the `Initial` state, created now.
    ///
    /// `id` is normalized with [`TransactionId::normalize`].
    pub fn new(
        id: &str,
        buyer_id: UserId,
        seller_id: UserId,
        product_id: impl Into<String>,
        order_id: impl Into<String>,
        amount: i64,
        wallet: Arc<dyn WalletRpc>,
    ) -> Self {
        Self {
            id: TransactionId::normalize(id),
            buyer_id,
            seller_id,
            product_id: product_id.into(),
            order_id: order_id.into(),
            amount,
            created_at: Utc::now(),
            expiry: TimeDelta::days(Self::DEFAULT_EXPIRY_DAYS),
            wallet,
            executed: AtomicBool::new(false),
            state: Mutex::new(ExecutionState {
                status: TransactionStatus::Initial,
                wallet_transaction_id: None,
            }),
        }
    }

    pub fn from_request(request: TransferRequest, wallet: Arc<dyn WalletRpc>) -> Self {
        Self::new(
            &request.id,
            request.buyer_id,
            request.seller_id,
            request.product_id,
            request.order_id,
            request.amount,
            wallet,
        )
    }

    /// Overrides the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Overrides the expiry window (14 days by default).
    pub fn with_expiry(mut self, expiry: TimeDelta) -> Self {
        self.expiry = expiry;
        self
    }

    /// Executes the transfer.
    ///
    /// Returns `Ok(true)` once the wallet has accepted the move, including on
    /// every call after the first success. Returns `Ok(false)` when the
    /// transaction has expired or the wallet refused the move; neither is an
    /// error, so callers must branch on the boolean.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::InvalidTransaction`] if the id or seller is
    /// empty or the amount is negative. The status is left untouched.
    pub fn execute(&self) -> Result<bool, TransactionError> {
        if self.id.is_empty() || self.seller_id.is_empty() || self.amount < 0 {
            return Err(TransactionError::InvalidTransaction);
        }

        if self.executed.load(Ordering::Acquire) {
            return Ok(true);
        }

        let mut state = self.state.lock();

        // Another caller may have executed while we waited for the lock.
        if state.status == TransactionStatus::Executed {
            return Ok(true);
        }

        if self.is_expired() {
            debug!("{} expired (created at {})", self.id, self.created_at);
            state.status = TransactionStatus::Expired;
            return Ok(false);
        }

        let reference = self
            .wallet
            .move_money(&self.id, &self.buyer_id, &self.seller_id, self.amount)
            .filter(|reference| !reference.is_empty());

        match reference {
            Some(reference) => {
                debug!("{} executed as {}", self.id, reference);
                state.wallet_transaction_id = Some(reference);
                state.status = TransactionStatus::Executed;
                self.executed.store(true, Ordering::Release);
                Ok(true)
            }
            None => {
                debug!("{} refused by wallet", self.id);
                state.status = TransactionStatus::Failed;
                Ok(false)
            }
        }
    }

    /// Returns `true` once the expiry window since creation has elapsed.
    pub fn is_expired(&self) -> bool {
        self.created_at
            .checked_add_signed(self.expiry)
            .is_some_and(|deadline| Utc::now() > deadline)
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn buyer_id(&self) -> &UserId {
        &self.buyer_id
    }

    pub fn seller_id(&self) -> &UserId {
        &self.seller_id
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> TransactionStatus {
        self.state.lock().status
    }

    pub fn wallet_transaction_id(&self) -> Option<String> {
        self.state.lock().wallet_transaction_id.clone()
    }

    /// Returns `true` if `request` describes the same transfer as `self`.
    ///
    /// Only the transfer details are compared; the id is assumed to match.
    pub(crate) fn matches(&self, request: &TransferRequest) -> bool {
        self.buyer_id == request.buyer_id
            && self.seller_id == request.seller_id
            && self.product_id == request.product_id
            && self.order_id == request.order_id
            && self.amount == request.amount
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("buyer_id", &self.buyer_id)
            .field("seller_id", &self.seller_id)
            .field("product_id", &self.product_id)
            .field("order_id", &self.order_id)
            .field("amount", &self.amount)
            .field("created_at", &self.created_at)
            .field("status", &state.status)
            .field("wallet_transaction_id", &state.wallet_transaction_id)
            .finish_non_exhaustive()
    }
}

impl Serialize for Transaction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let state = self.state.lock();
        let mut out = serializer.serialize_struct("Transaction", 6)?;
        out.serialize_field("tx", &self.id)?;
        out.serialize_field("buyer", &self.buyer_id)?;
        out.serialize_field("seller", &self.seller_id)?;
        out.serialize_field("amount", &self.amount)?;
        out.serialize_field("status", &state.status)?;
        out.serialize_field("wallet_tx", &state.wallet_transaction_id)?;
        out.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::StaticWallet;
    use std::sync::atomic::AtomicUsize;

    /// Counts calls and fails the first `failures` of them.
    #[derive(Default)]
    struct FlakyWallet {
        calls: AtomicUsize,
        failures: usize,
    }

    impl WalletRpc for FlakyWallet {
        fn move_money(
            &self,
            _transaction_id: &TransactionId,
            _buyer_id: &UserId,
            _seller_id: &UserId,
            _amount: i64,
        ) -> Option<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            (call >= self.failures).then(|| format!("w_{}", call))
        }
    }

    fn make_transaction(
        id: &str,
        seller: &str,
        amount: i64,
        wallet: Arc<dyn WalletRpc>,
    ) -> Transaction {
        Transaction::new(
            id,
            UserId::from("222"),
            UserId::from(seller),
            "444",
            "555",
            amount,
            wallet,
        )
    }

    fn succeeding() -> Arc<dyn WalletRpc> {
        Arc::new(StaticWallet::succeeding("123abc"))
    }

    #[test]
    fn new_transaction_starts_initial() {
        let tx = make_transaction("111", "333", 666, succeeding());
        assert_eq!(tx.id().as_str(), "t_111");
        assert_eq!(tx.status(), TransactionStatus::Initial);
        assert_eq!(tx.wallet_transaction_id(), None);
        assert!(!tx.is_expired());
    }

    #[test]
    fn empty_id_is_rejected_without_state_change() {
        let mut tx = make_transaction("111", "333", 666, succeeding());
        tx.id = TransactionId(String::new());

        assert_eq!(tx.execute(), Err(TransactionError::InvalidTransaction));
        assert_eq!(tx.status(), TransactionStatus::Initial);
    }

    #[test]
    fn empty_seller_is_rejected() {
        let tx = make_transaction("111", "", 666, succeeding());
        assert_eq!(tx.execute(), Err(TransactionError::InvalidTransaction));
        assert_eq!(tx.status(), TransactionStatus::Initial);
    }

    #[test]
    fn negative_amount_is_rejected() {
        let tx = make_transaction("111", "333", -1, succeeding());
        assert_eq!(tx.execute(), Err(TransactionError::InvalidTransaction));
        assert_eq!(tx.status(), TransactionStatus::Initial);
    }

    #[test]
    fn zero_amount_is_valid() {
        let tx = make_transaction("111", "333", 0, succeeding());
        assert_eq!(tx.execute(), Ok(true));
    }

    #[test]
    fn already_executed_short_circuits() {
        let wallet = Arc::new(FlakyWallet::default());
        let tx = make_transaction("111", "333", 666, wallet.clone());
        {
            let mut state = tx.state.lock();
            state.status = TransactionStatus::Executed;
            state.wallet_transaction_id = Some("777".to_string());
        }

        // Fast-path flag is unset, so this exercises the locked re-check.
        assert_eq!(tx.execute(), Ok(true));
        assert_eq!(wallet.calls.load(Ordering::SeqCst), 0);
        assert_eq!(tx.wallet_transaction_id().as_deref(), Some("777"));
    }

    #[test]
    fn failed_transaction_retries_wallet_on_next_call() {
        let wallet = Arc::new(FlakyWallet {
            calls: AtomicUsize::new(0),
            failures: 1,
        });
        let tx = make_transaction("111", "333", 666, wallet.clone());

        assert_eq!(tx.execute(), Ok(false));
        assert_eq!(tx.status(), TransactionStatus::Failed);

        assert_eq!(tx.execute(), Ok(true));
        assert_eq!(tx.status(), TransactionStatus::Executed);
        assert_eq!(tx.wallet_transaction_id().as_deref(), Some("w_1"));
        assert_eq!(wallet.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_reference_counts_as_failure() {
        let tx = make_transaction("111", "333", 666, Arc::new(StaticWallet::succeeding("")));
        assert_eq!(tx.execute(), Ok(false));
        assert_eq!(tx.status(), TransactionStatus::Failed);
        assert_eq!(tx.wallet_transaction_id(), None);
    }

    #[test]
    fn custom_expiry_window() {
        let tx = make_transaction("111", "333", 666, succeeding())
            .with_created_at(Utc::now() - TimeDelta::hours(2))
            .with_expiry(TimeDelta::hours(1));
        assert!(tx.is_expired());
        assert_eq!(tx.execute(), Ok(false));
        assert_eq!(tx.status(), TransactionStatus::Expired);
    }

    #[test]
    fn expired_transaction_stays_expired() {
        let wallet = Arc::new(FlakyWallet::default());
        let tx = make_transaction("111", "333", 666, wallet.clone())
            .with_created_at(Utc::now() - TimeDelta::days(15));

        assert_eq!(tx.execute(), Ok(false));
        assert_eq!(tx.execute(), Ok(false));
        assert_eq!(tx.status(), TransactionStatus::Expired);
        assert_eq!(wallet.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn matches_compares_transfer_details() {
        let tx = make_transaction("111", "333", 666, succeeding());
        let mut request = TransferRequest {
            id: "111".to_string(),
            buyer_id: UserId::from("222"),
            seller_id: UserId::from("333"),
            product_id: "444".to_string(),
            order_id: "555".to_string(),
            amount: 666,
        };
        assert!(tx.matches(&request));

        request.amount = 1;
        assert!(!tx.matches(&request));
    }

    #[test]
    fn status_display() {
        assert_eq!(TransactionStatus::Initial.to_string(), "initial");
        assert_eq!(TransactionStatus::Executed.to_string(), "executed");
        assert_eq!(TransactionStatus::Expired.to_string(), "expired");
        assert_eq!(TransactionStatus::Failed.to_string(), "failed");
    }
}
