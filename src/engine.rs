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


//! Transfer processing engine.
//!
//! The [`Engine`] owns the wallet handle and a registry of transactions keyed
//! by id. Re-delivering a request with the same id reaches the same
//! [`Transaction`], so the money moves at most once however often the request
//! arrives.
//!
//! # Thread Safety
//!
//! The registry uses [`DashMap`](dashmap::DashMap), and each transaction
//! carries its own lock. Unrelated transactions execute fully in parallel.

use crate::base::TransactionId;
use crate::config::Config;
use crate::transaction::{Transaction, TransferRequest};
use crate::wallet::WalletRpc;
use crate::{TransactionError, TransactionQueue};
use chrono::TimeDelta;
use log::{debug, warn};
use std::sync::Arc;

/// Registry and executor of transfer transactions.
///
/// # Invariants
///
/// - At most one [`Transaction`] exists per normalized id.
/// - A request reusing an id with different details is rejected.
pub struct Engine {
    wallet: Arc<dyn WalletRpc>,
    expiry: TimeDelta,
    transactions: TransactionQueue,
}

impl Engine {
    /// Creates an engine with the default 14-day expiry window.
    pub fn new(wallet: Arc<dyn WalletRpc>) -> Self {
        Self::with_config(wallet, &Config::default())
    }

    pub fn with_config(wallet: Arc<dyn WalletRpc>, config: &Config) -> Self {
        Engine {
            wallet,
            expiry: config.expiry(),
            transactions: TransactionQueue::new(),
        }
    }

    /// Registers the transaction described by `request`.
    ///
    /// A request whose id is already registered returns the existing
    /// transaction when the details match.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::ConflictingTransaction`] - Id already registered with different details.
    pub fn submit(&self, request: TransferRequest) -> Result<Arc<Transaction>, TransactionError> {
        let id = TransactionId::normalize(&request.id);

        let (transaction, inserted) = self.transactions.get_or_insert_with(id.clone(), || {
            Transaction::new(
                id.as_str(),
                request.buyer_id.clone(),
                request.seller_id.clone(),
                request.product_id.clone(),
                request.order_id.clone(),
                request.amount,
                Arc::clone(&self.wallet),
            )
            .with_expiry(self.expiry)
        });

        if inserted {
            debug!("registered {}", transaction.id());
        } else if !transaction.matches(&request) {
            warn!("{} resubmitted with different details", transaction.id());
            return Err(TransactionError::ConflictingTransaction);
        } else {
            debug!("{} delivered again", transaction.id());
        }

        Ok(transaction)
    }

    /// Submits `request` and executes the resulting transaction.
    ///
    /// Returns the outcome of [`Transaction::execute`].
    ///
    /// # Errors
    ///
    /// - [`TransactionError::ConflictingTransaction`] - Id already registered with different details.
    /// - [`TransactionError::InvalidTransaction`] - Empty seller or negative amount.
    pub fn process(&self, request: TransferRequest) -> Result<bool, TransactionError> {
        self.submit(request)?.execute()
    }

    pub fn get(&self, id: &TransactionId) -> Option<Arc<Transaction>> {
        self.transactions.get(id)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Removes and returns every registered transaction in submission order.
    pub fn drain(&self) -> Vec<Arc<Transaction>> {
        self.transactions.drain()
    }
}
