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


//! Money-movement capability.
//!
//! A [`Transaction`](crate::Transaction) never moves money itself: it calls an
//! injected [`WalletRpc`]. This module provides the trait, a working
//! in-memory wallet, and a deterministic double for tests.

use crate::TransactionError;
use crate::base::{TransactionId, UserId};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Moves money between two wallet users.
pub trait WalletRpc: Send + Sync {
    /// Transfers `amount` from `buyer_id` to `seller_id` on behalf of
    /// `transaction_id`.
    ///
    /// Returns the wallet-side reference of the move, or `None` when the move
    /// was refused. An empty reference is treated as a refusal by callers.
    fn move_money(
        &self,
        transaction_id: &TransactionId,
        buyer_id: &UserId,
        seller_id: &UserId,
        amount: i64,
    ) -> Option<String>;
}

/// Wallet that answers every move with the same outcome.
#[derive(Debug, Clone)]
pub struct StaticWallet {
    reference: Option<String>,
}

impl StaticWallet {
    /// Accepts every move and returns `reference`.
    pub fn succeeding(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
        }
    }

    /// Refuses every move.
    pub fn failing() -> Self {
        Self { reference: None }
    }
}

impl WalletRpc for StaticWallet {
    fn move_money(
        &self,
        _transaction_id: &TransactionId,
        _buyer_id: &UserId,
        _seller_id: &UserId,
        _amount: i64,
    ) -> Option<String> {
        self.reference.clone()
    }
}

/// In-memory wallet holding integer balances per user.
///
/// Moves are deduplicated by transaction id: asking twice for the same
/// transaction returns the first reference and moves nothing.
///
/// # Locking
///
/// Balances live behind one [`Mutex`] per user. A move locks the two
/// balances in [`UserId`] order, so opposite transfers between the same pair
/// of users cannot deadlock.
#[derive(Debug, Default)]
pub struct InMemoryWallet {
    accounts: DashMap<UserId, Arc<Mutex<i64>>>,
    /// Wallet references of completed moves, by transaction id.
    moves: DashMap<TransactionId, String>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` to `user_id`, opening the account if needed.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::InvalidAmount`] if `amount` is negative or
    /// the balance would overflow.
    pub fn deposit(&self, user_id: UserId, amount: i64) -> Result<(), TransactionError> {
        if amount < 0 {
            return Err(TransactionError::InvalidAmount);
        }
        let account = self.open_account(user_id);
        let mut balance = account.lock();
        *balance = balance
            .checked_add(amount)
            .ok_or(TransactionError::InvalidAmount)?;
        Ok(())
    }

    /// Returns the balance of `user_id`, or `None` if no account exists.
    pub fn balance(&self, user_id: &UserId) -> Option<i64> {
        self.account(user_id).map(|account| *account.lock())
    }

    /// Returns the wallet reference recorded for `transaction_id`, if any.
    pub fn reference(&self, transaction_id: &TransactionId) -> Option<String> {
        self.moves.get(transaction_id).map(|r| r.value().clone())
    }

    fn account(&self, user_id: &UserId) -> Option<Arc<Mutex<i64>>> {
        self.accounts.get(user_id).map(|r| Arc::clone(r.value()))
    }

    fn open_account(&self, user_id: UserId) -> Arc<Mutex<i64>> {
        Arc::clone(
            self.accounts
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(0)))
                .value(),
        )
    }

    /// Debits the buyer and credits the seller. Returns `false` if nothing moved.
    fn transfer(&self, buyer_id: &UserId, seller_id: &UserId, amount: i64) -> bool {
        let Some(from) = self.account(buyer_id) else {
            warn!("unknown buyer {}", buyer_id);
            return false;
        };

        if buyer_id == seller_id {
            return *from.lock() >= amount;
        }

        let to = self.open_account(seller_id.clone());
        let (mut from_balance, mut to_balance) = if buyer_id < seller_id {
            let from_balance = from.lock();
            let to_balance = to.lock();
            (from_balance, to_balance)
        } else {
            let to_balance = to.lock();
            let from_balance = from.lock();
            (from_balance, to_balance)
        };

        if *from_balance < amount {
            warn!(
                "insufficient funds for {}: balance {}, amount {}",
                buyer_id, *from_balance, amount
            );
            return false;
        }
        let Some(credited) = to_balance.checked_add(amount) else {
            warn!("balance overflow for {}", seller_id);
            return false;
        };

        *from_balance -= amount;
        *to_balance = credited;
        true
    }
}

impl WalletRpc for InMemoryWallet {
    fn move_money(
        &self,
        transaction_id: &TransactionId,
        buyer_id: &UserId,
        seller_id: &UserId,
        amount: i64,
    ) -> Option<String> {
        if amount < 0 {
            warn!("refusing negative move for {}", transaction_id);
            return None;
        }

        // The entry guard serializes moves for the same transaction id.
        match self.moves.entry(transaction_id.clone()) {
            Entry::Occupied(entry) => {
                debug!("{} already moved as {}", transaction_id, entry.get());
                Some(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                if !self.transfer(buyer_id, seller_id, amount) {
                    return None;
                }
                let reference = format!("w_{}", Uuid::new_v4().simple());
                debug!(
                    "{} moved {} from {} to {} as {}",
                    transaction_id, amount, buyer_id, seller_id, reference
                );
                entry.insert(reference.clone());
                Some(reference)
            }
        }
    }
}
