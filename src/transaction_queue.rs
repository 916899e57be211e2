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


//! Thread-safe transaction registry with deduplication.
//!
//! Keeps every submitted transaction reachable by id while remembering
//! submission order.

use crate::base::TransactionId;
use crate::transaction::Transaction;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

/// A thread-safe transaction registry with duplicate detection.
///
/// Combines a [`DashMap`] for O(1) lookup by id with a [`SegQueue`]
/// to preserve insertion order.
#[derive(Debug, Default)]
pub struct TransactionQueue {
    transactions: DashMap<TransactionId, Arc<Transaction>>,

    /// Queue of transaction IDs maintaining FIFO order.
    transaction_ids: SegQueue<TransactionId>,
}

impl TransactionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the transaction registered under `id`, registering the one
    /// built by `make` if there is none.
    ///
    /// The boolean is `true` when `make` was called.
    pub fn get_or_insert_with<F>(&self, id: TransactionId, make: F) -> (Arc<Transaction>, bool)
    where
        F: FnOnce() -> Transaction,
    {
        // Entry API makes check-and-insert atomic for concurrent submitters
        match self.transactions.entry(id) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let id = entry.key().clone();
                let transaction = Arc::clone(entry.insert(Arc::new(make())).value());
                self.transaction_ids.push(id);
                (transaction, true)
            }
        }
    }

    pub fn get(&self, id: &TransactionId) -> Option<Arc<Transaction>> {
        self.transactions.get(id).map(|r| Arc::clone(r.value()))
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Removes and returns all transactions in insertion order.
    pub fn drain(&self) -> Vec<Arc<Transaction>> {
        let mut drained = Vec::with_capacity(self.transaction_ids.len());
        while let Some(id) = self.transaction_ids.pop() {
            if let Some((_, transaction)) = self.transactions.remove(&id) {
                drained.push(transaction);
            }
        }
        drained
    }
}
