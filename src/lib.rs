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


//! # Wallet Transfer
//!
//! This library executes buyer-to-seller money transfers against a wallet
//! service. Each transfer runs at most once, expires after a fixed window, and
//! may be executed concurrently from many threads.
//!
//! ## Core Components
//!
//! - [`Transaction`]: A single transfer and its execution state machine
//! - [`WalletRpc`]: The money-movement capability a transaction calls
//! - [`InMemoryWallet`]: Working wallet with integer balances per user
//! - [`Engine`]: Registry that deduplicates transfers by id
//! - [`TransactionError`]: Error types for malformed or conflicting transfers
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use wallet_transfer::{Engine, InMemoryWallet, TransactionStatus, TransferRequest, UserId};
//!
//! let wallet = Arc::new(InMemoryWallet::new());
//! wallet.deposit(UserId::from("b1"), 100).unwrap();
//!
//! let engine = Engine::new(wallet.clone());
//! let request = TransferRequest {
//!     id: "order-1".to_string(),
//!     buyer_id: UserId::from("b1"),
//!     seller_id: UserId::from("s1"),
//!     product_id: "p1".to_string(),
//!     order_id: "o1".to_string(),
//!     amount: 40,
//! };
//!
//! // Delivering the same request twice moves the money once.
//! assert_eq!(engine.process(request.clone()), Ok(true));
//! assert_eq!(engine.process(request), Ok(true));
//!
//! assert_eq!(wallet.balance(&UserId::from("b1")), Some(60));
//! assert_eq!(wallet.balance(&UserId::from("s1")), Some(40));
//! ```
//!
//! ## Outcomes
//!
//! [`Transaction::execute`] returns `Err` only for malformed transactions.
//! Expiry and wallet refusals are `Ok(false)`: callers must check the boolean.

mod base;
pub mod config;
mod engine;
pub mod error;
mod transaction;
mod transaction_queue;
pub mod wallet;

pub use base::{TransactionId, UserId};
pub use config::Config;
pub use engine::Engine;
pub use error::{ConfigError, TransactionError};
pub use transaction::{Transaction, TransactionStatus, TransferRequest};
pub use transaction_queue::TransactionQueue;
pub use wallet::{InMemoryWallet, StaticWallet, WalletRpc};
