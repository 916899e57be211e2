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


//! Error types for transfer processing and configuration.
//!
//! Expiry and wallet rejections are not errors: [`crate::Transaction::execute`]
//! reports them as `Ok(false)`.

use thiserror::Error;

/// Transaction processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// Transaction id or seller is empty, or the amount is negative
    #[error("invalid transaction")]
    InvalidTransaction,

    /// Amount is negative
    #[error("invalid amount (must not be negative)")]
    InvalidAmount,

    /// Transaction id was already submitted with different details
    #[error("transaction ID already submitted with different details")]
    ConflictingTransaction,
}

/// Configuration loading errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, TransactionError};

    #[test]
    fn error_display_messages() {
        assert_eq!(
            TransactionError::InvalidTransaction.to_string(),
            "invalid transaction"
        );
        assert_eq!(
            TransactionError::InvalidAmount.to_string(),
            "invalid amount (must not be negative)"
        );
        assert_eq!(
            TransactionError::ConflictingTransaction.to_string(),
            "transaction ID already submitted with different details"
        );
        assert_eq!(
            ConfigError::InvalidValue {
                key: "TRANSFER_EXPIRY_DAYS",
                value: "abc".to_string(),
            }
            .to_string(),
            "invalid value \"abc\" for TRANSFER_EXPIRY_DAYS"
        );
    }

    #[test]
    fn errors_are_cloneable() {
        let error = TransactionError::InvalidTransaction;
        let cloned = error.clone();
        assert_eq!(error, cloned);
    }
}
