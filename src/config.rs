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


//! Runtime configuration.

use crate::error::ConfigError;
use crate::transaction::Transaction;
use chrono::TimeDelta;
use std::env;

/// Settings read from the environment (and an optional `.env` file).
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | `TRANSFER_EXPIRY_DAYS` | `14` | Days before an unexecuted transaction expires |
///
/// Fields are only set through validating constructors, so a `Config` always
/// holds a positive expiry window that fits in a [`TimeDelta`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    expiry_days: i64,
}

impl Config {
    const EXPIRY_DAYS_KEY: &'static str = "TRANSFER_EXPIRY_DAYS";

    /// Loads `.env` if present, then reads the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set but cannot
    /// be parsed or is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config with an explicit expiry window.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `days` is not positive or
    /// does not fit in a [`TimeDelta`].
    pub fn with_expiry_days(days: i64) -> Result<Self, ConfigError> {
        let expiry_days = validate_expiry_days(days, || days.to_string())?;
        Ok(Self { expiry_days })
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expiry_days = match lookup(Self::EXPIRY_DAYS_KEY) {
            Some(raw) => parse_expiry_days(&raw)?,
            None => Transaction::DEFAULT_EXPIRY_DAYS,
        };
        Ok(Self { expiry_days })
    }

    pub fn expiry_days(&self) -> i64 {
        self.expiry_days
    }

    pub fn expiry(&self) -> TimeDelta {
        TimeDelta::days(self.expiry_days)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            expiry_days: Transaction::DEFAULT_EXPIRY_DAYS,
        }
    }
}

fn parse_expiry_days(raw: &str) -> Result<i64, ConfigError> {
    let days: i64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: Config::EXPIRY_DAYS_KEY,
        value: raw.to_string(),
    })?;
    validate_expiry_days(days, || raw.to_string())
}

fn validate_expiry_days<F>(days: i64, value: F) -> Result<i64, ConfigError>
where
    F: FnOnce() -> String,
{
    // Upper bound keeps `TimeDelta::days` in range.
    if days <= 0 || TimeDelta::try_days(days).is_none() {
        return Err(ConfigError::InvalidValue {
            key: Config::EXPIRY_DAYS_KEY,
            value: value(),
        });
    }
    Ok(days)
}
