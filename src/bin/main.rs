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


use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use log::{debug, info, warn};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use wallet_transfer::{Config, Engine, InMemoryWallet, TransferRequest, UserId};

/// Wallet Transfer - Execute transfer CSV files
///
/// Funds an in-memory wallet, executes each transfer at most once, and writes
/// the final state of every transaction to stdout.
#[derive(Parser, Debug)]
#[command(name = "wallet-transfer")]
#[command(about = "Executes idempotent buyer-to-seller transfers from a CSV", long_about = None)]
struct Args {
    /// Path to CSV file with opening balances
    ///
    /// Expected format: user,balance
    #[arg(long, value_name = "FILE")]
    accounts: Option<PathBuf>,

    /// Path to CSV file with transfers
    ///
    /// Expected format: tx,buyer,seller,product,order,amount
    /// Example: cargo run -- --accounts accounts.csv transfers.csv > report.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error reading configuration: {}", e);
            process::exit(1);
        }
    };
    info!("expiry window: {} days", config.expiry_days());

    let wallet = Arc::new(InMemoryWallet::new());
    if let Some(path) = &args.accounts {
        let result = open(path).and_then(|file| load_accounts(&wallet, BufReader::new(file)));
        if let Err(e) = result {
            eprintln!("Error loading accounts '{}': {}", path.display(), e);
            process::exit(1);
        }
    }

    let engine = Engine::with_config(wallet, &config);
    let result = open(&args.input)
        .and_then(|file| process_transfers(&engine, BufReader::new(file)));
    if let Err(e) = result {
        eprintln!("Error processing transfers '{}': {}", args.input.display(), e);
        process::exit(1);
    }

    if let Err(e) = write_report(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn open(path: &Path) -> Result<File, csv::Error> {
    File::open(path).map_err(csv::Error::from)
}

fn reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader)
}

/// Raw CSV record of an opening balance.
#[derive(Debug, Deserialize)]
struct AccountRecord {
    user: String,
    balance: i64,
}

/// Raw CSV record of a transfer.
///
/// Fields: `tx, buyer, seller, product, order, amount`
#[derive(Debug, Deserialize)]
struct TransferRecord {
    #[serde(default)]
    tx: String,
    buyer: String,
    seller: String,
    #[serde(default)]
    product: String,
    #[serde(default)]
    order: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    amount: Option<i64>,
}

impl TransferRecord {
    /// Returns `None` when the amount is missing or unparseable.
    fn into_request(self) -> Option<TransferRequest> {
        Some(TransferRequest {
            id: self.tx,
            buyer_id: UserId(self.buyer),
            seller_id: UserId(self.seller),
            product_id: self.product,
            order_id: self.order,
            amount: self.amount?,
        })
    }
}

/// Funds `wallet` from a `user,balance` CSV.
///
/// Malformed rows and negative balances are logged and skipped.
pub fn load_accounts<R: Read>(wallet: &InMemoryWallet, input: R) -> Result<(), csv::Error> {
    for result in reader(input).deserialize::<AccountRecord>() {
        match result {
            Ok(record) => {
                if let Err(e) = wallet.deposit(UserId(record.user.clone()), record.balance) {
                    warn!("Skipping balance for {}: {}", record.user, e);
                }
            }
            Err(e) => warn!("Skipping malformed account row: {}", e),
        }
    }
    Ok(())
}

/// Executes every transfer in a `tx,buyer,seller,product,order,amount` CSV.
///
/// Rows are processed in order. A row repeating an earlier id is a
/// re-delivery and moves no money twice. Malformed rows, invalid transfers
/// and conflicting ids are logged and skipped; expired or refused transfers
/// stay in the report with their status.
///
/// # Errors
///
/// Returns a CSV error only if the reader itself fails.
pub fn process_transfers<R: Read>(engine: &Engine, input: R) -> Result<(), csv::Error> {
    for result in reader(input).deserialize::<TransferRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping malformed row: {}", e);
                continue;
            }
        };

        let Some(request) = record.into_request() else {
            warn!("Skipping transfer record without amount");
            continue;
        };

        let tx = request.id.clone();
        match engine.process(request) {
            Ok(true) => debug!("tx {} executed", tx),
            Ok(false) => debug!("tx {} not executed", tx),
            Err(e) => warn!("Skipping tx {}: {}", tx, e),
        }
    }

    Ok(())
}

/// Writes every transaction to a CSV writer, in submission order.
///
/// # CSV Format
///
/// Columns: `tx, buyer, seller, amount, status, wallet_tx`
///
/// ```csv
/// tx,buyer,seller,amount,status,wallet_tx
/// t_1,b1,s1,40,executed,w_5f0c...
/// t_2,b1,s2,500,failed,
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_report<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for transaction in engine.drain() {
        wtr.serialize(transaction.as_ref())?;
    }

    wtr.flush()?;
    Ok(())
}
