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


//! Deadlock detection shared by the concurrency tests.
//!
//! The detector thread only reports; the test thread fails the test. Worker
//! threads stuck in a deadlock never finish, so [`DeadlockDetector::join`]
//! polls for reports while it waits on them.

#![allow(dead_code)]

use parking_lot::deadlock;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct DeadlockDetector {
    running: Arc<AtomicBool>,
    reports: Receiver<String>,
    handle: JoinHandle<()>,
}

impl DeadlockDetector {
    /// Starts a background thread that checks for deadlocks.
    pub fn start() -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let (sender, reports) = mpsc::channel();

        let handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(100));
                let deadlocks = deadlock::check_deadlock();
                if deadlocks.is_empty() {
                    continue;
                }

                let mut report = String::from("=== DEADLOCK DETECTED ===\n");
                for (i, threads) in deadlocks.iter().enumerate() {
                    let _ = writeln!(report, "\nDeadlock #{}", i + 1);
                    for t in threads {
                        let _ = writeln!(report, "Thread ID: {:?}", t.thread_id());
                        let _ = writeln!(report, "Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                if sender.send(report).is_err() {
                    return;
                }
            }
        });

        Self {
            running,
            reports,
            handle,
        }
    }

    /// Panics if the detector has reported a deadlock.
    pub fn assert_no_deadlock(&self) {
        if let Ok(report) = self.reports.try_recv() {
            panic!("Deadlock detected! See report below.\n{}", report);
        }
    }

    /// Joins `handles`, failing as soon as a deadlock is reported.
    pub fn join<T>(&self, handles: Vec<JoinHandle<T>>) -> Vec<T> {
        while !handles.iter().all(|handle| handle.is_finished()) {
            self.assert_no_deadlock();
            thread::sleep(Duration::from_millis(10));
        }
        handles
            .into_iter()
            .map(|handle| handle.join().expect("Thread panicked"))
            .collect()
    }

    /// Stops the detector, failing if a deadlock was reported meanwhile.
    pub fn stop(self) {
        let Self {
            running,
            reports,
            handle,
        } = self;
        running.store(false, Ordering::SeqCst);
        handle.join().expect("Detector thread panicked");
        if let Ok(report) = reports.try_recv() {
            panic!("Deadlock detected! See report below.\n{}", report);
        }
    }
}
