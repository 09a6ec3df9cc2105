// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ty-storage: The persistent store behind the execution core.
//!
//! The store is a materialized in-memory state fed by an append-only JSONL
//! WAL, with periodic zstd-compressed snapshots for bounded recovery time.
//! Every mutation becomes a [`StoreEvent`] written to the WAL before the
//! in-memory tables change, so a crashed host recovers by loading the
//! latest snapshot and replaying the WAL tail.

pub mod search;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod wal;

pub use search::SearchIndex;
pub use snapshot::{Snapshot, SnapshotError};
pub use state::{StoreEvent, StoreState};
pub use store::{StoreError, TaskDraft, TaskStore};
pub use wal::{Wal, WalError};
