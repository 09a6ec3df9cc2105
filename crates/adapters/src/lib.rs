// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ty-adapters: External-process adapters for the execution core.
//!
//! Two adapter families live here:
//! - [`mux`]: a thin gateway over a detachable terminal multiplexer (tmux),
//!   which owns task windows and their panes.
//! - [`agent`]: one adapter per supported coding-agent CLI, all behind the
//!   uniform [`agent::Agent`] contract, plus the signal-driven process
//!   controller shared between them.

pub mod agent;
pub mod env;
pub mod mux;
pub mod subprocess;

pub use agent::{Agent, AgentError, LaunchRequest, ProcessControl};
pub use mux::{Multiplexer, MuxError, PaneInfo, TmuxMux, DAEMON_SESSION};

#[cfg(any(test, feature = "test-support"))]
pub use agent::FakeAgent;
#[cfg(any(test, feature = "test-support"))]
pub use mux::{FakeMux, MuxCall};
