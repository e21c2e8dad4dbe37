//! Multi-round, multi-model debate runner for a local inference server.
//!
//! Two independently configured model personas argue an assigned side (PRO or
//! CON) of a topic across a baseline round, any number of exchange rounds,
//! and a closing statement; a secondary critic model then audits the
//! exchange. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (tag parsing, side
//!   reconciliation, persona building, the transcript data model). No I/O,
//!   fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config, prompt templates, the
//!   inference gateway, process execution, export). Isolated to enable
//!   scripted gateways in tests.
//!
//! Orchestration modules ([`session`], [`repair`], [`critic`]) coordinate
//! core logic with I/O to implement the debate state machine.

pub mod core;
pub mod critic;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod repair;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
