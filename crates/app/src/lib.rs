//! # omnihub-app
//!
//! Application layer — the adapter contract and the machinery every adapter
//! shares.
//!
//! ## Responsibilities
//! - Define the **port traits** that platform adapters implement:
//!   - `DeviceAdapter` — lifecycle, discovery, state, commands, capability
//!     translation, locations/rooms/scenes, notifications
//!   - `EventPublisher` — publish state-change notifications
//! - Provide the shared **command pipeline** (single and batch) with bounded
//!   retry, per-attempt timeouts, cancellation and confirmation reads
//! - Provide static **capability mapping tables**, lifecycle checks and
//!   rolling health counters
//! - Provide **in-process infrastructure** (notification bus) that doesn't
//!   need IO
//!
//! ## Dependency rule
//! Depends on `omnihub-domain` only (plus `tokio` primitives for channels,
//! timers and cancellation). Never imports adapter crates. Adapters depend on
//! *this* crate, not the reverse.

pub mod capability_map;
pub mod event_bus;
pub mod health;
pub mod lifecycle;
pub mod options;
pub mod pipeline;
pub mod ports;
pub mod retry;
