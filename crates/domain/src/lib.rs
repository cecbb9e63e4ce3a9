//! # omnihub-domain
//!
//! Pure domain model for the omnihub device-abstraction layer.
//!
//! ## Responsibilities
//! - Foundational types: registered platforms, universal device ids, timestamps
//! - Define the closed set of universal **Capabilities** and their attribute
//!   and command contracts
//! - Define the categorized **error taxonomy** (kind, retryability, severity)
//! - Define **Devices** (platform-agnostic snapshots of physical devices)
//! - Define **Device state** (flat `capability.attribute → value` readings)
//! - Define **Commands** and their terminal **results**
//! - Define locations, rooms, scenes, state-change notifications and health
//!   records
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod platform;
pub mod time;

pub mod capability;
pub mod command;
pub mod device;
pub mod event;
pub mod filter;
pub mod health;
pub mod location;
pub mod state;
