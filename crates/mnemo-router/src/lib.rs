// SPDX-FileCopyrightText: 2026 mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability routing for the mnemo knowledge assistant.
//!
//! This crate provides:
//! - [`DriverRegistry`]: drivers keyed by lowercase name, probed once for the
//!   capability traits they implement
//! - [`ProviderRouter`]: resolves a usage key (`query`, `embedding.query`,
//!   `rerank`, ...) to a driver, falling back to the first-registered driver
//!   for that capability, plus resolve-then-delegate convenience operations
//!
//! The router is built once at startup and is read-only afterwards.

pub mod query;
pub mod registry;
pub mod router;

pub use query::{strip_code_fence, QueryBuilder, VisionQuery};
pub use registry::{DriverEntry, DriverRegistry};
pub use router::{Chunks, ProviderRouter, ProviderRouterBuilder, Summary};
