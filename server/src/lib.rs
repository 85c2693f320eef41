// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # ADC Secrets Server
//!
//! HTTP host for the [`adc_secrets_engine`] backend.
//!
//! ## Architecture
//!
//! ```text
//! Client -> HTTP API (this crate) -> Backend -> Nitro REST -> Citrix ADC
//!                 |                     |
//!                 |                     +-> FileStorage / InMemoryStorage
//!                 +-> cache sweep, WAL rollback sweep
//! ```
//!
//! ## Modules
//!
//! - [`application`]: router, middleware and background sweeps
//! - [`configuration`]: CLI arguments and environment with clap
//! - [`constants`]: defaults for the server
//! - [`errors`]: HTTP error mapping
//! - [`models`]: response and file formats owned by the server
//! - [`routes`]: HTTP route handlers
//! - [`storage`]: directory-backed storage
//!
//! ## Usage
//!
//! ```bash
//! adc-secrets-server --port 8200 --storage-dir /var/lib/adc-secrets
//! ```
//!
//! There is no authentication layer; bind to a trusted interface.

pub mod application;
pub mod configuration;
pub mod constants;
pub mod errors;
pub mod models;
pub mod routes;
pub mod storage;
