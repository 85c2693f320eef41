// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! # ADC Secrets Engine
//!
//! Credential lifecycle for Citrix ADC system users.
//!
//! The [`Backend`](backend::Backend) hands out the current password of a
//! role's appliance user and rotates it lazily once the role's TTL has
//! passed. It also rotates the administrative credential it uses itself,
//! protected by a write-ahead log so that a password changed on the
//! appliance is never lost from storage.
//!
//! ## Architecture
//!
//! ```text
//! Host -> Backend -> CredentialCache (hit)
//!            |
//!            +-> RoleLocks -> PasswordGenerator -> AdcClient (Nitro REST)
//!            |                                  -> Storage (roles/, config)
//!            +-> RootRotationLatch -> WAL (wal/) -> AdcClient -> Storage
//! ```
//!
//! ## Modules
//!
//! - [`backend`]: the engine value and its settings
//! - [`cache`]: process-local credential cache with a background sweep
//! - [`client`]: appliance capability trait and the Nitro REST client
//! - [`config`]: configuration store and update validation
//! - [`context`]: per-request cancellation and deadlines
//! - [`errors`]: error types and their stable kinds
//! - [`locks`]: role lock pool and root rotation latch
//! - [`models`]: stored records and request/response types
//! - [`password`]: password policies and generation
//! - [`roles`]: role store and upsert
//! - [`rollback`]: WAL reconciliation of interrupted root rotations
//! - [`rotation`]: role, root and bulk rotation
//! - [`storage`]: host storage trait and the in-memory implementation
//! - [`wal`]: write-ahead log primitive

pub mod backend;
pub mod cache;
pub mod client;
pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod locks;
pub mod models;
pub mod password;
pub mod roles;
pub mod rollback;
pub mod rotation;
pub mod storage;
pub mod wal;
