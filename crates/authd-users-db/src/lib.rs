// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # authd-users-db
//!
//! User record store for authd using SQLite via sqlx.
//!
//! - [`UserStore`]: the contract the reconciliation engine depends on
//! - [`UserRepository`]: SQLite implementation holding a `SqlitePool`
//! - [`create_pool`] / [`run_migrations`]: pool setup and schema
//!
//! ## Error Handling
//!
//! | Variant | When to use |
//! |---------|-------------|
//! | `Conflict` | Unique constraint violation, identifier reassignment |
//! | `Sqlx` | Unexpected database errors, propagated via `?` |
//! | `Internal` | Invalid stored data or inconsistent input records |
//!
//! Every write happens in one transaction; a failed or dropped write leaves
//! the store untouched.

mod error;
pub mod pool;
pub mod user;

#[cfg(test)]
pub mod testing;

pub use error::{DbError, Result};
pub use pool::{create_pool, run_migrations};
pub use user::{UserRepository, UserStore};
