// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local user accounts for identities asserted by an external provider.
//!
//! [`UserManager`] is the entry point the broker daemon calls after a
//! successful authentication. It validates the identity, applies local account
//! defaults, and decides whether the subject's stored record must be created,
//! updated, or left alone:
//!
//! - [`IdAllocator`] - UID/GID allocation outside the systemd dynamic range
//! - [`OsAccountTable`] - identifiers already used by local accounts
//! - [`HomeDirOwnership`] - owner of a home directory on disk
//! - [`SubjectLocks`] - per-subject and per-group serialization
//! - [`AccountPolicy`] - home directory and shell defaults
//!
//! Collaborators are trait objects so the daemon can swap in its own store,
//! account tables, or filesystem view.
//!
//! # Usage
//!
//! ```ignore
//! use authd_users::UserManager;
//!
//! let config = authd_users_config::load_config()?;
//! let manager = UserManager::from_config(&config).await?;
//! let outcome = manager.update_user_from_claims(&id_token_claims).await?;
//! println!("{} uid={}", outcome.action, outcome.record.uid);
//! ```

pub mod allocator;
pub mod error;
pub mod home;
pub mod locks;
pub mod manager;
pub mod os_table;
pub mod policy;

pub use allocator::{IdAllocator, IdLease, IdOracle, IdRanges};
pub use error::UsersError;
pub use home::{FsHomeDirOwnership, HomeDirOwnership, HomeOwner, OwnershipError};
pub use locks::{SubjectGuard, SubjectLocks};
pub use manager::{ReconcileWarning, Reconciliation, Result, UserManager};
pub use os_table::{OsAccountTable, PasswdFileTable};
pub use policy::AccountPolicy;
