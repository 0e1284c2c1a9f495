// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for authd user reconciliation.
//!
//! This crate provides:
//! - [`UserInfo`] - canonical identity asserted by an identity provider
//! - [`StoredRecord`] - persisted identity plus its allocated UID/GIDs
//! - [`IdKind`], [`IdRange`], [`AllocatedId`] - identifier allocation primitives
//! - [`ReconcileAction`] - outcome of reconciling a fresh identity

pub mod error;
pub mod ids;
pub mod record;
pub mod user;

pub use error::CoreError;
pub use ids::{AllocatedId, IdKind, IdRange};
pub use record::{GroupEntry, ReconcileAction, StoredRecord};
pub use user::UserInfo;
