// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod accounts;
mod database;
mod ids;
mod os;

pub use accounts::{AccountsConfig, AccountsConfigLayer};
pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use ids::{
	IdsConfig, IdsConfigLayer, DEFAULT_ID_MAX, DEFAULT_ID_MIN, SYSTEMD_DYNAMIC_UID_MAX,
	SYSTEMD_DYNAMIC_UID_MIN,
};
pub use os::{OsConfig, OsConfigLayer};
