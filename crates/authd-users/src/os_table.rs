// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-only view of the local OS account and group tables.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use authd_users_config::OsConfig;
use authd_users_core::IdKind;
use tracing::{instrument, warn};

use crate::error::UsersError;

#[async_trait]
pub trait OsAccountTable: Send + Sync {
	/// Identifiers of local accounts (`Uid`) or groups (`Gid`).
	async fn taken_ids(&self, kind: IdKind) -> Result<BTreeSet<u32>, UsersError>;

	/// Whether an account or group with `value` exists locally.
	async fn is_taken(&self, kind: IdKind, value: u32) -> Result<bool, UsersError> {
		Ok(self.taken_ids(kind).await?.contains(&value))
	}
}

/// `passwd(5)` / `group(5)` formatted files.
///
/// Only entries present in the files are seen. Accounts served solely by
/// other NSS sources (sssd, LDAP, systemd-userdb) are invisible here.
#[derive(Debug, Clone)]
pub struct PasswdFileTable {
	passwd_path: PathBuf,
	group_path: PathBuf,
}

impl PasswdFileTable {
	pub fn new(passwd_path: impl Into<PathBuf>, group_path: impl Into<PathBuf>) -> Self {
		Self {
			passwd_path: passwd_path.into(),
			group_path: group_path.into(),
		}
	}

	pub fn from_config(config: &OsConfig) -> Self {
		Self::new(&config.passwd_path, &config.group_path)
	}

	fn path(&self, kind: IdKind) -> &Path {
		match kind {
			IdKind::Uid => &self.passwd_path,
			IdKind::Gid => &self.group_path,
		}
	}
}

#[async_trait]
impl OsAccountTable for PasswdFileTable {
	#[instrument(skip(self))]
	async fn taken_ids(&self, kind: IdKind) -> Result<BTreeSet<u32>, UsersError> {
		let path = self.path(kind);
		let content = match tokio::fs::read_to_string(path).await {
			Ok(content) => content,
			Err(e) if e.kind() == ErrorKind::NotFound => {
				warn!(path = %path.display(), "OS account table not found, treating as empty");
				return Ok(BTreeSet::new());
			}
			Err(e) => {
				return Err(UsersError::OsTable {
					path: path.to_path_buf(),
					source: e,
				});
			}
		};
		let taken: BTreeSet<u32> = ids(&content).collect();
		Ok(taken)
	}
}

/// Numeric ids in the third field of each entry.
fn ids(content: &str) -> impl Iterator<Item = u32> + '_ {
	content
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty() && !line.starts_with('#'))
		.filter_map(|line| line.split(':').nth(2)?.parse().ok())
}
