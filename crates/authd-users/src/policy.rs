// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local account defaults applied to provider identities.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use authd_users_config::AccountsConfig;
use authd_users_core::UserInfo;

use crate::error::UsersError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPolicy {
	home_base_dir: PathBuf,
	default_shell: String,
}

impl AccountPolicy {
	pub fn new(home_base_dir: impl Into<PathBuf>, default_shell: impl Into<String>) -> Self {
		Self {
			home_base_dir: home_base_dir.into(),
			default_shell: default_shell.into(),
		}
	}

	pub fn from_config(config: &AccountsConfig) -> Self {
		Self::new(&config.home_base_dir, &config.default_shell)
	}

	/// Fill in the home directory and shell and drop duplicate groups.
	///
	/// Applying it twice yields the same result.
	pub fn normalize(&self, mut user: UserInfo) -> Result<UserInfo, UsersError> {
		if user.sub.is_empty() {
			return Err(UsersError::InvalidUserInfo("sub is empty".to_string()));
		}
		if user.name.is_empty() {
			return Err(UsersError::InvalidUserInfo("name is empty".to_string()));
		}
		if !is_single_path_component(&user.name) {
			return Err(UsersError::InvalidUserInfo(format!(
				"name {} is not usable as a home directory name",
				user.name
			)));
		}

		if user.home.is_empty() {
			user.home = self.home_base_dir.join(&user.name).to_string_lossy().into_owned();
		}
		if user.shell.is_empty() {
			user.shell = self.default_shell.clone();
		}

		let mut seen = HashSet::new();
		user
			.groups
			.retain(|g| !g.is_empty() && seen.insert(g.clone()));

		Ok(user)
	}
}

/// `name` joined to the home base dir must stay one level below it.
fn is_single_path_component(name: &str) -> bool {
	let mut components = Path::new(name).components();
	matches!(
		(components.next(), components.next()),
		(Some(Component::Normal(_)), None)
	) && !name.contains('/')
}

impl Default for AccountPolicy {
	fn default() -> Self {
		Self::from_config(&AccountsConfig::default())
	}
}
