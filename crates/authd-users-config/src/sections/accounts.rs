// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Account defaults applied to identities that omit them.

use std::path::PathBuf;

use serde::Deserialize;

fn default_home_base_dir() -> PathBuf {
	PathBuf::from("/home")
}

fn default_shell() -> String {
	"/usr/bin/bash".to_string()
}

/// Home and shell policy (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountsConfig {
	/// Parent of generated home directories (`<home_base_dir>/<name>`).
	pub home_base_dir: PathBuf,
	pub default_shell: String,
}

impl Default for AccountsConfig {
	fn default() -> Self {
		Self {
			home_base_dir: default_home_base_dir(),
			default_shell: default_shell(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountsConfigLayer {
	#[serde(default)]
	pub home_base_dir: Option<PathBuf>,
	#[serde(default)]
	pub default_shell: Option<String>,
}

impl AccountsConfigLayer {
	pub fn merge(&mut self, other: AccountsConfigLayer) {
		if other.home_base_dir.is_some() {
			self.home_base_dir = other.home_base_dir;
		}
		if other.default_shell.is_some() {
			self.default_shell = other.default_shell;
		}
	}

	pub fn finalize(self) -> AccountsConfig {
		AccountsConfig {
			home_base_dir: self.home_base_dir.unwrap_or_else(default_home_base_dir),
			default_shell: self.default_shell.unwrap_or_else(default_shell),
		}
	}
}
