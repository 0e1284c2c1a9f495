// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local account database locations.

use std::path::PathBuf;

use serde::Deserialize;

fn default_passwd_path() -> PathBuf {
	PathBuf::from("/etc/passwd")
}

fn default_group_path() -> PathBuf {
	PathBuf::from("/etc/group")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsConfig {
	pub passwd_path: PathBuf,
	pub group_path: PathBuf,
}

impl Default for OsConfig {
	fn default() -> Self {
		Self {
			passwd_path: default_passwd_path(),
			group_path: default_group_path(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OsConfigLayer {
	#[serde(default)]
	pub passwd_path: Option<PathBuf>,
	#[serde(default)]
	pub group_path: Option<PathBuf>,
}

impl OsConfigLayer {
	pub fn merge(&mut self, other: OsConfigLayer) {
		if other.passwd_path.is_some() {
			self.passwd_path = other.passwd_path;
		}
		if other.group_path.is_some() {
			self.group_path = other.group_path;
		}
	}

	pub fn finalize(self) -> OsConfig {
		OsConfig {
			passwd_path: self.passwd_path.unwrap_or_else(default_passwd_path),
			group_path: self.group_path.unwrap_or_else(default_group_path),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		assert_eq!(OsConfigLayer::default().finalize(), OsConfig::default());
	}
}
