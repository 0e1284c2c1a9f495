// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{AccountsConfigLayer, DatabaseConfigLayer, IdsConfigLayer, OsConfigLayer};

/// Users configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsersConfigLayer {
	#[serde(default)]
	pub ids: Option<IdsConfigLayer>,
	#[serde(default)]
	pub accounts: Option<AccountsConfigLayer>,
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub os: Option<OsConfigLayer>,
}

impl UsersConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: UsersConfigLayer) {
		merge_option(&mut self.ids, other.ids, IdsConfigLayer::merge);
		merge_option(
			&mut self.accounts,
			other.accounts,
			AccountsConfigLayer::merge,
		);
		merge_option(
			&mut self.database,
			other.database,
			DatabaseConfigLayer::merge,
		);
		merge_option(&mut self.os, other.os, OsConfigLayer::merge);
	}
}

fn merge_option<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(b), Some(o)) => merge(b, o),
		(None, Some(o)) => *base = Some(o),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_fills_missing_sections() {
		let mut base = UsersConfigLayer::default();
		base.merge(UsersConfigLayer {
			ids: Some(IdsConfigLayer {
				uid_min: Some(20_000),
				..Default::default()
			}),
			..Default::default()
		});
		assert_eq!(base.ids.unwrap().uid_min, Some(20_000));
		assert!(base.database.is_none());
	}

	#[test]
	fn test_parse_toml_layer() {
		let layer: UsersConfigLayer = toml::from_str(
			r#"
			[ids]
			uid_min = 60000
			uid_max = 60100

			[accounts]
			default_shell = "/bin/zsh"
			"#,
		)
		.unwrap();
		let ids = layer.ids.unwrap();
		assert_eq!(ids.uid_min, Some(60_000));
		assert_eq!(ids.uid_max, Some(60_100));
		assert_eq!(
			layer.accounts.unwrap().default_shell.as_deref(),
			Some("/bin/zsh")
		);
	}
}
