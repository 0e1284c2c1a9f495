// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Canonical identity record.

use serde::{Deserialize, Serialize};

/// Identity asserted by a provider, in canonical local form.
///
/// Equality is field-by-field: two values are the same identity state only if
/// every field matches exactly, including the order of `groups`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
	/// Login name, taken from the verified email claim.
	pub name: String,
	/// Home directory. Empty until account policy fills it in.
	pub home: String,
	/// Provider-issued subject. Reconciliation key; never changes for an account.
	pub sub: String,
	/// Login shell. Empty until account policy fills it in.
	pub shell: String,
	/// Free-text comment field.
	pub gecos: String,
	/// Supplementary group names, in provider order without duplicates.
	#[serde(default)]
	pub groups: Vec<String>,
}

impl UserInfo {
	pub fn new(
		name: impl Into<String>,
		home: impl Into<String>,
		sub: impl Into<String>,
		shell: impl Into<String>,
		gecos: impl Into<String>,
		groups: Vec<String>,
	) -> Self {
		Self {
			name: name.into(),
			home: home.into(),
			sub: sub.into(),
			shell: shell.into(),
			gecos: gecos.into(),
			groups,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_equality_is_exact() {
		let a = UserInfo::new("a@x.com", "/home/a", "s1", "/bin/sh", "", vec![]);
		let mut b = a.clone();
		assert_eq!(a, b);

		b.gecos = " ".to_string();
		assert_ne!(a, b);
	}

	#[test]
	fn test_group_order_matters() {
		let a = UserInfo::new(
			"a@x.com",
			"",
			"s1",
			"",
			"",
			vec!["dev".to_string(), "ops".to_string()],
		);
		let mut b = a.clone();
		b.groups.reverse();
		assert_ne!(a, b);
	}

	#[test]
	fn test_deserialize_without_groups() {
		let json = r#"{"name":"a@x.com","home":"","sub":"s1","shell":"","gecos":""}"#;
		let user: UserInfo = serde_json::from_str(json).unwrap();
		assert!(user.groups.is_empty());
		assert_eq!(user.sub, "s1");
	}
}
