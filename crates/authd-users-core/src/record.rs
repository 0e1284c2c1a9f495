// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persisted identity records and reconciliation outcomes.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{AllocatedId, IdKind};
use crate::user::UserInfo;

/// A supplementary group and the GID it was given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupEntry {
	pub name: String,
	pub gid: u32,
}

impl GroupEntry {
	pub fn new(name: impl Into<String>, gid: u32) -> Self {
		Self {
			name: name.into(),
			gid,
		}
	}
}

/// Persisted form of a [`UserInfo`] with its identifiers.
///
/// `gid` is the user's private group. `groups` follows the order of
/// `user.groups` and carries one entry per name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
	pub user: UserInfo,
	pub uid: u32,
	pub gid: u32,
	#[serde(default)]
	pub groups: Vec<GroupEntry>,
}

impl StoredRecord {
	#[must_use]
	pub fn sub(&self) -> &str {
		&self.user.sub
	}

	#[must_use]
	pub fn uid(&self) -> AllocatedId {
		AllocatedId::new(IdKind::Uid, self.uid)
	}

	#[must_use]
	pub fn gid(&self) -> AllocatedId {
		AllocatedId::new(IdKind::Gid, self.gid)
	}

	/// GID recorded for a supplementary group name.
	#[must_use]
	pub fn group_gid(&self, name: &str) -> Option<u32> {
		self.groups.iter().find(|g| g.name == name).map(|g| g.gid)
	}
}

/// What reconciliation did with a fresh identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
	/// New subject; identifiers were allocated and a record written
	Create,
	/// Known subject with changed fields; record rewritten with the same identifiers
	Update,
	/// Known subject, nothing changed; no write
	Noop,
}

impl std::fmt::Display for ReconcileAction {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ReconcileAction::Create => write!(f, "create"),
			ReconcileAction::Update => write!(f, "update"),
			ReconcileAction::Noop => write!(f, "noop"),
		}
	}
}

impl std::str::FromStr for ReconcileAction {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"create" => Ok(ReconcileAction::Create),
			"update" => Ok(ReconcileAction::Update),
			"noop" => Ok(ReconcileAction::Noop),
			_ => Err(CoreError::InvalidAction(s.to_string())),
		}
	}
}
