// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier range configuration.

use authd_users_core::IdRange;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_ID_MIN: u32 = 10_000;
pub const DEFAULT_ID_MAX: u32 = 60_000;

/// First UID systemd hands to `DynamicUser=` services.
pub const SYSTEMD_DYNAMIC_UID_MIN: u32 = 61_184;
/// One past the last UID systemd hands to `DynamicUser=` services.
pub const SYSTEMD_DYNAMIC_UID_MAX: u32 = 65_520;

/// Identifier ranges (runtime, fully resolved).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdsConfig {
	/// UIDs handed to new users.
	pub uid_range: IdRange,
	/// GIDs handed to private and supplementary groups.
	pub gid_range: IdRange,
	/// Never allocated, even when inside an allocatable range.
	pub reserved: IdRange,
}

impl Default for IdsConfig {
	fn default() -> Self {
		IdsConfigLayer::default()
			.finalize()
			.expect("built-in id ranges are valid")
	}
}

/// Identifier range layer (partial, for merging). Maxima are exclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdsConfigLayer {
	#[serde(default)]
	pub uid_min: Option<u32>,
	#[serde(default)]
	pub uid_max: Option<u32>,
	#[serde(default)]
	pub gid_min: Option<u32>,
	#[serde(default)]
	pub gid_max: Option<u32>,
	#[serde(default)]
	pub reserved_min: Option<u32>,
	#[serde(default)]
	pub reserved_max: Option<u32>,
}

impl IdsConfigLayer {
	pub fn merge(&mut self, other: IdsConfigLayer) {
		if other.uid_min.is_some() {
			self.uid_min = other.uid_min;
		}
		if other.uid_max.is_some() {
			self.uid_max = other.uid_max;
		}
		if other.gid_min.is_some() {
			self.gid_min = other.gid_min;
		}
		if other.gid_max.is_some() {
			self.gid_max = other.gid_max;
		}
		if other.reserved_min.is_some() {
			self.reserved_min = other.reserved_min;
		}
		if other.reserved_max.is_some() {
			self.reserved_max = other.reserved_max;
		}
	}

	pub fn finalize(self) -> Result<IdsConfig, ConfigError> {
		Ok(IdsConfig {
			uid_range: range(
				"ids.uid_min/uid_max",
				self.uid_min.unwrap_or(DEFAULT_ID_MIN),
				self.uid_max.unwrap_or(DEFAULT_ID_MAX),
			)?,
			gid_range: range(
				"ids.gid_min/gid_max",
				self.gid_min.unwrap_or(DEFAULT_ID_MIN),
				self.gid_max.unwrap_or(DEFAULT_ID_MAX),
			)?,
			reserved: range(
				"ids.reserved_min/reserved_max",
				self.reserved_min.unwrap_or(SYSTEMD_DYNAMIC_UID_MIN),
				self.reserved_max.unwrap_or(SYSTEMD_DYNAMIC_UID_MAX),
			)?,
		})
	}
}

fn range(key: &str, min: u32, max: u32) -> Result<IdRange, ConfigError> {
	IdRange::new(min, max).map_err(|e| ConfigError::InvalidValue {
		key: key.to_string(),
		message: e.to_string(),
	})
}
