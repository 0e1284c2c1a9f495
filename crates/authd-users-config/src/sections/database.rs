// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User store configuration.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_URL: &str = "sqlite:/var/lib/authd/users.db";
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5_000;

/// User store configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub url: String,
	/// Deadline applied to each store and OS table operation.
	pub operation_timeout: Duration,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			url: DEFAULT_URL.to_string(),
			operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
		}
	}
}

/// User store configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub operation_timeout_ms: Option<u64>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.operation_timeout_ms.is_some() {
			self.operation_timeout_ms = other.operation_timeout_ms;
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		DatabaseConfig {
			url: self.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
			operation_timeout: Duration::from_millis(
				self
					.operation_timeout_ms
					.unwrap_or(DEFAULT_OPERATION_TIMEOUT_MS),
			),
		}
	}
}
