// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for authd user reconciliation.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`AUTHD_USERS_*`)
//!
//! # Usage
//!
//! ```ignore
//! use authd_users_config::load_config;
//!
//! let config = load_config()?;
//! println!("allocating UIDs from {}", config.ids.uid_range);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::UsersConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved users configuration.
#[derive(Debug, Clone, Default)]
pub struct UsersConfig {
	pub ids: IdsConfig,
	pub accounts: AccountsConfig,
	pub database: DatabaseConfig,
	pub os: OsConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`AUTHD_USERS_*`)
/// 2. Config file (`/etc/authd/users.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<UsersConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<UsersConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<UsersConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = UsersConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: UsersConfigLayer) -> Result<UsersConfig, ConfigError> {
	let ids = layer.ids.unwrap_or_default().finalize()?;
	let accounts = layer.accounts.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let os = layer.os.unwrap_or_default().finalize();

	let config = UsersConfig {
		ids,
		accounts,
		database,
		os,
	};
	validate_config(&config)?;

	info!(
		uid_range = %config.ids.uid_range,
		gid_range = %config.ids.gid_range,
		reserved = %config.ids.reserved,
		home_base_dir = %config.accounts.home_base_dir.display(),
		database = %config.database.url,
		"users configuration loaded"
	);

	Ok(config)
}

/// Validate cross-field configuration rules.
fn validate_config(config: &UsersConfig) -> Result<(), ConfigError> {
	let ids = &config.ids;
	if ids.uid_range.start() == 0 || ids.gid_range.start() == 0 {
		return Err(ConfigError::Validation(
			"uid_min and gid_min must be greater than 0; identifier 0 belongs to root".to_string(),
		));
	}

	for (name, range) in [("uid", ids.uid_range), ("gid", ids.gid_range)] {
		if range.is_within(&ids.reserved) {
			return Err(ConfigError::Validation(format!(
				"{name} range {range} lies entirely inside the reserved range {}",
				ids.reserved
			)));
		}
	}

	if config.database.operation_timeout.is_zero() {
		return Err(ConfigError::Validation(
			"operation_timeout_ms must be greater than 0".to_string(),
		));
	}

	if !config.accounts.home_base_dir.is_absolute() {
		return Err(ConfigError::Validation(format!(
			"home_base_dir must be an absolute path, got {}",
			config.accounts.home_base_dir.display()
		)));
	}

	if !config.accounts.default_shell.starts_with('/') {
		return Err(ConfigError::Validation(format!(
			"default_shell must be an absolute path, got {}",
			config.accounts.default_shell
		)));
	}

	Ok(())
}
