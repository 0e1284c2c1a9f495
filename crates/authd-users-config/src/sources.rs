// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::UsersConfigLayer;
use crate::sections::{AccountsConfigLayer, DatabaseConfigLayer, IdsConfigLayer, OsConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<UsersConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<UsersConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(UsersConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/authd/users.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<UsersConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(UsersConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: UsersConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: AUTHD_USERS_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<UsersConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(UsersConfigLayer {
			ids: Some(load_ids_from_env()?),
			accounts: Some(load_accounts_from_env()),
			database: Some(load_database_from_env()?),
			os: Some(load_os_from_env()),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u32 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_ids_from_env() -> Result<IdsConfigLayer, ConfigError> {
	Ok(IdsConfigLayer {
		uid_min: env_u32("AUTHD_USERS_UID_MIN")?,
		uid_max: env_u32("AUTHD_USERS_UID_MAX")?,
		gid_min: env_u32("AUTHD_USERS_GID_MIN")?,
		gid_max: env_u32("AUTHD_USERS_GID_MAX")?,
		reserved_min: env_u32("AUTHD_USERS_RESERVED_MIN")?,
		reserved_max: env_u32("AUTHD_USERS_RESERVED_MAX")?,
	})
}

fn load_accounts_from_env() -> AccountsConfigLayer {
	AccountsConfigLayer {
		home_base_dir: env_var("AUTHD_USERS_HOME_BASE_DIR").map(PathBuf::from),
		default_shell: env_var("AUTHD_USERS_DEFAULT_SHELL"),
	}
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		url: env_var("AUTHD_USERS_DATABASE_URL"),
		operation_timeout_ms: env_u64("AUTHD_USERS_OPERATION_TIMEOUT_MS")?,
	})
}

fn load_os_from_env() -> OsConfigLayer {
	OsConfigLayer {
		passwd_path: env_var("AUTHD_USERS_PASSWD_PATH").map(PathBuf::from),
		group_path: env_var("AUTHD_USERS_GROUP_PATH").map(PathBuf::from),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.ids.is_none());
		assert!(layer.database.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let source = TomlSource::new("/nonexistent/users.toml");
		let layer = source.load().unwrap();
		assert!(layer.ids.is_none());
	}

	#[test]
	fn test_toml_source_reads_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[database]\noperation_timeout_ms = 750").unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		assert_eq!(layer.database.unwrap().operation_timeout_ms, Some(750));
	}

	#[test]
	fn test_toml_source_reports_parse_errors() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[ids]\nuid_min = \"lots\"").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}
}
