// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Home directory ownership lookup.

use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error)]
pub enum OwnershipError {
	#[error("{0} does not exist")]
	NotFound(PathBuf),

	#[error("permission denied reading {0}")]
	PermissionDenied(PathBuf),

	#[error("failed to stat {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

/// Numeric owner of a filesystem path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomeOwner {
	pub uid: u32,
	pub gid: u32,
}

#[async_trait]
pub trait HomeDirOwnership: Send + Sync {
	async fn owner(&self, path: &Path) -> Result<HomeOwner, OwnershipError>;
}

/// Resolves ownership from filesystem metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsHomeDirOwnership;

#[async_trait]
impl HomeDirOwnership for FsHomeDirOwnership {
	#[instrument(skip(self))]
	async fn owner(&self, path: &Path) -> Result<HomeOwner, OwnershipError> {
		let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
			ErrorKind::NotFound => OwnershipError::NotFound(path.to_path_buf()),
			ErrorKind::PermissionDenied => OwnershipError::PermissionDenied(path.to_path_buf()),
			_ => OwnershipError::Io {
				path: path.to_path_buf(),
				source: e,
			},
		})?;
		Ok(HomeOwner {
			uid: metadata.uid(),
			gid: metadata.gid(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_owner_of_existing_directory() {
		let dir = tempfile::tempdir().unwrap();
		let marker = dir.path().join("marker");
		std::fs::write(&marker, b"").unwrap();
		let expected = std::fs::metadata(&marker).unwrap();

		let owner = FsHomeDirOwnership.owner(dir.path()).await.unwrap();
		assert_eq!(owner.uid, expected.uid());
		assert_eq!(owner.gid, expected.gid());
	}

	#[tokio::test]
	async fn test_missing_directory_is_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("gone");
		let err = FsHomeDirOwnership.owner(&missing).await.unwrap_err();
		assert!(matches!(err, OwnershipError::NotFound(p) if p == missing));
	}

	#[tokio::test]
	async fn test_unreadable_parent_is_permission_denied() {
		use std::os::unix::fs::PermissionsExt;

		let dir = tempfile::tempdir().unwrap();
		let locked = dir.path().join("locked");
		std::fs::create_dir(&locked).unwrap();
		std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

		// root ignores directory permissions
		if std::fs::read_dir(&locked).is_ok() {
			std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
			return;
		}

		let home = locked.join("home");
		let err = FsHomeDirOwnership.owner(&home).await.unwrap_err();
		std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
		assert!(matches!(err, OwnershipError::PermissionDenied(p) if p == home));
	}

	#[tokio::test]
	async fn test_file_in_path_is_io_error() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("file");
		std::fs::write(&file, b"").unwrap();

		let home = file.join("home");
		let err = FsHomeDirOwnership.owner(&home).await.unwrap_err();
		assert!(matches!(err, OwnershipError::Io { path, .. } if path == home));
	}
}
