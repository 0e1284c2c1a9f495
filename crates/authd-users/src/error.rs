// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use authd_broker_claims::ClaimsError;
use authd_users_core::{IdKind, IdRange};
use authd_users_db::DbError;

/// Errors that can occur while reconciling a user identity.
#[derive(Debug, thiserror::Error)]
pub enum UsersError {
	#[error(transparent)]
	Claims(#[from] ClaimsError),

	#[error("invalid user info: {0}")]
	InvalidUserInfo(String),

	#[error("stored record belongs to subject {stored}, refusing to merge {fresh}")]
	SubjectMismatch { stored: String, fresh: String },

	#[error("name {name} is already owned by another subject")]
	NameConflict { name: String },

	#[error("no free {kind} left in {range}")]
	IdRangeExhausted { kind: IdKind, range: IdRange },

	#[error("store error: {0}")]
	Store(#[from] DbError),

	#[error("failed to read OS account table {path}: {source}")]
	OsTable {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("{operation} exceeded the operation deadline")]
	DeadlineExceeded { operation: &'static str },
}

impl UsersError {
	/// Whether the caller may retry the same request unchanged.
	#[must_use]
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			UsersError::Store(_) | UsersError::OsTable { .. } | UsersError::DeadlineExceeded { .. }
		)
	}

	/// Whether the message may be shown to the end user verbatim.
	#[must_use]
	pub fn is_for_display(&self) -> bool {
		match self {
			UsersError::Claims(e) => e.is_for_display(),
			_ => false,
		}
	}

	/// The display-safe message, if this error has one.
	#[must_use]
	pub fn display_message(&self) -> Option<&'static str> {
		match self {
			UsersError::Claims(e) => e.display_message(),
			_ => None,
		}
	}
}
