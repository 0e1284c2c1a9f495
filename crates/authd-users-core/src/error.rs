// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the core identity types.

use thiserror::Error;

/// Errors raised while constructing or parsing core types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
	/// Range bounds do not describe a non-empty half-open interval
	#[error("invalid id range [{start}, {end}): start must be lower than end")]
	InvalidRange { start: u32, end: u32 },

	/// Unknown identifier kind string
	#[error("invalid id kind: {0}")]
	InvalidIdKind(String),

	/// Unknown reconcile action string
	#[error("invalid reconcile action: {0}")]
	InvalidAction(String),
}
