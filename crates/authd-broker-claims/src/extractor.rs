// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use authd_users_core::UserInfo;
use serde_json::{Map, Value};

use crate::claims::{ClaimsSource, ProviderClaims};
use crate::error::ClaimsError;

/// Turns provider claims into a [`UserInfo`].
///
/// Extraction is a pure function of the claims: identical input always yields
/// an identical `UserInfo`, which keeps re-authentication idempotent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimsExtractor;

impl ClaimsExtractor {
	pub fn new() -> Self {
		Self
	}

	/// Validate an already-decoded claim object.
	pub fn extract(&self, claims: &Map<String, Value>) -> Result<UserInfo, ClaimsError> {
		self.extract_from(claims)
	}

	/// Decode claims from `source` and validate them.
	///
	/// # Errors
	/// - [`ClaimsError::Decode`]: a known claim has the wrong type.
	/// - [`ClaimsError::MissingClaim`]: `sub` or `email` is absent or empty.
	/// - [`ClaimsError::EmailVerificationUnknown`]: `email_verified` is absent.
	/// - [`ClaimsError::EmailNotVerified`]: `email_verified` is false.
	pub fn extract_from<S: ClaimsSource + ?Sized>(&self, source: &S) -> Result<UserInfo, ClaimsError> {
		let claims: ProviderClaims = source.claims()?;
		self.validate(claims)
	}

	/// Validate a decoded claim set.
	pub fn validate(&self, claims: ProviderClaims) -> Result<UserInfo, ClaimsError> {
		let sub = required(claims.sub, "sub")?;
		let email = required(claims.email, "email")?;

		match claims.email_verified {
			None => {
				tracing::debug!(sub = %sub, "provider did not send email_verified");
				return Err(ClaimsError::EmailVerificationUnknown);
			}
			Some(false) => {
				tracing::debug!(sub = %sub, "provider reports email as unverified");
				return Err(ClaimsError::EmailNotVerified);
			}
			Some(true) => {}
		}

		Ok(UserInfo {
			name: email,
			home: claims.home.unwrap_or_default(),
			sub,
			shell: claims.shell.unwrap_or_default(),
			gecos: claims.gecos.unwrap_or_default(),
			groups: dedup_groups(claims.groups.unwrap_or_default()),
		})
	}
}

fn required(value: Option<String>, claim: &'static str) -> Result<String, ClaimsError> {
	match value {
		Some(v) if !v.is_empty() => Ok(v),
		_ => {
			tracing::debug!(claim, "required claim missing");
			Err(ClaimsError::MissingClaim(claim))
		}
	}
}

/// Drop empty names and repeats, keeping the first occurrence.
fn dedup_groups(groups: Vec<String>) -> Vec<String> {
	let mut seen = std::collections::HashSet::new();
	groups
		.into_iter()
		.filter(|g| !g.is_empty() && seen.insert(g.clone()))
		.collect()
}
