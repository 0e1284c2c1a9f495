// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

const EMAIL_VERIFICATION_UNKNOWN: &str = "the identity provider did not report whether the email \
	 address is verified; make sure the 'email' scope is requested";
const EMAIL_NOT_VERIFIED: &str = "email not verified";

/// Errors that can occur while turning provider claims into a user identity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClaimsError {
	/// Claims could not be decoded into the expected schema
	#[error("failed to decode provider claims: {0}")]
	Decode(String),

	/// A required claim is absent or empty
	#[error("provider claims are missing `{0}`")]
	MissingClaim(&'static str),

	/// `email_verified` is absent
	#[error("{}", EMAIL_VERIFICATION_UNKNOWN)]
	EmailVerificationUnknown,

	/// `email_verified` is false
	#[error("{}", EMAIL_NOT_VERIFIED)]
	EmailNotVerified,
}

impl ClaimsError {
	/// Whether the message may be shown to the end user verbatim.
	///
	/// Internal failures should be reported upstream as a generic
	/// authentication failure.
	#[must_use]
	pub fn is_for_display(&self) -> bool {
		matches!(
			self,
			ClaimsError::EmailVerificationUnknown | ClaimsError::EmailNotVerified
		)
	}

	/// The display-safe message, if this error has one.
	#[must_use]
	pub fn display_message(&self) -> Option<&'static str> {
		match self {
			ClaimsError::EmailVerificationUnknown => Some(EMAIL_VERIFICATION_UNKNOWN),
			ClaimsError::EmailNotVerified => Some(EMAIL_NOT_VERIFIED),
			ClaimsError::Decode(_) | ClaimsError::MissingClaim(_) => None,
		}
	}
}
