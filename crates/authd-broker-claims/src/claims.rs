// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Claim schema and claim sources.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClaimsError;

/// Claims accepted from an identity provider.
///
/// Every field is optional at the decoding stage so that absence can be
/// reported precisely by [`crate::ClaimsExtractor`]. Unknown claims are ignored;
/// a known claim with the wrong JSON type fails decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderClaims {
	/// Stable subject identifier.
	#[serde(default)]
	pub sub: Option<String>,
	/// Email address, used as the login name.
	#[serde(default)]
	pub email: Option<String>,
	/// Whether the provider verified `email`.
	#[serde(default)]
	pub email_verified: Option<bool>,
	#[serde(default)]
	pub home: Option<String>,
	#[serde(default)]
	pub shell: Option<String>,
	#[serde(default)]
	pub gecos: Option<String>,
	/// Group memberships (requires a `groups` scope on most providers).
	#[serde(default)]
	pub groups: Option<Vec<String>>,
}

/// A source of decoded provider claims, such as a verified ID token.
///
/// The transport and token verification are the caller's business; the
/// source only has to decode its claim set into the requested type.
pub trait ClaimsSource {
	/// Decode the claim set into `T`.
	///
	/// # Errors
	/// Returns [`ClaimsError::Decode`] if the claims do not fit `T`.
	fn claims<T: DeserializeOwned>(&self) -> Result<T, ClaimsError>;
}

impl ClaimsSource for Value {
	fn claims<T: DeserializeOwned>(&self) -> Result<T, ClaimsError> {
		T::deserialize(self).map_err(|e| ClaimsError::Decode(e.to_string()))
	}
}

impl ClaimsSource for Map<String, Value> {
	fn claims<T: DeserializeOwned>(&self) -> Result<T, ClaimsError> {
		serde_json::from_value(Value::Object(self.clone()))
			.map_err(|e| ClaimsError::Decode(e.to_string()))
	}
}
