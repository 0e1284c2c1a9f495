// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity provider claims for authd.
//!
//! Claims arrive from the provider as a loosely typed JSON object. This crate
//! decodes them into a strict schema and validates them into a
//! [`authd_users_core::UserInfo`]:
//!
//! - [`ClaimsSource`] - anything that can hand out decoded claims (ID tokens, userinfo payloads)
//! - [`ProviderClaims`] - the accepted claim schema
//! - [`ClaimsExtractor`] - validation and normalization
//! - [`ClaimsError`] - failures, split into internal and display-safe kinds
//!
//! # Usage
//!
//! ```ignore
//! use authd_broker_claims::ClaimsExtractor;
//!
//! let claims = serde_json::json!({
//!     "sub": "s1",
//!     "email": "a@x.com",
//!     "email_verified": true,
//! });
//! let user = ClaimsExtractor::new().extract_from(&claims)?;
//! assert_eq!(user.name, "a@x.com");
//! ```

mod claims;
mod error;
mod extractor;

pub use claims::{ClaimsSource, ProviderClaims};
pub use error::ClaimsError;
pub use extractor::ClaimsExtractor;
