// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identifier allocation primitives.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Which identifier space a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
	/// User identifier
	Uid,
	/// Group identifier
	Gid,
}

impl std::fmt::Display for IdKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			IdKind::Uid => write!(f, "uid"),
			IdKind::Gid => write!(f, "gid"),
		}
	}
}

impl std::str::FromStr for IdKind {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"uid" => Ok(IdKind::Uid),
			"gid" => Ok(IdKind::Gid),
			_ => Err(CoreError::InvalidIdKind(s.to_string())),
		}
	}
}

/// Half-open interval `[start, end)` of identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct IdRange {
	start: u32,
	end: u32,
}

impl IdRange {
	/// Create a range, rejecting empty or inverted bounds.
	pub fn new(start: u32, end: u32) -> Result<Self, CoreError> {
		if start >= end {
			return Err(CoreError::InvalidRange { start, end });
		}
		Ok(Self { start, end })
	}

	#[must_use]
	pub fn start(&self) -> u32 {
		self.start
	}

	/// Exclusive upper bound.
	#[must_use]
	pub fn end(&self) -> u32 {
		self.end
	}

	#[must_use]
	pub fn contains(&self, value: u32) -> bool {
		value >= self.start && value < self.end
	}

	#[must_use]
	pub fn len(&self) -> u32 {
		self.end - self.start
	}

	/// Always false; empty ranges cannot be constructed.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		false
	}

	/// True when every value of `self` also lies in `other`.
	#[must_use]
	pub fn is_within(&self, other: &IdRange) -> bool {
		self.start >= other.start && self.end <= other.end
	}

	/// Values in ascending order.
	pub fn iter(&self) -> std::ops::Range<u32> {
		self.start..self.end
	}
}

impl std::fmt::Display for IdRange {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "[{}, {})", self.start, self.end)
	}
}

/// An identifier handed out by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllocatedId {
	pub value: u32,
	pub kind: IdKind,
}

impl AllocatedId {
	#[must_use]
	pub fn new(kind: IdKind, value: u32) -> Self {
		Self { value, kind }
	}
}

impl std::fmt::Display for AllocatedId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}={}", self.kind, self.value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn range_contains_matches_bounds(start in 0u32..100_000, len in 1u32..10_000, value in 0u32..120_000) {
			let range = IdRange::new(start, start + len).unwrap();
			prop_assert_eq!(range.contains(value), value >= start && value < start + len);
		}

		#[test]
		fn range_iter_yields_len_values(start in 0u32..100_000, len in 1u32..2_000) {
			let range = IdRange::new(start, start + len).unwrap();
			prop_assert_eq!(range.iter().count() as u32, range.len());
		}
	}

	#[test]
	fn test_range_rejects_empty_and_inverted() {
		assert_eq!(
			IdRange::new(10, 10),
			Err(CoreError::InvalidRange { start: 10, end: 10 })
		);
		assert!(IdRange::new(11, 10).is_err());
	}

	#[test]
	fn test_range_end_is_exclusive() {
		let range = IdRange::new(60000, 60100).unwrap();
		assert!(range.contains(60000));
		assert!(range.contains(60099));
		assert!(!range.contains(60100));
		assert_eq!(range.to_string(), "[60000, 60100)");
	}

	#[test]
	fn test_range_is_within() {
		let reserved = IdRange::new(61184, 65520).unwrap();
		assert!(IdRange::new(62000, 63000).unwrap().is_within(&reserved));
		assert!(!IdRange::new(60000, 62000).unwrap().is_within(&reserved));
	}

	#[test]
	fn test_id_kind_display_and_parse() {
		assert_eq!(IdKind::Uid.to_string(), "uid");
		assert_eq!("gid".parse::<IdKind>().unwrap(), IdKind::Gid);
		assert_eq!(
			"pid".parse::<IdKind>(),
			Err(CoreError::InvalidIdKind("pid".to_string()))
		);
	}

	#[test]
	fn test_allocated_id_display() {
		assert_eq!(AllocatedId::new(IdKind::Uid, 60000).to_string(), "uid=60000");
	}
}
