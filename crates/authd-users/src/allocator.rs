// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! UID/GID allocation.
//!
//! Identifiers are chosen by an ascending bounded scan of the allocatable range.
//! A candidate is rejected when it is reserved for systemd dynamic users, leased
//! by an allocation still in flight, recorded in the user store, or present in
//! the OS account table.
//!
//! Accepted values are handed out as [`IdLease`]s. A leased value stays
//! invisible to other allocations until the lease is dropped, which callers do
//! only after the record that claims it has been persisted.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use authd_users_config::IdsConfig;
use authd_users_core::{AllocatedId, IdKind, IdRange};
use tokio::sync::Mutex;
use tracing::{debug, error, instrument, trace};

use crate::error::UsersError;

/// Allocatable and reserved identifier ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRanges {
	pub uid: IdRange,
	pub gid: IdRange,
	pub reserved: IdRange,
}

impl IdRanges {
	#[must_use]
	pub fn range(&self, kind: IdKind) -> IdRange {
		match kind {
			IdKind::Uid => self.uid,
			IdKind::Gid => self.gid,
		}
	}

	#[must_use]
	pub fn is_reserved(&self, value: u32) -> bool {
		self.reserved.contains(value)
	}
}

impl From<&IdsConfig> for IdRanges {
	fn from(config: &IdsConfig) -> Self {
		Self {
			uid: config.uid_range,
			gid: config.gid_range,
			reserved: config.reserved,
		}
	}
}

/// Answers which identifiers are already in use.
#[async_trait]
pub trait IdOracle: Send + Sync {
	/// Identifiers of `kind` recorded in the user store.
	async fn used_ids(&self, kind: IdKind) -> Result<BTreeSet<u32>, UsersError>;

	/// Whether the live OS account table already has `value`.
	async fn is_taken(&self, kind: IdKind, value: u32) -> Result<bool, UsersError>;
}

type PendingSet = Arc<StdMutex<BTreeSet<(IdKind, u32)>>>;

/// An allocated identifier that other allocations will skip until dropped.
#[derive(Debug)]
pub struct IdLease {
	id: AllocatedId,
	pending: PendingSet,
}

impl IdLease {
	#[must_use]
	pub fn id(&self) -> AllocatedId {
		self.id
	}

	#[must_use]
	pub fn value(&self) -> u32 {
		self.id.value
	}
}

impl Drop for IdLease {
	fn drop(&mut self) {
		let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
		pending.remove(&(self.id.kind, self.id.value));
		trace!(id = %self.id, "released identifier lease");
	}
}

/// Serialized allocator over configured identifier ranges.
#[derive(Debug)]
pub struct IdAllocator {
	ranges: IdRanges,
	scan: Mutex<()>,
	pending: PendingSet,
}

impl IdAllocator {
	pub fn new(ranges: IdRanges) -> Self {
		Self {
			ranges,
			scan: Mutex::new(()),
			pending: Arc::new(StdMutex::new(BTreeSet::new())),
		}
	}

	#[must_use]
	pub fn ranges(&self) -> &IdRanges {
		&self.ranges
	}

	#[must_use]
	pub fn is_reserved(&self, value: u32) -> bool {
		self.ranges.is_reserved(value)
	}

	/// Allocate the lowest free identifier of `kind`.
	#[instrument(skip(self, oracle), fields(kind = %kind))]
	pub async fn allocate(&self, kind: IdKind, oracle: &dyn IdOracle) -> Result<IdLease, UsersError> {
		self.allocate_inner(kind, None, oracle).await
	}

	/// Allocate `preferred` if it is free, otherwise the lowest free identifier.
	#[instrument(skip(self, oracle), fields(kind = %kind))]
	pub async fn allocate_preferring(
		&self,
		kind: IdKind,
		preferred: u32,
		oracle: &dyn IdOracle,
	) -> Result<IdLease, UsersError> {
		self.allocate_inner(kind, Some(preferred), oracle).await
	}

	async fn allocate_inner(
		&self,
		kind: IdKind,
		preferred: Option<u32>,
		oracle: &dyn IdOracle,
	) -> Result<IdLease, UsersError> {
		let _scan = self.scan.lock().await;

		// Pending must be read before the store: a lease dropped after its record
		// was written then shows up in one of the two sets.
		let pending = self.pending_values(kind);
		let used = oracle.used_ids(kind).await?;
		let range = self.ranges.range(kind);

		if let Some(value) = preferred {
			if self.is_free(kind, value, &pending, &used, oracle).await? {
				return Ok(self.lease(kind, value));
			}
			debug!(preferred = value, "preferred identifier unavailable, scanning range");
		}

		for value in range.iter() {
			if self.is_free(kind, value, &pending, &used, oracle).await? {
				return Ok(self.lease(kind, value));
			}
		}

		error!(kind = %kind, range = %range, "identifier range exhausted");
		Err(UsersError::IdRangeExhausted { kind, range })
	}

	async fn is_free(
		&self,
		kind: IdKind,
		value: u32,
		pending: &BTreeSet<u32>,
		used: &BTreeSet<u32>,
		oracle: &dyn IdOracle,
	) -> Result<bool, UsersError> {
		if !self.ranges.range(kind).contains(value)
			|| self.ranges.is_reserved(value)
			|| pending.contains(&value)
			|| used.contains(&value)
		{
			return Ok(false);
		}
		if oracle.is_taken(kind, value).await? {
			trace!(value, "identifier taken in OS account table");
			return Ok(false);
		}
		Ok(true)
	}

	fn pending_values(&self, kind: IdKind) -> BTreeSet<u32> {
		self
			.pending
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.iter()
			.filter(|(k, _)| *k == kind)
			.map(|(_, v)| *v)
			.collect()
	}

	fn lease(&self, kind: IdKind, value: u32) -> IdLease {
		self
			.pending
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert((kind, value));
		let id = AllocatedId::new(kind, value);
		debug!(id = %id, "allocated identifier");
		IdLease {
			id,
			pending: Arc::clone(&self.pending),
		}
	}
}
