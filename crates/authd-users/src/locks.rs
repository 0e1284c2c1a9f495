// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held for the duration of one subject's reconciliation.
pub type SubjectGuard = OwnedMutexGuard<()>;

/// Keyed locks serializing work per provider subject.
#[derive(Debug, Clone, Default)]
pub struct SubjectLocks {
	locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SubjectLocks {
	pub fn new() -> Self {
		Self::default()
	}

	/// Wait for exclusive access to `sub`.
	///
	/// Entries nobody holds or waits on are pruned on every call.
	pub async fn acquire(&self, sub: &str) -> SubjectGuard {
		let lock = {
			let mut locks = self.locks.lock().await;
			locks.retain(|_, lock| Arc::strong_count(lock) > 1);
			locks
				.entry(sub.to_string())
				.or_insert_with(|| Arc::new(Mutex::new(())))
				.clone()
		};
		lock.lock_owned().await
	}

	/// Number of subjects currently tracked.
	pub async fn len(&self) -> usize {
		self.locks.lock().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.locks.lock().await.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[tokio::test]
	async fn test_same_subject_is_serialized() {
		let locks = SubjectLocks::new();
		let guard = locks.acquire("s1").await;

		let blocked = tokio::time::timeout(Duration::from_millis(50), locks.acquire("s1")).await;
		assert!(blocked.is_err());

		drop(guard);
		let reacquired = tokio::time::timeout(Duration::from_millis(50), locks.acquire("s1")).await;
		assert!(reacquired.is_ok());
	}

	#[tokio::test]
	async fn test_unrelated_subjects_do_not_contend() {
		let locks = SubjectLocks::new();
		let _s1 = locks.acquire("s1").await;
		let s2 = tokio::time::timeout(Duration::from_millis(50), locks.acquire("s2")).await;
		assert!(s2.is_ok());
	}

	#[tokio::test]
	async fn test_idle_entries_are_pruned() {
		let locks = SubjectLocks::new();
		drop(locks.acquire("s1").await);
		drop(locks.acquire("s2").await);
		let _s3 = locks.acquire("s3").await;
		assert_eq!(locks.len().await, 1);
	}
}
