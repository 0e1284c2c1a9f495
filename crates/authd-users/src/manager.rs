// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reconciliation of provider identities with stored user records.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authd_broker_claims::{ClaimsExtractor, ClaimsSource};
use authd_users_config::UsersConfig;
use authd_users_core::{GroupEntry, IdKind, ReconcileAction, StoredRecord, UserInfo};
use authd_users_db::{create_pool, run_migrations, UserRepository, UserStore};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::allocator::{IdAllocator, IdLease, IdOracle, IdRanges};
use crate::error::UsersError;
use crate::home::{FsHomeDirOwnership, HomeDirOwnership};
use crate::locks::{SubjectGuard, SubjectLocks};
use crate::os_table::{OsAccountTable, PasswdFileTable};
use crate::policy::AccountPolicy;

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, UsersError>;

/// Non-fatal findings of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileWarning {
	/// The previous home directory belongs to someone other than the user.
	HomeOwnerMismatch {
		home: String,
		expected_uid: u32,
		owner_uid: u32,
	},
	/// The owner of the previous home directory could not be determined.
	HomeOwnerUnresolved { home: String, reason: String },
}

impl std::fmt::Display for ReconcileWarning {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ReconcileWarning::HomeOwnerMismatch {
				home,
				expected_uid,
				owner_uid,
			} => write!(
				f,
				"previous home {home} is owned by uid {owner_uid}, expected {expected_uid}"
			),
			ReconcileWarning::HomeOwnerUnresolved { home, reason } => {
				write!(f, "owner of previous home {home} is unknown: {reason}")
			}
		}
	}
}

/// Outcome of reconciling one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
	pub action: ReconcileAction,
	pub record: StoredRecord,
	pub warnings: Vec<ReconcileWarning>,
}

/// Turns provider identities into stored local accounts.
///
/// This is the single state-changing entry point: every write to the user
/// store goes through [`UserManager::reconcile`]. Work on one subject is
/// serialized; unrelated subjects proceed in parallel.
pub struct UserManager {
	store: Arc<dyn UserStore>,
	os_table: Arc<dyn OsAccountTable>,
	home: Arc<dyn HomeDirOwnership>,
	allocator: IdAllocator,
	policy: AccountPolicy,
	locks: SubjectLocks,
	group_locks: SubjectLocks,
	extractor: ClaimsExtractor,
	operation_timeout: Duration,
}

impl UserManager {
	/// Create a manager over injected collaborators.
	pub fn new(
		config: &UsersConfig,
		store: Arc<dyn UserStore>,
		os_table: Arc<dyn OsAccountTable>,
		home: Arc<dyn HomeDirOwnership>,
	) -> Self {
		Self {
			store,
			os_table,
			home,
			allocator: IdAllocator::new(IdRanges::from(&config.ids)),
			policy: AccountPolicy::from_config(&config.accounts),
			locks: SubjectLocks::new(),
			group_locks: SubjectLocks::new(),
			extractor: ClaimsExtractor::new(),
			operation_timeout: config.database.operation_timeout,
		}
	}

	/// Create a manager backed by the configured SQLite database, OS tables and
	/// filesystem.
	pub async fn from_config(config: &UsersConfig) -> Result<Self> {
		let pool = create_pool(&config.database.url).await?;
		run_migrations(&pool).await?;
		Ok(Self::new(
			config,
			Arc::new(UserRepository::new(pool)),
			Arc::new(PasswdFileTable::from_config(&config.os)),
			Arc::new(FsHomeDirOwnership),
		))
	}

	/// Read the current record for a subject.
	#[instrument(skip(self))]
	pub async fn get_user(&self, sub: &str) -> Result<Option<StoredRecord>> {
		self.deadline("get user", self.store.get_user_by_sub(sub)).await
	}

	/// Reconcile `fresh` against whatever the store holds for its subject.
	#[instrument(skip(self, fresh), fields(sub = %fresh.sub))]
	pub async fn update_user(&self, fresh: UserInfo) -> Result<Reconciliation> {
		let stored = self.get_user(&fresh.sub).await?;
		self.reconcile(fresh, stored).await
	}

	/// Validate provider claims and reconcile the identity they assert.
	pub async fn update_user_from_claims<S: ClaimsSource + ?Sized>(
		&self,
		source: &S,
	) -> Result<Reconciliation> {
		let fresh = self.extractor.extract_from(source)?;
		self.update_user(fresh).await
	}

	/// Decide between CREATE, UPDATE and NOOP for `fresh` and persist the result.
	///
	/// `stored` is the caller's view of the subject's record. It is re-read under
	/// the subject lock and the store's version wins when they differ. A
	/// snapshot the store no longer holds is ignored: the subject is created
	/// afresh and its identifiers come from the allocator, not the snapshot.
	#[instrument(skip(self, fresh, stored), fields(sub = %fresh.sub))]
	pub async fn reconcile(
		&self,
		fresh: UserInfo,
		stored: Option<StoredRecord>,
	) -> Result<Reconciliation> {
		let fresh = self.policy.normalize(fresh)?;
		if let Some(stored) = &stored {
			if stored.sub() != fresh.sub {
				return Err(UsersError::SubjectMismatch {
					stored: stored.sub().to_string(),
					fresh: fresh.sub,
				});
			}
		}

		let _guard = self
			.lock(&self.locks, &fresh.sub, "acquire subject lock")
			.await?;

		let current = self
			.deadline("get user", self.store.get_user_by_sub(&fresh.sub))
			.await?;
		if current != stored {
			debug!("stored snapshot is stale, using current record");
		}

		match current {
			None => self.create(fresh).await,
			Some(current) if current.user == fresh => {
				debug!(uid = current.uid, "user unchanged");
				Ok(Reconciliation {
					action: ReconcileAction::Noop,
					record: current,
					warnings: Vec::new(),
				})
			}
			Some(current) => self.update(fresh, current).await,
		}
	}

	async fn create(&self, fresh: UserInfo) -> Result<Reconciliation> {
		self.ensure_name_available(&fresh).await?;

		let oracle = self.oracle();
		let uid = self.allocator.allocate(IdKind::Uid, &oracle).await?;
		let gid = self
			.allocator
			.allocate_preferring(IdKind::Gid, uid.value(), &oracle)
			.await?;
		let (groups, _pending) = self.resolve_groups(&fresh.groups, None, &oracle).await?;

		let record = StoredRecord {
			user: fresh,
			uid: uid.value(),
			gid: gid.value(),
			groups,
		};
		self
			.deadline("upsert user", self.store.upsert_user(&record))
			.await?;

		info!(
			name = %record.user.name,
			uid = record.uid,
			gid = record.gid,
			groups = record.groups.len(),
			"created user"
		);
		Ok(Reconciliation {
			action: ReconcileAction::Create,
			record,
			warnings: Vec::new(),
		})
	}

	async fn update(&self, fresh: UserInfo, current: StoredRecord) -> Result<Reconciliation> {
		if fresh.name != current.user.name {
			self.ensure_name_available(&fresh).await?;
		}

		let oracle = self.oracle();
		let (groups, _pending) = self
			.resolve_groups(&fresh.groups, Some(&current), &oracle)
			.await?;

		let mut warnings = Vec::new();
		if fresh.home != current.user.home {
			warnings.extend(self.check_previous_home(&current).await);
		}

		let record = StoredRecord {
			user: fresh,
			uid: current.uid,
			gid: current.gid,
			groups,
		};
		self
			.deadline("upsert user", self.store.upsert_user(&record))
			.await?;

		info!(
			name = %record.user.name,
			uid = record.uid,
			home_changed = record.user.home != current.user.home,
			warnings = warnings.len(),
			"updated user"
		);
		Ok(Reconciliation {
			action: ReconcileAction::Update,
			record,
			warnings,
		})
	}

	async fn ensure_name_available(&self, fresh: &UserInfo) -> Result<()> {
		let owner = self
			.deadline("get user by name", self.store.get_user_by_name(&fresh.name))
			.await?;
		match owner {
			Some(owner) if owner.sub() != fresh.sub => {
				warn!(name = %fresh.name, "name already owned by another subject");
				Err(UsersError::NameConflict {
					name: fresh.name.clone(),
				})
			}
			_ => Ok(()),
		}
	}

	/// Map group names to GIDs, allocating for names the store has never seen.
	///
	/// Groups not yet attached to the subject are locked by name, in sorted
	/// order, so two subjects introducing the same group agree on its GID. The
	/// returned [`PendingGroups`] must outlive the write that records them.
	async fn resolve_groups(
		&self,
		names: &[String],
		current: Option<&StoredRecord>,
		oracle: &StoreOracle<'_>,
	) -> Result<(Vec<GroupEntry>, PendingGroups)> {
		let mut pending = PendingGroups::default();

		let mut joining: Vec<&str> = names
			.iter()
			.filter(|name| current.and_then(|c| c.group_gid(name)).is_none())
			.map(String::as_str)
			.collect();
		joining.sort_unstable();
		joining.dedup();
		for name in joining {
			let guard = self
				.lock(&self.group_locks, name, "acquire group lock")
				.await?;
			pending.locks.push(guard);
		}

		let mut entries = Vec::with_capacity(names.len());
		for name in names {
			if let Some(gid) = current.and_then(|c| c.group_gid(name)) {
				entries.push(GroupEntry::new(name.as_str(), gid));
				continue;
			}
			let known = self
				.deadline("get group", self.store.get_group_by_name(name))
				.await?;
			if let Some(group) = known {
				entries.push(group);
				continue;
			}
			let lease = self.allocator.allocate(IdKind::Gid, oracle).await?;
			debug!(group = %name, gid = lease.value(), "allocated group");
			entries.push(GroupEntry::new(name.as_str(), lease.value()));
			pending.leases.push(lease);
		}

		Ok((entries, pending))
	}

	async fn check_previous_home(&self, current: &StoredRecord) -> Option<ReconcileWarning> {
		let home = current.user.home.clone();
		let owner = tokio::time::timeout(self.operation_timeout, self.home.owner(Path::new(&home))).await;

		let warning = match owner {
			Ok(Ok(owner)) if owner.uid == current.uid => return None,
			Ok(Ok(owner)) => ReconcileWarning::HomeOwnerMismatch {
				home,
				expected_uid: current.uid,
				owner_uid: owner.uid,
			},
			Ok(Err(e)) => ReconcileWarning::HomeOwnerUnresolved {
				home,
				reason: e.to_string(),
			},
			Err(_) => ReconcileWarning::HomeOwnerUnresolved {
				home,
				reason: "ownership lookup exceeded the operation deadline".to_string(),
			},
		};
		warn!(warning = %warning, "previous home directory needs attention");
		Some(warning)
	}

	async fn lock(
		&self,
		locks: &SubjectLocks,
		key: &str,
		operation: &'static str,
	) -> Result<SubjectGuard> {
		tokio::time::timeout(self.operation_timeout, locks.acquire(key))
			.await
			.map_err(|_| UsersError::DeadlineExceeded { operation })
	}

	fn oracle(&self) -> StoreOracle<'_> {
		StoreOracle {
			store: self.store.as_ref(),
			os_table: self.os_table.as_ref(),
			timeout: self.operation_timeout,
			os_uids: OnceCell::new(),
			os_gids: OnceCell::new(),
		}
	}

	async fn deadline<T, E, F>(&self, operation: &'static str, fut: F) -> Result<T>
	where
		F: Future<Output = std::result::Result<T, E>>,
		UsersError: From<E>,
	{
		with_deadline(self.operation_timeout, operation, fut).await
	}
}

async fn with_deadline<T, E, F>(timeout: Duration, operation: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = std::result::Result<T, E>>,
	UsersError: From<E>,
{
	match tokio::time::timeout(timeout, fut).await {
		Ok(result) => result.map_err(UsersError::from),
		Err(_) => {
			warn!(operation, timeout_ms = timeout.as_millis() as u64, "operation deadline exceeded");
			Err(UsersError::DeadlineExceeded { operation })
		}
	}
}

/// Group locks and GID leases held until the groups are persisted.
#[derive(Default)]
struct PendingGroups {
	locks: Vec<SubjectGuard>,
	leases: Vec<IdLease>,
}

/// Identifier usage as seen by the user store and the OS tables.
///
/// OS tables are read at most once per kind for the oracle's lifetime.
struct StoreOracle<'a> {
	store: &'a dyn UserStore,
	os_table: &'a dyn OsAccountTable,
	timeout: Duration,
	os_uids: OnceCell<BTreeSet<u32>>,
	os_gids: OnceCell<BTreeSet<u32>>,
}

#[async_trait]
impl IdOracle for StoreOracle<'_> {
	async fn used_ids(&self, kind: IdKind) -> Result<BTreeSet<u32>> {
		with_deadline(self.timeout, "list used ids", self.store.list_used_ids(kind)).await
	}

	async fn is_taken(&self, kind: IdKind, value: u32) -> Result<bool> {
		let cell = match kind {
			IdKind::Uid => &self.os_uids,
			IdKind::Gid => &self.os_gids,
		};
		let taken = cell
			.get_or_try_init(|| {
				with_deadline(self.timeout, "read OS account table", self.os_table.taken_ids(kind))
			})
			.await?;
		Ok(taken.contains(&value))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::home::{HomeOwner, OwnershipError};
	use authd_users_db::DbError;
	use std::collections::HashMap;
	use std::sync::Mutex;

	#[derive(Default)]
	struct MemoryStore {
		users: Mutex<HashMap<String, StoredRecord>>,
		writes: Mutex<usize>,
	}

	#[async_trait]
	impl UserStore for MemoryStore {
		async fn get_user_by_sub(&self, sub: &str) -> std::result::Result<Option<StoredRecord>, DbError> {
			Ok(self.users.lock().unwrap().get(sub).cloned())
		}

		async fn get_user_by_name(&self, name: &str) -> std::result::Result<Option<StoredRecord>, DbError> {
			Ok(self
				.users
				.lock()
				.unwrap()
				.values()
				.find(|r| r.user.name == name)
				.cloned())
		}

		async fn get_group_by_name(&self, name: &str) -> std::result::Result<Option<GroupEntry>, DbError> {
			Ok(self
				.users
				.lock()
				.unwrap()
				.values()
				.flat_map(|r| r.groups.iter())
				.find(|g| g.name == name)
				.cloned())
		}

		async fn upsert_user(&self, record: &StoredRecord) -> std::result::Result<(), DbError> {
			*self.writes.lock().unwrap() += 1;
			self
				.users
				.lock()
				.unwrap()
				.insert(record.sub().to_string(), record.clone());
			Ok(())
		}

		async fn list_used_ids(&self, kind: IdKind) -> std::result::Result<BTreeSet<u32>, DbError> {
			let users = self.users.lock().unwrap();
			Ok(match kind {
				IdKind::Uid => users.values().map(|r| r.uid).collect(),
				IdKind::Gid => users
					.values()
					.flat_map(|r| std::iter::once(r.gid).chain(r.groups.iter().map(|g| g.gid)))
					.collect(),
			})
		}
	}

	struct NoOsAccounts;

	#[async_trait]
	impl OsAccountTable for NoOsAccounts {
		async fn taken_ids(&self, _kind: IdKind) -> Result<BTreeSet<u32>> {
			Ok(BTreeSet::new())
		}
	}

	#[derive(Default)]
	struct CountingOsAccounts {
		reads: Mutex<Vec<IdKind>>,
	}

	#[async_trait]
	impl OsAccountTable for CountingOsAccounts {
		async fn taken_ids(&self, kind: IdKind) -> Result<BTreeSet<u32>> {
			self.reads.lock().unwrap().push(kind);
			Ok(BTreeSet::from([10_000, 10_001]))
		}
	}

	struct FixedOwner(std::result::Result<u32, ()>);

	#[async_trait]
	impl HomeDirOwnership for FixedOwner {
		async fn owner(&self, path: &Path) -> std::result::Result<HomeOwner, OwnershipError> {
			match self.0 {
				Ok(uid) => Ok(HomeOwner { uid, gid: uid }),
				Err(()) => Err(OwnershipError::NotFound(path.to_path_buf())),
			}
		}
	}

	fn manager_with(store: Arc<MemoryStore>, owner: FixedOwner) -> UserManager {
		UserManager::new(
			&UsersConfig::default(),
			store,
			Arc::new(NoOsAccounts),
			Arc::new(owner),
		)
	}

	fn fresh() -> UserInfo {
		UserInfo::new("a@x.com", "", "s1", "", "", vec![])
	}

	#[tokio::test]
	async fn test_create_applies_policy_and_shares_uid_with_private_group() {
		let manager = manager_with(Arc::new(MemoryStore::default()), FixedOwner(Ok(10_000)));
		let result = manager.reconcile(fresh(), None).await.unwrap();

		assert_eq!(result.action, ReconcileAction::Create);
		assert_eq!(result.record.uid, 10_000);
		assert_eq!(result.record.gid, 10_000);
		assert_eq!(result.record.user.home, "/home/a@x.com");
		assert_eq!(result.record.user.shell, "/usr/bin/bash");
	}

	#[tokio::test]
	async fn test_os_tables_are_read_once_per_reconciliation() {
		let os = Arc::new(CountingOsAccounts::default());
		let manager = UserManager::new(
			&UsersConfig::default(),
			Arc::new(MemoryStore::default()),
			Arc::clone(&os) as Arc<dyn OsAccountTable>,
			Arc::new(FixedOwner(Ok(10_000))),
		);
		let mut user = fresh();
		user.groups = vec!["dev".to_string(), "ops".to_string()];

		let created = manager.reconcile(user, None).await.unwrap();
		assert_eq!(created.record.uid, 10_002);
		assert_eq!(created.record.gid, 10_002);
		assert_eq!(*os.reads.lock().unwrap(), vec![IdKind::Uid, IdKind::Gid]);
	}

	#[tokio::test]
	async fn test_snapshot_missing_from_store_is_created_afresh() {
		let manager = manager_with(Arc::new(MemoryStore::default()), FixedOwner(Ok(10_000)));
		let snapshot = StoredRecord {
			user: AccountPolicy::default().normalize(fresh()).unwrap(),
			uid: 12_345,
			gid: 12_345,
			groups: Vec::new(),
		};

		let result = manager.reconcile(fresh(), Some(snapshot)).await.unwrap();
		assert_eq!(result.action, ReconcileAction::Create);
		assert_eq!(result.record.uid, 10_000);
		assert_eq!(manager.get_user("s1").await.unwrap(), Some(result.record));
	}

	#[tokio::test]
	async fn test_noop_does_not_write() {
		let store = Arc::new(MemoryStore::default());
		let manager = manager_with(Arc::clone(&store), FixedOwner(Ok(10_000)));
		let created = manager.reconcile(fresh(), None).await.unwrap();

		let again = manager
			.reconcile(fresh(), Some(created.record.clone()))
			.await
			.unwrap();
		assert_eq!(again.action, ReconcileAction::Noop);
		assert_eq!(again.record, created.record);
		assert_eq!(*store.writes.lock().unwrap(), 1);
	}

	#[tokio::test]
	async fn test_stale_snapshot_does_not_create_twice() {
		let store = Arc::new(MemoryStore::default());
		let manager = manager_with(Arc::clone(&store), FixedOwner(Ok(10_000)));
		let created = manager.reconcile(fresh(), None).await.unwrap();

		// A retried CREATE that still believes nothing is stored.
		let retried = manager.reconcile(fresh(), None).await.unwrap();
		assert_eq!(retried.action, ReconcileAction::Noop);
		assert_eq!(retried.record.uid, created.record.uid);
	}

	#[tokio::test]
	async fn test_subject_mismatch_is_rejected() {
		let manager = manager_with(Arc::new(MemoryStore::default()), FixedOwner(Ok(10_000)));
		let created = manager.reconcile(fresh(), None).await.unwrap();

		let mut other = fresh();
		other.sub = "s2".to_string();
		let err = manager
			.reconcile(other, Some(created.record))
			.await
			.unwrap_err();
		assert!(matches!(err, UsersError::SubjectMismatch { .. }));
	}

	#[tokio::test]
	async fn test_name_owned_by_other_subject_is_a_conflict() {
		let manager = manager_with(Arc::new(MemoryStore::default()), FixedOwner(Ok(10_000)));
		manager.reconcile(fresh(), None).await.unwrap();

		let mut other = fresh();
		other.sub = "s2".to_string();
		let err = manager.reconcile(other, None).await.unwrap_err();
		assert!(matches!(err, UsersError::NameConflict { name } if name == "a@x.com"));
	}

	#[tokio::test]
	async fn test_groups_keep_gids_and_new_groups_are_allocated() {
		let manager = manager_with(Arc::new(MemoryStore::default()), FixedOwner(Ok(10_000)));
		let mut user = fresh();
		user.groups = vec!["dev".to_string()];
		let created = manager.reconcile(user.clone(), None).await.unwrap();
		let dev = created.record.group_gid("dev").unwrap();
		assert_ne!(dev, created.record.gid);

		user.groups = vec!["ops".to_string(), "dev".to_string()];
		let updated = manager.update_user(user).await.unwrap();
		assert_eq!(updated.action, ReconcileAction::Update);
		assert_eq!(updated.record.group_gid("dev"), Some(dev));
		let ops = updated.record.group_gid("ops").unwrap();
		assert!(ops != dev && ops != created.record.gid);

		// A second user joining a known group reuses its GID.
		let second = UserInfo::new("b@x.com", "", "s2", "", "Bee", vec!["ops".to_string()]);
		let second = manager.reconcile(second, None).await.unwrap();
		assert_eq!(second.record.group_gid("ops"), Some(ops));
		assert_ne!(second.record.uid, created.record.uid);
	}

	#[tokio::test]
	async fn test_home_change_warns_on_foreign_owner() {
		let manager = manager_with(Arc::new(MemoryStore::default()), FixedOwner(Ok(4242)));
		manager.reconcile(fresh(), None).await.unwrap();

		let mut moved = fresh();
		moved.home = "/srv/a".to_string();
		let result = manager.update_user(moved).await.unwrap();
		assert_eq!(result.action, ReconcileAction::Update);
		assert_eq!(
			result.warnings,
			vec![ReconcileWarning::HomeOwnerMismatch {
				home: "/home/a@x.com".to_string(),
				expected_uid: 10_000,
				owner_uid: 4242,
			}]
		);
	}

	#[tokio::test]
	async fn test_home_change_with_unknown_owner_still_updates() {
		let manager = manager_with(Arc::new(MemoryStore::default()), FixedOwner(Err(())));
		manager.reconcile(fresh(), None).await.unwrap();

		let mut moved = fresh();
		moved.home = "/srv/a".to_string();
		let result = manager.update_user(moved).await.unwrap();
		assert_eq!(result.record.user.home, "/srv/a");
		assert!(matches!(
			result.warnings.as_slice(),
			[ReconcileWarning::HomeOwnerUnresolved { .. }]
		));
	}

	#[tokio::test]
	async fn test_claims_errors_pass_through() {
		let manager = manager_with(Arc::new(MemoryStore::default()), FixedOwner(Ok(10_000)));
		let claims = serde_json::json!({
			"sub": "s1",
			"email": "a@x.com",
			"email_verified": false,
		});
		let err = manager.update_user_from_claims(&claims).await.unwrap_err();
		assert!(err.is_for_display());
		assert_eq!(err.display_message(), Some("email not verified"));
	}

	#[tokio::test]
	async fn test_with_deadline_expires() {
		let err = with_deadline(
			Duration::from_millis(10),
			"sleep",
			async {
				tokio::time::sleep(Duration::from_secs(5)).await;
				Ok::<(), UsersError>(())
			},
		)
		.await
		.unwrap_err();
		assert!(matches!(err, UsersError::DeadlineExceeded { operation: "sleep" }));
		assert!(err.is_retryable());
	}
}
