// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User record repository.
//!
//! Persists [`StoredRecord`]s: the identity asserted by a provider together
//! with the UID, private-group GID and supplementary group GIDs allocated for
//! it. Records are keyed by provider subject (`sub`).

use std::collections::BTreeSet;

use async_trait::async_trait;
use authd_users_core::{GroupEntry, IdKind, StoredRecord, UserInfo};
use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::{conflict_on_unique, DbError};

#[async_trait]
pub trait UserStore: Send + Sync {
	async fn get_user_by_sub(&self, sub: &str) -> Result<Option<StoredRecord>, DbError>;
	async fn get_user_by_name(&self, name: &str) -> Result<Option<StoredRecord>, DbError>;
	async fn get_group_by_name(&self, name: &str) -> Result<Option<GroupEntry>, DbError>;
	async fn upsert_user(&self, record: &StoredRecord) -> Result<(), DbError>;
	async fn list_used_ids(&self, kind: IdKind) -> Result<BTreeSet<u32>, DbError>;
}

#[async_trait]
impl UserStore for UserRepository {
	async fn get_user_by_sub(&self, sub: &str) -> Result<Option<StoredRecord>, DbError> {
		self.get_user_by_sub(sub).await
	}

	async fn get_user_by_name(&self, name: &str) -> Result<Option<StoredRecord>, DbError> {
		self.get_user_by_name(name).await
	}

	async fn get_group_by_name(&self, name: &str) -> Result<Option<GroupEntry>, DbError> {
		self.get_group_by_name(name).await
	}

	async fn upsert_user(&self, record: &StoredRecord) -> Result<(), DbError> {
		self.upsert_user(record).await
	}

	async fn list_used_ids(&self, kind: IdKind) -> Result<BTreeSet<u32>, DbError> {
		self.list_used_ids(kind).await
	}
}

/// Repository for user record database operations.
#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	/// Create a new user repository with the given pool.
	///
	/// # Arguments
	/// * `pool` - SQLite connection pool with migrations applied
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Get the record for a provider subject.
	///
	/// # Returns
	/// `None` if the subject has never been reconciled.
	#[tracing::instrument(skip(self))]
	pub async fn get_user_by_sub(&self, sub: &str) -> Result<Option<StoredRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT sub, name, uid, gid, home, shell, gecos
			FROM users
			WHERE sub = ?
			"#,
		)
		.bind(sub)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(self.load_record(&row).await?)),
			None => Ok(None),
		}
	}

	/// Get the record that owns a login name.
	#[tracing::instrument(skip(self))]
	pub async fn get_user_by_name(&self, name: &str) -> Result<Option<StoredRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT sub, name, uid, gid, home, shell, gecos
			FROM users
			WHERE name = ?
			"#,
		)
		.bind(name)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => Ok(Some(self.load_record(&row).await?)),
			None => Ok(None),
		}
	}

	/// Get a supplementary group by name.
	#[tracing::instrument(skip(self))]
	pub async fn get_group_by_name(&self, name: &str) -> Result<Option<GroupEntry>, DbError> {
		let row = sqlx::query("SELECT name, gid FROM supplementary_groups WHERE name = ?")
			.bind(name)
			.fetch_optional(&self.pool)
			.await?;

		match row {
			Some(row) => Ok(Some(GroupEntry {
				name: row.get("name"),
				gid: id_from_row(&row, "gid")?,
			})),
			None => Ok(None),
		}
	}

	/// Insert or update a record in a single transaction.
	///
	/// Supplementary groups are created on first use and the member list is
	/// replaced in record order. Nothing is written if any step fails.
	///
	/// # Database Constraints
	/// - `name`, `uid` and group `gid` must be unique
	/// - the `uid` of an existing subject cannot change
	/// - a known group keeps its `gid`
	#[tracing::instrument(skip(self, record), fields(sub = %record.user.sub, uid = record.uid))]
	pub async fn upsert_user(&self, record: &StoredRecord) -> Result<(), DbError> {
		if record.groups.len() != record.user.groups.len()
			|| record
				.groups
				.iter()
				.zip(&record.user.groups)
				.any(|(entry, name)| &entry.name != name)
		{
			return Err(DbError::Internal(format!(
				"group entries of {} do not match its group names",
				record.user.sub
			)));
		}

		let now = Utc::now().to_rfc3339();
		let user = &record.user;
		let mut tx = self.pool.begin().await?;

		let result = sqlx::query(
			r#"
			INSERT INTO users (sub, name, uid, gid, home, shell, gecos, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			ON CONFLICT(sub) DO UPDATE SET
				name = excluded.name,
				gid = excluded.gid,
				home = excluded.home,
				shell = excluded.shell,
				gecos = excluded.gecos,
				updated_at = excluded.updated_at
			WHERE users.uid = excluded.uid
			"#,
		)
		.bind(&user.sub)
		.bind(&user.name)
		.bind(i64::from(record.uid))
		.bind(i64::from(record.gid))
		.bind(&user.home)
		.bind(&user.shell)
		.bind(&user.gecos)
		.bind(&now)
		.bind(&now)
		.execute(&mut *tx)
		.await
		.map_err(|e| {
			conflict_on_unique(e, || {
				format!(
					"name {} or uid {} is already used by another subject",
					user.name, record.uid
				)
			})
		})?;

		if result.rows_affected() == 0 {
			return Err(DbError::Conflict(format!(
				"uid of subject {} cannot change",
				user.sub
			)));
		}

		for entry in &record.groups {
			sqlx::query(
				r#"
				INSERT INTO supplementary_groups (name, gid, created_at)
				VALUES (?, ?, ?)
				ON CONFLICT(name) DO NOTHING
				"#,
			)
			.bind(&entry.name)
			.bind(i64::from(entry.gid))
			.bind(&now)
			.execute(&mut *tx)
			.await
			.map_err(|e| {
				conflict_on_unique(e, || format!("gid {} is already used by another group", entry.gid))
			})?;

			let row = sqlx::query("SELECT gid FROM supplementary_groups WHERE name = ?")
				.bind(&entry.name)
				.fetch_one(&mut *tx)
				.await?;
			let stored_gid = id_from_row(&row, "gid")?;
			if stored_gid != entry.gid {
				return Err(DbError::Conflict(format!(
					"group {} already has gid {stored_gid}, not {}",
					entry.name, entry.gid
				)));
			}
		}

		sqlx::query("DELETE FROM user_group_members WHERE sub = ?")
			.bind(&user.sub)
			.execute(&mut *tx)
			.await?;

		for (position, entry) in record.groups.iter().enumerate() {
			sqlx::query(
				r#"
				INSERT INTO user_group_members (sub, group_name, position)
				VALUES (?, ?, ?)
				"#,
			)
			.bind(&user.sub)
			.bind(&entry.name)
			.bind(position as i64)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;

		tracing::debug!(sub = %user.sub, uid = record.uid, gid = record.gid, "user record stored");
		Ok(())
	}

	/// Identifiers already claimed by stored records.
	///
	/// The GID set covers both private and supplementary groups.
	#[tracing::instrument(skip(self))]
	pub async fn list_used_ids(&self, kind: IdKind) -> Result<BTreeSet<u32>, DbError> {
		let query = match kind {
			IdKind::Uid => "SELECT uid AS id FROM users",
			IdKind::Gid => "SELECT gid AS id FROM users UNION SELECT gid AS id FROM supplementary_groups",
		};

		let rows = sqlx::query(query).fetch_all(&self.pool).await?;
		rows.iter().map(|row| id_from_row(row, "id")).collect()
	}

	async fn load_record(&self, row: &sqlx::sqlite::SqliteRow) -> Result<StoredRecord, DbError> {
		let sub: String = row.get("sub");

		let group_rows = sqlx::query(
			r#"
			SELECT m.group_name, g.gid
			FROM user_group_members m
			JOIN supplementary_groups g ON g.name = m.group_name
			WHERE m.sub = ?
			ORDER BY m.position
			"#,
		)
		.bind(&sub)
		.fetch_all(&self.pool)
		.await?;

		let groups = group_rows
			.iter()
			.map(|r| {
				Ok(GroupEntry {
					name: r.get("group_name"),
					gid: id_from_row(r, "gid")?,
				})
			})
			.collect::<Result<Vec<_>, DbError>>()?;

		Ok(StoredRecord {
			user: UserInfo {
				name: row.get("name"),
				home: row.get("home"),
				sub,
				shell: row.get("shell"),
				gecos: row.get("gecos"),
				groups: groups.iter().map(|g| g.name.clone()).collect(),
			},
			uid: id_from_row(row, "uid")?,
			gid: id_from_row(row, "gid")?,
			groups,
		})
	}
}

fn id_from_row(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<u32, DbError> {
	let value: i64 = row.get(column);
	u32::try_from(value)
		.map_err(|_| DbError::Internal(format!("stored {column} {value} is not a valid id")))
}
