// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role repository.
//!
//! Roles are identified by their unique key (see [`RoleName::key`]).
//! [`RoleRepository::get_or_create_in`] is safe under concurrent callers: the
//! insert is a no-op on a key conflict and the row is then read back, so two
//! writers racing on the same key both end up with the same role.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use trellis_server_auth::{Role, RoleId, RoleKeying, RoleName};

use crate::error::DbError;
use crate::tree::{format_timestamp, parse_timestamp, parse_uuid};

#[async_trait]
pub trait RoleStore: Send + Sync {
	async fn get_or_create_role(&self, name: &RoleName) -> Result<Role, DbError>;
	async fn get_role(&self, name: &RoleName) -> Result<Option<Role>, DbError>;
	async fn get_role_by_key(&self, key: &str) -> Result<Option<Role>, DbError>;
	async fn list_roles(&self) -> Result<Vec<Role>, DbError>;
}

/// Repository for role database operations.
#[derive(Clone)]
pub struct RoleRepository {
	pool: SqlitePool,
	keying: RoleKeying,
}

impl RoleRepository {
	/// Create a new repository with the given pool and role keying.
	pub fn new(pool: SqlitePool, keying: RoleKeying) -> Self {
		Self { pool, keying }
	}

	pub fn keying(&self) -> RoleKeying {
		self.keying
	}

	/// Get the role for `name`, creating it if missing, on an existing
	/// connection or transaction.
	#[tracing::instrument(skip(conn, name), fields(role = %name.display_name()))]
	pub async fn get_or_create_in(
		conn: &mut SqliteConnection,
		name: &RoleName,
		keying: RoleKeying,
	) -> Result<Role, DbError> {
		let candidate = Role::new(name, keying);
		let inserted = sqlx::query(
			r#"
			INSERT INTO roles (id, name, display_name, created_at)
			VALUES (?, ?, ?, ?)
			ON CONFLICT(name) DO NOTHING
			"#,
		)
		.bind(candidate.id.to_string())
		.bind(&candidate.name)
		.bind(&candidate.display_name)
		.bind(format_timestamp(candidate.created_at))
		.execute(&mut *conn)
		.await?
		.rows_affected();

		if inserted == 1 {
			tracing::debug!(role_id = %candidate.id, key = %candidate.name, "role created");
			return Ok(candidate);
		}

		Self::by_key_in(conn, &candidate.name)
			.await?
			.ok_or_else(|| DbError::Internal(format!("role {} vanished after insert", candidate.name)))
	}

	async fn by_key_in(conn: &mut SqliteConnection, key: &str) -> Result<Option<Role>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, name, display_name, created_at
			FROM roles
			WHERE name = ?
			"#,
		)
		.bind(key)
		.fetch_optional(&mut *conn)
		.await?;

		row.map(|r| row_to_role(&r)).transpose()
	}

	#[tracing::instrument(skip(self, name), fields(role = %name.display_name()))]
	pub async fn get_or_create_role(&self, name: &RoleName) -> Result<Role, DbError> {
		let mut conn = self.pool.acquire().await?;
		Self::get_or_create_in(&mut conn, name, self.keying).await
	}

	/// Look up a role by name under this repository's keying.
	pub async fn get_role(&self, name: &RoleName) -> Result<Option<Role>, DbError> {
		self.get_role_by_key(&name.key(self.keying)).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_role_by_key(&self, key: &str) -> Result<Option<Role>, DbError> {
		let mut conn = self.pool.acquire().await?;
		Self::by_key_in(&mut conn, key).await
	}

	/// List all roles, ordered by key.
	#[tracing::instrument(skip(self))]
	pub async fn list_roles(&self) -> Result<Vec<Role>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, name, display_name, created_at
			FROM roles
			ORDER BY name
			"#,
		)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_role).collect()
	}

	/// Ensure the two global roles exist.
	#[tracing::instrument(skip(self))]
	pub async fn ensure_global_roles(&self) -> Result<(), DbError> {
		let mut conn = self.pool.acquire().await?;
		for name in [RoleName::Admin, RoleName::Manager] {
			Self::get_or_create_in(&mut conn, &name, self.keying).await?;
		}
		tracing::info!("global roles ensured");
		Ok(())
	}
}

fn row_to_role(row: &SqliteRow) -> Result<Role, DbError> {
	let id: String = row.get("id");
	let created_at: String = row.get("created_at");

	Ok(Role {
		id: RoleId::new(parse_uuid(&id, "role ID")?),
		name: row.get("name"),
		display_name: row.get("display_name"),
		created_at: parse_timestamp(&created_at)?,
	})
}

#[async_trait]
impl RoleStore for RoleRepository {
	async fn get_or_create_role(&self, name: &RoleName) -> Result<Role, DbError> {
		self.get_or_create_role(name).await
	}

	async fn get_role(&self, name: &RoleName) -> Result<Option<Role>, DbError> {
		self.get_role(name).await
	}

	async fn get_role_by_key(&self, key: &str) -> Result<Option<Role>, DbError> {
		self.get_role_by_key(key).await
	}

	async fn list_roles(&self) -> Result<Vec<Role>, DbError> {
		self.list_roles().await
	}
}
