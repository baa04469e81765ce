// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grant repository: (role, permission, node) triples.
//!
//! Writes enforce the catalog invariant, a permission is only ever stored on
//! a node of its own kind. Reads that receive a mismatched pair answer
//! "nothing" rather than failing.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool, SqliteRow};
use sqlx::{QueryBuilder, Row};
use std::collections::{BTreeSet, HashSet};
use trellis_server_auth::{NodeId, Permission, ResourceRef, RoleId};

use crate::error::DbError;
use crate::tree::{format_timestamp, parse_uuid};

/// A stored grant, with the role's key for display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantRecord {
	pub role_id: RoleId,
	pub role_name: String,
	pub permission: Permission,
	pub resource: ResourceRef,
}

#[async_trait]
pub trait GrantStore: Send + Sync {
	async fn grant(
		&self,
		role_id: &RoleId,
		permission: Permission,
		resource: &ResourceRef,
	) -> Result<bool, DbError>;
	async fn has_grant(
		&self,
		roles: &HashSet<RoleId>,
		permission: Permission,
		resource: &ResourceRef,
	) -> Result<bool, DbError>;
	async fn permissions_for_roles(
		&self,
		roles: &HashSet<RoleId>,
		resource: &ResourceRef,
	) -> Result<BTreeSet<Permission>, DbError>;
	async fn resources_with_permission(
		&self,
		roles: &HashSet<RoleId>,
		permission: Permission,
	) -> Result<Vec<ResourceRef>, DbError>;
	async fn list_grants_for_resource(
		&self,
		resource: &ResourceRef,
	) -> Result<Vec<GrantRecord>, DbError>;
}

/// Repository for grant database operations.
#[derive(Clone)]
pub struct GrantRepository {
	pool: SqlitePool,
}

impl GrantRepository {
	/// Create a new repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Grant `permission` to a role on one node, on an existing connection or
	/// transaction.
	///
	/// # Returns
	/// `true` if the grant was new, `false` if it already existed.
	///
	/// # Errors
	/// Returns `DbError::Tree(TreeError::PermissionScope)` if the permission
	/// belongs to another node kind.
	#[tracing::instrument(skip(conn), fields(role_id = %role_id, permission = %permission, resource = %resource))]
	pub async fn grant_in(
		conn: &mut SqliteConnection,
		role_id: &RoleId,
		permission: Permission,
		resource: &ResourceRef,
	) -> Result<bool, DbError> {
		permission.ensure_applies_to(resource.kind)?;

		let inserted = sqlx::query(
			r#"
			INSERT INTO grants (role_id, permission, node_id, created_at)
			VALUES (?, ?, ?, ?)
			ON CONFLICT(role_id, permission, node_id) DO NOTHING
			"#,
		)
		.bind(role_id.to_string())
		.bind(permission.codename())
		.bind(resource.id.to_string())
		.bind(format_timestamp(Utc::now()))
		.execute(&mut *conn)
		.await?
		.rows_affected();

		Ok(inserted == 1)
	}

	#[tracing::instrument(skip(self), fields(role_id = %role_id, permission = %permission))]
	pub async fn grant(
		&self,
		role_id: &RoleId,
		permission: Permission,
		resource: &ResourceRef,
	) -> Result<bool, DbError> {
		let mut conn = self.pool.acquire().await?;
		Self::grant_in(&mut conn, role_id, permission, resource).await
	}

	/// Returns true if any of `roles` holds `permission` on the resource.
	#[tracing::instrument(skip(self, roles), fields(roles = roles.len(), permission = %permission, resource = %resource))]
	pub async fn has_grant(
		&self,
		roles: &HashSet<RoleId>,
		permission: Permission,
		resource: &ResourceRef,
	) -> Result<bool, DbError> {
		if roles.is_empty() || !permission.applies_to(resource.kind) {
			return Ok(false);
		}

		let mut query = QueryBuilder::<Sqlite>::new(
			"SELECT EXISTS(SELECT 1 FROM grants WHERE permission = ",
		);
		query.push_bind(permission.codename());
		query.push(" AND node_id = ");
		query.push_bind(resource.id.to_string());
		push_role_filter(&mut query, roles);
		query.push(")");

		let found = query.build_query_scalar::<bool>().fetch_one(&self.pool).await?;
		Ok(found)
	}

	/// Every permission `roles` hold on the resource.
	#[tracing::instrument(skip(self, roles), fields(roles = roles.len(), resource = %resource))]
	pub async fn permissions_for_roles(
		&self,
		roles: &HashSet<RoleId>,
		resource: &ResourceRef,
	) -> Result<BTreeSet<Permission>, DbError> {
		if roles.is_empty() {
			return Ok(BTreeSet::new());
		}

		let mut query = QueryBuilder::<Sqlite>::new(
			"SELECT DISTINCT g.permission FROM grants g JOIN nodes n ON n.id = g.node_id WHERE g.node_id = ",
		);
		query.push_bind(resource.id.to_string());
		query.push(" AND n.kind = ");
		query.push_bind(resource.kind.as_str());
		push_role_filter(&mut query, roles);

		let codenames = query.build_query_scalar::<String>().fetch_all(&self.pool).await?;
		codenames
			.iter()
			.map(|c| {
				c.parse::<Permission>()
					.map_err(|e| DbError::Internal(format!("Invalid stored permission: {e}")))
			})
			.collect()
	}

	/// Nodes on which any of `roles` holds `permission`, newest first.
	#[tracing::instrument(skip(self, roles), fields(roles = roles.len(), permission = %permission))]
	pub async fn resources_with_permission(
		&self,
		roles: &HashSet<RoleId>,
		permission: Permission,
	) -> Result<Vec<ResourceRef>, DbError> {
		if roles.is_empty() {
			return Ok(Vec::new());
		}

		let mut query = QueryBuilder::<Sqlite>::new(
			"SELECT g.node_id, MAX(n.created_at) AS created_at FROM grants g JOIN nodes n ON n.id = g.node_id WHERE g.permission = ",
		);
		query.push_bind(permission.codename());
		push_role_filter(&mut query, roles);
		query.push(" GROUP BY g.node_id ORDER BY created_at DESC, g.node_id");

		let rows = query.build().fetch_all(&self.pool).await?;
		rows.iter()
			.map(|row| {
				let id: String = row.get("node_id");
				Ok(ResourceRef::new(
					permission.kind,
					NodeId::new(parse_uuid(&id, "node ID")?),
				))
			})
			.collect()
	}

	/// All grants stored on one node, ordered by role key then permission.
	#[tracing::instrument(skip(self), fields(resource = %resource))]
	pub async fn list_grants_for_resource(
		&self,
		resource: &ResourceRef,
	) -> Result<Vec<GrantRecord>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT g.role_id, r.name AS role_name, g.permission, g.node_id
			FROM grants g
			INNER JOIN roles r ON r.id = g.role_id
			WHERE g.node_id = ?
			ORDER BY r.name, g.permission
			"#,
		)
		.bind(resource.id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(|r| row_to_grant(r, resource)).collect()
	}
}

fn push_role_filter(query: &mut QueryBuilder<'_, Sqlite>, roles: &HashSet<RoleId>) {
	query.push(" AND role_id IN (");
	let mut ids = query.separated(", ");
	for role in roles {
		ids.push_bind(role.to_string());
	}
	ids.push_unseparated(")");
}

fn row_to_grant(row: &SqliteRow, resource: &ResourceRef) -> Result<GrantRecord, DbError> {
	let role_id: String = row.get("role_id");
	let permission: String = row.get("permission");

	Ok(GrantRecord {
		role_id: RoleId::new(parse_uuid(&role_id, "role ID")?),
		role_name: row.get("role_name"),
		permission: permission
			.parse()
			.map_err(|e| DbError::Internal(format!("Invalid stored permission: {e}")))?,
		resource: *resource,
	})
}

#[async_trait]
impl GrantStore for GrantRepository {
	async fn grant(
		&self,
		role_id: &RoleId,
		permission: Permission,
		resource: &ResourceRef,
	) -> Result<bool, DbError> {
		self.grant(role_id, permission, resource).await
	}

	async fn has_grant(
		&self,
		roles: &HashSet<RoleId>,
		permission: Permission,
		resource: &ResourceRef,
	) -> Result<bool, DbError> {
		self.has_grant(roles, permission, resource).await
	}

	async fn permissions_for_roles(
		&self,
		roles: &HashSet<RoleId>,
		resource: &ResourceRef,
	) -> Result<BTreeSet<Permission>, DbError> {
		self.permissions_for_roles(roles, resource).await
	}

	async fn resources_with_permission(
		&self,
		roles: &HashSet<RoleId>,
		permission: Permission,
	) -> Result<Vec<ResourceRef>, DbError> {
		self.resources_with_permission(roles, permission).await
	}

	async fn list_grants_for_resource(
		&self,
		resource: &ResourceRef,
	) -> Result<Vec<GrantRecord>, DbError> {
		self.list_grants_for_resource(resource).await
	}
}
