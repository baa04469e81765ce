// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Role membership.
//!
//! Which principals belong to which roles is owned by the identity system.
//! Permission checks only consume [`MembershipSource::roles_of`]; the
//! [`MembershipRepository`] is the SQLite-backed default.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use std::collections::HashSet;
use trellis_server_auth::{PrincipalId, RoleId};

use crate::error::DbError;
use crate::tree::{format_timestamp, parse_uuid};

/// Answers "which roles does this principal hold".
#[async_trait]
pub trait MembershipSource: Send + Sync {
	async fn roles_of(&self, principal: &PrincipalId) -> Result<HashSet<RoleId>, DbError>;
}

#[derive(Clone)]
pub struct MembershipRepository {
	pool: SqlitePool,
}

impl MembershipRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Add a principal to a role. Adding an existing member is a no-op.
	///
	/// # Errors
	/// Returns `DbError::NotFound` if the role does not exist.
	#[tracing::instrument(skip(self), fields(role_id = %role_id, principal_id = %principal))]
	pub async fn add_member(&self, role_id: &RoleId, principal: &PrincipalId) -> Result<(), DbError> {
		let result = sqlx::query(
			r#"
			INSERT INTO role_memberships (role_id, principal_id, created_at)
			SELECT id, ?, ? FROM roles WHERE id = ?
			ON CONFLICT(role_id, principal_id) DO NOTHING
			"#,
		)
		.bind(principal.to_string())
		.bind(format_timestamp(Utc::now()))
		.bind(role_id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 && !self.role_exists(role_id).await? {
			return Err(DbError::NotFound(format!("role {role_id}")));
		}

		tracing::debug!(role_id = %role_id, principal_id = %principal, "member added");
		Ok(())
	}

	/// Remove a principal from a role.
	///
	/// # Returns
	/// `true` if the principal was a member.
	#[tracing::instrument(skip(self), fields(role_id = %role_id, principal_id = %principal))]
	pub async fn remove_member(
		&self,
		role_id: &RoleId,
		principal: &PrincipalId,
	) -> Result<bool, DbError> {
		let result =
			sqlx::query("DELETE FROM role_memberships WHERE role_id = ? AND principal_id = ?")
				.bind(role_id.to_string())
				.bind(principal.to_string())
				.execute(&self.pool)
				.await?;

		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self), fields(role_id = %role_id))]
	pub async fn list_members(&self, role_id: &RoleId) -> Result<Vec<PrincipalId>, DbError> {
		let ids: Vec<String> = sqlx::query_scalar(
			"SELECT principal_id FROM role_memberships WHERE role_id = ? ORDER BY created_at, principal_id",
		)
		.bind(role_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		ids.iter()
			.map(|id| parse_uuid(id, "principal ID").map(PrincipalId::new))
			.collect()
	}

	#[tracing::instrument(skip(self), fields(principal_id = %principal))]
	pub async fn roles_of(&self, principal: &PrincipalId) -> Result<HashSet<RoleId>, DbError> {
		let ids: Vec<String> =
			sqlx::query_scalar("SELECT role_id FROM role_memberships WHERE principal_id = ?")
				.bind(principal.to_string())
				.fetch_all(&self.pool)
				.await?;

		ids.iter()
			.map(|id| parse_uuid(id, "role ID").map(RoleId::new))
			.collect()
	}

	async fn role_exists(&self, role_id: &RoleId) -> Result<bool, DbError> {
		let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM roles WHERE id = ?)")
			.bind(role_id.to_string())
			.fetch_one(&self.pool)
			.await?;
		Ok(found)
	}
}

#[async_trait]
impl MembershipSource for MembershipRepository {
	async fn roles_of(&self, principal: &PrincipalId) -> Result<HashSet<RoleId>, DbError> {
		self.roles_of(principal).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::role::RoleRepository;
	use crate::testing::create_test_pool;
	use trellis_server_auth::{RoleKeying, RoleName};

	#[tokio::test]
	async fn membership_lifecycle() {
		let pool = create_test_pool().await;
		let roles = RoleRepository::new(pool.clone(), RoleKeying::NodeId);
		let members = MembershipRepository::new(pool);
		let admin = roles.get_or_create_role(&RoleName::Admin).await.unwrap();
		let manager = roles.get_or_create_role(&RoleName::Manager).await.unwrap();
		let alice = PrincipalId::generate();

		assert!(members.roles_of(&alice).await.unwrap().is_empty());

		members.add_member(&admin.id, &alice).await.unwrap();
		members.add_member(&admin.id, &alice).await.unwrap();
		members.add_member(&manager.id, &alice).await.unwrap();
		assert_eq!(
			members.roles_of(&alice).await.unwrap(),
			HashSet::from([admin.id, manager.id])
		);
		assert_eq!(members.list_members(&admin.id).await.unwrap(), vec![alice]);

		assert!(members.remove_member(&admin.id, &alice).await.unwrap());
		assert!(!members.remove_member(&admin.id, &alice).await.unwrap());
		assert_eq!(
			members.roles_of(&alice).await.unwrap(),
			HashSet::from([manager.id])
		);
	}

	#[tokio::test]
	async fn adding_to_unknown_role_fails() {
		let members = MembershipRepository::new(create_test_pool().await);
		let result = members
			.add_member(&RoleId::generate(), &PrincipalId::generate())
			.await;
		assert!(matches!(result, Err(DbError::NotFound(_))));
	}
}
