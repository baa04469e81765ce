// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioning engine.
//!
//! Creating a node and writing its grants is one unit of work. The parent
//! chain is read first, outside the transaction; the transaction then starts
//! with the node insert, get-or-creates every role of the
//! [`ProvisioningPlan`] and writes every grant. Any failure drops the
//! transaction, which rolls back the node, the new roles and the grants
//! together.

use sqlx::sqlite::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use trellis_server_auth::{
	Company, NewNode, Node, Organization, Project, ProvisioningPlan, Resource, ResourceRef, Role,
	RoleKeying, Task,
};
use trellis_server_db::{GrantRepository, NodeRepository, RoleRepository};

use crate::error::{RbacError, Result};

/// What a provisioning run wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningOutcome {
	pub resource: ResourceRef,
	/// Every role the plan touched, whether new or existing.
	pub roles: Vec<Role>,
	/// Grants that did not exist before this run.
	pub new_grants: usize,
	/// Grants the plan asked for.
	pub planned_grants: usize,
}

/// Creates nodes together with their grants.
#[derive(Clone)]
pub struct ProvisioningEngine {
	pool: SqlitePool,
	keying: RoleKeying,
}

impl ProvisioningEngine {
	pub fn new(pool: SqlitePool, keying: RoleKeying) -> Self {
		Self { pool, keying }
	}

	pub fn keying(&self) -> RoleKeying {
		self.keying
	}

	/// Create a node and provision it atomically.
	///
	/// # Errors
	/// - `RbacError::Validation` for invalid input, a missing parent, or a
	///   parent of the wrong kind. Nothing is written.
	/// - `RbacError::Integrity` if the parent's stored chain is broken.
	/// - `RbacError::Database` if any write fails. The node, its grants and
	///   any role created on the way are rolled back.
	#[tracing::instrument(skip(self, input), fields(kind = %input.kind, parent = ?input.parent))]
	pub async fn create_and_provision(&self, input: NewNode) -> Result<Node> {
		let node = {
			let mut conn = self.pool.acquire().await?;
			NodeRepository::prepare_in(&mut conn, input).await?
		};
		let plan = ProvisioningPlan::for_resource(&node);

		let mut tx = self.pool.begin().await?;
		NodeRepository::insert_in(&mut tx, &node).await?;
		let outcome = execute_plan(&mut tx, &plan, self.keying).await?;
		tx.commit().await?;

		tracing::info!(
			node_id = %node.id(),
			kind = %node.kind(),
			roles = outcome.roles.len(),
			grants = outcome.new_grants,
			"node created and provisioned"
		);
		Ok(node)
	}

	/// Re-run provisioning for a node that already exists.
	///
	/// Only the node's id is taken from `node`; the plan is built from the
	/// stored ancestor chain. Nodes are never updated, so the chain read before
	/// the transaction is still current when the grants are written. Safe to
	/// repeat: roles and grants are only added when missing.
	///
	/// # Errors
	/// - `RbacError::Validation` if no node with this id and kind is stored.
	/// - `RbacError::Integrity` if the stored chain is broken.
	#[tracing::instrument(skip(self, node), fields(node_id = %node.id(), kind = %node.kind()))]
	pub async fn provision<R: Resource + ?Sized>(&self, node: &R) -> Result<ProvisioningOutcome> {
		let stored = {
			let mut conn = self.pool.acquire().await?;
			NodeRepository::load_in(&mut conn, &node.id()).await?
		};
		let stored = match stored {
			Some(stored) if stored.kind() == node.kind() => stored,
			_ => {
				return Err(RbacError::Validation(format!(
					"{} {} does not exist",
					node.kind(),
					node.id()
				)))
			}
		};
		let plan = ProvisioningPlan::for_resource(&stored);

		let mut tx = self.pool.begin().await?;
		let outcome = execute_plan(&mut tx, &plan, self.keying).await?;
		tx.commit().await?;

		tracing::info!(
			node_id = %stored.id(),
			new_grants = outcome.new_grants,
			planned_grants = outcome.planned_grants,
			"node provisioned"
		);
		Ok(outcome)
	}

	pub async fn create_organization(
		&self,
		name: impl Into<String>,
		is_managed: bool,
	) -> Result<Organization> {
		let node = self
			.create_and_provision(NewNode::organization(name).managed(is_managed))
			.await?;
		Ok(Organization::try_from(node)?)
	}

	pub async fn create_company(
		&self,
		organization: &Organization,
		name: impl Into<String>,
	) -> Result<Company> {
		let node = self
			.create_and_provision(NewNode::company(organization.id, name))
			.await?;
		Ok(Company::try_from(node)?)
	}

	pub async fn create_project(
		&self,
		company: &Company,
		name: impl Into<String>,
	) -> Result<Project> {
		let node = self
			.create_and_provision(NewNode::project(company.id, name))
			.await?;
		Ok(Project::try_from(node)?)
	}

	pub async fn create_task(&self, project: &Project, name: impl Into<String>) -> Result<Task> {
		let node = self
			.create_and_provision(NewNode::task(project.id, name))
			.await?;
		Ok(Task::try_from(node)?)
	}
}

/// Writes a plan on the caller's transaction. Roles first, then grants.
async fn execute_plan(
	conn: &mut SqliteConnection,
	plan: &ProvisioningPlan,
	keying: RoleKeying,
) -> Result<ProvisioningOutcome> {
	let mut role_ids = HashMap::with_capacity(plan.roles.len());
	let mut roles = Vec::with_capacity(plan.roles.len());
	for name in &plan.roles {
		let role = RoleRepository::get_or_create_in(&mut *conn, name, keying).await?;
		role_ids.insert(name, role.id);
		roles.push(role);
	}

	let mut new_grants = 0;
	for grant in &plan.grants {
		let role_id = role_ids.get(&grant.role).ok_or_else(|| {
			RbacError::Integrity(format!(
				"plan grants {} to {} which it does not create",
				grant.permission,
				grant.role.display_name()
			))
		})?;
		if GrantRepository::grant_in(&mut *conn, role_id, grant.permission, &plan.resource).await? {
			new_grants += 1;
		}
	}

	Ok(ProvisioningOutcome {
		resource: plan.resource,
		roles,
		new_grants,
		planned_grants: plan.grants.len(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashSet;
	use trellis_server_auth::{NodeId, NodeKind, RoleName};
	use trellis_server_db::testing::create_test_pool;

	async fn engine() -> (ProvisioningEngine, SqlitePool) {
		let pool = create_test_pool().await;
		(ProvisioningEngine::new(pool.clone(), RoleKeying::NodeId), pool)
	}

	async fn count(pool: &SqlitePool, table: &str) -> i64 {
		sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
			.fetch_one(pool)
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn organization_gets_its_grants() {
		let (engine, pool) = engine().await;
		let org = engine.create_organization("Moose CAN", true).await.unwrap();

		assert_eq!(org.name, "Moose CAN");
		assert_eq!(count(&pool, "nodes").await, 1);
		assert_eq!(count(&pool, "roles").await, 4);
		assert_eq!(count(&pool, "grants").await, 13);
	}

	#[tokio::test]
	async fn unmanaged_organization_has_no_manager_grants() {
		let (engine, pool) = engine().await;
		engine.create_organization("Moose USA", false).await.unwrap();
		assert_eq!(count(&pool, "roles").await, 4);
		assert_eq!(count(&pool, "grants").await, 9);
	}

	#[tokio::test]
	async fn children_share_ancestor_roles() {
		let (engine, pool) = engine().await;
		let org = engine.create_organization("Moose CAN", true).await.unwrap();
		let company = engine.create_company(&org, "Honda CAN").await.unwrap();
		let project = engine.create_project(&company, "BC Honda").await.unwrap();
		let task = engine.create_task(&project, "Paint fence").await.unwrap();

		assert_eq!(task.organization().id, org.id);
		// 4 roles for the org, 2 more for the company, none after that.
		assert_eq!(count(&pool, "roles").await, 6);
		assert_eq!(count(&pool, "grants").await, 13 + 18 * 3);
	}

	#[tokio::test]
	async fn invalid_input_writes_nothing() {
		let (engine, pool) = engine().await;
		let org = engine.create_organization("Moose CAN", true).await.unwrap();
		let before = count(&pool, "grants").await;

		let blank = engine.create_company(&org, "   ").await;
		assert!(matches!(blank, Err(RbacError::Validation(_))));

		let orphan = engine
			.create_and_provision(NewNode::project(NodeId::generate(), "Orphan"))
			.await;
		assert!(matches!(orphan, Err(RbacError::Validation(_))));

		let wrong_parent = engine
			.create_and_provision(NewNode::task(org.id, "Misplaced"))
			.await;
		assert!(matches!(wrong_parent, Err(RbacError::Validation(_))));

		assert_eq!(count(&pool, "nodes").await, 1);
		assert_eq!(count(&pool, "grants").await, before);
	}

	#[tokio::test]
	async fn provision_is_idempotent() {
		let (engine, pool) = engine().await;
		let org = engine.create_organization("Moose CAN", true).await.unwrap();
		let company = engine.create_company(&org, "Honda CAN").await.unwrap();
		let grants = count(&pool, "grants").await;

		let outcome = engine.provision(&company).await.unwrap();
		assert_eq!(outcome.new_grants, 0);
		assert_eq!(outcome.planned_grants, 18);
		assert_eq!(outcome.resource.kind, NodeKind::Company);
		assert_eq!(outcome.roles.len(), 6);
		assert_eq!(count(&pool, "grants").await, grants);
	}

	#[tokio::test]
	async fn provision_plans_from_the_stored_chain() {
		let (engine, pool) = engine().await;
		let usa = engine.create_organization("Moose USA", false).await.unwrap();
		let honda_usa = engine.create_company(&usa, "Honda USA").await.unwrap();
		let can = engine.create_organization("Moose CAN", true).await.unwrap();
		let grants = count(&pool, "grants").await;

		// Same id, but claims to sit under the managed organization.
		let relocated = Company {
			organization: can.clone(),
			..honda_usa.clone()
		};
		let outcome = engine.provision(&relocated).await.unwrap();
		assert_eq!(outcome.new_grants, 0);
		assert_eq!(outcome.planned_grants, 14);
		assert_eq!(count(&pool, "grants").await, grants);

		let roles = RoleRepository::new(pool.clone(), RoleKeying::NodeId);
		let can_admin = roles
			.get_role(&RoleName::org_admin(&can))
			.await
			.unwrap()
			.unwrap();
		let manager = roles.get_role(&RoleName::Manager).await.unwrap().unwrap();
		let store = GrantRepository::new(pool);
		let change_company = "change_company".parse().unwrap();
		for role in [can_admin.id, manager.id] {
			let held = store
				.has_grant(&HashSet::from([role]), change_company, &honda_usa.resource_ref())
				.await
				.unwrap();
			assert!(!held);
		}
	}

	#[tokio::test]
	async fn provision_rejects_unstored_nodes() {
		let (engine, pool) = engine().await;
		let ghost = Organization::new("Moose Ghost", true);
		let result = engine.provision(&ghost).await;
		assert!(matches!(result, Err(RbacError::Validation(_))));

		let org = engine.create_organization("Moose CAN", true).await.unwrap();
		let company = engine.create_company(&org, "Honda CAN").await.unwrap();
		let wrong_kind = Organization {
			id: company.id,
			..org
		};
		let result = engine.provision(&wrong_kind).await;
		assert!(matches!(result, Err(RbacError::Validation(_))));
		assert_eq!(count(&pool, "roles").await, 6);
	}
}
