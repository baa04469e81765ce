// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioning plan: the roles and grants a freshly created node needs.
//!
//! Inheritance is flattened at write time. Every node gets direct grants for
//! the global roles and for the Admin/Observer roles of its Organization and
//! Company, so a permission check is a single lookup with no tree walk.
//!
//! | Role | Grants on the node |
//! |------|--------------------|
//! | `Admin` | full set |
//! | `Manager` | full set, only if the Organization is managed |
//! | Organization Admin | full set |
//! | Company Admin | full set (nodes below an Organization only) |
//! | Organization Observer | `view_<kind>` |
//! | Company Observer | `view_<kind>` (nodes below an Organization only) |
//!
//! Building the plan is pure; executing it belongs to the persistence layer.

use serde::{Deserialize, Serialize};

use crate::catalog::Permission;
use crate::role::RoleName;
use crate::tree::{Resource, ResourceRef};

/// One grant to write: `permission` for `role` on the plan's resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlannedGrant {
	pub role: RoleName,
	pub permission: Permission,
}

/// Everything provisioning must write for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningPlan {
	pub resource: ResourceRef,
	/// Roles to get-or-create, globals first.
	pub roles: Vec<RoleName>,
	pub grants: Vec<PlannedGrant>,
}

impl ProvisioningPlan {
	/// Computes the plan for any node kind.
	pub fn for_resource<R: Resource + ?Sized>(node: &R) -> Self {
		let organization = node.organization();
		let catalog = node.permissions();

		let org_admin = RoleName::org_admin(organization);
		let org_observer = RoleName::org_observer(organization);
		let company_roles = node
			.company()
			.map(|c| (RoleName::company_admin(c), RoleName::company_observer(c)));

		let mut roles = vec![
			RoleName::Admin,
			RoleName::Manager,
			org_admin.clone(),
			org_observer.clone(),
		];
		if let Some((admin, observer)) = &company_roles {
			roles.push(admin.clone());
			roles.push(observer.clone());
		}

		let mut grants = Vec::new();
		let mut push = |role: &RoleName, permission: &Permission| {
			grants.push(PlannedGrant {
				role: role.clone(),
				permission: *permission,
			});
		};

		for permission in catalog.full() {
			push(&RoleName::Admin, permission);
			if organization.is_managed {
				push(&RoleName::Manager, permission);
			}
			push(&org_admin, permission);
			if let Some((company_admin, _)) = &company_roles {
				push(company_admin, permission);
			}
		}

		for permission in catalog.view() {
			push(&org_observer, permission);
			if let Some((_, company_observer)) = &company_roles {
				push(company_observer, permission);
			}
		}

		Self {
			resource: node.resource_ref(),
			roles,
			grants,
		}
	}

	/// Permissions the plan gives `role`, in catalog order.
	pub fn permissions_of<'a>(
		&'a self,
		role: &'a RoleName,
	) -> impl Iterator<Item = &'a Permission> + 'a {
		self
			.grants
			.iter()
			.filter(move |g| &g.role == role)
			.map(|g| &g.permission)
	}
}
