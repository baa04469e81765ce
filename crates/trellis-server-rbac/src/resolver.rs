// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission resolver.
//!
//! A check is two reads: the principal's roles from the membership source,
//! then one grant lookup. Grants were flattened onto every node when it was
//! provisioned, so there is no tree walk here. Anything that cannot match,
//! an unknown codename, a permission of another kind, an unknown resource or
//! a principal without roles, is a denial and not an error.

use std::collections::BTreeSet;
use std::sync::Arc;
use trellis_server_auth::{Permission, PrincipalId, ResourceRef};
use trellis_server_db::{GrantStore, MembershipSource};

use crate::error::Result;

#[derive(Clone)]
pub struct PermissionResolver {
	memberships: Arc<dyn MembershipSource>,
	grants: Arc<dyn GrantStore>,
}

impl PermissionResolver {
	pub fn new(memberships: Arc<dyn MembershipSource>, grants: Arc<dyn GrantStore>) -> Self {
		Self {
			memberships,
			grants,
		}
	}

	/// Can `principal` exercise `permission` (a codename such as
	/// `change_project`) on `resource`?
	///
	/// # Errors
	/// Only storage failures. Every kind of "no access" is `Ok(false)`.
	#[tracing::instrument(skip(self), fields(principal_id = %principal, resource = %resource))]
	pub async fn check(
		&self,
		principal: &PrincipalId,
		permission: &str,
		resource: &ResourceRef,
	) -> Result<bool> {
		let permission = match permission.parse::<Permission>() {
			Ok(permission) => permission,
			Err(e) => {
				tracing::debug!(error = %e, "unknown permission, denying");
				return Ok(false);
			}
		};
		self.check_permission(principal, permission, resource).await
	}

	/// Like [`check`](Self::check) with an already parsed permission.
	#[tracing::instrument(skip(self), fields(principal_id = %principal, permission = %permission, resource = %resource))]
	pub async fn check_permission(
		&self,
		principal: &PrincipalId,
		permission: Permission,
		resource: &ResourceRef,
	) -> Result<bool> {
		if !permission.applies_to(resource.kind) {
			tracing::debug!("permission does not apply to the resource kind, denying");
			return Ok(false);
		}

		let roles = self.memberships.roles_of(principal).await?;
		if roles.is_empty() {
			tracing::debug!("principal holds no roles, denying");
			return Ok(false);
		}

		let allowed = self.grants.has_grant(&roles, permission, resource).await?;
		tracing::debug!(allowed, roles = roles.len(), "permission checked");
		Ok(allowed)
	}

	/// Like [`check`](Self::check) with the resource given as `<kind>:<uuid>`.
	///
	/// # Errors
	/// Returns `RbacError::Validation` if the reference is malformed.
	pub async fn check_reference(
		&self,
		principal: &PrincipalId,
		permission: &str,
		resource: &str,
	) -> Result<bool> {
		let resource: ResourceRef = resource.parse()?;
		self.check(principal, permission, &resource).await
	}

	/// Codenames of every permission `principal` holds on `resource`.
	#[tracing::instrument(skip(self), fields(principal_id = %principal, resource = %resource))]
	pub async fn permissions(
		&self,
		principal: &PrincipalId,
		resource: &ResourceRef,
	) -> Result<BTreeSet<String>> {
		let roles = self.memberships.roles_of(principal).await?;
		let held = self.grants.permissions_for_roles(&roles, resource).await?;
		Ok(held.iter().map(Permission::codename).collect())
	}

	/// Every node on which `principal` holds `permission`, newest first.
	#[tracing::instrument(skip(self), fields(principal_id = %principal))]
	pub async fn accessible_resources(
		&self,
		principal: &PrincipalId,
		permission: &str,
	) -> Result<Vec<ResourceRef>> {
		let Ok(permission) = permission.parse::<Permission>() else {
			return Ok(Vec::new());
		};
		let roles = self.memberships.roles_of(principal).await?;
		Ok(self.grants.resources_with_permission(&roles, permission).await?)
	}
}
