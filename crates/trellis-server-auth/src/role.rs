// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Roles: named groups of principals that receive per-node grants.
//!
//! There are two global roles, [`ADMIN_ROLE`] and [`MANAGER_ROLE`], plus an
//! Admin and an Observer role for every Organization and every Company. Scoped
//! roles always display as `Organization:<name>:Admin`; their unique storage key
//! depends on [`RoleKeying`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TreeError;
use crate::tree::{now, Company, Organization};
use crate::types::{NodeId, NodeKind, RoleId};

pub const ADMIN_ROLE: &str = "Admin";
pub const MANAGER_ROLE: &str = "Manager";

/// How scoped role keys are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKeying {
	/// `Organization:<node-id>:Admin`. Same-named scopes stay distinct.
	#[default]
	NodeId,
	/// `Organization:<node-name>:Admin`. Same-named scopes share one role.
	DisplayName,
}

impl fmt::Display for RoleKeying {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RoleKeying::NodeId => write!(f, "node_id"),
			RoleKeying::DisplayName => write!(f, "display_name"),
		}
	}
}

impl FromStr for RoleKeying {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"node_id" => Ok(RoleKeying::NodeId),
			"display_name" => Ok(RoleKeying::DisplayName),
			other => Err(format!(
				"unknown role keying '{other}', expected 'node_id' or 'display_name'"
			)),
		}
	}
}

/// The two roles instantiated per Organization and per Company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopedRole {
	/// Every permission on every node of the scope.
	Admin,
	/// `view_<kind>` on every node of the scope.
	Observer,
}

impl fmt::Display for ScopedRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ScopedRole::Admin => write!(f, "Admin"),
			ScopedRole::Observer => write!(f, "Observer"),
		}
	}
}

/// Identifies a role before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleName {
	Admin,
	Manager,
	Scoped {
		scope: NodeKind,
		node_id: NodeId,
		node_name: String,
		role: ScopedRole,
	},
}

impl RoleName {
	pub fn org_admin(org: &Organization) -> Self {
		Self::scoped(NodeKind::Organization, org.id, &org.name, ScopedRole::Admin)
	}

	pub fn org_observer(org: &Organization) -> Self {
		Self::scoped(NodeKind::Organization, org.id, &org.name, ScopedRole::Observer)
	}

	pub fn company_admin(company: &Company) -> Self {
		Self::scoped(NodeKind::Company, company.id, &company.name, ScopedRole::Admin)
	}

	pub fn company_observer(company: &Company) -> Self {
		Self::scoped(
			NodeKind::Company,
			company.id,
			&company.name,
			ScopedRole::Observer,
		)
	}

	fn scoped(scope: NodeKind, node_id: NodeId, node_name: &str, role: ScopedRole) -> Self {
		RoleName::Scoped {
			scope,
			node_id,
			node_name: node_name.to_string(),
			role,
		}
	}

	pub fn is_global(&self) -> bool {
		matches!(self, RoleName::Admin | RoleName::Manager)
	}

	/// Human-readable name, e.g. `Company:Honda USA:Observer`.
	pub fn display_name(&self) -> String {
		match self {
			RoleName::Admin => ADMIN_ROLE.to_string(),
			RoleName::Manager => MANAGER_ROLE.to_string(),
			RoleName::Scoped {
				scope,
				node_name,
				role,
				..
			} => format!("{}:{node_name}:{role}", scope_label(*scope)),
		}
	}

	/// Unique storage key under the given keying.
	pub fn key(&self, keying: RoleKeying) -> String {
		match (self, keying) {
			(
				RoleName::Scoped {
					scope,
					node_id,
					role,
					..
				},
				RoleKeying::NodeId,
			) => format!("{}:{node_id}:{role}", scope_label(*scope)),
			_ => self.display_name(),
		}
	}
}

fn scope_label(scope: NodeKind) -> &'static str {
	match scope {
		NodeKind::Organization => "Organization",
		NodeKind::Company => "Company",
		NodeKind::Project => "Project",
		NodeKind::Task => "Task",
	}
}

/// A stored role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	pub id: RoleId,
	/// Unique key, see [`RoleName::key`].
	pub name: String,
	pub display_name: String,
	pub created_at: DateTime<Utc>,
}

impl Role {
	pub fn new(name: &RoleName, keying: RoleKeying) -> Self {
		Self {
			id: RoleId::generate(),
			name: name.key(keying),
			display_name: name.display_name(),
			created_at: now(),
		}
	}
}

/// Maps a `RoleKeying` parse failure into the tree error taxonomy.
pub fn parse_keying(value: &str) -> Result<RoleKeying, TreeError> {
	value.parse().map_err(TreeError::Validation)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn global_roles_keep_their_names_under_any_keying() {
		for keying in [RoleKeying::NodeId, RoleKeying::DisplayName] {
			assert_eq!(RoleName::Admin.key(keying), "Admin");
			assert_eq!(RoleName::Manager.key(keying), "Manager");
		}
		assert!(RoleName::Admin.is_global());
	}

	#[test]
	fn scoped_display_names_follow_legacy_format() {
		let org = Organization::new("Moose CAN", true);
		let company = Company::new(org.clone(), "Honda USA");
		assert_eq!(
			RoleName::org_admin(&org).display_name(),
			"Organization:Moose CAN:Admin"
		);
		assert_eq!(
			RoleName::org_observer(&org).display_name(),
			"Organization:Moose CAN:Observer"
		);
		assert_eq!(
			RoleName::company_admin(&company).display_name(),
			"Company:Honda USA:Admin"
		);
		assert_eq!(
			RoleName::company_observer(&company).display_name(),
			"Company:Honda USA:Observer"
		);
	}

	#[test]
	fn node_id_keying_separates_same_named_scopes() {
		let a = Organization::new("Moose", true);
		let b = Organization::new("Moose", true);
		let key_a = RoleName::org_admin(&a).key(RoleKeying::NodeId);
		let key_b = RoleName::org_admin(&b).key(RoleKeying::NodeId);
		assert_ne!(key_a, key_b);
		assert_eq!(key_a, format!("Organization:{}:Admin", a.id));
	}

	#[test]
	fn display_name_keying_merges_same_named_scopes() {
		let a = Organization::new("Moose", true);
		let b = Organization::new("Moose", true);
		assert_eq!(
			RoleName::org_admin(&a).key(RoleKeying::DisplayName),
			RoleName::org_admin(&b).key(RoleKeying::DisplayName)
		);
	}

	#[test]
	fn keying_parses() {
		assert_eq!(parse_keying("node_id").unwrap(), RoleKeying::NodeId);
		assert_eq!(
			parse_keying("display_name").unwrap(),
			RoleKeying::DisplayName
		);
		assert!(matches!(
			parse_keying("by_name"),
			Err(TreeError::Validation(_))
		));
		assert_eq!(RoleKeying::default(), RoleKeying::NodeId);
	}

	#[test]
	fn new_role_stores_key_and_display_name() {
		let company = Company::new(Organization::new("Moose USA", false), "AT&T");
		let role = Role::new(&RoleName::company_admin(&company), RoleKeying::NodeId);
		assert_eq!(role.name, format!("Company:{}:Admin", company.id));
		assert_eq!(role.display_name, "Company:AT&T:Admin");
	}
}
