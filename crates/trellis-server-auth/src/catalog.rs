// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission catalog.
//!
//! Every node kind owns four permissions, `add_<kind>`, `change_<kind>`,
//! `delete_<kind>` and `view_<kind>`. The catalog is a static table indexed by
//! [`NodeKind`]; a new kind only needs a new entry here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::TreeError;
use crate::types::{Action, NodeKind};

/// A permission scoped to one node kind, e.g. `change_project`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
	pub action: Action,
	pub kind: NodeKind,
}

impl Permission {
	pub const fn new(action: Action, kind: NodeKind) -> Self {
		Self { action, kind }
	}

	/// The `<action>_<kind>` codename stored in the grant table.
	pub fn codename(&self) -> String {
		self.to_string()
	}

	/// Returns true if this permission may be granted on a node of `kind`.
	pub fn applies_to(&self, kind: NodeKind) -> bool {
		self.kind == kind
	}

	/// Checks the catalog invariant for a (permission, resource kind) pair.
	pub fn ensure_applies_to(&self, kind: NodeKind) -> Result<(), TreeError> {
		if self.applies_to(kind) {
			Ok(())
		} else {
			Err(TreeError::PermissionScope {
				permission: self.codename(),
				kind,
			})
		}
	}
}

impl fmt::Display for Permission {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}_{}", self.action, self.kind)
	}
}

impl FromStr for Permission {
	type Err = TreeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (action, kind) = s
			.split_once('_')
			.ok_or_else(|| TreeError::InvalidPermission(s.to_string()))?;
		let action: Action = action
			.parse()
			.map_err(|_| TreeError::InvalidPermission(s.to_string()))?;
		let kind: NodeKind = kind
			.parse()
			.map_err(|_| TreeError::InvalidPermission(s.to_string()))?;
		Ok(Permission::new(action, kind))
	}
}

/// The catalog entry for one node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionSet {
	kind: NodeKind,
	full: [Permission; 4],
	view: [Permission; 1],
}

impl PermissionSet {
	const fn for_kind(kind: NodeKind) -> Self {
		Self {
			kind,
			full: [
				Permission::new(Action::Add, kind),
				Permission::new(Action::Change, kind),
				Permission::new(Action::Delete, kind),
				Permission::new(Action::View, kind),
			],
			view: [Permission::new(Action::View, kind)],
		}
	}

	pub fn kind(&self) -> NodeKind {
		self.kind
	}

	/// Every permission of the kind; granted to administrative roles.
	pub fn full(&self) -> &[Permission] {
		&self.full
	}

	/// The read-only subset; granted to observer roles.
	pub fn view(&self) -> &[Permission] {
		&self.view
	}

	pub fn contains(&self, permission: &Permission) -> bool {
		self.full.contains(permission)
	}

	pub fn full_codenames(&self) -> BTreeSet<String> {
		self.full.iter().map(Permission::codename).collect()
	}

	pub fn view_codenames(&self) -> BTreeSet<String> {
		self.view.iter().map(Permission::codename).collect()
	}
}

static CATALOG: [PermissionSet; 4] = [
	PermissionSet::for_kind(NodeKind::Organization),
	PermissionSet::for_kind(NodeKind::Company),
	PermissionSet::for_kind(NodeKind::Project),
	PermissionSet::for_kind(NodeKind::Task),
];

/// Looks up the catalog entry for `kind`.
pub fn permissions_for(kind: NodeKind) -> &'static PermissionSet {
	match kind {
		NodeKind::Organization => &CATALOG[0],
		NodeKind::Company => &CATALOG[1],
		NodeKind::Project => &CATALOG[2],
		NodeKind::Task => &CATALOG[3],
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn any_kind() -> impl Strategy<Value = NodeKind> {
		prop::sample::select(NodeKind::all().to_vec())
	}

	fn any_action() -> impl Strategy<Value = Action> {
		prop::sample::select(Action::all().to_vec())
	}

	proptest! {
		#[test]
		fn codename_parses_back(action in any_action(), kind in any_kind()) {
			let permission = Permission::new(action, kind);
			prop_assert_eq!(permission.codename().parse::<Permission>().unwrap(), permission);
		}

		#[test]
		fn catalog_entries_only_hold_their_own_kind(kind in any_kind()) {
			let set = permissions_for(kind);
			prop_assert_eq!(set.kind(), kind);
			prop_assert!(set.full().iter().all(|p| p.applies_to(kind)));
			prop_assert!(set.view().iter().all(|p| set.contains(p)));
		}

		#[test]
		fn garbage_is_not_a_permission(s in "[a-z]{0,12}") {
			prop_assert!(s.parse::<Permission>().is_err());
		}
	}

	#[test]
	fn project_catalog_matches_codenames() {
		let set = permissions_for(NodeKind::Project);
		let expected: BTreeSet<String> = [
			"add_project",
			"change_project",
			"delete_project",
			"view_project",
		]
		.into_iter()
		.map(String::from)
		.collect();
		assert_eq!(set.full_codenames(), expected);
		assert_eq!(
			set.view_codenames(),
			BTreeSet::from(["view_project".to_string()])
		);
	}

	#[test]
	fn unknown_action_or_kind_is_rejected() {
		assert!("publish_project".parse::<Permission>().is_err());
		assert!("view_department".parse::<Permission>().is_err());
		assert!("view".parse::<Permission>().is_err());
	}

	#[test]
	fn permission_scope_is_enforced() {
		let change_project = Permission::new(Action::Change, NodeKind::Project);
		assert!(change_project.ensure_applies_to(NodeKind::Project).is_ok());
		assert_eq!(
			change_project.ensure_applies_to(NodeKind::Task),
			Err(TreeError::PermissionScope {
				permission: "change_project".to_string(),
				kind: NodeKind::Task,
			})
		);
	}
}
