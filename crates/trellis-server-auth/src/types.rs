// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for the resource tree and its access control.
//!
//! - **ID newtypes**: Type-safe wrappers around UUIDs ([`NodeId`], [`RoleId`],
//!   [`PrincipalId`]) preventing accidental mixing
//! - **Node kinds**: The closed set of tree levels ([`NodeKind`])
//! - **Actions**: The per-kind operations a permission can cover ([`Action`])
//!
//! All ID types implement transparent serde serialization (as UUID strings) and
//! provide conversion to/from [`uuid::Uuid`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::TreeError;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(Uuid);

		impl $name {
			/// Create a new ID from a UUID.
			pub fn new(id: Uuid) -> Self {
				Self(id)
			}

			/// Generate a new random ID.
			pub fn generate() -> Self {
				Self(Uuid::new_v4())
			}

			/// Get the inner UUID value.
			pub fn into_inner(self) -> Uuid {
				self.0
			}

			/// Get a reference to the inner UUID.
			pub fn as_uuid(&self) -> &Uuid {
				&self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<Uuid> for $name {
			fn from(id: Uuid) -> Self {
				Self(id)
			}
		}

		impl From<$name> for Uuid {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(NodeId, "Unique identifier for a node of the resource tree.");
define_id_type!(RoleId, "Unique identifier for a role.");
define_id_type!(
	PrincipalId,
	"Unique identifier for a principal (an already authenticated user)."
);

// =============================================================================
// Node Kinds
// =============================================================================

/// The four levels of the resource tree, root first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
	Organization,
	Company,
	Project,
	Task,
}

impl NodeKind {
	/// Returns all node kinds, root first.
	pub fn all() -> &'static [NodeKind] {
		&[
			NodeKind::Organization,
			NodeKind::Company,
			NodeKind::Project,
			NodeKind::Task,
		]
	}

	/// The kind a node of this kind must hang under. `None` for the root.
	pub fn parent_kind(&self) -> Option<NodeKind> {
		match self {
			NodeKind::Organization => None,
			NodeKind::Company => Some(NodeKind::Organization),
			NodeKind::Project => Some(NodeKind::Company),
			NodeKind::Task => Some(NodeKind::Project),
		}
	}

	/// Returns true for the root kind.
	pub fn is_root(&self) -> bool {
		self.parent_kind().is_none()
	}

	/// Lowercase tag used in permission codenames and storage.
	pub fn as_str(&self) -> &'static str {
		match self {
			NodeKind::Organization => "organization",
			NodeKind::Company => "company",
			NodeKind::Project => "project",
			NodeKind::Task => "task",
		}
	}
}

impl fmt::Display for NodeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for NodeKind {
	type Err = TreeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"organization" => Ok(NodeKind::Organization),
			"company" => Ok(NodeKind::Company),
			"project" => Ok(NodeKind::Project),
			"task" => Ok(NodeKind::Task),
			other => Err(TreeError::UnknownNodeKind(other.to_string())),
		}
	}
}

// =============================================================================
// Actions
// =============================================================================

/// Operations a permission can cover on a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
	Add,
	Change,
	Delete,
	View,
}

impl Action {
	/// Returns all actions.
	pub fn all() -> &'static [Action] {
		&[Action::Add, Action::Change, Action::Delete, Action::View]
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Action::Add => "add",
			Action::Change => "change",
			Action::Delete => "delete",
			Action::View => "view",
		}
	}
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Action {
	type Err = TreeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"add" => Ok(Action::Add),
			"change" => Ok(Action::Change),
			"delete" => Ok(Action::Delete),
			"view" => Ok(Action::View),
			other => Err(TreeError::InvalidPermission(other.to_string())),
		}
	}
}
