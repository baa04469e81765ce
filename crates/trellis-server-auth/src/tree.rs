// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The four-level resource tree.
//!
//! Organization → Company → Project → Task. A loaded node owns its whole
//! ancestor chain, so [`Resource::organization`] and [`Resource::company`] are
//! pure projections and a chain of the wrong depth cannot be expressed.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::catalog::{permissions_for, PermissionSet};
use crate::error::TreeError;
use crate::types::{NodeId, NodeKind};

/// Longest accepted node name, in characters.
pub const MAX_NAME_LEN: usize = 128;

/// Creation timestamps carry microsecond precision, the precision they are
/// stored with.
pub(crate) fn now() -> DateTime<Utc> {
	Utc::now().trunc_subsecs(6)
}

/// Validates a display name for any node kind.
pub fn validate_name(name: &str) -> Result<(), TreeError> {
	if name.trim().is_empty() {
		return Err(TreeError::Validation("name must not be empty".to_string()));
	}
	if name.chars().count() > MAX_NAME_LEN {
		return Err(TreeError::Validation(format!(
			"name must be at most {MAX_NAME_LEN} characters"
		)));
	}
	Ok(())
}

// =============================================================================
// Resource capability
// =============================================================================

/// Behavior shared by every node kind.
///
/// Each variant supplies its own ancestor projection; the provisioning routine
/// and the catalog lookup are written once against this trait.
pub trait Resource {
	fn id(&self) -> NodeId;
	fn kind(&self) -> NodeKind;
	fn name(&self) -> &str;
	fn created_at(&self) -> DateTime<Utc>;
	fn parent_id(&self) -> Option<NodeId>;

	/// The Organization at the root of this node's chain. Itself for an Organization.
	fn organization(&self) -> &Organization;

	/// The Company on this node's chain. Itself for a Company, `None` for an Organization.
	fn company(&self) -> Option<&Company>;

	fn permissions(&self) -> &'static PermissionSet {
		permissions_for(self.kind())
	}

	fn resource_ref(&self) -> ResourceRef {
		ResourceRef::new(self.kind(), self.id())
	}
}

// =============================================================================
// Node variants
// =============================================================================

/// Root of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
	pub id: NodeId,
	pub name: String,
	/// When false, the global `Manager` role receives no grants in this subtree.
	pub is_managed: bool,
	pub created_at: DateTime<Utc>,
}

impl Organization {
	pub fn new(name: impl Into<String>, is_managed: bool) -> Self {
		Self {
			id: NodeId::generate(),
			name: name.into(),
			is_managed,
			created_at: now(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
	pub id: NodeId,
	pub name: String,
	pub created_at: DateTime<Utc>,
	pub organization: Organization,
}

impl Company {
	pub fn new(organization: Organization, name: impl Into<String>) -> Self {
		Self {
			id: NodeId::generate(),
			name: name.into(),
			created_at: now(),
			organization,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
	pub id: NodeId,
	pub name: String,
	pub created_at: DateTime<Utc>,
	pub company: Company,
}

impl Project {
	pub fn new(company: Company, name: impl Into<String>) -> Self {
		Self {
			id: NodeId::generate(),
			name: name.into(),
			created_at: now(),
			company,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
	pub id: NodeId,
	pub name: String,
	pub created_at: DateTime<Utc>,
	pub project: Project,
}

impl Task {
	pub fn new(project: Project, name: impl Into<String>) -> Self {
		Self {
			id: NodeId::generate(),
			name: name.into(),
			created_at: now(),
			project,
		}
	}
}

impl Resource for Organization {
	fn id(&self) -> NodeId {
		self.id
	}

	fn kind(&self) -> NodeKind {
		NodeKind::Organization
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}

	fn parent_id(&self) -> Option<NodeId> {
		None
	}

	fn organization(&self) -> &Organization {
		self
	}

	fn company(&self) -> Option<&Company> {
		None
	}
}

impl Resource for Company {
	fn id(&self) -> NodeId {
		self.id
	}

	fn kind(&self) -> NodeKind {
		NodeKind::Company
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}

	fn parent_id(&self) -> Option<NodeId> {
		Some(self.organization.id)
	}

	fn organization(&self) -> &Organization {
		&self.organization
	}

	fn company(&self) -> Option<&Company> {
		Some(self)
	}
}

impl Resource for Project {
	fn id(&self) -> NodeId {
		self.id
	}

	fn kind(&self) -> NodeKind {
		NodeKind::Project
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}

	fn parent_id(&self) -> Option<NodeId> {
		Some(self.company.id)
	}

	fn organization(&self) -> &Organization {
		&self.company.organization
	}

	fn company(&self) -> Option<&Company> {
		Some(&self.company)
	}
}

impl Resource for Task {
	fn id(&self) -> NodeId {
		self.id
	}

	fn kind(&self) -> NodeKind {
		NodeKind::Task
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn created_at(&self) -> DateTime<Utc> {
		self.created_at
	}

	fn parent_id(&self) -> Option<NodeId> {
		Some(self.project.id)
	}

	fn organization(&self) -> &Organization {
		&self.project.company.organization
	}

	fn company(&self) -> Option<&Company> {
		Some(&self.project.company)
	}
}

// =============================================================================
// Node
// =============================================================================

/// A node of any kind, with its ancestor chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
	Organization(Organization),
	Company(Company),
	Project(Project),
	Task(Task),
}

impl Node {
	fn as_resource(&self) -> &dyn Resource {
		match self {
			Node::Organization(n) => n,
			Node::Company(n) => n,
			Node::Project(n) => n,
			Node::Task(n) => n,
		}
	}
}

impl Resource for Node {
	fn id(&self) -> NodeId {
		self.as_resource().id()
	}

	fn kind(&self) -> NodeKind {
		self.as_resource().kind()
	}

	fn name(&self) -> &str {
		self.as_resource().name()
	}

	fn created_at(&self) -> DateTime<Utc> {
		self.as_resource().created_at()
	}

	fn parent_id(&self) -> Option<NodeId> {
		self.as_resource().parent_id()
	}

	fn organization(&self) -> &Organization {
		self.as_resource().organization()
	}

	fn company(&self) -> Option<&Company> {
		self.as_resource().company()
	}
}

impl From<Organization> for Node {
	fn from(node: Organization) -> Self {
		Node::Organization(node)
	}
}

impl From<Company> for Node {
	fn from(node: Company) -> Self {
		Node::Company(node)
	}
}

impl From<Project> for Node {
	fn from(node: Project) -> Self {
		Node::Project(node)
	}
}

impl From<Task> for Node {
	fn from(node: Task) -> Self {
		Node::Task(node)
	}
}

macro_rules! impl_try_from_node {
	($variant:ident) => {
		impl TryFrom<Node> for $variant {
			type Error = TreeError;

			fn try_from(node: Node) -> Result<Self, Self::Error> {
				match node {
					Node::$variant(inner) => Ok(inner),
					other => Err(TreeError::Validation(format!(
						"expected a {} node, found a {}",
						NodeKind::$variant,
						other.kind()
					))),
				}
			}
		}
	};
}

impl_try_from_node!(Organization);
impl_try_from_node!(Company);
impl_try_from_node!(Project);
impl_try_from_node!(Task);

// =============================================================================
// Creation input
// =============================================================================

/// Attributes for a node that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNode {
	pub kind: NodeKind,
	pub name: String,
	pub parent: Option<NodeId>,
	/// Only meaningful for organizations.
	pub is_managed: bool,
}

impl NewNode {
	/// A managed organization; see [`NewNode::managed`].
	pub fn organization(name: impl Into<String>) -> Self {
		Self {
			kind: NodeKind::Organization,
			name: name.into(),
			parent: None,
			is_managed: true,
		}
	}

	pub fn company(organization: NodeId, name: impl Into<String>) -> Self {
		Self::child(NodeKind::Company, organization, name)
	}

	pub fn project(company: NodeId, name: impl Into<String>) -> Self {
		Self::child(NodeKind::Project, company, name)
	}

	pub fn task(project: NodeId, name: impl Into<String>) -> Self {
		Self::child(NodeKind::Task, project, name)
	}

	fn child(kind: NodeKind, parent: NodeId, name: impl Into<String>) -> Self {
		Self {
			kind,
			name: name.into(),
			parent: Some(parent),
			is_managed: true,
		}
	}

	pub fn managed(mut self, is_managed: bool) -> Self {
		self.is_managed = is_managed;
		self
	}

	/// Checks the input without looking at the parent itself.
	pub fn validate(&self) -> Result<(), TreeError> {
		validate_name(&self.name)?;
		match (self.kind.parent_kind(), self.parent) {
			(None, Some(_)) => Err(TreeError::Validation(format!(
				"a {} cannot have a parent",
				self.kind
			))),
			(Some(parent_kind), None) => Err(TreeError::Validation(format!(
				"a {} requires a parent {parent_kind}",
				self.kind
			))),
			_ if !self.kind.is_root() && !self.is_managed => Err(TreeError::Validation(format!(
				"is_managed only applies to organizations, not to a {}",
				self.kind
			))),
			_ => Ok(()),
		}
	}

	/// Builds the node under its loaded parent, assigning id and timestamp.
	pub fn attach(self, parent: Option<Node>) -> Result<Node, TreeError> {
		self.validate()?;
		if let (Some(expected), Some(loaded)) = (self.parent, parent.as_ref()) {
			if expected != loaded.id() {
				return Err(TreeError::Validation(format!(
					"parent {} does not match the requested parent {expected}",
					loaded.id()
				)));
			}
		}

		let node: Node = match (self.kind, parent) {
			(NodeKind::Organization, None) => Organization::new(self.name, self.is_managed).into(),
			(NodeKind::Company, Some(Node::Organization(org))) => Company::new(org, self.name).into(),
			(NodeKind::Project, Some(Node::Company(company))) => {
				Project::new(company, self.name).into()
			}
			(NodeKind::Task, Some(Node::Project(project))) => Task::new(project, self.name).into(),
			(kind, Some(other)) => {
				return Err(TreeError::Validation(format!(
					"a {kind} cannot be created under a {}",
					other.kind()
				)))
			}
			(kind, None) => {
				return Err(TreeError::Validation(format!("parent of the new {kind} not found")))
			}
		};
		Ok(node)
	}
}

// =============================================================================
// Resource references
// =============================================================================

/// A `(kind, id)` pointer to a node, formatted as `<kind>:<uuid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
	pub kind: NodeKind,
	pub id: NodeId,
}

impl ResourceRef {
	pub fn new(kind: NodeKind, id: NodeId) -> Self {
		Self { kind, id }
	}
}

impl fmt::Display for ResourceRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.kind, self.id)
	}
}

impl FromStr for ResourceRef {
	type Err = TreeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (kind, id) = s
			.split_once(':')
			.ok_or_else(|| TreeError::Validation(format!("malformed resource reference: {s}")))?;
		let kind: NodeKind = kind
			.parse()
			.map_err(|_| TreeError::Validation(format!("malformed resource reference: {s}")))?;
		let id = Uuid::parse_str(id)
			.map_err(|e| TreeError::Validation(format!("malformed resource reference {s}: {e}")))?;
		Ok(ResourceRef::new(kind, NodeId::new(id)))
	}
}
