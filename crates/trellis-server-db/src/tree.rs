// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Node repository for the resource tree.
//!
//! All four kinds share the `nodes` table. A node is loaded together with its
//! ancestor chain; the chain is rebuilt root first and every link is checked
//! against [`NodeKind::parent_kind`], so a broken chain surfaces as an
//! integrity error instead of a half-built node.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::Row;
use trellis_server_auth::{
	Company, NewNode, Node, NodeId, NodeKind, Organization, Project, Resource, Task, TreeError,
};
use uuid::Uuid;

use crate::error::DbError;

/// Timestamps are stored with a fixed width so that text order is time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
	ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|ts| ts.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid timestamp {value}: {e}")))
}

pub(crate) fn parse_uuid(value: &str, what: &str) -> Result<Uuid, DbError> {
	Uuid::parse_str(value).map_err(|e| DbError::Internal(format!("Invalid {what}: {e}")))
}

/// One stored row, without its ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
	pub id: NodeId,
	pub kind: NodeKind,
	pub name: String,
	pub parent_id: Option<NodeId>,
	pub is_managed: bool,
	pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait NodeStore: Send + Sync {
	/// Stores a node without any grants; see [`NodeRepository::create`].
	async fn create(&self, input: NewNode) -> Result<Node, DbError>;
	async fn get_node(&self, id: &NodeId) -> Result<Option<Node>, DbError>;
	async fn get_record(&self, id: &NodeId) -> Result<Option<NodeRecord>, DbError>;
	async fn list_nodes(
		&self,
		kind: NodeKind,
		parent: Option<&NodeId>,
	) -> Result<Vec<NodeRecord>, DbError>;
	async fn latest(&self, kind: NodeKind) -> Result<Option<NodeRecord>, DbError>;
	async fn count_nodes(&self, kind: NodeKind) -> Result<i64, DbError>;
}

/// Repository for resource tree operations.
///
/// All IDs are UUIDs stored as strings in SQLite.
#[derive(Clone)]
pub struct NodeRepository {
	pool: SqlitePool,
}

impl NodeRepository {
	/// Create a new repository with the given pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Insert a node on an existing connection or transaction.
	///
	/// Only the node's own row is written; its ancestors must already exist.
	///
	/// # Errors
	/// Returns `DbError::Sqlx` if the insert fails (duplicate id, missing
	/// parent row).
	#[tracing::instrument(skip(conn, node), fields(node_id = %node.id(), kind = %node.kind()))]
	pub async fn insert_in(conn: &mut SqliteConnection, node: &Node) -> Result<(), DbError> {
		sqlx::query(
			r#"
			INSERT INTO nodes (id, kind, name, parent_id, is_managed, created_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(node.id().to_string())
		.bind(node.kind().as_str())
		.bind(node.name())
		.bind(node.parent_id().map(|id| id.to_string()))
		.bind(is_managed_column(node) as i32)
		.bind(format_timestamp(node.created_at()))
		.execute(&mut *conn)
		.await?;

		tracing::debug!(node_id = %node.id(), "node inserted");
		Ok(())
	}

	/// Load a node with its full ancestor chain on an existing connection.
	///
	/// # Returns
	/// `None` if no node has this ID.
	///
	/// # Errors
	/// Returns `DbError::Tree(TreeError::Integrity)` if the chain is broken: a
	/// dangling parent, a non-root without a parent, or a parent of the wrong
	/// kind.
	#[tracing::instrument(skip(conn), fields(node_id = %id))]
	pub async fn load_in(
		conn: &mut SqliteConnection,
		id: &NodeId,
	) -> Result<Option<Node>, DbError> {
		// Leaf first.
		let mut chain: Vec<NodeRecord> = Vec::with_capacity(NodeKind::all().len());
		let mut next = Some(*id);

		while let Some(current) = next {
			if chain.len() == NodeKind::all().len() {
				return Err(DbError::integrity(format!(
					"ancestor chain of node {id} is deeper than the tree"
				)));
			}
			match Self::record_in(conn, &current).await? {
				Some(record) => {
					next = record.parent_id;
					chain.push(record);
				}
				None if chain.is_empty() => return Ok(None),
				None => {
					return Err(DbError::integrity(format!(
						"node {id} has a dangling ancestor {current}"
					)))
				}
			}
		}

		assemble(chain).map(Some)
	}

	async fn record_in(
		conn: &mut SqliteConnection,
		id: &NodeId,
	) -> Result<Option<NodeRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, kind, name, parent_id, is_managed, created_at
			FROM nodes
			WHERE id = ?
			"#,
		)
		.bind(id.to_string())
		.fetch_optional(&mut *conn)
		.await?;

		row.map(|r| row_to_record(&r)).transpose()
	}

	/// Validate creation input and build the node under its stored parent.
	///
	/// Nothing is written. The returned node carries a fresh id and timestamp.
	///
	/// # Errors
	/// Returns `DbError::Tree(TreeError::Validation)` for invalid input, a
	/// missing parent or a parent of the wrong kind.
	#[tracing::instrument(skip(conn, input), fields(kind = %input.kind, parent = ?input.parent))]
	pub async fn prepare_in(conn: &mut SqliteConnection, input: NewNode) -> Result<Node, DbError> {
		input.validate()?;
		let parent = match input.parent {
			Some(parent_id) => {
				let parent = Self::load_in(conn, &parent_id).await?.ok_or_else(|| {
					TreeError::Validation(format!("parent {parent_id} of the new {} not found", input.kind))
				})?;
				Some(parent)
			}
			None => None,
		};
		Ok(input.attach(parent)?)
	}

	/// Create a node without provisioning any grants.
	///
	/// The stored node has no grants at all, so every check on it is denied
	/// until it is provisioned. Callers that need the node to be reachable by
	/// role holders use the provisioning engine instead.
	#[tracing::instrument(skip(self, input), fields(kind = %input.kind))]
	pub async fn create(&self, input: NewNode) -> Result<Node, DbError> {
		let mut conn = self.pool.acquire().await?;
		let node = Self::prepare_in(&mut conn, input).await?;
		Self::insert_in(&mut conn, &node).await?;
		tracing::debug!(node_id = %node.id(), "node created");
		Ok(node)
	}

	/// Insert an already built node in its own statement, trusting its
	/// ancestor chain. No grants are written.
	#[cfg(any(test, feature = "test-utils"))]
	#[tracing::instrument(skip(self, node), fields(node_id = %node.id()))]
	pub async fn create_node(&self, node: &Node) -> Result<(), DbError> {
		let mut conn = self.pool.acquire().await?;
		Self::insert_in(&mut conn, node).await
	}

	/// Get a node with its ancestor chain.
	///
	/// # Returns
	/// `None` if no node exists with this ID.
	#[tracing::instrument(skip(self), fields(node_id = %id))]
	pub async fn get_node(&self, id: &NodeId) -> Result<Option<Node>, DbError> {
		let mut conn = self.pool.acquire().await?;
		Self::load_in(&mut conn, id).await
	}

	/// Get a single row without walking its ancestors.
	#[tracing::instrument(skip(self), fields(node_id = %id))]
	pub async fn get_record(&self, id: &NodeId) -> Result<Option<NodeRecord>, DbError> {
		let mut conn = self.pool.acquire().await?;
		Self::record_in(&mut conn, id).await
	}

	/// List nodes of one kind, newest first.
	///
	/// # Arguments
	/// * `kind` - The node kind to list
	/// * `parent` - Restrict to direct children of this node
	#[tracing::instrument(skip(self), fields(kind = %kind))]
	pub async fn list_nodes(
		&self,
		kind: NodeKind,
		parent: Option<&NodeId>,
	) -> Result<Vec<NodeRecord>, DbError> {
		let rows = sqlx::query(
			r#"
			SELECT id, kind, name, parent_id, is_managed, created_at
			FROM nodes
			WHERE kind = ? AND (? IS NULL OR parent_id = ?)
			ORDER BY created_at DESC, rowid DESC
			"#,
		)
		.bind(kind.as_str())
		.bind(parent.map(|p| p.to_string()))
		.bind(parent.map(|p| p.to_string()))
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_record).collect()
	}

	/// The most recently created node of a kind.
	#[tracing::instrument(skip(self), fields(kind = %kind))]
	pub async fn latest(&self, kind: NodeKind) -> Result<Option<NodeRecord>, DbError> {
		let row = sqlx::query(
			r#"
			SELECT id, kind, name, parent_id, is_managed, created_at
			FROM nodes
			WHERE kind = ?
			ORDER BY created_at DESC, rowid DESC
			LIMIT 1
			"#,
		)
		.bind(kind.as_str())
		.fetch_optional(&self.pool)
		.await?;

		row.map(|r| row_to_record(&r)).transpose()
	}

	#[tracing::instrument(skip(self), fields(kind = %kind))]
	pub async fn count_nodes(&self, kind: NodeKind) -> Result<i64, DbError> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes WHERE kind = ?")
			.bind(kind.as_str())
			.fetch_one(&self.pool)
			.await?;
		Ok(count)
	}
}

/// Organizations store their own flag; other kinds mirror their Organization's.
fn is_managed_column(node: &Node) -> bool {
	node.organization().is_managed
}

fn row_to_record(row: &SqliteRow) -> Result<NodeRecord, DbError> {
	let id: String = row.get("id");
	let kind: String = row.get("kind");
	let parent_id: Option<String> = row.get("parent_id");
	let is_managed: i32 = row.get("is_managed");
	let created_at: String = row.get("created_at");

	Ok(NodeRecord {
		id: NodeId::new(parse_uuid(&id, "node ID")?),
		kind: kind
			.parse()
			.map_err(|e| DbError::Internal(format!("Invalid node kind: {e}")))?,
		name: row.get("name"),
		parent_id: parent_id
			.map(|p| parse_uuid(&p, "parent ID").map(NodeId::new))
			.transpose()?,
		is_managed: is_managed != 0,
		created_at: parse_timestamp(&created_at)?,
	})
}

/// Rebuilds a node from its leaf-first chain of records.
fn assemble(chain: Vec<NodeRecord>) -> Result<Node, DbError> {
	let mut records = chain.into_iter().rev();
	let root = records
		.next()
		.ok_or_else(|| DbError::integrity("empty ancestor chain"))?;

	if root.kind != NodeKind::Organization {
		return Err(DbError::integrity(format!(
			"{} {} has no parent",
			root.kind, root.id
		)));
	}

	let mut node = Node::Organization(Organization {
		id: root.id,
		name: root.name,
		is_managed: root.is_managed,
		created_at: root.created_at,
	});

	for record in records {
		node = match (record.kind, node) {
			(NodeKind::Company, Node::Organization(organization)) => Company {
				id: record.id,
				name: record.name,
				created_at: record.created_at,
				organization,
			}
			.into(),
			(NodeKind::Project, Node::Company(company)) => Project {
				id: record.id,
				name: record.name,
				created_at: record.created_at,
				company,
			}
			.into(),
			(NodeKind::Task, Node::Project(project)) => Task {
				id: record.id,
				name: record.name,
				created_at: record.created_at,
				project,
			}
			.into(),
			(kind, parent) => {
				return Err(DbError::integrity(format!(
					"{kind} {} has a {} parent {}",
					record.id,
					parent.kind(),
					parent.id()
				)))
			}
		};
	}

	Ok(node)
}

#[async_trait]
impl NodeStore for NodeRepository {
	async fn create(&self, input: NewNode) -> Result<Node, DbError> {
		self.create(input).await
	}

	async fn get_node(&self, id: &NodeId) -> Result<Option<Node>, DbError> {
		self.get_node(id).await
	}

	async fn get_record(&self, id: &NodeId) -> Result<Option<NodeRecord>, DbError> {
		self.get_record(id).await
	}

	async fn list_nodes(
		&self,
		kind: NodeKind,
		parent: Option<&NodeId>,
	) -> Result<Vec<NodeRecord>, DbError> {
		self.list_nodes(kind, parent).await
	}

	async fn latest(&self, kind: NodeKind) -> Result<Option<NodeRecord>, DbError> {
		self.latest(kind).await
	}

	async fn count_nodes(&self, kind: NodeKind) -> Result<i64, DbError> {
		self.count_nodes(kind).await
	}
}
