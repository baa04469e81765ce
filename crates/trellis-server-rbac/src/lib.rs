// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # trellis-server-rbac
//!
//! Hierarchical role-based access control over the Trellis resource tree.
//!
//! Two halves:
//! - [`ProvisioningEngine`] creates a node and, in the same transaction,
//!   writes a direct grant for every role that inherits access to it.
//! - [`PermissionResolver`] answers "can this principal do this on that
//!   node" with a single grant lookup.
//!
//! [`RbacService`] wires both to one pool from a loaded
//! [`ServerConfig`](trellis_server_config::ServerConfig):
//!
//! ```rust,ignore
//! let config = trellis_server_config::load_config()?;
//! trellis_server_rbac::init_tracing(&config.logging)?;
//! let rbac = RbacService::connect(&config).await?;
//!
//! let org = rbac.provisioning().create_organization("Moose CAN", true).await?;
//! let allowed = rbac
//! 	.resolver()
//! 	.check(&principal, "view_organization", &org.resource_ref())
//! 	.await?;
//! ```

pub mod error;
pub mod provisioning;
pub mod resolver;
pub mod telemetry;

use sqlx::sqlite::SqlitePool;
use std::sync::Arc;
use trellis_server_auth::RoleKeying;
use trellis_server_config::{validate_config, ServerConfig};
use trellis_server_db::{
	create_pool_with_max_connections, run_migrations, GrantRepository, MembershipRepository,
	NodeRepository, RoleRepository,
};

pub use error::{RbacError, Result};
pub use provisioning::{ProvisioningEngine, ProvisioningOutcome};
pub use resolver::PermissionResolver;
pub use telemetry::{env_filter, init_tracing};

/// The provisioning engine, the resolver and the repositories behind them,
/// sharing one pool.
#[derive(Clone)]
pub struct RbacService {
	pool: SqlitePool,
	provisioning: ProvisioningEngine,
	resolver: PermissionResolver,
	nodes: NodeRepository,
	roles: RoleRepository,
	grants: Arc<GrantRepository>,
	memberships: Arc<MembershipRepository>,
}

impl RbacService {
	/// Open the configured database, apply migrations and seed the global
	/// roles.
	///
	/// # Errors
	/// - `RbacError::Config` if the database settings are inconsistent.
	/// - `RbacError::Database` if the pool cannot be opened or migrated.
	#[tracing::instrument(skip(config), fields(database = %config.database.url))]
	pub async fn connect(config: &ServerConfig) -> Result<Self> {
		validate_config(&config.database)?;
		let pool =
			create_pool_with_max_connections(&config.database.url, config.database.max_connections)
				.await?;
		run_migrations(&pool).await?;

		let service = Self::from_pool(pool, config.rbac.role_keying);
		service.roles.ensure_global_roles().await?;

		tracing::info!(
			role_keying = %config.rbac.role_keying,
			max_connections = config.database.max_connections,
			"access control ready"
		);
		Ok(service)
	}

	/// Build on an already migrated pool.
	pub fn from_pool(pool: SqlitePool, keying: RoleKeying) -> Self {
		let grants = Arc::new(GrantRepository::new(pool.clone()));
		let memberships = Arc::new(MembershipRepository::new(pool.clone()));
		Self {
			provisioning: ProvisioningEngine::new(pool.clone(), keying),
			resolver: PermissionResolver::new(memberships.clone(), grants.clone()),
			nodes: NodeRepository::new(pool.clone()),
			roles: RoleRepository::new(pool.clone(), keying),
			grants,
			memberships,
			pool,
		}
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	pub fn provisioning(&self) -> &ProvisioningEngine {
		&self.provisioning
	}

	pub fn resolver(&self) -> &PermissionResolver {
		&self.resolver
	}

	pub fn nodes(&self) -> &NodeRepository {
		&self.nodes
	}

	pub fn roles(&self) -> &RoleRepository {
		&self.roles
	}

	pub fn grants(&self) -> &GrantRepository {
		&self.grants
	}

	pub fn memberships(&self) -> &MembershipRepository {
		&self.memberships
	}
}
