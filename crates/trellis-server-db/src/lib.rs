// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # trellis-server-db
//!
//! Persistence for the resource tree, roles, grants and role memberships,
//! using SQLite via sqlx.
//!
//! ## Repository Pattern
//!
//! Each domain has two components:
//! - **`*Store` trait**: Defines the interface (e.g., `NodeStore`, `GrantStore`)
//! - **`*Repository` struct**: Concrete implementation holding a `SqlitePool`
//!
//! Repositories whose writes take part in provisioning also expose associated
//! `*_in` functions taking a `&mut SqliteConnection`, so that a caller can run
//! several of them inside one transaction:
//!
//! ```rust,ignore
//! let mut tx = pool.begin().await?;
//! NodeRepository::insert_in(&mut tx, &node).await?;
//! let role = RoleRepository::get_or_create_in(&mut tx, &RoleName::Admin, keying).await?;
//! GrantRepository::grant_in(&mut tx, &role.id, permission, &node.resource_ref()).await?;
//! tx.commit().await?;
//! ```
//!
//! ## Error Handling
//!
//! | Variant | When to use |
//! |---------|-------------|
//! | `NotFound` | Resource must exist but doesn't |
//! | `Sqlx` | Let sqlx errors propagate via `?` |
//! | `Internal` | Invalid stored data (e.g., unparseable UUID) |
//! | `Tree` | Broken ancestor chain, permission/kind mismatch |
//!
//! ## Schema
//!
//! Migrations live in `migrations/` and are applied by [`run_migrations`].
//! Tests use the single-connection in-memory pool from `testing`, available
//! to other crates through the `test-utils` feature.

mod error;
pub mod grant;
pub mod membership;
pub mod pool;
pub mod role;
pub mod schema;
pub mod tree;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::{DbError, Result};
pub use grant::{GrantRecord, GrantRepository, GrantStore};
pub use membership::{MembershipRepository, MembershipSource};
pub use pool::{create_pool, create_pool_with_max_connections, DEFAULT_MAX_CONNECTIONS};
pub use role::{RoleRepository, RoleStore};
pub use schema::run_migrations;
pub use tree::{NodeRecord, NodeRepository, NodeStore};
