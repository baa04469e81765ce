// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schema migrations.

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const MIGRATIONS: &[(&str, &str)] = &[
	(
		"001_resource_tree",
		include_str!("../migrations/001_resource_tree.sql"),
	),
	("002_roles", include_str!("../migrations/002_roles.sql")),
	("003_grants", include_str!("../migrations/003_grants.sql")),
	(
		"004_role_memberships",
		include_str!("../migrations/004_role_memberships.sql"),
	),
];

/// Run all database migrations (001-004).
///
/// # Errors
/// Returns `DbError::Sqlx` if a statement fails for any reason other than the
/// object already existing.
///
/// # Note
/// Migrations are idempotent - safe to run multiple times.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	for (name, sql) in MIGRATIONS {
		for stmt in sql.split(';').filter(|s| !is_blank(s)) {
			if let Err(e) = sqlx::query(stmt).execute(pool).await {
				if !e.to_string().contains("already exists") {
					tracing::error!(migration = name, error = %e, "migration failed");
					return Err(e.into());
				}
			}
		}
		tracing::debug!(migration = name, "migration applied");
	}
	Ok(())
}

fn is_blank(stmt: &str) -> bool {
	stmt
		.lines()
		.map(str::trim)
		.all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	#[tokio::test]
	async fn migrations_are_idempotent() {
		let pool = create_test_pool().await;
		run_migrations(&pool).await.unwrap();
		run_migrations(&pool).await.unwrap();

		let tables: Vec<String> = sqlx::query_scalar(
			"SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
		)
		.fetch_all(&pool)
		.await
		.unwrap();
		assert_eq!(tables, vec!["grants", "nodes", "role_memberships", "roles"]);
	}

	#[test]
	fn comment_only_chunks_are_blank() {
		assert!(is_blank("\n-- trailing comment\n  "));
		assert!(!is_blank("-- header\nCREATE TABLE t (x)"));
	}
}
