// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{
	SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

use crate::error::DbError;

/// Default upper bound on pooled connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Create a SqlitePool with WAL mode and common settings.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./trellis.db")
///
/// # Errors
/// - `DbError::Internal` if the URL is not a `sqlite:` URL or cannot be parsed.
/// - `DbError::Sqlx` if the database cannot be opened.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, DbError> {
	create_pool_with_max_connections(database_url, DEFAULT_MAX_CONNECTIONS).await
}

/// Like [`create_pool`] with an explicit connection limit.
///
/// Foreign keys are enforced and writers wait up to five seconds for the
/// database lock before failing with `SQLITE_BUSY`.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool_with_max_connections(
	database_url: &str,
	max_connections: u32,
) -> Result<SqlitePool, DbError> {
	if max_connections == 0 {
		return Err(DbError::Internal(
			"max_connections must be at least 1".to_string(),
		));
	}

	// Anything else would be taken as a bare file name.
	if !database_url.starts_with("sqlite:") {
		return Err(DbError::Internal(format!(
			"Invalid database URL {database_url}: expected a sqlite: URL"
		)));
	}

	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.busy_timeout(Duration::from_secs(5))
		.create_if_missing(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(max_connections)
		.connect_with(options)
		.await?;

	tracing::debug!(max_connections, "database pool created");
	Ok(pool)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn rejects_invalid_url() {
		let result = create_pool("postgres://nope").await;
		assert!(matches!(result, Err(DbError::Internal(_))));

		let bare = create_pool("./trellis.db").await;
		assert!(matches!(bare, Err(DbError::Internal(_))));
	}

	#[tokio::test]
	async fn unopenable_file_is_a_database_error() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("missing/trellis.db").display());
		let result = create_pool(&url).await;
		assert!(matches!(result, Err(DbError::Sqlx(_))));
	}

	#[tokio::test]
	async fn rejects_zero_connections() {
		let result = create_pool_with_max_connections("sqlite::memory:", 0).await;
		assert!(matches!(result, Err(DbError::Internal(_))));
	}

	#[tokio::test]
	async fn creates_file_database() {
		let dir = tempfile::tempdir().unwrap();
		let url = format!("sqlite:{}", dir.path().join("trellis.db").display());
		let pool = create_pool(&url).await.unwrap();
		let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.unwrap();
		assert_eq!(one, 1);
	}
}
