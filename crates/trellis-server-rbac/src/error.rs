// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access control error types.
//!
//! Storage errors that carry a tree fault are lifted into the two
//! caller-facing categories, so callers can tell bad input apart from a
//! broken invariant without matching on database internals.

use thiserror::Error;
use trellis_server_auth::TreeError;
use trellis_server_config::ConfigError;
use trellis_server_db::DbError;

#[derive(Debug, Error)]
pub enum RbacError {
	/// Malformed creation input or resource reference. Nothing was written.
	#[error("validation error: {0}")]
	Validation(String),

	/// A stored ancestor chain is broken.
	#[error("integrity error: {0}")]
	Integrity(String),

	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("database error: {0}")]
	Database(#[source] DbError),
}

impl From<TreeError> for RbacError {
	fn from(e: TreeError) -> Self {
		match e {
			TreeError::Integrity(message) => RbacError::Integrity(message),
			other => RbacError::Validation(other.to_string()),
		}
	}
}

impl From<DbError> for RbacError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::Tree(tree) => tree.into(),
			other => RbacError::Database(other),
		}
	}
}

impl From<sqlx::Error> for RbacError {
	fn from(e: sqlx::Error) -> Self {
		RbacError::Database(DbError::Sqlx(e))
	}
}

pub type Result<T> = std::result::Result<T, RbacError>;
