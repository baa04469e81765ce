// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use trellis_server_auth::TreeError;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error(transparent)]
	Tree(#[from] TreeError),
}

impl DbError {
	pub(crate) fn integrity(message: impl Into<String>) -> Self {
		DbError::Tree(TreeError::Integrity(message.into()))
	}
}

pub type Result<T> = std::result::Result<T, DbError>;
