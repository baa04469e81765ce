// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource tree and permission model error types.

use thiserror::Error;

use crate::types::NodeKind;

/// Errors raised by the pure tree and catalog model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
	/// Malformed creation input (missing parent, empty name, wrong parent kind).
	#[error("validation error: {0}")]
	Validation(String),

	/// The stored ancestor chain is broken. Indicates a bug, not a user error.
	#[error("integrity error: {0}")]
	Integrity(String),

	/// The string is not a `<action>_<kind>` permission codename.
	#[error("invalid permission codename: {0}")]
	InvalidPermission(String),

	/// The string does not name a node kind.
	#[error("unknown node kind: {0}")]
	UnknownNodeKind(String),

	/// A permission was paired with a resource of another kind.
	#[error("permission {permission} does not apply to {kind} resources")]
	PermissionScope { permission: String, kind: NodeKind },
}
