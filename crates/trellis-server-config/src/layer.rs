// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{DatabaseConfigLayer, LoggingConfigLayer, RbacConfigLayer};

/// Server configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub rbac: Option<RbacConfigLayer>,
}

impl ServerConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_option(
			&mut self.database,
			other.database,
			DatabaseConfigLayer::merge,
		);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_option(&mut self.rbac, other.rbac, RbacConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use trellis_server_auth::RoleKeying;

	#[test]
	fn test_merge_empty_layers() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer::default());
		assert!(base.database.is_none());
		assert!(base.rbac.is_none());
	}

	#[test]
	fn test_merge_other_overwrites() {
		let mut base = ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite:base.db".to_string()),
				max_connections: Some(2),
			}),
			..Default::default()
		};
		let other = ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite:other.db".to_string()),
				max_connections: None,
			}),
			..Default::default()
		};
		base.merge(other);
		let database = base.database.unwrap();
		assert_eq!(database.url.as_deref(), Some("sqlite:other.db"));
		assert_eq!(database.max_connections, Some(2));
	}

	#[test]
	fn test_merge_adds_missing_sections() {
		let mut base = ServerConfigLayer::default();
		base.merge(ServerConfigLayer {
			rbac: Some(RbacConfigLayer {
				role_keying: Some(RoleKeying::DisplayName),
			}),
			..Default::default()
		});
		assert_eq!(
			base.rbac.and_then(|r| r.role_keying),
			Some(RoleKeying::DisplayName)
		);
	}
}
