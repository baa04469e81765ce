// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access control configuration.

use serde::Deserialize;
use trellis_server_auth::RoleKeying;

/// Access control configuration (runtime, fully resolved).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RbacConfig {
	/// How Organization and Company role keys are built.
	pub role_keying: RoleKeying,
}

/// Access control configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RbacConfigLayer {
	#[serde(default)]
	pub role_keying: Option<RoleKeying>,
}

impl RbacConfigLayer {
	pub fn merge(&mut self, other: RbacConfigLayer) {
		if other.role_keying.is_some() {
			self.role_keying = other.role_keying;
		}
	}

	pub fn finalize(self) -> RbacConfig {
		RbacConfig {
			role_keying: self.role_keying.unwrap_or_default(),
		}
	}
}
