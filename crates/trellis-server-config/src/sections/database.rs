// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database configuration.

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_URL: &str = "sqlite:./trellis.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Database configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
	pub url: String,
	pub max_connections: u32,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			url: DEFAULT_URL.to_string(),
			max_connections: DEFAULT_MAX_CONNECTIONS,
		}
	}
}

/// Database configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub max_connections: Option<u32>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.max_connections.is_some() {
			self.max_connections = other.max_connections;
		}
	}

	pub fn finalize(self) -> Result<DatabaseConfig, ConfigError> {
		let max_connections = self.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS);
		if max_connections == 0 {
			return Err(ConfigError::InvalidValue {
				key: "database.max_connections".to_string(),
				message: "must be at least 1".to_string(),
			});
		}

		Ok(DatabaseConfig {
			url: self.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
			max_connections,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_url() {
		let config = DatabaseConfigLayer::default().finalize().unwrap();
		assert_eq!(config, DatabaseConfig::default());
		assert_eq!(config.url, "sqlite:./trellis.db");
	}

	#[test]
	fn test_custom_values() {
		let layer = DatabaseConfigLayer {
			url: Some("sqlite:/var/lib/trellis/data.db".to_string()),
			max_connections: Some(16),
		};
		let config = layer.finalize().unwrap();
		assert_eq!(config.url, "sqlite:/var/lib/trellis/data.db");
		assert_eq!(config.max_connections, 16);
	}

	#[test]
	fn test_zero_connections_rejected() {
		let layer = DatabaseConfigLayer {
			max_connections: Some(0),
			..Default::default()
		};
		assert!(matches!(
			layer.finalize(),
			Err(ConfigError::InvalidValue { .. })
		));
	}

	#[test]
	fn test_merge_keeps_unset_fields() {
		let mut base = DatabaseConfigLayer {
			url: Some("sqlite:a.db".to_string()),
			max_connections: Some(2),
		};
		base.merge(DatabaseConfigLayer {
			url: None,
			max_connections: Some(8),
		});
		assert_eq!(base.url.as_deref(), Some("sqlite:a.db"));
		assert_eq!(base.max_connections, Some(8));
	}
}
