// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Trellis RBAC service.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`TRELLIS_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use trellis_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("Database at {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub rbac: RbacConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`TRELLIS_SERVER_*`)
/// 2. Config file (`/etc/trellis/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![Box::new(DefaultsSource), Box::new(EnvSource)])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge the given sources in precedence order and finalize the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize()?;
	let logging = layer.logging.unwrap_or_default().finalize();
	let rbac = layer.rbac.unwrap_or_default().finalize();

	validate_config(&database)?;

	info!(
		database = %database.url,
		max_connections = database.max_connections,
		role_keying = %rbac.role_keying,
		log_format = %logging.format,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		database,
		logging,
		rbac,
	})
}

/// Validate cross-field configuration rules.
///
/// Run by every loader; callers that build a [`ServerConfig`] by hand should
/// run it themselves.
pub fn validate_config(database: &DatabaseConfig) -> Result<(), ConfigError> {
	if database.url.starts_with("sqlite::memory:") && database.max_connections > 1 {
		return Err(ConfigError::Validation(
			"an in-memory database is private to each connection; \
			 set database.max_connections = 1 or use a file database"
				.to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use trellis_server_auth::RoleKeying;

	struct FixedSource(Precedence, ServerConfigLayer);

	impl ConfigSource for FixedSource {
		fn name(&self) -> &'static str {
			"fixed"
		}

		fn precedence(&self) -> Precedence {
			self.0
		}

		fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
			Ok(self.1.clone())
		}
	}

	fn with_url(url: &str) -> ServerConfigLayer {
		ServerConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some(url.to_string()),
				max_connections: None,
			}),
			..Default::default()
		}
	}

	#[test]
	fn test_defaults() {
		let config = load_from_sources(vec![Box::new(DefaultsSource)]).unwrap();
		assert_eq!(config, ServerConfig::default());
		assert_eq!(config.rbac.role_keying, RoleKeying::NodeId);
	}

	#[test]
	fn test_higher_precedence_wins_regardless_of_order() {
		let config = load_from_sources(vec![
			Box::new(FixedSource(Precedence::Environment, with_url("sqlite:env.db"))),
			Box::new(FixedSource(Precedence::ConfigFile, with_url("sqlite:file.db"))),
			Box::new(DefaultsSource),
		])
		.unwrap();
		assert_eq!(config.database.url, "sqlite:env.db");
	}

	#[test]
	fn test_in_memory_database_needs_single_connection() {
		let memory = DatabaseConfig {
			url: "sqlite::memory:".to_string(),
			max_connections: 4,
		};
		let result = validate_config(&memory);
		assert!(matches!(result, Err(ConfigError::Validation(_))));

		let single = DatabaseConfig {
			max_connections: 1,
			..memory
		};
		assert!(validate_config(&single).is_ok());
	}
}
