// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A provisioning failure leaves neither the node nor any of its grants.

use sqlx::sqlite::SqlitePool;
use trellis_server_auth::RoleKeying;
use trellis_server_db::testing::create_test_pool;
use trellis_server_rbac::{ProvisioningEngine, RbacError};

async fn count(pool: &SqlitePool, table: &str) -> i64 {
	sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
		.fetch_one(pool)
		.await
		.unwrap()
}

#[tokio::test]
async fn failed_grant_write_rolls_back_the_node() {
	let pool = create_test_pool().await;
	let engine = ProvisioningEngine::new(pool.clone(), RoleKeying::NodeId);
	let org = engine.create_organization("Moose CAN", true).await.unwrap();

	// Fails partway through the company's grants, after its roles and some
	// grants are already written.
	sqlx::query(
		r#"
		CREATE TRIGGER reject_view_company BEFORE INSERT ON grants
		WHEN NEW.permission = 'view_company'
		BEGIN
			SELECT RAISE(ABORT, 'grant rejected');
		END
		"#,
	)
	.execute(&pool)
	.await
	.unwrap();

	let result = engine.create_company(&org, "Honda CAN").await;
	assert!(matches!(result, Err(RbacError::Database(_))));

	assert_eq!(count(&pool, "nodes").await, 1);
	assert_eq!(count(&pool, "roles").await, 4);
	assert_eq!(count(&pool, "grants").await, 13);
}

#[tokio::test]
async fn missing_grant_table_rolls_back_everything() {
	let pool = create_test_pool().await;
	sqlx::query("DROP TABLE grants").execute(&pool).await.unwrap();

	let engine = ProvisioningEngine::new(pool.clone(), RoleKeying::NodeId);
	assert!(engine.create_organization("Moose CAN", true).await.is_err());

	assert_eq!(count(&pool, "nodes").await, 0);
	assert_eq!(count(&pool, "roles").await, 0);
}
