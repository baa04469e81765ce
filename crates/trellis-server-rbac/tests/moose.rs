// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Two organizations, one managed and one not, checked end to end.

use trellis_server_auth::{PrincipalId, Resource, RoleKeying, RoleName};
use trellis_server_db::testing::create_test_pool;
use trellis_server_rbac::RbacService;

async fn member_of(rbac: &RbacService, role: &RoleName) -> PrincipalId {
	let role = rbac
		.roles()
		.get_role(role)
		.await
		.unwrap()
		.unwrap_or_else(|| panic!("role {} was not provisioned", role.display_name()));
	let principal = PrincipalId::generate();
	rbac.memberships().add_member(&role.id, &principal).await.unwrap();
	principal
}

async fn can<R: Resource>(rbac: &RbacService, who: &PrincipalId, permission: &str, on: &R) -> bool {
	rbac.resolver()
		.check(who, permission, &on.resource_ref())
		.await
		.unwrap()
}

#[tokio::test]
async fn moose_scenario() {
	let rbac = RbacService::from_pool(create_test_pool().await, RoleKeying::NodeId);
	let engine = rbac.provisioning();

	let moose_can = engine.create_organization("Moose CAN", true).await.unwrap();
	let honda_can = engine.create_company(&moose_can, "Honda CAN").await.unwrap();
	let bc_honda = engine.create_project(&honda_can, "BC Honda").await.unwrap();

	let moose_usa = engine.create_organization("Moose USA", false).await.unwrap();
	let _att = engine.create_company(&moose_usa, "AT&T").await.unwrap();
	let honda_usa = engine.create_company(&moose_usa, "Honda USA").await.unwrap();
	let ny_honda = engine.create_project(&honda_usa, "NY Honda").await.unwrap();

	let admin = member_of(&rbac, &RoleName::Admin).await;
	assert!(can(&rbac, &admin, "change_project", &bc_honda).await);
	assert!(can(&rbac, &admin, "change_project", &ny_honda).await);

	let manager = member_of(&rbac, &RoleName::Manager).await;
	assert!(can(&rbac, &manager, "change_project", &bc_honda).await);
	assert!(!can(&rbac, &manager, "change_project", &ny_honda).await);
	assert!(!can(&rbac, &manager, "view_organization", &moose_usa).await);

	let can_admin = member_of(&rbac, &RoleName::org_admin(&moose_can)).await;
	assert!(can(&rbac, &can_admin, "change_project", &bc_honda).await);
	assert!(!can(&rbac, &can_admin, "change_project", &ny_honda).await);

	let can_observer = member_of(&rbac, &RoleName::org_observer(&moose_can)).await;
	assert!(can(&rbac, &can_observer, "view_project", &bc_honda).await);
	assert!(!can(&rbac, &can_observer, "change_project", &bc_honda).await);

	let honda_usa_admin = member_of(&rbac, &RoleName::company_admin(&honda_usa)).await;
	assert!(can(&rbac, &honda_usa_admin, "change_project", &ny_honda).await);
	assert!(!can(&rbac, &honda_usa_admin, "change_organization", &moose_usa).await);
	assert!(!can(&rbac, &honda_usa_admin, "change_project", &bc_honda).await);
}

#[tokio::test]
async fn permissions_and_accessible_resources() {
	let rbac = RbacService::from_pool(create_test_pool().await, RoleKeying::NodeId);
	let engine = rbac.provisioning();

	let moose_usa = engine.create_organization("Moose USA", false).await.unwrap();
	let att = engine.create_company(&moose_usa, "AT&T").await.unwrap();
	let honda_usa = engine.create_company(&moose_usa, "Honda USA").await.unwrap();
	let ny_honda = engine.create_project(&honda_usa, "NY Honda").await.unwrap();

	let observer = member_of(&rbac, &RoleName::company_observer(&honda_usa)).await;
	let held = rbac
		.resolver()
		.permissions(&observer, &ny_honda.resource_ref())
		.await
		.unwrap();
	assert_eq!(held.into_iter().collect::<Vec<_>>(), vec!["view_project"]);

	let org_admin = member_of(&rbac, &RoleName::org_admin(&moose_usa)).await;
	let companies = rbac
		.resolver()
		.accessible_resources(&org_admin, "change_company")
		.await
		.unwrap();
	assert_eq!(companies.len(), 2);
	assert!(companies.contains(&honda_usa.resource_ref()));
	assert!(companies.contains(&att.resource_ref()));

	let none = rbac
		.resolver()
		.accessible_resources(&org_admin, "frobnicate_company")
		.await
		.unwrap();
	assert!(none.is_empty());
}

#[tokio::test]
async fn revoking_membership_revokes_access() {
	let rbac = RbacService::from_pool(create_test_pool().await, RoleKeying::NodeId);
	let org = rbac
		.provisioning()
		.create_organization("Moose CAN", true)
		.await
		.unwrap();

	let role = rbac
		.roles()
		.get_role(&RoleName::org_admin(&org))
		.await
		.unwrap()
		.unwrap();
	let principal = PrincipalId::generate();
	rbac.memberships().add_member(&role.id, &principal).await.unwrap();
	assert!(can(&rbac, &principal, "delete_organization", &org).await);

	rbac.memberships().remove_member(&role.id, &principal).await.unwrap();
	assert!(!can(&rbac, &principal, "delete_organization", &org).await);
}
