// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resource tree and role model for Trellis.
//!
//! This crate is pure: no I/O, no database. It provides:
//! - The four-level resource tree (Organization → Company → Project → Task)
//!   and the [`Resource`] capability every node kind implements
//! - The static permission catalog ([`permissions_for`])
//! - Global and scoped roles ([`RoleName`], [`Role`])
//! - The provisioning plan computed for a newly created node
//!   ([`ProvisioningPlan`])
//!
//! # Design
//!
//! Permissions are granted per object. Instead of walking the tree when a
//! permission is checked, creation of a node writes direct grants for every
//! role that inherits access to it. Persistence and execution of the plan live
//! in `trellis-server-db` and `trellis-server-rbac`.

pub mod catalog;
pub mod error;
pub mod provisioning;
pub mod role;
pub mod tree;
pub mod types;

pub use catalog::{permissions_for, Permission, PermissionSet};
pub use error::TreeError;
pub use provisioning::{PlannedGrant, ProvisioningPlan};
pub use role::{Role, RoleKeying, RoleName, ScopedRole, ADMIN_ROLE, MANAGER_ROLE};
pub use tree::{
	validate_name, Company, NewNode, Node, Organization, Project, Resource, ResourceRef, Task,
	MAX_NAME_LEN,
};
pub use types::{Action, NodeId, NodeKind, PrincipalId, RoleId};
