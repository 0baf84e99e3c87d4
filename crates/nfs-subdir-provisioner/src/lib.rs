// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Directory provisioning for NFS-backed PersistentVolumes.
//!
//! Each claim gets its own subdirectory of a shared NFS export. This crate
//! holds the decision logic the controller calls into:
//!
//! - Rendering `pathPattern` templates against claim metadata
//! - Creating volume directories and describing them as PersistentVolumes
//! - Deleting, retaining or archiving directories when volumes are released
//! - Resolving the StorageClass policy of a released volume
//!
//! The controller that watches claims and volumes, retries failures and
//! creates the API objects lives in `nfs-subdir-controller`.

pub mod archive;
pub mod config;
pub mod error;
pub mod policy;
pub mod provisioner;
pub mod template;
pub mod types;

pub use config::{ProvisionerConfig, DEFAULT_MOUNT_PATH};
pub use error::ProvisionerError;
pub use policy::{DeletePolicy, PARAM_ARCHIVE_ON_DELETE, PARAM_ON_DELETE, PARAM_PATH_PATTERN};
pub use provisioner::{Provisioner, PROVISIONED_BY_ANNOTATION};
pub use template::{ClaimMetadata, PathTemplate};
pub use types::{ProvisionOutcome, ProvisionRequest, ProvisioningState, VolumePaths};
