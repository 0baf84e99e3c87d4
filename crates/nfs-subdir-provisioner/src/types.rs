// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioning request and result types.

use std::path::PathBuf;

use nfs_subdir_k8s::{PersistentVolume, PersistentVolumeClaim, StorageClass};
use serde::{Deserialize, Serialize};

/// Outcome reported to the controller alongside a provisioning result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningState {
	/// Provisioning is complete, successfully or not. Do not retry.
	Finished,
	/// Provisioning continues asynchronously.
	InBackground,
	/// Nothing changed; the controller may retry.
	NoChange,
}

/// A request to provision a volume for a claim.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
	/// Name chosen for the new PersistentVolume.
	pub pv_name: String,
	pub claim: PersistentVolumeClaim,
	pub storage_class: StorageClass,
}

impl ProvisionRequest {
	pub fn new(
		pv_name: impl Into<String>,
		claim: PersistentVolumeClaim,
		storage_class: StorageClass,
	) -> Self {
		Self {
			pv_name: pv_name.into(),
			claim,
			storage_class,
		}
	}

	pub fn claim_name(&self) -> &str {
		self.claim.metadata.name.as_deref().unwrap_or_default()
	}

	pub fn claim_namespace(&self) -> &str {
		self.claim.metadata.namespace.as_deref().unwrap_or_default()
	}

	/// Value of a StorageClass parameter, if set.
	pub fn parameter(&self, key: &str) -> Option<&str> {
		self
			.storage_class
			.parameters
			.as_ref()
			.and_then(|p| p.get(key))
			.map(String::as_str)
	}
}

/// Result of a successful provisioning call.
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
	pub volume: PersistentVolume,
	pub state: ProvisioningState,
}

/// The two views of one volume directory.
///
/// Both name the same directory: `local` is rooted at the provisioner's
/// mount of the export, `export` at the export path on the NFS server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePaths {
	pub local: PathBuf,
	pub export: PathBuf,
}
