// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioner configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the provisioner mounts the NFS export by convention.
pub const DEFAULT_MOUNT_PATH: &str = "/persistentvolumes";

/// Configuration for the volume provisioner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionerConfig {
	/// NFS server address advertised in created volumes
	pub server: String,
	/// Export root path on the NFS server
	pub export_path: PathBuf,
	/// Local mount point of the export inside the provisioner
	pub mount_path: PathBuf,
	/// Value StorageClasses use in `provisioner` to select this instance
	pub provisioner_name: String,
}

impl ProvisionerConfig {
	pub fn new(
		server: impl Into<String>,
		export_path: impl Into<PathBuf>,
		provisioner_name: impl Into<String>,
	) -> Self {
		Self {
			server: server.into(),
			export_path: export_path.into(),
			mount_path: PathBuf::from(DEFAULT_MOUNT_PATH),
			provisioner_name: provisioner_name.into(),
		}
	}

	/// Override the local mount point.
	pub fn with_mount_path(mut self, mount_path: impl Into<PathBuf>) -> Self {
		self.mount_path = mount_path.into();
		self
	}
}
