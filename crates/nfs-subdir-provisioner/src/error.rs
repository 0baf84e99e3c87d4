// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioner error types.

use std::path::PathBuf;

use crate::types::ProvisioningState;

/// Errors that can occur while provisioning or releasing a volume directory.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionerError {
	/// Claims with a label selector cannot be satisfied
	#[error("claim Selector is not supported")]
	SelectorNotSupported,

	/// The volume directory could not be created
	#[error("unable to create directory to provision new pv: {source}")]
	CreateDirectory {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Open permissions could not be applied to a new directory
	#[error("unable to set permissions on {}: {source}", path.display())]
	SetPermissions {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// No K8s client is available for StorageClass lookups
	#[error("cannot get kube client")]
	NoClient,

	/// The volume does not reference a StorageClass
	#[error("volume {volume} has no storage class")]
	NoStorageClass { volume: String },

	/// The volume carries no NFS source to translate into a local path
	#[error("volume {volume} has no NFS source")]
	MissingNfsSource { volume: String },

	/// The volume's NFS path does not name a directory below the export root
	#[error("path {path} is not inside the export")]
	PathOutsideExport { path: String },

	/// A StorageClass parameter holds a value of the wrong shape
	#[error("invalid value {value:?} for parameter {key}: expected a boolean")]
	InvalidParameter { key: String, value: String },

	/// Recursive removal of a volume directory failed
	#[error("unable to delete {}: {source}", path.display())]
	RemoveDirectory {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Moving a volume directory into the archive failed
	#[error("unable to archive {} to {}: {source}", from.display(), to.display())]
	Archive {
		from: PathBuf,
		to: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Kubernetes error
	#[error(transparent)]
	K8sError(#[from] nfs_subdir_k8s::K8sError),
}

impl ProvisionerError {
	/// How the caller should treat a failed provisioning attempt.
	///
	/// [`ProvisioningState::Finished`] means retrying the same claim cannot
	/// succeed without operator intervention.
	pub fn provisioning_state(&self) -> ProvisioningState {
		match self {
			ProvisionerError::SelectorNotSupported | ProvisionerError::CreateDirectory { .. } => {
				ProvisioningState::Finished
			}
			_ => ProvisioningState::NoChange,
		}
	}
}
