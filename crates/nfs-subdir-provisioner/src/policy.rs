// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! StorageClass lookup and the delete policy derived from its parameters.

use std::collections::BTreeMap;

use nfs_subdir_k8s::{K8sClient, PersistentVolume};

use crate::error::ProvisionerError;

/// StorageClass parameter holding a path pattern for new directories.
pub const PARAM_PATH_PATTERN: &str = "pathPattern";
/// StorageClass parameter forcing `delete` or `retain` on release.
pub const PARAM_ON_DELETE: &str = "onDelete";
/// StorageClass parameter choosing archive (default) over delete on release.
pub const PARAM_ARCHIVE_ON_DELETE: &str = "archiveOnDelete";

/// Legacy annotation naming the StorageClass of a volume.
const BETA_STORAGE_CLASS_ANNOTATION: &str = "volume.beta.kubernetes.io/storage-class";

/// What happens to a volume directory when its volume is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
	/// Remove the directory and prune emptied parents.
	Delete,
	/// Leave the directory untouched.
	Retain,
	/// Move the directory under the archive directory.
	Archive,
}

impl DeletePolicy {
	/// Derive the policy from StorageClass parameters.
	///
	/// `onDelete` wins when it is `delete` or `retain`. Otherwise
	/// `archiveOnDelete` decides, archiving when it is absent.
	pub fn from_parameters(parameters: &BTreeMap<String, String>) -> Result<Self, ProvisionerError> {
		match parameters.get(PARAM_ON_DELETE).map(String::as_str) {
			Some("delete") => return Ok(DeletePolicy::Delete),
			Some("retain") => return Ok(DeletePolicy::Retain),
			_ => {}
		}

		match parameters.get(PARAM_ARCHIVE_ON_DELETE) {
			Some(value) => match parse_bool(value) {
				Some(true) => Ok(DeletePolicy::Archive),
				Some(false) => Ok(DeletePolicy::Delete),
				None => Err(ProvisionerError::InvalidParameter {
					key: PARAM_ARCHIVE_ON_DELETE.to_string(),
					value: value.clone(),
				}),
			},
			None => Ok(DeletePolicy::Archive),
		}
	}
}

/// Parse the boolean spellings accepted in StorageClass parameters.
fn parse_bool(value: &str) -> Option<bool> {
	match value {
		"1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
		"0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
		_ => None,
	}
}

/// StorageClass name of a volume: the legacy beta annotation when present,
/// otherwise `spec.storageClassName`.
pub fn volume_class_name(volume: &PersistentVolume) -> Option<&str> {
	if let Some(name) = volume
		.metadata
		.annotations
		.as_ref()
		.and_then(|a| a.get(BETA_STORAGE_CLASS_ANNOTATION))
	{
		return Some(name.as_str());
	}
	volume
		.spec
		.as_ref()
		.and_then(|s| s.storage_class_name.as_deref())
		.filter(|name| !name.is_empty())
}

/// Fetch the parameters of the StorageClass that created `volume`.
pub async fn class_parameters_for(
	client: Option<&dyn K8sClient>,
	volume: &PersistentVolume,
) -> Result<BTreeMap<String, String>, ProvisionerError> {
	let client = client.ok_or(ProvisionerError::NoClient)?;
	let class_name = volume_class_name(volume).ok_or_else(|| ProvisionerError::NoStorageClass {
		volume: volume.metadata.name.clone().unwrap_or_default(),
	})?;
	let class = client.get_storage_class(class_name).await?;
	Ok(class.parameters.unwrap_or_default())
}
