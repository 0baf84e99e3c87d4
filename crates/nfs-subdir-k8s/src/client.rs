// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::K8sResult;
use crate::types::{PersistentVolume, PersistentVolumeClaim, StorageClass};

/// Trait for K8s client operations.
///
/// This abstraction allows for easy mocking in tests while providing
/// a clean interface for the K8s operations needed by the volume provisioner.
/// Every call is read-only except volume creation and deletion.
#[async_trait]
pub trait K8sClient: Send + Sync {
	/// Get a cluster-scoped StorageClass by name.
	async fn get_storage_class(&self, name: &str) -> K8sResult<StorageClass>;

	/// List all StorageClasses in the cluster.
	async fn list_storage_classes(&self) -> K8sResult<Vec<StorageClass>>;

	/// List PersistentVolumeClaims across all namespaces.
	async fn list_claims(&self) -> K8sResult<Vec<PersistentVolumeClaim>>;

	/// List all PersistentVolumes in the cluster.
	async fn list_volumes(&self) -> K8sResult<Vec<PersistentVolume>>;

	/// Create a PersistentVolume.
	///
	/// Returns [`VolumeAlreadyExists`](crate::K8sError::VolumeAlreadyExists)
	/// when a volume with the same name is already present.
	async fn create_volume(&self, volume: PersistentVolume) -> K8sResult<PersistentVolume>;

	/// Delete a PersistentVolume by name.
	async fn delete_volume(&self, name: &str) -> K8sResult<()>;
}
