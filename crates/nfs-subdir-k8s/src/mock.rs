// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-memory K8s client for tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{PersistentVolume, PersistentVolumeClaim, StorageClass};

#[derive(Debug, Default)]
struct MockState {
	classes: BTreeMap<String, StorageClass>,
	claims: Vec<PersistentVolumeClaim>,
	volumes: BTreeMap<String, PersistentVolume>,
	api_error: Option<String>,
}

/// A mock K8s client backed by in-memory maps.
///
/// Objects are keyed by `metadata.name`. Setting an API error makes every
/// subsequent call fail with [`K8sError::ApiError`] until it is cleared.
#[derive(Debug, Clone, Default)]
pub struct MockK8sClient {
	state: Arc<Mutex<MockState>>,
}

impl MockK8sClient {
	/// Create an empty mock client.
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a StorageClass.
	pub fn add_storage_class(&self, class: StorageClass) {
		let name = class.metadata.name.clone().unwrap_or_default();
		self.state.lock().unwrap().classes.insert(name, class);
	}

	/// Register a PersistentVolumeClaim.
	pub fn add_claim(&self, claim: PersistentVolumeClaim) {
		self.state.lock().unwrap().claims.push(claim);
	}

	/// Remove a PersistentVolumeClaim by UID.
	pub fn remove_claim(&self, uid: &str) {
		self
			.state
			.lock()
			.unwrap()
			.claims
			.retain(|claim| claim.metadata.uid.as_deref() != Some(uid));
	}

	/// Register a PersistentVolume.
	pub fn add_volume(&self, volume: PersistentVolume) {
		let name = volume.metadata.name.clone().unwrap_or_default();
		self.state.lock().unwrap().volumes.insert(name, volume);
	}

	/// Make every call fail with the given message, or clear the failure.
	pub fn set_api_error(&self, message: Option<&str>) {
		self.state.lock().unwrap().api_error = message.map(str::to_string);
	}

	/// Snapshot of the stored volumes.
	pub fn volumes(&self) -> Vec<PersistentVolume> {
		self.state.lock().unwrap().volumes.values().cloned().collect()
	}

	/// Look up a stored volume by name.
	pub fn volume(&self, name: &str) -> Option<PersistentVolume> {
		self.state.lock().unwrap().volumes.get(name).cloned()
	}

	fn check(&self) -> Result<(), K8sError> {
		match &self.state.lock().unwrap().api_error {
			Some(message) => Err(K8sError::ApiError {
				message: message.clone(),
			}),
			None => Ok(()),
		}
	}
}

#[async_trait]
impl K8sClient for MockK8sClient {
	async fn get_storage_class(&self, name: &str) -> Result<StorageClass, K8sError> {
		self.check()?;
		self
			.state
			.lock()
			.unwrap()
			.classes
			.get(name)
			.cloned()
			.ok_or_else(|| K8sError::StorageClassNotFound { name: name.into() })
	}

	async fn list_storage_classes(&self) -> Result<Vec<StorageClass>, K8sError> {
		self.check()?;
		Ok(self.state.lock().unwrap().classes.values().cloned().collect())
	}

	async fn list_claims(&self) -> Result<Vec<PersistentVolumeClaim>, K8sError> {
		self.check()?;
		Ok(self.state.lock().unwrap().claims.clone())
	}

	async fn list_volumes(&self) -> Result<Vec<PersistentVolume>, K8sError> {
		self.check()?;
		Ok(self.volumes())
	}

	async fn create_volume(&self, volume: PersistentVolume) -> Result<PersistentVolume, K8sError> {
		self.check()?;
		let name = volume.metadata.name.clone().unwrap_or_default();
		let mut state = self.state.lock().unwrap();
		if state.volumes.contains_key(&name) {
			return Err(K8sError::VolumeAlreadyExists { name });
		}
		state.volumes.insert(name, volume.clone());
		Ok(volume)
	}

	async fn delete_volume(&self, name: &str) -> Result<(), K8sError> {
		self.check()?;
		match self.state.lock().unwrap().volumes.remove(name) {
			Some(_) => Ok(()),
			None => Err(K8sError::VolumeNotFound { name: name.into() }),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::ObjectMeta;

	fn class(name: &str) -> StorageClass {
		StorageClass {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				..Default::default()
			},
			provisioner: "example.com/nfs".to_string(),
			..Default::default()
		}
	}

	fn volume(name: &str) -> PersistentVolume {
		PersistentVolume {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				..Default::default()
			},
			..Default::default()
		}
	}

	#[test]
	fn get_storage_class_returns_registered_class() {
		let mock = MockK8sClient::new();
		mock.add_storage_class(class("nfs-client"));

		let found = tokio_test::block_on(mock.get_storage_class("nfs-client")).unwrap();
		assert_eq!(found.metadata.name.as_deref(), Some("nfs-client"));
	}

	#[test]
	fn get_storage_class_missing_is_not_found() {
		let mock = MockK8sClient::new();
		let err = tokio_test::block_on(mock.get_storage_class("absent")).unwrap_err();
		assert!(matches!(err, K8sError::StorageClassNotFound { ref name } if name == "absent"));
	}

	#[test]
	fn create_volume_twice_conflicts() {
		let mock = MockK8sClient::new();
		tokio_test::block_on(mock.create_volume(volume("pvc-1"))).unwrap();

		let err = tokio_test::block_on(mock.create_volume(volume("pvc-1"))).unwrap_err();
		assert!(matches!(err, K8sError::VolumeAlreadyExists { .. }));
		assert_eq!(mock.volumes().len(), 1);
	}

	#[test]
	fn delete_volume_removes_it() {
		let mock = MockK8sClient::new();
		mock.add_volume(volume("pvc-1"));

		tokio_test::block_on(mock.delete_volume("pvc-1")).unwrap();
		assert!(mock.volume("pvc-1").is_none());

		let err = tokio_test::block_on(mock.delete_volume("pvc-1")).unwrap_err();
		assert!(matches!(err, K8sError::VolumeNotFound { .. }));
	}

	#[test]
	fn api_error_fails_every_call_until_cleared() {
		let mock = MockK8sClient::new();
		mock.add_storage_class(class("nfs-client"));
		mock.set_api_error(Some("connection refused"));

		let err = tokio_test::block_on(mock.get_storage_class("nfs-client")).unwrap_err();
		assert_eq!(err.to_string(), "K8s API error: connection refused");
		assert!(tokio_test::block_on(mock.list_claims()).is_err());

		mock.set_api_error(None);
		assert!(tokio_test::block_on(mock.get_storage_class("nfs-client")).is_ok());
	}
}
