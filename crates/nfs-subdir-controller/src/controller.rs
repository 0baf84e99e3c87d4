// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Periodic reconcile loop that drives the provisioner.
//!
//! Each pass provisions pending claims of our StorageClasses and releases
//! volumes we created once they are `Released`. Failures are logged and
//! picked up again on the next pass.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use nfs_subdir_k8s::{K8sClient, K8sError, PersistentVolume, PersistentVolumeClaim, StorageClass};
use nfs_subdir_provisioner::{
	ProvisionRequest, Provisioner, ProvisioningState, PROVISIONED_BY_ANNOTATION,
};
use tokio::sync::Mutex;

const PHASE_PENDING: &str = "Pending";
const PHASE_RELEASED: &str = "Released";
const RECLAIM_DELETE: &str = "Delete";

/// Counts from one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
	pub provisioned: u32,
	pub released: u32,
	pub failed: u32,
}

pub struct Controller {
	client: Arc<dyn K8sClient>,
	provisioner: Arc<Provisioner>,
	/// Claims whose provisioning failed for good; never retried.
	abandoned_claims: Mutex<HashSet<String>>,
}

impl Controller {
	pub fn new(client: Arc<dyn K8sClient>, provisioner: Arc<Provisioner>) -> Self {
		Self {
			client,
			provisioner,
			abandoned_claims: Mutex::new(HashSet::new()),
		}
	}

	fn provisioner_name(&self) -> &str {
		&self.provisioner.config().provisioner_name
	}

	/// Run one provision pass and one release pass.
	pub async fn run_once(&self) -> Result<ReconcileSummary, K8sError> {
		let mut summary = ReconcileSummary::default();
		self.provision_pending_claims(&mut summary).await?;
		self.release_volumes(&mut summary).await?;
		Ok(summary)
	}

	async fn provision_pending_claims(&self, summary: &mut ReconcileSummary) -> Result<(), K8sError> {
		let classes: BTreeMap<String, StorageClass> = self
			.client
			.list_storage_classes()
			.await?
			.into_iter()
			.filter(|class| class.provisioner == self.provisioner_name())
			.filter_map(|class| class.metadata.name.clone().map(|name| (name, class)))
			.collect();
		let claims = self.client.list_claims().await?;
		self.forget_deleted_claims(&claims).await;
		if classes.is_empty() {
			return Ok(());
		}

		let existing: HashSet<String> = self
			.client
			.list_volumes()
			.await?
			.into_iter()
			.filter_map(|volume| volume.metadata.name)
			.collect();

		for claim in claims {
			let Some(class_name) = pending_claim_class(&claim) else {
				continue;
			};
			let Some(class) = classes.get(class_name) else {
				continue;
			};
			let Some(uid) = claim.metadata.uid.clone() else {
				continue;
			};
			let pv_name = format!("pvc-{uid}");
			if existing.contains(&pv_name) || self.abandoned_claims.lock().await.contains(&uid) {
				continue;
			}

			let request = ProvisionRequest::new(pv_name.clone(), claim, class.clone());
			match self.provisioner.provision(&request).await {
				Ok(outcome) => match self.client.create_volume(outcome.volume).await {
					Ok(_) | Err(K8sError::VolumeAlreadyExists { .. }) => {
						tracing::info!(pv_name = %pv_name, "Provisioned volume");
						summary.provisioned += 1;
					}
					Err(e) => {
						tracing::warn!(pv_name = %pv_name, error = %e, "Failed to create PersistentVolume");
						summary.failed += 1;
					}
				},
				Err(e) => {
					let state = e.provisioning_state();
					tracing::warn!(pv_name = %pv_name, error = %e, ?state, "Failed to provision volume");
					if state == ProvisioningState::Finished {
						self.abandoned_claims.lock().await.insert(uid);
					}
					summary.failed += 1;
				}
			}
		}
		Ok(())
	}

	/// Drop abandoned claims that no longer exist in the cluster.
	async fn forget_deleted_claims(&self, claims: &[PersistentVolumeClaim]) {
		let live: HashSet<&str> = claims
			.iter()
			.filter_map(|claim| claim.metadata.uid.as_deref())
			.collect();
		self
			.abandoned_claims
			.lock()
			.await
			.retain(|uid| live.contains(uid.as_str()));
	}

	async fn release_volumes(&self, summary: &mut ReconcileSummary) -> Result<(), K8sError> {
		for volume in self.client.list_volumes().await? {
			if !self.is_releasable(&volume) {
				continue;
			}
			let name = volume.metadata.name.clone().unwrap_or_default();

			if let Err(e) = self.provisioner.delete(&volume).await {
				tracing::warn!(pv_name = %name, error = %e, "Failed to release volume");
				summary.failed += 1;
				continue;
			}

			match self.client.delete_volume(&name).await {
				Ok(()) | Err(K8sError::VolumeNotFound { .. }) => {
					tracing::info!(pv_name = %name, "Released volume");
					summary.released += 1;
				}
				Err(e) => {
					tracing::warn!(pv_name = %name, error = %e, "Failed to delete PersistentVolume");
					summary.failed += 1;
				}
			}
		}
		Ok(())
	}

	fn is_releasable(&self, volume: &PersistentVolume) -> bool {
		let ours = volume
			.metadata
			.annotations
			.as_ref()
			.and_then(|a| a.get(PROVISIONED_BY_ANNOTATION))
			.is_some_and(|owner| owner == self.provisioner_name());
		let released = volume
			.status
			.as_ref()
			.and_then(|s| s.phase.as_deref())
			== Some(PHASE_RELEASED);
		let reclaim_delete = volume
			.spec
			.as_ref()
			.and_then(|s| s.persistent_volume_reclaim_policy.as_deref())
			== Some(RECLAIM_DELETE);
		ours && released && reclaim_delete
	}
}

/// StorageClass of a claim that is still waiting for a volume.
fn pending_claim_class(claim: &PersistentVolumeClaim) -> Option<&str> {
	let phase = claim.status.as_ref().and_then(|s| s.phase.as_deref());
	if !matches!(phase, None | Some(PHASE_PENDING)) {
		return None;
	}
	let spec = claim.spec.as_ref()?;
	if spec.volume_name.as_deref().is_some_and(|v| !v.is_empty()) {
		return None;
	}
	spec.storage_class_name.as_deref()
}

/// Start the reconcile loop.
///
/// Runs a pass immediately, then loops at the configured interval.
pub async fn start_controller_task(controller: Arc<Controller>, interval: Duration) {
	tracing::info!(interval_secs = interval.as_secs(), "Starting controller task");

	loop {
		run_pass(&controller).await;
		tokio::time::sleep(interval).await;
	}
}

async fn run_pass(controller: &Controller) {
	tracing::debug!("Running reconcile pass");

	match controller.run_once().await {
		Ok(summary) => {
			if summary == ReconcileSummary::default() {
				tracing::debug!("Reconcile pass completed, nothing to do");
			} else {
				tracing::info!(
					provisioned = summary.provisioned,
					released = summary.released,
					failed = summary.failed,
					"Reconcile pass completed"
				);
			}
		}
		Err(e) => {
			tracing::error!(error = %e, "Reconcile pass failed");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use nfs_subdir_k8s::{
		LabelSelector, MockK8sClient, ObjectMeta, PersistentVolumeClaimSpec,
		PersistentVolumeClaimStatus, PersistentVolumeStatus,
	};
	use nfs_subdir_provisioner::ProvisionerConfig;
	use tempfile::TempDir;

	const PROVISIONER: &str = "example.com/nfs";

	fn class(name: &str, provisioner: &str, parameters: &[(&str, &str)]) -> StorageClass {
		StorageClass {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				..Default::default()
			},
			provisioner: provisioner.to_string(),
			parameters: Some(
				parameters
					.iter()
					.map(|(k, v)| (k.to_string(), v.to_string()))
					.collect(),
			),
			reclaim_policy: Some("Delete".to_string()),
			..Default::default()
		}
	}

	fn claim(name: &str, uid: &str, class_name: &str) -> PersistentVolumeClaim {
		PersistentVolumeClaim {
			metadata: ObjectMeta {
				name: Some(name.to_string()),
				namespace: Some("ns1".to_string()),
				uid: Some(uid.to_string()),
				..Default::default()
			},
			spec: Some(PersistentVolumeClaimSpec {
				storage_class_name: Some(class_name.to_string()),
				access_modes: Some(vec!["ReadWriteMany".to_string()]),
				..Default::default()
			}),
			status: Some(PersistentVolumeClaimStatus {
				phase: Some("Pending".to_string()),
				..Default::default()
			}),
		}
	}

	fn setup() -> (Controller, MockK8sClient, TempDir) {
		let tmp = TempDir::new().unwrap();
		let mock = MockK8sClient::new();
		let client: Arc<dyn K8sClient> = Arc::new(mock.clone());
		let config = ProvisionerConfig::new("nfs.example.com", "/exports/data", PROVISIONER)
			.with_mount_path(tmp.path());
		let provisioner = Arc::new(Provisioner::new(client.clone(), config));
		(Controller::new(client, provisioner), mock, tmp)
	}

	fn mark_released(mock: &MockK8sClient, name: &str) {
		let mut volume = mock.volume(name).unwrap();
		volume.status = Some(PersistentVolumeStatus {
			phase: Some("Released".to_string()),
			..Default::default()
		});
		mock.add_volume(volume);
	}

	#[tokio::test]
	async fn provisions_pending_claim_once() {
		let (controller, mock, tmp) = setup();
		mock.add_storage_class(class("nfs-client", PROVISIONER, &[]));
		mock.add_claim(claim("claim1", "abc", "nfs-client"));

		let summary = controller.run_once().await.unwrap();
		assert_eq!(summary.provisioned, 1);
		assert!(mock.volume("pvc-abc").is_some());
		assert!(tmp.path().join("ns1-claim1-pvc-abc").is_dir());

		let summary = controller.run_once().await.unwrap();
		assert_eq!(summary, ReconcileSummary::default());
		assert_eq!(mock.volumes().len(), 1);
	}

	#[tokio::test]
	async fn ignores_claims_of_other_provisioners() {
		let (controller, mock, tmp) = setup();
		mock.add_storage_class(class("ebs", "ebs.csi.aws.com", &[]));
		mock.add_claim(claim("claim1", "abc", "ebs"));

		let summary = controller.run_once().await.unwrap();

		assert_eq!(summary, ReconcileSummary::default());
		assert!(mock.volumes().is_empty());
		assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
	}

	#[tokio::test]
	async fn ignores_bound_claims() {
		let (controller, mock, _tmp) = setup();
		mock.add_storage_class(class("nfs-client", PROVISIONER, &[]));
		let mut bound = claim("claim1", "abc", "nfs-client");
		bound.status.as_mut().unwrap().phase = Some("Bound".to_string());
		mock.add_claim(bound);

		controller.run_once().await.unwrap();

		assert!(mock.volumes().is_empty());
	}

	#[tokio::test]
	async fn final_provisioning_failure_is_not_retried() {
		let (controller, mock, _tmp) = setup();
		mock.add_storage_class(class("nfs-client", PROVISIONER, &[]));
		let mut selective = claim("claim1", "abc", "nfs-client");
		selective.spec.as_mut().unwrap().selector = Some(LabelSelector::default());
		mock.add_claim(selective);

		let first = controller.run_once().await.unwrap();
		assert_eq!(first.failed, 1);

		let second = controller.run_once().await.unwrap();
		assert_eq!(second.failed, 0);
		assert!(mock.volumes().is_empty());
	}

	#[tokio::test]
	async fn abandoned_claims_are_forgotten_once_deleted() {
		let (controller, mock, _tmp) = setup();
		mock.add_storage_class(class("nfs-client", PROVISIONER, &[]));
		let mut selective = claim("claim1", "abc", "nfs-client");
		selective.spec.as_mut().unwrap().selector = Some(LabelSelector::default());
		mock.add_claim(selective);

		controller.run_once().await.unwrap();
		assert!(controller.abandoned_claims.lock().await.contains("abc"));

		mock.remove_claim("abc");
		controller.run_once().await.unwrap();
		assert!(controller.abandoned_claims.lock().await.is_empty());
	}

	#[tokio::test]
	async fn releases_volume_and_applies_class_policy() {
		let (controller, mock, tmp) = setup();
		mock.add_storage_class(class("nfs-client", PROVISIONER, &[("onDelete", "delete")]));
		mock.add_claim(claim("claim1", "abc", "nfs-client"));
		controller.run_once().await.unwrap();
		mark_released(&mock, "pvc-abc");

		let summary = controller.run_once().await.unwrap();

		assert_eq!(summary.released, 1);
		assert!(mock.volume("pvc-abc").is_none());
		assert!(!tmp.path().join("ns1-claim1-pvc-abc").exists());
	}

	#[tokio::test]
	async fn bound_volumes_are_left_alone() {
		let (controller, mock, tmp) = setup();
		mock.add_storage_class(class("nfs-client", PROVISIONER, &[("onDelete", "delete")]));
		mock.add_claim(claim("claim1", "abc", "nfs-client"));
		controller.run_once().await.unwrap();

		let summary = controller.run_once().await.unwrap();

		assert_eq!(summary.released, 0);
		assert!(mock.volume("pvc-abc").is_some());
		assert!(tmp.path().join("ns1-claim1-pvc-abc").is_dir());
	}

	#[tokio::test]
	async fn list_failure_aborts_pass() {
		let (controller, mock, _tmp) = setup();
		mock.set_api_error(Some("apiserver unavailable"));

		assert!(controller.run_once().await.is_err());
	}
}
