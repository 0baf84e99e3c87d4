// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core provisioner implementation: directory creation on provision and the
//! delete/retain/archive policy on release.

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use nfs_subdir_k8s::{
	K8sClient, NFSVolumeSource, ObjectMeta, ObjectReference, PersistentVolume,
	PersistentVolumeSpec,
};
use tokio::fs::DirBuilder;

use crate::archive::{
	archive_path, clean_relative, delete_and_prune, prune_empty_parents, ARCHIVE_DIR,
	ARCHIVE_TIMESTAMP_FORMAT,
};
use crate::config::ProvisionerConfig;
use crate::error::ProvisionerError;
use crate::policy::{class_parameters_for, DeletePolicy, PARAM_PATH_PATTERN};
use crate::template::{render_pattern, ClaimMetadata};
use crate::types::{ProvisionOutcome, ProvisionRequest, ProvisioningState, VolumePaths};

/// Annotation recording which provisioner created a volume.
pub const PROVISIONED_BY_ANNOTATION: &str = "pv.kubernetes.io/provisioned-by";

const VOLUME_DIR_MODE: u32 = 0o777;
const ARCHIVE_DIR_MODE: u32 = 0o755;
const STORAGE_RESOURCE: &str = "storage";
const DEFAULT_RECLAIM_POLICY: &str = "Delete";

/// Provisions volume directories on an NFS export and releases them
/// according to their StorageClass policy.
///
/// Holds only read-only configuration, so one instance may serve concurrent
/// calls for different volumes.
pub struct Provisioner {
	client: Option<Arc<dyn K8sClient>>,
	config: ProvisionerConfig,
}

impl Provisioner {
	/// Create a new provisioner with the given K8s client and configuration.
	pub fn new(client: Arc<dyn K8sClient>, config: ProvisionerConfig) -> Self {
		Self {
			client: Some(client),
			config,
		}
	}

	/// Create a provisioner with no K8s client. Releases that need a
	/// StorageClass lookup fail with [`ProvisionerError::NoClient`].
	pub fn without_client(config: ProvisionerConfig) -> Self {
		Self {
			client: None,
			config,
		}
	}

	pub fn config(&self) -> &ProvisionerConfig {
		&self.config
	}

	/// Resolve where the volume for `req` lives.
	///
	/// Defaults to `<namespace>-<name>-<pv name>`. A `pathPattern` parameter
	/// overrides it unless it renders to nothing.
	pub fn volume_paths(&self, req: &ProvisionRequest) -> VolumePaths {
		let default = [req.claim_namespace(), req.claim_name(), req.pv_name.as_str()].join("-");
		let mut relative = clean_relative(&default);

		if let Some(pattern) = req.parameter(PARAM_PATH_PATTERN) {
			let metadata = ClaimMetadata {
				name: req.claim_name(),
				namespace: req.claim_namespace(),
				pv_name: &req.pv_name,
				labels: req.claim.metadata.labels.as_ref(),
				annotations: req.claim.metadata.annotations.as_ref(),
			};
			let custom = clean_relative(&render_pattern(pattern, &metadata));
			if !custom.as_os_str().is_empty() {
				relative = custom;
			}
		}

		VolumePaths {
			local: self.config.mount_path.join(&relative),
			export: self.config.export_path.join(&relative),
		}
	}

	/// Translate a volume's NFS path into the matching local path.
	///
	/// Only paths strictly below the export root translate; anything else,
	/// including the export root itself, is rejected.
	pub fn local_path(&self, nfs_path: &str) -> Result<PathBuf, ProvisionerError> {
		let outside = || ProvisionerError::PathOutsideExport {
			path: nfs_path.to_string(),
		};
		let relative = Path::new(nfs_path)
			.strip_prefix(&self.config.export_path)
			.map_err(|_| outside())?;
		let relative = clean_relative(&relative.to_string_lossy());
		if relative.as_os_str().is_empty() {
			return Err(outside());
		}
		Ok(self.config.mount_path.join(relative))
	}

	/// Create the directory for a claim and describe it as a PersistentVolume.
	pub async fn provision(
		&self,
		req: &ProvisionRequest,
	) -> Result<ProvisionOutcome, ProvisionerError> {
		if req
			.claim
			.spec
			.as_ref()
			.is_some_and(|spec| spec.selector.is_some())
		{
			tracing::warn!(pv_name = %req.pv_name, "Rejecting claim with selector");
			return Err(ProvisionerError::SelectorNotSupported);
		}

		let paths = self.volume_paths(req);
		tracing::info!(
			pv_name = %req.pv_name,
			claim = %format!("{}/{}", req.claim_namespace(), req.claim_name()),
			class = ?req.storage_class.metadata.name,
			path = %paths.local.display(),
			"Creating volume directory"
		);

		let mut builder = DirBuilder::new();
		builder.recursive(true).mode(VOLUME_DIR_MODE);
		if let Err(source) = builder.create(&paths.local).await {
			tracing::error!(path = %paths.local.display(), error = %source, "Failed to create volume directory");
			return Err(ProvisionerError::CreateDirectory {
				path: paths.local,
				source,
			});
		}

		// umask applies to the mkdir mode, so set it again explicitly
		tokio::fs::set_permissions(
			&paths.local,
			std::fs::Permissions::from_mode(VOLUME_DIR_MODE),
		)
		.await
		.map_err(|source| ProvisionerError::SetPermissions {
			path: paths.local.clone(),
			source,
		})?;

		Ok(ProvisionOutcome {
			volume: self.build_volume(req, &paths),
			state: ProvisioningState::Finished,
		})
	}

	fn build_volume(&self, req: &ProvisionRequest, paths: &VolumePaths) -> PersistentVolume {
		let claim_spec = req.claim.spec.clone().unwrap_or_default();
		let capacity = claim_spec
			.resources
			.and_then(|r| r.requests)
			.and_then(|requests| requests.get(STORAGE_RESOURCE).cloned())
			.map(|quantity| BTreeMap::from([(STORAGE_RESOURCE.to_string(), quantity)]));

		let class = &req.storage_class;
		let claim = &req.claim.metadata;

		PersistentVolume {
			metadata: ObjectMeta {
				name: Some(req.pv_name.clone()),
				annotations: Some(BTreeMap::from([(
					PROVISIONED_BY_ANNOTATION.to_string(),
					self.config.provisioner_name.clone(),
				)])),
				..Default::default()
			},
			spec: Some(PersistentVolumeSpec {
				persistent_volume_reclaim_policy: Some(
					class
						.reclaim_policy
						.clone()
						.unwrap_or_else(|| DEFAULT_RECLAIM_POLICY.to_string()),
				),
				access_modes: claim_spec.access_modes,
				mount_options: class.mount_options.clone(),
				capacity,
				storage_class_name: class.metadata.name.clone(),
				nfs: Some(NFSVolumeSource {
					server: self.config.server.clone(),
					path: paths.export.to_string_lossy().into_owned(),
					read_only: Some(false),
				}),
				claim_ref: Some(ObjectReference {
					api_version: Some("v1".to_string()),
					kind: Some("PersistentVolumeClaim".to_string()),
					name: claim.name.clone(),
					namespace: claim.namespace.clone(),
					uid: claim.uid.clone(),
					resource_version: claim.resource_version.clone(),
					..Default::default()
				}),
				..Default::default()
			}),
			..Default::default()
		}
	}

	/// Release the directory behind `volume` according to its StorageClass.
	///
	/// A directory that no longer exists counts as already released.
	pub async fn delete(&self, volume: &PersistentVolume) -> Result<(), ProvisionerError> {
		let volume_name = volume.metadata.name.clone().unwrap_or_default();
		let nfs_path = volume
			.spec
			.as_ref()
			.and_then(|spec| spec.nfs.as_ref())
			.map(|nfs| nfs.path.as_str())
			.ok_or_else(|| ProvisionerError::MissingNfsSource {
				volume: volume_name.clone(),
			})?;
		let path = self.local_path(nfs_path).inspect_err(|e| {
			tracing::error!(pv_name = %volume_name, error = %e, "Refusing to release volume");
		})?;

		if let Err(e) = tokio::fs::metadata(&path).await {
			if e.kind() == std::io::ErrorKind::NotFound {
				tracing::warn!(pv_name = %volume_name, path = %path.display(), "Path does not exist, deletion skipped");
				return Ok(());
			}
		}

		let parameters = class_parameters_for(self.client.as_deref(), volume).await?;
		let policy = DeletePolicy::from_parameters(&parameters)?;
		tracing::debug!(pv_name = %volume_name, ?policy, "Resolved delete policy");

		match policy {
			DeletePolicy::Delete => self.delete_directory(&path).await,
			DeletePolicy::Retain => {
				tracing::info!(pv_name = %volume_name, path = %path.display(), "Retaining volume directory");
				Ok(())
			}
			DeletePolicy::Archive => {
				let timestamp = Local::now().format(ARCHIVE_TIMESTAMP_FORMAT).to_string();
				self.archive_directory(&path, &timestamp).await
			}
		}
	}

	async fn delete_directory(&self, path: &Path) -> Result<(), ProvisionerError> {
		delete_and_prune(path, &self.config.mount_path)
			.await
			.map_err(|source| {
				tracing::error!(path = %path.display(), error = %source, "Failed to delete volume directory");
				ProvisionerError::RemoveDirectory {
					path: path.to_path_buf(),
					source,
				}
			})?;
		tracing::info!(path = %path.display(), "Path and any empty parents have been deleted");
		Ok(())
	}

	async fn archive_directory(&self, path: &Path, timestamp: &str) -> Result<(), ProvisionerError> {
		let root = &self.config.mount_path;
		let target = archive_path(path, root, timestamp);

		let mut builder = DirBuilder::new();
		builder.recursive(true).mode(ARCHIVE_DIR_MODE);
		if let Err(e) = builder.create(root.join(ARCHIVE_DIR)).await {
			tracing::warn!(error = %e, "Failed to create archive directory");
		}

		match tokio::fs::rename(path, &target).await {
			Ok(()) => {
				tracing::info!(path = %path.display(), archive_path = %target.display(), "Archived volume directory");
				if let Some(parent) = path.parent() {
					prune_empty_parents(parent, root).await;
				}
				Ok(())
			}
			Err(source) => {
				tracing::error!(
					path = %path.display(),
					archive_path = %target.display(),
					error = %source,
					"Failed to archive volume directory"
				);
				Err(ProvisionerError::Archive {
					from: path.to_path_buf(),
					to: target,
					source,
				})
			}
		}
	}
}
