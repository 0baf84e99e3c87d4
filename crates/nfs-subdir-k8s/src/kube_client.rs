// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use kube::{
	api::{Api, DeleteParams, ListParams, PostParams},
	Client,
};
use tracing::{debug, instrument};

use crate::client::K8sClient;
use crate::error::K8sError;
use crate::types::{PersistentVolume, PersistentVolumeClaim, StorageClass};

/// Production K8s client implementation using the kube crate.
pub struct KubeClient {
	client: Client,
}

impl KubeClient {
	/// Create a new KubeClient that auto-discovers cluster configuration.
	///
	/// This will attempt to load config from:
	/// 1. KUBECONFIG environment variable
	/// 2. ~/.kube/config
	/// 3. In-cluster service account (when running in K8s)
	pub async fn new() -> Result<Self, K8sError> {
		let client = Client::try_default().await?;
		debug!("K8s client initialized");
		Ok(Self { client })
	}
}

#[async_trait]
impl K8sClient for KubeClient {
	#[instrument(skip(self))]
	async fn get_storage_class(&self, name: &str) -> Result<StorageClass, K8sError> {
		let classes: Api<StorageClass> = Api::all(self.client.clone());
		match classes.get(name).await {
			Ok(class) => Ok(class),
			Err(kube::Error::Api(err)) if err.code == 404 => {
				Err(K8sError::StorageClassNotFound { name: name.into() })
			}
			Err(e) => Err(e.into()),
		}
	}

	async fn list_storage_classes(&self) -> Result<Vec<StorageClass>, K8sError> {
		let classes: Api<StorageClass> = Api::all(self.client.clone());
		let list = classes.list(&ListParams::default()).await?;
		Ok(list.items)
	}

	async fn list_claims(&self) -> Result<Vec<PersistentVolumeClaim>, K8sError> {
		let claims: Api<PersistentVolumeClaim> = Api::all(self.client.clone());
		let list = claims.list(&ListParams::default()).await?;
		Ok(list.items)
	}

	async fn list_volumes(&self) -> Result<Vec<PersistentVolume>, K8sError> {
		let volumes: Api<PersistentVolume> = Api::all(self.client.clone());
		let list = volumes.list(&ListParams::default()).await?;
		Ok(list.items)
	}

	#[instrument(skip(self, volume), fields(name = ?volume.metadata.name))]
	async fn create_volume(&self, volume: PersistentVolume) -> Result<PersistentVolume, K8sError> {
		let volumes: Api<PersistentVolume> = Api::all(self.client.clone());
		match volumes.create(&PostParams::default(), &volume).await {
			Ok(created) => Ok(created),
			Err(kube::Error::Api(err)) if err.code == 409 => Err(K8sError::VolumeAlreadyExists {
				name: volume.metadata.name.unwrap_or_default(),
			}),
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self))]
	async fn delete_volume(&self, name: &str) -> Result<(), K8sError> {
		let volumes: Api<PersistentVolume> = Api::all(self.client.clone());
		match volumes.delete(name, &DeleteParams::default()).await {
			Ok(_) => Ok(()),
			Err(kube::Error::Api(err)) if err.code == 404 => {
				Err(K8sError::VolumeNotFound { name: name.into() })
			}
			Err(e) => Err(e.into()),
		}
	}
}
