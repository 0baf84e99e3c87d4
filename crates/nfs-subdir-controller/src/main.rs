// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod config;
mod controller;

use std::sync::Arc;

use anyhow::Result;
use nfs_subdir_k8s::{K8sClient, KubeClient};
use nfs_subdir_provisioner::Provisioner;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::controller::{start_controller_task, Controller};

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with(tracing_subscriber::fmt::layer().json())
		.init();

	info!("Starting nfs-subdir-external-provisioner");

	let config = Config::from_env()?;
	info!(
		server = %config.server,
		export_path = %config.export_path.display(),
		mount_path = %config.mount_path.display(),
		provisioner_name = %config.provisioner_name,
		"Loaded configuration"
	);

	let client: Arc<dyn K8sClient> = Arc::new(KubeClient::new().await?);
	let provisioner = Arc::new(Provisioner::new(client.clone(), config.provisioner_config()));
	let controller = Arc::new(Controller::new(client, provisioner));

	tokio::select! {
		_ = start_controller_task(controller, config.resync_interval) => {}
		_ = tokio::signal::ctrl_c() => {
			info!("Received shutdown signal");
		}
	}

	Ok(())
}
