// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::time::Duration;

use nfs_subdir_provisioner::{ProvisionerConfig, DEFAULT_MOUNT_PATH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("missing required environment variable: {0}")]
	MissingEnvVar(String),

	#[error("invalid value for {name}: {message}")]
	InvalidValue { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct Config {
	pub server: String,
	pub export_path: PathBuf,
	pub mount_path: PathBuf,
	pub provisioner_name: String,
	pub resync_interval: Duration,
}

impl Config {
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Build the configuration from any variable source.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let server = require(&lookup, "NFS_SERVER")?;
		let export_path = PathBuf::from(require(&lookup, "NFS_PATH")?);
		let provisioner_name = require(&lookup, "PROVISIONER_NAME")?;

		let mount_path = PathBuf::from(
			lookup("NFS_MOUNT_PATH").unwrap_or_else(|| DEFAULT_MOUNT_PATH.to_string()),
		);
		let resync_secs: u64 =
			optional_parse(&lookup, "RESYNC_INTERVAL_SECS", DEFAULT_RESYNC_INTERVAL_SECS)?;
		if resync_secs == 0 {
			return Err(ConfigError::InvalidValue {
				name: "RESYNC_INTERVAL_SECS".into(),
				message: "must be greater than zero".into(),
			});
		}

		Ok(Config {
			server,
			export_path,
			mount_path,
			provisioner_name,
			resync_interval: Duration::from_secs(resync_secs),
		})
	}

	pub fn provisioner_config(&self) -> ProvisionerConfig {
		ProvisionerConfig::new(
			self.server.clone(),
			self.export_path.clone(),
			self.provisioner_name.clone(),
		)
		.with_mount_path(self.mount_path.clone())
	}
}

fn require(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
	lookup(name)
		.filter(|value| !value.is_empty())
		.ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_parse<T: std::str::FromStr>(
	lookup: &impl Fn(&str) -> Option<String>,
	name: &str,
	default: T,
) -> Result<T>
where
	T::Err: std::fmt::Display,
{
	match lookup(name) {
		Some(val) => val.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
			name: name.to_string(),
			message: e.to_string(),
		}),
		None => Ok(default),
	}
}
