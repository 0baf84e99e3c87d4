// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! K8s client abstraction for the NFS subdir provisioner.
//!
//! This crate provides:
//! - A trait-based K8s client abstraction for testability
//! - Production implementation using the kube crate
//! - An in-memory mock for tests
//! - Re-exports of the k8s-openapi storage types

mod client;
mod error;
mod kube_client;
mod mock;
mod types;

pub use client::K8sClient;
pub use error::{K8sError, K8sResult};
pub use kube_client::KubeClient;
pub use mock::MockK8sClient;
pub use types::{
	LabelSelector, NFSVolumeSource, ObjectMeta, ObjectReference, PersistentVolume,
	PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimStatus,
	PersistentVolumeSpec, PersistentVolumeStatus, Quantity, StorageClass,
	VolumeResourceRequirements,
};
