// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

pub use k8s_openapi::api::core::v1::{
	NFSVolumeSource, ObjectReference, PersistentVolume, PersistentVolumeClaim,
	PersistentVolumeClaimSpec, PersistentVolumeClaimStatus, PersistentVolumeSpec,
	PersistentVolumeStatus, VolumeResourceRequirements,
};
pub use k8s_openapi::api::storage::v1::StorageClass;
pub use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
