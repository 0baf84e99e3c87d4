// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Path walks bounded by the mount root: relative path cleaning, archive
//! naming and pruning of emptied ancestor directories.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Directory under the mount root that receives archived volumes.
pub const ARCHIVE_DIR: &str = "_archived_";

/// Minute-granularity timestamp prefixed to archived directory names.
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

/// Lexically clean a relative path so it cannot leave the directory it is
/// joined onto.
///
/// Empty and `.` segments are dropped and `..` removes the previous segment
/// without ever rising above the start. A leading `/` is ignored.
pub fn clean_relative(path: &str) -> PathBuf {
	let mut parts: Vec<&str> = Vec::new();
	for part in path.split('/') {
		match part {
			"" | "." => {}
			".." => {
				parts.pop();
			}
			other => parts.push(other),
		}
	}
	parts.iter().collect()
}

/// Build the archive location for `path`.
///
/// Walks from the leaf up to `root`, then joins the collected segments with
/// `.` behind the timestamp: `root/a/b` becomes `root/_archived_/<ts>.a.b`.
pub fn archive_path(path: &Path, root: &Path, timestamp: &str) -> PathBuf {
	let mut names = Vec::new();
	let mut current = path;
	while current != root {
		match (current.file_name(), current.parent()) {
			(Some(name), Some(parent)) => {
				names.push(name.to_string_lossy());
				current = parent;
			}
			_ => break,
		}
	}

	let mut archived = timestamp.to_string();
	for name in names.iter().rev() {
		archived.push('.');
		archived.push_str(name);
	}
	root.join(ARCHIVE_DIR).join(archived)
}

/// Remove `start` and then each of its ancestors, stopping at the first
/// removal that fails or when `root` is reached.
///
/// A failure is the normal outcome for a non-empty directory and is not
/// reported. Directories outside `root` are never touched.
pub async fn prune_empty_parents(start: &Path, root: &Path) {
	if !start.starts_with(root) {
		return;
	}

	let mut current = start;
	while current != root {
		if tokio::fs::remove_dir(current).await.is_err() {
			break;
		}
		debug!(path = %current.display(), "Pruned empty directory");
		match current.parent() {
			Some(parent) => current = parent,
			None => break,
		}
	}
}

/// Recursively delete `path`, then prune its emptied ancestors up to `root`.
pub async fn delete_and_prune(path: &Path, root: &Path) -> std::io::Result<()> {
	tokio::fs::remove_dir_all(path).await?;
	if let Some(parent) = path.parent() {
		prune_empty_parents(parent, root).await;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn clean_relative_drops_empty_and_dot_segments() {
		assert_eq!(clean_relative("a//./b/"), PathBuf::from("a/b"));
		assert_eq!(clean_relative("/abs/path"), PathBuf::from("abs/path"));
	}

	#[test]
	fn clean_relative_never_escapes() {
		assert_eq!(clean_relative("../../etc"), PathBuf::from("etc"));
		assert_eq!(clean_relative("a/../b"), PathBuf::from("b"));
		assert_eq!(clean_relative(".."), PathBuf::new());
	}

	#[test]
	fn clean_relative_of_empty_is_empty() {
		assert_eq!(clean_relative(""), PathBuf::new());
		assert_eq!(clean_relative("//"), PathBuf::new());
	}

	#[test]
	fn archive_path_for_top_level_directory() {
		let root = Path::new("/persistentvolumes");
		let archived = archive_path(&root.join("ns1-claim1-pvc-abc"), root, "202405011030");
		assert_eq!(
			archived,
			PathBuf::from("/persistentvolumes/_archived_/202405011030.ns1-claim1-pvc-abc")
		);
	}

	#[test]
	fn archive_path_flattens_nested_segments() {
		let root = Path::new("/persistentvolumes");
		let archived = archive_path(&root.join("infra/team/claim1"), root, "202405011030");
		assert_eq!(
			archived,
			PathBuf::from("/persistentvolumes/_archived_/202405011030.infra.team.claim1")
		);
	}

	#[test]
	fn archive_path_tolerates_trailing_slash_on_root() {
		let root = Path::new("/persistentvolumes/");
		let archived = archive_path(Path::new("/persistentvolumes/x"), root, "ts");
		assert_eq!(archived, PathBuf::from("/persistentvolumes/_archived_/ts.x"));
	}

	#[tokio::test]
	async fn prune_removes_empty_chain_up_to_root() {
		let tmp = TempDir::new().unwrap();
		let root = tmp.path();
		let deepest = root.join("a/b/c");
		std::fs::create_dir_all(&deepest).unwrap();

		prune_empty_parents(&deepest, root).await;

		assert!(!root.join("a").exists());
		assert!(root.exists());
	}

	#[tokio::test]
	async fn prune_stops_at_non_empty_directory() {
		let tmp = TempDir::new().unwrap();
		let root = tmp.path();
		std::fs::create_dir_all(root.join("a/b/c")).unwrap();
		std::fs::create_dir_all(root.join("a/sibling")).unwrap();

		prune_empty_parents(&root.join("a/b/c"), root).await;

		assert!(!root.join("a/b").exists());
		assert!(root.join("a/sibling").exists());
	}

	#[tokio::test]
	async fn prune_never_removes_root() {
		let tmp = TempDir::new().unwrap();
		let root = tmp.path().join("export");
		std::fs::create_dir_all(&root).unwrap();

		prune_empty_parents(&root, &root).await;

		assert!(root.exists());
	}

	#[tokio::test]
	async fn prune_ignores_paths_outside_root() {
		let tmp = TempDir::new().unwrap();
		let root = tmp.path().join("export");
		let outside = tmp.path().join("elsewhere/empty");
		std::fs::create_dir_all(&root).unwrap();
		std::fs::create_dir_all(&outside).unwrap();

		prune_empty_parents(&outside, &root).await;

		assert!(outside.exists());
	}

	#[tokio::test]
	async fn delete_and_prune_removes_tree_and_empty_parents() {
		let tmp = TempDir::new().unwrap();
		let root = tmp.path();
		let volume = root.join("infra/claim1");
		std::fs::create_dir_all(volume.join("data")).unwrap();
		std::fs::write(volume.join("data/file.txt"), b"contents").unwrap();
		std::fs::create_dir_all(root.join("other")).unwrap();

		delete_and_prune(&volume, root).await.unwrap();

		assert!(!root.join("infra").exists());
		assert!(root.join("other").exists());
	}
}

#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn clean_relative_has_only_normal_components(input in "[a-z./]{0,40}") {
			let cleaned = clean_relative(&input);
			let all_normal = cleaned
				.components()
				.all(|c| matches!(c, std::path::Component::Normal(_)));
			prop_assert!(all_normal, "{} cleaned to {}", input, cleaned.display());
		}

		#[test]
		fn archive_path_stays_in_archive_dir(segments in prop::collection::vec("[a-z0-9-]{1,8}", 1..5)) {
			let root = Path::new("/persistentvolumes");
			let path = segments.iter().fold(root.to_path_buf(), |p, s| p.join(s));
			let archived = archive_path(&path, root, "202401010000");
			let archive_dir = root.join(ARCHIVE_DIR);
			prop_assert_eq!(archived.parent(), Some(archive_dir.as_path()));
			let expected = format!("202401010000.{}", segments.join("."));
			prop_assert_eq!(archived.file_name().and_then(|n| n.to_str()), Some(expected.as_str()));
		}
	}
}
