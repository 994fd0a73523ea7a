//! Directory and device-identity helpers: resolving a `DecsyncDir`, listing
//! its collections, and formatting an appId.

use std::path::{Path, PathBuf};

use crate::engine::get_stored_static_value;
use crate::logging::warn;
use crate::path_codec::{decode_segment, encode_segment};

/// Resolve the directory for one sync type (and, optionally, one collection
/// within it) under `base`. When `base` is `None`, falls back to a
/// platform-appropriate data directory (`$XDG_DATA_HOME`-equivalent via the
/// `dirs` crate) joined with `decsync`.
pub fn decsync_subdir(base: Option<&Path>, sync_type: &str, collection: Option<&str>) -> PathBuf {
	let mut dir = match base {
		Some(b) => b.to_path_buf(),
		None => default_decsync_base(),
	};
	dir.push(encode_segment(sync_type));
	if let Some(collection) = collection {
		dir.push(encode_segment(collection));
	}
	dir
}

fn default_decsync_base() -> PathBuf {
	::dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("decsync")
}

/// List the non-hidden collection names under `base/syncType`. When
/// `ignore_deleted` is true, a collection whose `["info"]` static value for
/// key `"deleted"` is JSON `true` is omitted.
pub fn list_decsync_collections(base: Option<&Path>, sync_type: &str, ignore_deleted: bool) -> Vec<String> {
	let dir = decsync_subdir(base, sync_type, None);
	let entries = match std::fs::read_dir(&dir) {
		Ok(e) => e,
		Err(_) => return Vec::new(),
	};

	let mut collections = Vec::new();
	for entry in entries.flatten() {
		let name = entry.file_name();
		let Some(name_str) = name.to_str() else { continue };
		if name_str.starts_with('.') || !entry.path().is_dir() {
			continue;
		}
		let Some(collection) = decode_segment(name_str) else {
			warn!("undecodable collection name {:?} under {:?}, skipping", name_str, dir);
			continue;
		};

		if ignore_deleted {
			let collection_dir = decsync_subdir(base, sync_type, Some(&collection));
			let deleted = get_stored_static_value(
				&collection_dir,
				&["info".to_string()],
				&serde_json::json!("deleted"),
			);
			if deleted == Some(serde_json::json!(true)) {
				continue;
			}
		}

		collections.push(collection);
	}
	collections
}

/// Format an appId as `"<deviceModel>-<appName>[-<id>]"`, the convention
/// used to disambiguate multiple installs of the same app on one device.
/// `id`, if given, is zero-padded to 5 digits and must be in `[0, 100000)`.
pub fn get_app_id(app_name: &str, id: Option<u32>, device_model: &str) -> String {
	match id {
		Some(id) => format!("{device_model}-{app_name}-{id:05}"),
		None => format!("{device_model}-{app_name}"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn decsync_subdir_joins_base_sync_type_and_collection() {
		let dir = TempDir::new().unwrap();
		let sub = decsync_subdir(Some(dir.path()), "contacts", Some("personal"));
		assert_eq!(sub, dir.path().join("contacts").join("personal"));
	}

	#[test]
	fn decsync_subdir_encodes_segments() {
		let dir = TempDir::new().unwrap();
		let sub = decsync_subdir(Some(dir.path()), "a b", None);
		assert_eq!(sub, dir.path().join("a%20b"));
	}

	#[test]
	fn lists_non_hidden_collections_and_decodes_names() {
		let dir = TempDir::new().unwrap();
		let sync_root = dir.path().join("contacts");
		std::fs::create_dir_all(sync_root.join("personal")).unwrap();
		std::fs::create_dir_all(sync_root.join("a%20b")).unwrap();
		std::fs::create_dir_all(sync_root.join(".hidden")).unwrap();

		let mut collections = list_decsync_collections(Some(dir.path()), "contacts", false);
		collections.sort();
		assert_eq!(collections, vec!["a b".to_string(), "personal".to_string()]);
	}

	#[test]
	fn missing_sync_type_dir_yields_empty_list() {
		let dir = TempDir::new().unwrap();
		assert_eq!(list_decsync_collections(Some(dir.path()), "contacts", false), Vec::<String>::new());
	}

	#[test]
	fn ignores_collections_marked_deleted() {
		let dir = TempDir::new().unwrap();
		let mut decsync: crate::engine::Decsync<()> =
			crate::engine::Decsync::new(decsync_subdir(Some(dir.path()), "contacts", Some("old")), "A");
		decsync.set_entry(&["info".to_string()], serde_json::json!("deleted"), serde_json::json!(true));

		std::fs::create_dir_all(decsync_subdir(Some(dir.path()), "contacts", Some("keep"))).unwrap();

		let collections = list_decsync_collections(Some(dir.path()), "contacts", true);
		assert_eq!(collections, vec!["keep".to_string()]);
	}

	#[test]
	fn get_app_id_formats_with_and_without_numeric_suffix() {
		assert_eq!(get_app_id("myapp", None, "pixel"), "pixel-myapp");
		assert_eq!(get_app_id("myapp", Some(3), "pixel"), "pixel-myapp-00003");
		assert_eq!(get_app_id("myapp", Some(12345), "pixel"), "pixel-myapp-12345");
	}
}

// vim: ts=4
