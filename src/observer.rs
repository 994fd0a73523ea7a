//! Change dispatcher: maps filesystem-watcher events to ingestion calls.
//!
//! The recursive directory watcher itself is an external collaborator (see
//! the optional `watch` module for a concrete `notify`-backed one); this
//! module only needs `(root, relative_path)` event strings handed to it.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::engine::Decsync;
use crate::log_io::encoded_join;
use crate::logging::warn;
use crate::path_codec::decode_segment;

/// Consumes watcher events for one `Decsync` and dispatches them to
/// `Decsync::execute_all_new_entries`-equivalent single-path ingestion.
///
/// `Decsync` is not internally synchronized (see the crate's concurrency
/// notes); wrap it in `Arc<Mutex<_>>` to share it between the watcher thread
/// and caller-initiated operations, as this type requires.
pub struct ChangeObserver<Extra> {
	decsync: Arc<Mutex<Decsync<Extra>>>,
}

impl<Extra> ChangeObserver<Extra> {
	pub fn new(decsync: Arc<Mutex<Decsync<Extra>>>) -> Self {
		ChangeObserver { decsync }
	}

	/// Ensure `new-entries/` exists so a watcher has something to register
	/// against. Logs and returns an error the watcher registration should
	/// treat as fatal for this observer (the library remains usable via
	/// explicit `execute_all_new_entries` even if this fails).
	pub fn init_observer(&self) -> std::io::Result<()> {
		let root = { self.decsync.lock().unwrap().decsync_dir().join("new-entries") };
		fs::create_dir_all(&root)
	}

	/// Handle one filesystem event for `rel`, a path relative to
	/// `new-entries/` (e.g. `"A/info"` for `new-entries/A/info`).
	pub fn on_change(&self, rel: &str, extra: &Extra) {
		let segments: Vec<&str> = rel.split('/').filter(|s| !s.is_empty()).collect();
		if segments.is_empty() {
			return;
		}
		if segments.last().unwrap().starts_with('.') {
			return;
		}

		let mut decoded = Vec::with_capacity(segments.len());
		for seg in &segments {
			match decode_segment(seg) {
				Some(d) => decoded.push(d),
				None => {
					warn!("undecodable path segment {:?} in change event {:?}", seg, rel);
					return;
				}
			}
		}

		let app_id = decoded.remove(0);
		let path = decoded;

		let mut decsync = self.decsync.lock().unwrap();
		if app_id == decsync.own_app_id() {
			return;
		}

		let new_entries_root = decsync.decsync_dir().join("new-entries");
		let app_root = encoded_join(&new_entries_root, std::slice::from_ref(&app_id));
		let new_file = encoded_join(&app_root, &path);
		if is_regular_file(&new_file) {
			decsync.dispatch_change(&path, &app_id, extra);
		}
	}
}

fn is_regular_file(path: &Path) -> bool {
	fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}


// vim: ts=4
