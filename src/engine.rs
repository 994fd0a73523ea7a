//! The convergence engine: on-disk layout, ingestion pipeline, cursor
//! management, bootstrap, and static-value queries.
//!
//! Directory layout under a `DecsyncDir`:
//!
//! ```text
//! new-entries/<appId>/<path...>                      append-only log
//! new-entries/<appId>/<prefix...>/.decsync-sequence   monotonic counter
//! stored-entries/<appId>/<path...>                   materialized latest-per-key view
//! read-bytes/<ownAppId>/<peerAppId>/<path...>        cursor: bytes consumed
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::entry::{parse_entry_line, serialize_entry_line, Entry};
use crate::json_value::{equals_json, Value};
use crate::listener::Listener;
use crate::log_io::{
	append_lines, bump_sequence_chain, encoded_join, file_len, filter_file,
	list_files_recursive_relative, read_lines_from, read_optional_string,
};
use crate::logging::{error, warn};
use crate::path_codec::{decode_segment, encode_segment};

const NEW_ENTRIES: &str = "new-entries";
const STORED_ENTRIES: &str = "stored-entries";
const READ_BYTES: &str = "read-bytes";

/// Identifies the files backing one `(path, sourceAppId)` pair.
struct EntriesLocation {
	path: Vec<String>,
	new_file: PathBuf,
	/// `None` for read-only bootstrap replay, where the stored view must not
	/// be touched.
	stored_file: Option<PathBuf>,
	read_bytes_file: Option<PathBuf>,
}

/// The convergence engine for one `DecsyncDir`. `Extra` is opaque
/// host-supplied context threaded through to listeners and the
/// sync-complete hook; use `()` if there is none.
pub struct Decsync<Extra> {
	decsync_dir: PathBuf,
	own_app_id: String,
	own_app_enc: String,
	listeners: Vec<Box<dyn Listener<Extra> + Send>>,
	on_sync_complete: Option<Box<dyn FnMut(&Extra) + Send>>,
}

impl<Extra> Decsync<Extra> {
	pub fn new(decsync_dir: impl Into<PathBuf>, own_app_id: impl Into<String>) -> Self {
		let own_app_id = own_app_id.into();
		let own_app_enc = encode_segment(&own_app_id);
		Decsync {
			decsync_dir: decsync_dir.into(),
			own_app_id,
			own_app_enc,
			listeners: Vec::new(),
			on_sync_complete: None,
		}
	}

	pub fn decsync_dir(&self) -> &Path {
		&self.decsync_dir
	}

	pub fn own_app_id(&self) -> &str {
		&self.own_app_id
	}

	/// Register a listener. The listener set is closed once construction of
	/// the host's dispatch loop begins; add all listeners up front.
	pub fn add_listener(&mut self, listener: impl Listener<Extra> + Send + 'static) {
		self.listeners.push(Box::new(listener));
	}

	/// Install the hook invoked after each ingestion pass
	/// (`execute_all_new_entries`, or a watcher-triggered dispatch) completes.
	pub fn on_sync_complete(&mut self, f: impl FnMut(&Extra) + Send + 'static) {
		self.on_sync_complete = Some(Box::new(f));
	}

	fn sync_complete(&mut self, extra: &Extra) {
		if let Some(f) = self.on_sync_complete.as_mut() {
			f(extra);
		}
	}

	// -- write path ----------------------------------------------------

	/// Append one entry, timestamped now, to own log at `path`.
	pub fn set_entry(&mut self, path: &[String], key: Value, value: Value) {
		self.set_entries_for_path(path, vec![Entry::now(key, value)]);
	}

	/// Append several entries, each timestamped now, to own log at `path`.
	pub fn set_entries(&mut self, path: &[String], entries: Vec<(Value, Value)>) {
		let entries = entries.into_iter().map(|(k, v)| Entry::now(k, v)).collect();
		self.set_entries_for_path(path, entries);
	}

	/// Append caller-timestamped entries to own log at `path` and merge them
	/// into own stored view. Ordering is fixed: the log append must be
	/// durable before the sequence bump (so peers never observe a bump for
	/// bytes they can't yet read), and the stored view is updated last (so a
	/// crash between steps is recoverable by re-ingesting own log).
	pub fn set_entries_for_path(&mut self, path: &[String], entries: Vec<Entry>) {
		if entries.is_empty() {
			return;
		}

		let new_root = self.decsync_dir.join(NEW_ENTRIES).join(&self.own_app_enc);
		let new_file = encoded_join(&new_root, path);
		let stored_file =
			encoded_join(&self.decsync_dir.join(STORED_ENTRIES).join(&self.own_app_enc), path);

		let lines: Vec<String> = entries.iter().map(serialize_entry_line).collect();
		if let Err(e) = append_lines(&new_file, &lines) {
			error!("failed to append to {:?}: {}", new_file, e);
			return;
		}

		if let Err(e) = bump_sequence_chain(&new_root, path) {
			warn!("failed to bump sequence for {:?}: {}", path, e);
		}

		let _ = self.update_stored_entries(Some(&stored_file), entries);
	}

	// -- stored-view merge ------------------------------------------------

	/// Merge `entries` into `stored_file` (the last-writer-wins invariant):
	/// for every key touched, only the latest-by-datetime entry survives.
	/// Returns the entries that survived the merge (the ones actually newer
	/// than what was already stored) — callers dispatch only these to
	/// listeners. `None` means a read-only bootstrap location; merging is a
	/// no-op and every entry is considered to have survived.
	fn update_stored_entries(&mut self, stored_file: Option<&Path>, mut entries: Vec<Entry>) -> Vec<Entry> {
		let Some(stored_file) = stored_file else {
			return entries;
		};

		let mut have_to_filter = false;
		match read_optional_string(stored_file) {
			Ok(Some(content)) => {
				for line in content.lines() {
					let Some(stored_entry) = parse_entry_line(line) else {
						continue;
					};
					entries.retain(|new_entry| {
						if !equals_json(&new_entry.key, &stored_entry.key) {
							return true;
						}
						if new_entry.datetime > stored_entry.datetime {
							have_to_filter = true;
							true
						} else {
							// Stored is fresher (or tied); don't override.
							false
						}
					});
				}
			}
			Ok(None) => {}
			Err(e) => {
				warn!("failed to read stored entries {:?}: {}", stored_file, e);
				return entries;
			}
		}

		if have_to_filter {
			let superseded_keys: Vec<Value> = entries.iter().map(|e| e.key.clone()).collect();
			let result = filter_file(stored_file, |line| match parse_entry_line(line) {
				Some(stored_entry) => {
					!superseded_keys.iter().any(|k| equals_json(k, &stored_entry.key))
				}
				None => true,
			});
			if let Err(e) = result {
				warn!("failed to rewrite stored entries {:?}: {}", stored_file, e);
				return entries;
			}
		}

		if !entries.is_empty() {
			let lines: Vec<String> = entries.iter().map(serialize_entry_line).collect();
			if let Err(e) = append_lines(stored_file, &lines) {
				warn!("failed to append stored entries {:?}: {}", stored_file, e);
			}
		}

		entries
	}

	// -- read path --------------------------------------------------------

	/// Ingest unread bytes of one `(path, sourceAppId)` log: advance the
	/// cursor, parse and dedupe by key, merge into the stored view, and
	/// dispatch to the first matching listener.
	fn execute_entries_location(
		&mut self,
		loc: &EntriesLocation,
		extra: &Extra,
		key_pred: &dyn Fn(&Value) -> bool,
		value_pred: &dyn Fn(&Value) -> bool,
	) {
		let read_bytes = loc
			.read_bytes_file
			.as_deref()
			.map(read_cursor)
			.unwrap_or(0);
		let size = file_len(&loc.new_file);
		if read_bytes >= size {
			return;
		}

		if let Some(read_bytes_file) = &loc.read_bytes_file {
			if let Err(e) = write_cursor(read_bytes_file, size) {
				warn!("failed to advance cursor {:?}: {}", read_bytes_file, e);
				return;
			}
		}

		let lines = match read_lines_from(&loc.new_file, read_bytes) {
			Ok(l) => l,
			Err(e) => {
				warn!("failed to read {:?}: {}", loc.new_file, e);
				return;
			}
		};

		let mut parsed = Vec::new();
		for line in &lines {
			match parse_entry_line(line) {
				Some(entry) => parsed.push(entry),
				None => warn!("skipping malformed entry line in {:?}", loc.new_file),
			}
		}

		let filtered: Vec<Entry> = parsed
			.into_iter()
			.filter(|e| key_pred(&e.key) && value_pred(&e.value))
			.collect();

		let entries = dedup_latest_per_key(filtered);
		let survivors = self.update_stored_entries(loc.stored_file.as_deref(), entries);
		if survivors.is_empty() {
			return;
		}

		match self.listeners.iter_mut().find(|l| l.matches_path(&loc.path)) {
			Some(listener) => listener.on_entries_update(&loc.path, &survivors, extra),
			None => error!("no listener matches path {:?}; entries remain in stored view", loc.path),
		}
	}

	// -- ingest every peer's new entries --------------------------------

	/// Ingest every peer's unread new-entries and dispatch them.
	pub fn execute_all_new_entries(&mut self, extra: &Extra) {
		let new_root = self.decsync_dir.join(NEW_ENTRIES);
		let read_bytes_root = self.decsync_dir.join(READ_BYTES).join(&self.own_app_enc);
		let own_app_id = self.own_app_id.clone();

		let results = list_files_recursive_relative(&new_root, Some(&read_bytes_root), &|p| {
			p.first().map(|seg| seg.as_str() != own_app_id.as_str()).unwrap_or(true)
		});

		for result in results {
			let peer_app_id = result[0].clone();
			let path = result[1..].to_vec();
			let loc = self.new_entries_location(&path, &peer_app_id);
			self.execute_entries_location(&loc, extra, &|_| true, &|_| true);
		}

		self.sync_complete(extra);
	}

	/// Ingest one peer's unread entries at exactly `path` and run the
	/// sync-complete hook, for a watcher that already knows which file
	/// changed (skips the full `new-entries/` rescan).
	pub(crate) fn dispatch_change(&mut self, path: &[String], source_app_id: &str, extra: &Extra) {
		let loc = self.new_entries_location(path, source_app_id);
		self.execute_entries_location(&loc, extra, &|_| true, &|_| true);
		self.sync_complete(extra);
	}

	// -- replay own stored entries ---------------------------------------

	/// Replay already-materialized own stored entries under `execute_path`
	/// to listeners (e.g. at app startup), without touching the stored view.
	pub fn execute_stored_entries(
		&mut self,
		execute_path: &[String],
		extra: &Extra,
		key_pred: &dyn Fn(&Value) -> bool,
		value_pred: &dyn Fn(&Value) -> bool,
		path_pred: &dyn Fn(&[String]) -> bool,
	) {
		let stored_root = self.decsync_dir.join(STORED_ENTRIES).join(&self.own_app_enc);
		let base = encoded_join(&stored_root, execute_path);

		let results = list_files_recursive_relative(&base, None, path_pred);
		for leaf in results {
			let mut full_path = execute_path.to_vec();
			full_path.extend(leaf);
			let loc = self.stored_entries_location(&full_path);
			self.execute_entries_location(&loc, extra, key_pred, value_pred);
		}
	}

	// -- peer bootstrap ---------------------------------------------------

	/// Bootstrap a fresh install by copying the freshest peer's stored view
	/// (and its read cursors) into our own, then marking that peer's log as
	/// already consumed so it isn't reapplied on top.
	pub fn init_stored_entries(&mut self) {
		let stored_root = self.decsync_dir.join(STORED_ENTRIES);
		let Some(winner) = self.find_freshest_app_id(&stored_root) else {
			return;
		};
		if winner == self.own_app_id {
			return;
		}
		let winner_enc = encode_segment(&winner);

		let own_stored = stored_root.join(&self.own_app_enc);
		let peer_stored = stored_root.join(&winner_enc);
		if let Err(e) = copy_dir_recursive(&peer_stored, &own_stored) {
			warn!("failed to bootstrap stored entries from {:?}: {}", peer_stored, e);
			return;
		}

		let read_bytes_root = self.decsync_dir.join(READ_BYTES);
		let own_read_bytes = read_bytes_root.join(&self.own_app_enc);
		let peer_read_bytes = read_bytes_root.join(&winner_enc);
		if let Err(e) = copy_dir_recursive(&peer_read_bytes, &own_read_bytes) {
			warn!("failed to bootstrap read cursors from {:?}: {}", peer_read_bytes, e);
		}

		let peer_new_entries = self.decsync_dir.join(NEW_ENTRIES).join(&winner_enc);
		let own_read_bytes_for_peer = own_read_bytes.join(&winner_enc);
		let leaves =
			list_files_recursive_relative(&peer_new_entries, Some(&own_read_bytes_for_peer), &|_| true);
		for leaf in leaves {
			let src_file = encoded_join(&peer_new_entries, &leaf);
			let dst_file = encoded_join(&own_read_bytes_for_peer, &leaf);
			if let Err(e) = write_cursor(&dst_file, file_len(&src_file)) {
				warn!("failed to seed cursor {:?}: {}", dst_file, e);
			}
		}
	}

	/// Scan every `stored-entries/<appId>/**` entry and return the appId
	/// whose most recent entry has the greatest datetime. Ties favor
	/// `own_app_id`.
	fn find_freshest_app_id(&self, stored_root: &Path) -> Option<String> {
		let app_dirs = fs::read_dir(stored_root).ok()?;
		let mut best: Option<(String, String)> = None; // (appId, datetime)

		for entry in app_dirs.flatten() {
			let name = entry.file_name();
			let Some(name_str) = name.to_str() else { continue };
			if name_str.starts_with('.') || !entry.path().is_dir() {
				continue;
			}
			let Some(app_id) = decode_segment(name_str) else { continue };

			for leaf in list_files_recursive_relative(&entry.path(), None, &|_| true) {
				let file = encoded_join(&entry.path(), &leaf);
				let Ok(content) = fs::read_to_string(&file) else { continue };
				for line in content.lines() {
					let Some(e) = parse_entry_line(line) else { continue };
					let is_better = match &best {
						None => true,
						Some((best_app, best_dt)) => {
							e.datetime > *best_dt
								|| (e.datetime == *best_dt
									&& app_id == self.own_app_id
									&& best_app != &self.own_app_id)
						}
					};
					if is_better {
						best = Some((app_id.clone(), e.datetime.clone()));
					}
				}
			}
		}

		best.map(|(app_id, _)| app_id)
	}

	fn new_entries_location(&self, path: &[String], source_app_id: &str) -> EntriesLocation {
		let source_enc = encode_segment(source_app_id);
		EntriesLocation {
			path: path.to_vec(),
			new_file: encoded_join(&self.decsync_dir.join(NEW_ENTRIES).join(&source_enc), path),
			stored_file: Some(encoded_join(
				&self.decsync_dir.join(STORED_ENTRIES).join(&self.own_app_enc),
				path,
			)),
			read_bytes_file: Some(encoded_join(
				&self
					.decsync_dir
					.join(READ_BYTES)
					.join(&self.own_app_enc)
					.join(&source_enc),
				path,
			)),
		}
	}

	fn stored_entries_location(&self, path: &[String]) -> EntriesLocation {
		EntriesLocation {
			path: path.to_vec(),
			new_file: encoded_join(
				&self.decsync_dir.join(STORED_ENTRIES).join(&self.own_app_enc),
				path,
			),
			stored_file: None,
			read_bytes_file: None,
		}
	}
}

/// Group entries by structural key equality and keep only the
/// lexicographically latest datetime per group (ISO-8601 order equals
/// chronological order).
fn dedup_latest_per_key(entries: Vec<Entry>) -> Vec<Entry> {
	let mut result: Vec<Entry> = Vec::new();
	for entry in entries {
		match result.iter_mut().find(|e| equals_json(&e.key, &entry.key)) {
			Some(existing) => {
				if entry.datetime > existing.datetime {
					*existing = entry;
				}
			}
			None => result.push(entry),
		}
	}
	result
}

fn read_cursor(path: &Path) -> u64 {
	fs::read_to_string(path).ok().and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

fn write_cursor(path: &Path, value: u64) -> std::io::Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}
	fs::write(path, value.to_string())
}

/// Replace `dst` with a full copy of `src`: any pre-existing `dst` entries
/// not present in `src` are removed first, so the result is an overwrite
/// rather than a merge of the two trees.
fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
	if !src.exists() {
		return Ok(());
	}
	if dst.exists() {
		fs::remove_dir_all(dst)?;
	}
	fs::create_dir_all(dst)?;
	for entry in fs::read_dir(src)? {
		let entry = entry?;
		let dst_path = dst.join(entry.file_name());
		if entry.path().is_dir() {
			copy_dir_recursive(&entry.path(), &dst_path)?;
		} else {
			fs::copy(entry.path(), &dst_path)?;
		}
	}
	Ok(())
}

// -- static queries --------------------------------------------------------

/// Scan every `stored-entries/<appId>/<path>` file for the entry matching
/// `key` with the greatest datetime across all appIds. Does not update any
/// cursor; intended for simple point queries like "is this collection
/// deleted?".
pub fn get_stored_static_value(decsync_dir: &Path, path: &[String], key: &Value) -> Option<Value> {
	let stored_root = decsync_dir.join(STORED_ENTRIES);
	let app_dirs = fs::read_dir(&stored_root).ok()?;

	let mut best: Option<(String, Value)> = None; // (datetime, value)
	for entry in app_dirs.flatten() {
		let name = entry.file_name();
		let Some(name_str) = name.to_str() else { continue };
		if name_str.starts_with('.') || !entry.path().is_dir() {
			continue;
		}
		let file = encoded_join(&entry.path(), path);
		let Ok(content) = fs::read_to_string(&file) else { continue };
		for line in content.lines() {
			let Some(e) = parse_entry_line(line) else { continue };
			if !equals_json(&e.key, key) {
				continue;
			}
			let is_better = match &best {
				None => true,
				Some((dt, _)) => e.datetime > *dt,
			};
			if is_better {
				best = Some((e.datetime.clone(), e.value.clone()));
			}
		}
	}

	best.map(|(_, v)| v)
}


// vim: ts=4
