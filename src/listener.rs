//! Listener interface: the closed set of callbacks an engine dispatches
//! decoded updates to.

use crate::entry::Entry;

/// A listener is polymorphic over two operations: deciding whether it wants
/// updates for a given path, and receiving them. `Extra` is host-supplied
/// context threaded through unchanged (a DB handle, a UI channel, ...).
pub trait Listener<Extra> {
	fn matches_path(&self, path: &[String]) -> bool;
	fn on_entries_update(&mut self, path: &[String], entries: &[Entry], extra: &Extra);
}

/// Matches any path whose first `subdir.len()` segments equal `subdir`;
/// delivers each entry individually with the matched prefix stripped.
pub struct SubdirListener<Extra> {
	subdir: Vec<String>,
	on_entry: Box<dyn FnMut(&[String], &Entry, &Extra) + Send>,
}

impl<Extra> SubdirListener<Extra> {
	pub fn new(
		subdir: Vec<String>,
		on_entry: impl FnMut(&[String], &Entry, &Extra) + Send + 'static,
	) -> Self {
		SubdirListener { subdir, on_entry: Box::new(on_entry) }
	}
}

impl<Extra> Listener<Extra> for SubdirListener<Extra> {
	fn matches_path(&self, path: &[String]) -> bool {
		path.len() >= self.subdir.len() && path[..self.subdir.len()] == self.subdir[..]
	}

	fn on_entries_update(&mut self, path: &[String], entries: &[Entry], extra: &Extra) {
		let rest = &path[self.subdir.len()..];
		for entry in entries {
			(self.on_entry)(rest, entry, extra);
		}
	}
}

/// Matches only the exact `path`; delivers each entry individually.
pub struct SubfileListener<Extra> {
	path: Vec<String>,
	on_entry: Box<dyn FnMut(&Entry, &Extra) + Send>,
}

impl<Extra> SubfileListener<Extra> {
	pub fn new(path: Vec<String>, on_entry: impl FnMut(&Entry, &Extra) + Send + 'static) -> Self {
		SubfileListener { path, on_entry: Box::new(on_entry) }
	}
}

impl<Extra> Listener<Extra> for SubfileListener<Extra> {
	fn matches_path(&self, path: &[String]) -> bool {
		path == self.path.as_slice()
	}

	fn on_entries_update(&mut self, _path: &[String], entries: &[Entry], extra: &Extra) {
		for entry in entries {
			(self.on_entry)(entry, extra);
		}
	}
}


// vim: ts=4
