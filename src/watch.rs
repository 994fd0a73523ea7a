//! Optional `notify`-backed recursive directory watcher, feeding events to a
//! [`ChangeObserver`].
//!
//! The core engine has no dependency on this module; it exists to
//! demonstrate wiring a real watcher to the otherwise-external collaborator
//! the engine expects. Enable with the `watch` feature.

use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::engine::Decsync;
use crate::logging::error;
use crate::observer::ChangeObserver;

/// Owns a `notify` watcher and the background thread draining its events
/// into a `ChangeObserver`. Dropping this stops the watch.
pub struct DirWatcher {
	_watcher: RecommendedWatcher,
	_worker: JoinHandle<()>,
}

impl DirWatcher {
	/// Start watching `decsync_dir/new-entries` recursively, dispatching
	/// every relevant event to `observer`. `extra` is cloned once per event
	/// and passed through to listeners.
	pub fn start<Extra>(
		decsync: Arc<Mutex<Decsync<Extra>>>,
		extra: Extra,
	) -> notify::Result<DirWatcher>
	where
		Extra: Clone + Send + 'static,
	{
		let root = { decsync.lock().unwrap().decsync_dir().join("new-entries") };
		let observer = ChangeObserver::new(decsync);
		observer.init_observer()?;

		let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
		let mut watcher = notify::recommended_watcher(move |res| {
			if tx.send(res).is_err() {
				// Worker thread gone; nothing left to deliver to.
			}
		})?;
		watcher.watch(&root, RecursiveMode::Recursive)?;

		let worker = std::thread::spawn(move || {
			for res in rx {
				match res {
					Ok(event) => handle_event(&observer, &root, &event, &extra),
					Err(e) => error!("watch error: {}", e),
				}
			}
		});

		Ok(DirWatcher { _watcher: watcher, _worker: worker })
	}
}

fn handle_event<Extra>(observer: &ChangeObserver<Extra>, root: &Path, event: &Event, extra: &Extra) {
	if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
		return;
	}
	for path in &event.paths {
		let Some(rel) = relative_str(root, path) else {
			continue;
		};
		observer.on_change(&rel, extra);
	}
}

fn relative_str(root: &Path, path: &Path) -> Option<String> {
	let rel = path.strip_prefix(root).ok()?;
	let rel_str = rel.to_str()?;
	if cfg!(windows) {
		Some(rel_str.replace('\\', "/"))
	} else {
		Some(rel_str.to_string())
	}
}


// vim: ts=4
