//! DecSync: decentralized, file-system-mediated synchronization of
//! key/value mappings.
//!
//! A [`Decsync`] instance owns no network or database state: every writer
//! appends to its own log under a shared directory (synced by whatever
//! external mechanism the host already uses — a cloud-synced folder, a
//! removable drive, `rsync`), and every reader merges what it finds there
//! into a materialized, last-writer-wins stored view. See [`engine`] for the
//! on-disk layout and ingestion pipeline, [`observer`] for wiring an external
//! directory watcher, and [`dirs`] for locating a `DecsyncDir` on disk.

pub mod dirs;
pub mod engine;
pub mod entry;
pub mod error;
pub mod json_value;
pub mod listener;
pub mod log_io;
pub mod logging;
pub mod observer;
pub mod path_codec;

#[cfg(feature = "watch")]
pub mod watch;

pub use engine::{get_stored_static_value, Decsync};
pub use entry::Entry;
pub use error::{DecsyncError, Result};
pub use listener::{Listener, SubdirListener, SubfileListener};
pub use observer::ChangeObserver;

// vim: ts=4
