//! Append-only log file I/O: safe rewrite-via-temp-file, recursive directory
//! listing with hidden-file filtering and sequence-version short-circuiting.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::logging::warn;
use crate::path_codec::decode_segment;

pub const SEQUENCE_FILE_NAME: &str = ".decsync-sequence";

/// Read `path` whole, treating a missing file as `Ok(None)` rather than an
/// error. Used by callers that need `?`-composable access to an optional
/// file (the JSON `?` conversion comes along for free via `DecsyncError`).
pub(crate) fn read_optional_string(path: &Path) -> Result<Option<String>> {
	match fs::read_to_string(path) {
		Ok(content) => Ok(Some(content)),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(e.into()),
	}
}

/// Append lines to `path`, creating parent directories and the file itself
/// as needed. Each element of `lines` is written verbatim followed by `\n`.
pub fn append_lines(path: &Path, lines: &[String]) -> io::Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}
	let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
	for line in lines {
		file.write_all(line.as_bytes())?;
		file.write_all(b"\n")?;
	}
	Ok(())
}

/// Read every line of `path` starting at byte offset `from`, as UTF-8.
/// Missing files are treated as empty. Lines that are not valid UTF-8 are
/// skipped (surfaced as an empty line count difference, not an error).
pub fn read_lines_from(path: &Path, from: u64) -> io::Result<Vec<String>> {
	let file = match fs::File::open(path) {
		Ok(f) => f,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
		Err(e) => return Err(e),
	};
	let mut file = file;
	io::Seek::seek(&mut file, io::SeekFrom::Start(from))?;
	let reader = io::BufReader::new(file);
	let mut lines = Vec::new();
	for line in reader.lines() {
		match line {
			Ok(l) => lines.push(l),
			Err(e) if e.kind() == io::ErrorKind::InvalidData => continue,
			Err(e) => return Err(e),
		}
	}
	Ok(lines)
}

/// Byte length of `path`, or 0 if it does not exist.
pub fn file_len(path: &Path) -> u64 {
	fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Rewrite `path` atomically, keeping only lines for which `keep` returns
/// true. Writes to `.<name>.tmp` in the same directory, then renames over
/// the original. A missing source file is a silent no-op.
pub fn filter_file(path: &Path, keep: impl Fn(&str) -> bool) -> io::Result<()> {
	let content = match fs::read_to_string(path) {
		Ok(c) => c,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
		Err(e) => return Err(e),
	};

	let dir = path.parent().unwrap_or_else(|| Path::new("."));
	let tmp_name = format!(
		".{}.tmp",
		path.file_name().and_then(|n| n.to_str()).unwrap_or("decsync")
	);
	let tmp_path = dir.join(tmp_name);

	{
		let mut tmp = fs::File::create(&tmp_path)?;
		for line in content.lines() {
			if keep(line) {
				tmp.write_all(line.as_bytes())?;
				tmp.write_all(b"\n")?;
			}
		}
	}
	fs::rename(&tmp_path, path)
}

/// Read a `.decsync-sequence` file under `dir` as an unsigned integer.
/// Missing or unparsable content is treated as 0, per spec.
pub fn read_sequence(dir: &Path) -> u64 {
	fs::read_to_string(dir.join(SEQUENCE_FILE_NAME))
		.ok()
		.and_then(|s| s.trim().parse().ok())
		.unwrap_or(0)
}

/// Bump the sequence counter of `dir` by one and return the new value.
pub fn bump_sequence(dir: &Path) -> io::Result<u64> {
	let next = read_sequence(dir) + 1;
	fs::create_dir_all(dir)?;
	fs::write(dir.join(SEQUENCE_FILE_NAME), next.to_string())?;
	Ok(next)
}

/// Bump the sequence file of `root` and of every strict-prefix ancestor
/// directory along `path` (inclusive of the root itself), per invariant 4:
/// writing to `new-entries/<self>/a/b/c` bumps the sequence at
/// `new-entries/<self>`, `.../a`, and `.../a/b` — not `.../a/b/c` itself,
/// since that is the leaf file `append_lines` just created, not a directory.
pub fn bump_sequence_chain(root: &Path, path: &[String]) -> io::Result<()> {
	bump_sequence(root)?;
	let mut dir = root.to_path_buf();
	for segment in &path[..path.len().saturating_sub(1)] {
		dir.push(crate::path_codec::encode_segment(segment));
		bump_sequence(&dir)?;
	}
	Ok(())
}

/// Recursively enumerate the leaf files under `src`, returning each as its
/// list of *decoded* path segments relative to `src`.
///
/// `read_bytes_src`, if given, mirrors `src`'s directory structure and is
/// used to short-circuit subtrees whose `.decsync-sequence` hasn't changed
/// since the last scan (in which case the cached sequence file is updated
/// to match). `path_pred` receives the partial decoded path at every
/// directory and leaf; returning false prunes that subtree/entry.
pub fn list_files_recursive_relative(
	src: &Path,
	read_bytes_src: Option<&Path>,
	path_pred: &dyn Fn(&[String]) -> bool,
) -> Vec<Vec<String>> {
	let mut results = Vec::new();
	let mut prefix = Vec::new();
	list_recursive(src, read_bytes_src, &mut prefix, path_pred, &mut results);
	results
}

fn list_recursive(
	dir: &Path,
	read_bytes_dir: Option<&Path>,
	prefix: &mut Vec<String>,
	path_pred: &dyn Fn(&[String]) -> bool,
	results: &mut Vec<Vec<String>>,
) {
	if !path_pred(prefix) {
		return;
	}

	if let Some(rb_dir) = read_bytes_dir {
		let seq_file = dir.join(SEQUENCE_FILE_NAME);
		let rb_seq_file = rb_dir.join(SEQUENCE_FILE_NAME);
		if let (Ok(a), Ok(b)) = (fs::read_to_string(&seq_file), fs::read_to_string(&rb_seq_file)) {
			if a == b {
				return;
			}
		}
	}

	let entries = match fs::read_dir(dir) {
		Ok(e) => e,
		Err(_) => return,
	};

	for entry in entries.flatten() {
		let name = entry.file_name();
		let name_str = match name.to_str() {
			Some(s) => s,
			None => continue,
		};
		if name_str.starts_with('.') {
			continue;
		}

		let decoded = match decode_segment(name_str) {
			Some(d) => d,
			None => {
				warn!("undecodable path segment {:?} under {:?}, skipping", name_str, dir);
				continue;
			}
		};

		prefix.push(decoded);
		let path = entry.path();
		let next_read_bytes_dir = read_bytes_dir.map(|d| d.join(name_str));

		if path.is_dir() {
			list_recursive(&path, next_read_bytes_dir.as_deref(), prefix, path_pred, results);
		} else if path.is_file() && path_pred(prefix) {
			results.push(prefix.clone());
		}
		prefix.pop();
	}

	if let Some(rb_dir) = read_bytes_dir {
		let seq_file = dir.join(SEQUENCE_FILE_NAME);
		if seq_file.exists() {
			if let Err(e) = fs::create_dir_all(rb_dir).and_then(|_| {
				fs::copy(&seq_file, rb_dir.join(SEQUENCE_FILE_NAME)).map(|_| ())
			}) {
				warn!("failed to cache sequence file for {:?}: {}", dir, e);
			}
		}
	}
}

/// Join decoded path segments with encoded segments onto a base directory.
pub fn encoded_join(base: &Path, path: &[String]) -> PathBuf {
	let mut p = base.to_path_buf();
	for segment in path {
		p.push(crate::path_codec::encode_segment(segment));
	}
	p
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn append_then_read_lines_from_offset() {
		let dir = TempDir::new().unwrap();
		let file = dir.path().join("log");
		append_lines(&file, &["one".into(), "two".into()]).unwrap();
		let len_after_one = "one\n".len() as u64;
		append_lines(&file, &["three".into()]).unwrap();
		let lines = read_lines_from(&file, len_after_one).unwrap();
		assert_eq!(lines, vec!["two".to_string(), "three".to_string()]);
	}

	#[test]
	fn read_lines_from_missing_file_is_empty() {
		let dir = TempDir::new().unwrap();
		let file = dir.path().join("missing");
		assert_eq!(read_lines_from(&file, 0).unwrap(), Vec::<String>::new());
		assert_eq!(file_len(&file), 0);
	}

	#[test]
	fn append_never_shrinks_the_file() {
		let dir = TempDir::new().unwrap();
		let file = dir.path().join("log");
		append_lines(&file, &["a".into()]).unwrap();
		let len1 = file_len(&file);
		append_lines(&file, &["b".into()]).unwrap();
		let len2 = file_len(&file);
		assert!(len2 > len1);
	}

	#[test]
	fn filter_file_keeps_only_matching_lines_atomically() {
		let dir = TempDir::new().unwrap();
		let file = dir.path().join("stored");
		append_lines(&file, &["keep-a".into(), "drop-b".into(), "keep-c".into()]).unwrap();
		filter_file(&file, |l| l.starts_with("keep")).unwrap();
		let content = fs::read_to_string(&file).unwrap();
		assert_eq!(content, "keep-a\nkeep-c\n");
	}

	#[test]
	fn filter_file_on_missing_file_is_noop() {
		let dir = TempDir::new().unwrap();
		let file = dir.path().join("missing");
		assert!(filter_file(&file, |_| true).is_ok());
		assert!(!file.exists());
	}

	#[test]
	fn sequence_defaults_to_zero_and_bumps_by_one() {
		let dir = TempDir::new().unwrap();
		assert_eq!(read_sequence(dir.path()), 0);
		assert_eq!(bump_sequence(dir.path()).unwrap(), 1);
		assert_eq!(bump_sequence(dir.path()).unwrap(), 2);
		assert_eq!(read_sequence(dir.path()), 2);
	}

	#[test]
	fn malformed_sequence_file_treated_as_zero() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join(SEQUENCE_FILE_NAME), "not-a-number").unwrap();
		assert_eq!(read_sequence(dir.path()), 0);
	}

	#[test]
	fn bump_sequence_chain_touches_every_strict_prefix_but_not_the_leaf() {
		let dir = TempDir::new().unwrap();
		let path = vec!["a".to_string(), "b".to_string(), "c".to_string()];
		bump_sequence_chain(dir.path(), &path).unwrap();
		assert_eq!(read_sequence(dir.path()), 1);
		assert_eq!(read_sequence(&dir.path().join("a")), 1);
		assert_eq!(read_sequence(&dir.path().join("a").join("b")), 1);
		// "a/b/c" is the leaf (the file path itself), not a strict prefix.
		assert_eq!(read_sequence(&dir.path().join("a").join("b").join("c")), 0);
	}

	#[test]
	fn list_files_recursive_skips_hidden_entries() {
		let dir = TempDir::new().unwrap();
		fs::create_dir_all(dir.path().join(".hidden")).unwrap();
		fs::write(dir.path().join(".hidden").join("x"), "").unwrap();
		fs::write(dir.path().join(".hiddenfile"), "").unwrap();
		fs::create_dir_all(dir.path().join("visible")).unwrap();
		fs::write(dir.path().join("visible").join("leaf"), "").unwrap();

		let results = list_files_recursive_relative(dir.path(), None, &|_| true);
		assert_eq!(results, vec![vec!["visible".to_string(), "leaf".to_string()]]);
	}

	#[test]
	fn list_files_recursive_decodes_segment_names() {
		let dir = TempDir::new().unwrap();
		fs::create_dir_all(dir.path().join("a%20b")).unwrap();
		fs::write(dir.path().join("a%20b").join("c%2Ed"), "").unwrap();

		let results = list_files_recursive_relative(dir.path(), None, &|_| true);
		assert_eq!(results, vec![vec!["a b".to_string(), "c.d".to_string()]]);
	}

	#[test]
	fn list_files_recursive_applies_path_pred() {
		let dir = TempDir::new().unwrap();
		fs::create_dir_all(dir.path().join("keep")).unwrap();
		fs::write(dir.path().join("keep").join("leaf"), "").unwrap();
		fs::create_dir_all(dir.path().join("skip")).unwrap();
		fs::write(dir.path().join("skip").join("leaf"), "").unwrap();

		let results =
			list_files_recursive_relative(dir.path(), None, &|p| p.first().map(|s| s.as_str()) != Some("skip"));
		assert_eq!(results, vec![vec!["keep".to_string(), "leaf".to_string()]]);
	}

	#[test]
	fn version_short_circuit_skips_unchanged_subtree() {
		let src = TempDir::new().unwrap();
		let rb = TempDir::new().unwrap();
		fs::write(src.path().join("leaf"), "").unwrap();
		bump_sequence(src.path()).unwrap();

		// First scan caches the sequence file into read_bytes_src.
		let first = list_files_recursive_relative(src.path(), Some(rb.path()), &|_| true);
		assert_eq!(first, vec![vec!["leaf".to_string()]]);

		// Second scan with no intervening writes sees identical sequence and
		// short-circuits to nothing.
		let second = list_files_recursive_relative(src.path(), Some(rb.path()), &|_| true);
		assert_eq!(second, Vec::<Vec<String>>::new());

		// A further bump makes it observable again.
		bump_sequence(src.path()).unwrap();
		let third = list_files_recursive_relative(src.path(), Some(rb.path()), &|_| true);
		assert_eq!(third, vec![vec!["leaf".to_string()]]);
	}
}

// vim: ts=4
