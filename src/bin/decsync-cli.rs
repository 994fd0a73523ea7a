use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::path::PathBuf;

use decsync::dirs::{decsync_subdir, get_app_id, list_decsync_collections};
use decsync::{get_stored_static_value, Decsync, SubdirListener};

fn open(dir: Option<&str>, sync_type: &str, collection: &str, app_id: &str) -> Decsync<()> {
	let base = dir.map(PathBuf::from);
	let collection_dir = decsync_subdir(base.as_deref(), sync_type, Some(collection));
	Decsync::new(collection_dir, app_id)
}

fn split_path(raw: &str) -> Vec<String> {
	raw.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect()
}

fn main() -> Result<(), Box<dyn Error>> {
	decsync::logging::init_tracing();

	let matches = Command::new("decsync-cli")
		.version("0.1.0")
		.about("DecSync command-line client")
		.subcommand_required(true)
		.arg(Arg::new("dir").long("dir").value_name("DECSYNC_DIR").help("DecSync base directory (default: platform data dir)"))
		.arg(
			Arg::new("app-id")
				.long("app-id")
				.value_name("APP_ID")
				.default_value("decsync-cli")
				.help("This instance's writer appId"),
		)
		.subcommand(
			Command::new("get")
				.about("Print the stored value for a key across all writers")
				.arg(Arg::new("sync-type").required(true))
				.arg(Arg::new("collection").required(true))
				.arg(Arg::new("path").required(true).help("Entry path, '/'-separated"))
				.arg(Arg::new("key").required(true).help("JSON-encoded key")),
		)
		.subcommand(
			Command::new("set")
				.about("Append a new entry to this appId's own log")
				.arg(Arg::new("sync-type").required(true))
				.arg(Arg::new("collection").required(true))
				.arg(Arg::new("path").required(true))
				.arg(Arg::new("key").required(true))
				.arg(Arg::new("value").required(true)),
		)
		.subcommand(
			Command::new("sync")
				.about("Ingest every peer's unread entries once and print them")
				.arg(Arg::new("sync-type").required(true))
				.arg(Arg::new("collection").required(true)),
		)
		.subcommand(
			Command::new("list-collections")
				.about("List collections under a sync type")
				.arg(Arg::new("sync-type").required(true))
				.arg(Arg::new("all").long("all").action(ArgAction::SetTrue).help("Include collections marked deleted")),
		)
		.subcommand(
			Command::new("bootstrap")
				.about("Seed this fresh install from the freshest peer's stored view")
				.arg(Arg::new("sync-type").required(true))
				.arg(Arg::new("collection").required(true)),
		)
		.get_matches();

	let dir = matches.get_one::<String>("dir").map(String::as_str);
	let app_id = matches.get_one::<String>("app-id").unwrap().clone();

	if let Some(m) = matches.subcommand_matches("get") {
		let sync_type = m.get_one::<String>("sync-type").unwrap();
		let collection = m.get_one::<String>("collection").unwrap();
		let path = split_path(m.get_one::<String>("path").unwrap());
		let key: serde_json::Value = serde_json::from_str(m.get_one::<String>("key").unwrap())?;

		let collection_dir = decsync_subdir(dir.map(PathBuf::from).as_deref(), sync_type, Some(collection));
		match get_stored_static_value(&collection_dir, &path, &key) {
			Some(value) => println!("{value}"),
			None => eprintln!("(no value)"),
		}
	} else if let Some(m) = matches.subcommand_matches("set") {
		let sync_type = m.get_one::<String>("sync-type").unwrap();
		let collection = m.get_one::<String>("collection").unwrap();
		let path = split_path(m.get_one::<String>("path").unwrap());
		let key: serde_json::Value = serde_json::from_str(m.get_one::<String>("key").unwrap())?;
		let value: serde_json::Value = serde_json::from_str(m.get_one::<String>("value").unwrap())?;

		let mut decsync = open(dir, sync_type, collection, &app_id);
		decsync.set_entry(&path, key, value);
	} else if let Some(m) = matches.subcommand_matches("sync") {
		let sync_type = m.get_one::<String>("sync-type").unwrap();
		let collection = m.get_one::<String>("collection").unwrap();

		let mut decsync = open(dir, sync_type, collection, &app_id);
		decsync.add_listener(SubdirListener::<()>::new(Vec::new(), |path, entry, _| {
			println!("{:?} {} = {}", path, entry.key, entry.value);
		}));
		decsync.execute_all_new_entries(&());
	} else if let Some(m) = matches.subcommand_matches("list-collections") {
		let sync_type = m.get_one::<String>("sync-type").unwrap();
		let ignore_deleted = !m.get_flag("all");
		for collection in list_decsync_collections(dir.map(PathBuf::from).as_deref(), sync_type, ignore_deleted) {
			println!("{collection}");
		}
	} else if let Some(m) = matches.subcommand_matches("bootstrap") {
		let sync_type = m.get_one::<String>("sync-type").unwrap();
		let collection = m.get_one::<String>("collection").unwrap();

		let mut decsync = open(dir, sync_type, collection, &app_id);
		decsync.init_stored_entries();
	}

	Ok(())
}

// vim: ts=4
