use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use syncheal::environment::Folder;
use syncheal::filter::{DirectoryFilterListener, FilteredDirectoryModel};
use syncheal::logging::*;
use syncheal::problem::MassDeleteChoice;
use syncheal::{
	Config, DirectoryFilter, FilterMode, FilteredDirectoryEvent, LocalEnvironment, LocalFolder,
	MemberInfo, TokioExecutor,
};

///////////////////////
// Utility functions //
///////////////////////

fn load_config(matches: &clap::ArgMatches) -> Result<Config, Box<dyn Error>> {
	let mut config = match matches.get_one::<String>("config") {
		Some(path) => Config::load(Path::new(path))?,
		None => {
			let defaults = Config::default();
			Config::load_from_dir(&defaults.state_dir)?
		}
	};
	config.apply_env()?;
	if let Some(profile) = matches.get_one::<String>("profile") {
		config.profile = profile.clone();
	}
	match matches.get_count("verbose") {
		0 => {}
		1 => config.log_level = "debug".to_string(),
		_ => config.log_level = "trace".to_string(),
	}
	config.validate()?;
	Ok(config)
}

fn my_self() -> MemberInfo {
	let nick = std::env::var("USER").unwrap_or_else(|_| "local".to_string());
	MemberInfo::new("local", nick)
}

fn open_folder(config: &Config, dir: &str) -> Result<Arc<LocalFolder>, Box<dyn Error>> {
	let base = PathBuf::from(dir);
	let db_path = syncheal::local::default_db_path(config, &base);
	debug!("Folder database: {}", db_path.display());
	Ok(Arc::new(LocalFolder::open(&base, &db_path, config.clone(), my_self())?))
}

fn print_problems(folder: &LocalFolder) {
	let problems = folder.problems().problems();
	if problems.is_empty() {
		println!("{}: no problems", folder.info().name);
		return;
	}
	println!("{}: {} problem(s)", folder.info().name, problems.len());
	for problem in problems {
		match problem.resolution_description() {
			Some(fix) => println!("  [{}] {} (fix: {})", problem.tag(), problem.description(), fix),
			None => println!("  [{}] {}", problem.tag(), problem.description()),
		}
	}
}

fn print_model(model: &FilteredDirectoryModel, depth: usize) {
	let indent = "  ".repeat(depth);
	if depth > 0 {
		let marker = if model.has_new_files { " *" } else { "" };
		println!("{}{}/{}", indent, model.name, marker);
	}
	for file in &model.files {
		let deleted = if file.deleted { " (deleted)" } else { "" };
		println!("{}  {}{}", indent, file.filename_only(), deleted);
	}
	for sub in &model.subdirectories {
		print_model(sub, depth + 1);
	}
}

/////////////////
// Subcommands //
/////////////////

fn print_problems_json(folder: &LocalFolder) -> Result<(), Box<dyn Error>> {
	let problems: Vec<serde_json::Value> = folder
		.problems()
		.problems()
		.iter()
		.map(|p| {
			serde_json::json!({
				"kind": p.tag().to_string(),
				"description": p.description(),
				"fix": p.resolution_description(),
				"documentation": p.documentation_reference(),
			})
		})
		.collect();
	let report = serde_json::json!({
		"folder": folder.info().name,
		"folderId": folder.info().id.as_str(),
		"problems": problems,
	});
	println!("{}", serde_json::to_string_pretty(&report)?);
	Ok(())
}

fn check(config: Config, dir: String, json: bool) -> Result<(), Box<dyn Error>> {
	let folder = open_folder(&config, &dir)?;
	match folder.scan() {
		Ok(result) => info!(
			"Scanned {} files ({} new, {} changed, {} deleted, {} held back)",
			result.total_files,
			result.new_files,
			result.changed_files,
			result.deleted_files,
			result.held_deletions
		),
		Err(e) => warn!("Scan failed: {}", e),
	}
	if json {
		return print_problems_json(&folder);
	}
	print_problems(&folder);
	Ok(())
}

fn fix(config: Config, dir: String, choice: Option<MassDeleteChoice>) -> Result<(), Box<dyn Error>> {
	let folder = open_folder(&config, &dir)?;
	if let Err(e) = folder.scan() {
		warn!("Scan failed: {}", e);
	}

	let executor = Arc::new(TokioExecutor::current()?);
	let env = Arc::new(LocalEnvironment::new(my_self(), executor).with_mass_delete_choice(choice));
	env.add_folder(Arc::clone(&folder));

	for problem in folder.problems().problems() {
		// one decision covers every held back deletion
		if !folder.problems().contains(&problem) {
			continue;
		}
		let action = match problem.resolution(env.clone()) {
			Some(action) => action,
			None => {
				println!("  [{}] no automatic fix", problem.tag());
				continue;
			}
		};
		let label = action.label().to_string();
		match action.run() {
			Ok(()) => println!("  [{}] {}: done", problem.tag(), label),
			Err(e) => println!("  [{}] {}: failed: {}", problem.tag(), label, e),
		}
	}

	for message in folder.take_outbox() {
		info!("Pending peer message: {:?}", message);
	}
	print_problems(&folder);
	Ok(())
}

struct ChannelListener(std::sync::Mutex<mpsc::Sender<Arc<FilteredDirectoryEvent>>>);

impl DirectoryFilterListener for ChannelListener {
	fn filter_changed(&self, event: &FilteredDirectoryEvent) {
		let sender = self.0.lock().unwrap_or_else(|e| e.into_inner());
		let _ = sender.send(Arc::new(event.clone()));
	}
}

fn filter(
	config: Config,
	dir: String,
	search: Option<String>,
	mode: FilterMode,
	flat: bool,
) -> Result<(), Box<dyn Error>> {
	let folder = open_folder(&config, &dir)?;
	folder.scan()?;

	let (tx, rx) = mpsc::channel();
	let engine = DirectoryFilter::new(Arc::new(TokioExecutor::current()?));
	engine.add_listener(Arc::new(ChannelListener(std::sync::Mutex::new(tx))));
	engine.set_show_hidden(config.show_hidden_files);
	engine.set_filter_mode(mode);
	engine.set_flat(flat);
	if let Some(text) = search {
		engine.set_search_text(text);
	}
	engine.set_folder(folder);

	let mut event = rx.recv_timeout(Duration::from_secs(30))?;
	// later passes carry the final criteria
	while let Ok(next) = rx.recv_timeout(Duration::from_millis(200)) {
		event = next;
	}

	match &event.flat_model {
		Some(files) => {
			for file in files.iter() {
				println!("{}", file.relative_name);
			}
		}
		None => print_model(&event.model.pruned(), 0),
	}
	println!(
		"{} of {} files shown ({} local, {} incoming, {} deleted)",
		event.counts.filtered,
		event.counts.original,
		event.local_count(),
		event.incoming_count(),
		event.deleted_count()
	);
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("syncheal")
		.version("0.1.0")
		.author("Szilard Hajba <szilard@symbion.hu>")
		.about("Folder integrity checks and self-healing")
		.subcommand_required(true)
		.arg(
			Arg::new("profile")
				.short('p')
				.long("profile")
				.value_name("PROFILE")
				.help("Profile"),
		)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.help("Config file (toml, json5 or json)"),
		)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.action(ArgAction::Count)
				.help("More logging (-v debug, -vv trace)"),
		)
		.subcommand(
			Command::new("check")
				.about("Scan a folder and list its problems")
				.arg(Arg::new("dir").required(true))
				.arg(
					Arg::new("json")
						.long("json")
						.action(ArgAction::SetTrue)
						.help("Print the problems as JSON"),
				),
		)
		.subcommand(
			Command::new("fix")
				.about("Scan a folder and resolve its problems")
				.arg(Arg::new("dir").required(true))
				.arg(
					Arg::new("deletions")
						.long("deletions")
						.value_name("CHOICE")
						.value_parser(["propagate", "restore"])
						.help("What to do with held back mass deletions"),
				),
		)
		.subcommand(
			Command::new("filter")
				.about("Show a filtered view of a folder")
				.arg(Arg::new("dir").required(true))
				.arg(Arg::new("search").short('s').long("search").value_name("TEXT"))
				.arg(
					Arg::new("mode")
						.short('m')
						.long("mode")
						.value_name("MODE")
						.default_value("local-and-incoming"),
				)
				.arg(Arg::new("flat").long("flat").action(ArgAction::SetTrue)),
		)
		.get_matches();

	let config = load_config(&matches)?;
	init_tracing(&config.log_level, config.log_format);

	if let Some(sub) = matches.subcommand_matches("check") {
		let dir = sub.get_one::<String>("dir").ok_or("check: directory argument required")?.clone();
		let json = sub.get_flag("json");
		tokio::task::spawn_blocking(move || check(config, dir, json).map_err(|e| e.to_string()))
			.await??;
	} else if let Some(sub) = matches.subcommand_matches("fix") {
		let dir = sub.get_one::<String>("dir").ok_or("fix: directory argument required")?.clone();
		let choice = match sub.get_one::<String>("deletions").map(|s| s.as_str()) {
			Some("propagate") => Some(MassDeleteChoice::Propagate),
			Some("restore") => Some(MassDeleteChoice::RestoreFromPeers),
			_ => None,
		};
		tokio::task::spawn_blocking(move || fix(config, dir, choice).map_err(|e| e.to_string()))
			.await??;
	} else if let Some(sub) = matches.subcommand_matches("filter") {
		let dir = sub.get_one::<String>("dir").ok_or("filter: directory argument required")?.clone();
		let search = sub.get_one::<String>("search").cloned();
		let mode: FilterMode = sub
			.get_one::<String>("mode")
			.map(|s| s.parse())
			.transpose()?
			.unwrap_or_default();
		let flat = sub.get_flag("flat");
		tokio::task::spawn_blocking(move || {
			filter(config, dir, search, mode, flat).map_err(|e| e.to_string())
		})
		.await??;
	}

	Ok(())
}

// vim: ts=4
