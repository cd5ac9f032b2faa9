use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cairn_assets::{fetch::HttpFetcher, AssetSyncJob, Error, SyncConfig};
use cairn_task_system::TaskSystem;
use clap::{Args, Parser, Subcommand};
use directories::ProjectDirs;
use tracing::{debug, info};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Parser, Debug)]
#[command(name = "cairn", about = "Synchronize a content-addressed asset store", version)]
struct Cli {
	/// Path to the JSON config file, defaults to the user config directory
	#[arg(long, global = true, env = "CAIRN_CONFIG")]
	config: Option<PathBuf>,

	/// Log at debug level unless `RUST_LOG` says otherwise
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Print what a sync would do as JSON, only creating the directories it needs
	Plan(SyncArgs),
	/// Fetch, verify and materialize every entry of the manifest
	Sync(SyncArgs),
}

#[derive(Args, Debug)]
struct SyncArgs {
	/// The asset index to synchronize against
	#[arg(long)]
	manifest: PathBuf,

	#[arg(long)]
	store_root: Option<PathBuf>,

	#[arg(long)]
	resources_root: Option<PathBuf>,

	/// Names the virtual tree for manifests that ask for one
	#[arg(long)]
	release_key: Option<String>,

	#[arg(long)]
	base_url: Option<String>,

	/// Check SHA-1 digests on top of sizes
	#[arg(long)]
	verify_hashes: bool,
}

impl SyncArgs {
	fn apply(&self, config: &mut SyncConfig) {
		if let Some(store_root) = &self.store_root {
			config.store_root.clone_from(store_root);
		}
		if let Some(resources_root) = &self.resources_root {
			config.resources_root.clone_from(resources_root);
		}
		if let Some(release_key) = &self.release_key {
			config.release_key = Some(release_key.clone());
		}
		if let Some(base_url) = &self.base_url {
			config.resources_base_url.clone_from(base_url);
		}
		config.verify_hashes |= self.verify_hashes;
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	init_tracing(cli.verbose);

	let config_path = cli.config.clone().or_else(default_config_path);
	let mut config = match &config_path {
		Some(path) => SyncConfig::load(path)
			.await
			.with_context(|| format!("failed to load config from '{}'", path.display()))?,
		None => SyncConfig::default(),
	};

	debug!(config_path = ?config_path, ?config, "Loaded config");

	let (Commands::Plan(args) | Commands::Sync(args)) = &cli.command;
	args.apply(&mut config);

	let fetcher = HttpFetcher::new()?;

	let fetch_system = TaskSystem::<Error>::with_workers(config.fetch_workers);
	let copy_system = TaskSystem::<Error>::with_workers(config.copy_workers);

	let job = AssetSyncJob::from_config(
		&config,
		fetch_system.get_dispatcher(),
		copy_system.get_dispatcher(),
		fetcher,
	);

	let res = match &cli.command {
		Commands::Plan(args) => plan(&job, &args.manifest).await,
		Commands::Sync(args) => sync(&job, &args.manifest).await,
	};

	fetch_system.shutdown().await;
	copy_system.shutdown().await;

	res
}

fn init_tracing(verbose: bool) {
	let default_level = if verbose {
		LevelFilter::DEBUG
	} else {
		LevelFilter::INFO
	};

	tracing_subscriber::registry()
		.with(
			EnvFilter::builder()
				.with_default_directive(default_level.into())
				.from_env_lossy(),
		)
		.with(fmt::layer().with_writer(std::io::stderr))
		.init();
}

fn default_config_path() -> Option<PathBuf> {
	ProjectDirs::from("", "", "cairn").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

async fn plan(job: &AssetSyncJob, manifest_path: &Path) -> Result<()> {
	let plan = job.plan_file(manifest_path).await?;

	println!("{}", serde_json::to_string_pretty(&plan)?);

	Ok(())
}

async fn sync(job: &AssetSyncJob, manifest_path: &Path) -> Result<()> {
	let report = job.run_file(manifest_path).await?;

	println!("{}", serde_json::to_string_pretty(&report)?);

	if !report.is_success() {
		bail!("{} entries failed to sync", report.failures.len());
	}

	info!("All entries are in sync");

	Ok(())
}
