use facegate::{
    camera::{DirectoryFrameSource, FrameSource},
    common::{paths, Config, FaceAuthError},
    core::{AuthOrchestrator, EnrollmentOrchestrator},
    service::{BridgeClient, RecognitionEngine},
    storage::{FileTemplateStore, LockoutFile, MasterKey, ProtectedTemplates, TemplateProtector},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "facegate")]
#[command(about = "Face authentication against a local recognition engine")]
struct Cli {
    /// Verbose logging with source locations
    #[arg(long, global = true)]
    dev: bool,

    /// Config file (defaults to the user config, then /etc/facegate)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate using frames replayed from a directory
    Authenticate {
        #[arg(short, long)]
        frames: PathBuf,
        /// User to verify against (overrides auth.expected_user)
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long, default_value = "30")]
        timeout_secs: u64,
    },
    /// Enroll a user from the frames in a directory
    Enroll {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        frames: PathBuf,
    },
    /// Check whether the recognition engine answers
    Ping,
    /// Validate the config and print the resolved paths
    CheckConfig,
    /// Clear a persisted lockout
    ResetLockout,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.dev);

    let config = load_config(cli.config.as_deref())?;
    let data_dir = paths::data_dir(&config);

    match cli.command {
        Commands::Authenticate { frames, username, timeout_secs } => {
            let mut config = config;
            if username.is_some() {
                config.auth.expected_user = username;
            }

            let lockout_file = LockoutFile::new(paths::lockout_file(&data_dir));
            let prior = lockout_file.load()?;
            let source = DirectoryFrameSource::open(&frames)
                .with_context(|| format!("Failed to open frame directory {:?}", frames))?;
            let engine = BridgeClient::new(&config.bridge);
            let templates = open_templates(&config, &data_dir)?;

            let mut orchestrator = AuthOrchestrator::new(&config, engine, templates, source, prior);
            let changes = orchestrator.subscribe();
            let printer = std::thread::spawn(move || {
                for change in changes {
                    match change.detail {
                        Some(detail) => println!("[{}] {} ({})", change.current, change.message, detail),
                        None => println!("[{}] {}", change.current, change.message),
                    }
                }
            });

            orchestrator.run(Some(Duration::from_secs(timeout_secs)));
            lockout_file.save(&orchestrator.lockout_counter())?;
            let outcome = orchestrator.outcome().map(str::to_string);
            drop(orchestrator);
            let _ = printer.join();

            match outcome {
                Ok(user) => println!("✓ Authenticated as {}", user),
                Err(e) => {
                    println!("✗ {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Enroll { username, frames } => {
            let source = DirectoryFrameSource::open(&frames)
                .with_context(|| format!("Failed to open frame directory {:?}", frames))?;
            if source.is_empty() {
                anyhow::bail!("No images found in {:?}", frames);
            }

            let engine = BridgeClient::new(&config.bridge);
            if !engine.is_service_available() {
                anyhow::bail!("Recognition engine is not answering on {:?}", engine.socket_path());
            }
            let templates = open_templates(&config, &data_dir)?;
            let mut enrollment = EnrollmentOrchestrator::new(&config, engine, templates);

            enrollment.begin(&username);
            for index in 0..source.len() {
                let Some(frame) = source.current_frame() else {
                    continue;
                };
                match enrollment.capture(&frame) {
                    Ok(report) => println!(
                        "Capture {}/{} accepted (quality {:.2}, {})",
                        report.captured,
                        report.required,
                        report.quality.overall_score,
                        report.quality.assessment()
                    ),
                    Err(FaceAuthError::Policy(rejection)) => {
                        println!("Frame {} skipped: {}", index + 1, rejection.user_message())
                    }
                    Err(e) => println!("Frame {} skipped: {}", index + 1, e),
                }
            }

            if !enrollment.can_commit() {
                enrollment.cancel();
                anyhow::bail!(
                    "Not enough usable frames to enroll (need {})",
                    config.enrollment.min_frames
                );
            }
            enrollment.commit()?;
            println!("✓ Enrolled {}", username);
        }
        Commands::Ping => {
            let client = BridgeClient::new(&config.bridge);
            if client.ping() {
                println!("✓ Recognition engine is up at {:?}", client.socket_path());
            } else {
                println!("✗ No answer from {:?}", client.socket_path());
                std::process::exit(1);
            }
        }
        Commands::CheckConfig => {
            println!("Config OK");
            println!("  Engine socket: {:?}", config.bridge.socket_path);
            println!("  Data dir:      {:?}", data_dir);
            println!("  Templates:     {:?}", paths::templates_dir(&data_dir));
            println!("  Key file:      {:?}", paths::key_file(&config, &data_dir));
            println!("  Match policy:  {:?}", config.auth.match_policy);
            println!("  Threshold:     {}", config.auth.similarity_threshold);
        }
        Commands::ResetLockout => {
            LockoutFile::new(paths::lockout_file(&data_dir)).clear()?;
            println!("Lockout cleared");
        }
    }

    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = explicit.map(Path::to_path_buf).unwrap_or_else(paths::default_config_file);
    if explicit.is_none() && !path.exists() {
        tracing::debug!("No config at {:?}, using defaults", path);
        return Ok(Config::default());
    }
    Config::load_from_path(&path).with_context(|| format!("Failed to load config {:?}", path))
}

fn open_templates(config: &Config, data_dir: &Path) -> Result<ProtectedTemplates<FileTemplateStore>> {
    let key = MasterKey::load_or_create(&paths::key_file(config, data_dir))?;
    let store = FileTemplateStore::new(paths::templates_dir(data_dir))?;
    Ok(ProtectedTemplates::new(store, TemplateProtector::new(key)))
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    }
}
