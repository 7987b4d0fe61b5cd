use anyhow::Context;
use backend_pipeline::config::{PipelineConfig, ProcessEnv, Requirements};
use backend_pipeline::notify::{GitHubDispatcher, Notifier};
use backend_pipeline::publish::{self, ChecksumSource, ServiceSource};
use backend_pipeline::storage::{BlobStore, ChecksumPointerStore, PointerKind, StorageFactory};
use backend_pipeline::subprocess::TokioProcessRunner;
use backend_pipeline::{Checksum, PipelineError, ServiceId};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, trace};
use tracing_subscriber::EnvFilter;

/// Build, publish and deploy backend services only when their sources change
#[derive(Parser)]
#[command(name = "backend-pipeline", version)]
#[command(about = "Checksum-gated build and deploy stages for backend services", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where the service lives and what its checksum leaves out.
///
/// Shared by every stage that compares against the `last` pointer, so they
/// always hash the same file set.
#[derive(Args, Debug)]
struct SourceArgs {
    /// Repository root; the service directory is <root>/<service>
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Extra glob left out of the checksum (repeatable)
    #[arg(long = "exclude")]
    excludes: Vec<String>,
}

impl SourceArgs {
    fn into_source(self, service: ServiceId) -> ServiceSource {
        ServiceSource::new(self.root, service).with_excludes(self.excludes)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare the service checksum with the last build and request a build if it changed
    Hash {
        /// Service directory relative to the root, e.g. backend/echo
        #[arg(long)]
        service: ServiceId,

        /// Commit that triggered the run
        #[arg(long)]
        commit_sha: String,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Package and upload the service if it changed, then request a deployment
    Build {
        #[arg(long, env = "SERVICE")]
        service: ServiceId,

        /// Environment the new artifact is deployed to
        #[arg(long, default_value = "dev")]
        env: String,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Request a deployment of an already built artifact
    TriggerDeploy {
        #[arg(long)]
        service: ServiceId,

        #[arg(long)]
        env: String,

        /// Defaults to the last built checksum
        #[arg(long)]
        checksum: Option<Checksum>,
    },
    /// Download an artifact, run the deployment tool and record it as live
    Deploy {
        #[arg(long, env = "SERVICE")]
        service: ServiceId,

        #[arg(long, env = "ENV")]
        env: String,

        #[arg(long, env = "CHECKSUM")]
        checksum: Checksum,

        /// Unpack here instead of a temporary directory (must be empty)
        #[arg(long)]
        dist_dir: Option<PathBuf>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Hash { .. } => "hash",
            Commands::Build { .. } => "build",
            Commands::TriggerDeploy { .. } => "trigger-deploy",
            Commands::Deploy { .. } => "deploy",
        }
    }

    fn requirements(&self) -> Requirements {
        match self {
            Commands::Hash { .. } | Commands::Build { .. } => {
                Requirements::default().storage().github()
            }
            Commands::TriggerDeploy { checksum: None, .. } => {
                Requirements::default().storage().github()
            }
            Commands::TriggerDeploy { .. } => Requirements::default().github(),
            Commands::Deploy { .. } => Requirements::default().storage(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        2 => EnvFilter::new("trace"),
        _ => EnvFilter::new("trace,hyper=debug,tower=debug"), // -vvv shows everything including dependencies
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2) // Show target module for -vv and above
        .with_thread_ids(cli.verbose >= 3) // Show thread IDs for -vvv
        .with_line_number(cli.verbose >= 3) // Show line numbers for -vvv
        .init();

    debug!("backend-pipeline started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli.command).await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let stage = command.name();
    let config = PipelineConfig::load(&ProcessEnv, command.requirements())
        .map_err(PipelineError::from)
        .with_context(|| format!("{} stage is not configured", stage))?;

    if let Some(github) = &config.github {
        info!(
            "Stage {} for {} (workflow: {}, run: {})",
            stage,
            github.repository,
            github.workflow.as_deref().unwrap_or("-"),
            github.run_id.as_deref().unwrap_or("-")
        );
    }

    run_stage(command, &config).await.map_err(|e| {
        let kind = e.kind();
        anyhow::Error::new(e).context(format!("{} stage failed ({})", stage, kind))
    })
}

async fn open_store(config: &PipelineConfig) -> Result<Arc<dyn BlobStore>, PipelineError> {
    Ok(StorageFactory::from_config(config.storage()?).await?)
}

fn dispatcher(config: &PipelineConfig) -> Result<Arc<dyn Notifier>, PipelineError> {
    Ok(Arc::new(GitHubDispatcher::new(config.github()?, &config.runtime)?))
}

async fn run_stage(command: Commands, config: &PipelineConfig) -> Result<(), PipelineError> {
    match command {
        Commands::Hash {
            service,
            commit_sha,
            source,
        } => {
            let notifier = dispatcher(config)?;
            let store = open_store(config).await?;
            let source = source.into_source(service);
            let outcome = publish::hash_stage(&source, &commit_sha, store, notifier.as_ref()).await?;
            info!("{} ({})", outcome.decision, outcome.checksum);
        }
        Commands::Build {
            service,
            env,
            source,
        } => {
            let notifier = dispatcher(config)?;
            let store = open_store(config).await?;
            let source = source.into_source(service);
            let outcome = publish::build_stage(&source, &env, store, notifier).await?;
            if let Some(report) = outcome.report {
                info!(
                    "Published {} ({} bytes) and dispatched '{}'",
                    report.artifact_key, report.archive_size, report.event_type
                );
            }
        }
        Commands::TriggerDeploy {
            service,
            env,
            checksum,
        } => {
            let notifier = dispatcher(config)?;
            let source = match checksum {
                Some(checksum) => ChecksumSource::Explicit(checksum),
                None => ChecksumSource::LastPointer(ChecksumPointerStore::new(
                    open_store(config).await?,
                    &service,
                    PointerKind::Last,
                )),
            };
            publish::trigger_deploy_stage(&service, &env, &source, notifier.as_ref()).await?;
        }
        Commands::Deploy {
            service,
            env,
            checksum,
            dist_dir,
        } => {
            let store = open_store(config).await?;
            let report = publish::deploy_stage(
                &service,
                &env,
                &checksum,
                dist_dir.as_deref(),
                store,
                Arc::new(TokioProcessRunner),
                &config.runtime,
            )
            .await?;
            info!("Deployed {} to {}", report.checksum, report.env);
        }
    }
    Ok(())
}
