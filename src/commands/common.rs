//! Shared setup for the CLI commands: logging, configuration, and the
//! orchestration plumbing every command needs.

use clap::Args;
use clap::ValueEnum;
use directories::BaseDirs;
use ohno::IntoAppError;
use okh_krawler::Result;
use okh_krawler::config::Config;
use okh_krawler::fetch::{CancelFlag, CheckpointStore, FetchListener, FetcherFactory, FileCheckpointStore, Orchestrator};
use okh_krawler::model::HostingPlatform;
use okh_krawler::store::WorkdirSink;
use std::path::PathBuf;
use std::sync::Arc;

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages
    Info,
    /// Debug and above messages
    Debug,
    /// All messages including trace
    Trace,
}

/// Common arguments shared between the fetch and crawl commands
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Path to configuration file
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory where fetch results are stored
    #[arg(long, value_name = "PATH", default_value = "workdir")]
    pub workdir: PathBuf,

    /// Directory where crawl progress is checkpointed [default: platform cache dir]
    #[arg(long, value_name = "PATH")]
    pub state_dir: Option<PathBuf>,

    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN")]
    pub github_token: Option<String>,

    /// OSHWA certification API token
    #[arg(long, value_name = "TOKEN", env = "OSHWA_TOKEN")]
    pub oshwa_token: Option<String>,

    /// Thingiverse API token
    #[arg(long, value_name = "TOKEN", env = "THINGIVERSE_TOKEN")]
    pub thingiverse_token: Option<String>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    pub log_level: LogLevel,
}

pub struct Common {
    pub config: Config,
    pub workdir: PathBuf,
    pub state_dir: PathBuf,
}

impl Common {
    /// Initialize logging, load the configuration and resolve directories.
    pub fn new(args: &CommonArgs) -> Result<Self> {
        Self::init_logging(args.log_level);

        let mut config = Config::load(args.config.as_deref())?;

        // tokens given on the command line (or via environment) win over the file
        if let Some(token) = &args.github_token {
            config.github.access_token = Some(token.clone());
        }
        if let Some(token) = &args.oshwa_token {
            config.oshwa.access_token = Some(token.clone());
        }
        if let Some(token) = &args.thingiverse_token {
            config.thingiverse.access_token = Some(token.clone());
        }

        let state_dir = if let Some(dir) = &args.state_dir {
            dir.clone()
        } else {
            BaseDirs::new()
                .into_app_err("failed to determine the state directory")?
                .cache_dir()
                .join("okh-krawler")
        };

        Ok(Self {
            config,
            workdir: args.workdir.clone(),
            state_dir,
        })
    }

    /// Initialize logger based on log level
    fn init_logging(log_level: LogLevel) {
        if log_level == LogLevel::None {
            return;
        }

        let level = match log_level {
            LogLevel::None => return, // Already checked above, but being explicit
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        let env = env_logger::Env::default().filter_or("RUST_LOG", level);

        env_logger::Builder::from_env(env)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(matches!(log_level, LogLevel::Debug) || matches!(log_level, LogLevel::Trace))
            .init();
    }

    /// An orchestrator wired to the file-backed checkpoint store and the
    /// workdir sink.
    pub fn orchestrator(&self, cancel: CancelFlag) -> Orchestrator {
        let store = Arc::new(FileCheckpointStore::new(&self.state_dir)) as Arc<dyn CheckpointStore>;
        let sink = Arc::new(WorkdirSink::new(&self.workdir)) as Arc<dyn FetchListener>;
        Orchestrator::new(store, self.config.crawl.retry_policy())
            .with_listener(sink)
            .with_cancel_flag(cancel)
    }

    pub fn factory(&self, enabled: &[HostingPlatform]) -> Result<FetcherFactory> {
        FetcherFactory::new(&self.config, enabled)
    }
}
