use clap::{Args, Parser, Subcommand, ValueEnum};
use jarlock_core::BackendKind;
use jarlock_core::config::CONFIG_FILE_NAME;
use jarlock_core::lockfile::LOCKFILE_NAME;
use std::path::PathBuf;

use crate::tracing::{LogLevel, TracingFormat};

#[derive(Parser, Debug)]
#[command(name = "jarlock")]
#[command(about = "Resolve Maven artifacts into a reproducible lockfile")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Diagnostic log format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    #[arg(
        long,
        short = 'c',
        global = true,
        env = "JARLOCK_CONFIG",
        help = "Path to the resolver configuration",
        default_value = CONFIG_FILE_NAME
    )]
    pub config: PathBuf,

    #[arg(
        long,
        global = true,
        help = "Path to the lockfile",
        default_value = LOCKFILE_NAME
    )]
    pub lockfile: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Resolve the configured artifacts and write the lockfile")]
    Resolve {
        #[command(flatten)]
        args: ResolveArgs,
        #[arg(long, help = "Ignore checksums recorded in the existing lockfile")]
        repin: bool,
    },
    #[command(about = "Check that re-resolving reproduces the lockfile exactly")]
    Verify {
        #[command(flatten)]
        args: ResolveArgs,
    },
    #[command(about = "Print the cached location of a locked artifact")]
    PrintPath {
        #[arg(help = "Artifact key, group:artifact")]
        key: String,
    },
}

/// Flags that override configuration values for a resolution.
#[derive(Args, Debug, Clone, Default)]
pub struct ResolveArgs {
    #[arg(long, short = 'j', help = "Maximum concurrent network operations")]
    pub threads: Option<usize>,
    #[arg(long, value_enum, help = "Resolution backend")]
    pub backend: Option<BackendArg>,
    #[arg(long, short = 'v', help = "Show detailed log events")]
    pub verbose: bool,
    #[arg(long, help = "Line-oriented progress output")]
    pub plain: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Maven,
    Gradle,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Maven => Self::Maven,
            BackendArg::Gradle => Self::Gradle,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
