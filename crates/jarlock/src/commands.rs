//! Command implementations: configuration → resolver → lockfile.

use jarlock_core::{Lockfile, Netrc, ResolverConfig};
use jarlock_events::{EventBus, EventSender, Listener, PlainListener, RichListener};
use jarlock_resolver::Resolver;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::cli::ResolveArgs;
use crate::errors::{CliError, Result};

/// Load the configuration file and apply command-line overrides.
fn load_config(path: &Path, args: &ResolveArgs) -> Result<ResolverConfig> {
    if !path.exists() {
        return Err(CliError::ConfigMissing {
            path: path.to_path_buf(),
        });
    }
    let mut config = ResolverConfig::load(path)?;
    if let Some(threads) = args.threads {
        config.max_threads = threads;
    }
    if let Some(backend) = args.backend {
        config.backend = backend.into();
    }
    config.verbose |= args.verbose;
    config.validate()?;
    debug!(
        backend = %config.backend,
        max_threads = config.effective_max_threads(),
        artifacts = config.artifacts.len(),
        "Configuration loaded"
    );
    Ok(config)
}

fn listener(plain: bool) -> Arc<dyn Listener> {
    if plain || !std::io::stderr().is_terminal() {
        Arc::new(PlainListener::stderr())
    } else {
        Arc::new(RichListener::stderr())
    }
}

/// A resolver wired to a progress display.
struct Session {
    bus: EventBus,
    resolver: Resolver,
}

impl Session {
    async fn start(config: &ResolverConfig, plain: bool) -> Result<Self> {
        let bus = EventBus::with_verbosity(listener(plain), config.verbose);
        let events = bus.sender().unwrap_or_else(EventSender::noop);
        match Resolver::from_config(config, events, Arc::new(Netrc::from_user_file())) {
            Ok(resolver) => Ok(Self { bus, resolver }),
            Err(e) => {
                bus.shutdown().await;
                Err(e.into())
            }
        }
    }

    /// Resolve, then flush the display whatever the outcome.
    async fn lock(self, previous: Option<&Lockfile>) -> Result<Lockfile> {
        let outcome = self.resolver.lock(previous).await;
        self.bus.shutdown().await;
        Ok(outcome?)
    }
}

/// `jarlock resolve`
#[instrument(skip(args))]
pub async fn resolve(
    config_path: &Path,
    lockfile_path: &Path,
    args: &ResolveArgs,
    repin: bool,
) -> Result<()> {
    let config = load_config(config_path, args)?;
    let previous = if repin {
        None
    } else {
        Lockfile::load(lockfile_path)?
    };

    let session = Session::start(&config, args.plain).await?;
    let lockfile = session.lock(previous.as_ref()).await?;
    lockfile.save(lockfile_path)?;

    println!(
        "Locked {} artifacts ({} conflicts) to {}",
        lockfile.dependencies.len(),
        lockfile.conflicts.len(),
        lockfile_path.display()
    );
    Ok(())
}

/// `jarlock verify`
#[instrument(skip(args))]
pub async fn verify(config_path: &Path, lockfile_path: &Path, args: &ResolveArgs) -> Result<()> {
    let config = load_config(config_path, args)?;
    let Some(previous) = Lockfile::load(lockfile_path)? else {
        return Err(CliError::LockfileMissing {
            path: lockfile_path.to_path_buf(),
        });
    };

    let session = Session::start(&config, args.plain).await?;
    let lockfile = session.lock(Some(&previous)).await?;
    if !lockfile.verify_reproducible(lockfile_path)? {
        return Err(CliError::Stale {
            path: lockfile_path.to_path_buf(),
        });
    }

    println!("{} is up to date", lockfile_path.display());
    Ok(())
}

/// `jarlock print-path`
#[instrument]
pub fn print_path(config_path: &Path, lockfile_path: &Path, key: &str) -> Result<()> {
    let config = load_config(config_path, &ResolveArgs::default())?;
    let Some(lockfile) = Lockfile::load(lockfile_path)? else {
        return Err(CliError::LockfileMissing {
            path: lockfile_path.to_path_buf(),
        });
    };
    let info = lockfile.find(key).ok_or_else(|| CliError::NotLocked {
        key: key.to_string(),
    })?;

    let resolver = Resolver::from_config(&config, EventSender::noop(), Arc::new(Netrc::empty()))?;
    let path = resolver
        .cached_path(info)?
        .ok_or_else(|| CliError::NoPayload {
            key: key.to_string(),
        })?;
    println!("{}", path.display());
    Ok(())
}
