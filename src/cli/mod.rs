//! CLI argument parsing for synclock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! Implementations live in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// synclock: named locks shared by processes through a KV table or a shared filesystem.
///
/// All processes coordinating on the same locks must use the same state root.
#[derive(Parser, Debug)]
#[command(name = "synclock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// State root shared by all cooperating processes (default: $SYNCLOCK_HOME or ./.synclock).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for synclock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the state root and write a default config if none exists.
    Init,

    /// Acquire a lock and print its owner token.
    ///
    /// Without --wait, makes one attempt and exits with code 4 if the lock
    /// is held. With --wait, polls until the lock is taken.
    Acquire(AcquireArgs),

    /// Release a lock held by the given token.
    ///
    /// A token that no longer holds the lock is reported and ignored.
    Release(ReleaseArgs),

    /// Show holder, age, and staleness of one or more locks.
    Status(StatusArgs),

    /// Delete a lock record if its holder is stale.
    Reclaim(ReclaimArgs),

    /// Inspect or change the storage backend selection.
    Backend(BackendCommand),
}

/// Arguments for the `acquire` command.
#[derive(Parser, Debug)]
pub struct AcquireArgs {
    /// Logical lock key (e.g., rebuild).
    pub key: String,

    /// Block until the lock is acquired.
    #[arg(long)]
    pub wait: bool,
}

/// Arguments for the `release` command.
#[derive(Parser, Debug)]
pub struct ReleaseArgs {
    /// Logical lock key.
    pub key: String,

    /// Owner token printed by `acquire`.
    pub token: String,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Logical lock keys to inspect.
    #[arg(required = true)]
    pub keys: Vec<String>,
}

/// Arguments for the `reclaim` command.
#[derive(Parser, Debug)]
pub struct ReclaimArgs {
    /// Logical lock key.
    pub key: String,
}

/// Backend subcommands.
#[derive(Parser, Debug)]
pub struct BackendCommand {
    #[command(subcommand)]
    pub action: Option<BackendAction>,
}

/// Available backend actions.
#[derive(Subcommand, Debug)]
pub enum BackendAction {
    /// Show the active backend and which markers exist (default).
    Show,

    /// Permanently switch this deployment to the filesystem backend.
    ForceFile,

    /// Delete both backend markers so the next process re-runs the self-test.
    Reset,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["synclock", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init));
        assert!(cli.root.is_none());
    }

    #[test]
    fn parse_acquire_wait_with_root() {
        let cli =
            Cli::try_parse_from(["synclock", "acquire", "rebuild", "--wait", "--root", "/srv/l"])
                .unwrap();
        assert_eq!(cli.root, Some(PathBuf::from("/srv/l")));
        if let Command::Acquire(args) = cli.command {
            assert_eq!(args.key, "rebuild");
            assert!(args.wait);
        } else {
            panic!("Expected Acquire command");
        }
    }

    #[test]
    fn parse_release() {
        let cli = Cli::try_parse_from(["synclock", "release", "rebuild", "1.0_rebuild_ab"]).unwrap();
        if let Command::Release(args) = cli.command {
            assert_eq!(args.key, "rebuild");
            assert_eq!(args.token, "1.0_rebuild_ab");
        } else {
            panic!("Expected Release command");
        }
    }

    #[test]
    fn parse_status_requires_key() {
        assert!(Cli::try_parse_from(["synclock", "status"]).is_err());
        let cli = Cli::try_parse_from(["synclock", "status", "a", "b"]).unwrap();
        if let Command::Status(args) = cli.command {
            assert_eq!(args.keys, vec!["a", "b"]);
        } else {
            panic!("Expected Status command");
        }
    }

    #[test]
    fn parse_backend_actions() {
        let cli = Cli::try_parse_from(["synclock", "backend"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Backend(BackendCommand { action: None })
        ));

        let cli = Cli::try_parse_from(["synclock", "backend", "force-file"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Backend(BackendCommand {
                action: Some(BackendAction::ForceFile)
            })
        ));
    }
}
