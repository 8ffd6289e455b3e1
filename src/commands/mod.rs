//! Command implementations for synclock.
//!
//! Each handler resolves the state root, loads the config, and drives the
//! library's `LockService`.

use crate::cli::{
    AcquireArgs, BackendAction, BackendCommand, Cli, Command, ReclaimArgs, ReleaseArgs, StatusArgs,
};
use synclock::config::Config;
use synclock::context::SyncContext;
use synclock::error::{Result, SyncError};
use synclock::lock::LockService;
use synclock::OwnerToken;

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    let ctx = SyncContext::resolve(cli.root.as_deref())?;
    match cli.command {
        Command::Init => cmd_init(&ctx),
        Command::Acquire(args) => cmd_acquire(&ctx, args),
        Command::Release(args) => cmd_release(&ctx, args),
        Command::Status(args) => cmd_status(&ctx, args),
        Command::Reclaim(args) => cmd_reclaim(&ctx, args),
        Command::Backend(args) => cmd_backend(&ctx, args),
    }
}

fn open_service(ctx: &SyncContext) -> Result<LockService> {
    let config = Config::load_or_default(ctx.config_path())?;
    LockService::open(ctx, &config)
}

fn cmd_init(ctx: &SyncContext) -> Result<()> {
    ctx.ensure_dirs()?;
    let config_path = ctx.config_path();
    if config_path.exists() {
        // Validate what is already there rather than overwrite it.
        Config::load(&config_path)?;
        println!("Config already present: {}", config_path.display());
    } else {
        Config::default().save(&config_path)?;
        println!("Wrote default config: {}", config_path.display());
    }
    println!("State root: {}", ctx.root.display());
    Ok(())
}

fn cmd_acquire(ctx: &SyncContext, args: AcquireArgs) -> Result<()> {
    validate_key(&args.key)?;
    let service = open_service(ctx)?;
    let token = if args.wait {
        service.acquire_with_wait(&args.key)
    } else {
        service.try_acquire_or_err(&args.key)?
    };
    println!("{}", token);
    Ok(())
}

fn cmd_release(ctx: &SyncContext, args: ReleaseArgs) -> Result<()> {
    validate_key(&args.key)?;
    let service = open_service(ctx)?;
    let token = OwnerToken::from_raw(args.token);
    if service.release(&token, &args.key) {
        println!("Released {}.", args.key);
    } else {
        println!(
            "Token does not hold {}; nothing released.\n  {}",
            args.key,
            service.lock_status(&args.key)
        );
    }
    Ok(())
}

fn cmd_status(ctx: &SyncContext, args: StatusArgs) -> Result<()> {
    let service = open_service(ctx)?;
    println!(
        "Backend: {} (stale after {:.0}s)",
        service.selector().active(),
        service.staleness_threshold()
    );
    for key in &args.keys {
        validate_key(key)?;
        let status = service.lock_status(key);
        println!("  {}", status);
    }
    Ok(())
}

fn cmd_reclaim(ctx: &SyncContext, args: ReclaimArgs) -> Result<()> {
    validate_key(&args.key)?;
    let service = open_service(ctx)?;
    if service.reclaim_if_stale(&args.key) {
        println!("Reclaimed stale lock {}.", args.key);
    } else {
        println!("Nothing to reclaim: {}", service.lock_status(&args.key));
    }
    Ok(())
}

fn cmd_backend(ctx: &SyncContext, args: BackendCommand) -> Result<()> {
    let service = open_service(ctx)?;
    let selector = service.selector();
    match args.action.unwrap_or(BackendAction::Show) {
        BackendAction::Show => {
            println!("Active backend: {}", selector.active());
        }
        BackendAction::ForceFile => {
            selector.force_switch_to_file_backend();
            println!("Switched to file backend.");
        }
        BackendAction::Reset => {
            selector.reset()?;
            println!("Cleared backend markers; the next process will re-run the self-test.");
        }
    }
    let (kv, file) = selector.markers_present();
    println!(
        "Markers in {}: kv={} file={}",
        ctx.markers_dir.display(),
        kv,
        file
    );
    Ok(())
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(SyncError::User("lock key must not be empty".to_string()));
    }
    if key.contains(['/', '\\']) || key.chars().any(char::is_whitespace) {
        return Err(SyncError::User(format!(
            "invalid lock key '{}': use letters, digits, '-', '_' or '.'",
            key
        )));
    }
    Ok(())
}
