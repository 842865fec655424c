use std::path::Path;

use crate::commands::{migrated_pool, prepare, CommandFailure, CommandResult};

/// Startup preflight: configuration, database, migrations and the drafts
/// directory must all be usable before `steps-server` is launched.
pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("start") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        pool.close().await;
        ensure_drafts_directory(&config.drafts.directory).await
    });

    match result {
        Ok(()) => CommandResult::success(
            "start",
            format!(
                "preflight passed; steps-server will listen on {} (api auth {})",
                config.listen_address(),
                if config.auth.is_enabled() { "enabled" } else { "disabled" }
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("start", error_class, message, exit_code)
        }
    }
}

async fn ensure_drafts_directory(directory: &Path) -> Result<(), CommandFailure> {
    let failure = |error: std::io::Error| {
        ("drafts_directory", format!("drafts directory `{}`: {error}", directory.display()), 7u8)
    };
    tokio::fs::create_dir_all(directory).await.map_err(failure)?;

    let probe = directory.join(".steps-preflight");
    tokio::fs::write(&probe, b"ok").await.map_err(failure)?;
    tokio::fs::remove_file(&probe).await.map_err(failure)
}
