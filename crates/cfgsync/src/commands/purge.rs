//! Purge command

use anyhow::{anyhow, Result};
use cfgsync_core::UserOptions;
use dialoguer::Confirm;

use super::{finish, target_paths, GlobalArgs, Workspace};
use crate::cli::PurgeArgs;
use crate::output;

pub async fn run(args: PurgeArgs, global: &GlobalArgs) -> Result<()> {
    let mut ws = Workspace::open(global, false)?;

    let paths = target_paths(&ws.catalog, &args.paths);
    if paths.is_empty() {
        output::info("No tracked files");
        return Ok(());
    }

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete remote content for {} file(s)? This cannot be undone",
                paths.len()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            output::info("Cancelled");
            return Ok(());
        }
    }

    let options = UserOptions::default();
    let (mut purged, mut failed) = (0, 0);
    for path in &paths {
        match purge_file(&mut ws, path, &options).await {
            Ok(()) => {
                purged += 1;
                ws.save()?;
            }
            Err(e) => {
                failed += 1;
                output::error(&format!("{}: {:#}", path, e));
            }
        }
    }

    finish("Purged", purged, failed)
}

async fn purge_file(ws: &mut Workspace, path: &str, options: &UserOptions) -> Result<()> {
    let mut file = ws
        .catalog
        .file(path)
        .cloned()
        .ok_or_else(|| anyhow!("not tracked in {}", ws.catalog_path.display()))?;
    let context_key = ws.catalog.context_key(path);

    let store = ws
        .registry
        .select(&mut file, &ws.catalog, &ws.vault, options, &ws.prompt)
        .await?;

    let spinner = output::spinner(&format!("Purging {} from {}...", path, store.name()));
    let result = store.purge(&context_key, &file).await;
    spinner.finish_and_clear();
    result?;

    ws.catalog.remove_file(path);
    output::success(&format!("Purged {} from {}", path, file.store));
    Ok(())
}
