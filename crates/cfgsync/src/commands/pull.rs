//! Pull command

use anyhow::{anyhow, Context, Result};
use cfgsync_core::UserOptions;
use chrono::{DateTime, Utc};
use std::path::Path;

use super::{finish, target_paths, GlobalArgs, Workspace};
use crate::cli::PullArgs;
use crate::output;

pub async fn run(args: PullArgs, global: &GlobalArgs) -> Result<()> {
    let mut ws = Workspace::open(global, false)?;
    let options = UserOptions {
        prompt: !args.no_prompt,
        store: None,
        version: args.version.clone(),
    };

    let paths = target_paths(&ws.catalog, &args.paths);
    if paths.is_empty() {
        output::info("No tracked files");
        return Ok(());
    }

    let (mut pulled, mut failed) = (0, 0);
    for path in &paths {
        match pull_file(&mut ws, path, &options).await {
            Ok(()) => pulled += 1,
            Err(e) => {
                failed += 1;
                output::error(&format!("{}: {:#}", path, e));
            }
        }
    }

    // `pre` may have recorded coordinates for files tracked by older catalogs
    ws.save()?;
    finish("Pulled", pulled, failed)
}

async fn pull_file(ws: &mut Workspace, path: &str, options: &UserOptions) -> Result<()> {
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

    let spinner = output::spinner(&format!("Pulling {} from {}...", path, store.name()));
    let result = store.pull(&context_key, &file).await;
    spinner.finish_and_clear();
    let (contents, attrs) = result?;

    let local = ws.root().join(path);
    if let Some(modified) = local_modified(&local) {
        if modified > attrs.last_modified {
            output::warning(&format!(
                "{} was modified locally after the last push ({}); overwriting",
                path,
                attrs.last_modified.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
    }

    if let Some(parent) = local.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&local, &contents)
        .with_context(|| format!("Failed to write {}", local.display()))?;

    output::success(&format!("Pulled {} from {}", path, file.store));
    ws.catalog.upsert(file);
    Ok(())
}

fn local_modified(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}
