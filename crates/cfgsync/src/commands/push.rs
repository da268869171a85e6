//! Push command

use anyhow::{anyhow, Context, Result};
use cfgsync_core::UserOptions;
use tracing::{debug, warn};

use super::{finish, target_paths, GlobalArgs, Workspace};
use crate::cli::PushArgs;
use crate::output;

pub async fn run(args: PushArgs, global: &GlobalArgs) -> Result<()> {
    let mut ws = Workspace::open(global, true)?;
    let options = UserOptions {
        prompt: !args.no_prompt,
        store: args.store.clone(),
        version: args.version.clone(),
    };

    let paths = target_paths(&ws.catalog, &args.paths);
    if paths.is_empty() {
        output::info("Nothing to push; name the files to start tracking");
        return Ok(());
    }

    let (mut pushed, mut failed) = (0, 0);
    for path in &paths {
        match push_file(&mut ws, path, &options).await {
            Ok(()) => {
                pushed += 1;
                // Keep bindings made so far even if a later file fails
                ws.save()?;
            }
            Err(e) => {
                failed += 1;
                output::error(&format!("{}: {:#}", path, e));
            }
        }
    }

    finish("Pushed", pushed, failed)
}

async fn push_file(ws: &mut Workspace, path: &str, options: &UserOptions) -> Result<()> {
    let local = ws.root().join(path);
    let contents =
        std::fs::read(&local).with_context(|| format!("Failed to read {}", local.display()))?;

    let mut file = ws
        .catalog
        .file(path)
        .cloned()
        .unwrap_or_else(|| cfgsync_core::File::new(path));
    let context_key = ws.catalog.context_key(path);

    let store = ws
        .registry
        .select(&mut file, &ws.catalog, &ws.vault, options, &ws.prompt)
        .await?;

    if !store.can_handle_file(&file) {
        return Err(anyhow!(
            "store {} cannot hold {} files",
            store.name(),
            file.file_type
        ));
    }

    let spinner = output::spinner(&format!("Pushing {} to {}...", path, store.name()));
    let result = store.push(&context_key, &file, &contents).await;
    spinner.finish_and_clear();
    let outcome = result?;

    file.data = outcome.data;
    match options.version.as_deref() {
        Some(version) if outcome.versioned => file.add_version(version),
        Some(version) => warn!(
            "Store {} does not keep versions; ignoring version {}",
            store.name(),
            version
        ),
        None => {}
    }

    debug!("Pushed {} ({} data entries)", path, file.data.len());
    output::success(&format!("Pushed {} to {}", path, file.store));
    ws.catalog.upsert(file);
    Ok(())
}
