//! List command

use anyhow::Result;
use cfgsync_core::{Catalog, File};
use tabled::{settings::Style as TableStyle, Table, Tabled};

use super::GlobalArgs;
use crate::output;

#[derive(Tabled)]
struct FileRow {
    #[tabled(rename = "PATH")]
    path: String,
    #[tabled(rename = "STORE")]
    store: String,
    #[tabled(rename = "TYPE")]
    file_type: String,
    #[tabled(rename = "VERSIONS")]
    versions: String,
}

impl From<&File> for FileRow {
    fn from(file: &File) -> Self {
        Self {
            path: file.path.clone(),
            store: if file.is_bound() {
                file.store.clone()
            } else {
                "-".to_string()
            },
            file_type: file.file_type.to_string(),
            versions: if file.versions.is_empty() {
                "-".to_string()
            } else {
                file.versions.join(", ")
            },
        }
    }
}

fn rows(catalog: &Catalog) -> Vec<FileRow> {
    catalog.files.values().map(FileRow::from).collect()
}

pub fn run(global: &GlobalArgs) -> Result<()> {
    let settings = global.load_settings()?;
    let path = global.catalog_path(&settings);
    let catalog = Catalog::read(&path)?;

    output::header(&format!("Tracked files ({})", path.display()));
    output::kv("context", &catalog.context);

    if catalog.files.is_empty() {
        output::info("No tracked files");
        return Ok(());
    }

    println!("{}", Table::new(rows(&catalog)).with(TableStyle::rounded()));
    Ok(())
}
