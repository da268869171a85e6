//! Stores command

use anyhow::Result;
use cfgsync_core::FileType;
use cfgsync_stores::{Store, StoreRegistry};
use tabled::{settings::Style as TableStyle, Table, Tabled};

use super::GlobalArgs;
use crate::output;

#[derive(Tabled)]
struct StoreRow {
    #[tabled(rename = "NAME")]
    name: &'static str,
    #[tabled(rename = "FILE TYPES")]
    file_types: String,
    #[tabled(rename = "DESCRIPTION")]
    description: &'static str,
}

fn rows(registry: &StoreRegistry) -> Vec<StoreRow> {
    registry
        .get()
        .values()
        .map(|store| StoreRow {
            name: store.name(),
            file_types: supported_types(store.as_ref()),
            description: store.description(),
        })
        .collect()
}

fn supported_types(store: &dyn Store) -> String {
    [FileType::Env, FileType::Json, FileType::Generic]
        .into_iter()
        .filter(|t| store.supports_file_type(*t))
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run(global: &GlobalArgs) -> Result<()> {
    let settings = global.load_settings()?;
    let registry = StoreRegistry::with_defaults(&settings)?;

    output::header("Available stores");
    println!(
        "{}",
        Table::new(rows(&registry)).with(TableStyle::rounded())
    );
    output::kv("default", &settings.default_store);
    Ok(())
}
