//! Provision the owned tables in the configured database, then list what the file contains.
//!
//! Run from repo root: `cargo run -p geodb-provisioner`
//! Settings come from `GEODB_*` variables or a `.env` file (see `StoreSettings::load`).

use geodb_lotes::{LotesStore, ProvisionOutcome};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("geodb_lotes=info,geodb_provisioner=info")),
        )
        .init();

    let store = LotesStore::from_env()?;
    tracing::info!(
        path = %store.settings().db_path.display(),
        drivers = ?store.settings().drivers,
        "provisioning"
    );

    for (kind, outcome) in store.ensure_all().await? {
        match outcome {
            ProvisionOutcome::Created => tracing::info!(table = %kind, "created"),
            ProvisionOutcome::AlreadyPresent => tracing::info!(table = %kind, "already present"),
        }
    }

    for table in store.tables().await? {
        let columns = store.columns(&table).await?;
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        tracing::info!(table = %table, columns = ?names, "table");
    }
    Ok(())
}
