//! Wiring from settings to a running server.

use std::sync::Arc;

use anyhow::Context;
use bookshelf_db::{AirtableConfig, AirtableTable, TableBackend};
use bookshelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules;
use crate::modules::books::store::BookReviews;

/// Airtable client for the configured book review table.
pub fn airtable_table(settings: &Settings) -> anyhow::Result<Arc<dyn TableBackend>> {
    let airtable = &settings.airtable;
    let config = AirtableConfig {
        api_url: airtable.api_url.clone(),
        base_id: airtable.base_id.clone(),
        table_id: airtable.table_id.clone(),
        token: airtable.require_token()?.to_string(),
        timeout_ms: airtable.timeout_ms,
    };

    let table = AirtableTable::new(&config).context("failed to create Airtable client")?;
    Ok(Arc::new(table))
}

/// Registry with every application module, backed by `table`.
pub fn build_registry(table: Arc<dyn TableBackend>) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, BookReviews::new(table))?;
    Ok(registry)
}

/// Run the module lifecycle around the HTTP server until shutdown.
pub async fn serve(settings: &Settings, table: Arc<dyn TableBackend>) -> anyhow::Result<()> {
    let registry = build_registry(table)?;
    let ctx = InitCtx { settings };

    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    let served = bookshelf_http::start_server(&registry, settings).await;
    registry.stop_all().await?;
    served
}
