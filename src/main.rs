use anyhow::Context;
use bookshelf_app::bootstrap;
use bookshelf_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;
    bookshelf_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        table = %settings.airtable.table_id,
        "bookshelf-app bootstrap starting"
    );

    let table = bootstrap::airtable_table(&settings)?;
    bootstrap::serve(&settings, table).await
}
