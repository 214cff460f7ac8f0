use std::sync::Arc;

use anyhow::Context;
use bookshelf_app::{bootstrap, BookReviews, SortOrder};
use bookshelf_db::{InMemoryTable, TableBackend};
use bookshelf_kernel::settings::Settings;
use clap::{Parser, Subcommand};

/// Book review service backed by an Airtable table.
#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Override `server.host`
        #[arg(long)]
        host: Option<String>,
        /// Override `server.port`
        #[arg(long)]
        port: Option<u16>,
        /// Serve from an empty in-memory table instead of Airtable
        #[arg(long)]
        in_memory: bool,
    },
    /// Print book reviews as JSON
    List {
        /// Maximum number of records
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        count: Option<u32>,
        /// ASC or DESC by rating
        #[arg(long)]
        sort: Option<String>,
    },
    /// Set the rating of the review for a book
    Rate {
        /// Exact book title
        #[arg(long)]
        book: String,
        /// New rating, whole or fractional
        #[arg(long, allow_negative_numbers = true)]
        rating: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;
    bookshelf_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve {
            host,
            port,
            in_memory,
        } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }

            let table: Arc<dyn TableBackend> = if in_memory {
                tracing::warn!("serving from an in-memory table; records are not persisted");
                Arc::new(InMemoryTable::new())
            } else {
                bootstrap::airtable_table(&settings)?
            };
            bootstrap::serve(&settings, table).await
        }
        Command::List { count, sort } => {
            let reviews = BookReviews::new(bootstrap::airtable_table(&settings)?);
            let sort = sort.as_deref().and_then(SortOrder::parse);
            let books = reviews
                .list(count, sort)
                .await
                .context("failed to list book reviews")?;

            println!("{}", serde_json::to_string_pretty(&books)?);
            Ok(())
        }
        Command::Rate { book, rating } => {
            let rating = rating_value(rating)?;
            let reviews = BookReviews::new(bootstrap::airtable_table(&settings)?);
            let record = reviews
                .set_rating(&book, rating.clone())
                .await
                .with_context(|| format!("failed to rate '{}'", book))?;

            tracing::info!(record_id = %record.id, book = %book, rating = %rating, "rating updated");
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
    }
}

/// JSON number for a rating; whole values stay integers.
fn rating_value(rating: f64) -> anyhow::Result<serde_json::Number> {
    if rating.fract() == 0.0 && rating.abs() < i64::MAX as f64 {
        return Ok(serde_json::Number::from(rating as i64));
    }
    serde_json::Number::from_f64(rating)
        .with_context(|| format!("rating must be a finite number, got {}", rating))
}
