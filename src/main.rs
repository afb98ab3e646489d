//! # Vocab Pager CLI (`vocab`)
//!
//! ## Usage
//!
//! ```bash
//! vocab --config ./config/vocab.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vocab init` | Create the SQLite schema or the Qdrant collections |
//! | `vocab list <collection>` | Print one page of a collection |
//! | `vocab import <collection> <file>` | Bulk-load a JSON array of items |
//! | `vocab serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Words sorted by English gloss, second page of 20
//! vocab list words --sort-by english --page 2 --per-page 20
//!
//! # Only Salish words, newest first, as JSON
//! vocab list words --filter language=salish --sort-by created_at --order desc --json
//!
//! # Words in group 3
//! vocab list groups --parent-id 3
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use vocab_pager::{backend, config, import, list, server, telemetry, ListParams};

/// Vocab Pager CLI: paginated vocabulary listing over SQLite and Qdrant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/vocab.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "vocab",
    about = "Paginated, filterable vocabulary listing over SQLite and Qdrant",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vocab.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the configured backend.
    ///
    /// SQLite: creates the database file, tables, and the group_words view.
    /// Qdrant: creates missing collections and keyword payload indexes.
    /// Idempotent.
    Init,

    /// Print one page of a collection.
    List {
        /// Collection name (e.g. `words`, `groups`).
        collection: String,

        /// List the collection's sub-view scoped to this parent id
        /// (e.g. `groups --parent-id 3` lists the words of group 3).
        #[arg(long)]
        parent_id: Option<String>,

        /// 1-based page number.
        #[arg(long)]
        page: Option<i64>,

        /// Items per page.
        #[arg(long)]
        per_page: Option<i64>,

        /// Field to sort by; must be sortable for the collection.
        #[arg(long)]
        sort_by: Option<String>,

        /// `asc` or `desc`.
        #[arg(long)]
        order: Option<String>,

        /// Equality filter as `field=value`. Repeatable.
        #[arg(long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,

        /// Print the page envelope as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Insert every object of a JSON array file into a collection.
    Import {
        /// Target collection.
        collection: String,
        /// Path to a JSON file containing an array of objects.
        file: PathBuf,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

/// Parse a `key=value` pair for `--filter` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    telemetry::init_tracing(&cfg.log);

    match cli.command {
        Commands::Init => {
            backend::init_storage(&cfg).await?;
        }
        Commands::List {
            collection,
            parent_id,
            page,
            per_page,
            sort_by,
            order,
            filters,
            json,
        } => {
            let params = ListParams {
                page,
                per_page,
                sort_by,
                order,
                filters: filters.into_iter().collect(),
            };
            list::run_list(&cfg, &collection, parent_id.as_deref(), params, json).await?;
        }
        Commands::Import { collection, file } => {
            import::run_import(&cfg, &collection, &file).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
