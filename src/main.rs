use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use qfap::config::Config;
use qfap::logging;
use qfap::query::{BoolOperator, Filter, PriceType};
use qfap::repository::{EventRepository, RepositoryCaches};
use qfap::server::{start_server, AppState};
use qfap::storage::{DatasetClient, DocumentStore};

#[derive(Parser)]
#[command(name = "qfap")]
#[command(about = "Search the Que Faire à Paris events dataset")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (defaults to the configured one)
        #[arg(long)]
        port: Option<u16>,
    },
    /// List the next events to come
    Upcoming {
        #[arg(short = 'n', long)]
        count: Option<usize>,
        /// Only events of this exact category, e.g. "Concerts -> Jazz"
        #[arg(long)]
        category: Option<String>,
    },
    /// Show one event
    Event {
        id: String,
        /// Print the event's occurrence timestamps instead
        #[arg(long)]
        occurrences: bool,
    },
    /// Search events
    Search {
        /// Substring looked up in titles and descriptions
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Require every tag instead of any of them
        #[arg(long)]
        all_tags: bool,
        #[arg(long, conflicts_with = "paid")]
        free: bool,
        #[arg(long)]
        paid: bool,
        #[arg(long)]
        pmr: bool,
        #[arg(long)]
        deaf: bool,
        #[arg(long)]
        blind: bool,
        /// Match events satisfying any criterion instead of all of them
        #[arg(long)]
        any: bool,
        /// Maximum number of results, 0 for no limit
        #[arg(long, default_value_t = 0)]
        limit: usize,
    },
    /// Print the category index
    Categories,
    /// Pick random upcoming events of a category
    Random {
        category: String,
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
        /// Seed for a reproducible pick
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_repository(config: &Config) -> anyhow::Result<EventRepository> {
    let storage = &config.settings.storage;
    let client = DatasetClient::connect(&config.server_address)?;
    let collection = client
        .database(&storage.database)?
        .collection(&storage.collection)?;
    let store: Arc<dyn DocumentStore> = Arc::new(collection);

    let cache_dir = &config.settings.cache.dir;
    let caches = RepositoryCaches::open(cache_dir)
        .with_context(|| format!("opening caches in {}", cache_dir.display()))?;
    Ok(EventRepository::new(store, caches))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = logging::init_logging();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let repository = open_repository(&config)?;
    let index = repository.rebuild_caches().await?;
    info!("Caches rebuilt, {} main categories", index.len());

    let upcoming_count = config.settings.server.upcoming_count;
    match cli.command {
        Commands::Serve { port } => {
            let state = AppState {
                repository: Arc::new(repository),
                upcoming_count,
            };
            start_server(state, port.unwrap_or(config.settings.server.port)).await?;
        }
        Commands::Upcoming { count, category } => {
            let n = count.unwrap_or(upcoming_count);
            let events = match category {
                Some(category) => repository.get_upcoming_by_category(n, &category).await?,
                None => repository.get_upcoming(n).await?,
            };
            print_json(&events)?;
        }
        Commands::Event { id, occurrences } => {
            if occurrences {
                print_json(&repository.get_occurrences(&id).await?)?;
            } else {
                print_json(&repository.get_by_id(&id).await?)?;
            }
        }
        Commands::Search {
            text,
            category,
            tags,
            all_tags,
            free,
            paid,
            pmr,
            deaf,
            blind,
            any,
            limit,
        } => {
            let mut builder = Filter::builder().pmr(pmr).deaf(deaf).blind(blind);
            if let Some(text) = text {
                builder = builder.text(text);
            }
            if let Some(category) = category {
                builder = builder.category(category);
            }
            if !tags.is_empty() {
                builder = builder.tags(tags);
            }
            if all_tags {
                builder = builder.tags_operator(BoolOperator::And);
            }
            if free {
                builder = builder.price_type(PriceType::Free);
            } else if paid {
                builder = builder.price_type(PriceType::Paid);
            }
            if any {
                builder = builder.global_operator(BoolOperator::Or);
            }
            print_json(&repository.search(&builder.build(), limit).await?)?;
        }
        Commands::Categories => print_json(&repository.get_all_categories())?,
        Commands::Random {
            category,
            count,
            seed,
        } => {
            let seed = seed.unwrap_or_else(rand::random);
            info!("Random pick with seed {}", seed);
            print_json(
                &repository
                    .get_random_by_category(count, &category, seed)
                    .await?,
            )?;
        }
    }

    Ok(())
}
