mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::Commands;
use embedsync::{
    Container, ContainerConfig, EmbedderKind, JsonRecord, JsonRecordRules, JsonRecordStore,
    QueryOptions,
};
use embedsync::connector::DEFAULT_DATABASE;

#[derive(Parser)]
#[command(name = "embedsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true)]
    chroma_url: Option<String>,

    #[arg(long, global = true, default_value = DEFAULT_DATABASE)]
    database: String,

    /// Keep vectors in process memory; nothing outlives the command
    #[arg(long, global = true)]
    memory_storage: bool,

    #[arg(long, global = true, value_enum, default_value = "http")]
    embedder: EmbedderKind,

    /// Entity type name the default collection name derives from
    #[arg(long, global = true, default_value = "Record")]
    type_name: String,

    #[arg(long, global = true)]
    collection: Option<String>,

    #[arg(long, global = true, default_value = "id")]
    id_field: String,

    #[arg(long, global = true)]
    document_field: Option<String>,

    #[arg(long = "metadata-field", global = true)]
    metadata_fields: Vec<String>,

    /// Store vectors and metadata only
    #[arg(long, global = true)]
    no_keep_document: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn container_config(&self) -> ContainerConfig {
        ContainerConfig {
            chroma_url: self.chroma_url.clone(),
            database: self.database.clone(),
            memory_storage: self.memory_storage,
            embedder: self.embedder,
            rules: JsonRecordRules {
                type_name: self.type_name.clone(),
                collection_name: self.collection.clone(),
                document_field: self.document_field.clone(),
                metadata_fields: self.metadata_fields.clone(),
                keep_document: !self.no_keep_document,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let container = Container::new(cli.container_config()).await?;
    let index = container.index();
    info!("Using collection {}", container.collection_name());

    match cli.command {
        Commands::Sync { file } => {
            let store = JsonRecordStore::open(&file, &cli.id_field)?;
            let synced = index.sync_all(&store.records()).await?;
            println!(
                "Synced {} records into {}",
                synced,
                container.collection_name()
            );
        }

        Commands::Unsync { ids } => {
            for id in &ids {
                index.unsync_id::<JsonRecord>(id).await?;
            }
            println!(
                "Removed {} ids from {}",
                ids.len(),
                container.collection_name()
            );
        }

        Commands::Show { file, id } => {
            let store = JsonRecordStore::open(&file, &cli.id_field)?;
            let record = store
                .get(&id)
                .with_context(|| format!("No record with {} = {} in {}", cli.id_field, id, file))?;

            match index.current_embedding(record).await? {
                Some(payload) => println!("{}", serde_json::to_string_pretty(&payload)?),
                None => println!("Record {} is not indexed.", id),
            }
        }

        Commands::Query {
            file,
            text,
            num,
            where_metadata,
            where_document,
        } => {
            let store = JsonRecordStore::open(&file, &cli.id_field)?;

            let mut options = QueryOptions::new().with_limit(num);
            if let Some(filter) = where_metadata {
                options = options.with_where_metadata(parse_filter("--where", &filter)?);
            }
            if let Some(filter) = where_document {
                options = options.with_where_document(parse_filter("--where-document", &filter)?);
            }

            let matches = index.query_matches::<JsonRecord>(&store, &text, options).await?;

            if matches.is_empty() {
                println!("No results found.");
            } else {
                println!("Found {} results:\n", matches.len());

                for (i, found) in matches.iter().enumerate() {
                    match found.distance() {
                        Some(distance) => println!(
                            "{}. {} (distance: {:.4})",
                            i + 1,
                            found.entity().id(),
                            distance
                        ),
                        None => println!("{}. {}", i + 1, found.entity().id()),
                    }

                    if let Some(document) = found.document() {
                        let preview: String = document
                            .lines()
                            .take(5)
                            .map(|l| format!("   | {}", l))
                            .collect::<Vec<_>>()
                            .join("\n");
                        println!("{}", preview);
                    }
                    println!();
                }
            }
        }

        Commands::Count => {
            let count = index.count::<JsonRecord>().await?;
            println!("{}: {} embeddings", container.collection_name(), count);
        }

        Commands::Drop => {
            index.delete_collection::<JsonRecord>().await?;
            println!("Collection {} deleted.", container.collection_name());
        }
    }

    Ok(())
}

fn parse_filter(flag: &str, raw: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("{} must be a JSON object", flag))?;
    anyhow::ensure!(value.is_object(), "{} must be a JSON object", flag);
    Ok(value)
}
