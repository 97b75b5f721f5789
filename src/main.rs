use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use expert_search::api::{ephemeral_secret, ApiServer, ApiServerConfig};
use expert_search::docs::{DocumentSource, GenerationStore, JsonFileSource};
use expert_search::search::{embedder_for_model, SearchEngine, SearchRequest, SearchStatus};
use expert_search::EngineConfig;

#[derive(Parser)]
#[command(name = "expert-search")]
#[command(about = "Hybrid semantic + lexical search over expert profiles", long_about = None)]
struct Cli {
    /// Data directory holding persisted generations
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// YAML engine configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and publish a new generation from a profile file
    Build {
        /// JSON array or JSON Lines file of profiles
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Search the published generation
    Search {
        /// Search query
        query: String,

        /// Maximum results to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Restrict results to these profile ids (comma separated)
        #[arg(long, value_delimiter = ',')]
        candidates: Option<Vec<String>>,
    },

    /// Show the published generation
    Status,

    /// Start API server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// JWT secret key
        #[arg(long, env = "JWT_SECRET")]
        jwt_secret: Option<String>,

        /// Password required by /login
        #[arg(long, env = "OPERATOR_PASSWORD")]
        operator_password: Option<String>,

        /// Profile file used by POST /index/build
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Allowed CORS origins (comma separated)
        #[arg(
            long,
            env = "ALLOWED_ORIGINS",
            value_delimiter = ',',
            default_value = "http://localhost:3000"
        )]
        allowed_origins: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "expert_search=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Build { ref source } => {
            let engine = open_engine(&cli.data_dir, &config)?;
            let source = JsonFileSource::new(source);
            let report = engine
                .rebuild_from(&source)
                .await
                .with_context(|| format!("Failed to build from {}", source.describe()))?;

            println!("Built generation {}", report.generation);
            println!("  Indexed: {}", report.indexed);
            println!("  Skipped: {}", report.skipped);
            println!("  Batches: {}", report.batches);
            println!("  Elapsed: {} ms", report.elapsed_ms);
        }

        Commands::Search {
            ref query,
            limit,
            ref candidates,
        } => {
            let engine = open_engine(&cli.data_dir, &config)?;
            let mut request = SearchRequest::new(query.as_str());
            request.limit = limit;
            request.candidate_ids = candidates.clone();

            let response = engine.search(&request).await?;
            match response.status {
                SearchStatus::Ok => {}
                SearchStatus::NotBuilt => {
                    println!("No index has been built yet. Run `expert-search build` first.");
                    return Ok(());
                }
                SearchStatus::NoCandidates => {
                    println!("None of the requested candidates are indexed.");
                    return Ok(());
                }
                SearchStatus::Degraded { ref reason } => {
                    println!("Search unavailable: {}", reason);
                    return Ok(());
                }
            }

            if response.results.is_empty() {
                println!("No results found for: {}", query);
                return Ok(());
            }
            println!("Found {} results for: {}\n", response.results.len(), query);
            for (i, result) in response.results.iter().enumerate() {
                let marker = if result.all_keywords_matched { " *" } else { "" };
                println!(
                    "{}. {} {:.1}%{} (semantic {:.4}, lexical {:.4})",
                    i + 1,
                    result.id,
                    result.final_score,
                    marker,
                    result.sem_score,
                    result.kw_score
                );
            }
            if let Some(first) = response.results.first() {
                if !first.top_terms.is_empty() {
                    println!("\nTop query terms: {}", first.top_terms.join(", "));
                }
            }
        }

        Commands::Status => {
            let store = GenerationStore::new(&cli.data_dir).with_keep(config.keep_generations);
            match store.load_current()? {
                Some(generation) => {
                    if let Some(manifest) = generation.manifest() {
                        println!("Generation: {}", manifest.id);
                        println!("  Built at:  {}", manifest.built_at.to_rfc3339());
                        println!("  Model:     {} (dim {})", manifest.embedding_model, manifest.dimension);
                        println!("  Documents: {}", manifest.documents);
                        println!("  Lexical:   {}", manifest.lexical_available);
                    }
                    let all = store.list()?;
                    println!("  On disk:   {} generation(s)", all.len());
                }
                None => println!("No generation has been built in {:?}", cli.data_dir),
            }
        }

        Commands::Server {
            ref host,
            port,
            ref jwt_secret,
            ref operator_password,
            ref source,
            ref allowed_origins,
        } => {
            let secret = jwt_secret.clone().unwrap_or_else(|| {
                println!("Warning: JWT_SECRET is not set, using a random secret. Tokens will not survive a restart.");
                ephemeral_secret()
            });
            if operator_password.is_none() {
                println!("Warning: OPERATOR_PASSWORD is not set, /login and /index/build are disabled.");
            }

            let engine = Arc::new(open_engine(&cli.data_dir, &config)?);
            let server_config = ApiServerConfig {
                host: host.clone(),
                port,
                jwt_secret: secret,
                operator_password: operator_password.clone(),
                allowed_origins: allowed_origins.clone(),
            };

            let mut server = ApiServer::new(server_config, engine);
            if let Some(path) = source {
                server = server.with_source(Arc::new(JsonFileSource::new(path)));
            }
            println!("Starting API server on {}:{}", host, port);
            server.start().await?;
        }
    }

    Ok(())
}

fn open_engine(data_dir: &Path, config: &EngineConfig) -> Result<SearchEngine> {
    let embedder = embedder_for_model(&config.embedding_model)
        .with_context(|| format!("Failed to load embedding model {}", config.embedding_model))?;
    let store = GenerationStore::new(data_dir).with_keep(config.keep_generations);
    let engine = SearchEngine::open(embedder, config.clone(), store)
        .with_context(|| format!("Failed to open generation store at {:?}", data_dir))?;
    Ok(engine)
}
