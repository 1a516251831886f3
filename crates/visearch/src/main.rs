use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use visearch_common::{logger, AppConfig};
use visearch_embedding::ImageInput;
use visearch_vector::SearchRequest;

/// Find project root by looking for .git directory
fn find_project_root() -> Option<PathBuf> {
    let mut current_dir = std::env::current_dir().ok()?;

    loop {
        if current_dir.join(".git").exists() {
            return Some(current_dir);
        }

        if !current_dir.pop() {
            break;
        }
    }

    None
}

/// Load .env file from project root
fn load_dotenv_from_project_root() {
    if let Some(root) = find_project_root() {
        let env_path = root.join(".env");
        if env_path.exists() {
            dotenv::from_path(&env_path).ok();
        }
    } else {
        dotenv::dotenv().ok();
    }
}

#[derive(Parser)]
#[command(name = "visearch")]
#[command(about = "visearch - find catalog items visually similar to an image", long_about = None)]
struct Cli {
    /// Catalog source (JSON file path or http(s) URL), overrides CATALOG_SOURCE
    #[arg(long, global = true)]
    catalog: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one search and print the JSON response
    Search {
        /// Query image URL
        image_url: String,

        /// Number of results
        #[arg(long)]
        top_k: Option<usize>,

        /// Only rank items of this category
        #[arg(long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // CLI overrides go through the environment, read by AppConfig::from_env
    load_dotenv_from_project_root();
    if let Some(catalog) = &cli.catalog {
        std::env::set_var("CATALOG_SOURCE", catalog);
    }

    match cli.command {
        Some(Commands::Search {
            image_url,
            top_k,
            category,
        }) => {
            let config = AppConfig::from_env()?;
            logger::setup_console_logging(&config.log_level)?;

            let engine = visearch_server::build_engine(&config)?;
            let request = SearchRequest {
                image: ImageInput::Url(image_url),
                top_k,
                category,
            };
            let response = engine.search(request).await?;

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Some(Commands::Serve { host, port }) => {
            if let Some(host) = &host {
                std::env::set_var("SERVER_HOST", host);
            }
            if let Some(port) = port {
                std::env::set_var("SERVER_PORT", port.to_string());
            }
            serve().await?;
        }
        None => serve().await?,
    }

    Ok(())
}

async fn serve() -> Result<()> {
    let config = AppConfig::from_env()?;
    logger::setup_logging(&config.log_dir, &config.log_level)?;

    tracing::info!("visearch starting...");
    tracing::info!("Configuration loaded:");
    tracing::info!("  Bind: {}", config.server_bind_address());
    tracing::info!("  Catalog: {}", config.catalog_source);
    tracing::info!(
        "  Embedding: {} ({}, dim {})",
        config.embedding_api_url,
        config.embedding_model,
        config.embedding_dimension
    );

    println!("Server listening on http://{}", config.server_bind_address());

    visearch_server::start_server(config).await?;
    Ok(())
}
