use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use axum::http::HeaderValue;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tracker_api::config::{ServerConfig, StoreBackend, SupabaseConfig};
use tracker_api::identity::SupabaseAuth;
use tracker_api::server::{AppState, cors_layer, create_router};
use tracker_api::store::{NewScenario, PostgrestStore, SqliteStore, Store};

#[derive(Parser)]
#[command(name = "tracker-api")]
#[command(about = "HTTP backend for trackers, scenarios and run history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands for the local SQLite store
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve(ServeArgs),
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create the SQLite database and its tables
    Init {
        /// SQLite database file
        #[arg(long, env = "DATABASE_PATH", default_value = "./data/trackers.db")]
        db_path: PathBuf,
    },

    /// Load a JSON array of scenarios into the SQLite catalog
    ImportScenarios {
        /// SQLite database file
        #[arg(long, env = "DATABASE_PATH", default_value = "./data/trackers.db")]
        db_path: PathBuf,

        /// JSON file holding the scenarios
        file: PathBuf,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(long, short, env = "PORT", default_value = "3000")]
    port: u16,

    /// Browser origin allowed to call the API with credentials
    #[arg(long, env = "APP_ORIGIN")]
    app_origin: Option<String>,

    /// Row store: "postgrest" (hosted) or "sqlite" (local file)
    #[arg(long = "store", env = "STORE_BACKEND", default_value = "postgrest")]
    store: StoreBackend,

    /// SQLite database file, used with --store sqlite
    #[arg(long, env = "DATABASE_PATH", default_value = "./data/trackers.db")]
    db_path: PathBuf,

    /// Base URL of the hosted project
    #[arg(long, env = "SUPABASE_URL", default_value = "")]
    supabase_url: String,

    /// Public (anon) API key
    #[arg(long, env = "SUPABASE_ANON_KEY", default_value = "", hide_env_values = true)]
    supabase_anon_key: String,

    /// Service-role key; enables account deletion at the identity provider
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    supabase_service_role_key: Option<String>,
}

impl From<ServeArgs> for ServerConfig {
    fn from(args: ServeArgs) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            app_origin: args.app_origin.filter(|o| !o.trim().is_empty()),
            store: args.store,
            db_path: args.db_path,
            supabase: SupabaseConfig {
                url: args.supabase_url,
                anon_key: args.supabase_anon_key,
                service_role_key: args.supabase_service_role_key.filter(|k| !k.trim().is_empty()),
            },
        }
    }
}

fn open_sqlite(db_path: &Path) -> anyhow::Result<SqliteStore> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let store = SqliteStore::new(db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;
    store.initialize()?;
    Ok(store)
}

fn run_init(db_path: &Path) -> anyhow::Result<()> {
    open_sqlite(db_path)?;
    println!("Initialized database at {}", db_path.display());
    Ok(())
}

fn run_import_scenarios(db_path: &Path, file: &Path) -> anyhow::Result<()> {
    let raw = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let scenarios: Vec<NewScenario> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;

    let store = open_sqlite(db_path)?;
    for scenario in &scenarios {
        let stored = store.insert_scenario(scenario)?;
        println!("Imported scenario {} ({})", stored.id, stored.name);
    }

    println!("Imported {} scenarios", scenarios.len());
    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let store: Arc<dyn Store> = match config.store {
        StoreBackend::Postgrest => Arc::new(PostgrestStore::new(&config.supabase)?),
        StoreBackend::Sqlite => {
            info!("Using SQLite store at {}", config.db_path.display());
            Arc::new(open_sqlite(&config.db_path)?)
        }
    };

    if config.supabase.service_role_key.is_none() {
        warn!("SUPABASE_SERVICE_ROLE_KEY not set; identity accounts will not be removed on user deletion");
    }

    let identity = Arc::new(SupabaseAuth::new(&config.supabase)?);
    let state = Arc::new(AppState::new(store, identity));

    let mut app = create_router(state);
    if let Some(origin) = &config.app_origin {
        let Ok(origin) = origin.parse::<HeaderValue>() else {
            bail!("invalid APP_ORIGIN '{origin}'");
        };
        app = app.layer(cors_layer(origin));
    }

    let addr = config.socket_addr()?;

    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tracker_api=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { db_path } => run_init(&db_path)?,
            AdminCommands::ImportScenarios { db_path, file } => {
                run_import_scenarios(&db_path, &file)?;
            }
        },
        Commands::Serve(args) => run_serve(args.into()).await?,
    }

    Ok(())
}
