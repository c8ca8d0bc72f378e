//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::iex_quote_adapter::IexQuoteAdapter;
use crate::adapters::mail_api_adapter::MailApiAdapter;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::adapters::vonage_verify_adapter::VonageVerifyAdapter;
use crate::adapters::web::{self, AppState};
use crate::domain::error::PapertradeError;
use crate::ports::config_port::ConfigPort;
use crate::domain::verification::ResetCodeStore;

#[derive(Parser, Debug)]
#[command(name = "papertrade", about = "Virtual-cash stock trading web application")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create the database schema
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Output an argon2 hash for a password read from stdin
    HashPassword,
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing();
    match cli.command {
        Command::Serve { config } => run_serve(&config),
        Command::InitDb { config } => run_init_db(&config),
        Command::HashPassword => run_hash_password(),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = PapertradeError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: PapertradeError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

fn run_serve(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let store = match SqliteAdapter::from_config(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    if let Err(e) = store.initialize_schema() {
        return fail(e);
    }

    let quotes = match IexQuoteAdapter::from_config(&config) {
        Ok(q) => q,
        Err(e) => return fail(e),
    };
    let sms = match VonageVerifyAdapter::from_config(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let mail = match MailApiAdapter::from_config(&config) {
        Ok(m) => m,
        Err(e) => return fail(e),
    };

    let addr: SocketAddr = match config
        .get_string("web", "listen")
        .unwrap_or_else(|| "127.0.0.1:3000".to_string())
        .parse()
    {
        Ok(a) => a,
        Err(e) => {
            return fail(PapertradeError::ConfigInvalid {
                section: "web".into(),
                key: "listen".into(),
                reason: e.to_string(),
            });
        }
    };

    let state = AppState {
        store: Arc::new(store),
        quotes: Arc::new(quotes),
        sms: Arc::new(sms),
        mail: Arc::new(mail),
        config: Arc::new(config),
        reset_codes: Arc::new(ResetCodeStore::new()),
    };

    let router = match web::build_router(state) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    tracing::info!(%addr, "starting web server");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => return fail(PapertradeError::Io(e)),
    };
    let served = runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await
    });

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(PapertradeError::Io(e)),
    }
}

fn run_init_db(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let store = match SqliteAdapter::from_config(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    match store.initialize_schema() {
        Ok(()) => {
            eprintln!("schema ready");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_hash_password() -> ExitCode {
    use std::io::{self, BufRead};

    eprintln!("Enter password to hash:");
    let stdin = io::stdin();
    let password = match stdin.lock().lines().next() {
        Some(Ok(line)) => line,
        Some(Err(e)) => return fail(PapertradeError::Io(e)),
        None => String::new(),
    };

    match crate::adapters::web::auth::hash_password(&password) {
        Ok(hash) => {
            println!("{hash}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}
