//! Newsdesk CLI - manage the admin dashboard session from a terminal.
//!
//! Signs in against the content API, keeps the session between runs, and
//! shows how the dashboard's route guard would treat a given path.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsdesk_core::{
    ApiClient, Config, CredentialStore, GuardOutcome, Layout, Route, RouteGuard, SessionManager,
    SessionStatus,
};

// ============================================================================
// Constants
// ============================================================================

/// Email used for `login` when none is given on the command line
const EMAIL_ENV: &str = "NEWSDESK_EMAIL";

/// Password used for `login` instead of prompting
const PASSWORD_ENV: &str = "NEWSDESK_PASSWORD";

/// When set, logs are also written to a file in this directory
const LOG_DIR_ENV: &str = "NEWSDESK_LOG_DIR";

const LOG_FILE: &str = "newsdesk.log";

type Session = SessionManager<ApiClient, Box<dyn CredentialStore>>;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Status,
    Login(Option<String>),
    Logout,
    Open(String),
    Help,
}

impl Command {
    fn parse(args: &[String]) -> Result<Self, String> {
        let command = args.first().map(String::as_str).unwrap_or("status");
        match command {
            "status" => Ok(Command::Status),
            "login" => Ok(Command::Login(args.get(1).cloned())),
            "logout" => Ok(Command::Logout),
            "open" => args
                .get(1)
                .cloned()
                .map(Command::Open)
                .ok_or_else(|| "open requires a path, e.g. `newsdesk open /articles`".to_string()),
            "help" | "--help" | "-h" => Ok(Command::Help),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}\n", message);
            print_usage();
            return ExitCode::from(2);
        }
    };

    match run(command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<ExitCode> {
    if command == Command::Help {
        print_usage();
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };

    let api = ApiClient::new(config.api_base_url())?;
    let store = config.credential_store()?;

    info!(api = %api.base_url(), backend = ?config.credential_backend, "Verifying stored session");
    let session: Session = SessionManager::initialize(api, store).await;

    match command {
        Command::Status => {
            print_status(&session);
            Ok(ExitCode::SUCCESS)
        }
        Command::Login(email) => login(&session, &mut config, email).await,
        Command::Logout => {
            session.logout().await;
            println!("Signed out.");
            Ok(ExitCode::SUCCESS)
        }
        Command::Open(path) => open(&session, &path).await,
        Command::Help => Ok(ExitCode::SUCCESS),
    }
}

fn print_usage() {
    println!("Usage: newsdesk <command>\n");
    println!("Commands:");
    println!("  status          Verify the stored session and show who is signed in");
    println!("  login [email]   Sign in to the admin dashboard");
    println!("  logout          Sign out and forget stored credentials");
    println!("  open <path>     Show how the dashboard would handle a path");
    println!("  help            Show this message");
}

fn print_status(session: &Session) {
    match (session.status(), session.user()) {
        (SessionStatus::Authenticated, Some(user)) => {
            println!("Signed in as {} <{}> ({})", user.display(), user.email, user.role);
        }
        _ => println!("Not signed in."),
    }
}

// ============================================================================
// Login
// ============================================================================

async fn login(session: &Session, config: &mut Config, email: Option<String>) -> Result<ExitCode> {
    // The login screen sits behind the public guard: signed-in users are sent away
    let guard = RouteGuard::new(session);
    if let GuardOutcome::Replace(_) = guard.resolve(&Route::Login) {
        print_status(session);
        return Ok(ExitCode::SUCCESS);
    }

    let email = match email
        .or_else(|| std::env::var(EMAIL_ENV).ok())
        .filter(|e| !e.trim().is_empty())
    {
        Some(email) => email,
        None => prompt_email(config.last_email.as_deref())?,
    };

    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password("Password: ")?,
    };

    println!("\nSigning in...");

    match session.login(&email, &password).await {
        Ok(()) => {
            config.last_email = Some(email.trim().to_string());
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            print_status(session);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn prompt_email(last_email: Option<&str>) -> Result<String> {
    match last_email {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match last_email {
        Some(last) if input.is_empty() => last.to_string(),
        _ => input.to_string(),
    })
}

// ============================================================================
// Route resolution
// ============================================================================

async fn open(session: &Session, path: &str) -> Result<ExitCode> {
    let mut guard = RouteGuard::new(session);

    let mut outcome = match Route::parse(path) {
        Some(route) => guard.settled(&route).await,
        None => guard.resolve_path(path),
    };

    loop {
        match outcome {
            GuardOutcome::Placeholder => {
                println!("Loading...");
                break;
            }
            GuardOutcome::Render { route, layout } => {
                let chrome = match layout {
                    Layout::Standard => "dashboard layout",
                    Layout::Bare => "no layout",
                };
                println!("Render {} ({})", route, chrome);
                break;
            }
            GuardOutcome::Replace(to) => {
                println!("Redirect (replace) -> {}", to);
                outcome = guard.resolve(&to);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
