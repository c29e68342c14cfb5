use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::sync::watch::error::RecvError;
use tokio::time::error::Elapsed;
use starsign::app::{App, AppError};
use starsign::config::{AppConfig, ConfigError};
use starsign::profile::{ProfileUpdate, Registration, UserProfile};
use starsign::sync::SyncError;
use starsign::zodiac::ZodiacSign;

const PROFILE_WAIT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    App(#[from] AppError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid birth date `{0}` (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("timed out waiting for the profile to load")]
    Timeout,
    #[error("session state closed before the profile loaded")]
    StateClosed,
}

#[derive(Parser, Debug)]
#[command(name = "starsign", about = "Horoscope and tarot site client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(long, env = "STARSIGN_EMAIL")]
    email: String,
    #[arg(long, env = "STARSIGN_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct ProfileFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    birth_date: Option<String>,
    #[arg(long)]
    birth_time: Option<String>,
    #[arg(long)]
    birth_place: Option<String>,
    #[arg(long)]
    zodiac_sign: Option<ZodiacSign>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and print the synchronized profile.
    Login(Credentials),
    /// Create an account and its profile.
    Register {
        #[command(flatten)]
        credentials: Credentials,
        #[command(flatten)]
        fields: ProfileFields,
    },
    /// Sign in, update profile fields, print the result.
    UpdateProfile {
        #[command(flatten)]
        credentials: Credentials,
        #[command(flatten)]
        fields: ProfileFields,
    },
    /// Resolve a path and show the access decision, optionally signed in.
    Route {
        path: String,
        #[arg(long, env = "STARSIGN_EMAIL")]
        email: Option<String>,
        #[arg(long, env = "STARSIGN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Print the zodiac sign for a `YYYY-MM-DD` birth date.
    Zodiac { birth_date: String },
    /// Check whether two signs' elements are compatible.
    Compatibility { first: ZodiacSign, second: ZodiacSign },
    /// Flip the stored light/dark preference.
    ToggleTheme,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Zodiac { birth_date } => {
            let sign =
                ZodiacSign::from_birth_date(birth_date).ok_or_else(|| CliError::InvalidDate(birth_date.clone()))?;
            println!("{sign}");
            return Ok(());
        }
        Command::Compatibility { first, second } => {
            let verdict = if first.compatible_with(*second) { "compatible" } else { "not compatible" };
            println!("{first} ({:?}) + {second} ({:?}): {verdict}", first.element(), second.element());
            return Ok(());
        }
        _ => {}
    }

    let app = App::start(AppConfig::from_env()?)?;
    let result = run(&app, cli.command).await;
    app.shutdown();
    result
}

async fn run(app: &App, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login(credentials) => {
            app.user().login(&credentials.email, &credentials.password).await?;
            print_profile(&wait_for_profile(app).await?)
        }
        Command::Register { credentials, fields } => {
            let registration = Registration {
                email: credentials.email,
                password: credentials.password,
                name: fields.name,
                birth_date: fields.birth_date,
                birth_time: fields.birth_time,
                birth_place: fields.birth_place,
                zodiac_sign: fields.zodiac_sign,
            };
            if let Some(date) = &registration.birth_date {
                if ZodiacSign::from_birth_date(date).is_none() {
                    return Err(CliError::InvalidDate(date.clone()));
                }
            }
            app.user().register(&registration).await?;
            match wait_for_profile(app).await {
                Ok(profile) => print_profile(&profile),
                // Sign-up may await email confirmation; there is no session yet.
                Err(CliError::Timeout) => {
                    println!("registered {}", registration.email);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Command::UpdateProfile { credentials, fields } => {
            app.user().login(&credentials.email, &credentials.password).await?;
            wait_for_profile(app).await?;
            let update = ProfileUpdate {
                name: fields.name,
                birth_date: fields.birth_date,
                birth_time: fields.birth_time,
                birth_place: fields.birth_place,
                zodiac_sign: fields.zodiac_sign,
            };
            app.user().update_profile(&update).await?;
            let profile = app.user().profile().ok_or(SyncError::NotAuthenticated)?;
            print_profile(&profile)
        }
        Command::Route { path, email, password } => {
            if let (Some(email), Some(password)) = (email, password) {
                app.user().login(&email, &password).await?;
                wait_for_profile(app).await?;
            } else {
                wait_until_settled(app).await?;
            }
            let nav = app.navigate(&path);
            println!("{} -> {:?}", nav.route, nav.access);
            Ok(())
        }
        Command::ToggleTheme => {
            println!("{}", app.theme().toggle());
            Ok(())
        }
        Command::Zodiac { .. } | Command::Compatibility { .. } => Ok(()),
    }
}

async fn wait_for_profile(app: &App) -> Result<UserProfile, CliError> {
    let mut rx = app.user().subscribe();
    let wait = rx.wait_for(|s| !s.loading() && s.session().is_some());
    let state = wait_outcome(tokio::time::timeout(Duration::from_secs(PROFILE_WAIT_SECS), wait).await)?;
    state.profile().cloned().ok_or(CliError::Sync(SyncError::NotAuthenticated))
}

async fn wait_until_settled(app: &App) -> Result<(), CliError> {
    let mut rx = app.user().subscribe();
    let wait = rx.wait_for(|s| !s.loading());
    wait_outcome(tokio::time::timeout(Duration::from_secs(PROFILE_WAIT_SECS), wait).await).map(|_| ())
}

/// A closed state channel is not a timeout; only the latter may mean the
/// backend is still waiting on the user.
fn wait_outcome<T>(outcome: Result<Result<T, RecvError>, Elapsed>) -> Result<T, CliError> {
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(CliError::StateClosed),
        Err(_) => Err(CliError::Timeout),
    }
}

fn print_profile(profile: &UserProfile) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(profile)?);
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
