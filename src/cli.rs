use clap::{Args, Parser, Subcommand};
use safequake::config::{AppConfig, AuthConfig, TelegramConfig};
use safequake::feed::{self, BoundingBox, FeedConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use time::Duration;

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(SocketAddr, AppConfig),
    Broadcast(AppConfig, String),
    ResetMarker(AppConfig),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    match &cli.command {
        Some(Command::Init(args)) => return RunOutcome::Exit(run_init(args)),
        Some(Command::AuthKey) => return RunOutcome::Exit(run_auth_key()),
        _ => {}
    }

    let config = match resolve_app_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{err}");
            return RunOutcome::Exit(2);
        }
    };
    match cli.command {
        Some(Command::Broadcast(args)) => match broadcast_text(&args) {
            Ok(text) => RunOutcome::Broadcast(config, text),
            Err(err) => {
                tracing::error!("{err}");
                RunOutcome::Exit(2)
            }
        },
        Some(Command::ResetMarker) => RunOutcome::ResetMarker(config),
        _ => RunOutcome::Serve(cli.listen, config),
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "safequake",
    version,
    about = "Seismic proximity alerts over web push, Telegram and in-app notifications"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long, env = "SAFEQUAKE_LISTEN", default_value = "127.0.0.1:3000")]
    listen: SocketAddr,
    #[arg(long, env = "SAFEQUAKE_DATA_DIR")]
    data_dir: Option<PathBuf>,
    #[arg(long, env = "SAFEQUAKE_FEED_URL", default_value = feed::DEFAULT_FEED_URL)]
    feed_url: String,
    /// `minlat,maxlat,minlon,maxlon`; defaults to Italy.
    #[arg(long, env = "SAFEQUAKE_BBOX")]
    bbox: Option<String>,
    #[arg(long, env = "SAFEQUAKE_MIN_MAGNITUDE", default_value_t = feed::DEFAULT_MIN_MAGNITUDE)]
    min_magnitude: f64,
    #[arg(long, env = "SAFEQUAKE_POLL_INTERVAL")]
    poll_interval: Option<String>,
    #[arg(long, env = "SAFEQUAKE_ALERT_RADIUS_KM", default_value_t = safequake::monitor::DEFAULT_ALERT_RADIUS_KM)]
    alert_radius_km: f64,
    #[arg(long, env = "SAFEQUAKE_RECORD_RADIUS_KM", default_value_t = safequake::recorder::DEFAULT_RECORD_RADIUS_KM)]
    record_radius_km: f64,
    /// Serve the API without polling the feed.
    #[arg(long, env = "SAFEQUAKE_NO_MONITOR")]
    no_monitor: bool,
    #[arg(long, env = "SAFEQUAKE_TELEGRAM_TOKEN")]
    telegram_token: Option<String>,
    #[arg(long, env = "SAFEQUAKE_TELEGRAM_API_BASE")]
    telegram_api_base: Option<String>,
    /// Secret registered with `setWebhook`; required for bot commands.
    #[arg(long, env = "SAFEQUAKE_TELEGRAM_WEBHOOK_SECRET")]
    telegram_webhook_secret: Option<String>,
    #[arg(long, env = "SAFEQUAKE_VAPID_PRIVATE_KEY")]
    vapid_private_key: Option<String>,
    #[arg(long, env = "SAFEQUAKE_VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, env = "SAFEQUAKE_VAPID_SUBJECT")]
    vapid_subject: Option<String>,
    #[arg(long, env = "SAFEQUAKE_AUTH_KEY")]
    auth_key: Option<String>,
    #[arg(long, env = "SAFEQUAKE_AUTH_TOKEN_TTL")]
    auth_token_ttl: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate VAPID credentials for web push.
    Init(InitArgs),
    /// Generate a key for signing auth tokens.
    AuthKey,
    /// Send a message to every user with Telegram notifications enabled.
    Broadcast(BroadcastArgs),
    /// Forget the last notified event so the next poll alerts on it again.
    ResetMarker,
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Args, Debug)]
struct BroadcastArgs {
    text: String,
}

fn broadcast_text(args: &BroadcastArgs) -> Result<String, String> {
    let text = args.text.trim();
    if text.is_empty() {
        return Err("broadcast text cannot be empty".to_string());
    }
    Ok(text.to_string())
}

fn run_init(args: &InitArgs) -> i32 {
    let credentials = match safequake::generate_vapid_credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            tracing::error!(error = %err, "failed to generate VAPID credentials");
            return 1;
        }
    };
    let (subject, show_subject_note) = match args.subject.clone() {
        Some(subject) => (subject, false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    for line in credentials.env_lines(&subject) {
        println!("{line}");
    }
    if show_subject_note {
        println!();
        println!("Note: replace SAFEQUAKE_VAPID_SUBJECT with a contact URI you control.");
    }
    0
}

fn run_auth_key() -> i32 {
    match safequake::auth::generate_auth_key() {
        Ok(secret) => {
            println!("{secret}");
            0
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to generate auth key");
            1
        }
    }
}

fn resolve_app_config(cli: &Cli) -> Result<AppConfig, String> {
    let bounding_box = match cli.bbox.as_deref() {
        Some(raw) => BoundingBox::parse(raw)?,
        None => BoundingBox::ITALY,
    };
    if !cli.min_magnitude.is_finite() || cli.min_magnitude < 0.0 {
        return Err(format!("invalid minimum magnitude {}", cli.min_magnitude));
    }
    let poll_interval: std::time::Duration = match cli.poll_interval.as_deref() {
        Some(raw) => parse_duration("poll interval", raw)?
            .try_into()
            .map_err(|_| format!("invalid poll interval '{raw}'"))?,
        None => feed::DEFAULT_POLL_INTERVAL,
    };
    for (name, radius) in [
        ("alert radius", cli.alert_radius_km),
        ("record radius", cli.record_radius_km),
    ] {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(format!("{name} must be a positive number of kilometers"));
        }
    }

    let telegram = cli
        .telegram_token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            let mut telegram = TelegramConfig::new(token.to_string());
            if let Some(api_base) = cli.telegram_api_base.as_deref() {
                telegram.api_base = api_base.to_string();
            }
            telegram.webhook_secret = cli
                .telegram_webhook_secret
                .as_deref()
                .map(str::trim)
                .filter(|secret| !secret.is_empty())
                .map(str::to_string);
            telegram
        });

    Ok(AppConfig {
        app_name: safequake::config::APP_NAME.to_string(),
        data_dir: cli.data_dir.clone(),
        feed: FeedConfig {
            url: cli.feed_url.clone(),
            bounding_box,
            min_magnitude: cli.min_magnitude,
            poll_interval,
        },
        monitor_enabled: !cli.no_monitor,
        alert_radius_km: cli.alert_radius_km,
        record_radius_km: cli.record_radius_km,
        telegram,
        vapid_private_key: cli.vapid_private_key.clone(),
        vapid_public_key: cli.vapid_public_key.clone(),
        vapid_subject: cli.vapid_subject.clone(),
        auth: resolve_auth_config(cli)?,
    })
}

fn resolve_auth_config(cli: &Cli) -> Result<AuthConfig, String> {
    let token_ttl = match cli.auth_token_ttl.as_deref() {
        Some(raw) => parse_duration("auth token ttl", raw)?,
        None => default_auth_token_ttl(),
    };

    let key = match cli.auth_key.as_deref().map(str::trim) {
        Some("") => return Err("auth key cannot be empty".to_string()),
        Some(key) => key.to_string(),
        None => {
            tracing::warn!("no auth key configured; using a temporary key, tokens will not survive a restart");
            safequake::auth::generate_auth_key().map_err(|err| err.to_string())?
        }
    };

    Ok(AuthConfig { key, token_ttl })
}

fn default_auth_token_ttl() -> Duration {
    Duration::days(14)
}

/// Parses `<number>[s|m|h|d]`; a bare number is seconds.
fn parse_duration(what: &str, raw: &str) -> Result<Duration, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(format!("{what} cannot be empty"));
    }

    let (amount, unit) = match value.chars().last() {
        Some(ch) if ch.is_ascii_alphabetic() => {
            (&value[..value.len() - 1], ch.to_ascii_lowercase())
        }
        _ => (value, 's'),
    };

    let invalid = || format!("invalid {what} '{value}'; expected <number>[s|m|h|d]");
    let amount: i64 = amount.parse().map_err(|_| invalid())?;

    if amount <= 0 {
        return Err(format!("{what} must be greater than 0"));
    }

    match unit {
        's' => Ok(Duration::seconds(amount)),
        'm' => Ok(Duration::minutes(amount)),
        'h' => Ok(Duration::hours(amount)),
        'd' => Ok(Duration::days(amount)),
        _ => Err(invalid()),
    }
}
