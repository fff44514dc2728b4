//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;
use uuid::Uuid;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "quire";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_HTTP_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_JOBS_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/";
const DEFAULT_WEB_BASE_URL: &str = "http://localhost:5000/";
const DEFAULT_DOI_RESOLVER: &str = "https://dx.doi.org/";
const DEFAULT_STATIC_PATH: &str = "/static/mfr";
const DEFAULT_RENDER_MAX_DURATION_SECS: u64 = 120;
const DEFAULT_RENDER_CACHE_DIR: &str = "mfrcache";
const DEFAULT_RENDER_WORKER_CONCURRENCY: u32 = 2;

/// Command-line arguments for the Quire binary.
#[derive(Debug, Parser)]
#[command(name = "quire", version, about = "Quire preprint API server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "QUIRE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API (and the render workers when queueing is enabled).
    Serve(Box<ServeArgs>),
    /// Render one local file into the render cache.
    Render(RenderFileArgs),
    /// Backfill comment spam status and latest-report timestamps.
    #[command(name = "migrate-spam")]
    MigrateSpam(MigrateSpamArgs),
    /// Manage API keys.
    #[command(name = "api-keys")]
    ApiKeys(ApiKeysArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the external renderer command for formats without a built-in renderer.
    #[arg(long = "render-command", value_name = "PATH")]
    pub command: Option<PathBuf>,

    /// Override the static asset path handed to renderers.
    #[arg(long = "render-static-path", value_name = "PATH")]
    pub static_path: Option<String>,

    /// Override the per-render time limit.
    #[arg(long = "render-max-duration-seconds", value_name = "SECONDS")]
    pub max_duration_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub render: RenderOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the HTTP database pool size.
    #[arg(long = "database-http-max-connections", value_name = "COUNT")]
    pub database_http_max_connections: Option<u32>,

    /// Override the jobs database pool size.
    #[arg(long = "database-jobs-max-connections", value_name = "COUNT")]
    pub database_jobs_max_connections: Option<u32>,

    /// Override the public API base URL used in links.
    #[arg(long = "api-base-url", value_name = "URL")]
    pub api_base_url: Option<String>,

    /// Override the web base URL used in html links.
    #[arg(long = "api-web-base-url", value_name = "URL")]
    pub api_web_base_url: Option<String>,

    /// Run renders on the worker queue instead of inline.
    #[arg(
        long = "render-use-queue",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub render_use_queue: Option<bool>,

    /// Override the render cache directory.
    #[arg(long = "render-cache-dir", value_name = "PATH")]
    pub render_cache_dir: Option<PathBuf>,

    /// Override the render worker concurrency.
    #[arg(long = "render-worker-concurrency", value_name = "COUNT")]
    pub render_worker_concurrency: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderFileArgs {
    #[command(flatten)]
    pub render: RenderOverrides,

    /// File to render.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,

    /// Directory the cache file is written to; defaults to `render.cache_dir`.
    #[arg(long = "cache-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub cache_dir: Option<PathBuf>,

    /// Name of the cache file; defaults to the input's file name with `.html`.
    #[arg(long = "cache-file-name", value_name = "NAME")]
    pub cache_file_name: Option<String>,

    /// Download link shown by renderers and the fallback snippet.
    #[arg(long = "download-path", value_name = "URL")]
    pub download_path: String,
}

#[derive(Debug, Args, Clone)]
pub struct MigrateSpamArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Report how many comments would change without writing anything.
    #[arg(long = "dry-run", action = clap::ArgAction::SetTrue)]
    pub dry_run: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ApiKeysArgs {
    #[command(subcommand)]
    pub command: ApiKeysCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ApiKeysCommand {
    /// Issue a new key and print its token once.
    Issue(IssueApiKeyArgs),
    /// Revoke an existing key.
    Revoke(RevokeApiKeyArgs),
}

#[derive(Debug, Args, Clone)]
pub struct IssueApiKeyArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// User the key acts as.
    #[arg(long = "user", value_name = "USER_ID")]
    pub user_id: String,

    /// Human readable label.
    #[arg(long = "name", value_name = "NAME")]
    pub name: String,

    /// Scopes to grant; all scopes when omitted.
    #[arg(long = "scope", value_name = "SCOPE")]
    pub scopes: Vec<String>,

    /// Expire the key after this many days.
    #[arg(long = "expires-in-days", value_name = "DAYS")]
    pub expires_in_days: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct RevokeApiKeyArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Key id to revoke.
    #[arg(value_name = "ID")]
    pub id: Uuid,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub api: ApiSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub http_max_connections: NonZeroU32,
    pub jobs_max_connections: NonZeroU32,
}

/// Bases for the absolute links in API representations; each ends in `/`.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Url,
    pub web_base_url: Url,
    pub doi_resolver: Url,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub static_path: String,
    pub max_duration: Duration,
    pub use_queue: bool,
    pub cache_dir: PathBuf,
    pub command: Option<PathBuf>,
    pub worker_concurrency: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("QUIRE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_render_overrides(&args.render),
        Some(Command::MigrateSpam(args)) => raw.apply_database_override(&args.database),
        Some(Command::ApiKeys(args)) => match &args.command {
            ApiKeysCommand::Issue(issue) => raw.apply_database_override(&issue.database),
            ApiKeysCommand::Revoke(revoke) => raw.apply_database_override(&revoke.database),
        },
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    api: RawApiSettings,
    render: RawRenderSettings,
}

/// Replace `slot` when the command line supplied a value.
fn overlay<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, cli: &ServeOverrides) {
        overlay(&mut self.server.host, &cli.server_host);
        overlay(&mut self.server.port, &cli.server_port);
        overlay(
            &mut self.server.graceful_shutdown_seconds,
            &cli.server_graceful_shutdown_seconds,
        );
        overlay(&mut self.logging.level, &cli.log_level);
        overlay(&mut self.logging.json, &cli.log_json);
        overlay(&mut self.database.url, &cli.database_url);
        overlay(
            &mut self.database.http_max_connections,
            &cli.database_http_max_connections,
        );
        overlay(
            &mut self.database.jobs_max_connections,
            &cli.database_jobs_max_connections,
        );
        overlay(&mut self.api.base_url, &cli.api_base_url);
        overlay(&mut self.api.web_base_url, &cli.api_web_base_url);
        overlay(&mut self.render.use_queue, &cli.render_use_queue);
        overlay(&mut self.render.cache_dir, &cli.render_cache_dir);
        overlay(
            &mut self.render.worker_concurrency,
            &cli.render_worker_concurrency,
        );
        self.apply_render_overrides(&cli.render);
    }

    fn apply_database_override(&mut self, cli: &DatabaseOverride) {
        overlay(&mut self.database.url, &cli.database_url);
    }

    fn apply_render_overrides(&mut self, cli: &RenderOverrides) {
        overlay(&mut self.render.command, &cli.command);
        overlay(&mut self.render.static_path, &cli.static_path);
        overlay(&mut self.render.max_duration_seconds, &cli.max_duration_seconds);
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            server: raw.server.resolve()?,
            logging: raw.logging.resolve()?,
            database: raw.database.resolve()?,
            api: raw.api.resolve()?,
            render: raw.render.resolve()?,
        })
    }
}

impl RawServerSettings {
    fn resolve(self) -> Result<ServerSettings, LoadError> {
        let host = self.host.as_deref().unwrap_or(DEFAULT_HOST);
        let port = positive(self.port.unwrap_or(DEFAULT_PORT), "server.port")?;
        let candidate = format!("{host}:{port}");
        let addr = candidate.parse::<SocketAddr>().map_err(|err| {
            LoadError::invalid("server.host", format!("invalid address `{candidate}`: {err}"))
        })?;

        Ok(ServerSettings {
            addr,
            graceful_shutdown: seconds(
                self.graceful_shutdown_seconds,
                DEFAULT_GRACEFUL_SHUTDOWN_SECS,
                "server.graceful_shutdown_seconds",
            )?,
        })
    }
}

impl RawLoggingSettings {
    fn resolve(self) -> Result<LoggingSettings, LoadError> {
        let level = match self.level.as_deref() {
            Some(level) => LevelFilter::from_str(level)
                .map_err(|err| LoadError::invalid("logging.level", err.to_string()))?,
            None => LevelFilter::INFO,
        };
        let format = match self.json {
            Some(true) => LogFormat::Json,
            _ => LogFormat::Compact,
        };
        Ok(LoggingSettings { level, format })
    }
}

impl RawDatabaseSettings {
    fn resolve(self) -> Result<DatabaseSettings, LoadError> {
        let url = self
            .url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Ok(DatabaseSettings {
            url,
            http_max_connections: non_zero(
                self.http_max_connections,
                DEFAULT_DB_HTTP_MAX_CONNECTIONS,
                "database.http_max_connections",
            )?,
            jobs_max_connections: non_zero(
                self.jobs_max_connections,
                DEFAULT_DB_JOBS_MAX_CONNECTIONS,
                "database.jobs_max_connections",
            )?,
        })
    }
}

impl RawApiSettings {
    fn resolve(self) -> Result<ApiSettings, LoadError> {
        Ok(ApiSettings {
            base_url: base_url(self.base_url, DEFAULT_API_BASE_URL, "api.base_url")?,
            web_base_url: base_url(self.web_base_url, DEFAULT_WEB_BASE_URL, "api.web_base_url")?,
            doi_resolver: base_url(self.doi_resolver, DEFAULT_DOI_RESOLVER, "api.doi_resolver")?,
        })
    }
}

impl RawRenderSettings {
    fn resolve(self) -> Result<RenderSettings, LoadError> {
        let static_path = self
            .static_path
            .unwrap_or_else(|| DEFAULT_STATIC_PATH.to_string());
        if static_path.trim().is_empty() {
            return Err(LoadError::invalid("render.static_path", "must not be empty"));
        }

        let cache_dir = self
            .cache_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RENDER_CACHE_DIR));
        if cache_dir.as_os_str().is_empty() {
            return Err(LoadError::invalid("render.cache_dir", "must not be empty"));
        }

        Ok(RenderSettings {
            static_path,
            max_duration: seconds(
                self.max_duration_seconds,
                DEFAULT_RENDER_MAX_DURATION_SECS,
                "render.max_duration_seconds",
            )?,
            use_queue: self.use_queue.unwrap_or(false),
            cache_dir,
            command: self.command.filter(|command| !command.as_os_str().is_empty()),
            worker_concurrency: non_zero(
                self.worker_concurrency,
                DEFAULT_RENDER_WORKER_CONCURRENCY,
                "render.worker_concurrency",
            )?,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    http_max_connections: Option<u32>,
    jobs_max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    web_base_url: Option<String>,
    doi_resolver: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    static_path: Option<String>,
    max_duration_seconds: Option<u64>,
    use_queue: Option<bool>,
    cache_dir: Option<PathBuf>,
    command: Option<PathBuf>,
    worker_concurrency: Option<u32>,
}

fn positive<T: PartialEq + Default>(value: T, key: &'static str) -> Result<T, LoadError> {
    if value == T::default() {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(value)
}

fn seconds(value: Option<u64>, default: u64, key: &'static str) -> Result<Duration, LoadError> {
    positive(value.unwrap_or(default), key).map(Duration::from_secs)
}

fn non_zero(value: Option<u32>, default: u32, key: &'static str) -> Result<NonZeroU32, LoadError> {
    NonZeroU32::new(value.unwrap_or(default))
        .ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Parse a link base, appending the trailing `/` that relative joins rely on.
fn base_url(value: Option<String>, default: &str, key: &'static str) -> Result<Url, LoadError> {
    let mut raw = value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string());
    if !raw.ends_with('/') {
        raw.push('/');
    }
    let url = Url::parse(&raw).map_err(|err| LoadError::invalid(key, err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(LoadError::invalid(key, "must be an absolute base URL"));
    }
    Ok(url)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
