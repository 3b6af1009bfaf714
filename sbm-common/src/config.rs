//! Configuration loading and settings resolution
//!
//! Settings are resolved per key in priority order:
//! 1. Environment variable (`SBM_*`)
//! 2. TOML config file
//! 3. Built-in default (only for optional settings)
//!
//! The TOML file is located by, in order: explicit path (command line),
//! `SBM_CONFIG`, then `<config_dir>/sbm/config.toml` when it exists.
//! A missing default file is not an error; required settings must then come
//! from the environment.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "SBM_CONFIG";

const DEFAULT_SPOTIFY_API_URL: &str = "https://api.spotify.com/v1/";
const DEFAULT_SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_SEARCH_LIMIT: u32 = 20;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Raw TOML configuration file contents
///
/// Every field is optional here; required-ness is enforced by [`Settings::resolve`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// User-Agent sent to both external services
    pub user_agent: Option<String>,
    /// Transport-error retries per request, for both services
    pub retry_count: Option<u32>,
    pub musicbrainz: MusicBrainzToml,
    pub spotify: SpotifyToml,
    pub matching: MatchingToml,
    pub logging: LoggingConfig,
}

/// `[musicbrainz]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MusicBrainzToml {
    pub api_url: Option<String>,
    pub requests_per_second: Option<f64>,
    pub search_limit: Option<u32>,
}

/// `[spotify]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpotifyToml {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub requests_per_second: Option<f64>,
    pub api_url: Option<String>,
    pub token_url: Option<String>,
}

/// `[matching]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MatchingToml {
    pub query_release: Option<bool>,
    pub preferred_country: Option<String>,
}

/// `[logging]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }
}

/// Locate the config file to read, if any
///
/// An explicit path (argument or `SBM_CONFIG`) is returned even when it does
/// not exist so that the caller reports it; the platform default is only
/// returned when present.
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("sbm").join("config.toml"))
        .filter(|p| p.exists())
}

/// How the source catalog (Spotify) is authenticated
#[derive(Debug, Clone, PartialEq)]
pub enum SpotifyCredentials {
    /// Pre-issued bearer token, validated once at startup and never refreshed
    AccessToken(String),
    /// OAuth client-credentials flow
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
}

/// Reference catalog (MusicBrainz) settings
#[derive(Debug, Clone, PartialEq)]
pub struct MusicBrainzSettings {
    /// Base URL of the web service, always ending in `/`
    pub api_url: String,
    pub requests_per_second: f64,
    /// Result-count `limit` sent with release searches
    pub search_limit: u32,
}

/// Source catalog (Spotify) settings
#[derive(Debug, Clone, PartialEq)]
pub struct SpotifySettings {
    pub credentials: SpotifyCredentials,
    pub requests_per_second: f64,
    /// Web API base URL, always ending in `/`
    pub api_url: String,
    pub token_url: String,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub musicbrainz: MusicBrainzSettings,
    pub spotify: SpotifySettings,
    /// Deep-query mode: fetch full release detail for every candidate
    pub query_release: bool,
    /// Optional ISO country code favoured when scoring
    pub preferred_country: Option<String>,
    /// Transport-error retries per request on either queue (0 = surface immediately)
    pub retry_count: u32,
    pub user_agent: String,
    pub log_level: String,
}

/// Default User-Agent identifying the client and a contact address
pub fn default_user_agent() -> String {
    format!("sbm-match/{} ( sbm@localhost )", env!("CARGO_PKG_VERSION"))
}

impl Settings {
    /// Load settings from the process environment and the located TOML file
    pub fn load(explicit_config: Option<&Path>) -> Result<Self> {
        let toml_config = match locate_config_file(explicit_config) {
            Some(path) => {
                debug!(path = %path.display(), "Loading config file");
                TomlConfig::load(&path)?
            }
            None => {
                warn!("No config file found, using environment only");
                TomlConfig::default()
            }
        };

        Self::resolve(&toml_config, |key| std::env::var(key).ok())
    }

    /// Resolve settings from a parsed TOML file and an environment lookup
    ///
    /// The lookup is injected so resolution can be tested without touching
    /// the process environment.
    pub fn resolve<F>(toml_config: &TomlConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mb = &toml_config.musicbrainz;
        let sp = &toml_config.spotify;

        let api_url = pick_string(&env, "SBM_MUSICBRAINZ_API_URL", mb.api_url.as_ref())
            .ok_or_else(|| missing("SBM_MUSICBRAINZ_API_URL", "musicbrainz.api_url"))?;

        let mb_rate = pick_parsed(
            &env,
            "SBM_MUSICBRAINZ_REQUESTS_PER_SECOND",
            mb.requests_per_second,
            parse_f64,
        )?
        .ok_or_else(|| {
            missing(
                "SBM_MUSICBRAINZ_REQUESTS_PER_SECOND",
                "musicbrainz.requests_per_second",
            )
        })?;

        let search_limit =
            pick_parsed(&env, "SBM_MUSICBRAINZ_SEARCH_LIMIT", mb.search_limit, parse_u32)?
                .unwrap_or(DEFAULT_SEARCH_LIMIT);

        let retry_count =
            pick_parsed(&env, "SBM_RETRY_COUNT", toml_config.retry_count, parse_u32)?.unwrap_or(0);

        let sp_rate = pick_parsed(
            &env,
            "SBM_SPOTIFY_REQUESTS_PER_SECOND",
            sp.requests_per_second,
            parse_f64,
        )?
        .ok_or_else(|| {
            missing(
                "SBM_SPOTIFY_REQUESTS_PER_SECOND",
                "spotify.requests_per_second",
            )
        })?;

        let credentials = resolve_spotify_credentials(&env, sp)?;

        let sp_api_url = pick_string(&env, "SBM_SPOTIFY_API_URL", sp.api_url.as_ref())
            .unwrap_or_else(|| DEFAULT_SPOTIFY_API_URL.to_string());
        let sp_token_url = pick_string(&env, "SBM_SPOTIFY_TOKEN_URL", sp.token_url.as_ref())
            .unwrap_or_else(|| DEFAULT_SPOTIFY_TOKEN_URL.to_string());

        let query_release = pick_parsed(
            &env,
            "SBM_QUERY_RELEASE",
            toml_config.matching.query_release,
            parse_bool,
        )?
        .unwrap_or(false);

        let preferred_country = pick_string(
            &env,
            "SBM_PREFERRED_COUNTRY",
            toml_config.matching.preferred_country.as_ref(),
        )
        .map(|c| c.trim().to_ascii_uppercase());

        let user_agent = pick_string(&env, "SBM_USER_AGENT", toml_config.user_agent.as_ref())
            .unwrap_or_else(default_user_agent);

        let log_level = pick_string(&env, "SBM_LOG_LEVEL", toml_config.logging.level.as_ref())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Ok(Self {
            musicbrainz: MusicBrainzSettings {
                api_url: with_trailing_slash(api_url),
                requests_per_second: validate_rate("musicbrainz.requests_per_second", mb_rate)?,
                search_limit,
            },
            spotify: SpotifySettings {
                credentials,
                requests_per_second: validate_rate("spotify.requests_per_second", sp_rate)?,
                api_url: with_trailing_slash(sp_api_url),
                token_url: sp_token_url,
            },
            query_release,
            preferred_country,
            retry_count,
            user_agent,
            log_level,
        })
    }
}

fn resolve_spotify_credentials<F>(env: &F, sp: &SpotifyToml) -> Result<SpotifyCredentials>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = pick_string(env, "SBM_SPOTIFY_ACCESS_TOKEN", sp.access_token.as_ref()) {
        return Ok(SpotifyCredentials::AccessToken(token));
    }

    let client_id = pick_string(env, "SBM_SPOTIFY_CLIENT_ID", sp.client_id.as_ref())
        .ok_or_else(|| missing("SBM_SPOTIFY_CLIENT_ID", "spotify.client_id"))?;
    let client_secret = pick_string(env, "SBM_SPOTIFY_CLIENT_SECRET", sp.client_secret.as_ref())
        .ok_or_else(|| missing("SBM_SPOTIFY_CLIENT_SECRET", "spotify.client_secret"))?;

    Ok(SpotifyCredentials::ClientCredentials {
        client_id,
        client_secret,
    })
}

/// Validate a value is present (non-empty, non-whitespace)
pub fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}

fn pick_string<F>(env: &F, var: &str, toml_value: Option<&String>) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    env(var)
        .filter(|v| is_present(v))
        .or_else(|| toml_value.filter(|v| is_present(v)).cloned())
        .map(|v| v.trim().to_string())
}

fn pick_parsed<F, T>(
    env: &F,
    var: &str,
    toml_value: Option<T>,
    parse: fn(&str, &str) -> Result<T>,
) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
{
    match env(var).filter(|v| is_present(v)) {
        Some(raw) => parse(var, raw.trim()).map(Some),
        None => Ok(toml_value),
    }
}

fn parse_f64(var: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|e| Error::Config(format!("{} must be a number, got '{}': {}", var, raw, e)))
}

fn parse_u32(var: &str, raw: &str) -> Result<u32> {
    raw.parse::<u32>().map_err(|e| {
        Error::Config(format!(
            "{} must be a non-negative integer, got '{}': {}",
            var, raw, e
        ))
    })
}

fn parse_bool(var: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{} must be true or false, got '{}'",
            var, raw
        ))),
    }
}

/// Spacing between dispatches for a requests-per-second rate
///
/// Rejects rates that are not positive and finite, and rates whose period is
/// zero or does not fit a [`Duration`].
pub fn dispatch_interval(name: &str, rate: f64) -> Result<Duration> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(Error::Config(format!(
            "{} must be a positive number, got {}",
            name, rate
        )));
    }

    Duration::try_from_secs_f64(rate.recip())
        .ok()
        .filter(|period| !period.is_zero())
        .ok_or_else(|| {
            Error::Config(format!(
                "{} of {} gives no usable dispatch interval",
                name, rate
            ))
        })
}

fn validate_rate(name: &str, rate: f64) -> Result<f64> {
    dispatch_interval(name, rate).map(|_| rate)
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

fn missing(env_var: &str, toml_key: &str) -> Error {
    Error::Config(format!(
        "{} is not set (environment variable {} or TOML key {})",
        toml_key, env_var, toml_key
    ))
}
