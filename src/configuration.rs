use crate::release::ReleasePolicy;
use secrecy::{ExposeSecret, Secret};
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::ConnectOptions;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub newsletter: NewsletterSettings,
    pub tokens: TokenSettings,
    pub cleanup: CleanupSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    /// Public URL of the site, used to build links embedded in emails.
    pub base_url: String,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    // Determine if we demand the connection to be encrypted or not
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            // Try an encrypted connection, fallback to unencrypted if it fails
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(self.password.expose_secret())
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        let mut options = self.without_db().database(&self.database_name);
        options.log_statements(tracing::log::LevelFilter::Trace);
        options
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct NewsletterSettings {
    pub sender: String,
    pub subject: String,
    pub unsubscribe_path: String,
    pub emails_per_day: u32,
    pub unsubscribe_token_ttl_days: i64,
    pub release_timeout_seconds: u64,
}

#[derive(serde::Deserialize, Clone)]
pub struct TokenSettings {
    pub signing_key: Secret<String>,
}

#[derive(serde::Deserialize, Clone)]
pub struct CleanupSettings {
    /// Unverified subscribers older than this are deleted.
    pub unverified_max_age_hours: i64,
    pub interval_seconds: u64,
}

/// Unsubscribe links live at most a century.
const MAX_TOKEN_TTL_DAYS: i64 = 36_500;

impl Settings {
    pub fn release_policy(&self) -> Result<ReleasePolicy, String> {
        let ttl_days = self.newsletter.unsubscribe_token_ttl_days;
        if !(1..=MAX_TOKEN_TTL_DAYS).contains(&ttl_days) {
            return Err(format!(
                "newsletter.unsubscribe_token_ttl_days must be between 1 and {MAX_TOKEN_TTL_DAYS}, got {ttl_days}."
            ));
        }
        Ok(ReleasePolicy {
            emails_per_day: self.newsletter.emails_per_day,
            unsubscribe_token_ttl: chrono::Duration::days(ttl_days),
            timeout: std::time::Duration::from_secs(self.newsletter.release_timeout_seconds),
            sender: self.newsletter.sender.clone(),
            subject: self.newsletter.subject.clone(),
            base_url: self.application.base_url.clone(),
            unsubscribe_path: self.newsletter.unsubscribe_path.clone(),
        })
    }
}

/// The possible runtime environment for our application.
#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{other} is not a supported environment. Use either `local` or `production`."
            )),
        }
    }
}

/// Layers `configuration/base.yaml`, the environment specific file selected by `APP_ENVIRONMENT`
/// (defaults to `local`) and `APP_`-prefixed environment variables, e.g. `APP_DATABASE__PORT`.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .expect("Failed to parse APP_ENVIRONMENT.");
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
