use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::sync::LazyLock;

use crate::Config;
use crate::shared::ValidationError;

/// Session settings shared by every connection the pipeline opens.
const COMMON_DATESTYLE: &str = "ISO";
const COMMON_CLIENT_ENCODING: &str = "UTF8";
const COMMON_TIMEZONE: &str = "UTC";

const APP_NAME_SOURCE: &str = "scd2_pipeline_source";
const APP_NAME_DESTINATION: &str = "scd2_pipeline_destination";
const APP_NAME_AUDIT: &str = "scd2_pipeline_audit";

/// Options for reading the source tables. Reads may scan whole tables, so statements get a
/// generous timeout.
pub static SCD2_SOURCE_OPTIONS: LazyLock<PgConnectionOptions> =
    LazyLock::new(|| PgConnectionOptions {
        datestyle: COMMON_DATESTYLE.to_string(),
        client_encoding: COMMON_CLIENT_ENCODING.to_string(),
        timezone: COMMON_TIMEZONE.to_string(),
        statement_timeout: 300_000,
        lock_timeout: 10_000,
        idle_in_transaction_session_timeout: 60_000,
        application_name: APP_NAME_SOURCE.to_string(),
    });

/// Options for the merge transaction against the history table.
pub static SCD2_DESTINATION_OPTIONS: LazyLock<PgConnectionOptions> =
    LazyLock::new(|| PgConnectionOptions {
        datestyle: COMMON_DATESTYLE.to_string(),
        client_encoding: COMMON_CLIENT_ENCODING.to_string(),
        timezone: COMMON_TIMEZONE.to_string(),
        statement_timeout: 300_000,
        lock_timeout: 30_000,
        idle_in_transaction_session_timeout: 300_000,
        application_name: APP_NAME_DESTINATION.to_string(),
    });

/// Options for run-log writes, which are tiny and must fail fast.
pub static SCD2_AUDIT_OPTIONS: LazyLock<PgConnectionOptions> =
    LazyLock::new(|| PgConnectionOptions {
        datestyle: COMMON_DATESTYLE.to_string(),
        client_encoding: COMMON_CLIENT_ENCODING.to_string(),
        timezone: COMMON_TIMEZONE.to_string(),
        statement_timeout: 5_000,
        lock_timeout: 5_000,
        idle_in_transaction_session_timeout: 30_000,
        application_name: APP_NAME_AUDIT.to_string(),
    });

/// Postgres session parameters applied when a connection is established.
#[derive(Debug, Clone)]
pub struct PgConnectionOptions {
    pub datestyle: String,
    pub client_encoding: String,
    pub timezone: String,
    pub statement_timeout: u32,
    pub lock_timeout: u32,
    pub idle_in_transaction_session_timeout: u32,
    pub application_name: String,
}

impl PgConnectionOptions {
    pub fn to_key_value_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("datestyle".to_string(), self.datestyle.clone()),
            ("client_encoding".to_string(), self.client_encoding.clone()),
            ("timezone".to_string(), self.timezone.clone()),
            (
                "statement_timeout".to_string(),
                self.statement_timeout.to_string(),
            ),
            ("lock_timeout".to_string(), self.lock_timeout.to_string()),
            (
                "idle_in_transaction_session_timeout".to_string(),
                self.idle_in_transaction_session_timeout.to_string(),
            ),
            ("application_name".to_string(), self.application_name.clone()),
        ]
    }
}

/// Connection settings for a Postgres database.
///
/// This intentionally does not implement [`Serialize`] to avoid leaking the password.
#[derive(Debug, Clone, Deserialize)]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: Option<SecretString>,
    #[serde(default = "TlsConfig::disabled")]
    pub tls: TlsConfig,
}

impl PgConnectionConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("connection.name".to_string()));
        }

        self.tls.validate()
    }
}

impl Config for PgConnectionConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub trusted_root_certs: String,
    pub enabled: bool,
}

impl TlsConfig {
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: String::new(),
            enabled: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.trim().is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}

/// Conversion of a connection config into driver connect options.
pub trait IntoConnectOptions<Output> {
    fn without_db(&self, options: Option<&PgConnectionOptions>) -> Output;
    fn with_db(&self, options: Option<&PgConnectionOptions>) -> Output;
}

impl IntoConnectOptions<PgConnectOptions> for PgConnectionConfig {
    fn without_db(&self, options: Option<&PgConnectionOptions>) -> PgConnectOptions {
        let ssl_mode = if self.tls.enabled {
            PgSslMode::VerifyFull
        } else {
            PgSslMode::Prefer
        };
        let mut connect_options = PgConnectOptions::new_without_pgpass()
            .host(&self.host)
            .username(&self.username)
            .port(self.port)
            .ssl_mode(ssl_mode);

        if self.tls.enabled {
            connect_options =
                connect_options.ssl_root_cert_from_pem(self.tls.trusted_root_certs.clone().into_bytes());
        }

        if let Some(password) = &self.password {
            connect_options = connect_options.password(password.expose_secret());
        }

        if let Some(options) = options {
            connect_options = connect_options.options(options.to_key_value_pairs());
        }

        connect_options
    }

    fn with_db(&self, options: Option<&PgConnectionOptions>) -> PgConnectOptions {
        let connect_options: PgConnectOptions = self.without_db(options);
        connect_options.database(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_options_fail_fast() {
        assert_eq!(SCD2_AUDIT_OPTIONS.statement_timeout, 5_000);
        assert_eq!(SCD2_AUDIT_OPTIONS.application_name, "scd2_pipeline_audit");
    }

    #[test]
    fn options_render_every_session_parameter() {
        let pairs = SCD2_DESTINATION_OPTIONS.to_key_value_pairs();
        let keys: Vec<&str> = pairs.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "datestyle",
                "client_encoding",
                "timezone",
                "statement_timeout",
                "lock_timeout",
                "idle_in_transaction_session_timeout",
                "application_name",
            ]
        );
    }

    #[test]
    fn tls_requires_root_certs_when_enabled() {
        let tls = TlsConfig {
            trusted_root_certs: " ".to_string(),
            enabled: true,
        };
        assert_eq!(tls.validate(), Err(ValidationError::MissingTrustedRootCerts));
        assert!(TlsConfig::disabled().validate().is_ok());
    }
}
