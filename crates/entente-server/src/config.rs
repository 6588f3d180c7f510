//! Server configuration loading from file and environment variables.

use std::collections::BTreeSet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use entente_types::{
    ComplianceAttestation, FederationKey, FederationSettings, OrganizationIdentity,
    OrganizationRole, TrustLevel, TypesError,
};
use serde::Deserialize;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// The organization this node speaks for.
    #[serde(default)]
    pub organization: OrganizationConfig,

    /// Protocol timing and transport settings.
    #[serde(default)]
    pub federation: FederationSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Identity of the local organization.
#[derive(Clone, Deserialize)]
pub struct OrganizationConfig {
    /// Stable organization identifier.
    #[serde(default = "default_org_id")]
    pub org_id: String,

    /// Display name.
    #[serde(default = "default_org_name")]
    pub name: String,

    /// Domain peers discover this node under.
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Role within the federation.
    #[serde(default = "default_role")]
    pub role: OrganizationRole,

    /// Base URL of this node's federation API.
    #[serde(default = "default_federation_endpoint")]
    pub federation_endpoint: String,

    /// Hex federation key. A fresh key is generated when absent.
    #[serde(default)]
    pub key_hex: Option<String>,

    /// Compliance frameworks the organization claims.
    #[serde(default)]
    pub compliance_frameworks: BTreeSet<String>,

    /// Attestations served to peers verifying this organization's
    /// compliance. Each one also adds its framework to the identity.
    #[serde(default)]
    pub attestations: Vec<ComplianceAttestation>,
}

impl fmt::Debug for OrganizationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrganizationConfig")
            .field("org_id", &self.org_id)
            .field("name", &self.name)
            .field("domain", &self.domain)
            .field("role", &self.role)
            .field("federation_endpoint", &self.federation_endpoint)
            .field("key_hex", &self.key_hex.as_ref().map(|_| "[REDACTED]"))
            .field("compliance_frameworks", &self.compliance_frameworks)
            .field("attestations", &self.attestations.len())
            .finish()
    }
}

impl OrganizationConfig {
    /// Loads the configured key, or generates one if none is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] if `key_hex` is not a valid key.
    pub fn federation_key(&self) -> Result<FederationKey, ConfigError> {
        match &self.key_hex {
            Some(hex) => Ok(FederationKey::from_hex(hex)?),
            None => {
                tracing::warn!(
                    org_id = %self.org_id,
                    "no federation key configured, generated an ephemeral key"
                );
                Ok(FederationKey::generate())
            }
        }
    }

    /// The identity document published for this organization.
    pub fn identity(&self, key: &FederationKey) -> OrganizationIdentity {
        OrganizationIdentity {
            org_id: self.org_id.clone(),
            name: self.name.clone(),
            domain: self.domain.clone(),
            public_key: key.verification_key(),
            federation_endpoint: self.federation_endpoint.clone(),
            role: self.role,
            trust_level: TrustLevel::Full,
            compliance_frameworks: self.compliance_frameworks.clone(),
            last_verified: None,
            metadata: Default::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "entente_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_org_id() -> String {
    "local-org".to_string()
}

fn default_org_name() -> String {
    "Local Organization".to_string()
}

fn default_domain() -> String {
    "localhost:3000".to_string()
}

fn default_role() -> OrganizationRole {
    OrganizationRole::Member
}

fn default_federation_endpoint() -> String {
    "http://localhost:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self {
            org_id: default_org_id(),
            name: default_org_name(),
            domain: default_domain(),
            role: default_role(),
            federation_endpoint: default_federation_endpoint(),
            key_hex: None,
            compliance_frameworks: BTreeSet::new(),
            attestations: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configured federation key is malformed.
    #[error("invalid federation key: {0}")]
    InvalidKey(#[from] TypesError),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `ENTENTE_HOST` overrides `server.host`
/// - `ENTENTE_PORT` overrides `server.port`
/// - `ENTENTE_ORG_ID` overrides `organization.org_id`
/// - `ENTENTE_DOMAIN` overrides `organization.domain`
/// - `ENTENTE_FEDERATION_ENDPOINT` overrides `organization.federation_endpoint`
/// - `ENTENTE_KEY_HEX` overrides `organization.key_hex`
/// - `ENTENTE_LOG_LEVEL` overrides `logging.level`
/// - `ENTENTE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Applies `ENTENTE_*` overrides looked up through `lookup`.
///
/// Unparseable host and port values are ignored.
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup("ENTENTE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("ENTENTE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(org_id) = lookup("ENTENTE_ORG_ID") {
        config.organization.org_id = org_id;
    }
    if let Some(domain) = lookup("ENTENTE_DOMAIN") {
        config.organization.domain = domain;
    }
    if let Some(endpoint) = lookup("ENTENTE_FEDERATION_ENDPOINT") {
        config.organization.federation_endpoint = endpoint;
    }
    if let Some(key_hex) = lookup("ENTENTE_KEY_HEX") {
        config.organization.key_hex = Some(key_hex);
    }
    if let Some(level) = lookup("ENTENTE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("ENTENTE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}
