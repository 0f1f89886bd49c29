use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DbConfig,
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Either a full `url`, or the individual connection parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// libpq style ssl mode, e.g. "disable", "prefer", "require"
    #[serde(default = "default_sslmode")]
    pub sslmode: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            user: None,
            name: None,
            password: None,
            sslmode: default_sslmode(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_sslmode() -> String {
    "require".into()
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    /// Prefix for the client id; a random suffix is appended per connection.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: Option<u64>,
    pub clean_session: Option<bool>,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "temperature-context".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_api_host() -> String {
    "0.0.0.0".into()
}

fn default_api_port() -> u16 {
    8080
}

/// MQTT topic filters for the four inbound message shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_qos")]
    pub qos: u8,
    #[serde(default = "default_temperature_topic")]
    pub temperature_topic: String,
    #[serde(default = "default_water_temperature_topic")]
    pub water_temperature_topic: String,
    #[serde(default = "default_temperature_command_topic")]
    pub temperature_command_topic: String,
    #[serde(default = "default_water_temperature_command_topic")]
    pub water_temperature_command_topic: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            qos: default_qos(),
            temperature_topic: default_temperature_topic(),
            water_temperature_topic: default_water_temperature_topic(),
            temperature_command_topic: default_temperature_command_topic(),
            water_temperature_command_topic: default_water_temperature_command_topic(),
        }
    }
}

fn default_qos() -> u8 {
    1
}

fn default_temperature_topic() -> String {
    "telemetry/temperature".into()
}

fn default_water_temperature_topic() -> String {
    "telemetry/watertemperature".into()
}

fn default_temperature_command_topic() -> String {
    "commands/storetemperatureupdate".into()
}

fn default_water_temperature_command_topic() -> String {
    "commands/storewatertemperatureupdate".into()
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, anyhow::Error> {
        let expanded = expand_env_placeholders(raw)?;
        let mut cfg: Self = serde_yaml::from_str(&expanded)?;
        cfg.database.apply_env_overrides();

        anyhow::ensure!(
            cfg.database.url.is_some() || cfg.database.host.is_some(),
            "config must include database.url or database.host"
        );
        Ok(cfg)
    }
}

impl DbConfig {
    /// DATABASE_URL wins over everything; TEMPERATURE_DB_* override the parts.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.url = Some(url);
        }
        if let Ok(host) = std::env::var("TEMPERATURE_DB_HOST") {
            self.host = Some(host);
        }
        if let Ok(user) = std::env::var("TEMPERATURE_DB_USER") {
            self.user = Some(user);
        }
        if let Ok(name) = std::env::var("TEMPERATURE_DB_NAME") {
            self.name = Some(name);
        }
        if let Ok(password) = std::env::var("TEMPERATURE_DB_PASSWORD") {
            self.password = Some(password);
        }
        if let Ok(sslmode) = std::env::var("TEMPERATURE_DB_SSLMODE") {
            self.sslmode = sslmode;
        }
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
/// "$$" becomes a literal "$".
fn expand_env_placeholders(input: &str) -> Result<String, anyhow::Error> {
    use anyhow::Context;

    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let close = match it.peek().copied() {
            Some('$') => {
                it.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                continue;
            }
        };
        it.next();
        let var = read_until(&mut it, close)
            .with_context(|| format!("unterminated env placeholder: missing '{close}'"))?;
        let val = std::env::var(&var)
            .with_context(|| format!("missing environment variable: {}", var))?;
        out.push_str(&val);
    }

    Ok(out)
}

/// Read characters until we hit `end`, consuming it.
fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}
