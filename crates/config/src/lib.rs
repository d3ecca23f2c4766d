//! chwire Client Configuration
//!
//! Loads client options from a `key = value` file:
//!
//! ```text
//! # identity
//! client_name = reporting-job
//! version_major = 23
//! revision = 54453
//! compression = zstd
//!
//! # per-query settings
//! setting.max_threads = 8
//! important.readonly = 1
//! ```
//!
//! Loading is lenient: unknown keys and unparsable values are logged and the
//! default is kept. Only failing to read the file is an error.

use chwire_protocol::{ClientInfo, Compression, Method, Query, Revision, Setting};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Config loading errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

const SETTING_PREFIX: &str = "setting.";
const IMPORTANT_PREFIX: &str = "important.";

/// Client-side protocol options
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Client name sent in ClientInfo (from "client_name" option)
    pub client_name: String,
    /// Client version (from "version_major" / "version_minor" / "version_patch")
    pub version_major: u64,
    pub version_minor: u64,
    pub version_patch: u64,
    /// Protocol revision to speak (from "revision" option)
    pub revision: Revision,
    /// Block compression method (from "compression" option)
    pub compression: Method,
    /// OS user reported to the server (from "os_user" option)
    pub os_user: String,
    /// Hostname reported to the server (from "hostname" option)
    pub hostname: String,
    /// Quota key (from "quota_key" option)
    pub quota_key: String,
    /// Query settings, in file order (from "setting.*" / "important.*")
    pub settings: Vec<Setting>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: "chwire".into(),
            version_major: 1,
            version_minor: 0,
            version_patch: 0,
            revision: Revision::LATEST,
            compression: Method::Lz4,
            os_user: String::new(),
            hostname: String::new(),
            quota_key: String::new(),
            settings: vec![],
        }
    }
}

impl ClientConfig {
    /// Load configuration from a file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loaded client config");
        Ok(Self::parse(&content))
    }

    /// Parse config file content
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.split_once('=') {
                Some((key, value)) => config.parse_option(key.trim(), value.trim()),
                None => tracing::warn!(line = line_no + 1, "ignoring line without '='"),
            }
        }

        config
    }

    fn parse_option(&mut self, key: &str, value: &str) {
        if let Some(name) = key.strip_prefix(SETTING_PREFIX) {
            self.push_setting(Setting::new(name, value));
            return;
        }
        if let Some(name) = key.strip_prefix(IMPORTANT_PREFIX) {
            self.push_setting(Setting::important(name, value));
            return;
        }

        match key {
            "client_name" => self.client_name = value.into(),
            "version_major" => parse_into(key, value, &mut self.version_major),
            "version_minor" => parse_into(key, value, &mut self.version_minor),
            "version_patch" => parse_into(key, value, &mut self.version_patch),
            "revision" => {
                let mut revision = self.revision.get();
                parse_into(key, value, &mut revision);
                self.revision = Revision(revision);
            }
            "compression" => parse_into(key, value, &mut self.compression),
            "os_user" => self.os_user = value.into(),
            "hostname" => self.hostname = value.into(),
            "quota_key" => self.quota_key = value.into(),
            _ => tracing::warn!(key, "unknown config option"),
        }
    }

    fn push_setting(&mut self, setting: Setting) {
        if setting.key.is_empty() {
            // An empty key would terminate the list on the wire.
            tracing::warn!("ignoring setting with empty name");
            return;
        }
        self.settings.push(setting);
    }

    /// ClientInfo describing this client
    pub fn client_info(&self) -> ClientInfo {
        ClientInfo {
            os_user: self.os_user.clone(),
            hostname: self.hostname.clone(),
            client_name: self.client_name.clone(),
            major: self.version_major,
            minor: self.version_minor,
            patch: self.version_patch,
            protocol_revision: self.revision.get(),
            quota_key: self.quota_key.clone(),
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &[Setting] {
        &self.settings
    }

    /// Build a query carrying this client's info and settings.
    pub fn query(&self, id: impl Into<String>, body: impl Into<String>) -> Query {
        Query {
            info: self.client_info(),
            settings: self.settings.clone(),
            compression: match self.compression {
                Method::None => Compression::Disabled,
                Method::Lz4 | Method::Zstd => Compression::Enabled,
            },
            ..Query::new(id, body)
        }
    }

    /// Log the effective configuration
    pub fn display(&self) {
        tracing::info!("Client configuration:");
        tracing::info!(
            "  Client: {} {}.{}.{}",
            self.client_name,
            self.version_major,
            self.version_minor,
            self.version_patch
        );
        tracing::info!("  Revision: {}", self.revision);
        tracing::info!("  Compression: {}", self.compression);
        if !self.os_user.is_empty() || !self.hostname.is_empty() {
            tracing::info!("  Identity: {}@{}", self.os_user, self.hostname);
        }
        tracing::info!("  Settings: {}", self.settings.len());
        for s in &self.settings {
            tracing::info!("    {} = {}{}", s.key, s.value, if s.important { " (important)" } else { "" });
        }
    }
}

fn parse_into<T: FromStr>(key: &str, value: &str, slot: &mut T) {
    match value.parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value, "invalid value, keeping default"),
    }
}
