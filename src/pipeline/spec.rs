//! Typed pipeline configuration, parsed from spec blobs at reconcile time.
//!
//! The control plane stores sources, processors, and destinations as
//! `{type/mode, options}` mappings. The agent parses them into the tagged
//! variants below exactly once, when a runner is built, and fails fast on
//! unknown types or malformed options.

use crate::processors::IndexedOptions;
use crate::types::{DestinationConfig, ProcessorConfig, SourceConfig};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Spec parse errors; these abort the runner build, not the agent.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("unknown source type: {0}")]
    UnknownSource(String),
    #[error("unknown destination type: {0}")]
    UnknownDestination(String),
    #[error("unknown processor mode: {0}")]
    UnknownProcessor(String),
    #[error("invalid {section} options: {err}")]
    InvalidOptions {
        section: &'static str,
        err: serde_json::Error,
    },
}

fn parse_options<T: for<'de> Deserialize<'de>>(
    section: &'static str,
    options: &serde_json::Map<String, Value>,
) -> Result<T, SpecError> {
    serde_json::from_value(Value::Object(options.clone()))
        .map_err(|err| SpecError::InvalidOptions { section, err })
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_max_queue_size() -> usize {
    crate::sources::SyslogUdpSource::DEFAULT_QUEUE
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileTailOptions {
    pub path: String,
    #[serde(default)]
    pub from_start: bool,
    #[serde(default)]
    pub start_position: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyslogUdpSourceOptions {
    #[serde(default = "default_bind_host")]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

fn default_ingest_path() -> String {
    crate::sources::HttpListenerSource::DEFAULT_PATH.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpListenerOptions {
    #[serde(default = "default_bind_host")]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_ingest_path")]
    pub path: String,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

/// Typed source configuration.
#[derive(Debug, Clone)]
pub enum SourceSpec {
    FileTail(FileTailOptions),
    SyslogUdp(SyslogUdpSourceOptions),
    HttpListener(HttpListenerOptions),
}

impl SourceSpec {
    pub fn parse(config: &SourceConfig) -> Result<Self, SpecError> {
        match config.kind.as_str() {
            "file_tail" => Ok(Self::FileTail(parse_options("source", &config.options)?)),
            "syslog_udp" => Ok(Self::SyslogUdp(parse_options("source", &config.options)?)),
            "http_listener" => Ok(Self::HttpListener(parse_options("source", &config.options)?)),
            other => Err(SpecError::UnknownSource(other.to_string())),
        }
    }
}

fn default_file_format() -> String {
    "raw".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileDestinationOptions {
    pub path: String,
    #[serde(default = "default_file_format")]
    pub format: String,
}

fn default_http_timeout() -> f64 {
    crate::destinations::HttpDestination::DEFAULT_TIMEOUT
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpDestinationOptions {
    pub url: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: f64,
}

fn default_syslog_port() -> u16 {
    crate::destinations::SyslogUdpDestination::DEFAULT_PORT
}

fn default_syslog_pri() -> u32 {
    crate::destinations::SyslogUdpDestination::DEFAULT_PRI
}

fn default_syslog_appname() -> String {
    crate::destinations::SyslogUdpDestination::DEFAULT_APPNAME.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyslogUdpDestinationOptions {
    pub host: String,
    #[serde(default = "default_syslog_port")]
    pub port: u16,
    #[serde(default = "default_syslog_pri")]
    pub pri: u32,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default = "default_syslog_appname")]
    pub appname: String,
}

/// Typed destination configuration.
#[derive(Debug, Clone)]
pub enum DestinationSpec {
    File(FileDestinationOptions),
    Http(HttpDestinationOptions),
    SyslogUdp(SyslogUdpDestinationOptions),
}

impl DestinationSpec {
    pub fn parse(config: &DestinationConfig) -> Result<Self, SpecError> {
        match config.kind.as_str() {
            "file" => Ok(Self::File(parse_options("destination", &config.options)?)),
            "http" => Ok(Self::Http(parse_options("destination", &config.options)?)),
            "syslog_udp" => Ok(Self::SyslogUdp(parse_options("destination", &config.options)?)),
            other => Err(SpecError::UnknownDestination(other.to_string())),
        }
    }
}

/// Typed processor configuration.
#[derive(Debug, Clone)]
pub enum ProcessorSpec {
    Raw,
    Indexed(IndexedOptions),
}

impl ProcessorSpec {
    pub fn parse(config: &ProcessorConfig) -> Result<Self, SpecError> {
        match config.mode.as_str() {
            "raw" => Ok(Self::Raw),
            "indexed" => Ok(Self::Indexed(parse_options("processor", &config.options)?)),
            other => Err(SpecError::UnknownProcessor(other.to_string())),
        }
    }
}
