//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Artifactory secrets backend - scoped, short-lived Artifactory tokens from one admin credential
#[derive(Parser, Debug)]
#[command(name = "artifactory-secrets")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "ARTIFACTORY_SECRETS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "ARTIFACTORY_SECRETS_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "ARTIFACTORY_SECRETS_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "ARTIFACTORY_SECRETS_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "ARTIFACTORY_SECRETS_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default)
    Serve,

    /// Decode an Artifactory access token's claims without calling Artifactory
    Introspect {
        /// Access token to decode
        #[arg(required = true, env = "ARTIFACTORY_SECRETS_INTROSPECT_TOKEN", hide_env_values = true)]
        token: String,
    },
}
