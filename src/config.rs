use clap::error::ErrorKind;
use clap::Parser;
use thiserror::Error;

/// Exit codes for the `queued` binary.
pub mod exit_code {
    pub const USAGE: i32 = 1;
    pub const OPTS: i32 = 3;
    pub const BAD_INT: i32 = 5;
}

pub const DEFAULT_HOST: &str = "0.0.0.0";

/// queued - a simple queue exposed on the network.
#[derive(Parser, Debug)]
#[command(name = "queued", version, about)]
pub struct Cli {
    /// A bindable port number
    pub port: String,

    /// Allow duplicate items in the queue. This setting affects every queue
    #[arg(long = "allow-dups")]
    pub allow_dups: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allow_duplicates: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 9001,
            allow_duplicates: false,
        }
    }
}

/// Why the command line could not be turned into a [`ServerConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Help or version was requested; the rendered text is attached.
    #[error("{}", .0.trim_end())]
    Usage(String),

    #[error("{}", .0.trim_end())]
    Opts(String),

    #[error("Error parsing '{0}' expected an int")]
    BadPort(String),
}

impl ConfigError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::Usage(_) => exit_code::USAGE,
            ConfigError::Opts(_) => exit_code::OPTS,
            ConfigError::BadPort(_) => exit_code::BAD_INT,
        }
    }
}

impl ServerConfig {
    /// Parse process arguments. The bind host comes from `QUEUED_HOST`.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args).map_err(|e| match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                ConfigError::Usage(e.render().to_string())
            }
            _ => ConfigError::Opts(e.render().to_string()),
        })?;

        let port = cli
            .port
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::BadPort(cli.port.clone()))?;

        let host = std::env::var("QUEUED_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());

        Ok(Self {
            host,
            port,
            allow_duplicates: cli.allow_dups,
        })
    }
}
