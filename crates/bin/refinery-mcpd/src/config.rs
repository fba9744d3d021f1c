use clap::Parser;
use std::error::Error;
use std::fmt;

const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
const ENV_SERVICE_KEY: &str = "SUPABASE_SERVICE_KEY";
const ENV_API_KEY: &str = "REFINERY_API_KEY";

#[derive(Parser, Debug)]
#[command(
    name = "refinery-mcpd",
    version,
    about = "MCP server for refinery conversations, columns and quotes."
)]
struct CliArgs {
    /// Base URL of the Supabase project, e.g. `https://xyz.supabase.co`.
    #[arg(long, env = ENV_SUPABASE_URL)]
    supabase_url: Option<String>,

    /// Service role key used for every backend request.
    #[arg(long, env = ENV_SERVICE_KEY, hide_env_values = true)]
    service_key: Option<String>,

    /// Refinery API key identifying the user this server acts for.
    #[arg(long, env = ENV_API_KEY, hide_env_values = true)]
    api_key: Option<String>,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
///
/// Holds credentials and has no `Debug` impl.
#[derive(Clone)]
pub struct RefineryConfig {
    pub supabase_url: String,
    pub service_key: String,
    pub api_key: String,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingSetting(&'static str),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting(name) => write!(f, "{name} is required"),
            Self::InvalidSetting { name, value } => {
                write!(f, "invalid {name} value: {value}")
            }
        }
    }
}

impl Error for ConfigError {}

impl RefineryConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingSetting(name))
}

impl TryFrom<CliArgs> for RefineryConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let supabase_url = required(args.supabase_url, ENV_SUPABASE_URL)?;
        let service_key = required(args.service_key, ENV_SERVICE_KEY)?;
        let api_key = required(args.api_key, ENV_API_KEY)?;

        if !(supabase_url.starts_with("https://") || supabase_url.starts_with("http://")) {
            return Err(ConfigError::InvalidSetting {
                name: ENV_SUPABASE_URL,
                value: supabase_url,
            });
        }

        Ok(Self {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            service_key,
            api_key,
        })
    }
}
