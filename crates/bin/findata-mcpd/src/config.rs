use clap::{Parser, builder::BoolishValueParser};
use findata_core::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use findata_core::{AccessContext, AccessInput, PaginationConfig, RateLimit, RateLimitConfig, Role};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_DB_NAMESPACE: &str = "findata";
const DEFAULT_DB_NAME: &str = "market";
const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:4020";
const DEFAULT_RATE_LIMIT: u32 = 60;
const DEFAULT_HEAVY_RATE_LIMIT: u32 = 30;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_MAX_SESSIONS: usize = 15;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";
const IN_MEMORY_ENDPOINT: &str = "mem://";

#[derive(Parser, Debug)]
#[command(name = "findata-mcpd", version, about = "Findata MCP daemon.")]
#[allow(clippy::struct_excessive_bools)]
struct CliArgs {
    #[arg(long, env = "FINDATA_DB_NAMESPACE", default_value = DEFAULT_DB_NAMESPACE)]
    db_namespace: String,

    #[arg(long, env = "FINDATA_DB_NAME", default_value = DEFAULT_DB_NAME)]
    db_name: String,

    #[arg(
        long,
        env = "FINDATA_DB_IN_MEMORY",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    db_in_memory: bool,

    #[arg(long, env = "FINDATA_DB_URI")]
    db_uri: Option<String>,

    #[arg(long, env = "FINDATA_DB_USERNAME")]
    db_username: Option<String>,

    #[arg(long, env = "FINDATA_DB_PASSWORD")]
    db_password: Option<String>,

    #[arg(
        long = "stdio",
        env = "FINDATA_ENABLE_STDIO",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(
        long,
        env = "FINDATA_MCP_SERVE",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    mcp_serve: bool,

    #[arg(long, env = "FINDATA_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(
        long,
        env = "FINDATA_RATE_LIMIT_ENABLED",
        default_value_t = true,
        value_parser = BoolishValueParser::new()
    )]
    rate_limit_enabled: bool,

    #[arg(long, env = "FINDATA_RATE_LIMIT_DEFAULT", default_value_t = DEFAULT_RATE_LIMIT)]
    rate_limit_default: u32,

    #[arg(long, env = "FINDATA_RATE_LIMIT_HEAVY", default_value_t = DEFAULT_HEAVY_RATE_LIMIT)]
    rate_limit_heavy: u32,

    #[arg(
        long,
        env = "FINDATA_RATE_LIMIT_WINDOW_SECS",
        default_value_t = DEFAULT_RATE_LIMIT_WINDOW_SECS
    )]
    rate_limit_window_secs: u64,

    #[arg(
        long,
        env = "FINDATA_RATE_LIMIT_PER_CALLER",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    rate_limit_per_caller: bool,

    #[arg(long, env = "FINDATA_RATE_LIMIT_SWEEP_SECS")]
    rate_limit_sweep_secs: Option<u64>,

    #[arg(long, env = "FINDATA_PAGE_DEFAULT", default_value_t = DEFAULT_PAGE_SIZE)]
    page_default: u32,

    #[arg(long, env = "FINDATA_PAGE_MAX", default_value_t = MAX_PAGE_SIZE)]
    page_max: u32,

    #[arg(long, env = "FINDATA_MAX_SESSIONS", default_value_t = DEFAULT_MAX_SESSIONS)]
    max_sessions: usize,

    #[arg(
        long,
        env = "FINDATA_CALL_TIMEOUT_SECS",
        default_value_t = DEFAULT_CALL_TIMEOUT_SECS
    )]
    call_timeout_secs: u64,

    #[arg(long, env = "FINDATA_DEFAULT_ROLE", default_value = "anonymous")]
    default_role: String,

    #[arg(long, env = "FINDATA_DEFAULT_USER_ID")]
    default_user_id: Option<String>,

    #[arg(long, env = "FINDATA_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct FindataConfig {
    pub db_namespace: String,
    pub db_name: String,
    pub db_in_memory: bool,
    /// `mem://` when in memory, otherwise the configured URI.
    pub db_endpoint: String,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    pub enable_stdio: bool,
    pub mcp_serve: bool,
    pub mcp_http_addr: SocketAddr,
    pub rate_limit: RateLimitConfig,
    pub rate_limit_sweep: Duration,
    pub pagination: PaginationConfig,
    pub max_sessions: usize,
    pub call_timeout: Duration,
    /// Caller identity for stdio and for HTTP calls without identity headers.
    pub default_access: AccessContext,
    pub log_level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),
    #[error("invalid {name} value: {value}")]
    InvalidSetting { name: &'static str, value: String },
}

impl FindataConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn positive<T: PartialEq + Default + ToString>(
    name: &'static str,
    value: T,
) -> Result<T, ConfigError> {
    if value == T::default() {
        return Err(ConfigError::InvalidSetting {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}

impl TryFrom<CliArgs> for FindataConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let db_uri = non_empty(args.db_uri);
        let db_username = non_empty(args.db_username);
        let db_password = non_empty(args.db_password);

        let db_in_memory = args.db_in_memory || db_uri.is_none();

        let db_endpoint = if db_in_memory {
            IN_MEMORY_ENDPOINT.to_string()
        } else {
            let Some(uri) = db_uri else {
                return Err(ConfigError::MissingSetting("FINDATA_DB_URI"));
            };
            if db_username.is_none() {
                return Err(ConfigError::MissingSetting("FINDATA_DB_USERNAME"));
            }
            if db_password.is_none() {
                return Err(ConfigError::MissingSetting("FINDATA_DB_PASSWORD"));
            }
            uri
        };

        if args.db_namespace.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "FINDATA_DB_NAMESPACE",
                value: args.db_namespace,
            });
        }
        if args.db_name.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "FINDATA_DB_NAME",
                value: args.db_name,
            });
        }

        if !args.enable_stdio && !args.mcp_serve {
            return Err(ConfigError::InvalidSetting {
                name: "FINDATA_MCP_SERVE",
                value: "false (and FINDATA_ENABLE_STDIO is false)".to_string(),
            });
        }

        let window = positive("FINDATA_RATE_LIMIT_WINDOW_SECS", args.rate_limit_window_secs)?;
        let default_limit = positive("FINDATA_RATE_LIMIT_DEFAULT", args.rate_limit_default)?;
        let heavy_limit = positive("FINDATA_RATE_LIMIT_HEAVY", args.rate_limit_heavy)?;
        let sweep_secs = positive(
            "FINDATA_RATE_LIMIT_SWEEP_SECS",
            args.rate_limit_sweep_secs.unwrap_or(window),
        )?;
        let mut rate_limit = RateLimitConfig::new(RateLimit::new(default_limit, window))
            .with_heavy(RateLimit::new(heavy_limit, window))
            .with_per_caller(args.rate_limit_per_caller);
        rate_limit.enabled = args.rate_limit_enabled;

        let page_default = positive("FINDATA_PAGE_DEFAULT", args.page_default)?;
        let page_max = positive("FINDATA_PAGE_MAX", args.page_max)?;
        if page_max < page_default {
            return Err(ConfigError::InvalidSetting {
                name: "FINDATA_PAGE_MAX",
                value: format!("{page_max} (below FINDATA_PAGE_DEFAULT {page_default})"),
            });
        }

        let role = args
            .default_role
            .parse::<Role>()
            .map_err(|_| ConfigError::InvalidSetting {
                name: "FINDATA_DEFAULT_ROLE",
                value: args.default_role.clone(),
            })?;
        let default_access = AccessContext::from_input(AccessInput {
            user_id: non_empty(args.default_user_id),
            role,
        })
        .map_err(|_| ConfigError::MissingSetting("FINDATA_DEFAULT_USER_ID"))?;

        Ok(Self {
            db_namespace: args.db_namespace,
            db_name: args.db_name,
            db_in_memory,
            db_endpoint,
            db_username,
            db_password,
            enable_stdio: args.enable_stdio,
            mcp_serve: args.mcp_serve,
            mcp_http_addr: args.mcp_http_addr,
            rate_limit,
            rate_limit_sweep: Duration::from_secs(sweep_secs),
            pagination: PaginationConfig::default()
                .with_default_limit(page_default)
                .with_max_limit(page_max),
            max_sessions: positive("FINDATA_MAX_SESSIONS", args.max_sessions)?,
            call_timeout: Duration::from_secs(positive(
                "FINDATA_CALL_TIMEOUT_SECS",
                args.call_timeout_secs,
            )?),
            default_access,
            log_level: args.log_level,
        })
    }
}
