use std::{env, time::Duration};

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_PIA_API_URL: &str = "http://localhost:8080/api/orders";
const DEFAULT_SUPPORT_PHONE: &str = "+91 98765 43210";
const DEFAULT_COMPANY_NAME: &str = "PrintJoy";
const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub support_phone: String,
    pub company_name: String,
    pub pia: PiaConfig,
    pub llm: LlmConfig,
    pub conversation_log_url: Option<String>,
    pub outbound_timeout: Duration,
    pub botspace: BotSpaceConfig,
    pub session_ttl: Duration,
    pub session_sweep_every: Duration,
}

#[derive(Debug, Clone)]
pub struct PiaConfig {
    pub api_url: String,
    pub token: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct BotSpaceConfig {
    pub api_url: Option<String>,
    pub api_key: String,
    pub webhook_secret: String,
    pub max_retries: u32,
}

impl Config {
    /// Builds the configuration from the process environment. Call
    /// `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str, default: u64| {
            text(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        let port = text("PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            host: text("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            support_phone: text("SUPPORT_PHONE")
                .unwrap_or_else(|| DEFAULT_SUPPORT_PHONE.to_string()),
            company_name: text("COMPANY_NAME").unwrap_or_else(|| DEFAULT_COMPANY_NAME.to_string()),
            pia: PiaConfig {
                api_url: text("PIA_API_URL").unwrap_or_else(|| DEFAULT_PIA_API_URL.to_string()),
                token: text("PIA_API_TOKEN").unwrap_or_default(),
                timeout: Duration::from_secs(number("PIA_TIMEOUT_SECS", 10)),
            },
            llm: LlmConfig {
                api_url: text("OPENAI_API_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_API_URL.to_string()),
                api_key: text("OPENAI_API_KEY").unwrap_or_default(),
                model: text("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            },
            conversation_log_url: text("CONVERSATION_LOG_URL"),
            outbound_timeout: Duration::from_secs(number("OUTBOUND_TIMEOUT_SECS", 8)),
            botspace: BotSpaceConfig {
                api_url: text("BOTSPACE_API_URL"),
                api_key: text("BOTSPACE_API_KEY").unwrap_or_default(),
                webhook_secret: text("BOTSPACE_WEBHOOK_SECRET").unwrap_or_default(),
                max_retries: number("BOTSPACE_MAX_RETRIES", 3) as u32,
            },
            session_ttl: Duration::from_secs(number("SESSION_TTL_HOURS", 24) * 60 * 60),
            session_sweep_every: Duration::from_secs(number("SESSION_SWEEP_MINUTES", 60) * 60),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
