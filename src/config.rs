use anyhow::{Context, Result, anyhow};
use chrono::Weekday;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use crate::services::notifier::Channel;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    pub log_dir: String,
    pub log_level: tracing::Level,

    // Messaging provider (SMS / WhatsApp)
    pub messaging_provider_url: Option<String>,
    pub messaging_api_key: Option<String>,
    pub messaging_sender: String,
    pub messaging_channel: Channel,
    pub default_country_code: String,

    // Payroll and leave policy
    pub payroll_monthly_hours: f64,
    pub overtime_rate: f64,
    pub leave_days_per_month: f64,
    pub weekend_days: Vec<Weekday>,

    // Daily deadline check
    pub deadline_reminder_days: i64,
    pub deadline_check_hour: u32,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(key, default);
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("{key} has invalid value '{raw}': {e}"))
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parses a comma separated weekday list such as `sat,sun`.
pub fn parse_weekdays(raw: &str) -> Result<Vec<Weekday>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Weekday>()
                .map_err(|_| anyhow!("unknown weekday '{s}'"))
        })
        .collect()
}

impl Config {
    /// Loads `.env` (if present) and reads the configuration.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_env_only()
    }

    /// Reads the configuration from the process environment only.
    pub fn from_env_only() -> Result<Self> {
        let deadline_check_hour: u32 = parse_var("DEADLINE_CHECK_HOUR", "6")?;
        if deadline_check_hour > 23 {
            return Err(anyhow!(
                "DEADLINE_CHECK_HOUR must be between 0 and 23, got {deadline_check_hour}"
            ));
        }

        Ok(Self {
            server_addr: var_or("SERVER_ADDR", "127.0.0.1:8080"),
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            access_token_ttl: parse_var("ACCESS_TOKEN_TTL", "900")?, // 15 min
            refresh_token_ttl: parse_var("REFRESH_TOKEN_TTL", "604800")?, // 7 days

            rate_login_per_min: parse_var("RATE_LOGIN_PER_MIN", "60")?,
            rate_refresh_per_min: parse_var("RATE_REFRESH_PER_MIN", "30")?,
            rate_protected_per_min: parse_var("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: var_or("API_PREFIX", "/api"),

            log_dir: var_or("LOG_DIR", "logs"),
            log_level: parse_var("LOG_LEVEL", "info")?,

            messaging_provider_url: optional_var("MESSAGING_PROVIDER_URL"),
            messaging_api_key: optional_var("MESSAGING_API_KEY"),
            messaging_sender: var_or("MESSAGING_SENDER", "HR"),
            messaging_channel: parse_var("MESSAGING_CHANNEL", "sms")?,
            default_country_code: var_or("DEFAULT_COUNTRY_CODE", "212"),

            payroll_monthly_hours: parse_var("PAYROLL_MONTHLY_HOURS", "191")?,
            overtime_rate: parse_var("OVERTIME_RATE", "1.25")?,
            leave_days_per_month: parse_var("LEAVE_DAYS_PER_MONTH", "1.5")?,
            weekend_days: parse_weekdays(&var_or("WEEKEND_DAYS", "sat,sun"))?,

            deadline_reminder_days: parse_var("DEADLINE_REMINDER_DAYS", "1")?,
            deadline_check_hour,
        })
    }
}
