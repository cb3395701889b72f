use std::env;

use chrono::Duration;
use ckb_common::Secret;
use kassa_engine::{db_types::UserId, AuthPolicy};
use log::*;

const DEFAULT_DB_URL: &str = "sqlite://data/kassa.db";
const DEFAULT_CAPTCHA_TIMEOUT_MINUTES: i64 = 5;
const DEFAULT_EXTEND_WINDOW_MINUTES: i64 = 60;
const DEFAULT_CONTACT_HANDLE: &str = "@kassa_support";

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub database_url: String,
    /// The single chat that receives order briefs and decides them.
    pub operator_id: UserId,
    pub admin_ids: Vec<UserId>,
    /// Validity of a captcha challenge, and the re-verification cooldown.
    pub captcha_timeout: Duration,
    /// How much one operator `/extend` adds to the service window.
    pub extend_window: Duration,
    pub bot_token: Secret<String>,
    /// Shown to users in "contact support" messages.
    pub contact_handle: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DB_URL.to_string(),
            operator_id: UserId(0),
            admin_ids: Vec::new(),
            captcha_timeout: Duration::minutes(DEFAULT_CAPTCHA_TIMEOUT_MINUTES),
            extend_window: Duration::minutes(DEFAULT_EXTEND_WINDOW_MINUTES),
            bot_token: Secret::default(),
            contact_handle: DEFAULT_CONTACT_HANDLE.to_string(),
        }
    }
}

impl BotConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("KASSA_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ KASSA_DATABASE_URL is not set. Using the default, {DEFAULT_DB_URL}.");
            DEFAULT_DB_URL.to_string()
        });
        let operator_id = env::var("KASSA_OPERATOR_ID")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| error!("🪛️ '{s}' is not a valid chat id for KASSA_OPERATOR_ID. {e}"))
                    .ok()
            })
            .map(UserId)
            .unwrap_or_else(|| {
                error!("🪛️ KASSA_OPERATOR_ID is not set. Nobody will be able to decide orders.");
                UserId(0)
            });
        let admin_ids = env::var("KASSA_ADMIN_IDS").map(|s| parse_admin_ids(&s)).unwrap_or_else(|_| {
            warn!("🪛️ KASSA_ADMIN_IDS is not set. No admin commands will be accepted.");
            Vec::new()
        });
        let captcha_timeout = minutes_from_env("KASSA_CAPTCHA_TIMEOUT_MINUTES", DEFAULT_CAPTCHA_TIMEOUT_MINUTES);
        let extend_window = minutes_from_env("KASSA_EXTEND_WINDOW_MINUTES", DEFAULT_EXTEND_WINDOW_MINUTES);
        let bot_token = env::var("KASSA_BOT_TOKEN").map(Secret::from).unwrap_or_else(|_| {
            warn!("🪛️ KASSA_BOT_TOKEN is not set. The transport will not be able to authenticate.");
            Secret::default()
        });
        let contact_handle = env::var("KASSA_CONTACT_HANDLE").ok().unwrap_or_else(|| {
            info!("🪛️ KASSA_CONTACT_HANDLE is not set. Using the default, {DEFAULT_CONTACT_HANDLE}.");
            DEFAULT_CONTACT_HANDLE.to_string()
        });
        Self { database_url, operator_id, admin_ids, captcha_timeout, extend_window, bot_token, contact_handle }
    }

    pub fn auth_policy(&self) -> AuthPolicy {
        AuthPolicy::new(self.admin_ids.clone(), self.operator_id)
    }
}

fn minutes_from_env(var: &str, default: i64) -> Duration {
    let minutes = env::var(var)
        .ok()
        .and_then(|s| {
            s.parse::<i64>()
                .map_err(|e| error!("🪛️ '{s}' is not a valid number of minutes for {var}. {e} Using {default}."))
                .ok()
        })
        .unwrap_or(default);
    Duration::minutes(minutes)
}

fn parse_admin_ids(raw: &str) -> Vec<UserId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            s.parse::<i64>().map_err(|e| warn!("🪛️ Skipping invalid admin id '{s}': {e}")).ok().map(UserId)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn admin_id_lists_are_forgiving() {
        assert_eq!(parse_admin_ids("1, 2,3"), vec![UserId(1), UserId(2), UserId(3)]);
        assert_eq!(parse_admin_ids(""), vec![]);
        assert_eq!(parse_admin_ids("7,abc, 8,"), vec![UserId(7), UserId(8)]);
    }

    #[test]
    fn defaults_are_sane() {
        let config = BotConfig::default();
        assert_eq!(config.captcha_timeout, Duration::minutes(5));
        assert_eq!(config.extend_window, Duration::minutes(60));
        assert!(config.admin_ids.is_empty());
        assert_eq!(format!("{}", config.bot_token), "****");
    }
}
