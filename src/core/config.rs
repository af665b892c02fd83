//! Process-wide configuration
//!
//! Everything the bot needs before the first update arrives is read once at
//! startup into a [`Config`] and handed to every component behind an `Arc`.
//! Values come from the environment (after `.env` has been loaded by
//! `dotenvy`); loading goes through a lookup closure so tests never have to
//! mutate the real process environment.

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Default catalog offered during book selection
pub const DEFAULT_BOOKS: &[&str] = &[
    "Essential 1",
    "Essential 2",
    "Essential 3",
    "Essential 4",
    "Essential 5",
    "Essential 6",
    "Essential 1 (rus)",
    "Essential 2 (rus)",
    "Essential 3 (rus)",
    "Essential 4 (rus)",
    "Essential 5 (rus)",
    "Essential 6 (rus)",
    "English vocabulary in use elementary",
    "English vocabulary in use intermediate",
    "English vocabulary in use upper-intermediate",
    "English vocabulary in use advanced",
    "English vocabulary in use elementary (rus)",
    "English vocabulary in use intermediate (rus)",
    "English vocabulary in use upper-intermediate (rus)",
    "English vocabulary in use advanced (rus)",
];

/// Registration and billing constants
pub mod billing {
    /// Length of the free trial granted at registration
    pub const TRIAL_DAYS: i64 = 3;

    /// Days of entitlement bought by one paid month
    pub const DAYS_PER_MONTH: i64 = 30;

    /// Number of books every subscriber picks
    pub const BOOKS_PER_SUBSCRIBER: usize = 3;

    /// Bonus days carried by the seeded teacher promo codes
    pub const SEED_PROMO_BONUS_DAYS: i64 = 7;

    /// Upper bound for trial length and promo bonus days
    pub const MAX_GRANT_DAYS: i64 = 365;
}

/// Sweep scheduling
pub mod sweep {
    use super::Duration;

    /// Hours between two entitlement sweeps
    pub const INTERVAL_HOURS: u64 = 24;

    pub fn interval(hours: u64) -> Duration {
        Duration::from_secs(hours.max(1) * 60 * 60)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Missing or malformed required configuration. Fatal at startup.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("BOT_TOKEN (or TELOXIDE_TOKEN) is not set")]
    MissingToken,

    #[error("ADMIN_IDS is not set or contains no valid ids")]
    MissingAdmins,

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Read-only configuration shared by all handlers and background tasks
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub admin_ids: Vec<i64>,
    pub database_path: String,
    pub log_file_path: String,
    pub card_number: String,
    pub price_regular: String,
    pub price_promo: String,
    /// Month counts offered on the tariff keyboard
    pub tariff_months: Vec<u32>,
    pub books: Vec<String>,
    /// Codes seeded into the promo table at startup (upper-cased)
    pub promo_codes: Vec<String>,
    pub promo_bonus_days: i64,
    pub trial_days: i64,
    pub sweep_interval_hours: u64,
}

impl Config {
    /// Builds the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = non_empty("BOT_TOKEN")
            .or_else(|| non_empty("TELOXIDE_TOKEN"))
            .ok_or(ConfigError::MissingToken)?;

        let admin_ids = non_empty("ADMIN_IDS")
            .map(|raw| parse_admin_ids(&raw))
            .unwrap_or_default();
        if admin_ids.is_empty() {
            return Err(ConfigError::MissingAdmins);
        }

        let tariff_months = match non_empty("TARIFF_MONTHS") {
            Some(raw) => parse_tariff_months(&raw)?,
            None => vec![1],
        };

        let books = non_empty("BOOKS")
            .map(|raw| parse_list(&raw, ';'))
            .filter(|books| !books.is_empty())
            .unwrap_or_else(|| DEFAULT_BOOKS.iter().map(|b| b.to_string()).collect());
        // The ledger stores a selection as one comma-joined column.
        if let Some(title) = books.iter().find(|title| title.contains(',')) {
            return Err(ConfigError::Invalid {
                name: "BOOKS",
                value: title.clone(),
            });
        }
        if books.len() < billing::BOOKS_PER_SUBSCRIBER {
            return Err(ConfigError::Invalid {
                name: "BOOKS",
                value: format!("{} titles, need at least {}", books.len(), billing::BOOKS_PER_SUBSCRIBER),
            });
        }

        let promo_codes = non_empty("PROMO_CODES")
            .map(|raw| parse_list(&raw, ','))
            .unwrap_or_else(|| (1..=15).map(|n| format!("Teacher{:02}", n)).collect())
            .into_iter()
            .map(|code| code.to_uppercase())
            .collect();

        Ok(Self {
            bot_token,
            admin_ids,
            database_path: non_empty("DATABASE_PATH").unwrap_or_else(|| "wordzen.sqlite".to_string()),
            log_file_path: non_empty("LOG_FILE_PATH").unwrap_or_else(|| "wordzen.log".to_string()),
            card_number: non_empty("CARD_NUMBER").unwrap_or_else(|| "1234 5678 9012 3456".to_string()),
            price_regular: non_empty("PRICE_REGULAR").unwrap_or_else(|| "59.900 сўм".to_string()),
            price_promo: non_empty("PRICE_PROMO").unwrap_or_else(|| "49.900 сўм".to_string()),
            tariff_months,
            books,
            promo_codes,
            promo_bonus_days: parse_days(&non_empty, "PROMO_BONUS_DAYS", billing::SEED_PROMO_BONUS_DAYS)?,
            trial_days: parse_days(&non_empty, "TRIAL_DAYS", billing::TRIAL_DAYS)?,
            sweep_interval_hours: parse_number(&non_empty, "SWEEP_INTERVAL_HOURS", sweep::INTERVAL_HOURS)?,
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Price of one month, depending on whether the subscriber registered with a promo code
    pub fn price_for(&self, has_promo: bool) -> &str {
        if has_promo {
            &self.price_promo
        } else {
            &self.price_regular
        }
    }
}

fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split([',', ' ', '\n', '\t'])
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

fn parse_list(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_tariff_months(raw: &str) -> Result<Vec<u32>, ConfigError> {
    let mut months = Vec::new();
    for part in parse_list(raw, ',') {
        match part.parse::<u32>() {
            Ok(m) if m > 0 => months.push(m),
            _ => {
                return Err(ConfigError::Invalid {
                    name: "TARIFF_MONTHS",
                    value: raw.to_string(),
                })
            }
        }
    }
    if months.is_empty() {
        return Err(ConfigError::Invalid {
            name: "TARIFF_MONTHS",
            value: raw.to_string(),
        });
    }
    Ok(months)
}

fn parse_number<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

/// Day counts added to calendar dates must stay within `0..=MAX_GRANT_DAYS`.
fn parse_days<F>(lookup: &F, name: &'static str, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let days = parse_number(lookup, name, default)?;
    if !(0..=billing::MAX_GRANT_DAYS).contains(&days) {
        return Err(ConfigError::Invalid {
            name,
            value: days.to_string(),
        });
    }
    Ok(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn minimal_env_uses_defaults() {
        let config = Config::from_lookup(lookup(&[("BOT_TOKEN", "123:abc"), ("ADMIN_IDS", "10, 20")])).unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.admin_ids, vec![10, 20]);
        assert_eq!(config.tariff_months, vec![1]);
        assert_eq!(config.books.len(), DEFAULT_BOOKS.len());
        assert_eq!(config.promo_codes.len(), 15);
        assert_eq!(config.promo_codes[0], "TEACHER01");
        assert_eq!(config.trial_days, 3);
        assert_eq!(config.sweep_interval_hours, 24);
    }

    #[test]
    fn teloxide_token_is_accepted() {
        let config = Config::from_lookup(lookup(&[("TELOXIDE_TOKEN", "t"), ("ADMIN_IDS", "1")])).unwrap();
        assert_eq!(config.bot_token, "t");
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = Config::from_lookup(lookup(&[("ADMIN_IDS", "1")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingToken);
    }

    #[test]
    fn missing_or_garbage_admins_is_fatal() {
        let err = Config::from_lookup(lookup(&[("BOT_TOKEN", "t")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingAdmins);

        let err = Config::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("ADMIN_IDS", "abc, ,")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingAdmins);
    }

    #[test]
    fn admin_ids_accept_mixed_separators() {
        assert_eq!(parse_admin_ids("1,2 3\n4\tx"), vec![1, 2, 3, 4]);
    }

    #[test]
    fn custom_catalog_and_tariffs() {
        let config = Config::from_lookup(lookup(&[
            ("BOT_TOKEN", "t"),
            ("ADMIN_IDS", "1"),
            ("BOOKS", "A; B ;C;"),
            ("TARIFF_MONTHS", "1,3"),
            ("PROMO_CODES", "spring, autumn"),
        ]))
        .unwrap();
        assert_eq!(config.books, vec!["A", "B", "C"]);
        assert_eq!(config.tariff_months, vec![1, 3]);
        assert_eq!(config.promo_codes, vec!["SPRING", "AUTUMN"]);
    }

    #[test]
    fn catalog_smaller_than_selection_is_rejected() {
        let err = Config::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("ADMIN_IDS", "1"), ("BOOKS", "A;B")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "BOOKS", .. }));
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = Config::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("ADMIN_IDS", "1"), ("TRIAL_DAYS", "three")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "TRIAL_DAYS",
                value: "three".to_string()
            }
        );

        let err = Config::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("ADMIN_IDS", "1"), ("TARIFF_MONTHS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "TARIFF_MONTHS", .. }));
    }

    #[test]
    fn promo_price_only_for_promo_subscribers() {
        let config = Config::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("ADMIN_IDS", "1")])).unwrap();
        assert_eq!(config.price_for(true), "49.900 сўм");
        assert_eq!(config.price_for(false), "59.900 сўм");
        assert!(config.is_admin(1));
        assert!(!config.is_admin(2));
    }

    #[test]
    fn titles_with_commas_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("BOT_TOKEN", "t"),
            ("ADMIN_IDS", "1"),
            ("BOOKS", "Grammar, Part 1;B;C;D"),
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "BOOKS",
                value: "Grammar, Part 1".to_string()
            }
        );
    }

    #[test]
    fn day_counts_outside_a_year_are_rejected() {
        for (name, value) in [
            ("TRIAL_DAYS", "100000000"),
            ("TRIAL_DAYS", "-1"),
            ("PROMO_BONUS_DAYS", "366"),
        ] {
            let err = Config::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("ADMIN_IDS", "1"), (name, value)])).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { name: n, .. } if n == name), "{} = {}", name, value);
        }

        let config =
            Config::from_lookup(lookup(&[("BOT_TOKEN", "t"), ("ADMIN_IDS", "1"), ("PROMO_BONUS_DAYS", "365")])).unwrap();
        assert_eq!(config.promo_bonus_days, billing::MAX_GRANT_DAYS);
    }
}
