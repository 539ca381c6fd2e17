use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::{errors::Error, normalize::NormalizerConfig, Result};

/// Smallest accepted `MESSAGE_SIZE_LIMIT`; leaves room for the report header.
pub const MIN_MESSAGE_SIZE_LIMIT: usize = 256;

/// Where the registry of known numbers lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrySource {
    /// JSON HTTP service (see `ncb-registry::http`).
    Http { base_url: String },
    /// Newline-separated text file.
    File { path: PathBuf },
}

/// Typed configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub admin_ids: Vec<i64>,
    pub force_join_channel: Option<String>,
    pub max_upload_bytes: u64,
    pub broadcast_interval: Duration,

    // Comparison / pagination
    pub page_size: usize,
    pub session_ttl: Duration,
    pub session_sweep_interval: Duration,
    pub message_size_limit: usize,
    pub normalizer: NormalizerConfig,

    // Registry
    pub registry: RegistrySource,
    pub registry_timeout: Duration,

    // Usage ledger
    pub usage_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        let admin_ids = parse_csv_i64(get("TELEGRAM_ADMIN_IDS"))?;
        let force_join_channel = get("FORCE_JOIN_CHANNEL").map(|c| {
            let c = c.trim();
            if c.starts_with('@') || c.starts_with('-') {
                c.to_string()
            } else {
                format!("@{c}")
            }
        });
        let max_upload_bytes = parse_num::<u64>("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"))?
            .unwrap_or(10 * 1024 * 1024);
        let broadcast_interval = Duration::from_millis(
            parse_num::<u64>("BROADCAST_INTERVAL_MS", get("BROADCAST_INTERVAL_MS"))?.unwrap_or(50),
        );

        let page_size = parse_num::<usize>("PAGE_SIZE", get("PAGE_SIZE"))?.unwrap_or(50);
        if page_size == 0 {
            return Err(Error::Config("PAGE_SIZE must be a positive integer".to_string()));
        }
        let session_ttl = Duration::from_secs(
            parse_num::<u64>("SESSION_TTL_SECS", get("SESSION_TTL_SECS"))?.unwrap_or(3600),
        );
        let session_sweep_interval = Duration::from_secs(
            parse_num::<u64>(
                "SESSION_SWEEP_INTERVAL_SECS",
                get("SESSION_SWEEP_INTERVAL_SECS"),
            )?
            .unwrap_or(300)
            .max(1),
        );
        let message_size_limit =
            parse_num::<usize>("MESSAGE_SIZE_LIMIT", get("MESSAGE_SIZE_LIMIT"))?.unwrap_or(4000);
        if message_size_limit < MIN_MESSAGE_SIZE_LIMIT {
            return Err(Error::Config(format!(
                "MESSAGE_SIZE_LIMIT must be at least {MIN_MESSAGE_SIZE_LIMIT}"
            )));
        }

        let defaults = NormalizerConfig::default();
        let normalizer = NormalizerConfig {
            strip_country_code: parse_bool(get("STRIP_COUNTRY_CODE")).unwrap_or(false),
            national_number_length: parse_num::<usize>(
                "NATIONAL_NUMBER_LENGTH",
                get("NATIONAL_NUMBER_LENGTH"),
            )?
            .unwrap_or(defaults.national_number_length),
            min_digits: parse_num::<usize>("MIN_DIGITS", get("MIN_DIGITS"))?
                .unwrap_or(defaults.min_digits),
            max_digits: parse_num::<usize>("MAX_DIGITS", get("MAX_DIGITS"))?
                .unwrap_or(defaults.max_digits),
        };
        if normalizer.min_digits > normalizer.max_digits {
            return Err(Error::Config(
                "MIN_DIGITS must not exceed MAX_DIGITS".to_string(),
            ));
        }
        if normalizer.strip_country_code
            && !(normalizer.min_digits..=normalizer.max_digits)
                .contains(&normalizer.national_number_length)
        {
            return Err(Error::Config(format!(
                "NATIONAL_NUMBER_LENGTH ({}) must lie within MIN_DIGITS..=MAX_DIGITS ({}..={}) when STRIP_COUNTRY_CODE is on",
                normalizer.national_number_length, normalizer.min_digits, normalizer.max_digits
            )));
        }

        let registry = match (get("REGISTRY_URL"), get("REGISTRY_FILE")) {
            (Some(url), _) => RegistrySource::Http {
                base_url: url.trim_end_matches('/').to_string(),
            },
            (None, Some(path)) => RegistrySource::File {
                path: PathBuf::from(path),
            },
            (None, None) => {
                return Err(Error::Config(
                    "either REGISTRY_URL or REGISTRY_FILE must be set".to_string(),
                ))
            }
        };
        let registry_timeout = Duration::from_millis(
            parse_num::<u64>("REGISTRY_TIMEOUT_MS", get("REGISTRY_TIMEOUT_MS"))?.unwrap_or(10_000),
        );

        let usage_file = get("USAGE_FILE").map(PathBuf::from);

        Ok(Self {
            telegram_bot_token,
            admin_ids,
            force_join_channel,
            max_upload_bytes,
            broadcast_interval,
            page_size,
            session_ttl,
            session_sweep_interval,
            message_size_limit,
            normalizer,
            registry,
            registry_timeout,
            usage_file,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let Some((key, val)) = parse_dotenv_line(raw) else {
            continue;
        };
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv_line(raw: &str) -> Option<(String, String)> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);

    let (k, v) = line.split_once('=')?;
    let key = k.trim();
    if key.is_empty() {
        return None;
    }

    let mut val = v.trim();
    // Strip optional surrounding quotes.
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        val = &val[1..val.len() - 1];
    }
    Some((key.to_string(), val.to_string()))
}

fn parse_bool(v: Option<String>) -> Option<bool> {
    v.map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_num<T: std::str::FromStr>(key: &str, v: Option<String>) -> Result<Option<T>> {
    let Some(s) = v else {
        return Ok(None);
    };
    s.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {s:?}")))
}

fn parse_csv_i64(v: Option<String>) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("invalid id in TELEGRAM_ADMIN_IDS: {s:?}")))
        })
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("TELEGRAM_BOT_TOKEN", "t"),
        ("REGISTRY_FILE", "/tmp/n.txt"),
    ];

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(cfg.page_size, 50);
        assert_eq!(cfg.session_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.message_size_limit, 4000);
        assert!(!cfg.normalizer.strip_country_code);
        assert!(cfg.admin_ids.is_empty());
        assert!(cfg.force_join_channel.is_none());
        assert_eq!(
            cfg.registry,
            RegistrySource::File {
                path: PathBuf::from("/tmp/n.txt")
            }
        );
    }

    #[test]
    fn token_and_registry_are_required() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("REGISTRY_FILE", "x")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "t")])),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn registry_url_wins_over_file() {
        let mut pairs = BASE.to_vec();
        pairs.push(("REGISTRY_URL", "http://registry.local/api/"));
        let cfg = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(
            cfg.registry,
            RegistrySource::Http {
                base_url: "http://registry.local/api".to_string()
            }
        );
    }

    #[test]
    fn rejects_zero_page_size_and_garbage_numbers() {
        let mut pairs = BASE.to_vec();
        pairs.push(("PAGE_SIZE", "0"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let mut pairs = BASE.to_vec();
        pairs.push(("MESSAGE_SIZE_LIMIT", "lots"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn rejects_message_limit_below_header_room() {
        let mut pairs = BASE.to_vec();
        pairs.push(("MESSAGE_SIZE_LIMIT", "20"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(Error::Config(_))
        ));

        let mut pairs = BASE.to_vec();
        pairs.push(("MESSAGE_SIZE_LIMIT", "256"));
        assert_eq!(Config::from_lookup(lookup(&pairs)).unwrap().message_size_limit, 256);
    }

    #[test]
    fn stripping_requires_national_length_within_digit_bounds() {
        let mut pairs = BASE.to_vec();
        pairs.extend([("STRIP_COUNTRY_CODE", "true"), ("MAX_DIGITS", "8")]);
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(Error::Config(_))
        ));

        let mut pairs = BASE.to_vec();
        pairs.extend([("STRIP_COUNTRY_CODE", "true"), ("MIN_DIGITS", "11")]);
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        // Without stripping the national length is unused.
        let mut pairs = BASE.to_vec();
        pairs.push(("MAX_DIGITS", "8"));
        let cfg = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.normalizer.max_digits, 8);

        let mut pairs = BASE.to_vec();
        pairs.extend([("STRIP_COUNTRY_CODE", "true"), ("MAX_DIGITS", "10")]);
        assert!(Config::from_lookup(lookup(&pairs)).is_ok());
    }

    #[test]
    fn parses_overrides() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("TELEGRAM_ADMIN_IDS", "1, 2,3"),
            ("PAGE_SIZE", "25"),
            ("SESSION_TTL_SECS", "90"),
            ("STRIP_COUNTRY_CODE", "yes"),
            ("NATIONAL_NUMBER_LENGTH", "9"),
            ("FORCE_JOIN_CHANNEL", "mychannel"),
        ]);
        let cfg = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.admin_ids, vec![1, 2, 3]);
        assert_eq!(cfg.page_size, 25);
        assert_eq!(cfg.session_ttl, Duration::from_secs(90));
        assert!(cfg.normalizer.strip_country_code);
        assert_eq!(cfg.normalizer.national_number_length, 9);
        assert_eq!(cfg.force_join_channel.as_deref(), Some("@mychannel"));
    }

    #[test]
    fn dotenv_lines() {
        assert_eq!(
            parse_dotenv_line("export PAGE_SIZE=\"20\""),
            Some(("PAGE_SIZE".to_string(), "20".to_string()))
        );
        assert_eq!(parse_dotenv_line("# comment"), None);
        assert_eq!(parse_dotenv_line("novalue"), None);
        assert_eq!(
            parse_dotenv_line(" A = 'b c' "),
            Some(("A".to_string(), "b c".to_string()))
        );
    }
}
