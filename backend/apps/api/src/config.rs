//! Process configuration
//!
//! Typed defaults from the domain crates, overlaid with environment
//! variables. A variable that is set but does not parse is a startup error.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use economy::EconomyConfig;
use guard::GuardConfig;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub economy: EconomyConfig,
    pub guard: GuardConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let Some(database_url) = lookup("DATABASE_URL") else {
            bail!("DATABASE_URL must be set in environment");
        };

        let mut economy = EconomyConfig::default();
        if let Some(bps) = parse_var::<u32>(&lookup, "PLATFORM_FEE_BPS")? {
            if bps > 10_000 {
                bail!("PLATFORM_FEE_BPS must be at most 10000, got {bps}");
            }
            economy.platform_fee_bps = bps;
        }
        if let Some(ratio) = parse_var::<i64>(&lookup, "GIFT_COINS_PER_AFFINITY")? {
            economy.affinity.gift_coins_per_point = positive("GIFT_COINS_PER_AFFINITY", ratio)?;
        }
        if let Some(ratio) = parse_var::<i64>(&lookup, "RED_PACKET_COINS_PER_AFFINITY")? {
            economy.affinity.red_packet_coins_per_point =
                positive("RED_PACKET_COINS_PER_AFFINITY", ratio)?;
        }

        // release builds keep the strict presets
        let mut guard = if cfg!(debug_assertions) {
            GuardConfig::development()
        } else {
            GuardConfig::default()
        };
        if let Some(burn) = parse_var::<bool>(&lookup, "CAPTCHA_BURN_ON_MISMATCH")? {
            guard.captcha_policy.burn_on_mismatch = burn;
        }
        if let Some(attempts) = parse_var::<u32>(&lookup, "CAPTCHA_MAX_ATTEMPTS")? {
            guard.captcha_policy.max_attempts = attempts.max(1);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "GUARD_SWEEP_INTERVAL_SECS")? {
            guard.sweep_interval = Duration::from_secs(secs.max(1));
        }

        Ok(Self {
            database_url,
            database_max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            economy,
            guard,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{name} has an invalid value: {raw:?}"))
        })
        .transpose()
}

fn positive(name: &str, value: i64) -> anyhow::Result<i64> {
    if value < 1 {
        bail!("{name} must be positive, got {value}");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/app")]))
            .unwrap();
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.economy.platform_fee_bps, 1_000);
        assert_eq!(config.guard.captcha_policy.max_attempts, 5);
        assert!(!config.guard.captcha_policy.burn_on_mismatch);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/app"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("PLATFORM_FEE_BPS", "250"),
            ("RED_PACKET_COINS_PER_AFFINITY", "10"),
            ("CAPTCHA_BURN_ON_MISMATCH", "true"),
            ("GUARD_SWEEP_INTERVAL_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.database_max_connections, 12);
        assert_eq!(config.economy.platform_fee_bps, 250);
        assert_eq!(config.economy.affinity.red_packet_coins_per_point, 10);
        assert!(config.guard.captcha_policy.burn_on_mismatch);
        assert_eq!(config.guard.sweep_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(AppConfig::from_lookup(lookup(&[])).is_err());
        assert!(
            AppConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://localhost/app"),
                ("PLATFORM_FEE_BPS", "12000"),
            ]))
            .is_err()
        );
        assert!(
            AppConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://localhost/app"),
                ("GIFT_COINS_PER_AFFINITY", "zero"),
            ]))
            .is_err()
        );
    }
}
