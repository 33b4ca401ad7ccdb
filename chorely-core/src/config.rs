// File: chorely-core/src/config.rs

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::clock::BusinessCalendar;

/// Tunables of the settlement engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// IANA name of the business timezone that decides what "today" is.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Consecutive missed days after which `streak_days` drops to 0.
    #[serde(default = "default_missed_reset_threshold")]
    pub missed_reset_threshold: i32,

    /// How far back the read path backfills missed days and looks for
    /// claimable date rewards.
    #[serde(default = "default_backfill_window_days")]
    pub backfill_window_days: i64,
}

fn default_timezone() -> String {
    "Asia/Shanghai".to_string()
}

fn default_missed_reset_threshold() -> i32 {
    1
}

fn default_backfill_window_days() -> i64 {
    90
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            missed_reset_threshold: default_missed_reset_threshold(),
            backfill_window_days: default_backfill_window_days(),
        }
    }
}

impl SettlementConfig {
    pub fn validate(&self) -> Result<(), Error> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| Error::Validation(format!("Invalid timezone: {}", self.timezone)))?;
        if self.missed_reset_threshold < 1 {
            return Err(Error::Validation("missed_reset_threshold must be at least 1".to_string()));
        }
        if self.backfill_window_days < 1 {
            return Err(Error::Validation("backfill_window_days must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn calendar(&self) -> Result<BusinessCalendar, Error> {
        let tz = self
            .timezone
            .parse::<Tz>()
            .map_err(|_| Error::Validation(format!("Invalid timezone: {}", self.timezone)))?;
        Ok(BusinessCalendar::new(tz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let cfg: SettlementConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.timezone, "Asia/Shanghai");
        assert_eq!(cfg.missed_reset_threshold, 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let cfg = SettlementConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Validation(_))));
        assert!(cfg.calendar().is_err());
    }
}
