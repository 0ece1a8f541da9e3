//! Reactor configuration

use serde::{Deserialize, Serialize};

/// Connection-slot pool configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MgmtConfig {
    /// Number of connection slots; fixed for the pool's lifetime
    pub slots: usize,

    /// Seconds of inactivity before a slot is reaped
    pub timeout_secs: u64,

    /// Hard cap on a single request (header plus body) in bytes
    pub request_max: usize,
}

impl Default for MgmtConfig {
    fn default() -> Self {
        Self {
            slots: 8,
            timeout_secs: 60,
            request_max: 16 * 1024,
        }
    }
}

impl MgmtConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.slots == 0 {
            return Err("slot count must be at least 1".into());
        }
        if self.request_max < 4 {
            return Err("request_max must at least fit a header terminator".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(MgmtConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_slots() {
        let cfg = MgmtConfig {
            slots: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
