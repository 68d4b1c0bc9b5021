//! Runtime error policy
//!
//! Decides whether a runtime failure inside `render_buffer` is logged and
//! absorbed or handed back to the caller, and when a run of device failures
//! counts as a lost device.

use crate::error::{Error, Result};
use serde::Deserialize;

/// How runtime errors are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Log, count and carry on. The next render call tries again.
    #[default]
    Tolerant,
    /// Return the first runtime error of a call as `Err`.
    Strict,
}

impl ErrorPolicy {
    pub fn is_strict(self) -> bool {
        self == ErrorPolicy::Strict
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorPolicy::Tolerant => "tolerant",
            ErrorPolicy::Strict => "strict",
        }
    }
}

impl std::str::FromStr for ErrorPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tolerant" => Ok(ErrorPolicy::Tolerant),
            "strict" => Ok(ErrorPolicy::Strict),
            other => Err(Error::Config(format!("Unknown error policy '{}'", other))),
        }
    }
}

/// Counts device writes that failed beyond recovery, back to back.
#[derive(Debug, Clone, Default)]
pub struct FailureTracker {
    consecutive: u32,
    limit: Option<u32>,
}

impl FailureTracker {
    /// `limit` of `None` (or zero) never escalates.
    pub fn new(limit: Option<u32>) -> Self {
        Self {
            consecutive: 0,
            limit: limit.filter(|&n| n > 0),
        }
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    /// Any write the device accepted.
    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// A failed write whose recovery also failed.
    ///
    /// # Errors
    /// `DeviceLost` once the run reaches the limit.
    pub fn record_failure(&mut self) -> Result<()> {
        self.consecutive = self.consecutive.saturating_add(1);
        match self.limit {
            Some(limit) if self.consecutive >= limit => Err(Error::DeviceLost {
                consecutive_failures: self.consecutive,
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse() {
        assert_eq!("strict".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Strict);
        assert_eq!("tolerant".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Tolerant);
        assert!("lenient".parse::<ErrorPolicy>().is_err());
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Tolerant);
    }

    #[test]
    fn test_tracker_without_limit_never_escalates() {
        let mut tracker = FailureTracker::new(None);
        for _ in 0..1000 {
            tracker.record_failure().unwrap();
        }
        assert_eq!(tracker.consecutive(), 1000);
    }

    #[test]
    fn test_zero_limit_is_no_limit() {
        let tracker = FailureTracker::new(Some(0));
        assert_eq!(tracker.limit(), None);
    }

    #[test]
    fn test_tracker_escalates_at_limit() {
        let mut tracker = FailureTracker::new(Some(3));
        tracker.record_failure().unwrap();
        tracker.record_failure().unwrap();
        match tracker.record_failure() {
            Err(Error::DeviceLost { consecutive_failures }) => assert_eq!(consecutive_failures, 3),
            other => panic!("expected DeviceLost, got {:?}", other),
        }
    }

    #[test]
    fn test_success_resets_run() {
        let mut tracker = FailureTracker::new(Some(2));
        tracker.record_failure().unwrap();
        tracker.record_success();
        tracker.record_failure().unwrap();
        assert_eq!(tracker.consecutive(), 1);
    }
}
