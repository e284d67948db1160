use std::fmt;

use thiserror::Error;
use tracing::debug;

use super::{model::PowerMetrics, timestamp::Timestamp};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Stop time {stop} is not later than start time {start}")]
    StopNotAfterStart { start: Timestamp, stop: Timestamp },

    #[error("Combined power consumption {0} is not greater than 0")]
    NonPositiveCombinedPower(f64),

    #[error("No tasks in powermetrics payload")]
    NoTasks,

    #[error("Device id (pc_id) must not be empty")]
    EmptyDeviceId,

    /// Raised by rules registered outside this module.
    #[error("{reason}")]
    Rejected { rule: String, reason: String },
}

/// A validation rule: a pure check over a decoded report.
pub type Rule = Box<dyn Fn(&PowerMetrics) -> Result<(), ValidationError> + Send + Sync>;

struct Validator {
    name: &'static str,
    rule: Rule,
}

/// Ordered list of named rules, evaluated fail-fast.
///
/// [`ValidationChain::default`] holds the stock rules in their required
/// order: timestamps, combined power, tasks, device id. Further rules are
/// appended with [`ValidationChain::with`] without touching existing ones.
pub struct ValidationChain {
    validators: Vec<Validator>,
}

impl ValidationChain {
    /// A chain with no rules; every report passes.
    pub fn empty() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    pub fn with<F>(mut self, name: &'static str, rule: F) -> Self
    where
        F: Fn(&PowerMetrics) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.push(name, rule);
        self
    }

    pub fn push<F>(&mut self, name: &'static str, rule: F)
    where
        F: Fn(&PowerMetrics) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validators.push(Validator {
            name,
            rule: Box::new(rule),
        });
    }

    /// Rule names in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.validators.iter().map(|v| v.name)
    }

    /// Runs every rule in order and returns the first failure.
    pub fn validate(&self, payload: &PowerMetrics) -> Result<(), ValidationError> {
        for validator in &self.validators {
            if let Err(e) = (validator.rule)(payload) {
                debug!(rule = validator.name, pc_id = %payload.pc_id, error = %e, "Powermetrics payload rejected");
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Default for ValidationChain {
    fn default() -> Self {
        Self::empty()
            .with("timestamp", validate_timestamp)
            .with("consumption", validate_consumption)
            .with("tasks", validate_tasks)
            .with("device_id", validate_device_id)
    }
}

impl fmt::Debug for ValidationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

pub fn validate_timestamp(p: &PowerMetrics) -> Result<(), ValidationError> {
    if p.stop_time > p.start_time {
        Ok(())
    } else {
        Err(ValidationError::StopNotAfterStart {
            start: p.start_time,
            stop: p.stop_time,
        })
    }
}

pub fn validate_consumption(p: &PowerMetrics) -> Result<(), ValidationError> {
    // Written as a negated `>` so NaN is rejected too.
    if !(p.combined_power > 0.0) {
        return Err(ValidationError::NonPositiveCombinedPower(p.combined_power));
    }
    Ok(())
}

pub fn validate_tasks(p: &PowerMetrics) -> Result<(), ValidationError> {
    if p.tasks.is_empty() {
        return Err(ValidationError::NoTasks);
    }
    Ok(())
}

pub fn validate_device_id(p: &PowerMetrics) -> Result<(), ValidationError> {
    if p.pc_id.trim().is_empty() {
        return Err(ValidationError::EmptyDeviceId);
    }
    Ok(())
}
