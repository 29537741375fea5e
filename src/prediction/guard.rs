//! Maintenance-State Guard
//!
//! Decides whether a fresh failure prediction may replace the stored one.
//! Equipment is protected for 24 hours after a confirmed maintenance or a
//! sentinel reset; protection expires on its own.

use chrono::{DateTime, Duration, Utc};

use crate::models::{MaintenanceLog, StoredPrediction};
use super::PROTECTION_WINDOW_HOURS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionState {
    Normal,
    ProtectedPostMaintenance,
}

impl ProtectionState {
    pub fn is_protected(&self) -> bool {
        *self == ProtectionState::ProtectedPostMaintenance
    }
}

/// Events strictly after this instant still protect
pub fn protection_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(PROTECTION_WINDOW_HOURS)
}

/// Current state of one equipment
pub fn evaluate(
    now: DateTime<Utc>,
    logs: &[MaintenanceLog],
    stored: Option<&StoredPrediction>,
) -> ProtectionState {
    let cutoff = protection_cutoff(now);

    let confirmed = logs
        .iter()
        .any(|log| log.is_confirmed_completion() && log.date > cutoff);
    let reset = stored.map_or(false, |p| p.holds_sentinel() && p.prediction_date > cutoff);

    if confirmed || reset {
        ProtectionState::ProtectedPostMaintenance
    } else {
        ProtectionState::Normal
    }
}
