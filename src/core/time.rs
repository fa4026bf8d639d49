//! Deadline comparison utility.

use chrono::{DateTime, Utc};

/// Check whether an absolute deadline has passed.
///
/// A deadline exactly equal to the current instant counts as past, so a
/// contract whose deadline lands on a tick boundary fires on that tick.
pub fn is_past(deadline: DateTime<Utc>) -> bool {
    deadline <= Utc::now()
}
