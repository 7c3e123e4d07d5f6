use chrono::{DateTime, Utc};

/// Source of the current time for token deadlines and URL expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current time as unix seconds
    fn unix_now(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Freeze at the given unix timestamp (falls back to the epoch if out of range)
    pub fn at_unix(secs: i64) -> Self {
        Self(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Absolute unix deadline `expires_in` from now.
///
/// Deadlines have whole-second resolution, so anything under a second would
/// already be expired when signed.
pub(crate) fn deadline_after(clock: &dyn Clock, expires_in: std::time::Duration) -> crate::KodoResult<i64> {
    let secs = expires_in.as_secs();
    if secs == 0 {
        return Err(crate::KodoError::signing(format!(
            "expiry {:?} is shorter than one second",
            expires_in
        )));
    }

    i64::try_from(secs)
        .ok()
        .and_then(|secs| clock.unix_now().checked_add(secs))
        .ok_or_else(|| crate::KodoError::invalid(format!("expiry out of range: {:?}", expires_in)))
}
