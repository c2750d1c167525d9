//! Core traits shared by records and services

use chrono::{DateTime, TimeZone, Utc};

/// Primary key type
pub type Id = i64;

/// Trait for entities that have a primary key
pub trait Identifiable {
    fn id(&self) -> Option<Id>;
    fn is_persisted(&self) -> bool {
        self.id().is_some()
    }
    fn is_new_record(&self) -> bool {
        !self.is_persisted()
    }
}

/// The user on whose behalf a permission check runs
pub trait UserContext: Send + Sync {
    fn user_id(&self) -> Id;
    fn is_admin(&self) -> bool;
    fn is_anonymous(&self) -> bool {
        self.user_id() == 0
    }
    fn is_logged_in(&self) -> bool {
        !self.is_anonymous()
    }
    /// Check if user holds a global permission
    fn allowed_globally(&self, permission: &str) -> bool;
}

/// Source of "now" for timestamps written by services
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current unix timestamp in seconds
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

/// A clock frozen at one instant, for tests and replays
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Clock fixed at a unix timestamp; out-of-range values fall back to the epoch
    pub fn at_unix(secs: i64) -> Self {
        Self(
            Utc.timestamp_opt(secs, 0)
                .single()
                .unwrap_or_default(),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
