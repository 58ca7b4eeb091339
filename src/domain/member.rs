use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub full_name: String,
    pub contact_number: String,
    pub status: MemberStatus,
    pub membership_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MemberStatus {
    /// Created by a payment request; not yet paid.
    Pending,
    Active,
    Expired,
}

impl Member {
    /// End date after a successful payment for `duration_days`: a lapsed
    /// membership restarts from now, an active one extends from its
    /// current end date.
    pub fn extended_expiry(&self, now: DateTime<Utc>, duration_days: i64) -> DateTime<Utc> {
        let base = match self.membership_expires_at {
            Some(current) if current > now => current,
            _ => now,
        };
        base + chrono::Duration::days(duration_days)
    }
}
