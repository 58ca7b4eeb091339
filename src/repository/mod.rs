use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::*;
use crate::error::Result;

pub mod member_repository;
pub mod payment_repository;
pub mod plan_repository;

pub use member_repository::SqliteMemberRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use plan_repository::SqlitePlanRepository;

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a new payment. Returns `false` when the reference number
    /// collides with an existing row; the caller regenerates and retries.
    async fn insert(&self, payment: &Payment) -> Result<bool>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_reference(&self, reference: &str) -> Result<Option<Payment>>;
    /// Write back every mutable field, guarded by the optimistic version:
    /// the row is updated only if its stored version still equals
    /// `expected_version`, and the version is bumped. Returns `false` on
    /// a version conflict (someone else committed first).
    async fn update_guarded(&self, payment: &Payment, expected_version: i64) -> Result<bool>;
    /// Atomically mark the payment completed and extend the member's
    /// membership, in one transaction. Same version guard as
    /// `update_guarded`.
    async fn complete_with_membership(
        &self,
        payment: &Payment,
        expected_version: i64,
        new_membership_expires_at: DateTime<Utc>,
    ) -> Result<bool>;
    /// Transition stale `pending_otp` rows past their expiry to `failed`.
    /// Returns the number of rows swept.
    async fn fail_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn create(&self, member: &Member) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Member>>;
    async fn find_by_contact(&self, contact_number: &str) -> Result<Option<Member>>;
}

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn list_active(&self) -> Result<Vec<MembershipPlan>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MembershipPlan>>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<MembershipPlan>>;
}
