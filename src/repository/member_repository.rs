use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Member, MemberStatus},
    error::{AppError, Result},
    repository::MemberRepository,
};

#[derive(FromRow)]
struct MemberRow {
    id: String,
    full_name: String,
    contact_number: String,
    status: String,
    membership_expires_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteMemberRepository {
    pool: SqlitePool,
}

impl SqliteMemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_member(row: MemberRow) -> Result<Member> {
        Ok(Member {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            full_name: row.full_name,
            contact_number: row.contact_number,
            status: Self::parse_status(&row.status)?,
            membership_expires_at: row.membership_expires_at.map(to_utc),
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    fn parse_status(s: &str) -> Result<MemberStatus> {
        match s {
            "Pending" => Ok(MemberStatus::Pending),
            "Active" => Ok(MemberStatus::Active),
            "Expired" => Ok(MemberStatus::Expired),
            _ => Err(AppError::Database(format!("Invalid member status: {}", s))),
        }
    }

    fn status_to_str(status: MemberStatus) -> &'static str {
        match status {
            MemberStatus::Pending => "Pending",
            MemberStatus::Active => "Active",
            MemberStatus::Expired => "Expired",
        }
    }
}

fn to_utc(dt: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(dt, Utc)
}

#[async_trait]
impl MemberRepository for SqliteMemberRepository {
    async fn create(&self, member: &Member) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO members (
                id, full_name, contact_number, status,
                membership_expires_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(member.id.to_string())
        .bind(&member.full_name)
        .bind(&member.contact_number)
        .bind(Self::status_to_str(member.status))
        .bind(member.membership_expires_at.map(|dt| dt.naive_utc()))
        .bind(member.created_at.naive_utc())
        .bind(member.updated_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Member>> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT id, full_name, contact_number, status,
                   membership_expires_at, created_at, updated_at
            FROM members
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_member(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_contact(&self, contact_number: &str) -> Result<Option<Member>> {
        let row = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT id, full_name, contact_number, status,
                   membership_expires_at, created_at, updated_at
            FROM members
            WHERE contact_number = ?
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(contact_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_member(r)?)),
            None => Ok(None),
        }
    }
}
