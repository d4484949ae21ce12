//! Risk flag model
//!
//! The flag store is the single source of truth for a student's risk
//! state; `students.risk_level` is recomputed from it, never written
//! independently. The active-flag dedup invariant is enforced here by
//! the partial unique index and the conditional upsert, not by any
//! in-process lock.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RiskFlag {
    pub id: Uuid,
    pub student_id: Uuid,
    pub school_id: Uuid,
    pub flag_type: String,
    pub severity: String,
    pub severity_rank: i16,
    pub title: String,
    pub description: Option<String>,
    pub evidence: Option<serde_json::Value>,
    pub is_active: bool,
    pub is_resolved: bool,
    pub auto_generated: bool,
    pub created_by: Option<Uuid>,
    pub resolved_by: Option<Uuid>,
    pub resolution_notes: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input to the dedup upsert
#[derive(Debug, Clone)]
pub struct NewRiskFlag {
    pub student_id: Uuid,
    pub school_id: Uuid,
    pub flag_type: String,
    pub severity: String,
    pub severity_rank: i16,
    pub title: String,
    pub description: Option<String>,
    pub evidence: Option<serde_json::Value>,
    pub auto_generated: bool,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RiskFlagFilter {
    pub student_id: Option<Uuid>,
    pub school_id: Option<Uuid>,
    pub flag_type: Option<String>,
    pub is_active: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl RiskFlag {
    /// Atomic create-or-escalate against the active-flag unique index.
    ///
    /// One statement covers the whole policy: insert when no active flag of
    /// the type exists; escalate in place when the existing one is weaker;
    /// no-op (None) when it is already at or above the candidate severity.
    /// Concurrent evaluators racing on the same (student, type) resolve at
    /// the index, so this stays correct across service instances.
    pub async fn upsert_active(
        pool: &PgPool,
        data: NewRiskFlag,
    ) -> Result<Option<(Self, bool)>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO risk_flags
                (student_id, school_id, flag_type, severity, severity_rank,
                 title, description, evidence, auto_generated, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (student_id, flag_type) WHERE is_active DO UPDATE SET
                severity = EXCLUDED.severity,
                severity_rank = EXCLUDED.severity_rank,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                evidence = EXCLUDED.evidence,
                updated_at = NOW()
            WHERE risk_flags.severity_rank < EXCLUDED.severity_rank
            RETURNING *, (xmax = 0) AS inserted
            "#
        )
        .bind(data.student_id)
        .bind(data.school_id)
        .bind(&data.flag_type)
        .bind(&data.severity)
        .bind(data.severity_rank)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.evidence)
        .bind(data.auto_generated)
        .bind(data.created_by)
        .fetch_optional(pool)
        .await?;

        match row {
            Some(row) => {
                let inserted: bool = row.try_get("inserted")?;
                let flag = RiskFlag::from_row(&row)?;
                Ok(Some((flag, inserted)))
            }
            None => Ok(None),
        }
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RiskFlag>("SELECT * FROM risk_flags WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, filter: RiskFlagFilter) -> Result<Vec<Self>, sqlx::Error> {
        let limit = filter.limit.unwrap_or(50);
        let offset = filter.offset.unwrap_or(0);

        sqlx::query_as::<_, RiskFlag>(
            r#"
            SELECT * FROM risk_flags
            WHERE ($1::uuid IS NULL OR student_id = $1)
              AND ($2::uuid IS NULL OR school_id = $2)
              AND ($3::varchar IS NULL OR flag_type = $3)
              AND ($4::boolean IS NULL OR is_active = $4)
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#
        )
        .bind(filter.student_id)
        .bind(filter.school_id)
        .bind(&filter.flag_type)
        .bind(filter.is_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// The (rank, type) pairs the risk level derives from
    pub async fn active_rank_pairs(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<(i16, String)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT severity_rank, flag_type FROM risk_flags WHERE student_id = $1 AND is_active"
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
    }

    /// Resolve an active flag; None when the flag is missing or no longer active
    pub async fn resolve(
        pool: &PgPool,
        id: Uuid,
        resolved_by: Uuid,
        notes: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RiskFlag>(
            r#"
            UPDATE risk_flags
            SET is_active = false,
                is_resolved = true,
                resolved_by = $2,
                resolution_notes = $3,
                resolved_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND is_active
            RETURNING *
            "#
        )
        .bind(id)
        .bind(resolved_by)
        .bind(notes)
        .fetch_optional(pool)
        .await
    }

    /// Hard delete, returning the removed row so the caller can recompute
    /// the student's risk level
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, RiskFlag>(
            "DELETE FROM risk_flags WHERE id = $1 RETURNING *"
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Active flag counts per severity for a school
    pub async fn count_active_by_severity(
        pool: &PgPool,
        school_id: Uuid,
    ) -> Result<Vec<(String, i64)>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT severity, COUNT(*) as count
            FROM risk_flags
            WHERE school_id = $1 AND is_active
            GROUP BY severity
            "#
        )
        .bind(school_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|r| {
            (r.get::<String, _>("severity"), r.get::<i64, _>("count"))
        }).collect())
    }
}
