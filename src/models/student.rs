//! Student and guardian models

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: Uuid,
    pub school_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub is_active: Option<bool>,
    pub ubudehe_tier: Option<i32>,
    pub parental_presence: Option<String>,
    pub family_stable: Option<bool>,
    pub distance_to_school_km: Option<f32>,
    pub sibling_count: Option<i32>,
    pub parent_education: Option<String>,
    pub risk_level: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Student scoped to a school; used by detection entry points so a
    /// request cannot evaluate a student of another school.
    pub async fn find_in_school(
        pool: &PgPool,
        id: Uuid,
        school_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            "SELECT * FROM students WHERE id = $1 AND school_id = $2"
        )
        .bind(id)
        .bind(school_id)
        .fetch_optional(pool)
        .await
    }

    /// Active student ids of a school, the sweep's work list
    pub async fn list_active_ids(pool: &PgPool, school_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM students WHERE school_id = $1 AND is_active ORDER BY created_at ASC"
        )
        .bind(school_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Persist the derived risk level projection
    pub async fn update_risk_level(
        pool: &PgPool,
        id: Uuid,
        risk_level: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE students SET risk_level = $2, updated_at = NOW() WHERE id = $1"
        )
        .bind(id)
        .bind(risk_level)
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Guardian {
    pub id: Uuid,
    pub student_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub relation: Option<String>,
    pub is_primary: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Guardian {
    /// The contact alerts go to: primary-flagged first, else earliest entered
    pub async fn primary_contact(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Guardian>(
            r#"
            SELECT * FROM guardians
            WHERE student_id = $1
            ORDER BY is_primary DESC, created_at ASC
            LIMIT 1
            "#
        )
        .bind(student_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_for_student(
        pool: &PgPool,
        student_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Guardian>(
            "SELECT * FROM guardians WHERE student_id = $1 ORDER BY is_primary DESC, created_at ASC"
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
    }
}
