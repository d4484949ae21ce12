//! Attendance record model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};

pub const STATUS_PRESENT: &str = "PRESENT";
pub const STATUS_ABSENT: &str = "ABSENT";
pub const STATUS_LATE: &str = "LATE";
pub const STATUS_EXCUSED: &str = "EXCUSED";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub school_id: Uuid,
    pub record_date: NaiveDate,
    pub status: String,
    pub reason: Option<String>,
    pub recorded_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

impl AttendanceRecord {
    /// Records inside the trailing window, newest first — the shape the
    /// attendance evaluator consumes (streak counting walks from index 0).
    pub async fn trailing_window(
        pool: &PgPool,
        student_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT * FROM attendance_records
            WHERE student_id = $1 AND record_date >= $2
            ORDER BY record_date DESC
            "#
        )
        .bind(student_id)
        .bind(since)
        .fetch_all(pool)
        .await
    }
}
