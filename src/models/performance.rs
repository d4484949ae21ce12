//! Performance record model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PerformanceRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub school_id: Uuid,
    pub subject: String,
    pub term: String,
    pub academic_year: String,
    pub score: f32,
    pub max_score: f32,
    pub grade: String,
    pub recorded_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
}

impl PerformanceRecord {
    pub fn percentage(&self) -> f64 {
        if self.max_score <= 0.0 {
            return 0.0;
        }
        (self.score as f64 / self.max_score as f64) * 100.0
    }

    /// Recent records, newest term first, bounded so the evaluator sees the
    /// current and previous terms without loading a full transcript.
    pub async fn list_recent(
        pool: &PgPool,
        student_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PerformanceRecord>(
            r#"
            SELECT * FROM performance_records
            WHERE student_id = $1
            ORDER BY academic_year DESC, term DESC, created_at DESC
            LIMIT $2
            "#
        )
        .bind(student_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

/// Letter grade from a raw score, fixed percentage bands
pub fn letter_grade(score: f32, max_score: f32) -> char {
    if max_score <= 0.0 {
        return 'F';
    }
    let pct = (score as f64 / max_score as f64) * 100.0;
    if pct >= 90.0 {
        'A'
    } else if pct >= 80.0 {
        'B'
    } else if pct >= 70.0 {
        'C'
    } else if pct >= 60.0 {
        'D'
    } else if pct >= 50.0 {
        'E'
    } else {
        'F'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_bands_match_policy() {
        assert_eq!(letter_grade(90.0, 100.0), 'A');
        assert_eq!(letter_grade(85.0, 100.0), 'B');
        assert_eq!(letter_grade(70.0, 100.0), 'C');
        assert_eq!(letter_grade(60.0, 100.0), 'D');
        assert_eq!(letter_grade(50.0, 100.0), 'E');
        assert_eq!(letter_grade(45.0, 100.0), 'F');
        assert_eq!(letter_grade(49.9, 100.0), 'F');
    }

    #[test]
    fn grade_scales_with_max_score() {
        assert_eq!(letter_grade(18.0, 20.0), 'A');
        assert_eq!(letter_grade(9.0, 20.0), 'F');
    }

    #[test]
    fn zero_max_score_is_failing() {
        assert_eq!(letter_grade(10.0, 0.0), 'F');
    }
}
