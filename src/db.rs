//! Database module - PostgreSQL connection and migrations

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create tables if not exist
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL
const SCHEMA_SQL: &str = r#"
-- Schools
CREATE TABLE IF NOT EXISTS schools (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    district VARCHAR(255),
    is_active BOOLEAN DEFAULT true,
    created_at TIMESTAMPTZ DEFAULT NOW(),
    updated_at TIMESTAMPTZ DEFAULT NOW()
);

-- Students (socioeconomic profile inline, risk_level is a derived projection)
CREATE TABLE IF NOT EXISTS students (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    school_id UUID REFERENCES schools(id) ON DELETE CASCADE,
    first_name VARCHAR(100) NOT NULL,
    last_name VARCHAR(100) NOT NULL,
    is_active BOOLEAN DEFAULT true,
    ubudehe_tier INT,
    parental_presence VARCHAR(10) DEFAULT 'BOTH',
    family_stable BOOLEAN DEFAULT true,
    distance_to_school_km REAL,
    sibling_count INT,
    parent_education VARCHAR(20),
    risk_level VARCHAR(10) NOT NULL DEFAULT 'NONE',
    created_at TIMESTAMPTZ DEFAULT NOW(),
    updated_at TIMESTAMPTZ DEFAULT NOW()
);

-- Guardian contacts
CREATE TABLE IF NOT EXISTS guardians (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    student_id UUID REFERENCES students(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    phone VARCHAR(30),
    email VARCHAR(255),
    relation VARCHAR(50),
    is_primary BOOLEAN DEFAULT false,
    created_at TIMESTAMPTZ DEFAULT NOW()
);

-- Attendance records, one per (student, day)
CREATE TABLE IF NOT EXISTS attendance_records (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    student_id UUID REFERENCES students(id) ON DELETE CASCADE,
    school_id UUID REFERENCES schools(id) ON DELETE CASCADE,
    record_date DATE NOT NULL,
    status VARCHAR(10) NOT NULL,
    reason TEXT,
    recorded_by UUID,
    created_at TIMESTAMPTZ DEFAULT NOW(),
    UNIQUE (student_id, record_date)
);

-- Performance records
CREATE TABLE IF NOT EXISTS performance_records (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    student_id UUID REFERENCES students(id) ON DELETE CASCADE,
    school_id UUID REFERENCES schools(id) ON DELETE CASCADE,
    subject VARCHAR(100) NOT NULL,
    term VARCHAR(20) NOT NULL,
    academic_year VARCHAR(20) NOT NULL,
    score REAL NOT NULL,
    max_score REAL NOT NULL,
    grade CHAR(1) NOT NULL,
    recorded_by UUID,
    created_at TIMESTAMPTZ DEFAULT NOW()
);

-- Risk flags. severity_rank mirrors severity numerically so the dedup
-- upsert can compare severities inside a single conditional statement.
CREATE TABLE IF NOT EXISTS risk_flags (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    student_id UUID REFERENCES students(id) ON DELETE CASCADE,
    school_id UUID REFERENCES schools(id) ON DELETE CASCADE,
    flag_type VARCHAR(20) NOT NULL,
    severity VARCHAR(10) NOT NULL,
    severity_rank SMALLINT NOT NULL,
    title VARCHAR(500) NOT NULL,
    description TEXT,
    evidence JSONB,
    is_active BOOLEAN NOT NULL DEFAULT true,
    is_resolved BOOLEAN NOT NULL DEFAULT false,
    auto_generated BOOLEAN NOT NULL DEFAULT false,
    created_by UUID,
    resolved_by UUID,
    resolution_notes TEXT,
    resolved_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- At most one active flag per (student, type); the aggregator's upsert
-- targets this index.
CREATE UNIQUE INDEX IF NOT EXISTS idx_risk_flags_active_dedup
    ON risk_flags(student_id, flag_type) WHERE is_active;

-- Guardian/staff messages with independent channel statuses
CREATE TABLE IF NOT EXISTS messages (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    student_id UUID REFERENCES students(id) ON DELETE CASCADE,
    guardian_id UUID REFERENCES guardians(id) ON DELETE SET NULL,
    recipient_name VARCHAR(255) NOT NULL,
    recipient_phone VARCHAR(30),
    recipient_email VARCHAR(255),
    channel VARCHAR(10) NOT NULL,
    alert_kind VARCHAR(30) NOT NULL,
    subject VARCHAR(255),
    body TEXT NOT NULL,
    status VARCHAR(10) NOT NULL DEFAULT 'PENDING',
    sms_status VARCHAR(10),
    email_status VARCHAR(10),
    retry_count INT NOT NULL DEFAULT 0,
    sent_by UUID,
    sent_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_students_school ON students(school_id);
CREATE INDEX IF NOT EXISTS idx_students_risk_level ON students(risk_level);
CREATE INDEX IF NOT EXISTS idx_guardians_student ON guardians(student_id);
CREATE INDEX IF NOT EXISTS idx_attendance_student_date ON attendance_records(student_id, record_date);
CREATE INDEX IF NOT EXISTS idx_performance_student ON performance_records(student_id, academic_year, term);
CREATE INDEX IF NOT EXISTS idx_risk_flags_student ON risk_flags(student_id);
CREATE INDEX IF NOT EXISTS idx_risk_flags_school ON risk_flags(school_id);
CREATE INDEX IF NOT EXISTS idx_risk_flags_active ON risk_flags(is_active);
CREATE INDEX IF NOT EXISTS idx_messages_student ON messages(student_id);
CREATE INDEX IF NOT EXISTS idx_messages_status ON messages(status, retry_count);
"#;
