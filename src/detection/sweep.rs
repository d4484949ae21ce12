//! Whole-school detection sweeps
//!
//! A sweep is an identifiable background run: accepted immediately,
//! iterated with bounded concurrency, per-student failures collected
//! into the run's error list instead of aborting it. Each student's
//! flags commit independently; there is no cross-student transaction
//! and no mid-run cancellation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{School, Student};
use crate::notify::Notifier;
use super::config::RiskThresholds;

pub const STATUS_RUNNING: &str = "RUNNING";
pub const STATUS_COMPLETED: &str = "COMPLETED";
pub const STATUS_FAILED: &str = "FAILED";

/// Finished runs kept around for status queries
const MAX_RETAINED_RUNS: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct SweepRun {
    pub id: Uuid,
    pub school_id: Uuid,
    pub status: String,
    pub started_by: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub students_total: usize,
    pub students_scanned: usize,
    pub risks_detected: usize,
    pub flags_created: usize,
    pub errors: Vec<String>,
}

/// In-process registry of sweep runs
#[derive(Debug, Default)]
pub struct SweepRegistry {
    runs: RwLock<HashMap<Uuid, SweepRun>>,
}

impl SweepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: Uuid) -> Option<SweepRun> {
        self.runs.read().await.get(&id).cloned()
    }

    async fn insert(&self, run: SweepRun) {
        let mut runs = self.runs.write().await;
        if runs.len() >= MAX_RETAINED_RUNS {
            let oldest_finished = runs
                .values()
                .filter(|r| r.finished_at.is_some())
                .min_by_key(|r| r.started_at)
                .map(|r| r.id);
            if let Some(id) = oldest_finished {
                runs.remove(&id);
            }
        }
        runs.insert(run.id, run);
    }

    async fn update<F: FnOnce(&mut SweepRun)>(&self, id: Uuid, f: F) {
        let mut runs = self.runs.write().await;
        if let Some(run) = runs.get_mut(&id) {
            f(run);
        }
    }
}

/// Accept a sweep: verify the school, register the run, spawn the work,
/// return the run id immediately.
pub async fn start_school_sweep(
    pool: &PgPool,
    notifier: &Arc<Notifier>,
    thresholds: &Arc<RiskThresholds>,
    registry: &Arc<SweepRegistry>,
    school_id: Uuid,
    actor_id: Option<Uuid>,
    concurrency: usize,
) -> AppResult<Uuid> {
    School::find_by_id(pool, school_id)
        .await?
        .ok_or_else(|| AppError::NotFound("School not found".to_string()))?;

    let run_id = Uuid::new_v4();
    registry
        .insert(SweepRun {
            id: run_id,
            school_id,
            status: STATUS_RUNNING.to_string(),
            started_by: actor_id,
            started_at: Utc::now(),
            finished_at: None,
            students_total: 0,
            students_scanned: 0,
            risks_detected: 0,
            flags_created: 0,
            errors: Vec::new(),
        })
        .await;

    tracing::info!("Sweep {} accepted for school {}", run_id, school_id);

    let pool = pool.clone();
    let notifier = Arc::clone(notifier);
    let thresholds = Arc::clone(thresholds);
    let registry = Arc::clone(registry);
    tokio::spawn(async move {
        run_sweep(pool, notifier, thresholds, registry, run_id, school_id, actor_id, concurrency)
            .await;
    });

    Ok(run_id)
}

#[allow(clippy::too_many_arguments)]
async fn run_sweep(
    pool: PgPool,
    notifier: Arc<Notifier>,
    thresholds: Arc<RiskThresholds>,
    registry: Arc<SweepRegistry>,
    run_id: Uuid,
    school_id: Uuid,
    actor_id: Option<Uuid>,
    concurrency: usize,
) {
    let student_ids = match Student::list_active_ids(&pool, school_id).await {
        Ok(ids) => ids,
        Err(err) => {
            tracing::error!("Sweep {} could not list students: {}", run_id, err);
            registry
                .update(run_id, |run| {
                    run.status = STATUS_FAILED.to_string();
                    run.finished_at = Some(Utc::now());
                    run.errors.push(format!("failed to list students: {}", err));
                })
                .await;
            return;
        }
    };

    registry
        .update(run_id, |run| run.students_total = student_ids.len())
        .await;

    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for student_id in student_ids {
        let pool = pool.clone();
        let notifier = Arc::clone(&notifier);
        let thresholds = Arc::clone(&thresholds);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let result = super::detect_for_student(
                &pool, &notifier, &thresholds, student_id, school_id, actor_id,
            )
            .await;
            (student_id, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(summary))) => {
                registry
                    .update(run_id, |run| {
                        run.students_scanned += 1;
                        run.risks_detected += summary.risks_detected;
                        run.flags_created += summary.flags_created;
                    })
                    .await;
            }
            Ok((student_id, Err(err))) => {
                tracing::warn!("Sweep {}: student {} failed: {:?}", run_id, student_id, err);
                registry
                    .update(run_id, |run| {
                        run.students_scanned += 1;
                        run.errors.push(format!("student {}: {:?}", student_id, err));
                    })
                    .await;
            }
            Err(err) => {
                registry
                    .update(run_id, |run| {
                        run.errors.push(format!("worker task failed: {}", err));
                    })
                    .await;
            }
        }
    }

    registry
        .update(run_id, |run| {
            run.status = STATUS_COMPLETED.to_string();
            run.finished_at = Some(Utc::now());
            tracing::info!(
                "Sweep {} completed: {} students, {} risks, {} flags created, {} errors",
                run_id, run.students_scanned, run.risks_detected, run.flags_created,
                run.errors.len()
            );
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: Uuid, finished: bool) -> SweepRun {
        SweepRun {
            id,
            school_id: Uuid::new_v4(),
            status: if finished { STATUS_COMPLETED } else { STATUS_RUNNING }.to_string(),
            started_by: None,
            started_at: Utc::now(),
            finished_at: finished.then(Utc::now),
            students_total: 0,
            students_scanned: 0,
            risks_detected: 0,
            flags_created: 0,
            errors: Vec::new(),
        }
    }

    #[tokio::test]
    async fn registry_tracks_run_progress() {
        let registry = SweepRegistry::new();
        let id = Uuid::new_v4();
        registry.insert(run(id, false)).await;

        registry
            .update(id, |r| {
                r.students_scanned = 3;
                r.flags_created = 2;
                r.errors.push("student x: failed".to_string());
            })
            .await;

        let snapshot = registry.get(id).await.expect("run registered");
        assert_eq!(snapshot.status, STATUS_RUNNING);
        assert_eq!(snapshot.students_scanned, 3);
        assert_eq!(snapshot.flags_created, 2);
        assert_eq!(snapshot.errors.len(), 1);
    }

    #[tokio::test]
    async fn registry_misses_return_none() {
        let registry = SweepRegistry::new();
        assert!(registry.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn retention_evicts_oldest_finished_run() {
        let registry = SweepRegistry::new();
        let mut first_finished = None;
        for i in 0..MAX_RETAINED_RUNS {
            let id = Uuid::new_v4();
            if i == 0 {
                first_finished = Some(id);
            }
            registry.insert(run(id, true)).await;
        }

        let newcomer = Uuid::new_v4();
        registry.insert(run(newcomer, false)).await;

        assert!(registry.get(newcomer).await.is_some());
        assert!(registry.get(first_finished.unwrap()).await.is_none());
    }
}
