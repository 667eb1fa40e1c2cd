use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ReconcileConfig;
use crate::db::Database;
use crate::error::Result;
use crate::metrics;
use crate::models::{FileRecord, UploadIntent};
use crate::services::quota::QuotaService;
use crate::storage::StorageManager;

/// Rows handled per table per pass
const SWEEP_BATCH: i64 = 100;

/// Background reclaimer for storage the upload protocol could not settle
/// inline: intent rows whose upload never committed or compensated, journal
/// rows for objects an overwrite displaced, and soft-deleted files past
/// their retention window.
pub struct ReconcileWorker {
    db: Database,
    storage: Arc<StorageManager>,
    interval: Duration,
    orphan_grace: ChronoDuration,
    purge_grace: ChronoDuration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub intents_settled: u64,
    pub files_purged: u64,
    pub failures: u64,
}

impl ReconcileWorker {
    pub fn new(db: Database, storage: Arc<StorageManager>, config: &ReconcileConfig) -> Self {
        Self {
            db,
            storage,
            interval: Duration::from_secs(config.interval_secs),
            orphan_grace: ChronoDuration::hours(config.orphan_grace_hours as i64),
            purge_grace: ChronoDuration::days(config.purge_grace_days as i64),
        }
    }

    /// Run on the configured cadence until the process exits. A failed pass
    /// is logged and the next tick tries again.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                match self.run_once().await {
                    Ok(summary) => {
                        metrics::observe_reconcile_run(true);
                        if summary != SweepSummary::default() {
                            tracing::info!(
                                "Reconcile sweep settled {} intents, purged {} files, {} failures",
                                summary.intents_settled,
                                summary.files_purged,
                                summary.failures
                            );
                        }
                    }
                    Err(err) => {
                        metrics::observe_reconcile_run(false);
                        tracing::error!("Reconcile sweep failed: {}", err);
                    }
                }
            }
        })
    }

    /// One full pass over both backlogs
    pub async fn run_once(&self) -> Result<SweepSummary> {
        let mut summary = SweepSummary::default();
        self.settle_stale_intents(&mut summary).await?;
        self.purge_deleted_files(&mut summary).await?;

        metrics::observe_reconcile_removed("stale_intent", summary.intents_settled);
        metrics::observe_reconcile_removed("purged_file", summary.files_purged);
        Ok(summary)
    }

    /// Intents at least as old as the grace period belong to uploads that
    /// died without compensating. The grace keeps slow in-flight uploads
    /// safe; sqlite truncates datetimes to whole seconds, so the comparison
    /// is inclusive or a zero grace would spare same-second rows.
    async fn settle_stale_intents(&self, summary: &mut SweepSummary) -> Result<()> {
        let cutoff = (Utc::now() - self.orphan_grace).to_rfc3339();
        let stale: Vec<UploadIntent> = sqlx::query_as(
            r#"
            SELECT * FROM upload_intents
            WHERE datetime(created_at) <= datetime(?)
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(&cutoff)
        .bind(SWEEP_BATCH)
        .fetch_all(self.db.pool())
        .await?;

        for intent in stale {
            match self.settle_intent(&intent).await {
                Ok(()) => summary.intents_settled += 1,
                Err(err) => {
                    summary.failures += 1;
                    tracing::warn!("Leaving intent {} for the next sweep: {}", intent.id, err);
                }
            }
        }
        Ok(())
    }

    async fn settle_intent(&self, intent: &UploadIntent) -> Result<()> {
        // Committing uploads retire their intent in the commit transaction,
        // so a key that a file record still references should never show up
        // here. If it does, keep the object and drop only the row.
        let referenced: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM files WHERE backend_key = ? AND backend_type = ? LIMIT 1",
        )
        .bind(&intent.backend_key)
        .bind(&intent.backend_type)
        .fetch_optional(self.db.pool())
        .await?;
        if referenced.is_some() {
            tracing::warn!(
                "Intent {} points at a referenced key '{}'; dropping the row only",
                intent.id,
                intent.backend_key
            );
            sqlx::query("DELETE FROM upload_intents WHERE id = ?")
                .bind(&intent.id)
                .execute(self.db.pool())
                .await?;
            return Ok(());
        }

        let backend = self.storage.for_backend(&intent.backend_type)?;
        backend.delete(&intent.backend_key).await?;

        let mut tx = self.db.pool().begin().await?;
        let removed = sqlx::query("DELETE FROM upload_intents WHERE id = ?")
            .bind(&intent.id)
            .execute(tx.as_mut())
            .await?;
        // Journal rows for displaced objects carry size 0: their bytes were
        // already released when the overwrite committed.
        if removed.rows_affected() == 1 && intent.size > 0 {
            QuotaService::release_tx(tx.as_mut(), &intent.workspace_id, intent.size).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Soft-deleted files past the retention window lose their object and
    /// their row. Quota came back at soft-delete time.
    async fn purge_deleted_files(&self, summary: &mut SweepSummary) -> Result<()> {
        let cutoff = (Utc::now() - self.purge_grace).to_rfc3339();
        let expired: Vec<FileRecord> = sqlx::query_as(
            r#"
            SELECT * FROM files
            WHERE deleted_at IS NOT NULL AND datetime(deleted_at) <= datetime(?)
            ORDER BY deleted_at ASC
            LIMIT ?
            "#,
        )
        .bind(&cutoff)
        .bind(SWEEP_BATCH)
        .fetch_all(self.db.pool())
        .await?;

        for record in expired {
            match self.purge_file(&record).await {
                Ok(()) => summary.files_purged += 1,
                Err(err) => {
                    summary.failures += 1;
                    tracing::warn!(
                        "Leaving deleted file {} for the next sweep: {}",
                        record.id,
                        err
                    );
                }
            }
        }
        Ok(())
    }

    async fn purge_file(&self, record: &FileRecord) -> Result<()> {
        let backend = self.storage.for_backend(&record.backend_type)?;
        backend.delete(&record.backend_key).await?;

        sqlx::query("DELETE FROM files WHERE id = ? AND deleted_at IS NOT NULL")
            .bind(&record.id)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Workspace;
    use crate::services::file::FileService;
    use crate::storage::memory::MemoryBackend;
    use crate::storage::StorageBackend;
    use bytes::Bytes;
    use uuid::Uuid;

    fn sweep_now_config() -> ReconcileConfig {
        ReconcileConfig {
            interval_secs: 300,
            orphan_grace_hours: 0,
            purge_grace_days: 0,
        }
    }

    async fn setup() -> (
        tempfile::TempDir,
        Database,
        Arc<MemoryBackend>,
        Arc<StorageManager>,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        db.run_migrations().await.unwrap();

        let memory = Arc::new(MemoryBackend::new());
        let storage = Arc::new(StorageManager::with_backend(memory.clone()));
        (dir, db, memory, storage)
    }

    async fn seed_workspace(db: &Database) -> Workspace {
        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, 'x', ?, ?)",
        )
        .bind(&user_id)
        .bind(format!("owner-{}", &user_id[..8]))
        .bind(format!("{}@example.com", &user_id[..8]))
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await
        .unwrap();

        let workspace_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO workspaces (id, name, owner_id, quota_bytes, used_bytes, max_file_bytes, created_at, updated_at) VALUES (?, 'ws', ?, 10000, 0, 5000, ?, ?)",
        )
        .bind(&workspace_id)
        .bind(&user_id)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await
        .unwrap();

        sqlx::query_as::<_, Workspace>("SELECT * FROM workspaces WHERE id = ?")
            .bind(&workspace_id)
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    /// Simulate an upload that reserved quota, journaled its intent, wrote
    /// the object, and then died before commit or compensation.
    async fn plant_orphan(
        db: &Database,
        memory: &MemoryBackend,
        workspace_id: &str,
        key: &str,
        size: i64,
        age_hours: i64,
    ) -> String {
        sqlx::query("UPDATE workspaces SET used_bytes = used_bytes + ? WHERE id = ?")
            .bind(size)
            .bind(workspace_id)
            .execute(db.pool())
            .await
            .unwrap();

        memory
            .put(key, Bytes::from(vec![0u8; size as usize]))
            .await
            .unwrap();

        let intent_id = Uuid::new_v4().to_string();
        let created_at = (Utc::now() - ChronoDuration::hours(age_hours)).to_rfc3339();
        sqlx::query(
            "INSERT INTO upload_intents (id, workspace_id, file_id, backend_key, backend_type, size, created_at) VALUES (?, ?, ?, ?, 'memory', ?, ?)",
        )
        .bind(&intent_id)
        .bind(workspace_id)
        .bind(Uuid::new_v4().to_string())
        .bind(key)
        .bind(size)
        .bind(&created_at)
        .execute(db.pool())
        .await
        .unwrap();
        intent_id
    }

    async fn used_bytes(db: &Database, workspace_id: &str) -> i64 {
        sqlx::query_scalar("SELECT used_bytes FROM workspaces WHERE id = ?")
            .bind(workspace_id)
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    async fn intent_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM upload_intents")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sweep_settles_stale_intent() {
        let (_dir, db, memory, storage) = setup().await;
        let ws = seed_workspace(&db).await;

        let key = format!("{}/f1/1", ws.id);
        plant_orphan(&db, &memory, &ws.id, &key, 64, 48).await;
        assert!(memory.contains(&key));
        assert_eq!(used_bytes(&db, &ws.id).await, 64);

        let worker = ReconcileWorker::new(db.clone(), storage, &sweep_now_config());
        let summary = worker.run_once().await.unwrap();

        assert_eq!(summary.intents_settled, 1);
        assert_eq!(summary.failures, 0);
        assert!(!memory.contains(&key));
        assert_eq!(intent_count(&db).await, 0);
        assert_eq!(used_bytes(&db, &ws.id).await, 0);
    }

    #[tokio::test]
    async fn test_zero_grace_makes_same_second_rows_eligible() {
        let (_dir, db, memory, storage) = setup().await;
        let ws = seed_workspace(&db).await;

        // Rows written in the same second as the sweep: zero grace must
        // still collect them despite sqlite's whole-second datetimes.
        let key = format!("{}/f1/1", ws.id);
        plant_orphan(&db, &memory, &ws.id, &key, 64, 0).await;

        let uploaded = FileService::upload(
            &db,
            &storage,
            &ws,
            "tester",
            "a.txt",
            None,
            Bytes::from_static(b"abc"),
            false,
        )
        .await
        .unwrap();
        FileService::delete(&db, &ws, "tester", &uploaded.id)
            .await
            .unwrap();

        let worker = ReconcileWorker::new(db.clone(), storage, &sweep_now_config());
        let summary = worker.run_once().await.unwrap();

        assert_eq!(summary.intents_settled, 1);
        assert_eq!(summary.files_purged, 1);
        assert!(!memory.contains(&key));
        assert!(!memory.contains(&format!("{}/{}/1", ws.id, uploaded.id)));
        assert_eq!(intent_count(&db).await, 0);
        assert_eq!(used_bytes(&db, &ws.id).await, 0);
    }

    #[tokio::test]
    async fn test_sweep_spares_recent_intents() {
        let (_dir, db, memory, storage) = setup().await;
        let ws = seed_workspace(&db).await;

        let key = format!("{}/f1/1", ws.id);
        plant_orphan(&db, &memory, &ws.id, &key, 64, 0).await;

        let config = ReconcileConfig {
            interval_secs: 300,
            orphan_grace_hours: 24,
            purge_grace_days: 30,
        };
        let worker = ReconcileWorker::new(db.clone(), storage, &config);
        let summary = worker.run_once().await.unwrap();

        // The upload might still be in flight; nothing moves.
        assert_eq!(summary, SweepSummary::default());
        assert!(memory.contains(&key));
        assert_eq!(intent_count(&db).await, 1);
        assert_eq!(used_bytes(&db, &ws.id).await, 64);
    }

    #[tokio::test]
    async fn test_sweep_purges_expired_soft_deleted_file() {
        let (_dir, db, memory, storage) = setup().await;
        let ws = seed_workspace(&db).await;

        let uploaded = FileService::upload(
            &db,
            &storage,
            &ws,
            "tester",
            "a.txt",
            None,
            Bytes::from_static(b"abc"),
            false,
        )
        .await
        .unwrap();
        FileService::delete(&db, &ws, "tester", &uploaded.id)
            .await
            .unwrap();

        let key = format!("{}/{}/1", ws.id, uploaded.id);
        assert!(memory.contains(&key));

        // Backdate the tombstone past the retention window.
        sqlx::query("UPDATE files SET deleted_at = ? WHERE id = ?")
            .bind((Utc::now() - ChronoDuration::days(45)).to_rfc3339())
            .bind(&uploaded.id)
            .execute(db.pool())
            .await
            .unwrap();

        let config = ReconcileConfig {
            interval_secs: 300,
            orphan_grace_hours: 24,
            purge_grace_days: 30,
        };
        let worker = ReconcileWorker::new(db.clone(), storage, &config);
        let summary = worker.run_once().await.unwrap();

        assert_eq!(summary.files_purged, 1);
        assert!(!memory.contains(&key));
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_sweep_spares_recent_soft_deleted_file() {
        let (_dir, db, memory, storage) = setup().await;
        let ws = seed_workspace(&db).await;

        let uploaded = FileService::upload(
            &db,
            &storage,
            &ws,
            "tester",
            "a.txt",
            None,
            Bytes::from_static(b"abc"),
            false,
        )
        .await
        .unwrap();
        FileService::delete(&db, &ws, "tester", &uploaded.id)
            .await
            .unwrap();

        let config = ReconcileConfig {
            interval_secs: 300,
            orphan_grace_hours: 24,
            purge_grace_days: 30,
        };
        let worker = ReconcileWorker::new(db.clone(), storage, &config);
        let summary = worker.run_once().await.unwrap();

        assert_eq!(summary.files_purged, 0);
        assert!(memory.contains(&format!("{}/{}/1", ws.id, uploaded.id)));
    }

    #[tokio::test]
    async fn test_sweep_counts_failures_and_retries_later() {
        let (_dir, db, memory, storage) = setup().await;
        let ws = seed_workspace(&db).await;

        let key_a = format!("{}/f1/1", ws.id);
        let key_b = format!("{}/f2/1", ws.id);
        plant_orphan(&db, &memory, &ws.id, &key_a, 10, 48).await;
        plant_orphan(&db, &memory, &ws.id, &key_b, 10, 48).await;

        memory.set_fail_deletes(true);
        let worker = ReconcileWorker::new(db.clone(), storage, &sweep_now_config());
        let summary = worker.run_once().await.unwrap();
        assert_eq!(summary.intents_settled, 0);
        assert_eq!(summary.failures, 2);
        assert_eq!(intent_count(&db).await, 2);
        assert_eq!(used_bytes(&db, &ws.id).await, 20);

        // Backend recovers; the next pass finishes the job.
        memory.set_fail_deletes(false);
        let summary = worker.run_once().await.unwrap();
        assert_eq!(summary.intents_settled, 2);
        assert_eq!(intent_count(&db).await, 0);
        assert_eq!(used_bytes(&db, &ws.id).await, 0);
        assert!(!memory.contains(&key_a));
        assert!(!memory.contains(&key_b));
    }

    #[tokio::test]
    async fn test_sweep_leaves_unknown_backend_rows_alone() {
        let (_dir, db, _memory, storage) = setup().await;
        let ws = seed_workspace(&db).await;

        // A row written under a binding that is no longer configured. The
        // operator has to restore that backend or migrate explicitly.
        sqlx::query(
            "INSERT INTO upload_intents (id, workspace_id, file_id, backend_key, backend_type, size, created_at) VALUES (?, ?, ?, ?, 's3', 10, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&ws.id)
        .bind(Uuid::new_v4().to_string())
        .bind(format!("{}/f1/1", ws.id))
        .bind((Utc::now() - ChronoDuration::hours(48)).to_rfc3339())
        .execute(db.pool())
        .await
        .unwrap();

        let worker = ReconcileWorker::new(db.clone(), storage, &sweep_now_config());
        let summary = worker.run_once().await.unwrap();

        assert_eq!(summary.intents_settled, 0);
        assert_eq!(summary.failures, 1);
        assert_eq!(intent_count(&db).await, 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_objects_referenced_by_records() {
        let (_dir, db, memory, storage) = setup().await;
        let ws = seed_workspace(&db).await;

        let uploaded = FileService::upload(
            &db,
            &storage,
            &ws,
            "tester",
            "a.txt",
            None,
            Bytes::from_static(b"abc"),
            false,
        )
        .await
        .unwrap();
        let key = format!("{}/{}/1", ws.id, uploaded.id);

        // A stray intent row pointing at a committed key must not take the
        // object with it.
        sqlx::query(
            "INSERT INTO upload_intents (id, workspace_id, file_id, backend_key, backend_type, size, created_at) VALUES (?, ?, ?, ?, 'memory', 0, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&ws.id)
        .bind(&uploaded.id)
        .bind(&key)
        .bind((Utc::now() - ChronoDuration::hours(48)).to_rfc3339())
        .execute(db.pool())
        .await
        .unwrap();

        let worker = ReconcileWorker::new(db.clone(), storage, &sweep_now_config());
        let summary = worker.run_once().await.unwrap();

        assert_eq!(summary.intents_settled, 1);
        assert_eq!(intent_count(&db).await, 0);
        assert!(memory.contains(&key));
    }
}
