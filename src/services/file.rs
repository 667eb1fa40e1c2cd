use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    FileListResponse, FileRecord, FileResponse, ListFilesQuery, SignedUrlResponse, Workspace,
};
use crate::services::quota::QuotaService;
use crate::storage::sign::sha256_hex;
use crate::storage::{StorageBackend, StorageManager};

/// Logical names are capped at this many bytes
const MAX_NAME_BYTES: usize = 1024;
const DEFAULT_PAGE_SIZE: i64 = 100;
const MAX_PAGE_SIZE: i64 = 1000;
const DEFAULT_URL_TTL_SECS: u64 = 900;
/// Signature V4 rejects anything past seven days
const MAX_URL_TTL_SECS: u64 = 604_800;

/// Storage abstraction layer. Callers hand in a workspace they have already
/// been authorized against; everything below this line trusts that scope and
/// never widens it.
///
/// Uploads are two-phase: the quota is reserved and an intent row journaled
/// before the object is written, and the metadata commit removes the intent
/// in the same transaction. Any failure after the backend write triggers a
/// compensating delete; if that also fails the intent row stays behind for
/// the reconciliation sweep.
pub struct FileService;

impl FileService {
    /// Validate a logical file name.
    ///
    /// Names may contain forward slashes as folder separators but never
    /// backslashes, control characters, or empty / relative segments.
    pub fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(AppError::InvalidName("File name cannot be empty".to_string()));
        }
        if name.len() > MAX_NAME_BYTES {
            return Err(AppError::InvalidName(format!(
                "File name cannot exceed {} bytes",
                MAX_NAME_BYTES
            )));
        }
        if name.contains('\\') {
            return Err(AppError::InvalidName(
                "File name cannot contain backslashes".to_string(),
            ));
        }
        if name.chars().any(|c| c.is_control()) {
            return Err(AppError::InvalidName(
                "File name cannot contain control characters".to_string(),
            ));
        }
        for segment in name.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(AppError::InvalidName(
                    "File name cannot contain empty or relative path segments".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Upload file content under a logical name.
    ///
    /// Runs on a detached task so a client disconnect cannot abandon a
    /// half-finished upload: the attempt always reaches its commit or its
    /// compensating delete.
    pub async fn upload(
        db: &Database,
        storage: &Arc<StorageManager>,
        workspace: &Workspace,
        actor: &str,
        name: &str,
        content_type: Option<String>,
        data: Bytes,
        overwrite: bool,
    ) -> Result<FileResponse> {
        let task = tokio::spawn(Self::perform_upload(
            db.clone(),
            storage.clone(),
            workspace.clone(),
            actor.to_string(),
            name.to_string(),
            content_type,
            data,
            overwrite,
        ));
        match task.await {
            Ok(result) => result,
            Err(err) => Err(AppError::Internal(format!("Upload task failed: {}", err))),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn perform_upload(
        db: Database,
        storage: Arc<StorageManager>,
        workspace: Workspace,
        actor: String,
        name: String,
        content_type: Option<String>,
        data: Bytes,
        overwrite: bool,
    ) -> Result<FileResponse> {
        let started = Instant::now();
        let backend = storage.active();
        let size = data.len();

        let result = Self::try_upload(
            &db, &storage, &backend, &workspace, &name, content_type, data, overwrite,
        )
        .await;

        metrics::observe_storage_operation(
            "put",
            backend.backend_type(),
            Self::outcome_of(&result),
            started.elapsed(),
            Some(size),
        );
        let file_id = result.as_ref().ok().map(|f| f.id.clone());
        Self::log_access(
            &db,
            &workspace.id,
            file_id.as_deref(),
            &actor,
            "put",
            Self::outcome_of(&result),
        )
        .await;

        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_upload(
        db: &Database,
        storage: &Arc<StorageManager>,
        backend: &Arc<dyn StorageBackend>,
        workspace: &Workspace,
        name: &str,
        content_type: Option<String>,
        data: Bytes,
        overwrite: bool,
    ) -> Result<FileResponse> {
        Self::validate_name(name)?;

        let size = data.len() as i64;
        if workspace.max_file_bytes > 0 && size > workspace.max_file_bytes {
            return Err(AppError::QuotaExceeded(format!(
                "File size {} exceeds the per-file limit of {} bytes",
                size, workspace.max_file_bytes
            )));
        }

        let existing = Self::find_live_by_name(db, &workspace.id, name).await?;
        if existing.is_some() && !overwrite {
            return Err(AppError::Conflict(format!(
                "File '{}' already exists in this workspace",
                name
            )));
        }

        // Reservation happens before any backend traffic. From here on every
        // failure path must return the reserved bytes exactly once, either
        // directly or through the intent row the sweep settles later.
        QuotaService::reserve(db, &workspace.id, size).await?;

        // Claim the next version ordinal up front so concurrent overwrites of
        // the same file never share a tentative key. A loser finds the row
        // already advanced and backs out before writing anything.
        let claim = Self::claim_version(db, &existing).await;
        let (file_id, version, displaced) = match claim {
            Ok(claimed) => claimed,
            Err(err) => {
                Self::release_quietly(db, &workspace.id, size).await;
                return Err(err);
            }
        };

        let backend_key = format!("{}/{}/{}", workspace.id, file_id, version);
        let backend_type = backend.backend_type();
        let checksum = sha256_hex(&data);
        let content_type = content_type.or_else(|| {
            Some(
                mime_guess::from_path(name)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string(),
            )
        });

        let intent_id = Uuid::new_v4().to_string();
        if let Err(err) = Self::insert_intent(
            db,
            &intent_id,
            &workspace.id,
            &file_id,
            &backend_key,
            backend_type,
            size,
        )
        .await
        {
            Self::release_quietly(db, &workspace.id, size).await;
            return Err(err);
        }

        // Tentative object write. The intent row now owns the reservation.
        if let Err(err) = backend.put(&backend_key, data).await {
            Self::compensate_upload(db, backend, &workspace.id, &intent_id, &backend_key, size)
                .await;
            return Err(err);
        }

        let replaced_journal_id = displaced.as_ref().map(|_| Uuid::new_v4().to_string());
        let commit = Self::commit_upload(
            db,
            &displaced,
            &workspace.id,
            &file_id,
            name,
            &backend_key,
            backend_type,
            size,
            &checksum,
            &content_type,
            version,
            &intent_id,
            replaced_journal_id.as_deref(),
        )
        .await;

        if let Err(err) = commit {
            Self::compensate_upload(db, backend, &workspace.id, &intent_id, &backend_key, size)
                .await;
            return Err(err);
        }

        if let (Some(old), Some(journal_id)) = (&displaced, &replaced_journal_id) {
            Self::reclaim_replaced_object(db, storage, old, journal_id).await;
        }

        let record = Self::get_live(db, &workspace.id, &file_id)
            .await?
            .ok_or_else(|| AppError::Internal("Committed file vanished".to_string()))?;

        tracing::debug!(
            "Stored '{}' as {} v{} ({} bytes) in workspace {}",
            record.name,
            record.id,
            record.version,
            record.size,
            workspace.id
        );

        Ok(FileResponse::from(record))
    }

    /// Advance the version counter for an overwrite, or mint a fresh id.
    /// Failing the advance means another writer or a delete got there first.
    ///
    /// Returns the row as re-read inside the claiming transaction. That
    /// pre-image, not the caller's earlier read, names the content the
    /// overwrite displaces; a commit that slipped in between the two reads
    /// would otherwise be journaled and released against stale values.
    async fn claim_version(
        db: &Database,
        existing: &Option<FileRecord>,
    ) -> Result<(String, i64, Option<FileRecord>)> {
        match existing {
            Some(existing) => {
                let mut tx = db.pool().begin().await?;
                let claimed = sqlx::query(
                    r#"
                    UPDATE files
                    SET version = version + 1, updated_at = ?
                    WHERE id = ? AND version = ? AND deleted_at IS NULL
                    "#,
                )
                .bind(Utc::now().to_rfc3339())
                .bind(&existing.id)
                .bind(existing.version)
                .execute(tx.as_mut())
                .await?;

                if claimed.rows_affected() == 0 {
                    return Err(AppError::Conflict(
                        "File was modified concurrently".to_string(),
                    ));
                }

                let displaced = sqlx::query_as::<_, FileRecord>(
                    "SELECT * FROM files WHERE id = ?",
                )
                .bind(&existing.id)
                .fetch_one(tx.as_mut())
                .await?;
                tx.commit().await?;

                Ok((existing.id.clone(), existing.version + 1, Some(displaced)))
            }
            None => Ok((Uuid::new_v4().to_string(), 1, None)),
        }
    }

    async fn insert_intent(
        db: &Database,
        intent_id: &str,
        workspace_id: &str,
        file_id: &str,
        backend_key: &str,
        backend_type: &str,
        size: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO upload_intents (id, workspace_id, file_id, backend_key, backend_type, size, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(intent_id)
        .bind(workspace_id)
        .bind(file_id)
        .bind(backend_key)
        .bind(backend_type)
        .bind(size)
        .bind(Utc::now().to_rfc3339())
        .execute(db.pool())
        .await?;
        Ok(())
    }

    /// Publish the metadata in one transaction: insert or CAS-update the
    /// record, journal the key an overwrite displaces, release the old
    /// version's bytes, and retire the intent.
    #[allow(clippy::too_many_arguments)]
    async fn commit_upload(
        db: &Database,
        displaced: &Option<FileRecord>,
        workspace_id: &str,
        file_id: &str,
        name: &str,
        backend_key: &str,
        backend_type: &str,
        size: i64,
        checksum: &str,
        content_type: &Option<String>,
        version: i64,
        intent_id: &str,
        replaced_journal_id: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = db.pool().begin().await?;

        let committed = match displaced {
            Some(displaced) => {
                let result = sqlx::query(
                    r#"
                    UPDATE files
                    SET backend_key = ?, backend_type = ?, size = ?, checksum = ?,
                        content_type = ?, updated_at = ?
                    WHERE id = ? AND version = ? AND deleted_at IS NULL
                    "#,
                )
                .bind(backend_key)
                .bind(backend_type)
                .bind(size)
                .bind(checksum)
                .bind(content_type)
                .bind(&now)
                .bind(&displaced.id)
                .bind(version)
                .execute(tx.as_mut())
                .await?;
                result.rows_affected() == 1
            }
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO files (id, workspace_id, name, backend_key, backend_type,
                                       size, checksum, content_type, version, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(file_id)
                .bind(workspace_id)
                .bind(name)
                .bind(backend_key)
                .bind(backend_type)
                .bind(size)
                .bind(checksum)
                .bind(content_type)
                .bind(version)
                .bind(&now)
                .bind(&now)
                .execute(tx.as_mut())
                .await;
                match result {
                    Ok(_) => true,
                    // The live-name unique index lost us the race to a
                    // concurrent creator of the same name.
                    Err(err)
                        if err
                            .as_database_error()
                            .map(|d| d.is_unique_violation())
                            .unwrap_or(false) =>
                    {
                        false
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        };

        if !committed {
            return Err(AppError::Conflict(
                "File was modified concurrently".to_string(),
            ));
        }

        if let (Some(old), Some(journal_id)) = (displaced, replaced_journal_id) {
            // Journal the displaced key with size 0: its bytes are released
            // here, so the sweep must not release them again.
            sqlx::query(
                r#"
                INSERT INTO upload_intents (id, workspace_id, file_id, backend_key, backend_type, size, created_at)
                VALUES (?, ?, ?, ?, ?, 0, ?)
                "#,
            )
            .bind(journal_id)
            .bind(workspace_id)
            .bind(file_id)
            .bind(&old.backend_key)
            .bind(&old.backend_type)
            .bind(&now)
            .execute(tx.as_mut())
            .await?;
            QuotaService::release_tx(tx.as_mut(), workspace_id, old.size).await?;
        }

        sqlx::query("DELETE FROM upload_intents WHERE id = ?")
            .bind(intent_id)
            .execute(tx.as_mut())
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Undo a tentative write. If the object delete fails the intent row is
    /// left behind and the sweep finishes the job later.
    async fn compensate_upload(
        db: &Database,
        backend: &Arc<dyn StorageBackend>,
        workspace_id: &str,
        intent_id: &str,
        backend_key: &str,
        size: i64,
    ) {
        match backend.delete(backend_key).await {
            Ok(()) => {
                if let Err(err) = Self::discard_intent(db, workspace_id, intent_id, size).await {
                    tracing::warn!(
                        "Failed to clear upload intent {} after compensation: {}",
                        intent_id,
                        err
                    );
                }
            }
            Err(err) => {
                tracing::warn!(
                    "Compensating delete for '{}' failed, leaving intent {} for the sweep: {}",
                    backend_key,
                    intent_id,
                    err
                );
            }
        }
    }

    /// Remove an intent row and hand back its reservation. The guard on
    /// rows_affected keeps a racing sweep from releasing the same bytes twice.
    async fn discard_intent(
        db: &Database,
        workspace_id: &str,
        intent_id: &str,
        size: i64,
    ) -> Result<()> {
        let mut tx = db.pool().begin().await?;
        let removed = sqlx::query("DELETE FROM upload_intents WHERE id = ?")
            .bind(intent_id)
            .execute(tx.as_mut())
            .await?;
        if removed.rows_affected() == 1 {
            QuotaService::release_tx(tx.as_mut(), workspace_id, size).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Best-effort removal of the object an overwrite displaced. On failure
    /// the journal row stays and the sweep retries.
    async fn reclaim_replaced_object(
        db: &Database,
        storage: &Arc<StorageManager>,
        old: &FileRecord,
        journal_id: &str,
    ) {
        let backend = match storage.for_backend(&old.backend_type) {
            Ok(backend) => backend,
            Err(err) => {
                tracing::warn!(
                    "Cannot reclaim replaced object '{}': {}",
                    old.backend_key,
                    err
                );
                return;
            }
        };
        match backend.delete(&old.backend_key).await {
            Ok(()) => {
                if let Err(err) = sqlx::query("DELETE FROM upload_intents WHERE id = ?")
                    .bind(journal_id)
                    .execute(db.pool())
                    .await
                {
                    tracing::warn!("Failed to retire journal row {}: {}", journal_id, err);
                }
            }
            Err(err) => {
                tracing::debug!(
                    "Deferred removal of replaced object '{}' to the sweep: {}",
                    old.backend_key,
                    err
                );
            }
        }
    }

    async fn release_quietly(db: &Database, workspace_id: &str, size: i64) {
        if let Err(err) = QuotaService::release(db, workspace_id, size).await {
            tracing::warn!(
                "Failed to release {} reserved bytes for workspace {}: {}",
                size,
                workspace_id,
                err
            );
        }
    }

    /// Fetch file content. The record's own backend tag picks the adapter,
    /// so files written before a binding change keep working.
    pub async fn download(
        db: &Database,
        storage: &StorageManager,
        workspace: &Workspace,
        actor: &str,
        file_id: &str,
    ) -> Result<(FileRecord, Bytes)> {
        let started = Instant::now();
        let result = Self::try_download(db, storage, &workspace.id, file_id).await;

        let backend_label = result
            .as_ref()
            .map(|(record, _)| record.backend_type.clone())
            .unwrap_or_else(|_| storage.active_type().to_string());
        let bytes = result.as_ref().ok().map(|(_, data)| data.len());
        metrics::observe_storage_operation(
            "get",
            &backend_label,
            Self::outcome_of(&result),
            started.elapsed(),
            bytes,
        );
        Self::log_access(
            db,
            &workspace.id,
            Some(file_id),
            actor,
            "get",
            Self::outcome_of(&result),
        )
        .await;

        result
    }

    async fn try_download(
        db: &Database,
        storage: &StorageManager,
        workspace_id: &str,
        file_id: &str,
    ) -> Result<(FileRecord, Bytes)> {
        let record = Self::get_live(db, workspace_id, file_id)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        let backend = storage.for_backend(&record.backend_type)?;
        match backend.get(&record.backend_key).await {
            Ok(data) => Ok((record, data)),
            Err(AppError::NotFound(_)) => {
                tracing::error!(
                    "Object '{}' is missing from backend '{}' while its record is live",
                    record.backend_key,
                    record.backend_type
                );
                Err(AppError::NotFound("File content not found".to_string()))
            }
            Err(err) => Err(err),
        }
    }

    /// File metadata without touching the backend
    pub async fn get_metadata(
        db: &Database,
        workspace_id: &str,
        file_id: &str,
    ) -> Result<FileResponse> {
        let record = Self::get_live(db, workspace_id, file_id)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;
        Ok(FileResponse::from(record))
    }

    /// Soft-delete a file and release its quota. Deleting a missing or
    /// already deleted file succeeds; the physical object stays behind until
    /// the sweep purges it.
    pub async fn delete(
        db: &Database,
        workspace: &Workspace,
        actor: &str,
        file_id: &str,
    ) -> Result<()> {
        let started = Instant::now();
        let result = Self::try_delete(db, &workspace.id, file_id).await;

        let backend_label = match &result {
            Ok(Some(tag)) => tag.clone(),
            _ => "none".to_string(),
        };
        metrics::observe_storage_operation(
            "delete",
            &backend_label,
            Self::outcome_of(&result),
            started.elapsed(),
            None,
        );
        Self::log_access(
            db,
            &workspace.id,
            Some(file_id),
            actor,
            "delete",
            Self::outcome_of(&result),
        )
        .await;

        result.map(|_| ())
    }

    async fn try_delete(
        db: &Database,
        workspace_id: &str,
        file_id: &str,
    ) -> Result<Option<String>> {
        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE id = ? AND workspace_id = ?",
        )
        .bind(file_id)
        .bind(workspace_id)
        .fetch_optional(db.pool())
        .await?;

        let Some(record) = record else {
            return Ok(None);
        };
        if record.is_deleted() {
            return Ok(None);
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = db.pool().begin().await?;
        let marked = sqlx::query(
            "UPDATE files SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(file_id)
        .execute(tx.as_mut())
        .await?;

        // Only the transaction that set the mark returns the bytes, and the
        // amount comes from the row itself: an overwrite committed after our
        // earlier read may have changed the size.
        if marked.rows_affected() == 1 {
            QuotaService::release_for_file_tx(tx.as_mut(), workspace_id, file_id).await?;
        }
        tx.commit().await?;

        Ok(Some(record.backend_type))
    }

    /// List live files ordered by name, optionally under a prefix, resuming
    /// after an opaque cursor.
    pub async fn list(
        db: &Database,
        workspace: &Workspace,
        actor: &str,
        query: &ListFilesQuery,
    ) -> Result<FileListResponse> {
        let started = Instant::now();
        let result = Self::try_list(db, &workspace.id, query).await;

        metrics::observe_storage_operation(
            "list",
            "metadata",
            Self::outcome_of(&result),
            started.elapsed(),
            None,
        );
        Self::log_access(
            db,
            &workspace.id,
            None,
            actor,
            "list",
            Self::outcome_of(&result),
        )
        .await;

        result
    }

    async fn try_list(
        db: &Database,
        workspace_id: &str,
        query: &ListFilesQuery,
    ) -> Result<FileListResponse> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let pattern = query
            .prefix
            .as_ref()
            .map(|prefix| format!("{}%", Self::escape_like(prefix)));

        let mut sql =
            String::from("SELECT * FROM files WHERE workspace_id = ? AND deleted_at IS NULL");
        if pattern.is_some() {
            sql.push_str(" AND name LIKE ? ESCAPE '\\'");
        }
        if query.cursor.is_some() {
            sql.push_str(" AND name > ?");
        }
        sql.push_str(" ORDER BY name ASC LIMIT ?");

        let mut q = sqlx::query_as::<_, FileRecord>(&sql).bind(workspace_id);
        if let Some(pattern) = &pattern {
            q = q.bind(pattern);
        }
        if let Some(cursor) = &query.cursor {
            q = q.bind(cursor);
        }
        // One extra row decides whether another page exists.
        let mut rows = q.bind(limit + 1).fetch_all(db.pool()).await?;

        let next_cursor = if rows.len() as i64 > limit {
            rows.truncate(limit as usize);
            rows.last().map(|record| record.name.clone())
        } else {
            None
        };

        Ok(FileListResponse {
            files: rows.into_iter().map(FileResponse::from).collect(),
            next_cursor,
        })
    }

    /// Issue a time-limited download URL. Backends without signing fall back
    /// to the authenticated content route.
    pub async fn download_url(
        db: &Database,
        storage: &StorageManager,
        workspace: &Workspace,
        actor: &str,
        file_id: &str,
        expires: Option<u64>,
    ) -> Result<SignedUrlResponse> {
        let started = Instant::now();
        let result = Self::try_download_url(db, storage, workspace, file_id, expires).await;

        metrics::observe_storage_operation(
            "url",
            storage.active_type(),
            Self::outcome_of(&result),
            started.elapsed(),
            None,
        );
        Self::log_access(
            db,
            &workspace.id,
            Some(file_id),
            actor,
            "url",
            Self::outcome_of(&result),
        )
        .await;

        result
    }

    async fn try_download_url(
        db: &Database,
        storage: &StorageManager,
        workspace: &Workspace,
        file_id: &str,
        expires: Option<u64>,
    ) -> Result<SignedUrlResponse> {
        let record = Self::get_live(db, &workspace.id, file_id)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        let expires_in = expires
            .unwrap_or(DEFAULT_URL_TTL_SECS)
            .clamp(1, MAX_URL_TTL_SECS);

        let backend = storage.for_backend(&record.backend_type)?;
        let url = backend
            .download_url(&record.backend_key, Duration::from_secs(expires_in))
            .await?;

        let url = url.unwrap_or_else(|| {
            format!(
                "/api/v1/workspaces/{}/files/{}/content",
                workspace.id, record.id
            )
        });

        Ok(SignedUrlResponse { url, expires_in })
    }

    async fn find_live_by_name(
        db: &Database,
        workspace_id: &str,
        name: &str,
    ) -> Result<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE workspace_id = ? AND name = ? AND deleted_at IS NULL",
        )
        .bind(workspace_id)
        .bind(name)
        .fetch_optional(db.pool())
        .await?;
        Ok(record)
    }

    async fn get_live(
        db: &Database,
        workspace_id: &str,
        file_id: &str,
    ) -> Result<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE id = ? AND workspace_id = ? AND deleted_at IS NULL",
        )
        .bind(file_id)
        .bind(workspace_id)
        .fetch_optional(db.pool())
        .await?;
        Ok(record)
    }

    /// Escape LIKE wildcards so a prefix matches literally
    fn escape_like(input: &str) -> String {
        input
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_")
    }

    fn outcome_of<T>(result: &Result<T>) -> &'static str {
        match result {
            Ok(_) => "ok",
            Err(err) => err.kind(),
        }
    }

    /// Audit trail insert. Failures are logged and swallowed so auditing can
    /// never fail the operation it describes.
    pub async fn log_access(
        db: &Database,
        workspace_id: &str,
        file_id: Option<&str>,
        user_id: &str,
        operation: &str,
        outcome: &str,
    ) {
        let result = sqlx::query(
            r#"
            INSERT INTO access_logs (id, workspace_id, file_id, user_id, operation, outcome, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(workspace_id)
        .bind(file_id)
        .bind(user_id)
        .bind(operation)
        .bind(outcome)
        .bind(Utc::now().to_rfc3339())
        .execute(db.pool())
        .await;

        if let Err(err) = result {
            tracing::warn!(
                "Failed to record access log for {} on workspace {}: {}",
                operation,
                workspace_id,
                err
            );
        }
    }
}
