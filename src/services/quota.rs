use crate::db::Database;
use crate::error::{AppError, Result};

/// Quota coordinator.
///
/// Every mutation of a workspace's `used_bytes` goes through one of these
/// conditional updates; nothing else may touch the counter. Because the
/// check and the increment are a single statement, concurrent uploads
/// cannot jointly exceed the quota, and the contract holds across multiple
/// service processes sharing the database.
pub struct QuotaService;

impl QuotaService {
    /// Reserve bytes against the workspace quota. Fails with QuotaExceeded
    /// before any backend write when the reservation would cross the limit.
    pub async fn reserve(db: &Database, workspace_id: &str, bytes: i64) -> Result<()> {
        if bytes < 0 {
            return Err(AppError::Internal(
                "Quota reservation must not be negative".to_string(),
            ));
        }

        let result = sqlx::query(
            r#"
            UPDATE workspaces
            SET used_bytes = used_bytes + ?, updated_at = datetime('now')
            WHERE id = ? AND used_bytes + ? <= quota_bytes
            "#,
        )
        .bind(bytes)
        .bind(workspace_id)
        .bind(bytes)
        .execute(db.pool())
        .await?;

        if result.rows_affected() == 0 {
            // Zero rows means either no such workspace or not enough room
            let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM workspaces WHERE id = ?")
                .bind(workspace_id)
                .fetch_optional(db.pool())
                .await?;

            return Err(match exists {
                Some(_) => AppError::QuotaExceeded(format!(
                    "Workspace quota does not allow {} more bytes",
                    bytes
                )),
                None => AppError::NotFound("Workspace not found".to_string()),
            });
        }

        Ok(())
    }

    /// Release previously reserved or consumed bytes. Usage is floored at
    /// zero so double releases cannot drive the counter negative.
    pub async fn release(db: &Database, workspace_id: &str, bytes: i64) -> Result<()> {
        let mut conn = db.pool().acquire().await?;
        Self::release_tx(&mut conn, workspace_id, bytes).await
    }

    /// Release the bytes a file row accounts for, reading the size from the
    /// row inside the caller's transaction. Reading it there rather than
    /// taking a size argument means a concurrently committed overwrite can
    /// never make the release drift from what the row actually holds.
    pub async fn release_for_file_tx(
        conn: &mut sqlx::SqliteConnection,
        workspace_id: &str,
        file_id: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE workspaces
            SET used_bytes = MAX(0, used_bytes - COALESCE((SELECT size FROM files WHERE id = ?), 0)),
                updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(file_id)
        .bind(workspace_id)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Release within a caller-managed transaction
    pub async fn release_tx(
        conn: &mut sqlx::SqliteConnection,
        workspace_id: &str,
        bytes: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE workspaces
            SET used_bytes = MAX(0, used_bytes - ?), updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(bytes)
        .bind(workspace_id)
        .execute(conn)
        .await?;

        Ok(())
    }
}
