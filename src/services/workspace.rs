use chrono::Utc;
use uuid::Uuid;

use crate::config::WorkspaceConfig;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    CreateWorkspaceRequest, MemberResponse, UpdateWorkspaceRequest, Workspace,
    WorkspaceDetailResponse, WorkspaceMember, WorkspaceResponse, WorkspaceRole,
};

const MAX_WORKSPACE_NAME_CHARS: usize = 128;

/// Workspace lifecycle and membership
pub struct WorkspaceService;

impl WorkspaceService {
    /// Create a workspace with the creator as its admin member. Limits fall
    /// back to the configured defaults.
    pub async fn create(
        db: &Database,
        config: &WorkspaceConfig,
        owner_id: &str,
        req: CreateWorkspaceRequest,
    ) -> Result<WorkspaceResponse> {
        let name = req.name.trim();
        if name.is_empty() || name.chars().count() > MAX_WORKSPACE_NAME_CHARS {
            return Err(AppError::BadRequest(format!(
                "Workspace name must be 1 to {} characters",
                MAX_WORKSPACE_NAME_CHARS
            )));
        }

        let quota_bytes = req.quota_bytes.unwrap_or(config.default_quota_bytes);
        let max_file_bytes = req.max_file_bytes.unwrap_or(config.default_max_file_bytes);
        if quota_bytes <= 0 || max_file_bytes <= 0 {
            return Err(AppError::BadRequest(
                "Quota and file size limits must be positive".to_string(),
            ));
        }

        let workspace_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = db.pool().begin().await?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO workspaces (id, name, owner_id, quota_bytes, used_bytes, max_file_bytes, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(&workspace_id)
        .bind(name)
        .bind(owner_id)
        .bind(quota_bytes)
        .bind(max_file_bytes)
        .bind(&now)
        .bind(&now)
        .execute(tx.as_mut())
        .await;

        if let Err(err) = inserted {
            if err
                .as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false)
            {
                return Err(AppError::Conflict(format!(
                    "You already have a workspace named '{}'",
                    name
                )));
            }
            return Err(err.into());
        }

        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, created_at) VALUES (?, ?, 'admin', ?)",
        )
        .bind(&workspace_id)
        .bind(owner_id)
        .bind(&now)
        .execute(tx.as_mut())
        .await?;
        tx.commit().await?;

        tracing::info!("Created workspace {} for user {}", workspace_id, owner_id);

        let workspace = Self::get_workspace(db, &workspace_id).await?;
        Ok(WorkspaceResponse::from(workspace))
    }

    /// Workspaces the user belongs to, oldest first
    pub async fn list_for_user(db: &Database, user_id: &str) -> Result<Vec<WorkspaceResponse>> {
        let workspaces: Vec<Workspace> = sqlx::query_as(
            r#"
            SELECT w.* FROM workspaces w
            JOIN workspace_members m ON m.workspace_id = w.id
            WHERE m.user_id = ?
            ORDER BY w.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(db.pool())
        .await?;

        Ok(workspaces.into_iter().map(WorkspaceResponse::from).collect())
    }

    /// Workspace with usage summary and the caller's role
    pub async fn get_detail(
        db: &Database,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<WorkspaceDetailResponse> {
        let (workspace, role) =
            Self::require_role(db, workspace_id, user_id, WorkspaceRole::Viewer).await?;

        let file_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM files WHERE workspace_id = ? AND deleted_at IS NULL",
        )
        .bind(workspace_id)
        .fetch_one(db.pool())
        .await?;

        Ok(WorkspaceDetailResponse {
            workspace: WorkspaceResponse::from(workspace),
            file_count,
            role: role.as_str().to_string(),
        })
    }

    /// Rename or resize a workspace. Admin only; the quota can never drop
    /// below what is already stored.
    pub async fn update(
        db: &Database,
        workspace_id: &str,
        actor_id: &str,
        req: UpdateWorkspaceRequest,
    ) -> Result<WorkspaceResponse> {
        let (workspace, _) =
            Self::require_role(db, workspace_id, actor_id, WorkspaceRole::Admin).await?;

        let name = match &req.name {
            Some(name) => {
                let name = name.trim();
                if name.is_empty() || name.chars().count() > MAX_WORKSPACE_NAME_CHARS {
                    return Err(AppError::BadRequest(format!(
                        "Workspace name must be 1 to {} characters",
                        MAX_WORKSPACE_NAME_CHARS
                    )));
                }
                name.to_string()
            }
            None => workspace.name.clone(),
        };

        let quota_bytes = req.quota_bytes.unwrap_or(workspace.quota_bytes);
        let max_file_bytes = req.max_file_bytes.unwrap_or(workspace.max_file_bytes);
        if quota_bytes <= 0 || max_file_bytes <= 0 {
            return Err(AppError::BadRequest(
                "Quota and file size limits must be positive".to_string(),
            ));
        }
        if quota_bytes < workspace.used_bytes {
            return Err(AppError::BadRequest(format!(
                "Quota of {} bytes is below the {} bytes already in use",
                quota_bytes, workspace.used_bytes
            )));
        }

        let updated = sqlx::query(
            r#"
            UPDATE workspaces
            SET name = ?, quota_bytes = ?, max_file_bytes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&name)
        .bind(quota_bytes)
        .bind(max_file_bytes)
        .bind(Utc::now().to_rfc3339())
        .bind(workspace_id)
        .execute(db.pool())
        .await;

        if let Err(err) = updated {
            if err
                .as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false)
            {
                return Err(AppError::Conflict(format!(
                    "You already have a workspace named '{}'",
                    name
                )));
            }
            return Err(err.into());
        }

        let workspace = Self::get_workspace(db, workspace_id).await?;
        Ok(WorkspaceResponse::from(workspace))
    }

    /// Delete a workspace. Refuses while live files remain unless `force`,
    /// which tombstones the contents first.
    ///
    /// Every object key the workspace still owns is journaled before the
    /// row cascade removes the file records, so the sweep can reclaim the
    /// backing objects afterwards.
    pub async fn delete(
        db: &Database,
        workspace_id: &str,
        actor_id: &str,
        force: bool,
    ) -> Result<()> {
        Self::require_role(db, workspace_id, actor_id, WorkspaceRole::Admin).await?;

        let live_files: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM files WHERE workspace_id = ? AND deleted_at IS NULL",
        )
        .bind(workspace_id)
        .fetch_one(db.pool())
        .await?;
        if live_files > 0 && !force {
            return Err(AppError::Conflict(format!(
                "Workspace still holds {} files; delete them first or pass force=true",
                live_files
            )));
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = db.pool().begin().await?;

        // Journal rows carry size 0: the quota ledger disappears with the
        // workspace row, there is nothing left to release.
        sqlx::query(
            r#"
            INSERT INTO upload_intents (id, workspace_id, file_id, backend_key, backend_type, size, created_at)
            SELECT lower(hex(randomblob(16))), workspace_id, id, backend_key, backend_type, 0, ?
            FROM files WHERE workspace_id = ?
            "#,
        )
        .bind(&now)
        .bind(workspace_id)
        .execute(tx.as_mut())
        .await?;

        sqlx::query("DELETE FROM workspaces WHERE id = ?")
            .bind(workspace_id)
            .execute(tx.as_mut())
            .await?;
        tx.commit().await?;

        tracing::info!(
            "Deleted workspace {} (force={}, {} live files)",
            workspace_id,
            force,
            live_files
        );
        Ok(())
    }

    /// Members with usernames resolved
    pub async fn list_members(
        db: &Database,
        workspace_id: &str,
        actor_id: &str,
    ) -> Result<Vec<MemberResponse>> {
        Self::require_role(db, workspace_id, actor_id, WorkspaceRole::Viewer).await?;

        let members: Vec<MemberResponse> = sqlx::query_as(
            r#"
            SELECT m.user_id, u.username, m.role, m.created_at
            FROM workspace_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.workspace_id = ?
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(workspace_id)
        .fetch_all(db.pool())
        .await?;

        Ok(members)
    }

    /// Add a member or change their role. The owner's admin membership is
    /// fixed for the workspace's lifetime.
    pub async fn upsert_member(
        db: &Database,
        workspace_id: &str,
        actor_id: &str,
        target_user_id: &str,
        role: &str,
    ) -> Result<MemberResponse> {
        let (workspace, _) =
            Self::require_role(db, workspace_id, actor_id, WorkspaceRole::Admin).await?;

        let role = WorkspaceRole::from_str(role).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Unknown role '{}'; expected admin, editor or viewer",
                role
            ))
        })?;

        if target_user_id == workspace.owner_id {
            return Err(AppError::BadRequest(
                "The owner's admin role cannot be changed".to_string(),
            ));
        }

        let target_exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ?")
            .bind(target_user_id)
            .fetch_optional(db.pool())
            .await?;
        if target_exists.is_none() {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO workspace_members (workspace_id, user_id, role, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(workspace_id, user_id) DO UPDATE SET role = excluded.role
            "#,
        )
        .bind(workspace_id)
        .bind(target_user_id)
        .bind(role.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(db.pool())
        .await?;

        let member: MemberResponse = sqlx::query_as(
            r#"
            SELECT m.user_id, u.username, m.role, m.created_at
            FROM workspace_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.workspace_id = ? AND m.user_id = ?
            "#,
        )
        .bind(workspace_id)
        .bind(target_user_id)
        .fetch_one(db.pool())
        .await?;

        Ok(member)
    }

    /// Remove a member. The owner cannot be removed.
    pub async fn remove_member(
        db: &Database,
        workspace_id: &str,
        actor_id: &str,
        target_user_id: &str,
    ) -> Result<()> {
        let (workspace, _) =
            Self::require_role(db, workspace_id, actor_id, WorkspaceRole::Admin).await?;

        if target_user_id == workspace.owner_id {
            return Err(AppError::BadRequest(
                "The workspace owner cannot be removed".to_string(),
            ));
        }

        let removed =
            sqlx::query("DELETE FROM workspace_members WHERE workspace_id = ? AND user_id = ?")
                .bind(workspace_id)
                .bind(target_user_id)
                .execute(db.pool())
                .await?;
        if removed.rows_affected() == 0 {
            return Err(AppError::NotFound(
                "User is not a member of this workspace".to_string(),
            ));
        }
        Ok(())
    }

    /// Load a workspace and verify the user holds at least the needed role.
    ///
    /// Missing workspace is NotFound; a non-member gets Forbidden without
    /// learning whether the workspace exists beyond that.
    pub async fn require_role(
        db: &Database,
        workspace_id: &str,
        user_id: &str,
        needed: WorkspaceRole,
    ) -> Result<(Workspace, WorkspaceRole)> {
        let workspace = sqlx::query_as::<_, Workspace>("SELECT * FROM workspaces WHERE id = ?")
            .bind(workspace_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("Workspace not found".to_string()))?;

        let member = sqlx::query_as::<_, WorkspaceMember>(
            "SELECT * FROM workspace_members WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| {
            AppError::Forbidden("You are not a member of this workspace".to_string())
        })?;

        let role = member.get_role().ok_or_else(|| {
            tracing::warn!(
                "Member {} of workspace {} has unrecognized role '{}'",
                user_id,
                workspace_id,
                member.role
            );
            AppError::Forbidden("Membership role is not recognized".to_string())
        })?;

        let sufficient = match needed {
            WorkspaceRole::Viewer => true,
            WorkspaceRole::Editor => role.can_write(),
            WorkspaceRole::Admin => role.can_manage(),
        };
        if !sufficient {
            return Err(AppError::Forbidden(format!(
                "This operation requires the {} role",
                needed.as_str()
            )));
        }

        Ok((workspace, role))
    }

    async fn get_workspace(db: &Database, workspace_id: &str) -> Result<Workspace> {
        sqlx::query_as::<_, Workspace>("SELECT * FROM workspaces WHERE id = ?")
            .bind(workspace_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("Workspace not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcileConfig;
    use crate::services::file::FileService;
    use crate::services::reconcile::ReconcileWorker;
    use crate::storage::memory::MemoryBackend;
    use crate::storage::StorageManager;
    use bytes::Bytes;
    use std::sync::Arc;

    fn test_config() -> WorkspaceConfig {
        WorkspaceConfig {
            default_quota_bytes: 10_000,
            default_max_file_bytes: 5_000,
        }
    }

    async fn setup() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        db.run_migrations().await.unwrap();
        (dir, db)
    }

    async fn seed_user(db: &Database, username: &str) -> String {
        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, 'x', ?, ?)",
        )
        .bind(&user_id)
        .bind(username)
        .bind(format!("{}@example.com", username))
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await
        .unwrap();
        user_id
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_owner_is_admin() {
        let (_dir, db) = setup().await;
        let owner = seed_user(&db, "alice").await;

        let ws = WorkspaceService::create(
            &db,
            &test_config(),
            &owner,
            CreateWorkspaceRequest {
                name: "  research  ".to_string(),
                quota_bytes: None,
                max_file_bytes: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(ws.name, "research");
        assert_eq!(ws.quota_bytes, 10_000);
        assert_eq!(ws.max_file_bytes, 5_000);
        assert_eq!(ws.used_bytes, 0);

        let (_, role) = WorkspaceService::require_role(&db, &ws.id, &owner, WorkspaceRole::Admin)
            .await
            .unwrap();
        assert_eq!(role, WorkspaceRole::Admin);
    }

    #[tokio::test]
    async fn test_create_duplicate_name_conflicts_per_owner() {
        let (_dir, db) = setup().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        let req = || CreateWorkspaceRequest {
            name: "shared-name".to_string(),
            quota_bytes: None,
            max_file_bytes: None,
        };

        WorkspaceService::create(&db, &test_config(), &alice, req()).await.unwrap();
        let err = WorkspaceService::create(&db, &test_config(), &alice, req())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Another owner can reuse the name.
        WorkspaceService::create(&db, &test_config(), &bob, req()).await.unwrap();
    }

    #[tokio::test]
    async fn test_role_checks() {
        let (_dir, db) = setup().await;
        let owner = seed_user(&db, "owner").await;
        let viewer = seed_user(&db, "viewer").await;
        let editor = seed_user(&db, "editor").await;
        let stranger = seed_user(&db, "stranger").await;

        let ws = WorkspaceService::create(
            &db,
            &test_config(),
            &owner,
            CreateWorkspaceRequest {
                name: "team".to_string(),
                quota_bytes: None,
                max_file_bytes: None,
            },
        )
        .await
        .unwrap();

        WorkspaceService::upsert_member(&db, &ws.id, &owner, &viewer, "viewer")
            .await
            .unwrap();
        WorkspaceService::upsert_member(&db, &ws.id, &owner, &editor, "editor")
            .await
            .unwrap();

        // Viewer reads but cannot write.
        WorkspaceService::require_role(&db, &ws.id, &viewer, WorkspaceRole::Viewer)
            .await
            .unwrap();
        let err = WorkspaceService::require_role(&db, &ws.id, &viewer, WorkspaceRole::Editor)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // Editor writes but cannot manage.
        WorkspaceService::require_role(&db, &ws.id, &editor, WorkspaceRole::Editor)
            .await
            .unwrap();
        let err = WorkspaceService::require_role(&db, &ws.id, &editor, WorkspaceRole::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // Non-members are rejected outright.
        let err = WorkspaceService::require_role(&db, &ws.id, &stranger, WorkspaceRole::Viewer)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        // Unknown workspace is NotFound.
        let err = WorkspaceService::require_role(&db, "missing", &owner, WorkspaceRole::Viewer)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_quota_respects_current_usage() {
        let (_dir, db) = setup().await;
        let owner = seed_user(&db, "alice").await;
        let ws = WorkspaceService::create(
            &db,
            &test_config(),
            &owner,
            CreateWorkspaceRequest {
                name: "ws".to_string(),
                quota_bytes: None,
                max_file_bytes: None,
            },
        )
        .await
        .unwrap();

        sqlx::query("UPDATE workspaces SET used_bytes = 100 WHERE id = ?")
            .bind(&ws.id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = WorkspaceService::update(
            &db,
            &ws.id,
            &owner,
            UpdateWorkspaceRequest {
                name: None,
                quota_bytes: Some(50),
                max_file_bytes: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let updated = WorkspaceService::update(
            &db,
            &ws.id,
            &owner,
            UpdateWorkspaceRequest {
                name: Some("renamed".to_string()),
                quota_bytes: Some(20_000),
                max_file_bytes: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.quota_bytes, 20_000);
    }

    #[tokio::test]
    async fn test_owner_membership_is_immutable() {
        let (_dir, db) = setup().await;
        let owner = seed_user(&db, "alice").await;
        let admin = seed_user(&db, "bob").await;
        let ws = WorkspaceService::create(
            &db,
            &test_config(),
            &owner,
            CreateWorkspaceRequest {
                name: "ws".to_string(),
                quota_bytes: None,
                max_file_bytes: None,
            },
        )
        .await
        .unwrap();

        WorkspaceService::upsert_member(&db, &ws.id, &owner, &admin, "admin")
            .await
            .unwrap();

        let err = WorkspaceService::upsert_member(&db, &ws.id, &admin, &owner, "viewer")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = WorkspaceService::remove_member(&db, &ws.id, &admin, &owner)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_member_upsert_promote_and_remove() {
        let (_dir, db) = setup().await;
        let owner = seed_user(&db, "alice").await;
        let member = seed_user(&db, "bob").await;
        let ws = WorkspaceService::create(
            &db,
            &test_config(),
            &owner,
            CreateWorkspaceRequest {
                name: "ws".to_string(),
                quota_bytes: None,
                max_file_bytes: None,
            },
        )
        .await
        .unwrap();

        let added = WorkspaceService::upsert_member(&db, &ws.id, &owner, &member, "viewer")
            .await
            .unwrap();
        assert_eq!(added.role, "viewer");
        assert_eq!(added.username, "bob");

        let promoted = WorkspaceService::upsert_member(&db, &ws.id, &owner, &member, "editor")
            .await
            .unwrap();
        assert_eq!(promoted.role, "editor");

        let members = WorkspaceService::list_members(&db, &ws.id, &owner).await.unwrap();
        assert_eq!(members.len(), 2);

        WorkspaceService::remove_member(&db, &ws.id, &owner, &member)
            .await
            .unwrap();
        let err = WorkspaceService::remove_member(&db, &ws.id, &owner, &member)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = WorkspaceService::upsert_member(&db, &ws.id, &owner, "no-such-user", "viewer")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = WorkspaceService::upsert_member(&db, &ws.id, &owner, &member, "superuser")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_list_for_user_scopes_to_memberships() {
        let (_dir, db) = setup().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;

        for name in ["one", "two"] {
            WorkspaceService::create(
                &db,
                &test_config(),
                &alice,
                CreateWorkspaceRequest {
                    name: name.to_string(),
                    quota_bytes: None,
                    max_file_bytes: None,
                },
            )
            .await
            .unwrap();
        }
        let bobs = WorkspaceService::create(
            &db,
            &test_config(),
            &bob,
            CreateWorkspaceRequest {
                name: "three".to_string(),
                quota_bytes: None,
                max_file_bytes: None,
            },
        )
        .await
        .unwrap();

        let alices = WorkspaceService::list_for_user(&db, &alice).await.unwrap();
        assert_eq!(alices.len(), 2);

        WorkspaceService::upsert_member(&db, &bobs.id, &bob, &alice, "viewer")
            .await
            .unwrap();
        let alices = WorkspaceService::list_for_user(&db, &alice).await.unwrap();
        assert_eq!(alices.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_refuses_non_empty_then_force_journals_objects() {
        let (_dir, db) = setup().await;
        let owner = seed_user(&db, "alice").await;
        let created = WorkspaceService::create(
            &db,
            &test_config(),
            &owner,
            CreateWorkspaceRequest {
                name: "ws".to_string(),
                quota_bytes: None,
                max_file_bytes: None,
            },
        )
        .await
        .unwrap();

        let memory = Arc::new(MemoryBackend::new());
        let storage = Arc::new(StorageManager::with_backend(memory.clone()));
        let workspace = sqlx::query_as::<_, Workspace>("SELECT * FROM workspaces WHERE id = ?")
            .bind(&created.id)
            .fetch_one(db.pool())
            .await
            .unwrap();

        let uploaded = FileService::upload(
            &db,
            &storage,
            &workspace,
            "alice",
            "a.txt",
            None,
            Bytes::from_static(b"abc"),
            false,
        )
        .await
        .unwrap();

        let err = WorkspaceService::delete(&db, &created.id, &owner, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        WorkspaceService::delete(&db, &created.id, &owner, true)
            .await
            .unwrap();

        // Workspace and file rows are gone; the object waits on its journal
        // row until the sweep collects it.
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(remaining, 0);
        let journaled: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM upload_intents")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(journaled, 1);
        let key = format!("{}/{}/1", created.id, uploaded.id);
        assert!(memory.contains(&key));

        let worker = ReconcileWorker::new(
            db.clone(),
            storage,
            &ReconcileConfig {
                interval_secs: 300,
                orphan_grace_hours: 0,
                purge_grace_days: 0,
            },
        );
        let summary = worker.run_once().await.unwrap();
        assert_eq!(summary.intents_settled, 1);
        assert!(!memory.contains(&key));
    }

    #[tokio::test]
    async fn test_delete_empty_workspace_without_force() {
        let (_dir, db) = setup().await;
        let owner = seed_user(&db, "alice").await;
        let ws = WorkspaceService::create(
            &db,
            &test_config(),
            &owner,
            CreateWorkspaceRequest {
                name: "ws".to_string(),
                quota_bytes: None,
                max_file_bytes: None,
            },
        )
        .await
        .unwrap();

        WorkspaceService::delete(&db, &ws.id, &owner, false).await.unwrap();
        let err = WorkspaceService::get_detail(&db, &ws.id, &owner)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
