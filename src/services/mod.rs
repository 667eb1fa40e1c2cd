pub mod auth;
pub mod file;
pub mod quota;
pub mod reconcile;
pub mod workspace;

pub use auth::AuthService;
pub use file::FileService;
pub use quota::QuotaService;
pub use reconcile::ReconcileWorker;
pub use workspace::WorkspaceService;
