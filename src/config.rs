use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request body ceiling. Per-workspace file caps apply below this.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default = "default_jwt_secret")]
    pub secret: String,
    #[serde(default)]
    pub previous_secrets: Vec<String>,
    #[serde(default = "default_access_token_expire")]
    pub access_token_expire_minutes: u64,
}

/// Storage backend binding. Exactly one backend is active for new uploads;
/// records written under an earlier binding keep resolving through the
/// backend tag stored on the record.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Active backend: "local", "s3" or "gcs".
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_local_path")]
    pub local_path: String,
    #[serde(default)]
    pub s3: Option<ObjectStoreConfig>,
    #[serde(default)]
    pub gcs: Option<ObjectStoreConfig>,
}

/// Credentials and endpoint for one remote object store.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_quota_bytes")]
    pub default_quota_bytes: i64,
    #[serde(default = "default_max_file_bytes")]
    pub default_max_file_bytes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_reconcile_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_orphan_grace")]
    pub orphan_grace_hours: u64,
    #[serde(default = "default_purge_grace")]
    pub purge_grace_days: u64,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8420
}

fn default_max_upload_bytes() -> usize {
    1024 * 1024 * 1024 // 1 GiB
}

fn default_db_path() -> String {
    "data/stratus.db".to_string()
}

fn default_jwt_secret() -> String {
    // Replaced by a generated, persisted secret at startup
    "change-me".to_string()
}

fn default_access_token_expire() -> u64 {
    60 // 60 minutes
}

fn default_backend() -> String {
    "local".to_string()
}

fn default_local_path() -> String {
    "data/objects".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_quota_bytes() -> i64 {
    10 * 1024 * 1024 * 1024 // 10 GiB per workspace
}

fn default_max_file_bytes() -> i64 {
    100 * 1024 * 1024 // 100 MiB per file
}

fn default_reconcile_interval() -> u64 {
    300
}

fn default_orphan_grace() -> u64 {
    24
}

fn default_purge_grace() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_jwt_secret(),
            previous_secrets: Vec::new(),
            access_token_expire_minutes: default_access_token_expire(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local_path: default_local_path(),
            s3: None,
            gcs: None,
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            default_quota_bytes: default_quota_bytes(),
            default_max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_reconcile_interval(),
            orphan_grace_hours: default_orphan_grace(),
            purge_grace_days: default_purge_grace(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            jwt: JwtConfig::default(),
            storage: StorageConfig::default(),
            workspace: WorkspaceConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.ensure_directories()?;
        config.ensure_jwt_secret()?;
        Ok(config)
    }

    /// Ensure JWT secret is secure and persisted
    fn ensure_jwt_secret(&mut self) -> anyhow::Result<()> {
        if self.jwt.secret == default_jwt_secret() || self.jwt.secret.is_empty() {
            let secret_path = Path::new("data/.jwt_secret");

            if secret_path.exists() {
                let secret = fs::read_to_string(secret_path)?;
                self.jwt.secret = secret.trim().to_string();
                tracing::info!("Loaded persisted JWT secret from data/.jwt_secret");
            } else {
                let secret = uuid::Uuid::new_v4().to_string();

                if let Some(parent) = secret_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                fs::write(secret_path, &secret)?;
                self.jwt.secret = secret;
                tracing::info!("Generated and persisted new JWT secret to data/.jwt_secret");
            }
        }
        Ok(())
    }

    /// Load configuration from the first config file found
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["stratus.toml", "config.toml", "/etc/stratus/stratus.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: STRATUS_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        // Server overrides
        if let Ok(val) = env::var("STRATUS_SERVER_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = env::var("STRATUS_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = env::var("STRATUS_SERVER_MAX_UPLOAD_BYTES") {
            if let Ok(bytes) = val.parse() {
                self.server.max_upload_bytes = bytes;
            }
        }

        // Database overrides
        if let Ok(val) = env::var("STRATUS_DATABASE_PATH") {
            self.database.path = val;
        }

        // JWT overrides
        if let Ok(val) = env::var("STRATUS_JWT_SECRET") {
            self.jwt.secret = val;
        }
        if let Ok(val) = env::var("STRATUS_JWT_PREVIOUS_SECRETS") {
            self.jwt.previous_secrets = val
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
        }
        if let Ok(val) = env::var("STRATUS_JWT_ACCESS_EXPIRE") {
            if let Ok(minutes) = val.parse() {
                self.jwt.access_token_expire_minutes = minutes;
            }
        }

        // Storage overrides
        if let Ok(val) = env::var("STRATUS_STORAGE_BACKEND") {
            self.storage.backend = val;
        }
        if let Ok(val) = env::var("STRATUS_STORAGE_LOCAL_PATH") {
            self.storage.local_path = val;
        }
        Self::apply_object_store_env(&mut self.storage.s3, "STRATUS_S3");
        Self::apply_object_store_env(&mut self.storage.gcs, "STRATUS_GCS");

        // Workspace overrides
        if let Ok(val) = env::var("STRATUS_WORKSPACE_DEFAULT_QUOTA") {
            if let Ok(bytes) = val.parse() {
                self.workspace.default_quota_bytes = bytes;
            }
        }
        if let Ok(val) = env::var("STRATUS_WORKSPACE_MAX_FILE_BYTES") {
            if let Ok(bytes) = val.parse() {
                self.workspace.default_max_file_bytes = bytes;
            }
        }

        // Reconcile overrides
        if let Ok(val) = env::var("STRATUS_RECONCILE_INTERVAL") {
            if let Ok(secs) = val.parse() {
                self.reconcile.interval_secs = secs;
            }
        }
        if let Ok(val) = env::var("STRATUS_RECONCILE_ORPHAN_GRACE_HOURS") {
            if let Ok(hours) = val.parse() {
                self.reconcile.orphan_grace_hours = hours;
            }
        }
        if let Ok(val) = env::var("STRATUS_RECONCILE_PURGE_GRACE_DAYS") {
            if let Ok(days) = val.parse() {
                self.reconcile.purge_grace_days = days;
            }
        }
    }

    /// Env overrides for one object-store binding. Creates the binding when
    /// all required fields are present in the environment.
    fn apply_object_store_env(target: &mut Option<ObjectStoreConfig>, prefix: &str) {
        let get = |key: &str| env::var(format!("{}_{}", prefix, key)).ok();

        if let Some(cfg) = target.as_mut() {
            if let Some(val) = get("ENDPOINT") {
                cfg.endpoint = val;
            }
            if let Some(val) = get("BUCKET") {
                cfg.bucket = val;
            }
            if let Some(val) = get("REGION") {
                cfg.region = val;
            }
            if let Some(val) = get("ACCESS_KEY") {
                cfg.access_key = val;
            }
            if let Some(val) = get("SECRET_KEY") {
                cfg.secret_key = val;
            }
            return;
        }

        if let (Some(endpoint), Some(bucket), Some(access_key), Some(secret_key)) =
            (get("ENDPOINT"), get("BUCKET"), get("ACCESS_KEY"), get("SECRET_KEY"))
        {
            *target = Some(ObjectStoreConfig {
                endpoint,
                bucket,
                region: get("REGION").unwrap_or_else(default_region),
                access_key,
                secret_key,
            });
        }
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        if self.storage.backend == "local" {
            fs::create_dir_all(&self.storage.local_path)?;
        }

        Ok(())
    }
}
