use anyhow::{bail, Context, Result};

/// Default upload ceiling, matching the browser uploader's 20 MB limit.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_RASTER_DPI: u32 = 144;

/// Which store backends the service wires up at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Redis for key-value data, S3/MinIO for files.
    Remote(RemoteStorage),
    /// Process-local maps. Data is lost on restart.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStorage {
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub anthropic_api_key: String,
    /// When set, sign-in must present this code.
    pub access_code: Option<String>,
    pub max_upload_bytes: usize,
    pub raster_dpi: u32,
    pub pdftoppm_path: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage = match optional_env("STORAGE_BACKEND").as_deref() {
            None | Some("remote") => StorageBackend::Remote(RemoteStorage {
                redis_url: require_env("REDIS_URL")?,
                s3_bucket: require_env("S3_BUCKET")?,
                s3_endpoint: require_env("S3_ENDPOINT")?,
                s3_region: optional_env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            }),
            Some("memory") => StorageBackend::Memory,
            Some(other) => bail!("STORAGE_BACKEND must be 'remote' or 'memory', got '{other}'"),
        };

        Ok(Config {
            storage,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            access_code: optional_env("ACCESS_CODE"),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            raster_dpi: parse_env("RASTER_DPI", DEFAULT_RASTER_DPI)?,
            pdftoppm_path: optional_env("PDFTOPPM_PATH").unwrap_or_else(|| "pdftoppm".to_string()),
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Configuration used by handler tests: in-memory stores, no access code.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            storage: StorageBackend::Memory,
            anthropic_api_key: "test-key".to_string(),
            access_code: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            raster_dpi: DEFAULT_RASTER_DPI,
            pdftoppm_path: "pdftoppm".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
