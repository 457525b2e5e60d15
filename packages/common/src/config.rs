use std::path::PathBuf;

use serde::Deserialize;

/// Which blob store backend to open.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Filesystem,
    Memory,
    S3,
}

/// S3 connection settings. Only read when `backend = "s3"`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct S3Config {
    #[serde(default)]
    pub bucket: String,
    /// Region name. Default: "us-east-1".
    #[serde(default = "default_s3_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Falls back to the standard AWS credential chain when unset.
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub path_style: bool,
}

fn default_s3_region() -> String {
    "us-east-1".into()
}

/// Blob store configuration shared by every binary that touches sessions.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageAppConfig {
    /// Backend selector. Default: filesystem.
    #[serde(default)]
    pub backend: StorageBackendKind,
    /// Root directory of the filesystem backend. Default: "./data/blobs".
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Keys per listing page for local backends. Default: 1000.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Largest object accepted by `put`. Default: 64 MiB.
    #[serde(default = "default_max_object_size")]
    pub max_object_size: u64,
    #[serde(default)]
    pub s3: S3Config,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/blobs")
}
fn default_page_size() -> usize {
    1000
}
fn default_max_object_size() -> u64 {
    64 * 1024 * 1024
}

impl Default for StorageAppConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::default(),
            path: default_storage_path(),
            page_size: default_page_size(),
            max_object_size: default_max_object_size(),
            s3: S3Config {
                region: default_s3_region(),
                ..Default::default()
            },
        }
    }
}
