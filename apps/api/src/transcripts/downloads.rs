//! Parking lot for documents produced by the two-step upload flow.
//!
//! Each document lives in a process-scoped temp directory as `{id}.docx` with
//! a `{id}.json` sidecar. Download URLs carry an HMAC-SHA256 signature of the
//! id; a document can be claimed once, and unclaimed ones are swept after the
//! TTL. The directory is removed when the last handle is dropped.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::transcript::FormattedDocument;

type HmacSha256 = Hmac<Sha256>;

const STORE_PREFIX: &str = "transcript-downloads-";
pub const DOWNLOAD_ROUTE: &str = "/api/v1/downloads";

#[derive(Debug, Serialize, Deserialize)]
struct ParkedMeta {
    filename: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadTicket {
    pub id: Uuid,
    pub filename: String,
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct DownloadStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    dir: TempDir,
    ttl: chrono::Duration,
    secret: Vec<u8>,
}

impl DownloadStore {
    pub fn new(root: &Path, ttl: Duration, secret: &str) -> anyhow::Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create scratch dir {}", root.display()))?;
        let dir = tempfile::Builder::new()
            .prefix(STORE_PREFIX)
            .tempdir_in(root)
            .context("Failed to create download directory")?;
        let ttl = chrono::Duration::from_std(ttl).context("DOWNLOAD_TTL_SECS is out of range")?;

        Ok(Self {
            inner: Arc::new(StoreInner {
                dir,
                ttl,
                secret: secret.as_bytes().to_vec(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        self.inner.dir.path()
    }

    fn document_path(&self, id: Uuid) -> PathBuf {
        self.path().join(format!("{id}.docx"))
    }

    fn meta_path(&self, id: Uuid) -> PathBuf {
        self.path().join(format!("{id}.json"))
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(&self.inner.secret)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid signing key: {e}")))
    }

    pub fn sign(&self, id: Uuid) -> Result<String, AppError> {
        let mut mac = self.mac()?;
        mac.update(id.as_bytes());
        Ok(BASE64_URL.encode(mac.finalize().into_bytes()))
    }

    fn verify(&self, id: Uuid, signature: &str) -> bool {
        let Ok(expected) = BASE64_URL.decode(signature) else {
            return false;
        };
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(id.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    /// Stores `document` and returns a signed, expiring ticket for it.
    pub async fn park(&self, document: FormattedDocument) -> Result<DownloadTicket, AppError> {
        self.park_as(Uuid::new_v4(), document).await
    }

    async fn park_as(&self, id: Uuid, document: FormattedDocument) -> Result<DownloadTicket, AppError> {
        let meta = ParkedMeta {
            filename: document.filename,
            created_at: document.created_at,
            expires_at: Utc::now() + self.inner.ttl,
            truncated: document.truncated,
        };

        // Document first: the sidecar's presence marks the entry as claimable.
        let document_path = self.document_path(id);
        tokio::fs::write(&document_path, &document.bytes).await?;
        if let Err(e) = self.write_meta(id, &meta).await {
            if let Err(rm) = remove_if_present(&document_path).await {
                warn!("Failed to remove unparked download {}: {rm}", document_path.display());
            }
            return Err(e);
        }

        let signature = self.sign(id)?;
        debug!("Parked {} as {id}", meta.filename);

        Ok(DownloadTicket {
            id,
            filename: meta.filename,
            download_url: format!("{DOWNLOAD_ROUTE}/{id}?sig={signature}"),
            expires_at: meta.expires_at,
        })
    }

    async fn write_meta(&self, id: Uuid, meta: &ParkedMeta) -> Result<(), AppError> {
        let meta_json = serde_json::to_vec(meta).context("Failed to serialize download metadata")?;
        tokio::fs::write(self.meta_path(id), meta_json).await?;
        Ok(())
    }

    /// Hands out a parked document exactly once.
    pub async fn claim(&self, id: Uuid, signature: &str) -> Result<FormattedDocument, AppError> {
        if !self.verify(id, signature) {
            warn!("Rejected download {id} with a bad signature");
            return Err(AppError::Forbidden);
        }

        let not_found = || AppError::NotFound(format!("Download {id} not found or already retrieved"));

        let meta_path = self.meta_path(id);
        let meta_raw = match tokio::fs::read(&meta_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        // Whoever removes the sidecar owns the document.
        match tokio::fs::remove_file(&meta_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        }

        let document_path = self.document_path(id);
        let bytes = tokio::fs::read(&document_path).await;
        if let Err(e) = tokio::fs::remove_file(&document_path).await {
            warn!("Failed to remove claimed download {}: {e}", document_path.display());
        }
        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };

        let meta: ParkedMeta =
            serde_json::from_slice(&meta_raw).context("Corrupt download metadata")?;
        if Utc::now() >= meta.expires_at {
            return Err(AppError::NotFound(format!("Download {id} has expired")));
        }

        info!("Download {id} claimed ({} bytes)", bytes.len());
        Ok(FormattedDocument {
            filename: meta.filename,
            bytes,
            created_at: meta.created_at,
            truncated: meta.truncated,
        })
    }

    /// Deletes every parked document past its expiry. Returns how many went.
    /// An entry whose document cannot be removed keeps its sidecar and is
    /// retried on the next sweep.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(self.path()).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to scan download directory: {e}");
                return 0;
            }
        };

        let now = Utc::now();
        let mut purged = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                continue;
            };

            let expired = match tokio::fs::read(&path).await {
                Ok(raw) => serde_json::from_slice::<ParkedMeta>(&raw)
                    .map(|meta| now >= meta.expires_at)
                    .unwrap_or(true),
                Err(_) => continue,
            };
            if !expired {
                continue;
            }

            let document_path = self.document_path(id);
            if let Err(e) = remove_if_present(&document_path).await {
                warn!("Failed to remove expired download {}: {e}", document_path.display());
                continue;
            }
            match remove_if_present(&path).await {
                Ok(()) => purged += 1,
                Err(e) => warn!("Failed to remove download metadata {}: {e}", path.display()),
            }
        }
        purged
    }

    /// Periodically purges expired documents for the life of the process.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let purged = store.purge_expired().await;
                if purged > 0 {
                    info!("Purged {purged} expired downloads");
                }
            }
        })
    }
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
