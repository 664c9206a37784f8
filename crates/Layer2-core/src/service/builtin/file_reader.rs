//! File Reader - 파일 읽기 서비스
//!
//! 크기 제한을 넘는 파일은 읽지 않는다.
//! UTF-8이 아닌 바이트는 lossy 디코딩.

use super::{io_error, resolve_path};
use crate::registry::ServiceDescriptor;
use crate::service::traits::{parse_args, Service, ServiceOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::debug;
use warden_foundation::{Error, Result};

/// 기본 최대 크기 (1 MiB)
const DEFAULT_MAX_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadInput {
    path: String,
    #[serde(default)]
    max_size: Option<u64>,
}

pub struct FileReaderService {
    root: PathBuf,
}

impl FileReaderService {
    pub const NAME: &'static str = "file_reader";

    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

#[async_trait]
impl Service for FileReaderService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(Self::NAME, "Reads text files with a size limit")
            .with_capabilities(["read", "text_processing"])
            .with_metadata("type", "builtin")
            .with_metadata("priority", "high")
            .with_metadata("max_size", DEFAULT_MAX_SIZE as i64)
    }

    async fn invoke(&self, args: Value) -> Result<ServiceOutput> {
        let input: ReadInput = parse_args(Self::NAME, args)?;
        let path = resolve_path(&self.root, &input.path)?;
        let max_size = input.max_size.unwrap_or(DEFAULT_MAX_SIZE);

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| io_error(&path, e))?;
        if !meta.is_file() {
            return Err(Error::InvalidInput(format!(
                "Not a file: {}",
                path.display()
            )));
        }
        if meta.len() > max_size {
            return Err(Error::TooLarge(format!(
                "{} is {} bytes (limit {})",
                path.display(),
                meta.len(),
                max_size
            )));
        }

        let bytes = tokio::fs::read(&path).await.map_err(|e| io_error(&path, e))?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        debug!("[{}] read {} bytes from {}", Self::NAME, bytes.len(), path.display());

        Ok(ServiceOutput::success(
            Self::NAME,
            json!({
                "path": path.display().to_string(),
                "content": content,
                "size": bytes.len(),
            }),
        ))
    }
}
