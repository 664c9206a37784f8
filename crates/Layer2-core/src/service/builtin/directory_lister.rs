//! Directory Lister - 디렉토리 목록 서비스
//!
//! 디렉토리 먼저, 그 다음 이름순으로 정렬.

use super::{io_error, resolve_path};
use crate::registry::ServiceDescriptor;
use crate::service::traits::{parse_args, Service, ServiceOutput};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use warden_foundation::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListInput {
    #[serde(default = "default_path")]
    path: String,
    #[serde(default)]
    include_hidden: bool,
}

fn default_path() -> String {
    ".".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DirEntry {
    name: String,
    size: u64,
    is_directory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified_at: Option<DateTime<Utc>>,
}

pub struct DirectoryListerService {
    root: PathBuf,
}

impl DirectoryListerService {
    pub const NAME: &'static str = "directory_lister";

    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    async fn list(path: &Path, include_hidden: bool) -> Result<Vec<DirEntry>> {
        let mut reader = tokio::fs::read_dir(path)
            .await
            .map_err(|e| io_error(path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| io_error(path, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !include_hidden && name.starts_with('.') {
                continue;
            }
            // entry may vanish between read_dir and metadata
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            entries.push(DirEntry {
                name,
                size: if meta.is_dir() { 0 } else { meta.len() },
                is_directory: meta.is_dir(),
                modified_at: meta.modified().ok().map(DateTime::<Utc>::from),
            });
        }

        entries.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(entries)
    }
}

#[async_trait]
impl Service for DirectoryListerService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(Self::NAME, "Lists directory contents")
            .with_capabilities(["list", "directory"])
            .with_metadata("type", "builtin")
            .with_metadata("priority", "high")
    }

    async fn invoke(&self, args: Value) -> Result<ServiceOutput> {
        let input: ListInput = parse_args(Self::NAME, args)?;
        let path = resolve_path(&self.root, &input.path)?;

        if path.is_file() {
            return Err(Error::InvalidInput(format!(
                "Not a directory: {}",
                path.display()
            )));
        }

        let entries = Self::list(&path, input.include_hidden).await?;
        Ok(ServiceOutput::success(
            Self::NAME,
            json!({
                "path": path.display().to_string(),
                "count": entries.len(),
                "entries": entries,
            }),
        ))
    }
}
