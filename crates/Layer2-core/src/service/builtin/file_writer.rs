//! File Writer - 파일 쓰기/편집 서비스
//!
//! Modes: `overwrite` (기본), `append`, `create` (이미 있으면 실패), `edit`.
//! 상위 디렉토리는 자동 생성.

use super::{io_error, resolve_path};
use crate::registry::ServiceDescriptor;
use crate::service::traits::{parse_args, Service, ServiceOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use warden_foundation::{Error, Result};

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WriteMode {
    #[default]
    Overwrite,
    Append,
    Create,
    Edit,
}

impl WriteMode {
    fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Overwrite => "overwrite",
            WriteMode::Append => "append",
            WriteMode::Create => "create",
            WriteMode::Edit => "edit",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteInput {
    path: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    mode: WriteMode,
    #[serde(default)]
    old_text: Option<String>,
    #[serde(default)]
    new_text: Option<String>,
}

pub struct FileWriterService {
    root: PathBuf,
}

impl FileWriterService {
    pub const NAME: &'static str = "file_writer";

    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    async fn write(path: &Path, content: &str, mode: WriteMode) -> Result<usize> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        match mode {
            WriteMode::Append => options.append(true).create(true),
            WriteMode::Create => options.write(true).create_new(true),
            _ => options.write(true).create(true).truncate(true),
        };

        let mut file = options.open(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Error::InvalidInput(format!("File already exists: {}", path.display()))
            } else {
                io_error(path, e)
            }
        })?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| io_error(path, e))?;
        file.flush().await.map_err(|e| io_error(path, e))?;
        Ok(content.len())
    }

    async fn edit(path: &Path, old_text: &str, new_text: &str) -> Result<usize> {
        if old_text.is_empty() {
            return Err(Error::InvalidInput("oldText must not be empty".to_string()));
        }
        let current = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| io_error(path, e))?;
        if !current.contains(old_text) {
            return Err(Error::NotFound(format!(
                "text to replace not found in {}",
                path.display()
            )));
        }
        let updated = current.replacen(old_text, new_text, 1);
        Self::write(path, &updated, WriteMode::Overwrite).await
    }
}

#[async_trait]
impl Service for FileWriterService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(Self::NAME, "Writes, appends to, creates and edits files")
            .with_capabilities(["write", "edit", "create", "append"])
            .with_metadata("type", "builtin")
            .with_metadata("priority", "high")
    }

    async fn invoke(&self, args: Value) -> Result<ServiceOutput> {
        let input: WriteInput = parse_args(Self::NAME, args)?;
        let path = resolve_path(&self.root, &input.path)?;

        let bytes = match input.mode {
            WriteMode::Edit => {
                let old_text = input.old_text.unwrap_or_default();
                let new_text = input.new_text.unwrap_or_default();
                Self::edit(&path, &old_text, &new_text).await?
            }
            mode => Self::write(&path, &input.content, mode).await?,
        };
        debug!("[{}] {} {} ({} bytes)", Self::NAME, input.mode.as_str(), path.display(), bytes);

        Ok(ServiceOutput::success(
            Self::NAME,
            json!({
                "path": path.display().to_string(),
                "mode": input.mode.as_str(),
                "bytesWritten": bytes,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_modes() {
        let dir = tempfile::tempdir().unwrap();
        let svc = FileWriterService::new(dir.path());
        let file = dir.path().join("nested/out.txt");

        svc.invoke(json!({"path": "nested/out.txt", "content": "one"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "one");

        svc.invoke(json!({"path": "nested/out.txt", "content": "+two", "mode": "append"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "one+two");

        svc.invoke(json!({"path": "nested/out.txt", "content": "fresh", "mode": "overwrite"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_create_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let svc = FileWriterService::new(dir.path());

        let out = svc
            .invoke(json!({"path": "new.txt", "content": "x", "mode": "create"}))
            .await
            .unwrap();
        assert_eq!(out.data["bytesWritten"], 1);

        assert!(matches!(
            svc.invoke(json!({"path": "new.txt", "content": "y", "mode": "create"})).await,
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(std::fs::read_to_string(dir.path().join("new.txt")).unwrap(), "x");
    }

    #[tokio::test]
    async fn test_edit_replaces_first_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cfg"), "a=1\na=1\n").unwrap();
        let svc = FileWriterService::new(dir.path());

        svc.invoke(json!({"path": "cfg", "mode": "edit", "oldText": "a=1", "newText": "a=2"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("cfg")).unwrap(), "a=2\na=1\n");

        assert!(matches!(
            svc.invoke(json!({"path": "cfg", "mode": "edit", "oldText": "zzz", "newText": ""})).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            svc.invoke(json!({"path": "missing", "mode": "edit", "oldText": "a", "newText": "b"})).await,
            Err(Error::NotFound(_))
        ));
    }
}
