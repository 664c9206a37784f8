//! Built-in services
//!
//! - `shell_executor`: 명령 실행 (CommandGate 경유)
//! - `file_reader`, `file_writer`, `directory_lister`: 파일시스템
//! - `git_service`: git 명령 (gate 미경유)
//!
//! 상대 경로는 workspace root 기준으로 해석한다.

mod directory_lister;
mod file_reader;
mod file_writer;
mod git;
mod shell;

pub use directory_lister::DirectoryListerService;
pub use file_reader::FileReaderService;
pub use file_writer::FileWriterService;
pub use git::GitService;
pub use shell::ShellExecutorService;

use super::traits::Service;
use crate::gate::CommandGate;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use warden_foundation::{Error, Result};

/// All built-in services bound to one gate and workspace root
pub fn builtin_services(gate: Arc<CommandGate>, root: &Path) -> Vec<Arc<dyn Service>> {
    vec![
        Arc::new(ShellExecutorService::new(gate, root)),
        Arc::new(FileReaderService::new(root)),
        Arc::new(FileWriterService::new(root)),
        Arc::new(DirectoryListerService::new(root)),
        Arc::new(GitService::new(root)),
    ]
}

/// Names of the built-in services, in registration order
pub const BUILTIN_NAMES: [&str; 5] = [
    ShellExecutorService::NAME,
    FileReaderService::NAME,
    FileWriterService::NAME,
    DirectoryListerService::NAME,
    GitService::NAME,
];

/// Resolve `path` against `root` unless it is already absolute
pub(crate) fn resolve_path(root: &Path, path: &str) -> Result<PathBuf> {
    let path = path.trim();
    if path.is_empty() {
        return Err(Error::InvalidInput("Path is empty".to_string()));
    }
    let path = Path::new(path);
    Ok(if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    })
}

/// Map filesystem errors to the shared error kinds
pub(crate) fn io_error(path: &Path, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::NotFound(path.display().to_string()),
        io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.display().to_string()),
        _ => Error::Io(err),
    }
}
