//! Service layer
//!
//! - [`Service`]: 실행 가능한 서비스 trait
//! - [`ServiceManager`]: 레지스트리 + handler + 실행 게이트
//! - [`builtin`]: 기본 제공 서비스 (shell, file, directory, git)

pub mod builtin;
mod manager;
mod traits;

pub use manager::{ServiceManager, ServiceManagerBuilder};
pub use traits::{parse_args, Service, ServiceOutput};
