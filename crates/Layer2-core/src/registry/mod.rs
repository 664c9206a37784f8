//! Capability Registry
//!
//! 서비스 descriptor를 이름과 capability tag로 조회한다.
//!
//! ## 특징
//!
//! - **일관된 인덱스**: 이름/순서/capability 인덱스를 하나의 lock으로 보호
//! - **교체 시 위치 유지**: 같은 이름 재등록은 기존 순서를 유지
//! - **이벤트**: `subscribe()`로 변경 알림 수신
//! - **스냅샷**: JsonStore에 descriptor 목록을 저장/복원
//!
//! ## 사용 예시
//!
//! ```ignore
//! let registry = CapabilityRegistry::new("services");
//! registry.register(ServiceDescriptor::new("file_reader", "Reads files").with_capability("read"))?;
//! let readers = registry.lookup_by_capability("read");
//! ```

mod capability;
mod descriptor;
mod event;
mod snapshot;

pub use capability::{CapabilityRegistry, RegisterOutcome};
pub use descriptor::{MetadataValue, ServiceDescriptor};
pub use event::RegistryEvent;
pub use snapshot::{RegistrySnapshot, DEFAULT_SNAPSHOT_FILE, SNAPSHOT_VERSION};
