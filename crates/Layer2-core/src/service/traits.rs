//! Service trait - 레지스트리에 바인딩되는 실행 가능한 서비스

use crate::registry::ServiceDescriptor;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_foundation::{Error, Result};

/// Result of a service invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOutput {
    pub service: String,
    pub success: bool,
    pub data: Value,
}

impl ServiceOutput {
    pub fn success(service: impl Into<String>, data: Value) -> Self {
        Self {
            service: service.into(),
            success: true,
            data,
        }
    }

    /// The service ran but reported failure (e.g. non-zero exit)
    pub fn failure(service: impl Into<String>, data: Value) -> Self {
        Self {
            service: service.into(),
            success: false,
            data,
        }
    }
}

/// An invocable service.
///
/// Errors that stop the service from doing its work (bad arguments, missing
/// files, refused commands) are returned as `Err`; work that ran but failed
/// is `Ok` with `success == false`.
#[async_trait]
pub trait Service: Send + Sync {
    /// 서비스 이름 (레지스트리 키)
    fn name(&self) -> &str;

    /// 레지스트리에 등록할 descriptor
    fn descriptor(&self) -> ServiceDescriptor;

    async fn invoke(&self, args: Value) -> Result<ServiceOutput>;
}

/// Deserialize service arguments, reporting failures as `InvalidInput`
pub fn parse_args<T: DeserializeOwned>(service: &str, args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| Error::InvalidInput(format!("{}: invalid arguments: {}", service, e)))
}
