//! # warden-judge
//!
//! Live semantic judge adapter for Warden.
//!
//! ## Features
//! - `direct` protocol: `{command, context}` -> `{level, score, explanation}`
//! - OpenAI-compatible chat completions (Moonshot, OpenAI, local servers)
//! - Hard timeout; every failure is reported as `JudgeError`

pub mod error;
pub mod http;
pub mod protocol;

pub use error::{from_http_status, from_reqwest};
pub use http::HttpJudge;
