//! Semantic judge selection
//!
//! 설정이 꺼져 있거나 HTTP judge를 만들 수 없으면 `DisabledJudge`로
//! 대체한다. 이 경우 판정은 pattern classifier만으로 이루어진다.

use std::sync::Arc;
use tracing::{info, warn};
use warden_foundation::{DisabledJudge, JudgeConfig, SemanticJudge};

/// Build the judge described by `config`
pub fn judge_from_config(config: &JudgeConfig) -> Arc<dyn SemanticJudge> {
    if !config.enabled {
        return Arc::new(DisabledJudge);
    }

    #[cfg(feature = "semantic-judge")]
    {
        match warden_judge::HttpJudge::from_config(config) {
            Ok(judge) => {
                info!(
                    "[judge] semantic judge enabled: {} ({:?})",
                    judge.endpoint(),
                    config.protocol
                );
                return Arc::new(judge);
            }
            Err(e) => {
                warn!("[judge] semantic judge unavailable, using patterns only: {}", e);
            }
        }
    }

    #[cfg(not(feature = "semantic-judge"))]
    {
        warn!("[judge] judge enabled in config but built without the semantic-judge feature");
    }

    Arc::new(DisabledJudge)
}
