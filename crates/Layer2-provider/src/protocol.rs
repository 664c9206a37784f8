//! Judge wire formats
//!
//! Two protocols are supported:
//! - `direct`: `{command, context}` -> `{level, score, explanation}`
//! - `chatCompletions`: OpenAI-compatible chat API; the model replies with a JSON
//!   object embedded in its message content.

use serde::{Deserialize, Serialize};
use warden_foundation::{JudgeContext, JudgeError, RiskLevel, RiskVerdict, VerdictSource};

// ============================================================================
// Direct protocol
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DirectRequest<'a> {
    pub command: &'a str,
    pub context: &'a JudgeContext,
}

#[derive(Debug, Deserialize)]
pub struct DirectResponse {
    pub level: String,
    pub score: i64,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

impl DirectResponse {
    pub fn into_verdict(self) -> Result<RiskVerdict, JudgeError> {
        build_verdict(&self.level, self.score, self.explanation, self.risk_factors)
    }
}

// ============================================================================
// Chat completions protocol
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// JSON object the model is asked to produce
#[derive(Debug, Deserialize)]
pub struct ChatVerdict {
    pub security_level: String,
    pub risk_score: i64,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub risk_factors: Vec<String>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, command: &str, context: &JudgeContext) -> Self {
        Self {
            model: model.into(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(user_prompt(command, context)),
                },
            ],
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

impl ChatResponse {
    /// Parse the first choice's content into a verdict
    pub fn into_verdict(self) -> Result<RiskVerdict, JudgeError> {
        let content = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| JudgeError::InvalidResponse("No choices in response".to_string()))?;

        let json = extract_json_object(&content).ok_or_else(|| {
            JudgeError::InvalidResponse("No JSON object in judge reply".to_string())
        })?;

        let parsed: ChatVerdict = serde_json::from_str(json)
            .map_err(|e| JudgeError::InvalidResponse(format!("Malformed judge JSON: {}", e)))?;

        build_verdict(
            &parsed.security_level,
            parsed.risk_score,
            parsed.explanation,
            parsed.risk_factors,
        )
    }
}

const SYSTEM_PROMPT: &str = "You are a shell command security analyst. \
Assess the risk of running the given command on the user's machine. \
Use exactly one security_level: safe (read-only or harmless), caution (modifies files or \
settings in a recoverable way), dangerous (destructive or privileged but sometimes \
legitimate), critical (can break the system or leak data, e.g. mkfs, dd, curl | sh), \
blocked (never acceptable, e.g. rm -rf /, fork bombs). \
Reply with a single JSON object and nothing else: \
{\"security_level\": \"...\", \"risk_score\": 0-100, \"risk_factors\": [\"...\"], \
\"explanation\": \"...\"}";

fn user_prompt(command: &str, context: &JudgeContext) -> String {
    let mut prompt = format!("Command: {}\n", command);
    if let Some(dir) = &context.working_dir {
        prompt.push_str(&format!("Working directory: {}\n", dir));
    }
    if let Some(user) = &context.user {
        prompt.push_str(&format!("User: {}\n", user));
    }
    prompt.push_str(&format!("OS: {}\n", context.os));
    if !context.recent_commands.is_empty() {
        prompt.push_str("Recent commands:\n");
        for cmd in &context.recent_commands {
            prompt.push_str(&format!("- {}\n", cmd));
        }
    }
    prompt
}

// ============================================================================
// Helpers
// ============================================================================

/// Span from the first `{` to the last `}`
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Validate the schema and build a judge-only verdict
pub fn build_verdict(
    level: &str,
    score: i64,
    explanation: String,
    risk_factors: Vec<String>,
) -> Result<RiskVerdict, JudgeError> {
    let level: RiskLevel = level.parse().map_err(JudgeError::InvalidResponse)?;

    if !(0..=100).contains(&score) {
        return Err(JudgeError::InvalidResponse(format!(
            "Score out of range: {}",
            score
        )));
    }

    let mut reasons = Vec::with_capacity(risk_factors.len() + 1);
    if !explanation.trim().is_empty() {
        reasons.push(explanation.trim().to_string());
    }
    reasons.extend(
        risk_factors
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty()),
    );

    Ok(RiskVerdict::new(
        level,
        score as u8,
        reasons,
        VerdictSource::JudgeOnly,
    ))
}
