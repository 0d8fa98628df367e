// Decision oracle: prompt assembly, model call, response parsing
pub mod gemini;
pub mod prompt;

pub use gemini::GeminiOracle;
pub use prompt::{render_request, FewShotAssets, FewShotExample};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::BotError;
use crate::models::{Action, Decision, DecisionRequest};
use crate::Result;

/// Turns a decision request into a buy/sell/hold call
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision>;
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DecisionWire {
    decision: String,
    reason: String,
}

/// Parse the model's answer: exactly `{"decision": "...", "reason": "..."}`
pub fn parse_decision(raw: &str) -> Result<Decision> {
    let mut text = raw.trim();

    // Strip markdown code blocks (```json ... ``` or ``` ... ```)
    if text.starts_with("```") {
        text = text
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
    }

    if text.is_empty() {
        return Err(BotError::MalformedDecision("empty response".to_string()));
    }

    let wire: DecisionWire = serde_json::from_str(text)
        .map_err(|e| BotError::MalformedDecision(format!("{} (text: {})", e, raw)))?;

    Ok(Decision {
        action: wire.decision.parse::<Action>()?,
        reason: wire.reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_decision() {
        let decision =
            parse_decision(r#"{"decision":"sell","reason":"Exchange hack headlines"}"#).unwrap();
        assert_eq!(decision.action, Action::Sell);
        assert_eq!(decision.reason, "Exchange hack headlines");
    }

    #[test]
    fn test_parse_strips_code_fence() {
        let decision =
            parse_decision("```json\n{\"decision\":\"hold\",\"reason\":\"flat\"}\n```").unwrap();
        assert_eq!(decision.action, Action::Hold);
    }

    #[test]
    fn test_not_json_is_malformed() {
        assert!(matches!(
            parse_decision("not json"),
            Err(BotError::MalformedDecision(_))
        ));
    }

    #[test]
    fn test_unknown_action_is_malformed() {
        assert!(matches!(
            parse_decision(r#"{"decision":"short","reason":"x"}"#),
            Err(BotError::MalformedDecision(_))
        ));
    }

    #[test]
    fn test_missing_or_extra_fields_are_malformed() {
        assert!(matches!(
            parse_decision(r#"{"decision":"buy"}"#),
            Err(BotError::MalformedDecision(_))
        ));
        assert!(matches!(
            parse_decision(r#"{"decision":"buy","reason":"x","confidence":0.9}"#),
            Err(BotError::MalformedDecision(_))
        ));
        assert!(matches!(
            parse_decision(""),
            Err(BotError::MalformedDecision(_))
        ));
    }
}
