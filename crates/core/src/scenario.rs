//! Scenario negotiation: proposing, refining, and rejecting roleplay setups.
//!
//! A scenario is generated by the oracle from a locale, a difficulty tier,
//! and optional learner preferences. The learner can accept it as-is, ask
//! for a targeted modification, or reject it outright and get a fresh one.
//! Proposals are immutable values; every refinement produces a complete
//! replacement rather than a patch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{ModifyScenarioRequest, ScenarioRequest, TutorApi};
use crate::error::SessionError;

/// CEFR difficulty tiers: (code, label, description).
pub const DIFFICULTY_LEVELS: [(&str, &str, &str); 6] = [
    ("A1", "Beginner", "Basic phrases and simple interactions"),
    ("A2", "Elementary", "Everyday expressions, simple conversations"),
    ("B1", "Intermediate", "Main points on familiar topics, travel situations"),
    ("B2", "Upper Intermediate", "Complex texts, fluent conversations"),
    ("C1", "Advanced", "Demanding texts, nuanced expression"),
    ("C2", "Mastery", "Near-native fluency, subtle meanings"),
];

/// Returns true when `code` names a known CEFR tier.
pub fn is_valid_difficulty(code: &str) -> bool {
    DIFFICULTY_LEVELS.iter().any(|(c, _, _)| *c == code)
}

/// A complete roleplay scenario proposed by the oracle.
///
/// The struct travels unchanged between the generate, modify, and chat
/// endpoints, so the oracle always sees the exact scenario the learner
/// accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioProposal {
    pub setting: String,
    pub setting_description: String,
    /// What the learner is trying to accomplish in the conversation.
    pub objective: String,
    /// The complication that keeps the conversation from being trivial.
    pub conflict: String,
    pub difficulty: String,
    /// The character's first message, spoken before the learner's first turn.
    pub opening_line: String,
    pub character_name: String,
    pub character_personality: String,
    #[serde(default)]
    pub hints: Vec<String>,
    pub locale: String,
    pub language_name: String,
    pub country_name: String,
}

/// Negotiates scenario proposals with the oracle.
pub struct ScenarioNegotiator {
    api: Arc<dyn TutorApi>,
}

impl ScenarioNegotiator {
    pub fn new(api: Arc<dyn TutorApi>) -> Self {
        Self { api }
    }

    /// Requests a fresh proposal for the given locale and difficulty.
    pub async fn propose(
        &self,
        difficulty: &str,
        locale: &str,
        preferences: Option<String>,
        veto_reason: Option<String>,
    ) -> Result<ScenarioProposal, SessionError> {
        let request = ScenarioRequest {
            locale: locale.to_string(),
            difficulty: difficulty.to_string(),
            preferences,
            veto_reason,
        };
        let proposal = self
            .api
            .generate_scenario(request)
            .await
            .map_err(SessionError::Generation)?;
        info!(setting = %proposal.setting, locale = %proposal.locale, "scenario proposed");
        Ok(proposal)
    }

    /// Asks the oracle to rework the current proposal per the learner's
    /// request. The returned proposal replaces the current one wholesale.
    ///
    /// An empty request fails fast without a network call.
    pub async fn modify(
        &self,
        current: &ScenarioProposal,
        modification_request: &str,
    ) -> Result<ScenarioProposal, SessionError> {
        let text = modification_request.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput("modification request"));
        }
        let request = ModifyScenarioRequest {
            original_scenario: current.clone(),
            modification_request: text.to_string(),
        };
        let proposal = self
            .api
            .modify_scenario(request)
            .await
            .map_err(SessionError::Generation)?;
        info!(setting = %proposal.setting, "scenario modified");
        Ok(proposal)
    }

    /// Rejects the current proposal and generates a replacement in the same
    /// locale and tier. When the learner gives no reason, the rejected
    /// setting itself is sent so the oracle avoids proposing it again.
    pub async fn reject_and_regenerate(
        &self,
        current: &ScenarioProposal,
        veto_reason: Option<String>,
    ) -> Result<ScenarioProposal, SessionError> {
        let veto = veto_reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| current.setting.clone());
        self.propose(&current.difficulty, &current.locale, None, Some(veto))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockTutorApi};
    use reqwest::StatusCode;

    fn proposal(setting: &str) -> ScenarioProposal {
        ScenarioProposal {
            setting: setting.to_string(),
            setting_description: "A busy open-air market".to_string(),
            objective: "Haggle for fresh vegetables".to_string(),
            conflict: "The vendor insists the price is final".to_string(),
            difficulty: "B1".to_string(),
            opening_line: "Bonjour, je peux vous aider?".to_string(),
            character_name: "Henri".to_string(),
            character_personality: "stubborn, good-humored".to_string(),
            hints: vec!["c'est trop cher".to_string()],
            locale: "fr-FR".to_string(),
            language_name: "French".to_string(),
            country_name: "France".to_string(),
        }
    }

    #[test]
    fn difficulty_tiers_cover_the_cefr_scale() {
        assert_eq!(DIFFICULTY_LEVELS.len(), 6);
        assert!(is_valid_difficulty("A1"));
        assert!(is_valid_difficulty("C2"));
        assert!(!is_valid_difficulty("B3"));
        assert!(!is_valid_difficulty("a1"));
    }

    #[tokio::test]
    async fn propose_forwards_locale_difficulty_and_preferences() {
        let mut api = MockTutorApi::new();
        api.expect_generate_scenario()
            .withf(|request| {
                request.locale == "fr-CA"
                    && request.difficulty == "A2"
                    && request.preferences.as_deref() == Some("cooking")
                    && request.veto_reason.is_none()
            })
            .returning(|_| Ok(proposal("Marché Jean-Talon")));
        let negotiator = ScenarioNegotiator::new(Arc::new(api));

        let result = negotiator
            .propose("A2", "fr-CA", Some("cooking".to_string()), None)
            .await
            .unwrap();
        assert_eq!(result.setting, "Marché Jean-Talon");
    }

    #[tokio::test]
    async fn empty_modification_request_skips_the_network() {
        let mut api = MockTutorApi::new();
        api.expect_modify_scenario().times(0);
        let negotiator = ScenarioNegotiator::new(Arc::new(api));

        let err = negotiator
            .modify(&proposal("Marché"), "  \n ")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::EmptyInput("modification request")
        ));
    }

    #[tokio::test]
    async fn modify_sends_the_current_proposal_and_trimmed_request() {
        let mut api = MockTutorApi::new();
        api.expect_modify_scenario()
            .withf(|request| {
                request.original_scenario.setting == "Marché"
                    && request.modification_request == "make it indoors"
            })
            .returning(|_| Ok(proposal("Halle couverte")));
        let negotiator = ScenarioNegotiator::new(Arc::new(api));

        let result = negotiator
            .modify(&proposal("Marché"), "  make it indoors  ")
            .await
            .unwrap();
        assert_eq!(result.setting, "Halle couverte");
    }

    #[tokio::test]
    async fn rejection_without_reason_vetoes_the_current_setting() {
        let mut api = MockTutorApi::new();
        api.expect_generate_scenario()
            .withf(|request| {
                request.locale == "fr-FR"
                    && request.difficulty == "B1"
                    && request.veto_reason.as_deref() == Some("Marché")
            })
            .returning(|_| Ok(proposal("Gare de Lyon")));
        let negotiator = ScenarioNegotiator::new(Arc::new(api));

        let result = negotiator
            .reject_and_regenerate(&proposal("Marché"), None)
            .await
            .unwrap();
        assert_eq!(result.setting, "Gare de Lyon");
    }

    #[tokio::test]
    async fn rejection_with_a_reason_passes_it_through() {
        let mut api = MockTutorApi::new();
        api.expect_generate_scenario()
            .withf(|request| request.veto_reason.as_deref() == Some("no shopping scenarios"))
            .returning(|_| Ok(proposal("Bibliothèque")));
        let negotiator = ScenarioNegotiator::new(Arc::new(api));

        negotiator
            .reject_and_regenerate(&proposal("Marché"), Some("no shopping scenarios".to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn generation_failure_maps_to_generation_error() {
        let mut api = MockTutorApi::new();
        api.expect_generate_scenario().returning(|_| {
            Err(ApiError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "model overloaded".to_string(),
            })
        });
        let negotiator = ScenarioNegotiator::new(Arc::new(api));

        let err = negotiator.propose("B1", "fr-FR", None, None).await.unwrap_err();
        assert!(matches!(err, SessionError::Generation(_)));
    }
}
