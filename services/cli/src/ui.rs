//! Terminal rendering for session state.
//!
//! Everything here builds strings rather than printing, so layout can be
//! unit tested without capturing stdout.

use tandem_core::conversation::{Conversation, ResolutionStatus, TutorTips};
use tandem_core::locale::Language;
use tandem_core::scenario::{DIFFICULTY_LEVELS, ScenarioProposal};

/// Menu of languages and variants, one numbered line per locale.
pub fn language_menu(languages: &[Language]) -> String {
    let mut out = String::new();
    let mut index = 1;
    for language in languages {
        out.push_str(&format!("{} ({})\n", language.name, language.native_name));
        for variant in &language.variants {
            let marker = if variant.is_default { " (default)" } else { "" };
            out.push_str(&format!(
                "  {:>2}. {} {} [{}]{}\n",
                index, variant.flag, variant.country, variant.code, marker
            ));
            index += 1;
        }
    }
    out
}

/// The variant code at a 1-based menu position, if in range.
pub fn language_menu_choice(languages: &[Language], choice: usize) -> Option<&str> {
    languages
        .iter()
        .flat_map(|l| &l.variants)
        .nth(choice.checked_sub(1)?)
        .map(|v| v.code.as_str())
}

/// Menu of CEFR tiers with their descriptions.
pub fn difficulty_menu() -> String {
    let mut out = String::new();
    for (code, label, description) in DIFFICULTY_LEVELS {
        out.push_str(&format!("  {} {:<18} {}\n", code, label, description));
    }
    out
}

/// The scenario proposal card shown before accepting.
pub fn proposal_card(proposal: &ScenarioProposal) -> String {
    let mut out = format!(
        "\n=== {} ({} {}, {}) ===\n{}\n\nObjective: {}\nConflict:  {}\n\nYou will be talking to {}, {}.\n",
        proposal.setting,
        proposal.language_name,
        proposal.locale,
        proposal.difficulty,
        proposal.setting_description,
        proposal.objective,
        proposal.conflict,
        proposal.character_name,
        proposal.character_personality,
    );
    if !proposal.hints.is_empty() {
        out.push_str("\nPhrases that may help:\n");
        for hint in &proposal.hints {
            out.push_str(&format!("  - {}\n", hint));
        }
    }
    out
}

/// The latest tutor feedback batch, omitting empty categories.
pub fn tips_block(tips: &TutorTips) -> String {
    let mut out = String::new();
    let sections = [
        ("Corrections", &tips.corrections),
        ("Vocabulary", &tips.vocabulary),
        ("Culture", &tips.cultural),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("  {}:\n", title));
        for item in items {
            out.push_str(&format!("    - {}\n", item));
        }
    }
    out
}

/// One-line verdict shown when a conversation concludes.
pub fn resolution_summary(resolution: Option<ResolutionStatus>) -> &'static str {
    match resolution {
        Some(ResolutionStatus::Success) => {
            "Félicitations! You successfully achieved your objective."
        }
        Some(ResolutionStatus::Adapted) => "Well done! You found an alternative way forward.",
        Some(ResolutionStatus::GracefulFail) => {
            "Good effort! You handled a challenging situation gracefully. \
             Every conversation is a chance to learn!"
        }
        None => "The conversation has ended.",
    }
}

/// Recap of a concluded conversation.
pub fn conversation_recap(proposal: &ScenarioProposal, conversation: &Conversation) -> String {
    format!(
        "\n{}\n\nScenario: {}\nCharacter: {}\nExchanges: {}\n",
        resolution_summary(conversation.resolution()),
        proposal.setting_description,
        proposal.character_name,
        conversation.exchange_count(),
    )
}
