//! Fixed phrases for the pulse narrative.

use sylva_catalog::Subsystem;

use super::DriftState;

pub const SILENCE: &str = "The pulse is quiet. No recent patterns to observe.";

/// Phrase for the subsystem dominating the recent window.
pub fn presence(dominant: Option<Subsystem>) -> &'static str {
    match dominant {
        None => "The pulse flows without pattern; early rhythms are forming.",
        Some(Subsystem::Marrow) => "The pulse runs deep. MARROW has been active in your recent journey.",
        Some(Subsystem::Root) => "The pulse is steady. ROOT has been grounding your experience.",
        Some(Subsystem::Aura) => "The pulse holds at the boundary. AURA has been tending your edges.",
        Some(Subsystem::Neutral) => "The pulse moves quietly, beneath any single system.",
        Some(Subsystem::Crisis) => "The pulse stays close to the container.",
    }
}

/// Phrase naming where the recent window has moved.
pub fn shift(toward: Option<Subsystem>) -> &'static str {
    match toward {
        Some(Subsystem::Marrow) => "The current has turned toward the depths.",
        Some(Subsystem::Root) => "The current has turned toward the ground.",
        Some(Subsystem::Aura) => "The current has turned toward the edges.",
        Some(Subsystem::Crisis) => "The current has drawn in close.",
        Some(Subsystem::Neutral) | None => "The current has loosened from its old channels.",
    }
}

/// Compose the narrative for a computed snapshot.
pub fn compose(state: DriftState, recent_dominant: Option<Subsystem>) -> String {
    match state {
        DriftState::Silence => SILENCE.to_string(),
        DriftState::Stable => presence(recent_dominant).to_string(),
        DriftState::Shifted => format!("{} {}", presence(recent_dominant), shift(recent_dominant)),
    }
}
