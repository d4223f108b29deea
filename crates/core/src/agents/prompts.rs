//! Default prompt templates bundled at compile time.

use crate::workspace::ThoughtChunk;

/// Analyst - defines the specialist roster for a problem
pub const ANALYST: &str = include_str!("defaults/analyst.md");

/// Synthesizer - fixed system instruction for broadcast synthesis
pub const SYNTHESIZER: &str = include_str!("defaults/synthesizer.md");

/// Specialist turn template (`{role}`, `{thoughts}`)
pub const SPECIALIST_TURN: &str = include_str!("defaults/specialist.md");

/// Broadcast request template (`{thoughts}`)
pub const BROADCAST_REQUEST: &str = include_str!("defaults/broadcast_request.md");

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("analyst", ANALYST),
        ("synthesizer", SYNTHESIZER),
        ("specialist_turn", SPECIALIST_TURN),
        ("broadcast_request", BROADCAST_REQUEST),
    ]
}

/// Attributed lines (`[source]: content`) separated by blank lines
pub fn format_thoughts(chunks: &[ThoughtChunk]) -> String {
    chunks
        .iter()
        .map(ThoughtChunk::attributed)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// User prompt for one specialist turn
pub fn specialist_turn(role: &str, active: &[ThoughtChunk]) -> String {
    // Role first so chunk text containing "{role}" is left alone
    SPECIALIST_TURN
        .replace("{role}", role)
        .replace("{thoughts}", &format_thoughts(active))
}

/// User prompt asking for a synthesis of `cluster`
pub fn broadcast_request(cluster: &[ThoughtChunk]) -> String {
    BROADCAST_REQUEST.replace("{thoughts}", &format_thoughts(cluster))
}
