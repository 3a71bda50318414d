//! Turn-taking constants and the instructions sent to the model.

use std::time::Duration;

pub const DEFAULT_MIN_AUDIO_BYTES: usize = 800;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_NEGOTIATION_DELAY_MS: u64 = 1000;
pub const DEFAULT_RETRIEVAL_TIMEOUT_MS: u64 = 5000;

pub const DEFAULT_GREETING: &str =
    "Namaste! Main sarkari yojna sahayak hoon. Aap apna sawal pooch sakte hain.";
pub const DEFAULT_FILLER: &str = "Main sun raha hoon.";
pub const DEFAULT_CLOSING_PHRASE: &str = "Kya aapka koi aur sawal hai?";
pub const DEFAULT_FALLBACK: &str = "Politely say in simple Hinglish that the policy details \
could not be found right now and ask the caller to try again shortly.";

/// How a call takes turns.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayPolicy {
    /// Speech stops with less estimated caller audio than this are ignored.
    pub min_audio_bytes: usize,
    /// Passages requested per turn.
    pub top_k: usize,
    /// Wait between `session.update` and the greeting.
    pub negotiation_delay: Duration,
    pub retrieval_timeout: Duration,
    pub greeting: String,
    pub filler: String,
    pub closing_phrase: String,
    pub fallback: String,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            min_audio_bytes: DEFAULT_MIN_AUDIO_BYTES,
            top_k: DEFAULT_TOP_K,
            negotiation_delay: Duration::from_millis(DEFAULT_NEGOTIATION_DELAY_MS),
            retrieval_timeout: Duration::from_millis(DEFAULT_RETRIEVAL_TIMEOUT_MS),
            greeting: DEFAULT_GREETING.to_string(),
            filler: DEFAULT_FILLER.to_string(),
            closing_phrase: DEFAULT_CLOSING_PHRASE.to_string(),
            fallback: DEFAULT_FALLBACK.to_string(),
        }
    }
}

impl RelayPolicy {
    /// Instructions for the context-augmented answer.
    pub fn answer_instructions(&self, context: &str, utterance: &str) -> String {
        format!(
            "Government policy context:\n{context}\n\n\
             User question:\n{utterance}\n\n\
             Answer STRICTLY in 2 to 3 sentences.\n\
             End with: {}",
            self.closing_phrase
        )
    }

    /// Instructions used when retrieval fails.
    pub fn fallback_instructions(&self) -> String {
        format!("{} End with: {}", self.fallback, self.closing_phrase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_instructions_embed_all_parts() {
        let policy = RelayPolicy::default();
        let text = policy.answer_instructions("passage one\n\npassage two", "what is the scheme");

        assert!(text.starts_with("Government policy context:\npassage one\n\npassage two"));
        assert!(text.contains("User question:\nwhat is the scheme"));
        assert!(text.ends_with("End with: Kya aapka koi aur sawal hai?"));
    }

    #[test]
    fn test_fallback_keeps_closing_phrase() {
        let policy = RelayPolicy {
            closing_phrase: "Anything else?".into(),
            ..Default::default()
        };
        assert!(policy.fallback_instructions().ends_with("End with: Anything else?"));
    }
}
