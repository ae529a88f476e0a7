//! Feedback and maintenance
//!
//! Feedback routes to `AssociationStore::reinforce` with a sign-dependent
//! amount: positive feedback strengthens every known (query token,
//! response token) pair of the answer, negative feedback weakens them.

use serde::Serialize;

use kavram_compute::DecayReport;
use kavram_core::{text, KavramError, KavramResult};

use super::EngineState;

/// What a feedback call touched
#[derive(Clone, Debug, Serialize)]
pub struct FeedbackReport {
    pub positive: bool,
    /// Pairs that existed and were updated
    pub updated: usize,
    /// Pairs of the cross product that were never learned
    pub unknown: usize,
    /// The exact example matched the response and was confirmed
    pub confirmed: bool,
}

impl EngineState {
    /// Reward or punish the pairing of `query` with `response`
    ///
    /// Returns `NotFound` (and changes nothing) when none of the token
    /// pairs is known.
    pub fn feedback(
        &mut self,
        query: &str,
        response: &str,
        positive: bool,
        now: u64,
    ) -> KavramResult<FeedbackReport> {
        let query_tokens = text::tokenize(query);
        let response_tokens = text::tokenize(response);
        if query_tokens.is_empty() || response_tokens.is_empty() {
            self.counters.rejected_inputs += 1;
            return Err(KavramError::EmptyInput);
        }

        let config = &self.config.association;
        let (amount, score) = if positive {
            (config.positive_feedback, config.feedback_score)
        } else {
            (-config.negative_feedback, -config.feedback_score)
        };

        let mut report = FeedbackReport {
            positive,
            updated: 0,
            unknown: 0,
            confirmed: false,
        };
        for query_token in &query_tokens {
            for response_token in &response_tokens {
                match self.store.reinforce_pair(query_token, response_token, amount, Some(score), now) {
                    Ok(_) => report.updated += 1,
                    Err(_) => report.unknown += 1,
                }
            }
        }

        if report.updated == 0 {
            self.counters.not_found += 1;
            tracing::debug!("Feedback on unknown pairing '{}' -> '{}'", query, response);
            return Err(KavramError::pair_not_found(&text::normalize(query), &text::normalize(response)));
        }

        if positive {
            report.confirmed = self.history.confirm(query, response);
            self.counters.feedback_positive += 1;
        } else {
            self.counters.feedback_negative += 1;
        }

        tracing::info!(
            "Feedback {} on '{}': {} pair(s) updated, {} unknown",
            if positive { "positive" } else { "negative" },
            text::normalize(query),
            report.updated,
            report.unknown
        );
        Ok(report)
    }

    /// Periodic decay pass over every association
    pub fn decay(&mut self, now: u64) -> DecayReport {
        let report = self.store.decay_all(
            now,
            self.config.association.decay_rate,
            self.config.association.decay_unit_ms,
        );
        self.counters.decay_passes += 1;
        tracing::debug!("Decay: {}/{} association(s) weakened", report.decayed, report.examined);
        report
    }
}
