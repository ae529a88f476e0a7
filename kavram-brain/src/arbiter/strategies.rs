//! Answer strategies
//!
//! Each strategy looks at the same [`Context`] and either proposes one
//! candidate or stays silent. None of them mutates anything.

use std::collections::BTreeMap;

use kavram_compute::{ActivationResult, AssociationStore};
use kavram_core::config::ArbiterConfig;
use kavram_core::{text, Dictionary};

use super::{Candidate, Method};
use crate::memory::history::TrainingHistory;

/// Confidence of a dictionary definition
const DICTIONARY_CONFIDENCE: f32 = 0.9;

/// Reverse and fuzzy answers never claim certainty
const INFERRED_CEILING: f32 = 0.9;

/// Query tokens a reverse answer lists at most
const REVERSE_TOKENS: usize = 3;

/// Everything a strategy may read
pub struct Context<'a> {
    pub normalized: String,
    pub tokens: Vec<String>,
    pub activation: &'a ActivationResult,
    pub history: &'a TrainingHistory,
    pub store: &'a AssociationStore,
    pub dictionary: Option<&'a dyn Dictionary>,
    pub config: &'a ArbiterConfig,
}

impl<'a> Context<'a> {
    pub fn new(
        query: &str,
        activation: &'a ActivationResult,
        history: &'a TrainingHistory,
        store: &'a AssociationStore,
        dictionary: Option<&'a dyn Dictionary>,
        config: &'a ArbiterConfig,
    ) -> Self {
        Self {
            normalized: text::normalize(query),
            tokens: text::tokenize(query),
            activation,
            history,
            store,
            dictionary,
            config,
        }
    }
}

/// A response-generation strategy
pub trait Strategy: Send + Sync {
    fn method(&self) -> Method;

    fn propose(&self, ctx: &Context<'_>) -> Option<Candidate>;
}

/// The strategies in tie-break order
pub fn default_strategies() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(ExactMatch),
        Box::new(DictionaryLookup),
        Box::new(ReverseMatch),
        Box::new(FuzzyMatch),
        Box::new(ActivationSummary),
    ]
}

/// Subject of a "define X" style query
pub fn dictionary_subject(tokens: &[String]) -> Option<&str> {
    let words: Vec<&str> = tokens.iter().map(String::as_str).collect();
    match words.as_slice() {
        ["define", x]
        | ["meaning", "of", x]
        | ["what", "does", x, "mean"]
        | [x, "ne", "demek"]
        | [x, "ne", "demektir"]
        | [x, "anlamı"]
        | [x, "anlamı", "ne"]
        | [x, "ne", "anlama", "gelir"] => Some(*x),
        _ => None,
    }
}

/// Subject of a "what/where/who is X" style query
pub fn reverse_subject(tokens: &[String]) -> Option<&str> {
    let words: Vec<&str> = tokens.iter().map(String::as_str).collect();
    match words.as_slice() {
        ["what" | "where" | "who", "is", x]
        | ["what" | "where" | "who", "is", "a" | "an" | "the", x]
        | [x, "nedir" | "nerede" | "neresi" | "neresidir" | "kimdir" | "kim"] => Some(*x),
        _ => None,
    }
}

/// Exact normalized-query hit in the training history
pub struct ExactMatch;

impl Strategy for ExactMatch {
    fn method(&self) -> Method {
        Method::Exact
    }

    fn propose(&self, ctx: &Context<'_>) -> Option<Candidate> {
        let example = ctx.history.exact(&ctx.normalized)?;
        Some(Candidate::new(&example.response, 1.0, Method::Exact))
    }
}

/// "define X" answered from the dictionary collaborator
pub struct DictionaryLookup;

impl Strategy for DictionaryLookup {
    fn method(&self) -> Method {
        Method::Dictionary
    }

    fn propose(&self, ctx: &Context<'_>) -> Option<Candidate> {
        let dictionary = ctx.dictionary?;
        let subject = dictionary_subject(&ctx.tokens)?;
        let definition = dictionary.lookup_definition(subject)?;
        if definition.meanings.is_empty() {
            return None;
        }

        let meanings = definition.meanings.join("; ");
        let text = match &definition.part_of_speech {
            Some(pos) => format!("{} ({}): {}", subject, pos, meanings),
            None => format!("{}: {}", subject, meanings),
        };
        Some(Candidate::new(&text, DICTIONARY_CONFIDENCE, Method::Dictionary))
    }
}

/// "what is X" where X was only ever seen as an answer
///
/// X is matched by stem against response tokens; the query tokens that
/// lead to those responses become the answer.
pub struct ReverseMatch;

impl Strategy for ReverseMatch {
    fn method(&self) -> Method {
        Method::Reverse
    }

    fn propose(&self, ctx: &Context<'_>) -> Option<Candidate> {
        let subject = reverse_subject(&ctx.tokens)?;

        let mut scores: BTreeMap<&str, f32> = BTreeMap::new();
        let mut seen_responses: Vec<&str> = Vec::new();
        for association in ctx.store.iter() {
            let response = association.response_token.as_str();
            if seen_responses.contains(&response) || !text::same_stem(response, subject) {
                continue;
            }
            seen_responses.push(response);

            for reverse in ctx.store.lookup_reverse(response) {
                let token = reverse.query_token.as_str();
                if text::is_question_word(token) || text::same_stem(token, subject) {
                    continue;
                }
                let score = reverse.edge_strength() * 0.6 + reverse.confidence * 0.4;
                let entry = scores.entry(token).or_insert(0.0);
                *entry = entry.max(score);
            }
        }

        let mut ranked: Vec<(&str, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(REVERSE_TOKENS);

        let best = ranked.first()?.1;
        let text = ranked.iter().map(|(t, _)| *t).collect::<Vec<_>>().join(" ");
        Some(Candidate::new(&text, best.min(INFERRED_CEILING), Method::Reverse))
    }
}

/// Closest training query by token overlap
pub struct FuzzyMatch;

impl Strategy for FuzzyMatch {
    fn method(&self) -> Method {
        Method::Fuzzy
    }

    fn propose(&self, ctx: &Context<'_>) -> Option<Candidate> {
        if ctx.tokens.is_empty() {
            return None;
        }

        let mut best: Option<(f32, &str)> = None;
        for example in ctx.history.iter() {
            if example.normalized_query == ctx.normalized {
                continue;
            }
            let overlap = text::jaccard(&ctx.tokens, &example.query_tokens());
            if overlap >= ctx.config.fuzzy_threshold && best.map_or(true, |(b, _)| overlap > b) {
                best = Some((overlap, example.response.as_str()));
            }
        }

        let (overlap, response) = best?;
        Some(Candidate::new(response, overlap * INFERRED_CEILING, Method::Fuzzy))
    }
}

/// Top primary concepts, in the order they appeared in training
pub struct ActivationSummary;

impl Strategy for ActivationSummary {
    fn method(&self) -> Method {
        Method::Activation
    }

    fn propose(&self, ctx: &Context<'_>) -> Option<Candidate> {
        let activation = ctx.activation;
        if activation.confidence <= 0.0 || activation.primary_concepts.is_empty() {
            return None;
        }

        let mut concepts: Vec<(u32, usize, &str)> = activation
            .primary_concepts
            .iter()
            .take(ctx.config.activation_concepts.max(1))
            .enumerate()
            .map(|(rank, (token, _))| {
                let order = activation
                    .associations
                    .iter()
                    .filter_map(|&id| ctx.store.get(id))
                    .filter(|a| &a.response_token == token)
                    .map(|a| a.order)
                    .min()
                    .unwrap_or(u32::MAX);
                (order, rank, token.as_str())
            })
            .collect();
        concepts.sort();

        let text = concepts.iter().map(|(_, _, t)| *t).collect::<Vec<_>>().join(" ");
        Some(Candidate::new(&text, activation.confidence, Method::Activation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<String> {
        text::tokenize(s)
    }

    #[test]
    fn test_dictionary_subject() {
        assert_eq!(dictionary_subject(&tokens("define apple")), Some("apple"));
        assert_eq!(dictionary_subject(&tokens("Elma ne demek?")), Some("elma"));
        assert_eq!(dictionary_subject(&tokens("meaning of life")), Some("life"));
        assert_eq!(dictionary_subject(&tokens("elma nedir")), None);
    }

    #[test]
    fn test_reverse_subject() {
        assert_eq!(reverse_subject(&tokens("What is Ankara?")), Some("ankara"));
        assert_eq!(reverse_subject(&tokens("who is the president")), Some("president"));
        assert_eq!(reverse_subject(&tokens("meyve nedir")), Some("meyve"));
        assert_eq!(reverse_subject(&tokens("ankara nerede")), Some("ankara"));
        assert_eq!(reverse_subject(&tokens("merhaba nasılsın")), None);
    }
}
