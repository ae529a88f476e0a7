//! # Association Store
//!
//! Arena of query-token -> response-token associations with three
//! indices: by pair, by query token and by response token. Associations
//! reference tokens only, never grid nodes, so evicting a node can never
//! leave a dangling pointer here.
//!
//! Lookups return associations in insertion order, which keeps
//! propagation deterministic across snapshot round-trips.

use std::collections::HashMap;

use serde::Serialize;

use kavram_core::association::Association;
use kavram_core::{AssociationId, KavramError, KavramResult};

/// Reinforcement applied by a plain `upsert`
pub const DEFAULT_CO_OCCURRENCE: f32 = 5.0;

/// What `upsert` did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertKind {
    Created,
    Reinforced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Upsert {
    pub id: AssociationId,
    pub kind: UpsertKind,
}

/// Outcome of a decay pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DecayReport {
    /// Associations looked at
    pub examined: usize,
    /// Associations that actually weakened
    pub decayed: usize,
}

/// Directed weighted edge set between query and response tokens
#[derive(Clone, Debug, Default)]
pub struct AssociationStore {
    associations: Vec<Association>,
    by_pair: HashMap<String, HashMap<String, AssociationId>>,
    by_query: HashMap<String, Vec<AssociationId>>,
    by_response: HashMap<String, Vec<AssociationId>>,
}

impl AssociationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a co-occurrence with the default reinforcement
    pub fn upsert(&mut self, query_token: &str, response_token: &str, order: u32, now: u64) -> Upsert {
        self.upsert_weighted(query_token, response_token, order, DEFAULT_CO_OCCURRENCE, now)
    }

    /// Record a co-occurrence
    ///
    /// An existing pair gains frequency, tightens its order and is
    /// reinforced by `amount`. A new pair starts at baseline strength.
    pub fn upsert_weighted(
        &mut self,
        query_token: &str,
        response_token: &str,
        order: u32,
        amount: f32,
        now: u64,
    ) -> Upsert {
        if let Some(id) = self.find(query_token, response_token) {
            self.associations[id.index()].co_occur(order, amount, now);
            return Upsert { id, kind: UpsertKind::Reinforced };
        }

        let id = AssociationId(self.associations.len() as u32);
        let mut association = Association::new(id, query_token, response_token, order, now);

        // The same two tokens were already linked the other way round
        if let Some(reverse) = self.find(response_token, query_token) {
            association.bidirectional = true;
            self.associations[reverse.index()].bidirectional = true;
        }

        self.index(&association);
        self.associations.push(association);
        Upsert { id, kind: UpsertKind::Created }
    }

    /// Apply a reinforcement (or, with a negative amount, weakening) event
    pub fn reinforce(
        &mut self,
        id: AssociationId,
        amount: f32,
        feedback: Option<f32>,
        now: u64,
    ) -> KavramResult<()> {
        let association = self
            .associations
            .get_mut(id.index())
            .ok_or_else(|| KavramError::association_not_found(id))?;
        association.reinforce(amount, feedback, now);
        Ok(())
    }

    /// Reinforce by token pair
    pub fn reinforce_pair(
        &mut self,
        query_token: &str,
        response_token: &str,
        amount: f32,
        feedback: Option<f32>,
        now: u64,
    ) -> KavramResult<AssociationId> {
        let id = self
            .find(query_token, response_token)
            .ok_or_else(|| KavramError::pair_not_found(query_token, response_token))?;
        self.reinforce(id, amount, feedback, now)?;
        Ok(id)
    }

    /// Time-based maintenance pass over every association
    pub fn decay_all(&mut self, now: u64, rate: f32, unit_ms: u64) -> DecayReport {
        let mut report = DecayReport::default();
        for association in &mut self.associations {
            report.examined += 1;
            if association.decay(now, rate, unit_ms) {
                report.decayed += 1;
            }
        }
        report
    }

    /// Associations leaving a query token
    pub fn lookup<'a>(&'a self, query_token: &str) -> impl Iterator<Item = &'a Association> + 'a {
        self.resolve(self.by_query.get(query_token))
    }

    /// Associations arriving at a response token
    pub fn lookup_reverse<'a>(
        &'a self,
        response_token: &str,
    ) -> impl Iterator<Item = &'a Association> + 'a {
        self.resolve(self.by_response.get(response_token))
    }

    pub fn get(&self, id: AssociationId) -> Option<&Association> {
        self.associations.get(id.index())
    }

    pub fn find(&self, query_token: &str, response_token: &str) -> Option<AssociationId> {
        self.by_pair.get(query_token)?.get(response_token).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Association> + '_ {
        self.associations.iter()
    }

    pub fn len(&self) -> usize {
        self.associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }

    /// Copy of every association in id order
    pub fn to_vec(&self) -> Vec<Association> {
        self.associations.clone()
    }

    /// Rebuild a store from a list of associations
    ///
    /// Ids are reassigned densely in list order. A repeated pair keeps
    /// its first occurrence.
    pub fn from_associations(associations: Vec<Association>) -> Self {
        let mut store = Self::new();
        for mut association in associations {
            if store.find(&association.query_token, &association.response_token).is_some() {
                tracing::warn!(
                    "Duplicate association '{}' -> '{}' dropped",
                    association.query_token,
                    association.response_token
                );
                continue;
            }
            association.id = AssociationId(store.associations.len() as u32);
            store.index(&association);
            store.associations.push(association);
        }
        store
    }

    /// Drop every association for which `keep` rejects either token
    ///
    /// Used on restore to shed malformed entries. Returns how many were
    /// dropped.
    pub fn retain_tokens<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let before = self.associations.len();
        let kept: Vec<Association> = std::mem::take(&mut self.associations)
            .into_iter()
            .filter(|a| keep(&a.query_token) && keep(&a.response_token))
            .collect();
        let dropped = before - kept.len();
        if dropped > 0 {
            *self = Self::from_associations(kept);
        } else {
            self.associations = kept;
        }
        dropped
    }

    fn index(&mut self, association: &Association) {
        self.by_pair
            .entry(association.query_token.clone())
            .or_default()
            .insert(association.response_token.clone(), association.id);
        self.by_query
            .entry(association.query_token.clone())
            .or_default()
            .push(association.id);
        self.by_response
            .entry(association.response_token.clone())
            .or_default()
            .push(association.id);
    }

    fn resolve<'a>(
        &'a self,
        ids: Option<&'a Vec<AssociationId>>,
    ) -> impl Iterator<Item = &'a Association> + 'a {
        ids.into_iter()
            .flatten()
            .map(move |id| &self.associations[id.index()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kavram_core::association::{MAX_STRENGTH, MIN_STRENGTH};

    #[test]
    fn test_upsert_creates_then_reinforces() {
        let mut store = AssociationStore::new();

        let first = store.upsert("elma", "meyvedir", 1, 0);
        assert_eq!(first.kind, UpsertKind::Created);

        let second = store.upsert("elma", "meyvedir", 0, 10);
        assert_eq!(second, Upsert { id: first.id, kind: UpsertKind::Reinforced });

        let a = store.get(first.id).unwrap();
        assert_eq!(a.frequency, 2);
        assert_eq!(a.order, 0);
        assert_eq!(a.dependency, 55.0);
        assert_eq!(a.association, 55.0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_lookups() {
        let mut store = AssociationStore::new();
        store.upsert("elma", "bir", 0, 0);
        store.upsert("elma", "meyvedir", 1, 0);
        store.upsert("armut", "meyvedir", 1, 0);

        let forward: Vec<&str> = store.lookup("elma").map(|a| a.response_token.as_str()).collect();
        assert_eq!(forward, vec!["bir", "meyvedir"]);

        let reverse: Vec<&str> =
            store.lookup_reverse("meyvedir").map(|a| a.query_token.as_str()).collect();
        assert_eq!(reverse, vec!["elma", "armut"]);

        assert_eq!(store.lookup("kiraz").count(), 0);
        assert!(store.find("armut", "bir").is_none());
    }

    #[test]
    fn test_bidirectional_marking() {
        let mut store = AssociationStore::new();
        let forward = store.upsert("merhaba", "selam", 0, 0).id;
        assert!(!store.get(forward).unwrap().bidirectional);

        let backward = store.upsert("selam", "merhaba", 0, 0).id;
        assert!(store.get(forward).unwrap().bidirectional);
        assert!(store.get(backward).unwrap().bidirectional);
    }

    #[test]
    fn test_reinforce_unknown_is_not_found() {
        let mut store = AssociationStore::new();
        store.upsert("elma", "meyvedir", 0, 0);

        let err = store.reinforce(AssociationId(42), 15.0, None, 0);
        assert!(matches!(err, Err(KavramError::NotFound(_))));
        assert!(store.reinforce_pair("kiraz", "meyvedir", 15.0, None, 0).is_err());

        // Nothing changed
        assert_eq!(store.get(AssociationId(0)).unwrap().association, 50.0);
    }

    #[test]
    fn test_bounds_hold_under_any_sequence() {
        let mut store = AssociationStore::new();
        let id = store.upsert("soru", "cevap", 0, 0).id;

        for step in 0..200u64 {
            match step % 4 {
                0 => {
                    store.upsert("soru", "cevap", 0, step * 1_000);
                }
                1 => store.reinforce(id, 15.0, Some(10.0), step * 1_000).unwrap(),
                2 => store.reinforce(id, -10.0, Some(-10.0), step * 1_000).unwrap(),
                _ => {
                    store.decay_all(step * 1_000 + 50_000, 0.3, 1_000);
                }
            }
            let a = store.get(id).unwrap();
            assert!(a.in_bounds(), "out of bounds after step {}: {:?}", step, a);
            assert!(a.association >= MIN_STRENGTH && a.association <= MAX_STRENGTH);
        }
    }

    #[test]
    fn test_decay_never_increases() {
        let mut store = AssociationStore::new();
        for (q, r) in [("elma", "meyvedir"), ("armut", "meyvedir"), ("elma", "bir")] {
            store.upsert(q, r, 0, 0);
        }
        store.upsert("elma", "bir", 0, 5_000);

        let before = store.to_vec();
        let report = store.decay_all(10_000, 0.05, 1_000);
        assert_eq!(report.examined, 3);
        assert_eq!(report.decayed, 3);
        assert_eq!(
            serde_json::to_value(report).unwrap(),
            serde_json::json!({ "examined": 3, "decayed": 3 })
        );

        for (old, new) in before.iter().zip(store.iter()) {
            assert!(new.dependency <= old.dependency);
            assert!(new.association <= old.association);
            assert!(new.confidence <= old.confidence);
            assert_eq!(new.frequency, old.frequency);
        }
    }

    #[test]
    fn test_rebuild_and_retain() {
        let mut store = AssociationStore::new();
        store.upsert("elma", "meyvedir", 0, 0);
        store.upsert("hayalet", "meyvedir", 0, 0);
        store.upsert("armut", "meyvedir", 0, 0);

        let dropped = store.retain_tokens(|token| token != "hayalet");
        assert_eq!(dropped, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.find("armut", "meyvedir"), Some(AssociationId(1)));
        assert_eq!(store.lookup_reverse("meyvedir").count(), 2);

        let rebuilt = AssociationStore::from_associations(store.to_vec());
        assert_eq!(rebuilt.len(), 2);
        assert_eq!(rebuilt.find("elma", "meyvedir"), Some(AssociationId(0)));
    }
}
