//! End-to-end behaviour of the engine through its public surface

use kavram_brain::{Engine, Method};
use kavram_core::{KavramConfig, KavramError};

fn engine() -> Engine {
    Engine::new(KavramConfig::default()).unwrap()
}

#[test]
fn exact_recall_of_taught_pair() {
    let engine = engine();
    engine.train("merhaba nasılsın", "iyiyim teşekkürler").unwrap();

    let answer = engine.ask("Merhaba, nasılsın?");
    assert_eq!(answer.text, "iyiyim teşekkürler");
    assert_eq!(answer.method, Method::Exact);
    assert_eq!(answer.confidence, 1.0);
    assert!(!answer.reinforce);
}

#[test]
fn correction_after_negative_feedback() {
    let engine = engine();
    engine.train("elma nedir", "bir sebzedir").unwrap();
    assert_eq!(engine.ask("elma nedir").text, "bir sebzedir");

    let report = engine.feedback("elma nedir", "bir sebzedir", false).unwrap();
    assert_eq!(report.updated, 4);

    engine.train("elma nedir", "bir meyvedir").unwrap();
    let answer = engine.ask("elma nedir");
    assert_eq!(answer.text, "bir meyvedir");
    assert_eq!(answer.method, Method::Exact);
    assert_eq!(engine.stats().examples, 1);
}

#[test]
fn retraining_only_strengthens() {
    let engine = engine();
    engine.train("elma nedir", "bir meyvedir").unwrap();
    let before = engine.snapshot();

    engine.train("elma nedir", "bir meyvedir").unwrap();
    engine.train("elma nedir", "bir meyvedir").unwrap();
    let after = engine.snapshot();

    assert_eq!(before.associations.len(), after.associations.len());
    assert_eq!(before.node_count(), after.node_count());
    for (old, new) in before.associations.iter().zip(&after.associations) {
        assert_eq!(old.query_token, new.query_token);
        assert_eq!(old.response_token, new.response_token);
        assert_eq!(new.frequency, old.frequency + 2);
        assert!(new.association >= old.association);
    }
    assert_eq!(after.examples[0].usage, 3);
}

#[test]
fn shared_response_token_is_reached() {
    let engine = engine();
    engine.train("elma nedir", "bir meyvedir").unwrap();
    engine.train("armut nedir", "bir meyvedir").unwrap();

    let result = engine.propagate(&["elma"], 2, 0.2, 0.05);
    let meyvedir = result.response_activation("meyvedir").expect("meyvedir activated");
    assert!(meyvedir > 0.1, "activation was {}", meyvedir);
    assert!(result.confidence > 0.0 && result.confidence <= 1.0);
}

#[test]
fn snapshot_round_trip_answers_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kavram.bin");
    // Several of these are answered by inference and trained back
    let queries = [
        "elma nedir",
        "elma nedir ki",
        "armut nedir ki",
        "meyve nedir",
        "kiraz",
        "merhaba",
        "merhaba dostum",
    ];

    let original = engine();
    original.train("elma nedir", "bir meyvedir").unwrap();
    original.train("armut nedir", "bir meyvedir").unwrap();
    original.train("merhaba", "selam").unwrap();
    original.train("merhaba nasılsın", "iyiyim teşekkürler").unwrap();
    original.train("kiraz ne renk", "kırmızı").unwrap();
    original.save(&path).unwrap();

    let restored = Engine::open(KavramConfig::default(), &path).unwrap();
    assert_eq!(restored.stats().associations, original.stats().associations);
    assert_eq!(restored.stats().examples, 5);

    for round in 0..4 {
        for query in queries {
            let a = original.ask(query);
            let b = restored.ask(query);
            assert_eq!(a.text, b.text, "round {} query {:?}", round, query);
            assert_eq!(a.method, b.method, "round {} query {:?}", round, query);
            assert_eq!(a.reinforced, b.reinforced, "round {} query {:?}", round, query);
            assert!((a.confidence - b.confidence).abs() < 1e-6, "round {} query {:?}", round, query);
        }
    }
    assert!(original.stats().counters.self_reinforcements > 0);

    // Same asks, same graph
    let (a, b) = (original.snapshot(), restored.snapshot());
    assert_eq!(a.node_count(), b.node_count());
    for (left, right) in a.query_layers.iter().chain(&a.response_layers).flatten()
        .zip(b.query_layers.iter().chain(&b.response_layers).flatten())
    {
        assert_eq!(left.token, right.token);
        assert_eq!(left.connections, right.connections);
    }
    assert_eq!(a.associations.len(), b.associations.len());
    for (left, right) in a.associations.iter().zip(&b.associations) {
        assert_eq!(
            (&left.query_token, &left.response_token, left.frequency),
            (&right.query_token, &right.response_token, right.frequency)
        );
        assert_eq!(left.association, right.association);
    }
}

#[test]
fn empty_input_and_fallback() {
    let engine = engine();
    assert!(matches!(engine.train("   ", "cevap"), Err(KavramError::EmptyInput)));
    assert!(matches!(engine.train("soru", "..."), Err(KavramError::EmptyInput)));
    assert_eq!(engine.stats().counters.rejected_inputs, 2);

    let answer = engine.ask("hiç duyulmamış bir soru");
    assert_eq!(answer.method, Method::None);
    assert!(answer.is_fallback());
    assert!(answer.confidence < 0.1);
}

#[test]
fn unknown_feedback_changes_nothing() {
    let engine = engine();
    engine.train("elma nedir", "bir meyvedir").unwrap();
    let version = engine.version();

    assert!(matches!(
        engine.feedback("kiraz", "kırmızı", true),
        Err(KavramError::NotFound(_))
    ));
    assert_eq!(engine.version(), version);
    assert_eq!(engine.stats().counters.not_found, 1);
}
