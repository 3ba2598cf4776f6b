//! The sentiment walkthrough: train, select, compose, predict, save, load.

use super::{answering, registry, sentiment_params, strings};
use crate::pipeline::{PipelineState, TaskPipeline};
use meteo_core::AppError;
use meteo_knowledge::SelectorAlgorithm;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn trained() -> TaskPipeline {
    let params = sentiment_params().with_selector(SelectorAlgorithm::Similarity, 3);
    let mut pipeline = TaskPipeline::new(params, &registry()).unwrap();
    pipeline
        .train(
            &strings(&["estoy feliz", "me da igual", "no me gusta"]),
            Some(strings(&["positivo", "neutral", "negativo"]).as_slice()),
        )
        .unwrap();
    pipeline
}

#[test]
fn test_select_returns_whole_corpus_when_k_covers_it() {
    let pipeline = trained();
    assert_eq!(pipeline.state(), PipelineState::Trained);

    let selected = pipeline.selector().unwrap().select("que guay!!").unwrap();
    assert_eq!(selected.len(), 3);
}

#[test]
fn test_prompt_contains_examples_and_sample() {
    let pipeline = trained();
    let prompt = pipeline.render_prompt("que guay!!").unwrap();

    for input in ["estoy feliz", "me da igual", "no me gusta"] {
        assert!(prompt.contains(&format!("EJEMPLO: {}\n", input)), "missing {}", input);
    }
    assert!(prompt.contains("EJEMPLO: que guay!!\nRESPUESTA:"));
    assert!(prompt.contains("positivo, neutral, negativo"));
    assert!(prompt.ends_with("RESPUESTA:"));
}

#[test]
fn test_predict_parses_label() {
    let pipeline = trained().with_llm(answering("Positivo."));
    let predictions = pipeline
        .predict(&strings(&["que guay!!", "vaya rollo"]))
        .unwrap();
    assert_eq!(predictions, vec![vec!["positivo"], vec!["positivo"]]);

    let pipeline = trained().with_llm(answering("no lo sé"));
    assert_eq!(
        pipeline.predict(&strings(&["hmm"])).unwrap(),
        vec![Vec::<String>::new()]
    );
}

#[test]
fn test_prompt_is_deterministic() {
    let first = trained().render_prompt("que guay!!").unwrap();
    let second = trained().render_prompt("que guay!!").unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_save_and_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sentiment.meteo");

    let pipeline = trained();
    pipeline.save(&path).unwrap();

    let loaded = TaskPipeline::load(&path, &registry()).unwrap();
    assert_eq!(loaded.state(), PipelineState::Trained);
    assert_eq!(loaded.labels(), pipeline.labels());
    assert_eq!(loaded.params(), pipeline.params());
    assert_eq!(
        loaded.selector().unwrap().index(),
        pipeline.selector().unwrap().index()
    );
    assert_eq!(
        loaded.render_prompt("que guay!!").unwrap(),
        pipeline.render_prompt("que guay!!").unwrap()
    );
}

#[test]
fn test_save_with_wrong_extension() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("model.wrong_ext");

    match trained().save(&path) {
        Err(AppError::Validation(msg)) => assert!(msg.contains(".meteo")),
        other => panic!("Expected validation error, got {:?}", other),
    }
    assert!(!path.exists());
}
