use std::fs;
use std::path::Path;

use clap::Parser;
use fude_core::{FudeError, ModelConfig, Partition, SequenceCollection, Stage};
use fude_trainer::cli::{Cli, run};
use fude_trainer::{JsonlStrokeSource, Pipeline, PipelineConfig, WritingPad};
use tempfile::TempDir;

const DOWN: u32 = 0x4E28; // 丨
const ACROSS: u32 = 0x4E00; // 一
const SLANT: u32 = 0x4E3F; // 丿

/// One stroke of `n` points; `shape` picks the direction, `seed` the jitter.
fn stroke_line(code: u32, shape: u32, seed: usize, n: usize) -> String {
    let mut points = Vec::with_capacity(n);
    let (mut x, mut y) = (10, 10);
    for i in 0..n {
        points.push(format!("[{x},{y}]"));
        let step = 3 + ((i + seed) % 2) as i32;
        match shape {
            DOWN => {
                x += 1;
                y += step;
            }
            ACROSS => {
                x += step;
                y += 1;
            }
            _ => {
                x += step;
                y += step;
            }
        }
    }
    format!("{{\"code\": {code}, \"strokes\": [[{}]]}}", points.join(","))
}

fn write_strokes(path: &Path, samples_per_code: usize, seed_offset: usize) {
    let mut lines = vec!["# synthetic single-stroke characters".to_string()];
    for code in [DOWN, ACROSS, SLANT] {
        for s in 0..samples_per_code {
            lines.push(stroke_line(code, code, s + seed_offset, 12 + s));
        }
    }
    fs::write(path, lines.join("\n")).unwrap();
}

fn config(root: &Path) -> PipelineConfig {
    PipelineConfig::new(root)
        .with_model(
            ModelConfig::new()
                .with_sampling_rate(1.0)
                .with_states_per_stroke(2)
                .with_max_iterations(50),
        )
        .with_workers(Some(2))
}

fn extracted_pipeline(dir: &TempDir) -> Pipeline {
    let train = dir.path().join("train.jsonl");
    let eval = dir.path().join("eval.jsonl");
    write_strokes(&train, 4, 0);
    write_strokes(&eval, 2, 7);

    let pipeline = Pipeline::new(config(&dir.path().join("models"))).unwrap();
    let report = pipeline
        .extract_features(&JsonlStrokeSource::new(&train, &eval))
        .unwrap();
    assert!(!report.has_failures(), "{report}");
    assert_eq!(report.succeeded.len(), 6);
    pipeline
}

#[test]
fn test_full_pipeline_recognizes_distinct_characters() {
    let dir = TempDir::new().unwrap();
    let pipeline = extracted_pipeline(&dir);

    let init = pipeline.build_initial_models().unwrap();
    assert!(!init.has_failures(), "{init}");
    assert_eq!(pipeline.model_store().codes(Stage::Initial).unwrap(), vec![ACROSS, DOWN, SLANT]);

    let trained = pipeline.train().unwrap();
    assert!(!trained.has_failures(), "{trained}");
    for code in [ACROSS, DOWN, SLANT] {
        let params = pipeline.model_store().load(Stage::Trained, code).unwrap().unwrap();
        assert_eq!(params.n_states(), 2);
        assert!(params.is_left_to_right());
    }

    let run = pipeline.evaluate().unwrap();
    assert!(!run.batch.has_failures(), "{}", run.batch);
    assert_eq!(run.batch.succeeded, vec![ACROSS, DOWN, SLANT]);
    let counts = &run.report.counts;
    assert_eq!(counts.total, 6);
    assert_eq!(run.report.unranked, 0);
    assert!(counts.match1() <= counts.match5());
    assert!(counts.match5() <= counts.match10());
    assert_eq!(counts.match1(), 100.0);
    assert_eq!(counts.match5(), 100.0);
    assert_eq!(counts.match10(), 100.0);
    assert!(run.report.summary().starts_with("match1: 100.00%"));
}

#[test]
fn test_writing_pad_uses_trained_models() {
    let dir = TempDir::new().unwrap();
    let pipeline = extracted_pipeline(&dir);
    pipeline.build_initial_models().unwrap();
    pipeline.train().unwrap();

    let pad = WritingPad::open(pipeline.config()).unwrap();
    assert_eq!(pad.n_models(), 3);

    let line = stroke_line(ACROSS, ACROSS, 3, 14);
    let writing: fude_trainer::LabeledWriting = serde_json::from_str(&line).unwrap();
    let matches = pad
        .recognize(&fude_core::Writing::new(writing.strokes))
        .unwrap();
    assert_eq!(matches.len(), 3);
    assert_eq!(matches[0], "一");
}

#[test]
fn test_empty_training_collection_writes_no_model() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(config(dir.path())).unwrap();
    pipeline
        .sequence_store()
        .write(Partition::Train, &SequenceCollection::new(97, None, Vec::new()))
        .unwrap();

    let err = pipeline.init_character(97).unwrap_err();
    assert!(matches!(err, FudeError::EmptyCollection { code: 97 }));
    assert!(!pipeline.model_store().path(Stage::Initial, 97).exists());

    let report = pipeline.build_initial_models().unwrap();
    assert!(report.has_failures());
    assert!(report.succeeded.is_empty());
    assert_eq!(report.failed[0].0, 97);
}

#[test]
fn test_train_requires_initial_models() {
    let dir = TempDir::new().unwrap();
    let pipeline = extracted_pipeline(&dir);

    assert!(pipeline.train().is_err());
    let err = pipeline.train_character(DOWN).unwrap_err();
    assert!(matches!(err, FudeError::NoInitialModel { code: DOWN }));
    assert!(!pipeline.model_store().path(Stage::Trained, DOWN).exists());
}

#[test]
fn test_evaluate_requires_trained_models() {
    let dir = TempDir::new().unwrap();
    let pipeline = extracted_pipeline(&dir);
    pipeline.build_initial_models().unwrap();

    let err = pipeline.evaluate().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FudeError>(),
        Some(FudeError::NoTrainedModels)
    ));
}

#[test]
fn test_init_without_features_fails() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(config(dir.path())).unwrap();

    assert!(pipeline.build_initial_models().is_err());
    assert!(matches!(
        pipeline.init_character(DOWN).unwrap_err(),
        FudeError::NoTrainingData { code: DOWN }
    ));
}

fn corrupt(path: &Path) {
    assert!(path.exists(), "{} should exist", path.display());
    fs::write(path, "not a sequence set").unwrap();
}

#[test]
fn test_train_continues_past_failing_character() {
    let dir = TempDir::new().unwrap();
    let pipeline = extracted_pipeline(&dir);
    pipeline.build_initial_models().unwrap();
    corrupt(&pipeline.sequence_store().path(Partition::Train, DOWN));

    let report = pipeline.train().unwrap();

    assert!(report.has_failures());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, DOWN);
    assert_eq!(report.succeeded, vec![ACROSS, SLANT]);
    assert!(!pipeline.model_store().path(Stage::Trained, DOWN).exists());
    for code in [ACROSS, SLANT] {
        assert!(pipeline.model_store().path(Stage::Trained, code).exists());
    }
}

#[test]
fn test_evaluate_continues_past_failing_character() {
    let dir = TempDir::new().unwrap();
    let pipeline = extracted_pipeline(&dir);
    pipeline.build_initial_models().unwrap();
    pipeline.train().unwrap();
    corrupt(&pipeline.sequence_store().path(Partition::Eval, SLANT));

    let run = pipeline.evaluate().unwrap();

    assert_eq!(run.batch.failed.len(), 1);
    assert_eq!(run.batch.failed[0].0, SLANT);
    assert_eq!(run.batch.succeeded, vec![ACROSS, DOWN]);
    assert_eq!(run.report.counts.total, 4);
    assert!(run.report.samples.iter().all(|s| s.code != SLANT));
    assert_eq!(run.report.counts.match1(), 100.0);
}

#[test]
fn test_cli_reports_failure_through_exit_status() {
    let dir = TempDir::new().unwrap();
    let pipeline = extracted_pipeline(&dir);
    pipeline.build_initial_models().unwrap();
    corrupt(&pipeline.sequence_store().path(Partition::Train, ACROSS));

    let root = pipeline.config().root.to_str().unwrap().to_string();
    let cli = |command: &str| {
        Cli::try_parse_from([
            "fude",
            "--root",
            root.as_str(),
            "--sampling-rate",
            "1.0",
            "--states-per-stroke",
            "2",
            "--max-iterations",
            "50",
            command,
        ])
        .unwrap()
    };

    assert!(!run(cli("train")).unwrap());
    // the other characters were still trained, so evaluation itself succeeds
    assert!(run(cli("eval")).unwrap());
}
