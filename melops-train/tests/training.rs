//! End-to-end training runs against the label-prior backend.

use hound::{SampleFormat, WavSpec, WavWriter};
use melops_train::audio::{SAMPLE_RATE, Spectrogram};
use melops_train::baseline::LabelPrior;
use melops_train::batch::{Batcher, DEFAULT_MAX_FRAMES};
use melops_train::checkpoint::ArchiveCheckpoint;
use melops_train::curriculum::CurriculumPlan;
use melops_train::error::{Error, ShapeError};
use melops_train::manifest::Manifest;
use melops_train::model::{NetworkConfig, OptimizerConfig, TrainingContext};
use melops_train::progress::ConsoleReporter;
use melops_train::source::ExampleSource;
use melops_train::trainer::{Trainer, TrainerState};
use melops_train::vocabulary::{CharVocabulary, Vocabulary};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_wav(path: &Path, duration: f32) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let samples = (duration * SAMPLE_RATE as f32).round() as usize;

    let mut writer = WavWriter::create(path, spec).unwrap();
    for i in 0..samples {
        // Deterministic noise so every clip has non-trivial spectra
        let x = ((i as u32).wrapping_mul(2_654_435_761) >> 16) as i16;
        writer.write_sample(x / 8).unwrap();
    }
    writer.finalize().unwrap();
}

/// Corpus under `dir/name/` with one wav per (duration, transcript).
fn corpus(dir: &Path, name: &str, entries: &[(f32, &str)]) -> PathBuf {
    let root = dir.join(name);
    std::fs::create_dir_all(root.join("audio")).unwrap();

    let lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, (duration, transcript))| {
            write_wav(&root.join(format!("audio/{i}.wav")), *duration);
            format!(
                r#"{{"audio_filepath": "audio/{i}.wav", "text": "{transcript}", "duration": {duration}}}"#
            )
        })
        .collect();

    let manifest = root.join("manifest.jsonl");
    std::fs::write(&manifest, lines.join("\n")).unwrap();
    manifest
}

fn network(channels: usize, vocabulary: &dyn Vocabulary) -> NetworkConfig {
    NetworkConfig {
        feature_channels: channels,
        vocab_size: vocabulary.size(),
        num_conv_layers: 2,
        num_rnn_layers: 3,
        rnn_layer_size: 512,
    }
}

struct Run {
    _dir: TempDir,
    checkpoint: PathBuf,
    output: String,
    result: melops_train::error::Result<melops_train::trainer::TrainingSummary>,
    state: TrainerState,
}

fn train(
    train_entries: &[(f32, &str)],
    dev_entries: &[(f32, &str)],
    batch_size: usize,
    max_frames: usize,
    plan: CurriculumPlan,
) -> Run {
    let dir = tempfile::tempdir().unwrap();
    let vocabulary = CharVocabulary::english();
    let context = TrainingContext::new(false, 1).unwrap();

    let train_manifest = corpus(dir.path(), "train", train_entries);
    let dev_manifest = corpus(dir.path(), "dev", dev_entries);
    let train = ExampleSource::open(&train_manifest, &vocabulary, Spectrogram::default()).unwrap();
    let dev = ExampleSource::open(&dev_manifest, &vocabulary, Spectrogram::default()).unwrap();

    let batcher = Batcher::new(batch_size, train.channels(), max_frames).unwrap();
    let optimizer = OptimizerConfig {
        learning_rate: 0.5,
        ..Default::default()
    };
    let model = LabelPrior::new(&context, network(train.channels(), &vocabulary), optimizer);

    let checkpoint = dir.path().join("out/params.tar.gz");
    let mut sink = ArchiveCheckpoint::new(&checkpoint);
    let mut reporter = ConsoleReporter::new(Vec::new(), 2);

    let mut trainer = Trainer::new(&context, model, batcher, train, dev);
    let result = trainer.run(&plan, &mut reporter, &mut sink);

    Run {
        checkpoint,
        output: String::from_utf8(reporter.into_inner()).unwrap(),
        result,
        state: trainer.state(),
        _dir: dir,
    }
}

#[test]
fn sortagrad_pass_trains_and_checkpoints() {
    let run = train(
        &[
            (2.0, "two"),
            (0.5, "half"),
            (3.1, "three"),
            (1.0, "one"),
            (0.5, "half"),
        ],
        &[(0.4, "dev"), (0.6, "dev set")],
        2,
        DEFAULT_MAX_FRAMES,
        CurriculumPlan::new(true, 1).unwrap(),
    );

    let summary = run.result.unwrap();
    assert_eq!(summary.passes, 1);
    assert_eq!(summary.steps, 3);
    assert!(summary.last_test_cost.is_some_and(f32::is_finite));
    assert_eq!(run.state, TrainerState::Done);

    let (metadata, parameters) = ArchiveCheckpoint::read(&run.checkpoint).unwrap();
    assert_eq!(metadata.pass, 0);
    assert_eq!(parameters[0].name, LabelPrior::PARAMETER_NAME);
    assert_eq!(parameters[0].shape, [28]);

    assert!(run.output.contains("Pass: 0, Batch: 0, TrainCost: "));
    assert!(run.output.contains("Pass: 0, Batch: 2, TrainCost: "));
    assert!(run.output.contains("Pass: 0, TestCost: "));
}

#[test]
fn later_passes_overwrite_checkpoint_and_lower_cost() {
    let entries = [(0.3, "aaa"), (0.2, "aab"), (0.1, "aa"), (0.2, "ab")];

    let one = train(
        &entries,
        &entries,
        2,
        DEFAULT_MAX_FRAMES,
        CurriculumPlan::new(true, 1).unwrap(),
    );
    let four = train(
        &entries,
        &entries,
        2,
        DEFAULT_MAX_FRAMES,
        CurriculumPlan::new(true, 4).unwrap(),
    );

    let one = one.result.unwrap().last_test_cost.unwrap();
    let summary = four.result.unwrap();
    assert_eq!(summary.passes, 4);
    assert!(summary.last_test_cost.unwrap() < one);

    let (metadata, _) = ArchiveCheckpoint::read(&four.checkpoint).unwrap();
    assert_eq!(metadata.pass, 3);
    assert_eq!(four.output.matches("TestCost").count(), 4);
}

#[test]
fn overlong_utterance_fails_the_run() {
    // 1s of audio is 99 frames
    let run = train(
        &[(0.2, "short"), (1.0, "too long")],
        &[(0.2, "dev")],
        1,
        50,
        CurriculumPlan::new(true, 1).unwrap(),
    );

    assert!(matches!(
        run.result,
        Err(Error::Shape(ShapeError::Overflow {
            frames: 99,
            ceiling: 50,
            ..
        }))
    ));
    assert!(!run.checkpoint.exists());
}

#[test]
fn malformed_manifest_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let entries: Vec<(f32, &str)> = (0..10).map(|i| (0.1 + i as f32 * 0.01, "clip")).collect();
    let manifest = corpus(dir.path(), "train", &entries);

    let mut lines: Vec<String> = std::fs::read_to_string(&manifest)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    lines[4] = r#"{"audio_filepath": "audio/4.wav", "text": "#.to_string();
    std::fs::write(&manifest, lines.join("\n")).unwrap();

    let manifest = Manifest::load(&manifest, &CharVocabulary::english()).unwrap();

    assert_eq!(manifest.len(), 9);
    assert_eq!(manifest.skipped(), 1);
}

#[test]
fn missing_manifest_is_fatal() {
    let result = ExampleSource::open(
        "/nonexistent/libri.manifest.train",
        &CharVocabulary::english(),
        Spectrogram::default(),
    );

    assert!(matches!(result, Err(Error::Manifest(_))));
}
