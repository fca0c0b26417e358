use std::fs;

use strapdown::data::{IntegratedDelta, LastSample, load_dataset};
use strapdown::trainer::{LinearRegressor, ResumeRequest, StopReason};
use strapdown::{
    CheckpointNaming, DatasetStore, Pipeline, PipelineConfig, Recording, RunError, RunManager,
    RunState, SplitConfig, TimeSeries, TrainConfig, TrainingSession, WindowConfig,
};

/// 1000 IMU samples at 100 Hz (6 channels) and 20 Hz ground truth holding
/// position and a constant 1.5 m/s velocity.
fn recording() -> Recording {
    let imu_ts: Vec<f64> = (0..1000).map(|i| i as f64 / 100.0).collect();
    let imu_rows: Vec<Vec<f64>> = (0..1000)
        .map(|i| (0..6).map(|c| ((i + 10 * c) as f64 * 0.05).sin()).collect())
        .collect();
    let gt_ts: Vec<f64> = (0..=200).map(|i| i as f64 / 20.0).collect();
    let gt_rows: Vec<Vec<f64>> = gt_ts.iter().map(|&t| vec![1.5 * t, 1.5]).collect();
    Recording::new(
        TimeSeries::from_rows(imu_ts, &imu_rows).unwrap(),
        TimeSeries::from_rows(gt_ts, &gt_rows).unwrap(),
    )
}

#[test]
fn prepare_split_and_reload() {
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        PipelineConfig::new(WindowConfig::new(200)),
        6,
        Box::new(IntegratedDelta::new(vec![7])),
    );
    let store = DatasetStore::new(tmp.path(), "walk");

    let parts = store
        .load_or_build(false, &SplitConfig::new(0.2), || pipeline.prepare(&recording()))
        .unwrap();
    assert_eq!(parts.train.len(), 4);
    assert_eq!(parts.test.len(), 1);

    let train = load_dataset(&store.train_path).unwrap();
    assert_eq!(train.x_shape(), [4, 200, 6]);
    assert_eq!(train, parts.train);

    // A second build is served from the cache without calling the builder.
    let cached = store
        .load_or_build(false, &SplitConfig::new(0.2), || panic!("cache miss"))
        .unwrap();
    assert_eq!(cached, parts);
}

#[test]
fn train_resume_and_evaluate() {
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        PipelineConfig::new(WindowConfig::new(50)),
        6,
        Box::new(LastSample::new(vec![6])),
    );
    let store = DatasetStore::new(tmp.path().join("data"), "walk");
    let data = store
        .load_or_build(false, &SplitConfig::new(0.25), || pipeline.prepare(&recording()))
        .unwrap();
    assert_eq!(data.train.len() + data.test.len(), 20);

    let root = tmp.path().join("checkpoints");
    let config = TrainConfig::new("modelA")
        .with_checkpoint_root(&root)
        .with_max_epochs(3)
        .with_batch_size(4)
        .with_patience(100);

    let model = LinearRegressor::for_dataset(&data.train, 1e-2).unwrap();
    let mut session = TrainingSession::new(config.clone(), model).unwrap();
    let outcome = session.run(&data).unwrap();
    assert_eq!(outcome.version, 0);
    assert_eq!(outcome.last_epoch, 3);
    assert_eq!(outcome.reason, StopReason::EpochBudget);
    assert!(outcome.evaluation.is_some());

    let model = LinearRegressor::for_dataset(&data.train, 1e-2).unwrap();
    let mut resumed = TrainingSession::new(config.with_resume(0, None), model).unwrap();
    let outcome = resumed.run(&data).unwrap();
    assert_eq!(outcome.start_epoch, 3);
    assert_eq!(outcome.last_epoch, 6);

    let run_dir = root.join("modelA_0");
    let checkpoints: Vec<String> = {
        let mut names: Vec<String> = fs::read_dir(&run_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".safetensors"))
            .collect();
        names.sort();
        names
    };
    assert_eq!(
        checkpoints,
        (1..=6).map(|e| format!("modelA_{e:02}.safetensors")).collect::<Vec<_>>()
    );
    assert!(run_dir.join("run.json").exists());
    assert!(run_dir.join("evaluation.json").exists());
}

#[test]
fn resume_from_empty_version_is_recoverable() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("modelA_3")).unwrap();

    let mut manager = RunManager::new(tmp.path(), "modelA", CheckpointNaming::default());
    assert!(matches!(
        manager.resume(3, None),
        Err(RunError::CheckpointNotFound { .. })
    ));
    assert_eq!(manager.state(), &RunState::NoRun);

    manager.start_or_resume(Some(ResumeRequest::latest(3))).unwrap();
    assert_eq!(manager.state(), &RunState::Fresh { version: 4 });
}
