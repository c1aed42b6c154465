use anyhow::{Context, Result};
use opencv::prelude::*;
use std::time::Instant;

use mimamori::camera::OpenCvCamera;
use mimamori::classifier::ViolenceClassifier;
use mimamori::config::Config;
use mimamori::pose::{feature_dim, keypoints_to_features, MultiPoseDetector};

/// 姿勢検出と分類器推論のレイテンシを実カメラで計測する
fn main() -> Result<()> {
    let config = Config::load_or_default("config.toml");
    config.validate().context("invalid configuration")?;

    let mut camera = OpenCvCamera::open_with_config(config.camera.index, Some(640), Some(480), None)?;
    let mut pose = MultiPoseDetector::new(&config.pose.model_path)?;
    let classifier =
        ViolenceClassifier::train_or_load(&mut pose, &config.classifier, &config.detector)?;

    let iterations = 100;

    // 姿勢検出 + 特徴抽出
    let start = Instant::now();
    let mut last_features = vec![0.0; feature_dim(config.detector.max_people)];
    for _ in 0..iterations {
        let frame = camera.read_frame()?;
        let people = pose.detect(&frame)?;
        last_features = keypoints_to_features(
            &people,
            config.detector.max_people,
            (frame.cols() as u32, frame.rows() as u32),
        );
    }
    let pose_ms = start.elapsed().as_millis() as f64 / iterations as f64;
    println!("Pose extraction: {:.2}ms/frame = {:.1} FPS", pose_ms, 1000.0 / pose_ms);

    // 分類器推論（直近の特徴でウィンドウを埋める）
    let window = vec![last_features; config.detector.seq_len];
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = classifier.infer(&window)?;
    }
    let infer_ms = start.elapsed().as_millis() as f64 / iterations as f64;
    println!("Classifier inference: {:.2}ms/window = {:.1} FPS", infer_ms, 1000.0 / infer_ms);

    Ok(())
}
