//! Explicit cold-training entry point: builds the labeled dataset from the
//! configured image directories, trains the sequence classifier and persists
//! the checkpoint. Refuses to run when a checkpoint already exists, since the
//! pipeline never retrains over an existing model.

use anyhow::{bail, Context, Result};

use mimamori::classifier::ViolenceClassifier;
use mimamori::config::Config;
use mimamori::pose::MultiPoseDetector;

const CONFIG_PATH: &str = "config.toml";

fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH);
    config.validate().context("invalid configuration")?;

    let checkpoint = format!("{}.bin", config.classifier.model_path);
    if std::path::Path::new(&checkpoint).exists() {
        bail!(
            "checkpoint {} already exists; remove it first to retrain",
            checkpoint
        );
    }

    println!("=== Cold training ===");
    println!("normal dir : {}", config.classifier.normal_dir);
    println!("violent dir: {}", config.classifier.violent_dir);
    println!(
        "seq_len={} max_people={} epochs={} batch_size={}",
        config.detector.seq_len,
        config.detector.max_people,
        config.classifier.epochs,
        config.classifier.batch_size
    );

    let mut pose = MultiPoseDetector::new(&config.pose.model_path)
        .with_context(|| format!("failed to load pose model {}", config.pose.model_path))?;

    // チェックポイントが無いことは確認済みなので、ここで必ず学習が走る
    let classifier =
        ViolenceClassifier::train_or_load(&mut pose, &config.classifier, &config.detector)?;

    println!(
        "done: checkpoint saved to {} (feature_dim={})",
        checkpoint,
        classifier.feature_dim()
    );
    Ok(())
}
