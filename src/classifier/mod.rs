pub mod dataset;
pub mod model;

use anyhow::{bail, Context, Result};
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::module::{AutodiffModule, Module};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{ClassifierConfig, DetectorConfig};
use crate::pose::{feature_dim, MultiPoseDetector};
use model::{SequenceClassifier, SequenceClassifierConfig};

type InferenceBackend = NdArray;
type TrainingBackend = Autodiff<NdArray>;

const LEARNING_RATE: f64 = 1e-3;

/// チェックポイントと一緒に保存する次元情報
///
/// 読み込み時に設定と照合し、形状不一致を推論時ではなく起動時に検出する。
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointMeta {
    pub seq_len: usize,
    pub max_people: usize,
    pub feature_dim: usize,
}

/// 学習済みシーケンス分類器
///
/// train_or_load が唯一のコンストラクタ。値が存在する時点でモデルは
/// ロード済みであり、推論中に重みが変わることはない。
pub struct ViolenceClassifier {
    model: SequenceClassifier<InferenceBackend>,
    seq_len: usize,
    feature_dim: usize,
    device: NdArrayDevice,
}

impl ViolenceClassifier {
    /// チェックポイントがあればロード、無ければラベル付きディレクトリから
    /// 一度だけ学習して保存する
    ///
    /// ロード経路では学習データディレクトリに一切触れない。存在するのに
    /// 壊れているチェックポイントはエラーであり、再学習にフォールバック
    /// しない。
    pub fn train_or_load(
        pose: &mut MultiPoseDetector,
        classifier_config: &ClassifierConfig,
        detector_config: &DetectorConfig,
    ) -> Result<Self> {
        let seq_len = detector_config.seq_len;
        let max_people = detector_config.max_people;
        let dim = feature_dim(max_people);

        if checkpoint_file(&classifier_config.model_path).exists() {
            return Self::load(&classifier_config.model_path, seq_len, max_people, dim);
        }

        eprintln!(
            "[classifier] no checkpoint at {} -> training from {} / {}",
            classifier_config.model_path,
            classifier_config.normal_dir,
            classifier_config.violent_dir
        );
        Self::train(pose, classifier_config, seq_len, max_people, dim)
    }

    fn load(model_path: &str, seq_len: usize, max_people: usize, dim: usize) -> Result<Self> {
        let meta = read_meta(model_path).with_context(|| {
            format!(
                "checkpoint {} exists but its metadata sidecar is missing or unreadable",
                checkpoint_file(model_path).display()
            )
        })?;

        let expected = CheckpointMeta {
            seq_len,
            max_people,
            feature_dim: dim,
        };
        if meta != expected {
            bail!(
                "checkpoint {} was trained with seq_len={} max_people={} feature_dim={} \
                 but the configuration expects seq_len={} max_people={} feature_dim={}; \
                 delete the checkpoint to retrain or fix the configuration",
                checkpoint_file(model_path).display(),
                meta.seq_len,
                meta.max_people,
                meta.feature_dim,
                expected.seq_len,
                expected.max_people,
                expected.feature_dim,
            );
        }

        eprintln!("[classifier] loading checkpoint {}", checkpoint_file(model_path).display());
        let device = NdArrayDevice::default();
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let model = SequenceClassifierConfig::new(seq_len, dim)
            .init::<InferenceBackend>(&device)
            .load_file(PathBuf::from(model_path), &recorder, &device)
            .context("failed to load classifier checkpoint")?;

        Ok(Self {
            model,
            seq_len,
            feature_dim: dim,
            device,
        })
    }

    fn train(
        pose: &mut MultiPoseDetector,
        config: &ClassifierConfig,
        seq_len: usize,
        max_people: usize,
        dim: usize,
    ) -> Result<Self> {
        let data = dataset::load_labeled_dirs(
            pose,
            &config.normal_dir,
            &config.violent_dir,
            seq_len,
            max_people,
        )?;
        if data.sequences.is_empty() {
            bail!(
                "no usable training sequences found in {} / {}",
                config.normal_dir,
                config.violent_dir
            );
        }
        eprintln!(
            "[classifier] dataset: {} sequences ({} images skipped, {} frames dropped)",
            data.sequences.len(),
            data.skipped,
            data.dropped
        );

        let device = NdArrayDevice::default();
        let model_config = SequenceClassifierConfig::new(seq_len, dim);
        let mut model = model_config.init::<TrainingBackend>(&device);
        let mut optim = AdamConfig::new().init();
        let mut rng = rand::thread_rng();
        let mut indices: Vec<usize> = (0..data.sequences.len()).collect();

        for epoch in 1..=config.epochs {
            indices.shuffle(&mut rng);
            let mut epoch_loss = 0.0f32;
            let mut batches = 0usize;

            for batch in indices.chunks(config.batch_size) {
                let bs = batch.len();
                let mut xs = Vec::with_capacity(bs * seq_len * dim);
                let mut ys = Vec::with_capacity(bs);
                for &i in batch {
                    xs.extend_from_slice(&data.sequences[i]);
                    ys.push(data.labels[i]);
                }

                let x = Tensor::<TrainingBackend, 3>::from_data(
                    TensorData::new(xs, [bs, seq_len, dim]),
                    &device,
                );
                let y = Tensor::<TrainingBackend, 2>::from_data(
                    TensorData::new(ys, [bs, 1]),
                    &device,
                );

                let prediction = model.forward(x);
                let loss = binary_cross_entropy(prediction, y);
                epoch_loss += loss.clone().into_scalar();
                batches += 1;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(LEARNING_RATE, model, grads);
            }

            eprintln!(
                "[classifier] epoch {}/{}: loss={:.4}",
                epoch,
                config.epochs,
                epoch_loss / batches as f32
            );
        }

        write_checkpoint(&model, &config.model_path, seq_len, max_people, dim)?;
        eprintln!(
            "[classifier] trained model saved to {}",
            checkpoint_file(&config.model_path).display()
        );

        Ok(Self {
            model: model.valid(),
            seq_len,
            feature_dim: dim,
            device,
        })
    }

    /// 満杯のシーケンスウィンドウに対する純推論
    pub fn infer(&self, window: &[Vec<f32>]) -> Result<f32> {
        if window.len() != self.seq_len {
            bail!(
                "sequence window length {} does not match model seq_len {}",
                window.len(),
                self.seq_len
            );
        }

        let mut xs = Vec::with_capacity(self.seq_len * self.feature_dim);
        for step in window {
            if step.len() != self.feature_dim {
                bail!(
                    "feature vector length {} does not match model feature_dim {}",
                    step.len(),
                    self.feature_dim
                );
            }
            xs.extend_from_slice(step);
        }

        let x = Tensor::<InferenceBackend, 3>::from_data(
            TensorData::new(xs, [1, self.seq_len, self.feature_dim]),
            &self.device,
        );
        Ok(self.model.forward(x).into_scalar())
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }
}

/// BinFileRecorder が付与する拡張子込みのチェックポイントパス
fn checkpoint_file(model_path: &str) -> PathBuf {
    PathBuf::from(format!("{}.bin", model_path))
}

fn meta_file(model_path: &str) -> PathBuf {
    PathBuf::from(format!("{}.json", model_path))
}

fn read_meta(model_path: &str) -> Result<CheckpointMeta> {
    let content = std::fs::read_to_string(meta_file(model_path))?;
    Ok(serde_json::from_str(&content)?)
}

fn write_checkpoint<B: Backend>(
    model: &SequenceClassifier<B>,
    model_path: &str,
    seq_len: usize,
    max_people: usize,
    dim: usize,
) -> Result<()> {
    if let Some(parent) = Path::new(model_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(PathBuf::from(model_path), &recorder)
        .context("failed to save classifier checkpoint")?;

    let meta = CheckpointMeta {
        seq_len,
        max_people,
        feature_dim: dim,
    };
    std::fs::write(meta_file(model_path), serde_json::to_string_pretty(&meta)?)?;
    Ok(())
}

/// 2値交差エントロピー。prediction は sigmoid 済みの [batch, 1]。
fn binary_cross_entropy<B: Backend>(
    prediction: Tensor<B, 2>,
    target: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let eps = 1e-7;
    let p = prediction.clamp(eps, 1.0 - eps);
    let loss = target.clone() * p.clone().log() + (target.neg() + 1.0) * (p.neg() + 1.0).log();
    loss.mean().neg()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_paths() {
        assert_eq!(
            checkpoint_file("models/violence_transformer"),
            PathBuf::from("models/violence_transformer.bin")
        );
        assert_eq!(
            meta_file("models/violence_transformer"),
            PathBuf::from("models/violence_transformer.json")
        );
    }

    #[test]
    fn test_meta_roundtrip() {
        let meta = CheckpointMeta {
            seq_len: 4,
            max_people: 2,
            feature_dim: 68,
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: CheckpointMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }

    #[test]
    fn test_binary_cross_entropy_perfect_prediction_near_zero() {
        let device = NdArrayDevice::default();
        let p = Tensor::<InferenceBackend, 2>::from_data(
            TensorData::new(vec![0.9999f32, 0.0001], [2, 1]),
            &device,
        );
        let y = Tensor::<InferenceBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 0.0], [2, 1]),
            &device,
        );
        let loss: f32 = binary_cross_entropy(p, y).into_scalar();
        assert!(loss >= 0.0);
        assert!(loss < 0.01, "loss too high: {}", loss);
    }

    #[test]
    fn test_binary_cross_entropy_wrong_prediction_is_large() {
        let device = NdArrayDevice::default();
        let p = Tensor::<InferenceBackend, 2>::from_data(
            TensorData::new(vec![0.01f32], [1, 1]),
            &device,
        );
        let y = Tensor::<InferenceBackend, 2>::from_data(
            TensorData::new(vec![1.0f32], [1, 1]),
            &device,
        );
        let loss: f32 = binary_cross_entropy(p, y).into_scalar();
        assert!(loss > 1.0, "loss unexpectedly small: {}", loss);
    }
}
