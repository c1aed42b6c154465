use anyhow::{Context, Result};
use opencv::core::Mat;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

use super::keypoint::{Keypoint, KeypointIndex, Pose};
use super::preprocess::preprocess_for_multipose;

/// モデルが一度に返す検出スロット数
pub const MAX_DETECTIONS: usize = 6;

/// 人物インスタンスとして採用する信頼度閾値
const PERSON_SCORE_THRESHOLD: f32 = 0.25;

/// 検出された一人分の姿勢とインスタンススコア
#[derive(Debug, Clone)]
pub struct PersonDetection {
    pub pose: Pose,
    pub score: f32,
}

/// MoveNet MultiPose を使用した複数人姿勢検出器
pub struct MultiPoseDetector {
    session: Session,
}

impl MultiPoseDetector {
    /// ONNXモデルを読み込んで初期化
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path.as_ref())
            .context("Failed to load MultiPose ONNX model")?;

        Ok(Self { session })
    }

    /// フレームから複数人の姿勢を検出
    ///
    /// 出力はモデルの検出順のまま返す。信頼度順に並べ替えない。
    /// max_people を超えたときにどの人物が残るかは検出順で決まる。
    pub fn detect(&mut self, frame: &Mat) -> Result<Vec<PersonDetection>> {
        let input = preprocess_for_multipose(frame)?;
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs!["input" => input_tensor])
            .context("MultiPose inference failed")?;

        // 出力は [1, 6, 56]
        // 行ごとに 17 x (y, x, score) + bbox(ymin, xmin, ymax, xmax) + インスタンススコア
        let output: ndarray::ArrayViewD<f32> = outputs["output_0"]
            .try_extract_array()
            .context("Failed to extract MultiPose output tensor")?;

        let mut people = Vec::new();
        for p in 0..MAX_DETECTIONS {
            let instance_score = output[[0, p, 55]];
            if instance_score < PERSON_SCORE_THRESHOLD {
                continue;
            }

            let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
            for i in 0..KeypointIndex::COUNT {
                let y = output[[0, p, i * 3]];
                let x = output[[0, p, i * 3 + 1]];
                let confidence = output[[0, p, i * 3 + 2]];
                keypoints[i] = Keypoint::new(x, y, confidence);
            }

            people.push(PersonDetection {
                pose: Pose::new(keypoints),
                score: instance_score,
            });
        }

        Ok(people)
    }
}
