use anyhow::{bail, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub pose: PoseConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// カメラデバイスインデックス
    #[serde(default)]
    pub index: i32,
    /// キャプチャ解像度（横）
    #[serde(default = "default_camera_width")]
    pub width: u32,
    /// キャプチャ解像度（縦）
    #[serde(default = "default_camera_height")]
    pub height: u32,
    /// キャプチャFPS
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
}

fn default_camera_width() -> u32 { 1280 }
fn default_camera_height() -> u32 { 720 }
fn default_camera_fps() -> u32 { 30 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_camera_width(),
            height: default_camera_height(),
            fps: default_camera_fps(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoseConfig {
    /// MoveNet MultiPose ONNXモデルのパス
    #[serde(default = "default_pose_model")]
    pub model_path: String,
}

fn default_pose_model() -> String { "models/movenet_multipose.onnx".to_string() }

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            model_path: default_pose_model(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// 分類器に渡すフレーム列の長さ
    #[serde(default = "default_seq_len")]
    pub seq_len: usize,
    /// 特徴ベクトルに含める最大人数
    #[serde(default = "default_max_people")]
    pub max_people: usize,
    /// スコア平滑化ウィンドウの長さ
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
    /// 警告ラベルの閾値
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f32,
    /// 緊急ラベルの閾値
    #[serde(default = "default_urgent_threshold")]
    pub urgent_threshold: f32,
}

fn default_seq_len() -> usize { 1 }
fn default_max_people() -> usize { 2 }
fn default_smoothing_window() -> usize { 5 }
fn default_warning_threshold() -> f32 { 0.55 }
fn default_urgent_threshold() -> f32 { 0.65 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            seq_len: default_seq_len(),
            max_people: default_max_people(),
            smoothing_window: default_smoothing_window(),
            warning_threshold: default_warning_threshold(),
            urgent_threshold: default_urgent_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    /// チェックポイントのパス（拡張子なし。.bin と .json が付与される）
    #[serde(default = "default_classifier_model")]
    pub model_path: String,
    /// 非暴力ラベルの画像ディレクトリ
    #[serde(default = "default_normal_dir")]
    pub normal_dir: String,
    /// 暴力ラベルの画像ディレクトリ
    #[serde(default = "default_violent_dir")]
    pub violent_dir: String,
    /// コールドトレーニングのエポック数
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    /// ミニバッチサイズ
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_classifier_model() -> String { "models/violence_transformer".to_string() }
fn default_normal_dir() -> String { "data/non_violence".to_string() }
fn default_violent_dir() -> String { "data/violence".to_string() }
fn default_epochs() -> usize { 10 }
fn default_batch_size() -> usize { 16 }

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: default_classifier_model(),
            normal_dir: default_normal_dir(),
            violent_dir: default_violent_dir(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    /// プレビューウィンドウを表示するか
    #[serde(default = "default_preview")]
    pub preview: bool,
    /// アラート時にスナップショットを保存するディレクトリ
    #[serde(default = "default_alert_dir")]
    pub alert_dir: String,
    /// スナップショットのJPEG品質
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: i32,
}

fn default_preview() -> bool { true }
fn default_alert_dir() -> String { "alerts".to_string() }
fn default_jpeg_quality() -> i32 { 80 }

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            preview: default_preview(),
            alert_dir: default_alert_dir(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// 設定ファイルが無ければデフォルト値で起動する
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(_) => {
                eprintln!(
                    "config {} not found, using defaults",
                    path.as_ref().display()
                );
                Config::default()
            }
        }
    }

    /// 起動時検証。実行中ではなく構築前に設定ミスを検出する。
    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;
        if d.seq_len == 0 {
            bail!("detector.seq_len must be positive");
        }
        if d.max_people == 0 {
            bail!("detector.max_people must be positive");
        }
        if d.smoothing_window == 0 {
            bail!("detector.smoothing_window must be positive");
        }
        if !(0.0..=1.0).contains(&d.warning_threshold) || !(0.0..=1.0).contains(&d.urgent_threshold) {
            bail!(
                "thresholds must be within [0, 1]: warning={}, urgent={}",
                d.warning_threshold,
                d.urgent_threshold
            );
        }
        if d.warning_threshold > d.urgent_threshold {
            bail!(
                "detector.warning_threshold ({}) must not exceed detector.urgent_threshold ({})",
                d.warning_threshold,
                d.urgent_threshold
            );
        }
        let c = &self.classifier;
        if c.epochs == 0 {
            bail!("classifier.epochs must be positive");
        }
        if c.batch_size == 0 {
            bail!("classifier.batch_size must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse_from_empty_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.detector.seq_len, 1);
        assert_eq!(config.detector.max_people, 2);
        assert_eq!(config.detector.smoothing_window, 5);
        assert_eq!(config.detector.warning_threshold, 0.55);
        assert_eq!(config.detector.urgent_threshold, 0.65);
        assert_eq!(config.classifier.normal_dir, "data/non_violence");
        assert_eq!(config.classifier.violent_dir, "data/violence");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section_override() {
        let config: Config = toml::from_str(
            "[detector]\nseq_len = 8\nmax_people = 4\n",
        )
        .unwrap();
        assert_eq!(config.detector.seq_len, 8);
        assert_eq!(config.detector.max_people, 4);
        // 他フィールドはデフォルトのまま
        assert_eq!(config.detector.smoothing_window, 5);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let config: Config = toml::from_str(
            "[detector]\nwarning_threshold = 0.8\nurgent_threshold = 0.6\n",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_lengths_rejected() {
        let config: Config = toml::from_str("[detector]\nseq_len = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[detector]\nsmoothing_window = 0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[detector]\nmax_people = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let config: Config = toml::from_str("[detector]\nurgent_threshold = 1.5\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_equal_thresholds_allowed() {
        let config: Config = toml::from_str(
            "[detector]\nwarning_threshold = 0.6\nurgent_threshold = 0.6\n",
        )
        .unwrap();
        assert!(config.validate().is_ok());
    }
}
