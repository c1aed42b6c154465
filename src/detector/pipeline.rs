use anyhow::{Context, Result};
use opencv::core::Mat;
use opencv::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use thiserror::Error;

use crate::camera::OpenCvCamera;
use crate::classifier::ViolenceClassifier;
use crate::config::{CameraConfig, DetectorConfig};
use crate::detector::buffer::{ScoreWindow, SequenceBuffer};
use crate::detector::labeler::AlertLabel;
use crate::detector::queue;
use crate::pose::{keypoints_to_features, MultiPoseDetector, PersonDetection};
use crate::render::annotate;

/// 処理ループが1フレームごとに発行するイベント
///
/// score はシーケンスウィンドウが満杯になる前は None。
/// frame はラベル注釈済みのBGRフレーム。
pub struct DetectionEvent {
    pub label: AlertLabel,
    pub score: Option<f32>,
    pub people: Vec<PersonDetection>,
    pub frame: Mat,
}

/// 呼び出し側がセッション終了原因を区別するためのエラー
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("camera capture failed: {0:#}")]
    Camera(anyhow::Error),
    #[error("capture thread panicked")]
    CaptureThreadPanic,
}

/// カメラ1台分の暴力検知セッション
///
/// 姿勢検出器と分類器を所有する。バッファ類はインスタンス毎に独立で、
/// 複数セッションを並べても共有状態はない。
pub struct ViolenceDetector {
    pose: MultiPoseDetector,
    classifier: ViolenceClassifier,
    seq_buf: SequenceBuffer,
    score_win: ScoreWindow,
    max_people: usize,
    warning_th: f32,
    urgent_th: f32,
}

impl ViolenceDetector {
    pub fn new(
        pose: MultiPoseDetector,
        classifier: ViolenceClassifier,
        config: &DetectorConfig,
    ) -> Self {
        Self {
            pose,
            classifier,
            seq_buf: SequenceBuffer::new(config.seq_len),
            score_win: ScoreWindow::new(config.smoothing_window),
            max_people: config.max_people,
            warning_th: config.warning_threshold,
            urgent_th: config.urgent_threshold,
        }
    }

    /// 1フレーム分の 検出 → 特徴抽出 → バッファ → 推論 → 平滑化 → ラベル
    pub fn process_frame(&mut self, frame: &Mat) -> Result<(AlertLabel, Option<f32>, Vec<PersonDetection>)> {
        let width = frame.cols() as u32;
        let height = frame.rows() as u32;

        let people = self.pose.detect(frame)?;
        let features = keypoints_to_features(&people, self.max_people, (width, height));
        self.seq_buf.push(features);

        if !self.seq_buf.is_full() {
            return Ok((AlertLabel::Gathering, None, people));
        }

        let score = self.classifier.infer(&self.seq_buf.snapshot())?;
        self.score_win.push(score);
        let avg = self.score_win.mean();
        let label = AlertLabel::from_score(avg, self.warning_th, self.urgent_th);

        Ok((label, Some(avg), people))
    }

    /// キャプチャスレッドを起動し、停止フラグが立つかカメラが失敗するまで
    /// フレームを処理してイベントを emit に渡し続ける
    ///
    /// キュー容量は1。処理が追いつかない間に到着したフレームは捨てられる。
    /// カメラ読み取り失敗は PipelineError::Camera として呼び出し側に返る。
    pub fn run<F>(
        &mut self,
        camera_config: &CameraConfig,
        stop: Arc<AtomicBool>,
        mut emit: F,
    ) -> Result<()>
    where
        F: FnMut(DetectionEvent) -> Result<()>,
    {
        // カメラはスレッド起動前に開き、失敗を即座に呼び出し側へ返す
        let mut camera = OpenCvCamera::open_with_config(
            camera_config.index,
            Some(camera_config.width),
            Some(camera_config.height),
            Some(camera_config.fps),
        )
        .map_err(PipelineError::Camera)?;

        let (tx, rx) = queue::bounded::<Mat>(1);
        let capture_stop = Arc::clone(&stop);
        let capture = thread::spawn(move || -> Result<()> {
            while !capture_stop.load(Ordering::Relaxed) {
                let frame = camera.read_frame().context("camera read failed")?;
                // 満杯なら捨てる。ここでブロックしてはいけない
                tx.offer(frame);
            }
            Ok(())
        });

        let mut loop_result: Result<()> = Ok(());
        while let Ok(mut frame) = rx.recv() {
            if stop.load(Ordering::Relaxed) {
                break;
            }

            let (label, score, people) = match self.process_frame(&frame) {
                Ok(r) => r,
                Err(e) => {
                    loop_result = Err(e);
                    break;
                }
            };

            if let Err(e) = annotate::draw_status(&mut frame, label, score) {
                loop_result = Err(e);
                break;
            }

            if let Err(e) = emit(DetectionEvent {
                label,
                score,
                people,
                frame,
            }) {
                loop_result = Err(e);
                break;
            }
        }

        // 両ステージを確実に畳む。キャプチャスレッドは停止フラグを見て
        // 抜け、送信側が落ちることで受信側も解放される
        stop.store(true, Ordering::Relaxed);
        let capture_result = capture
            .join()
            .map_err(|_| PipelineError::CaptureThreadPanic)?;

        match capture_result {
            Err(e) if loop_result.is_ok() => Err(PipelineError::Camera(e).into()),
            _ => loop_result,
        }
    }
}
