use anyhow::{Context, Result};
use opencv::imgcodecs;
use opencv::prelude::*;
use std::path::Path;

use crate::pose::{feature_dim, keypoints_to_features, MultiPoseDetector};

/// コールドトレーニング用に組み立てたデータセット
///
/// sequences の各要素は seq_len * feature_dim にフラット化した1シーケンス。
pub struct LabeledSequences {
    pub sequences: Vec<Vec<f32>>,
    pub labels: Vec<f32>,
    pub seq_len: usize,
    pub feature_dim: usize,
    /// 読めずにスキップした画像数
    pub skipped: usize,
    /// seq_len で割り切れず捨てたフレーム数
    pub dropped: usize,
}

/// ラベル付きディレクトリ2つから学習データを組み立てる
///
/// normal_dir がラベル 0、violent_dir がラベル 1。読めない画像はスキップ。
/// クラスごとに連続する特徴ベクトルを seq_len 個ずつ束ねるので、
/// クラス境界をまたいだシーケンスは作られない。
pub fn load_labeled_dirs(
    pose: &mut MultiPoseDetector,
    normal_dir: &str,
    violent_dir: &str,
    seq_len: usize,
    max_people: usize,
) -> Result<LabeledSequences> {
    let dim = feature_dim(max_people);
    let mut sequences = Vec::new();
    let mut labels = Vec::new();
    let mut skipped = 0;
    let mut dropped = 0;

    for (dir, label) in [(normal_dir, 0.0f32), (violent_dir, 1.0f32)] {
        let features = extract_dir(pose, dir, max_people, &mut skipped)?;
        let (chunks, rest) = chunk_sequences(features, seq_len, dim);
        dropped += rest;
        labels.extend(std::iter::repeat(label).take(chunks.len()));
        sequences.extend(chunks);
    }

    Ok(LabeledSequences {
        sequences,
        labels,
        seq_len,
        feature_dim: dim,
        skipped,
        dropped,
    })
}

/// 1ディレクトリ分の画像から特徴ベクトルを抽出する
fn extract_dir(
    pose: &mut MultiPoseDetector,
    dir: &str,
    max_people: usize,
    skipped: &mut usize,
) -> Result<Vec<Vec<f32>>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read training directory {}", dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    // read_dir の順序は不定なので決定的になるようソートする
    paths.sort();

    let mut features = Vec::new();
    for path in paths {
        match read_image(&path) {
            Some(img) => {
                let width = img.cols() as u32;
                let height = img.rows() as u32;
                let people = pose.detect(&img)?;
                features.push(keypoints_to_features(&people, max_people, (width, height)));
            }
            None => {
                *skipped += 1;
            }
        }
    }
    Ok(features)
}

fn read_image(path: &Path) -> Option<Mat> {
    let path_str = path.to_str()?;
    let img = imgcodecs::imread(path_str, imgcodecs::IMREAD_COLOR).ok()?;
    if img.empty() {
        return None;
    }
    Some(img)
}

/// フレーム特徴の列を seq_len 個ずつのシーケンスにフラット化する
///
/// 端数フレームは捨て、その数を返す。
pub fn chunk_sequences(
    features: Vec<Vec<f32>>,
    seq_len: usize,
    feature_dim: usize,
) -> (Vec<Vec<f32>>, usize) {
    let mut sequences = Vec::with_capacity(features.len() / seq_len);
    let dropped = features.len() % seq_len;

    for group in features.chunks_exact(seq_len) {
        let mut flat = Vec::with_capacity(seq_len * feature_dim);
        for f in group {
            flat.extend_from_slice(f);
        }
        sequences.push(flat);
    }

    (sequences, dropped)
}
