use anyhow::Result;
use opencv::core::{Mat, Point, Scalar, Vector};
use opencv::{imgcodecs, imgproc};

use crate::detector::labeler::AlertLabel;

/// フレーム左上に重ねるステータス文字列
pub fn status_text(label: AlertLabel, score: Option<f32>) -> String {
    match (label, score) {
        (AlertLabel::Gathering, _) => "Gathering...".to_string(),
        (AlertLabel::Normal, Some(avg)) => format!("Normal ({:.2})", avg),
        (AlertLabel::Warning, Some(avg)) => format!("Warning ({:.2})", avg),
        (AlertLabel::Urgent, Some(avg)) => format!("URGENT VIOLENCE ({:.2})", avg),
        // スコアなしでGathering以外になることはないが、落とさず表示する
        (label, None) => label.as_str().to_string(),
    }
}

/// ラベルごとの描画色 (BGR)
pub fn label_color(label: AlertLabel) -> Scalar {
    match label {
        AlertLabel::Gathering => Scalar::new(0.0, 255.0, 255.0, 0.0), // 黄
        AlertLabel::Normal => Scalar::new(0.0, 255.0, 0.0, 0.0),      // 緑
        AlertLabel::Warning => Scalar::new(0.0, 165.0, 255.0, 0.0),   // 橙
        AlertLabel::Urgent => Scalar::new(0.0, 0.0, 255.0, 0.0),      // 赤
    }
}

/// ステータスラベルをフレームに描画する
///
/// 黒の縁取りを先に太めに描いて視認性を確保する。
pub fn draw_status(frame: &mut Mat, label: AlertLabel, score: Option<f32>) -> Result<()> {
    let text = status_text(label, score);
    let origin = Point::new(10, 30);

    imgproc::put_text(
        frame,
        &text,
        origin,
        imgproc::FONT_HERSHEY_SIMPLEX,
        1.0,
        Scalar::new(0.0, 0.0, 0.0, 0.0),
        4,
        imgproc::LINE_8,
        false,
    )?;
    imgproc::put_text(
        frame,
        &text,
        origin,
        imgproc::FONT_HERSHEY_SIMPLEX,
        1.0,
        label_color(label),
        2,
        imgproc::LINE_8,
        false,
    )?;

    Ok(())
}

/// フレームをJPEGにエンコードする
///
/// MJPEGなどの外部トランスポートに渡すための形式。フレーミング自体は
/// 呼び出し側の責務。
pub fn encode_jpeg(frame: &Mat, quality: i32) -> Result<Vec<u8>> {
    let params = Vector::from_iter([imgcodecs::IMWRITE_JPEG_QUALITY, quality]);
    let mut buf: Vector<u8> = Vector::new();
    imgcodecs::imencode(".jpg", frame, &mut buf, &params)?;
    Ok(buf.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_formats() {
        assert_eq!(status_text(AlertLabel::Gathering, None), "Gathering...");
        assert_eq!(
            status_text(AlertLabel::Normal, Some(0.123)),
            "Normal (0.12)"
        );
        assert_eq!(
            status_text(AlertLabel::Warning, Some(0.6)),
            "Warning (0.60)"
        );
        assert_eq!(
            status_text(AlertLabel::Urgent, Some(0.789)),
            "URGENT VIOLENCE (0.79)"
        );
    }

    #[test]
    fn test_label_colors_distinct() {
        let colors = [
            label_color(AlertLabel::Gathering),
            label_color(AlertLabel::Normal),
            label_color(AlertLabel::Warning),
            label_color(AlertLabel::Urgent),
        ];
        for i in 0..colors.len() {
            for j in (i + 1)..colors.len() {
                assert_ne!(colors[i], colors[j]);
            }
        }
    }
}
