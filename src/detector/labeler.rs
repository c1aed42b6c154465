use serde::Serialize;

/// 平滑化スコアから導かれる警戒ラベル
///
/// Gathering はシーケンスウィンドウが一度も満杯になっていない間だけ
/// パイプラインが返す。満杯後は二度と Gathering に戻らない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLabel {
    Gathering,
    Normal,
    Warning,
    Urgent,
}

impl AlertLabel {
    /// 平滑化スコアをラベルに写像する
    ///
    /// warning_th <= urgent_th は設定検証で保証されている前提。
    pub fn from_score(avg: f32, warning_th: f32, urgent_th: f32) -> Self {
        if avg >= urgent_th {
            AlertLabel::Urgent
        } else if avg >= warning_th {
            AlertLabel::Warning
        } else {
            AlertLabel::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLabel::Gathering => "gathering",
            AlertLabel::Normal => "normal",
            AlertLabel::Warning => "warning",
            AlertLabel::Urgent => "urgent",
        }
    }

    /// 警告以上か（アラート記録の対象になるか）
    pub fn is_alert(&self) -> bool {
        matches!(self, AlertLabel::Warning | AlertLabel::Urgent)
    }
}
