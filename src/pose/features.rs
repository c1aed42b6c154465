use super::detector::PersonDetection;
use super::keypoint::KeypointIndex;

/// 一人あたりの特徴量数 (17キーポイント x 座標2つ)
pub const FEATURES_PER_PERSON: usize = KeypointIndex::COUNT * 2;

/// この信頼度未満のキーポイントは (0, 0) として埋める
pub const KEYPOINT_VISIBILITY_THRESHOLD: f32 = 0.2;

/// 設定された最大人数に対する特徴ベクトルの長さ
pub fn feature_dim(max_people: usize) -> usize {
    max_people * FEATURES_PER_PERSON
}

/// 検出結果をフレーム単位の特徴ベクトルに変換する
///
/// 先頭から max_people 人分だけを検出順で採用する。各キーポイントは
/// 信頼度が閾値以上なら元フレームのピクセル座標 (x, y)、未満なら (0, 0)。
/// 検出人数が max_people に満たない場合は残りスロットをゼロで埋め、
/// 分類器の入力次元を常に一定に保つ。
pub fn keypoints_to_features(
    people: &[PersonDetection],
    max_people: usize,
    frame_size: (u32, u32),
) -> Vec<f32> {
    let (width, height) = frame_size;
    let mut features = Vec::with_capacity(feature_dim(max_people));

    for person in people.iter().take(max_people) {
        for kp in person.pose.keypoints.iter() {
            if kp.is_valid(KEYPOINT_VISIBILITY_THRESHOLD) {
                let (px, py) = kp.pixel_coords(width, height);
                features.push(px);
                features.push(py);
            } else {
                features.push(0.0);
                features.push(0.0);
            }
        }
    }

    // 不足分のスロットをゼロ埋め
    features.resize(feature_dim(max_people), 0.0);
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::keypoint::{Keypoint, Pose};

    fn person_with_confidence(x: f32, y: f32, confidence: f32) -> PersonDetection {
        let keypoints = [Keypoint::new(x, y, confidence); KeypointIndex::COUNT];
        PersonDetection {
            pose: Pose::new(keypoints),
            score: confidence,
        }
    }

    #[test]
    fn test_length_is_constant_when_fewer_people_detected() {
        // 人数が足りない場合もゼロ埋めで次元が変わらないこと
        let people = vec![person_with_confidence(0.5, 0.5, 0.9)];
        let features = keypoints_to_features(&people, 3, (100, 100));
        assert_eq!(features.len(), feature_dim(3));
        assert_eq!(features.len(), 3 * 17 * 2);

        // 検出ゼロでも同じ長さ
        let empty = keypoints_to_features(&[], 3, (100, 100));
        assert_eq!(empty.len(), feature_dim(3));
        assert!(empty.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_padding_slots_are_zero() {
        let people = vec![person_with_confidence(0.5, 0.5, 0.9)];
        let features = keypoints_to_features(&people, 2, (100, 100));
        // 2人目のスロットは全てゼロ
        assert!(features[FEATURES_PER_PERSON..].iter().all(|&v| v == 0.0));
        // 1人目のスロットはゼロではない
        assert!(features[..FEATURES_PER_PERSON].iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_overflow_keeps_first_people_in_detection_order() {
        // 信頼度が低い人物が先頭でも並べ替えずに先頭から採用する
        let people = vec![
            person_with_confidence(0.1, 0.1, 0.3),
            person_with_confidence(0.2, 0.2, 0.9),
            person_with_confidence(0.3, 0.3, 0.8),
        ];
        let features = keypoints_to_features(&people, 2, (100, 100));
        assert_eq!(features.len(), feature_dim(2));
        // 1人目: (0.1 * 100, 0.1 * 100)
        assert!((features[0] - 10.0).abs() < 1e-4);
        assert!((features[1] - 10.0).abs() < 1e-4);
        // 2人目: (0.2 * 100, 0.2 * 100)。3人目は切り捨て
        assert!((features[FEATURES_PER_PERSON] - 20.0).abs() < 1e-4);
        assert!((features[FEATURES_PER_PERSON + 1] - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_low_confidence_keypoints_zeroed() {
        let mut keypoints = [Keypoint::new(0.5, 0.5, 0.9); KeypointIndex::COUNT];
        keypoints[0] = Keypoint::new(0.5, 0.5, 0.1); // 閾値未満
        let people = vec![PersonDetection {
            pose: Pose::new(keypoints),
            score: 0.9,
        }];

        let features = keypoints_to_features(&people, 1, (200, 100));
        assert_eq!(features[0], 0.0);
        assert_eq!(features[1], 0.0);
        // 2番目のキーポイントはピクセル座標
        assert!((features[2] - 100.0).abs() < 1e-4);
        assert!((features[3] - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_coordinates_scaled_to_pixel_space() {
        let people = vec![person_with_confidence(0.25, 0.75, 1.0)];
        let features = keypoints_to_features(&people, 1, (640, 480));
        assert!((features[0] - 160.0).abs() < 1e-3);
        assert!((features[1] - 360.0).abs() < 1e-3);
    }
}
