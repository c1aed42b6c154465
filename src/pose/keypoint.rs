/// MoveNet の 17 キーポイントインデックス (COCO順)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;
}

/// 単一キーポイント
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// 正規化されたX座標 (0.0〜1.0)
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0)
    pub y: f32,
    /// 信頼度スコア (0.0〜1.0)
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// 信頼度が閾値以上か
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }

    /// ピクセル座標に変換（描画用、整数）
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        let px = (self.x * width as f32) as i32;
        let py = (self.y * height as f32) as i32;
        (px, py)
    }

    /// ピクセル座標に変換（特徴量用、浮動小数点のまま）
    pub fn pixel_coords(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            confidence: 0.0,
        }
    }
}

/// 一人分の姿勢（17キーポイント）
#[derive(Debug, Clone)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self { keypoints }
    }

    /// インデックスでキーポイントを取得
    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    /// 全キーポイントの平均信頼度
    pub fn average_confidence(&self) -> f32 {
        let sum: f32 = self.keypoints.iter().map(|k| k.confidence).sum();
        sum / KeypointIndex::COUNT as f32
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            keypoints: [Keypoint::default(); KeypointIndex::COUNT],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_count() {
        assert_eq!(KeypointIndex::COUNT, 17);
        assert_eq!(KeypointIndex::RightAnkle as usize, 16);
    }

    #[test]
    fn test_keypoint_is_valid() {
        let kp = Keypoint::new(0.5, 0.5, 0.7);
        assert!(kp.is_valid(0.5));
        assert!(!kp.is_valid(0.8));
    }

    #[test]
    fn test_keypoint_to_pixel() {
        let kp = Keypoint::new(0.5, 0.25, 1.0);
        let (px, py) = kp.to_pixel(640, 480);
        assert_eq!(px, 320);
        assert_eq!(py, 120);
    }

    #[test]
    fn test_keypoint_pixel_coords_keeps_fraction() {
        let kp = Keypoint::new(0.1, 0.9, 1.0);
        let (fx, fy) = kp.pixel_coords(100, 50);
        assert!((fx - 10.0).abs() < 1e-5);
        assert!((fy - 45.0).abs() < 1e-5);
    }

    #[test]
    fn test_pose_get() {
        let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
        keypoints[KeypointIndex::Nose as usize] = Keypoint::new(0.5, 0.3, 0.9);

        let pose = Pose::new(keypoints);
        let nose = pose.get(KeypointIndex::Nose);
        assert_eq!(nose.x, 0.5);
        assert_eq!(nose.y, 0.3);
        assert_eq!(nose.confidence, 0.9);
    }

    #[test]
    fn test_pose_average_confidence() {
        let keypoints = [Keypoint::new(0.0, 0.0, 0.5); KeypointIndex::COUNT];
        let pose = Pose::new(keypoints);
        assert!((pose.average_confidence() - 0.5).abs() < 0.001);
    }
}
