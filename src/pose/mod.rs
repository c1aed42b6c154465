pub mod detector;
pub mod features;
pub mod keypoint;
pub mod preprocess;

pub use detector::{MultiPoseDetector, PersonDetection, MAX_DETECTIONS};
pub use features::{feature_dim, keypoints_to_features, FEATURES_PER_PERSON};
pub use keypoint::{Keypoint, KeypointIndex, Pose};
pub use preprocess::{preprocess_for_multipose, MULTIPOSE_INPUT_SIZE};
