pub mod annotate;
pub mod skeleton;
pub mod window;

pub use annotate::{draw_status, encode_jpeg, label_color, status_text};
pub use minifb::Key;
pub use skeleton::SKELETON_CONNECTIONS;
pub use window::MinifbRenderer;
