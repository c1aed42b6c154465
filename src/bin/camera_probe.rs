use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture, VideoCaptureAPIs};
use std::thread;
use std::time::Duration;

/// 接続されているカメラを列挙して解像度とフレーム形式を表示する。
/// config.toml の camera.index を決めるための補助ツール。
fn main() {
    println!("=== カメラプローブ ===");
    println!();

    for index in 0..5 {
        print!("index {}: ", index);
        let mut cap = match VideoCapture::new(index, VideoCaptureAPIs::CAP_ANY as i32) {
            Ok(c) => c,
            Err(_) => {
                println!("open failed");
                break;
            }
        };
        if !cap.is_opened().unwrap_or(false) {
            println!("not available");
            break;
        }

        let prop_w = cap.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0);
        let prop_h = cap.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0);
        let prop_fps = cap.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        let backend = cap.get_backend_name().unwrap_or_default();

        println!(
            "prop: {}x{} fps={} backend={}",
            prop_w, prop_h, prop_fps, backend
        );

        // フレーム読み取り
        thread::sleep(Duration::from_millis(500));
        let mut frame = Mat::default();
        match cap.read(&mut frame) {
            Ok(true) if !frame.empty() => {
                println!(
                    "       frame: {}x{} ch={} type={}",
                    frame.cols(),
                    frame.rows(),
                    frame.channels(),
                    frame.typ()
                );
            }
            Ok(_) => println!("       frame: EMPTY"),
            Err(e) => println!("       frame err: {}", e),
        }
        println!();
    }
}
