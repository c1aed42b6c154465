//! Violence detection session: opens the configured camera, extracts
//! multi-person pose features per frame, classifies the sequence window and
//! emits labeled, annotated frames. Trains the classifier once when no
//! checkpoint exists.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use mimamori::classifier::ViolenceClassifier;
use mimamori::config::Config;
use mimamori::detector::{AlertLabel, DetectionEvent, PipelineError, ViolenceDetector};
use mimamori::pose::MultiPoseDetector;
use mimamori::render::{encode_jpeg, MinifbRenderer};

const CONFIG_PATH: &str = "config.toml";

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

type LogFile = Arc<Mutex<std::io::BufWriter<std::fs::File>>>;

fn open_log_file() -> Result<LogFile> {
    std::fs::create_dir_all("logs")?;
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = format!("logs/detector_{}.log", ts);
    let file = std::fs::File::create(&path)?;
    eprintln!("Log: {}", path);
    Ok(Arc::new(Mutex::new(std::io::BufWriter::new(file))))
}

macro_rules! log {
    ($logfile:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        eprintln!("{}", msg);
        if let Ok(mut f) = $logfile.lock() {
            let _ = writeln!(f, "{}", msg);
            let _ = f.flush();
        }
    }};
}

// ---------------------------------------------------------------------------
// Alert snapshots
// ---------------------------------------------------------------------------

/// 緊急ラベルに遷移した瞬間のフレームをJPEGで保存する。
/// 保存したパスを返す。アラートの永続化自体は外部レイヤの責務。
fn save_alert_snapshot(event: &DetectionEvent, alert_dir: &str, quality: i32) -> Result<String> {
    std::fs::create_dir_all(alert_dir)?;
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S%.3f");
    let path = format!("{}/alert_{}.jpg", alert_dir, ts);
    let jpeg = encode_jpeg(&event.frame, quality)?;
    std::fs::write(&path, jpeg)?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH);
    config.validate().context("invalid configuration")?;

    let logfile = open_log_file()?;
    log!(logfile, "Violence Detector ({})", env!("GIT_VERSION"));
    log!(
        logfile,
        "[config] camera={} seq_len={} max_people={} smoothing={} thresholds={}/{}",
        config.camera.index,
        config.detector.seq_len,
        config.detector.max_people,
        config.detector.smoothing_window,
        config.detector.warning_threshold,
        config.detector.urgent_threshold
    );

    // SIGINT/SIGTERM -> stop flag. Both pipeline stages watch this
    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop))?;

    // Pose backend + classifier (train-or-load happens before the loop starts)
    let mut pose = MultiPoseDetector::new(&config.pose.model_path)
        .with_context(|| format!("failed to load pose model {}", config.pose.model_path))?;
    let classifier = ViolenceClassifier::train_or_load(&mut pose, &config.classifier, &config.detector)?;
    log!(
        logfile,
        "[model] classifier ready (seq_len={} feature_dim={})",
        classifier.seq_len(),
        classifier.feature_dim()
    );

    let mut detector = ViolenceDetector::new(pose, classifier, &config.detector);

    // Optional preview window
    let mut renderer = if config.display.preview {
        match MinifbRenderer::new(
            "mimamori",
            config.camera.width as usize,
            config.camera.height as usize,
        ) {
            Ok(r) => Some(r),
            Err(e) => {
                log!(logfile, "[display] preview unavailable: {e:#}");
                None
            }
        }
    } else {
        None
    };

    let mut last_label = AlertLabel::Gathering;
    let alert_dir = config.display.alert_dir.clone();
    let jpeg_quality = config.display.jpeg_quality;
    let event_log = logfile.clone();
    let stop_ui = Arc::clone(&stop);

    log!(logfile, "[run] starting capture/process loop");
    let result = detector.run(&config.camera, Arc::clone(&stop), |event| {
        // Label transitions + alert snapshots
        if event.label != last_label {
            log!(
                event_log,
                "[label] {} -> {} (score={:?})",
                last_label.as_str(),
                event.label.as_str(),
                event.score
            );
            if event.label == AlertLabel::Urgent {
                match save_alert_snapshot(&event, &alert_dir, jpeg_quality) {
                    Ok(path) => log!(event_log, "[alert] snapshot saved: {}", path),
                    Err(e) => log!(event_log, "[alert] snapshot failed: {e:#}"),
                }
            }
            last_label = event.label;
        }

        if let Some(r) = renderer.as_mut() {
            r.draw_frame(&event.frame)?;
            r.draw_people(&event.people);
            r.update()?;
            if !r.is_open() {
                stop_ui.store(true, Ordering::Relaxed);
            }
        }

        Ok(())
    });

    match result {
        Ok(()) => {
            log!(logfile, "[run] stopped");
            Ok(())
        }
        Err(e) => {
            if let Some(PipelineError::Camera(_)) = e.downcast_ref::<PipelineError>() {
                log!(logfile, "[run] camera failure: {e:#}");
            } else {
                log!(logfile, "[run] error: {e:#}");
            }
            Err(e)
        }
    }
}
