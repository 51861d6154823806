//! End-to-end pipeline tests with a scripted stub engine
//!
//! The removal capability is injected as a stub so every scenario runs
//! without models or network: format passthrough and re-encoding, progress
//! forwarding, session supersession races, export byte stability, and
//! failure surfacing.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use magicerase::{
    BackgroundChoice, Color, ComparisonViewer, EngineConfig, FormatNormalizer, ImageSource,
    NormalizedSource, ProcessingState, ProgressEvent, ProgressFn, ProgressReporter,
    ProgressUpdate, RemovalEngine, RemovalError, ResultAsset, Result as PipelineResult,
    SessionController,
};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

fn encode_image(width: u32, height: u32, pixel: Rgba<u8>, format: ImageFormat) -> Vec<u8> {
    // The JPEG encoder refuses alpha surfaces; drop the channel there.
    let img = if format == ImageFormat::Jpeg {
        let rgb = image::Rgb([pixel[0], pixel[1], pixel[2]]);
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, rgb))
    } else {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, pixel))
    };
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, format).unwrap();
    bytes.into_inner()
}

fn result_asset(pixel: Rgba<u8>) -> ResultAsset {
    ResultAsset::from_png_bytes(encode_image(4, 4, pixel, ImageFormat::Png)).unwrap()
}

/// One scripted engine invocation
enum Behavior {
    /// Emit the progress script, then resolve with a solid-color result
    Resolve {
        progress: Vec<(String, u64, u64)>,
        pixel: Rgba<u8>,
    },
    /// Wait for the gate, emit progress, then resolve
    GatedResolve {
        gate: Arc<Notify>,
        progress: Vec<(String, u64, u64)>,
        pixel: Rgba<u8>,
    },
    /// Reject with a processing error
    Fail(String),
}

/// Stub engine that pops one scripted behavior per invocation and records
/// the source bytes it was handed
struct ScriptedEngine {
    behaviors: Mutex<VecDeque<Behavior>>,
    received: Mutex<Vec<Option<Vec<u8>>>>,
}

impl ScriptedEngine {
    fn new(behaviors: Vec<Behavior>) -> Self {
        Self {
            behaviors: Mutex::new(behaviors.into_iter().collect()),
            received: Mutex::new(Vec::new()),
        }
    }

    fn received_bytes(&self) -> Vec<Option<Vec<u8>>> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemovalEngine for ScriptedEngine {
    async fn remove_background(
        &self,
        source: &NormalizedSource,
        _config: &EngineConfig,
        progress: ProgressFn,
    ) -> PipelineResult<ResultAsset> {
        self.received
            .lock()
            .unwrap()
            .push(source.bytes().map(<[u8]>::to_vec));

        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .pop_front()
            .expect("no scripted behavior left");

        let (script, pixel) = match behavior {
            Behavior::Resolve { progress, pixel } => (progress, pixel),
            Behavior::GatedResolve {
                gate,
                progress,
                pixel,
            } => {
                gate.notified().await;
                (progress, pixel)
            },
            Behavior::Fail(message) => return Err(RemovalError::processing(message)),
        };

        for (phase, current, total) in script {
            progress(ProgressEvent::new(phase, current, total));
        }
        Ok(result_asset(pixel))
    }
}

/// Reporter that records every forwarded update
#[derive(Default)]
struct RecordingReporter {
    updates: Mutex<Vec<ProgressUpdate>>,
    errors: Mutex<Vec<String>>,
}

impl ProgressReporter for RecordingReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        self.updates.lock().unwrap().push(update);
    }

    fn report_completion(&self, _elapsed_ms: u64) {}

    fn report_error(&self, error: &str) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

fn default_progress_script() -> Vec<(String, u64, u64)> {
    vec![
        ("fetch:model".to_string(), 1, 2),
        ("fetch:model".to_string(), 2, 2),
        ("compute:inference".to_string(), 1, 1),
    ]
}

#[tokio::test]
async fn jpeg_source_passes_through_to_engine_unchanged() {
    let jpeg = encode_image(30, 40, Rgba([120, 130, 140, 255]), ImageFormat::Jpeg);
    let engine = Arc::new(ScriptedEngine::new(vec![Behavior::Resolve {
        progress: default_progress_script(),
        pixel: Rgba([0, 0, 0, 0]),
    }]));
    let controller = SessionController::new(engine.clone(), EngineConfig::default());

    let session = controller.begin();
    let state = controller
        .process(session, ImageSource::from_bytes(jpeg.clone(), "image/jpeg"))
        .await;

    assert!(matches!(state, ProcessingState::Done(_)));
    let received = engine.received_bytes();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].as_deref(), Some(jpeg.as_slice()));

    // Fresh comparison defaults: split at 50, transparent backdrop.
    let viewer = ComparisonViewer::new(RgbaImage::new(30, 40));
    assert_eq!(viewer.split().percent(), 50.0);
    assert_eq!(viewer.background(), &BackgroundChoice::Transparent);
}

#[cfg(feature = "webp-support")]
#[tokio::test]
async fn webp_source_is_reencoded_before_the_engine_sees_it() {
    use magicerase::MediaType;

    let webp = encode_image(12, 9, Rgba([10, 90, 200, 255]), ImageFormat::WebP);
    let engine = Arc::new(ScriptedEngine::new(vec![Behavior::Resolve {
        progress: default_progress_script(),
        pixel: Rgba([0, 0, 0, 0]),
    }]));
    let controller = SessionController::new(engine.clone(), EngineConfig::default());

    let session = controller.begin();
    let state = controller
        .process(session, ImageSource::from_bytes(webp.clone(), "image/webp"))
        .await;
    assert!(matches!(state, ProcessingState::Done(_)));

    let received = engine.received_bytes().remove(0).unwrap();
    assert_ne!(received, webp);
    assert_eq!(MediaType::sniff(&received).unwrap(), MediaType::Png);

    // Dimensions survive the canvas round trip.
    let decoded = image::load_from_memory(&received).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (12, 9));
}

#[tokio::test]
async fn progress_tuples_forward_as_rounded_percentages() {
    let engine = Arc::new(ScriptedEngine::new(vec![Behavior::Resolve {
        progress: vec![
            ("fetch:model".to_string(), 1, 3),
            ("fetch:model".to_string(), 2, 3),
            ("fetch:model".to_string(), 3, 3),
            ("compute:inference".to_string(), 1, 200),
        ],
        pixel: Rgba([0, 0, 0, 0]),
    }]));
    let reporter = Arc::new(RecordingReporter::default());
    let controller = SessionController::with_reporter(
        engine,
        EngineConfig::default(),
        reporter.clone(),
    );

    let png = encode_image(8, 8, Rgba([1, 1, 1, 255]), ImageFormat::Png);
    let session = controller.begin();
    controller
        .process(session, ImageSource::from_bytes(png, "image/png"))
        .await;

    let percentages: Vec<u8> = reporter
        .updates
        .lock()
        .unwrap()
        .iter()
        .map(|u| u.percentage)
        .collect();
    // round(i/n*100) per tuple, non-monotonic across the phase boundary.
    assert_eq!(percentages, vec![33, 67, 100, 1]);
}

#[tokio::test]
async fn superseded_session_has_no_observable_effect() {
    let gate = Arc::new(Notify::new());
    let engine = Arc::new(ScriptedEngine::new(vec![
        Behavior::GatedResolve {
            gate: gate.clone(),
            progress: vec![("compute:inference".to_string(), 1, 4)],
            pixel: Rgba([255, 0, 0, 255]), // session A result: red
        },
        Behavior::Resolve {
            progress: default_progress_script(),
            pixel: Rgba([0, 0, 255, 255]), // session B result: blue
        },
    ]));
    let controller = Arc::new(SessionController::new(engine, EngineConfig::default()));

    let png = encode_image(4, 4, Rgba([7, 7, 7, 255]), ImageFormat::Png);

    // Session A starts and parks inside the engine.
    let session_a = controller.begin();
    let task_a = {
        let controller = controller.clone();
        let source = ImageSource::from_bytes(png.clone(), "image/png");
        tokio::spawn(async move { controller.process(session_a, source).await })
    };
    tokio::task::yield_now().await;

    // Session B supersedes A and completes.
    let session_b = controller.begin();
    let state_b = controller
        .process(session_b, ImageSource::from_bytes(png, "image/png"))
        .await;
    let blue = match &state_b {
        ProcessingState::Done(asset) => asset.clone(),
        other => panic!("expected Done, got {other:?}"),
    };
    assert_eq!(controller.percentage(), 100);

    // Now resolve A; its progress and result must be discarded.
    gate.notify_one();
    task_a.await.unwrap();

    match controller.state() {
        ProcessingState::Done(asset) => assert_eq!(asset, blue),
        other => panic!("state changed after stale resolution: {other:?}"),
    }
    assert_eq!(controller.percentage(), 100);
}

#[tokio::test]
async fn switching_backgrounds_never_changes_export_bytes() {
    let engine = Arc::new(ScriptedEngine::new(vec![Behavior::Resolve {
        progress: default_progress_script(),
        pixel: Rgba([200, 100, 50, 128]),
    }]));
    let controller = SessionController::new(engine, EngineConfig::default());

    let png = encode_image(6, 6, Rgba([3, 3, 3, 255]), ImageFormat::Png);
    let source = ImageSource::from_bytes(png, "image/png");
    let normalized = FormatNormalizer::normalize(source.clone()).unwrap();

    let session = controller.begin();
    let state = controller.process(session, source).await;

    let mut viewer = ComparisonViewer::from_normalized(&normalized).unwrap();
    let baseline = viewer.export(&state).unwrap().data;

    let choices = [
        BackgroundChoice::Color(Color::new(255, 255, 255)),
        BackgroundChoice::Gradient(magicerase::presets::gradients()[0].1),
        BackgroundChoice::Transparent,
    ];
    for choice in choices {
        viewer.set_background(choice, None);
        // Preview re-renders with the new backdrop...
        viewer.render(&state).unwrap();
        // ...but the exported bytes stay the engine's output, verbatim.
        assert_eq!(viewer.export(&state).unwrap().data, baseline);
    }
}

#[tokio::test]
async fn engine_rejection_surfaces_message_and_reset_affordance() {
    let engine = Arc::new(ScriptedEngine::new(vec![Behavior::Fail(
        "model fetch failed".to_string(),
    )]));
    let reporter = Arc::new(RecordingReporter::default());
    let controller = SessionController::with_reporter(
        engine,
        EngineConfig::default(),
        reporter.clone(),
    );

    let png = encode_image(5, 5, Rgba([2, 2, 2, 255]), ImageFormat::Png);
    let session = controller.begin();
    let state = controller
        .process(session, ImageSource::from_bytes(png, "image/png"))
        .await;

    let message = match &state {
        ProcessingState::Failed(message) => message.clone(),
        other => panic!("expected Failed, got {other:?}"),
    };
    assert!(message.contains("model fetch failed"));
    assert_eq!(reporter.errors.lock().unwrap().len(), 1);

    // Viewer shows the error panel, never a comparison, and export is gone.
    let viewer = ComparisonViewer::new(RgbaImage::new(5, 5));
    match viewer.panel(&state) {
        magicerase::ViewerPanel::Error { message } => {
            assert!(message.contains("model fetch failed"));
        },
        other => panic!("expected error panel, got {other:?}"),
    }
    assert!(viewer.render(&state).is_err());
    assert!(viewer.export(&state).is_err());

    // The user retries by resetting and selecting again.
    controller.reset();
    assert_eq!(controller.state(), ProcessingState::Idle);
}

#[tokio::test]
async fn one_shot_api_skips_session_machinery() {
    let engine = ScriptedEngine::new(vec![Behavior::Resolve {
        progress: default_progress_script(),
        pixel: Rgba([0, 255, 0, 255]),
    }]);
    let png = encode_image(3, 3, Rgba([9, 9, 9, 255]), ImageFormat::Png);

    let asset =
        magicerase::remove_background_from_bytes(png, "image/png", &engine, &EngineConfig::default())
            .await
            .unwrap();
    assert_eq!(asset.dimensions(), (4, 4));
}
