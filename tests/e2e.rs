//! End-to-end integration tests for edgequake-img2glb.
//!
//! These run the whole pipeline (decode → OCR → build → export) on
//! synthetic images with a [`StaticOcrEngine`], then read the asset back
//! the way a viewer would. No tesseract binary or network access is needed.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use edgequake_img2glb::asset::ParsedAsset;
use edgequake_img2glb::pipeline::export::{BACKDROP_NODE, SHARED_LINE_MATERIAL};
use edgequake_img2glb::pipeline::ocr::{RawBbox, RawLine};
use edgequake_img2glb::viewer::{InputEvent, SceneRenderer, SoftwareSurface, ViewerHandle};
use edgequake_img2glb::{
    convert_from_bytes, convert_into_registry, convert_to_file, AssetRegistry, ConversionConfig,
    Img2GlbError, OutputFormat, PipelineStage, StaticOcrEngine, ViewerConfig,
};
use image::{Rgba, RgbaImage};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

const WIDTH: u32 = 1024;
const HEIGHT: u32 = 1536;

/// Off-white page with two dark ink bands where the lines are.
fn page_png() -> Vec<u8> {
    let mut img = RgbaImage::from_pixel(WIDTH, HEIGHT, Rgba([246, 244, 238, 255]));
    for (x0, y0, x1, y1, ink) in [
        (120, 140, 900, 210, [20, 40, 140, 255]),
        (120, 260, 940, 320, [30, 30, 30, 255]),
    ] {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Rgba(ink));
            }
        }
    }
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode test page");
    out.into_inner()
}

fn raw(text: &str, bbox: (f32, f32, f32, f32), confidence: f32) -> RawLine {
    RawLine {
        text: text.to_string(),
        bbox: RawBbox {
            x0: bbox.0,
            y0: bbox.1,
            x1: bbox.2,
            y1: bbox.3,
        },
        confidence,
    }
}

fn two_line_engine(first: &str, second: &str) -> StaticOcrEngine {
    StaticOcrEngine::new(vec![
        raw(first, (120.0, 140.0, 900.0, 210.0), 90.0),
        raw(second, (120.0, 260.0, 940.0, 320.0), 85.0),
    ])
}

fn node_named<'a>(asset: &'a ParsedAsset, name: &str) -> &'a edgequake_img2glb::asset::document::Node {
    asset
        .document
        .nodes
        .iter()
        .find(|n| n.name.as_deref() == Some(name))
        .unwrap_or_else(|| panic!("no node named {name}"))
}

// ── Conversion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_lines_become_two_ordered_segments() {
    let config = ConversionConfig::default();
    let engine = two_line_engine("Quarterly Report", "Revenue grew 12%");
    let output = convert_from_bytes(&page_png(), &config, &engine).await.unwrap();

    assert_eq!(output.asset.segment_count, 2);
    assert!(output.asset.has_backdrop);
    assert_eq!(output.stats.image_width, WIDTH);
    assert_eq!(output.stats.line_count, 2);
    assert_eq!(output.stats.low_confidence_lines, 0);
    assert_eq!(output.asset.media_type(), "model/gltf-binary");
    assert_eq!(&output.asset.bytes[..4], b"glTF");

    let asset = ParsedAsset::parse(&output.asset.bytes).unwrap();
    let first = node_named(&asset, "Segment_0").translation.unwrap();
    let second = node_named(&asset, "Segment_1").translation.unwrap();
    assert!(first[1] > second[1], "first line must sit above the second");
    node_named(&asset, BACKDROP_NODE);

    let shared: Vec<_> = asset
        .document
        .materials
        .iter()
        .filter(|m| m.name.as_deref() == Some(SHARED_LINE_MATERIAL))
        .collect();
    assert_eq!(shared.len(), 1);

    // the blue heading keeps its ink color
    let color = &node_named(&asset, "Segment_0").extras.as_ref().unwrap()["lineColor"];
    let blue = color[2].as_u64().unwrap();
    assert!(blue > color[0].as_u64().unwrap());
}

#[tokio::test]
async fn recognised_text_never_reaches_the_payload() {
    for format in [OutputFormat::Binary, OutputFormat::Text] {
        let config = ConversionConfig::builder().output_format(format).build().unwrap();
        let engine = two_line_engine("Confidential merger terms", "Secret");
        let output = convert_from_bytes(&page_png(), &config, &engine).await.unwrap();

        let payload = String::from_utf8_lossy(&output.asset.bytes).to_lowercase();
        assert!(!payload.contains("confidential"), "{format:?} leaked line text");
        assert!(!payload.contains("secret"), "{format:?} leaked line text");

        let asset = ParsedAsset::parse(&output.asset.bytes).unwrap();
        for mesh in &asset.document.meshes {
            if let Some(extras) = &mesh.extras {
                assert_eq!(extras["textGeometry"]["text"], "");
            }
        }
    }
}

#[tokio::test]
async fn banned_term_in_payload_fails_export() {
    // node names are part of the payload, so banning one must trip the scan
    let config = ConversionConfig::builder()
        .ban_term(BACKDROP_NODE)
        .build()
        .unwrap();
    let engine = two_line_engine("a", "b");
    let err = convert_from_bytes(&page_png(), &config, &engine)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(PipelineStage::Export));
    match err.root() {
        Img2GlbError::PrivacyViolation { terms } => {
            assert_eq!(terms, &vec![BACKDROP_NODE.to_lowercase()]);
        }
        other => panic!("expected privacy violation, got {other}"),
    }
}

#[tokio::test]
async fn nothing_to_export_is_empty_input() {
    let config = ConversionConfig::builder()
        .include_backdrop(false)
        .build()
        .unwrap();
    let engine = StaticOcrEngine::new(vec![raw("   ", (0.0, 0.0, 10.0, 10.0), 99.0)]);
    let err = convert_from_bytes(&page_png(), &config, &engine)
        .await
        .unwrap_err();
    assert!(matches!(err.root(), Img2GlbError::EmptyInput));
    assert_eq!(err.stage(), Some(PipelineStage::Export));
}

#[tokio::test]
async fn low_confidence_lines_are_flagged() {
    let config = ConversionConfig::default();
    let engine = StaticOcrEngine::new(vec![
        raw("clear", (120.0, 140.0, 900.0, 210.0), 96.4),
        raw("smudged", (120.0, 260.0, 940.0, 320.0), 31.0),
    ]);
    let output = convert_from_bytes(&page_png(), &config, &engine).await.unwrap();
    assert_eq!(output.stats.low_confidence_lines, 1);
    assert_eq!(output.lines[0].confidence, 96);

    let asset = ParsedAsset::parse(&output.asset.bytes).unwrap();
    let extras = node_named(&asset, "Segment_1").extras.clone().unwrap();
    assert_eq!(extras["lowConfidence"], true);
    assert_eq!(extras["confidence"], 31);
    // boosted depth
    let deep = node_named(&asset, "Segment_1").scale.unwrap()[2];
    let normal = node_named(&asset, "Segment_0").scale.unwrap()[2];
    assert!(deep > normal);
}

#[tokio::test]
async fn file_output_is_written_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("page.png");
    std::fs::write(&input, page_png()).unwrap();
    let out = dir.path().join("nested/page.gltf");

    let config = ConversionConfig::builder()
        .output_format(OutputFormat::Text)
        .build()
        .unwrap();
    let stats = convert_to_file(
        input.to_str().unwrap(),
        &out,
        &config,
        &two_line_engine("one", "two"),
    )
    .await
    .unwrap();

    let written = std::fs::read(&out).unwrap();
    assert_eq!(written.len(), stats.asset_bytes);
    assert_eq!(stats.media_type, "model/gltf+json");
    assert!(!dir.path().join("nested/page.gltf.tmp").exists());
    let json: serde_json::Value = serde_json::from_slice(&written).unwrap();
    assert_eq!(json["asset"]["version"], "2.0");
}

#[tokio::test]
async fn registry_hands_out_one_live_handle() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("page.png");
    std::fs::write(&input, page_png()).unwrap();
    let input = input.to_str().unwrap().to_string();

    let mut registry = AssetRegistry::new();
    let config = ConversionConfig::default();
    let (first, _) = convert_into_registry(&input, &config, &two_line_engine("a", "b"), &mut registry)
        .await
        .unwrap();
    let (second, output) =
        convert_into_registry(&input, &config, &two_line_engine("c", "d"), &mut registry)
            .await
            .unwrap();

    assert!(registry.resolve(&first).is_none());
    assert_eq!(registry.resolve(&second).unwrap().bytes, output.asset.bytes);

    // a failed run leaves nothing behind
    let failing = ConversionConfig::builder().ban_term(BACKDROP_NODE).build().unwrap();
    assert!(
        convert_into_registry(&input, &failing, &two_line_engine("e", "f"), &mut registry)
            .await
            .is_err()
    );
    assert!(registry.current().is_none());
    assert!(registry.resolve(&second).is_none());
}

// ── Viewer ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn viewer_renders_converted_asset() {
    let engine = two_line_engine("Heading", "Body");
    let output = convert_from_bytes(&page_png(), &ConversionConfig::default(), &engine)
        .await
        .unwrap();

    let mut renderer = SceneRenderer::new(
        ViewerConfig::default(),
        Box::new(SoftwareSurface::new(160, 120)),
    );
    let summary = renderer.load_asset(&output.asset.bytes).unwrap();
    assert_eq!(summary.line_count, 2);
    assert!(summary.embedded_backdrop);
    // distinct ink colors → one matcap each
    assert_eq!(summary.material_count, 2);

    let stats = renderer.tick(1.0 / 60.0).unwrap();
    assert_eq!(stats.draw_calls, 3);
    assert!(stats.triangles > 0);

    let frame = renderer.snapshot().unwrap();
    let clear = frame.get_pixel(0, 0).0;
    let center = frame.get_pixel(80, 60).0;
    assert_ne!(clear, center, "nothing was drawn at the center");
}

#[test]
fn viewer_zoom_stays_within_bounds() {
    let controls = ViewerConfig::default().controls;
    let mut renderer = SceneRenderer::new(
        ViewerConfig::default(),
        Box::new(SoftwareSurface::new(64, 64)),
    );

    for _ in 0..100 {
        renderer.handle_input(InputEvent::Wheel { delta_y: 400.0 });
    }
    assert_eq!(renderer.target().radius, controls.max_radius);

    // pinch in hard with two pointers
    renderer.handle_input(InputEvent::PointerDown { id: 1, x: 0.0, y: 0.0 });
    renderer.handle_input(InputEvent::PointerDown { id: 2, x: 400.0, y: 0.0 });
    let mut last = renderer.target().radius;
    for step in 1..40 {
        let x = 400.0 - step as f32 * 10.0;
        renderer.handle_input(InputEvent::PointerMove { id: 2, x, y: 0.0 });
        let r = renderer.target().radius;
        assert!(r <= last);
        last = r;
    }
    assert_eq!(renderer.target().radius, controls.min_radius);

    for _ in 0..600 {
        renderer.tick(1.0 / 60.0);
    }
    let current = renderer.current();
    assert!((current.radius - controls.min_radius).abs() < 1e-2);
    assert!(current.polar >= controls.polar_min && current.polar <= controls.polar_max);
}

#[tokio::test]
async fn viewer_loop_survives_a_bad_asset() {
    let engine = two_line_engine("x", "y");
    let output = convert_from_bytes(&page_png(), &ConversionConfig::default(), &engine)
        .await
        .unwrap();

    let renderer = SceneRenderer::new(
        ViewerConfig::default(),
        Box::new(SoftwareSurface::new(48, 48)),
    );
    let mut handle = ViewerHandle::spawn(renderer, Duration::from_millis(5));
    let summary = handle.load(output.asset.bytes.clone()).await.unwrap();
    assert_eq!(summary.line_count, 2);

    assert!(handle.load(b"not an asset".to_vec()).await.is_err());
    let state = handle.state().await.unwrap();
    assert_eq!(state.material_count, 2, "previous scene must stay loaded");

    handle.dispose().await;
    handle.dispose().await;
    assert!(handle.state().await.is_none());
}
