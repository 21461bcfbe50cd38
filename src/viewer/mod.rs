//! Interactive orbit viewer for exported assets.
//!
//! [`SceneRenderer`] is a synchronous state machine: it loads an asset, maps
//! input onto the orbit target, and on every [`SceneRenderer::tick`] damps the
//! camera toward that target and draws the frame on a [`RenderSurface`].
//! [`frame_loop::ViewerHandle`] runs one renderer on a tokio task at the
//! configured frame interval.
//!
//! ```text
//!  InputEvent ──► PointerTracker ──► target Spherical
//!                                          │  tick(dt): damp
//!                                          ▼
//!                                   current Spherical ──► CameraFrame ──► RenderSurface
//! ```

pub mod camera;
pub mod controls;
pub mod frame_loop;
pub mod material;
pub mod raster;
pub mod scene;

pub use camera::{OrbitCamera, Spherical};
pub use controls::InputEvent;
pub use frame_loop::{ViewerHandle, ViewerState};
pub use raster::{RenderSurface, SoftwareSurface};

use crate::config::ViewerConfig;
use crate::error::Img2GlbError;
use crate::math::Aabb;
use crate::pipeline::color::unpack_color;
use controls::{clamp_radius, PointerTracker};
use glam::Vec3;
use image::RgbaImage;
use material::{generate_matcap, MaterialCache, MaterialId, MATCAP_SIZE};
use raster::{DrawCall, Shading};
use scene::{load_scene, Scene, Surface};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receives viewer events. Every method defaults to a no-op.
pub trait ViewerCallback: Send + Sync {
    /// A scene finished loading and replaced the previous one.
    fn on_loaded(&self, summary: &SceneSummary) {
        let _ = summary;
    }

    /// Loading failed; the previous scene is still shown.
    fn on_error(&self, error: &Img2GlbError) {
        let _ = error;
    }

    /// Called after every rendered frame.
    fn on_stats(&self, stats: &FrameStats) {
        let _ = stats;
    }
}

/// Shared, thread-safe viewer callback.
pub type SharedViewerCallback = Arc<dyn ViewerCallback>;

/// What a successful load produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneSummary {
    pub mesh_count: usize,
    pub line_count: usize,
    /// Matcap materials in the cache after the load.
    pub material_count: usize,
    pub embedded_backdrop: bool,
    pub bounds: Aabb,
    /// Orbit radius the camera is heading to.
    pub framed_radius: f32,
}

/// Per-frame statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameStats {
    pub frame: u64,
    pub draw_calls: usize,
    pub triangles: usize,
    pub spherical: Spherical,
}

pub struct SceneRenderer {
    config: ViewerConfig,
    surface: Box<dyn RenderSurface>,
    camera: OrbitCamera,
    pointers: PointerTracker,
    materials: MaterialCache,
    matcap: Option<RgbaImage>,
    scene: Option<Scene>,
    /// Material per mesh in draw order; `None` for paper.
    assignments: Vec<Option<MaterialId>>,
    callback: Option<SharedViewerCallback>,
    frame: u64,
    disposed: bool,
}

impl std::fmt::Debug for SceneRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRenderer")
            .field("surface", &self.surface.size())
            .field("camera", &self.camera)
            .field("materials", &self.materials.len())
            .field("loaded", &self.scene.is_some())
            .field("frame", &self.frame)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl SceneRenderer {
    pub fn new(config: ViewerConfig, surface: Box<dyn RenderSurface>) -> Self {
        let (w, h) = surface.size();
        let (radius, polar, azimuth) = config.initial_spherical;
        let mut initial = Spherical::new(radius, polar, azimuth);
        initial.radius = clamp_radius(initial.radius, &config.controls);
        initial.polar = initial
            .polar
            .clamp(config.controls.polar_min, config.controls.polar_max);
        Self {
            camera: OrbitCamera::new(initial, aspect(w, h)),
            config,
            surface,
            pointers: PointerTracker::new(),
            materials: MaterialCache::new(),
            matcap: Some(generate_matcap(MATCAP_SIZE)),
            scene: None,
            assignments: Vec::new(),
            callback: None,
            frame: 0,
            disposed: false,
        }
    }

    pub fn with_callback(mut self, callback: SharedViewerCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Parse `bytes` (GLB or glTF JSON) and make it the current scene.
    ///
    /// On failure the error goes to [`ViewerCallback::on_error`] as well as
    /// the caller, and the previous scene stays loaded.
    pub fn load_asset(&mut self, bytes: &[u8]) -> Result<SceneSummary, Img2GlbError> {
        let result = if self.disposed {
            Err(Img2GlbError::AssetLoad("viewer has been disposed".into()))
        } else {
            load_scene(bytes).map_err(|e| match e {
                e @ Img2GlbError::AssetLoad(_) => e,
                other => Img2GlbError::AssetLoad(other.to_string()),
            })
        };
        let mut scene = match result {
            Ok(scene) => scene,
            Err(e) => {
                warn!("Asset load failed: {}", e);
                if let Some(cb) = &self.callback {
                    cb.on_error(&e);
                }
                return Err(e);
            }
        };

        if let Some(mut old) = self.scene.take() {
            old.release();
        }
        let bounds = scene.bounds();
        scene.add_fallback_backdrop(&self.config.paper);

        let released = self.materials.clear();
        if released > 0 {
            debug!("Released {} materials from the previous scene", released);
        }
        let materials = &mut self.materials;
        self.assignments = scene
            .meshes()
            .into_iter()
            .map(|m| match m.surface {
                Surface::Line(color) => Some(materials.get_or_create(color)),
                Surface::Plain => Some(materials.default_material()),
                Surface::PaperTexture(_) | Surface::PaperColor(_) => None,
            })
            .collect();

        let framed_radius = self.frame_bounds(bounds);
        let summary = SceneSummary {
            mesh_count: self.assignments.len(),
            line_count: scene.line_colors().len(),
            material_count: self.materials.len(),
            embedded_backdrop: scene.embedded_backdrop,
            bounds,
            framed_radius,
        };
        info!(
            "Loaded scene: {} meshes, {} lines, {} materials",
            summary.mesh_count, summary.line_count, summary.material_count
        );
        self.scene = Some(scene);
        if let Some(cb) = &self.callback {
            cb.on_loaded(&summary);
        }
        Ok(summary)
    }

    /// Aim at the center of `bounds` and pick a radius that fits it.
    fn frame_bounds(&mut self, bounds: Aabb) -> f32 {
        let controls = &self.config.controls;
        if bounds.is_empty() {
            self.camera.orbit_target = Vec3::ZERO;
            return self.camera.target.radius;
        }
        self.camera.orbit_target = bounds.center();
        let radius = clamp_radius(bounds.size().length() * controls.frame_padding, controls);
        self.camera.target.radius = radius;
        radius
    }

    /// Apply one input event. Only the target state changes.
    pub fn handle_input(&mut self, event: InputEvent) {
        if self.disposed {
            return;
        }
        match event {
            InputEvent::Resize { width, height } => {
                self.surface.resize(width, height);
                let (w, h) = self.surface.size();
                self.camera.aspect = aspect(w, h);
            }
            other => self
                .pointers
                .handle(other, &mut self.camera.target, &self.config.controls),
        }
    }

    /// Advance the damped camera by `dt` seconds and draw a frame.
    ///
    /// Returns `None` once disposed.
    pub fn tick(&mut self, dt: f32) -> Option<FrameStats> {
        if self.disposed {
            return None;
        }
        self.camera.update(self.config.controls.orbit_damping, dt);
        let frame = self
            .camera
            .frame(self.config.fov_y, self.config.near, self.config.far);

        let clear = self
            .scene
            .as_ref()
            .and_then(|s| s.background)
            .unwrap_or_else(|| unpack_color(self.config.clear_color));
        self.surface.begin_frame(clear);

        let (mut draw_calls, mut triangles) = (0, 0);
        if let (Some(scene), Some(matcap)) = (&self.scene, &self.matcap) {
            for (mesh, slot) in scene.meshes().into_iter().zip(&self.assignments) {
                let shading = match (&mesh.surface, slot) {
                    (Surface::PaperTexture(tex), _) => Shading::Texture(tex),
                    (Surface::PaperColor(c), _) => Shading::Flat(*c),
                    (_, Some(id)) => match self.materials.get(*id) {
                        Some(m) => Shading::Matcap { color: m.color, matcap },
                        None => continue,
                    },
                    (_, None) => continue,
                };
                triangles += self.surface.draw(
                    &frame,
                    &DrawCall {
                        geometry: &mesh.geometry,
                        transform: &mesh.transform,
                        shading,
                    },
                );
                draw_calls += 1;
            }
        }
        self.surface.end_frame();
        self.frame += 1;

        let stats = FrameStats {
            frame: self.frame,
            draw_calls,
            triangles,
            spherical: self.camera.current,
        };
        if let Some(cb) = &self.callback {
            cb.on_stats(&stats);
        }
        Some(stats)
    }

    /// Release the scene, every material and the matcap texture, and stop
    /// reacting to input. Returns false if already disposed.
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        if let Some(mut scene) = self.scene.take() {
            scene.release();
        }
        let released = self.materials.clear();
        self.assignments.clear();
        self.matcap = None;
        self.pointers.clear();
        debug!("Viewer disposed, released {} materials", released);
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn target(&self) -> Spherical {
        self.camera.target
    }

    pub fn current(&self) -> Spherical {
        self.camera.current
    }

    pub fn orbit_target(&self) -> Vec3 {
        self.camera.orbit_target
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn has_matcap(&self) -> bool {
        self.matcap.is_some()
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frame
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface.size()
    }

    /// Last drawn frame, when the surface keeps one.
    pub fn snapshot(&self) -> Option<RgbaImage> {
        self.surface.snapshot()
    }
}

fn aspect(w: u32, h: u32) -> f32 {
    w.max(1) as f32 / h.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::glb::write_glb;
    use crate::asset::ParsedAsset;
    use crate::config::OutputFormat;
    use crate::math::Transform;
    use crate::pipeline::color::Rgb;
    use crate::pipeline::export::{export_meshes, ExportEntry, ExportOptions};
    use crate::pipeline::geometry::Geometry;
    use crate::pipeline::mesh::LineMesh;
    use std::sync::Mutex;

    fn line(color: Rgb, y: f32) -> LineMesh {
        let mut geometry = Geometry::plane(8.0, 1.0);
        geometry.uvs = None;
        LineMesh {
            geometry,
            transform: Transform {
                translation: Vec3::new(0.0, y, 0.4),
                scale: Vec3::ONE,
            },
            color,
            sampled_color: color,
            low_confidence: false,
            confidence: 95,
        }
    }

    fn asset(colors: &[Rgb]) -> Vec<u8> {
        let lines: Vec<LineMesh> = colors
            .iter()
            .enumerate()
            .map(|(i, c)| line(*c, i as f32 * -2.0))
            .collect();
        let entries: Vec<ExportEntry<'_>> = lines.iter().map(ExportEntry::Line).collect();
        let options = ExportOptions {
            format: OutputFormat::Binary,
            ..ExportOptions::default()
        };
        export_meshes(&entries, &options).unwrap().bytes
    }

    fn renderer() -> SceneRenderer {
        SceneRenderer::new(ViewerConfig::default(), Box::new(SoftwareSurface::new(64, 48)))
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<String>>);

    impl ViewerCallback for Events {
        fn on_loaded(&self, summary: &SceneSummary) {
            self.0.lock().unwrap().push(format!("loaded:{}", summary.line_count));
        }
        fn on_error(&self, error: &Img2GlbError) {
            assert!(matches!(error, Img2GlbError::AssetLoad(_)));
            self.0.lock().unwrap().push("error".into());
        }
    }

    #[test]
    fn starts_at_default_spherical_with_matcap() {
        let r = renderer();
        let s = r.current();
        assert_eq!(s.radius, 140.0);
        assert!((s.polar - std::f32::consts::FRAC_PI_3).abs() < 1e-6);
        assert!((s.azimuth - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
        assert!(r.has_matcap());
        assert_eq!(r.material_count(), 0);
    }

    #[test]
    fn same_colored_lines_share_one_material() {
        let mut r = renderer();
        let red = Rgb([200, 10, 10]);
        let summary = r.load_asset(&asset(&[red, Rgb([10, 10, 200]), red])).unwrap();
        assert_eq!(summary.line_count, 3);
        assert_eq!(summary.material_count, 2);
        assert!(!summary.embedded_backdrop);
        // three lines plus the synthesized paper
        assert_eq!(summary.mesh_count, 4);
        assert!(summary.framed_radius >= 18.0 && summary.framed_radius <= 360.0);
        assert_eq!(r.target().radius, summary.framed_radius);
        assert!((r.orbit_target().y + 2.0).abs() < 1e-4);
    }

    #[test]
    fn failed_load_keeps_the_previous_scene() {
        let events = Arc::new(Events::default());
        let mut r = renderer().with_callback(events.clone());
        r.load_asset(&asset(&[Rgb([1, 2, 3])])).unwrap();
        let before = r.scene().cloned();

        assert!(r.load_asset(b"glTF garbage").is_err());
        assert_eq!(r.scene().cloned(), before);
        assert_eq!(r.material_count(), 1);
        assert_eq!(*events.0.lock().unwrap(), vec!["loaded:1", "error"]);
    }

    #[test]
    fn oversized_accessor_count_is_an_asset_error() {
        let events = Arc::new(Events::default());
        let mut r = renderer().with_callback(events.clone());
        let mut parsed = ParsedAsset::parse(&asset(&[Rgb([1, 2, 3])])).unwrap();
        for acc in &mut parsed.document.accessors {
            acc.count = 4_000_000_000;
        }
        let json = serde_json::to_vec(&parsed.document).unwrap();
        let bytes = write_glb(&json, &parsed.buffers[0]);

        let err = r.load_asset(&bytes).unwrap_err();
        assert!(matches!(err, Img2GlbError::AssetLoad(_)));
        assert!(r.scene().is_none());
        assert_eq!(*events.0.lock().unwrap(), vec!["error"]);
        // still usable afterwards
        assert!(r.load_asset(&asset(&[Rgb([1, 2, 3])])).is_ok());
    }

    #[test]
    fn input_moves_target_and_tick_moves_current() {
        let mut r = renderer();
        r.handle_input(InputEvent::Wheel { delta_y: 50.0 });
        let target = r.target();
        assert!(target.radius > 140.0);
        assert_eq!(r.current().radius, 140.0);

        let stats = r.tick(1.0 / 60.0).unwrap();
        assert_eq!(stats.frame, 1);
        let moved = r.current().radius;
        assert!(moved > 140.0 && moved < target.radius);
        assert_eq!(r.target(), target);
    }

    #[test]
    fn loaded_scene_draws_every_mesh() {
        let mut r = renderer();
        r.load_asset(&asset(&[Rgb([0, 0, 0]), Rgb([0, 0, 0])])).unwrap();
        let stats = r.tick(0.016).unwrap();
        assert_eq!(stats.draw_calls, 3);
        let img = r.snapshot().unwrap();
        assert_eq!(img.dimensions(), (64, 48));
    }

    #[test]
    fn resize_updates_surface() {
        let mut r = renderer();
        r.handle_input(InputEvent::Resize { width: 120, height: 40 });
        assert_eq!(r.surface_size(), (120, 40));
    }

    #[test]
    fn dispose_is_idempotent_and_releases_everything() {
        let mut r = renderer();
        r.load_asset(&asset(&[Rgb([9, 9, 9])])).unwrap();
        assert!(r.dispose());
        assert!(!r.dispose());
        assert!(r.is_disposed());
        assert_eq!(r.material_count(), 0);
        assert!(!r.has_matcap());
        assert!(r.scene().is_none());
        assert!(r.tick(0.016).is_none());

        let before = r.target();
        r.handle_input(InputEvent::Wheel { delta_y: 100.0 });
        r.handle_input(InputEvent::Resize { width: 10, height: 10 });
        assert_eq!(r.target(), before);
        assert_eq!(r.surface_size(), (64, 48));
        assert!(matches!(r.load_asset(&asset(&[Rgb::WHITE])), Err(Img2GlbError::AssetLoad(_))));
    }
}
