//! Scene graph built from a parsed asset.
//!
//! Nodes are a tagged tree: a [`SceneNode::Mesh`] draws, a
//! [`SceneNode::Group`] only carries children. Transforms are resolved to
//! world space at load time since nothing moves once loaded.

use crate::asset::document::Node;
use crate::asset::ParsedAsset;
use crate::config::PaperConfig;
use crate::error::Img2GlbError;
use crate::math::{Aabb, Transform};
use crate::pipeline::color::{unpack_color, Rgb};
use crate::pipeline::geometry::Geometry;
use glam::Vec3;
use image::RgbaImage;
use serde_json::Value;
use tracing::{debug, warn};

/// Name given to the plane synthesized when an asset has no backdrop.
pub const FALLBACK_BACKDROP: &str = "FallbackPaper";

/// How a mesh is shaded, decided from its node extras and material.
#[derive(Debug, Clone, PartialEq)]
pub enum Surface {
    /// Extruded text with a per-line color.
    Line(Rgb),
    /// Any other mesh: shared white matcap.
    Plain,
    /// Paper textured with the source image.
    PaperTexture(RgbaImage),
    /// Untextured paper.
    PaperColor(Rgb),
}

impl Surface {
    pub fn is_paper(&self) -> bool {
        matches!(self, Surface::PaperTexture(_) | Surface::PaperColor(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshNode {
    pub name: String,
    pub geometry: Geometry,
    /// World transform.
    pub transform: Transform,
    pub surface: Surface,
}

impl MeshNode {
    /// World-space bounds.
    pub fn world_bounds(&self) -> Aabb {
        self.geometry
            .bounds
            .transformed(self.transform.translation, self.transform.scale)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneNode {
    Mesh(MeshNode),
    Group { name: String, children: Vec<SceneNode> },
}

impl SceneNode {
    /// Depth-first visit of every mesh.
    pub fn for_each_mesh<'a>(&'a self, f: &mut impl FnMut(&'a MeshNode)) {
        match self {
            SceneNode::Mesh(m) => f(m),
            SceneNode::Group { children, .. } => {
                for child in children {
                    child.for_each_mesh(f);
                }
            }
        }
    }

    pub fn for_each_mesh_mut(&mut self, f: &mut impl FnMut(&mut MeshNode)) {
        match self {
            SceneNode::Mesh(m) => f(m),
            SceneNode::Group { children, .. } => {
                for child in children {
                    child.for_each_mesh_mut(f);
                }
            }
        }
    }
}

/// A loaded scene ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub root: SceneNode,
    pub background: Option<Rgb>,
    /// True when the asset carried its own paper backdrop.
    pub embedded_backdrop: bool,
}

impl Scene {
    pub fn bounds(&self) -> Aabb {
        let mut b = Aabb::EMPTY;
        self.root.for_each_mesh(&mut |m| b = b.union(m.world_bounds()));
        b
    }

    /// Bounds of everything except paper planes.
    pub fn content_bounds(&self) -> Aabb {
        let mut b = Aabb::EMPTY;
        self.root.for_each_mesh(&mut |m| {
            if !m.surface.is_paper() {
                b = b.union(m.world_bounds());
            }
        });
        b
    }

    pub fn meshes(&self) -> Vec<&MeshNode> {
        let mut out = Vec::new();
        self.root.for_each_mesh(&mut |m| out.push(m));
        out
    }

    /// Line colors in draw order.
    pub fn line_colors(&self) -> Vec<Rgb> {
        let mut out = Vec::new();
        self.root.for_each_mesh(&mut |m| {
            if let Surface::Line(c) = m.surface {
                out.push(c);
            }
        });
        out
    }

    /// Release every geometry and texture buffer.
    pub fn release(&mut self) {
        self.root.for_each_mesh_mut(&mut |m| {
            m.geometry = Geometry::default();
            if let Surface::PaperTexture(_) = m.surface {
                m.surface = Surface::PaperColor(Rgb::WHITE);
            }
        });
        self.root = SceneNode::Group {
            name: String::new(),
            children: Vec::new(),
        };
    }

    /// Add a flat paper plane behind the content if the asset had none.
    pub fn add_fallback_backdrop(&mut self, paper: &PaperConfig) {
        if self.embedded_backdrop {
            return;
        }
        let content = self.content_bounds();
        if content.is_empty() {
            return;
        }
        let size = content.size();
        let center = content.center();
        let offset = (size.z * paper.depth_offset_ratio).max(paper.min_depth_offset);
        let geometry = Geometry::plane(
            (size.x * paper.scale_padding).max(f32::EPSILON),
            (size.y * paper.scale_padding).max(f32::EPSILON),
        );
        let node = SceneNode::Mesh(MeshNode {
            name: FALLBACK_BACKDROP.to_string(),
            geometry,
            transform: Transform {
                translation: Vec3::new(center.x, center.y, content.min.z - offset),
                scale: Vec3::ONE,
            },
            surface: Surface::PaperColor(unpack_color(paper.color)),
        });
        debug!("No embedded backdrop, added fallback paper {}×{}", size.x, size.y);
        match &mut self.root {
            SceneNode::Group { children, .. } => children.insert(0, node),
            SceneNode::Mesh(_) => {
                let old = std::mem::replace(
                    &mut self.root,
                    SceneNode::Group {
                        name: String::new(),
                        children: Vec::new(),
                    },
                );
                self.root = SceneNode::Group {
                    name: String::new(),
                    children: vec![node, old],
                };
            }
        }
    }
}

/// Build a [`Scene`] from asset bytes (GLB or glTF JSON).
pub fn load_scene(bytes: &[u8]) -> Result<Scene, Img2GlbError> {
    let asset = ParsedAsset::parse(bytes)?;
    let mut loader = Loader {
        asset: &asset,
        embedded_backdrop: false,
        depth: 0,
        visited: vec![false; asset.document.nodes.len()],
    };
    let mut children = Vec::new();
    for &idx in asset.document.root_nodes() {
        children.push(loader.node(idx, Transform::default())?);
    }
    let background = asset
        .document
        .scene_extras()
        .and_then(|e| color_from(e.get("backgroundColor")));

    Ok(Scene {
        root: SceneNode::Group {
            name: "root".to_string(),
            children,
        },
        background,
        embedded_backdrop: loader.embedded_backdrop,
    })
}

/// Deepest node hierarchy walked; keeps the recursion bounded.
const MAX_DEPTH: usize = 64;

struct Loader<'a> {
    asset: &'a ParsedAsset,
    embedded_backdrop: bool,
    depth: usize,
    /// glTF nodes form strict trees: each node is reached at most once.
    visited: Vec<bool>,
}

impl Loader<'_> {
    fn node(&mut self, idx: u32, parent: Transform) -> Result<SceneNode, Img2GlbError> {
        if self.depth >= MAX_DEPTH {
            return Err(Img2GlbError::AssetLoad("node hierarchy too deep".into()));
        }
        let node = self
            .asset
            .document
            .nodes
            .get(idx as usize)
            .ok_or_else(|| Img2GlbError::AssetLoad(format!("missing node {idx}")))?;
        let seen = &mut self.visited[idx as usize];
        if *seen {
            return Err(Img2GlbError::AssetLoad(format!("node {idx} has more than one parent")));
        }
        *seen = true;
        let name = node.name.clone().unwrap_or_else(|| format!("node_{idx}"));
        let world = compose(parent, node);

        let mut children = Vec::new();
        if let Some(mesh_idx) = node.mesh {
            children.extend(self.meshes(node, &name, mesh_idx, world)?);
        }
        self.depth += 1;
        for &child in &node.children {
            children.push(self.node(child, world)?);
        }
        self.depth -= 1;

        if children.len() == 1 && node.children.is_empty() {
            if let Some(only) = children.pop() {
                return Ok(only);
            }
        }
        Ok(SceneNode::Group { name, children })
    }

    fn meshes(
        &mut self,
        node: &Node,
        name: &str,
        mesh_idx: u32,
        world: Transform,
    ) -> Result<Vec<SceneNode>, Img2GlbError> {
        let doc = &self.asset.document;
        let mesh = doc
            .meshes
            .get(mesh_idx as usize)
            .ok_or_else(|| Img2GlbError::AssetLoad(format!("missing mesh {mesh_idx}")))?;
        let extras = node.extras.as_ref();
        let is_paper = extras
            .and_then(|e| e.get("paperBackdrop"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let line_color = extras.and_then(|e| color_from(e.get("lineColor")));

        let mut out = Vec::with_capacity(mesh.primitives.len());
        for (p_idx, prim) in mesh.primitives.iter().enumerate() {
            let Some(&pos) = prim.attributes.get("POSITION") else {
                warn!("{name}: primitive {p_idx} has no positions, skipped");
                continue;
            };
            let positions = self.asset.read_floats::<3>(pos)?;
            let indices = match prim.indices {
                Some(i) => self.asset.read_indices(i)?,
                None => (0..positions.len() as u32).collect(),
            };
            if let Some(bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
                return Err(Img2GlbError::AssetLoad(format!(
                    "{name}: index {bad} out of range"
                )));
            }
            let uvs = match prim.attributes.get("TEXCOORD_0") {
                Some(&uv) => Some(self.asset.read_floats::<2>(uv)?),
                None => None,
            };
            let mut geometry = Geometry {
                positions,
                normals: Vec::new(),
                uvs,
                indices,
                bounds: Aabb::EMPTY,
                params: None,
            };
            match prim.attributes.get("NORMAL") {
                Some(&n) => geometry.normals = self.asset.read_floats::<3>(n)?,
                None => geometry.compute_normals(),
            }
            if geometry.normals.len() != geometry.positions.len() {
                geometry.compute_normals();
            }
            geometry.compute_bounds();

            let surface = if is_paper {
                self.embedded_backdrop = true;
                self.paper_surface(prim.material, extras)?
            } else if let Some(color) = line_color {
                Surface::Line(color)
            } else {
                Surface::Plain
            };
            let mesh_name = if mesh.primitives.len() > 1 {
                format!("{name}#{p_idx}")
            } else {
                name.to_string()
            };
            out.push(SceneNode::Mesh(MeshNode {
                name: mesh_name,
                geometry,
                transform: world,
                surface,
            }));
        }
        Ok(out)
    }

    fn paper_surface(&self, material: Option<u32>, extras: Option<&Value>) -> Result<Surface, Img2GlbError> {
        let doc = &self.asset.document;
        let pbr = material
            .and_then(|m| doc.materials.get(m as usize))
            .and_then(|m| m.pbr_metallic_roughness.as_ref());

        if let Some(image_idx) = pbr
            .and_then(|p| p.base_color_texture.as_ref())
            .and_then(|t| doc.textures.get(t.index as usize))
            .and_then(|t| t.source)
        {
            let bytes = self.asset.image_bytes(image_idx)?;
            match image::load_from_memory(&bytes) {
                Ok(img) => return Ok(Surface::PaperTexture(img.to_rgba8())),
                Err(e) => warn!("Backdrop texture unreadable, using flat color: {e}"),
            }
        }

        let color = extras
            .and_then(|e| color_from(e.get("paperColor")))
            .or_else(|| {
                pbr.map(|p| {
                    let f = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
                    Rgb([f(p.base_color_factor[0]), f(p.base_color_factor[1]), f(p.base_color_factor[2])])
                })
            })
            .unwrap_or(Rgb::WHITE);
        Ok(Surface::PaperColor(color))
    }
}

/// Parent then child: no rotation, so scale and translation compose directly.
fn compose(parent: Transform, node: &Node) -> Transform {
    let t = node.translation.map(Vec3::from_array).unwrap_or(Vec3::ZERO);
    let s = node.scale.map(Vec3::from_array).unwrap_or(Vec3::ONE);
    Transform {
        translation: parent.apply(t),
        scale: parent.scale * s,
    }
}

/// `[r, g, b]` with integer components 0–255.
fn color_from(value: Option<&Value>) -> Option<Rgb> {
    let arr = value?.as_array()?;
    if arr.len() != 3 {
        return None;
    }
    let mut rgb = [0u8; 3];
    for (slot, v) in rgb.iter_mut().zip(arr) {
        *slot = u8::try_from(v.as_u64()?).ok()?;
    }
    Some(Rgb(rgb))
}
