//! Lifecycle of the head proxy and accessory under the overlay root.
//!
//! Loads run on their own threads and report back over a channel. Each slot
//! carries a generation counter; a completion whose generation is no longer
//! current was superseded by a later replace/clear and is dropped.

use crate::{
    calibration::CalibrationState,
    constants::HEAD_PROXY_HIDDEN_MESHES,
    scene::{Aabb, Material, Mesh, SceneNode, Transform},
    Error, Result,
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use nalgebra::{Matrix4, Point3, Vector3};
use serde::Deserialize;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which slot an asset occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRole {
    HeadProxy,
    Accessory,
}

/// An asset attached under the overlay root
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayAsset {
    /// Display name
    pub name: String,
    pub role: AssetRole,
    pub node: SceneNode,
    /// Bounds size in the root's space, measured at attach time
    pub bounding_box_size: Vector3<f64>,
    pub calibration: CalibrationState,
}

impl OverlayAsset {
    #[must_use]
    pub fn new(name: impl Into<String>, role: AssetRole, node: SceneNode) -> Self {
        let bounding_box_size = node.bounds_in_parent().map_or_else(Vector3::zeros, |b| b.size());
        Self {
            name: name.into(),
            role,
            node,
            bounding_box_size,
            calibration: CalibrationState::Uncalibrated,
        }
    }
}

/// Produces a scene node from an asset source
pub trait AssetLoader: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    fn load(&self, source: &Path) -> Result<SceneNode>;
}

#[derive(Debug, Deserialize)]
struct MeshDescriptor {
    name: String,
    min: [f64; 3],
    max: [f64; 3],
    #[serde(default)]
    material: Option<Material>,
}

#[derive(Debug, Deserialize)]
struct NodeDescriptor {
    name: String,
    #[serde(default)]
    position: Option<[f64; 3]>,
    #[serde(default)]
    scale: Option<[f64; 3]>,
    #[serde(default)]
    meshes: Vec<MeshDescriptor>,
    #[serde(default)]
    children: Vec<NodeDescriptor>,
}

impl NodeDescriptor {
    fn into_node(self) -> Result<SceneNode> {
        let mut node = SceneNode::new(self.name);
        node.transform = Transform {
            position: self.position.map_or_else(Vector3::zeros, Vector3::from),
            scale: self.scale.map_or_else(|| Vector3::repeat(1.0), Vector3::from),
            ..Transform::default()
        };

        for mesh in self.meshes {
            if mesh.min.iter().zip(&mesh.max).any(|(lo, hi)| !(lo <= hi)) {
                return Err(Error::InvalidInput(format!("Mesh {} has inverted bounds", mesh.name)));
            }
            let mut built = Mesh::new(mesh.name, Aabb::new(Point3::from(mesh.min), Point3::from(mesh.max)));
            if let Some(material) = mesh.material {
                built.material = material;
            }
            node.meshes.push(built);
        }
        for child in self.children {
            node.children.push(child.into_node()?);
        }
        Ok(node)
    }
}

/// Loads YAML asset descriptors: a node tree of named meshes with bounds
#[derive(Debug, Clone, Default)]
pub struct ManifestLoader;

impl ManifestLoader {
    /// Parse a descriptor from a YAML string
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or a mesh has inverted bounds.
    pub fn parse(content: &str) -> Result<SceneNode> {
        let descriptor: NodeDescriptor =
            serde_yaml::from_str(content).map_err(|e| Error::InvalidInput(format!("Invalid asset descriptor: {e}")))?;
        descriptor.into_node()
    }
}

impl AssetLoader for ManifestLoader {
    fn load(&self, source: &Path) -> Result<SceneNode> {
        log::debug!("Loading asset descriptor {}", source.display());
        let content = std::fs::read_to_string(source)?;
        Self::parse(&content)
    }
}

/// Transform shared by everything attached to the face
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayRoot {
    pub transform: Transform,
    pub visible: bool,
}

impl Default for OverlayRoot {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            visible: true,
        }
    }
}

/// What happened to a load
#[derive(Debug, Clone, PartialEq)]
pub enum AssetEvent {
    Attached { role: AssetRole, name: String },
    Failed { role: AssetRole, name: String, reason: String },
}

struct LoadCompletion {
    role: AssetRole,
    generation: u64,
    name: String,
    result: Result<SceneNode>,
}

/// Owns the overlay root and its two asset slots
pub struct OverlayAssetManager {
    loader: Arc<dyn AssetLoader>,
    head_proxy_opacity: f32,
    root: OverlayRoot,
    head_proxy: Option<OverlayAsset>,
    accessory: Option<OverlayAsset>,
    head_generation: u64,
    accessory_generation: u64,
    pending_head: bool,
    pending_accessory: bool,
    tx: Sender<LoadCompletion>,
    rx: Receiver<LoadCompletion>,
}

impl OverlayAssetManager {
    #[must_use]
    pub fn new(loader: Arc<dyn AssetLoader>, head_proxy_opacity: f32) -> Self {
        let (tx, rx) = unbounded();
        Self {
            loader,
            head_proxy_opacity,
            root: OverlayRoot::default(),
            head_proxy: None,
            accessory: None,
            head_generation: 0,
            accessory_generation: 0,
            pending_head: false,
            pending_accessory: false,
            tx,
            rx,
        }
    }

    #[must_use]
    pub const fn root(&self) -> &OverlayRoot {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut OverlayRoot {
        &mut self.root
    }

    #[must_use]
    pub const fn head_proxy(&self) -> Option<&OverlayAsset> {
        self.head_proxy.as_ref()
    }

    #[must_use]
    pub const fn accessory(&self) -> Option<&OverlayAsset> {
        self.accessory.as_ref()
    }

    pub fn accessory_mut(&mut self) -> Option<&mut OverlayAsset> {
        self.accessory.as_mut()
    }

    /// True while a load for either slot is outstanding
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.pending_head || self.pending_accessory
    }

    /// Start loading the head proxy, replacing any current one
    pub fn load_head_proxy(&mut self, source: impl Into<PathBuf>) {
        self.head_proxy = None;
        self.head_generation += 1;
        self.pending_head = true;
        self.spawn_load(AssetRole::HeadProxy, self.head_generation, "head model".to_string(), source.into(), None);
    }

    /// Detach the current accessory now and load a new one in the background
    pub fn replace_accessory(&mut self, name: impl Into<String>, source: impl Into<PathBuf>) {
        self.replace_accessory_tinted(name, source, None);
    }

    /// Like [`replace_accessory`](Self::replace_accessory), recoloring every mesh on attach
    pub fn replace_accessory_tinted(&mut self, name: impl Into<String>, source: impl Into<PathBuf>, tint: Option<[u8; 3]>) {
        self.accessory = None;
        self.accessory_generation += 1;
        self.pending_accessory = true;
        self.spawn_load(AssetRole::Accessory, self.accessory_generation, name.into(), source.into(), tint);
    }

    /// Detach the accessory and cancel any pending accessory load
    pub fn clear_accessory(&mut self) {
        if self.accessory.take().is_some() {
            log::info!("Accessory detached");
        }
        self.accessory_generation += 1;
        self.pending_accessory = false;
    }

    /// Remove everything from the root and cancel pending loads
    pub fn detach_all(&mut self) {
        self.clear_accessory();
        self.head_proxy = None;
        self.head_generation += 1;
        self.pending_head = false;
        self.root = OverlayRoot::default();
    }

    fn spawn_load(&self, role: AssetRole, generation: u64, name: String, source: PathBuf, tint: Option<[u8; 3]>) {
        log::info!("Loading {role:?} '{name}' from {}", source.display());
        let loader = Arc::clone(&self.loader);
        let tx = self.tx.clone();
        let thread_name = format!("asset-loader-{generation}");
        let spawned = std::thread::Builder::new().name(thread_name).spawn({
            let tx = tx.clone();
            let name = name.clone();
            let source = source.clone();
            move || {
                let result = loader.load(&source).map(|node| tinted(node, tint));
                // Receiver gone means the manager was dropped
                let _ = tx.send(LoadCompletion {
                    role,
                    generation,
                    name,
                    result,
                });
            }
        });
        if let Err(e) = spawned {
            let _ = tx.send(LoadCompletion {
                role,
                generation,
                name,
                result: Err(Error::Io(e)),
            });
        }
    }

    /// Attach finished loads; never blocks
    pub fn poll(&mut self) -> Vec<AssetEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            events.extend(self.complete(completion));
        }
        events
    }

    /// Wait up to `timeout` for outstanding loads, then attach everything finished
    pub fn poll_timeout(&mut self, timeout: Duration) -> Vec<AssetEvent> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();
        while self.is_loading() {
            match self.rx.recv_deadline(deadline) {
                Ok(completion) => events.extend(self.complete(completion)),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }
        events.extend(self.poll());
        events
    }

    fn complete(&mut self, completion: LoadCompletion) -> Option<AssetEvent> {
        let LoadCompletion {
            role,
            generation,
            name,
            result,
        } = completion;

        let current = match role {
            AssetRole::HeadProxy => self.head_generation,
            AssetRole::Accessory => self.accessory_generation,
        };
        if generation != current {
            log::debug!("Discarding superseded {role:?} load '{name}'");
            return None;
        }

        match role {
            AssetRole::HeadProxy => self.pending_head = false,
            AssetRole::Accessory => self.pending_accessory = false,
        }

        match result {
            Ok(node) => {
                let asset = match role {
                    AssetRole::HeadProxy => {
                        OverlayAsset::new(name.clone(), role, prepare_head_proxy(node, self.head_proxy_opacity))
                    }
                    AssetRole::Accessory => OverlayAsset::new(name.clone(), role, node),
                };
                log::info!("Attached {role:?} '{name}' (bounds {:?})", asset.bounding_box_size.as_slice());
                match role {
                    AssetRole::HeadProxy => self.head_proxy = Some(asset),
                    AssetRole::Accessory => self.accessory = Some(asset),
                }
                Some(AssetEvent::Attached { role, name })
            }
            Err(e) => {
                let error = Error::AssetLoad {
                    name: name.clone(),
                    reason: e.to_string(),
                };
                log::warn!("{error}");
                Some(AssetEvent::Failed {
                    role,
                    name,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Visit every visible mesh under the root with its world matrix
    pub fn for_each_visible_mesh(&self, f: &mut impl FnMut(AssetRole, &Mesh, &Matrix4<f64>)) {
        if !self.root.visible {
            return;
        }
        let root = self.root.transform.matrix();
        for asset in self.head_proxy.iter().chain(self.accessory.iter()) {
            asset.node.for_each_visible_mesh(&root, &mut |mesh, world| f(asset.role, mesh, world));
        }
    }
}

fn tinted(mut node: SceneNode, tint: Option<[u8; 3]>) -> SceneNode {
    if let Some(color) = tint {
        node.for_each_mesh_mut(&mut |mesh| mesh.material.color = Some(color));
    }
    node
}

/// Center the head proxy, turn it to face the camera and make it an invisible occluder
#[must_use]
pub fn prepare_head_proxy(mut node: SceneNode, opacity: f32) -> SceneNode {
    node.transform.rotation.y = PI;
    if let Some(bounds) = node.bounds_in_parent() {
        node.transform.position -= bounds.center().coords;
    }

    node.for_each_mesh_mut(&mut |mesh| {
        let lowered = mesh.name.to_lowercase();
        if HEAD_PROXY_HIDDEN_MESHES.iter().any(|fragment| lowered.contains(fragment)) {
            mesh.visible = false;
        }
        mesh.material.transparent = true;
        mesh.material.opacity = opacity;
        mesh.material.depth_write = true;
    });
    node
}
