//! Model loading: OBJ decoding, the background load thread and the ticket
//! that keeps a late load from touching a torn-down scene.

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use glam::Vec3;
use mapfit::{
    geometry::{Geometry, Material, Mesh},
    scene::NodeKind,
    BoundingBox, NodeId, SceneError, SceneGraph, Transform,
};
use rayon::prelude::*;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("model contains no triangles")]
    Empty,
    #[error("unsupported model format {0:?}")]
    Unsupported(String),
    #[error("load thread exited without a result")]
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub name: String,
    /// Triangle soup.
    pub positions: Vec<Vec3>,
}

/// A decoded model, not yet in any scene.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    pub name: String,
    pub meshes: Vec<MeshData>,
    pub animation_count: usize,
}

impl LoadedModel {
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.positions.len() / 3).sum()
    }

    /// Box around every vertex, reduced in parallel.
    pub fn bounds(&self) -> BoundingBox {
        self.meshes
            .par_iter()
            .flat_map(|m| m.positions.par_iter())
            .fold(
                || BoundingBox::EMPTY,
                |mut acc, p| {
                    acc.expand_to_include(*p);
                    acc
                },
            )
            .reduce(|| BoundingBox::EMPTY, |a, b| a.union(&b))
    }

    /// Builds a detached group with one mesh child per part.
    pub fn instantiate(self, scene: &mut SceneGraph) -> Result<NodeId, SceneError> {
        let root = scene.spawn(self.name, NodeKind::Group);
        for part in self.meshes {
            let mesh = scene.spawn_mesh(
                part.name,
                Mesh::new(
                    Geometry::Triangles {
                        positions: part.positions,
                    },
                    Material::default(),
                ),
                Transform::IDENTITY,
            );
            scene.attach(root, mesh)?;
        }
        Ok(root)
    }
}

pub trait AssetLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<LoadedModel, LoadError>;
}

/// Wavefront OBJ: `v`, `f`, `o` and `g` records. Faces are fan-triangulated;
/// texture and normal indices are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjLoader;

impl AssetLoader for ObjLoader {
    fn load(&self, path: &Path) -> Result<LoadedModel, LoadError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if ext != "obj" {
            return Err(LoadError::Unsupported(ext));
        }

        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();

        parse_obj(BufReader::new(file), &name).map_err(|err| match err {
            LoadError::Io { source, .. } => LoadError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> LoadError {
    LoadError::Parse {
        line,
        message: message.into(),
    }
}

/// Resolves a 1-based (or negative, relative) OBJ index.
fn resolve_index(token: &str, vertex_count: usize, line: usize) -> Result<usize, LoadError> {
    let raw = token.split('/').next().unwrap_or_default();
    let index: i64 = raw
        .parse()
        .map_err(|_| parse_error(line, format!("bad face index {token:?}")))?;

    let resolved = match index {
        0 => None,
        i if i > 0 => Some(i as usize - 1),
        i => (vertex_count as i64 + i).try_into().ok(),
    };

    resolved
        .filter(|i| *i < vertex_count)
        .ok_or_else(|| parse_error(line, format!("face index {index} out of range")))
}

pub fn parse_obj<R: BufRead>(reader: R, name: &str) -> Result<LoadedModel, LoadError> {
    let mut vertices: Vec<Vec3> = Vec::new();
    let mut meshes: Vec<MeshData> = Vec::new();
    let mut current = MeshData {
        name: name.to_string(),
        positions: Vec::new(),
    };

    for (i, line_result) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line_result.map_err(|source| LoadError::Io {
            path: PathBuf::from(name),
            source,
        })?;
        let mut parts = line.split_whitespace();

        match parts.next() {
            Some("v") => {
                let mut coord = |axis: &str| -> Result<f32, LoadError> {
                    parts
                        .next()
                        .ok_or_else(|| parse_error(line_no, format!("missing {axis} coordinate")))?
                        .parse()
                        .map_err(|_| parse_error(line_no, format!("bad {axis} coordinate")))
                };
                let v = Vec3::new(coord("x")?, coord("y")?, coord("z")?);
                if !v.is_finite() {
                    return Err(parse_error(line_no, "non-finite vertex"));
                }
                vertices.push(v);
            }
            Some("f") => {
                let corners = parts
                    .map(|tok| resolve_index(tok, vertices.len(), line_no))
                    .collect::<Result<Vec<_>, _>>()?;
                if corners.len() < 3 {
                    return Err(parse_error(line_no, "face needs at least three vertices"));
                }
                for k in 1..corners.len() - 1 {
                    current.positions.extend([
                        vertices[corners[0]],
                        vertices[corners[k]],
                        vertices[corners[k + 1]],
                    ]);
                }
            }
            Some("o") | Some("g") => {
                let next_name = parts.collect::<Vec<_>>().join(" ");
                let finished = std::mem::replace(
                    &mut current,
                    MeshData {
                        name: if next_name.is_empty() { name.to_string() } else { next_name },
                        positions: Vec::new(),
                    },
                );
                if !finished.positions.is_empty() {
                    meshes.push(finished);
                }
            }
            _ => {}
        }
    }

    if !current.positions.is_empty() {
        meshes.push(current);
    }
    if meshes.is_empty() {
        return Err(LoadError::Empty);
    }

    Ok(LoadedModel {
        name: name.to_string(),
        meshes,
        animation_count: 0,
    })
}

/// `root` itself when it is a file, otherwise the first `.obj` found under it.
pub fn find_model_asset(root: &Path) -> Option<PathBuf> {
    if root.is_file() {
        return Some(root.to_path_buf());
    }

    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.eq_ignore_ascii_case("obj"))
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    found.sort();

    if found.is_empty() {
        log::warn!("No .obj model found under '{}'", root.display());
    }
    found.into_iter().next()
}

/// Identifies one load request; stale once the gate is invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

#[derive(Debug, Default)]
pub struct LoadGate {
    generation: u64,
}

impl LoadGate {
    pub fn ticket(&self) -> LoadTicket {
        LoadTicket(self.generation)
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.0 == self.generation
    }

    /// Makes every outstanding ticket stale.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }
}

/// A load running on its own thread.
pub struct PendingLoad {
    ticket: LoadTicket,
    rx: Receiver<Result<LoadedModel, LoadError>>,
}

impl PendingLoad {
    pub fn spawn(loader: Arc<dyn AssetLoader>, path: PathBuf, ticket: LoadTicket) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);

        thread::spawn(move || {
            log::info!("Loading model '{}'...", path.display());
            let result = loader.load(&path);
            if tx.send(result).is_err() {
                log::debug!("Model '{}' finished after its receiver was dropped", path.display());
            }
        });

        Self { ticket, rx }
    }

    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    /// Non-blocking poll.
    pub fn try_take(&self) -> Option<Result<LoadedModel, LoadError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(LoadError::Disconnected)),
        }
    }

    /// Blocks up to `timeout` for the result.
    pub fn wait(&self, timeout: Duration) -> Option<Result<LoadedModel, LoadError>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(LoadError::Disconnected)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CUBE_CORNERS: &str = "\
# two quads and a triangle
o base
v 0 0 0
v 2 0 0
v 2 0 1
v 0 0 1
v 0 1 0
f 1 2 3 4
f 1/1/1 2/2/2 5/5/5
g roof
f -1 -2 -3
";

    #[test]
    fn parses_named_parts_and_triangulates() {
        let model = parse_obj(Cursor::new(CUBE_CORNERS), "map").unwrap();
        assert_eq!(model.name, "map");
        assert_eq!(model.meshes.len(), 2);
        assert_eq!(model.meshes[0].name, "base");
        assert_eq!(model.meshes[1].name, "roof");
        assert_eq!(model.triangle_count(), 4);
        assert_eq!(model.animation_count, 0);

        let b = model.bounds();
        assert_eq!(b.min, Vec3::ZERO);
        assert_eq!(b.max, Vec3::new(2.0, 1.0, 1.0));
    }

    #[test]
    fn rejects_bad_input() {
        let err = parse_obj(Cursor::new("v 0 0\n"), "x").unwrap_err();
        assert!(matches!(err, LoadError::Parse { line: 1, .. }));

        let err = parse_obj(Cursor::new("v 0 0 0\nf 1 2 3\n"), "x").unwrap_err();
        assert!(matches!(err, LoadError::Parse { line: 2, .. }));

        let err = parse_obj(Cursor::new("v 0 0 0\n"), "x").unwrap_err();
        assert!(matches!(err, LoadError::Empty));
    }

    #[test]
    fn instantiate_builds_group_of_meshes() {
        let model = parse_obj(Cursor::new(CUBE_CORNERS), "map").unwrap();
        let expected = model.bounds();
        let mut scene = SceneGraph::new();
        let root = model.instantiate(&mut scene).unwrap();
        assert_eq!(scene.node(root).unwrap().children().len(), 2);
        assert_eq!(scene.world_bounds(root).unwrap(), expected);
    }

    #[test]
    fn gate_invalidates_old_tickets() {
        let mut gate = LoadGate::default();
        let first = gate.ticket();
        assert!(gate.is_current(first));
        gate.invalidate();
        assert!(!gate.is_current(first));
        assert!(gate.is_current(gate.ticket()));
    }

    struct Fixed(LoadedModel);

    impl AssetLoader for Fixed {
        fn load(&self, _path: &Path) -> Result<LoadedModel, LoadError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn background_load_delivers_result() {
        let model = parse_obj(Cursor::new(CUBE_CORNERS), "map").unwrap();
        let pending = PendingLoad::spawn(
            Arc::new(Fixed(model.clone())),
            PathBuf::from("map.obj"),
            LoadGate::default().ticket(),
        );
        let got = pending.wait(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(got, model);
    }

    #[test]
    fn obj_loader_rejects_other_formats() {
        let err = ObjLoader.load(Path::new("assets/models/map.glb")).unwrap_err();
        assert!(matches!(err, LoadError::Unsupported(ext) if ext == "glb"));
    }
}
