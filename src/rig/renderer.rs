//! Scene rendering backends.
//!
//! [`SceneRenderer`] is the seam where a GPU renderer plugs in. The bundled
//! [`SnapshotRenderer`] is headless: every render appends one JSON line with
//! the world rotation of each node, which is enough to drive an external
//! renderer or to inspect the rig.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use super::scene::Scene3d;
use crate::error::{OutputError, RigError, WatchdogError};

pub trait SceneRenderer {
    fn render(&mut self, scene: &Scene3d) -> Result<(), WatchdogError>;

    /// Number of completed renders
    fn render_count(&self) -> u64;
}

impl<T: SceneRenderer + ?Sized> SceneRenderer for Box<T> {
    fn render(&mut self, scene: &Scene3d) -> Result<(), WatchdogError> {
        (**self).render(scene)
    }

    fn render_count(&self) -> u64 {
        (**self).render_count()
    }
}

#[derive(Debug, Serialize)]
struct NodeSnapshot<'a> {
    name: &'a str,
    /// World rotation as `[x, y, z, w]`
    rotation: [f32; 4],
}

#[derive(Debug, Serialize)]
struct SceneSnapshot<'a> {
    render: u64,
    aspect: f32,
    nodes: Vec<NodeSnapshot<'a>>,
}

/// Headless renderer writing one JSON line per frame
pub struct SnapshotRenderer<W: Write> {
    writer: Option<W>,
    renders: u64,
}

impl SnapshotRenderer<BufWriter<File>> {
    /// Append snapshots to a file, creating it if needed
    pub fn to_file<P: AsRef<Path>>(path: P) -> Result<Self, WatchdogError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| OutputError::SceneLog(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Writing scene snapshots to {}", path.display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl SnapshotRenderer<std::io::Sink> {
    /// Count renders without writing anything
    pub fn discard() -> Self {
        Self {
            writer: None,
            renders: 0,
        }
    }
}

impl<W: Write> SnapshotRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
            renders: 0,
        }
    }

    pub fn into_inner(self) -> Option<W> {
        self.writer
    }
}

impl<W: Write> SceneRenderer for SnapshotRenderer<W> {
    fn render(&mut self, scene: &Scene3d) -> Result<(), WatchdogError> {
        self.renders += 1;
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };

        let snapshot = SceneSnapshot {
            render: self.renders,
            aspect: scene.camera.aspect,
            nodes: scene
                .nodes()
                .iter()
                .enumerate()
                .map(|(i, node)| NodeSnapshot {
                    name: &node.name,
                    rotation: scene.world_rotation(i).to_array(),
                })
                .collect(),
        };

        let line =
            serde_json::to_string(&snapshot).map_err(|e| RigError::Render(e.to_string()))?;
        writeln!(writer, "{}", line).map_err(|e| OutputError::SceneLog(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| OutputError::SceneLog(e.to_string()))?;
        Ok(())
    }

    fn render_count(&self) -> u64 {
        self.renders
    }
}
