//! Mesh data structures and functionality

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A triangle mesh with vertices and faces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3f>,
    pub faces: Vec<[usize; 3]>,
    pub normals: Option<Vec<Vector3f>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            normals: None,
        }
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3f>, faces: Vec<[usize; 3]>) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check that every face index refers to a vertex and that stored
    /// normals, if any, match the vertex count
    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.vertex_count();
        if let Some(face) = self.faces.iter().find(|face| face.iter().any(|&i| i >= vertex_count)) {
            return Err(Error::InvalidData(format!(
                "face {:?} refers past the last of {} vertices",
                face, vertex_count
            )));
        }

        if let Some(normals) = &self.normals {
            if normals.len() != vertex_count {
                return Err(Error::InvalidData(format!(
                    "{} vertices but {} normals",
                    vertex_count,
                    normals.len()
                )));
            }
        }

        Ok(())
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Set vertex normals; ignored unless there is exactly one per vertex
    pub fn set_normals(&mut self, normals: Vec<Vector3f>) {
        if normals.len() == self.vertices.len() {
            self.normals = Some(normals);
        }
    }

    /// Unit face normals. Degenerate faces get a zero normal.
    pub fn calculate_face_normals(&self) -> Vec<Vector3f> {
        self.faces
            .iter()
            .map(|face| {
                self.face_area_normal(face)
                    .try_normalize(f32::EPSILON)
                    .unwrap_or_else(Vector3f::zeros)
            })
            .collect()
    }

    /// Area weighted vertex normals.
    ///
    /// Vertices that touch no (non-degenerate) face get a zero normal.
    pub fn calculate_vertex_normals(&self) -> Vec<Vector3f> {
        let mut accumulated = vec![Vector3f::zeros(); self.vertices.len()];
        for face in &self.faces {
            // twice the face area times the unit normal
            let weighted = self.face_area_normal(face);
            for &v in face {
                accumulated[v] += weighted;
            }
        }

        accumulated
            .into_iter()
            .map(|n| n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3f::zeros))
            .collect()
    }

    /// Stored vertex normals, or area weighted ones when none are stored
    pub fn vertex_normals(&self) -> Vec<Vector3f> {
        match &self.normals {
            Some(normals) => normals.clone(),
            None => self.calculate_vertex_normals(),
        }
    }

    /// Mean length over the unique undirected edges, `None` without faces
    pub fn average_edge_length(&self) -> Option<f32> {
        let mut edges = HashSet::new();
        for face in &self.faces {
            for i in 0..3 {
                let (a, b) = (face[i], face[(i + 1) % 3]);
                edges.insert((a.min(b), a.max(b)));
            }
        }

        if edges.is_empty() {
            return None;
        }

        let total: f32 = edges
            .iter()
            .map(|&(a, b)| (self.vertices[a] - self.vertices[b]).norm())
            .sum();
        Some(total / edges.len() as f32)
    }

    /// Mean vertex position, `None` for a mesh without vertices
    pub fn centroid(&self) -> Option<Point3f> {
        if self.vertices.is_empty() {
            return None;
        }

        let sum = self
            .vertices
            .iter()
            .fold(Vector3f::zeros(), |acc, v| acc + v.coords);
        Some(Point3f::from(sum / self.vertices.len() as f32))
    }

    /// Move the vertices so that their centroid is the origin. Returns the applied offset.
    pub fn center(&mut self) -> Vector3f {
        let Some(centroid) = self.centroid() else {
            return Vector3f::zeros();
        };

        for v in &mut self.vertices {
            *v -= centroid.coords;
        }
        -centroid.coords
    }

    fn face_area_normal(&self, face: &[usize; 3]) -> Vector3f {
        let v0 = self.vertices[face[0]];
        let v1 = self.vertices[face[1]];
        let v2 = self.vertices[face[2]];
        (v1 - v0).cross(&(v2 - v0))
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}
