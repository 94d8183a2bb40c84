// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::mesh::halfedge::transforms::{MeshTransform, Transform};
use crate::prelude::*;

/// A face list ingestion setup followed by a chain of transforms, usually
/// read from a RON file:
///
/// ```ron
/// (
///     build: (duplicate: false, epsilon: 0.0001),
///     steps: [Subdivide, Expand((distance: 0.1)), Slice((plane: None))],
/// )
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pipeline {
    pub build: FacelistOptions,
    pub steps: Vec<Transform>,
}

impl Pipeline {
    pub fn from_ron_str(input: &str) -> Result<Self> {
        ron::from_str(input).context("Could not parse pipeline")
    }

    pub fn to_ron_string(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read pipeline file at {}", path.display()))?;
        Self::from_ron_str(&contents).with_context(|| format!("In pipeline file {}", path.display()))
    }

    /// Applies every step to the whole mesh, in order. Stops at the first
    /// failing step.
    pub fn run(&self, mesh: &mut HalfEdgeMesh) -> Result<()> {
        for (i, step) in self.steps.iter().enumerate() {
            step.apply(mesh)
                .with_context(|| format!("Pipeline step {i} ({step:?}) failed"))?;
        }
        Ok(())
    }

    /// Builds a mesh from a face list with the `build` options, then runs the
    /// steps on it.
    pub fn build_and_run<Index, Polygon>(&self, positions: &[Vec3], polygons: &[Polygon]) -> Result<HalfEdgeMesh>
    where
        Index: num_traits::AsPrimitive<usize>,
        Polygon: AsRef<[Index]>,
    {
        let mut mesh = HalfEdgeMesh::build_from_facelist(positions, polygons, &self.build)?;
        log::debug!(
            "Pipeline input: {} vertices, {} faces. Running {} steps",
            mesh.num_vertices(),
            mesh.num_faces(),
            self.steps.len()
        );
        self.run(&mut mesh)?;
        Ok(mesh)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::halfedge::primitives::*;
    use crate::mesh::halfedge::transforms::*;

    #[test]
    fn test_parse_pipeline() {
        let pipeline = Pipeline::from_ron_str(
            "(
                build: (duplicate: true),
                steps: [
                    SubdividePlanar,
                    Expand((distance: 0.25)),
                    MultiSlice((planes: [(origin: (0.0, 0.0, 0.0), normal: (0.0, 1.0, 0.0))], cap: true)),
                ],
            )",
        )
        .unwrap();
        assert!(pipeline.build.duplicate);
        assert_eq!(pipeline.build.epsilon, DEFAULT_DEDUP_EPSILON);
        assert_eq!(pipeline.steps.len(), 3);
        assert_eq!(pipeline.steps[1], Transform::Expand(Expand { distance: 0.25 }));

        let reparsed = Pipeline::from_ron_str(&pipeline.to_ron_string().unwrap()).unwrap();
        assert_eq!(reparsed, pipeline);

        assert!(Pipeline::from_ron_str("(steps: [Explode])").is_err());
        assert_eq!(Pipeline::from_ron_str("()").unwrap(), Pipeline::default());
    }

    #[test]
    fn test_build_and_run() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (positions, faces) = Box::facelist(Vec3::ZERO, Vec3::splat(2.0));
        let pipeline = Pipeline {
            build: FacelistOptions::default(),
            steps: vec![
                Transform::Slice(Slice::new(Plane::new(Vec3::ZERO, Vec3::Y), true)),
                Transform::Dual,
                Transform::Dual,
            ],
        };
        let mesh = pipeline.build_and_run(&positions, &faces).unwrap();
        mesh.validate().unwrap();
        assert!(mesh.is_closed());
        assert_eq!(
            (mesh.num_vertices(), mesh.num_edges(), mesh.num_faces()),
            (8, 12, 6)
        );
    }

    #[test]
    fn test_failing_step() {
        let mut mesh = Grid::build(2, 2);
        let pipeline = Pipeline::from_ron_str("(steps: [Subdivide, DooSabin((ratio: 1.0))])").unwrap();
        let err = pipeline.run(&mut mesh).unwrap_err();
        assert!(err.to_string().contains("step 1"));
        assert!(matches!(
            err.downcast_ref::<MeshError>(),
            Some(MeshError::InvalidTopology(_))
        ));
        // The first step still ran
        assert_eq!(mesh.num_faces(), 4 * 5);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Pipeline::load("this/file/does/not/exist.ron").unwrap_err();
        assert!(err.to_string().contains("exist.ron"));
    }
}
