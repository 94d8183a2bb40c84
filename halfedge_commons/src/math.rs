// Copyright (C) 2023 setzer22 and contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use float_ord::FloatOrd;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A `Vec3` that can be used as a key in hash maps and ordered sets. Equality
/// is exact, bit-for-bit on the float values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Vec3Ord([FloatOrd<f32>; 3]);

pub trait ToOrd<T>
where
    T: Eq + PartialEq + Ord + PartialOrd + std::hash::Hash + Copy,
{
    fn to_ord(&self) -> T;
}

impl ToOrd<Vec3Ord> for Vec3 {
    fn to_ord(&self) -> Vec3Ord {
        Vec3Ord([FloatOrd(self.x), FloatOrd(self.y), FloatOrd(self.z)])
    }
}

/// Which side of a [`Plane`] a point lies on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlaneSide {
    Front,
    Back,
    On,
}

/// An oriented plane, given by a point on it and its normal. The "front" side
/// is the half-space the normal points into.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub origin: Vec3,
    pub normal: Vec3,
}

impl Plane {
    pub fn new(origin: Vec3, normal: Vec3) -> Self {
        Self {
            origin,
            normal: normal.normalize_or_zero(),
        }
    }

    /// A plane with a zero normal cannot classify anything.
    pub fn is_valid(&self) -> bool {
        self.normal.length_squared() > 0.0 && self.origin.is_finite() && self.normal.is_finite()
    }

    pub fn flipped(&self) -> Self {
        Self {
            origin: self.origin,
            normal: -self.normal,
        }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        (point - self.origin).dot(self.normal.normalize_or_zero())
    }

    /// Classifies `point`. Distances within `epsilon` (inclusive) are `On`.
    pub fn classify(&self, point: Vec3, epsilon: f32) -> PlaneSide {
        let d = self.signed_distance(point);
        if d > epsilon {
            PlaneSide::Front
        } else if d < -epsilon {
            PlaneSide::Back
        } else {
            PlaneSide::On
        }
    }

    /// Returns the interpolation factor `t` in `[0, 1]` where the segment
    /// `a -> b` crosses the plane, if the endpoints lie strictly on opposite
    /// sides.
    pub fn segment_intersection(&self, a: Vec3, b: Vec3, epsilon: f32) -> Option<f32> {
        let da = self.signed_distance(a);
        let db = self.signed_distance(b);
        let crosses = (da > epsilon && db < -epsilon) || (da < -epsilon && db > epsilon);
        if !crosses {
            return None;
        }
        Some((da / (da - db)).clamp(0.0, 1.0))
    }
}
