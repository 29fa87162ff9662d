// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The 4x4 transform matrix applied to batched vertices.

use serde::{Deserialize, Serialize};
use std::ops::Mul;

use super::vector::{Vec3, Vec4};

/// A 4x4 column-major matrix, used for model-view and projection transforms.
///
/// The memory layout is column-major so that a `Mat4` can be copied verbatim
/// into a shader constant buffer.
#[derive(
    Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        ],
    };

    /// Creates a new matrix from four column vectors.
    #[inline]
    pub const fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Returns a row of the matrix as a `Vec4`.
    #[inline]
    pub fn row(&self, index: usize) -> Vec4 {
        let pick = |c: &Vec4| match index {
            0 => c.x,
            1 => c.y,
            2 => c.z,
            _ => c.w,
        };
        Vec4::new(
            pick(&self.cols[0]),
            pick(&self.cols[1]),
            pick(&self.cols[2]),
            pick(&self.cols[3]),
        )
    }

    /// Creates a translation matrix.
    #[inline]
    pub const fn from_translation(v: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(1.0, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(v.x, v.y, v.z, 1.0),
        )
    }

    /// Creates a non-uniform scaling matrix.
    #[inline]
    pub const fn from_scale(scale: Vec3) -> Self {
        Self::from_cols(
            Vec4::new(scale.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, scale.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, scale.z, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        )
    }

    /// Creates a rotation around the Z-axis, the only rotation 2D nodes use.
    ///
    /// # Arguments
    ///
    /// * `angle`: The angle of rotation in radians.
    #[inline]
    pub fn from_rotation_z(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_cols(
            Vec4::new(c, s, 0.0, 0.0),
            Vec4::new(-s, c, 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0, 0.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
        )
    }

    /// Creates a right-handed orthographic projection with a [0, 1] depth range.
    pub fn orthographic_rh_zo(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        z_near: f32,
        z_far: f32,
    ) -> Self {
        let rml = right - left;
        let tmb = top - bottom;
        let fmn = z_far - z_near;
        Self::from_cols(
            Vec4::new(2.0 / rml, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / tmb, 0.0, 0.0),
            Vec4::new(0.0, 0.0, -1.0 / fmn, 0.0),
            Vec4::new(-(right + left) / rml, -(top + bottom) / tmb, -z_near / fmn, 1.0),
        )
    }

    /// Transforms a point (implicit `w = 1`), ignoring the projective row.
    #[inline]
    pub fn transform_point3(&self, p: Vec3) -> Vec3 {
        (self.cols[0] * p.x + self.cols[1] * p.y + self.cols[2] * p.z + self.cols[3]).truncate()
    }
}

impl Default for Mat4 {
    /// Returns the 4x4 identity matrix.
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;
    /// Composes two transforms; `a * b` applies `b` first.
    fn mul(self, rhs: Mat4) -> Self {
        let column = |c: Vec4| {
            Vec4::new(
                self.row(0).dot(c),
                self.row(1).dot(c),
                self.row(2).dot(c),
                self.row(3).dot(c),
            )
        };
        Self::from_cols(
            column(rhs.cols[0]),
            column(rhs.cols[1]),
            column(rhs.cols[2]),
            column(rhs.cols[3]),
        )
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::vector::Vec3;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn translation_moves_points_but_not_directions() {
        let m = Mat4::from_translation(Vec3::new(10.0, -5.0, 2.0));
        assert_relative_eq!(
            m.transform_point3(Vec3::new(1.0, 1.0, 1.0)),
            Vec3::new(11.0, -4.0, 3.0)
        );
        let dir = m * Vec4::new(1.0, 0.0, 0.0, 0.0);
        assert_eq!(dir, Vec4::new(1.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn composition_applies_right_hand_side_first() {
        let scale = Mat4::from_scale(Vec3::new(2.0, 2.0, 1.0));
        let translate = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let p = (translate * scale).transform_point3(Vec3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(p, Vec3::new(3.0, 2.0, 0.0));
    }

    #[test]
    fn rotation_z_quarter_turn() {
        let p = Mat4::from_rotation_z(FRAC_PI_2).transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn orthographic_maps_corners_to_clip_space() {
        let ortho = Mat4::orthographic_rh_zo(0.0, 800.0, 0.0, 600.0, -1.0, 1.0);
        assert_relative_eq!(
            ortho.transform_point3(Vec3::new(800.0, 600.0, 0.0)),
            Vec3::new(1.0, 1.0, 0.5),
            epsilon = 1e-6
        );
        assert_eq!(Mat4::default(), Mat4::IDENTITY);
    }
}
