//! View transform payloads.

use borsh::{BorshDeserialize, BorshSerialize};
use glam::Mat4;

/// A 4x4 matrix in column-major order, as it travels on the wire.
#[derive(Clone, Copy, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct Matrix4(pub [f32; 16]);

impl Matrix4 {
    pub const IDENTITY: Matrix4 = Matrix4([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    pub fn from_mat4(m: &Mat4) -> Matrix4 {
        Matrix4(m.to_cols_array())
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_cols_array(&self.0)
    }
}

/// The camera state for one frame: a projection matrix and a model-view
/// matrix.
///
/// A pair is only ever constructed whole. If the second matrix of a pair
/// fails to arrive, no `ViewTransformPair` exists for that iteration and
/// nothing downstream of the receive can observe a half-received frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransformPair {
    pub projection: Matrix4,
    pub modelview: Matrix4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mat4_round_trip() {
        let m = Mat4::perspective_rh(1.2, 16.0 / 9.0, 0.1, 100.0);
        assert_eq!(Matrix4::from_mat4(&m).to_mat4(), m);
    }

    #[test]
    fn identity_matches_glam() {
        assert_eq!(Matrix4::IDENTITY.to_mat4(), Mat4::IDENTITY);
    }
}
