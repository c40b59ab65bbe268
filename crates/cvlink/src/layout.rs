//! Local mirrors of native structures and the struct size sanity check.
//!
//! Any structure exchanged by value or pointer with the native library has
//! a `#[repr(C)]` mirror here. At startup the native side reports its own
//! sizes; a single disagreement means the loaded library was built against
//! different headers and structured interop is no longer sound.

use std::ffi::{c_int, c_void};
use std::mem::size_of;

use serde::Serialize;
use tracing::{debug, error};

use crate::tracing::prefix;

/// Maximum number of dimensions of a dense n-dimensional array.
pub const MAX_DIM: usize = 32;

/// Integer 2D point.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Single precision 2D point.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point2f {
    pub x: f32,
    pub y: f32,
}

/// Single precision 3D point.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point3f {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Size2f {
    pub width: f32,
    pub height: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Rotated rectangle (native `CvBox2D`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RotatedRect {
    pub center: Point2f,
    pub size: Size2f,
    /// Rotation in degrees
    pub angle: f32,
}

/// Four-channel value.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Scalar {
    pub v0: f64,
    pub v1: f64,
    pub v2: f64,
    pub v3: f64,
}

/// Termination criteria for iterative algorithms.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TermCriteria {
    /// Combination of max-iteration and epsilon flags
    pub kind: i32,
    pub max_iter: i32,
    pub epsilon: f64,
}

/// Legacy matrix header (native `CvMat`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MCvMat {
    pub kind: c_int,
    pub step: c_int,
    pub refcount: *mut c_int,
    pub hdr_refcount: c_int,
    pub data: *mut c_void,
    pub rows: c_int,
    pub cols: c_int,
}

/// Size and step of one dimension of an [`MCvMatND`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct MatNDDimension {
    pub size: c_int,
    pub step: c_int,
}

/// Legacy n-dimensional array header (native `CvMatND`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MCvMatND {
    pub kind: c_int,
    pub dims: c_int,
    pub refcount: *mut c_int,
    pub hdr_refcount: c_int,
    pub data: *mut c_void,
    pub dim: [MatNDDimension; MAX_DIM],
}

/// Legacy dynamic sequence header (native `CvSeq`).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MCvSeq {
    pub flags: c_int,
    pub header_size: c_int,
    pub h_prev: *mut c_void,
    pub h_next: *mut c_void,
    pub v_prev: *mut c_void,
    pub v_next: *mut c_void,
    pub total: c_int,
    pub elem_size: c_int,
    pub block_max: *mut c_void,
    pub ptr: *mut c_void,
    pub delta_elems: c_int,
    pub storage: *mut c_void,
    pub free_blocks: *mut c_void,
    pub first: *mut c_void,
}

/// Legacy contour header (native `CvContour`): a sequence plus bounds.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MCvContour {
    pub flags: c_int,
    pub header_size: c_int,
    pub h_prev: *mut c_void,
    pub h_next: *mut c_void,
    pub v_prev: *mut c_void,
    pub v_next: *mut c_void,
    pub total: c_int,
    pub elem_size: c_int,
    pub block_max: *mut c_void,
    pub ptr: *mut c_void,
    pub delta_elems: c_int,
    pub storage: *mut c_void,
    pub free_blocks: *mut c_void,
    pub first: *mut c_void,
    pub rect: Rect,
    pub color: c_int,
    pub reserved: [c_int; 3],
}

/// Byte sizes of interop structures, as filled by `cveGetCvStructSizes`.
///
/// Field order is part of the native contract.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StructSizes {
    pub cv_point: c_int,
    pub cv_point2d32f: c_int,
    pub cv_point3d32f: c_int,
    pub cv_size: c_int,
    pub cv_size2d32f: c_int,
    pub cv_scalar: c_int,
    pub cv_rect: c_int,
    pub cv_box2d: c_int,
    pub cv_mat: c_int,
    pub cv_matnd: c_int,
    pub cv_term_criteria: c_int,
    pub cv_seq: c_int,
    pub cv_contour: c_int,
    /// Reported but not mirrored
    pub cv_histogram: c_int,
}

impl StructSizes {
    /// Sizes of the local mirrors.
    ///
    /// `cv_histogram` is left at zero since it has no mirror.
    pub fn local() -> Self {
        Self {
            cv_point: size_of::<Point>() as c_int,
            cv_point2d32f: size_of::<Point2f>() as c_int,
            cv_point3d32f: size_of::<Point3f>() as c_int,
            cv_size: size_of::<Size>() as c_int,
            cv_size2d32f: size_of::<Size2f>() as c_int,
            cv_scalar: size_of::<Scalar>() as c_int,
            cv_rect: size_of::<Rect>() as c_int,
            cv_box2d: size_of::<RotatedRect>() as c_int,
            cv_mat: size_of::<MCvMat>() as c_int,
            cv_matnd: size_of::<MCvMatND>() as c_int,
            cv_term_criteria: size_of::<TermCriteria>() as c_int,
            cv_seq: size_of::<MCvSeq>() as c_int,
            cv_contour: size_of::<MCvContour>() as c_int,
            cv_histogram: 0,
        }
    }

    /// The validated structures as `(native name, size)` pairs.
    pub fn entries(&self) -> [(&'static str, c_int); 13] {
        [
            ("CvBox2D", self.cv_box2d),
            ("CvContour", self.cv_contour),
            ("CvMat", self.cv_mat),
            ("CvMatND", self.cv_matnd),
            ("CvPoint", self.cv_point),
            ("CvPoint2D32f", self.cv_point2d32f),
            ("CvPoint3D32f", self.cv_point3d32f),
            ("CvRect", self.cv_rect),
            ("CvScalar", self.cv_scalar),
            ("CvSeq", self.cv_seq),
            ("CvSize", self.cv_size),
            ("CvSize2D32f", self.cv_size2d32f),
            ("CvTermCriteria", self.cv_term_criteria),
        ]
    }
}

/// Size comparison for one structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructCheck {
    pub name: &'static str,
    pub local: i32,
    pub native: i32,
}

impl StructCheck {
    pub fn matches(&self) -> bool {
        self.local == self.native
    }
}

/// Result of comparing every validated structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutReport {
    pub checks: Vec<StructCheck>,
}

impl LayoutReport {
    /// Compare `native` sizes against the local mirrors.
    pub fn compare(native: &StructSizes) -> Self {
        Self::compare_with(&StructSizes::local(), native)
    }

    /// Compare two size sets, `local` first.
    pub fn compare_with(local: &StructSizes, native: &StructSizes) -> Self {
        let checks = local
            .entries()
            .iter()
            .zip(native.entries().iter())
            .map(|(&(name, local), &(_, native))| StructCheck {
                name,
                local,
                native,
            })
            .collect();
        Self { checks }
    }

    /// True only if every structure matches exactly.
    pub fn is_sane(&self) -> bool {
        self.checks.iter().all(StructCheck::matches)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = &StructCheck> {
        self.checks.iter().filter(|c| !c.matches())
    }

    /// Names of the mismatching structures.
    pub fn mismatch_names(&self) -> Vec<String> {
        self.mismatches().map(|c| c.name.to_string()).collect()
    }
}

/// Compare the native struct sizes against the local mirrors, logging every
/// mismatch.
pub fn validate(native: &StructSizes) -> LayoutReport {
    let report = LayoutReport::compare(native);
    for check in report.mismatches() {
        error!(
            "{} {} is {} bytes natively but {} bytes locally",
            prefix::ABI,
            check.name,
            check.native,
            check.local
        );
    }
    if report.is_sane() {
        debug!("{} All {} struct sizes match", prefix::ABI, report.checks.len());
    }
    report
}

/// True only if every native struct size matches its local mirror.
pub fn sanity_check(native: &StructSizes) -> bool {
    validate(native).is_sane()
}
