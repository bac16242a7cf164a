// Copyright (c) Interval Domain Contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//

//! Engine-level policy the spec leaves unspecified: whether floats are
//! tracked at all, and which float format to widen toward when a `FloatBV`
//! type's own format can't be read off the expression (§10 Configuration).

use crate::float_format::FloatFormat;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// When `false`, the real map is never populated and every float
    /// comparison/havoc involving it is a no-op. An engine embedding this
    /// domain for an integer-only IR can disable float tracking entirely
    /// rather than pay for a map that will always be empty.
    pub track_floats: bool,
    pub default_float_format: FloatFormat,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            track_floats: true,
            default_float_format: FloatFormat::BINARY64,
        }
    }
}
