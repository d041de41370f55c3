use serde::Serialize;

/// Which eye a piece of distortion data is generated for.
///
/// The eyes differ only in the side of the viewport center their lens axis
/// sits on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    /// Sign applied to the configured lens offset for this eye.
    ///
    /// The left eye's lens axis lies toward the outer (left) edge of its half
    /// of the display, so its rift-space x is shifted by `-lens_offset`.
    #[inline]
    pub const fn lens_offset_sign(self) -> f64 {
        match self {
            Eye::Left => -1.0,
            Eye::Right => 1.0,
        }
    }
}

impl std::fmt::Display for Eye {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Eye::Left => "left",
            Eye::Right => "right",
        })
    }
}
