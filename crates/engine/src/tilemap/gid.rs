//! Packed tile identifiers.
//!
//! Bit 31 flips horizontally, bit 30 vertically and bit 29 across the
//! anti-diagonal. The low 28 bits carry the tile id.

pub const FLIP_HORIZONTAL: u32 = 0x8000_0000;
pub const FLIP_VERTICAL: u32 = 0x4000_0000;
pub const FLIP_DIAGONAL: u32 = 0x2000_0000;
pub const GID_MASK: u32 = 0x0FFF_FFFF;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlipFlags {
    pub horizontal: bool,
    pub vertical: bool,
    pub diagonal: bool,
}

impl FlipFlags {
    pub const NONE: FlipFlags = FlipFlags {
        horizontal: false,
        vertical: false,
        diagonal: false,
    };

    pub const fn new(horizontal: bool, vertical: bool, diagonal: bool) -> Self {
        Self {
            horizontal,
            vertical,
            diagonal,
        }
    }

    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.horizontal {
            bits |= FLIP_HORIZONTAL;
        }
        if self.vertical {
            bits |= FLIP_VERTICAL;
        }
        if self.diagonal {
            bits |= FLIP_DIAGONAL;
        }
        bits
    }

    pub fn from_bits(raw: u32) -> Self {
        Self {
            horizontal: raw & FLIP_HORIZONTAL != 0,
            vertical: raw & FLIP_VERTICAL != 0,
            diagonal: raw & FLIP_DIAGONAL != 0,
        }
    }
}

pub fn pack(id: u32, flags: FlipFlags) -> u32 {
    (id & GID_MASK) | flags.bits()
}

pub fn unpack(raw: u32) -> (u32, FlipFlags) {
    (raw & GID_MASK, FlipFlags::from_bits(raw))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarterTurn {
    None,
    Cw90,
    Cw270,
}

/// How a flipped tile is placed: the source is mirrored first, then rotated
/// clockwise around a pivot on the tile cell's edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileOrientation {
    pub rotation: QuarterTurn,
    pub mirror_x: bool,
    pub mirror_y: bool,
}

impl TileOrientation {
    pub const IDENTITY: TileOrientation = TileOrientation {
        rotation: QuarterTurn::None,
        mirror_x: false,
        mirror_y: false,
    };

    pub fn from_flags(flags: FlipFlags) -> Self {
        let FlipFlags {
            horizontal,
            vertical,
            diagonal,
        } = flags;
        if !diagonal {
            return Self {
                rotation: QuarterTurn::None,
                mirror_x: horizontal,
                mirror_y: vertical,
            };
        }
        match (horizontal, vertical) {
            (true, true) => Self {
                rotation: QuarterTurn::Cw90,
                mirror_x: true,
                mirror_y: false,
            },
            (true, false) => Self {
                rotation: QuarterTurn::Cw90,
                mirror_x: false,
                mirror_y: false,
            },
            (false, true) => Self {
                rotation: QuarterTurn::Cw270,
                mirror_x: false,
                mirror_y: false,
            },
            (false, false) => Self {
                rotation: QuarterTurn::Cw270,
                mirror_x: true,
                mirror_y: false,
            },
        }
    }

    pub fn rotation_degrees(&self) -> f32 {
        match self.rotation {
            QuarterTurn::None => 0.0,
            QuarterTurn::Cw90 => 90.0,
            QuarterTurn::Cw270 => 270.0,
        }
    }

    /// Offset of the rotation pivot from the cell's top-left corner.
    pub fn pivot_offset(&self, tile_width: u32, tile_height: u32) -> (u32, u32) {
        match self.rotation {
            QuarterTurn::None => (0, 0),
            QuarterTurn::Cw90 => (tile_width, 0),
            QuarterTurn::Cw270 => (0, tile_height),
        }
    }

    /// Size of the drawn footprint in destination pixels.
    pub fn footprint(&self, tile_width: u32, tile_height: u32) -> (u32, u32) {
        match self.rotation {
            QuarterTurn::None => (tile_width, tile_height),
            QuarterTurn::Cw90 | QuarterTurn::Cw270 => (tile_height, tile_width),
        }
    }

    /// Top-left of the footprint relative to the cell's top-left corner.
    pub fn footprint_origin(&self, tile_width: u32, tile_height: u32) -> (i32, i32) {
        let (w, h) = (tile_width as i32, tile_height as i32);
        match self.rotation {
            QuarterTurn::None => (0, 0),
            QuarterTurn::Cw90 => (w - h, 0),
            QuarterTurn::Cw270 => (0, h - w),
        }
    }

    /// Maps a footprint pixel back to the source tile pixel it shows.
    pub fn sample(&self, dx: u32, dy: u32, tile_width: u32, tile_height: u32) -> (u32, u32) {
        let (sx, sy) = match self.rotation {
            QuarterTurn::None => (dx, dy),
            QuarterTurn::Cw90 => (dy, tile_height - 1 - dx),
            QuarterTurn::Cw270 => (tile_width - 1 - dy, dx),
        };
        let u = if self.mirror_x {
            tile_width - 1 - sx
        } else {
            sx
        };
        let v = if self.mirror_y {
            tile_height - 1 - sy
        } else {
            sy
        };
        (u, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_FLAGS: [FlipFlags; 8] = [
        FlipFlags::new(false, false, false),
        FlipFlags::new(true, false, false),
        FlipFlags::new(false, true, false),
        FlipFlags::new(true, true, false),
        FlipFlags::new(false, false, true),
        FlipFlags::new(true, false, true),
        FlipFlags::new(false, true, true),
        FlipFlags::new(true, true, true),
    ];

    #[test]
    fn pack_unpack_preserves_id_and_every_flag_combination() {
        for flags in ALL_FLAGS {
            let raw = pack(3, flags);
            assert_eq!(unpack(raw), (3, flags), "flags {flags:?}");
        }
        let raw = pack(3, FlipFlags::new(true, false, false));
        assert_eq!(raw, 0x8000_0003);
    }

    #[test]
    fn pack_masks_ids_wider_than_28_bits() {
        let raw = pack(0xFFFF_FFFF, FlipFlags::NONE);
        assert_eq!(raw, GID_MASK);
    }

    #[test]
    fn orientation_table_matches_map_format() {
        let cases = [
            (FlipFlags::new(false, false, false), QuarterTurn::None, false, false),
            (FlipFlags::new(true, false, false), QuarterTurn::None, true, false),
            (FlipFlags::new(false, true, false), QuarterTurn::None, false, true),
            (FlipFlags::new(true, true, false), QuarterTurn::None, true, true),
            (FlipFlags::new(false, false, true), QuarterTurn::Cw270, true, false),
            (FlipFlags::new(true, false, true), QuarterTurn::Cw90, false, false),
            (FlipFlags::new(false, true, true), QuarterTurn::Cw270, false, false),
            (FlipFlags::new(true, true, true), QuarterTurn::Cw90, true, false),
        ];
        for (flags, rotation, mirror_x, mirror_y) in cases {
            let orientation = TileOrientation::from_flags(flags);
            assert_eq!(orientation.rotation, rotation, "flags {flags:?}");
            assert_eq!(orientation.mirror_x, mirror_x, "flags {flags:?}");
            assert_eq!(orientation.mirror_y, mirror_y, "flags {flags:?}");
        }
    }

    #[test]
    fn pivot_offsets_follow_rotation() {
        let cw90 = TileOrientation::from_flags(FlipFlags::new(true, false, true));
        let cw270 = TileOrientation::from_flags(FlipFlags::new(false, true, true));
        assert_eq!(cw90.pivot_offset(16, 16), (16, 0));
        assert_eq!(cw270.pivot_offset(16, 16), (0, 16));
        assert_eq!(TileOrientation::IDENTITY.pivot_offset(16, 16), (0, 0));
        assert_eq!(cw90.rotation_degrees(), 90.0);
        assert_eq!(cw270.rotation_degrees(), 270.0);
    }

    // Source tile 4x4 where pixel (u, v) is labelled `v * 4 + u`; each case
    // lists the labels of destination row 0 followed by the label at (0, 3).
    #[test]
    fn sampling_reproduces_all_eight_orientations() {
        let label = |(u, v): (u32, u32)| v * 4 + u;
        let row0 = |orientation: TileOrientation| -> Vec<u32> {
            (0..4).map(|dx| label(orientation.sample(dx, 0, 4, 4))).collect()
        };
        let cases: [(FlipFlags, [u32; 4], u32); 8] = [
            (FlipFlags::new(false, false, false), [0, 1, 2, 3], 12),
            (FlipFlags::new(true, false, false), [3, 2, 1, 0], 15),
            (FlipFlags::new(false, true, false), [12, 13, 14, 15], 0),
            (FlipFlags::new(true, true, false), [15, 14, 13, 12], 3),
            // transpose
            (FlipFlags::new(false, false, true), [0, 4, 8, 12], 3),
            // rotate 90 clockwise
            (FlipFlags::new(true, false, true), [12, 8, 4, 0], 15),
            // rotate 270 clockwise
            (FlipFlags::new(false, true, true), [3, 7, 11, 15], 0),
            // anti-transpose
            (FlipFlags::new(true, true, true), [15, 11, 7, 3], 12),
        ];
        for (flags, expected_row, expected_bottom_left) in cases {
            let orientation = TileOrientation::from_flags(flags);
            assert_eq!(row0(orientation), expected_row, "flags {flags:?}");
            assert_eq!(
                label(orientation.sample(0, 3, 4, 4)),
                expected_bottom_left,
                "flags {flags:?}"
            );
        }
    }

    #[test]
    fn rotated_footprint_swaps_dimensions_for_tall_tiles() {
        let cw90 = TileOrientation::from_flags(FlipFlags::new(true, false, true));
        assert_eq!(cw90.footprint(16, 32), (32, 16));
        assert_eq!(cw90.footprint_origin(16, 32), (-16, 0));
        let (u, v) = cw90.sample(31, 0, 16, 32);
        assert_eq!((u, v), (0, 0));
    }
}
