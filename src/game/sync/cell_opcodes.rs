//! Movement delta opcodes
//!
//! Single-cell steps (walk) and dual-cell steps (run) are sent as small
//! opcodes looked up from flat tables. Table indices are built from the
//! delta with bit arithmetic so the lookup does not branch:
//! - single: `(dx + 1) | (dz + 1) << 2`, 16 slots
//! - dual: `(dx + 2) | (dz + 2) << 3`, 64 slots
//!
//! Slots without a legal delta hold `INVALID`. Anything larger than a
//! two-tile step is a teleport and is encoded with full coordinates by the
//! packet writer.

use once_cell::sync::Lazy;

use crate::error::ProtocolError;

/// Marker for table slots that do not map to a movement
pub const INVALID: u8 = u8::MAX;

/// Eight compass directions in single-cell opcode order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    SouthWest = 0,
    South = 1,
    SouthEast = 2,
    West = 3,
    East = 4,
    NorthWest = 5,
    North = 6,
    NorthEast = 7,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::SouthWest,
        Direction::South,
        Direction::SouthEast,
        Direction::West,
        Direction::East,
        Direction::NorthWest,
        Direction::North,
        Direction::NorthEast,
    ];

    /// Tile delta of a step in this direction
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::SouthWest => (-1, -1),
            Direction::South => (0, -1),
            Direction::SouthEast => (1, -1),
            Direction::West => (-1, 0),
            Direction::East => (1, 0),
            Direction::NorthWest => (-1, 1),
            Direction::North => (0, 1),
            Direction::NorthEast => (1, 1),
        }
    }

    pub fn opcode(self) -> u8 {
        self as u8
    }

    pub fn from_opcode(opcode: u8) -> Option<Direction> {
        Direction::ALL.get(opcode as usize).copied()
    }

    pub fn from_delta(dx: i32, dz: i32) -> Option<Direction> {
        single_cell_opcode(dx, dz).and_then(Direction::from_opcode)
    }
}

/// Dual-cell deltas in opcode order
const DUAL_CELL_DELTAS: [(i32, i32); 16] = [
    (-2, -2),
    (-1, -2),
    (0, -2),
    (1, -2),
    (2, -2),
    (-2, -1),
    (2, -1),
    (-2, 0),
    (2, 0),
    (-2, 1),
    (2, 1),
    (-2, 2),
    (-1, 2),
    (0, 2),
    (1, 2),
    (2, 2),
];

static SINGLE_CELL_TABLE: Lazy<[u8; 16]> = Lazy::new(|| {
    let mut table = [INVALID; 16];
    for direction in Direction::ALL {
        let (dx, dz) = direction.delta();
        table[single_index(dx, dz)] = direction.opcode();
    }
    table
});

static DUAL_CELL_TABLE: Lazy<[u8; 64]> = Lazy::new(|| {
    let mut table = [INVALID; 64];
    for (opcode, &(dx, dz)) in DUAL_CELL_DELTAS.iter().enumerate() {
        table[dual_index(dx, dz)] = opcode as u8;
    }
    table
});

#[inline]
fn single_index(dx: i32, dz: i32) -> usize {
    ((dx + 1) | ((dz + 1) << 2)) as usize
}

#[inline]
fn dual_index(dx: i32, dz: i32) -> usize {
    ((dx + 2) | ((dz + 2) << 3)) as usize
}

/// Opcode for a one-tile step, `None` for zero or out-of-range deltas
#[inline]
pub fn single_cell_opcode(dx: i32, dz: i32) -> Option<u8> {
    if !(-1..=1).contains(&dx) || !(-1..=1).contains(&dz) {
        return None;
    }
    match SINGLE_CELL_TABLE[single_index(dx, dz)] {
        INVALID => None,
        opcode => Some(opcode),
    }
}

/// Opcode for a two-tile step, `None` for deltas a single step covers or
/// that are out of range
#[inline]
pub fn dual_cell_opcode(dx: i32, dz: i32) -> Option<u8> {
    if !(-2..=2).contains(&dx) || !(-2..=2).contains(&dz) {
        return None;
    }
    match DUAL_CELL_TABLE[dual_index(dx, dz)] {
        INVALID => None,
        opcode => Some(opcode),
    }
}

/// Movement a tile delta encodes as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMovement {
    /// No movement this tick
    None,
    /// Single-cell step with its opcode
    Walk(u8),
    /// Dual-cell step with its opcode
    Run(u8),
}

/// Classify a tile delta.
///
/// Fails for deltas beyond two tiles, which must be sent as teleports.
pub fn classify(dx: i32, dz: i32) -> Result<CellMovement, ProtocolError> {
    if dx == 0 && dz == 0 {
        return Ok(CellMovement::None);
    }
    if let Some(opcode) = single_cell_opcode(dx, dz) {
        return Ok(CellMovement::Walk(opcode));
    }
    dual_cell_opcode(dx, dz)
        .map(CellMovement::Run)
        .ok_or(ProtocolError::MovementOutOfRange { dx, dz })
}
