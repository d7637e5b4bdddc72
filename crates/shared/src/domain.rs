use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical stage identity. Discriminants double as array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisId {
    X = 0,
    Y = 1,
    Z = 2,
}

impl AxisId {
    pub const ALL: [AxisId; 3] = [AxisId::X, AxisId::Y, AxisId::Z];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            AxisId::X => "x",
            AxisId::Y => "y",
            AxisId::Z => "z",
        }
    }

    /// Endless x, y, z, x, ... ordering used by the convergence controller.
    pub fn round_robin() -> RoundRobin {
        Self::ALL.into_iter().cycle()
    }
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type RoundRobin = std::iter::Cycle<std::array::IntoIter<AxisId, 3>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    pub fn sign(self) -> i64 {
        match self {
            Direction::Positive => 1,
            Direction::Negative => -1,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Direction::Positive => Direction::Negative,
            Direction::Negative => Direction::Positive,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Positive => f.write_str("positive"),
            Direction::Negative => f.write_str("negative"),
        }
    }
}

/// Boundary positions bracketing the signal peak along one axis, in encoder counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edges {
    pub low: i64,
    pub high: i64,
}

impl Edges {
    /// Orders the pair so that `low <= high`.
    pub fn new(a: i64, b: i64) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    pub fn midpoint(&self) -> i64 {
        self.low + (self.high - self.low) / 2
    }

    pub fn width(&self) -> i64 {
        self.high - self.low
    }

    pub fn contains(&self, position: i64) -> bool {
        (self.low..=self.high).contains(&position)
    }
}

/// Per-axis position and status snapshot.
///
/// Records are plain values: optimizers and the convergence controller derive
/// a new record from the previous one and hand it back to the position model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRecord {
    pub id: AxisId,
    pub current_position: i64,
    /// Position before the current optimization pass.
    pub reference_position: i64,
    /// Position produced by the most recent optimization.
    pub optimized_position: i64,
    pub edges: Option<Edges>,
    pub converged: bool,
}

impl AxisRecord {
    pub fn new(id: AxisId, position: i64) -> Self {
        Self {
            id,
            current_position: position,
            reference_position: position,
            optimized_position: position,
            edges: None,
            converged: false,
        }
    }

    pub fn at(self, position: i64) -> Self {
        Self {
            current_position: position,
            ..self
        }
    }

    /// Result of an optimization: the axis now rests on the midpoint of `edges`.
    pub fn optimized(self, edges: Edges) -> Self {
        let midpoint = edges.midpoint();
        Self {
            current_position: midpoint,
            optimized_position: midpoint,
            edges: Some(edges),
            ..self
        }
    }

    pub fn with_reference(self, reference_position: i64) -> Self {
        Self {
            reference_position,
            ..self
        }
    }

    pub fn with_converged(self, converged: bool) -> Self {
        Self { converged, ..self }
    }

    /// Drift between the latest optimization and the reference it is judged against.
    pub fn drift(&self) -> i64 {
        (self.optimized_position - self.reference_position).abs()
    }
}
