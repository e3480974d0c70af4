//! Effect direction representations.
//!
//! Angles are hundredths of a degree. Spherical angles follow the
//! application convention: angle 0 of the first pair points along the first
//! axis and grows toward the second. Polar angles and the PID DIRECTION
//! fields are measured from north instead, a quarter turn away.

use pidff_errors::{PidffResult, ValidationError};
use serde::{Deserialize, Serialize};

/// One full turn in hundredths of a degree.
pub const FULL_TURN: i32 = 36_000;
const QUARTER_TURN: i32 = 9_000;
/// Length of a unit Cartesian vector.
pub const CARTESIAN_SCALE: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionKind {
    Cartesian,
    Polar,
    Spherical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// One component per axis, any scale.
    Cartesian(Vec<i32>),
    /// Two-axis effects only.
    Polar(i32),
    /// One entry per axis; the last entry is unused.
    Spherical(Vec<i32>),
}

impl Direction {
    pub fn kind(&self) -> DirectionKind {
        match self {
            Self::Cartesian(_) => DirectionKind::Cartesian,
            Self::Polar(_) => DirectionKind::Polar,
            Self::Spherical(_) => DirectionKind::Spherical,
        }
    }

    fn mode_name(&self) -> &'static str {
        match self {
            Self::Cartesian(_) => "cartesian",
            Self::Polar(_) => "polar",
            Self::Spherical(_) => "spherical",
        }
    }

    /// Checks the direction against the effect's axis count.
    pub fn validate(&self, axes: usize) -> PidffResult<()> {
        let directions = match self {
            Self::Cartesian(c) | Self::Spherical(c) => c.len(),
            Self::Polar(_) => 1,
        };
        if axes == 0 {
            return Err(ValidationError::AxisDirectionMismatch { axes, directions }.into());
        }
        match self {
            Self::Polar(_) if axes != 2 => Err(ValidationError::UnsupportedDirection {
                mode: self.mode_name(),
                axes,
            }
            .into()),
            Self::Polar(_) => Ok(()),
            Self::Cartesian(c) | Self::Spherical(c) if c.len() != axes => {
                Err(ValidationError::AxisDirectionMismatch { axes, directions }.into())
            }
            Self::Cartesian(c) if axes >= 2 && c.iter().all(|v| *v == 0) => {
                Err(ValidationError::ZeroDirection.into())
            }
            Self::Cartesian(_) | Self::Spherical(_) => Ok(()),
        }
    }

    /// Spherical angles for an effect with `axes` axes, normalized to
    /// `[0, FULL_TURN)`.
    pub fn to_spherical(&self, axes: usize) -> PidffResult<Vec<i32>> {
        self.validate(axes)?;
        Ok(match self {
            Self::Cartesian(c) => cartesian_to_spherical(c),
            Self::Polar(p) => vec![polar_to_first_angle(*p), 0],
            Self::Spherical(s) => {
                let mut angles: Vec<i32> = s.iter().map(|a| normalize(i64::from(*a))).collect();
                if let Some(last) = angles.last_mut() {
                    *last = 0;
                }
                angles
            }
        })
    }

    pub fn convert(&self, kind: DirectionKind, axes: usize) -> PidffResult<Self> {
        if kind == self.kind() {
            self.validate(axes)?;
            return Ok(self.clone());
        }
        let spherical = self.to_spherical(axes)?;
        Ok(match kind {
            DirectionKind::Spherical => Self::Spherical(spherical),
            DirectionKind::Cartesian => Self::Cartesian(spherical_to_cartesian(&spherical)),
            DirectionKind::Polar => {
                if axes != 2 {
                    return Err(ValidationError::UnsupportedDirection {
                        mode: "polar",
                        axes,
                    }
                    .into());
                }
                Self::Polar(first_angle_to_polar(spherical.first().copied().unwrap_or(0)))
            }
        })
    }
}

pub fn normalize(angle: i64) -> i32 {
    i32::try_from(angle.rem_euclid(i64::from(FULL_TURN))).unwrap_or(0)
}

fn to_hundredths(radians: f64) -> i32 {
    let hundredths = (radians.to_degrees() * 100.0).round();
    normalize(hundredths as i64)
}

fn to_radians(hundredths: i32) -> f64 {
    (f64::from(hundredths) / 100.0).to_radians()
}

pub fn cartesian_to_spherical(components: &[i32]) -> Vec<i32> {
    let c: Vec<f64> = components.iter().map(|v| f64::from(*v)).collect();
    let mut angles = vec![0; c.len()];
    match c.as_slice() {
        [] => {}
        [only] => {
            if let Some(a) = angles.first_mut() {
                *a = to_hundredths(0f64.atan2(*only));
            }
        }
        [c0, c1, ..] => {
            if let Some(a) = angles.first_mut() {
                *a = to_hundredths(c1.atan2(*c0));
            }
            for k in 1..c.len().saturating_sub(1) {
                let next = c.get(k + 1).copied().unwrap_or(0.0);
                let base = c.iter().take(k + 1).map(|v| v * v).sum::<f64>().sqrt();
                if let Some(a) = angles.get_mut(k) {
                    *a = to_hundredths(next.atan2(base));
                }
            }
        }
    }
    angles
}

/// Unit vector for spherical angles, scaled to [`CARTESIAN_SCALE`].
pub fn spherical_to_cartesian(angles: &[i32]) -> Vec<i32> {
    let n = angles.len();
    let a: Vec<f64> = angles.iter().map(|v| to_radians(*v)).collect();
    let angle = |i: usize| a.get(i).copied().unwrap_or(0.0);
    // Product of cosines of the angles from `from` to the last used one.
    let cos_tail = |from: usize| (from..n.saturating_sub(1)).map(|j| angle(j).cos()).product::<f64>();

    let scale = |v: f64| (v * CARTESIAN_SCALE).round() as i32;
    match n {
        0 => Vec::new(),
        1 => vec![scale(angle(0).cos())],
        _ => {
            let mut out = Vec::with_capacity(n);
            out.push(scale(angle(0).cos() * cos_tail(1)));
            out.push(scale(angle(0).sin() * cos_tail(1)));
            for k in 2..n {
                out.push(scale(angle(k - 1).sin() * cos_tail(k)));
            }
            out
        }
    }
}

pub fn polar_to_first_angle(polar: i32) -> i32 {
    normalize(i64::from(polar) - i64::from(QUARTER_TURN))
}

pub fn first_angle_to_polar(angle: i32) -> i32 {
    normalize(i64::from(angle) + i64::from(QUARTER_TURN))
}

/// Values for the device DIRECTION slots. Slots beyond the available
/// angles are not produced.
pub fn device_angles(spherical: &[i32], slots: usize) -> Vec<i32> {
    let used = spherical.len().saturating_sub(1).max(1).min(slots);
    spherical
        .iter()
        .take(used)
        .enumerate()
        .map(|(i, a)| if i == 0 { first_angle_to_polar(*a) } else { *a })
        .collect()
}
