//! Coordinate helpers for the viewer: all-sky and 3D projections, binning.

use nalgebra::{Rotation3, Vector3};

/// Aitoff projection of (longitude, latitude) in degrees.
///
/// Longitude is wrapped into `(-180, 180]`. The result is in degrees of the
/// projected plane: x ∈ [-180, 180], y ∈ [-90, 90].
pub fn aitoff(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let mut lon = lon_deg % 360.0;
    if lon > 180.0 {
        lon -= 360.0;
    } else if lon <= -180.0 {
        lon += 360.0;
    }
    let lambda = lon.to_radians();
    let phi = lat_deg.clamp(-90.0, 90.0).to_radians();

    let alpha = (phi.cos() * (lambda / 2.0).cos()).acos();
    // sinc(alpha) = sin(alpha) / alpha, with the limit 1 at 0
    let sinc = if alpha.abs() < 1e-12 { 1.0 } else { alpha.sin() / alpha };

    let x = 2.0 * phi.cos() * (lambda / 2.0).sin() / sinc;
    let y = phi.sin() / sinc;
    (x.to_degrees(), y.to_degrees())
}

/// Orthographic view of a 3D point after rotating by `yaw` about z and then
/// `pitch` about x (radians). Returns screen (x, y).
pub fn orthographic(point: [f64; 3], yaw: f64, pitch: f64) -> [f64; 2] {
    let rot = Rotation3::from_axis_angle(&Vector3::x_axis(), pitch)
        * Rotation3::from_axis_angle(&Vector3::z_axis(), yaw);
    let p = rot * Vector3::new(point[0], point[1], point[2]);
    [p.x, p.z]
}

/// Equal-width bins spanning the finite range of some values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bins {
    pub lo: f64,
    pub hi: f64,
    pub width: f64,
    pub count: usize,
}

impl Bins {
    /// `None` when no value is finite or `count` is zero.
    pub fn covering(values: &[f64], count: usize) -> Option<Bins> {
        if count == 0 {
            return None;
        }
        let (lo, hi) = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
            })?;
        let width = if hi > lo { (hi - lo) / count as f64 } else { 1.0 };
        Some(Bins { lo, hi, width, count })
    }

    pub fn centre(&self, i: usize) -> f64 {
        self.lo + (i as f64 + 0.5) * self.width
    }

    /// Bin holding `v`. The upper edge belongs to the last bin.
    pub fn index(&self, v: f64) -> Option<usize> {
        if !v.is_finite() || v < self.lo || v > self.hi.max(self.lo) {
            return None;
        }
        Some((((v - self.lo) / self.width) as usize).min(self.count - 1))
    }

    /// Count per bin. Values outside the range or non-finite are ignored.
    pub fn counts(&self, values: impl IntoIterator<Item = f64>) -> Vec<usize> {
        let mut counts = vec![0usize; self.count];
        for i in values.into_iter().filter_map(|v| self.index(v)) {
            counts[i] += 1;
        }
        counts
    }
}

/// Square-root rule, kept within a readable range.
pub fn default_bin_count(n: usize) -> usize {
    ((n as f64).sqrt().ceil() as usize).clamp(10, 100)
}
