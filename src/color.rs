use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use astroglue::pipeline::ClusterBand;
use astroglue::pipeline::session::BAND_COLOURS;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Band colours: cluster band → Color32
// ---------------------------------------------------------------------------

/// Colours for cluster bands. The root cluster is drawn in near-black, the
/// others cycle through a fixed palette by colour slot.
#[derive(Debug, Clone)]
pub struct BandColours {
    palette: Vec<Color32>,
    root: Color32,
}

impl Default for BandColours {
    fn default() -> Self {
        BandColours {
            palette: generate_palette(BAND_COLOURS),
            root: Color32::from_gray(30),
        }
    }
}

impl BandColours {
    pub fn colour_for(&self, band: &ClusterBand) -> Color32 {
        band.colour_slot
            .and_then(|slot| self.palette.get(slot % self.palette.len().max(1)))
            .copied()
            .unwrap_or(self.root)
    }

    /// Neutral colour for points outside any selection.
    pub fn unselected(&self) -> Color32 {
        Color32::from_gray(150)
    }

    /// Return the legend entries (band id → colour) for the UI.
    pub fn legend_entries(&self, bands: &[ClusterBand]) -> Vec<(String, Color32)> {
        bands
            .iter()
            .map(|b| (b.id.clone(), self.colour_for(b)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(slot: Option<usize>) -> ClusterBand {
        ClusterBand {
            id: "1".into(),
            start: 0,
            end: 1,
            colour_slot: slot,
        }
    }

    #[test]
    fn palette_has_distinct_colours() {
        let p = generate_palette(BAND_COLOURS);
        assert_eq!(p.len(), BAND_COLOURS);
        for (i, a) in p.iter().enumerate() {
            assert!(p[i + 1..].iter().all(|b| b != a));
        }
    }

    #[test]
    fn root_band_uses_root_colour() {
        let colours = BandColours::default();
        assert_eq!(colours.colour_for(&band(None)), Color32::from_gray(30));
        assert_ne!(colours.colour_for(&band(Some(0))), colours.colour_for(&band(Some(1))));
    }
}
