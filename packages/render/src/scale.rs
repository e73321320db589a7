//! Binned colour scale shared by the interactive and static renders.
//!
//! Bins are equal-width over the finite observed `[min, max]`. Values that
//! are missing, non-finite, or outside the domain get [`NO_VALUE_COLOR`].

use serde::Serialize;

/// Number of bins in every scale.
pub const BIN_COUNT: usize = 6;

/// Sequential yellow-orange-red palette, lightest first.
pub const PALETTE: [Color; BIN_COUNT] = [
    Color::rgb(0xff, 0xff, 0xb2),
    Color::rgb(0xfe, 0xd9, 0x76),
    Color::rgb(0xfe, 0xb2, 0x4c),
    Color::rgb(0xfd, 0x8d, 0x3c),
    Color::rgb(0xf0, 0x3b, 0x20),
    Color::rgb(0xbd, 0x00, 0x26),
];

/// Fill for regions with no usable value.
pub const NO_VALUE_COLOR: Color = Color::rgb(0xd9, 0xd9, 0xd9);

/// Legend label for [`NO_VALUE_COLOR`].
pub const NO_VALUE_LABEL: &str = "No data";

/// An opaque sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `#rrggbb` form.
    #[must_use]
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// One legend entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LegendBin {
    pub lower: f64,
    pub upper: f64,
    pub color: Color,
}

impl LegendBin {
    /// `lower - upper` with one decimal place.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{:.1} - {:.1}", self.lower, self.upper)
    }
}

/// Maps metric values to bin colours.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    domain: Option<(f64, f64)>,
}

impl ColorScale {
    /// Builds a scale from every region's value. Non-finite and missing
    /// entries do not contribute to the domain.
    #[must_use]
    pub fn build(values: &[Option<f64>]) -> Self {
        let domain = values
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((min, max)) => Some((min.min(v), max.max(v))),
            });

        match domain {
            Some((min, max)) => log::debug!("Colour scale domain [{min}, {max}]"),
            None => log::debug!("Colour scale has no numeric values"),
        }

        Self { domain }
    }

    /// Observed `(min, max)`, or `None` when no value was numeric.
    #[must_use]
    pub const fn domain(&self) -> Option<(f64, f64)> {
        self.domain
    }

    /// Bin for `value`, or `None` when it should get the no-value colour.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn bin_index(&self, value: Option<f64>) -> Option<usize> {
        let (min, max) = self.domain?;
        let value = value.filter(|v| v.is_finite())?;

        if value < min || value > max {
            return None;
        }
        if max <= min {
            return Some(0);
        }

        let position = (value - min) / (max - min) * BIN_COUNT as f64;
        Some((position.floor() as usize).min(BIN_COUNT - 1))
    }

    /// Fill colour for `value`.
    #[must_use]
    pub fn color_for(&self, value: Option<f64>) -> Color {
        self.bin_index(value).map_or(NO_VALUE_COLOR, |i| PALETTE[i])
    }

    /// The bins as `(lower, upper, colour)`. Empty when the domain is empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn legend(&self) -> Vec<LegendBin> {
        let Some((min, max)) = self.domain else {
            return vec![];
        };
        let width = (max - min) / BIN_COUNT as f64;

        PALETTE
            .iter()
            .enumerate()
            .map(|(i, &color)| LegendBin {
                lower: min + width * i as f64,
                upper: if i == BIN_COUNT - 1 {
                    max
                } else {
                    min + width * (i + 1) as f64
                },
                color,
            })
            .collect()
    }

    /// Labelled legend rows: every bin, then the no-value entry.
    #[must_use]
    pub fn legend_entries(&self) -> Vec<(String, Color)> {
        self.legend()
            .iter()
            .map(|bin| (bin.label(), bin.color))
            .chain(std::iter::once((NO_VALUE_LABEL.to_owned(), NO_VALUE_COLOR)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale() -> ColorScale {
        ColorScale::build(&[Some(100.0), None, Some(400.0), Some(f64::NAN), Some(700.0)])
    }

    #[test]
    fn ends_of_the_domain_map_to_first_and_last_bins() {
        let scale = scale();

        assert_eq!(scale.domain(), Some((100.0, 700.0)));
        assert_eq!(scale.color_for(Some(100.0)), PALETTE[0]);
        assert_eq!(scale.color_for(Some(700.0)), PALETTE[BIN_COUNT - 1]);
        assert_eq!(scale.bin_index(Some(400.0)), Some(3));
    }

    #[test]
    fn out_of_domain_and_missing_get_no_value_colour() {
        let scale = scale();

        assert_eq!(scale.color_for(Some(99.9)), NO_VALUE_COLOR);
        assert_eq!(scale.color_for(Some(700.1)), NO_VALUE_COLOR);
        assert_eq!(scale.color_for(None), NO_VALUE_COLOR);
        assert_eq!(scale.color_for(Some(f64::INFINITY)), NO_VALUE_COLOR);
    }

    #[test]
    fn degenerate_domain_uses_first_bin() {
        let scale = ColorScale::build(&[Some(5.0), Some(5.0)]);

        assert_eq!(scale.bin_index(Some(5.0)), Some(0));
        assert_eq!(scale.bin_index(Some(6.0)), None);
    }

    #[test]
    fn empty_domain_has_no_legend() {
        let scale = ColorScale::build(&[None, None]);

        assert_eq!(scale.domain(), None);
        assert!(scale.legend().is_empty());
        assert_eq!(scale.color_for(Some(1.0)), NO_VALUE_COLOR);
    }

    #[test]
    fn legend_covers_the_domain() {
        let legend = scale().legend();

        assert_eq!(legend.len(), BIN_COUNT);
        assert!((legend[0].lower - 100.0).abs() < 1e-9);
        assert!((legend[0].upper - 200.0).abs() < 1e-9);
        assert!((legend[BIN_COUNT - 1].upper - 700.0).abs() < 1e-9);
        assert_eq!(legend[2].color.hex(), "#feb24c");
    }

    #[test]
    fn legend_entries_end_with_no_data() {
        let entries = scale().legend_entries();

        assert_eq!(entries.len(), BIN_COUNT + 1);
        assert_eq!(entries[0], ("100.0 - 200.0".to_owned(), PALETTE[0]));
        assert_eq!(entries[BIN_COUNT], (NO_VALUE_LABEL.to_owned(), NO_VALUE_COLOR));

        let empty = ColorScale::build(&[]).legend_entries();
        assert_eq!(empty, vec![(NO_VALUE_LABEL.to_owned(), NO_VALUE_COLOR)]);
    }
}
