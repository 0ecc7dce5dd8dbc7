use palette::{FromColor, IntoColor, Lab, Srgb};
use serde::Serialize;

use crate::error::{Error, Result};

/// Core color type used throughout the pipeline.
/// Wraps sRGB u8 components and provides conversions for output and clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Hue in degrees `[0, 360)`, saturation and lightness as fractions `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hsl {
    pub hue: f64,
    pub saturation: f64,
    pub lightness: f64,
}

/// Textual representation handed to the clipboard on selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorFormat {
    /// `R, G, B` as integers 0-255
    #[default]
    Rgb,
    /// `#RRGGBB`
    Hex,
    /// `H, S, L` as raw floating point values
    Hsl,
}

impl ColorFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rgb => "rgb",
            Self::Hex => "hex",
            Self::Hsl => "hsl",
        }
    }

    /// The mode after this one, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Self::Rgb => Self::Hex,
            Self::Hex => Self::Hsl,
            Self::Hsl => Self::Rgb,
        }
    }
}

impl std::fmt::Display for ColorFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a hex color string like `#ff8800` or `#FF8800`.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(Error::InvalidColor(format!(
                "expected 6 hex digits, got {hex:?}"
            )));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|e| Error::InvalidColor(format!("{hex:?}: {e}")))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Serialize to uppercase hex `#RRGGBB`. This is the deduplication key
    /// for recently selected colors.
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Canonical RGB to HSL conversion.
    pub fn to_hsl(self) -> Hsl {
        let rgb: Srgb<f64> = self.to_srgb_u8().into_format();
        let hsl: palette::Hsl<palette::encoding::Srgb, f64> = rgb.into_color();
        let hue = hsl.hue.into_positive_degrees();
        Hsl {
            // into_positive_degrees can land on 360.0 after rounding
            hue: if hue >= 360.0 { 0.0 } else { hue },
            saturation: hsl.saturation,
            lightness: hsl.lightness,
        }
    }

    /// Render the color as clipboard text in the given mode.
    pub fn format(self, mode: ColorFormat) -> String {
        match mode {
            ColorFormat::Rgb => format!("{}, {}, {}", self.r, self.g, self.b),
            ColorFormat::Hex => self.to_hex(),
            ColorFormat::Hsl => {
                let hsl = self.to_hsl();
                format!(
                    "{:.6}, {:.6}, {:.6}",
                    hsl.hue, hsl.saturation, hsl.lightness
                )
            }
        }
    }

    /// Convert to `palette::Srgb<u8>`.
    pub fn to_srgb_u8(self) -> Srgb<u8> {
        Srgb::new(self.r, self.g, self.b)
    }

    /// Convert to CIELAB (for perceptual clustering).
    pub fn to_lab(self) -> Lab {
        let srgb_f32: Srgb<f32> = self.to_srgb_u8().into_format();
        srgb_f32.into_color()
    }

    /// Create from CIELAB.
    pub fn from_lab(lab: Lab) -> Self {
        let srgb: Srgb<f32> = Srgb::from_color(lab);
        let r = (srgb.red.clamp(0.0, 1.0) * 255.0).round() as u8;
        let g = (srgb.green.clamp(0.0, 1.0) * 255.0).round() as u8;
        let b = (srgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self { r, g, b }
    }

    /// WCAG 2.0 relative luminance.
    ///
    /// Linearizes each sRGB channel, then computes the weighted sum.
    pub fn relative_luminance(self) -> f32 {
        fn linearize(c: u8) -> f32 {
            let c = c as f32 / 255.0;
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        0.2126 * linearize(self.r) + 0.7152 * linearize(self.g) + 0.0722 * linearize(self.b)
    }

    /// Squared Euclidean distance in RGB space.
    pub fn distance_sq(self, other: Color) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }
}

impl From<image::Rgb<u8>> for Color {
    fn from(p: image::Rgb<u8>) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}
