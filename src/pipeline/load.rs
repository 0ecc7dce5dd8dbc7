use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::Path;

use image::imageops::FilterType;
use image::{ImageReader, RgbImage};

use crate::color::Color;
use crate::error::{Error, Result};

/// File extensions offered by the file picker, lowercase and without the dot.
pub const ACCEPTED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

/// Whether `path` carries one of the accepted image extensions.
pub fn is_accepted_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
        .unwrap_or(false)
}

/// Open and decode `path`, then shrink it to fit within `max_width`x`max_height`.
///
/// The aspect ratio is preserved and images already inside the bound are
/// returned at their original size. The result is what both the palette
/// extractor and the display consume.
pub fn load_thumbnail(path: &Path, max_width: u32, max_height: u32) -> Result<RgbImage> {
    let file = File::open(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => Error::NotFound {
            path: path.to_path_buf(),
        },
        _ => Error::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let img = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    let img = if img.width() > max_width || img.height() > max_height {
        img.resize(max_width, max_height, FilterType::Lanczos3)
    } else {
        img
    };

    Ok(img.to_rgb8())
}

/// Flatten an image into its pixel colors, row by row.
pub fn pixels(img: &RgbImage) -> Vec<Color> {
    img.pixels().map(|p| Color::from(*p)).collect()
}
