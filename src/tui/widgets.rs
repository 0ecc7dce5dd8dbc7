use image::RgbImage;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Paragraph, Widget};

use crate::color::{Color as AppColor, ColorFormat};
use crate::history::RecentColors;
use crate::pipeline::ingest::ImageRecord;

const SWATCH_WIDTH: usize = 6;

fn to_color(c: AppColor) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}

/// Choose black or white foreground for readable text on the given background.
fn contrast_fg(c: AppColor) -> Color {
    if c.relative_luminance() > 0.4 {
        Color::Black
    } else {
        Color::White
    }
}

/// One colored block; the selected one is marked and underlined.
fn swatch_span(color: AppColor, selected: bool) -> Span<'static> {
    let style = Style::default().bg(to_color(color)).fg(contrast_fg(color));
    if selected {
        Span::styled(
            format!("{:^SWATCH_WIDTH$}", "●"),
            style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )
    } else {
        Span::styled(" ".repeat(SWATCH_WIDTH), style)
    }
}

/// Loaded images, one row each: the palette swatches followed by the file
/// name. Scrolls to keep the selected row visible.
pub struct PaletteListWidget<'a> {
    records: &'a [ImageRecord],
    /// `(image, swatch)` under the cursor.
    selected: Option<(usize, usize)>,
    focused: bool,
}

impl<'a> PaletteListWidget<'a> {
    pub fn new(records: &'a [ImageRecord], selected: Option<(usize, usize)>, focused: bool) -> Self {
        Self {
            records,
            selected,
            focused,
        }
    }
}

impl Widget for PaletteListWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = format!("Images ({})", self.records.len());
        let mut block = Block::bordered().title(title);
        if self.focused {
            block = block.border_style(Style::default().fg(Color::Yellow));
        }
        let inner = block.inner(area);
        block.render(area, buf);

        if self.records.is_empty() {
            Paragraph::new("  no images loaded").render(inner, buf);
            return;
        }

        let rows = inner.height.max(1) as usize;
        let current = self.selected.map(|(image, _)| image).unwrap_or(0);
        let first = current.saturating_sub(rows - 1);

        let lines: Vec<Line> = self
            .records
            .iter()
            .enumerate()
            .skip(first)
            .take(rows)
            .map(|(i, record)| {
                let is_current = self.selected.map(|(image, _)| image) == Some(i);
                let mut spans = vec![Span::raw(if is_current { "> " } else { "  " })];
                for (j, color) in record.palette.colors().enumerate() {
                    let selected = self.focused && self.selected == Some((i, j));
                    spans.push(swatch_span(color, selected));
                }
                if record.palette.is_empty() {
                    spans.push(Span::styled(
                        "(no palette)",
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                let name = record
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| record.path.display().to_string());
                let name_style = if is_current {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                spans.push(Span::styled(format!("  {name}"), name_style));
                Line::from(spans)
            })
            .collect();

        Paragraph::new(lines).render(inner, buf);
    }
}

/// Recently picked colors, oldest first.
pub struct RecentWidget<'a> {
    recent: &'a RecentColors,
    selected: Option<usize>,
    format: ColorFormat,
}

impl<'a> RecentWidget<'a> {
    pub fn new(recent: &'a RecentColors, selected: Option<usize>, format: ColorFormat) -> Self {
        Self {
            recent,
            selected,
            format,
        }
    }
}

impl Widget for RecentWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut block = Block::bordered().title(format!("Recent [{}]", self.format));
        if self.selected.is_some() {
            block = block.border_style(Style::default().fg(Color::Yellow));
        }
        let inner = block.inner(area);
        block.render(area, buf);

        let mut spans = vec![Span::raw(" ")];
        for (i, color) in self.recent.list().enumerate() {
            spans.push(swatch_span(color, self.selected == Some(i)));
            spans.push(Span::raw(" "));
        }
        if let Some(color) = self.selected.and_then(|i| self.recent.get(i)) {
            spans.push(Span::raw(format!(" {}", color.format(self.format))));
        }
        Paragraph::new(Line::from(spans)).render(inner, buf);
    }
}

/// The thumbnail drawn with upper half blocks, two pixel rows per cell,
/// scaled to fit the area. An optional cursor marks the cell showing one
/// thumbnail pixel.
pub struct ThumbnailWidget<'a> {
    image: &'a RgbImage,
    cursor: Option<(u32, u32)>,
}

impl<'a> ThumbnailWidget<'a> {
    pub fn new(image: &'a RgbImage) -> Self {
        Self {
            image,
            cursor: None,
        }
    }

    pub fn with_cursor(mut self, cursor: Option<(u32, u32)>) -> Self {
        self.cursor = cursor;
        self
    }
}

impl Widget for ThumbnailWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (width, height) = self.image.dimensions();
        if width == 0 || height == 0 || area.is_empty() {
            return;
        }

        let scale = (area.width as f64 / width as f64).min(area.height as f64 * 2.0 / height as f64);
        let out_w = ((width as f64 * scale) as u32).clamp(1, area.width as u32);
        let out_h = ((height as f64 * scale) as u32).clamp(1, area.height as u32 * 2);

        let sample = |x: u32, y: u32| {
            let sx = (x * width / out_w).min(width - 1);
            let sy = (y * height / out_h).min(height - 1);
            AppColor::from(*self.image.get_pixel(sx, sy))
        };

        for cy in 0..out_h.div_ceil(2) {
            for cx in 0..out_w {
                let top = sample(cx, cy * 2);
                let pos = (area.x + cx as u16, area.y + cy as u16);
                let cell = &mut buf[pos];
                cell.set_symbol("▀").set_fg(to_color(top));
                if cy * 2 + 1 < out_h {
                    cell.set_bg(to_color(sample(cx, cy * 2 + 1)));
                }
            }
        }

        if let Some((x, y)) = self.cursor.filter(|&(x, y)| x < width && y < height) {
            let cx = (x * out_w / width).min(out_w - 1);
            let cy = (y * out_h / height).min(out_h - 1) / 2;
            let color = AppColor::from(*self.image.get_pixel(x, y));
            buf[(area.x + cx as u16, area.y + cy as u16)]
                .set_symbol("+")
                .set_fg(contrast_fg(color))
                .set_bg(to_color(color));
        }
    }
}
