pub mod widgets;

use std::io;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Gauge, Paragraph};
use ratatui::{DefaultTerminal, Frame};

use crate::color::Color as AppColor;
use crate::pipeline::ingest::ImageRecord;
use crate::selection::{ClipboardSink, SelectionEvent, Selector};

use widgets::{PaletteListWidget, RecentWidget, ThumbnailWidget};

const TICK: Duration = Duration::from_millis(50);
const PREVIEW_WIDTH: u16 = 48;
/// Pixels moved per step with the capital movement keys.
const PIXEL_STEP: i32 = 10;

/// Updates forwarded from the ingestion thread.
#[derive(Debug)]
pub enum UiMessage {
    Record(ImageRecord),
    Skipped { path: PathBuf, reason: String },
    Progress(f64),
    Finished { loaded: usize, skipped: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Images,
    /// Pixel cursor over the preview of the current image.
    Thumbnail,
    Recent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// State for the interactive picker.
pub struct TuiApp<C: ClipboardSink> {
    records: Vec<ImageRecord>,
    selector: Selector<C>,
    focus: Focus,
    image: usize,
    swatch: usize,
    /// `(x, y)` of the pixel cursor in thumbnail coordinates.
    pixel: (u32, u32),
    recent: usize,
    progress: Option<f64>,
    status: String,
}

impl<C: ClipboardSink> TuiApp<C> {
    pub fn new(selector: Selector<C>) -> Self {
        Self {
            records: Vec::new(),
            selector,
            focus: Focus::Images,
            image: 0,
            swatch: 0,
            pixel: (0, 0),
            recent: 0,
            progress: Some(0.0),
            status: "loading images...".into(),
        }
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn selector(&self) -> &Selector<C> {
        &self.selector
    }

    pub fn into_selector(self) -> Selector<C> {
        self.selector
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn pixel(&self) -> (u32, u32) {
        self.pixel
    }

    pub fn handle_message(&mut self, message: UiMessage) {
        match message {
            UiMessage::Record(record) => self.records.push(record),
            UiMessage::Skipped { path, reason } => {
                self.status = format!("skipped {}: {reason}", path.display());
            }
            UiMessage::Progress(value) => self.progress = Some(value),
            UiMessage::Finished { loaded, skipped } => {
                self.progress = None;
                self.status = format!("{loaded} loaded, {skipped} skipped");
            }
        }
    }

    /// Color under the cursor in the focused pane.
    pub fn current_color(&self) -> Option<AppColor> {
        match self.focus {
            Focus::Images => self
                .records
                .get(self.image)
                .and_then(|r| r.palette.swatches().get(self.swatch))
                .map(|s| s.color),
            Focus::Thumbnail => {
                let (x, y) = self.pixel;
                self.records
                    .get(self.image)
                    .and_then(|r| r.thumbnail.get_pixel_checked(x, y))
                    .map(|&p| AppColor::from(p))
            }
            Focus::Recent => self.selector.recent().get(self.recent),
        }
    }

    pub fn handle_key(&mut self, key: KeyCode) -> io::Result<Control> {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(Control::Quit),
            KeyCode::Tab => {
                self.focus = self.next_focus();
                self.recent = self.recent.min(self.selector.recent().len().saturating_sub(1));
                self.clamp_pixel();
            }
            KeyCode::Left | KeyCode::Char('h') if self.focus == Focus::Thumbnail => {
                self.move_pixel(-1, 0)
            }
            KeyCode::Right | KeyCode::Char('l') if self.focus == Focus::Thumbnail => {
                self.move_pixel(1, 0)
            }
            KeyCode::Up | KeyCode::Char('k') if self.focus == Focus::Thumbnail => {
                self.move_pixel(0, -1)
            }
            KeyCode::Down | KeyCode::Char('j') if self.focus == Focus::Thumbnail => {
                self.move_pixel(0, 1)
            }
            KeyCode::Char('H') if self.focus == Focus::Thumbnail => self.move_pixel(-PIXEL_STEP, 0),
            KeyCode::Char('L') if self.focus == Focus::Thumbnail => self.move_pixel(PIXEL_STEP, 0),
            KeyCode::Char('K') if self.focus == Focus::Thumbnail => self.move_pixel(0, -PIXEL_STEP),
            KeyCode::Char('J') if self.focus == Focus::Thumbnail => self.move_pixel(0, PIXEL_STEP),
            KeyCode::Up | KeyCode::Char('k') if self.focus == Focus::Images => {
                self.image = self.image.saturating_sub(1);
                self.clamp_swatch();
                self.clamp_pixel();
            }
            KeyCode::Down | KeyCode::Char('j') if self.focus == Focus::Images => {
                if self.image + 1 < self.records.len() {
                    self.image += 1;
                }
                self.clamp_swatch();
                self.clamp_pixel();
            }
            KeyCode::Left | KeyCode::Char('h') => match self.focus {
                Focus::Images => self.swatch = self.swatch.saturating_sub(1),
                Focus::Recent => self.recent = self.recent.saturating_sub(1),
                Focus::Thumbnail => {}
            },
            KeyCode::Right | KeyCode::Char('l') => match self.focus {
                Focus::Images => {
                    self.swatch += 1;
                    self.clamp_swatch();
                }
                Focus::Recent => {
                    if self.recent + 1 < self.selector.recent().len() {
                        self.recent += 1;
                    }
                }
                Focus::Thumbnail => {}
            },
            KeyCode::Char('f') => {
                let next = self.selector.format().next();
                self.selector.apply(SelectionEvent::FormatChanged(next))?;
                self.status = format!("format: {next}");
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(color) = self.current_color() {
                    if let Some(text) = self.selector.apply(SelectionEvent::ColorSelected(color))? {
                        self.status = format!("copied {text}");
                    }
                }
            }
            _ => {}
        }
        Ok(Control::Continue)
    }

    fn next_focus(&self) -> Focus {
        let has_image = !self.records.is_empty();
        let has_recent = !self.selector.recent().is_empty();
        match self.focus {
            Focus::Images if has_image => Focus::Thumbnail,
            Focus::Images | Focus::Thumbnail if has_recent => Focus::Recent,
            _ => Focus::Images,
        }
    }

    fn move_pixel(&mut self, dx: i32, dy: i32) {
        let (x, y) = self.pixel;
        self.pixel = (x.saturating_add_signed(dx), y.saturating_add_signed(dy));
        self.clamp_pixel();
    }

    fn clamp_pixel(&mut self) {
        let (width, height) = self
            .records
            .get(self.image)
            .map(|r| r.thumbnail.dimensions())
            .unwrap_or((0, 0));
        self.pixel = (
            self.pixel.0.min(width.saturating_sub(1)),
            self.pixel.1.min(height.saturating_sub(1)),
        );
    }

    fn clamp_swatch(&mut self) {
        let len = self
            .records
            .get(self.image)
            .map(|r| r.palette.len())
            .unwrap_or(0);
        self.swatch = self.swatch.min(len.saturating_sub(1));
    }

    fn draw(&self, frame: &mut Frame) {
        let [main, recent, footer] = Layout::vertical([
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(frame.area());
        let [list, preview] =
            Layout::horizontal([Constraint::Min(20), Constraint::Length(PREVIEW_WIDTH)]).areas(main);

        let selected = (!self.records.is_empty()).then_some((self.image, self.swatch));
        frame.render_widget(
            PaletteListWidget::new(&self.records, selected, self.focus == Focus::Images),
            list,
        );

        let picking = self.focus == Focus::Thumbnail;
        let preview_block = if picking {
            let (x, y) = self.pixel;
            Block::bordered()
                .title(format!("Preview ({x}, {y})"))
                .border_style(Style::default().fg(Color::Yellow))
        } else {
            Block::bordered().title("Preview")
        };
        let preview_inner = preview_block.inner(preview);
        frame.render_widget(preview_block, preview);
        if let Some(record) = self.records.get(self.image) {
            frame.render_widget(
                ThumbnailWidget::new(&record.thumbnail).with_cursor(picking.then_some(self.pixel)),
                preview_inner,
            );
        }

        let recent_selected = (self.focus == Focus::Recent).then_some(self.recent);
        frame.render_widget(
            RecentWidget::new(self.selector.recent(), recent_selected, self.selector.format()),
            recent,
        );

        match self.progress {
            Some(value) => frame.render_widget(
                Gauge::default()
                    .gauge_style(Style::default().fg(Color::Cyan))
                    .ratio((value / 100.0).clamp(0.0, 1.0))
                    .label(format!("{value:.0}%")),
                footer,
            ),
            None => frame.render_widget(
                Paragraph::new(Line::from(format!(
                    " {}  |  arrows move  tab pane  HJKL jump  enter copy  f format  q quit",
                    self.status
                ))),
                footer,
            ),
        }
    }
}

/// Run the picker until the user quits, draining `updates` between key
/// presses.
pub fn run<C: ClipboardSink>(app: &mut TuiApp<C>, updates: Receiver<UiMessage>) -> Result<()> {
    let mut terminal = ratatui::try_init().context("failed to initialize terminal")?;
    let result = event_loop(&mut terminal, app, &updates);
    ratatui::restore();
    result
}

fn event_loop<C: ClipboardSink>(
    terminal: &mut DefaultTerminal,
    app: &mut TuiApp<C>,
    updates: &Receiver<UiMessage>,
) -> Result<()> {
    loop {
        for message in updates.try_iter() {
            app.handle_message(message);
        }
        terminal.draw(|frame| app.draw(frame))?;

        if !event::poll(TICK)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && app.handle_key(key.code)? == Control::Quit {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorFormat;
    use crate::history::RecentColors;
    use crate::pipeline::extract::extract_rgb;
    use image::RgbImage;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(colors: &[AppColor]) -> ImageRecord {
        let palette = extract_rgb(colors, colors.len(), 10, &mut StdRng::seed_from_u64(3))
            .unwrap()
            .palette;
        ImageRecord {
            path: PathBuf::from("/pics/test.png"),
            thumbnail: RgbImage::new(2, 2),
            palette,
        }
    }

    fn app() -> TuiApp<Vec<String>> {
        TuiApp::new(Selector::new(ColorFormat::Rgb, RecentColors::default(), Vec::new()))
    }

    #[test]
    fn enter_copies_swatch_under_cursor() {
        let mut app = app();
        // a single distinct color per image keeps palette order predictable
        app.handle_message(UiMessage::Record(record(&[AppColor::new(255, 0, 0)])));
        app.handle_message(UiMessage::Record(record(&[AppColor::new(0, 0, 255)])));

        app.handle_key(KeyCode::Down).unwrap();
        app.handle_key(KeyCode::Enter).unwrap();
        app.handle_key(KeyCode::Char('f')).unwrap();
        app.handle_key(KeyCode::Up).unwrap();
        app.handle_key(KeyCode::Enter).unwrap();

        assert_eq!(app.selector().clipboard(), &vec!["0, 0, 255".to_string(), "#FF0000".to_string()]);
        assert_eq!(app.selector().recent().len(), 2);
        assert_eq!(app.status(), "copied #FF0000");
    }

    #[test]
    fn recent_colors_are_selectable() {
        let mut app = app();
        app.handle_message(UiMessage::Record(record(&[AppColor::new(1, 2, 3)])));
        app.handle_key(KeyCode::Enter).unwrap();
        app.handle_key(KeyCode::Tab).unwrap();
        app.handle_key(KeyCode::Tab).unwrap();
        assert_eq!(app.focus(), Focus::Recent);
        assert_eq!(app.current_color(), Some(AppColor::new(1, 2, 3)));

        app.handle_key(KeyCode::Char(' ')).unwrap();
        assert_eq!(app.selector().recent().len(), 1);
        assert_eq!(app.selector().clipboard().len(), 2);
    }

    #[test]
    fn tab_stays_on_images_without_history() {
        let mut app = app();
        app.handle_key(KeyCode::Tab).unwrap();
        assert_eq!(app.current_color(), None);
        assert_eq!(app.handle_key(KeyCode::Enter).unwrap(), Control::Continue);
        assert!(app.selector().clipboard().is_empty());
    }

    #[test]
    fn cursor_is_clamped_to_palette() {
        let mut app = app();
        app.handle_message(UiMessage::Record(record(&[AppColor::new(9, 9, 9)])));
        for _ in 0..5 {
            app.handle_key(KeyCode::Right).unwrap();
        }
        assert_eq!(app.current_color(), Some(AppColor::new(9, 9, 9)));
    }

    #[test]
    fn thumbnail_pixels_are_selectable() {
        let mut app = app();
        let mut loaded = record(&[AppColor::new(0, 0, 0)]);
        loaded.thumbnail = RgbImage::from_fn(30, 20, |x, y| image::Rgb([x as u8, y as u8, 7]));
        app.handle_message(UiMessage::Record(loaded));

        app.handle_key(KeyCode::Tab).unwrap();
        assert_eq!(app.focus(), Focus::Thumbnail);
        app.handle_key(KeyCode::Right).unwrap();
        app.handle_key(KeyCode::Char('L')).unwrap();
        app.handle_key(KeyCode::Char('j')).unwrap();
        assert_eq!(app.pixel(), (11, 1));

        app.handle_key(KeyCode::Enter).unwrap();
        assert_eq!(app.selector().clipboard(), &vec!["11, 1, 7".to_string()]);
        assert_eq!(app.selector().recent().get(0), Some(AppColor::new(11, 1, 7)));
    }

    #[test]
    fn thumbnail_cursor_stays_inside_the_image() {
        let mut app = app();
        let mut loaded = record(&[AppColor::new(0, 0, 0)]);
        loaded.thumbnail = RgbImage::from_fn(12, 5, |x, y| image::Rgb([x as u8, y as u8, 0]));
        app.handle_message(UiMessage::Record(loaded));
        app.handle_key(KeyCode::Tab).unwrap();

        for _ in 0..3 {
            app.handle_key(KeyCode::Char('L')).unwrap();
            app.handle_key(KeyCode::Char('J')).unwrap();
        }
        assert_eq!(app.pixel(), (11, 4));
        app.handle_key(KeyCode::Char('H')).unwrap();
        app.handle_key(KeyCode::Char('K')).unwrap();
        app.handle_key(KeyCode::Up).unwrap();
        assert_eq!(app.pixel(), (1, 0));
        assert_eq!(app.current_color(), Some(AppColor::new(1, 0, 0)));
    }

    #[test]
    fn tab_cycles_through_panes() {
        let mut app = app();
        app.handle_message(UiMessage::Record(record(&[AppColor::new(5, 5, 5)])));
        app.handle_key(KeyCode::Enter).unwrap();

        app.handle_key(KeyCode::Tab).unwrap();
        assert_eq!(app.focus(), Focus::Thumbnail);
        app.handle_key(KeyCode::Tab).unwrap();
        assert_eq!(app.focus(), Focus::Recent);
        app.handle_key(KeyCode::Tab).unwrap();
        assert_eq!(app.focus(), Focus::Images);
    }

    #[test]
    fn finished_message_updates_status() {
        let mut app = app();
        app.handle_message(UiMessage::Finished {
            loaded: 2,
            skipped: 1,
        });
        assert_eq!(app.status(), "2 loaded, 1 skipped");
        assert_eq!(app.handle_key(KeyCode::Char('q')).unwrap(), Control::Quit);
    }
}
