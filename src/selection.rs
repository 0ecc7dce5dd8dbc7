use std::io::{self, Write};

use crate::color::{Color, ColorFormat};
use crate::history::RecentColors;

/// Something a user did with a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    ColorSelected(Color),
    FormatChanged(ColorFormat),
}

/// Receives the formatted text of every selected color.
pub trait ClipboardSink {
    fn set_text(&mut self, text: &str) -> io::Result<()>;
}

/// Writes each selection as one line.
#[derive(Debug)]
pub struct WriterSink<W: Write>(pub W);

impl<W: Write> ClipboardSink for WriterSink<W> {
    fn set_text(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.0, "{text}")?;
        self.0.flush()
    }
}

/// Keeps every selection in memory.
impl ClipboardSink for Vec<String> {
    fn set_text(&mut self, text: &str) -> io::Result<()> {
        self.push(text.to_owned());
        Ok(())
    }
}

/// Single owner of the selection state: the active output format and the
/// recent color history.
#[derive(Debug)]
pub struct Selector<C: ClipboardSink> {
    format: ColorFormat,
    recent: RecentColors,
    clipboard: C,
}

impl<C: ClipboardSink> Selector<C> {
    pub fn new(format: ColorFormat, recent: RecentColors, clipboard: C) -> Self {
        Self {
            format,
            recent,
            clipboard,
        }
    }

    /// Apply one event. A selected color is recorded in the history and its
    /// text, in the active format, is handed to the clipboard and returned.
    pub fn apply(&mut self, event: SelectionEvent) -> io::Result<Option<String>> {
        match event {
            SelectionEvent::ColorSelected(color) => {
                self.recent.record(color);
                let text = color.format(self.format);
                self.clipboard.set_text(&text)?;
                tracing::debug!(%color, format = %self.format, "color selected");
                Ok(Some(text))
            }
            SelectionEvent::FormatChanged(format) => {
                self.format = format;
                Ok(None)
            }
        }
    }

    /// Apply events in order until the source runs dry, e.g. `rx.iter()` on a
    /// channel whose senders live in other threads.
    pub fn drain(&mut self, events: impl IntoIterator<Item = SelectionEvent>) -> io::Result<()> {
        for event in events {
            self.apply(event)?;
        }
        Ok(())
    }

    pub fn format(&self) -> ColorFormat {
        self.format
    }

    pub fn recent(&self) -> &RecentColors {
        &self.recent
    }

    pub fn clipboard(&self) -> &C {
        &self.clipboard
    }

    pub fn into_clipboard(self) -> C {
        self.clipboard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    const RED: Color = Color::new(255, 0, 0);

    fn selector() -> Selector<Vec<String>> {
        Selector::new(ColorFormat::Rgb, RecentColors::default(), Vec::new())
    }

    #[test]
    fn selection_formats_and_records() {
        let mut selector = selector();
        let text = selector.apply(SelectionEvent::ColorSelected(RED)).unwrap();
        assert_eq!(text.as_deref(), Some("255, 0, 0"));

        selector
            .apply(SelectionEvent::FormatChanged(ColorFormat::Hex))
            .unwrap();
        selector.apply(SelectionEvent::ColorSelected(RED)).unwrap();

        assert_eq!(selector.clipboard(), &vec!["255, 0, 0".to_string(), "#FF0000".to_string()]);
        assert_eq!(selector.recent().list().collect::<Vec<_>>(), vec![RED]);
    }

    #[test]
    fn events_from_other_threads_are_applied_in_order() {
        let (tx, rx) = mpsc::channel();
        let producer = thread::spawn(move || {
            for v in [10u8, 20, 10, 30] {
                tx.send(SelectionEvent::ColorSelected(Color::new(v, 0, 0))).unwrap();
            }
            tx.send(SelectionEvent::FormatChanged(ColorFormat::Hex)).unwrap();
            tx.send(SelectionEvent::ColorSelected(Color::new(40, 0, 0))).unwrap();
        });

        let mut selector = selector();
        selector.drain(rx.iter()).unwrap();
        producer.join().unwrap();

        assert_eq!(selector.recent().len(), 4);
        assert_eq!(selector.format(), ColorFormat::Hex);
        assert_eq!(
            selector.into_clipboard(),
            vec!["10, 0, 0", "20, 0, 0", "10, 0, 0", "30, 0, 0", "#280000"]
        );
    }

    #[test]
    fn writer_sink_writes_lines() {
        let mut sink = WriterSink(Vec::new());
        sink.set_text("#FF0000").unwrap();
        sink.set_text("1, 2, 3").unwrap();
        assert_eq!(String::from_utf8(sink.0).unwrap(), "#FF0000\n1, 2, 3\n");
    }
}
