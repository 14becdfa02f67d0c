// Screen buffer: renders templated text to a terminal-like sink, remembers how
// many lines the last frame used, and erases them before the next frame.
//
// All mutable state sits behind one mutex. Templates are executed while the
// lock is held, which is also what keeps the `spin` cursor consistent when a
// spinner ticks from another thread.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossterm::cursor::MoveUp;
use crossterm::terminal::{self, Clear, ClearType};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::style::{ansi, Styles};
use crate::template::Template;
use crate::wrap::wrap;

/// Width used when the terminal size cannot be queried.
pub const DEFAULT_WIDTH: u16 = 80;

const INLINE_NAME: &str = "screenbuf";

/// Inline templates kept compiled before the cache is dropped and refilled.
const COMPILED_LIMIT: usize = 64;

type SizeQuery = fn() -> io::Result<(u16, u16)>;

/// Control sequence that moves up one line and clears it.
pub fn erase_line() -> String {
    format!("{}{}", ansi(MoveUp(1)), ansi(Clear(ClearType::CurrentLine)))
}

#[derive(Debug, Clone, Copy)]
enum Width {
    /// Ask on every write; the first failure pins the fallback width.
    Query(SizeQuery),
    Fixed(u16),
}

/// Render/erase/flush abstraction over an output stream.
///
/// Only one `ScreenBuf` should drive a given stream at a time; two buffers on
/// the same terminal will erase each other's lines.
pub struct ScreenBuf<W: Write> {
    state: Mutex<State<W>>,
}

struct State<W> {
    sink: W,
    pending: String,
    /// Line breaks written to the sink since the last reset.
    lines: usize,
    wrap: bool,
    width: Width,
    fallback_width: u16,
    compiled: HashMap<String, Template>,
    named: HashMap<String, Template>,
    styles: Styles,
}

impl<W: Write> ScreenBuf<W> {
    /// A buffer that wraps to the current terminal width.
    pub fn new(sink: W) -> Self {
        Self::from_config(sink, &Config::default())
    }

    pub fn from_config(sink: W, config: &Config) -> Self {
        ScreenBuf {
            state: Mutex::new(State {
                sink,
                pending: String::new(),
                lines: 0,
                wrap: config.wrap,
                width: Width::Query(terminal::size),
                fallback_width: config.fallback_width,
                compiled: HashMap::new(),
                named: HashMap::new(),
                styles: Styles::new(),
            }),
        }
    }

    /// Enable or disable wrapping. Unwrapped output keeps its authored line
    /// structure.
    pub fn with_wrap(mut self, wrap: bool) -> Self {
        self.state_mut().wrap = wrap;
        self
    }

    /// Wrap to a fixed width instead of querying the terminal.
    pub fn with_width(mut self, width: u16) -> Self {
        self.state_mut().width = Width::Fixed(width);
        self
    }

    #[cfg(test)]
    fn with_size_query(mut self, query: SizeQuery) -> Self {
        self.state_mut().width = Width::Query(query);
        self
    }

    /// Register a named template for [`ScreenBuf::render_tmpl`] and
    /// [`ScreenBuf::write_tmpl`]. Re-registering a name replaces it.
    pub fn register(&self, name: &str, source: &str) -> Result<()> {
        let template = Template::parse(name, source)?;
        self.lock().named.insert(name.to_string(), template);
        Ok(())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.lock().named.contains_key(name)
    }

    /// Erase the previous frame, then write and flush `source` rendered with
    /// `data`.
    ///
    /// On a template error nothing is flushed, but the erase sequence stays
    /// queued and the line count is already zero.
    pub fn render<T: Serialize + ?Sized>(&self, source: &str, data: &T) -> Result<()> {
        let data = serde_json::to_value(data)?;
        let mut state = self.lock();
        state.reset();
        state.write_source(source, &data)?;
        state.flush()
    }

    /// Like [`ScreenBuf::render`] for a registered template.
    pub fn render_tmpl<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<()> {
        let data = serde_json::to_value(data)?;
        let mut state = self.lock();
        state.reset();
        state.write_named(name, &data)?;
        state.flush()
    }

    /// Queue the erase sequence for everything flushed since the last reset.
    pub fn reset(&self) -> Result<()> {
        self.lock().reset();
        Ok(())
    }

    /// Render into the pending buffer without touching the sink.
    pub fn write<T: Serialize + ?Sized>(&self, source: &str, data: &T) -> Result<()> {
        let data = serde_json::to_value(data)?;
        self.lock().write_source(source, &data)
    }

    pub fn write_tmpl<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<()> {
        let data = serde_json::to_value(data)?;
        self.lock().write_named(name, &data)
    }

    /// Copy the pending buffer to the sink.
    pub fn flush(&self) -> Result<()> {
        self.lock().flush()
    }

    /// Number of lines the next reset will erase.
    pub fn lines(&self) -> usize {
        self.lock().lines
    }

    pub fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .sink
    }

    fn lock(&self) -> MutexGuard<'_, State<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&mut self) -> &mut State<W> {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write> State<W> {
    fn reset(&mut self) {
        self.pending.clear();
        self.pending.push_str(&erase_line().repeat(self.lines));
        self.lines = 0;
    }

    fn write_source(&mut self, source: &str, data: &Value) -> Result<()> {
        if !self.compiled.contains_key(source) {
            if self.compiled.len() >= COMPILED_LIMIT {
                trace!(limit = COMPILED_LIMIT, "dropping compiled template cache");
                self.compiled.clear();
            }
            let template = Template::parse(INLINE_NAME, source)?;
            self.compiled.insert(source.to_string(), template);
        }
        let text = self.compiled[source].execute(data, &mut self.styles)?;
        self.append(&text);
        Ok(())
    }

    fn write_named(&mut self, name: &str, data: &Value) -> Result<()> {
        let template = self
            .named
            .get(name)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))?;
        let text = template.execute(data, &mut self.styles)?;
        self.append(&text);
        Ok(())
    }

    fn append(&mut self, text: &str) {
        let mut text = if self.wrap {
            wrap(text, usize::from(self.width()))
        } else {
            text.to_string()
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        self.pending.push_str(&text);
    }

    fn width(&mut self) -> u16 {
        match self.width {
            Width::Fixed(width) => width,
            Width::Query(query) => match query() {
                Ok((cols, _)) if cols > 0 => cols,
                result => {
                    debug!(?result, fallback = self.fallback_width, "terminal width unavailable");
                    self.width = Width::Fixed(self.fallback_width);
                    self.fallback_width
                }
            },
        }
    }

    fn flush(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        self.sink.write_all(pending.as_bytes())?;
        self.sink.flush()?;
        self.lines += pending.matches('\n').count();
        trace!(bytes = pending.len(), lines = self.lines, "flushed screen buffer");
        Ok(())
    }
}
