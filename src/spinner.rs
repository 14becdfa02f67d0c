// Spinner controller.
//
// Runs a blocking operation on the caller's thread while a scoped ticker
// thread re-renders `<glyph> <title>` through a [`ScreenBuf`]. When the
// operation returns, the ticker is stopped and joined before the final
// success or failure frame is drawn, so no late tick can overwrite it.
//
// There is no timeout: an operation that never returns spins forever.

use std::io::Write;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::screenbuf::ScreenBuf;

pub const TICK_INTERVAL: Duration = Duration::from_millis(25);
pub const SUCCESS_GLYPH: &str = "✅";
pub const FAILURE_GLYPH: &str = "🔥";

/// Shared by the tick frames and the final frame, so it is parsed once.
pub const TEMPLATE_NAME: &str = "spinner";
const TEMPLATE: &str = "{{if .Glyph}}{{.Glyph}}{{else}}{{spin}}{{end}} {{.Title}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

impl Outcome {
    pub fn glyph(self) -> &'static str {
        match self {
            Outcome::Succeeded => SUCCESS_GLYPH,
            Outcome::Failed => FAILURE_GLYPH,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Frame<'a> {
    title: &'a str,
    /// Empty while spinning.
    glyph: &'a str,
}

pub struct Spinner<'a, W: Write> {
    buf: &'a ScreenBuf<W>,
    title: String,
    interval: Duration,
}

impl<'a, W: Write + Send> Spinner<'a, W> {
    pub fn new(buf: &'a ScreenBuf<W>, title: impl Into<String>) -> Self {
        Spinner {
            buf,
            title: title.into(),
            interval: TICK_INTERVAL,
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run `op` while animating, then draw the outcome frame and return the
    /// operation's result unchanged. A failure to draw the final frame is
    /// logged and never replaces the operation's own result.
    pub fn spin<T, E, F>(self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if !self.buf.has_template(TEMPLATE_NAME) {
            if let Err(err) = self.buf.register(TEMPLATE_NAME, TEMPLATE) {
                warn!(%err, "failed to register spinner template");
            }
        }

        let started = Instant::now();
        debug!(title = %self.title, interval = ?self.interval, "spinner started");

        let (stop, stopped) = mpsc::channel::<()>();
        let result = thread::scope(|scope| {
            let this = &self;
            let ticker = scope.spawn(move || this.tick(stopped));
            let result = op();
            drop(stop);
            if ticker.join().is_err() {
                warn!("spinner ticker panicked");
            }
            result
        });

        let outcome = if result.is_ok() {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        };
        let frame = Frame {
            title: &self.title,
            glyph: outcome.glyph(),
        };
        if let Err(err) = self.buf.render_tmpl(TEMPLATE_NAME, &frame) {
            warn!(%err, "failed to render final spinner frame");
        }
        debug!(?outcome, elapsed = ?started.elapsed(), "spinner finished");
        result
    }

    fn tick(&self, stopped: Receiver<()>) {
        let frame = Frame {
            title: &self.title,
            glyph: "",
        };
        loop {
            match stopped.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(err) = self.buf.render_tmpl(TEMPLATE_NAME, &frame) {
                        debug!(%err, "spinner frame skipped");
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}
