// Library root
// -----------
// Terminal output engine for the cws command line tool.
//
// Module responsibilities:
// - `style`: the template function set (colors, bold, the `spin` animation).
// - `template`: parses and executes the text templates commands print.
// - `wrap`: ANSI-aware hard wrapping and escape stripping.
// - `screenbuf`: renders frames to a stream and erases the previous one.
// - `spinner`: animates a title while a blocking operation runs.
// - `ui`: one-shot helpers built on the pieces above.
// - `config` / `error`: environment settings and error types.
pub mod config;
pub mod error;
pub mod screenbuf;
pub mod spinner;
pub mod style;
pub mod template;
pub mod ui;
pub mod wrap;

pub use config::Config;
pub use error::{Error, Result, TemplateError, TemplateErrorKind};
pub use screenbuf::ScreenBuf;
pub use spinner::{Outcome, Spinner};
pub use style::{Style, Styles};
pub use template::Template;
