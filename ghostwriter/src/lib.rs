//! Ghostwriter renders untrusted Jinja2 templates against structured data.
//!
//! Templates are user editable text and therefore treated as hostile.  Before
//! anything is evaluated a template goes through a fixed pipeline:
//!
//! 1. the source size is checked against [`Limits::max_file_size`],
//! 2. the bytes must be strict UTF-8 without NUL bytes,
//! 3. the source is parsed (syntax errors are passed through verbatim),
//! 4. the tree is scanned for forbidden tags (`macro`, `include`, `extends`,
//!    `import`, `do`) and for literal `range()` loops that are too long.
//!
//! Rendering adds a second round of checks.  Names, attributes, item keys
//! and call targets that give access to reflection or code evaluation are
//! rejected, the context is wrapped so that keys only known at render time
//! are checked too, and the rendered text must fit
//! [`Limits::max_output_size`] before it is handed to the
//! [`FormatType`] post-processor.
//!
//! ```
//! use ghostwriter::{Document, FormatType, UndefinedPolicy};
//! use minijinja::context;
//!
//! let mut doc = Document::from_bytes("greeting", b"Hello {{ name }}!");
//! assert!(doc.is_valid());
//!
//! let outcome = doc.apply(&context! {}, FormatType::Raw, UndefinedPolicy::Permissive);
//! assert_eq!(outcome.rendered_text, "Hello !");
//!
//! let outcome = doc.apply(&context! {}, FormatType::Raw, UndefinedPolicy::Strict);
//! assert_eq!(outcome.error_message.as_deref(), Some("'name' is undefined"));
//! ```
//!
//! Every failure ends up as a plain message in the [`ValidationState`] of
//! the document; nothing in the pipeline panics on bad input.
#![deny(missing_docs)]

mod arith;
mod document;
mod encoding;
mod engine;
mod error;
mod filters;
mod format;
mod limits;
mod state;
mod undefined;

pub mod security;
pub mod visit;

pub use self::document::{validate, Document};
pub use self::encoding::decode;
pub use self::error::{Error, ErrorKind};
pub use self::format::{format, FormatType};
pub use self::limits::{
    Limits, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_OUTPUT_SIZE, DEFAULT_MAX_RANGE_SIZE,
};
pub use self::state::{ApplyOutcome, ValidationState};
pub use self::undefined::{hollow, is_hollow, Hollow, UndefinedPolicy};
