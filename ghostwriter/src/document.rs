use std::io::{Cursor, Read, Seek};

use minijinja::machinery::ast::Stmt;
use minijinja::machinery::{parse, WhitespaceConfig};
use minijinja::syntax::SyntaxConfig;
use minijinja::value::Value;

use crate::encoding::decode;
use crate::engine;
use crate::error::{Error, ErrorKind};
use crate::format::FormatType;
use crate::limits::Limits;
use crate::security::{runtime, static_check};
use crate::state::{ApplyOutcome, ValidationState};
use crate::undefined::UndefinedPolicy;

fn parse_source<'s>(name: &'s str, source: &'s str) -> Result<Stmt<'s>, Error> {
    parse(
        source,
        name,
        SyntaxConfig::default(),
        WhitespaceConfig::default(),
    )
    .map_err(Error::from)
}

/// A template that went through the load-time checks.
///
/// Loading runs the size guard, the encoding check, the parser and the
/// static scan, in that order, and stops at the first failure.  Every call
/// to [`apply`](Self::apply) then parses the kept source again, checks it
/// against the context and renders it.
///
/// ```
/// use ghostwriter::{Document, FormatType, UndefinedPolicy};
/// use minijinja::context;
///
/// let mut doc = Document::from_bytes("hello.txt", b"Hello {{ name }}!");
/// let outcome = doc.apply(
///     &context! { name => "World" },
///     FormatType::Raw,
///     UndefinedPolicy::Strict,
/// );
/// assert_eq!(outcome.rendered_text, "Hello World!");
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    source: Option<String>,
    limits: Limits,
    state: ValidationState,
    load_error: Option<Error>,
}

impl Document {
    /// Loads a template from a seekable reader.
    pub fn load<R: Read + Seek>(name: &str, mut reader: R, limits: Limits) -> Document {
        let result = Document::read_source(name, &mut reader, &limits);
        let mut state = ValidationState::default();
        state.record(result.as_ref().err());
        let (source, load_error) = match result {
            Ok(source) => (Some(source), None),
            Err(err) => {
                tracing::debug!(name, kind = %err.kind(), "template rejected");
                (None, Some(err))
            }
        };
        Document {
            name: name.to_string(),
            source,
            limits,
            state,
            load_error,
        }
    }

    /// Loads a template from memory with the default limits.
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Document {
        Document::load(name, Cursor::new(bytes), Limits::default())
    }

    fn read_source<R: Read + Seek>(
        name: &str,
        reader: &mut R,
        limits: &Limits,
    ) -> Result<String, Error> {
        let size = limits.check_file_size(reader)?;
        tracing::debug!(name, size, "template size ok");
        let mut bytes = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
        reader.read_to_end(&mut bytes).map_err(|err| {
            Error::new(
                ErrorKind::Encoding,
                format!("Template file could not be read: {err}"),
            )
        })?;
        let source = decode(&bytes)?;
        let tree = parse_source(name, source)?;
        static_check::check(&tree, limits)?;
        tracing::debug!(name, "template passed static checks");
        Ok(source.to_string())
    }

    /// Returns the name of the template.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the validated source.
    ///
    /// This is `None` if the template failed to load.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Returns the limits in effect.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Returns the state left behind by the most recent step.
    pub fn state(&self) -> &ValidationState {
        &self.state
    }

    /// Returns `true` if the most recent step succeeded.
    pub fn is_valid(&self) -> bool {
        self.state.is_valid()
    }

    /// Returns the message of the most recent failure.
    pub fn error_message(&self) -> Option<&str> {
        self.state.error_message()
    }

    /// Renders the template against a context and formats the result.
    ///
    /// On a template that failed to load this returns the load error without
    /// rendering anything.
    pub fn apply(
        &mut self,
        ctx: &Value,
        format: FormatType,
        policy: UndefinedPolicy,
    ) -> ApplyOutcome {
        let result = match (&self.source, &self.load_error) {
            (Some(source), _) => {
                self.state.reset();
                Document::render(&self.name, source, &self.limits, ctx, format, policy)
            }
            (None, Some(err)) => Err(err.clone()),
            (None, None) => Err(Error::new(ErrorKind::Syntax, "Template is not loaded")),
        };
        self.state.record(result.as_ref().err());
        ApplyOutcome::from_result(result)
    }

    /// Like [`apply`](Self::apply) but takes the raw format type code.
    pub fn apply_with_code(
        &mut self,
        ctx: &Value,
        format: i64,
        policy: UndefinedPolicy,
    ) -> ApplyOutcome {
        match FormatType::try_from(format) {
            Ok(format) => self.apply(ctx, format, policy),
            Err(err) => {
                self.state.set_error(err.to_string());
                ApplyOutcome::from_result(Err(err))
            }
        }
    }

    fn render(
        name: &str,
        source: &str,
        limits: &Limits,
        ctx: &Value,
        format: FormatType,
        policy: UndefinedPolicy,
    ) -> Result<String, Error> {
        let tree = parse_source(name, source)?;
        runtime::check(&tree, ctx)?;
        tracing::debug!(name, ?policy, "template passed runtime checks");
        let rendered = engine::render(name, source, &tree, ctx, policy)?;
        limits.check_output_size(&rendered)?;
        tracing::debug!(name, bytes = rendered.len(), %format, "template rendered");
        Ok(format.apply(&rendered))
    }
}

/// Runs the load-time checks over template bytes.
pub fn validate(name: &str, bytes: &[u8], limits: Limits) -> ValidationState {
    Document::load(name, Cursor::new(bytes), limits).state().clone()
}
