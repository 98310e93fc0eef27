//! Guards that wrap the render context.
//!
//! Keys that only exist at render time (`data[key]`, `x|attr(name)`) cannot
//! be checked by looking at the tree.  Instead every mapping and sequence of
//! the context is handed to the engine wrapped in a guard object.  The guard
//! refuses restricted keys, remembers lookups that came up empty and prints
//! containers without following reference cycles.
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use minijinja::value::{Enumerator, Object, ObjectRepr, Value, ValueKind};
use minijinja::{Error, ErrorKind, State};

use crate::arith;
use crate::security::{is_restricted, Violation};
use crate::undefined::{hollow, is_hollow};

/// Nesting depth after which the printer stops descending.
pub const MAX_PRINT_DEPTH: usize = 32;

/// Names provided by the engine rather than by the context.
pub const ENGINE_GLOBALS: &[&str] = &["range", "dict", "debug", "namespace"];

#[derive(Debug, Default)]
struct Trace {
    violation: Option<String>,
    misses: Vec<String>,
    pending: Option<String>,
}

/// Collects what the guards observed during one render.
#[derive(Debug, Clone, Default)]
pub struct Tracker(Arc<Mutex<Trace>>);

impl Tracker {
    fn trace(&self) -> MutexGuard<'_, Trace> {
        self.0.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn record_violation(&self, message: String) {
        let mut trace = self.trace();
        if trace.violation.is_none() {
            tracing::debug!(%message, "guard refused key");
            trace.violation = Some(message);
        }
    }

    fn record_miss(&self, path: String) {
        let mut trace = self.trace();
        trace.pending = Some(path.clone());
        trace.misses.push(path);
    }

    /// Marks the most recent miss as handled.
    ///
    /// Called when a missing value ends up somewhere that accepts it, such
    /// as the `defined` test or the `default` filter.
    pub fn forgive_miss(&self) {
        self.trace().pending = None;
    }

    /// Returns the first violation that was recorded.
    pub fn violation(&self) -> Option<String> {
        self.trace().violation.clone()
    }

    /// Returns the most recent lookup that came up empty and was not
    /// forgiven since.
    pub fn pending_miss(&self) -> Option<String> {
        self.trace().pending.clone()
    }
}

fn child_path(parent: Option<&str>, key: &Value) -> String {
    match (parent, key.as_str()) {
        (None, Some(name)) => name.to_string(),
        (None, None) => key.to_string(),
        (Some(parent), Some(name)) => format!("{parent}.{name}"),
        (Some(parent), None) => format!("{parent}[{key}]"),
    }
}

/// Wraps a context value so that lookups into it are checked.
fn wrap(value: Value, path: String, fallback: Option<Value>, tracker: &Tracker) -> Value {
    if is_hollow(&value) {
        return value;
    }
    match value.kind() {
        ValueKind::Map => Value::from_object(GuardedMap {
            inner: value,
            path: Some(path),
            fallback,
            tracker: tracker.clone(),
        }),
        ValueKind::Seq => Value::from_object(GuardedSeq {
            inner: value,
            path,
            fallback,
            tracker: tracker.clone(),
        }),
        _ => value,
    }
}

/// Calls a method that the wrapped container really has.
///
/// The fallback must not answer here or every unknown method, including
/// the ones the engine provides itself, would resolve to the sentinel.
fn call_inner_method(
    inner: &Value,
    tracker: &Tracker,
    state: &State<'_, '_>,
    method: &str,
    args: &[Value],
) -> Result<Value, Error> {
    if is_restricted(method) {
        let message = Violation::Attribute.message(method);
        tracker.record_violation(message.clone());
        return Err(Error::new(ErrorKind::InvalidOperation, message));
    }
    match inner.get_attr(method) {
        Ok(value) if !value.is_undefined() => value.call(state, args),
        _ => Err(Error::from(ErrorKind::UnknownMethod)),
    }
}

/// Builds the guarded root of the render context.
///
/// With `permissive` set, names and keys that the context lacks resolve to
/// the hollow sentinel instead of the engine's undefined value, at any depth.
/// Engine globals and the checked arithmetic functions are never shadowed.
pub fn guard_context(ctx: Value, tracker: &Tracker, permissive: bool) -> Value {
    Value::from_object(GuardedMap {
        inner: ctx,
        path: None,
        fallback: permissive.then(hollow),
        tracker: tracker.clone(),
    })
}

/// A mapping whose lookups are checked.
#[derive(Debug)]
pub struct GuardedMap {
    inner: Value,
    path: Option<String>,
    fallback: Option<Value>,
    tracker: Tracker,
}

impl Object for GuardedMap {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Map
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        if let Some(name) = key.as_str() {
            if is_restricted(name) {
                self.tracker
                    .record_violation(Violation::Item.message(name));
                return None;
            }
            if self.path.is_none()
                && (ENGINE_GLOBALS.contains(&name) || arith::is_function(name))
            {
                return None;
            }
        }
        let path = child_path(self.path.as_deref(), key);
        match self.inner.get_item(key) {
            Ok(value) if !value.is_undefined() => Some(wrap(
                value,
                path,
                self.fallback.clone(),
                &self.tracker,
            )),
            _ => {
                self.tracker.record_miss(path);
                self.fallback.clone()
            }
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        match self.inner.try_iter() {
            Ok(keys) => Enumerator::Values(keys.collect()),
            Err(_) => Enumerator::Empty,
        }
    }

    fn is_true(self: &Arc<Self>) -> bool {
        self.inner.is_true()
    }

    fn call_method(
        self: &Arc<Self>,
        state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        call_inner_method(&self.inner, &self.tracker, state, method, args)
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Printer::default().print(&self.inner, f)
    }
}

/// A sequence whose items are checked.
#[derive(Debug)]
pub struct GuardedSeq {
    inner: Value,
    path: String,
    fallback: Option<Value>,
    tracker: Tracker,
}

impl Object for GuardedSeq {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Seq
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let path = child_path(Some(&self.path), key);
        match self.inner.get_item(key) {
            Ok(value) if !value.is_undefined() => Some(wrap(
                value,
                path,
                self.fallback.clone(),
                &self.tracker,
            )),
            _ => {
                self.tracker.record_miss(path);
                self.fallback.clone()
            }
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Seq(self.inner.len().unwrap_or(0))
    }

    fn is_true(self: &Arc<Self>) -> bool {
        self.inner.is_true()
    }

    fn call_method(
        self: &Arc<Self>,
        state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        call_inner_method(&self.inner, &self.tracker, state, method, args)
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Printer::default().print(&self.inner, f)
    }
}

/// Strips the guard from a value.
fn unguard(value: &Value) -> &Value {
    if let Some(map) = value.downcast_object_ref::<GuardedMap>() {
        &map.inner
    } else if let Some(seq) = value.downcast_object_ref::<GuardedSeq>() {
        &seq.inner
    } else {
        value
    }
}

/// Prints values without following reference cycles.
///
/// A container that is one of its own ancestors, or that sits deeper than
/// [`MAX_PRINT_DEPTH`], is printed as `[...]` or `{...}`.
#[derive(Default)]
pub struct Printer {
    ancestors: Vec<Value>,
}

impl Printer {
    fn is_ancestor(&self, value: &Value) -> bool {
        self.ancestors
            .iter()
            .any(|x| minijinja::tests::is_sameas(x, value))
    }

    /// Prints a value to the formatter.
    pub fn print(&mut self, value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = unguard(value);
        if is_hollow(value) {
            return Ok(());
        }
        let (open, close) = match value.kind() {
            ValueKind::Seq => ("[", "]"),
            ValueKind::Map => ("{", "}"),
            _ => return write!(f, "{value}"),
        };
        if self.ancestors.len() >= MAX_PRINT_DEPTH || self.is_ancestor(value) {
            return write!(f, "{open}...{close}");
        }
        let Ok(iter) = value.try_iter() else {
            return write!(f, "{open}{close}");
        };
        self.ancestors.push(value.clone());
        f.write_str(open)?;
        for (idx, item) in iter.enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            self.print_item(&item, f)?;
            if value.kind() == ValueKind::Map {
                f.write_str(": ")?;
                let child = value.get_item(&item).unwrap_or(Value::UNDEFINED);
                self.print_item(&child, f)?;
            }
        }
        f.write_str(close)?;
        self.ancestors.pop();
        Ok(())
    }

    fn print_item(&mut self, value: &Value, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match value.as_str() {
            Some(s) => write!(f, "{s:?}"),
            None => self.print(value, f),
        }
    }
}
