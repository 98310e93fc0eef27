use std::fmt;
use std::sync::Arc;

use minijinja::value::{Enumerator, Object, ObjectRepr, Value};
use minijinja::{Error, State, UndefinedBehavior};

/// Controls what happens when a template refers to a missing name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UndefinedPolicy {
    /// Any missing name aborts the render with `'<name>' is undefined`.
    #[default]
    Strict,
    /// Missing names resolve to [`Hollow`] and render as nothing.
    Permissive,
}

impl UndefinedPolicy {
    pub(crate) fn behavior(self) -> UndefinedBehavior {
        match self {
            UndefinedPolicy::Strict => UndefinedBehavior::Strict,
            UndefinedPolicy::Permissive => UndefinedBehavior::Chainable,
        }
    }

    /// Picks the policy from a strictness flag.
    pub fn from_strict(strict: bool) -> UndefinedPolicy {
        if strict {
            UndefinedPolicy::Strict
        } else {
            UndefinedPolicy::Permissive
        }
    }
}

/// The value a missing name resolves to under the permissive policy.
///
/// Every operation degenerates: it prints as an empty string, is falsy,
/// iterates as empty, and attribute access, item access, calls and method
/// calls all return another hollow value.  Arithmetic with a hollow operand
/// yields an empty string.
#[derive(Debug, Clone, Copy)]
pub struct Hollow;

impl Object for Hollow {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Map
    }

    fn get_value(self: &Arc<Self>, _key: &Value) -> Option<Value> {
        Some(hollow())
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Empty
    }

    fn is_true(self: &Arc<Self>) -> bool {
        false
    }

    fn call(self: &Arc<Self>, _state: &State<'_, '_>, _args: &[Value]) -> Result<Value, Error> {
        Ok(hollow())
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        _method: &str,
        _args: &[Value],
    ) -> Result<Value, Error> {
        Ok(hollow())
    }

    fn render(self: &Arc<Self>, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}

/// Creates a hollow value.
pub fn hollow() -> Value {
    Value::from_object(Hollow)
}

/// Returns `true` if the value is hollow.
pub fn is_hollow(value: &Value) -> bool {
    value.downcast_object_ref::<Hollow>().is_some()
}

/// Returns `true` if the value is neither undefined nor hollow.
pub fn is_defined(value: &Value) -> bool {
    !value.is_undefined() && !is_hollow(value)
}
