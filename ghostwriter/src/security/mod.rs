//! The two validation phases and the deny-lists they share.
//!
//! [`static_check`] runs once right after parsing and only looks at the
//! shape of the tree.  [`runtime`] runs before every render and looks at the
//! names the template touches, and [`guard`] wraps the context so that keys
//! which are only known during evaluation are checked as well.
pub mod guard;
pub mod runtime;
pub mod static_check;

/// Names that may never be referenced, bound or rebound.
pub const RESTRICTED_VARIABLES: &[&str] = &[
    "request",
    "config",
    "os",
    "sys",
    "builtins",
    "__builtins__",
    "__import__",
    "eval",
    "exec",
    "compile",
    "getattr",
    "setattr",
    "delattr",
    "globals",
    "locals",
    "vars",
];

/// Reflection attributes that are blocked on every object.
pub const RESTRICTED_ATTRIBUTES: &[&str] = &[
    "__class__",
    "__base__",
    "__bases__",
    "__mro__",
    "__subclasses__",
    "__globals__",
    "__init__",
    "__dict__",
    "__code__",
];

/// Callables that may never be invoked.
pub const RESTRICTED_CALLS: &[&str] = &[
    "eval",
    "exec",
    "compile",
    "getattr",
    "setattr",
    "delattr",
    "globals",
    "locals",
    "vars",
    "__import__",
];

const PREFIX: &str = "Template security error: ";

/// Returns `true` if the name is a restricted variable or attribute.
///
/// Attribute names, literal item keys and keys resolved at render time are
/// all checked against this combined set.
pub fn is_restricted(name: &str) -> bool {
    RESTRICTED_VARIABLES.contains(&name) || RESTRICTED_ATTRIBUTES.contains(&name)
}

/// Returns `true` if the name is a restricted variable.
pub fn is_restricted_variable(name: &str) -> bool {
    RESTRICTED_VARIABLES.contains(&name)
}

/// Returns `true` if calling something by this name is forbidden.
pub fn is_restricted_call(name: &str) -> bool {
    RESTRICTED_CALLS.contains(&name)
}

/// The ways a restricted name can show up in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// `{{ os }}`
    Variable,
    /// `{% set os = 1 %}`
    AssignmentTo,
    /// `{% set x = os %}`
    AssignmentOf,
    /// `{% set x = eval() %}`
    AssignmentInvolving,
    /// `{{ x.__class__ }}`
    Attribute,
    /// `{{ x["__class__"] }}`
    Item,
    /// `{{ eval() }}`
    Call,
}

impl Violation {
    /// Builds the user facing message for a name.
    pub fn message(self, name: &str) -> String {
        let tail = match self {
            Violation::Variable => format!("Use of restricted variable '{name}' is forbidden."),
            Violation::AssignmentTo => {
                format!("Assignment to restricted variable '{name}' is forbidden.")
            }
            Violation::AssignmentOf => {
                format!("Assignment of restricted variable '{name}' is forbidden.")
            }
            Violation::AssignmentInvolving => {
                format!("Assignment involving restricted function '{name}()' is forbidden.")
            }
            Violation::Attribute => {
                format!("Access to restricted attribute '{name}' is forbidden.")
            }
            Violation::Item => format!("Access to restricted item '{name}' is forbidden."),
            Violation::Call => format!("Call to restricted function '{name}()' is forbidden."),
        };
        format!("{PREFIX}{tail}")
    }
}

/// Builds the message for a forbidden tag.
pub fn tag_message(tag: &str) -> String {
    format!("{PREFIX}'{tag}' tag is not allowed")
}

/// Builds the message for a literal loop that is too long.
pub fn range_message(limit: u64) -> String {
    format!("{PREFIX}loop range exceeds maximum limit of {limit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_lists() {
        assert!(is_restricted("os"));
        assert!(is_restricted("__mro__"));
        assert!(!is_restricted("name"));
        assert!(is_restricted_variable("getattr"));
        assert!(!is_restricted_variable("__class__"));
        assert!(RESTRICTED_CALLS.iter().all(|x| is_restricted_variable(x)));
    }

    #[test]
    fn test_messages() {
        insta::assert_snapshot!(
            Violation::AssignmentInvolving.message("eval"),
            @"Template security error: Assignment involving restricted function 'eval()' is forbidden."
        );
        insta::assert_snapshot!(
            tag_message("macro"),
            @"Template security error: 'macro' tag is not allowed"
        );
    }
}
