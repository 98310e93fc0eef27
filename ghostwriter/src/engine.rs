//! Evaluation of a validated template.
//!
//! A fresh environment is built for every render.  It escapes every
//! interpolated value as HTML, carries the sandbox filters, and evaluates
//! the source with its arithmetic routed through checked functions against
//! the guarded context.
use minijinja::machinery::ast::Stmt;
use minijinja::value::Value;
use minijinja::{AutoEscape, Environment};

use crate::arith;
use crate::error::Error;
use crate::filters;
use crate::security::guard::{guard_context, Tracker};
use crate::undefined::{is_defined, UndefinedPolicy};

/// Tells the tracker that a missing value was accepted.
fn tolerate(tracker: &Tracker, value: &Value) {
    if !is_defined(value) {
        tracker.forgive_miss();
    }
}

/// Creates the environment a template is evaluated in.
fn make_environment<'s>(policy: UndefinedPolicy, tracker: &Tracker) -> Environment<'s> {
    let mut env = Environment::new();
    env.set_undefined_behavior(policy.behavior());
    env.set_auto_escape_callback(|_| AutoEscape::Html);
    env.set_unknown_method_callback(minijinja_contrib::pycompat::unknown_method_callback);
    arith::register(&mut env, policy);
    env.add_filter("date", filters::date);
    env.add_filter("safe", filters::safe);
    env.add_filter("html_safe", filters::safe);
    for name in ["default", "d"] {
        let tracker = tracker.clone();
        env.add_filter(
            name,
            move |value: &Value, other: Option<Value>, boolean: Option<bool>| {
                tolerate(&tracker, value);
                filters::default(value, other, boolean)
            },
        );
    }
    let t = tracker.clone();
    env.add_test("defined", move |value: &Value| {
        tolerate(&t, value);
        filters::is_defined_test(value)
    });
    let t = tracker.clone();
    env.add_test("undefined", move |value: &Value| {
        tolerate(&t, value);
        filters::is_undefined_test(value)
    });
    env
}

/// Maps an engine failure to the message shown to the user.
///
/// An undefined error is attributed to the context lookup that came up
/// empty last, unless something accepted that lookup in the meantime.
fn translate(err: minijinja::Error, tracker: &Tracker) -> Error {
    match (err.kind(), tracker.pending_miss()) {
        (minijinja::ErrorKind::UndefinedError, Some(name)) => {
            Error::evaluation(format!("'{name}' is undefined"))
        }
        _ => Error::from(err),
    }
}

/// Evaluates a template against a context.
///
/// `tree` must be the parsed form of `source`.  A restricted key observed
/// by the guards during evaluation wins over whatever the render produced.
pub fn render(
    name: &str,
    source: &str,
    tree: &Stmt<'_>,
    ctx: &Value,
    policy: UndefinedPolicy,
) -> Result<String, Error> {
    let source = arith::rewrite(source, tree).ok_or_else(|| {
        Error::evaluation("Template rendering error: unable to prepare arithmetic")
    })?;
    let tracker = Tracker::default();
    let env = make_environment(policy, &tracker);
    let template = env.template_from_named_str(name, &source)?;
    let root = guard_context(
        ctx.clone(),
        &tracker,
        policy == UndefinedPolicy::Permissive,
    );
    let result = template.render(root);
    if let Some(violation) = tracker.violation() {
        return Err(Error::runtime_security(violation));
    }
    result.map_err(|err| {
        let err = translate(err, &tracker);
        tracing::debug!(kind = %err.kind(), "render failed");
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use minijinja::context;
    use minijinja::machinery::{parse, WhitespaceConfig};
    use minijinja::syntax::SyntaxConfig;

    fn run(source: &str, ctx: Value, policy: UndefinedPolicy) -> Result<String, Error> {
        let tree = parse(
            source,
            "test",
            SyntaxConfig::default(),
            WhitespaceConfig::default(),
        )
        .unwrap();
        render("test", source, &tree, &ctx, policy)
    }

    #[test]
    fn test_missing_name_is_named() {
        let err = run(
            "{{ user.email }}",
            context! { user => context! {} },
            UndefinedPolicy::Strict,
        )
        .unwrap_err();
        insta::assert_snapshot!(err, @"'user.email' is undefined");
    }

    #[test]
    fn test_tolerated_miss_is_not_blamed() {
        let err = run(
            "{{ a is defined }}{% for x in [1] %}{{ x.foo }}{% endfor %}",
            context! {},
            UndefinedPolicy::Strict,
        )
        .unwrap_err();
        assert!(!err.detail().contains("'a'"), "{err}");
        let err = run(
            "{{ a|default(1) }}{{ b }}",
            context! {},
            UndefinedPolicy::Strict,
        )
        .unwrap_err();
        insta::assert_snapshot!(err, @"'b' is undefined");
    }
}
