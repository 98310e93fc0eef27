use ghostwriter::security::{RESTRICTED_ATTRIBUTES, RESTRICTED_CALLS, RESTRICTED_VARIABLES};
use ghostwriter::{Document, FormatType, UndefinedPolicy};
use minijinja::{context, Value};

fn apply_with(source: &str, ctx: Value, policy: UndefinedPolicy) -> String {
    let mut doc = Document::from_bytes("test.txt", source.as_bytes());
    let outcome = doc.apply(&ctx, FormatType::Raw, policy);
    match outcome.error_message {
        Some(message) => message,
        None => outcome.rendered_text,
    }
}

fn apply(source: &str, ctx: Value) -> String {
    apply_with(source, ctx, UndefinedPolicy::Permissive)
}

#[test]
fn test_restricted_variable_categories() {
    insta::assert_snapshot!(
        apply("{{ os }}", context! {}),
        @"Template security error: Use of restricted variable 'os' is forbidden."
    );
    insta::assert_snapshot!(
        apply("{% set sys = 1 %}", context! {}),
        @"Template security error: Assignment to restricted variable 'sys' is forbidden."
    );
    insta::assert_snapshot!(
        apply("{% for request in items %}{% endfor %}", context! {}),
        @"Template security error: Assignment to restricted variable 'request' is forbidden."
    );
    insta::assert_snapshot!(
        apply("{% with vars = 1 %}{% endwith %}", context! {}),
        @"Template security error: Assignment to restricted variable 'vars' is forbidden."
    );
    insta::assert_snapshot!(
        apply("{% with x = config %}{% endwith %}", context! {}),
        @"Template security error: Assignment of restricted variable 'config' is forbidden."
    );
    insta::assert_snapshot!(
        apply("{% set x = globals() %}", context! {}),
        @"Template security error: Assignment involving restricted function 'globals()' is forbidden."
    );
    insta::assert_snapshot!(
        apply("{% set builtins %}x{% endset %}", context! {}),
        @"Template security error: Assignment to restricted variable 'builtins' is forbidden."
    );
    insta::assert_snapshot!(
        apply("{{ eval('1') }}", context! {}),
        @"Template security error: Call to restricted function 'eval()' is forbidden."
    );
}

#[test]
fn test_restricted_even_when_defined() {
    insta::assert_snapshot!(
        apply("{{ config.secret }}", context! { config => context! { secret => 1 } }),
        @"Template security error: Use of restricted variable 'config' is forbidden."
    );
}

#[test]
fn test_restricted_attributes_and_items() {
    insta::assert_snapshot!(
        apply("{{ user.__class__ }}", context! { user => "x" }),
        @"Template security error: Access to restricted attribute '__class__' is forbidden."
    );
    insta::assert_snapshot!(
        apply("{{ ''.__class__.__mro__ }}", context! {}),
        @"Template security error: Access to restricted attribute '__mro__' is forbidden."
    );
    insta::assert_snapshot!(
        apply("{{ data.os }}", context! { data => context! {} }),
        @"Template security error: Access to restricted attribute 'os' is forbidden."
    );
    insta::assert_snapshot!(
        apply("{{ data['__globals__'] }}", context! { data => context! {} }),
        @"Template security error: Access to restricted item '__globals__' is forbidden."
    );
    insta::assert_snapshot!(
        apply("{{ data|attr('__dict__') }}", context! { data => context! {} }),
        @"Template security error: Access to restricted attribute '__dict__' is forbidden."
    );
}

#[test]
fn test_every_restricted_name() {
    for name in RESTRICTED_VARIABLES {
        let message = apply(&format!("{{{{ {name} }}}}"), context! {});
        assert!(message.contains("variable"), "{message}");
        assert!(message.contains(name), "{message}");

        let message = apply(&format!("{{{{ x.{name} }}}}"), context! {});
        assert!(message.contains("attribute"), "{message}");
        assert!(message.contains(name), "{message}");
    }
    for name in RESTRICTED_ATTRIBUTES {
        let message = apply(&format!("{{{{ x[{name:?}] }}}}"), context! {});
        assert!(message.contains("item"), "{message}");
        assert!(message.contains(name), "{message}");
    }
    for name in RESTRICTED_CALLS {
        let message = apply(&format!("{{{{ {name}() }}}}"), context! {});
        assert!(message.starts_with("Template security error: "), "{message}");
        assert!(message.contains(&format!("'{name}()'")), "{message}");
    }
}

#[test]
fn test_dynamic_keys_are_guarded() {
    let ctx = context! {
        data => context! { name => "ghost" },
        key => "__class__",
    };
    insta::assert_snapshot!(
        apply("{{ data[key] }}", ctx.clone()),
        @"Template security error: Access to restricted item '__class__' is forbidden."
    );
    insta::assert_snapshot!(
        apply("{{ data|attr(key) }}", ctx.clone()),
        @"Template security error: Access to restricted item '__class__' is forbidden."
    );
    insta::assert_snapshot!(apply("{{ data['na' ~ 'me'] }}", ctx), @"ghost");
}

#[test]
fn test_nested_dynamic_keys_are_guarded() {
    let ctx = context! {
        rows => vec![context! { cells => context! { ok => 1 } }],
        keys => vec!["ok", "__init__"],
    };
    insta::assert_snapshot!(
        apply(
            "{% for k in keys %}{{ rows[0].cells[k] }};{% endfor %}",
            ctx
        ),
        @"Template security error: Access to restricted item '__init__' is forbidden."
    );
}

#[test]
fn test_context_must_be_a_mapping() {
    insta::assert_snapshot!(
        apply("{{ 1 }}", Value::from(vec![1, 2, 3])),
        @"Context must be a dictionary"
    );
    insta::assert_snapshot!(apply("{{ 1 }}", Value::from(())), @"1");
}

#[test]
fn test_security_is_checked_before_evaluation() {
    // the security check fires even though evaluation would have failed
    insta::assert_snapshot!(
        apply_with("{{ missing }}{{ os }}", context! {}, UndefinedPolicy::Strict),
        @"Template security error: Use of restricted variable 'os' is forbidden."
    );
}
