use std::io::Cursor;

use ghostwriter::{validate, Document, ErrorKind, Limits, ValidationState};

fn check(source: &str) -> ValidationState {
    validate("test.txt", source.as_bytes(), Limits::default())
}

fn message(source: &str) -> String {
    check(source).error_message().unwrap_or("ok").to_string()
}

#[test]
fn test_valid_template() {
    let state = check("Hello {{ name }}!{% for x in items %}{{ loop.index }}{% endfor %}");
    assert!(state.is_valid());
    assert_eq!(state.error_message(), None);
}

#[test]
fn test_forbidden_tags() {
    insta::assert_snapshot!(
        message("{% macro m() %}{% endmacro %}"),
        @"Template security error: 'macro' tag is not allowed"
    );
    insta::assert_snapshot!(
        message(r#"{% include "other.txt" %}"#),
        @"Template security error: 'include' tag is not allowed"
    );
    insta::assert_snapshot!(
        message(r#"{% extends "base.txt" %}"#),
        @"Template security error: 'extends' tag is not allowed"
    );
    insta::assert_snapshot!(
        message(r#"{% import "helpers.txt" as helpers %}"#),
        @"Template security error: 'import' tag is not allowed"
    );
    insta::assert_snapshot!(
        message(r#"{% from "helpers.txt" import render %}"#),
        @"Template security error: 'import' tag is not allowed"
    );
    insta::assert_snapshot!(
        message("{% do items.append(1) %}"),
        @"Template security error: 'do' tag is not allowed"
    );
}

#[test]
fn test_forbidden_tags_in_unreachable_branches() {
    insta::assert_snapshot!(
        message(
            r#"{% if false %}{% for x in [] %}{% with a = 1 %}{% include "x" %}{% endwith %}{% endfor %}{% endif %}"#
        ),
        @"Template security error: 'include' tag is not allowed"
    );
    insta::assert_snapshot!(
        message(r#"{% filter upper %}{% raw %}{% macro %}{% endraw %}{% endfilter %}"#),
        @"ok"
    );
}

#[test]
fn test_first_violation_in_source_order() {
    insta::assert_snapshot!(
        message(r#"{% do x %}{% macro m() %}{% endmacro %}{% include "y" %}"#),
        @"Template security error: 'do' tag is not allowed"
    );
    insta::assert_snapshot!(
        message(r#"{% for i in range(200000) %}{% endfor %}{% macro m() %}{% endmacro %}"#),
        @"Template security error: loop range exceeds maximum limit of 100000"
    );
}

#[test]
fn test_range_boundary() {
    insta::assert_snapshot!(message("{% for i in range(100000) %}{% endfor %}"), @"ok");
    insta::assert_snapshot!(message("{% for i in range(5, 100005) %}{% endfor %}"), @"ok");
    insta::assert_snapshot!(
        message("{% for i in range(100001) %}{% endfor %}"),
        @"Template security error: loop range exceeds maximum limit of 100000"
    );
    insta::assert_snapshot!(
        message("{% for i in range(-100001, 0) %}{% endfor %}"),
        @"Template security error: loop range exceeds maximum limit of 100000"
    );
    insta::assert_snapshot!(message("{% for i in range(0, 300000, 3) %}{% endfor %}"), @"ok");
    insta::assert_snapshot!(message("{% for i in range(n) %}{% endfor %}"), @"ok");
}

#[test]
fn test_custom_range_limit() {
    let limits = Limits {
        max_range_size: 10,
        ..Limits::default()
    };
    let state = validate(
        "test.txt",
        b"{% for i in range(11) %}{% endfor %}",
        limits,
    );
    assert_eq!(
        state.error_message(),
        Some("Template security error: loop range exceeds maximum limit of 10")
    );
}

#[test]
fn test_syntax_error_passes_through() {
    let state = check("{{ all_good }}\n{% for item in seq");
    assert!(!state.is_valid());
    let message = state.error_message().unwrap();
    assert!(message.starts_with("syntax error:"), "{message}");
}

#[test]
fn test_encoding() {
    let state = validate("bin", b"Hello \0 World", Limits::default());
    assert_eq!(
        state.error_message(),
        Some("Template file contains invalid binary data")
    );
    let state = validate("latin1", b"Gr\xfc\xdfe", Limits::default());
    assert_eq!(
        state.error_message(),
        Some("Template file contains invalid UTF-8 bytes")
    );
    // a byte order mark is kept as an ordinary character
    let state = validate("bom", b"\xef\xbb\xbfHello", Limits::default());
    assert!(state.is_valid());
}

#[test]
fn test_oversized_template() {
    let body = vec![b'a'; 31 * 1024 * 1024];
    let doc = Document::load("huge.txt", Cursor::new(body), Limits::default());
    insta::assert_snapshot!(
        doc.error_message().unwrap(),
        @"Template file size exceeds maximum limit of 31457280 bytes"
    );
    assert_eq!(doc.source(), None);
}

#[test]
fn test_size_check_restores_position() {
    let limits = Limits {
        max_file_size: 5,
        ..Limits::default()
    };
    let doc = Document::load("small", Cursor::new(b"12345".to_vec()), limits);
    assert!(doc.is_valid());
    assert_eq!(doc.source(), Some("12345"));

    let doc = Document::load("small", Cursor::new(b"123456".to_vec()), limits);
    assert_eq!(
        doc.error_message(),
        Some("Template file size exceeds maximum limit of 5 bytes")
    );
}

#[test]
fn test_error_kinds() {
    let err = ghostwriter::decode(b"\0").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);
    let err = ghostwriter::format("x", 9).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}
