//! Checked arithmetic.
//!
//! The engine's own operators know nothing about the sandbox.  A float
//! division by zero quietly yields an infinity and an operand that resolved
//! to the hollow sentinel fails with a type error.  Before a template is
//! compiled every arithmetic expression in its source is therefore rewritten
//! into a call of one of the functions registered here.  They refuse zero
//! divisors and apply the undefined policy to their operands before handing
//! the operation back to the engine.
use minijinja::machinery::ast::{BinOpKind, Expr, Stmt, UnaryOpKind};
use minijinja::value::{Value, ValueKind};
use minijinja::{context, Environment, Error, ErrorKind, State};

use crate::undefined::{is_defined, UndefinedPolicy};
use crate::visit::{walk_expr, Visitor};

/// An operator that is routed through a checked function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
    Neg,
}

impl Op {
    const ALL: [Op; 8] = [
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Div,
        Op::FloorDiv,
        Op::Rem,
        Op::Pow,
        Op::Neg,
    ];

    fn from_binop(op: &BinOpKind) -> Option<Op> {
        Some(match op {
            BinOpKind::Add => Op::Add,
            BinOpKind::Sub => Op::Sub,
            BinOpKind::Mul => Op::Mul,
            BinOpKind::Div => Op::Div,
            BinOpKind::FloorDiv => Op::FloorDiv,
            BinOpKind::Rem => Op::Rem,
            BinOpKind::Pow => Op::Pow,
            _ => return None,
        })
    }

    /// The global the operator is rewritten to.
    fn function(self) -> &'static str {
        match self {
            Op::Add => "__ghostwriter_add",
            Op::Sub => "__ghostwriter_sub",
            Op::Mul => "__ghostwriter_mul",
            Op::Div => "__ghostwriter_div",
            Op::FloorDiv => "__ghostwriter_floordiv",
            Op::Rem => "__ghostwriter_rem",
            Op::Pow => "__ghostwriter_pow",
            Op::Neg => "__ghostwriter_neg",
        }
    }

    /// The operator as written in a template.
    fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub | Op::Neg => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::FloorDiv => "//",
            Op::Rem => "%",
            Op::Pow => "**",
        }
    }

    /// The expression that performs the operation in the engine.
    fn expression(self) -> &'static str {
        match self {
            Op::Add => "lhs + rhs",
            Op::Sub => "lhs - rhs",
            Op::Mul => "lhs * rhs",
            Op::Div => "lhs / rhs",
            Op::FloorDiv => "lhs // rhs",
            Op::Rem => "lhs % rhs",
            Op::Pow => "lhs ** rhs",
            Op::Neg => "-lhs",
        }
    }
}

/// Returns `true` if the name is one of the checked arithmetic functions.
pub fn is_function(name: &str) -> bool {
    Op::ALL.iter().any(|op| op.function() == name)
}

fn is_zero(value: &Value) -> bool {
    match value.kind() {
        ValueKind::Number => f64::try_from(value.clone()).map_or(false, |x| x == 0.0),
        ValueKind::Bool => !value.is_true(),
        _ => false,
    }
}

fn is_negative(value: &Value) -> bool {
    value.kind() == ValueKind::Number && f64::try_from(value.clone()).map_or(false, |x| x < 0.0)
}

fn division_by_zero() -> Error {
    Error::new(ErrorKind::InvalidOperation, "division by zero")
}

fn calculate(
    state: &State,
    op: Op,
    policy: UndefinedPolicy,
    lhs: Value,
    rhs: Value,
) -> Result<Value, Error> {
    let binary = op != Op::Neg;
    if !is_defined(&lhs) || (binary && !is_defined(&rhs)) {
        return match policy {
            UndefinedPolicy::Permissive => Ok(Value::from("")),
            UndefinedPolicy::Strict => Err(Error::from(ErrorKind::UndefinedError)),
        };
    }
    match op {
        Op::Div | Op::FloorDiv | Op::Rem if is_zero(&rhs) => return Err(division_by_zero()),
        Op::Pow if is_zero(&lhs) && is_negative(&rhs) => return Err(division_by_zero()),
        _ => {}
    }
    let expr = state.env().compile_expression(op.expression())?;
    expr.eval(context! { lhs => lhs, rhs => rhs })
}

/// Registers the checked arithmetic functions.
pub fn register(env: &mut Environment<'_>, policy: UndefinedPolicy) {
    for op in Op::ALL {
        if op == Op::Neg {
            env.add_function(op.function(), move |state: &State, value: Value| {
                calculate(state, op, policy, value, Value::UNDEFINED)
            });
        } else {
            env.add_function(
                op.function(),
                move |state: &State, lhs: Value, rhs: Value| calculate(state, op, policy, lhs, rhs),
            );
        }
    }
}

/// An arithmetic node with its operands.
struct Arithmetic<'e, 'a> {
    op: Op,
    lhs: &'e Expr<'a>,
    rhs: Option<&'e Expr<'a>>,
}

fn arithmetic<'e, 'a>(expr: &'e Expr<'a>) -> Option<Arithmetic<'e, 'a>> {
    match expr {
        Expr::BinOp(binop) => Some(Arithmetic {
            op: Op::from_binop(&binop.op)?,
            lhs: &binop.left,
            rhs: Some(&binop.right),
        }),
        // negative number literals stay as they are
        Expr::UnaryOp(unary) if matches!(unary.op, UnaryOpKind::Neg) => match &unary.expr {
            Expr::Const(c) if c.value.kind() == ValueKind::Number => None,
            inner => Some(Arithmetic {
                op: Op::Neg,
                lhs: inner,
                rhs: None,
            }),
        },
        _ => None,
    }
}

/// Finds the operator of a binary node.
///
/// Only whitespace and closing parentheses can sit between the end of the
/// left operand and the operator.
fn operator_offset(source: &str, from: usize, to: usize, symbol: &str) -> Option<usize> {
    let rest = source.get(from..to)?;
    let skipped = rest.len()
        - rest
            .trim_start_matches(|c: char| c.is_whitespace() || c == ')')
            .len();
    rest[skipped..]
        .starts_with(symbol)
        .then_some(from + skipped)
}

/// Collects replacements for the outermost arithmetic nodes it visits.
struct Rewriter<'s> {
    source: &'s str,
    edits: Vec<(usize, usize, String)>,
    failed: bool,
}

impl<'s> Rewriter<'s> {
    fn new(source: &'s str) -> Rewriter<'s> {
        Rewriter {
            source,
            edits: Vec::new(),
            failed: false,
        }
    }

    fn call(&mut self, start: usize, end: usize, node: Arithmetic<'_, '_>) -> String {
        let mut args = Vec::with_capacity(2);
        match node.rhs {
            Some(rhs) => {
                let symbol = node.op.symbol();
                let lhs_end = node.lhs.span().end_offset as usize;
                match operator_offset(self.source, lhs_end, end, symbol) {
                    Some(op_start) => {
                        args.push(self.operand(node.lhs, start, op_start));
                        args.push(self.operand(rhs, op_start + symbol.len(), end));
                    }
                    None => self.failed = true,
                }
            }
            // the span of a negation starts at its minus sign
            None => args.push(self.operand(node.lhs, start + 1, end)),
        }
        format!("{}({})", node.op.function(), args.join(", "))
    }

    fn operand(&mut self, expr: &Expr<'_>, start: usize, end: usize) -> String {
        let mut inner = Rewriter::new(self.source);
        let _ = inner.visit_expr(expr);
        self.failed |= inner.failed;
        match splice(self.source, start, end, inner.edits) {
            Some(text) => text.trim().to_string(),
            None => {
                self.failed = true;
                String::new()
            }
        }
    }
}

impl<'a> Visitor<'a> for Rewriter<'_> {
    type Error = ();

    fn visit_expr(&mut self, expr: &Expr<'a>) -> Result<(), ()> {
        match arithmetic(expr) {
            Some(node) => {
                let span = expr.span();
                let (start, end) = (span.start_offset as usize, span.end_offset as usize);
                let text = self.call(start, end, node);
                self.edits.push((start, end, text));
                Ok(())
            }
            None => walk_expr(self, expr),
        }
    }
}

/// Copies `source[start..end]` with the edits applied.
fn splice(
    source: &str,
    start: usize,
    end: usize,
    mut edits: Vec<(usize, usize, String)>,
) -> Option<String> {
    edits.sort_by_key(|edit| edit.0);
    let mut rv = String::with_capacity(end.saturating_sub(start));
    let mut pos = start;
    for (edit_start, edit_end, text) in edits {
        if edit_start < pos || edit_end > end {
            return None;
        }
        rv.push_str(source.get(pos..edit_start)?);
        rv.push_str(&text);
        pos = edit_end;
    }
    rv.push_str(source.get(pos..end)?);
    Some(rv)
}

/// Rewrites every arithmetic expression into a checked function call.
///
/// `tree` must be the parsed form of `source`.  Returns `None` if the spans
/// of the tree do not line up with the source.
pub fn rewrite(source: &str, tree: &Stmt<'_>) -> Option<String> {
    let mut rewriter = Rewriter::new(source);
    let _ = rewriter.visit_stmt(tree);
    if rewriter.failed {
        return None;
    }
    if rewriter.edits.is_empty() {
        return Some(source.to_string());
    }
    tracing::debug!(
        count = rewriter.edits.len(),
        "routing arithmetic through checked functions"
    );
    splice(source, 0, source.len(), rewriter.edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    use minijinja::machinery::{parse, WhitespaceConfig};
    use minijinja::syntax::SyntaxConfig;

    fn rewritten(source: &str) -> String {
        let tree = parse(
            source,
            "test",
            SyntaxConfig::default(),
            WhitespaceConfig::default(),
        )
        .unwrap();
        rewrite(source, &tree).unwrap()
    }

    fn eval(source: &str, policy: UndefinedPolicy) -> Result<String, Error> {
        let mut env = Environment::new();
        env.set_undefined_behavior(policy.behavior());
        register(&mut env, policy);
        env.render_str(&rewritten(source), context! { zero => 0, n => 7 })
    }

    #[test]
    fn test_rewrite() {
        insta::assert_snapshot!(rewritten("{{ a + 1 }}"), @"{{ __ghostwriter_add(a, 1) }}");
        insta::assert_snapshot!(
            rewritten("{{ (a + b) * c|abs }}"),
            @"{{ __ghostwriter_mul((__ghostwriter_add(a, b)), c|abs) }}"
        );
        insta::assert_snapshot!(
            rewritten("{% if 10 / x > 1 %}{{ [x // 2, -x, -1] }}{% endif %}"),
            @"{% if __ghostwriter_div(10, x) > 1 %}{{ [__ghostwriter_floordiv(x, 2), __ghostwriter_neg(x), -1] }}{% endif %}"
        );
        insta::assert_snapshot!(
            rewritten("{{ f(a ** 2, k=b % 3)|round(n - 1) ~ 'x' }}"),
            @"{{ f(__ghostwriter_pow(a, 2), k=__ghostwriter_rem(b, 3))|round(__ghostwriter_sub(n, 1)) ~ 'x' }}"
        );
        insta::assert_snapshot!(
            rewritten("{{ a - b - c }}{{ a - -b }}"),
            @"{{ __ghostwriter_sub(__ghostwriter_sub(a, b), c) }}{{ __ghostwriter_sub(a, __ghostwriter_neg(b)) }}"
        );
        insta::assert_snapshot!(rewritten("{{ a ~ b }}{{ 'x' }}"), @"{{ a ~ b }}{{ 'x' }}");
    }

    #[test]
    fn test_engine_semantics_are_kept() {
        let policy = UndefinedPolicy::Strict;
        assert_eq!(
            eval("{{ 1 + 2 }} {{ n * 2 }} {{ 'a' + 'b' }}", policy).unwrap(),
            "3 14 ab"
        );
        assert_eq!(
            eval("{{ 7 / 2 }} {{ 7 // 2 }} {{ 7 % 3 }}", policy).unwrap(),
            "3.5 3 1"
        );
        assert_eq!(
            eval("{{ 2 ** 10 }} {{ -n }} {{ -1 }}", policy).unwrap(),
            "1024 -7 -1"
        );
    }

    #[test]
    fn test_zero_divisor() {
        for source in [
            "{{ 1 / zero }}",
            "{{ 1.5 // 0.0 }}",
            "{{ n % zero }}",
            "{{ 1 / false }}",
            "{{ 0 ** -1 }}",
        ] {
            for policy in [UndefinedPolicy::Strict, UndefinedPolicy::Permissive] {
                let err = eval(source, policy).unwrap_err();
                assert_eq!(err.detail(), Some("division by zero"), "{source}");
            }
        }
    }

    #[test]
    fn test_undefined_operands() {
        let err = eval("{{ missing + 1 }}", UndefinedPolicy::Strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedError);
        assert_eq!(
            eval(
                "[{{ missing + 1 }}][{{ 1 - missing.x }}][{{ -missing }}]",
                UndefinedPolicy::Permissive
            )
            .unwrap(),
            "[][][]"
        );
    }

    #[test]
    fn test_function_names() {
        assert!(is_function("__ghostwriter_div"));
        assert!(!is_function("range"));
    }
}
