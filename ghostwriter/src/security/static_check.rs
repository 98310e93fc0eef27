//! Checks that only look at the parsed template.
use minijinja::machinery::ast::{CallArg, Expr, ForLoop, Stmt};

use crate::error::Error;
use crate::limits::Limits;
use crate::security::{range_message, tag_message};
use crate::visit::{walk_stmt, Visitor};

/// Returns the name of a tag that is never allowed.
fn forbidden_tag(stmt: &Stmt<'_>) -> Option<&'static str> {
    match stmt {
        Stmt::Macro(_) => Some("macro"),
        Stmt::Include(_) => Some("include"),
        Stmt::Extends(_) => Some("extends"),
        Stmt::Import(_) | Stmt::FromImport(_) => Some("import"),
        Stmt::Do(_) => Some("do"),
        _ => None,
    }
}

/// Counts the iterations of `range(...)` if all arguments are literals.
///
/// Follows the half-open semantics of the `range` global.  A zero step
/// yields nothing.
pub fn literal_range_len(iter: &Expr<'_>) -> Option<u128> {
    let Expr::Call(call) = iter else {
        return None;
    };
    match call.expr {
        Expr::Var(ref var) if var.id == "range" => {}
        _ => return None,
    }
    let mut bounds = Vec::with_capacity(3);
    for arg in &call.args {
        match arg {
            CallArg::Pos(expr) => bounds.push(i128::from(expr.as_const()?.as_i64()?)),
            _ => return None,
        }
    }
    let (start, stop, step) = match bounds[..] {
        [stop] => (0, stop, 1),
        [start, stop] => (start, stop, 1),
        [start, stop, step] => (start, stop, step),
        _ => return None,
    };
    let (distance, step) = match step {
        0 => return Some(0),
        step if step > 0 => (stop - start, step),
        step => (start - stop, -step),
    };
    if distance <= 0 {
        Some(0)
    } else {
        Some(((distance + step - 1) / step) as u128)
    }
}

struct StaticCheck<'l> {
    limits: &'l Limits,
}

impl StaticCheck<'_> {
    fn check_loop(&self, for_loop: &ForLoop<'_>) -> Result<(), Error> {
        if let Some(len) = literal_range_len(&for_loop.iter) {
            if len > u128::from(self.limits.max_range_size) {
                return Err(Error::static_security(range_message(
                    self.limits.max_range_size,
                )));
            }
        }
        Ok(())
    }
}

impl<'a> Visitor<'a> for StaticCheck<'_> {
    type Error = Error;

    fn visit_stmt(&mut self, stmt: &Stmt<'a>) -> Result<(), Error> {
        if let Some(tag) = forbidden_tag(stmt) {
            return Err(Error::static_security(tag_message(tag)));
        }
        if let Stmt::ForLoop(for_loop) = stmt {
            self.check_loop(for_loop)?;
        }
        walk_stmt(self, stmt)
    }
}

/// Scans a parsed template for forbidden constructs.
///
/// The walk is pre-order and depth first, so the violation that appears
/// first in the source is the one reported.  Branches that can never run
/// are checked like everything else.
pub fn check(tree: &Stmt<'_>, limits: &Limits) -> Result<(), Error> {
    StaticCheck { limits }.visit_stmt(tree)
}
