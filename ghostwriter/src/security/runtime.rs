//! Checks that need the render context.
//!
//! Restricted names are looked for in every position a template can name
//! something: variables, binding targets, attributes, literal item keys and
//! call targets.
use minijinja::machinery::ast::{Call, CallArg, Expr, Stmt};
use minijinja::value::{Value, ValueKind};

use crate::error::Error;
use crate::security::{is_restricted, is_restricted_variable, Violation};
use crate::visit::{walk_call, walk_expr, walk_stmt, Visitor};

fn violation(kind: Violation, name: &str) -> Error {
    Error::runtime_security(kind.message(name))
}

fn const_str(expr: &Expr<'_>) -> Option<String> {
    match expr {
        Expr::Const(c) => c.value.as_str().map(str::to_string),
        _ => None,
    }
}

struct RuntimeCheck;

impl RuntimeCheck {
    /// Checks the value side of an assignment.
    fn check_assigned(&self, value: &Expr<'_>) -> Result<(), Error> {
        match value {
            Expr::Var(var) if is_restricted_variable(var.id) => {
                Err(violation(Violation::AssignmentOf, var.id))
            }
            Expr::Call(call) => match call.expr {
                Expr::Var(ref var) if is_restricted_variable(var.id) => {
                    Err(violation(Violation::AssignmentInvolving, var.id))
                }
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }
}

impl<'a> Visitor<'a> for RuntimeCheck {
    type Error = Error;

    fn visit_stmt(&mut self, stmt: &Stmt<'a>) -> Result<(), Error> {
        match stmt {
            Stmt::Set(set) => self.check_assigned(&set.expr)?,
            Stmt::WithBlock(with) => {
                for (_, value) in &with.assignments {
                    self.check_assigned(value)?;
                }
            }
            _ => {}
        }
        walk_stmt(self, stmt)
    }

    fn visit_expr(&mut self, expr: &Expr<'a>) -> Result<(), Error> {
        match expr {
            Expr::Var(var) if is_restricted_variable(var.id) => {
                return Err(violation(Violation::Variable, var.id));
            }
            Expr::GetAttr(attr) if is_restricted(attr.name) => {
                return Err(violation(Violation::Attribute, attr.name));
            }
            Expr::GetItem(item) => {
                if let Some(key) = const_str(&item.subscript_expr) {
                    if is_restricted(&key) {
                        return Err(violation(Violation::Item, &key));
                    }
                }
            }
            Expr::Filter(filter) if filter.name == "attr" => {
                if let Some(CallArg::Pos(arg)) = filter.args.first() {
                    if let Some(name) = const_str(arg).filter(|x| is_restricted(x)) {
                        return Err(violation(Violation::Attribute, &name));
                    }
                }
            }
            _ => {}
        }
        walk_expr(self, expr)
    }

    fn visit_target(&mut self, target: &Expr<'a>) -> Result<(), Error> {
        match target {
            Expr::Var(var) if is_restricted_variable(var.id) => {
                Err(violation(Violation::AssignmentTo, var.id))
            }
            Expr::Var(_) => Ok(()),
            Expr::List(list) => {
                for item in &list.items {
                    self.visit_target(item)?;
                }
                Ok(())
            }
            other => self.visit_expr(other),
        }
    }

    fn visit_call(&mut self, call: &Call<'a>) -> Result<(), Error> {
        if let Expr::Var(ref var) = call.expr {
            if is_restricted_variable(var.id) {
                return Err(violation(Violation::Call, var.id));
            }
        }
        walk_call(self, call)
    }
}

/// Checks the evaluation context and the names a template touches.
///
/// The context must be a mapping.  The tree is walked in pre-order and the
/// first restricted name found is reported.
pub fn check(tree: &Stmt<'_>, ctx: &Value) -> Result<(), Error> {
    match ctx.kind() {
        ValueKind::Map | ValueKind::Undefined | ValueKind::None => {}
        _ => {
            return Err(Error::runtime_security(
                "Context must be a dictionary".into(),
            ))
        }
    }
    RuntimeCheck.visit_stmt(tree)
}
