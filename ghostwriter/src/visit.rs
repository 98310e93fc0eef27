//! A pre-order visitor over the template syntax tree.
//!
//! Every `visit_*` method defaults to the matching `walk_*` function, which
//! descends into the children of the node in source order.  Implementations
//! override the methods they care about and call the `walk_*` function to
//! continue the descent.  Returning an error stops the walk immediately.
use minijinja::machinery::ast::{Call, CallArg, Expr, Macro, Stmt};

/// Visits the nodes of a parsed template.
pub trait Visitor<'a> {
    /// The error that aborts the walk.
    type Error;

    /// Visits a statement.
    fn visit_stmt(&mut self, stmt: &Stmt<'a>) -> Result<(), Self::Error> {
        walk_stmt(self, stmt)
    }

    /// Visits an expression in value position.
    fn visit_expr(&mut self, expr: &Expr<'a>) -> Result<(), Self::Error> {
        walk_expr(self, expr)
    }

    /// Visits an expression that is the target of a binding.
    fn visit_target(&mut self, target: &Expr<'a>) -> Result<(), Self::Error> {
        walk_expr(self, target)
    }

    /// Visits a call.
    fn visit_call(&mut self, call: &Call<'a>) -> Result<(), Self::Error> {
        walk_call(self, call)
    }
}

fn walk_body<'a, V: Visitor<'a> + ?Sized>(
    visitor: &mut V,
    body: &[Stmt<'a>],
) -> Result<(), V::Error> {
    for stmt in body {
        visitor.visit_stmt(stmt)?;
    }
    Ok(())
}

fn walk_opt<'a, V: Visitor<'a> + ?Sized>(
    visitor: &mut V,
    expr: Option<&Expr<'a>>,
) -> Result<(), V::Error> {
    match expr {
        Some(expr) => visitor.visit_expr(expr),
        None => Ok(()),
    }
}

fn walk_args<'a, V: Visitor<'a> + ?Sized>(
    visitor: &mut V,
    args: &[CallArg<'a>],
) -> Result<(), V::Error> {
    for arg in args {
        match arg {
            CallArg::Pos(expr)
            | CallArg::Kwarg(_, expr)
            | CallArg::PosSplat(expr)
            | CallArg::KwargSplat(expr) => visitor.visit_expr(expr)?,
        }
    }
    Ok(())
}

fn walk_macro<'a, V: Visitor<'a> + ?Sized>(
    visitor: &mut V,
    decl: &Macro<'a>,
) -> Result<(), V::Error> {
    for arg in &decl.args {
        visitor.visit_target(arg)?;
    }
    for default in &decl.defaults {
        visitor.visit_expr(default)?;
    }
    walk_body(visitor, &decl.body)
}

/// Descends into the children of a statement.
pub fn walk_stmt<'a, V: Visitor<'a> + ?Sized>(
    visitor: &mut V,
    stmt: &Stmt<'a>,
) -> Result<(), V::Error> {
    match stmt {
        Stmt::Template(t) => walk_body(visitor, &t.children),
        Stmt::EmitExpr(e) => visitor.visit_expr(&e.expr),
        Stmt::EmitRaw(_) | Stmt::Continue(_) | Stmt::Break(_) => Ok(()),
        Stmt::ForLoop(f) => {
            visitor.visit_target(&f.target)?;
            visitor.visit_expr(&f.iter)?;
            walk_opt(visitor, f.filter_expr.as_ref())?;
            walk_body(visitor, &f.body)?;
            walk_body(visitor, &f.else_body)
        }
        Stmt::IfCond(i) => {
            visitor.visit_expr(&i.expr)?;
            walk_body(visitor, &i.true_body)?;
            walk_body(visitor, &i.false_body)
        }
        Stmt::WithBlock(w) => {
            for (target, expr) in &w.assignments {
                visitor.visit_target(target)?;
                visitor.visit_expr(expr)?;
            }
            walk_body(visitor, &w.body)
        }
        Stmt::Set(s) => {
            visitor.visit_target(&s.target)?;
            visitor.visit_expr(&s.expr)
        }
        Stmt::SetBlock(s) => {
            visitor.visit_target(&s.target)?;
            walk_opt(visitor, s.filter.as_ref())?;
            walk_body(visitor, &s.body)
        }
        Stmt::AutoEscape(a) => {
            visitor.visit_expr(&a.enabled)?;
            walk_body(visitor, &a.body)
        }
        Stmt::FilterBlock(f) => {
            visitor.visit_expr(&f.filter)?;
            walk_body(visitor, &f.body)
        }
        Stmt::Block(b) => walk_body(visitor, &b.body),
        Stmt::Import(i) => {
            visitor.visit_expr(&i.expr)?;
            visitor.visit_target(&i.name)
        }
        Stmt::FromImport(i) => {
            visitor.visit_expr(&i.expr)?;
            for (name, alias) in &i.names {
                visitor.visit_target(alias.as_ref().unwrap_or(name))?;
            }
            Ok(())
        }
        Stmt::Extends(e) => visitor.visit_expr(&e.name),
        Stmt::Include(i) => visitor.visit_expr(&i.name),
        Stmt::Macro(m) => walk_macro(visitor, m),
        Stmt::CallBlock(c) => {
            visitor.visit_call(&c.call)?;
            walk_macro(visitor, &c.macro_decl)
        }
        Stmt::Do(d) => visitor.visit_call(&d.call),
    }
}

/// Descends into the children of an expression.
pub fn walk_expr<'a, V: Visitor<'a> + ?Sized>(
    visitor: &mut V,
    expr: &Expr<'a>,
) -> Result<(), V::Error> {
    match expr {
        Expr::Var(_) | Expr::Const(_) => Ok(()),
        Expr::Slice(s) => {
            visitor.visit_expr(&s.expr)?;
            walk_opt(visitor, s.start.as_ref())?;
            walk_opt(visitor, s.stop.as_ref())?;
            walk_opt(visitor, s.step.as_ref())
        }
        Expr::UnaryOp(u) => visitor.visit_expr(&u.expr),
        Expr::BinOp(b) => {
            visitor.visit_expr(&b.left)?;
            visitor.visit_expr(&b.right)
        }
        Expr::IfExpr(i) => {
            visitor.visit_expr(&i.true_expr)?;
            visitor.visit_expr(&i.test_expr)?;
            walk_opt(visitor, i.false_expr.as_ref())
        }
        Expr::Filter(f) => {
            walk_opt(visitor, f.expr.as_ref())?;
            walk_args(visitor, &f.args)
        }
        Expr::Test(t) => {
            visitor.visit_expr(&t.expr)?;
            walk_args(visitor, &t.args)
        }
        Expr::GetAttr(g) => visitor.visit_expr(&g.expr),
        Expr::GetItem(g) => {
            visitor.visit_expr(&g.expr)?;
            visitor.visit_expr(&g.subscript_expr)
        }
        Expr::Call(c) => visitor.visit_call(c),
        Expr::List(l) => {
            for item in &l.items {
                visitor.visit_expr(item)?;
            }
            Ok(())
        }
        Expr::Map(m) => {
            for (key, value) in m.keys.iter().zip(m.values.iter()) {
                visitor.visit_expr(key)?;
                visitor.visit_expr(value)?;
            }
            Ok(())
        }
    }
}

/// Descends into the callee and the arguments of a call.
pub fn walk_call<'a, V: Visitor<'a> + ?Sized>(
    visitor: &mut V,
    call: &Call<'a>,
) -> Result<(), V::Error> {
    visitor.visit_expr(&call.expr)?;
    walk_args(visitor, &call.args)
}
