//! Render SQL AST to string.

use std::cell::RefCell;
use std::fmt;

use indexmap::IndexMap;

use crate::expr::Expr;
use crate::stmt::*;
use crate::{Ident, RenderedSql};

/// Mutable parameter tracking state.
struct ParamState {
    /// Named parameters mapped to their assigned positional index.
    params: IndexMap<String, usize>,
    /// Next parameter index to assign (starts at 1 for `$1`).
    next_param_idx: usize,
}

impl ParamState {
    fn new() -> Self {
        Self {
            params: IndexMap::new(),
            next_param_idx: 1,
        }
    }

    /// Get or create a parameter index.
    fn get_or_insert(&mut self, name: &str) -> usize {
        if let Some(idx) = self.params.get(name) {
            return *idx;
        }
        let idx = self.next_param_idx;
        self.next_param_idx += 1;
        self.params.insert(name.to_string(), idx);
        idx
    }
}

/// Rendering context that tracks parameter assignment.
///
/// Uses interior mutability (`RefCell`) so that `Render::render` can take `&self`,
/// enabling the `Fmt` wrapper to implement `Display`.
pub struct RenderContext {
    params: RefCell<ParamState>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self {
            params: RefCell::new(ParamState::new()),
        }
    }

    /// Get or create a parameter placeholder index.
    fn param_idx(&self, name: &str) -> usize {
        self.params.borrow_mut().get_or_insert(name)
    }

    /// Finish rendering and return the collected params.
    fn into_params(self) -> Vec<String> {
        self.params.into_inner().params.into_keys().collect()
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrapper for rendering a `Render` type via `Display`.
///
/// Allows using `write!(f, "{}", Fmt(ctx, &expr))` in format strings.
pub struct Fmt<'a, T: Render>(&'a RenderContext, &'a T);

impl<T: Render> fmt::Display for Fmt<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.1.render(self.0, f)
    }
}

/// Trait for types that can be rendered to SQL.
pub trait Render {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

fn write_ident_list(f: &mut fmt::Formatter<'_>, names: &[String]) -> fmt::Result {
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", Ident(name))?;
    }
    Ok(())
}

fn write_where(ctx: &RenderContext, f: &mut fmt::Formatter<'_>, where_: &Option<Expr>) -> fmt::Result {
    if let Some(where_) = where_ {
        let where_ = Fmt(ctx, where_);
        write!(f, "\nWHERE {where_}")?;
    }
    Ok(())
}

fn write_returning(f: &mut fmt::Formatter<'_>, returning: &[String]) -> fmt::Result {
    if !returning.is_empty() {
        write!(f, "\nRETURNING ")?;
        write_ident_list(f, returning)?;
    }
    Ok(())
}

impl Render for Expr {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Param(name) => {
                let idx = ctx.param_idx(name);
                write!(f, "${idx}")
            }
            Expr::Column(col) => write!(f, "{}", Ident(col)),
            Expr::BinOp { left, op, right } => {
                let left = Fmt(ctx, left.as_ref());
                let right = Fmt(ctx, right.as_ref());
                let op = op.as_str();
                write!(f, "{left} {op} {right}")
            }
            Expr::IsNull(expr) => {
                let expr = Fmt(ctx, expr.as_ref());
                write!(f, "{expr} IS NULL")
            }
        }
    }
}

impl Render for SelectStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;

        if self.columns.is_empty() {
            write!(f, "*")?;
        } else {
            write_ident_list(f, &self.columns)?;
        }

        if let Some(from) = &self.from {
            write!(f, "\nFROM {}", Ident(from))?;
        }

        write_where(ctx, f, &self.where_)?;

        if !self.order_by.is_empty() {
            write!(f, "\nORDER BY ")?;
            for (i, order) in self.order_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                let expr = Fmt(ctx, &order.expr);
                write!(f, "{expr} ASC")?;
            }
        }

        Ok(())
    }
}

impl Render for InsertStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = Ident(self.table.as_str());
        write!(f, "INSERT INTO {table}")?;

        if self.columns.is_empty() {
            write!(f, "\nDEFAULT VALUES")?;
        } else {
            write!(f, " (")?;
            write_ident_list(f, &self.columns)?;
            write!(f, ")\nVALUES (")?;
            for (i, val) in self.values.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", Fmt(ctx, val))?;
            }
            write!(f, ")")?;
        }

        write_returning(f, &self.returning)
    }
}

impl Render for UpdateStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = Ident(self.table.as_str());
        write!(f, "UPDATE {table}")?;

        write!(f, "\nSET ")?;
        for (i, assign) in self.assignments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let col = Ident(assign.column.as_str());
            let val = Fmt(ctx, &assign.value);
            write!(f, "{col} = {val}")?;
        }

        write_where(ctx, f, &self.where_)?;
        write_returning(f, &self.returning)
    }
}

impl Render for DeleteStmt {
    fn render(&self, ctx: &RenderContext, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = Ident(self.table.as_str());
        write!(f, "DELETE FROM {table}")?;

        write_where(ctx, f, &self.where_)
    }
}

/// Render a statement to SQL.
pub fn render(stmt: &impl Render) -> RenderedSql {
    let ctx = RenderContext::new();
    let sql = format!("{}", Fmt(&ctx, stmt));
    RenderedSql {
        sql,
        params: ctx.into_params(),
    }
}

#[cfg(test)]
mod tests;
