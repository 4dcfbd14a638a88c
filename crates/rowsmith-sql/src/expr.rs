//! SQL expressions.

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A named parameter placeholder (rendered as `$n`)
    Param(String),
    /// A column reference
    Column(String),
    /// Binary operation (e.g., a = b, a AND b)
    BinOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    /// IS NULL
    IsNull(Box<Expr>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    IsNotDistinctFrom,
    And,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Eq => "=",
            BinOp::IsNotDistinctFrom => "IS NOT DISTINCT FROM",
            BinOp::And => "AND",
        }
    }
}

// Convenience constructors
impl Expr {
    pub fn param(name: impl Into<String>) -> Self {
        Expr::Param(name.into())
    }

    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    fn binop(self, op: BinOp, other: Expr) -> Self {
        Expr::BinOp {
            left: Box::new(self),
            op,
            right: Box::new(other),
        }
    }

    /// Create an equality expression: self = other
    pub fn eq(self, other: Expr) -> Self {
        self.binop(BinOp::Eq, other)
    }

    /// Null-safe equality: self IS NOT DISTINCT FROM other
    pub fn not_distinct_from(self, other: Expr) -> Self {
        self.binop(BinOp::IsNotDistinctFrom, other)
    }

    /// Create an AND expression: self AND other
    pub fn and(self, other: Expr) -> Self {
        self.binop(BinOp::And, other)
    }

    /// Create IS NULL expression
    pub fn is_null(self) -> Self {
        Expr::IsNull(Box::new(self))
    }

    /// AND together a list of expressions. Returns `None` for an empty list.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(Expr::and)
    }
}
