use crate::span::Span;
use serde::{Deserialize, Serialize};

mod pretty;

pub use pretty::{render_expr, render_stmt};

pub type Symbol = String;
pub type BExpr = Box<Expr>;
pub type BStmt = Box<Stmt>;

/// An expression node. Owned, immutable value; the engine never mutates a
/// node it was handed, it builds fresh trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Ident(Symbol),
    Literal(Lit),
    Unary(UnOp, BExpr),
    Binary(BinOp, BExpr, BExpr),
    Assign(BExpr, BExpr),
    CompoundAssign(BinOp, BExpr, BExpr),
    IncDec(IncDecOp, BExpr),
    Call(BExpr, Vec<Expr>),
    MethodCall(BExpr, Symbol, Vec<Expr>),
    FieldAccess(BExpr, Symbol),
    Lambda(Lambda),
    /// `Class::method` reference, e.g. the named reduce combinators.
    MethodRef(Symbol, Symbol),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub params: Vec<Symbol>,
    pub body: LambdaBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LambdaBody {
    Expr(BExpr),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Lit {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncDecOp {
    PreInc,
    PostInc,
    PreDec,
    PostDec,
}

impl IncDecOp {
    pub fn is_increment(&self) -> bool {
        matches!(self, IncDecOp::PreInc | IncDecOp::PostInc)
    }
}

/// A statement node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Block(Block),
    If(If),
    Return(Option<Expr>),
    Break,
    Continue,
    Decl(Decl),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct If {
    pub cond: Expr,
    pub then_branch: BStmt,
    pub else_branch: Option<BStmt>,
}

/// A local variable declaration. `ty` is the declared type name as written
/// in the source, if the invoking layer supplied one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decl {
    pub name: Symbol,
    pub ty: Option<Symbol>,
    pub init: Option<Expr>,
}

/// The loop candidate handed in by the invoking layer: `for (var : source) body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConstruct {
    pub var: Symbol,
    pub source: Expr,
    pub body: Stmt,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::synthetic(),
        }
    }

    pub fn with_span(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn ident(name: impl Into<Symbol>) -> Expr {
        Expr::new(ExprKind::Ident(name.into()))
    }

    pub fn int(value: i64) -> Expr {
        Expr::new(ExprKind::Literal(Lit::Int(value)))
    }

    pub fn bool(value: bool) -> Expr {
        Expr::new(ExprKind::Literal(Lit::Bool(value)))
    }

    pub fn str(value: impl Into<String>) -> Expr {
        Expr::new(ExprKind::Literal(Lit::Str(value.into())))
    }

    pub fn null() -> Expr {
        Expr::new(ExprKind::Literal(Lit::Null))
    }

    pub fn not(operand: Expr) -> Expr {
        Expr::new(ExprKind::Unary(UnOp::Not, Box::new(operand)))
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    pub fn assign(lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(ExprKind::Assign(Box::new(lhs), Box::new(rhs)))
    }

    pub fn compound_assign(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(ExprKind::CompoundAssign(op, Box::new(lhs), Box::new(rhs)))
    }

    pub fn inc_dec(op: IncDecOp, target: Expr) -> Expr {
        Expr::new(ExprKind::IncDec(op, Box::new(target)))
    }

    /// Plain call with an identifier callee, e.g. `println(x)`.
    pub fn call(callee: impl Into<Symbol>, args: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::Call(Box::new(Expr::ident(callee)), args))
    }

    pub fn method_call(receiver: Expr, name: impl Into<Symbol>, args: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::MethodCall(Box::new(receiver), name.into(), args))
    }

    pub fn field_access(receiver: Expr, name: impl Into<Symbol>) -> Expr {
        Expr::new(ExprKind::FieldAccess(Box::new(receiver), name.into()))
    }

    pub fn method_ref(class: impl Into<Symbol>, method: impl Into<Symbol>) -> Expr {
        Expr::new(ExprKind::MethodRef(class.into(), method.into()))
    }

    pub fn lambda_expr(params: Vec<Symbol>, body: Expr) -> Expr {
        Expr::new(ExprKind::Lambda(Lambda {
            params,
            body: LambdaBody::Expr(Box::new(body)),
        }))
    }

    pub fn lambda_block(params: Vec<Symbol>, stmts: Vec<Stmt>) -> Expr {
        Expr::new(ExprKind::Lambda(Lambda {
            params,
            body: LambdaBody::Block(stmts),
        }))
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(_))
    }

    /// Pre-order walk over this expression and every subexpression,
    /// including the ones inside lambda bodies.
    pub fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match &self.kind {
            ExprKind::Ident(_) | ExprKind::Literal(_) | ExprKind::MethodRef(_, _) => {}
            ExprKind::Unary(_, inner) | ExprKind::IncDec(_, inner) => inner.visit(f),
            ExprKind::Binary(_, lhs, rhs)
            | ExprKind::Assign(lhs, rhs)
            | ExprKind::CompoundAssign(_, lhs, rhs) => {
                lhs.visit(f);
                rhs.visit(f);
            }
            ExprKind::Call(callee, args) => {
                callee.visit(f);
                for arg in args {
                    arg.visit(f);
                }
            }
            ExprKind::MethodCall(receiver, _, args) => {
                receiver.visit(f);
                for arg in args {
                    arg.visit(f);
                }
            }
            ExprKind::FieldAccess(receiver, _) => receiver.visit(f),
            ExprKind::Lambda(lambda) => match &lambda.body {
                LambdaBody::Expr(expr) => expr.visit(f),
                LambdaBody::Block(stmts) => {
                    for stmt in stmts {
                        stmt.visit_exprs(f);
                    }
                }
            },
        }
    }
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            span: Span::synthetic(),
        }
    }

    pub fn with_span(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn block(stmts: Vec<Stmt>) -> Stmt {
        Stmt::new(StmtKind::Block(Block { stmts }))
    }

    pub fn expr(expr: Expr) -> Stmt {
        Stmt::new(StmtKind::Expr(expr))
    }

    pub fn ret(value: Expr) -> Stmt {
        Stmt::new(StmtKind::Return(Some(value)))
    }

    pub fn ret_void() -> Stmt {
        Stmt::new(StmtKind::Return(None))
    }

    pub fn brk() -> Stmt {
        Stmt::new(StmtKind::Break)
    }

    pub fn cont() -> Stmt {
        Stmt::new(StmtKind::Continue)
    }

    pub fn decl(name: impl Into<Symbol>, ty: Option<&str>, init: Option<Expr>) -> Stmt {
        Stmt::new(StmtKind::Decl(Decl {
            name: name.into(),
            ty: ty.map(|t| t.to_string()),
            init,
        }))
    }

    pub fn if_then(cond: Expr, then_branch: Stmt) -> Stmt {
        Stmt::new(StmtKind::If(If {
            cond,
            then_branch: Box::new(then_branch),
            else_branch: None,
        }))
    }

    pub fn if_else(cond: Expr, then_branch: Stmt, else_branch: Stmt) -> Stmt {
        Stmt::new(StmtKind::If(If {
            cond,
            then_branch: Box::new(then_branch),
            else_branch: Some(Box::new(else_branch)),
        }))
    }

    /// Strip redundant single-statement block nesting: `{ { s } }` -> `s`.
    pub fn reduced(&self) -> &Stmt {
        let mut current = self;
        while let StmtKind::Block(block) = &current.kind {
            if block.stmts.len() != 1 {
                break;
            }
            current = &block.stmts[0];
        }
        current
    }

    pub fn is_continue(&self) -> bool {
        matches!(self.reduced().kind, StmtKind::Continue)
    }

    /// Pre-order walk over every expression contained in this statement.
    pub fn visit_exprs(&self, f: &mut dyn FnMut(&Expr)) {
        match &self.kind {
            StmtKind::Block(block) => {
                for stmt in &block.stmts {
                    stmt.visit_exprs(f);
                }
            }
            StmtKind::If(if_stmt) => {
                if_stmt.cond.visit(f);
                if_stmt.then_branch.visit_exprs(f);
                if let Some(else_branch) = &if_stmt.else_branch {
                    else_branch.visit_exprs(f);
                }
            }
            StmtKind::Return(value) => {
                if let Some(expr) = value {
                    expr.visit(f);
                }
            }
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Decl(decl) => {
                if let Some(init) = &decl.init {
                    init.visit(f);
                }
            }
            StmtKind::Expr(expr) => expr.visit(f),
        }
    }
}

impl LoopConstruct {
    pub fn new(var: impl Into<Symbol>, source: Expr, body: Stmt) -> Self {
        Self {
            var: var.into(),
            source,
            body,
        }
    }
}
