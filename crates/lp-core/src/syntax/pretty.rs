//! Compact source-text rendering of syntax trees.
//!
//! The engine hands its replacement statement back as a tree; rendering is
//! for callers that want to show or test the rewrite as Java-style text.

use itertools::Itertools;

use super::{BinOp, Expr, ExprKind, IncDecOp, LambdaBody, Lit, Stmt, StmtKind, UnOp};

pub fn render_stmt(stmt: &Stmt) -> String {
    match &stmt.kind {
        StmtKind::Block(block) => {
            if block.stmts.is_empty() {
                "{ }".to_string()
            } else {
                format!("{{ {} }}", block.stmts.iter().map(render_stmt).join(" "))
            }
        }
        StmtKind::If(if_stmt) => {
            let mut text = format!(
                "if ({}) {}",
                render_expr(&if_stmt.cond),
                render_stmt(&if_stmt.then_branch)
            );
            if let Some(else_branch) = &if_stmt.else_branch {
                text.push_str(&format!(" else {}", render_stmt(else_branch)));
            }
            text
        }
        StmtKind::Return(Some(value)) => format!("return {};", render_expr(value)),
        StmtKind::Return(None) => "return;".to_string(),
        StmtKind::Break => "break;".to_string(),
        StmtKind::Continue => "continue;".to_string(),
        StmtKind::Decl(decl) => {
            let ty = decl.ty.as_deref().unwrap_or("var");
            match &decl.init {
                Some(init) => format!("{} {} = {};", ty, decl.name, render_expr(init)),
                None => format!("{} {};", ty, decl.name),
            }
        }
        StmtKind::Expr(expr) => format!("{};", render_expr(expr)),
    }
}

pub fn render_expr(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Literal(lit) => render_lit(lit),
        ExprKind::Unary(op, operand) => {
            format!("{}{}", render_un_op(op), render_operand(operand))
        }
        ExprKind::Binary(op, lhs, rhs) => format!(
            "{} {} {}",
            render_operand(lhs),
            render_bin_op(op),
            render_operand(rhs)
        ),
        ExprKind::Assign(lhs, rhs) => {
            format!("{} = {}", render_expr(lhs), render_expr(rhs))
        }
        ExprKind::CompoundAssign(op, lhs, rhs) => {
            format!("{} {}= {}", render_expr(lhs), render_bin_op(op), render_expr(rhs))
        }
        ExprKind::IncDec(op, target) => match op {
            IncDecOp::PreInc => format!("++{}", render_expr(target)),
            IncDecOp::PostInc => format!("{}++", render_expr(target)),
            IncDecOp::PreDec => format!("--{}", render_expr(target)),
            IncDecOp::PostDec => format!("{}--", render_expr(target)),
        },
        ExprKind::Call(callee, args) => {
            format!("{}({})", render_expr(callee), render_args(args))
        }
        ExprKind::MethodCall(receiver, name, args) => {
            format!("{}.{}({})", render_expr(receiver), name, render_args(args))
        }
        ExprKind::FieldAccess(receiver, name) => {
            format!("{}.{}", render_expr(receiver), name)
        }
        ExprKind::Lambda(lambda) => {
            let params = match lambda.params.len() {
                0 => "()".to_string(),
                1 => lambda.params[0].clone(),
                _ => format!("({})", lambda.params.iter().join(", ")),
            };
            match &lambda.body {
                LambdaBody::Expr(body) => format!("{} -> {}", params, render_expr(body)),
                LambdaBody::Block(stmts) => format!(
                    "{} -> {{ {} }}",
                    params,
                    stmts.iter().map(render_stmt).join(" ")
                ),
            }
        }
        ExprKind::MethodRef(class, method) => format!("{}::{}", class, method),
    }
}

/// Parenthesize binary subexpressions so rendered trees read unambiguously
/// without tracking operator precedence.
fn render_operand(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Binary(_, _, _) | ExprKind::Assign(_, _) | ExprKind::CompoundAssign(_, _, _) => {
            format!("({})", render_expr(expr))
        }
        _ => render_expr(expr),
    }
}

fn render_args(args: &[Expr]) -> String {
    args.iter().map(render_expr).join(", ")
}

fn render_lit(lit: &Lit) -> String {
    match lit {
        Lit::Bool(value) => value.to_string(),
        Lit::Int(value) => value.to_string(),
        Lit::Float(value) => value.to_string(),
        Lit::Str(value) => format!("\"{}\"", value),
        Lit::Char(value) => format!("'{}'", value),
        Lit::Null => "null".to_string(),
    }
}

fn render_bin_op(op: &BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
        BinOp::And => "&&",
        BinOp::Or => "||",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
    }
}

fn render_un_op(op: &UnOp) -> &'static str {
    match op {
        UnOp::Not => "!",
        UnOp::Neg => "-",
    }
}
