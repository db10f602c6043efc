//! Pipeline stage algebra: composability, merging, and lambda construction.
//!
//! The decomposer emits a list of prospective stages; this module decides
//! which adjacent stages can stay separate, fuses the ones that cannot, and
//! finally turns each stage into the argument expressions of its stream
//! method.

use std::collections::BTreeSet;

use lp_core::sema::{Resolution, TypeClass};
use lp_core::syntax::{BinOp, Expr, ExprKind, Stmt, StmtKind, Symbol};
use lp_core::Result;

use crate::error::internal_error;

/// Lambda parameter name used when a stage needs no variable at all.
pub const PLACEHOLDER_PARAM: &str = "_item";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Map,
    Filter,
    ForEach,
    Reduce,
    AnyMatch,
    NoneMatch,
}

impl OpKind {
    pub fn method_name(&self) -> &'static str {
        match self {
            OpKind::Map => "map",
            OpKind::Filter => "filter",
            OpKind::ForEach => "forEach",
            OpKind::Reduce => "reduce",
            OpKind::AnyMatch => "anyMatch",
            OpKind::NoneMatch => "noneMatch",
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.method_name())
    }
}

/// Stage payload: a bare expression (filter conditions, match conditions,
/// value maps) or the statements that will form a block lambda.
#[derive(Debug, Clone, PartialEq)]
pub enum OpBody {
    Expr(Expr),
    Stmts(Vec<Stmt>),
}

/// The accumulator a reduce stage folds into.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducerInfo {
    pub target: Symbol,
    pub op: BinOp,
}

/// One prospective pipeline stage.
///
/// `needed` is what the stage must receive from upstream; `available` is
/// what it can hand downstream. An empty `available` set is elastic: the
/// stage forwards whatever its successor asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct ProspectiveOperation {
    pub kind: OpKind,
    pub body: OpBody,
    pub needed: BTreeSet<Symbol>,
    pub available: BTreeSet<Symbol>,
    pub reducer: Option<ReducerInfo>,
}

impl ProspectiveOperation {
    pub fn new(kind: OpKind, body: OpBody, needed: BTreeSet<Symbol>) -> Self {
        let available = match kind {
            OpKind::Filter => needed.clone(),
            _ => BTreeSet::new(),
        };
        Self {
            kind,
            body,
            needed,
            available,
            reducer: None,
        }
    }

    pub fn map_stmts(stmts: Vec<Stmt>, needed: BTreeSet<Symbol>, available: BTreeSet<Symbol>) -> Self {
        Self {
            kind: OpKind::Map,
            body: OpBody::Stmts(stmts),
            needed,
            available,
            reducer: None,
        }
    }

    pub fn map_expr(expr: Expr, needed: BTreeSet<Symbol>) -> Self {
        let available = needed.clone();
        Self {
            kind: OpKind::Map,
            body: OpBody::Expr(expr),
            needed,
            available,
            reducer: None,
        }
    }

    pub fn filter(cond: Expr, needed: BTreeSet<Symbol>) -> Self {
        Self::new(OpKind::Filter, OpBody::Expr(cond), needed)
    }

    pub fn any_match(cond: Expr, needed: BTreeSet<Symbol>) -> Self {
        Self::new(OpKind::AnyMatch, OpBody::Expr(cond), needed)
    }

    pub fn none_match(cond: Expr, needed: BTreeSet<Symbol>) -> Self {
        Self::new(OpKind::NoneMatch, OpBody::Expr(cond), needed)
    }

    pub fn reduce(info: ReducerInfo) -> Self {
        let body = OpBody::Expr(Expr::ident(info.target.clone()));
        Self {
            kind: OpKind::Reduce,
            body,
            needed: BTreeSet::new(),
            available: BTreeSet::new(),
            reducer: Some(info),
        }
    }

    /// Whether this stage can follow `previous` without fusing.
    ///
    /// Stream stages pass exactly one element, so a stage needing more than
    /// one variable can never stand alone. A filter is transparent (it
    /// forwards whatever flows through it), and an elastic previous stage
    /// adopts whatever this stage asks for.
    pub fn composable_after(&self, previous: &ProspectiveOperation) -> bool {
        if self.needed.len() > 1 {
            return false;
        }
        if previous.kind == OpKind::Filter {
            return true;
        }
        if previous.available.is_empty() {
            return true;
        }
        self.needed.is_subset(&previous.available)
    }

    /// Only lazy stages fuse; terminals never do.
    pub fn is_mergeable(&self) -> bool {
        matches!(self.kind, OpKind::Map | OpKind::Filter | OpKind::ForEach)
    }

    fn into_stmts(self) -> Vec<Stmt> {
        match self.body {
            OpBody::Stmts(stmts) => stmts,
            OpBody::Expr(expr) => vec![Stmt::expr(expr)],
        }
    }

    /// Lambda parameter: the single needed variable, or the placeholder.
    pub fn param_name(&self) -> Symbol {
        self.needed
            .iter()
            .next()
            .cloned()
            .unwrap_or_else(|| PLACEHOLDER_PARAM.to_string())
    }

    /// The argument expressions of this stage's stream method.
    pub fn codegen(&self, resolution: &dyn Resolution) -> Result<Vec<Expr>> {
        match self.kind {
            OpKind::Reduce => {
                let info = self.reducer.as_ref().ok_or_else(|| {
                    internal_error("reduce stage without accumulator info")
                })?;
                Ok(vec![
                    Expr::ident(info.target.clone()),
                    combiner_for(info, resolution),
                ])
            }
            _ => Ok(vec![self.lambda()]),
        }
    }

    fn lambda(&self) -> Expr {
        let param = vec![self.param_name()];
        match &self.body {
            OpBody::Expr(expr) => Expr::lambda_expr(param, expr.clone()),
            OpBody::Stmts(stmts) => {
                // A lone expression statement in a consuming stage reads
                // better as an expression lambda.
                if self.kind == OpKind::ForEach && stmts.len() == 1 {
                    if let StmtKind::Expr(expr) = &stmts[0].kind {
                        return Expr::lambda_expr(param, expr.clone());
                    }
                }
                Expr::lambda_block(param, stmts.clone())
            }
        }
    }
}

/// Named combinator for sums over the common numeric and string types,
/// otherwise an explicit two-parameter lambda.
fn combiner_for(info: &ReducerInfo, resolution: &dyn Resolution) -> Expr {
    if info.op == BinOp::Add {
        let type_class = resolution
            .var_properties(&info.target)
            .map(|props| props.type_class);
        match type_class {
            Some(TypeClass::Integer) => return Expr::method_ref("Integer", "sum"),
            Some(TypeClass::Long) => return Expr::method_ref("Long", "sum"),
            Some(TypeClass::Double) => return Expr::method_ref("Double", "sum"),
            Some(TypeClass::Str) => return Expr::method_ref("String", "concat"),
            _ => {}
        }
    }
    Expr::lambda_expr(
        vec!["accumulator".to_string(), PLACEHOLDER_PARAM.to_string()],
        Expr::binary(
            info.op,
            Expr::ident("accumulator"),
            Expr::ident(PLACEHOLDER_PARAM),
        ),
    )
}

/// Fuse stages until every adjacent pair is composable, scanning from the
/// terminal end. Returns `None` when a non-composable pair involves a stage
/// that cannot fuse, which abandons the rewrite.
pub fn merge_operations(mut ops: Vec<ProspectiveOperation>) -> Option<Vec<ProspectiveOperation>> {
    if ops.is_empty() {
        return None;
    }
    let mut i = ops.len() - 1;
    while i > 0 {
        if ops[i].composable_after(&ops[i - 1]) {
            adopt_demand(&mut ops, i);
            i -= 1;
            continue;
        }
        if !ops[i].is_mergeable() || !ops[i - 1].is_mergeable() {
            return None;
        }
        if ops[i].kind == OpKind::Filter {
            // A filter whose condition the upstream cannot feed stops
            // being a filter: it absorbs everything downstream of it into
            // a conditional block, then the pair is re-examined.
            let trailing = ops.split_off(i + 1);
            let filter = ops.pop()?;
            ops.push(absorb_trailing(filter, trailing)?);
            continue;
        }
        let current = ops.remove(i);
        let previous = ops.remove(i - 1);
        let merged = if previous.kind == OpKind::Filter {
            absorb_into_filter(previous, current)
        } else {
            merge_adjacent(previous, current)
        };
        ops.insert(i - 1, merged);
        i -= 1;
    }
    Some(ops)
}

/// An elastic stage (empty available set) adopts its successor's demand so
/// that it forwards the element under the right name.
fn adopt_demand(ops: &mut [ProspectiveOperation], i: usize) {
    let wanted = ops[i].needed.clone();
    let previous = &mut ops[i - 1];
    if previous.available.is_empty()
        && !wanted.is_empty()
        && matches!(previous.kind, OpKind::Map | OpKind::ForEach)
        && matches!(previous.body, OpBody::Stmts(_))
    {
        previous.needed.extend(wanted.iter().cloned());
        previous.available = wanted;
    }
}

fn merge_adjacent(
    previous: ProspectiveOperation,
    current: ProspectiveOperation,
) -> ProspectiveOperation {
    let kind = if current.kind == OpKind::ForEach {
        OpKind::ForEach
    } else {
        OpKind::Map
    };
    let mut needed = previous.needed.clone();
    needed.extend(current.needed.difference(&previous.available).cloned());
    let mut available = previous.available.clone();
    available.extend(current.available.iter().cloned());

    let mut stmts = previous.into_stmts();
    stmts.extend(current.into_stmts());
    ProspectiveOperation {
        kind,
        body: OpBody::Stmts(stmts),
        needed,
        available,
        reducer: None,
    }
}

/// Fuse a stage into the filter directly upstream of it: the filter
/// condition becomes an `if` wrapped around the stage body.
fn absorb_into_filter(
    filter: ProspectiveOperation,
    current: ProspectiveOperation,
) -> ProspectiveOperation {
    let kind = if current.kind == OpKind::ForEach {
        OpKind::ForEach
    } else {
        OpKind::Map
    };
    let mut needed = filter.needed.clone();
    needed.extend(current.needed.iter().cloned());
    let mut available = needed.clone();
    available.extend(current.available.iter().cloned());

    let cond = match filter.body {
        OpBody::Expr(cond) => cond,
        OpBody::Stmts(_) => unreachable!("filter stages always carry a condition expression"),
    };
    let guarded = Stmt::if_then(cond, Stmt::block(current.into_stmts()));
    ProspectiveOperation {
        kind,
        body: OpBody::Stmts(vec![guarded]),
        needed,
        available,
        reducer: None,
    }
}

/// Fold every stage downstream of a demoted filter back into statement
/// form, innermost first, and guard the lot with the filter's condition.
fn absorb_trailing(
    filter: ProspectiveOperation,
    trailing: Vec<ProspectiveOperation>,
) -> Option<ProspectiveOperation> {
    if trailing.is_empty() {
        return None;
    }
    let mut kind = OpKind::Map;
    let mut needed = filter.needed.clone();
    for op in &trailing {
        if !op.is_mergeable() {
            return None;
        }
        needed.extend(op.needed.iter().cloned());
        if op.kind == OpKind::ForEach {
            kind = OpKind::ForEach;
        }
    }

    let mut stmts: Vec<Stmt> = Vec::new();
    for op in trailing.into_iter().rev() {
        if op.kind == OpKind::Filter {
            let cond = match op.body {
                OpBody::Expr(cond) => cond,
                OpBody::Stmts(_) => unreachable!("filter stages always carry a condition expression"),
            };
            stmts = vec![Stmt::if_then(cond, Stmt::block(stmts))];
        } else {
            let mut combined = op.into_stmts();
            combined.extend(stmts);
            stmts = combined;
        }
    }
    let cond = match filter.body {
        OpBody::Expr(cond) => cond,
        OpBody::Stmts(_) => unreachable!("filter stages always carry a condition expression"),
    };
    let available = needed.clone();
    Some(ProspectiveOperation {
        kind,
        body: OpBody::Stmts(vec![Stmt::if_then(cond, Stmt::block(stmts))]),
        needed,
        available,
        reducer: None,
    })
}

/// Final cleanup over a fully merged chain: collapse block bodies to
/// expressions where the shape allows, give every value-producing stage an
/// explicit result, and drop stages that became the identity.
pub fn beautify_operations(ops: Vec<ProspectiveOperation>) -> Vec<ProspectiveOperation> {
    let successor_needs: Vec<BTreeSet<Symbol>> = ops
        .iter()
        .skip(1)
        .map(|op| op.needed.clone())
        .chain(std::iter::once(BTreeSet::new()))
        .collect();
    ops.into_iter()
        .zip(successor_needs)
        .filter_map(|(op, succ)| beautify_map(op, &succ))
        .collect()
}

fn beautify_map(
    mut op: ProspectiveOperation,
    successor_needs: &BTreeSet<Symbol>,
) -> Option<ProspectiveOperation> {
    if op.kind != OpKind::Map {
        return Some(op);
    }
    let body = match op.body {
        OpBody::Expr(expr) => OpBody::Expr(expr),
        OpBody::Stmts(stmts) => simplify_stmts(stmts, successor_needs, &op.needed),
    };
    if let OpBody::Expr(expr) = &body {
        if is_identity(expr, &op.needed) {
            return None;
        }
    }
    op.body = body;
    Some(op)
}

/// `x -> x`: mapping a single needed variable to itself.
fn is_identity(expr: &Expr, needed: &BTreeSet<Symbol>) -> bool {
    match expr.as_ident() {
        Some(name) => needed.len() == 1 && needed.contains(name),
        None => false,
    }
}

fn simplify_stmts(
    mut stmts: Vec<Stmt>,
    successor_needs: &BTreeSet<Symbol>,
    own_needs: &BTreeSet<Symbol>,
) -> OpBody {
    while stmts.len() == 1 {
        match &stmts[0].kind {
            StmtKind::Block(block) => stmts = block.stmts.clone(),
            _ => break,
        }
    }
    if stmts.len() == 1 {
        match &stmts[0].kind {
            StmtKind::Decl(decl) if successor_needs.contains(&decl.name) => {
                if let Some(init) = &decl.init {
                    return OpBody::Expr(init.clone());
                }
            }
            StmtKind::Expr(expr) => match &expr.kind {
                ExprKind::Assign(lhs, rhs)
                    if lhs.as_ident().map_or(false, |n| successor_needs.contains(n)) =>
                {
                    return OpBody::Expr((**rhs).clone());
                }
                ExprKind::Literal(_) if successor_needs.is_empty() && own_needs.is_empty() => {
                    return OpBody::Expr(expr.clone());
                }
                _ => {}
            },
            _ => {}
        }
    }
    // Block lambdas must yield a value; pick the one the successor wants,
    // else forward our own input, else the placeholder.
    let result = successor_needs
        .iter()
        .next()
        .or_else(|| own_needs.iter().next())
        .cloned()
        .unwrap_or_else(|| PLACEHOLDER_PARAM.to_string());
    stmts.push(Stmt::ret(Expr::ident(result)));
    OpBody::Stmts(stmts)
}
