//! Expression evaluation over a typed data tree.
//!
//! Operator climbing is non-recursive: the evaluator walks the token stream
//! left to right with an explicit operand stack and performs, at every
//! position, the reductions listed in the compiled `repeat` table. Stack
//! depth is therefore bound by operator nesting recorded at compile time,
//! not by runtime recursion. Predicates and function arguments re-enter the
//! same machine on their token sub-range.

use crate::data::{DataTree, ParsedValue};
use crate::log::{self, Error};
use crate::schema::identity::is_derived_from_or_self;
use crate::schema::{Context, DataId, ModuleId, StrId};

use super::{Expr, XpTokenKind};

/// An XPath value.
#[derive(Clone, Debug)]
pub enum Value {
    /// Node-set in document order.
    NodeSet(Vec<DataId>),
    Boolean(bool),
    Number(f64),
    Str(String),
}

/// Evaluation environment: the schema context the expression was compiled
/// against, the tree, and the prefix bindings of the expression's use site.
pub struct EvalEnv<'a> {
    /// Context owning the schema the data is bound to.
    pub ctx: &'a Context,
    /// The data tree.
    pub tree: &'a DataTree,
    /// Prefix bindings of the declaring module.
    pub prefixes: &'a [(StrId, ModuleId)],
    /// Module unprefixed names resolve to.
    pub cur_module: ModuleId,
    /// The `current()` node.
    pub current: DataId,
}

/// Position/size context inside a predicate.
#[derive(Clone, Copy)]
struct PredCtx {
    position: usize,
    size: usize,
}

/// Evaluate an expression with the given context node.
///
/// # Errors
///
/// `Error::Internal` on malformed token streams (cannot happen for
/// successfully compiled expressions).
pub fn eval(env: &EvalEnv<'_>, expr: &Expr, context_node: Option<DataId>) -> Result<Value, Error> {
    if log::debug_group_enabled(log::DebugGroups::XPATH) {
        log::debug(log::DebugGroups::XPATH, &format!("eval \"{}\"", expr.source));
    }
    eval_range(env, expr, 0, expr.len(), context_node, None)
}

/// Evaluate an expression to its boolean result.
///
/// # Errors
///
/// As [`eval`].
pub fn eval_boolean(
    env: &EvalEnv<'_>,
    expr: &Expr,
    context_node: Option<DataId>,
) -> Result<bool, Error> {
    Ok(boolean(env, &eval(env, expr, context_node)?))
}

#[allow(clippy::too_many_lines)]
fn eval_range(
    env: &EvalEnv<'_>,
    expr: &Expr,
    start: usize,
    end: usize,
    context_node: Option<DataId>,
    pred: Option<PredCtx>,
) -> Result<Value, Error> {
    let mut operands: Vec<Value> = Vec::new();
    let mut operators: Vec<XpTokenKind> = Vec::new();
    let mut i = start;

    while i < end {
        match expr.tokens[i] {
            XpTokenKind::Or
            | XpTokenKind::And
            | XpTokenKind::Equals
            | XpTokenKind::NotEquals
            | XpTokenKind::Less
            | XpTokenKind::LessEquals
            | XpTokenKind::Greater
            | XpTokenKind::GreaterEquals
            | XpTokenKind::Plus
            | XpTokenKind::Minus
            | XpTokenKind::Multiply
            | XpTokenKind::Div
            | XpTokenKind::Mod
            | XpTokenKind::Union
            | XpTokenKind::UnaryMinus => {
                operators.push(expr.tokens[i]);
                i += 1;
            }
            XpTokenKind::Literal => {
                let text = expr.token_text(i);
                operands.push(Value::Str(text[1..text.len() - 1].to_owned()));
                reduce(env, expr, i, &mut operands, &mut operators)?;
                i += 1;
            }
            XpTokenKind::Number => {
                let number: f64 = expr.token_text(i).parse().unwrap_or(f64::NAN);
                operands.push(Value::Number(number));
                reduce(env, expr, i, &mut operands, &mut operators)?;
                i += 1;
            }
            XpTokenKind::ParOpen => {
                let close = matching(expr, i, XpTokenKind::ParOpen, XpTokenKind::ParClose)?;
                let inner = eval_range(env, expr, i + 1, close, context_node, pred)?;
                let (value, next) =
                    eval_path_tail(env, expr, close + 1, end, inner, context_node)?;
                operands.push(value);
                reduce(env, expr, next - 1, &mut operands, &mut operators)?;
                i = next;
            }
            XpTokenKind::FuncName => {
                let (value, next) = eval_function(env, expr, i, end, context_node, pred)?;
                let (value, next) = eval_path_tail(env, expr, next, end, value, context_node)?;
                operands.push(value);
                reduce(env, expr, next - 1, &mut operands, &mut operators)?;
                i = next;
            }
            XpTokenKind::Slash
            | XpTokenKind::DoubleSlash
            | XpTokenKind::Dot
            | XpTokenKind::DotDot
            | XpTokenKind::At
            | XpTokenKind::NameTest => {
                let (nodes, next) = eval_path(env, expr, i, end, context_node)?;
                operands.push(Value::NodeSet(nodes));
                reduce(env, expr, next - 1, &mut operands, &mut operators)?;
                i = next;
            }
            _ => return Err(Error::Internal),
        }
    }

    if operands.len() != 1 || !operators.is_empty() {
        return Err(Error::Internal);
    }
    Ok(operands.pop().expect("one operand"))
}

/// Apply the reductions closing at token `idx`.
fn reduce(
    env: &EvalEnv<'_>,
    expr: &Expr,
    idx: usize,
    operands: &mut Vec<Value>,
    operators: &mut Vec<XpTokenKind>,
) -> Result<(), Error> {
    for _ in &expr.repeat[idx] {
        let op = operators.pop().ok_or(Error::Internal)?;
        if op == XpTokenKind::UnaryMinus {
            let value = operands.pop().ok_or(Error::Internal)?;
            operands.push(Value::Number(-number(env, &value)));
            continue;
        }
        let rhs = operands.pop().ok_or(Error::Internal)?;
        let lhs = operands.pop().ok_or(Error::Internal)?;
        operands.push(apply_binary(env, op, &lhs, &rhs)?);
    }
    Ok(())
}

fn matching(
    expr: &Expr,
    open_idx: usize,
    open: XpTokenKind,
    close: XpTokenKind,
) -> Result<usize, Error> {
    let mut depth = 0usize;
    for idx in open_idx..expr.len() {
        if expr.tokens[idx] == open {
            depth += 1;
        } else if expr.tokens[idx] == close {
            depth -= 1;
            if depth == 0 {
                return Ok(idx);
            }
        }
    }
    Err(Error::Internal)
}

// ============================================================================
// Paths
// ============================================================================

/// Continue a filter expression with predicates and a trailing path, e.g.
/// `current()/../name` or `(...)[1]`.
fn eval_path_tail(
    env: &EvalEnv<'_>,
    expr: &Expr,
    mut i: usize,
    end: usize,
    value: Value,
    _context_node: Option<DataId>,
) -> Result<(Value, usize), Error> {
    let has_tail = i < end
        && matches!(
            expr.tokens[i],
            XpTokenKind::BrackOpen | XpTokenKind::Slash | XpTokenKind::DoubleSlash
        );
    if !has_tail {
        return Ok((value, i));
    }

    let Value::NodeSet(nodes) = value else {
        return Err(Error::Internal);
    };
    let mut set = StepSet {
        nodes,
        root: false,
    };

    while i < end && expr.tokens[i] == XpTokenKind::BrackOpen {
        let close = matching(expr, i, XpTokenKind::BrackOpen, XpTokenKind::BrackClose)?;
        set.nodes = filter_predicate(env, expr, i + 1, close, &set.nodes)?;
        i = close + 1;
    }
    if i < end && matches!(expr.tokens[i], XpTokenKind::Slash | XpTokenKind::DoubleSlash) {
        if expr.tokens[i] == XpTokenKind::DoubleSlash {
            set = descend_or_self(env, set);
        }
        i += 1;
        let (stepped, next) = eval_steps(env, expr, i, end, set)?;
        return Ok((Value::NodeSet(stepped.nodes), next));
    }
    Ok((Value::NodeSet(set.nodes), i))
}

/// A node-set during path stepping. `root` marks the virtual document root
/// (the parent of all top-level nodes), which XPath can traverse but which
/// has no data node of its own.
struct StepSet {
    nodes: Vec<DataId>,
    root: bool,
}

/// Evaluate a location path starting at token `i`.
fn eval_path(
    env: &EvalEnv<'_>,
    expr: &Expr,
    mut i: usize,
    end: usize,
    context_node: Option<DataId>,
) -> Result<(Vec<DataId>, usize), Error> {
    let set: StepSet;
    match expr.tokens[i] {
        XpTokenKind::Slash | XpTokenKind::DoubleSlash => {
            // Absolute path: start at the virtual root.
            let mut start = StepSet {
                nodes: Vec::new(),
                root: true,
            };
            let double = expr.tokens[i] == XpTokenKind::DoubleSlash;
            i += 1;
            let at_step = i < end
                && matches!(
                    expr.tokens[i],
                    XpTokenKind::NameTest
                        | XpTokenKind::Dot
                        | XpTokenKind::DotDot
                        | XpTokenKind::At
                );
            if !at_step {
                // A bare `/` selects the whole tree's roots.
                return Ok((env.tree.roots().to_vec(), i));
            }
            if double {
                start = descend_or_self(env, start);
            }
            set = start;
        }
        _ => {
            set = StepSet {
                nodes: context_node.into_iter().collect(),
                root: false,
            };
        }
    }
    let (stepped, next) = eval_steps(env, expr, i, end, set)?;
    Ok((stepped.nodes, next))
}

/// Steps applied left to right (child axis between steps).
fn eval_steps(
    env: &EvalEnv<'_>,
    expr: &Expr,
    mut i: usize,
    end: usize,
    mut set: StepSet,
) -> Result<(StepSet, usize), Error> {
    loop {
        let (stepped, next) = eval_one_step(env, expr, i, end, set)?;
        set = stepped;
        i = next;

        if i < end && matches!(expr.tokens[i], XpTokenKind::Slash | XpTokenKind::DoubleSlash) {
            if expr.tokens[i] == XpTokenKind::DoubleSlash {
                set = descend_or_self(env, set);
            }
            i += 1;
        } else {
            return Ok((set, i));
        }
    }
}

/// One step plus its predicates.
fn eval_one_step(
    env: &EvalEnv<'_>,
    expr: &Expr,
    mut i: usize,
    end: usize,
    set: StepSet,
) -> Result<(StepSet, usize), Error> {
    let mut result = StepSet {
        nodes: Vec::new(),
        root: false,
    };
    match expr.tokens[i] {
        XpTokenKind::Dot => {
            result = set;
            i += 1;
        }
        XpTokenKind::DotDot => {
            for &node in &set.nodes {
                match env.tree.node(node).parent {
                    Some(parent) => {
                        if !result.nodes.contains(&parent) {
                            result.nodes.push(parent);
                        }
                    }
                    // The parent of a top-level node is the virtual root.
                    None => result.root = true,
                }
            }
            i += 1;
        }
        XpTokenKind::At => {
            // No attributes exist in YANG data trees.
            i += 2;
        }
        XpTokenKind::NameTest => {
            let (module, name) = resolve_name_test(env, expr.token_text(i));
            if set.root {
                for &root in env.tree.roots() {
                    if node_matches(env, root, module, name.as_deref()) {
                        result.nodes.push(root);
                    }
                }
            }
            for &node in &set.nodes {
                for &child in &env.tree.node(node).children {
                    if node_matches(env, child, module, name.as_deref()) {
                        result.nodes.push(child);
                    }
                }
            }
            i += 1;
        }
        _ => return Err(Error::Internal),
    }

    while i < end && expr.tokens[i] == XpTokenKind::BrackOpen {
        let close = matching(expr, i, XpTokenKind::BrackOpen, XpTokenKind::BrackClose)?;
        result.nodes = filter_predicate(env, expr, i + 1, close, &result.nodes)?;
        i = close + 1;
    }
    Ok((result, i))
}

/// A name test resolved to `(module, local-name)`; `None` name means `*`.
fn resolve_name_test(env: &EvalEnv<'_>, text: &str) -> (Option<ModuleId>, Option<String>) {
    match text.split_once(':') {
        Some((prefix, local)) => {
            let module = env
                .ctx
                .dict
                .find(prefix)
                .and_then(|prefix_id| {
                    env.prefixes
                        .iter()
                        .find(|(p, _)| *p == prefix_id)
                        .map(|&(_, m)| m)
                })
                // An unknown prefix can never match; an impossible module id
                // is not representable, so keep None-name to match nothing.
                .or(Some(env.cur_module));
            if local == "*" {
                (module, None)
            } else {
                (module, Some(local.to_owned()))
            }
        }
        None if text == "*" => (None, None),
        None => (Some(env.cur_module), Some(text.to_owned())),
    }
}

fn node_matches(
    env: &EvalEnv<'_>,
    node: DataId,
    module: Option<ModuleId>,
    name: Option<&str>,
) -> bool {
    let schema_id = env.tree.node(node).schema;
    let schema = env.ctx.node(schema_id);
    if let Some(want) = module {
        if schema.module != want {
            return false;
        }
    }
    match name {
        Some(want) => env.ctx.str(schema.name) == want,
        None => true,
    }
}

fn descend_or_self(env: &EvalEnv<'_>, set: StepSet) -> StepSet {
    let mut out = Vec::new();
    let mut stack: Vec<DataId> = if set.root {
        env.tree.roots().iter().rev().copied().collect()
    } else {
        set.nodes.iter().rev().copied().collect()
    };
    while let Some(node) = stack.pop() {
        if !out.contains(&node) {
            out.push(node);
        }
        stack.extend(env.tree.node(node).children.iter().rev().copied());
    }
    StepSet {
        nodes: out,
        root: set.root,
    }
}

fn filter_predicate(
    env: &EvalEnv<'_>,
    expr: &Expr,
    start: usize,
    end: usize,
    nodes: &[DataId],
) -> Result<Vec<DataId>, Error> {
    let size = nodes.len();
    let mut kept = Vec::new();
    for (idx, &node) in nodes.iter().enumerate() {
        let pred = PredCtx {
            position: idx + 1,
            size,
        };
        let value = eval_range(env, expr, start, end, Some(node), Some(pred))?;
        let keep = match value {
            // A numeric predicate is a position test.
            Value::Number(n) => (idx + 1) as f64 == n,
            other => boolean(env, &other),
        };
        if keep {
            kept.push(node);
        }
    }
    Ok(kept)
}

// ============================================================================
// Functions
// ============================================================================

fn eval_function(
    env: &EvalEnv<'_>,
    expr: &Expr,
    name_idx: usize,
    _end: usize,
    context_node: Option<DataId>,
    pred: Option<PredCtx>,
) -> Result<(Value, usize), Error> {
    let name = expr.token_text(name_idx).to_owned();
    let open = name_idx + 1;
    let close = matching(expr, open, XpTokenKind::ParOpen, XpTokenKind::ParClose)?;

    // Split arguments on top-level commas.
    let mut arg_ranges: Vec<(usize, usize)> = Vec::new();
    {
        let mut depth = 0usize;
        let mut arg_start = open + 1;
        for idx in (open + 1)..close {
            match expr.tokens[idx] {
                XpTokenKind::ParOpen | XpTokenKind::BrackOpen => depth += 1,
                XpTokenKind::ParClose | XpTokenKind::BrackClose => depth -= 1,
                XpTokenKind::Comma if depth == 0 => {
                    arg_ranges.push((arg_start, idx));
                    arg_start = idx + 1;
                }
                _ => {}
            }
        }
        if arg_start < close {
            arg_ranges.push((arg_start, close));
        }
    }
    let mut args = Vec::with_capacity(arg_ranges.len());
    for &(arg_start, arg_end) in &arg_ranges {
        args.push(eval_range(env, expr, arg_start, arg_end, context_node, pred)?);
    }

    let value = match name.as_str() {
        "current" => Value::NodeSet(vec![env.current]),
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        "not" => Value::Boolean(!boolean(env, &args[0])),
        "boolean" => Value::Boolean(boolean(env, &args[0])),
        "number" => match args.first() {
            Some(arg) => Value::Number(number(env, arg)),
            None => Value::Number(number(
                env,
                &Value::NodeSet(context_node.into_iter().collect()),
            )),
        },
        "string" => match args.first() {
            Some(arg) => Value::Str(string(env, arg)),
            None => Value::Str(string(
                env,
                &Value::NodeSet(context_node.into_iter().collect()),
            )),
        },
        "count" => match &args[0] {
            Value::NodeSet(nodes) => Value::Number(nodes.len() as f64),
            _ => return Err(Error::Internal),
        },
        "position" => Value::Number(pred.map_or(1.0, |p| p.position as f64)),
        "last" => Value::Number(pred.map_or(1.0, |p| p.size as f64)),
        "concat" => {
            let mut out = String::new();
            for arg in &args {
                out.push_str(&string(env, arg));
            }
            Value::Str(out)
        }
        "contains" => {
            Value::Boolean(string(env, &args[0]).contains(&string(env, &args[1])))
        }
        "starts-with" => {
            Value::Boolean(string(env, &args[0]).starts_with(&string(env, &args[1])))
        }
        "string-length" => match args.first() {
            Some(arg) => Value::Number(string(env, arg).chars().count() as f64),
            None => Value::Number(
                string(env, &Value::NodeSet(context_node.into_iter().collect()))
                    .chars()
                    .count() as f64,
            ),
        },
        "name" | "local-name" => {
            let nodes = match args.first() {
                Some(Value::NodeSet(nodes)) => nodes.clone(),
                Some(_) => return Err(Error::Internal),
                None => context_node.into_iter().collect(),
            };
            match nodes.first() {
                Some(&node) => {
                    let schema = env.ctx.node(env.tree.node(node).schema);
                    let local = env.ctx.str(schema.name).to_owned();
                    if name == "name" {
                        let module =
                            env.ctx.str(env.ctx.modules[schema.module.to_index()].name);
                        Value::Str(format!("{module}:{local}"))
                    } else {
                        Value::Str(local)
                    }
                }
                None => Value::Str(String::new()),
            }
        }
        "floor" => Value::Number(number(env, &args[0]).floor()),
        "ceiling" => Value::Number(number(env, &args[0]).ceil()),
        "round" => Value::Number(number(env, &args[0]).round()),
        "derived-from" | "derived-from-or-self" => {
            let Value::NodeSet(nodes) = &args[0] else {
                return Err(Error::Internal);
            };
            let ident_text = string(env, &args[1]);
            let target = resolve_identity_arg(env, &ident_text);
            let or_self = name == "derived-from-or-self";
            let mut matched = false;
            if let Some(target) = target {
                for &node in nodes {
                    if let Some(ParsedValue::IdentityRef(identity)) = env
                        .tree
                        .node(node)
                        .value
                        .as_ref()
                        .map(|v| &v.parsed)
                    {
                        let derived = *identity != target
                            && is_derived_from_or_self(env.ctx.identities(), *identity, target);
                        if derived || (or_self && *identity == target) {
                            matched = true;
                            break;
                        }
                    }
                }
            }
            Value::Boolean(matched)
        }
        _ => return Err(Error::Internal),
    };
    Ok((value, close + 1))
}

fn resolve_identity_arg(env: &EvalEnv<'_>, text: &str) -> Option<crate::schema::IdentityId> {
    match text.split_once(':') {
        Some((prefix, local)) => {
            let module = env
                .ctx
                .dict
                .find(prefix)
                .and_then(|prefix_id| {
                    env.prefixes
                        .iter()
                        .find(|(p, _)| *p == prefix_id)
                        .map(|&(_, m)| m)
                })
                .or_else(|| env.ctx.get_module(prefix, None).map(|m| m.id))?;
            env.ctx.find_identity(module, local)
        }
        None => env.ctx.find_identity(env.cur_module, text),
    }
}

// ============================================================================
// Coercions
// ============================================================================

/// XPath string-value of a data node: leaf canonical text, or the
/// concatenation of descendant leaf values in document order.
fn node_string(env: &EvalEnv<'_>, node: DataId) -> String {
    let data = env.tree.node(node);
    if let Some(value) = &data.value {
        return value.canonical.clone();
    }
    let mut out = String::new();
    let mut stack: Vec<DataId> = data.children.iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        let node = env.tree.node(id);
        if let Some(value) = &node.value {
            out.push_str(&value.canonical);
        }
        stack.extend(node.children.iter().rev().copied());
    }
    out
}

pub(crate) fn boolean(_env: &EvalEnv<'_>, value: &Value) -> bool {
    match value {
        Value::NodeSet(nodes) => !nodes.is_empty(),
        Value::Boolean(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::Str(s) => !s.is_empty(),
    }
}

fn number(env: &EvalEnv<'_>, value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Boolean(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::NodeSet(nodes) => match nodes.first() {
            Some(&node) => node_string(env, node).trim().parse().unwrap_or(f64::NAN),
            None => f64::NAN,
        },
    }
}

fn string(env: &EvalEnv<'_>, value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        Value::Boolean(b) => b.to_string(),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.is_finite() {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        Value::NodeSet(nodes) => nodes
            .first()
            .map(|&node| node_string(env, node))
            .unwrap_or_default(),
    }
}

fn apply_binary(
    env: &EvalEnv<'_>,
    op: XpTokenKind,
    lhs: &Value,
    rhs: &Value,
) -> Result<Value, Error> {
    let value = match op {
        XpTokenKind::Or => Value::Boolean(boolean(env, lhs) || boolean(env, rhs)),
        XpTokenKind::And => Value::Boolean(boolean(env, lhs) && boolean(env, rhs)),
        XpTokenKind::Equals => Value::Boolean(compare_eq(env, lhs, rhs)),
        XpTokenKind::NotEquals => Value::Boolean(!compare_eq(env, lhs, rhs)),
        XpTokenKind::Less => Value::Boolean(compare_rel(env, lhs, rhs, |a, b| a < b)),
        XpTokenKind::LessEquals => Value::Boolean(compare_rel(env, lhs, rhs, |a, b| a <= b)),
        XpTokenKind::Greater => Value::Boolean(compare_rel(env, lhs, rhs, |a, b| a > b)),
        XpTokenKind::GreaterEquals => Value::Boolean(compare_rel(env, lhs, rhs, |a, b| a >= b)),
        XpTokenKind::Plus => Value::Number(number(env, lhs) + number(env, rhs)),
        XpTokenKind::Minus => Value::Number(number(env, lhs) - number(env, rhs)),
        XpTokenKind::Multiply => Value::Number(number(env, lhs) * number(env, rhs)),
        XpTokenKind::Div => Value::Number(number(env, lhs) / number(env, rhs)),
        XpTokenKind::Mod => Value::Number(number(env, lhs) % number(env, rhs)),
        XpTokenKind::Union => {
            let (Value::NodeSet(a), Value::NodeSet(b)) = (lhs, rhs) else {
                return Err(Error::Internal);
            };
            let mut out = a.clone();
            for &node in b {
                if !out.contains(&node) {
                    out.push(node);
                }
            }
            Value::NodeSet(out)
        }
        _ => return Err(Error::Internal),
    };
    Ok(value)
}

fn compare_eq(env: &EvalEnv<'_>, lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::NodeSet(a), Value::NodeSet(b)) => a.iter().any(|&na| {
            let sa = node_string(env, na);
            b.iter().any(|&nb| sa == node_string(env, nb))
        }),
        (Value::NodeSet(nodes), other) | (other, Value::NodeSet(nodes)) => match other {
            Value::Number(n) => nodes
                .iter()
                .any(|&node| node_string(env, node).trim().parse() == Ok(*n)),
            Value::Str(s) => nodes.iter().any(|&node| node_string(env, node) == *s),
            Value::Boolean(b) => boolean(env, &Value::NodeSet(nodes.clone())) == *b,
            Value::NodeSet(_) => unreachable!(),
        },
        (Value::Boolean(_), _) | (_, Value::Boolean(_)) => {
            boolean(env, lhs) == boolean(env, rhs)
        }
        (Value::Number(_), _) | (_, Value::Number(_)) => number(env, lhs) == number(env, rhs),
        (Value::Str(a), Value::Str(b)) => a == b,
    }
}

fn compare_rel(
    env: &EvalEnv<'_>,
    lhs: &Value,
    rhs: &Value,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    match (lhs, rhs) {
        (Value::NodeSet(nodes), other) => nodes.iter().any(|&node| {
            let n: f64 = node_string(env, node).trim().parse().unwrap_or(f64::NAN);
            cmp(n, number(env, other))
        }),
        (other, Value::NodeSet(nodes)) => nodes.iter().any(|&node| {
            let n: f64 = node_string(env, node).trim().parse().unwrap_or(f64::NAN);
            cmp(number(env, other), n)
        }),
        _ => cmp(number(env, lhs), number(env, rhs)),
    }
}
