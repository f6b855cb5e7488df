//! Expression and built-in function translation (part of C4).
//!
//! Walks `spargebra::algebra::Expression` and emits a SQL boolean/scalar
//! expression string, using SQLite's built-in scalar functions where they
//! line up (`lower`, `upper`, `length`, `substr`, `instr`, `round`) and the
//! custom `Sparql*` scalar functions registered by `db::schema` (regex,
//! checksums, date parts) where they don't, per spec §4.4's built-in
//! function table.

use spargebra::algebra::{Expression, Function};
use spargebra::term::{Literal, NamedNode, TermPattern, Variable};

use super::context::QueryContext;
use super::TranslateError;
use crate::ontology::Registry;

/// Quote a string literal for inline embedding in emitted SQL, doubling
/// embedded single quotes. Everywhere a value could plausibly come from a
/// request (literal text from the SPARQL query), only this path is used —
/// never raw string concatenation.
pub fn sql_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

pub fn translate_term_pattern(
    ctx: &mut QueryContext,
    term: &TermPattern,
) -> Result<String, TranslateError> {
    match term {
        TermPattern::Variable(v) => ctx
            .lookup(v)
            .map(str::to_string)
            .ok_or_else(|| TranslateError::UnboundVariable(v.as_str().to_string())),
        TermPattern::NamedNode(n) => Ok(format!("(SELECT ID FROM Resource WHERE Uri = {})", sql_quote(n.as_str()))),
        TermPattern::Literal(l) => Ok(sql_quote(l.value())),
        TermPattern::BlankNode(b) => Err(TranslateError::Unsupported(format!(
            "blank node {} in query position",
            b.as_str()
        ))),
    }
}

pub fn translate_expression(
    ctx: &mut QueryContext,
    registry: &Registry,
    expr: &Expression,
) -> Result<String, TranslateError> {
    use Expression::*;
    match expr {
        NamedNode(n) => Ok(format!("(SELECT ID FROM Resource WHERE Uri = {})", sql_quote(n.as_str()))),
        Literal(l) => Ok(translate_literal(l)),
        Variable(v) => ctx
            .lookup(v)
            .map(str::to_string)
            .ok_or_else(|| TranslateError::UnboundVariable(v.as_str().to_string())),
        Or(l, r) => binary(ctx, registry, l, r, "OR"),
        And(l, r) => binary(ctx, registry, l, r, "AND"),
        Equal(l, r) => binary(ctx, registry, l, r, "="),
        SameTerm(l, r) => binary(ctx, registry, l, r, "IS"),
        Greater(l, r) => binary(ctx, registry, l, r, ">"),
        GreaterOrEqual(l, r) => binary(ctx, registry, l, r, ">="),
        Less(l, r) => binary(ctx, registry, l, r, "<"),
        LessOrEqual(l, r) => binary(ctx, registry, l, r, "<="),
        Add(l, r) => binary(ctx, registry, l, r, "+"),
        Subtract(l, r) => binary(ctx, registry, l, r, "-"),
        Multiply(l, r) => binary(ctx, registry, l, r, "*"),
        Divide(l, r) => binary(ctx, registry, l, r, "/"),
        UnaryPlus(inner) => translate_expression(ctx, registry, inner),
        UnaryMinus(inner) => Ok(format!("(-({}))", translate_expression(ctx, registry, inner)?)),
        Not(inner) => Ok(format!("(NOT ({}))", translate_expression(ctx, registry, inner)?)),
        In(needle, haystack) => {
            let needle_sql = translate_expression(ctx, registry, needle)?;
            let mut opts = Vec::with_capacity(haystack.len());
            for h in haystack {
                opts.push(translate_expression(ctx, registry, h)?);
            }
            Ok(format!("({needle_sql} IN ({}))", opts.join(", ")))
        }
        Bound(v) => Ok(match ctx.lookup(v) {
            Some(expr) => format!("({expr} IS NOT NULL)"),
            None => "0".to_string(),
        }),
        If(cond, then, els) => Ok(format!(
            "(CASE WHEN {} THEN {} ELSE {} END)",
            translate_expression(ctx, registry, cond)?,
            translate_expression(ctx, registry, then)?,
            translate_expression(ctx, registry, els)?,
        )),
        Coalesce(exprs) => {
            let mut parts = Vec::with_capacity(exprs.len());
            for e in exprs {
                parts.push(translate_expression(ctx, registry, e)?);
            }
            Ok(format!("COALESCE({})", parts.join(", ")))
        }
        Exists(pattern) => {
            // EXISTS{...} compiles to a correlated `EXISTS (SELECT 1 FROM ...)`
            // sub-select over a nested translation of the inner pattern,
            // sharing the outer context's variable bindings.
            let nested = super::translate::translate_pattern_to_exists(ctx, registry, pattern)?;
            Ok(format!("EXISTS ({nested})"))
        }
        FunctionCall(func, args) => translate_function(ctx, registry, func, args),
    }
}

fn binary(
    ctx: &mut QueryContext,
    registry: &Registry,
    l: &Expression,
    r: &Expression,
    op: &str,
) -> Result<String, TranslateError> {
    let l = translate_expression(ctx, registry, l)?;
    let r = translate_expression(ctx, registry, r)?;
    Ok(format!("({l} {op} {r})"))
}

fn translate_literal(l: &Literal) -> String {
    sql_quote(l.value())
}

/// Built-in function dispatch table (spec §4.4). SQLite-native functions
/// are used where the semantics line up; everything requiring regex,
/// hashing, or ISO date-part extraction routes through the `Sparql*`
/// scalar functions `db::schema` registers at connection-open time.
fn translate_function(
    ctx: &mut QueryContext,
    registry: &Registry,
    func: &Function,
    args: &[Expression],
) -> Result<String, TranslateError> {
    if let Function::Custom(name) = func {
        if let Some(sql) = translate_fts_aux_function(ctx, registry, name, args)? {
            return Ok(sql);
        }
    }

    let mut a = Vec::with_capacity(args.len());
    for arg in args {
        a.push(translate_expression(ctx, registry, arg)?);
    }
    let sql = match func {
        Function::Str => format!("CAST({} AS TEXT)", a[0]),
        Function::Lang => format!("SparqlLang({})", a[0]),
        Function::LangMatches => format!("SparqlLangMatches({}, {})", a[0], a[1]),
        Function::Datatype => format!("SparqlDatatype({})", a[0]),
        Function::Bnode => return Err(TranslateError::Unsupported("BNODE()".into())),
        Function::Rand => "(ABS(RANDOM()) / 9223372036854775807.0)".to_string(),
        Function::Abs => format!("ABS({})", a[0]),
        Function::Ceil => format!("SparqlCeil({})", a[0]),
        Function::Floor => format!("SparqlFloor({})", a[0]),
        Function::Round => format!("ROUND({})", a[0]),
        Function::Concat => format!("({})", a.join(" || ")),
        Function::SubStr => {
            if a.len() == 3 {
                format!("SUBSTR({}, {}, {})", a[0], a[1], a[2])
            } else {
                format!("SUBSTR({}, {})", a[0], a[1])
            }
        }
        Function::StrLen => format!("LENGTH({})", a[0]),
        Function::Replace => format!("SparqlRegexReplace({}, {}, {})", a[0], a[1], a[2]),
        Function::UCase => format!("UPPER({})", a[0]),
        Function::LCase => format!("LOWER({})", a[0]),
        Function::EncodeForUri => format!("SparqlUriEncode({})", a[0]),
        Function::Contains => format!("(INSTR({}, {}) > 0)", a[0], a[1]),
        Function::StrStarts => format!("({} LIKE ({} || '%'))", a[0], a[1]),
        Function::StrEnds => format!("({} LIKE ('%' || {}))", a[0], a[1]),
        Function::StrBefore => format!("SparqlStrBefore({}, {})", a[0], a[1]),
        Function::StrAfter => format!("SparqlStrAfter({}, {})", a[0], a[1]),
        Function::Year => format!("CAST(strftime('%Y', {}, 'unixepoch') AS INTEGER)", a[0]),
        Function::Month => format!("CAST(strftime('%m', {}, 'unixepoch') AS INTEGER)", a[0]),
        Function::Day => format!("CAST(strftime('%d', {}, 'unixepoch') AS INTEGER)", a[0]),
        Function::Hours => format!("((CAST({} AS INTEGER) / 3600) % 24)", a[0]),
        Function::Minutes => format!("((CAST({} AS INTEGER) / 60) % 60)", a[0]),
        Function::Seconds => format!("(CAST({} AS INTEGER) % 60)", a[0]),
        Function::Now => "strftime('%s', 'now')".to_string(),
        Function::Uuid => "('urn:uuid:' || SparqlUuid())".to_string(),
        Function::StrUuid => "SparqlUuid()".to_string(),
        Function::Md5 => format!("SparqlChecksum({}, 'md5')", a[0]),
        Function::Sha1 => format!("SparqlChecksum({}, 'sha1')", a[0]),
        Function::Sha256 => format!("SparqlChecksum({}, 'sha256')", a[0]),
        Function::Sha384 => format!("SparqlChecksum({}, 'sha384')", a[0]),
        Function::Sha512 => format!("SparqlChecksum({}, 'sha512')", a[0]),
        Function::StrLang => format!("{}", a[0]),
        Function::StrDt => format!("{}", a[0]),
        Function::IsIri => format!("SparqlIsResource({})", a[0]),
        Function::IsBlank => "0".to_string(),
        Function::IsLiteral => format!("(NOT SparqlIsResource({}))", a[0]),
        Function::IsNumeric => format!("(typeof({}) IN ('integer', 'real'))", a[0]),
        Function::Regex => {
            if a.len() == 3 {
                format!("SparqlRegex({}, {}, {})", a[0], a[1], a[2])
            } else {
                format!("SparqlRegex({}, {}, '')", a[0], a[1])
            }
        }
        Function::Custom(name) => return translate_custom_function(name, &a),
        _ => return Err(TranslateError::Unsupported(format!("built-in {func:?}"))),
    };
    Ok(sql)
}

/// `fts:rank`/`fts:offsets`/`fts:snippet` read the auxiliary bindings
/// `match_triple` threads alongside the subject of an `fts:match` triple
/// (spec §4.4), so unlike every other custom function they need the
/// *variable* identity of their first argument rather than its translated
/// SQL text — intercepted here, before the generic argument pass erases
/// that identity. Returns `None` for anything else, falling through to
/// `translate_custom_function`.
fn translate_fts_aux_function(
    ctx: &mut QueryContext,
    registry: &Registry,
    name: &NamedNode,
    args: &[Expression],
) -> Result<Option<String>, TranslateError> {
    const RANK: &str = "http://www.tracker-project.org/ontologies/fts#rank";
    const OFFSETS: &str = "http://www.tracker-project.org/ontologies/fts#offsets";
    const SNIPPET: &str = "http://www.tracker-project.org/ontologies/fts#snippet";
    if ![RANK, OFFSETS, SNIPPET].contains(&name.as_str()) {
        return Ok(None);
    }
    let subject = fts_subject_variable(args)?;

    if name.as_str() == RANK {
        let rank_var = super::translate::fts_aux_variable(subject, "Rank");
        let expr = ctx.lookup(&rank_var).ok_or_else(|| {
            TranslateError::Unsupported("fts:rank used on a variable never bound by fts:match".into())
        })?;
        return Ok(Some(expr.to_string()));
    }

    let subject_expr = ctx
        .lookup(subject)
        .ok_or_else(|| TranslateError::UnboundVariable(subject.as_str().to_string()))?
        .to_string();

    if name.as_str() == OFFSETS {
        return Ok(Some(format!("tracker_offsets({subject_expr})")));
    }

    // SNIPPET: fts5's `snippet()` only works within the query scope that
    // holds the live MATCH, which may no longer be in scope here after
    // however many `Join`/`Extend` wrappers sit between this call and the
    // original triple — so re-run the MATCH in a correlated subquery
    // narrowed to this one row instead of trying to reach back into it.
    let query_var = super::translate::fts_aux_variable(subject, "Query");
    let query_sql = ctx
        .lookup(&query_var)
        .ok_or_else(|| {
            TranslateError::Unsupported("fts:snippet used on a variable never bound by fts:match".into())
        })?
        .to_string();
    let start_arg = args
        .get(1)
        .ok_or_else(|| TranslateError::Unsupported("fts:snippet requires start/end markers".into()))?;
    let end_arg = args
        .get(2)
        .ok_or_else(|| TranslateError::Unsupported("fts:snippet requires start/end markers".into()))?;
    let start = translate_expression(ctx, registry, start_arg)?;
    let end = translate_expression(ctx, registry, end_arg)?;
    Ok(Some(format!(
        "(SELECT snippet(fts_index, 0, {start}, {end}, '…', 5) \
          FROM fts_index WHERE fts_index MATCH {query_sql} AND rowid = {subject_expr})"
    )))
}

fn fts_subject_variable(args: &[Expression]) -> Result<&Variable, TranslateError> {
    match args.first() {
        Some(Expression::Variable(v)) => Ok(v),
        _ => Err(TranslateError::Unsupported(
            "fts: auxiliary functions require a variable argument bound by fts:match".into(),
        )),
    }
}

/// `tracker:`-namespaced custom functions, per spec §4.4. Anything else is
/// out of scope (no `SERVICE`-delegated custom functions).
fn translate_custom_function(name: &NamedNode, args: &[String]) -> Result<String, TranslateError> {
    match name.as_str() {
        "http://www.tracker-project.org/ontologies/tracker#coalesce" => {
            Ok(format!("COALESCE({})", args.join(", ")))
        }
        "http://www.tracker-project.org/ontologies/tracker#id" => {
            Ok(args.first().cloned().unwrap_or_default())
        }
        "http://www.tracker-project.org/ontologies/tracker#uri" => Ok(format!(
            "(SELECT Uri FROM Resource WHERE ID = {})",
            args.first().cloned().unwrap_or_default()
        )),
        "http://www.tracker-project.org/ontologies/tracker#cartesian-distance" => Ok(format!(
            "SparqlCartesianDistance({}, {}, {}, {})",
            args[0], args[1], args[2], args[3]
        )),
        "http://www.tracker-project.org/ontologies/tracker#haversine-distance" => Ok(format!(
            "SparqlHaversineDistance({}, {}, {}, {})",
            args[0], args[1], args[2], args[3]
        )),
        other => Err(TranslateError::Unsupported(format!(
            "custom function {other}"
        ))),
    }
}

