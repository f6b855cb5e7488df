//! Graph-pattern visitor (the core of C4).
//!
//! Each `spargebra::algebra::GraphPattern` node compiles to a self-contained
//! parenthesised `SELECT` exposing its bound variables as `v_<name>`
//! columns — composable exactly like the recursive-descent visitor spec §4
//! describes, with join/union/filter nodes wrapping their children's SQL
//! text rather than threading a single mutable accumulator through the
//! whole tree. Leaf nodes (`Bgp`, `Path`, `Values`) still use the flat
//! `QueryContext` accumulator internally, since a basic graph pattern's
//! triples genuinely do share one join scope.

use std::collections::{BTreeSet, HashMap};

use spargebra::algebra::{AggregateExpression, GraphPattern};
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern, Variable};

use super::context::{QueryContext, ValueKind};
use super::expr::{sql_quote, translate_expression};
use super::path::{compile_path, render_path_join};
use super::TranslateError;
use crate::ontology::{DataType, Registry};

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const FTS_MATCH: &str = "http://www.tracker-project.org/ontologies/fts#match";

/// A translated pattern: a parenthesised `SELECT` plus the SPARQL
/// variables it exposes as `v_<name>` columns, along with each variable's
/// surface type (spec §4.4 "Projection") so the outermost query can wrap
/// resource/boolean/date/datetime columns back into their SPARQL form.
pub struct SubSelect {
    pub sql: String,
    pub variables: Vec<Variable>,
    pub kinds: HashMap<Variable, ValueKind>,
}

impl SubSelect {
    pub fn kind_of(&self, v: &Variable) -> ValueKind {
        self.kinds.get(v).copied().unwrap_or_default()
    }
}

fn merge_kinds(a: &HashMap<Variable, ValueKind>, b: &HashMap<Variable, ValueKind>) -> HashMap<Variable, ValueKind> {
    let mut out = a.clone();
    for (k, v) in b {
        out.entry(k.clone()).or_insert(*v);
    }
    out
}

pub fn var_col(v: &Variable) -> String {
    let sanitized: String = v
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("v_{sanitized}")
}

/// The internal variable an `fts:match` triple's `?s:ftsRank`/`?s:ftsQuery`
/// auxiliary binding (spec §4.4) is threaded through as: derived from the
/// subject variable so it survives ordinary composition (`Project`/`Extend`
/// both pass through whatever the inner `Bgp` bound) without needing a
/// separate side channel.
pub fn fts_aux_variable(subject: &Variable, suffix: &str) -> Variable {
    Variable::new(format!("{}__fts{suffix}", subject.as_str()))
        .expect("fts auxiliary variable name is a valid SPARQL identifier")
}

fn bind_term(ctx: &mut QueryContext, term: &TermPattern, col_expr: &str, kind: ValueKind) -> Result<(), TranslateError> {
    match term {
        TermPattern::Variable(v) => {
            ctx.bind_typed(v, col_expr, kind);
        }
        TermPattern::NamedNode(n) => {
            ctx.add_predicate(format!(
                "{col_expr} = (SELECT ID FROM Resource WHERE Uri = {})",
                sql_quote(n.as_str())
            ));
        }
        TermPattern::Literal(l) => {
            ctx.add_predicate(format!("{col_expr} = {}", sql_quote(l.value())));
        }
        TermPattern::BlankNode(_) => {
            return Err(TranslateError::Unsupported(
                "blank node in query pattern".into(),
            ))
        }
    }
    Ok(())
}

/// The surface type a property's object column should be projected as
/// (spec §4.4 "Projection"): resource-valued properties need the
/// `Resource` URI wrap, boolean/date/datetime ones need their own
/// string conversion, everything else is already caller-ready text.
fn object_kind(data_type: DataType) -> ValueKind {
    match data_type {
        DataType::Resource => ValueKind::Resource,
        DataType::Boolean => ValueKind::Boolean,
        DataType::Date => ValueKind::Date,
        DataType::DateTime => ValueKind::DateTime,
        _ => ValueKind::Other,
    }
}

fn match_triple(
    ctx: &mut QueryContext,
    registry: &Registry,
    tp: &TriplePattern,
) -> Result<(), TranslateError> {
    let alias = ctx.fresh_alias("t");
    match &tp.predicate {
        NamedNodePattern::NamedNode(n) if n.as_str() == RDF_TYPE => {
            ctx.add_source("Resource", alias.clone());
            bind_term(ctx, &tp.subject, &format!("{alias}.ID"), ValueKind::Resource)?;
            match &tp.object {
                TermPattern::NamedNode(class_iri) => {
                    let svc = registry
                        .service_of(class_iri.as_str())
                        .ok_or_else(|| TranslateError::UnknownClass(class_iri.as_str().to_string()))?;
                    ctx.add_predicate(format!("{alias}.TypeID = {}", svc.id));
                }
                TermPattern::Variable(v) => {
                    ctx.bind(v, format!("(SELECT Uri FROM Resource WHERE ID = {alias}.TypeID)"));
                }
                other => {
                    return Err(TranslateError::Unsupported(format!(
                        "rdf:type object {other:?}"
                    )))
                }
            }
        }
        NamedNodePattern::NamedNode(n) if n.as_str() == FTS_MATCH => {
            let fts_alias = ctx.fresh_alias("fts");
            ctx.add_source("fts_index", fts_alias.clone());
            let query_sql = match &tp.object {
                TermPattern::Literal(l) => sql_quote(l.value()),
                TermPattern::Variable(v) => ctx
                    .lookup(v)
                    .map(str::to_string)
                    .ok_or_else(|| TranslateError::UnboundVariable(v.as_str().to_string()))?,
                other => {
                    return Err(TranslateError::Unsupported(format!(
                        "fts:match query term {other:?}"
                    )))
                }
            };
            bind_term(ctx, &tp.subject, &format!("{fts_alias}.rowid"), ValueKind::Resource)?;
            // `rank` is FTS5's own hidden column; safe to project here since
            // this is still the same query scope the MATCH predicate lives
            // in. `ftsQuery` carries the matched text forward so a later
            // `fts:snippet(?s, …)` call (translated outside this subselect,
            // once composed through however many `Join`/`Extend` wrappers)
            // can re-run the MATCH in a correlated subquery scoped to one
            // row — `snippet()`/`highlight()` need a live MATCH in scope,
            // which a bare `WHERE rowid = …` lookup can't give them.
            if let TermPattern::Variable(subject) = &tp.subject {
                ctx.bind(&fts_aux_variable(subject, "Rank"), format!("{fts_alias}.rank"));
                ctx.bind(&fts_aux_variable(subject, "Query"), query_sql.clone());
            }
            ctx.add_predicate(format!("{fts_alias} MATCH {query_sql}"));
        }
        NamedNodePattern::NamedNode(n) => {
            let prop = registry
                .property_of(n.as_str())
                .ok_or_else(|| TranslateError::UnknownProperty(n.as_str().to_string()))?;
            ctx.add_source(
                format!(
                    "(SELECT SubjectID, ObjectID FROM tracker_triples WHERE PropertyID = {})",
                    prop.id
                ),
                alias.clone(),
            );
            bind_term(ctx, &tp.subject, &format!("{alias}.SubjectID"), ValueKind::Resource)?;
            bind_term(ctx, &tp.object, &format!("{alias}.ObjectID"), object_kind(prop.data_type))?;
        }
        NamedNodePattern::Variable(pv) => {
            ctx.add_source("tracker_triples", alias.clone());
            bind_term(ctx, &tp.subject, &format!("{alias}.SubjectID"), ValueKind::Resource)?;
            ctx.bind(pv, format!("(SELECT Uri FROM Resource WHERE ID = {alias}.PropertyID)"));
            bind_term(ctx, &tp.object, &format!("{alias}.ObjectID"), ValueKind::Other)?;
        }
    }
    Ok(())
}

fn build_select(ctx: QueryContext, ctes: Vec<String>) -> SubSelect {
    let from_clause = ctx
        .sources()
        .iter()
        .map(|s| format!("{} {}", s.relation, s.alias))
        .collect::<Vec<_>>()
        .join(", ");
    let where_clause = if ctx.predicates().is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", ctx.predicates().join(" AND "))
    };
    let select_cols = if ctx.bindings().is_empty() {
        "1 AS __dummy".to_string()
    } else {
        ctx.bindings()
            .iter()
            .map(|b| format!("{} AS {}", b.sql_expr, var_col(&b.variable)))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let with_clause = if ctes.is_empty() {
        String::new()
    } else {
        format!("WITH RECURSIVE {} ", ctes.join(", "))
    };
    let from = if from_clause.is_empty() {
        "(SELECT 1) __unit".to_string()
    } else {
        from_clause
    };
    let sql = format!("({with_clause}SELECT {select_cols} FROM {from}{where_clause})");
    SubSelect {
        sql,
        variables: ctx.bindings().iter().map(|b| b.variable.clone()).collect(),
        kinds: ctx.bindings().iter().map(|b| (b.variable.clone(), b.kind)).collect(),
    }
}

/// Re-binds a sub-select's output variables against the alias it was
/// joined under as `{alias}.v_<name>`, for an outer expression context
/// (`FILTER`, `BIND`, `ORDER BY`, …) that needs to reference them. Carries
/// each variable's surface type along so nested `EXISTS`/`BIND` can still
/// see it.
fn bind_from_subselect(ctx: &mut QueryContext, alias: &str, sub: &SubSelect) {
    for v in &sub.variables {
        ctx.bind_typed(v, format!("{alias}.{}", var_col(v)), sub.kind_of(v));
    }
}

/// Entry point the outer query-level compiler calls; also used recursively
/// by `Filter`'s `EXISTS` sub-patterns and the `Group`/`Project` wrappers.
pub fn translate_graph_pattern(
    registry: &Registry,
    pattern: &GraphPattern,
) -> Result<SubSelect, TranslateError> {
    use GraphPattern::*;
    match pattern {
        Bgp { patterns } => {
            let mut ctx = QueryContext::new();
            for tp in patterns {
                match_triple(&mut ctx, registry, tp)?;
            }
            Ok(build_select(ctx, vec![]))
        }

        Path {
            subject,
            path,
            object,
        } => {
            let mut ctx = QueryContext::new();
            let compiled = compile_path(&mut ctx, registry, path)?;
            let alias = ctx.fresh_alias("p");
            let (cte_sql, join_predicate) = render_path_join(
                &compiled,
                &format!("{alias}.start_id"),
                &format!("{alias}.end_id"),
            );
            ctx.add_source(compiled.relation.clone(), alias.clone());
            bind_term(&mut ctx, subject, &format!("{alias}.start_id"), ValueKind::Resource)?;
            bind_term(&mut ctx, object, &format!("{alias}.end_id"), ValueKind::Resource)?;
            ctx.add_predicate(join_predicate);
            Ok(build_select(ctx, cte_sql.into_iter().collect()))
        }

        Join { left, right } => {
            let l = translate_graph_pattern(registry, left)?;
            let r = translate_graph_pattern(registry, right)?;
            combine_join(&l, &r, "JOIN", None)
        }

        LeftJoin {
            left,
            right,
            expression,
        } => {
            let l = translate_graph_pattern(registry, left)?;
            let r = translate_graph_pattern(registry, right)?;
            let extra_on = match expression {
                Some(expr) => {
                    let mut ectx = QueryContext::new();
                    bind_from_subselect(&mut ectx, "l", &l);
                    bind_from_subselect(&mut ectx, "r", &r);
                    Some(translate_expression(&mut ectx, registry, expr)?)
                }
                None => None,
            };
            combine_join(&l, &r, "LEFT JOIN", extra_on)
        }

        Filter { expr, inner } => {
            let s = translate_graph_pattern(registry, inner)?;
            let mut ectx = QueryContext::new();
            bind_from_subselect(&mut ectx, "s", &s);
            let predicate = translate_expression(&mut ectx, registry, expr)?;
            Ok(SubSelect {
                sql: format!("(SELECT s.* FROM {} s WHERE {predicate})", s.sql),
                kinds: s.kinds.clone(),
                variables: s.variables,
            })
        }

        Union { left, right } => {
            let l = translate_graph_pattern(registry, left)?;
            let r = translate_graph_pattern(registry, right)?;
            let all_vars: BTreeSet<String> = l
                .variables
                .iter()
                .chain(r.variables.iter())
                .map(|v| v.as_str().to_string())
                .collect();
            let by_name = |vars: &[Variable]| -> std::collections::HashMap<String, Variable> {
                vars.iter().map(|v| (v.as_str().to_string(), v.clone())).collect()
            };
            let lmap = by_name(&l.variables);
            let rmap = by_name(&r.variables);
            let mut lcols = Vec::new();
            let mut rcols = Vec::new();
            let mut out_vars = Vec::new();
            for name in &all_vars {
                if let Some(v) = lmap.get(name) {
                    lcols.push(format!("l.{} AS {}", var_col(v), var_col(v)));
                    out_vars.push(v.clone());
                } else if let Some(v) = rmap.get(name) {
                    lcols.push(format!("NULL AS {}", var_col(v)));
                } else {
                    unreachable!()
                }
                let v = rmap.get(name).or_else(|| lmap.get(name)).unwrap();
                if rmap.contains_key(name) {
                    rcols.push(format!("r.{} AS {}", var_col(v), var_col(v)));
                } else {
                    rcols.push(format!("NULL AS {}", var_col(v)));
                }
            }
            let sql = format!(
                "(SELECT {} FROM {} l UNION ALL SELECT {} FROM {} r)",
                lcols.join(", "),
                l.sql,
                rcols.join(", "),
                r.sql
            );
            let kinds = merge_kinds(&l.kinds, &r.kinds);
            Ok(SubSelect { sql, variables: out_vars, kinds })
        }

        Graph { name: _, inner } => {
            // Desktop metadata lives in one implicit graph; GRAPH is accepted
            // as a structural no-op over `inner` (see DESIGN.md Open
            // Question decision). `SERVICE` (networked graphs) stays out of
            // scope entirely.
            translate_graph_pattern(registry, inner)
        }

        Extend {
            inner,
            variable,
            expression,
        } => {
            let s = translate_graph_pattern(registry, inner)?;
            let mut ectx = QueryContext::new();
            bind_from_subselect(&mut ectx, "s", &s);
            let expr_sql = translate_expression(&mut ectx, registry, expression)?;
            let mut variables = s.variables.clone();
            variables.push(variable.clone());
            let mut kinds = s.kinds.clone();
            // `BIND(?x AS ?y)` re-projects an existing binding verbatim, so
            // `?y` should wrap the same way `?x` would; anything computed
            // (arithmetic, string functions, …) is already caller-ready.
            let bound_kind = match expression {
                spargebra::algebra::Expression::Variable(v) => s.kind_of(v),
                _ => ValueKind::Other,
            };
            kinds.insert(variable.clone(), bound_kind);
            Ok(SubSelect {
                sql: format!(
                    "(SELECT s.*, {expr_sql} AS {} FROM {} s)",
                    var_col(variable),
                    s.sql
                ),
                variables,
                kinds,
            })
        }

        Minus { left, right } => {
            let l = translate_graph_pattern(registry, left)?;
            let r = translate_graph_pattern(registry, right)?;
            let shared: Vec<Variable> = l
                .variables
                .iter()
                .filter(|v| r.variables.contains(v))
                .cloned()
                .collect();
            if shared.is_empty() {
                // disjoint domains: MINUS never removes anything
                return Ok(l);
            }
            let correlation = shared
                .iter()
                .map(|v| format!("r.{} = l.{}", var_col(v), var_col(v)))
                .collect::<Vec<_>>()
                .join(" AND ");
            Ok(SubSelect {
                sql: format!(
                    "(SELECT l.* FROM {} l WHERE NOT EXISTS (SELECT 1 FROM {} r WHERE {correlation}))",
                    l.sql, r.sql
                ),
                kinds: l.kinds.clone(),
                variables: l.variables,
            })
        }

        Values { .. } => Err(TranslateError::Unsupported("VALUES".into())),

        OrderBy { inner, expression } => {
            let s = translate_graph_pattern(registry, inner)?;
            let mut ectx = QueryContext::new();
            bind_from_subselect(&mut ectx, "s", &s);
            let mut parts = Vec::with_capacity(expression.len());
            for oe in expression {
                use spargebra::algebra::OrderExpression;
                match oe {
                    OrderExpression::Asc(e) => {
                        parts.push(format!("{} ASC", translate_expression(&mut ectx, registry, e)?))
                    }
                    OrderExpression::Desc(e) => {
                        parts.push(format!("{} DESC", translate_expression(&mut ectx, registry, e)?))
                    }
                }
            }
            Ok(SubSelect {
                sql: format!(
                    "(SELECT s.* FROM {} s ORDER BY {})",
                    s.sql,
                    parts.join(", ")
                ),
                kinds: s.kinds.clone(),
                variables: s.variables,
            })
        }

        Project { inner, variables } => {
            let s = translate_graph_pattern(registry, inner)?;
            let cols = variables
                .iter()
                .map(|v| format!("s.{} AS {}", var_col(v), var_col(v)))
                .collect::<Vec<_>>()
                .join(", ");
            Ok(SubSelect {
                sql: format!("(SELECT {cols} FROM {} s)", s.sql),
                variables: variables.clone(),
                kinds: s.kinds.clone(),
            })
        }

        Distinct { inner } => {
            let s = translate_graph_pattern(registry, inner)?;
            Ok(SubSelect {
                sql: format!("(SELECT DISTINCT s.* FROM {} s)", s.sql),
                kinds: s.kinds.clone(),
                variables: s.variables,
            })
        }

        Reduced { inner } => translate_graph_pattern(registry, inner),

        Slice {
            inner,
            start,
            length,
        } => {
            let s = translate_graph_pattern(registry, inner)?;
            let limit = length.map(|n| n as i64).unwrap_or(-1);
            Ok(SubSelect {
                sql: format!(
                    "(SELECT s.* FROM {} s LIMIT {limit} OFFSET {start})",
                    s.sql
                ),
                kinds: s.kinds.clone(),
                variables: s.variables,
            })
        }

        Group {
            inner,
            variables,
            aggregates,
        } => {
            let s = translate_graph_pattern(registry, inner)?;
            let mut ectx = QueryContext::new();
            bind_from_subselect(&mut ectx, "s", &s);

            let group_cols = variables
                .iter()
                .map(|v| format!("s.{} AS {}", var_col(v), var_col(v)))
                .collect::<Vec<_>>();
            let mut select_cols = group_cols.clone();
            let mut out_vars = variables.clone();
            // Group keys keep their source type; aggregate results
            // (COUNT/SUM/AVG/…) are always plain numeric/text output.
            let mut kinds: HashMap<Variable, ValueKind> = variables
                .iter()
                .map(|v| (v.clone(), s.kind_of(v)))
                .collect();

            for (out_var, agg) in aggregates {
                let agg_sql = translate_aggregate(&mut ectx, registry, agg)?;
                select_cols.push(format!("{agg_sql} AS {}", var_col(out_var)));
                out_vars.push(out_var.clone());
                kinds.insert(out_var.clone(), ValueKind::Other);
            }

            let group_by = if variables.is_empty() {
                String::new()
            } else {
                format!(
                    " GROUP BY {}",
                    variables
                        .iter()
                        .map(|v| format!("s.{}", var_col(v)))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            };
            Ok(SubSelect {
                sql: format!(
                    "(SELECT {} FROM {} s{group_by})",
                    select_cols.join(", "),
                    s.sql
                ),
                variables: out_vars,
                kinds,
            })
        }

        Service { .. } => Err(TranslateError::Unsupported(
            "SERVICE (federated SPARQL) is not supported".into(),
        )),
    }
}

fn translate_aggregate(
    ctx: &mut QueryContext,
    registry: &Registry,
    agg: &AggregateExpression,
) -> Result<String, TranslateError> {
    use AggregateExpression::*;
    match agg {
        CountSolutions { distinct } => Ok(if *distinct {
            "COUNT(DISTINCT *)".to_string()
        } else {
            "COUNT(*)".to_string()
        }),
        FunctionCall { name, expr, distinct } => {
            let inner = translate_expression(ctx, registry, expr)?;
            let distinct_kw = if *distinct { "DISTINCT " } else { "" };
            use spargebra::algebra::AggregateFunction::*;
            Ok(match name {
                Count => format!("COUNT({distinct_kw}{inner})"),
                Sum => format!("SUM({distinct_kw}{inner})"),
                Avg => format!("AVG({distinct_kw}{inner})"),
                Min => format!("MIN({inner})"),
                Max => format!("MAX({inner})"),
                Sample => format!("MIN({inner})"),
                GroupConcat { separator } => {
                    let sep = separator.clone().unwrap_or_else(|| " ".to_string());
                    format!("GROUP_CONCAT({distinct_kw}{inner}, {})", sql_quote(&sep))
                }
                Custom(name) => {
                    return Err(TranslateError::Unsupported(format!(
                        "custom aggregate {}",
                        name.as_str()
                    )))
                }
            })
        }
    }
}

/// Build the outer `JOIN`/`LEFT JOIN` text for two already-translated
/// sub-selects, matching on every variable name they share and unioning
/// the rest of their columns (`COALESCE`d for a `LEFT JOIN`'s optional
/// side, so an unmatched right-hand row still reports its left-hand
/// bindings and `NULL` on the right).
fn combine_join(
    l: &SubSelect,
    r: &SubSelect,
    join_kw: &str,
    extra_on: Option<String>,
) -> Result<SubSelect, TranslateError> {
    let shared: Vec<&Variable> = l
        .variables
        .iter()
        .filter(|v| r.variables.contains(v))
        .collect();

    let on_clause = if shared.is_empty() {
        "1 = 1".to_string()
    } else {
        shared
            .iter()
            .map(|v| format!("l.{} = r.{}", var_col(v), var_col(v)))
            .collect::<Vec<_>>()
            .join(" AND ")
    };
    let on_clause = match extra_on {
        Some(extra) => format!("{on_clause} AND {extra}"),
        None => on_clause,
    };

    let mut cols = Vec::new();
    for v in &l.variables {
        cols.push(format!("l.{} AS {}", var_col(v), var_col(v)));
    }
    for v in &r.variables {
        if shared.contains(&v) {
            continue;
        }
        cols.push(format!("r.{} AS {}", var_col(v), var_col(v)));
    }
    let mut out_vars = l.variables.clone();
    for v in &r.variables {
        if !out_vars.contains(v) {
            out_vars.push(v.clone());
        }
    }

    let kinds = merge_kinds(&l.kinds, &r.kinds);
    Ok(SubSelect {
        sql: format!(
            "(SELECT {} FROM {} l {join_kw} {} r ON {on_clause})",
            cols.join(", "),
            l.sql,
            r.sql
        ),
        variables: out_vars,
        kinds,
    })
}

/// Build the body of an `EXISTS (...)` sub-select for `Filter`'s
/// `Exists` expression, correlating on whatever variables the outer
/// context already has bound.
pub fn translate_pattern_to_exists(
    outer: &mut QueryContext,
    registry: &Registry,
    pattern: &GraphPattern,
) -> Result<String, TranslateError> {
    let s = translate_graph_pattern(registry, pattern)?;
    let correlations: Vec<String> = s
        .variables
        .iter()
        .filter_map(|v| outer.lookup(v).map(|outer_expr| (v, outer_expr.to_string())))
        .map(|(v, outer_expr)| format!("__e.{} = {outer_expr}", var_col(v)))
        .collect();
    let where_clause = if correlations.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", correlations.join(" AND "))
    };
    Ok(format!("SELECT 1 FROM {} __e{where_clause}", s.sql))
}
