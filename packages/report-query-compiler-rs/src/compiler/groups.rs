#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnScope {
    /// Outer query: columns are alias-qualified and aggregation aliases resolve.
    Query,
    /// Inside the derived source of one occurrence: bare column names.
    Source(usize),
}

#[derive(Debug, Default, PartialEq)]
struct FilterClauses {
    where_sql: Option<String>,
    having_sql: Option<String>,
}

impl FilterClauses {
    fn routed(sql: String, having: bool) -> Self {
        if having {
            Self {
                where_sql: None,
                having_sql: Some(sql),
            }
        } else {
            Self {
                where_sql: Some(sql),
                having_sql: None,
            }
        }
    }
}

enum FilterTarget<'s> {
    Aggregate(&'s AggregateOutput),
    Column(String),
    Unresolved,
}

#[derive(Debug, Default, Clone, Copy)]
struct LeafMix {
    aggregate: bool,
    other: bool,
}

fn join_fragments(parts: &[String], logic: Logic) -> Option<String> {
    if parts.is_empty() {
        return None;
    }
    let separator = format!(" {} ", logic.keyword());
    Some(
        parts
            .iter()
            .map(|part| format!("({part})"))
            .collect::<Vec<_>>()
            .join(&separator),
    )
}

impl QueryCompiler<'_> {
    fn filter_target<'s>(
        &self,
        scope: &'s QueryScope<'_>,
        column: &str,
        column_scope: ColumnScope,
    ) -> FilterTarget<'s> {
        if column.trim().is_empty() {
            return FilterTarget::Unresolved;
        }
        if column_scope == ColumnScope::Query {
            if let Some(output) = scope.aggregates.get(column) {
                return FilterTarget::Aggregate(output);
            }
        }

        let Some((index, name)) = scope.sources.resolve_column(column) else {
            return FilterTarget::Unresolved;
        };
        let occurrence = &scope.sources.occurrences[index];
        let physical = self.names.physical_column(&occurrence.dataset, name);
        match column_scope {
            ColumnScope::Query => {
                FilterTarget::Column(qualified_column(&occurrence.alias, &physical))
            }
            ColumnScope::Source(_) => FilterTarget::Column(quote_part(&physical)),
        }
    }

    fn leaf_mix(&self, scope: &QueryScope<'_>, group: &LogicalGroup) -> LeafMix {
        let mut mix = LeafMix::default();
        for child in &group.conditions {
            match child {
                FilterNode::Condition(condition) => {
                    if scope.aggregates.get(&condition.column).is_some() {
                        mix.aggregate = true;
                    } else {
                        mix.other = true;
                    }
                }
                FilterNode::Group(nested) => {
                    let nested = self.leaf_mix(scope, nested);
                    mix.aggregate |= nested.aggregate;
                    mix.other |= nested.other;
                }
            }
        }
        mix
    }

    /// Compiles a filter tree into WHERE and HAVING fragments.
    ///
    /// An OR group mixing aggregation aliases with raw columns cannot be split
    /// across the two clauses, so it moves to HAVING as a whole and its raw
    /// columns are read through `MAX(..)`.
    ///
    /// Only an empty root group yields `1=1`; empty nested groups are skipped.
    fn compile_group(
        &self,
        scope: &QueryScope<'_>,
        group: &LogicalGroup,
        column_scope: ColumnScope,
        params: &mut ParamGenerator,
        promoted: bool,
    ) -> CompilerResult<FilterClauses> {
        if group.is_empty() {
            return Ok(FilterClauses::routed("1=1".to_string(), promoted));
        }

        let promoted = promoted
            || (column_scope == ColumnScope::Query && group.logic == Logic::Or && {
                let mix = self.leaf_mix(scope, group);
                mix.aggregate && mix.other
            });

        let mut where_parts = Vec::new();
        let mut having_parts = Vec::new();
        for child in &group.conditions {
            let clauses = match child {
                FilterNode::Condition(condition) => {
                    self.compile_leaf(scope, condition, column_scope, params, promoted)?
                }
                FilterNode::Group(nested) => {
                    self.compile_nested(scope, nested, column_scope, params, promoted)?
                }
            };
            where_parts.extend(clauses.where_sql);
            having_parts.extend(clauses.having_sql);
        }

        Ok(FilterClauses {
            where_sql: join_fragments(&where_parts, group.logic),
            having_sql: join_fragments(&having_parts, group.logic),
        })
    }

    fn compile_nested(
        &self,
        scope: &QueryScope<'_>,
        group: &LogicalGroup,
        column_scope: ColumnScope,
        params: &mut ParamGenerator,
        promoted: bool,
    ) -> CompilerResult<FilterClauses> {
        if group.is_empty() {
            return Ok(FilterClauses::default());
        }
        self.compile_group(scope, group, column_scope, params, promoted)
    }

    fn compile_leaf(
        &self,
        scope: &QueryScope<'_>,
        condition: &FilterCondition,
        column_scope: ColumnScope,
        params: &mut ParamGenerator,
        promoted: bool,
    ) -> CompilerResult<FilterClauses> {
        let kind = self.value_kind(scope.request, condition);
        match self.filter_target(scope, &condition.column, column_scope) {
            FilterTarget::Aggregate(output) => {
                let sql = self.compile_predicate(&output.expression, kind, condition, params)?;
                Ok(FilterClauses::routed(sql, true))
            }
            FilterTarget::Column(column) => {
                let column = if promoted {
                    format!("MAX({column})")
                } else {
                    column
                };
                let sql = self.compile_predicate(&column, kind, condition, params)?;
                Ok(FilterClauses::routed(sql, promoted))
            }
            FilterTarget::Unresolved => {
                debug!(
                    column = %condition.column,
                    "unresolvable filter column, using neutral predicate"
                );
                Ok(FilterClauses::routed("1=1".to_string(), promoted))
            }
        }
    }
}
