#[derive(Debug, Clone, PartialEq)]
struct SourceOccurrence {
    dataset: String,
    alias: String,
    /// Rows of this occurrence may be null-extended by an outer join.
    null_supplying: bool,
}

#[derive(Debug, Clone)]
struct PlannedJoin<'r> {
    spec: &'r JoinSpec,
    left: usize,
    right: usize,
}

/// Every dataset occurrence of a request with its alias, plus the joins
/// between them. Occurrence `0` is the base dataset.
#[derive(Debug)]
struct SourcePlan<'r> {
    occurrences: Vec<SourceOccurrence>,
    joins: Vec<PlannedJoin<'r>>,
}

impl<'r> SourcePlan<'r> {
    fn plan(request: &'r QueryRequest) -> CompilerResult<Self> {
        let mut used = HashSet::new();
        let mut plan = SourcePlan {
            occurrences: vec![SourceOccurrence {
                alias: unique_alias(&request.dataset, &mut used),
                dataset: request.dataset.clone(),
                null_supplying: false,
            }],
            joins: Vec::new(),
        };

        for spec in request.joins() {
            let left = plan.resolve_qualifier(&spec.left_dataset).ok_or_else(|| {
                generation_error(
                    format!(
                        "join references '{}' before it is part of the query",
                        spec.left_dataset
                    ),
                    spec,
                )
            })?;

            match spec.join_type {
                JoinType::Right | JoinType::Outer => {
                    for occurrence in &mut plan.occurrences {
                        occurrence.null_supplying = true;
                    }
                }
                JoinType::Inner | JoinType::Left => {}
            }

            let right = plan.occurrences.len();
            plan.occurrences.push(SourceOccurrence {
                alias: unique_alias(&spec.right_dataset, &mut used),
                dataset: spec.right_dataset.clone(),
                null_supplying: matches!(spec.join_type, JoinType::Left | JoinType::Outer),
            });
            plan.joins.push(PlannedJoin { spec, left, right });
        }

        Ok(plan)
    }

    /// Alias first, then the first occurrence of a dataset name, then a
    /// schema-stripped dataset name.
    fn resolve_qualifier(&self, qualifier: &str) -> Option<usize> {
        let qualifier = qualifier.trim();
        let tail = last_segment(qualifier);

        self.occurrences
            .iter()
            .position(|occurrence| occurrence.alias.eq_ignore_ascii_case(qualifier))
            .or_else(|| {
                self.occurrences
                    .iter()
                    .position(|occurrence| occurrence.dataset.eq_ignore_ascii_case(qualifier))
            })
            .or_else(|| {
                self.occurrences
                    .iter()
                    .position(|occurrence| {
                        last_segment(&occurrence.dataset).eq_ignore_ascii_case(tail)
                    })
            })
    }

    /// Splits `qualifier.column`; unqualified columns belong to the base dataset.
    fn resolve_column<'c>(&self, column: &'c str) -> Option<(usize, &'c str)> {
        match column.trim().rsplit_once('.') {
            Some((qualifier, name)) => self.resolve_qualifier(qualifier).map(|index| (index, name)),
            None => Some((0, column.trim())),
        }
    }

    fn reorderable(&self) -> bool {
        self.joins
            .iter()
            .all(|join| matches!(join.spec.join_type, JoinType::Inner | JoinType::Left))
    }

    /// Base-anchored joins go first, heaviest pushed filtering first; chained
    /// joins keep their relative order after them.
    fn reorder_joins(&mut self, weights: &[usize]) {
        if !self.reorderable() {
            return;
        }

        let (mut anchored, chained): (Vec<_>, Vec<_>) =
            self.joins.drain(..).partition(|join| join.left == 0);
        anchored.sort_by_key(|join| Reverse(weights.get(join.right).copied().unwrap_or(0)));
        self.joins = anchored.into_iter().chain(chained).collect();
    }
}

fn unique_alias(dataset: &str, used: &mut HashSet<String>) -> String {
    let base = name_token(dataset.trim());
    if used.insert(base.to_uppercase()) {
        return base;
    }

    let mut suffix = 1;
    loop {
        let candidate = format!("{base}_{suffix}");
        if used.insert(candidate.to_uppercase()) {
            return candidate;
        }
        suffix += 1;
    }
}

struct QueryScope<'r> {
    request: &'r QueryRequest,
    sources: SourcePlan<'r>,
    aggregates: AggregateIndex,
}

impl QueryCompiler<'_> {
    fn render_source(
        &self,
        scope: &QueryScope<'_>,
        index: usize,
        pushed: Option<&LogicalGroup>,
        params: &mut ParamGenerator,
    ) -> CompilerResult<String> {
        let occurrence = &scope.sources.occurrences[index];
        let table = quote_identifier(&self.names.physical_table(&occurrence.dataset));
        let alias = quote_part(&occurrence.alias);

        let mut predicates = self.partition_predicates(scope.request, &occurrence.dataset, params);
        if let Some(group) = pushed {
            let clauses =
                self.compile_group(scope, group, ColumnScope::Source(index), params, false)?;
            if let Some(sql) = clauses.where_sql {
                let bare_or = group.logic == Logic::Or && group.conditions.len() > 1;
                if bare_or && !predicates.is_empty() {
                    predicates.push(format!("({sql})"));
                } else {
                    predicates.push(sql);
                }
            }
        }

        if predicates.is_empty() {
            Ok(format!("{table} {alias}"))
        } else {
            Ok(format!(
                "(SELECT * FROM {table} WHERE {}) {alias}",
                predicates.join(" AND ")
            ))
        }
    }

    fn join_clause(
        &self,
        scope: &QueryScope<'_>,
        join: &PlannedJoin<'_>,
        pushed: Option<&LogicalGroup>,
        params: &mut ParamGenerator,
    ) -> CompilerResult<JoinClause> {
        let source = self.render_source(scope, join.right, pushed, params)?;
        let left = &scope.sources.occurrences[join.left];
        let right = &scope.sources.occurrences[join.right];

        let on = join
            .spec
            .on
            .iter()
            .map(|pair| {
                let left_column = self
                    .names
                    .physical_column(&left.dataset, last_segment(pair.left_column.trim()));
                let right_column = self
                    .names
                    .physical_column(&right.dataset, last_segment(pair.right_column.trim()));
                (
                    qualified_column(&left.alias, &left_column),
                    qualified_column(&right.alias, &right_column),
                )
            })
            .collect();

        Ok(JoinClause {
            join_type: join.spec.join_type,
            source,
            on,
        })
    }
}
