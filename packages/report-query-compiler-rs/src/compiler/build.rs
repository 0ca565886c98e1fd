const COUNT_LABEL: &str = "total_rows";

impl QueryCompiler<'_> {
    pub fn compile(&self, request: &QueryRequest) -> CompilerResult<CompiledQuery> {
        request.validate(true)?;

        let mut params = ParamGenerator::new();
        let statement = self.build_statement(request, &mut params, true)?;
        Ok(self.finish(statement.render(), params))
    }

    /// Counts rows (or groups) of the same logical query, without ordering
    /// or paging.
    pub fn compile_count(&self, request: &QueryRequest) -> CompilerResult<CompiledQuery> {
        request.validate(false)?;

        let mut params = ParamGenerator::new();
        let mut statement = self.build_statement(request, &mut params, false)?;
        let sql = if request.is_grouped() {
            format!(
                "SELECT COUNT(*) AS {} FROM (\n{}\n) sub",
                quote_label(COUNT_LABEL),
                statement.render()
            )
        } else {
            statement.projection = vec![SelectItem::new("COUNT(*)", quote_label(COUNT_LABEL))];
            statement.render()
        };
        Ok(self.finish(sql, params))
    }

    fn finish(&self, sql: String, params: ParamGenerator) -> CompiledQuery {
        debug!(sql = %sql, params = params.len(), "compiled report query");
        CompiledQuery {
            sql,
            params: params.into_params(),
        }
    }

    fn build_statement(
        &self,
        request: &QueryRequest,
        params: &mut ParamGenerator,
        paged: bool,
    ) -> CompilerResult<SelectStatement> {
        let sources = SourcePlan::plan(request)?;
        let aggregates = self.plan_aggregations(request, &sources)?;
        let mut scope = QueryScope {
            request,
            sources,
            aggregates,
        };

        let pushdown = self.plan_pushdown(&scope);
        scope.sources.reorder_joins(&pushdown.weights());

        // Placeholders are numbered in the order they appear in the SQL text.
        let from = self.render_source(&scope, 0, pushdown.pushed_for(0), params)?;
        let joins = scope
            .sources
            .joins
            .iter()
            .map(|join| self.join_clause(&scope, join, pushdown.pushed_for(join.right), params))
            .collect::<CompilerResult<Vec<_>>>()?;

        let filters = if pushdown.remaining.is_empty() {
            FilterClauses::default()
        } else {
            self.compile_group(&scope, &pushdown.remaining, ColumnScope::Query, params, false)?
        };

        let mut statement = SelectStatement {
            hint: request
                .use_high_perf_hints
                .then(|| self.options.high_performance_hint.clone()),
            from,
            joins,
            where_clause: filters.where_sql,
            having: filters.having_sql,
            ..SelectStatement::default()
        };

        if request.is_grouped() {
            for column in request.group_by() {
                let expression = self.projected_column(&scope.sources, column)?;
                statement
                    .projection
                    .push(SelectItem::new(expression.clone(), quote_label(column)));
                statement.group_by.push(expression);
            }
            for output in &scope.aggregates.outputs {
                statement.projection.push(SelectItem::new(
                    output.expression.clone(),
                    quote_part(&output.alias),
                ));
            }
        } else {
            for column in request.columns() {
                let expression = self.projected_column(&scope.sources, column)?;
                let label = if column.contains('.') {
                    column.clone()
                } else {
                    format!("{}.{column}", request.dataset)
                };
                statement
                    .projection
                    .push(SelectItem::new(expression, quote_label(&label)));
            }
        }

        if paged {
            statement.order_by = self.order_by(&scope)?;
            statement.paging = Some(Paging {
                offset: request.offset,
                limit: request.limit,
            });
        }

        Ok(statement)
    }

    fn order_by(&self, scope: &QueryScope<'_>) -> CompilerResult<Vec<(String, SortDirection)>> {
        let request = scope.request;
        let grouped = request.is_grouped();
        let mut order = Vec::new();

        for sort in request.sorting() {
            if let Some(output) = scope.aggregates.get(&sort.column) {
                order.push((quote_part(&output.alias), sort.direction));
                continue;
            }

            if grouped
                && !request
                    .group_by()
                    .iter()
                    .any(|column| column.eq_ignore_ascii_case(sort.column.trim()))
            {
                debug!(column = %sort.column, "sort column is not grouped, skipping");
                continue;
            }

            match scope.sources.resolve_column(&sort.column) {
                Some(_) => {
                    let expression = self.projected_column(&scope.sources, &sort.column)?;
                    order.push((expression, sort.direction));
                }
                None => debug!(column = %sort.column, "unresolvable sort column, skipping"),
            }
        }

        Ok(order)
    }
}
