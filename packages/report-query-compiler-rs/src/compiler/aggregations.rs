#[derive(Debug, Clone, PartialEq)]
struct AggregateOutput {
    alias: String,
    expression: String,
}

/// Aggregation outputs keyed by both the requested name and the final alias.
#[derive(Debug, Default)]
struct AggregateIndex {
    outputs: Vec<AggregateOutput>,
    by_name: HashMap<String, usize>,
}

impl AggregateIndex {
    fn get(&self, name: &str) -> Option<&AggregateOutput> {
        self.by_name
            .get(&name.trim().to_uppercase())
            .and_then(|index| self.outputs.get(*index))
    }
}

impl QueryCompiler<'_> {
    /// Alias-qualified physical reference for a projected column.
    fn projected_column(&self, sources: &SourcePlan<'_>, column: &str) -> CompilerResult<String> {
        let (index, name) = sources.resolve_column(column).ok_or_else(|| {
            generation_error(format!("column '{column}' names an unknown dataset"), column)
        })?;
        let occurrence = &sources.occurrences[index];
        let physical = self.names.physical_column(&occurrence.dataset, name);
        Ok(qualified_column(&occurrence.alias, &physical))
    }

    fn plan_aggregations(
        &self,
        request: &QueryRequest,
        sources: &SourcePlan<'_>,
    ) -> CompilerResult<AggregateIndex> {
        let mut index = AggregateIndex::default();
        let mut used = HashSet::new();

        for spec in request.aggregations() {
            let column = self.projected_column(sources, &spec.source_column)?;
            let expression = match spec.function {
                AggregationFunction::DistinctCount => format!("COUNT(DISTINCT {column})"),
                function => format!("{}({column})", function.name()),
            };

            let requested = spec.requested_name();
            let alias = self.output_alias(&requested, &mut used);
            let position = index.outputs.len();
            index.by_name.entry(requested.to_uppercase()).or_insert(position);
            index.by_name.entry(alias.to_uppercase()).or_insert(position);
            index.outputs.push(AggregateOutput { alias, expression });
        }

        Ok(index)
    }

    fn output_alias(&self, requested: &str, used: &mut HashSet<String>) -> String {
        let max_len = self.options.max_alias_length;
        let base = sanitize_alias(requested, max_len, &self.options.fallback_alias);
        if used.insert(base.to_uppercase()) {
            return base;
        }

        let mut suffix = 1;
        loop {
            let tail = format!("_{suffix}");
            let head: String = base.chars().take(max_len.saturating_sub(tail.len())).collect();
            let candidate = format!("{head}{tail}");
            if used.insert(candidate.to_uppercase()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}
