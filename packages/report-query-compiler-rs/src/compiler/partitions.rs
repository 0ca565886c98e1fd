fn partition_values<'r>(request: &'r QueryRequest, dataset: &str) -> Option<&'r [ScalarValue]> {
    let filters = request.partition_filters.as_ref()?;
    filters
        .get(dataset)
        .or_else(|| {
            filters
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(dataset))
                .map(|(_, values)| values)
        })
        .map(Vec::as_slice)
        .filter(|values| !values.is_empty())
}

impl QueryCompiler<'_> {
    /// Load restriction for one dataset, compiled against bare column names.
    fn partition_predicates(
        &self,
        request: &QueryRequest,
        dataset: &str,
        params: &mut ParamGenerator,
    ) -> Vec<String> {
        let Some(values) = partition_values(request, dataset) else {
            return Vec::new();
        };
        let Some(spec) = self.partitions.partition_config(dataset) else {
            warn!(dataset, "partition filter given for a dataset without partition config");
            return Vec::new();
        };

        let load_column = self.names.physical_column(dataset, &spec.load_id_column);
        let kind = find_column_metadata(request, &format!("{dataset}.{}", spec.load_id_column))
            .or_else(|| find_column_metadata(request, &spec.load_id_column))
            .and_then(ColumnMetadata::type_name)
            .and_then(|type_name| ValueKind::from_type_name(&type_name));
        let prefix = format!("part_{}", name_token(dataset));

        let mut placeholders = values
            .iter()
            .map(|value| {
                let bound = match kind {
                    Some(ValueKind::Date | ValueKind::Timestamp) => coerce_date(value),
                    Some(ValueKind::Number) => coerce_number(value),
                    _ => BindValue::from(value),
                };
                params.bind(&prefix, bound)
            })
            .collect::<Vec<_>>();

        let column = quote_part(&load_column);
        let mut predicates = vec![if placeholders.len() == 1 {
            format!("{column} = {}", placeholders.remove(0))
        } else {
            format!("{column} IN ({})", placeholders.join(", "))
        }];

        let load_type = request
            .partition_load_type
            .as_deref()
            .map(str::trim)
            .filter(|load_type| !load_type.is_empty());
        if let (Some(load_type), Some(type_column)) =
            (load_type, spec.load_type_column.as_deref())
        {
            if spec.supports_load_type(load_type) {
                let type_column = self.names.physical_column(dataset, type_column);
                let placeholder = params.bind(
                    &format!("lt_{}", name_token(dataset)),
                    load_type.to_uppercase(),
                );
                predicates.push(format!("UPPER({}) = {placeholder}", quote_part(&type_column)));
            } else {
                debug!(dataset, load_type, "load type not supported by dataset, skipping");
            }
        }

        predicates
    }
}
