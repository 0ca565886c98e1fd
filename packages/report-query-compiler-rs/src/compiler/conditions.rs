#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Number,
    Date,
    Timestamp,
}

impl ValueKind {
    fn is_temporal(self) -> bool {
        matches!(self, ValueKind::Date | ValueKind::Timestamp)
    }

    fn from_type_name(type_name: &str) -> Option<Self> {
        const NUMERIC: [&str; 6] = ["numeric", "number", "float", "integer", "int", "decimal"];

        if type_name.contains("stamp") || type_name.contains("time") {
            Some(ValueKind::Timestamp)
        } else if type_name.contains("date") {
            Some(ValueKind::Date)
        } else if NUMERIC.iter().any(|name| type_name.contains(name)) {
            Some(ValueKind::Number)
        } else {
            None
        }
    }
}

fn find_column_metadata<'r>(request: &'r QueryRequest, column: &str) -> Option<&'r ColumnMetadata> {
    let metadata = request.column_metadata.as_ref()?;
    if let Some(found) = metadata.get(column) {
        return Some(found);
    }

    let upper = column.to_uppercase();
    let tail = last_segment(&upper).to_string();
    metadata
        .iter()
        .find(|(key, _)| key.to_uppercase() == upper)
        .or_else(|| {
            metadata
                .iter()
                .find(|(key, _)| last_segment(&key.to_uppercase()) == tail)
        })
        .map(|(_, found)| found)
}

fn comparison_symbol(operator: Operator) -> Option<&'static str> {
    match operator {
        Operator::Eq => Some("="),
        Operator::Neq => Some("!="),
        Operator::Gt => Some(">"),
        Operator::Gte => Some(">="),
        Operator::Lt => Some("<"),
        Operator::Lte => Some("<="),
        _ => None,
    }
}

impl QueryCompiler<'_> {
    /// Declared number/date/timestamp win; a declared string may be refined
    /// by the request's column metadata.
    fn value_kind(&self, request: &QueryRequest, condition: &FilterCondition) -> ValueKind {
        match condition.datatype {
            Datatype::Number => ValueKind::Number,
            Datatype::Date => ValueKind::Date,
            Datatype::Timestamp => ValueKind::Timestamp,
            Datatype::String => find_column_metadata(request, &condition.column)
                .and_then(ColumnMetadata::type_name)
                .and_then(|type_name| ValueKind::from_type_name(&type_name))
                .unwrap_or(ValueKind::Text),
        }
    }

    fn bind_typed(
        &self,
        kind: ValueKind,
        value: &ScalarValue,
        params: &mut ParamGenerator,
    ) -> String {
        let bound = match kind {
            ValueKind::Date | ValueKind::Timestamp => coerce_date(value),
            ValueKind::Number => coerce_number(value),
            ValueKind::Text => BindValue::from(value),
        };
        params.bind("p", bound)
    }

    fn text_column(&self, column: &str) -> String {
        format!("CAST({column} AS {})", self.options.text_cast_type)
    }

    fn truncated(&self, column: &str) -> String {
        format!("{}({column})", self.options.date_trunc_function)
    }

    /// Compiles one leaf against an already rendered column expression.
    fn compile_predicate(
        &self,
        column: &str,
        kind: ValueKind,
        condition: &FilterCondition,
        params: &mut ParamGenerator,
    ) -> CompilerResult<String> {
        let text = kind == ValueKind::Text;
        match condition.operator {
            Operator::IsNull => return Ok(format!("{column} IS NULL")),
            Operator::IsNotNull => return Ok(format!("{column} IS NOT NULL")),
            Operator::IsEmpty if text => return Ok(format!("({column} IS NULL OR {column} = '')")),
            Operator::IsEmpty => return Ok(format!("{column} IS NULL")),
            Operator::IsNotEmpty if text => {
                return Ok(format!("({column} IS NOT NULL AND {column} != '')"))
            }
            Operator::IsNotEmpty => return Ok(format!("{column} IS NOT NULL")),
            _ => {}
        }

        match (condition.operator, &condition.value) {
            (_, FilterValue::Absent) => {
                debug!(
                    column = %condition.column,
                    operator = %condition.operator,
                    "filter value missing, using neutral predicate"
                );
                Ok("1=1".to_string())
            }
            (
                Operator::Contains
                | Operator::NotContains
                | Operator::StartsWith
                | Operator::EndsWith,
                FilterValue::Scalar(value),
            ) => Ok(self.wildcard(column, kind, condition.operator, value, params)),
            (Operator::Eq | Operator::Neq, FilterValue::Scalar(value)) if text => {
                let symbol = if condition.operator == Operator::Eq { "=" } else { "!=" };
                let placeholder = params.bind("p", value.to_text().to_uppercase());
                Ok(format!(
                    "UPPER({}) {symbol} UPPER({placeholder})",
                    self.text_column(column)
                ))
            }
            (Operator::In | Operator::NotIn, FilterValue::List(items)) => {
                Ok(self.in_list(column, kind, condition, items, params))
            }
            (Operator::Between, FilterValue::Range(start, end)) => {
                let column = if kind.is_temporal() {
                    self.truncated(column)
                } else {
                    column.to_string()
                };
                Ok(match (start, end) {
                    (Some(start), Some(end)) => {
                        let start = self.bind_typed(kind, start, params);
                        let end = self.bind_typed(kind, end, params);
                        format!("{column} BETWEEN {start} AND {end}")
                    }
                    (Some(start), None) => {
                        format!("{column} >= {}", self.bind_typed(kind, start, params))
                    }
                    (None, Some(end)) => {
                        format!("{column} <= {}", self.bind_typed(kind, end, params))
                    }
                    (None, None) => "1=1".to_string(),
                })
            }
            (operator, FilterValue::Scalar(value)) => match comparison_symbol(operator) {
                Some(symbol) if kind.is_temporal() => {
                    let placeholder = self.bind_typed(kind, value, params);
                    Ok(format!("{} {symbol} {placeholder}", self.truncated(column)))
                }
                Some(symbol) => {
                    let placeholder = self.bind_typed(kind, value, params);
                    Ok(format!("{column} {symbol} {placeholder}"))
                }
                None => Err(generation_error(
                    format!("unsupported operator '{operator}'"),
                    condition,
                )),
            },
            (operator, _) => Err(generation_error(
                format!("value shape does not fit operator '{operator}'"),
                condition,
            )),
        }
    }

    fn wildcard(
        &self,
        column: &str,
        kind: ValueKind,
        operator: Operator,
        value: &ScalarValue,
        params: &mut ParamGenerator,
    ) -> String {
        let needle = pattern_text(value, kind == ValueKind::Number).to_uppercase();
        let pattern = match operator {
            Operator::StartsWith => format!("{needle}%"),
            Operator::EndsWith => format!("%{needle}"),
            _ => format!("%{needle}%"),
        };
        let placeholder = params.bind("p", pattern);

        let rendered = match kind {
            ValueKind::Text => self.text_column(column),
            ValueKind::Number => {
                format!("TO_CHAR({column}, 'TM', 'NLS_NUMERIC_CHARACTERS=''. ''')")
            }
            ValueKind::Date | ValueKind::Timestamp => {
                format!("TO_CHAR({column}, 'YYYY-MM-DD HH24:MI:SS')")
            }
        };
        let keyword = if operator == Operator::NotContains {
            "NOT LIKE"
        } else {
            "LIKE"
        };

        format!("UPPER({rendered}) {keyword} UPPER({placeholder})")
    }

    fn in_list(
        &self,
        column: &str,
        kind: ValueKind,
        condition: &FilterCondition,
        items: &[ScalarValue],
        params: &mut ParamGenerator,
    ) -> String {
        let negated = condition.operator == Operator::NotIn;
        if items.is_empty() {
            debug!(column = %condition.column, "empty list filter");
            return if negated { "1=1" } else { "1=0" }.to_string();
        }

        let limit = self.options.max_in_list_items;
        if items.len() > limit {
            debug!(
                column = %condition.column,
                requested = items.len(),
                limit,
                "list filter truncated"
            );
        }

        let text = kind == ValueKind::Text;
        let placeholders = items
            .iter()
            .take(limit)
            .map(|item| match item {
                ScalarValue::Text(value) if text => params.bind("p", value.to_uppercase()),
                other if text => params.bind("p", BindValue::from(other)),
                other => self.bind_typed(kind, other, params),
            })
            .collect::<Vec<_>>()
            .join(", ");
        let keyword = if negated { "NOT IN" } else { "IN" };

        if text {
            format!(
                "UPPER({}) {keyword} ({placeholders})",
                self.text_column(column)
            )
        } else {
            format!("{column} {keyword} ({placeholders})")
        }
    }
}
