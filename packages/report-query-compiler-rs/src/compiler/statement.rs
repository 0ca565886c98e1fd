#[derive(Debug, Clone, PartialEq)]
struct SelectItem {
    expression: String,
    label: String,
}

impl SelectItem {
    fn new(expression: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct JoinClause {
    join_type: JoinType,
    source: String,
    on: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Paging {
    offset: u64,
    limit: u64,
}

/// Clause-level form of a compiled query. Every piece is already quoted and
/// parameterized; [`SelectStatement::render`] only lays the clauses out.
#[derive(Debug, Clone, Default, PartialEq)]
struct SelectStatement {
    hint: Option<String>,
    projection: Vec<SelectItem>,
    from: String,
    joins: Vec<JoinClause>,
    where_clause: Option<String>,
    group_by: Vec<String>,
    having: Option<String>,
    order_by: Vec<(String, SortDirection)>,
    paging: Option<Paging>,
}

impl SelectStatement {
    fn render(&self) -> String {
        let mut lines = Vec::new();

        let projection = self
            .projection
            .iter()
            .map(|item| format!("{} AS {}", item.expression, item.label))
            .collect::<Vec<_>>()
            .join(", ");
        match &self.hint {
            Some(hint) => lines.push(format!("SELECT {hint} {projection}")),
            None => lines.push(format!("SELECT {projection}")),
        }

        lines.push(format!("FROM {}", self.from));
        for join in &self.joins {
            let on = join
                .on
                .iter()
                .map(|(left, right)| format!("{left} = {right}"))
                .collect::<Vec<_>>()
                .join(" AND ");
            lines.push(format!(
                "{} JOIN {} ON {}",
                join.join_type.keyword(),
                join.source,
                on
            ));
        }

        if let Some(where_clause) = &self.where_clause {
            lines.push(format!("WHERE {where_clause}"));
        }
        if !self.group_by.is_empty() {
            lines.push(format!("GROUP BY {}", self.group_by.join(", ")));
        }
        if let Some(having) = &self.having {
            lines.push(format!("HAVING {having}"));
        }
        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(|(expression, direction)| match direction {
                    SortDirection::Asc => format!("{expression} ASC"),
                    SortDirection::Desc => format!("{expression} DESC"),
                })
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("ORDER BY {order}"));
        }
        if let Some(paging) = self.paging {
            lines.push(format!(
                "OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                paging.offset, paging.limit
            ));
        }

        lines.join("\n")
    }
}
