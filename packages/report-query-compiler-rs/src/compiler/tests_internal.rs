use serde_json::json;

fn parse_request(value: serde_json::Value) -> QueryRequest {
    serde_json::from_value(value).unwrap()
}

fn scope_for<'r>(compiler: &QueryCompiler<'_>, request: &'r QueryRequest) -> QueryScope<'r> {
    let sources = SourcePlan::plan(request).unwrap();
    let aggregates = compiler.plan_aggregations(request, &sources).unwrap();
    QueryScope {
        request,
        sources,
        aggregates,
    }
}

fn predicate_with(
    request: &QueryRequest,
    condition: serde_json::Value,
) -> (String, BTreeMap<String, BindValue>) {
    let catalog = Catalog::default();
    let compiler = QueryCompiler::with_catalog(&catalog);
    let condition: FilterCondition = serde_json::from_value(condition).unwrap();
    let kind = compiler.value_kind(request, &condition);
    let mut params = ParamGenerator::new();
    let sql = compiler
        .compile_predicate("\"C\"", kind, &condition, &mut params)
        .unwrap();
    (sql, params.into_params())
}

fn predicate(condition: serde_json::Value) -> (String, BTreeMap<String, BindValue>) {
    predicate_with(&QueryRequest::new("EMP"), condition)
}

fn text(value: &str) -> BindValue {
    BindValue::Text(value.to_string())
}

#[test]
fn quotes_identifiers_with_at_most_two_parts() {
    assert_eq!(quote_identifier("emp"), "\"EMP\"");
    assert_eq!(quote_identifier("emp.salary"), "\"EMP\".\"SALARY\"");
    assert_eq!(quote_identifier("hr.emp.salary"), "\"HR.EMP\".\"SALARY\"");
    assert_eq!(quote_identifier("my \"odd\" col#1"), "\"MY \"\"ODD\"\" COL#1\"");
    assert_eq!(quote_identifier(""), "\"\"");
    assert_eq!(quote_label("Net \"Pay\""), "\"Net \"\"Pay\"\"\"");
}

#[test]
fn sanitizes_free_text_aliases() {
    assert_eq!(
        sanitize_alias("Revenue (€) - Q1", 50, "unnamed_metric"),
        format!("Revenue{}Q1", "_".repeat(7))
    );
    assert_eq!(sanitize_alias("__;--__", 50, "unnamed_metric"), "unnamed_metric");
    assert_eq!(sanitize_alias("a\"b*/c", 50, "m"), "a_b__c");
    assert_eq!(sanitize_alias(&"x".repeat(80), 50, "m").len(), 50);
}

#[test]
fn parameter_names_share_one_counter() {
    let mut params = ParamGenerator::new();
    assert_eq!(params.next("p"), ("p_1".to_string(), ":p_1".to_string()));
    assert_eq!(params.bind("part_EMP", BindValue::Int(202601)), ":part_EMP_2");
    assert_eq!(params.bind("p", "x"), ":p_3");
    assert_eq!(params.len(), 2);
    assert!(!params.into_params().contains_key("p_1"));
}

#[test]
fn assigns_unique_aliases_per_occurrence() {
    let request = parse_request(json!({
        "dataset": "ORDERS",
        "columns": ["ID"],
        "joins": [
            {"left_dataset": "ORDERS", "right_dataset": "ORDERS", "on": [{"left_column": "PARENT_ID", "right_column": "ID"}]},
            {"left_dataset": "ORDERS_1", "right_dataset": "orders", "on": [{"left_column": "PARENT_ID", "right_column": "ID"}]}
        ]
    }));
    let plan = SourcePlan::plan(&request).unwrap();
    let aliases: Vec<_> = plan.occurrences.iter().map(|o| o.alias.as_str()).collect();
    assert_eq!(aliases, vec!["ORDERS", "ORDERS_1", "orders_2"]);
    assert_eq!(plan.joins[1].left, 1);
    assert_eq!(plan.resolve_qualifier("orders_1"), Some(1));
    assert_eq!(plan.resolve_qualifier("orders"), Some(0));
    assert_eq!(plan.resolve_column("ORDERS_2.STATUS"), Some((2, "STATUS")));
    assert_eq!(plan.resolve_column("STATUS"), Some((0, "STATUS")));
    assert_eq!(plan.resolve_column("CUSTOMERS.STATUS"), None);
}

#[test]
fn resolves_schema_qualified_datasets() {
    let request = parse_request(json!({"dataset": "hr.employees", "columns": ["ID"]}));
    let plan = SourcePlan::plan(&request).unwrap();
    assert_eq!(plan.occurrences[0].alias, "hr_employees");
    assert_eq!(plan.resolve_column("hr.employees.salary"), Some((0, "salary")));
    assert_eq!(plan.resolve_column("EMPLOYEES.SALARY"), Some((0, "SALARY")));
    assert_eq!(plan.resolve_column("HR_EMPLOYEES.SALARY"), Some((0, "SALARY")));
}

#[test]
fn marks_null_supplying_occurrences() {
    let request = parse_request(json!({
        "dataset": "EMP",
        "columns": ["ID"],
        "joins": [
            {"left_dataset": "EMP", "right_dataset": "DEPT", "join_type": "left", "on": [{"left_column": "DEPT_ID", "right_column": "ID"}]},
            {"left_dataset": "EMP", "right_dataset": "SITE", "join_type": "inner", "on": [{"left_column": "SITE_ID", "right_column": "ID"}]}
        ]
    }));
    let plan = SourcePlan::plan(&request).unwrap();
    let flags: Vec<_> = plan.occurrences.iter().map(|o| o.null_supplying).collect();
    assert_eq!(flags, vec![false, true, false]);

    let request = parse_request(json!({
        "dataset": "EMP",
        "columns": ["ID"],
        "joins": [
            {"left_dataset": "EMP", "right_dataset": "DEPT", "join_type": "right", "on": [{"left_column": "DEPT_ID", "right_column": "ID"}]}
        ]
    }));
    let plan = SourcePlan::plan(&request).unwrap();
    let flags: Vec<_> = plan.occurrences.iter().map(|o| o.null_supplying).collect();
    assert_eq!(flags, vec![true, false]);
}

#[test]
fn rejects_join_from_unknown_dataset() {
    let request = parse_request(json!({
        "dataset": "EMP",
        "columns": ["ID"],
        "joins": [
            {"left_dataset": "DEPT", "right_dataset": "SITE", "on": [{"left_column": "SITE_ID", "right_column": "ID"}]}
        ]
    }));
    let err = SourcePlan::plan(&request).unwrap_err();
    assert!(matches!(err, CompilerError::SqlGeneration { .. }));
    assert_eq!(err.context().unwrap()["left_dataset"], json!("DEPT"));
}

#[test]
fn reorders_only_base_anchored_inner_and_left_joins() {
    let joins = json!([
        {"left_dataset": "EMP", "right_dataset": "A", "on": [{"left_column": "A_ID", "right_column": "ID"}]},
        {"left_dataset": "A", "right_dataset": "C", "on": [{"left_column": "C_ID", "right_column": "ID"}]},
        {"left_dataset": "EMP", "right_dataset": "B", "join_type": "left", "on": [{"left_column": "B_ID", "right_column": "ID"}]}
    ]);
    let request = parse_request(json!({"dataset": "EMP", "columns": ["ID"], "joins": joins}));
    let mut plan = SourcePlan::plan(&request).unwrap();
    plan.reorder_joins(&[0, 1, 0, 3]);
    let order: Vec<_> = plan.joins.iter().map(|join| join.right).collect();
    assert_eq!(order, vec![3, 1, 2]);

    let mut request = request.clone();
    if let Some(joins) = request.joins.as_mut() {
        joins[2].join_type = JoinType::Outer;
    }
    let mut plan = SourcePlan::plan(&request).unwrap();
    plan.reorder_joins(&[0, 1, 0, 3]);
    let order: Vec<_> = plan.joins.iter().map(|join| join.right).collect();
    assert_eq!(order, vec![1, 2, 3]);
}

#[test]
fn splits_and_groups_but_keeps_mixed_or_groups_whole() {
    let catalog = Catalog::default();
    let compiler = QueryCompiler::with_catalog(&catalog);
    let request = parse_request(json!({
        "dataset": "EMP",
        "columns": ["ID"],
        "joins": [
            {"left_dataset": "EMP", "right_dataset": "DEPT", "on": [{"left_column": "DEPT_ID", "right_column": "ID"}]}
        ],
        "filters": {"logic": "AND", "conditions": [
            {"column": "NAME", "operator": "eq", "value": "A"},
            {"column": "DEPT.CODE", "operator": "eq", "value": "X"},
            {"logic": "OR", "conditions": [
                {"column": "EMP.CITY", "operator": "eq", "value": "Oslo"},
                {"column": "DEPT.CITY", "operator": "eq", "value": "Oslo"}
            ]},
            {"logic": "OR", "conditions": [
                {"column": "DEPT.KIND", "operator": "eq", "value": "R"},
                {"column": "DEPT.KIND", "operator": "eq", "value": "S"}
            ]},
            {"logic": "AND", "conditions": []}
        ]}
    }));
    let scope = scope_for(&compiler, &request);
    let plan = compiler.plan_pushdown(&scope);

    assert_eq!(plan.weights(), vec![1, 3]);
    assert!(matches!(
        &plan.pushed_for(0).unwrap().conditions[0],
        FilterNode::Condition(condition) if condition.column == "NAME"
    ));
    assert_eq!(plan.pushed_for(1).unwrap().conditions.len(), 2);
    assert_eq!(plan.remaining.conditions.len(), 1);
    assert!(matches!(
        &plan.remaining.conditions[0],
        FilterNode::Group(group) if group.logic == Logic::Or && group.conditions.len() == 2
    ));
}

#[test]
fn never_pushes_aggregate_aliases_or_unresolved_columns() {
    let catalog = Catalog::default();
    let compiler = QueryCompiler::with_catalog(&catalog);
    let request = parse_request(json!({
        "dataset": "SALES",
        "group_by": ["REGION"],
        "aggregations": [{"column": "AMOUNT", "function": "sum", "output_name": "Total Sales"}],
        "filters": {"logic": "AND", "conditions": [
            {"column": "Total Sales", "datatype": "number", "operator": "gt", "value": 10},
            {"column": "TOTAL_SALES", "datatype": "number", "operator": "lt", "value": 99},
            {"column": "GHOST.COL", "operator": "eq", "value": "x"}
        ]}
    }));
    let scope = scope_for(&compiler, &request);
    let plan = compiler.plan_pushdown(&scope);
    assert!(plan.pushed_for(0).is_none());
    assert_eq!(plan.remaining.conditions.len(), 3);
}

#[test]
fn promotes_mixed_or_group_to_having() {
    let catalog = Catalog::default();
    let compiler = QueryCompiler::with_catalog(&catalog);
    let request = parse_request(json!({
        "dataset": "SALES",
        "group_by": ["REGION"],
        "aggregations": [{"column": "AMOUNT", "function": "sum", "output_name": "total"}],
        "filters": {"logic": "OR", "conditions": [
            {"column": "REGION", "operator": "eq", "value": "na"},
            {"logic": "AND", "conditions": [
                {"column": "total", "datatype": "number", "operator": "gt", "value": 5}
            ]}
        ]}
    }));
    let scope = scope_for(&compiler, &request);
    let mut params = ParamGenerator::new();
    let filters = request.filters.as_ref().unwrap();
    let clauses = compiler
        .compile_group(&scope, filters, ColumnScope::Query, &mut params, false)
        .unwrap();

    assert_eq!(clauses.where_sql, None);
    assert_eq!(
        clauses.having_sql.as_deref(),
        Some(
            "(UPPER(CAST(MAX(\"SALES\".\"REGION\") AS VARCHAR2(4000))) = UPPER(:p_1)) \
             OR ((SUM(\"SALES\".\"AMOUNT\") > :p_2))"
        )
    );
}

#[test]
fn skips_empty_nested_group_inside_or() {
    let catalog = Catalog::default();
    let compiler = QueryCompiler::with_catalog(&catalog);
    let request = parse_request(json!({
        "dataset": "EMP",
        "columns": ["A"],
        "filters": {"logic": "OR", "conditions": [
            {"column": "A", "operator": "eq", "value": "x"},
            {"logic": "AND", "conditions": []}
        ]}
    }));
    let scope = scope_for(&compiler, &request);
    let mut params = ParamGenerator::new();
    let filters = request.filters.as_ref().unwrap();
    let clauses = compiler
        .compile_group(&scope, filters, ColumnScope::Query, &mut params, false)
        .unwrap();

    assert_eq!(
        clauses.where_sql.as_deref(),
        Some("(UPPER(CAST(\"EMP\".\"A\" AS VARCHAR2(4000))) = UPPER(:p_1))")
    );
    assert_eq!(clauses.having_sql, None);
    assert_eq!(params.len(), 1);
}

#[test]
fn empty_root_group_is_neutral() {
    let catalog = Catalog::default();
    let compiler = QueryCompiler::with_catalog(&catalog);
    let request = parse_request(json!({"dataset": "EMP", "columns": ["A"]}));
    let scope = scope_for(&compiler, &request);
    let mut params = ParamGenerator::new();
    let clauses = compiler
        .compile_group(
            &scope,
            &LogicalGroup::new(Logic::Or, Vec::new()),
            ColumnScope::Query,
            &mut params,
            false,
        )
        .unwrap();

    assert_eq!(clauses.where_sql.as_deref(), Some("1=1"));
}

#[test]
fn routes_and_groups_to_both_clauses() {
    let catalog = Catalog::default();
    let compiler = QueryCompiler::with_catalog(&catalog);
    let request = parse_request(json!({
        "dataset": "SALES",
        "group_by": ["REGION"],
        "aggregations": [{"column": "AMOUNT", "function": "avg"}],
        "filters": {"logic": "AND", "conditions": [
            {"column": "SALES.REGION", "operator": "is_not_empty"},
            {"column": "AVG_AMOUNT", "datatype": "number", "operator": "gte", "value": 1}
        ]}
    }));
    let scope = scope_for(&compiler, &request);
    let mut params = ParamGenerator::new();
    let filters = request.filters.as_ref().unwrap();
    let clauses = compiler
        .compile_group(&scope, filters, ColumnScope::Query, &mut params, false)
        .unwrap();

    assert_eq!(
        clauses.where_sql.as_deref(),
        Some("((\"SALES\".\"REGION\" IS NOT NULL AND \"SALES\".\"REGION\" != ''))")
    );
    assert_eq!(clauses.having_sql.as_deref(), Some("(AVG(\"SALES\".\"AMOUNT\") >= :p_1)"));
}

#[test]
fn compiles_null_and_empty_checks() {
    assert_eq!(predicate(json!({"column": "C", "operator": "is_null"})).0, "\"C\" IS NULL");
    assert_eq!(
        predicate(json!({"column": "C", "operator": "is_empty"})).0,
        "(\"C\" IS NULL OR \"C\" = '')"
    );
    assert_eq!(
        predicate(json!({"column": "C", "datatype": "number", "operator": "is_not_empty"})).0,
        "\"C\" IS NOT NULL"
    );
}

#[test]
fn degrades_blank_values_to_neutral_predicates() {
    let (sql, params) = predicate(json!({"column": "C", "operator": "eq", "value": ""}));
    assert_eq!(sql, "1=1");
    assert!(params.is_empty());

    let (sql, params) = predicate(json!({
        "column": "C", "datatype": "date", "operator": "between", "value": ["", null]
    }));
    assert_eq!(sql, "1=1");
    assert!(params.is_empty());
}

#[test]
fn compiles_case_insensitive_wildcards() {
    let (sql, params) = predicate(json!({"column": "C", "operator": "starts_with", "value": "ab"}));
    assert_eq!(sql, "UPPER(CAST(\"C\" AS VARCHAR2(4000))) LIKE UPPER(:p_1)");
    assert_eq!(params["p_1"], text("AB%"));

    let (sql, params) = predicate(json!({"column": "C", "operator": "not_contains", "value": "ab"}));
    assert_eq!(sql, "UPPER(CAST(\"C\" AS VARCHAR2(4000))) NOT LIKE UPPER(:p_1)");
    assert_eq!(params["p_1"], text("%AB%"));

    let (_, params) = predicate(json!({"column": "C", "operator": "ends_with", "value": "ab"}));
    assert_eq!(params["p_1"], text("%AB"));
}

#[test]
fn wildcards_on_numeric_metadata_render_numbers_as_text() {
    let request = parse_request(json!({
        "dataset": "EMP",
        "columns": ["C"],
        "column_metadata": {"EMP.C": {"data_type": "NUMBER"}}
    }));
    let (sql, params) = predicate_with(
        &request,
        json!({"column": "C", "operator": "contains", "value": "5.50"}),
    );
    assert_eq!(
        sql,
        "UPPER(TO_CHAR(\"C\", 'TM', 'NLS_NUMERIC_CHARACTERS=''. ''')) LIKE UPPER(:p_1)"
    );
    assert_eq!(params["p_1"], text("%5.5%"));
}

#[test]
fn compiles_text_equality_with_folded_value() {
    let (sql, params) = predicate(json!({"column": "C", "operator": "neq", "value": "na"}));
    assert_eq!(sql, "UPPER(CAST(\"C\" AS VARCHAR2(4000))) != UPPER(:p_1)");
    assert_eq!(params["p_1"], text("NA"));
}

#[test]
fn compiles_in_lists() {
    let (sql, params) = predicate(json!({"column": "C", "operator": "in", "value": ["a", "b"]}));
    assert_eq!(sql, "UPPER(CAST(\"C\" AS VARCHAR2(4000))) IN (:p_1, :p_2)");
    assert_eq!(params["p_2"], text("B"));

    let (sql, params) = predicate(json!({
        "column": "C", "datatype": "number", "operator": "not_in", "value": "1, 2"
    }));
    assert_eq!(sql, "\"C\" NOT IN (:p_1, :p_2)");
    assert_eq!(params["p_1"], BindValue::Int(1));

    assert_eq!(predicate(json!({"column": "C", "operator": "in", "value": []})).0, "1=0");
    assert_eq!(predicate(json!({"column": "C", "operator": "not_in", "value": []})).0, "1=1");
}

#[test]
fn caps_in_lists() {
    let values: Vec<_> = (0..1005).collect();
    let (_, params) = predicate(json!({
        "column": "C", "datatype": "number", "operator": "in", "value": values
    }));
    assert_eq!(params.len(), 999);
}

#[test]
fn compiles_between_variants() {
    let (sql, params) = predicate(json!({
        "column": "C", "datatype": "number", "operator": "between", "value": [1, "5"]
    }));
    assert_eq!(sql, "\"C\" BETWEEN :p_1 AND :p_2");
    assert_eq!(params["p_2"], BindValue::Int(5));

    let (sql, params) = predicate(json!({
        "column": "C", "datatype": "date", "operator": "between", "value": ["2026-01-01", ""]
    }));
    assert_eq!(sql, "TRUNC(\"C\") >= :p_1");
    assert_eq!(
        params["p_1"],
        BindValue::Date(chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
    );

    let (sql, _) = predicate(json!({
        "column": "C", "datatype": "number", "operator": "between", "value": [null, 9]
    }));
    assert_eq!(sql, "\"C\" <= :p_1");
}

#[test]
fn truncates_dates_in_comparisons() {
    let (sql, params) = predicate(json!({
        "column": "C", "datatype": "timestamp", "operator": "gt", "value": "2026-03-01T10:00:00"
    }));
    assert_eq!(sql, "TRUNC(\"C\") > :p_1");
    assert!(matches!(params["p_1"], BindValue::Timestamp(_)));

    let request = parse_request(json!({
        "dataset": "EMP",
        "columns": ["C"],
        "column_metadata": {"c": {"base_type": "date"}}
    }));
    let (sql, _) = predicate_with(
        &request,
        json!({"column": "C", "operator": "eq", "value": "2026-03-01"}),
    );
    assert_eq!(sql, "TRUNC(\"C\") = :p_1");
}

#[test]
fn compiles_plain_numeric_comparisons() {
    let (sql, params) = predicate(json!({
        "column": "C", "datatype": "number", "operator": "lte", "value": "10"
    }));
    assert_eq!(sql, "\"C\" <= :p_1");
    assert_eq!(params["p_1"], BindValue::Int(10));
}

#[test]
fn mismatched_value_shape_is_a_generation_error() {
    let catalog = Catalog::default();
    let compiler = QueryCompiler::with_catalog(&catalog);
    let condition = FilterCondition {
        column: "C".to_string(),
        datatype: Datatype::Number,
        operator: Operator::Eq,
        value: FilterValue::List(vec![ScalarValue::Int(1)]),
    };
    let mut params = ParamGenerator::new();
    let err = compiler
        .compile_predicate("\"C\"", ValueKind::Number, &condition, &mut params)
        .unwrap_err();
    assert!(err.to_string().contains("'eq'"));
    assert_eq!(err.context().unwrap()["column"], json!("C"));
}

#[test]
fn renders_statement_clauses_in_order() {
    let statement = SelectStatement {
        hint: Some("/*+ INMEMORY */".to_string()),
        projection: vec![SelectItem::new("\"E\".\"ID\"", "\"ID\"")],
        from: "\"EMP\" \"E\"".to_string(),
        joins: vec![JoinClause {
            join_type: JoinType::Outer,
            source: "\"DEPT\" \"D\"".to_string(),
            on: vec![("\"E\".\"D\"".to_string(), "\"D\".\"ID\"".to_string())],
        }],
        where_clause: Some("(1=1)".to_string()),
        group_by: vec!["\"E\".\"ID\"".to_string()],
        having: Some("(COUNT(\"E\".\"ID\") > :p_1)".to_string()),
        order_by: vec![("\"ID\"".to_string(), SortDirection::Desc)],
        paging: Some(Paging {
            offset: 20,
            limit: 10,
        }),
    };

    assert_eq!(
        statement.render(),
        "SELECT /*+ INMEMORY */ \"E\".\"ID\" AS \"ID\"\n\
         FROM \"EMP\" \"E\"\n\
         FULL OUTER JOIN \"DEPT\" \"D\" ON \"E\".\"D\" = \"D\".\"ID\"\n\
         WHERE (1=1)\n\
         GROUP BY \"E\".\"ID\"\n\
         HAVING (COUNT(\"E\".\"ID\") > :p_1)\n\
         ORDER BY \"ID\" DESC\n\
         OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"
    );
}

#[test]
fn deduplicates_and_truncates_aggregate_aliases() {
    let catalog = Catalog::default();
    let compiler = QueryCompiler::with_catalog(&catalog);
    let long_name = "m".repeat(60);
    let request = parse_request(json!({
        "dataset": "SALES",
        "aggregations": [
            {"column": "AMOUNT", "function": "sum", "output_name": "Total Sales"},
            {"column": "AMOUNT", "function": "max", "output_name": "Total-Sales"},
            {"column": "AMOUNT", "function": "min", "output_name": "total_sales"},
            {"column": "AMOUNT", "function": "count", "output_name": long_name},
            {"column": "AMOUNT", "function": "avg", "output_name": long_name},
            {"column": "AMOUNT", "function": "distinct_count", "output_name": "(€)"}
        ]
    }));
    let sources = SourcePlan::plan(&request).unwrap();
    let index = compiler.plan_aggregations(&request, &sources).unwrap();
    let aliases: Vec<_> = index.outputs.iter().map(|o| o.alias.clone()).collect();

    assert_eq!(aliases[0], "Total_Sales");
    assert_eq!(aliases[1], "Total_Sales_1");
    assert_eq!(aliases[2], "total_sales_2");
    assert_eq!(aliases[3], "m".repeat(50));
    assert_eq!(aliases[4], format!("{}_1", "m".repeat(48)));
    assert_eq!(aliases[5], "unnamed_metric");
    assert_eq!(index.outputs[5].expression, "COUNT(DISTINCT \"SALES\".\"AMOUNT\")");
    assert_eq!(index.get("total-sales").unwrap().alias, "Total_Sales_1");
    assert_eq!(index.get("TOTAL_SALES_2").unwrap().expression, "MIN(\"SALES\".\"AMOUNT\")");
}
