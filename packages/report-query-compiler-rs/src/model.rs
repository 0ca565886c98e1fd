use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const MAX_LIMIT: u64 = 100_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("operator '{operator}' is not allowed for datatype '{datatype}'")]
    OperatorNotAllowed { operator: Operator, datatype: Datatype },
    #[error("value for '{column}' must be a list of exactly 2 items for operator 'between'")]
    BetweenArity { column: String },
    #[error("value for '{column}' must be a single value for operator '{operator}'")]
    ScalarRequired { column: String, operator: Operator },
    #[error("list value for '{column}' may only contain strings, numbers and booleans")]
    InvalidListElement { column: String },
    #[error("limit must be between 1 and 100000, got {0}")]
    InvalidLimit(u64),
    #[error("join from '{left}' to '{right}' needs at least one column pair")]
    EmptyJoinColumns { left: String, right: String },
    #[error("request must select explicit columns or aggregations")]
    MissingProjection,
    #[error("request dataset must not be empty")]
    EmptyDataset,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    Number,
    #[default]
    String,
    Date,
    Timestamp,
}

impl Datatype {
    pub fn as_str(self) -> &'static str {
        match self {
            Datatype::Number => "number",
            Datatype::String => "string",
            Datatype::Date => "date",
            Datatype::Timestamp => "timestamp",
        }
    }

    pub fn allows(self, operator: Operator) -> bool {
        use Operator::*;

        match operator {
            Eq | Neq | In | NotIn | IsNull | IsNotNull | IsEmpty | IsNotEmpty => true,
            Contains | NotContains | StartsWith | EndsWith => self == Datatype::String,
            Gt | Gte | Lt | Lte | Between => self != Datatype::String,
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Neq,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Between => "between",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::IsNull => "is_null",
            Operator::IsNotNull => "is_not_null",
            Operator::IsEmpty => "is_empty",
            Operator::IsNotEmpty => "is_not_empty",
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(
            self,
            Operator::IsNull | Operator::IsNotNull | Operator::IsEmpty | Operator::IsNotEmpty
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    fn from_json(value: &Value) -> Option<Option<ScalarValue>> {
        match value {
            Value::Null => Some(None),
            Value::Bool(v) => Some(Some(ScalarValue::Bool(*v))),
            Value::Number(v) => match v.as_i64() {
                Some(i) => Some(Some(ScalarValue::Int(i))),
                None => v.as_f64().map(|f| Some(ScalarValue::Float(f))),
            },
            Value::String(v) => Some(Some(ScalarValue::Text(v.clone()))),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, ScalarValue::Text(v) if v.is_empty())
    }

    pub fn to_text(&self) -> String {
        match self {
            ScalarValue::Bool(v) => v.to_string(),
            ScalarValue::Int(v) => v.to_string(),
            ScalarValue::Float(v) => v.to_string(),
            ScalarValue::Text(v) => v.clone(),
        }
    }
}

/// The shape of a filter value after validation.
///
/// `Range` bounds are `None` when the user left that side of a `between`
/// blank; `List` is already split and trimmed for `in`/`not_in`.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Absent,
    Scalar(ScalarValue),
    Range(Option<ScalarValue>, Option<ScalarValue>),
    List(Vec<ScalarValue>),
}

impl Serialize for FilterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FilterValue::Absent => serializer.serialize_none(),
            FilterValue::Scalar(value) => value.serialize(serializer),
            FilterValue::Range(start, end) => (start, end).serialize(serializer),
            FilterValue::List(values) => values.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFilterCondition")]
pub struct FilterCondition {
    pub column: String,
    pub datatype: Datatype,
    pub operator: Operator,
    pub value: FilterValue,
}

#[derive(Debug, Deserialize)]
struct RawFilterCondition {
    column: String,
    #[serde(default)]
    datatype: Datatype,
    operator: Operator,
    #[serde(default)]
    value: Option<Value>,
}

impl TryFrom<RawFilterCondition> for FilterCondition {
    type Error = ValidationError;

    fn try_from(raw: RawFilterCondition) -> Result<Self, Self::Error> {
        FilterCondition::new(raw.column, raw.datatype, raw.operator, raw.value)
    }
}

impl FilterCondition {
    pub fn new(
        column: impl Into<String>,
        datatype: Datatype,
        operator: Operator,
        value: Option<Value>,
    ) -> Result<Self, ValidationError> {
        let column = column.into();
        if !datatype.allows(operator) {
            return Err(ValidationError::OperatorNotAllowed { operator, datatype });
        }

        let value = if operator.is_unary() {
            FilterValue::Absent
        } else {
            shape_value(&column, operator, value)?
        };

        Ok(Self {
            column,
            datatype,
            operator,
            value,
        })
    }
}

fn shape_value(
    column: &str,
    operator: Operator,
    value: Option<Value>,
) -> Result<FilterValue, ValidationError> {
    let value = match value {
        None | Some(Value::Null) => return Ok(FilterValue::Absent),
        Some(Value::String(text)) if text.is_empty() => return Ok(FilterValue::Absent),
        Some(value) => value,
    };

    match operator {
        Operator::Between => match &value {
            Value::Array(items) if items.len() == 2 => {
                let bound = |item: &Value| {
                    ScalarValue::from_json(item)
                        .map(|bound| bound.filter(|b| !b.is_blank()))
                        .ok_or_else(|| ValidationError::BetweenArity {
                            column: column.to_string(),
                        })
                };
                Ok(FilterValue::Range(bound(&items[0])?, bound(&items[1])?))
            }
            _ => Err(ValidationError::BetweenArity {
                column: column.to_string(),
            }),
        },
        Operator::In | Operator::NotIn => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in &items {
                    match ScalarValue::from_json(item) {
                        Some(Some(scalar)) => out.push(scalar),
                        Some(None) => {}
                        None => {
                            return Err(ValidationError::InvalidListElement {
                                column: column.to_string(),
                            })
                        }
                    }
                }
                Ok(FilterValue::List(out))
            }
            Value::String(text) => Ok(FilterValue::List(
                text.split([',', '\t', '\n', '\r'])
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| ScalarValue::Text(item.to_string()))
                    .collect(),
            )),
            other => match ScalarValue::from_json(&other) {
                Some(Some(scalar)) => Ok(FilterValue::List(vec![scalar])),
                _ => Err(ValidationError::InvalidListElement {
                    column: column.to_string(),
                }),
            },
        },
        _ => match ScalarValue::from_json(&value) {
            Some(Some(scalar)) => Ok(FilterValue::Scalar(scalar)),
            Some(None) => Ok(FilterValue::Absent),
            None => Err(ValidationError::ScalarRequired {
                column: column.to_string(),
                operator,
            }),
        },
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Logic {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

impl Logic {
    pub fn keyword(self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalGroup {
    #[serde(default)]
    pub logic: Logic,
    #[serde(default)]
    pub conditions: Vec<FilterNode>,
}

impl LogicalGroup {
    pub fn new(logic: Logic, conditions: Vec<FilterNode>) -> Self {
        Self { logic, conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterNode {
    Condition(FilterCondition),
    Group(LogicalGroup),
}

impl From<FilterCondition> for FilterNode {
    fn from(value: FilterCondition) -> Self {
        FilterNode::Condition(value)
    }
}

impl From<LogicalGroup> for FilterNode {
    fn from(value: LogicalGroup) -> Self {
        FilterNode::Group(value)
    }
}

// Decoded by shape so that validation errors from the condition itself
// survive instead of collapsing into an untagged-enum mismatch.
impl<'de> Deserialize<'de> for FilterNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let Value::Object(object) = &value else {
            return Err(D::Error::custom("filter entries must be objects"));
        };

        if object.contains_key("column") {
            FilterCondition::deserialize(value)
                .map(FilterNode::Condition)
                .map_err(D::Error::custom)
        } else if object.contains_key("logic") || object.contains_key("conditions") {
            LogicalGroup::deserialize(value)
                .map(FilterNode::Group)
                .map_err(D::Error::custom)
        } else {
            Err(D::Error::custom(
                "filter entry is neither a condition nor a logical group",
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Outer,
}

impl JoinType {
    pub fn keyword(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Outer => "FULL OUTER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOn {
    pub left_column: String,
    pub right_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub left_dataset: String,
    pub right_dataset: String,
    #[serde(default)]
    pub join_type: JoinType,
    pub on: Vec<JoinOn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationFunction {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    DistinctCount,
}

impl AggregationFunction {
    pub fn name(self) -> &'static str {
        match self {
            AggregationFunction::Sum => "SUM",
            AggregationFunction::Avg => "AVG",
            AggregationFunction::Count => "COUNT",
            AggregationFunction::Min => "MIN",
            AggregationFunction::Max => "MAX",
            AggregationFunction::DistinctCount => "DISTINCT_COUNT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSpec {
    #[serde(rename = "column", alias = "source_column")]
    pub source_column: String,
    pub function: AggregationFunction,
    #[serde(default, rename = "output_name", alias = "output_alias")]
    pub output_alias: Option<String>,
}

impl AggregationSpec {
    /// The name filters and sorts use to refer to this aggregation.
    pub fn requested_name(&self) -> String {
        match self.output_alias.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}_{}", self.function.name(), self.source_column),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub base_type: Option<String>,
}

impl ColumnMetadata {
    pub fn type_name(&self) -> Option<String> {
        self.data_type
            .as_deref()
            .or(self.base_type.as_deref())
            .map(str::to_lowercase)
    }
}

fn default_limit() -> u64 {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub dataset: String,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub joins: Option<Vec<JoinSpec>>,
    #[serde(default)]
    pub filters: Option<LogicalGroup>,
    #[serde(default)]
    pub group_by: Option<Vec<String>>,
    #[serde(default)]
    pub aggregations: Option<Vec<AggregationSpec>>,
    #[serde(default)]
    pub sorting: Option<Vec<SortSpec>>,
    #[serde(default)]
    pub column_metadata: Option<BTreeMap<String, ColumnMetadata>>,
    #[serde(default)]
    pub partition_filters: Option<BTreeMap<String, Vec<ScalarValue>>>,
    #[serde(default)]
    pub partition_load_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub use_high_perf_hints: bool,
}

impl QueryRequest {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            columns: None,
            joins: None,
            filters: None,
            group_by: None,
            aggregations: None,
            sorting: None,
            column_metadata: None,
            partition_filters: None,
            partition_load_type: None,
            limit: default_limit(),
            offset: 0,
            use_high_perf_hints: false,
        }
    }

    pub fn columns(&self) -> &[String] {
        self.columns.as_deref().unwrap_or_default()
    }

    pub fn joins(&self) -> &[JoinSpec] {
        self.joins.as_deref().unwrap_or_default()
    }

    pub fn group_by(&self) -> &[String] {
        self.group_by.as_deref().unwrap_or_default()
    }

    pub fn aggregations(&self) -> &[AggregationSpec] {
        self.aggregations.as_deref().unwrap_or_default()
    }

    pub fn sorting(&self) -> &[SortSpec] {
        self.sorting.as_deref().unwrap_or_default()
    }

    pub fn is_grouped(&self) -> bool {
        !self.group_by().is_empty() || !self.aggregations().is_empty()
    }

    pub fn validate(&self, require_projection: bool) -> Result<(), ValidationError> {
        if self.dataset.trim().is_empty() {
            return Err(ValidationError::EmptyDataset);
        }
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(ValidationError::InvalidLimit(self.limit));
        }
        for join in self.joins() {
            if join.on.is_empty() {
                return Err(ValidationError::EmptyJoinColumns {
                    left: join.left_dataset.clone(),
                    right: join.right_dataset.clone(),
                });
            }
        }
        if require_projection && self.columns().is_empty() && self.aggregations().is_empty() {
            return Err(ValidationError::MissingProjection);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn condition(value: Value) -> Result<FilterCondition, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn rejects_operator_outside_datatype_set() {
        let err = condition(json!({
            "column": "NAME", "datatype": "string", "operator": "gt", "value": "a"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("not allowed for datatype 'string'"));

        let err = condition(json!({
            "column": "AMOUNT", "datatype": "number", "operator": "contains", "value": "1"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("'contains'"));
    }

    #[test]
    fn between_requires_two_items_when_present() {
        let err = condition(json!({
            "column": "D", "datatype": "date", "operator": "between", "value": ["2026-01-01"]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("exactly 2 items"));

        let parsed = condition(json!({
            "column": "D", "datatype": "date", "operator": "between", "value": ["2026-01-01", ""]
        }))
        .unwrap();
        assert_eq!(
            parsed.value,
            FilterValue::Range(Some(ScalarValue::Text("2026-01-01".to_string())), None)
        );
    }

    #[test]
    fn in_values_are_normalized_to_lists() {
        let parsed = condition(json!({
            "column": "REGION", "operator": "in", "value": "NA, EU\tAPAC,,"
        }))
        .unwrap();
        assert_eq!(
            parsed.value,
            FilterValue::List(vec![
                ScalarValue::Text("NA".to_string()),
                ScalarValue::Text("EU".to_string()),
                ScalarValue::Text("APAC".to_string()),
            ])
        );

        let parsed = condition(json!({
            "column": "ID", "datatype": "number", "operator": "not_in", "value": 7
        }))
        .unwrap();
        assert_eq!(parsed.value, FilterValue::List(vec![ScalarValue::Int(7)]));
    }

    #[test]
    fn unary_operators_ignore_value_and_blank_values_are_absent() {
        let parsed = condition(json!({
            "column": "X", "operator": "is_null", "value": "ignored"
        }))
        .unwrap();
        assert_eq!(parsed.value, FilterValue::Absent);

        let parsed = condition(json!({"column": "X", "operator": "eq", "value": ""})).unwrap();
        assert_eq!(parsed.value, FilterValue::Absent);
    }

    #[test]
    fn scalar_operators_reject_lists() {
        let err = condition(json!({"column": "X", "operator": "eq", "value": ["a"]})).unwrap_err();
        assert!(err.to_string().contains("single value"));
    }

    #[test]
    fn decodes_nested_filter_tree() {
        let group: LogicalGroup = serde_json::from_value(json!({
            "logic": "OR",
            "conditions": [
                {"column": "A", "operator": "eq", "value": "x"},
                {"logic": "AND", "conditions": []}
            ]
        }))
        .unwrap();
        assert_eq!(group.logic, Logic::Or);
        assert!(matches!(group.conditions[0], FilterNode::Condition(_)));
        assert!(matches!(&group.conditions[1], FilterNode::Group(g) if g.is_empty()));

        let err = serde_json::from_value::<LogicalGroup>(json!({
            "conditions": [{"value": 1}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("neither a condition nor a logical group"));
    }

    #[test]
    fn validates_request_shape() {
        let mut request = QueryRequest::new("EMP");
        assert_eq!(request.validate(true), Err(ValidationError::MissingProjection));
        assert_eq!(request.validate(false), Ok(()));

        request.columns = Some(vec!["ID".to_string()]);
        request.limit = MAX_LIMIT + 1;
        assert_eq!(
            request.validate(true),
            Err(ValidationError::InvalidLimit(MAX_LIMIT + 1))
        );
    }

    #[test]
    fn aggregation_requested_name_defaults_to_function_and_column() {
        let spec: AggregationSpec = serde_json::from_value(json!({
            "source_column": "SALARY", "function": "distinct_count"
        }))
        .unwrap();
        assert_eq!(spec.requested_name(), "DISTINCT_COUNT_SALARY");
    }
}
