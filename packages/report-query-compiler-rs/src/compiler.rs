use crate::model::{
    AggregationFunction, ColumnMetadata, Datatype, FilterCondition, FilterNode, FilterValue,
    JoinSpec, JoinType, Logic, LogicalGroup, Operator, QueryRequest, ScalarValue, SortDirection,
    ValidationError,
};
use crate::value::{coerce_date, coerce_number, pattern_text, BindValue};
use dataset_catalog_rs::{Catalog, NameResolver, PartitionConfigProvider};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub max_alias_length: usize,
    pub max_in_list_items: usize,
    pub fallback_alias: String,
    pub text_cast_type: String,
    pub date_trunc_function: String,
    pub high_performance_hint: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_alias_length: 50,
            max_in_list_items: 999,
            fallback_alias: "unnamed_metric".to_string(),
            text_cast_type: "VARCHAR2(4000)".to_string(),
            date_trunc_function: "TRUNC".to_string(),
            high_performance_hint: "/*+ INMEMORY */".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: BTreeMap<String, BindValue>,
}

/// Compiles [`QueryRequest`]s into parameterized SQL.
///
/// Holds no per-query state, so one compiler can be shared between threads.
pub struct QueryCompiler<'a> {
    partitions: &'a (dyn PartitionConfigProvider + Sync),
    names: &'a (dyn NameResolver + Sync),
    options: CompileOptions,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(
        partitions: &'a (dyn PartitionConfigProvider + Sync),
        names: &'a (dyn NameResolver + Sync),
    ) -> Self {
        Self {
            partitions,
            names,
            options: CompileOptions::default(),
        }
    }

    pub fn with_catalog(catalog: &'a Catalog) -> Self {
        Self::new(catalog, catalog)
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }
}

include!("compiler/errors.rs");
include!("compiler/identifiers.rs");
include!("compiler/params.rs");
include!("compiler/statement.rs");
include!("compiler/conditions.rs");
include!("compiler/groups.rs");
include!("compiler/joins.rs");
include!("compiler/pushdown.rs");
include!("compiler/partitions.rs");
include!("compiler/aggregations.rs");
include!("compiler/build.rs");

pub fn compile_json(catalog: &Catalog, request_json: &str) -> CompilerResult<CompiledQuery> {
    let request: QueryRequest = serde_json::from_str(request_json)?;
    QueryCompiler::with_catalog(catalog).compile(&request)
}

pub fn compile_count_json(catalog: &Catalog, request_json: &str) -> CompilerResult<CompiledQuery> {
    let request: QueryRequest = serde_json::from_str(request_json)?;
    QueryCompiler::with_catalog(catalog).compile_count(&request)
}

#[cfg(test)]
mod tests {
    use super::*;

    include!("compiler/tests_internal.rs");
}
