use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::CatalogError;

/// Where a dataset keeps its load/vintage identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PartitionSpec {
    #[serde(alias = "column")]
    pub load_id_column: String,
    #[serde(default)]
    pub load_type_column: Option<String>,
    #[serde(default)]
    pub supported_types: Option<Vec<String>>,
}

impl PartitionSpec {
    pub fn new(load_id_column: impl Into<String>) -> Self {
        Self {
            load_id_column: load_id_column.into(),
            load_type_column: None,
            supported_types: None,
        }
    }

    pub fn with_load_type_column(mut self, column: impl Into<String>) -> Self {
        self.load_type_column = Some(column.into());
        self
    }

    pub fn with_supported_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// An unconfigured type list accepts every load type.
    pub fn supports_load_type(&self, load_type: &str) -> bool {
        match &self.supported_types {
            None => true,
            Some(types) => types
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(load_type)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSpec {
    #[serde(default)]
    pub physical_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSpec {
    #[serde(default)]
    pub physical_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub columns: Option<BTreeMap<String, ColumnSpec>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    partitions: BTreeMap<String, PartitionSpec>,
    #[serde(default)]
    tables: BTreeMap<String, TableSpec>,
}

pub trait PartitionConfigProvider {
    fn partition_config(&self, dataset: &str) -> Option<PartitionSpec>;
}

pub trait NameResolver {
    fn physical_table(&self, dataset: &str) -> String;
    fn physical_column(&self, dataset: &str, column: &str) -> String;
}

/// Immutable, case-insensitive view over the partition and naming configuration.
///
/// All keys are stored upper-cased. A [`Catalog`] is never mutated once built;
/// refreshing configuration means building a new one and swapping it in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    partitions: BTreeMap<String, PartitionSpec>,
    tables: BTreeMap<String, TableSpec>,
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Ok(Self::from_parts(file.partitions, file.tables))
    }

    fn from_parts(
        partitions: BTreeMap<String, PartitionSpec>,
        tables: BTreeMap<String, TableSpec>,
    ) -> Self {
        let tables = tables
            .into_iter()
            .map(|(key, mut table)| {
                table.columns = table.columns.map(|columns| {
                    columns
                        .into_iter()
                        .map(|(name, column)| (name.to_uppercase(), column))
                        .collect()
                });
                (key.to_uppercase(), table)
            })
            .collect();

        Self {
            partitions: partitions
                .into_iter()
                .map(|(key, spec)| (key.to_uppercase(), spec))
                .collect(),
            tables,
        }
    }

    pub fn with_partition(mut self, dataset: &str, spec: PartitionSpec) -> Self {
        self.partitions.insert(dataset.to_uppercase(), spec);
        self
    }

    pub fn with_table(self, dataset: &str, table: TableSpec) -> Self {
        let mut tables = self.tables;
        tables.insert(dataset.to_string(), table);
        Self::from_parts(self.partitions, tables)
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty() && self.tables.is_empty()
    }

    pub fn partition(&self, dataset: &str) -> Option<&PartitionSpec> {
        let key = dataset.to_uppercase();
        if let Some(spec) = self.partitions.get(&key) {
            return Some(spec);
        }

        let table_only = strip_schema(&key)?;
        self.partitions
            .iter()
            .find(|(candidate, _)| matches_table_only(candidate, table_only))
            .map(|(_, spec)| spec)
    }

    pub fn is_partitioned(&self, dataset: &str) -> bool {
        self.partition(dataset).is_some()
    }

    pub fn table(&self, dataset: &str) -> Option<&TableSpec> {
        let key = dataset.to_uppercase();
        if let Some(table) = self.tables.get(&key) {
            return Some(table);
        }

        if let Some(table) = self.tables.values().find(|table| {
            table
                .physical_name
                .as_deref()
                .is_some_and(|physical| physical.to_uppercase() == key)
        }) {
            return Some(table);
        }

        let table_only = strip_schema(&key)?;
        self.tables
            .iter()
            .find(|(candidate, _)| matches_table_only(candidate, table_only))
            .map(|(_, table)| table)
    }

    pub fn table_display_name(&self, dataset: &str) -> String {
        self.table(dataset)
            .and_then(|table| table.display_name.clone())
            .unwrap_or_else(|| {
                dataset
                    .rsplit('.')
                    .next()
                    .unwrap_or(dataset)
                    .to_string()
            })
    }

    pub fn column_display_name(&self, dataset: &str, column: &str) -> String {
        self.column(dataset, column)
            .and_then(|spec| spec.display_name.clone())
            .unwrap_or_else(|| column.to_string())
    }

    pub fn table_display_names(&self) -> BTreeMap<String, String> {
        self.tables
            .iter()
            .filter_map(|(key, table)| {
                table
                    .display_name
                    .as_ref()
                    .map(|name| (key.clone(), name.clone()))
            })
            .collect()
    }

    /// Configured column whitelist, `None` when every column is visible.
    pub fn visible_columns(&self, dataset: &str) -> Option<Vec<String>> {
        self.table(dataset)
            .and_then(|table| table.columns.as_ref())
            .map(|columns| columns.keys().cloned().collect())
    }

    fn column(&self, dataset: &str, column: &str) -> Option<&ColumnSpec> {
        self.table(dataset)?
            .columns
            .as_ref()?
            .get(&column.to_uppercase())
    }
}

impl PartitionConfigProvider for Catalog {
    fn partition_config(&self, dataset: &str) -> Option<PartitionSpec> {
        self.partition(dataset).cloned()
    }
}

impl NameResolver for Catalog {
    fn physical_table(&self, dataset: &str) -> String {
        self.table(dataset)
            .and_then(|table| table.physical_name.clone())
            .unwrap_or_else(|| dataset.to_string())
    }

    fn physical_column(&self, dataset: &str, column: &str) -> String {
        self.column(dataset, column)
            .and_then(|spec| spec.physical_name.clone())
            .unwrap_or_else(|| column.to_string())
    }
}

fn strip_schema(key: &str) -> Option<&str> {
    key.split_once('.').map(|(_, table)| table)
}

fn matches_table_only(candidate: &str, table_only: &str) -> bool {
    candidate == table_only
        || candidate
            .strip_suffix(table_only)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Catalog {
        Catalog::from_json(
            r#"{
              "partitions": {
                "employee_roster": { "column": "as_of_month_sk" },
                "HR.DAILY_SALES": {
                  "load_id_column": "load_date",
                  "load_type_column": "load_type",
                  "supported_types": ["Daily"]
                }
              },
              "tables": {
                "LOGICAL_SALES": {
                  "physical_name": "PROD_SALES_TABLE_V2",
                  "display_name": "Sales Records",
                  "columns": {
                    "logical_amount": { "physical_name": "AMT_VAL_USD", "display_name": "Amount ($)" }
                  }
                },
                "HR.EMPLOYEES": { "display_name": "Employees" }
              }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn partition_lookup_is_case_insensitive() {
        let catalog = sample();
        let spec = catalog.partition("EMPLOYEE_ROSTER").unwrap();
        assert_eq!(spec.load_id_column, "as_of_month_sk");
        assert!(spec.load_type_column.is_none());
        assert!(!catalog.is_partitioned("product_catalog"));
    }

    #[test]
    fn partition_lookup_falls_back_to_schema_stripped_name() {
        let catalog = sample();
        let spec = catalog.partition("REPORTING.daily_sales").unwrap();
        assert_eq!(spec.load_id_column, "load_date");
        assert!(spec.supports_load_type("daily"));
        assert!(!spec.supports_load_type("Monthly"));
    }

    #[test]
    fn resolves_physical_names_with_identity_fallback() {
        let catalog = sample();
        assert_eq!(catalog.physical_table("logical_sales"), "PROD_SALES_TABLE_V2");
        assert_eq!(
            catalog.physical_column("LOGICAL_SALES", "Logical_Amount"),
            "AMT_VAL_USD"
        );
        assert_eq!(catalog.physical_column("LOGICAL_SALES", "other"), "other");
        assert_eq!(catalog.physical_table("unknown.table"), "unknown.table");
    }

    #[test]
    fn finds_table_by_physical_name() {
        let catalog = sample();
        assert_eq!(
            catalog.table_display_name("prod_sales_table_v2"),
            "Sales Records"
        );
    }

    #[test]
    fn display_names_fall_back_to_raw_names() {
        let catalog = sample();
        assert_eq!(catalog.table_display_name("OTHER.ORDERS"), "ORDERS");
        assert_eq!(catalog.table_display_name("hr.employees"), "Employees");
        assert_eq!(
            catalog.column_display_name("LOGICAL_SALES", "LOGICAL_AMOUNT"),
            "Amount ($)"
        );
        assert_eq!(catalog.column_display_name("LOGICAL_SALES", "ID"), "ID");
        assert_eq!(catalog.table_display_names().len(), 2);
    }

    #[test]
    fn visible_columns_only_when_configured() {
        let catalog = sample();
        assert_eq!(
            catalog.visible_columns("LOGICAL_SALES"),
            Some(vec!["LOGICAL_AMOUNT".to_string()])
        );
        assert_eq!(catalog.visible_columns("HR.EMPLOYEES"), None);
    }

    #[test]
    fn builder_methods_normalize_keys() {
        let catalog = Catalog::default()
            .with_partition("orders", PartitionSpec::new("load_id"))
            .with_table(
                "orders",
                TableSpec {
                    physical_name: Some("ORDERS_V3".to_string()),
                    ..TableSpec::default()
                },
            );
        assert!(catalog.is_partitioned("ORDERS"));
        assert_eq!(catalog.physical_table("Orders"), "ORDERS_V3");
    }
}
