use napi_derive::napi;
use serde::Serialize;
use std::sync::Arc;

use crate::model::QueryRequest;
use crate::QueryCompiler;
use dataset_catalog_rs::{Catalog, CatalogStore};

enum CatalogSource {
    File(CatalogStore),
    Fixed(Arc<Catalog>),
}

impl CatalogSource {
    fn snapshot(&self) -> Arc<Catalog> {
        match self {
            CatalogSource::File(store) => store.snapshot(),
            CatalogSource::Fixed(catalog) => catalog.clone(),
        }
    }
}

#[napi]
pub struct NativeQueryCompiler {
    catalog: CatalogSource,
}

#[napi]
impl NativeQueryCompiler {
    /// Reads partition and naming config from `catalog_path`, re-reading it
    /// whenever the file changes.
    #[napi(constructor)]
    pub fn new(catalog_path: String) -> Self {
        Self {
            catalog: CatalogSource::File(CatalogStore::open(catalog_path)),
        }
    }

    #[napi(factory, js_name = "fromCatalogJson")]
    pub fn from_catalog_json(catalog_json: String) -> napi::Result<Self> {
        let catalog = Catalog::from_json(&catalog_json)
            .map_err(|err| napi::Error::from_reason(err.to_string()))?;
        Ok(Self {
            catalog: CatalogSource::Fixed(Arc::new(catalog)),
        })
    }

    #[napi(js_name = "compileQueryJson")]
    pub fn compile_query_json(&self, request_json: String) -> napi::Result<String> {
        let request = parse_request(&request_json)?;
        let catalog = self.catalog.snapshot();
        let compiled = QueryCompiler::with_catalog(&catalog)
            .compile(&request)
            .map_err(|err| napi::Error::from_reason(err.to_string()))?;
        to_json(&compiled)
    }

    #[napi(js_name = "compileCountQueryJson")]
    pub fn compile_count_query_json(&self, request_json: String) -> napi::Result<String> {
        let request = parse_request(&request_json)?;
        let catalog = self.catalog.snapshot();
        let compiled = QueryCompiler::with_catalog(&catalog)
            .compile_count(&request)
            .map_err(|err| napi::Error::from_reason(err.to_string()))?;
        to_json(&compiled)
    }

    #[napi(js_name = "reloadCatalog")]
    pub fn reload_catalog(&self) -> napi::Result<()> {
        if let CatalogSource::File(store) = &self.catalog {
            store
                .reload()
                .map_err(|err| napi::Error::from_reason(err.to_string()))?;
        }
        Ok(())
    }
}

fn parse_request(value: &str) -> napi::Result<QueryRequest> {
    serde_json::from_str(value)
        .map_err(|err| napi::Error::from_reason(format!("invalid JSON for query request: {}", err)))
}

fn to_json<T: Serialize>(value: &T) -> napi::Result<String> {
    serde_json::to_string(value)
        .map_err(|err| napi::Error::from_reason(format!("failed to serialize JSON: {}", err)))
}
