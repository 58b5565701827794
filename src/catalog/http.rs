use super::{OptionId, OptionSchema, OptionsProvider, ProviderError, SelectOption};
use crate::api::{unwrap_list, ApiClient};
use async_trait::async_trait;

/// Placeholder substituted with the product id in the packages path.
const ID_PLACEHOLDER: &str = "{id}";

/// API paths for the option lists.
#[derive(Debug, Clone)]
pub struct CatalogEndpoints {
    pub products: String,
    /// `{id}` is replaced with the product id; without it the id is appended.
    pub packages: String,
    pub plans: String,
}

impl Default for CatalogEndpoints {
    fn default() -> Self {
        Self {
            products: "/productcategory".to_string(),
            packages: "/fetchpackage/{id}".to_string(),
            plans: "/plan".to_string(),
        }
    }
}

/// Option lists served by the admin API.
///
/// As an [`OptionsProvider`], products are the primary list and a product's
/// packages are the dependent list.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    api: ApiClient,
    endpoints: CatalogEndpoints,
}

impl HttpCatalog {
    pub fn new(api: ApiClient, endpoints: CatalogEndpoints) -> Self {
        Self { api, endpoints }
    }

    pub async fn products(&self) -> Result<Vec<SelectOption>, ProviderError> {
        self.fetch(&self.endpoints.products, OptionSchema::PRODUCT)
            .await
    }

    pub async fn packages(&self, product_id: &OptionId) -> Result<Vec<SelectOption>, ProviderError> {
        tracing::debug!(product_id = %product_id, "Fetching packages for product");
        let path = self.packages_path(product_id);
        self.fetch(&path, OptionSchema::PACKAGE).await
    }

    /// Products keyed the way the client dialog expects them.
    pub async fn client_products(&self) -> Result<Vec<SelectOption>, ProviderError> {
        self.fetch(&self.endpoints.products, OptionSchema::CLIENT_PRODUCT)
            .await
    }

    pub async fn plans(&self) -> Result<Vec<SelectOption>, ProviderError> {
        self.fetch(&self.endpoints.plans, OptionSchema::PLAN).await
    }

    fn packages_path(&self, product_id: &OptionId) -> String {
        let encoded = self.api.path_segment(product_id.as_str());
        if self.endpoints.packages.contains(ID_PLACEHOLDER) {
            self.endpoints.packages.replace(ID_PLACEHOLDER, &encoded)
        } else {
            format!("{}/{}", self.endpoints.packages.trim_end_matches('/'), encoded)
        }
    }

    async fn fetch(
        &self,
        path: &str,
        schema: OptionSchema,
    ) -> Result<Vec<SelectOption>, ProviderError> {
        let value = self.api.get_json(path).await?;
        let options = schema.parse_rows(unwrap_list(value));
        tracing::debug!(path, count = options.len(), "Fetched options");
        Ok(options)
    }
}

#[async_trait]
impl OptionsProvider for HttpCatalog {
    async fn fetch_primary_options(&self) -> Result<Vec<SelectOption>, ProviderError> {
        self.products().await
    }

    async fn fetch_dependent_options(
        &self,
        primary_id: &OptionId,
    ) -> Result<Vec<SelectOption>, ProviderError> {
        self.packages(primary_id).await
    }
}
