use serde::de::DeserializeOwned;
use sonic_rs::Value;
use thiserror::Error;

use crate::adapter::{Client, RestError, RestRequest, RestResponse, RestTransport};
use crate::config::ApiConfig;
use crate::items::{Catalog, ItemValue, UpdatePayload};

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Error)]
pub enum ItemsError {
    #[error("item name must not be empty")]
    EmptyName,
    #[error("item value {0} is not a finite number")]
    InvalidValue(ItemValue),
    #[error(transparent)]
    Rest(#[from] RestError),
}

pub type ItemsResult<T> = Result<T, ItemsError>;

/// Client for the items API.
///
/// Every request carries the configured `x-api-key`. Update calls return the
/// decoded body whatever the status code unless the `_checked` variant is used.
#[derive(Clone, Debug)]
pub struct ItemsClient {
    config: ApiConfig,
    client: Client,
}

impl ItemsClient {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    pub fn with_transport<T>(config: ApiConfig, transport: T) -> Self
    where
        T: RestTransport + 'static,
    {
        Self::with_client(config, Client::with_transport(transport))
    }

    pub fn with_client(config: ApiConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// `{base_url}/items/{name}/update`, with `name` inserted verbatim.
    pub fn update_url(&self, name: &str) -> String {
        format!("{}/items/{}/update", self.config.base_url(), name)
    }

    pub fn items_url(&self) -> String {
        format!("{}/items", self.config.base_url())
    }

    fn request(&self, request: RestRequest) -> RestRequest {
        request
            .with_header(API_KEY_HEADER, self.config.api_key().to_owned())
            .with_optional_timeout(self.config.timeout())
    }

    fn update_request(&self, name: &str, value: ItemValue, date: String) -> ItemsResult<RestRequest> {
        if name.is_empty() {
            return Err(ItemsError::EmptyName);
        }
        if !value.is_finite() {
            return Err(ItemsError::InvalidValue(value));
        }
        let payload = UpdatePayload { value, date };
        let request = RestRequest::post(self.update_url(name)).with_json(&payload)?;
        Ok(self.request(request))
    }

    async fn send_update(
        &self,
        name: &str,
        value: impl Into<ItemValue>,
        date: impl Into<String>,
    ) -> ItemsResult<RestResponse> {
        let value = value.into();
        let date = date.into();
        tracing::info!(item = name, %value, date = %date, "updating item");

        let request = self.update_request(name, value, date)?;
        let response = self.client.execute(request).await?;
        if !response.is_success() {
            tracing::warn!(item = name, status = response.status(), "item update returned non-success status");
        }
        Ok(response)
    }

    /// Posts `{"value", "date"}` for `name` and returns the decoded JSON body.
    ///
    /// A non-2xx status is not an error: an error body such as
    /// `{"error": "not found"}` comes back as the result.
    pub async fn update_item(
        &self,
        name: &str,
        value: impl Into<ItemValue>,
        date: impl Into<String>,
    ) -> ItemsResult<Value> {
        self.update_item_as(name, value, date).await
    }

    pub async fn update_item_as<T>(
        &self,
        name: &str,
        value: impl Into<ItemValue>,
        date: impl Into<String>,
    ) -> ItemsResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send_update(name, value, date).await?;
        Ok(response.json::<T>()?)
    }

    /// Like [`ItemsClient::update_item`] but a non-2xx status becomes a
    /// `Rejected` error carrying the status and body text.
    pub async fn update_item_checked(
        &self,
        name: &str,
        value: impl Into<ItemValue>,
        date: impl Into<String>,
    ) -> ItemsResult<Value> {
        let response = self.send_update(name, value, date).await?;
        Ok(response.error_for_status()?.json::<Value>()?)
    }

    pub async fn list_items(&self) -> ItemsResult<Value> {
        let request = self.request(RestRequest::get(self.items_url()));
        Ok(self.client.execute_json::<Value>(request).await?)
    }

    pub async fn catalog(&self) -> ItemsResult<Catalog> {
        let request = self.request(RestRequest::get(self.items_url()));
        let catalog = self.client.execute_json_checked::<Catalog>(request).await?;
        tracing::debug!(items = catalog.items.len(), "fetched catalog");
        Ok(catalog)
    }
}
