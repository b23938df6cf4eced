use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use storefront_types::domain::catalog::{
    Category, Lookup, LookupKind, NewCategory, NewLookup, NewProduct, NewSize, ProductDetail,
    ProductPatch, Size,
};
use storefront_types::domain::order::{AddToCart, OrderConfirmation, OrderView};

#[derive(Clone)]
pub struct StorefrontClientBuilder {
    base: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    client: Option<reqwest::Client>,
    token: Option<String>,
}

/// Typed client for the storefront HTTP API. Cart routes need a bearer token,
/// obtained with [`StorefrontClient::issue_token`] and attached with
/// [`StorefrontClient::with_token`].
#[derive(Clone)]
pub struct StorefrontClient {
    base: Url,
    client: reqwest::Client,
    token: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub token: String,
    pub anonymous_user_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Sorting and paging for product listings. Unset fields use server defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<i64>,
}

impl StorefrontClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::builder(base_url)?.build()
    }

    pub fn builder(base_url: &str) -> anyhow::Result<StorefrontClientBuilder> {
        let base = Url::parse(base_url).context("invalid base url")?;
        Ok(StorefrontClientBuilder {
            base,
            headers: HeaderMap::new(),
            timeout: None,
            client: None,
            token: None,
        })
    }

    /// Same client, sending `token` as the bearer credential.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..self.clone()
        }
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        self.base.join(path).context("failed to join url")
    }

    fn authed(&self, req: RequestBuilder) -> anyhow::Result<RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .context("this route needs a bearer token; call with_token first")?;
        Ok(req.bearer_auth(token))
    }

    async fn send(req: RequestBuilder) -> anyhow::Result<reqwest::Response> {
        let res = req.send().await?;
        tracing::debug!(status = %res.status(), url = %res.url(), "storefront response");
        Ok(res.error_for_status()?)
    }

    pub async fn health(&self) -> anyhow::Result<bool> {
        let res = self.client.get(self.url("health")?).send().await?;
        Ok(res.status().is_success())
    }

    pub async fn issue_token(&self) -> anyhow::Result<TokenResponse> {
        let res = Self::send(self.client.get(self.url("api/auth/token")?)).await?;
        Ok(res.json().await?)
    }

    pub async fn get_product(&self, id: i64) -> anyhow::Result<ProductDetail> {
        let res = Self::send(self.client.get(self.url(&format!("api/product/{id}"))?)).await?;
        Ok(res.json().await?)
    }

    pub async fn list_products(&self, query: &ListQuery) -> anyhow::Result<Vec<ProductDetail>> {
        let req = self.client.get(self.url("api/product/products")?).query(query);
        Ok(Self::send(req).await?.json().await?)
    }

    /// `filter` is the `categoryId-colorId-materialId-brandId` segment.
    pub async fn list_filtered_products(
        &self,
        filter: &str,
        query: &ListQuery,
    ) -> anyhow::Result<Vec<ProductDetail>> {
        let req = self
            .client
            .get(self.url(&format!("api/product/products/{filter}"))?)
            .query(query);
        Ok(Self::send(req).await?.json().await?)
    }

    pub async fn featured_products(&self, query: &ListQuery) -> anyhow::Result<Vec<ProductDetail>> {
        let req = self.client.get(self.url("api/product/featured")?).query(query);
        Ok(Self::send(req).await?.json().await?)
    }

    pub async fn create_product(&self, product: &NewProduct) -> anyhow::Result<ProductDetail> {
        let req = self.client.post(self.url("api/product")?).json(product);
        Ok(Self::send(req).await?.json().await?)
    }

    pub async fn update_product(&self, id: i64, patch: &ProductPatch) -> anyhow::Result<()> {
        let req = self
            .client
            .put(self.url(&format!("api/product/{id}"))?)
            .json(patch);
        Self::send(req).await?;
        Ok(())
    }

    pub async fn delete_product(&self, id: i64) -> anyhow::Result<()> {
        Self::send(self.client.delete(self.url(&format!("api/product/{id}"))?)).await?;
        Ok(())
    }

    pub async fn list_categories(&self) -> anyhow::Result<Vec<Category>> {
        let res = Self::send(self.client.get(self.url("api/catalog/categories")?)).await?;
        Ok(res.json().await?)
    }

    pub async fn create_category(&self, category: &NewCategory) -> anyhow::Result<Category> {
        let req = self
            .client
            .post(self.url("api/catalog/categories")?)
            .json(category);
        Ok(Self::send(req).await?.json().await?)
    }

    pub async fn list_sizes(&self) -> anyhow::Result<Vec<Size>> {
        let res = Self::send(self.client.get(self.url("api/catalog/sizes")?)).await?;
        Ok(res.json().await?)
    }

    pub async fn create_size(&self, size: &NewSize) -> anyhow::Result<Size> {
        let req = self.client.post(self.url("api/catalog/sizes")?).json(size);
        Ok(Self::send(req).await?.json().await?)
    }

    pub async fn list_lookups(&self, kind: LookupKind) -> anyhow::Result<Vec<Lookup>> {
        let url = self.url(&format!("api/catalog/{}", kind.plural()))?;
        Ok(Self::send(self.client.get(url)).await?.json().await?)
    }

    pub async fn create_lookup(&self, kind: LookupKind, name: &str) -> anyhow::Result<Lookup> {
        let url = self.url(&format!("api/catalog/{}", kind.plural()))?;
        let req = self.client.post(url).json(&NewLookup { name: name.into() });
        Ok(Self::send(req).await?.json().await?)
    }

    pub async fn active_order(&self) -> anyhow::Result<OrderView> {
        let req = self.authed(self.client.get(self.url("api/order/active")?))?;
        Ok(Self::send(req).await?.json().await?)
    }

    pub async fn add_to_cart(
        &self,
        tracking_id: &str,
        quantity: u32,
    ) -> anyhow::Result<OrderConfirmation> {
        let body = AddToCart {
            tracking_id: tracking_id.into(),
            quantity,
        };
        let req = self.authed(self.client.post(self.url("api/order/add-to-cart")?))?;
        Ok(Self::send(req.json(&body)).await?.json().await?)
    }

    pub async fn remove_item(&self, order_item_id: i64) -> anyhow::Result<()> {
        let url = self.url(&format!("api/order/remove-item/{order_item_id}"))?;
        Self::send(self.authed(self.client.delete(url))?).await?;
        Ok(())
    }

    pub async fn checkout(&self) -> anyhow::Result<OrderConfirmation> {
        let req = self.authed(self.client.post(self.url("api/order/checkout")?))?;
        Ok(Self::send(req).await?.json().await?)
    }

    pub async fn get_order(&self, order_id: i64) -> anyhow::Result<OrderView> {
        let res = Self::send(self.client.get(self.url(&format!("api/order/{order_id}"))?)).await?;
        Ok(res.json().await?)
    }
}

impl StorefrontClientBuilder {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(
        mut self,
        key: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> anyhow::Result<Self> {
        let header_name =
            HeaderName::from_bytes(key.as_ref().as_bytes()).context("invalid header name")?;
        let header_value = HeaderValue::from_str(value.as_ref()).context("invalid header value")?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> anyhow::Result<StorefrontClient> {
        if let Some(client) = self.client {
            return Ok(StorefrontClient {
                base: self.base,
                client,
                token: self.token,
            });
        }

        let mut builder = reqwest::Client::builder();
        if !self.headers.is_empty() {
            builder = builder.default_headers(self.headers);
        }
        if let Some(t) = self.timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build()?;
        Ok(StorefrontClient {
            base: self.base,
            client,
            token: self.token,
        })
    }
}
