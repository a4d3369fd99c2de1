use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::asset::AssetId;

use super::serde_helpers::field_as_string;
use super::{Quote, QuoteError, QuoteProvider};

/// `/v1/quote` 请求，以查询字符串传参。
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    pub amount_in: u64,
}

impl QuoteRequest {
    pub fn new(asset_in: AssetId, asset_out: AssetId, amount_in: u64) -> Self {
        Self {
            asset_in,
            asset_out,
            amount_in,
        }
    }

    pub fn to_query_params(&self) -> Vec<(String, String)> {
        vec![
            ("assetIn".to_string(), self.asset_in.to_string()),
            ("assetOut".to_string(), self.asset_out.to_string()),
            ("amountIn".to_string(), self.amount_in.to_string()),
        ]
    }
}

/// `/v1/quote` 响应体。数量一律按字符串传输。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponsePayload {
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    #[serde(with = "field_as_string")]
    pub amount_in: u64,
    #[serde(with = "field_as_string")]
    pub expected_out: u64,
}

/// DEX 聚合器报价接口的 HTTP 客户端。
#[derive(Clone)]
pub struct AggregatorApiClient {
    client: reqwest::Client,
    base: Url,
}

impl AggregatorApiClient {
    pub fn new(client: reqwest::Client, mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Self { client, base }
    }
}

#[async_trait]
impl QuoteProvider for AggregatorApiClient {
    async fn quote(
        &self,
        asset_in: &AssetId,
        asset_out: &AssetId,
        amount_in: u64,
    ) -> Result<Quote, QuoteError> {
        let request = QuoteRequest::new(asset_in.clone(), asset_out.clone(), amount_in);
        let url = self
            .base
            .join("v1/quote")
            .map_err(|err| QuoteError::Schema(format!("拼接报价地址失败: {err}")))?;

        let response = self
            .client
            .get(url)
            .query(&request.to_query_params())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuoteError::Unavailable(format!("{status}: {body}")));
        }

        let payload: QuoteResponsePayload = response
            .json()
            .await
            .map_err(|err| QuoteError::Schema(err.to_string()))?;
        if &payload.asset_in != asset_in || &payload.asset_out != asset_out {
            return Err(QuoteError::Schema(format!(
                "报价资产对与请求不符: {} -> {}",
                payload.asset_in, payload.asset_out
            )));
        }

        debug!(
            target: "api::quote",
            asset_in = %payload.asset_in,
            asset_out = %payload.asset_out,
            amount_in = payload.amount_in,
            expected_out = payload.expected_out,
            "报价已返回"
        );

        Ok(Quote {
            asset_in: payload.asset_in,
            asset_out: payload.asset_out,
            amount_in: payload.amount_in,
            expected_out: payload.expected_out,
            obtained_at: Instant::now(),
        })
    }
}
