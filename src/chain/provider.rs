use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose;
use pallas_addresses::Address;
use pallas_crypto::hash::Hash;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::asset::{AssetId, AssetValue};
use crate::tx::{OutputRef, SignedTransaction, Utxo};

use super::{ChainContext, ChainError, ProtocolParams, SubmitError};

/// 通过链网关的 HTTP 接口实现链上下文：查 UTXO、读协议参数、提交交易。
#[derive(Clone)]
pub struct HttpChainProvider {
    client: reqwest::Client,
    base: Url,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UtxoPayload {
    tx_hash: String,
    index: u64,
    /// 资产标识到数量的映射，数量按字符串传输避免精度丢失。
    value: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    cbor: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    tx_hash: String,
}

impl HttpChainProvider {
    pub fn new(client: reqwest::Client, mut base: Url) -> Self {
        // Url::join 以 / 结尾才会把相对路径接在后面
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Self { client, base }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ChainError> {
        self.base
            .join(path)
            .map_err(|err| ChainError::Schema(format!("拼接链网关地址失败 {path}: {err}")))
    }

    fn parse_utxo(payload: UtxoPayload, address: &Address) -> Result<Utxo, ChainError> {
        let tx_hash = Hash::<32>::from_str(&payload.tx_hash)
            .map_err(|err| ChainError::Schema(format!("tx hash 非法 {}: {err}", payload.tx_hash)))?;
        let mut value = AssetValue::new();
        for (asset_raw, quantity_raw) in payload.value {
            let asset: AssetId = asset_raw
                .parse()
                .map_err(|err| ChainError::Schema(format!("资产标识非法: {err}")))?;
            let quantity = quantity_raw.parse::<u64>().map_err(|err| {
                ChainError::Schema(format!("资产数量非法 {quantity_raw}: {err}"))
            })?;
            value.set(asset, quantity);
        }
        Ok(Utxo {
            reference: OutputRef::new(tx_hash, payload.index),
            value,
            address: address.clone(),
        })
    }
}

#[async_trait]
impl ChainContext for HttpChainProvider {
    async fn list_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ChainError> {
        let bech32 = address
            .to_bech32()
            .map_err(|err| ChainError::Schema(format!("地址编码失败: {err}")))?;
        let url = self.endpoint(&format!("v1/addresses/{bech32}/utxos"))?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let payloads: Vec<UtxoPayload> = response.json().await?;
        let utxos = payloads
            .into_iter()
            .map(|payload| Self::parse_utxo(payload, address))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            target: "chain::provider",
            address = %bech32,
            count = utxos.len(),
            "已拉取钱包 UTXO 集合"
        );
        Ok(utxos)
    }

    async fn protocol_params(&self) -> Result<ProtocolParams, ChainError> {
        let url = self.endpoint("v1/protocol-params")?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChainError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    async fn submit(&self, transaction: &SignedTransaction) -> Result<Hash<32>, SubmitError> {
        let url = self
            .endpoint("v1/submit")
            .map_err(|err| SubmitError::Rejected(err.to_string()))?;
        let request = SubmitRequest {
            cbor: general_purpose::STANDARD.encode(transaction.bytes()),
        };

        let response = match self.client.post(url).json(&request).send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return Err(SubmitError::Timeout(err.to_string()));
            }
            Err(err) => return Err(SubmitError::Network(err)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // 节点对已被消费输入的拒绝会指名 BadInputsUTxO
            if status.as_u16() == 409 || body.contains("BadInputsUTxO") {
                return Err(SubmitError::InputsConsumed(body));
            }
            return Err(SubmitError::Rejected(format!("{status}: {body}")));
        }

        let payload: SubmitResponse = response
            .json()
            .await
            .map_err(|err| SubmitError::Rejected(format!("提交响应格式非法: {err}")))?;
        let tx_hash = Hash::<32>::from_str(&payload.tx_hash)
            .map_err(|err| SubmitError::Rejected(format!("提交响应 tx hash 非法: {err}")))?;
        info!(
            target: "chain::provider",
            tx_hash = %tx_hash,
            "交易已提交至链网关"
        );
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let provider = HttpChainProvider::new(
            reqwest::Client::new(),
            Url::parse("http://localhost:3100/api").expect("url"),
        );
        let endpoint = provider.endpoint("v1/protocol-params").expect("endpoint");
        assert_eq!(endpoint.path(), "/api/v1/protocol-params");
    }

    #[test]
    fn utxo_payload_parses_multiasset_value() {
        let address = Address::from_bech32(
            "addr1z8snz7c4974vzdpxu65ruphl3zjdvtxw8strf2c2tmqnxz2j2c79gy9l76sdg0xwhd7r0c0kna0tycz4y5s6mlenh8pq0xmsha",
        )
        .expect("bech32 address");
        let payload: UtxoPayload = serde_json::from_str(
            r#"{
                "txHash": "0000000000000000000000000000000000000000000000000000000000000001",
                "index": 2,
                "value": {
                    "lovelace": "50000000",
                    "e16c2dc8ae937e8d3790c7fd7168d7b994621ba14ca11415f39fed72.4d494e": "7"
                }
            }"#,
        )
        .expect("payload json");
        let utxo = HttpChainProvider::parse_utxo(payload, &address).expect("utxo");
        assert_eq!(utxo.reference.index, 2);
        assert_eq!(utxo.value.lovelace_amount(), 50_000_000);
        assert_eq!(utxo.value.iter().count(), 2);
    }

    #[test]
    fn utxo_payload_rejects_bad_quantity() {
        let address = Address::from_bech32(
            "addr1z8snz7c4974vzdpxu65ruphl3zjdvtxw8strf2c2tmqnxz2j2c79gy9l76sdg0xwhd7r0c0kna0tycz4y5s6mlenh8pq0xmsha",
        )
        .expect("bech32 address");
        let payload: UtxoPayload = serde_json::from_str(
            r#"{
                "txHash": "0000000000000000000000000000000000000000000000000000000000000001",
                "index": 0,
                "value": { "lovelace": "-5" }
            }"#,
        )
        .expect("payload json");
        assert!(HttpChainProvider::parse_utxo(payload, &address).is_err());
    }
}
