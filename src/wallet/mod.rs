use std::sync::Arc;

use dashmap::DashMap;
use ed25519_consensus::VerificationKey;
use pallas_addresses::{Address, Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart};
use pallas_crypto::hash::Hasher;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::chain::{ChainContext, ChainError};
use crate::tx::Utxo;

/// 一次组合所依据的钱包快照：所有者地址与当时可花费的输出集合。
/// 快照只在持有钱包锁的前提下有效，提交成功或放弃本次尝试后作废。
#[derive(Debug, Clone)]
pub struct WalletContext {
    pub owner: Address,
    pub utxos: Vec<Utxo>,
}

/// 钱包状态访问入口。UTXO 集合是并发 swap 之间共享的可变状态，
/// 通过每钱包一把的互斥锁把「选币到提交」串行化，避免两次并发
/// 组合选中同一个 UTXO。
pub struct WalletManager {
    chain: Arc<dyn ChainContext>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl WalletManager {
    pub fn new(chain: Arc<dyn ChainContext>) -> Self {
        Self {
            chain,
            locks: DashMap::new(),
        }
    }

    /// 获取钱包的排他锁。锁的粒度是 bech32 地址。
    pub async fn lock(&self, owner: &Address) -> Result<OwnedMutexGuard<()>, ChainError> {
        let key = owner
            .to_bech32()
            .map_err(|err| ChainError::Schema(format!("地址编码失败: {err}")))?;
        let mutex = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        Ok(mutex.lock_owned().await)
    }

    /// 拉取钱包当前的 UTXO 快照。
    pub async fn snapshot(&self, owner: &Address) -> Result<WalletContext, ChainError> {
        let utxos = self.chain.list_utxos(owner).await?;
        debug!(
            target: "wallet",
            count = utxos.len(),
            "钱包快照已更新"
        );
        Ok(WalletContext {
            owner: owner.clone(),
            utxos,
        })
    }
}

/// 由验证公钥推导仅含支付凭据的 Shelley 地址。
pub fn derive_address(vkey: &VerificationKey, network: Network) -> Address {
    let key_hash = Hasher::<224>::hash(&vkey.to_bytes());
    Address::Shelley(ShelleyAddress::new(
        network,
        ShelleyPaymentPart::Key(key_hash),
        ShelleyDelegationPart::Null,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_consensus::SigningKey;

    #[test]
    fn derived_address_is_shelley_payment_key() {
        let key = SigningKey::from([3u8; 32]);
        let address = derive_address(&key.verification_key(), Network::Mainnet);
        match &address {
            Address::Shelley(shelley) => {
                assert!(matches!(shelley.payment(), ShelleyPaymentPart::Key(_)));
                assert!(matches!(shelley.delegation(), ShelleyDelegationPart::Null));
            }
            other => panic!("expected shelley address, got {other:?}"),
        }
        assert!(address.to_bech32().expect("bech32").starts_with("addr1"));
    }

    #[test]
    fn derivation_is_deterministic() {
        let key = SigningKey::from([5u8; 32]);
        let first = derive_address(&key.verification_key(), Network::Mainnet);
        let second = derive_address(&key.verification_key(), Network::Mainnet);
        assert_eq!(first.to_vec(), second.to_vec());
    }
}
