use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ed25519_consensus::{Signature, SigningKey, VerificationKey};
use pallas_addresses::Address;
use pallas_codec::minicbor::Encoder;
use pallas_codec::minicbor::encode::Error as EncodeError;
use pallas_crypto::hash::{Hash, Hasher};

use crate::asset::AssetValue;

/// 指向某笔交易第 index 个输出的引用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputRef {
    pub tx_hash: Hash<32>,
    pub index: u64,
}

impl OutputRef {
    pub fn new(tx_hash: Hash<32>, index: u64) -> Self {
        Self { tx_hash, index }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.index)
    }
}

impl FromStr for OutputRef {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (hash_hex, index) = raw
            .split_once('#')
            .ok_or_else(|| format!("output ref 缺少 # 分隔符: {raw}"))?;
        let tx_hash =
            Hash::<32>::from_str(hash_hex).map_err(|err| format!("tx hash 非法 {hash_hex}: {err}"))?;
        let index = index
            .parse::<u64>()
            .map_err(|err| format!("output index 非法 {index}: {err}"))?;
        Ok(Self { tx_hash, index })
    }
}

/// 钱包可花费的一个未消费输出。观测后不可变，只能整体花费。
#[derive(Debug, Clone)]
pub struct Utxo {
    pub reference: OutputRef,
    pub value: AssetValue,
    pub address: Address,
}

/// 交易输出：地址、价值以及可选的 datum hash。
#[derive(Debug, Clone)]
pub struct TxOutput {
    pub address: Address,
    pub value: AssetValue,
    pub datum_hash: Option<Hash<32>>,
}

impl TxOutput {
    pub fn new(address: Address, value: AssetValue) -> Self {
        Self {
            address,
            value,
            datum_hash: None,
        }
    }

    pub fn with_datum_hash(mut self, hash: Hash<32>) -> Self {
        self.datum_hash = Some(hash);
        self
    }
}

/// 未签名交易。输入与输出的顺序即编码顺序，组装方负责确定性排序。
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub inputs: Vec<OutputRef>,
    pub outputs: Vec<TxOutput>,
    /// 网络手续费，单位 lovelace。
    pub fee: u64,
    /// 随交易一起提交的 datum 原文，与输出中的 hash 对应。
    pub datums: Vec<Vec<u8>>,
}

impl UnsignedTransaction {
    /// 交易体的确定性 CBOR 编码。相同内容编码出的字节完全一致。
    pub fn body_bytes(&self) -> Vec<u8> {
        let mut enc = Encoder::new(Vec::new());
        self.write_body(&mut enc)
            .expect("CBOR body 写入 Vec 不会失败");
        enc.into_writer()
    }

    /// 交易标识：交易体的 blake2b-256 哈希。
    pub fn id(&self) -> Hash<32> {
        Hasher::<256>::hash(&self.body_bytes())
    }

    pub fn fee_value(&self) -> AssetValue {
        AssetValue::lovelace(self.fee)
    }

    fn write_body(
        &self,
        enc: &mut Encoder<Vec<u8>>,
    ) -> Result<(), EncodeError<std::convert::Infallible>> {
        enc.map(3)?;

        enc.u8(0)?;
        enc.array(self.inputs.len() as u64)?;
        for input in &self.inputs {
            enc.array(2)?;
            enc.bytes(input.tx_hash.as_ref())?;
            enc.u64(input.index)?;
        }

        enc.u8(1)?;
        enc.array(self.outputs.len() as u64)?;
        for output in &self.outputs {
            let arity = if output.datum_hash.is_some() { 3 } else { 2 };
            enc.array(arity)?;
            enc.bytes(&output.address.to_vec())?;
            write_value(enc, &output.value)?;
            if let Some(hash) = &output.datum_hash {
                enc.bytes(hash.as_ref())?;
            }
        }

        enc.u8(2)?;
        enc.u64(self.fee)?;
        Ok(())
    }
}

/// 价值编码：纯 lovelace 编码为整数，含代币时编码为
/// `[coin, { policy => { name => qty } }]`，映射按键排序保证确定性。
fn write_value(
    enc: &mut Encoder<Vec<u8>>,
    value: &AssetValue,
) -> Result<(), EncodeError<std::convert::Infallible>> {
    let mut bundles: BTreeMap<&Hash<28>, BTreeMap<&[u8], u64>> = BTreeMap::new();
    for (policy, name, qty) in value.tokens() {
        bundles.entry(policy).or_default().insert(name, qty);
    }

    if bundles.is_empty() {
        enc.u64(value.lovelace_amount())?;
        return Ok(());
    }

    enc.array(2)?;
    enc.u64(value.lovelace_amount())?;
    enc.map(bundles.len() as u64)?;
    for (policy, names) in bundles {
        enc.bytes(policy.as_ref())?;
        enc.map(names.len() as u64)?;
        for (name, qty) in names {
            enc.bytes(name)?;
            enc.u64(qty)?;
        }
    }
    Ok(())
}

/// 单把密钥的见证：验证公钥与对交易标识的 ed25519 签名。
#[derive(Debug, Clone)]
pub struct VKeyWitness {
    pub vkey: [u8; 32],
    pub signature: [u8; 64],
}

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub transaction: UnsignedTransaction,
    pub witnesses: Vec<VKeyWitness>,
}

impl SignedTransaction {
    pub fn id(&self) -> Hash<32> {
        self.transaction.id()
    }

    /// 完整交易的 CBOR 编码：交易体、见证集与 datum 原文。
    pub fn bytes(&self) -> Vec<u8> {
        let mut enc = Encoder::new(Vec::new());
        self.write(&mut enc).expect("CBOR 写入 Vec 不会失败");
        enc.into_writer()
    }

    fn write(
        &self,
        enc: &mut Encoder<Vec<u8>>,
    ) -> Result<(), EncodeError<std::convert::Infallible>> {
        enc.map(3)?;

        enc.u8(0)?;
        self.transaction.write_body(enc)?;

        enc.u8(1)?;
        enc.map(1)?;
        enc.u8(0)?;
        enc.array(self.witnesses.len() as u64)?;
        for witness in &self.witnesses {
            enc.array(2)?;
            enc.bytes(&witness.vkey)?;
            enc.bytes(&witness.signature)?;
        }

        enc.u8(2)?;
        enc.array(self.transaction.datums.len() as u64)?;
        for datum in &self.transaction.datums {
            enc.bytes(datum)?;
        }
        Ok(())
    }
}

/// 用钱包私钥对交易签名。除签名方案本身外不引入任何随机性，
/// 相同输入得到相同签名。
pub fn sign(transaction: UnsignedTransaction, key: &SigningKey) -> SignedTransaction {
    let id = transaction.id();
    let signature: Signature = key.sign(id.as_ref());
    let vkey: VerificationKey = key.verification_key();
    SignedTransaction {
        transaction,
        witnesses: vec![VKeyWitness {
            vkey: vkey.to_bytes(),
            signature: signature.to_bytes(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetId;

    fn test_address() -> Address {
        Address::from_bech32(
            "addr1z8snz7c4974vzdpxu65ruphl3zjdvtxw8strf2c2tmqnxz2j2c79gy9l76sdg0xwhd7r0c0kna0tycz4y5s6mlenh8pq0xmsha",
        )
        .expect("bech32 address")
    }

    fn sample_transaction(fee: u64) -> UnsignedTransaction {
        let input = OutputRef::new(Hasher::<256>::hash(b"genesis"), 0);
        let output = TxOutput::new(test_address(), AssetValue::lovelace(5_000_000));
        UnsignedTransaction {
            inputs: vec![input],
            outputs: vec![output],
            fee,
            datums: Vec::new(),
        }
    }

    #[test]
    fn output_ref_parse_round_trip() {
        let reference = OutputRef::new(Hasher::<256>::hash(b"tx"), 3);
        let parsed: OutputRef = reference.to_string().parse().expect("parse");
        assert_eq!(parsed, reference);
    }

    #[test]
    fn body_encoding_is_deterministic() {
        let tx = sample_transaction(170_000);
        assert_eq!(tx.body_bytes(), tx.body_bytes());
        assert_eq!(tx.id(), tx.id());
    }

    #[test]
    fn fee_changes_transaction_id() {
        let a = sample_transaction(170_000);
        let b = sample_transaction(170_001);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn multiasset_value_changes_encoding() {
        let mut tx = sample_transaction(170_000);
        let plain = tx.body_bytes();
        let policy = Hasher::<224>::hash(b"policy");
        tx.outputs[0]
            .value
            .set(AssetId::token(policy, b"MIN".to_vec()), 42);
        assert_ne!(tx.body_bytes(), plain);
    }

    #[test]
    fn signature_verifies_against_transaction_id() {
        let key = SigningKey::from([7u8; 32]);
        let tx = sample_transaction(170_000);
        let id = tx.id();
        let signed = sign(tx, &key);
        assert_eq!(signed.witnesses.len(), 1);

        let vkey = VerificationKey::try_from(signed.witnesses[0].vkey).expect("vkey");
        let signature = Signature::from(signed.witnesses[0].signature);
        vkey.verify(&signature, id.as_ref()).expect("valid signature");
    }

    #[test]
    fn signing_is_deterministic() {
        let key = SigningKey::from([9u8; 32]);
        let first = sign(sample_transaction(170_000), &key);
        let second = sign(sample_transaction(170_000), &key);
        assert_eq!(first.bytes(), second.bytes());
    }
}
