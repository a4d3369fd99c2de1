use std::env;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine as _;
use base64::engine::general_purpose;
use ed25519_consensus::SigningKey;
use tracing::info;
use zeroize::{Zeroize, Zeroizing};

use super::loader::ConfigError;
use super::types::{WalletConfig, WalletKeyEntry};

const MAGIC: &[u8; 8] = b"MGWALLET";
const FORMAT_VERSION: u8 = 1;
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;

pub const ENV_PRIVATE_KEY: &str = "MAGELLAN_PRIVATE_KEY";
pub const ENV_WALLET_PASSWORD: &str = "MAGELLAN_WALLET_PASSWORD";
pub const ENV_WALLET_REMARK: &str = "MAGELLAN_WALLET_REMARK";

/// 解析出签名密钥。优先级：环境变量明文、配置明文、
/// 加密的 wallet_keys 条目（密码经环境变量提供，保持非交互）。
pub fn resolve_signing_key(wallet: &WalletConfig) -> Result<SigningKey, ConfigError> {
    if let Ok(value) = env::var(ENV_PRIVATE_KEY) {
        if !value.trim().is_empty() {
            return parse_signing_key(value.trim()).map_err(|message| ConfigError::Wallet {
                message: format!("环境变量 {ENV_PRIVATE_KEY} 非法: {message}"),
            });
        }
    }

    if !wallet.private_key.trim().is_empty() {
        return parse_signing_key(wallet.private_key.trim()).map_err(|message| {
            ConfigError::Wallet {
                message: format!("配置 global.wallet.private_key 非法: {message}"),
            }
        });
    }

    if wallet.wallet_keys.is_empty() {
        return Err(ConfigError::Wallet {
            message: format!(
                "缺少签名密钥：请配置 global.wallet.wallet_keys 或环境变量 {ENV_PRIVATE_KEY}"
            ),
        });
    }

    let entry = select_entry(&wallet.wallet_keys)?;
    let password = env::var(ENV_WALLET_PASSWORD).map_err(|_| ConfigError::Wallet {
        message: format!("已配置加密私钥，但缺少环境变量 {ENV_WALLET_PASSWORD}"),
    })?;

    let cipher = general_purpose::STANDARD
        .decode(entry.encrypted.trim().as_bytes())
        .map_err(|err| ConfigError::Wallet {
            message: format!("wallet_keys \"{}\" Base64 解码失败: {err}", entry.remark),
        })?;
    let plaintext =
        decrypt_wallet_bytes(&cipher, &password).map_err(|message| ConfigError::Wallet {
            message: format!("wallet_keys \"{}\" 解密失败: {message}", entry.remark),
        })?;
    info!(
        target: "config::wallet",
        remark = %entry.remark,
        "已解密钱包签名密钥"
    );

    parse_signing_key(plaintext.trim()).map_err(|message| ConfigError::Wallet {
        message: format!("wallet_keys \"{}\" 内容非法: {message}", entry.remark),
    })
}

fn select_entry(entries: &[WalletKeyEntry]) -> Result<&WalletKeyEntry, ConfigError> {
    if let Ok(remark) = env::var(ENV_WALLET_REMARK) {
        let trimmed = remark.trim();
        if !trimmed.is_empty() {
            return entries
                .iter()
                .find(|entry| entry.remark.eq_ignore_ascii_case(trimmed))
                .ok_or_else(|| ConfigError::Wallet {
                    message: format!("未找到备注为 \"{trimmed}\" 的 wallet_keys 条目"),
                });
        }
    }

    if entries.len() > 1 {
        return Err(ConfigError::Wallet {
            message: format!(
                "存在 {} 个加密私钥，请用环境变量 {ENV_WALLET_REMARK} 指定备注",
                entries.len()
            ),
        });
    }
    Ok(&entries[0])
}

/// 解析签名密钥字符串：64 位十六进制种子、JSON 字节数组或逗号分隔字节。
pub fn parse_signing_key(raw: &str) -> Result<SigningKey, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("密钥内容为空".to_string());
    }

    let bytes: Vec<u8> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed).map_err(|err| format!("JSON 数组解析失败: {err}"))?
    } else if trimmed.contains(',') {
        trimmed
            .split(',')
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| format!("字节列表解析失败: {err}"))?
    } else {
        hex::decode(trimmed).map_err(|err| format!("十六进制解析失败: {err}"))?
    };

    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("期望 32 字节种子，实际 {} 字节", bytes.len()))?;
    Ok(SigningKey::from(seed))
}

/// 加密一段签名密钥，产出可写入配置的 base64 条目。
pub fn encrypt_entry(plaintext: &str, password: &str) -> Result<String, String> {
    let sealed = encrypt_wallet_key(plaintext.as_bytes(), password)?;
    Ok(general_purpose::STANDARD.encode(sealed))
}

fn encrypt_wallet_key(plaintext: &[u8], password: &str) -> Result<Vec<u8>, String> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let mut encryption_key = derive_encryption_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&encryption_key)
        .map_err(|err| format!("初始化加密器失败: {err}"))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|err| format!("加密钱包私钥失败: {err}"))?;

    encryption_key.zeroize();

    let mut data = Vec::with_capacity(MAGIC.len() + 1 + SALT_SIZE + NONCE_SIZE + ciphertext.len());
    data.extend_from_slice(MAGIC);
    data.push(FORMAT_VERSION);
    data.extend_from_slice(&salt);
    data.extend_from_slice(&nonce);
    data.extend_from_slice(&ciphertext);

    Ok(data)
}

fn decrypt_wallet_bytes(data: &[u8], password: &str) -> Result<Zeroizing<String>, String> {
    let header_len = MAGIC.len() + 1;
    if data.len() < header_len + SALT_SIZE + NONCE_SIZE {
        return Err("wallet_keys 数据格式错误".to_string());
    }

    let (magic, rest) = data.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err("检测到未知格式的 wallet 密文，请重新生成".to_string());
    }

    let version = rest[0];
    if version != FORMAT_VERSION {
        return Err(format!("不支持的 wallet 密文版本: {version}"));
    }

    let rest = &rest[1..];

    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&rest[..SALT_SIZE]);

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&rest[SALT_SIZE..SALT_SIZE + NONCE_SIZE]);

    let ciphertext = &rest[SALT_SIZE + NONCE_SIZE..];

    let mut encryption_key = derive_encryption_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&encryption_key)
        .map_err(|err| format!("初始化解密器失败: {err}"))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext)
        .map_err(|_| "钱包密码错误或数据已损坏".to_string())?;

    encryption_key.zeroize();

    String::from_utf8(plaintext)
        .map(Zeroizing::new)
        .map_err(|err| format!("解析钱包私钥失败: {err}"))
}

fn derive_encryption_key(password: &str, salt: &[u8; SALT_SIZE]) -> Result<[u8; 32], String> {
    let params =
        Params::new(128 * 1024, 3, 4, Some(32)).map_err(|err| format!("Argon2 参数无效: {err}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|err| format!("派生加密密钥失败: {err}"))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_seed() {
        let raw = "11".repeat(32);
        let key = parse_signing_key(&raw).expect("hex seed");
        assert_eq!(key.to_bytes(), [0x11u8; 32]);
    }

    #[test]
    fn parse_json_array_seed() {
        let raw = format!("[{}]", vec!["7"; 32].join(","));
        let key = parse_signing_key(&raw).expect("json seed");
        assert_eq!(key.to_bytes(), [7u8; 32]);
    }

    #[test]
    fn parse_comma_list_seed() {
        let raw = vec!["9"; 32].join(",");
        let key = parse_signing_key(&raw).expect("comma seed");
        assert_eq!(key.to_bytes(), [9u8; 32]);
    }

    #[test]
    fn parse_rejects_wrong_length() {
        assert!(parse_signing_key("1122").is_err());
        assert!(parse_signing_key("").is_err());
    }

    #[test]
    fn encrypt_then_decrypt_round_trip() {
        let secret = "33".repeat(32);
        let sealed = encrypt_wallet_key(secret.as_bytes(), "correct horse").expect("encrypt");
        let opened = decrypt_wallet_bytes(&sealed, "correct horse").expect("decrypt");
        assert_eq!(opened.as_str(), secret);
    }

    #[test]
    fn wrong_password_fails_decryption() {
        let sealed = encrypt_wallet_key(b"secret", "right").expect("encrypt");
        assert!(decrypt_wallet_bytes(&sealed, "wrong").is_err());
    }

    #[test]
    fn encrypted_entry_round_trips_through_base64() {
        let secret = "55".repeat(32);
        let entry = encrypt_entry(&secret, "password").expect("entry");
        let cipher = general_purpose::STANDARD.decode(entry).expect("base64");
        let opened = decrypt_wallet_bytes(&cipher, "password").expect("decrypt");
        let key = parse_signing_key(&opened).expect("key");
        assert_eq!(key.to_bytes(), [0x55u8; 32]);
    }
}
