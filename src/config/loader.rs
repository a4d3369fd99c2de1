use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::MagellanConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["magellan.yaml", "config/magellan.yaml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置失败 {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("解析配置失败 {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("钱包密钥处理失败: {message}")]
    Wallet { message: String },
}

/// 加载配置。未指定路径时按默认位置探测，全部缺席则退回默认值。
pub fn load_config(path: Option<PathBuf>) -> Result<MagellanConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            return Ok(config);
        }
    }

    Ok(MagellanConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<MagellanConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: MagellanConfig =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Some(PathBuf::from("/nonexistent/magellan.yaml")));
        // 显式给出的路径不存在时按「未找到」处理，退回默认配置
        assert!(config.is_ok());
    }

    #[test]
    fn malformed_yaml_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "global: [not-a-map").expect("write");
        let err = load_config(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn valid_file_loads() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "bot:\n  dry_run: true").expect("write");
        let config = load_config(Some(file.path().to_path_buf())).expect("load");
        assert!(config.bot.dry_run);
    }
}
