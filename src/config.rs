use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{AppResult, ConfigError};

/// 程序配置
///
/// 在 `main` 中构造一次，作为显式参数传给每个阶段。
#[derive(Clone, Debug)]
pub struct Config {
    /// OpenAI API 密钥（只有远程调用阶段需要）
    pub api_key: Option<String>,
    /// API 基础 URL
    pub api_base_url: String,
    // --- 请求体参数 ---
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 批处理完成窗口
    pub completion_window: String,
    /// 批处理文件目录（manifest、任务ID、结果文件）
    pub batch_dir: PathBuf,
    /// 日志目录
    pub log_dir: PathBuf,
    /// HTTP 请求超时（秒）
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: "https://api.openai.com/v1".to_string(),
            model_name: "gpt-4.1-mini".to_string(),
            temperature: 0.0,
            max_tokens: 2000,
            completion_window: "24h".to_string(),
            batch_dir: PathBuf::from("batchfiles"),
            log_dir: PathBuf::from("logs"),
            http_timeout_secs: 120,
        }
    }
}

impl Config {
    /// 加载 dotenv 文件后从环境变量读取配置
    ///
    /// # 参数
    /// - `env_file`: 显式指定的 dotenv 文件；为 `None` 时尝试当前目录的 `.env`
    pub fn from_env(env_file: Option<&Path>) -> AppResult<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|source| ConfigError::EnvFileFailed {
                    path: path.display().to_string(),
                    source,
                })?;
                debug!("已加载环境变量文件: {}", path.display());
            }
            None => {
                if let Ok(path) = dotenvy::dotenv() {
                    debug!("已加载环境变量文件: {}", path.display());
                }
            }
        }

        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 从任意键值来源读取配置，缺省值取自 `Default`
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        Ok(Self {
            api_key: lookup("OPENAI_API_KEY").filter(|v| !v.trim().is_empty()),
            api_base_url: lookup("OPENAI_BASE_URL").unwrap_or(default.api_base_url),
            model_name: lookup("OPENAI_MODEL").unwrap_or(default.model_name),
            temperature: parse_var(&lookup, "OPENAI_TEMPERATURE", "f32")?
                .unwrap_or(default.temperature),
            max_tokens: parse_var(&lookup, "OPENAI_MAX_TOKENS", "u32")?
                .unwrap_or(default.max_tokens),
            completion_window: lookup("BATCH_COMPLETION_WINDOW")
                .unwrap_or(default.completion_window),
            batch_dir: lookup("BATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.batch_dir),
            log_dir: lookup("LOG_DIR").map(PathBuf::from).unwrap_or(default.log_dir),
            http_timeout_secs: parse_var(&lookup, "HTTP_TIMEOUT_SECS", "u64")?
                .unwrap_or(default.http_timeout_secs),
        })
    }

    /// 获取 API 密钥，缺失时返回配置错误
    pub fn require_api_key(&self) -> AppResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            ConfigError::EnvVarNotFound {
                var_name: "OPENAI_API_KEY".to_string(),
            }
            .into()
        })
    }

    /// 将相对路径解析到批处理目录下，绝对路径保持不变
    pub fn batch_path(&self, name: impl AsRef<Path>) -> PathBuf {
        let name = name.as_ref();
        if name.is_absolute() {
            name.to_path_buf()
        } else {
            self.batch_dir.join(name)
        }
    }
}

fn parse_var<F, T>(lookup: &F, var_name: &str, expected_type: &str) -> AppResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var_name) {
        None => Ok(None),
        Some(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
            ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }
            .into()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.model_name, "gpt-4.1-mini");
        assert_eq!(config.max_tokens, 2000);
        assert_eq!(config.completion_window, "24h");
        assert!(config.api_key.is_none());
        assert!(config.require_api_key().unwrap_err().is_config());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_TEMPERATURE", "0.5"),
            ("BATCH_DIR", "/tmp/batches"),
        ]))
        .unwrap();
        assert_eq!(config.require_api_key().unwrap(), "sk-test");
        assert_eq!(config.temperature, 0.5);
        assert_eq!(config.batch_path("m.json"), PathBuf::from("/tmp/batches/m.json"));
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let config = Config::from_lookup(lookup_from(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_unparseable_number_is_config_error() {
        let err = Config::from_lookup(lookup_from(&[("OPENAI_MAX_TOKENS", "lots")])).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("OPENAI_MAX_TOKENS"));
    }
}
