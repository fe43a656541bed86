//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MEMOBOT__*` 覆盖（双下划线表示嵌套，如 `MEMOBOT__BOT__CHUNK_SIZE=1500`）。
//! 密钥（Discord Token、模型 API Key）只从环境变量读取，见 [`Secrets::from_env`]。

use std::path::PathBuf;

use serde::Deserialize;

use crate::bot::DEFAULT_CHUNK_SIZE;
use crate::core::BotError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub bot: BotSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub memory: MemorySection,
}

/// debug 关键字的匹配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DebugMatch {
    /// 消息任意位置包含关键字即触发
    #[default]
    Substring,
    /// 去掉 @ 提及后以关键字开头才触发
    Prefix,
}

/// [bot] 段：人设文件、debug 关键字、分片大小、对用户展示的固定文案
#[derive(Debug, Clone, Deserialize)]
pub struct BotSection {
    pub persona_path: Option<PathBuf>,
    #[serde(default = "default_debug_keyword")]
    pub debug_keyword: String,
    #[serde(default)]
    pub debug_match: DebugMatch,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_failure_message")]
    pub failure_message: String,
    #[serde(default = "default_structured_label")]
    pub structured_label: String,
    /// 记忆为空时 debug 回复的占位文案（平台不接受空消息）
    #[serde(default = "default_empty_memory_notice")]
    pub empty_memory_notice: String,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            persona_path: None,
            debug_keyword: default_debug_keyword(),
            debug_match: DebugMatch::default(),
            chunk_size: default_chunk_size(),
            failure_message: default_failure_message(),
            structured_label: default_structured_label(),
            empty_memory_notice: default_empty_memory_notice(),
        }
    }
}

fn default_debug_keyword() -> String {
    "debug".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_failure_message() -> String {
    "うーん、何かエラーが発生したみたい...".to_string()
}

fn default_structured_label() -> String {
    "レスポンスが配列だったよ〜".to_string()
}

fn default_empty_memory_notice() -> String {
    "(no memory yet)".to_string()
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：gemini / openai
    #[serde(default = "default_provider")]
    pub provider: String,
    /// 为空时使用后端默认模型
    #[serde(default)]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: String::new(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次模型请求超时（秒），0 表示不限
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [memory] 段：备份目录与文件名前缀
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySection {
    #[serde(default = "default_backup_enabled")]
    pub backup_enabled: bool,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
    #[serde(default = "default_backup_prefix")]
    pub backup_prefix: String,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            backup_enabled: default_backup_enabled(),
            backup_dir: default_backup_dir(),
            backup_prefix: default_backup_prefix(),
        }
    }
}

fn default_backup_enabled() -> bool {
    true
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_backup_prefix() -> String {
    crate::memory::backup::DEFAULT_BACKUP_PREFIX.to_string()
}

/// 从 config 目录加载配置，环境变量 MEMOBOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MEMOBOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MEMOBOT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 启动必需的密钥；缺失即致命错误
#[derive(Clone)]
pub struct Secrets {
    pub discord_token: String,
    pub model_api_key: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets").finish_non_exhaustive()
    }
}

impl Secrets {
    /// 读取 DISCORD_TOKEN 与模型 API Key（gemini 用 GEMINI_API_KEY，openai 用 OPENAI_API_KEY）
    pub fn from_env(provider: &str) -> Result<Self, BotError> {
        Self::from_lookup(provider, |k| std::env::var(k).ok())
    }

    fn from_lookup(
        provider: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, BotError> {
        let require = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(BotError::MissingSecret(key))
        };

        let discord_token = require("DISCORD_TOKEN")?;
        let model_api_key = match provider {
            "openai" => require("OPENAI_API_KEY")?,
            _ => require("GEMINI_API_KEY")?,
        };
        Ok(Self {
            discord_token,
            model_api_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.bot.debug_keyword, "debug");
        assert_eq!(cfg.bot.debug_match, DebugMatch::Substring);
        assert_eq!(cfg.bot.chunk_size, 1750);
        assert_eq!(cfg.llm.provider, "gemini");
        assert_eq!(cfg.llm.timeouts.request, 60);
        assert_eq!(cfg.memory.backup_prefix, "backup_");
        assert!(cfg.memory.backup_enabled);
    }

    #[test]
    fn test_load_explicit_file_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("custom.toml");
        std::fs::write(
            &path,
            "[bot]\ndebug_match = \"prefix\"\nchunk_size = 100\n\n[memory]\nbackup_dir = \"/var/memobot\"\n",
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.bot.debug_match, DebugMatch::Prefix);
        assert_eq!(cfg.bot.chunk_size, 100);
        assert_eq!(cfg.memory.backup_dir, PathBuf::from("/var/memobot"));
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_secrets_present() {
        let s = Secrets::from_lookup(
            "gemini",
            lookup(&[("DISCORD_TOKEN", "t"), ("GEMINI_API_KEY", "g")]),
        )
        .unwrap();
        assert_eq!(s.discord_token, "t");
        assert_eq!(s.model_api_key, "g");
    }

    #[test]
    fn test_missing_secrets_are_fatal() {
        let err = Secrets::from_lookup("gemini", lookup(&[("GEMINI_API_KEY", "g")])).unwrap_err();
        assert!(matches!(err, BotError::MissingSecret("DISCORD_TOKEN")));

        let err = Secrets::from_lookup(
            "openai",
            lookup(&[("DISCORD_TOKEN", "t"), ("GEMINI_API_KEY", "g")]),
        )
        .unwrap_err();
        assert!(matches!(err, BotError::MissingSecret("OPENAI_API_KEY")));

        let err =
            Secrets::from_lookup("gemini", lookup(&[("DISCORD_TOKEN", " "), ("GEMINI_API_KEY", "g")]))
                .unwrap_err();
        assert!(matches!(err, BotError::MissingSecret("DISCORD_TOKEN")));
    }
}
