//! # 配置管理
//!
//! 从 exe 同目录的 `config.toml` 加载配置（找不到再试当前目录），
//! 环境变量 `CHIMERA_CONFIG` 可指定其他路径。
//! 文件不存在或解析失败时使用默认值。

use log::{info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// 顶层配置
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub dict: DictConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub overrides: OverridesConfig,
}

/// HTTP 服务配置
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 处理请求的工作线程数
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8787 }
fn default_workers() -> usize { 4 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), workers: default_workers() }
    }
}

/// CC-CEDICT 词典配置
#[derive(Debug, Deserialize, Clone)]
pub struct DictConfig {
    #[serde(default = "default_dict_path")]
    pub path: PathBuf,
    /// 单条释义截断长度（字符）
    #[serde(default = "default_max_gloss_chars")]
    pub max_gloss_chars: usize,
}

fn default_dict_path() -> PathBuf { PathBuf::from("cedict_ts.u8") }
fn default_max_gloss_chars() -> usize { crate::cedict::DEFAULT_MAX_GLOSS_CHARS }

impl Default for DictConfig {
    fn default() -> Self {
        Self { path: default_dict_path(), max_gloss_chars: default_max_gloss_chars() }
    }
}

/// 大模型（Ollama）配置
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_url")]
    pub url: String,
    #[serde(default = "default_model_name")]
    pub name: String,
    /// 模型常驻时长，避免每次冷启动
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// 最大输出 token 数
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model_url() -> String { "http://127.0.0.1:11434/api/generate".into() }
fn default_model_name() -> String { "qwen2.5:7b-instruct".into() }
fn default_keep_alive() -> String { "10m".into() }
fn default_temperature() -> f32 { 0.25 }
fn default_top_p() -> f32 { 0.9 }
fn default_num_predict() -> u32 { 180 }
fn default_timeout_secs() -> u64 { 90 }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            url: default_model_url(),
            name: default_model_name(),
            keep_alive: default_keep_alive(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            num_predict: default_num_predict(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// 结果缓存配置
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize { crate::cache::DEFAULT_CAPACITY }

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: default_capacity() }
    }
}

/// 固定读音词组配置
#[derive(Debug, Deserialize, Clone, Default)]
pub struct OverridesConfig {
    /// 词组文件（每行 `词组<TAB>读音`），不配置则使用内置表
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// 加载 config.toml，不存在则用默认值
    pub fn load() -> Self {
        let config_path = Self::config_path();
        let cfg = Self::load_from(&config_path);
        info!("[Config] listen={}:{}, model={}, cache={}, dict={:?}",
            cfg.server.host, cfg.server.port, cfg.model.name, cfg.cache.capacity, cfg.dict.path);
        cfg
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match Self::parse(&text) {
                Ok(cfg) => {
                    info!("[Config] ✅ 已加载 {:?}", path);
                    cfg
                }
                Err(e) => {
                    warn!("[Config] ⚠ 解析失败: {}, 使用默认配置", e);
                    Config::default()
                }
            },
            Err(_) => {
                info!("[Config] ℹ {:?} 不存在, 使用默认配置", path);
                Config::default()
            }
        }
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<Config>(text)
    }

    fn config_path() -> PathBuf {
        if let Some(p) = std::env::var_os("CHIMERA_CONFIG") {
            return PathBuf::from(p);
        }
        resolve_beside_exe(Path::new("config.toml"))
    }
}

/// 相对路径优先解析到 exe 同目录，不存在则退回当前目录
pub fn resolve_beside_exe(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join(path)))
        .filter(|p| p.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg.server.port, 8787);
        assert_eq!(cfg.server.workers, 4);
        assert_eq!(cfg.model.keep_alive, "10m");
        assert_eq!(cfg.model.num_predict, 180);
        assert_eq!(cfg.model.timeout_secs, 90);
        assert_eq!(cfg.cache.capacity, 2000);
        assert_eq!(cfg.dict.max_gloss_chars, 350);
        assert!(cfg.overrides.path.is_none());
    }

    #[test]
    fn test_partial_file() {
        let cfg = Config::parse(r#"
            [server]
            port = 9000

            [model]
            name = "llama3"
            temperature = 0.1

            [overrides]
            path = "phrases.tsv"
        "#).unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.model.name, "llama3");
        assert_eq!(cfg.model.top_p, 0.9);
        assert_eq!(cfg.overrides.path, Some(PathBuf::from("phrases.tsv")));
    }

    #[test]
    fn test_bad_file_falls_back() {
        assert!(Config::parse("[server]\nport = \"nope\"").is_err());
        let cfg = Config::load_from(Path::new("/no/such/config.toml"));
        assert_eq!(cfg.server.port, 8787);
    }
}
