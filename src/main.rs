//! # Chimera — 拼音选词查询 + 汉字转拼音本地服务
//!
//! 启动顺序：配置 → CC-CEDICT 索引 → 固定读音词组 → 分词器 → HTTP 服务。
//! 索引与词组表启动后只读；结果缓存是唯一的共享可变状态。

mod cache;
mod cedict;
mod config;
mod hanzi;
mod llm;
mod lookup;
mod overrides;
mod server;
mod tone;
mod transliterate;

use std::sync::Arc;

use anyhow::Result;
use log::info;

use crate::cache::ResultCache;
use crate::cedict::PronunciationIndex;
use crate::config::{resolve_beside_exe, Config};
use crate::llm::OllamaClient;
use crate::lookup::Resolver;
use crate::overrides::PhraseOverrides;
use crate::server::AppState;
use crate::transliterate::Transliterator;

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    info!("Chimera v{}", env!("CARGO_PKG_VERSION"));

    let cfg = Config::load();

    let dict_path = resolve_beside_exe(&cfg.dict.path);
    let index = PronunciationIndex::load(&dict_path, cfg.dict.max_gloss_chars)?;
    if index.is_empty() {
        info!("[Dict] dictionary unavailable, every lookup goes to {}", cfg.model.name);
    }

    let overrides_path = cfg.overrides.path.as_deref().map(resolve_beside_exe);
    let overrides = PhraseOverrides::load(overrides_path.as_deref())?;

    let start = std::time::Instant::now();
    let transliterator = Transliterator::new(overrides);
    info!("[Pinyin] segmenter ready in {:?}", start.elapsed());

    let resolver = Resolver::new(
        index,
        ResultCache::new(cfg.cache.capacity),
        Box::new(OllamaClient::new(&cfg.model)),
    );

    let state = Arc::new(AppState { resolver, transliterator });
    server::serve(&cfg.server, state)
}
