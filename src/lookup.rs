//! # 选词查询
//!
//! 管线: 规整输入 → 查缓存 → 拼音判定 → 声调规整 → CC-CEDICT
//!       → (未命中) 大模型 → 剔除汉字 → 写缓存
//!
//! 唯一会返回给调用方的错误是空输入；词典缺失、模型超时、模型乱答
//! 都在内部降级处理。

use serde::Serialize;
use thiserror::Error;
use log::{debug, info};

use crate::cache::ResultCache;
use crate::cedict::PronunciationIndex;
use crate::hanzi::{is_pinyin_like, strip_han};
use crate::llm::{self, Generate};
use crate::tone::to_tone_numbers;

/// 选中文本最大长度（字符）
pub const MAX_SELECTION_CHARS: usize = 120;

const DICT_USAGE: &str =
    "Quick dictionary meaning from CC-CEDICT. Select a whole phrase for example sentences.";

// ============================================================
// 数据类型
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionType {
    Pinyin,
    English,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Example {
    pub pinyin: String,
    pub english: String,
}

/// 返回给调用方（也是写入缓存）的查询结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupAnswer {
    pub selection: String,
    pub selection_type: SelectionType,
    pub pinyin: String,
    pub english: String,
    pub usage: String,
    pub examples: Vec<Example>,
}

impl LookupAnswer {
    /// 模型无结果时的固定兜底答案
    pub fn parse_failed(selection: &str) -> Self {
        Self {
            selection: selection.to_string(),
            selection_type: SelectionType::English,
            pinyin: String::new(),
            english: "Model output parse failed.".into(),
            usage: "Try selecting a single word.".into(),
            examples: vec![],
        }
    }

    /// 剔除所有字段（含例句）中的汉字
    pub fn strip_han(&mut self) {
        for s in [&mut self.selection, &mut self.pinyin, &mut self.english, &mut self.usage] {
            *s = strip_han(s);
        }
        for ex in &mut self.examples {
            ex.pinyin = strip_han(&ex.pinyin);
            ex.english = strip_han(&ex.english);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Dictionary,
    Model,
}

/// 一次成功查询
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub answer: LookupAnswer,
    pub cached: bool,
    /// 缓存命中时为 None
    pub source: Option<Source>,
    /// 仅词典命中时有值
    pub alt_senses: Option<usize>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("Empty selection.")]
    EmptySelection,
}

// ============================================================
// Resolver
// ============================================================

pub struct Resolver {
    index: PronunciationIndex,
    cache: ResultCache,
    generator: Box<dyn Generate>,
}

impl Resolver {
    pub fn new(index: PronunciationIndex, cache: ResultCache, generator: Box<dyn Generate>) -> Self {
        info!("[Cache] capacity {}", cache.capacity());
        Self { index, cache, generator }
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub fn resolve(&self, text: &str) -> Result<Resolution, LookupError> {
        let raw = normalize_selection(text);
        if raw.is_empty() {
            return Err(LookupError::EmptySelection);
        }

        let key = raw.to_lowercase();
        if let Some(answer) = self.cache.get(&key) {
            debug!("[Lookup] cache hit {:?}", key);
            return Ok(Resolution { answer, cached: true, source: None, alt_senses: None });
        }

        // 模型调用期间不持有缓存锁：get 与 set 各自加锁
        let (mut answer, source, alt_senses) = match self.from_dictionary(&raw) {
            Some((answer, alt)) => (answer, Source::Dictionary, Some(alt)),
            None => {
                let answer = llm::ask(self.generator.as_ref(), &raw)
                    .unwrap_or_else(|| LookupAnswer::parse_failed(&raw));
                (answer, Source::Model, None)
            }
        };
        debug!("[Lookup] {:?} resolved via {:?}", key, source);

        answer.strip_han();
        self.cache.set(key, answer.clone());

        Ok(Resolution { answer, cached: false, source: Some(source), alt_senses })
    }

    /// 拼音快速通道：命中返回 (答案, 其他义项数)
    fn from_dictionary(&self, raw: &str) -> Option<(LookupAnswer, usize)> {
        if !is_pinyin_like(raw) {
            return None;
        }
        let key = to_tone_numbers(raw)?;
        let gloss = self.index.lookup(&key)?;
        let answer = LookupAnswer {
            selection: raw.to_string(),
            selection_type: SelectionType::Pinyin,
            // 保留用户原本的声调符号
            pinyin: raw.to_string(),
            english: gloss.best.to_string(),
            usage: DICT_USAGE.into(),
            examples: vec![],
        };
        Some((answer, gloss.alt_senses))
    }
}

/// 去首尾空白、换行变空格、截断到 MAX_SELECTION_CHARS
pub fn normalize_selection(text: &str) -> String {
    let flat = text.trim().replace("\r\n", " ").replace(['\n', '\r'], " ");
    let capped: String = flat.trim().chars().take(MAX_SELECTION_CHARS).collect();
    capped.trim_end().to_string()
}

// ============================================================
// 测试
// ============================================================
