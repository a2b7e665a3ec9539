//! # CC-CEDICT 读音索引
//!
//! 启动时一次性读取 `cedict_ts.u8`，建立 数字声调读音 → 释义列表 的索引，
//! 之后只读。
//!
//! 行格式: `繁體 简体 [pin1 yin1] /gloss 1/gloss 2/`
//!
//! 同音词按文件顺序追加，第一条视为最佳释义，其余计入 alt_senses。
//! 文件不存在时索引为空，查询恒返回 None（交给大模型兜底）。

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use log::{info, warn};
use regex::Regex;

use crate::tone::collapse_whitespace;

fn line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\S+)\s+(\S+)\s+\[([^\]]+)\]\s+/(.+)/\s*$").expect("cedict line regex")
    })
}

fn tone_boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d)([a-zü])").expect("tone boundary regex"))
}

/// 一次查询命中的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Gloss<'a> {
    /// 第一条释义
    pub best: &'a str,
    /// 同一读音下的其他义项数
    pub alt_senses: usize,
}

pub struct PronunciationIndex {
    entries: HashMap<String, Vec<String>>,
    max_gloss_chars: usize,
}

impl PronunciationIndex {
    pub fn empty() -> Self {
        Self { entries: HashMap::new(), max_gloss_chars: DEFAULT_MAX_GLOSS_CHARS }
    }

    pub fn from_text(text: &str, max_gloss_chars: usize) -> Self {
        let mut index = Self { entries: HashMap::new(), max_gloss_chars };
        for line in text.lines() {
            index.insert_line(line);
        }
        index
    }

    /// 读取词典文件；文件不存在不算错误，返回空索引
    pub fn load(path: &Path, max_gloss_chars: usize) -> Result<Self> {
        if !path.exists() {
            warn!("[Dict] {:?} not found, lookup will defer to the model", path);
            return Ok(Self::empty());
        }
        let start = std::time::Instant::now();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading dictionary {:?}", path))?;
        let index = Self::from_text(&text, max_gloss_chars);
        info!("[Dict] {} 个读音键, {} 条释义, {:?}",
            index.len(), index.sense_count(), start.elapsed());
        Ok(index)
    }

    fn insert_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return;
        }
        let Some(caps) = line_re().captures(line) else { return };

        let key = normalize_key(&caps[3]);
        let gloss = clean_gloss(caps[4].trim(), self.max_gloss_chars);
        if key.is_empty() || gloss.is_empty() {
            return;
        }
        self.entries.entry(key).or_default().push(gloss);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 读音键数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn sense_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// 三级回退查询，先命中者为准：
    /// 1. 原样匹配
    /// 2. 去掉所有空格（连写的音节）
    /// 3. 键内无空格时，在"声调数字 + 字母"之间补空格再查
    pub fn lookup(&self, key: &str) -> Option<Gloss<'_>> {
        if self.entries.is_empty() {
            return None;
        }
        let k = key.trim().to_lowercase();
        if k.is_empty() {
            return None;
        }

        let senses = self.entries.get(&k)
            .or_else(|| self.entries.get(&k.replace(' ', "")))
            .or_else(|| {
                if k.contains(' ') {
                    return None;
                }
                let spaced = tone_boundary_re().replace_all(&k, "$1 $2");
                self.entries.get(&collapse_whitespace(&spaced))
            })?;

        let best = senses.first()?;
        Some(Gloss { best, alt_senses: senses.len().saturating_sub(1) })
    }
}

pub const DEFAULT_MAX_GLOSS_CHARS: usize = 350;

/// `Lu:4` → `lü4`，空白折叠
fn normalize_key(raw: &str) -> String {
    collapse_whitespace(&raw.trim().to_lowercase().replace("u:", "ü"))
}

/// `/` 分隔改成 `; `，折叠多余空白，去掉首尾的空格与分号，截断到 max_chars
fn clean_gloss(defs: &str, max_chars: usize) -> String {
    let joined = defs.replace('/', "; ");
    let collapsed = collapse_whitespace(&joined);
    collapsed
        .trim_matches(|c| c == ' ' || c == ';')
        .chars()
        .take(max_chars)
        .collect()
}

// ============================================================
// 测试
// ============================================================
