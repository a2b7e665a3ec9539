//! # 固定读音词组
//!
//! 分词和逐字注音容易读错的词组（多音字、专名），在注音前整体替换成固定读音。
//!
//! 不往文本里插入占位标记，而是按字符区间"认领"：
//! 长词优先，已被认领的字不能再被短词覆盖。
//!
//! 文件格式: 每行 `词组<TAB>读音`（也接受英文逗号），`#` 开头为注释。

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

/// 一行文本切成的片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece<'a> {
    /// 未被认领的原文，交给分词 + 注音
    Free(&'a str),
    /// 被认领的词组，直接输出固定读音
    Fixed(&'a str),
}

pub struct PhraseOverrides {
    /// (词组, 读音)，按字符数降序
    phrases: Vec<(String, String)>,
}

impl PhraseOverrides {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map: HashMap<String, String> = HashMap::new();
        for (phrase, reading) in pairs {
            let phrase = phrase.into().trim().to_string();
            let reading = reading.into().trim().to_string();
            if phrase.is_empty() || reading.is_empty() {
                continue;
            }
            map.insert(phrase, reading);
        }

        let mut phrases: Vec<(String, String)> = map.into_iter().collect();
        phrases.sort_by(|a, b| {
            b.0.chars().count().cmp(&a.0.chars().count()).then_with(|| a.0.cmp(&b.0))
        });
        Self { phrases }
    }

    pub fn from_text(text: &str) -> Self {
        let pairs = text.lines().filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            line.split_once('\t').or_else(|| line.split_once(','))
        });
        Self::from_pairs(pairs)
    }

    /// 读取词组文件；未配置时使用内置表
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let table = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading phrase overrides {:?}", path))?;
                let table = Self::from_text(&text);
                info!("[Overrides] {} 个词组 {:?}", table.len(), path);
                table
            }
            None => {
                let table = Self::default();
                info!("[Overrides] builtin table, {} 个词组", table.len());
                table
            }
        };
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// 按长词优先认领区间，把一行切成 Free / Fixed 片段
    pub fn split_protected<'a>(&'a self, line: &'a str) -> Vec<Piece<'a>> {
        if self.is_empty() || line.is_empty() {
            return vec![Piece::Free(line)];
        }

        // 字符序号 → 字节偏移（末尾多一个 line.len()）
        let offsets: Vec<usize> = line.char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(line.len()))
            .collect();
        let n_chars = offsets.len() - 1;
        let mut claimed = vec![false; n_chars];
        // (起始字, 结束字, 词组序号)
        let mut spans: Vec<(usize, usize, usize)> = Vec::new();

        for (pi, (phrase, _)) in self.phrases.iter().enumerate() {
            let len = phrase.chars().count();
            let mut i = 0;
            while i + len <= n_chars {
                let hit = line[offsets[i]..].starts_with(phrase.as_str())
                    && !claimed[i..i + len].iter().any(|&c| c);
                if hit {
                    claimed[i..i + len].iter_mut().for_each(|c| *c = true);
                    spans.push((i, i + len, pi));
                    i += len;
                } else {
                    i += 1;
                }
            }
        }
        spans.sort_unstable();

        let mut pieces = Vec::with_capacity(spans.len() * 2 + 1);
        let mut cursor = 0;
        for (start, end, pi) in spans {
            if start > cursor {
                pieces.push(Piece::Free(&line[offsets[cursor]..offsets[start]]));
            }
            pieces.push(Piece::Fixed(self.phrases[pi].1.as_str()));
            cursor = end;
        }
        if cursor < n_chars {
            pieces.push(Piece::Free(&line[offsets[cursor]..]));
        }
        pieces
    }
}

impl Default for PhraseOverrides {
    fn default() -> Self {
        Self::from_text(BUILTIN_OVERRIDES)
    }
}

const BUILTIN_OVERRIDES: &str = "\
# 多音字常见词
长江\tcháng jiāng
长城\tcháng chéng
长大\tzhǎng dà
银行\tyín háng
行李\txíng li
重庆\tchóng qìng
重要\tzhòng yào
音乐\tyīn yuè
快乐\tkuài lè
觉得\tjué de
睡觉\tshuì jiào
还是\thái shì
还有\thái yǒu
地方\tdì fang
东西\tdōng xi
朋友\tpéng you
什么\tshén me
头发\ttóu fa
了解\tliǎo jiě
";

// ============================================================
// 测试
// ============================================================
