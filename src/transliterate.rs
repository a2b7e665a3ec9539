//! # 汉字转拼音
//!
//! 逐行处理，空行原样保留为空行：
//! 1. 固定读音词组按区间认领（见 `overrides`）
//! 2. 其余文本用 jieba 分词
//! 3. 每个词用 pinyin 库注音（声调符号），未知字符原样输出
//! 4. 词之间单空格拼接，再规整标点前后的空格

use std::sync::OnceLock;

use jieba_rs::Jieba;
use pinyin::ToPinyin;
use regex::Regex;

use crate::hanzi::is_han;
use crate::overrides::{Piece, PhraseOverrides};

pub struct Transliterator {
    jieba: Jieba,
    overrides: PhraseOverrides,
}

impl Transliterator {
    /// 词组只在注音前认领区间，不注册进分词词典，
    /// 未认领文本的切分与无词组时一致
    pub fn new(overrides: PhraseOverrides) -> Self {
        Self { jieba: Jieba::new(), overrides }
    }

    pub fn transliterate(&self, text: &str) -> String {
        text.lines()
            .map(|line| self.transliterate_line(line))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    fn transliterate_line(&self, line: &str) -> String {
        if line.trim().is_empty() {
            return String::new();
        }

        let mut tokens: Vec<String> = Vec::new();
        for piece in self.overrides.split_protected(line) {
            match piece {
                Piece::Fixed(reading) => tokens.push(reading.to_string()),
                Piece::Free(text) => {
                    for word in self.jieba.cut(text, true) {
                        tokens.push(romanize_word(word));
                    }
                }
            }
        }
        normalize_punctuation(&tokens.join(" "))
    }
}

/// 一个词 → 空格分隔的带调拼音
///
/// 每个汉字一个音节；连续的非汉字（字母、数字、标点）作为一段原样保留。
pub fn romanize_word(word: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut run = String::new();

    for ch in word.chars() {
        let syllable = if is_han(ch) { ch.to_pinyin().map(|p| p.with_tone()) } else { None };
        match syllable {
            Some(s) => {
                if !run.is_empty() {
                    parts.push(std::mem::take(&mut run));
                }
                parts.push(s.to_string());
            }
            None => run.push(ch),
        }
    }
    if !run.is_empty() {
        parts.push(run);
    }
    parts.join(" ")
}

// ============================================================
// 标点规整
// ============================================================

const CLOSING: &str = r"，。！？；：、,.!?;:）)\]】》」』”’〉";
const OPENING: &str = r"（(\[【《「『“‘〈";

fn space_before_closing() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"\s+([{}])", CLOSING)).expect("closing punctuation regex"))
}

fn space_after_opening() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"([{}])\s+", OPENING)).expect("opening punctuation regex"))
}

fn repeated_blanks() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]{2,}").expect("blank run regex"))
}

/// 收起右标点前、左标点后的空格，折叠连续空格
pub fn normalize_punctuation(s: &str) -> String {
    let s = repeated_blanks().replace_all(s, " ");
    let s = space_before_closing().replace_all(&s, "$1");
    let s = space_after_opening().replace_all(&s, "$1");
    s.trim().to_string()
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> Transliterator {
        Transliterator::new(PhraseOverrides::from_pairs(Vec::<(String, String)>::new()))
    }

    #[test]
    fn test_punctuation_spacing() {
        assert_eq!(normalize_punctuation("ni3 hao3 , wo3 hao3"), "ni3 hao3, wo3 hao3");
        assert_eq!(normalize_punctuation("nǐ hǎo ！"), "nǐ hǎo！");
        assert_eq!(normalize_punctuation("《 hóng lóu mèng 》"), "《hóng lóu mèng》");
        assert_eq!(normalize_punctuation("( a )  b\t\tc"), "(a) b c");
        assert_eq!(normalize_punctuation("  x  "), "x");
    }

    #[test]
    fn test_romanize_word() {
        assert_eq!(romanize_word("你好"), "nǐ hǎo");
        assert_eq!(romanize_word("abc"), "abc");
        assert_eq!(romanize_word("3个"), "3 gè");
        assert_eq!(romanize_word("，"), "，");
    }

    #[test]
    fn test_simple_sentence() {
        let t = plain();
        assert_eq!(t.transliterate("你好"), "nǐ hǎo");
        assert_eq!(t.transliterate("你好，世界"), "nǐ hǎo， shì jiè");
    }

    #[test]
    fn test_blank_lines_preserved() {
        let t = plain();
        let out = t.transliterate("你好\n\n世界");
        let lines: Vec<&str> = out.split('\n').collect();
        assert_eq!(lines, vec!["nǐ hǎo", "", "shì jiè"]);

        assert_eq!(t.transliterate("你好\n   \n世界"), "nǐ hǎo\n\nshì jiè");
    }

    #[test]
    fn test_outer_whitespace_trimmed() {
        let t = plain();
        assert_eq!(t.transliterate("\n\n  你好  \n\n"), "nǐ hǎo");
        assert_eq!(t.transliterate(""), "");
    }

    #[test]
    fn test_override_takes_precedence() {
        let t = Transliterator::new(PhraseOverrides::from_pairs([
            ("长江", "cháng jiāng"),
            ("长", "cháng"),
        ]));
        assert_eq!(t.transliterate("长江"), "cháng jiāng");
        assert_eq!(t.transliterate("【长江】"), "【cháng jiāng】");
        assert!(t.transliterate("我爱长江").ends_with("cháng jiāng"));
    }

    #[test]
    fn test_overrides_leave_free_text_segmentation_alone() {
        let t = Transliterator::new(PhraseOverrides::from_pairs([
            ("江大", "jiāng dà"),
            ("银行", "yín háng"),
        ]));
        let line = "我们在北京大学学习中文";
        assert_eq!(t.transliterate(line), plain().transliterate(line));
    }

    #[test]
    fn test_non_han_passthrough() {
        let t = plain();
        assert_eq!(t.transliterate("hello"), "hello");
    }
}
