//! # 文字类型判断
//!
//! - 汉字检测 / 剔除（输出端硬性禁止出现汉字）
//! - 声调符号检测
//! - "像拼音" 的粗判（真正的校验交给 `tone::to_tone_numbers`）

/// 是否为汉字（CJK 统一表意文字 + 扩展 A + 兼容表意 + 补充平面）
pub fn is_han(ch: char) -> bool {
    matches!(ch as u32,
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0xF900..=0xFAFF
        | 0x20000..=0x2FA1F)
}

pub fn contains_han(text: &str) -> bool {
    text.chars().any(is_han)
}

/// 剔除所有汉字，其余字符原样保留
pub fn strip_han(text: &str) -> String {
    text.chars().filter(|&c| !is_han(c)).collect()
}

/// 带声调符号的拼音元音（含 ü 与 n 的声调变体）
const TONE_MARKS: &str = "āáǎàēéěèīíǐìōóǒòūúǔùǖǘǚǜńňǹ";

pub fn is_tone_mark(ch: char) -> bool {
    TONE_MARKS.contains(ch)
}

pub fn contains_tone_mark(text: &str) -> bool {
    text.chars().any(is_tone_mark)
}

/// 粗判输入是否像拼音
///
/// 含汉字或为空 → false；
/// 含声调符号 / 数字 / ü / v（不区分大小写）→ true。
pub fn is_pinyin_like(text: &str) -> bool {
    if text.is_empty() || contains_han(text) {
        return false;
    }
    let t = text.trim();
    contains_tone_mark(t)
        || t.chars().any(|c| c.is_ascii_digit())
        || t.chars().any(|c| matches!(c, 'ü' | 'Ü' | 'v' | 'V'))
}

// ============================================================
// 测试
// ============================================================
