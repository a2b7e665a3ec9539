//! # 声调规整
//!
//! 把自由输入的拼音（声调符号 / 数字声调）转换为 CC-CEDICT 风格的
//! 数字声调键：小写、每个音节后跟声调数字、音节间单空格。
//!
//! - `mā` → `ma1`，`pǔ tōng huà` → `pu3 tong1 hua4`
//! - 连写且带声调符号的输入按音节表重新切分：`nǐhǎo` → `ni3 hao3`
//! - 已经是数字声调的输入只做空白 / 连字符规整

use crate::hanzi::{contains_han, contains_tone_mark};

// ============================================================
// 声调符号 → (基本字母, 声调数字)
// ============================================================

fn split_tone_mark(ch: char) -> Option<(char, char)> {
    let pair = match ch {
        'ā' => ('a', '1'), 'á' => ('a', '2'), 'ǎ' => ('a', '3'), 'à' => ('a', '4'),
        'ē' => ('e', '1'), 'é' => ('e', '2'), 'ě' => ('e', '3'), 'è' => ('e', '4'),
        'ī' => ('i', '1'), 'í' => ('i', '2'), 'ǐ' => ('i', '3'), 'ì' => ('i', '4'),
        'ō' => ('o', '1'), 'ó' => ('o', '2'), 'ǒ' => ('o', '3'), 'ò' => ('o', '4'),
        'ū' => ('u', '1'), 'ú' => ('u', '2'), 'ǔ' => ('u', '3'), 'ù' => ('u', '4'),
        'ǖ' => ('ü', '1'), 'ǘ' => ('ü', '2'), 'ǚ' => ('ü', '3'), 'ǜ' => ('ü', '4'),
        'ń' => ('n', '2'), 'ň' => ('n', '3'), 'ǹ' => ('n', '4'),
        _ => return None,
    };
    Some(pair)
}

// ============================================================
// 拼音合法音节表（ü 写作 v）
// ============================================================

const VALID_SYLLABLES: &[&str] = &[
    "a", "o", "e", "ai", "ei", "ao", "ou", "an", "en", "ang", "eng", "er",
    "ba", "bo", "bi", "bu", "bai", "bei", "bao", "ban", "ben", "bang", "beng",
    "bie", "biao", "bian", "bin", "bing",
    "pa", "po", "pi", "pu", "pai", "pei", "pao", "pou", "pan", "pen", "pang", "peng",
    "pie", "piao", "pian", "pin", "ping",
    "ma", "mo", "me", "mi", "mu", "mai", "mei", "mao", "mou", "man", "men",
    "mang", "meng", "mie", "miao", "miu", "mian", "min", "ming",
    "fa", "fo", "fu", "fei", "fou", "fan", "fen", "fang", "feng",
    "da", "de", "di", "du", "dai", "dei", "dao", "dou", "dan", "den", "dang", "deng",
    "dong", "dia", "die", "diao", "diu", "dian", "ding", "duo", "dui", "duan", "dun",
    "ta", "te", "ti", "tu", "tai", "tao", "tou", "tan", "tang", "teng",
    "tong", "tie", "tiao", "tian", "ting", "tuo", "tui", "tuan", "tun",
    "na", "ne", "ni", "nu", "nv", "nai", "nei", "nao", "nou", "nan", "nen",
    "nang", "neng", "nong", "nie", "niao", "niu", "nian", "nin", "ning",
    "niang", "nuo", "nuan", "nun", "nve",
    "la", "lo", "le", "li", "lu", "lv", "lai", "lei", "lao", "lou", "lan", "lang", "leng",
    "long", "lia", "lie", "liao", "liu", "lian", "lin", "liang", "ling", "luo", "luan",
    "lun", "lve",
    "ga", "ge", "gu", "gai", "gei", "gao", "gou", "gan", "gen", "gang", "geng",
    "gong", "gua", "guai", "guan", "guang", "gui", "gun", "guo",
    "ka", "ke", "ku", "kai", "kei", "kao", "kou", "kan", "ken", "kang", "keng",
    "kong", "kua", "kuai", "kuan", "kuang", "kui", "kun", "kuo",
    "ha", "he", "hu", "hai", "hei", "hao", "hou", "han", "hen", "hang", "heng",
    "hong", "hua", "huai", "huan", "huang", "hui", "hun", "huo",
    "ji", "ju", "jia", "jie", "jiao", "jiu", "jian", "jin", "jiang", "jing",
    "jiong", "juan", "jun", "jue",
    "qi", "qu", "qia", "qie", "qiao", "qiu", "qian", "qin", "qiang", "qing",
    "qiong", "quan", "qun", "que",
    "xi", "xu", "xia", "xie", "xiao", "xiu", "xian", "xin", "xiang", "xing",
    "xiong", "xuan", "xun", "xue",
    "zha", "zhe", "zhi", "zhu", "zhai", "zhei", "zhao", "zhou", "zhan", "zhen",
    "zhang", "zheng", "zhong", "zhua", "zhuai", "zhuan", "zhuang", "zhui", "zhun", "zhuo",
    "cha", "che", "chi", "chu", "chai", "chao", "chou", "chan", "chen",
    "chang", "cheng", "chong", "chua", "chuai", "chuan", "chuang", "chui", "chun", "chuo",
    "sha", "she", "shi", "shu", "shai", "shei", "shao", "shou", "shan", "shen",
    "shang", "sheng", "shua", "shuai", "shuan", "shuang", "shui", "shun", "shuo",
    "re", "ri", "ru", "rao", "rou", "ran", "ren", "rang", "reng",
    "rong", "rua", "ruan", "rui", "run", "ruo",
    "za", "ze", "zi", "zu", "zai", "zei", "zao", "zou", "zan", "zen", "zang", "zeng",
    "zong", "zuo", "zui", "zuan", "zun",
    "ca", "ce", "ci", "cu", "cai", "cao", "cou", "can", "cen", "cang", "ceng",
    "cong", "cuo", "cui", "cuan", "cun",
    "sa", "se", "si", "su", "sai", "sao", "sou", "san", "sen", "sang", "seng",
    "song", "suo", "sui", "suan", "sun",
    "ya", "ye", "yi", "yo", "yu", "yao", "you", "yan", "yin", "yang", "ying",
    "yong", "yuan", "yun", "yue",
    "wa", "wo", "wu", "wai", "wei", "wan", "wen", "wang", "weng",
];

fn is_valid_syllable(s: &str) -> bool {
    VALID_SYLLABLES.contains(&s)
}

/// 贪心最长匹配切分纯 ASCII 拼音，返回每个音节的 (起点, 长度)
///
/// 任何位置无法匹配合法音节时返回 None。
fn split_syllables(letters: &str) -> Option<Vec<(usize, usize)>> {
    debug_assert!(letters.is_ascii());
    let len = letters.len();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < len {
        let max = std::cmp::min(6, len - i);
        let best = (1..=max).rev().find(|&n| is_valid_syllable(&letters[i..i + n]))?;
        spans.push((i, best));
        i += best;
    }
    Some(spans)
}

// ============================================================
// 规整入口
// ============================================================

/// 转换为数字声调键，不是拼音时返回 None
pub fn to_tone_numbers(text: &str) -> Option<String> {
    let s = text.trim();
    if s.is_empty() || contains_han(s) {
        return None;
    }
    let s = s.to_lowercase().replace('v', "ü").replace("u:", "ü");

    if !is_plain_pinyin(&s) && !contains_tone_mark(&s) {
        return None;
    }

    // 已是数字声调：只规整分隔符
    if s.chars().any(|c| c.is_ascii_digit()) {
        return non_empty(collapse_whitespace(&s.replace('-', " ")));
    }

    let mut out = String::with_capacity(s.len() + 8);
    for chunk in s.split(|c: char| c == '-' || c.is_whitespace()) {
        convert_chunk(chunk, &mut out);
        out.push(' ');
    }
    non_empty(collapse_whitespace(&out))
}

/// 字母 / ü / 数字 / 空白 / 连字符
fn is_plain_pinyin(s: &str) -> bool {
    s.chars().all(|c| {
        c.is_ascii_alphanumeric() || c == 'ü' || c == 'Ü' || c == '-' || c.is_whitespace()
    })
}

/// 单个无分隔的片段：能按音节表切开就逐音节标调，否则声调数字统一放到片段末尾
fn convert_chunk(chunk: &str, out: &mut String) {
    let marked: Vec<(char, Option<char>)> = chunk
        .chars()
        .map(|c| match split_tone_mark(c) {
            Some((base, tone)) => (base, Some(tone)),
            None => (c, None),
        })
        .collect();

    if let Some(syllables) = resyllabify(&marked) {
        out.push_str(&syllables.join(" "));
        return;
    }

    let mut pending = None;
    for (base, tone) in marked {
        out.push(base);
        if tone.is_some() {
            pending = tone;
        }
    }
    if let Some(tone) = pending {
        out.push(tone);
    }
}

/// 连写多音节: "nǐhǎo" → ["ni3", "hao3"]，"wǒmen" → ["wo3", "men5"]
///
/// 只有一个音节、含非拼音字母、或某个音节带多个声调时返回 None。
fn resyllabify(marked: &[(char, Option<char>)]) -> Option<Vec<String>> {
    if !marked.iter().any(|(_, t)| t.is_some()) {
        return None;
    }
    let mut letters = String::with_capacity(marked.len());
    for &(base, _) in marked {
        match base {
            'a'..='z' => letters.push(base),
            'ü' => letters.push('v'),
            _ => return None,
        }
    }

    let spans = split_syllables(&letters)?;
    if spans.len() < 2 {
        return None;
    }

    let mut syllables = Vec::with_capacity(spans.len());
    for (start, n) in spans {
        let part = &marked[start..start + n];
        let mut tones = part.iter().filter_map(|(_, t)| *t);
        let tone = tones.next().unwrap_or('5');
        if tones.next().is_some() {
            return None;
        }
        let mut syl: String = part.iter().map(|(b, _)| *b).collect();
        syl.push(tone);
        syllables.push(syl);
    }
    Some(syllables)
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> Option<String> {
        to_tone_numbers(s)
    }

    #[test]
    fn test_single_syllable() {
        assert_eq!(norm("mā").as_deref(), Some("ma1"));
        assert_eq!(norm("mǎ").as_deref(), Some("ma3"));
        assert_eq!(norm("zhuāng").as_deref(), Some("zhuang1"));
        assert_eq!(norm("lǜ").as_deref(), Some("lü4"));
    }

    #[test]
    fn test_spaced_and_hyphenated() {
        assert_eq!(norm("pǔ tōng huà").as_deref(), Some("pu3 tong1 hua4"));
        assert_eq!(norm("Nǐ-Hǎo").as_deref(), Some("ni3 hao3"));
        assert_eq!(norm("  nǐ   hǎo  ").as_deref(), Some("ni3 hao3"));
    }

    #[test]
    fn test_fused_syllables() {
        assert_eq!(norm("pǔtōnghuà").as_deref(), Some("pu3 tong1 hua4"));
        assert_eq!(norm("nǐhǎo").as_deref(), Some("ni3 hao3"));
        assert_eq!(norm("wǒmen").as_deref(), Some("wo3 men5"));
    }

    #[test]
    fn test_unsplittable_chunk_keeps_trailing_tone() {
        // 无法按音节表切开 → 最后一个声调放到片段末尾
        assert_eq!(norm("xīān").as_deref(), Some("xian1"));
        assert_eq!(norm("hǎo!").as_deref(), Some("hao!3"));
    }

    #[test]
    fn test_numeric_passthrough() {
        assert_eq!(norm("ni3 hao3").as_deref(), Some("ni3 hao3"));
        assert_eq!(norm("ni3   hao3").as_deref(), Some("ni3 hao3"));
        assert_eq!(norm("ni3-hao3").as_deref(), Some("ni3 hao3"));
        assert_eq!(norm("ni3hao3").as_deref(), Some("ni3hao3"));
    }

    #[test]
    fn test_any_whitespace_separates_syllables() {
        assert_eq!(norm("nǐ\thǎo").as_deref(), Some("ni3 hao3"));
        assert_eq!(norm("nǐ\nhǎo").as_deref(), Some("ni3 hao3"));
    }

    #[test]
    fn test_umlaut_conventions() {
        assert_eq!(norm("lv4").as_deref(), Some("lü4"));
        assert_eq!(norm("nu:3").as_deref(), Some("nü3"));
        assert_eq!(norm("NV3").as_deref(), Some("nü3"));
    }

    #[test]
    fn test_rejects_non_pinyin() {
        assert_eq!(norm(""), None);
        assert_eq!(norm("   "), None);
        assert_eq!(norm("你好"), None);
        assert_eq!(norm("hello!"), None);
        assert_eq!(norm("-"), None);
    }

    #[test]
    fn test_plain_letters_pass_through() {
        assert_eq!(norm("hello").as_deref(), Some("hello"));
    }

    #[test]
    fn test_split_syllables() {
        assert_eq!(split_syllables("nihao"), Some(vec![(0, 2), (2, 3)]));
        assert_eq!(split_syllables("zhuang"), Some(vec![(0, 6)]));
        assert_eq!(split_syllables("xyz"), None);
    }
}
