//! # 大模型兜底（Ollama `/api/generate`）
//!
//! 词典查不到时，把选中文本交给本地大模型生成结构化解释。
//!
//! - 固定提示词：只输出 JSON、不允许汉字、拼音带声调符号、字段固定
//! - 单次阻塞请求：不流式、keep_alive 保持模型常驻、限制输出长度
//! - 超时 / 网络错误 / 返回内容解析失败，一律视为"无结果"，由上层换成兜底答案
//! - 汉字过滤不在这里做，统一由 lookup 的清洗步骤处理

use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ModelConfig;
use crate::lookup::{Example, LookupAnswer, SelectionType};

// ============================================================
// 生成接口 — 便于测试时替换
// ============================================================

pub trait Generate: Send + Sync {
    /// 发送提示词，返回模型原始文本
    fn generate(&self, prompt: &str) -> Result<String>;

    /// 模型标识（/version 展示用）
    fn model_name(&self) -> &str;
}

// ============================================================
// Ollama 客户端
// ============================================================

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    keep_alive: &'a str,
    options: GenerateOptions,
}

#[derive(Serialize, Clone, Copy, Debug)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

pub struct OllamaClient {
    agent: ureq::Agent,
    url: String,
    model: String,
    keep_alive: String,
    options: GenerateOptions,
}

impl OllamaClient {
    pub fn new(cfg: &ModelConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build();
        Self::with_agent(agent, cfg)
    }

    fn with_agent(agent: ureq::Agent, cfg: &ModelConfig) -> Self {
        Self {
            agent,
            url: cfg.url.clone(),
            model: cfg.name.clone(),
            keep_alive: cfg.keep_alive.clone(),
            options: GenerateOptions {
                temperature: cfg.temperature,
                top_p: cfg.top_p,
                num_predict: cfg.num_predict,
            },
        }
    }
}

impl Generate for OllamaClient {
    fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            keep_alive: &self.keep_alive,
            options: self.options,
        };

        let start = std::time::Instant::now();
        let resp: GenerateResponse = self.agent
            .post(&self.url)
            .send_json(&request)
            .with_context(|| format!("POST {}", self.url))?
            .into_json()
            .context("decoding generate response")?;
        debug!("[Model] {} replied in {:?}", self.model, start.elapsed());

        Ok(resp.response.unwrap_or_default())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================
// 提示词
// ============================================================

pub fn build_prompt(text: &str) -> String {
    // 用 JSON 字符串转义嵌入，避免选中文本里的引号破坏提示词结构
    let quoted = serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text));
    format!(
        r#"You are a Mandarin speaking and listening coach.

The user selected this text: {quoted}

RULES:
- Reply with JSON only.
- Never write Chinese characters (Hanzi) anywhere in the reply.
- Write all Mandarin as pinyin with tone marks.

Use exactly this schema:
{{
  "selection": string,
  "selection_type": "pinyin" | "english",
  "pinyin": string,
  "english": string,
  "usage": string,
  "examples": [
    {{"pinyin": string, "english": string}},
    {{"pinyin": string, "english": string}}
  ]
}}

Keep every field short.
JSON:
"#
    )
}

// ============================================================
// 解析模型输出
// ============================================================

/// 两级解析：整段就是对象则直接解析；否则取第一个 `{` 到最后一个 `}`
pub fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    let t = text.trim();
    if t.starts_with('{') && t.ends_with('}') {
        if let Ok(Value::Object(map)) = serde_json::from_str(t) {
            return Some(map);
        }
    }
    let a = t.find('{')?;
    let b = t.rfind('}')?;
    if b <= a {
        return None;
    }
    match serde_json::from_str(&t[a..=b]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ModelReply {
    selection: Option<String>,
    selection_type: Option<String>,
    pinyin: Option<String>,
    english: Option<String>,
    usage: Option<String>,
    examples: Option<Vec<Value>>,
}

/// 把模型返回的对象收敛成 LookupAnswer
///
/// 缺失字段取默认值；字段类型不对视为格式错误（None）。
pub fn answer_from_object(obj: Map<String, Value>, selection: &str) -> Option<LookupAnswer> {
    let reply: ModelReply = match serde_json::from_value(Value::Object(obj)) {
        Ok(r) => r,
        Err(e) => {
            warn!("[Model] reply does not match schema: {}", e);
            return None;
        }
    };

    let selection_type = match reply.selection_type.as_deref().map(|s| s.trim().to_lowercase()) {
        Some(t) if t == "pinyin" => SelectionType::Pinyin,
        _ => SelectionType::English,
    };

    let examples = reply.examples.unwrap_or_default()
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(m) => Some(Example {
                pinyin: str_field(&m, "pinyin"),
                english: str_field(&m, "english"),
            }),
            _ => None,
        })
        .collect();

    Some(LookupAnswer {
        selection: reply.selection.unwrap_or_else(|| selection.to_string()),
        selection_type,
        pinyin: reply.pinyin.unwrap_or_default(),
        english: reply.english.unwrap_or_default(),
        usage: reply.usage.unwrap_or_default(),
        examples,
    })
}

fn str_field(m: &Map<String, Value>, key: &str) -> String {
    m.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

/// 完整的一次兜底调用：提示词 → 请求 → 解析 → 收敛
///
/// 任何失败都只记日志并返回 None。
pub fn ask(generator: &dyn Generate, selection: &str) -> Option<LookupAnswer> {
    let prompt = build_prompt(selection);
    let raw = match generator.generate(&prompt) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("[Model] request failed: {:#}", e);
            return None;
        }
    };
    let Some(obj) = parse_json_object(&raw) else {
        warn!("[Model] no JSON object in reply ({} chars)", raw.chars().count());
        return None;
    };
    // 空对象 `{}` 与无结果同等处理
    if obj.is_empty() {
        warn!("[Model] empty JSON object in reply");
        return None;
    }
    answer_from_object(obj, selection)
}

// ============================================================
// 测试
// ============================================================
