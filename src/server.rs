//! # 本地 HTTP 服务
//!
//! - `POST /lookup`  `{text}` → 选词查询（词典 / 大模型）
//! - `POST /pinyin`  `{text}` → 汉字转拼音
//! - `GET  /version` → 服务标识 / 版本 / 时间 / 模型
//! - `OPTIONS *`     → CORS 预检
//!
//! 固定数量的工作线程共享同一个 `tiny_http::Server`，请求并发处理。

use std::io::Read;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;
use crate::lookup::{LookupAnswer, LookupError, Resolver, Source};
use crate::transliterate::Transliterator;

pub const APP_VERSION: &str = concat!("chimera-server-", env!("CARGO_PKG_VERSION"));

/// 所有请求共享的只读状态（缓存内部自带锁）
pub struct AppState {
    pub resolver: Resolver,
    pub transliterator: Transliterator,
}

// ============================================================
// 请求 / 响应结构体
// ============================================================

#[derive(Debug, Deserialize)]
struct TextRequest {
    text: String,
}

#[derive(Serialize)]
struct LookupReply<'a> {
    ok: bool,
    data: &'a LookupAnswer,
    cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alt_senses: Option<usize>,
}

#[derive(Serialize)]
struct ErrorReply {
    ok: bool,
    error: String,
}

#[derive(Serialize)]
struct PinyinReply {
    pinyin: String,
}

#[derive(Serialize)]
struct VersionReply<'a> {
    ok: bool,
    version: &'static str,
    time: u64,
    model: &'a str,
    cached_entries: usize,
}

/// 路由结果
#[derive(Debug, PartialEq)]
struct Reply {
    status: u16,
    body: String,
}

impl Reply {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, body },
            Err(e) => Self::error(500, &format!("serialize: {}", e)),
        }
    }

    fn error(status: u16, msg: &str) -> Self {
        Self::json(status, &ErrorReply { ok: false, error: msg.to_string() })
    }
}

// ============================================================
// 启动服务
// ============================================================

/// 绑定端口并阻塞运行，直到所有工作线程退出
pub fn serve(cfg: &ServerConfig, state: Arc<AppState>) -> Result<()> {
    let addr = format!("{}:{}", cfg.host, cfg.port);
    let server = tiny_http::Server::http(&addr)
        .map_err(|e| anyhow!("binding {}: {}", addr, e))?;

    let workers = cfg.workers.max(1);
    info!("[Server] ✅ http://{}  ({} workers, {})", addr, workers, APP_VERSION);
    run_workers(Arc::new(server), workers, state)
}

/// 工作线程全部退出即视为服务停止，返回错误
fn run_workers(server: Arc<tiny_http::Server>, workers: usize, state: Arc<AppState>) -> Result<()> {
    let mut handles = Vec::with_capacity(workers);
    for i in 0..workers {
        let server = server.clone();
        let state = state.clone();
        let handle = std::thread::Builder::new()
            .name(format!("http-{}", i))
            .spawn(move || worker_loop(&server, &state))?;
        handles.push(handle);
    }
    for h in handles {
        let _ = h.join();
    }
    error!("[Server] all {} workers exited, server stopped", workers);
    Err(anyhow!("all {} http workers exited", workers))
}

fn worker_loop(server: &tiny_http::Server, state: &AppState) {
    loop {
        match server.recv() {
            Ok(req) => handle_request(req, state),
            Err(e) => {
                error!("[Server] recv failed: {}", e);
                break;
            }
        }
    }
}

fn handle_request(mut req: tiny_http::Request, state: &AppState) {
    let method = req.method().as_str().to_string();
    let url = req.url().to_string();
    let path = url.split('?').next().unwrap_or(&url).to_string();

    // ── OPTIONS ──────────────────────────────────────────────
    if method == "OPTIONS" {
        let mut resp = tiny_http::Response::from_string("").with_status_code(204);
        for (name, value) in [
            ("Access-Control-Allow-Origin", "*"),
            ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
            ("Access-Control-Allow-Headers", "Content-Type"),
        ] {
            if let Some(h) = header(name, value) {
                resp.add_header(h);
            }
        }
        let _ = req.respond(resp);
        return;
    }

    let mut body = Vec::new();
    if method == "POST" && req.as_reader().read_to_end(&mut body).is_err() {
        send_json(req, Reply::error(400, "Failed to read request body"));
        return;
    }

    let start = std::time::Instant::now();
    let reply = route(&method, &path, &body, state);
    debug!("[Server] {} {} → {} in {:?}", method, path, reply.status, start.elapsed());
    send_json(req, reply);
}

fn header(name: &str, value: &str) -> Option<tiny_http::Header> {
    tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

fn send_json(req: tiny_http::Request, reply: Reply) {
    let mut resp = tiny_http::Response::from_string(reply.body).with_status_code(reply.status);
    for h in [
        header("Content-Type", "application/json; charset=utf-8"),
        header("Access-Control-Allow-Origin", "*"),
    ]
    .into_iter()
    .flatten()
    {
        resp.add_header(h);
    }
    let _ = req.respond(resp);
}

// ============================================================
// 路由
// ============================================================

fn route(method: &str, path: &str, body: &[u8], state: &AppState) -> Reply {
    match (method, path) {
        ("POST", "/lookup") => {
            let req: TextRequest = match serde_json::from_slice(body) {
                Ok(r) => r,
                Err(e) => return Reply::error(400, &format!("JSON error: {}", e)),
            };
            match state.resolver.resolve(&req.text) {
                Ok(res) => Reply::json(200, &LookupReply {
                    ok: true,
                    data: &res.answer,
                    cached: res.cached,
                    source: res.source,
                    alt_senses: res.alt_senses,
                }),
                Err(e @ LookupError::EmptySelection) => Reply::error(200, &e.to_string()),
            }
        }
        ("POST", "/pinyin") => {
            let req: TextRequest = match serde_json::from_slice(body) {
                Ok(r) => r,
                Err(e) => return Reply::error(400, &format!("JSON error: {}", e)),
            };
            let pinyin = state.transliterator.transliterate(&req.text);
            Reply::json(200, &PinyinReply { pinyin })
        }
        ("GET", "/version") => Reply::json(200, &VersionReply {
            ok: true,
            version: APP_VERSION,
            time: unix_time(),
            model: state.resolver.model_name(),
            cached_entries: state.resolver.cached_entries(),
        }),
        _ => Reply::error(404, "Not found"),
    }
}

fn unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ============================================================
// 测试
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResultCache;
    use crate::cedict::PronunciationIndex;
    use crate::llm::Generate;
    use crate::overrides::PhraseOverrides;
    use serde_json::Value;

    struct Canned(&'static str);
    impl Generate for Canned {
        fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
        fn model_name(&self) -> &str { "canned-model" }
    }

    fn state(reply: &'static str) -> AppState {
        AppState {
            resolver: Resolver::new(
                PronunciationIndex::from_text("馬 马 [ma3] /horse/\n碼 码 [ma3] /code/\n", 350),
                ResultCache::new(8),
                Box::new(Canned(reply)),
            ),
            transliterator: Transliterator::new(
                PhraseOverrides::from_pairs([("长江", "cháng jiāng")]),
            ),
        }
    }

    fn call(state: &AppState, method: &str, path: &str, body: &str) -> (u16, Value) {
        let r = route(method, path, body.as_bytes(), state);
        (r.status, serde_json::from_str(&r.body).unwrap())
    }

    #[test]
    fn test_lookup_dictionary() {
        let s = state("{}");
        let (status, v) = call(&s, "POST", "/lookup", r#"{"text": "mǎ"}"#);
        assert_eq!(status, 200);
        assert_eq!(v["ok"], true);
        assert_eq!(v["cached"], false);
        assert_eq!(v["source"], "dictionary");
        assert_eq!(v["alt_senses"], 1);
        assert_eq!(v["data"]["english"], "horse");
        assert_eq!(v["data"]["selection_type"], "pinyin");
        assert_eq!(v["data"]["examples"], serde_json::json!([]));

        let (_, v) = call(&s, "POST", "/lookup", r#"{"text": "MǍ"}"#);
        assert_eq!(v["cached"], true);
        assert!(v.get("source").is_none());
    }

    #[test]
    fn test_lookup_model() {
        let s = state(r#"{"english": "dog 狗", "selection_type": "english"}"#);
        let (_, v) = call(&s, "POST", "/lookup", r#"{"text": "dog"}"#);
        assert_eq!(v["source"], "model");
        assert_eq!(v["data"]["english"], "dog ");
        assert!(v.get("alt_senses").is_none());
    }

    #[test]
    fn test_lookup_empty() {
        let s = state("{}");
        let (status, v) = call(&s, "POST", "/lookup", r#"{"text": "   "}"#);
        assert_eq!(status, 200);
        assert_eq!(v["ok"], false);
        assert_eq!(v["error"], "Empty selection.");
        assert_eq!(s.resolver.cached_entries(), 0);
    }

    #[test]
    fn test_bad_body() {
        let s = state("{}");
        let (status, v) = call(&s, "POST", "/lookup", "not json");
        assert_eq!(status, 400);
        assert_eq!(v["ok"], false);
        let (status, _) = call(&s, "POST", "/pinyin", r#"{"txt": "x"}"#);
        assert_eq!(status, 400);
    }

    #[test]
    fn test_pinyin_route() {
        let s = state("{}");
        let (status, v) = call(&s, "POST", "/pinyin", r#"{"text": "长江\n\n长江"}"#);
        assert_eq!(status, 200);
        assert_eq!(v["pinyin"], "cháng jiāng\n\ncháng jiāng");
    }

    #[test]
    fn test_version_and_404() {
        let s = state("{}");
        let (status, v) = call(&s, "GET", "/version", "");
        assert_eq!(status, 200);
        assert_eq!(v["ok"], true);
        assert_eq!(v["model"], "canned-model");
        assert!(v["version"].as_str().unwrap().starts_with("chimera-server-"));
        assert!(v["time"].as_u64().unwrap() > 0);

        let (status, _) = call(&s, "GET", "/nope", "");
        assert_eq!(status, 404);
    }

    // ── 经过真实 socket 的请求 ────────────────────────────────

    /// 在本地端口上处理 n 个请求，返回基础 URL
    fn live_server(n: usize) -> (String, std::thread::JoinHandle<()>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let base = format!("http://{}", server.server_addr().to_ip().unwrap());
        let handle = std::thread::spawn(move || {
            let s = state("{}");
            for _ in 0..n {
                let req = server.recv().unwrap();
                handle_request(req, &s);
            }
        });
        (base, handle)
    }

    #[test]
    fn test_options_preflight() {
        let (base, handle) = live_server(1);
        let resp = ureq::request("OPTIONS", &format!("{}/lookup", base)).call().unwrap();
        assert_eq!(resp.status(), 204);
        assert_eq!(resp.header("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(resp.header("Access-Control-Allow-Methods"), Some("GET, POST, OPTIONS"));
        assert_eq!(resp.header("Access-Control-Allow-Headers"), Some("Content-Type"));
        handle.join().unwrap();
    }

    #[test]
    fn test_json_replies_carry_cors() {
        let (base, handle) = live_server(2);

        let resp = ureq::post(&format!("{}/pinyin", base))
            .set("Content-Type", "application/json")
            .send_string(r#"{"text": "长江"}"#)
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.header("Access-Control-Allow-Origin"), Some("*"));
        assert!(resp.header("Content-Type").unwrap().starts_with("application/json"));
        let v: Value = resp.into_json().unwrap();
        assert_eq!(v["pinyin"], "cháng jiāng");

        match ureq::get(&format!("{}/nope", base)).call() {
            Err(ureq::Error::Status(code, resp)) => {
                assert_eq!(code, 404);
                assert_eq!(resp.header("Access-Control-Allow-Origin"), Some("*"));
            }
            other => panic!("expected 404, got {:?}", other.map(|r| r.status())),
        }
        handle.join().unwrap();
    }

    #[test]
    fn test_workers_exit_is_reported() {
        let server = Arc::new(tiny_http::Server::http("127.0.0.1:0").unwrap());
        let runner = {
            let server = server.clone();
            std::thread::spawn(move || run_workers(server, 2, Arc::new(state("{}"))))
        };
        // 每次 unblock 让一个阻塞在 recv 的线程返回错误
        server.unblock();
        server.unblock();
        let result = runner.join().unwrap();
        assert!(result.is_err());
    }
}
