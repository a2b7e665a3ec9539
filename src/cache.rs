//! # 查询结果缓存
//!
//! 固定容量 LRU，键为规整后的选中文本（小写、去首尾空白、截断）。
//! 只按容量淘汰，不按时间过期；`get` 也会刷新最近使用顺序。
//! 全进程共享，读写都经过同一把锁。

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::lookup::LookupAnswer;

pub const DEFAULT_CAPACITY: usize = 2000;

pub struct ResultCache {
    inner: Mutex<LruCache<String, LookupAnswer>>,
}

impl ResultCache {
    /// 容量为 0 时按 1 处理
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { inner: Mutex::new(LruCache::new(cap)) }
    }

    pub fn get(&self, key: &str) -> Option<LookupAnswer> {
        let mut cache = self.inner.lock().ok()?;
        cache.get(key).cloned()
    }

    /// 插入或覆盖；超出容量时淘汰最久未使用的条目
    pub fn set(&self, key: String, value: LookupAnswer) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.put(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().map(|c| c.cap().get()).unwrap_or(0)
    }
}

// ============================================================
// 测试
// ============================================================
