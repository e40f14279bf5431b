//! 引用解析：跨整次研究对来源 URL 去重并分配短 ID
//!
//! 同一 canonical_url（逐字节相等）只分配一次 short_id，首次出现的标题为准。
//! 分配过程在一把短持有的互斥锁内完成，可被同批并发执行器同时调用。
//! 解析器随 LoopController 创建与销毁，不跨请求存活。

use std::collections::{BTreeMap, HashMap};
use std::sync::{LazyLock, Mutex, PoisonError};

use regex::{Captures, Regex};

use crate::research::CitationEntry;

/// `[n]` 或 `[n](url)`，连同紧挨着的一个前导空格（移除标记时一并去掉）
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"( ?)\[(\d+)\](?:\([^)\s]*\))?").expect("valid citation marker regex")
});

#[derive(Debug, Default)]
struct ResolverInner {
    by_url: HashMap<String, usize>,
    entries: Vec<CitationEntry>,
}

/// 单次研究内的引用表
#[derive(Debug)]
pub struct CitationResolver {
    short_url_prefix: String,
    inner: Mutex<ResolverInner>,
}

impl CitationResolver {
    pub fn new(short_url_prefix: impl Into<String>) -> Self {
        Self {
            short_url_prefix: short_url_prefix.into(),
            inner: Mutex::new(ResolverInner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResolverInner> {
        // 临界区内没有会 panic 的操作，中毒时数据仍一致
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 查找或分配引用条目
    pub fn resolve(&self, canonical_url: &str, display_title: &str) -> CitationEntry {
        let mut inner = self.lock();
        if let Some(&id) = inner.by_url.get(canonical_url) {
            return inner.entries[id - 1].clone();
        }
        let short_id = inner.entries.len() + 1;
        let title = display_title.trim();
        let entry = CitationEntry {
            short_id,
            short_url: format!("{}{}", self.short_url_prefix, short_id),
            display_title: if title.is_empty() {
                canonical_url.to_string()
            } else {
                title.to_string()
            },
            canonical_url: canonical_url.to_string(),
        };
        inner.by_url.insert(canonical_url.to_string(), short_id);
        inner.entries.push(entry.clone());
        entry
    }

    pub fn get(&self, short_id: usize) -> Option<CitationEntry> {
        if short_id == 0 {
            return None;
        }
        self.lock().entries.get(short_id - 1).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 所有已分配条目（按 short_id 升序）
    pub fn entries(&self) -> Vec<CitationEntry> {
        self.lock().entries.clone()
    }
}

/// 将文本中的 `[k]` 标记按 lookup 改写为 `[id](short_url)`；lookup 返回 None 的标记被移除。
/// 返回改写后的文本与被引用的条目（按 short_id 升序、去重）。
///
/// 移除标记可能拼出新的标记（如 `[1[9]]` 去掉 `[9]` 后成为 `[1]`），所以先反复剔除未知标记直到文本稳定，
/// 再对剩余标记做一次改写。改写只执行一遍：lookup 的编号空间（如执行器的局部下标）与输出的 short_id 不同。
pub fn rewrite_markers<F>(text: &str, mut lookup: F) -> (String, Vec<CitationEntry>)
where
    F: FnMut(usize) -> Option<CitationEntry>,
{
    let mut current = text.to_string();
    loop {
        let stripped = MARKER_RE
            .replace_all(&current, |caps: &Captures| {
                match caps[2].parse::<usize>().ok().and_then(&mut lookup) {
                    Some(_) => caps[0].to_string(),
                    None => String::new(),
                }
            })
            .into_owned();
        // 每遍只删不增，必然收敛
        if stripped == current {
            break;
        }
        current = stripped;
    }

    let mut used: BTreeMap<usize, CitationEntry> = BTreeMap::new();
    let rewritten = MARKER_RE.replace_all(&current, |caps: &Captures| {
        match caps[2].parse::<usize>().ok().and_then(&mut lookup) {
            Some(entry) => {
                let marker = format!("{}{}", &caps[1], entry.marker());
                used.entry(entry.short_id).or_insert(entry);
                marker
            }
            None => String::new(),
        }
    });
    (rewritten.into_owned(), used.into_values().collect())
}

/// 文本中是否含有 `[n]` 形式的标记
pub fn has_markers(text: &str) -> bool {
    MARKER_RE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const PREFIX: &str = "https://s.test/id/";

    #[test]
    fn test_sequential_ids_and_idempotence() {
        let resolver = CitationResolver::new(PREFIX);
        let a = resolver.resolve("https://a.example", "A");
        let b = resolver.resolve("https://b.example", "B");
        let a_again = resolver.resolve("https://a.example", "A renamed");
        assert_eq!(a.short_id, 1);
        assert_eq!(b.short_id, 2);
        assert_eq!(a_again, a);
        assert_eq!(a_again.display_title, "A");
        assert_eq!(a.short_url, "https://s.test/id/1");
        assert_eq!(resolver.len(), 2);
    }

    #[test]
    fn test_url_equality_is_exact() {
        let resolver = CitationResolver::new(PREFIX);
        let a = resolver.resolve("https://a.example/", "A");
        let b = resolver.resolve("https://a.example", "A");
        assert_ne!(a.short_id, b.short_id);
    }

    #[test]
    fn test_empty_title_falls_back_to_url() {
        let resolver = CitationResolver::new(PREFIX);
        let entry = resolver.resolve("https://c.example", "  ");
        assert_eq!(entry.display_title, "https://c.example");
        assert_eq!(resolver.get(1), Some(entry));
        assert_eq!(resolver.get(0), None);
        assert_eq!(resolver.get(2), None);
    }

    #[test]
    fn test_concurrent_resolution_assigns_unique_ids() {
        let resolver = Arc::new(CitationResolver::new(PREFIX));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let resolver = resolver.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| resolver.resolve(&format!("https://u{}.example", (i + t) % 20), "t").short_id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let entries = resolver.entries();
        assert_eq!(entries.len(), 20);
        let mut urls: Vec<_> = entries.iter().map(|e| e.canonical_url.clone()).collect();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), 20);
        for (i, e) in entries.iter().enumerate() {
            assert_eq!(e.short_id, i + 1);
        }
    }

    #[test]
    fn test_rewrite_markers_resolves_and_strips() {
        let resolver = CitationResolver::new(PREFIX);
        resolver.resolve("https://a.example", "A");
        resolver.resolve("https://b.example", "B");
        let (text, used) = rewrite_markers(
            "Alpha [2]. Beta [7]. Gamma [1](https://stale/link)[2].",
            |id| resolver.get(id),
        );
        assert_eq!(
            text,
            "Alpha [2](https://s.test/id/2). Beta. Gamma [1](https://s.test/id/1)[2](https://s.test/id/2)."
        );
        let ids: Vec<_> = used.iter().map(|e| e.short_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_has_markers() {
        assert!(has_markers("see [3]"));
        assert!(!has_markers("no markers [x] here"));
    }

    #[test]
    fn test_removal_exposing_new_marker_is_resolved() {
        let resolver = CitationResolver::new(PREFIX);
        resolver.resolve("https://one.example", "One");
        let (text, used) =
            rewrite_markers("See [1[9]] and [2024] results", |id| resolver.get(id));
        assert_eq!(text, "See [1](https://s.test/id/1) and results");
        assert_eq!(used.iter().map(|c| c.short_id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_removal_exposing_unknown_marker_is_stripped() {
        let resolver = CitationResolver::new(PREFIX);
        resolver.resolve("https://one.example", "One");
        let (text, used) = rewrite_markers("Odd [[7]5] claim [1].", |id| resolver.get(id));
        assert_eq!(text, "Odd claim [1](https://s.test/id/1).");
        assert_eq!(used.len(), 1);
        // 最终文本中不再有未解析的裸标记
        assert!(!Regex::new(r"\[\d+\](?:[^(]|$)").unwrap().is_match(&text));
    }
}
