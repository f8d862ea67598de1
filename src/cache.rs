//! Memoization of lexing and parsing, keyed by formula text.
//!
//! Interpretation rule sets evaluate the same handful of formulas against
//! chart after chart; the cache makes every repeat a map lookup. Entries
//! hold `Arc<Expr>`, so an evicted AST stays alive for whoever is still
//! evaluating it.
//!
//! There is deliberately no process-wide instance: a cache is constructed
//! for a calculation session and passed by reference to whoever evaluates
//! formulas, which also lets every test build a fresh one.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::ast::Expr;
use crate::error::FormulaResult;
use crate::lexer::tokenize;
use crate::parser::parse;

struct CacheEntry {
    ast: Arc<Expr>,
    last_used: u64,
}

struct CacheInner {
    entries: AHashMap<String, CacheEntry>,
    // Logical clock for LRU recency; bumped on every touch.
    tick: u64,
}

/// Bounded LRU cache of parsed formulas, safe to share across threads.
pub struct FormulaCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl FormulaCache {
    /// Create a cache holding at most `capacity` parsed formulas.
    /// A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        FormulaCache {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheInner {
                entries: AHashMap::new(),
                tick: 0,
            }),
        }
    }

    /// Return the AST for `formula`, parsing it on first sight.
    ///
    /// Lex and parse failures propagate and are never cached, so a later
    /// call with the same (fixed) text is parsed afresh.
    pub fn get_or_parse(&self, formula: &str) -> FormulaResult<Arc<Expr>> {
        {
            let mut inner = self.inner.lock();
            inner.tick += 1;
            let tick = inner.tick;
            if let Some(entry) = inner.entries.get_mut(formula) {
                entry.last_used = tick;
                debug!(formula, "formula cache hit");
                return Ok(Arc::clone(&entry.ast));
            }
        }

        // Parse outside the lock; two racing callers may both parse, but
        // determinism makes their ASTs interchangeable and only one is kept.
        let ast = Arc::new(parse(tokenize(formula)?)?);
        debug!(formula, "formula cache miss, parsed");

        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;
        if let Some(entry) = inner.entries.get_mut(formula) {
            entry.last_used = tick;
            return Ok(Arc::clone(&entry.ast));
        }

        if inner.entries.len() >= self.capacity {
            evict_least_recent(&mut inner);
        }
        inner.entries.insert(
            formula.to_string(),
            CacheEntry {
                ast: Arc::clone(&ast),
                last_used: tick,
            },
        );
        Ok(ast)
    }

    /// Drop one formula from the cache. Returns whether it was present.
    pub fn evict(&self, formula: &str) -> bool {
        let evicted = self.inner.lock().entries.remove(formula).is_some();
        if evicted {
            debug!(formula, "formula cache explicit eviction");
        }
        evicted
    }

    /// Number of cached formulas.
    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Drop every cached formula.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}

fn evict_least_recent(inner: &mut CacheInner) {
    let victim = inner
        .entries
        .iter()
        .min_by_key(|(_, entry)| entry.last_used)
        .map(|(formula, _)| formula.clone());
    if let Some(formula) = victim {
        debug!(formula, "formula cache LRU eviction");
        inner.entries.remove(&formula);
    }
}
