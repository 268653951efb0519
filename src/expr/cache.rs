//! Thread-safe bounded cache of compiled expressions (§4.1 "Compilation
//! cache"), keyed by source text.

use std::sync::Mutex;

use lru::LruCache;

use super::ast::Expr;
use super::parser;
use crate::error::Result;

pub struct ExprCache {
    inner: Mutex<LruCache<String, Expr>>,
}

impl ExprCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity.max(1)).unwrap();
        ExprCache {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns the compiled expression for `source`, parsing and caching it
    /// on a miss.
    pub fn compile(&self, source: &str) -> Result<Expr> {
        {
            let mut guard = self.inner.lock().expect("expression cache lock poisoned");
            if let Some(expr) = guard.get(source) {
                return Ok(expr.clone());
            }
        }
        let expr = parser::parse(source)?;
        let mut guard = self.inner.lock().expect("expression cache lock poisoned");
        guard.put(source.to_string(), expr.clone());
        Ok(expr)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("expression cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExprCache {
    fn default() -> Self {
        ExprCache::new(1024)
    }
}
