/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;

use tracing::trace;

use super::BadXPath;
use super::XPathQuery;

/// Interning table of compiled queries.
///
/// Compiling the same text twice through one cache returns the same
/// `Arc`, so the compiled queries can be compared by identity.
#[derive(Default)]
pub struct QueryCache {
    queries: Mutex<HashMap<String, Arc<XPathQuery>>>,
}

impl QueryCache {
    pub fn new() -> QueryCache {
        QueryCache::default()
    }

    /// The process wide cache.
    pub fn global() -> &'static QueryCache {
        static GLOBAL: OnceLock<QueryCache> = OnceLock::new();
        GLOBAL.get_or_init(QueryCache::new)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<XPathQuery>>> {
        // The map is always consistent, a panic elsewhere cannot corrupt it
        self.queries.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Returns the compiled query for the text, compiling it on first use.
    pub fn get(&self, text: &str) -> Result<Arc<XPathQuery>, BadXPath> {
        let mut queries = self.lock();
        if let Some(query) = queries.get(text) {
            return Ok(Arc::clone(query));
        }
        let query = Arc::new(XPathQuery::new(text)?);
        trace!(query = text, "compiled query");
        queries.insert(text.to_string(), Arc::clone(&query));
        Ok(query)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
