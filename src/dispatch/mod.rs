/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::cell::Cell;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use tracing::error;
use tracing::trace;
use tracing::warn;

use crate::BadXPath;
use crate::Element;
use crate::QueryCache;
use crate::XPathQuery;

/// Keys starting with this text are event names rather than queries.
pub const EVENT_PREFIX: &str = "//event/";

/// Return type of observers, errors are logged by the dispatcher.
pub type ObserverResult = Result<(), Box<dyn std::error::Error>>;

type Callback<P> = Box<dyn FnMut(&P) -> ObserverResult>;

/// Payloads which can be matched against query keys.
pub trait Dispatchable {
    fn element(&self) -> Option<&Element>;
}

impl Dispatchable for Element {
    fn element(&self) -> Option<&Element> {
        Some(self)
    }
}

/// Identifies a subscription for removal.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ObserverId(u64);

struct Observer<P> {
    id: ObserverId,
    onetime: bool,
    fired: Cell<bool>,
    callback: RefCell<Callback<P>>,
}

enum Key {
    Named(String),
    Query(Arc<XPathQuery>),
}

enum Change<P> {
    Add(i32, Key, Rc<Observer<P>>),
    Remove(String, ObserverId),
}

type Observers<P> = Vec<Rc<Observer<P>>>;

struct Registry<P> {
    named: BTreeMap<Reverse<i32>, HashMap<String, Observers<P>>>,
    // Vec keeps the queries of one priority in registration order
    queries: BTreeMap<Reverse<i32>, Vec<(Arc<XPathQuery>, Observers<P>)>>,
}

impl<P> Registry<P> {
    fn add(&mut self, priority: i32, key: Key, observer: Rc<Observer<P>>) {
        match key {
            Key::Named(name) => {
                self.named
                    .entry(Reverse(priority))
                    .or_default()
                    .entry(name)
                    .or_default()
                    .push(observer);
            }
            Key::Query(query) => {
                let bucket = self.queries.entry(Reverse(priority)).or_default();
                match bucket.iter_mut().find(|(q, _)| q.source() == query.source()) {
                    Some((_, observers)) => observers.push(observer),
                    None => bucket.push((query, vec![observer])),
                }
            }
        }
    }

    fn remove(&mut self, key: &str, id: ObserverId) {
        for by_name in self.named.values_mut() {
            if let Some(observers) = by_name.get_mut(key) {
                observers.retain(|o| o.id != id);
                if observers.is_empty() {
                    by_name.remove(key);
                }
            }
        }
        self.named.retain(|_, by_name| !by_name.is_empty());

        for bucket in self.queries.values_mut() {
            for (query, observers) in bucket.iter_mut() {
                if query.source() == key {
                    observers.retain(|o| o.id != id);
                }
            }
            bucket.retain(|(_, observers)| !observers.is_empty());
        }
        self.queries.retain(|_, bucket| !bucket.is_empty());
    }
}

/// Publish and subscribe registry for named events and element queries.
///
/// Observers run in priority order, higher values first. Observers of
/// the same key and priority run in registration order.
///
/// Subscriptions and removals made while a publish is running are held
/// back until the outermost publish returns, so an observer which
/// subscribes to its own event is not called again by the same publish.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// use iks_xmlstream::{Element, EventDispatcher};
///
/// let dispatcher: EventDispatcher<Element> = EventDispatcher::new();
/// let count = Rc::new(Cell::new(0));
/// let counter = Rc::clone(&count);
/// dispatcher
///     .subscribe("/message[@type='chat']", 0, move |_| {
///         counter.set(counter.get() + 1);
///         Ok(())
///     })
///     .unwrap();
///
/// let message: Element = "<message type='chat'/>".parse().unwrap();
/// assert!(dispatcher.publish(&message, None));
/// let message: Element = "<message type='normal'/>".parse().unwrap();
/// assert!(!dispatcher.publish(&message, None));
/// assert_eq!(count.get(), 1);
/// ```
pub struct EventDispatcher<P> {
    prefix: String,
    cache: Option<Arc<QueryCache>>,
    registry: RefCell<Registry<P>>,
    pending: RefCell<Vec<Change<P>>>,
    depth: Cell<usize>,
    next_id: Cell<u64>,
}

impl<P> Default for EventDispatcher<P> {
    fn default() -> Self {
        EventDispatcher::new()
    }
}

impl<P> EventDispatcher<P> {
    pub fn new() -> EventDispatcher<P> {
        EventDispatcher::with_prefix(EVENT_PREFIX)
    }

    pub fn with_prefix(prefix: &str) -> EventDispatcher<P> {
        EventDispatcher {
            prefix: prefix.to_string(),
            cache: None,
            registry: RefCell::new(Registry {
                named: BTreeMap::new(),
                queries: BTreeMap::new(),
            }),
            pending: RefCell::new(Vec::new()),
            depth: Cell::new(0),
            next_id: Cell::new(1),
        }
    }

    /// Compiles queries through the given cache instead of the global one.
    pub fn with_cache(mut self, cache: Arc<QueryCache>) -> EventDispatcher<P> {
        self.cache = Some(cache);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, text: &str) -> Result<Key, BadXPath> {
        if text.starts_with(&self.prefix) {
            return Ok(Key::Named(text.to_string()));
        }
        let query = match &self.cache {
            Some(cache) => cache.get(text)?,
            None => QueryCache::global().get(text)?,
        };
        Ok(Key::Query(query))
    }

    fn add_observer<F>(
        &self,
        text: &str,
        priority: i32,
        onetime: bool,
        callback: F,
    ) -> Result<ObserverId, BadXPath>
    where
        F: FnMut(&P) -> ObserverResult + 'static,
    {
        let key = self.key(text)?;
        let id = ObserverId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let observer = Rc::new(Observer {
            id,
            onetime,
            fired: Cell::new(false),
            callback: RefCell::new(Box::new(callback)),
        });
        if self.depth.get() > 0 {
            trace!(key = text, priority, "deferred subscription");
            self.pending
                .borrow_mut()
                .push(Change::Add(priority, key, observer));
        } else {
            self.registry.borrow_mut().add(priority, key, observer);
        }
        Ok(id)
    }

    /// Registers an observer for an event name or a query.
    ///
    /// Query text is compiled right away, so syntax errors are returned
    /// here even when the registration itself is deferred.
    pub fn subscribe<F>(&self, key: &str, priority: i32, callback: F) -> Result<ObserverId, BadXPath>
    where
        F: FnMut(&P) -> ObserverResult + 'static,
    {
        self.add_observer(key, priority, false, callback)
    }

    /// Registers an observer which is removed after its first call.
    pub fn subscribe_once<F>(
        &self,
        key: &str,
        priority: i32,
        callback: F,
    ) -> Result<ObserverId, BadXPath>
    where
        F: FnMut(&P) -> ObserverResult + 'static,
    {
        self.add_observer(key, priority, true, callback)
    }

    pub fn unsubscribe(&self, key: &str, id: ObserverId) {
        if self.depth.get() > 0 {
            self.pending
                .borrow_mut()
                .push(Change::Remove(key.to_string(), id));
        } else {
            self.registry.borrow_mut().remove(key, id);
        }
    }

    /// Returns true if anything is registered for the key.
    pub fn has_observers(&self, key: &str) -> bool {
        let registry = self.registry.borrow();
        if key.starts_with(&self.prefix) {
            registry.named.values().any(|by_name| by_name.contains_key(key))
        } else {
            registry
                .queries
                .values()
                .any(|bucket| bucket.iter().any(|(query, _)| query.source() == key))
        }
    }

    fn flush(&self) {
        let changes = std::mem::take(&mut *self.pending.borrow_mut());
        let mut registry = self.registry.borrow_mut();
        for change in changes {
            match change {
                Change::Add(priority, key, observer) => registry.add(priority, key, observer),
                Change::Remove(key, id) => registry.remove(&key, id),
            }
        }
    }
}

impl<P: Dispatchable> EventDispatcher<P> {
    fn matching(&self, payload: &P, event: Option<&str>) -> Vec<(String, Rc<Observer<P>>)> {
        let registry = self.registry.borrow();
        let mut observers = Vec::new();
        match event {
            Some(name) => {
                for by_name in registry.named.values() {
                    if let Some(list) = by_name.get(name) {
                        observers.extend(list.iter().map(|o| (name.to_string(), Rc::clone(o))));
                    }
                }
            }
            None => {
                let Some(el) = payload.element() else {
                    return observers;
                };
                for bucket in registry.queries.values() {
                    for (query, list) in bucket {
                        if query.matches(el) {
                            trace!(query = query.source(), "query matched");
                            observers.extend(
                                list.iter()
                                    .map(|o| (query.source().to_string(), Rc::clone(o))),
                            );
                        }
                    }
                }
            }
        }
        observers
    }

    /// Calls the observers of a named event, or the observers of every
    /// query matching the payload when no name is given.
    ///
    /// Returns true if at least one observer was called. Observer errors
    /// are logged and do not stop the remaining observers.
    pub fn publish(&self, payload: &P, event: Option<&str>) -> bool {
        let observers = self.matching(payload, event);
        let _guard = PublishGuard::enter(self);

        let mut handled = false;
        for (key, observer) in observers {
            if observer.fired.get() {
                continue;
            }
            let Ok(mut callback) = observer.callback.try_borrow_mut() else {
                warn!(key = %key, "observer is already running, skipped");
                continue;
            };
            if observer.onetime {
                observer.fired.set(true);
                self.pending
                    .borrow_mut()
                    .push(Change::Remove(key.clone(), observer.id));
            }
            handled = true;
            if let Err(err) = callback(payload) {
                error!(key = %key, error = %err, "observer failed");
            }
        }
        handled
    }
}

/// Tracks publish nesting, applying held back changes when the
/// outermost publish ends, even if an observer panics.
struct PublishGuard<'a, P> {
    dispatcher: &'a EventDispatcher<P>,
}

impl<'a, P> PublishGuard<'a, P> {
    fn enter(dispatcher: &'a EventDispatcher<P>) -> PublishGuard<'a, P> {
        dispatcher.depth.set(dispatcher.depth.get() + 1);
        PublishGuard { dispatcher }
    }
}

impl<P> Drop for PublishGuard<'_, P> {
    fn drop(&mut self) {
        let depth = self.dispatcher.depth.get() - 1;
        self.dispatcher.depth.set(depth);
        if depth == 0 {
            self.dispatcher.flush();
        }
    }
}

#[cfg(test)]
mod tests;
