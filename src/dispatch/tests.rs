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
use std::rc::Rc;
use std::sync::Arc;

use super::*;

const TEST_EVENT: &str = "//event/test";

type Log = Rc<RefCell<Vec<String>>>;

fn logger(log: &Log, label: &str) -> impl FnMut(&Element) -> ObserverResult + 'static {
    let log = Rc::clone(log);
    let label = label.to_string();
    move |_| {
        log.borrow_mut().push(label.clone());
        Ok(())
    }
}

fn element(xml: &str) -> Element {
    xml.parse().unwrap()
}

fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

#[test]
fn priority_order() {
    let dispatcher = EventDispatcher::new();
    let log = Log::default();
    dispatcher.subscribe(TEST_EVENT, 5, logger(&log, "5")).unwrap();
    dispatcher.subscribe(TEST_EVENT, 0, logger(&log, "0a")).unwrap();
    dispatcher.subscribe(TEST_EVENT, -5, logger(&log, "-5")).unwrap();
    dispatcher.subscribe(TEST_EVENT, 0, logger(&log, "0b")).unwrap();

    assert!(dispatcher.publish(&element("<x/>"), Some(TEST_EVENT)));
    assert_eq!(entries(&log), ["5", "0a", "0b", "-5"]);

    log.borrow_mut().clear();
    assert!(!dispatcher.publish(&element("<x/>"), Some("//event/other")));
    assert!(entries(&log).is_empty());
}

#[test]
fn queries() {
    let dispatcher = EventDispatcher::new();
    let log = Log::default();
    dispatcher.subscribe("/message", 0, logger(&log, "message")).unwrap();
    dispatcher
        .subscribe("/message[@type='chat']", 1, logger(&log, "chat"))
        .unwrap();
    dispatcher.subscribe("/iq", 0, logger(&log, "iq")).unwrap();
    dispatcher.subscribe("/message", 0, logger(&log, "message2")).unwrap();

    assert!(dispatcher.publish(&element("<message type='chat'/>"), None));
    assert_eq!(entries(&log), ["chat", "message", "message2"]);

    log.borrow_mut().clear();
    assert!(dispatcher.publish(&element("<message/>"), None));
    assert_eq!(entries(&log), ["message", "message2"]);

    log.borrow_mut().clear();
    assert!(!dispatcher.publish(&element("<presence/>"), None));
    assert!(entries(&log).is_empty());

    // Queries are not looked up by event name
    assert!(!dispatcher.publish(&element("<iq/>"), Some("/iq")));
}

#[test]
fn onetime_observers() {
    let dispatcher: Rc<EventDispatcher<Element>> = Rc::new(EventDispatcher::new());
    let count = Rc::new(Cell::new(0));

    let weak = Rc::downgrade(&dispatcher);
    let counter = Rc::clone(&count);
    dispatcher
        .subscribe_once(TEST_EVENT, 0, move |el: &Element| {
            counter.set(counter.get() + 1);
            // Publishing again from inside must not call it twice
            if let Some(dispatcher) = weak.upgrade() {
                dispatcher.publish(el, Some(TEST_EVENT));
            }
            Ok(())
        })
        .unwrap();

    assert!(dispatcher.publish(&element("<x/>"), Some(TEST_EVENT)));
    assert!(!dispatcher.publish(&element("<x/>"), Some(TEST_EVENT)));
    assert_eq!(count.get(), 1);
    assert!(!dispatcher.has_observers(TEST_EVENT));
    assert!(dispatcher.registry.borrow().named.is_empty());
}

#[test]
fn onetime_query_observers() {
    let dispatcher = EventDispatcher::new();
    let log = Log::default();
    dispatcher
        .subscribe_once("/iq[@id='H_1']", 0, logger(&log, "reply"))
        .unwrap();

    assert!(dispatcher.publish(&element("<iq id='H_1'/>"), None));
    assert!(!dispatcher.publish(&element("<iq id='H_1'/>"), None));
    assert_eq!(entries(&log), ["reply"]);
    assert!(dispatcher.registry.borrow().queries.is_empty());
}

#[test]
fn subscribe_during_publish() {
    let dispatcher: Rc<EventDispatcher<Element>> = Rc::new(EventDispatcher::new());
    let log = Log::default();

    let weak = Rc::downgrade(&dispatcher);
    let inner_log = Rc::clone(&log);
    let added = Cell::new(false);
    dispatcher
        .subscribe(TEST_EVENT, 0, move |_| {
            inner_log.borrow_mut().push("first".to_string());
            if !added.replace(true)
                && let Some(dispatcher) = weak.upgrade()
            {
                dispatcher.subscribe(TEST_EVENT, 0, logger(&inner_log, "second"))?;
            }
            Ok(())
        })
        .unwrap();

    dispatcher.publish(&element("<x/>"), Some(TEST_EVENT));
    assert_eq!(entries(&log), ["first"]);
    dispatcher.publish(&element("<x/>"), Some(TEST_EVENT));
    assert_eq!(entries(&log), ["first", "first", "second"]);
}

#[test]
fn nested_publish_keeps_changes_pending() {
    let dispatcher: Rc<EventDispatcher<Element>> = Rc::new(EventDispatcher::new());
    let log = Log::default();

    let weak = Rc::downgrade(&dispatcher);
    dispatcher
        .subscribe("//event/inner", 0, move |_| {
            if let Some(dispatcher) = weak.upgrade() {
                dispatcher.subscribe("//event/late", 0, |_| Ok(()))?;
            }
            Ok(())
        })
        .unwrap();

    let weak = Rc::downgrade(&dispatcher);
    let inner_log = Rc::clone(&log);
    dispatcher
        .subscribe("//event/outer", 0, move |el| {
            if let Some(dispatcher) = weak.upgrade() {
                dispatcher.publish(el, Some("//event/inner"));
                let late = dispatcher.has_observers("//event/late");
                inner_log.borrow_mut().push(format!("late={late}"));
            }
            Ok(())
        })
        .unwrap();

    dispatcher.publish(&element("<x/>"), Some("//event/outer"));
    assert_eq!(entries(&log), ["late=false"]);
    assert!(dispatcher.has_observers("//event/late"));
}

#[test]
fn running_observer_is_not_reentered() {
    let dispatcher: Rc<EventDispatcher<Element>> = Rc::new(EventDispatcher::new());
    let count = Rc::new(Cell::new(0));

    let weak = Rc::downgrade(&dispatcher);
    let counter = Rc::clone(&count);
    dispatcher
        .subscribe(TEST_EVENT, 0, move |el: &Element| {
            counter.set(counter.get() + 1);
            if let Some(dispatcher) = weak.upgrade() {
                assert!(!dispatcher.publish(el, Some(TEST_EVENT)));
            }
            Ok(())
        })
        .unwrap();

    assert!(dispatcher.publish(&element("<x/>"), Some(TEST_EVENT)));
    assert_eq!(count.get(), 1);
}

#[test]
fn errors_are_contained() {
    let dispatcher = EventDispatcher::new();
    let log = Log::default();
    dispatcher
        .subscribe(TEST_EVENT, 1, |_| Err("observer failure".into()))
        .unwrap();
    dispatcher.subscribe(TEST_EVENT, 0, logger(&log, "after")).unwrap();

    assert!(dispatcher.publish(&element("<x/>"), Some(TEST_EVENT)));
    assert_eq!(entries(&log), ["after"]);
}

#[test]
fn panicking_observer_releases_publish() {
    let dispatcher = EventDispatcher::new();
    let log = Log::default();
    dispatcher
        .subscribe_once(TEST_EVENT, 0, |_| panic!("observer panicked"))
        .unwrap();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        dispatcher.publish(&element("<x/>"), Some(TEST_EVENT))
    }));
    assert!(result.is_err());
    assert!(!dispatcher.has_observers(TEST_EVENT));

    dispatcher.subscribe("//event/later", 0, logger(&log, "later")).unwrap();
    assert!(dispatcher.has_observers("//event/later"));
    assert!(dispatcher.publish(&element("<x/>"), Some("//event/later")));
    assert_eq!(entries(&log), ["later"]);
}

#[test]
fn unsubscribe() {
    let dispatcher = EventDispatcher::new();
    let log = Log::default();
    let first = dispatcher.subscribe(TEST_EVENT, 0, logger(&log, "first")).unwrap();
    let second = dispatcher.subscribe(TEST_EVENT, 3, logger(&log, "second")).unwrap();
    let query = dispatcher.subscribe("/x", 0, logger(&log, "query")).unwrap();
    assert_ne!(first, second);

    dispatcher.unsubscribe(TEST_EVENT, second);
    dispatcher.publish(&element("<x/>"), Some(TEST_EVENT));
    assert_eq!(entries(&log), ["first"]);
    assert_eq!(dispatcher.registry.borrow().named.len(), 1);

    dispatcher.unsubscribe(TEST_EVENT, first);
    assert!(!dispatcher.has_observers(TEST_EVENT));
    assert!(dispatcher.registry.borrow().named.is_empty());

    assert!(dispatcher.has_observers("/x"));
    // Removal needs the matching key
    dispatcher.unsubscribe("/y", query);
    assert!(dispatcher.has_observers("/x"));
    dispatcher.unsubscribe("/x", query);
    assert!(!dispatcher.has_observers("/x"));
    assert!(dispatcher.registry.borrow().queries.is_empty());
}

#[test]
fn unsubscribe_during_publish() {
    let dispatcher: Rc<EventDispatcher<Element>> = Rc::new(EventDispatcher::new());
    let log = Log::default();

    let target = dispatcher.subscribe(TEST_EVENT, 0, logger(&log, "target")).unwrap();
    let weak = Rc::downgrade(&dispatcher);
    dispatcher
        .subscribe(TEST_EVENT, 1, move |_| {
            if let Some(dispatcher) = weak.upgrade() {
                dispatcher.unsubscribe(TEST_EVENT, target);
            }
            Ok(())
        })
        .unwrap();

    // The snapshot taken at publish time still includes the target
    dispatcher.publish(&element("<x/>"), Some(TEST_EVENT));
    assert_eq!(entries(&log), ["target"]);
    dispatcher.publish(&element("<x/>"), Some(TEST_EVENT));
    assert_eq!(entries(&log), ["target"]);
}

#[test]
fn bad_queries() {
    let dispatcher: Rc<EventDispatcher<Element>> = Rc::new(EventDispatcher::new());
    assert!(dispatcher.subscribe("/message[", 0, |_| Ok(())).is_err());
    assert!(dispatcher.subscribe("message", 0, |_| Ok(())).is_err());

    let weak = Rc::downgrade(&dispatcher);
    let failed = Rc::new(Cell::new(false));
    let flag = Rc::clone(&failed);
    dispatcher
        .subscribe(TEST_EVENT, 0, move |_| {
            if let Some(dispatcher) = weak.upgrade() {
                let result = dispatcher.subscribe("/iq[foo()]", 0, |_| Ok(()));
                flag.set(result.is_err());
            }
            Ok(())
        })
        .unwrap();
    dispatcher.publish(&element("<x/>"), Some(TEST_EVENT));
    assert!(failed.get());
    assert!(!dispatcher.has_observers("/iq[foo()]"));
}

enum Payload {
    Data(Vec<u8>),
    Stanza(Element),
}

impl Dispatchable for Payload {
    fn element(&self) -> Option<&Element> {
        match self {
            Payload::Data(_) => None,
            Payload::Stanza(el) => Some(el),
        }
    }
}

#[test]
fn payloads_without_elements() {
    let dispatcher: EventDispatcher<Payload> = EventDispatcher::new();
    let seen = Rc::new(Cell::new(0));
    let counter = Rc::clone(&seen);
    dispatcher
        .subscribe("/*", 0, move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        })
        .unwrap();
    let sizes = Rc::new(Cell::new(0));
    let size = Rc::clone(&sizes);
    dispatcher
        .subscribe("//event/stream/rawin", 0, move |payload: &Payload| {
            if let Payload::Data(data) = payload {
                size.set(data.len());
            }
            Ok(())
        })
        .unwrap();

    assert!(!dispatcher.publish(&Payload::Data(b"<x/>".to_vec()), None));
    assert!(dispatcher.publish(&Payload::Stanza(element("<x/>")), None));
    assert!(dispatcher.publish(&Payload::Data(b"<x/>".to_vec()), Some("//event/stream/rawin")));
    assert_eq!(seen.get(), 1);
    assert_eq!(sizes.get(), 4);
}

#[test]
fn custom_cache_and_prefix() {
    let cache = Arc::new(QueryCache::new());
    let dispatcher: EventDispatcher<Element> =
        EventDispatcher::with_prefix("#").with_cache(Arc::clone(&cache));
    assert_eq!(dispatcher.prefix(), "#");

    dispatcher.subscribe("/a", 0, |_| Ok(())).unwrap();
    dispatcher.subscribe("/a", 1, |_| Ok(())).unwrap();
    dispatcher.subscribe("#started", 0, |_| Ok(())).unwrap();
    assert_eq!(cache.len(), 1);
    assert!(dispatcher.has_observers("#started"));
    assert!(!dispatcher.has_observers(TEST_EVENT));
    // With another prefix this text is a query
    assert!(dispatcher.subscribe(TEST_EVENT, 0, |_| Ok(())).is_ok());
    assert_eq!(cache.len(), 2);
}
