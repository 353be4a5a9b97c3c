/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::cell::RefCell;
use std::rc::Rc;

use super::XmppError;

type Listener<T> = Box<dyn FnOnce(Result<T, XmppError>)>;

enum Slot<T> {
    Waiting,
    Ready(Result<T, XmppError>),
    Listening(Listener<T>),
    Done,
}

/// A one-shot result which is delivered later by the event loop.
///
/// The stream is single threaded, so this is neither `Send` nor a
/// `Future`. Completion callbacks run on the thread which resolves the
/// promise, in the middle of whatever dispatch caused the resolution.
pub struct Promise<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: 'static> Promise<T> {
    pub fn pending() -> Promise<T> {
        Promise {
            slot: Rc::new(RefCell::new(Slot::Waiting)),
        }
    }

    pub fn ready(result: Result<T, XmppError>) -> Promise<T> {
        Promise {
            slot: Rc::new(RefCell::new(Slot::Ready(result))),
        }
    }

    /// Delivers the result. Returns false if it was already resolved.
    pub fn resolve(&self, result: Result<T, XmppError>) -> bool {
        let listener = {
            let mut slot = self.slot.borrow_mut();
            match std::mem::replace(&mut *slot, Slot::Done) {
                Slot::Waiting => {
                    *slot = Slot::Ready(result);
                    return true;
                }
                Slot::Listening(listener) => listener,
                other => {
                    *slot = other;
                    return false;
                }
            }
        };
        listener(result);
        true
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            *self.slot.borrow(),
            Slot::Waiting | Slot::Listening(_)
        )
    }

    /// Takes the result out if it is available and nobody listens for it.
    pub fn try_take(&self) -> Option<Result<T, XmppError>> {
        let mut slot = self.slot.borrow_mut();
        match std::mem::replace(&mut *slot, Slot::Done) {
            Slot::Ready(result) => Some(result),
            other => {
                *slot = other;
                None
            }
        }
    }

    /// Registers the completion callback.
    ///
    /// Runs it right away if the result is already there. Only one
    /// callback can be attached, a second one replaces the first.
    pub fn on_complete<F>(self, f: F)
    where
        F: FnOnce(Result<T, XmppError>) + 'static,
    {
        let ready = {
            let mut slot = self.slot.borrow_mut();
            match std::mem::replace(&mut *slot, Slot::Done) {
                Slot::Ready(result) => Some(result),
                Slot::Done => None,
                Slot::Waiting | Slot::Listening(_) => {
                    *slot = Slot::Listening(Box::new(f));
                    return;
                }
            }
        };
        if let Some(result) = ready {
            f(result);
        }
    }

    pub fn map<U, F>(self, f: F) -> Promise<U>
    where
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        let mapped = Promise::pending();
        let target = mapped.clone();
        self.on_complete(move |result| {
            target.resolve(result.map(f));
        });
        mapped
    }

    /// Chains another asynchronous step after a successful result.
    pub fn and_then<U, F>(self, f: F) -> Promise<U>
    where
        U: 'static,
        F: FnOnce(T) -> Promise<U> + 'static,
    {
        let chained = Promise::pending();
        let target = chained.clone();
        self.on_complete(move |result| match result {
            Ok(value) => f(value).on_complete(move |result| {
                target.resolve(result);
            }),
            Err(err) => {
                target.resolve(Err(err));
            }
        });
        chained
    }
}
