/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::borrow::Cow;

use crate::Element;

/// Result of evaluating a predicate expression.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) enum Value<'a> {
    Null,
    Bool(bool),
    Str(Cow<'a, str>),
}

impl Value<'_> {
    pub(super) fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub(super) fn is_true(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum Function {
    /// `text()`: direct text content of the element.
    Text,
    /// `not(value)`
    Not,
    /// `host(value)`: domain part of a JID.
    Host,
}

impl Function {
    pub(super) fn lookup(name: &str) -> Option<Function> {
        match name {
            "text" => Some(Function::Text),
            "not" => Some(Function::Not),
            "host" => Some(Function::Host),
            _ => None,
        }
    }

    pub(super) fn arity(self) -> usize {
        match self {
            Function::Text => 0,
            Function::Not | Function::Host => 1,
        }
    }

    pub(super) fn call<'a>(self, el: &'a Element, mut args: Vec<Value<'a>>) -> Value<'a> {
        match self {
            Function::Text => Value::Str(Cow::Owned(el.text())),
            Function::Not => Value::Bool(!args.pop().is_some_and(|v| v.is_true())),
            Function::Host => match args.pop() {
                Some(Value::Str(Cow::Borrowed(jid))) => Value::Str(Cow::Borrowed(host(jid))),
                Some(Value::Str(Cow::Owned(jid))) => Value::Str(Cow::Owned(host(&jid).to_string())),
                _ => Value::Null,
            },
        }
    }
}

/// Extracts the domain from a `user@host/resource` shaped address.
pub(super) fn host(jid: &str) -> &str {
    let bare = match jid.split_once('/') {
        Some((bare, _)) => bare,
        None => jid,
    };
    match bare.split_once('@') {
        Some((_, domain)) => domain,
        None => bare,
    }
}
