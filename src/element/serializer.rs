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

use super::Element;
use super::NS_XML;
use super::Node;
use crate::entities::escape;

/// Namespace to prefix assignments used while serializing.
///
/// A table can be shared between several serialization calls, for example
/// all stanzas of one XMPP stream, so that the same namespace keeps the
/// same prefix. Fresh prefixes are named `ns0`, `ns1` and so on.
#[derive(Clone, Debug)]
pub struct Prefixes {
    map: HashMap<String, String>,
    counter: usize,
}

impl Prefixes {
    pub fn new() -> Prefixes {
        let mut map = HashMap::new();
        map.insert(NS_XML.to_string(), "xml".to_string());
        Prefixes { map, counter: 0 }
    }

    /// Binds a prefix to a namespace, replacing any earlier binding of the namespace.
    pub fn with(mut self, uri: &str, prefix: &str) -> Prefixes {
        self.insert(uri, prefix);
        self
    }

    pub fn insert(&mut self, uri: &str, prefix: &str) {
        self.map.insert(uri.to_string(), prefix.to_string());
    }

    pub fn get(&self, uri: &str) -> Option<&str> {
        self.map.get(uri).map(String::as_str)
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.map.contains_key(uri)
    }

    fn prefix_for(&mut self, uri: &str) -> String {
        if let Some(prefix) = self.map.get(uri) {
            return prefix.clone();
        }
        let prefix = loop {
            let candidate = format!("ns{}", self.counter);
            self.counter += 1;
            if !self.map.values().any(|p| *p == candidate) {
                break candidate;
            }
        };
        self.map.insert(uri.to_string(), prefix.clone());
        prefix
    }
}

impl Default for Prefixes {
    fn default() -> Self {
        Self::new()
    }
}

fn write_attribute(buf: &mut String, prefix: Option<&str>, name: &str, value: &str) {
    buf.push(' ');
    if let Some(prefix) = prefix {
        buf.push_str(prefix);
        buf.push(':');
    }
    buf.push_str(name);
    buf.push_str("='");
    escape(value, buf, true);
    buf.push('\'');
}

fn write_start(buf: &mut String, prefix: Option<&str>, name: &str) {
    if let Some(prefix) = prefix {
        buf.push_str(prefix);
        buf.push(':');
    }
    buf.push_str(name);
}

pub(super) fn write_element(
    el: &Element,
    buf: &mut String,
    prefixes: &mut Prefixes,
    current_default: Option<&str>,
    scope: &mut Vec<String>,
    close_tag: bool,
) {
    let scope_mark = scope.len();
    for (prefix, uri) in &el.local_prefixes {
        prefixes.insert(uri, prefix);
        scope.push(prefix.clone());
    }

    // An element without a namespace has to undeclare an inherited default.
    let uri = el.uri.as_deref();
    let default_uri = match (uri, el.default_uri.as_deref()) {
        (None, _) => None,
        (Some(_), Some(default_uri)) => Some(default_uri),
        (Some(_), None) => current_default,
    };

    let mut prefix: Option<String> = None;
    let mut in_scope = false;
    if let Some(uri) = uri
        && (Some(uri) != default_uri || prefixes.contains(uri))
    {
        let p = prefixes.prefix_for(uri);
        in_scope = scope.contains(&p);
        prefix = Some(p);
    }

    buf.push('<');
    write_start(buf, prefix.as_deref(), &el.name);
    if let (Some(p), Some(uri)) = (prefix.as_deref(), uri)
        && !in_scope
    {
        write_attribute(buf, Some("xmlns"), p, uri);
        scope.push(p.to_string());
        in_scope = true;
    }

    if default_uri != current_default && (uri != default_uri || prefix.is_none() || !in_scope) {
        write_attribute(buf, None, "xmlns", default_uri.unwrap_or(""));
    }
    for (p, u) in &el.local_prefixes {
        write_attribute(buf, Some("xmlns"), p, u);
    }

    for (qname, value) in &el.attributes {
        match qname.uri.as_deref() {
            Some(attr_uri) => {
                let attr_prefix = prefixes.prefix_for(attr_uri);
                if !scope.contains(&attr_prefix) {
                    write_attribute(buf, Some("xmlns"), &attr_prefix, attr_uri);
                    scope.push(attr_prefix.clone());
                }
                write_attribute(buf, Some(&attr_prefix), &qname.name, value);
            }
            None => write_attribute(buf, None, &qname.name, value),
        }
    }

    if !close_tag {
        buf.push('>');
        return;
    }

    if el.children.is_empty() {
        buf.push_str("/>");
    } else {
        buf.push('>');
        for child in &el.children {
            match child {
                Node::Element(child) => {
                    write_element(child, buf, prefixes, default_uri, scope, true);
                }
                Node::Text(text) => escape(text, buf, false),
                Node::Raw(markup) => buf.push_str(markup),
            }
        }
        buf.push_str("</");
        write_start(buf, prefix.as_deref(), &el.name);
        buf.push('>');
    }

    scope.truncate(scope_mark);
}
