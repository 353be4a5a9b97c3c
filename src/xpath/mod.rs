/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod cache;
mod error;
mod functions;
mod parser;

use std::borrow::Cow;
use std::ops::ControlFlow;

use crate::Element;
use crate::element::Node;
pub use cache::QueryCache;
pub use error::BadXPath;
use functions::Function;
use functions::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CompareOp {
    Equal,
    NotEqual,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BooleanOp {
    And,
    Or,
}

#[derive(Debug)]
enum Expr {
    Attribute(String),
    /// `@xmlns` is the namespace of the element, not an attribute.
    Namespace,
    Literal(String),
    Call(Function, Vec<Expr>),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    Boolean(Box<Expr>, BooleanOp, Box<Expr>),
}

impl Expr {
    fn eval<'a>(&'a self, el: &'a Element) -> Value<'a> {
        match self {
            Expr::Attribute(name) => match el.attribute(name) {
                Some(value) => Value::Str(Cow::Borrowed(value)),
                None => Value::Null,
            },
            Expr::Namespace => match el.uri.as_deref() {
                Some(uri) => Value::Str(Cow::Borrowed(uri)),
                None => Value::Null,
            },
            Expr::Literal(value) => Value::Str(Cow::Borrowed(value)),
            Expr::Call(function, args) => {
                let args = args.iter().map(|arg| arg.eval(el)).collect();
                function.call(el, args)
            }
            Expr::Compare(lhs, op, rhs) => {
                let equal = lhs.eval(el) == rhs.eval(el);
                Value::Bool(match op {
                    CompareOp::Equal => equal,
                    CompareOp::NotEqual => !equal,
                })
            }
            Expr::Boolean(lhs, op, rhs) => Value::Bool(match op {
                BooleanOp::And => lhs.eval(el).is_true() && rhs.eval(el).is_true(),
                BooleanOp::Or => lhs.eval(el).is_true() || rhs.eval(el).is_true(),
            }),
        }
    }
}

#[derive(Debug)]
enum Predicate {
    /// 1-based position among all children of the parent, text included.
    Index(usize),
    Expr(Expr),
}

impl Predicate {
    fn test(&self, el: &Element, position: Option<usize>) -> bool {
        match self {
            Predicate::Index(index) => position == Some(*index),
            // A bare attribute tests for presence
            Predicate::Expr(expr @ (Expr::Attribute(_) | Expr::Namespace)) => {
                !expr.eval(el).is_null()
            }
            Predicate::Expr(expr) => expr.eval(el).is_true(),
        }
    }
}

/// One step of a compiled query.
#[derive(Debug)]
struct Location {
    /// Step can match at any depth below the context.
    deep: bool,
    /// None for `*`.
    name: Option<String>,
    predicates: Vec<Predicate>,
    child: Option<Box<Location>>,
}

fn child_elements_with_position(el: &Element) -> impl Iterator<Item = (usize, &Element)> {
    el.children()
        .iter()
        .enumerate()
        .filter_map(|(i, node)| match node {
            Node::Element(child) => Some((i + 1, child)),
            _ => None,
        })
}

impl Location {
    fn matches_here(&self, el: &Element, position: Option<usize>) -> bool {
        if let Some(name) = &self.name
            && *name != el.name
        {
            return false;
        }
        self.predicates.iter().all(|p| p.test(el, position))
    }

    /// Calls `visit` with every element where the whole path ends.
    fn walk<'a, F>(&self, el: &'a Element, position: Option<usize>, visit: &mut F) -> ControlFlow<()>
    where
        F: FnMut(&'a Element) -> ControlFlow<()>,
    {
        if self.matches_here(el, position) {
            match &self.child {
                None => visit(el)?,
                Some(child) => {
                    for (pos, c) in child_elements_with_position(el) {
                        child.walk(c, Some(pos), visit)?;
                    }
                }
            }
        }
        if self.deep {
            for (pos, c) in child_elements_with_position(el) {
                self.walk(c, Some(pos), visit)?;
            }
        }
        ControlFlow::Continue(())
    }
}

/// A compiled query of the XPath subset used for stanza routing.
///
/// The first step of the path is matched against the element passed in,
/// so `/message/body` selects the body children of a message stanza.
/// Each step may use `//` instead of `/` to match at any depth.
///
/// Supported predicates are `[N]` positions, `[@attr]` presence,
/// comparisons with `=` and `!=`, `and`, `or`, parentheses and the
/// functions `text()`, `not(value)` and `host(value)`.
///
/// # Examples
///
/// ```
/// use iks_xmlstream::{Element, XPathQuery};
///
/// let presence: Element = "<presence from='user@example.com/home' type='unavailable'/>"
///     .parse()
///     .unwrap();
/// let query = XPathQuery::new("/presence[@type='unavailable']").unwrap();
/// assert!(query.matches(&presence));
/// let query = XPathQuery::new("/presence[host(@from)='example.com']").unwrap();
/// assert!(query.matches(&presence));
/// ```
#[derive(Debug)]
pub struct XPathQuery {
    source: String,
    location: Location,
}

impl XPathQuery {
    pub fn new(text: &str) -> Result<XPathQuery, BadXPath> {
        Ok(XPathQuery {
            source: text.to_string(),
            location: parser::compile(text)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, el: &Element) -> bool {
        self.location
            .walk(el, None, &mut |_| ControlFlow::Break(()))
            .is_break()
    }

    /// Returns all matching elements, or None if there are none.
    pub fn query_for_nodes<'a>(&self, el: &'a Element) -> Option<Vec<&'a Element>> {
        let mut nodes: Vec<&'a Element> = Vec::new();
        let _ = self.location.walk(el, None, &mut |node| {
            // Nested any-depth steps can reach the same node twice
            if !nodes.iter().any(|n| std::ptr::eq(*n, node)) {
                nodes.push(node);
            }
            ControlFlow::Continue(())
        });
        if nodes.is_empty() { None } else { Some(nodes) }
    }

    /// Concatenated text content of the matching elements.
    pub fn query_for_string(&self, el: &Element) -> String {
        let mut text = String::new();
        if let Some(nodes) = self.query_for_nodes(el) {
            for node in nodes {
                text.push_str(&node.text());
            }
        }
        text
    }

    /// Direct text children of the matching elements, or None if nothing matches.
    pub fn query_for_string_list(&self, el: &Element) -> Option<Vec<String>> {
        let nodes = self.query_for_nodes(el)?;
        let mut strings = Vec::new();
        for node in nodes {
            for child in node.children() {
                if let Node::Text(text) = child {
                    strings.push(text.clone());
                }
            }
        }
        Some(strings)
    }
}

impl PartialEq for XPathQuery {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for XPathQuery {}

impl std::hash::Hash for XPathQuery {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl std::fmt::Display for XPathQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for XPathQuery {
    type Err = BadXPath;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        XPathQuery::new(s)
    }
}
