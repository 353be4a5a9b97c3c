/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::Element;
use super::Node;
use super::QName;

pub struct Attributes<'a> {
    inner: std::slice::Iter<'a, (QName, String)>,
}

impl<'a> Attributes<'a> {
    pub(super) fn new(attributes: &'a [(QName, String)]) -> Self {
        Attributes {
            inner: attributes.iter(),
        }
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = (&'a QName, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(qname, value)| (qname, value.as_str()))
    }
}

/// Iterator over the child elements, skipping text and raw markup.
#[derive(Clone)]
pub struct ChildElements<'a> {
    inner: std::slice::Iter<'a, Node>,
    name: Option<&'a str>,
}

impl<'a> ChildElements<'a> {
    pub(super) fn new(children: &'a [Node], name: Option<&'a str>) -> Self {
        ChildElements {
            inner: children.iter(),
            name,
        }
    }
}

impl<'a> Iterator for ChildElements<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        for node in self.inner.by_ref() {
            if let Node::Element(el) = node {
                match self.name {
                    Some(name) if el.name != name => continue,
                    _ => return Some(el),
                }
            }
        }
        None
    }
}
