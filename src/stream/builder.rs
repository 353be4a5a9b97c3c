/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::collections::VecDeque;

use crate::Element;
use crate::SaxElement;
use crate::SaxError;
use crate::SaxHandler;
use crate::element::NS_XML;

use super::StreamEvent;
use super::error::ParserError;
use super::error::description;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum Mode {
    /// Stanzas are handed out as they close, the root keeps no children.
    Stream,
    /// The whole tree is kept.
    Document,
}

struct PendingTag {
    name: String,
    attributes: Vec<(String, String)>,
}

fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Builds elements from the SAX events while tracking namespace scopes.
pub(super) struct TreeBuilder {
    mode: Mode,
    pending: Option<PendingTag>,
    frames: Vec<Vec<(String, String)>>,
    defaults: Vec<Option<String>>,
    root: Option<Element>,
    stack: Vec<Element>,
    document: Option<Element>,
    ready: VecDeque<StreamEvent>,
    error: Option<ParserError>,
}

impl TreeBuilder {
    pub(super) fn new(mode: Mode) -> TreeBuilder {
        TreeBuilder {
            mode,
            pending: None,
            frames: Vec::new(),
            defaults: Vec::new(),
            root: None,
            stack: Vec::new(),
            document: None,
            ready: VecDeque::new(),
            error: None,
        }
    }

    pub(super) fn reset(&mut self) {
        self.pending = None;
        self.frames.clear();
        self.defaults.clear();
        self.root = None;
        self.stack.clear();
        self.document = None;
        self.ready.clear();
        self.error = None;
    }

    pub(super) fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    pub(super) fn open_elements(&self) -> usize {
        self.stack.len()
    }

    pub(super) fn next_event(&mut self) -> Option<StreamEvent> {
        self.ready.pop_front()
    }

    pub(super) fn take_document(&mut self) -> Option<Element> {
        self.document.take()
    }

    pub(super) fn take_error(&mut self) -> ParserError {
        self.error
            .take()
            .unwrap_or(ParserError::BadStream(description::UNEXPECTED_HANDLER_ABORT))
    }

    fn current_default(&self) -> Option<String> {
        self.defaults.last().cloned().flatten()
    }

    fn find_uri(&self, prefix: &str) -> Result<String, ParserError> {
        if prefix == "xml" {
            return Ok(NS_XML.to_string());
        }
        for frame in self.frames.iter().rev() {
            if let Some((_, uri)) = frame.iter().find(|(p, _)| p == prefix) {
                return Ok(uri.clone());
            }
        }
        Err(ParserError::BadStream(description::UNBOUND_PREFIX))
    }

    fn open_tag(&mut self, empty: bool) -> Result<(), ParserError> {
        let Some(tag) = self.pending.take() else {
            return Ok(());
        };

        let mut frame = Vec::new();
        let mut default = self.current_default();
        let mut plain = Vec::new();
        for (name, value) in tag.attributes {
            if name == "xmlns" {
                default = if value.is_empty() { None } else { Some(value) };
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                if prefix == "xmlns" {
                    return Err(ParserError::BadStream(description::RESERVED_PREFIX));
                }
                if value.is_empty() {
                    return Err(ParserError::BadStream(description::EMPTY_PREFIX_BINDING));
                }
                frame.push((prefix.to_string(), value));
            } else {
                plain.push((name, value));
            }
        }
        self.frames.push(frame);
        self.defaults.push(default.clone());

        let (prefix, local) = split_name(&tag.name);
        let uri = match prefix {
            None => default.clone(),
            Some(prefix) => Some(self.find_uri(prefix)?),
        };
        let mut el = Element::with_default_uri(local, uri.as_deref(), default.as_deref());
        if let Some(frame) = self.frames.last() {
            for (prefix, uri) in frame {
                el.add_local_prefix(prefix, uri);
            }
        }
        for (name, value) in plain {
            let (prefix, local) = split_name(&name);
            // Attributes only get a namespace from an explicit prefix
            let uri = match prefix {
                None => None,
                Some(prefix) => Some(self.find_uri(prefix)?),
            };
            if el.attribute_ns(uri.as_deref(), local).is_some() {
                return Err(ParserError::BadXml(description::DUPLICATE_ATTRIBUTE));
            }
            el.set_attribute_ns(uri.as_deref(), local, &value);
        }

        if self.mode == Mode::Stream && self.root.is_none() {
            self.ready.push_back(StreamEvent::DocumentStart(el.clone()));
            self.root = Some(el);
            if empty {
                self.end_root();
            }
            return Ok(());
        }

        self.stack.push(el);
        if empty {
            self.close_element();
        }
        Ok(())
    }

    fn end_tag(&mut self, name: &str) -> Result<(), ParserError> {
        let (prefix, local) = split_name(name);
        let uri = match prefix {
            None => self.current_default(),
            Some(prefix) => Some(self.find_uri(prefix)?),
        };
        let uri = uri.as_deref();

        match self.stack.last() {
            Some(top) => {
                if !top.is(local, uri) {
                    if self.mode == Mode::Document && self.stack.len() == 1 {
                        return Err(ParserError::BadStream(description::MISMATCHED_ROOT));
                    }
                    return Err(ParserError::BadStream(description::MALFORMED_CLOSE));
                }
                self.close_element();
            }
            None => match &self.root {
                Some(root) => {
                    if !root.is(local, uri) {
                        return Err(ParserError::BadStream(description::MISMATCHED_ROOT));
                    }
                    self.end_root();
                }
                None => return Err(ParserError::BadStream(description::MALFORMED_CLOSE)),
            },
        }
        Ok(())
    }

    fn close_element(&mut self) {
        self.frames.pop();
        self.defaults.pop();
        let Some(el) = self.stack.pop() else {
            return;
        };
        match self.stack.last_mut() {
            Some(parent) => {
                parent.add_child(el);
            }
            None => match self.mode {
                Mode::Stream => self.ready.push_back(StreamEvent::ElementComplete(el)),
                Mode::Document => self.document = Some(el),
            },
        }
    }

    fn end_root(&mut self) {
        self.frames.pop();
        self.defaults.pop();
        self.root = None;
        self.ready.push_back(StreamEvent::DocumentEnd);
    }

    fn append(&mut self, element: &SaxElement) -> Result<(), ParserError> {
        match element {
            SaxElement::StartTag(name) => {
                self.pending = Some(PendingTag {
                    name: name.to_string(),
                    attributes: Vec::new(),
                });
            }
            SaxElement::Attribute(name, value) => {
                if let Some(tag) = self.pending.as_mut() {
                    if tag.attributes.iter().any(|(n, _)| n == name) {
                        return Err(ParserError::BadXml(description::DUPLICATE_ATTRIBUTE));
                    }
                    tag.attributes.push((name.to_string(), value.to_string()));
                }
            }
            SaxElement::StartTagContent => self.open_tag(false)?,
            SaxElement::StartTagEmpty => self.open_tag(true)?,
            SaxElement::EndTag(name) => self.end_tag(name)?,
            SaxElement::CData(text) => {
                // Text directly under the stream root (keepalives) is dropped
                if let Some(top) = self.stack.last_mut() {
                    top.add_text(text);
                }
            }
        }
        Ok(())
    }
}

impl SaxHandler for TreeBuilder {
    fn handle_element(&mut self, element: &SaxElement) -> Result<(), SaxError> {
        match self.append(element) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.error = Some(err);
                Err(SaxError::HandlerAbort)
            }
        }
    }

    fn paused(&self) -> bool {
        !self.ready.is_empty()
    }
}
