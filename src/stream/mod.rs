/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod builder;
mod error;

use crate::Element;
use crate::Location;
use crate::SaxError;
use crate::SaxParser;
use builder::Mode;
use builder::TreeBuilder;
pub use error::ParserError;
use error::description;

/// Lifecycle events of an XML stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// The start tag of the stream root is complete.
    ///
    /// The element carries the root name, namespace and attributes. It
    /// never has children.
    DocumentStart(Element),

    /// A direct child of the root is closed.
    ///
    /// This is a stanza in XMPP terms. Once handed out, the element is no
    /// longer retained by the stream.
    ElementComplete(Element),

    /// The root element is closed.
    DocumentEnd,
}

/// Callbacks for [ElementStream::feed()].
pub trait StreamHandler {
    fn document_start(&mut self, root: Element);
    fn element_complete(&mut self, element: Element);
    fn document_end(&mut self);
}

/// Incremental parser for a long lived XML stream.
///
/// Bytes can be delivered in chunks of any size. Only the stream root and
/// the stanza currently being received are kept in memory.
///
/// # Examples
///
/// ```
/// use iks_xmlstream::{ElementStream, StreamEvent};
///
/// let mut stream = ElementStream::new();
/// let input = b"<stream xmlns='jabber:client'><message><body>hi</body></message>";
/// let mut events = Vec::new();
/// let mut pos = 0;
/// while let Some((event, consumed)) = stream.parse_bytes(&input[pos..]).unwrap() {
///     pos += consumed;
///     events.push(event);
/// }
/// assert_eq!(events.len(), 2);
/// if let StreamEvent::ElementComplete(msg) = &events[1] {
///     assert_eq!(msg.uri.as_deref(), Some("jabber:client"));
///     assert_eq!(msg.first_child_named("body").unwrap().text(), "hi");
/// }
/// ```
pub struct ElementStream {
    parser: SaxParser,
    builder: TreeBuilder,
}

impl ElementStream {
    pub fn new() -> ElementStream {
        ElementStream {
            parser: SaxParser::new(),
            builder: TreeBuilder::new(Mode::Stream),
        }
    }

    /// Discards all state, ready for a brand new stream.
    pub fn reset(&mut self) {
        self.parser.reset();
        self.builder.reset();
    }

    /// Parses bytes until the next lifecycle event.
    ///
    /// Returns the event and the number of bytes consumed to produce it. The
    /// rest of the input should be passed in again. `None` means all bytes were
    /// consumed without completing an event.
    pub fn parse_bytes(&mut self, bytes: &[u8]) -> Result<Option<(StreamEvent, usize)>, ParserError> {
        if let Some(event) = self.builder.next_event() {
            return Ok(Some((event, 0)));
        }
        let consumed = match self.parser.parse_bytes(&mut self.builder, bytes) {
            Ok(consumed) => consumed,
            Err(SaxError::HandlerAbort) => return Err(self.builder.take_error()),
            Err(err) => return Err(err.into()),
        };
        Ok(self.builder.next_event().map(|event| (event, consumed)))
    }

    /// Parses all given bytes and invokes the handler for each event.
    pub fn feed(
        &mut self,
        bytes: &[u8],
        handler: &mut impl StreamHandler,
    ) -> Result<(), ParserError> {
        let mut pos = 0;
        while let Some((event, consumed)) = self.parse_bytes(&bytes[pos..])? {
            pos += consumed;
            match event {
                StreamEvent::DocumentStart(root) => handler.document_start(root),
                StreamEvent::ElementComplete(el) => handler.element_complete(el),
                StreamEvent::DocumentEnd => handler.document_end(),
            }
        }
        Ok(())
    }

    /// The stream root, between the document start and end events.
    pub fn root(&self) -> Option<&Element> {
        self.builder.root()
    }

    /// Number of open elements below the root.
    pub fn open_elements(&self) -> usize {
        self.builder.open_elements()
    }

    pub fn location(&self) -> Location {
        self.parser.location()
    }
}

impl Default for ElementStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Parser for a complete XML document.
pub struct DocumentParser {
    parser: SaxParser,
    builder: TreeBuilder,
}

impl DocumentParser {
    pub fn new() -> DocumentParser {
        DocumentParser {
            parser: SaxParser::new(),
            builder: TreeBuilder::new(Mode::Document),
        }
    }

    pub fn parse_bytes(&mut self, bytes: &[u8]) -> Result<(), ParserError> {
        match self.parser.parse_bytes(&mut self.builder, bytes) {
            Ok(_) => Ok(()),
            Err(SaxError::HandlerAbort) => Err(self.builder.take_error()),
            Err(err) => Err(err.into()),
        }
    }

    /// Checks that the document is complete and returns its root element.
    pub fn into_element(mut self) -> Result<Element, ParserError> {
        self.parser.parse_finish()?;
        self.builder
            .take_document()
            .ok_or(ParserError::BadXml(description::NO_DOCUMENT))
    }

    pub fn location(&self) -> Location {
        self.parser.location()
    }
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
