/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use thiserror::Error;

use crate::SaxError;

/// Error from the element stream and document parsers.
///
/// Any of these is fatal to the stream; the parser has to be reset
/// before it can accept input again.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum ParserError {
    #[error("not enough memory")]
    NoMemory,

    /// The input is not well-formed XML.
    #[error("invalid xml syntax: {0}")]
    BadXml(&'static str),

    /// The input is well-formed so far but breaks the tag nesting or namespace rules.
    #[error("invalid xml stream: {0}")]
    BadStream(&'static str),
}

impl From<SaxError> for ParserError {
    fn from(err: SaxError) -> Self {
        match err {
            SaxError::NoMemory => ParserError::NoMemory,
            SaxError::BadXml(msg) => ParserError::BadXml(msg),
            SaxError::HandlerAbort => ParserError::BadStream(description::UNEXPECTED_HANDLER_ABORT),
        }
    }
}

pub(super) mod description {
    pub(in super::super) const UNEXPECTED_HANDLER_ABORT: &str = "unexpected handler abort";
    pub(in super::super) const NO_DOCUMENT: &str = "no document parsed yet";
    pub(in super::super) const MISMATCHED_ROOT: &str = "mismatched root elements";
    pub(in super::super) const MALFORMED_CLOSE: &str = "malformed element close";
    pub(in super::super) const UNBOUND_PREFIX: &str = "unbound namespace prefix";
    pub(in super::super) const DUPLICATE_ATTRIBUTE: &str =
        "attribute name already used in this tag";
    pub(in super::super) const RESERVED_PREFIX: &str = "xmlns prefix cannot be declared";
    pub(in super::super) const EMPTY_PREFIX_BINDING: &str =
        "namespace prefix cannot be bound to an empty uri";
}
