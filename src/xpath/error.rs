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

/// The query text could not be compiled.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("XPath syntax error at offset {position}: {description}")]
pub struct BadXPath {
    pub description: &'static str,
    /// Byte offset in the query text.
    pub position: usize,
}

pub(super) mod description {
    pub(in super::super) const EMPTY_QUERY: &str = "query is empty";
    pub(in super::super) const UNEXPECTED_CHAR: &str = "unexpected character";
    pub(in super::super) const UNTERMINATED_STRING: &str = "string literal is not terminated";
    pub(in super::super) const BAD_INDEX: &str = "index must be a positive number";
    pub(in super::super) const EXPECTED_STEP: &str = "expected '/' or '//'";
    pub(in super::super) const EXPECTED_NAME: &str = "expected an element name or '*'";
    pub(in super::super) const EXPECTED_ATTRIBUTE: &str = "expected an attribute name after '@'";
    pub(in super::super) const EXPECTED_BRACKET: &str = "expected ']'";
    pub(in super::super) const EXPECTED_PAREN: &str = "expected ')'";
    pub(in super::super) const EXPECTED_VALUE: &str =
        "expected an attribute, a function call or a string";
    pub(in super::super) const UNKNOWN_FUNCTION: &str = "unknown function";
    pub(in super::super) const WRONG_ARGUMENT_COUNT: &str = "wrong number of function arguments";
}
