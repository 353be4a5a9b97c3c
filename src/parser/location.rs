/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Display;

/// A position in the parser input stream.
///
/// Returned from [SaxParser::location()](crate::SaxParser::location), it points
/// just after the last consumed byte. Over a long-lived XMPP connection this is
/// the position in the current stream, counted from the last parser reset.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Location {
    /// Byte position in the input stream.
    pub bytes: usize,
    /// Number of newline characters seen.
    pub lines: usize,
    /// Characters after the last newline. UTF-8 continuation bytes are not counted.
    pub column: usize,
}

impl Location {
    pub fn new() -> Self {
        Location::default()
    }

    pub(super) fn advance(&mut self, c: u8) {
        self.bytes += 1;
        if c == b'\n' {
            self.lines += 1;
            self.column = 0;
        } else if c & 0xc0 != 0x80 {
            self.column += 1;
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}, column {} (byte {})",
            self.lines + 1,
            self.column,
            self.bytes
        )
    }
}
