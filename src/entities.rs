/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

pub mod predefined {
    pub const LT: &str = "&lt;";
    pub const GT: &str = "&gt;";
    pub const AMP: &str = "&amp;";
    pub const APOS: &str = "&apos;";
    pub const QUOT: &str = "&quot;";
}

fn needs_escape(c: char, in_attribute: bool) -> bool {
    match c {
        '<' | '>' | '&' => true,
        '\'' | '"' => in_attribute,
        _ => false,
    }
}

/// Size of the text after escaping.
///
/// Quote characters only count as escaped in attribute values.
pub fn escaped_size(s: &str, in_attribute: bool) -> usize {
    let mut size = 0;
    for c in s.chars() {
        size += match c {
            '<' => predefined::LT.len(),
            '>' => predefined::GT.len(),
            '&' => predefined::AMP.len(),
            '\'' if in_attribute => predefined::APOS.len(),
            '"' if in_attribute => predefined::QUOT.len(),
            _ => c.len_utf8(),
        }
    }

    size
}

/// Appends the escaped form of the text to the buffer.
pub fn escape(s: &str, buf: &mut String, in_attribute: bool) {
    let mut back = 0;
    for (pos, c) in s.char_indices() {
        if !needs_escape(c, in_attribute) {
            continue;
        }
        buf.push_str(&s[back..pos]);
        buf.push_str(match c {
            '<' => predefined::LT,
            '>' => predefined::GT,
            '&' => predefined::AMP,
            '\'' => predefined::APOS,
            _ => predefined::QUOT,
        });
        back = pos + 1;
    }
    buf.push_str(&s[back..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_size() {
        const NOESCAPE: &str = "abc$#@!%^*(){}[]=-+/.,;:FDSF3443";
        assert_eq!(escaped_size(NOESCAPE, true), NOESCAPE.len());
        assert_eq!(escaped_size("abc&def", false), "abc&amp;def".len());
        assert_eq!(
            escaped_size("<>&'\"", true),
            "&lt;&gt;&amp;&apos;&quot;".len()
        );
        assert_eq!(escaped_size("<>&'\"", false), "&lt;&gt;&amp;'\"".len());
    }

    #[test]
    fn escaping() {
        let mut buf = String::new();
        escape("a<b & 'c'", &mut buf, false);
        assert_eq!(buf, "a&lt;b &amp; 'c'");

        buf.clear();
        escape("say \"hi\" it's", &mut buf, true);
        assert_eq!(buf, "say &quot;hi&quot; it&apos;s");

        buf.clear();
        escape("müde > ☃", &mut buf, false);
        assert_eq!(buf, "müde &gt; ☃");
        assert_eq!(buf.len(), escaped_size("müde > ☃", false));
    }
}
