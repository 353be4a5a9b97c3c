/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::*;

use SaxElement::Attribute as Attr;
use SaxElement::CData;
use SaxElement::EndTag as End;
use SaxElement::StartTag as Start;
use SaxElement::StartTagContent as Content;
use SaxElement::StartTagEmpty as Empty;

struct Tester<'a> {
    expected: &'a [SaxElement<'a>],
    current: usize,
    cdata_buf: String,
}

impl<'a> Tester<'a> {
    fn new(expected: &'a [SaxElement]) -> Tester<'a> {
        Tester {
            expected,
            current: 0,
            cdata_buf: String::new(),
        }
    }

    fn check_location(&self, parser: &SaxParser, s: &str) {
        let nr_lines = s.matches("\n").count();
        let nr_column = s.rsplit('\n').next().unwrap().chars().count();
        let location = parser.location();
        assert_eq!(location.lines, nr_lines);
        assert_eq!(location.column, nr_column);
        assert_eq!(location.bytes, s.len());
    }

    fn check(&mut self, s: &str) {
        let mut parser = SaxParser::new();
        assert!(parser.parse_bytes_finish(self, s.as_bytes()).is_ok());
        assert_eq!(self.current, self.expected.len());
        self.check_location(&parser, s);

        // now try byte by byte
        parser.reset();
        self.current = 0;
        self.cdata_buf.clear();
        for i in 0..s.len() {
            assert_eq!(parser.parse_bytes(self, &s.as_bytes()[i..i + 1]), Ok(1));
        }
        assert!(parser.parse_finish().is_ok());
        assert_eq!(self.current, self.expected.len());
        self.check_location(&parser, s);
    }
}

impl SaxHandler for Tester<'_> {
    fn handle_element(&mut self, element: &SaxElement) -> Result<(), SaxError> {
        assert!(self.current < self.expected.len());
        if let SaxElement::CData(cdata) = element {
            if let SaxElement::CData(cdata2) = self.expected[self.current] {
                self.cdata_buf.push_str(cdata);
                if self.cdata_buf.len() >= cdata2.len() {
                    assert_eq!(self.cdata_buf, cdata2);
                    self.current += 1;
                    self.cdata_buf.clear();
                }
            } else {
                assert_eq!(element, &self.expected[self.current]);
            }
        } else {
            assert_eq!(element, &self.expected[self.current]);
            self.current += 1;
        }
        Ok(())
    }
}

struct BadTester {
    bad_byte: usize,
}

impl BadTester {
    fn new(bad_byte: usize) -> BadTester {
        BadTester { bad_byte }
    }

    fn check(&mut self, s: &str) {
        self.check_bytes(s.as_bytes());
    }

    fn check_bytes(&mut self, bytes: &[u8]) {
        let mut parser = SaxParser::new();
        let result = parser.parse_bytes_finish(self, bytes);
        assert!(matches!(result, Err(SaxError::BadXml(_))), "{:?}", result);
        assert_eq!(parser.location().bytes, self.bad_byte);
    }
}

impl SaxHandler for BadTester {
    fn handle_element(&mut self, _element: &SaxElement) -> Result<(), SaxError> {
        Ok(())
    }
}

#[test]
fn tags() {
    Tester::new(&[Start("lonely"), Empty]).check("<lonely/>");

    Tester::new(&[Start("lonely"), Empty]).check("   <lonely/>    ");

    Tester::new(&[
        Start("parent"),
        Content,
        Start("child"),
        Empty,
        Start("child"),
        Empty,
        CData("child"),
        End("parent"),
    ])
    .check("<?xml version='1.0'?><parent><child/><child/>child</parent>");

    Tester::new(&[
        Start("parent"),
        Content,
        Start("empty"),
        Empty,
        Start("b"),
        Content,
        CData("lala"),
        End("b"),
        End("parent"),
    ])
    .check("<parent  ><empty \t /><b>lala</b \n></parent>");

    Tester::new(&[
        Start("mytag"),
        Attr("abc", "123"),
        Attr("id", "XC72"),
        Content,
        End("mytag"),
    ])
    .check("<mytag abc='123' id=\"XC72\"></mytag>");

    Tester::new(&[
        Start("a"),
        Content,
        Start("b"),
        Attr("x1", "lala"),
        Empty,
        Start("c"),
        Attr("x2", "bibi"),
        Empty,
        End("a"),
    ])
    .check("<a><b x1 ='lala'/><c x2\t= \t'bibi'/></a>");

    Tester::new(&[
        Start("tag"),
        Attr("a", "12\"34"),
        Attr("b", "123'456"),
        Empty,
    ])
    .check("<tag a='12\"34' b=\"123'456\" />");

    Tester::new(&[
        Start("stream:stream"),
        Attr("xmlns", "jabber:client"),
        Attr("xmlns:stream", "http://etherx.jabber.org/streams"),
        Content,
        Start("message"),
        Content,
        Start("body"),
        Content,
        CData("john&mary"),
        End("body"),
        End("message"),
        End("stream:stream"),
    ])
    .check(
        "<stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams'>\
         <message><body>john&amp;mary</body></message></stream:stream>",
    );
}

#[test]
fn comments() {
    Tester::new(&[
        Start("item"),
        Attr("url", "http://jabber.org"),
        Content,
        CData("Jabber Site"),
        End("item"),
    ])
    .check("<item url='http://jabber.org'><!-- little comment -->Jabber Site</item>");

    Tester::new(&[
        Start("index"),
        Content,
        Start("item"),
        Attr("name", "lala"),
        Attr("page", "42"),
        Empty,
        End("index"),
    ])
    .check("<index><!-- <item> - tag has no childs --><item name='lala' page='42'/></index>");

    Tester::new(&[Start("empty"), Empty]).check("<!-- comment --> <empty/> <!-- lala -->");
}

#[test]
fn cdatas() {
    Tester::new(&[
        Start("ka"),
        Content,
        CData("1234 <ka> lala ] ]] ]]] 4321"),
        End("ka"),
    ])
    .check("<ka>1234<![CDATA[ <ka> lala ] ]] ]]] ]]>4321</ka>");

    Tester::new(&[Start("data"), Content, CData("[TEST]]"), End("data")])
        .check("<data><![CDATA[[TEST]]]]></data>");

    // Multi-byte characters are split by the byte by byte pass
    Tester::new(&[
        Start("a"),
        Content,
        CData("[[bg:Чингис хан]][[bn:চেঙ্গিজ খান]]"),
        End("a"),
    ])
    .check("<a>[[bg:Чингис хан]][[bn:চেঙ্গিজ খান]]</a>");

    Tester::new(&[
        Start("a"),
        Content,
        CData("müde ☃ \u{1f600}"),
        End("a"),
    ])
    .check("<a><![CDATA[müde ☃ \u{1f600}]]></a>");
}

#[test]
fn dtds_and_pis() {
    Tester::new(&[Start("x"), Content, CData("foo"), End("x")])
        .check(" <!DOCTYPE greeting [ <!ELEMENT greeting (#PCDATA)> ]> <x>foo</x>");

    Tester::new(&[Start("a"), Content, CData("bibi"), End("a")]).check("<a><?xml lala?>bibi</a>");
}

#[test]
fn entities() {
    Tester::new(&[
            Start("body"),
            Content,
            CData("I'm fixing parser&tester for \"<\" and \">\" chars."),
            End("body"),
        ])
        .check("<body>I&apos;m fixing parser&amp;tester for &quot;&lt;&quot; and &quot;&gt;&quot; chars.</body>");

    Tester::new(&[Start("a"), Content, CData(";AB;"), End("a")])
        .check("<a>&#x3B;&#65;&#x42;&#x3b;</a>");

    Tester::new(&[
        Start("a"),
        Content,
        CData(" \u{90} \u{900} \u{10abc} "),
        End("a"),
    ])
    .check("<a> &#x90; &#x900; &#x10abc; </a>");

    Tester::new(&[Start("a"), Attr("b", "a&b BA"), Content, End("a")])
        .check("<a b='a&amp;b &#x42;&#65;'></a>");
}

#[test]
fn long_tag() {
    let name = "abc".repeat(500);
    let xml = format!("<{}></{}>", name, name);

    Tester::new(&[Start(&name), Content, End(&name)]).check(&xml);
}

#[test]
fn location() {
    Tester::new(&[Start("a"), Content, CData("\n\n ü"), End("a")]).check("<a>\n\n ü</a>");
}

struct Pauser {
    events: Vec<String>,
    pause_after_content: bool,
    paused: bool,
}

impl SaxHandler for Pauser {
    fn handle_element(&mut self, element: &SaxElement) -> Result<(), SaxError> {
        self.events.push(format!("{:?}", element));
        if self.pause_after_content && *element == SaxElement::StartTagContent {
            self.paused = true;
        }
        Ok(())
    }

    fn paused(&self) -> bool {
        self.paused
    }
}

#[test]
fn pause_and_resume() {
    let xml = b"<root a='1'><child/>text</root>";
    let mut handler = Pauser {
        events: Vec::new(),
        pause_after_content: true,
        paused: false,
    };
    let mut parser = SaxParser::new();

    let consumed = parser.parse_bytes(&mut handler, xml).unwrap();
    assert_eq!(consumed, "<root a='1'>".len());
    assert_eq!(parser.location().bytes, consumed);
    assert_eq!(parser.depth(), 1);
    assert_eq!(handler.events.len(), 3);

    handler.paused = false;
    handler.pause_after_content = false;
    let rest = parser.parse_bytes(&mut handler, &xml[consumed..]).unwrap();
    assert_eq!(consumed + rest, xml.len());
    assert!(parser.parse_finish().is_ok());
    assert_eq!(
        handler.events,
        vec![
            "StartTag(\"root\")",
            "Attribute(\"a\", \"1\")",
            "StartTagContent",
            "StartTag(\"child\")",
            "StartTagEmpty",
            "CData(\"text\")",
            "EndTag(\"root\")",
        ]
    );
}

#[test]
fn paused_handler_consumes_nothing() {
    let mut handler = Pauser {
        events: Vec::new(),
        pause_after_content: false,
        paused: true,
    };
    let mut parser = SaxParser::new();
    assert_eq!(parser.parse_bytes(&mut handler, b"<a/>"), Ok(0));
    assert!(handler.events.is_empty());
}

#[test]
fn split_character_at_chunk_end() {
    let mut handler = Pauser {
        events: Vec::new(),
        pause_after_content: false,
        paused: false,
    };
    let mut parser = SaxParser::new();
    assert_eq!(parser.parse_bytes(&mut handler, b"<a>x\xe2\x98"), Ok(6));
    assert_eq!(parser.parse_bytes(&mut handler, b"\x83y</a>"), Ok(6));
    assert!(parser.parse_finish().is_ok());
    assert_eq!(
        handler.events,
        vec![
            "StartTag(\"a\")",
            "StartTagContent",
            "CData(\"x\")",
            "CData(\"☃y\")",
            "EndTag(\"a\")",
        ]
    );
}

#[test]
fn reuse_after_error() {
    let mut handler = BadTester::new(0);
    let mut parser = SaxParser::new();
    assert!(parser.parse_bytes(&mut handler, b"<a>< b/></a>").is_err());
    assert_eq!(
        parser.parse_bytes(&mut handler, b"<b/>"),
        Err(SaxError::BadXml(description::PARSER_REUSE_WITHOUT_RESET))
    );
    parser.reset();
    assert!(parser.parse_bytes_finish(&mut handler, b"<b/>").is_ok());
}

struct Aborter;

impl SaxHandler for Aborter {
    fn handle_element(&mut self, element: &SaxElement) -> Result<(), SaxError> {
        match element {
            SaxElement::StartTag("stop") => Err(SaxError::HandlerAbort),
            _ => Ok(()),
        }
    }
}

#[test]
fn handler_abort() {
    let mut parser = SaxParser::new();
    assert_eq!(
        parser.parse_bytes(&mut Aborter, b"<a><stop/></a>"),
        Err(SaxError::HandlerAbort)
    );
}

#[test]
fn bad_tags() {
    BadTester::new(4).check("<a>< b/></a>");
    BadTester::new(6).check("<a><b/ ></a>");
    BadTester::new(8).check("<a></ccc/></a>");
    BadTester::new(1).check("</a>");
    BadTester::new(9).check("<a> </a  b>");
    BadTester::new(8).check("<a></a><b/>");
    BadTester::new(10).check("<a a='1' b></a>");
    BadTester::new(11).check("<a a='1' b=></a>");
    BadTester::new(12).check("<a a='12' b '2'></a>");
    BadTester::new(14).check("<a a='12'></a b='1'>");
    BadTester::new(13).check("<a a='1' b='></a>");
    BadTester::new(5).check("<a> <> </a>");
    BadTester::new(6).check("<a> </> </a>");
}

#[test]
fn bad_comments_and_pis() {
    BadTester::new(10).check("<e><!-- -- --></e>");
    BadTester::new(22).check("<ha><!-- <lala> --><!- comment -></ha>");
    BadTester::new(9).check("<!-- c ---> <ha/>");
    BadTester::new(12).check("<e/> <?xml >");
    BadTester::new(13).check("<e/> <?xml ?>lala");
}

#[test]
fn bad_cdatas() {
    BadTester::new(2).check("  lala <a></a>");
    BadTester::new(10).check("  <a></a> lala");
    BadTester::new(2).check("<![CDATA[lala]> <a/>");
    BadTester::new(7).check("<a> <![DATA[lala]> </a>");
    BadTester::new(12).check("<a> <![CDATAlala]> </a>");
}

#[test]
fn bad_entities() {
    BadTester::new(8).check("<a>&lala;</a>");
    BadTester::new(12).check("<a>&lala           </a>");
    BadTester::new(16).check("<lol>&lt;<&gt;</lol>");
    BadTester::new(6).check("<a>&#1a;</a>");
    BadTester::new(5).check("<a>&#Xaa;</a>");
    BadTester::new(5).check("<a>&#;</a>");
    BadTester::new(8).check("<a>&#xa5g;</a>");
    BadTester::new(6).check("<a>&#8;</a>");
    BadTester::new(10).check("<a>&#xD800;</a>");
    BadTester::new(10).check("<a>&#xFFff;</a>");
    BadTester::new(12).check("<a>&#x110000;</a>");
    BadTester::new(25).check("<a>&#99999999999999999999;</a>");
}

#[test]
fn bad_chars() {
    BadTester::new(6).check_bytes(b"<test>\xFF</test>");
    BadTester::new(2).check_bytes(b"<t\x00></t>");
    BadTester::new(8).check_bytes(b"<test>\xe3\x8fa</test>");
    BadTester::new(7).check_bytes(b"<test>\xC0\x80</test>");
    BadTester::new(8).check_bytes(b"<test>\xe0\x80\xaf</test>");
    BadTester::new(9).check_bytes(b"<test>\xf0\x8f\xbf\xbf</test>");
    BadTester::new(1).check_bytes(b"<\x8f\x85></\x8f\x85>");
}

#[test]
fn bad_unfinished() {
    BadTester::new(5).check(" <a> ");
    BadTester::new(20).check("  <!-- lala -->     ");
    BadTester::new(27).check(" <a></a> <!-- open comment ");
}
