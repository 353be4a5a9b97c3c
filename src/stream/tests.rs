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

const NS_STREAMS: &str = "http://etherx.jabber.org/streams";

const STREAM: &str = "<?xml version='1.0'?>\
    <stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams' \
     id='c2s_123' from='example.com' version='1.0'>\n  \
    <stream:features><starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'><required/></starttls>\
    </stream:features>\
    <message to='juliet@example.com' type='chat'><body>Wherefore art thou &amp; ☃?</body>\
    <html xmlns='http://jabber.org/protocol/xhtml-im'><body><p>deep</p></body></html></message>\
    <presence/> \
    <iq type='result' id='b1'><bind xmlns='urn:ietf:params:xml:ns:xmpp-bind'>\
    <jid>juliet@example.com/balcony</jid></bind></iq>\
    </stream:stream>";

#[derive(Default)]
struct Collector {
    events: Vec<StreamEvent>,
}

impl StreamHandler for Collector {
    fn document_start(&mut self, root: Element) {
        self.events.push(StreamEvent::DocumentStart(root));
    }

    fn element_complete(&mut self, element: Element) {
        self.events.push(StreamEvent::ElementComplete(element));
    }

    fn document_end(&mut self) {
        self.events.push(StreamEvent::DocumentEnd);
    }
}

fn collect(chunks: &[&[u8]]) -> Result<Vec<StreamEvent>, ParserError> {
    let mut stream = ElementStream::new();
    let mut collector = Collector::default();
    for chunk in chunks {
        stream.feed(chunk, &mut collector)?;
    }
    Ok(collector.events)
}

fn check_error(xml: &str, expected: ParserError) {
    assert_eq!(collect(&[xml.as_bytes()]), Err(expected));
}

fn stanza(event: &StreamEvent) -> &Element {
    match event {
        StreamEvent::ElementComplete(el) => el,
        _ => panic!("not a stanza: {:?}", event),
    }
}

#[test]
fn stream_events() {
    let events = collect(&[STREAM.as_bytes()]).unwrap();
    assert_eq!(events.len(), 6);

    let StreamEvent::DocumentStart(root) = &events[0] else {
        panic!("no document start");
    };
    assert!(root.is("stream", Some(NS_STREAMS)));
    assert_eq!(root.default_uri.as_deref(), Some("jabber:client"));
    assert_eq!(root.attribute("id"), Some("c2s_123"));
    assert_eq!(root.attribute("version"), Some("1.0"));
    assert!(root.children().is_empty());

    let features = stanza(&events[1]);
    assert!(features.is("features", Some(NS_STREAMS)));
    let starttls = features.first_child_element().unwrap();
    assert!(starttls.is("starttls", Some("urn:ietf:params:xml:ns:xmpp-tls")));
    assert!(starttls.first_child_named("required").is_some());

    let message = stanza(&events[2]);
    assert!(message.is("message", Some("jabber:client")));
    assert_eq!(
        message.first_child_named("body").unwrap().text(),
        "Wherefore art thou & ☃?"
    );

    assert!(stanza(&events[3]).is("presence", Some("jabber:client")));
    assert_eq!(stanza(&events[4]).attribute("id"), Some("b1"));
    assert_eq!(events[5], StreamEvent::DocumentEnd);
}

#[test]
fn chunk_boundaries() {
    let bytes = STREAM.as_bytes();
    let expected = collect(&[bytes]).unwrap();

    for size in [1, 2, 3, 5, 7, 16, 64] {
        let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
        assert_eq!(collect(&chunks).unwrap(), expected, "chunk size {}", size);
    }

    // Every single split point
    for split in 1..bytes.len() {
        let (a, b) = bytes.split_at(split);
        assert_eq!(collect(&[a, b]).unwrap(), expected, "split at {}", split);
    }
}

#[test]
fn only_root_children_complete() {
    let events = collect(&[b"<s><a><b><c><d/></c></b></a><e/></s>".as_slice()]).unwrap();
    assert_eq!(events.len(), 4);
    let a = stanza(&events[1]);
    assert_eq!(a.name, "a");
    let d = a
        .first_child_named("b")
        .and_then(|b| b.first_child_named("c"))
        .and_then(|c| c.first_child_named("d"));
    assert!(d.is_some());
    assert_eq!(stanza(&events[2]).name, "e");
}

#[test]
fn namespace_inheritance() {
    let events = collect(&[STREAM.as_bytes()]).unwrap();

    let message = stanza(&events[2]);
    let html = message.first_child_named("html").unwrap();
    assert_eq!(html.uri.as_deref(), Some("http://jabber.org/protocol/xhtml-im"));
    let body = html.first_child_named("body").unwrap();
    assert_eq!(body.uri.as_deref(), Some("http://jabber.org/protocol/xhtml-im"));
    let p = body.first_child_named("p").unwrap();
    assert_eq!(p.uri, p.default_uri);
    assert_eq!(p.uri.as_deref(), Some("http://jabber.org/protocol/xhtml-im"));

    let body = message.first_child_named("body").unwrap();
    assert_eq!(body.uri.as_deref(), Some("jabber:client"));

    // The prefixed element keeps the default of its parent for its children
    let features = stanza(&events[1]);
    assert_eq!(features.default_uri.as_deref(), Some("jabber:client"));
}

#[test]
fn attribute_namespaces() {
    let el: Element =
        "<a xmlns='urn:x' xmlns:p='urn:y' p:attr='1' plain='2' xml:lang='en'><p:b/></a>"
            .parse()
            .unwrap();
    assert_eq!(el.attribute_ns(Some("urn:y"), "attr"), Some("1"));
    assert_eq!(el.attribute("attr"), None);
    assert_eq!(el.attribute("plain"), Some("2"));
    assert_eq!(el.attribute_ns(Some("urn:x"), "plain"), None);
    assert_eq!(el.attribute_ns(Some(crate::element::NS_XML), "lang"), Some("en"));
    let b = el.first_child_element().unwrap();
    assert!(b.is("b", Some("urn:y")));
    assert_eq!(b.default_uri.as_deref(), Some("urn:x"));
    assert_eq!(el.local_prefixes(), &[("p".to_string(), "urn:y".to_string())]);
}

#[test]
fn empty_root() {
    let events = collect(&[b"<stream:stream xmlns:stream='http://etherx.jabber.org/streams'/>".as_slice()]).unwrap();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], StreamEvent::DocumentStart(_)));
    assert_eq!(events[1], StreamEvent::DocumentEnd);
}

#[test]
fn root_level_text_is_ignored() {
    let events = collect(&[b"<s>\n <a>x</a> \n\n <b/>  ".as_slice()]).unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(stanza(&events[1]).text(), "x");
}

#[test]
fn text_is_coalesced() {
    let xml = b"<s><m>a&amp;b<![CDATA[<c>]]>d</m>";
    let chunks: Vec<&[u8]> = xml.chunks(1).collect();
    let events = collect(&chunks).unwrap();
    let m = stanza(&events[1]);
    assert_eq!(m.children().len(), 1);
    assert_eq!(m.text(), "a&b<c>d");
}

#[test]
fn reset_between_events() {
    let input = b"<s><proceed/><s2 a='1'><x/>";
    let mut stream = ElementStream::new();

    let (event, n1) = stream.parse_bytes(input).unwrap().unwrap();
    assert!(matches!(event, StreamEvent::DocumentStart(_)));
    assert_eq!(n1, 3);

    let (event, n2) = stream.parse_bytes(&input[n1..]).unwrap().unwrap();
    assert_eq!(stanza(&event).name, "proceed");
    assert_eq!(n1 + n2, "<s><proceed/>".len());

    stream.reset();
    assert!(stream.root().is_none());
    assert_eq!(stream.location().bytes, 0);

    let (event, n3) = stream.parse_bytes(&input[n1 + n2..]).unwrap().unwrap();
    let StreamEvent::DocumentStart(root) = event else {
        panic!("no document start");
    };
    assert_eq!(root.name, "s2");
    assert_eq!(stream.root(), Some(&root));
    let (event, _) = stream.parse_bytes(&input[n1 + n2 + n3..]).unwrap().unwrap();
    assert_eq!(stanza(&event).name, "x");
}

#[test]
fn bad_streams() {
    check_error("<s><a></b></s>", ParserError::BadStream(description::MALFORMED_CLOSE));
    check_error("<s><a></s>", ParserError::BadStream(description::MALFORMED_CLOSE));
    check_error("<s><a/></t>", ParserError::BadStream(description::MISMATCHED_ROOT));
    check_error(
        "<s xmlns:p='urn:a'></p:s>",
        ParserError::BadStream(description::MISMATCHED_ROOT),
    );
    check_error("<s><p:a/></s>", ParserError::BadStream(description::UNBOUND_PREFIX));
    check_error("<s><a p:x='1'/></s>", ParserError::BadStream(description::UNBOUND_PREFIX));
    check_error("<s><a x='1' x='2'/></s>", ParserError::BadXml(description::DUPLICATE_ATTRIBUTE));
    check_error(
        "<s xmlns:p='urn:a' xmlns:q='urn:a'><a p:x='1' q:x='2'/></s>",
        ParserError::BadXml(description::DUPLICATE_ATTRIBUTE),
    );
    check_error("<s xmlns:p=''/>", ParserError::BadStream(description::EMPTY_PREFIX_BINDING));
    assert!(matches!(
        collect(&[b"<s><a>\xff</a></s>".as_slice()]),
        Err(ParserError::BadXml(_))
    ));
}

#[test]
fn error_is_sticky() {
    let mut stream = ElementStream::new();
    let mut collector = Collector::default();
    assert!(stream.feed(b"<s><a></b>", &mut collector).is_err());
    assert_eq!(collector.events.len(), 1);
    assert!(matches!(stream.parse_bytes(b"<a/>"), Err(ParserError::BadXml(_))));
    stream.reset();
    assert!(stream.parse_bytes(b"<s>").unwrap().is_some());
}

#[test]
fn documents() {
    let el: Element = "<doc><a>1</a><!-- c --><b x='y'/>tail</doc>".parse().unwrap();
    assert_eq!(el.name, "doc");
    assert_eq!(el.children().len(), 3);
    assert_eq!(el.text(), "tail");

    assert_eq!(
        "<doc>".parse::<Element>(),
        Err(ParserError::BadXml("Document has unclosed tags"))
    );
    assert!("".parse::<Element>().is_err());
    assert_eq!(
        "<doc></dog>".parse::<Element>(),
        Err(ParserError::BadStream(description::MISMATCHED_ROOT))
    );
}
