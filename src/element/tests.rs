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

fn check_roundtrip(el: &Element) {
    let xml = el.serialize();
    let parsed: Element = xml.parse().unwrap();
    assert_eq!(&parsed, el, "{}", xml);
}

#[test]
fn building() {
    let mut msg = Element::new("message", Some("jabber:client"));
    msg.set_attribute("to", "romeo@example.net")
        .set_attribute("type", "chat");
    let body = msg.add_child_element("body", None, Some("Art thou"));
    body.add_text(" not Romeo");
    assert_eq!(body.uri.as_deref(), Some("jabber:client"));
    assert_eq!(body.children().len(), 1);

    msg.add_child_element("x", Some("jabber:x:event"), None)
        .add_child_element("composing", None, None);
    msg.add_text("\n");

    assert_eq!(msg.attribute("type"), Some("chat"));
    assert_eq!(msg.first_child_named("body").unwrap().text(), "Art thou not Romeo");
    let x = msg.first_child_named("x").unwrap();
    assert_eq!(
        x.first_child_element().unwrap().uri.as_deref(),
        Some("jabber:x:event")
    );
    assert_eq!(msg.child_elements().count(), 2);
    assert_eq!(msg.children().len(), 3);
    assert_eq!(msg.text(), "\n");
    assert!(msg.first_child_named("html").is_none());

    assert_eq!(
        msg.to_string(),
        "<message xmlns='jabber:client' to='romeo@example.net' type='chat'>\
         <body>Art thou not Romeo</body>\
         <x xmlns='jabber:x:event'><composing/></x>\n</message>"
    );
}

#[test]
fn attributes() {
    let mut el = Element::new("item", None);
    el.set_attribute("jid", "a@b");
    el.set_attribute("jid", "c@d");
    el.set_attribute_ns(Some("urn:x"), "jid", "e@f");
    assert_eq!(el.attributes().count(), 2);
    assert_eq!(el.attribute("jid"), Some("c@d"));
    assert_eq!(el.attribute_ns(Some("urn:x"), "jid"), Some("e@f"));
    assert!(el.has_attribute("jid"));

    assert_eq!(el.remove_attribute("jid"), Some("c@d".to_string()));
    assert_eq!(el.remove_attribute("jid"), None);
    assert!(!el.has_attribute("jid"));
    let (qname, value) = el.attributes().next().unwrap();
    assert_eq!(qname, &QName::new(Some("urn:x"), "jid"));
    assert_eq!(value, "e@f");
}

#[test]
fn empty_attribute_namespace() {
    let mut el = Element::new("item", None);
    el.set_attribute_ns(Some(""), "a", "v");
    assert_eq!(el.attribute_ns(Some(""), "a"), Some("v"));
    assert_eq!(el.attribute_ns(None, "a"), Some("v"));
    assert_eq!(el.attribute("a"), Some("v"));
    assert_eq!(el.remove_attribute_ns(Some(""), "a"), Some("v".to_string()));
    assert!(!el.has_attribute("a"));
}

#[test]
fn lookup_with_borrowed_names() {
    let mut query = Element::new("query", Some("jabber:iq:roster"));
    query.add_child_element("item", None, None).set_attribute("jid", "a@b");
    query.add_child_element("group", None, Some("friends"));

    let names: Vec<String> = vec!["group".to_string(), "item".to_string()];
    let found: Vec<&Element> = names
        .iter()
        .filter_map(|name| query.first_child_named(name))
        .collect();
    assert_eq!(found.len(), 2);
    assert_eq!(found[0].text(), "friends");
    assert_eq!(found[1].attribute("jid"), Some("a@b"));

    let missing = String::from("note");
    assert!(query.first_child_named(&missing).is_none());
}

#[test]
fn child_without_namespace() {
    let mut iq = Element::new("iq", Some("jabber:client"));
    iq.add_child(Element::new("x", None));
    assert_eq!(iq.serialize(), "<iq xmlns='jabber:client'><x xmlns=''/></iq>");

    let parsed: Element = iq.serialize().parse().unwrap();
    let x = parsed.first_child_element().unwrap();
    assert_eq!(x.uri, None);
    check_roundtrip(&iq);

    // Nothing to undeclare without an inherited default
    let mut item = Element::new("item", None);
    item.add_child(Element::new("x", None));
    assert_eq!(item.serialize(), "<item><x/></item>");
    check_roundtrip(&item);
}

#[test]
fn escaping() {
    let mut el = Element::new("a", None);
    el.set_attribute("q", "it's \"<&>\"");
    el.add_text("x < y && 'z' > \"w\"");
    assert_eq!(
        el.serialize(),
        "<a q='it&apos;s &quot;&lt;&amp;&gt;&quot;'>x &lt; y &amp;&amp; 'z' &gt; \"w\"</a>"
    );
    check_roundtrip(&el);
}

#[test]
fn raw_markup() {
    let mut el = Element::new("body", None);
    el.add_text("a");
    el.add_raw_markup("<b>bold</b>");
    el.add_text("c");
    assert_eq!(el.children().len(), 3);
    assert_eq!(el.serialize(), "<body>a<b>bold</b>c</body>");
}

#[test]
fn prefixes() {
    let el = Element::with_default_uri("x", Some("urn:a"), Some("urn:b"));
    assert_eq!(el.serialize(), "<ns0:x xmlns:ns0='urn:a' xmlns='urn:b'/>");

    let mut el = Element::new("x", Some("urn:x"));
    el.set_attribute_ns(Some("urn:y"), "a", "v");
    el.set_attribute_ns(Some(NS_XML), "lang", "en");
    el.add_child_element("c", None, None)
        .set_attribute_ns(Some("urn:y"), "b", "w");
    assert_eq!(
        el.serialize(),
        "<x xmlns='urn:x' xmlns:ns0='urn:y' ns0:a='v' xml:lang='en'><c ns0:b='w'/></x>"
    );
    check_roundtrip(&el);

    // Prefixes only persist when the table is shared
    let mut table = Prefixes::new();
    let a = Element::with_default_uri("a", Some("urn:q"), None);
    let first = a.serialize_with(&mut table, None, &[], true);
    let second = a.serialize_with(&mut table, None, &[], true);
    assert_eq!(first, "<ns0:a xmlns:ns0='urn:q'/>");
    assert_eq!(first, second);
    assert_eq!(table.get("urn:q"), Some("ns0"));
    let b = Element::with_default_uri("b", Some("urn:r"), None);
    assert_eq!(
        b.serialize_with(&mut table, None, &[], true),
        "<ns1:b xmlns:ns1='urn:r'/>"
    );
}

#[test]
fn stream_context() {
    let mut prefixes = Prefixes::new().with(NS_STREAMS, "stream");
    let mut features = Element::with_default_uri("features", Some(NS_STREAMS), Some("jabber:client"));
    features.add_child_element("starttls", Some("urn:ietf:params:xml:ns:xmpp-tls"), None);
    assert_eq!(
        features.serialize_with(&mut prefixes, Some("jabber:client"), &["stream"], true),
        "<stream:features><starttls xmlns='urn:ietf:params:xml:ns:xmpp-tls'/></stream:features>"
    );

    let msg = Element::new("message", Some("jabber:client"));
    assert_eq!(
        msg.serialize_with(&mut prefixes, Some("jabber:client"), &["stream"], true),
        "<message/>"
    );

    let mut root = Element::with_default_uri("stream", Some(NS_STREAMS), Some("jabber:client"));
    root.add_local_prefix("stream", NS_STREAMS);
    root.set_attribute("to", "example.com");
    assert_eq!(
        root.serialize_with(&mut Prefixes::new(), None, &[], false),
        "<stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams' to='example.com'>"
    );
}

#[test]
fn original_prefixes_are_kept() {
    let xml = "<p:a xmlns:p='urn:p'><p:b/><c xmlns='urn:c'><p:d/></c></p:a>";
    let el: Element = xml.parse().unwrap();
    assert_eq!(el.to_string(), xml);
}

#[test]
fn equality_ignores_prefix_choice() {
    let parsed: Element = "<p:a xmlns:p='urn:p'><p:b>t</p:b></p:a>".parse().unwrap();
    let mut built = Element::new("a", Some("urn:p"));
    built.add_child_element("b", None, Some("t"));
    assert_eq!(parsed, built);

    built.set_attribute("x", "1");
    assert_ne!(parsed, built);
}

#[test]
fn roundtrip() {
    let mut iq = Element::new("iq", Some("jabber:client"));
    iq.set_attribute("type", "set").set_attribute("id", "H_1");
    let query = iq.add_child_element("query", Some("jabber:iq:roster"), None);
    for (jid, name) in [("a@b", "Ä & B"), ("c@d", "<C>")] {
        let item = query.add_child_element("item", None, None);
        item.set_attribute("jid", jid).set_attribute("name", name);
        item.add_child_element("group", None, Some("Friends 'n' family"));
    }
    let mut html = Element::with_default_uri("html", Some("http://jabber.org/protocol/xhtml-im"), None);
    html.add_child_element("body", Some("http://www.w3.org/1999/xhtml"), Some("hi"));
    iq.add_child(html);
    check_roundtrip(&iq);
}
