/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Incremental XML stream processing for Jabber/XMPP.
//!
//! Bytes from the network go through a push parser into an
//! [ElementStream], which hands out every direct child of the stream root
//! as a complete [Element]. Elements are routed to observers by an
//! [EventDispatcher], keyed with small [XPathQuery] expressions or named
//! events. The `xmpp` module adds stream negotiation on top.

mod dispatch;
mod element;
pub mod entities;
mod parser;
mod stream;
mod xpath;

#[cfg(feature = "xmpp")]
pub mod xmpp;

pub use parser::Location;
pub use parser::SaxElement;
pub use parser::SaxError;
pub use parser::SaxHandler;
pub use parser::SaxParser;

pub use element::Attributes;
pub use element::ChildElements;
pub use element::Element;
pub use element::NS_XML;
pub use element::Node;
pub use element::Prefixes;
pub use element::QName;

pub use stream::DocumentParser;
pub use stream::ElementStream;
pub use stream::ParserError;
pub use stream::StreamEvent;
pub use stream::StreamHandler;

pub use xpath::BadXPath;
pub use xpath::QueryCache;
pub use xpath::XPathQuery;

pub use dispatch::Dispatchable;
pub use dispatch::EVENT_PREFIX;
pub use dispatch::EventDispatcher;
pub use dispatch::ObserverId;
pub use dispatch::ObserverResult;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
