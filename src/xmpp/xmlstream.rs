/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::cell::RefCell;
use std::cell::RefMut;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::rc::Rc;
use std::rc::Weak;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use crate::Dispatchable;
use crate::EVENT_PREFIX;
use crate::Element;
use crate::ElementStream;
use crate::EventDispatcher;
use crate::ObserverId;
use crate::ParserError;
use crate::Prefixes;
use crate::QName;
use crate::StreamEvent;
use crate::entities::escape;

use super::Authenticator;
use super::Promise;
use super::StanzaError;
use super::StreamError;
use super::StreamErrorCondition;
use super::XmppError;
use super::constants::NS_STREAMS;
use super::constants::events;

/// Payload of the stream dispatcher.
#[derive(Debug)]
pub enum Signal {
    /// Lifecycle notification, observers reach the stream through their own handle.
    Stream,
    Element(Element),
    Failure(XmppError),
    Data(Vec<u8>),
}

impl Dispatchable for Signal {
    fn element(&self) -> Option<&Element> {
        match self {
            Signal::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// Work for the transport driver.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    Send(Vec<u8>),
    /// Start the TLS handshake, then call
    /// [XmlStream::security_layer_established()].
    StartTls,
    /// Close the transport, then call [XmlStream::connection_lost()].
    Close,
}

/// Stream protocol version, `(major, minor)`.
pub type Version = (u16, u16);

fn parse_version(text: &str) -> Option<Version> {
    let (major, minor) = text.trim().split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

#[derive(Clone, Debug)]
pub struct StreamConfig {
    namespace: String,
    this_entity: Option<String>,
    other_entity: String,
    version: Option<Version>,
    initiating: bool,
    event_prefix: String,
}

impl StreamConfig {
    pub fn new(namespace: &str, other_entity: &str) -> StreamConfig {
        StreamConfig {
            namespace: namespace.to_string(),
            this_entity: None,
            other_entity: other_entity.to_string(),
            version: Some((1, 0)),
            initiating: true,
            event_prefix: EVENT_PREFIX.to_string(),
        }
    }

    pub fn this_entity(mut self, entity: Option<&str>) -> StreamConfig {
        self.this_entity = entity.map(str::to_string);
        self
    }

    /// Local stream version, `None` omits the version attribute.
    pub fn version(mut self, version: Option<Version>) -> StreamConfig {
        self.version = version;
        self
    }

    pub fn initiating(mut self, initiating: bool) -> StreamConfig {
        self.initiating = initiating;
        self
    }

    pub fn event_prefix(mut self, prefix: &str) -> StreamConfig {
        self.event_prefix = prefix.to_string();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn other_entity(&self) -> &str {
        &self.other_entity
    }

    pub fn is_initiating(&self) -> bool {
        self.initiating
    }
}

static NEXT_IQ_ID: AtomicU64 = AtomicU64::new(1);

struct State {
    parser: ElementStream,
    sid: Option<String>,
    version: Version,
    features: HashMap<QName, Element>,
    header_sent: bool,
    tls_established: bool,
    actions: VecDeque<Action>,
    pending_iqs: HashMap<String, Promise<Element>>,
    waiters: Vec<Promise<Element>>,
    tls_waiter: Option<Promise<()>>,
    closed: bool,
    lost: bool,
}

struct Inner {
    config: RefCell<StreamConfig>,
    state: RefCell<State>,
    dispatcher: EventDispatcher<Signal>,
    authenticator: RefCell<Option<Rc<dyn Authenticator>>>,
}

/// One XML stream between two XMPP entities.
///
/// The stream does no I/O itself. The driver passes received bytes to
/// [data_received()](XmlStream::data_received) and carries out the
/// queued [Action]s. Parsed stanzas are published on the stream's
/// dispatcher, where observers match them with queries.
///
/// This is a cheap handle, clones refer to the same stream. Observers
/// should capture a [WeakXmlStream] to avoid reference cycles.
#[derive(Clone)]
pub struct XmlStream {
    inner: Rc<Inner>,
}

#[derive(Clone)]
pub struct WeakXmlStream {
    inner: Weak<Inner>,
}

impl WeakXmlStream {
    pub fn upgrade(&self) -> Option<XmlStream> {
        self.inner.upgrade().map(|inner| XmlStream { inner })
    }
}

impl XmlStream {
    pub fn new(config: StreamConfig) -> XmlStream {
        let dispatcher = EventDispatcher::with_prefix(&config.event_prefix);
        let version = config.version.unwrap_or((0, 0));
        let stream = XmlStream {
            inner: Rc::new(Inner {
                config: RefCell::new(config),
                state: RefCell::new(State {
                    parser: ElementStream::new(),
                    sid: None,
                    version,
                    features: HashMap::new(),
                    header_sent: false,
                    tls_established: false,
                    actions: VecDeque::new(),
                    pending_iqs: HashMap::new(),
                    waiters: Vec::new(),
                    tls_waiter: None,
                    closed: false,
                    lost: false,
                }),
                dispatcher,
                authenticator: RefCell::new(None),
            }),
        };
        for (query, is_result) in [("/iq[@type='result']", true), ("/iq[@type='error']", false)] {
            let weak = stream.downgrade();
            let subscribed = stream.inner.dispatcher.subscribe(query, 0, move |signal| {
                if let (Some(stream), Signal::Element(iq)) = (weak.upgrade(), signal) {
                    stream.iq_response(iq, is_result);
                }
                Ok(())
            });
            if let Err(err) = subscribed {
                error!(query, error = %err, "cannot track iq responses");
            }
        }
        stream
    }

    pub fn downgrade(&self) -> WeakXmlStream {
        WeakXmlStream {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn dispatcher(&self) -> &EventDispatcher<Signal> {
        &self.inner.dispatcher
    }

    pub fn set_authenticator(&self, authenticator: Rc<dyn Authenticator>) {
        *self.inner.authenticator.borrow_mut() = Some(authenticator);
    }

    fn authenticator(&self) -> Option<Rc<dyn Authenticator>> {
        self.inner.authenticator.borrow().clone()
    }

    fn state(&self) -> RefMut<'_, State> {
        self.inner.state.borrow_mut()
    }

    /// Full name of a named event under this stream's event prefix.
    pub fn event_name(&self, event: &str) -> String {
        let config = self.inner.config.borrow();
        match event.strip_prefix(EVENT_PREFIX) {
            Some(rest) if config.event_prefix != EVENT_PREFIX => {
                format!("{}{rest}", config.event_prefix)
            }
            _ => event.to_string(),
        }
    }

    /// Publishes a named event, see [events].
    pub fn publish_event(&self, event: &str, signal: &Signal) -> bool {
        let name = self.event_name(event);
        self.inner.dispatcher.publish(signal, Some(&name))
    }

    //
    // Accessors
    //

    /// Stream id announced by the peer, unset until its root element arrives.
    pub fn sid(&self) -> Option<String> {
        self.inner.state.borrow().sid.clone()
    }

    /// Negotiated version, the lower one of ours and the peer's.
    pub fn version(&self) -> Version {
        self.inner.state.borrow().version
    }

    pub fn config(&self) -> StreamConfig {
        self.inner.config.borrow().clone()
    }

    pub fn set_this_entity(&self, entity: Option<&str>) {
        self.inner.config.borrow_mut().this_entity = entity.map(str::to_string);
    }

    /// Returns the advertised stream feature, if any.
    pub fn feature(&self, uri: &str, name: &str) -> Option<Element> {
        self.inner
            .state
            .borrow()
            .features
            .get(&QName::new(Some(uri), name))
            .cloned()
    }

    pub fn has_feature(&self, uri: &str, name: &str) -> bool {
        self.inner
            .state
            .borrow()
            .features
            .contains_key(&QName::new(Some(uri), name))
    }

    pub fn tls_established(&self) -> bool {
        self.inner.state.borrow().tls_established
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.borrow().closed
    }

    pub fn next_action(&self) -> Option<Action> {
        self.state().actions.pop_front()
    }

    pub fn take_actions(&self) -> Vec<Action> {
        self.state().actions.drain(..).collect()
    }

    //
    // Transport events
    //

    pub fn connection_made(&self) {
        debug!("connection made");
        if let Some(auth) = self.authenticator() {
            auth.connection_made(self);
        }
        self.publish_event(events::STREAM_CONNECTED, &Signal::Stream);
    }

    /// Parses received bytes and dispatches the resulting events.
    pub fn data_received(&self, bytes: &[u8]) {
        let raw_in = self.event_name(events::RAW_IN);
        if self.inner.dispatcher.has_observers(&raw_in) {
            self.inner
                .dispatcher
                .publish(&Signal::Data(bytes.to_vec()), Some(&raw_in));
        }
        trace!(bytes = %String::from_utf8_lossy(bytes), "received");

        let mut offset = 0;
        loop {
            {
                let state = self.inner.state.borrow();
                if state.closed {
                    if offset < bytes.len() {
                        warn!(unused = bytes.len() - offset, "data after stream close ignored");
                    }
                    return;
                }
                if state.tls_waiter.is_some() {
                    if offset < bytes.len() {
                        warn!(unused = bytes.len() - offset, "data before TLS handshake ignored");
                    }
                    return;
                }
            }
            let result = self.state().parser.parse_bytes(&bytes[offset..]);
            match result {
                Ok(Some((event, consumed))) => {
                    offset += consumed;
                    self.handle_event(event);
                }
                Ok(None) => return,
                Err(err) => {
                    self.parser_failed(err);
                    return;
                }
            }
        }
    }

    fn handle_event(&self, event: StreamEvent) {
        match event {
            StreamEvent::DocumentStart(root) => self.stream_started(root),
            StreamEvent::ElementComplete(el) => self.element_received(el),
            StreamEvent::DocumentEnd => {
                debug!("peer closed the stream");
                self.close();
            }
        }
    }

    fn stream_started(&self, root: Element) {
        if !root.is("stream", Some(NS_STREAMS)) {
            warn!(name = %root.name, "invalid stream root");
            self.send_stream_error(StreamError::new(StreamErrorCondition::InvalidNamespace));
            return;
        }
        let local = self.inner.config.borrow().version.unwrap_or((0, 0));
        let peer = root
            .attribute("version")
            .and_then(parse_version)
            .unwrap_or((0, 0));
        let version = local.min(peer);
        let sid = root.attribute("id").map(str::to_string);
        debug!(sid = ?sid, major = version.0, minor = version.1, "stream started");
        {
            let mut state = self.state();
            state.sid = sid;
            state.version = version;
        }
        if let Some(auth) = self.authenticator() {
            auth.stream_started(self, &root);
        }
        self.publish_event(events::STREAM_START, &Signal::Element(root));
    }

    fn element_received(&self, el: Element) {
        if el.is("error", Some(NS_STREAMS)) {
            let err = StreamError::from_element(&el);
            warn!(error = %err, "stream error received");
            self.publish_event(events::STREAM_ERROR, &Signal::Failure(XmppError::Stream(err)));
            self.close();
            return;
        }
        if el.is("features", Some(NS_STREAMS)) {
            let mut state = self.state();
            state.features.clear();
            for feature in el.child_elements() {
                state.features.insert(
                    QName::new(feature.uri.as_deref(), &feature.name),
                    feature.clone(),
                );
            }
        }
        let name = el.name.clone();
        if !self.inner.dispatcher.publish(&Signal::Element(el), None) {
            debug!(name = %name, "unhandled stanza");
        }
    }

    fn parser_failed(&self, err: ParserError) {
        warn!(error = %err, "malformed stream");
        self.publish_event(events::STREAM_ERROR, &Signal::Failure(XmppError::Parser(err)));
        self.send_stream_error(StreamError::new(StreamErrorCondition::NotWellFormed));
    }

    /// Tells the stream that the TLS handshake is complete.
    pub fn security_layer_established(&self) {
        debug!("security layer established");
        let waiter = {
            let mut state = self.state();
            state.tls_established = true;
            state.tls_waiter.take()
        };
        if let Some(waiter) = waiter {
            waiter.resolve(Ok(()));
        }
    }

    /// Tells the stream that the transport is gone.
    ///
    /// Every pending request fails with [XmppError::ConnectionLost].
    pub fn connection_lost(&self) {
        let (iqs, waiters, tls) = {
            let mut state = self.state();
            if state.lost {
                return;
            }
            state.lost = true;
            state.closed = true;
            (
                std::mem::take(&mut state.pending_iqs),
                std::mem::take(&mut state.waiters),
                state.tls_waiter.take(),
            )
        };
        debug!("connection lost");
        for promise in iqs.into_values().chain(waiters) {
            promise.resolve(Err(XmppError::ConnectionLost));
        }
        if let Some(tls) = tls {
            tls.resolve(Err(XmppError::ConnectionLost));
        }
        if let Some(auth) = self.authenticator() {
            auth.connection_lost(self);
        }
        self.publish_event(events::STREAM_END, &Signal::Stream);
    }

    //
    // Output
    //

    /// Sends bytes as they are.
    pub fn send_raw(&self, bytes: Vec<u8>) {
        if self.is_closed() {
            warn!("send on a closed stream ignored");
            return;
        }
        trace!(bytes = %String::from_utf8_lossy(&bytes), "sending");
        let raw_out = self.event_name(events::RAW_OUT);
        if self.inner.dispatcher.has_observers(&raw_out) {
            self.inner
                .dispatcher
                .publish(&Signal::Data(bytes.clone()), Some(&raw_out));
        }
        self.state().actions.push_back(Action::Send(bytes));
    }

    /// Serializes and sends an element in the context of the stream root.
    pub fn send(&self, el: &Element) {
        let text = {
            let config = self.inner.config.borrow();
            let mut prefixes = Prefixes::new().with(NS_STREAMS, "stream");
            el.serialize_with(&mut prefixes, Some(&config.namespace), &["stream"], true)
        };
        self.send_raw(text.into_bytes());
    }

    /// Sends the opening tag of our stream root.
    pub fn send_header(&self) {
        let header = {
            let config = self.inner.config.borrow();
            let mut header = String::from("<?xml version='1.0'?><stream:stream xmlns='");
            escape(&config.namespace, &mut header, true);
            header.push_str("' xmlns:stream='");
            header.push_str(NS_STREAMS);
            header.push_str("' to='");
            escape(&config.other_entity, &mut header, true);
            header.push('\'');
            if let Some(from) = &config.this_entity {
                header.push_str(" from='");
                escape(from, &mut header, true);
                header.push('\'');
            }
            if let Some((major, minor)) = config.version {
                header.push_str(&format!(" version='{major}.{minor}'"));
            }
            header.push('>');
            header
        };
        self.state().header_sent = true;
        self.send_raw(header.into_bytes());
    }

    pub fn send_footer(&self) {
        self.send_raw(b"</stream:stream>".to_vec());
    }

    /// Sends a stream error and closes the stream.
    pub fn send_stream_error(&self, err: StreamError) {
        if self.is_closed() {
            return;
        }
        if !self.inner.state.borrow().header_sent {
            self.send_header();
        }
        self.send(&err.to_element());
        self.close();
    }

    /// Closes our side of the stream and asks the driver to disconnect.
    pub fn close(&self) {
        if self.is_closed() {
            return;
        }
        if self.inner.state.borrow().header_sent {
            self.send_footer();
        }
        let mut state = self.state();
        state.closed = true;
        state.actions.push_back(Action::Close);
    }

    /// Asks the driver to start TLS on the transport.
    ///
    /// The promise resolves once the handshake completes. Received bytes
    /// are not parsed in the meantime.
    pub fn start_tls(&self) -> Promise<()> {
        let promise = Promise::pending();
        let mut state = self.state();
        if state.closed {
            return Promise::ready(Err(XmppError::ConnectionLost));
        }
        state.tls_waiter = Some(promise.clone());
        state.actions.push_back(Action::StartTls);
        promise
    }

    /// Forgets the current stream, so that a new one can start over the
    /// same transport. Needed after TLS and SASL negotiation.
    ///
    /// The session id stays unset until the peer's new root arrives.
    pub fn reset(&self) {
        debug!("stream reset");
        let mut state = self.state();
        state.parser.reset();
        state.sid = None;
        state.features.clear();
        state.header_sent = false;
    }

    //
    // Requests
    //

    /// Sends an iq request and returns its response.
    ///
    /// An id is assigned if the stanza does not have one. A result
    /// response resolves the promise, an error response fails it with the
    /// parsed [StanzaError].
    pub fn send_iq(&self, mut iq: Element) -> Promise<Element> {
        if self.is_closed() {
            return Promise::ready(Err(XmppError::ConnectionLost));
        }
        let id = match iq.attribute("id") {
            Some(id) => id.to_string(),
            None => {
                let id = format!("H_{}", NEXT_IQ_ID.fetch_add(1, Ordering::Relaxed));
                iq.set_attribute("id", &id);
                id
            }
        };
        let promise = Promise::pending();
        self.state().pending_iqs.insert(id, promise.clone());
        self.send(&iq);
        promise
    }

    fn iq_response(&self, iq: &Element, is_result: bool) {
        let Some(id) = iq.attribute("id") else {
            return;
        };
        let promise = self.state().pending_iqs.remove(id);
        let Some(promise) = promise else {
            trace!(id, "response to an unknown iq");
            return;
        };
        if is_result {
            promise.resolve(Ok(iq.clone()));
        } else {
            promise.resolve(Err(XmppError::Stanza(StanzaError::from_stanza(iq))));
        }
    }

    /// Waits for the next stanza matching any of the queries.
    pub fn expect_one_of(&self, queries: &[&str]) -> Promise<Element> {
        let promise = Promise::pending();
        let subscriptions: Rc<RefCell<Vec<(String, ObserverId)>>> = Rc::default();
        for query in queries {
            let target = promise.clone();
            let others = Rc::clone(&subscriptions);
            let weak = self.downgrade();
            let subscribed = self.inner.dispatcher.subscribe_once(query, 0, move |signal| {
                if let Signal::Element(el) = signal {
                    if let Some(stream) = weak.upgrade() {
                        for (key, id) in others.borrow().iter() {
                            stream.inner.dispatcher.unsubscribe(key, *id);
                        }
                    }
                    target.resolve(Ok(el.clone()));
                }
                Ok(())
            });
            match subscribed {
                Ok(id) => subscriptions.borrow_mut().push((query.to_string(), id)),
                Err(err) => {
                    for (key, id) in subscriptions.borrow().iter() {
                        self.inner.dispatcher.unsubscribe(key, *id);
                    }
                    return Promise::ready(Err(err.into()));
                }
            }
        }
        let mut state = self.state();
        state.waiters.retain(Promise::is_pending);
        state.waiters.push(promise.clone());
        promise
    }
}
