/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;
use tracing::warn;

use crate::Element;
use crate::xmpp::Signal;
use crate::xmpp::StreamConfig;
use crate::xmpp::XmlStream;
use crate::xmpp::constants::NS_COMPONENT_ACCEPT;
use crate::xmpp::constants::events;

use super::AuthState;
use super::Authenticator;
use super::report_failure;
use super::sha1_hex;

/// External component login of XEP-0114.
pub struct ComponentAuthenticator {
    secret: String,
    state: Cell<AuthState>,
}

impl ComponentAuthenticator {
    pub fn new(secret: &str) -> Rc<ComponentAuthenticator> {
        Rc::new(ComponentAuthenticator {
            secret: secret.to_string(),
            state: Cell::new(AuthState::Connecting),
        })
    }

    /// Creates a stream for the component `name` with a new authenticator attached.
    pub fn create_stream(name: &str, secret: &str) -> (XmlStream, Rc<ComponentAuthenticator>) {
        let config = StreamConfig::new(NS_COMPONENT_ACCEPT, name).version(None);
        let stream = XmlStream::new(config);
        let auth = ComponentAuthenticator::new(secret);
        stream.set_authenticator(auth.clone());
        (stream, auth)
    }

    pub fn state(&self) -> AuthState {
        self.state.get()
    }
}

impl Authenticator for ComponentAuthenticator {
    fn connection_made(self: Rc<Self>, stream: &XmlStream) {
        stream.send_header();
        self.state.set(AuthState::AwaitingRoot);
    }

    fn stream_started(self: Rc<Self>, stream: &XmlStream, _root: &Element) {
        let sid = stream.sid().unwrap_or_else(|| {
            warn!("server did not send a stream id");
            String::new()
        });
        self.state.set(AuthState::Authenticating);
        let this = Rc::clone(&self);
        let weak = stream.downgrade();
        let subscribed = stream.dispatcher().subscribe_once("/handshake", 0, move |_| {
            debug!("component handshake accepted");
            this.state.set(AuthState::Authenticated);
            if let Some(stream) = weak.upgrade() {
                stream.publish_event(events::STREAM_AUTHD, &Signal::Stream);
            }
            Ok(())
        });
        if let Err(err) = subscribed {
            report_failure(stream, err.into());
            return;
        }
        let mut handshake = Element::new("handshake", Some(NS_COMPONENT_ACCEPT));
        handshake.add_text(&sha1_hex(&[&sid, &self.secret]));
        stream.send(&handshake);
    }

    fn connection_lost(self: Rc<Self>, _stream: &XmlStream) {
        self.state.set(AuthState::Ended);
    }
}
