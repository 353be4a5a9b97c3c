/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

pub const CLIENT_PORT: u16 = 5222;

pub const COMPONENT_PORT: u16 = 5347;

pub const NS_STREAMS: &str = "http://etherx.jabber.org/streams";

pub const NS_CLIENT: &str = "jabber:client";

pub const NS_COMPONENT_ACCEPT: &str = "jabber:component:accept";

pub const NS_XMPP_STREAMS: &str = "urn:ietf:params:xml:ns:xmpp-streams";

pub const NS_XMPP_STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";

pub const NS_XMPP_TLS: &str = "urn:ietf:params:xml:ns:xmpp-tls";

pub const NS_XMPP_SASL: &str = "urn:ietf:params:xml:ns:xmpp-sasl";

pub const NS_XMPP_BIND: &str = "urn:ietf:params:xml:ns:xmpp-bind";

pub const NS_XMPP_SESSION: &str = "urn:ietf:params:xml:ns:xmpp-session";

pub const NS_IQ_AUTH: &str = "jabber:iq:auth";

/// Named events published by [XmlStream](crate::xmpp::XmlStream) and the authenticators.
pub mod events {
    /// Transport is connected. Payload: [Signal::Stream](crate::xmpp::Signal::Stream).
    pub const STREAM_CONNECTED: &str = "//event/stream/connected";
    /// Root element of the peer arrived. Payload: the root element.
    pub const STREAM_START: &str = "//event/stream/start";
    /// Transport is closed. Payload: [Signal::Stream](crate::xmpp::Signal::Stream).
    pub const STREAM_END: &str = "//event/stream/end";
    /// Stream or parser error. Payload: the failure.
    pub const STREAM_ERROR: &str = "//event/stream/error";
    pub const STREAM_AUTHD: &str = "//event/stream/authd";
    /// Raw bytes received. Payload: [Signal::Data](crate::xmpp::Signal::Data).
    pub const RAW_IN: &str = "//event/stream/rawin";
    /// Raw bytes sent. Payload: [Signal::Data](crate::xmpp::Signal::Data).
    pub const RAW_OUT: &str = "//event/stream/rawout";
    pub const INIT_FAILED: &str = "//event/xmpp/initfailed";
    pub const TLS_FAILED: &str = "//event/xmpp/tlsfailed";
    pub const INVALID_USER: &str = "//event/client/basicauth/invaliduser";
    pub const AUTH_FAILED: &str = "//event/client/basicauth/authfailed";
}
