/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! XMPP streams on top of the element stream and the dispatcher.
//!
//! Everything here is sans-IO except [XmppClient]: an [XmlStream] is fed
//! with received bytes and tells its driver what to do through [Action]s.

mod auth;
mod client;
pub mod constants;
mod error;
mod jid;
mod promise;
mod stanza_error;
mod stream_error;
mod xmlstream;

pub use auth::AuthState;
pub use auth::Authenticator;
pub use auth::ClientAuthenticator;
pub use auth::ClientConfig;
pub use auth::ComponentAuthenticator;
pub use auth::DEFAULT_RESOURCE;
pub use auth::Initializer;
pub use auth::Step;
pub use auth::TlsPolicy;
pub use client::XmppClient;
pub use client::XmppClientBuilder;
pub use constants::events;
pub use error::AuthError;
pub use error::TlsError;
pub use error::XmppError;
pub use jid::BadJid;
pub use jid::Jid;
pub use promise::Promise;
pub use stanza_error::ErrorType;
pub use stanza_error::StanzaError;
pub use stanza_error::StanzaErrorCondition;
pub use stream_error::StreamError;
pub use stream_error::StreamErrorCondition;
pub use xmlstream::Action;
pub use xmlstream::Signal;
pub use xmlstream::StreamConfig;
pub use xmlstream::Version;
pub use xmlstream::WeakXmlStream;
pub use xmlstream::XmlStream;
