/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use thiserror::Error;

use crate::BadXPath;
use crate::ParserError;

use super::BadJid;
use super::StanzaError;
use super::StreamError;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum AuthError {
    #[error("no supported authentication mechanism")]
    NoMechanism,
    #[error("SASL failure: {0}")]
    Sasl(String),
    #[error("invalid user")]
    InvalidUser,
    #[error("authentication rejected: {0}")]
    Rejected(String),
    #[error("no credentials to authenticate with")]
    NoCredentials,
    #[error("malformed SASL challenge")]
    BadChallenge,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum TlsError {
    #[error("server requires TLS but it is disabled")]
    Required,
    #[error("server does not offer TLS")]
    NotOffered,
    #[error("server refused to start TLS")]
    Refused,
    #[error("TLS handshake failed: {0}")]
    Handshake(String),
}

/// Failures of the XMPP stream and its negotiation steps.
#[derive(Debug, Error)]
pub enum XmppError {
    #[error("invalid XML: {0}")]
    Parser(#[from] ParserError),
    #[error("stream error: {0}")]
    Stream(StreamError),
    #[error("stanza error: {0}")]
    Stanza(StanzaError),
    #[error("authentication failed: {0}")]
    Auth(AuthError),
    #[error(transparent)]
    Tls(TlsError),
    #[error("required feature is not advertised: {0}")]
    FeatureNotAdvertised(String),
    #[error("connection lost")]
    ConnectionLost,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Jid(#[from] BadJid),
    #[error(transparent)]
    Query(#[from] BadXPath),
}

impl XmppError {
    /// True if the connection cannot be used after this error.
    ///
    /// Authentication and stanza errors leave the stream up so that the
    /// application can retry or register.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            XmppError::Parser(_)
                | XmppError::Stream(_)
                | XmppError::Tls(_)
                | XmppError::ConnectionLost
                | XmppError::Io(_)
        )
    }
}

// io::Error is not Clone, a copy keeps its kind and message
impl Clone for XmppError {
    fn clone(&self) -> Self {
        match self {
            XmppError::Parser(err) => XmppError::Parser(*err),
            XmppError::Stream(err) => XmppError::Stream(err.clone()),
            XmppError::Stanza(err) => XmppError::Stanza(err.clone()),
            XmppError::Auth(err) => XmppError::Auth(err.clone()),
            XmppError::Tls(err) => XmppError::Tls(err.clone()),
            XmppError::FeatureNotAdvertised(name) => XmppError::FeatureNotAdvertised(name.clone()),
            XmppError::ConnectionLost => XmppError::ConnectionLost,
            XmppError::Io(err) => XmppError::Io(std::io::Error::new(err.kind(), err.to_string())),
            XmppError::Jid(err) => XmppError::Jid(*err),
            XmppError::Query(err) => XmppError::Query(*err),
        }
    }
}

impl From<StreamError> for XmppError {
    fn from(err: StreamError) -> Self {
        XmppError::Stream(err)
    }
}

impl From<StanzaError> for XmppError {
    fn from(err: StanzaError) -> Self {
        XmppError::Stanza(err)
    }
}

impl From<AuthError> for XmppError {
    fn from(err: AuthError) -> Self {
        XmppError::Auth(err)
    }
}

impl From<TlsError> for XmppError {
    fn from(err: TlsError) -> Self {
        XmppError::Tls(err)
    }
}
