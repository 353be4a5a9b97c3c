/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Display;

use crate::Element;

use super::constants::NS_STREAMS;
use super::constants::NS_XMPP_STREAMS;

/// Stream error conditions of RFC 6120 section 4.9.3.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StreamErrorCondition {
    BadFormat,
    BadNamespacePrefix,
    Conflict,
    ConnectionTimeout,
    HostGone,
    HostUnknown,
    ImproperAddressing,
    InternalServerError,
    InvalidFrom,
    InvalidNamespace,
    InvalidXml,
    NotAuthorized,
    NotWellFormed,
    PolicyViolation,
    RemoteConnectionFailed,
    Reset,
    ResourceConstraint,
    RestrictedXml,
    SeeOtherHost,
    SystemShutdown,
    UndefinedCondition,
    UnsupportedEncoding,
    UnsupportedFeature,
    UnsupportedStanzaType,
    UnsupportedVersion,
}

const CONDITIONS: &[(StreamErrorCondition, &str)] = &[
    (StreamErrorCondition::BadFormat, "bad-format"),
    (StreamErrorCondition::BadNamespacePrefix, "bad-namespace-prefix"),
    (StreamErrorCondition::Conflict, "conflict"),
    (StreamErrorCondition::ConnectionTimeout, "connection-timeout"),
    (StreamErrorCondition::HostGone, "host-gone"),
    (StreamErrorCondition::HostUnknown, "host-unknown"),
    (StreamErrorCondition::ImproperAddressing, "improper-addressing"),
    (StreamErrorCondition::InternalServerError, "internal-server-error"),
    (StreamErrorCondition::InvalidFrom, "invalid-from"),
    (StreamErrorCondition::InvalidNamespace, "invalid-namespace"),
    (StreamErrorCondition::InvalidXml, "invalid-xml"),
    (StreamErrorCondition::NotAuthorized, "not-authorized"),
    (StreamErrorCondition::NotWellFormed, "not-well-formed"),
    (StreamErrorCondition::PolicyViolation, "policy-violation"),
    (StreamErrorCondition::RemoteConnectionFailed, "remote-connection-failed"),
    (StreamErrorCondition::Reset, "reset"),
    (StreamErrorCondition::ResourceConstraint, "resource-constraint"),
    (StreamErrorCondition::RestrictedXml, "restricted-xml"),
    (StreamErrorCondition::SeeOtherHost, "see-other-host"),
    (StreamErrorCondition::SystemShutdown, "system-shutdown"),
    (StreamErrorCondition::UndefinedCondition, "undefined-condition"),
    (StreamErrorCondition::UnsupportedEncoding, "unsupported-encoding"),
    (StreamErrorCondition::UnsupportedFeature, "unsupported-feature"),
    (StreamErrorCondition::UnsupportedStanzaType, "unsupported-stanza-type"),
    (StreamErrorCondition::UnsupportedVersion, "unsupported-version"),
];

impl StreamErrorCondition {
    pub fn from_name(name: &str) -> Option<StreamErrorCondition> {
        CONDITIONS
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(condition, _)| *condition)
    }

    pub fn as_str(self) -> &'static str {
        CONDITIONS
            .iter()
            .find(|(c, _)| *c == self)
            .map_or("undefined-condition", |(_, name)| *name)
    }
}

impl Display for StreamErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `<stream:error/>` sent or received. Always fatal to the stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamError {
    pub condition: StreamErrorCondition,
    pub text: Option<String>,
    pub app_condition: Option<Element>,
}

impl Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.condition.as_str())?;
        if let Some(text) = &self.text {
            write!(f, " ({text})")?;
        }
        Ok(())
    }
}

impl std::error::Error for StreamError {}

impl StreamError {
    pub fn new(condition: StreamErrorCondition) -> StreamError {
        StreamError {
            condition,
            text: None,
            app_condition: None,
        }
    }

    pub fn with_text(mut self, text: &str) -> StreamError {
        self.text = Some(text.to_string());
        self
    }

    /// Parses the children of a `<stream:error/>` element.
    ///
    /// Unknown conditions are reported as `undefined-condition`.
    pub fn from_element(el: &Element) -> StreamError {
        let mut err = StreamError::new(StreamErrorCondition::UndefinedCondition);
        for child in el.child_elements() {
            if child.uri.as_deref() == Some(NS_XMPP_STREAMS) {
                if child.name == "text" {
                    err.text = Some(child.text());
                } else if let Some(condition) = StreamErrorCondition::from_name(&child.name) {
                    err.condition = condition;
                }
            } else {
                err.app_condition = Some(child.clone());
            }
        }
        err
    }

    pub fn to_element(&self) -> Element {
        let mut el = Element::new("error", Some(NS_STREAMS));
        el.add_child_element(self.condition.as_str(), Some(NS_XMPP_STREAMS), None);
        if let Some(text) = &self.text {
            el.add_child_element("text", Some(NS_XMPP_STREAMS), Some(text));
        }
        if let Some(app) = &self.app_condition {
            el.add_child(app.clone());
        }
        el
    }
}
