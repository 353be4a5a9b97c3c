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
use crate::element::Node;

use super::constants::NS_XMPP_STANZAS;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorType {
    Modify,
    Cancel,
    Wait,
    Auth,
    Continue,
}

impl ErrorType {
    pub fn from_name(name: &str) -> Option<ErrorType> {
        match name {
            "modify" => Some(ErrorType::Modify),
            "cancel" => Some(ErrorType::Cancel),
            "wait" => Some(ErrorType::Wait),
            "auth" => Some(ErrorType::Auth),
            "continue" => Some(ErrorType::Continue),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::Modify => "modify",
            ErrorType::Cancel => "cancel",
            ErrorType::Wait => "wait",
            ErrorType::Auth => "auth",
            ErrorType::Continue => "continue",
        }
    }
}

/// Stanza error conditions, including the ones only found in legacy servers.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StanzaErrorCondition {
    BadRequest,
    Conflict,
    FeatureNotImplemented,
    Forbidden,
    Gone,
    InternalServerError,
    ItemNotFound,
    JidMalformed,
    NotAcceptable,
    NotAllowed,
    NotAuthorized,
    PaymentRequired,
    PolicyViolation,
    RecipientUnavailable,
    Redirect,
    RegistrationRequired,
    RemoteServerNotFound,
    RemoteServerTimeout,
    ResourceConstraint,
    ServiceUnavailable,
    SubscriptionRequired,
    UndefinedCondition,
    UnexpectedRequest,
}

struct ConditionInfo {
    condition: StanzaErrorCondition,
    name: &'static str,
    code: Option<u16>,
    error_type: ErrorType,
}

macro_rules! info {
    ($condition:ident, $name:literal, $code:expr, $error_type:ident) => {
        ConditionInfo {
            condition: StanzaErrorCondition::$condition,
            name: $name,
            code: $code,
            error_type: ErrorType::$error_type,
        }
    };
}

const CONDITIONS: &[ConditionInfo] = &[
    info!(BadRequest, "bad-request", Some(400), Modify),
    info!(Conflict, "conflict", Some(409), Cancel),
    info!(FeatureNotImplemented, "feature-not-implemented", Some(501), Cancel),
    info!(Forbidden, "forbidden", Some(403), Auth),
    info!(Gone, "gone", Some(302), Modify),
    info!(InternalServerError, "internal-server-error", Some(500), Wait),
    info!(ItemNotFound, "item-not-found", Some(404), Cancel),
    info!(JidMalformed, "jid-malformed", Some(400), Modify),
    info!(NotAcceptable, "not-acceptable", Some(406), Modify),
    info!(NotAllowed, "not-allowed", Some(405), Cancel),
    info!(NotAuthorized, "not-authorized", Some(401), Auth),
    info!(PaymentRequired, "payment-required", Some(402), Auth),
    info!(PolicyViolation, "policy-violation", None, Modify),
    info!(RecipientUnavailable, "recipient-unavailable", Some(404), Wait),
    info!(Redirect, "redirect", Some(302), Modify),
    info!(RegistrationRequired, "registration-required", Some(407), Auth),
    info!(RemoteServerNotFound, "remote-server-not-found", Some(404), Cancel),
    info!(RemoteServerTimeout, "remote-server-timeout", Some(504), Wait),
    info!(ResourceConstraint, "resource-constraint", Some(500), Wait),
    info!(ServiceUnavailable, "service-unavailable", Some(503), Cancel),
    info!(SubscriptionRequired, "subscription-required", Some(407), Auth),
    info!(UndefinedCondition, "undefined-condition", Some(500), Cancel),
    info!(UnexpectedRequest, "unexpected-request", Some(400), Wait),
];

// Several conditions share a code, this picks the canonical one
const CODES: &[(u16, StanzaErrorCondition)] = &[
    (302, StanzaErrorCondition::Gone),
    (400, StanzaErrorCondition::BadRequest),
    (401, StanzaErrorCondition::NotAuthorized),
    (402, StanzaErrorCondition::PaymentRequired),
    (403, StanzaErrorCondition::Forbidden),
    (404, StanzaErrorCondition::ItemNotFound),
    (405, StanzaErrorCondition::NotAllowed),
    (406, StanzaErrorCondition::NotAcceptable),
    (407, StanzaErrorCondition::RegistrationRequired),
    (408, StanzaErrorCondition::RemoteServerTimeout),
    (409, StanzaErrorCondition::Conflict),
    (500, StanzaErrorCondition::InternalServerError),
    (501, StanzaErrorCondition::FeatureNotImplemented),
    (503, StanzaErrorCondition::ServiceUnavailable),
    (504, StanzaErrorCondition::RemoteServerTimeout),
    (510, StanzaErrorCondition::ServiceUnavailable),
];

impl StanzaErrorCondition {
    fn info(self) -> &'static ConditionInfo {
        // Every variant has an entry
        CONDITIONS
            .iter()
            .find(|info| info.condition == self)
            .unwrap_or(&CONDITIONS[CONDITIONS.len() - 2])
    }

    pub fn from_name(name: &str) -> Option<StanzaErrorCondition> {
        CONDITIONS
            .iter()
            .find(|info| info.name == name)
            .map(|info| info.condition)
    }

    /// Maps a legacy numeric error code to its condition.
    pub fn from_code(code: u16) -> Option<StanzaErrorCondition> {
        CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, condition)| *condition)
    }

    pub fn as_str(self) -> &'static str {
        self.info().name
    }

    /// Legacy numeric error code of the condition.
    pub fn code(self) -> Option<u16> {
        self.info().code
    }

    pub fn default_type(self) -> ErrorType {
        self.info().error_type
    }
}

impl Display for StanzaErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error carried in a message, presence or iq stanza.
///
/// These are reported to the sender of the request and do not affect the
/// stream itself.
#[derive(Clone, Debug, PartialEq)]
pub struct StanzaError {
    pub condition: StanzaErrorCondition,
    pub error_type: ErrorType,
    pub code: Option<u16>,
    pub text: Option<String>,
    pub app_condition: Option<Element>,
}

impl Display for StanzaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.condition, self.error_type.as_str())?;
        if let Some(text) = &self.text {
            write!(f, ": {text}")?;
        }
        Ok(())
    }
}

impl std::error::Error for StanzaError {}

impl StanzaError {
    /// Creates an error with the default type and legacy code of the condition.
    pub fn new(condition: StanzaErrorCondition) -> StanzaError {
        StanzaError {
            condition,
            error_type: condition.default_type(),
            code: condition.code(),
            text: None,
            app_condition: None,
        }
    }

    pub fn with_type(mut self, error_type: ErrorType) -> StanzaError {
        self.error_type = error_type;
        self
    }

    pub fn with_text(mut self, text: &str) -> StanzaError {
        self.text = Some(text.to_string());
        self
    }

    /// Parses an `<error/>` element.
    ///
    /// Legacy errors with only a numeric code get their condition from it.
    pub fn from_element(el: &Element) -> StanzaError {
        let code = el.attribute("code").and_then(|c| c.trim().parse::<u16>().ok());
        let mut condition = None;
        let mut text = None;
        let mut app_condition = None;
        for child in el.child_elements() {
            if child.uri.as_deref() == Some(NS_XMPP_STANZAS) {
                if child.name == "text" {
                    text = Some(child.text());
                } else if condition.is_none() {
                    condition = StanzaErrorCondition::from_name(&child.name);
                }
            } else if app_condition.is_none() {
                app_condition = Some(child.clone());
            }
        }
        let condition = condition
            .or_else(|| code.and_then(StanzaErrorCondition::from_code))
            .unwrap_or(StanzaErrorCondition::UndefinedCondition);
        if text.is_none() && code.is_some() {
            // Legacy servers put the description into the element itself
            let legacy = el.text();
            if !legacy.trim().is_empty() {
                text = Some(legacy);
            }
        }
        StanzaError {
            condition,
            error_type: el
                .attribute("type")
                .and_then(ErrorType::from_name)
                .unwrap_or(condition.default_type()),
            code: code.or(condition.code()),
            text,
            app_condition,
        }
    }

    /// Parses the `<error/>` child of a stanza.
    pub fn from_stanza(stanza: &Element) -> StanzaError {
        match stanza.first_child_named("error") {
            Some(el) => StanzaError::from_element(el),
            None => StanzaError::new(StanzaErrorCondition::UndefinedCondition),
        }
    }

    pub fn to_element(&self, uri: Option<&str>) -> Element {
        let mut el = Element::new("error", uri);
        el.set_attribute("type", self.error_type.as_str());
        if let Some(code) = self.code {
            el.set_attribute("code", &code.to_string());
        }
        el.add_child_element(self.condition.as_str(), Some(NS_XMPP_STANZAS), None);
        if let Some(text) = &self.text {
            el.add_child_element("text", Some(NS_XMPP_STANZAS), Some(text));
        }
        if let Some(app) = &self.app_condition {
            el.add_child(app.clone());
        }
        el
    }

    /// Builds the error reply to a request stanza.
    ///
    /// The addresses are swapped, the type is set to `error` and the
    /// original payload is echoed back before the error element.
    pub fn to_response(&self, stanza: &Element) -> Element {
        let mut response = Element::new(&stanza.name, stanza.uri.as_deref());
        if let Some(from) = stanza.attribute("from") {
            response.set_attribute("to", from);
        }
        if let Some(to) = stanza.attribute("to") {
            response.set_attribute("from", to);
        }
        if let Some(id) = stanza.attribute("id") {
            response.set_attribute("id", id);
        }
        response.set_attribute("type", "error");
        for child in stanza.children() {
            if let Node::Element(el) = child {
                response.add_child(el.clone());
            }
        }
        let uri = stanza.uri.clone();
        response.add_child(self.to_element(uri.as_deref()));
        response
    }
}
