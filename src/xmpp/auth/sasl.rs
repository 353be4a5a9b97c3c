/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::rc::Rc;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use tracing::debug;

use crate::Element;
use crate::xmpp::AuthError;
use crate::xmpp::Promise;
use crate::xmpp::XmlStream;
use crate::xmpp::XmppError;
use crate::xmpp::constants::NS_XMPP_SASL;

use super::Account;
use super::Step;

/// A SASL mechanism.
trait Mechanism {
    fn name(&self) -> &'static str;

    /// Data sent along with the `<auth/>` element.
    fn initial_response(&self, account: &Account) -> Result<Vec<u8>, AuthError>;

    /// Answers a server challenge.
    fn challenge(&self, _account: &Account, _data: &[u8]) -> Result<Vec<u8>, AuthError> {
        Err(AuthError::BadChallenge)
    }
}

struct Plain;

impl Mechanism for Plain {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    fn initial_response(&self, account: &Account) -> Result<Vec<u8>, AuthError> {
        let jid = account.jid();
        let user = jid.localpart().ok_or(AuthError::InvalidUser)?;
        let password = account.password().ok_or(AuthError::NoCredentials)?;
        let mut data = Vec::with_capacity(user.len() + password.len() + 2);
        data.push(0);
        data.extend_from_slice(user.as_bytes());
        data.push(0);
        data.extend_from_slice(password.as_bytes());
        Ok(data)
    }
}

struct Anonymous;

impl Mechanism for Anonymous {
    fn name(&self) -> &'static str {
        "ANONYMOUS"
    }

    fn initial_response(&self, _account: &Account) -> Result<Vec<u8>, AuthError> {
        Ok(Vec::new())
    }

    // Some servers send an empty challenge before success
    fn challenge(&self, _account: &Account, data: &[u8]) -> Result<Vec<u8>, AuthError> {
        if data.is_empty() {
            Ok(Vec::new())
        } else {
            Err(AuthError::BadChallenge)
        }
    }
}

fn select(account: &Account, offered: &[String]) -> Option<Rc<dyn Mechanism>> {
    let has = |name: &str| offered.iter().any(|m| m == name);
    let jid = account.jid();
    if jid.localpart().is_some() && account.password().is_some() && has("PLAIN") {
        return Some(Rc::new(Plain));
    }
    if jid.localpart().is_none() && has("ANONYMOUS") {
        return Some(Rc::new(Anonymous));
    }
    None
}

// An empty payload is sent as a single '='
fn encode(data: &[u8]) -> String {
    if data.is_empty() {
        "=".to_string()
    } else {
        BASE64_STANDARD.encode(data)
    }
}

fn decode(text: &str) -> Result<Vec<u8>, AuthError> {
    let text = text.trim();
    if text.is_empty() || text == "=" {
        return Ok(Vec::new());
    }
    BASE64_STANDARD
        .decode(text)
        .map_err(|_| AuthError::BadChallenge)
}

pub(super) fn authenticate(
    stream: &XmlStream,
    account: &Rc<Account>,
    mechanisms: &Element,
) -> Promise<Step> {
    let offered: Vec<String> = mechanisms
        .child_elements_named("mechanism")
        .map(|m| m.text().trim().to_string())
        .collect();
    let Some(mechanism) = select(account, &offered) else {
        debug!(?offered, "no usable SASL mechanism");
        return Promise::ready(Err(AuthError::NoMechanism.into()));
    };
    let data = match mechanism.initial_response(account) {
        Ok(data) => data,
        Err(err) => return Promise::ready(Err(err.into())),
    };
    debug!(mechanism = mechanism.name(), "starting SASL");
    let mut auth = Element::new("auth", Some(NS_XMPP_SASL));
    auth.set_attribute("mechanism", mechanism.name());
    auth.add_text(&encode(&data));
    let reply = expect_reply(stream);
    stream.send(&auth);
    exchange(stream, reply, Rc::clone(account), mechanism)
}

fn expect_reply(stream: &XmlStream) -> Promise<Element> {
    stream.expect_one_of(&[
        format!("/challenge[@xmlns='{NS_XMPP_SASL}']").as_str(),
        format!("/success[@xmlns='{NS_XMPP_SASL}']").as_str(),
        format!("/failure[@xmlns='{NS_XMPP_SASL}']").as_str(),
    ])
}

fn exchange(
    stream: &XmlStream,
    reply: Promise<Element>,
    account: Rc<Account>,
    mechanism: Rc<dyn Mechanism>,
) -> Promise<Step> {
    let weak = stream.downgrade();
    reply.and_then(move |reply| {
        let Some(stream) = weak.upgrade() else {
            return Promise::ready(Err(XmppError::ConnectionLost));
        };
        match reply.name.as_str() {
            "success" => {
                debug!("SASL authentication succeeded");
                Promise::ready(Ok(Step::Reset))
            }
            "challenge" => {
                let response = match decode(&reply.text())
                    .and_then(|data| mechanism.challenge(&account, &data))
                {
                    Ok(response) => response,
                    Err(err) => return Promise::ready(Err(err.into())),
                };
                let next = expect_reply(&stream);
                let mut el = Element::new("response", Some(NS_XMPP_SASL));
                el.add_text(&encode(&response));
                stream.send(&el);
                exchange(&stream, next, account, mechanism)
            }
            _ => {
                let condition = reply
                    .first_child_element()
                    .map_or("not-authorized".to_string(), |el| el.name.clone());
                Promise::ready(Err(AuthError::Sasl(condition).into()))
            }
        }
    })
}
