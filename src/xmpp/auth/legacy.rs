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

use tracing::debug;

use crate::Element;
use crate::xmpp::AuthError;
use crate::xmpp::Promise;
use crate::xmpp::Signal;
use crate::xmpp::StanzaErrorCondition;
use crate::xmpp::WeakXmlStream;
use crate::xmpp::XmlStream;
use crate::xmpp::XmppError;
use crate::xmpp::constants::NS_IQ_AUTH;
use crate::xmpp::constants::events;

use super::Account;
use super::DEFAULT_RESOURCE;
use super::Step;
use super::iq;
use super::sha1_hex;

// Login with jabber:iq:auth (XEP-0078), for servers older than XMPP 1.0.
pub(super) fn authenticate(stream: &XmlStream, account: &Rc<Account>) -> Promise<Step> {
    let jid = account.jid();
    let Some(user) = jid.localpart() else {
        return Promise::ready(Err(AuthError::InvalidUser.into()));
    };
    if account.password().is_none() {
        return Promise::ready(Err(AuthError::NoCredentials.into()));
    }

    let mut request = iq("get");
    request
        .add_child_element("query", Some(NS_IQ_AUTH), None)
        .add_child_element("username", None, Some(user));
    debug!(user, "querying legacy auth fields");

    let result = Promise::pending();
    let target = result.clone();
    let weak = stream.downgrade();
    let account = Rc::clone(account);
    stream.send_iq(request).on_complete(move |response| match response {
        Ok(fields) => {
            let login = match weak.upgrade() {
                Some(stream) => login(&stream, &account, &fields),
                None => Promise::ready(Err(XmppError::ConnectionLost)),
            };
            login.on_complete(move |result| {
                target.resolve(result);
            });
        }
        Err(XmppError::Stanza(err)) => {
            let err = if err.condition == StanzaErrorCondition::NotAuthorized {
                failed(&weak, events::INVALID_USER, XmppError::Stanza(err));
                AuthError::InvalidUser
            } else {
                let condition = err.condition.as_str().to_string();
                failed(&weak, events::AUTH_FAILED, XmppError::Stanza(err));
                AuthError::Rejected(condition)
            };
            target.resolve(Err(err.into()));
        }
        Err(err) => {
            target.resolve(Err(err));
        }
    });
    result
}

fn failed(weak: &WeakXmlStream, event: &str, err: XmppError) {
    if let Some(stream) = weak.upgrade() {
        stream.publish_event(event, &Signal::Failure(err));
    }
}

fn login(stream: &XmlStream, account: &Rc<Account>, fields: &Element) -> Promise<Step> {
    let jid = account.jid();
    let (Some(user), Some(password)) = (jid.localpart(), account.password()) else {
        return Promise::ready(Err(AuthError::NoCredentials.into()));
    };
    let resource = jid.resourcepart().unwrap_or(DEFAULT_RESOURCE);
    let offers_digest = fields
        .first_child_named("query")
        .is_some_and(|query| query.first_child_named("digest").is_some());

    let mut request = iq("set");
    let query = request.add_child_element("query", Some(NS_IQ_AUTH), None);
    query.add_child_element("username", None, Some(user));
    match stream.sid() {
        Some(sid) if offers_digest => {
            debug!("legacy digest login");
            query.add_child_element("digest", None, Some(&sha1_hex(&[&sid, &password])));
        }
        _ => {
            debug!("legacy plaintext login");
            query.add_child_element("password", None, Some(&password));
        }
    }
    query.add_child_element("resource", None, Some(resource));

    let bound = jid.with_resource(resource);
    let weak = stream.downgrade();
    let account = Rc::clone(account);
    let result = Promise::pending();
    let target = result.clone();
    stream.send_iq(request).on_complete(move |response| match response {
        Ok(_) => {
            account.legacy_used.set(true);
            if let Ok(bound) = bound {
                if let Some(stream) = weak.upgrade() {
                    stream.set_this_entity(Some(bound.full()));
                }
                *account.jid.borrow_mut() = bound;
            }
            target.resolve(Ok(Step::Done));
        }
        Err(XmppError::Stanza(err)) => {
            let condition = err.condition.as_str().to_string();
            failed(&weak, events::AUTH_FAILED, XmppError::Stanza(err));
            target.resolve(Err(AuthError::Rejected(condition).into()));
        }
        Err(err) => {
            target.resolve(Err(err));
        }
    });
    result
}
