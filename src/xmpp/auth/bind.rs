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

use crate::xmpp::Jid;
use crate::xmpp::Promise;
use crate::xmpp::StreamError;
use crate::xmpp::StreamErrorCondition;
use crate::xmpp::XmlStream;
use crate::xmpp::XmppError;
use crate::xmpp::constants::NS_XMPP_BIND;
use crate::xmpp::constants::NS_XMPP_SESSION;

use super::Account;
use super::AuthState;
use super::Initializer;
use super::Step;
use super::iq;

/// Refuses servers which do not speak XMPP 1.0.
pub(super) struct VersionInitializer;

impl Initializer for VersionInitializer {
    fn name(&self) -> &'static str {
        "version"
    }

    fn initialize(&self, stream: &XmlStream) -> Promise<Step> {
        if stream.version() < (1, 0) {
            let err = StreamError::new(StreamErrorCondition::UnsupportedVersion)
                .with_text("server does not support XMPP 1.0");
            return Promise::ready(Err(XmppError::Stream(err)));
        }
        Promise::ready(Ok(Step::Done))
    }
}

pub(super) struct BindInitializer {
    account: Rc<Account>,
}

impl BindInitializer {
    pub(super) fn new(account: Rc<Account>) -> BindInitializer {
        BindInitializer { account }
    }
}

impl Initializer for BindInitializer {
    fn name(&self) -> &'static str {
        "bind"
    }

    fn state(&self) -> AuthState {
        AuthState::Bound
    }

    fn initialize(&self, stream: &XmlStream) -> Promise<Step> {
        if !stream.has_feature(NS_XMPP_BIND, "bind") {
            if stream.version() >= (1, 0) && !self.account.legacy_used.get() {
                return Promise::ready(Err(XmppError::FeatureNotAdvertised("bind".to_string())));
            }
            return Promise::ready(Ok(Step::Done));
        }

        let jid = self.account.jid();
        let mut request = iq("set");
        let bind = request.add_child_element("bind", Some(NS_XMPP_BIND), None);
        if let Some(resource) = jid.resourcepart() {
            bind.add_child_element("resource", None, Some(resource));
        }
        let account = Rc::clone(&self.account);
        let weak = stream.downgrade();
        stream.send_iq(request).and_then(move |result| {
            let assigned = result
                .first_child_named("bind")
                .and_then(|bind| bind.first_child_named("jid"))
                .map(|jid| jid.text());
            if let Some(assigned) = assigned {
                let jid = match Jid::new(assigned.trim()) {
                    Ok(jid) => jid,
                    Err(err) => return Promise::ready(Err(err.into())),
                };
                debug!(jid = %jid, "resource bound");
                if let Some(stream) = weak.upgrade() {
                    stream.set_this_entity(Some(jid.full()));
                }
                *account.jid.borrow_mut() = jid;
            }
            Promise::ready(Ok(Step::Done))
        })
    }
}

/// Establishes a session, RFC 3921 style, unless the server says it is optional.
pub(super) struct SessionInitializer;

impl Initializer for SessionInitializer {
    fn name(&self) -> &'static str {
        "session"
    }

    fn state(&self) -> AuthState {
        AuthState::Bound
    }

    fn initialize(&self, stream: &XmlStream) -> Promise<Step> {
        match stream.feature(NS_XMPP_SESSION, "session") {
            Some(feature) if feature.first_child_named("optional").is_none() => {
                let mut request = iq("set");
                request.add_child_element("session", Some(NS_XMPP_SESSION), None);
                stream.send_iq(request).map(|_| Step::Done)
            }
            _ => Promise::ready(Ok(Step::Done)),
        }
    }
}
