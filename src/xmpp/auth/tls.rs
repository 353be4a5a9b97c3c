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
use crate::xmpp::Promise;
use crate::xmpp::TlsError;
use crate::xmpp::XmlStream;
use crate::xmpp::XmppError;
use crate::xmpp::constants::NS_XMPP_TLS;

use super::Account;
use super::Initializer;
use super::Step;
use super::TlsPolicy;

pub(super) struct TlsInitializer {
    account: Rc<Account>,
}

impl TlsInitializer {
    pub(super) fn new(account: Rc<Account>) -> TlsInitializer {
        TlsInitializer { account }
    }
}

impl Initializer for TlsInitializer {
    fn name(&self) -> &'static str {
        "starttls"
    }

    fn initialize(&self, stream: &XmlStream) -> Promise<Step> {
        if stream.tls_established() {
            return Promise::ready(Ok(Step::Done));
        }
        let feature = stream.feature(NS_XMPP_TLS, "starttls");
        match (feature, self.account.tls_policy) {
            (None, TlsPolicy::Required) => Promise::ready(Err(TlsError::NotOffered.into())),
            (None, _) => Promise::ready(Ok(Step::Done)),
            (Some(feature), TlsPolicy::Never) => {
                if feature.first_child_named("required").is_some() {
                    Promise::ready(Err(TlsError::Required.into()))
                } else {
                    Promise::ready(Ok(Step::Done))
                }
            }
            (Some(_), _) => {
                let reply = stream.expect_one_of(&[
                    format!("/proceed[@xmlns='{NS_XMPP_TLS}']").as_str(),
                    format!("/failure[@xmlns='{NS_XMPP_TLS}']").as_str(),
                ]);
                stream.send(&Element::new("starttls", Some(NS_XMPP_TLS)));
                let weak = stream.downgrade();
                reply.and_then(move |reply| {
                    if reply.name != "proceed" {
                        return Promise::ready(Err(TlsError::Refused.into()));
                    }
                    debug!("server is ready for TLS");
                    match weak.upgrade() {
                        Some(stream) => stream.start_tls().map(|()| Step::Reset),
                        None => Promise::ready(Err(XmppError::ConnectionLost)),
                    }
                })
            }
        }
    }
}
