/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::env;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use iks_xmlstream::Element;
use iks_xmlstream::xmpp::ClientConfig;
use iks_xmlstream::xmpp::Jid;
use iks_xmlstream::xmpp::TlsPolicy;
use iks_xmlstream::xmpp::XmppClient;
use iks_xmlstream::xmpp::XmppError;
use iks_xmlstream::xmpp::constants::NS_CLIENT;

fn print_version() {
    println!("iksjab (iksemel) v{}", iks_xmlstream::VERSION);
}

fn print_usage() {
    println!(concat!(
        "Usage: iksjab [OPTIONS]\n",
        "This tool can communicate over XMPP.\n",
        "Options:\n",
        "  -j, --jid <JID>        Jabber ID\n",
        "  -s, --server <HOST>    Connect to this host instead of the JID domain\n",
        "  -t, --to <JID>         Send a message to this Jabber ID and exit\n",
        "  -m, --message <TEXT>   Message body (default: read nothing, print stanzas)\n",
        "      --no-tls           Do not use TLS even if offered\n",
        "      --require-tls      Fail if the server does not offer TLS\n",
        "  -d, --debug            Print the XML traffic\n",
        "  -h, --help             Display this help message and exit\n",
        "  -v, --version          Display the version and exit\n",
        "The password is read from the terminal.\n",
        "Report issues at https://github.com/meduketto/iksemel-rust/issues"
    ));
}

struct Options {
    jid: Jid,
    server: Option<String>,
    to: Option<Jid>,
    message: Option<String>,
    tls_policy: TlsPolicy,
    debug: bool,
}

fn run(options: Options) -> Result<(), XmppError> {
    let password = rpassword::prompt_password(format!("Password for {}: ", options.jid))?;
    let config = ClientConfig::new(options.jid)
        .password(&password)
        .tls_policy(options.tls_policy);
    let mut client = XmppClient::build(config)
        .server(options.server)
        .debug(options.debug)
        .connect()?;
    let jid = client.run_until_authenticated()?;
    println!("Connected as {}", jid);

    if let Some(to) = options.to {
        let mut message = Element::new("message", Some(NS_CLIENT));
        message.set_attribute("to", to.full());
        message.set_attribute("type", "chat");
        message.add_child_element("body", None, options.message.as_deref());
        client.send(&message)?;
        return client.close();
    }

    client.send(&Element::new("presence", Some(NS_CLIENT)))?;
    loop {
        match client.wait_for_stanza() {
            Ok(stanza) => println!("{}", stanza),
            Err(XmppError::ConnectionLost) => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

fn main() -> ExitCode {
    let mut args = env::args();
    let mut jid: Option<Jid> = None;
    let mut server: Option<String> = None;
    let mut to: Option<Jid> = None;
    let mut message: Option<String> = None;
    let mut tls_policy = TlsPolicy::IfAvailable;
    let mut debug = false;

    // Skip the first argument (program name)
    args.next();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-j" | "--jid" | "-t" | "--to" => {
                let Some(value) = args.next() else {
                    eprintln!("Error: Jabber ID expected after {arg}");
                    return ExitCode::FAILURE;
                };
                let parsed = match Jid::new(&value) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        eprintln!("Error: {}", err);
                        return ExitCode::FAILURE;
                    }
                };
                if arg == "-j" || arg == "--jid" {
                    jid = Some(parsed);
                } else {
                    to = Some(parsed);
                }
            }
            "-s" | "--server" => {
                if let Some(value) = args.next() {
                    server = Some(value);
                } else {
                    eprintln!("Error: host name expected after {arg}");
                    return ExitCode::FAILURE;
                }
            }
            "-m" | "--message" => {
                if let Some(value) = args.next() {
                    message = Some(value);
                } else {
                    eprintln!("Error: message text expected after {arg}");
                    return ExitCode::FAILURE;
                }
            }
            "--no-tls" => {
                tls_policy = TlsPolicy::Never;
            }
            "--require-tls" => {
                tls_policy = TlsPolicy::Required;
            }
            "-d" | "--debug" => {
                debug = true;
            }
            "-h" | "--help" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            "-v" | "--version" => {
                print_version();
                return ExitCode::SUCCESS;
            }
            _ => {
                eprintln!("Error: unknown option {arg}");
                return ExitCode::FAILURE;
            }
        }
    }

    let level = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let Some(jid) = jid else {
        eprintln!("Error: a Jabber ID is required, see --help");
        return ExitCode::FAILURE;
    };
    let options = Options {
        jid,
        server,
        to,
        message,
        tls_policy,
        debug,
    };
    if let Err(err) = run(options) {
        eprintln!("Error: {}", err);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
