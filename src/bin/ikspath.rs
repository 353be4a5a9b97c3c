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
use std::fs::File;
use std::io::Read;
use std::io::stdin;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use iks_xmlstream::BadXPath;
use iks_xmlstream::DocumentParser;
use iks_xmlstream::Element;
use iks_xmlstream::ParserError;
use iks_xmlstream::XPathQuery;

fn print_version() {
    println!("ikspath (iksemel) v{}", iks_xmlstream::VERSION);
}

fn print_usage() {
    println!(concat!(
        "Usage: ikspath [OPTIONS] [XPATH expression]\n",
        "This tool applies XPATH expression to an XML document.\n",
        "Options:\n",
        "  -f, --file <FILE.xml>  Specify the XML file to process (default: stdin)\n",
        "  -s, --string           Print the text of the matches instead of the elements\n",
        "  -h, --help             Display this help message and exit\n",
        "  -v, --version          Display the version and exit\n",
        "Report issues at https://github.com/meduketto/iksemel-rust/issues"
    ));
}

enum IkspathError {
    IoError(std::io::Error),
    ParserError(ParserError),
    BadXPath(BadXPath),
    NoMatch,
}

impl From<std::io::Error> for IkspathError {
    fn from(err: std::io::Error) -> Self {
        IkspathError::IoError(err)
    }
}

impl From<ParserError> for IkspathError {
    fn from(err: ParserError) -> Self {
        IkspathError::ParserError(err)
    }
}

impl From<BadXPath> for IkspathError {
    fn from(err: BadXPath) -> Self {
        IkspathError::BadXPath(err)
    }
}

fn load_file(file: Option<&str>) -> Result<Element, IkspathError> {
    let mut f: Box<dyn Read> = match file {
        Some(file) => Box::new(File::open(file)?),
        None => Box::new(stdin()),
    };
    let mut parser = DocumentParser::new();
    let mut buffer = vec![0u8; 256 * 1024];
    loop {
        let bytes_read = f.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        parser.parse_bytes(&buffer[..bytes_read])?;
    }
    Ok(parser.into_element()?)
}

fn process_file(
    file: Option<&str>,
    expression: &str,
    as_string: bool,
) -> Result<(), IkspathError> {
    let query = XPathQuery::new(expression)?;
    let doc = load_file(file)?;
    if as_string {
        let strings = query
            .query_for_string_list(&doc)
            .ok_or(IkspathError::NoMatch)?;
        for s in strings {
            println!("{}", s);
        }
    } else {
        let nodes = query.query_for_nodes(&doc).ok_or(IkspathError::NoMatch)?;
        for node in nodes {
            println!("{}", node);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let mut args = env::args();

    let mut file: Option<String> = None;
    let mut expression: Option<String> = None;
    let mut as_string = false;

    // Skip the first argument (program name)
    args.next();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-f" | "--file" => {
                if let Some(value) = args.next() {
                    file = Some(value);
                } else {
                    eprintln!("Error: file name expected after -f/--file");
                    return ExitCode::FAILURE;
                }
            }
            "-s" | "--string" => {
                as_string = true;
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
                if expression.is_none() {
                    expression = Some(arg.to_string());
                } else {
                    eprintln!("Error: only one expression can be specified");
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let Some(expression) = expression else {
        eprintln!("Error: an XPATH expression is required");
        return ExitCode::FAILURE;
    };

    match process_file(file.as_deref(), &expression, as_string) {
        Ok(_) => {}
        Err(IkspathError::IoError(err)) => {
            eprintln!("IO Error: {}", err);
            return ExitCode::FAILURE;
        }
        Err(IkspathError::ParserError(err)) => {
            eprintln!("Error: {}", err);
            return ExitCode::FAILURE;
        }
        Err(IkspathError::BadXPath(err)) => {
            eprintln!("Error: {}", err);
            return ExitCode::FAILURE;
        }
        Err(IkspathError::NoMatch) => {
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
