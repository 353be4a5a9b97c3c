/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::collections::BTreeMap;
use std::env;
use std::fs::File;
use std::io::Read;
use std::io::stdin;
use std::process::ExitCode;

use tracing::debug;
use tracing_subscriber::EnvFilter;

use iks_xmlstream::Element;
use iks_xmlstream::ElementStream;
use iks_xmlstream::ParserError;
use iks_xmlstream::StreamHandler;

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

fn print_version() {
    println!("ikslint (iksemel) v{}", iks_xmlstream::VERSION);
}

fn print_usage() {
    println!(
        concat!(
            "Usage: ikslint [OPTIONS] [FILE.xml...]\n",
            "This tool checks XML streams, such as saved XMPP sessions.\n",
            "Options:\n",
            "  -s, --stat           Overall statistics\n",
            "  -c, --count          Stanza counts by name\n",
            "  -b, --buffer <SIZE>  File read buffer size in bytes (default: {})\n",
            "  -d, --debug          Log parser events\n",
            "  -h, --help           Display this help message and exit\n",
            "  -v, --version        Display the version and exit\n",
            "Report issues at https://github.com/meduketto/iksemel-rust/issues"
        ),
        DEFAULT_BUFFER_SIZE
    );
}

#[derive(Default)]
struct Handler {
    root: Option<String>,
    ended: bool,
    nr_stanzas: usize,
    max_depth: usize,
    nr_cdata_size: usize,
    stanza_map: BTreeMap<String, usize>,
}

fn measure(el: &Element, depth: usize, max_depth: &mut usize, cdata_size: &mut usize) {
    *max_depth = (*max_depth).max(depth);
    *cdata_size += el.text().len();
    for child in el.child_elements() {
        measure(child, depth + 1, max_depth, cdata_size);
    }
}

impl StreamHandler for Handler {
    fn document_start(&mut self, root: Element) {
        debug!(name = %root.name, "stream root");
        self.root = Some(root.name);
    }

    fn element_complete(&mut self, element: Element) {
        self.nr_stanzas += 1;
        measure(&element, 1, &mut self.max_depth, &mut self.nr_cdata_size);
        *self.stanza_map.entry(element.name).or_insert(0) += 1;
    }

    fn document_end(&mut self) {
        self.ended = true;
    }
}

impl Handler {
    fn report(&self, do_stats: bool, do_count: bool) {
        if do_stats {
            println!(
                "Root: <{}>, stanzas: {}, max stanza depth: {}",
                self.root.as_deref().unwrap_or(""),
                self.nr_stanzas,
                self.max_depth
            );
            println!(
                "Total size of character data: {} bytes.",
                self.nr_cdata_size
            );
        }
        if do_count {
            println!("Stanza counts:");
            for (name, count) in self.stanza_map.iter() {
                println!("  {}: {}", name, count);
            }
        }
    }
}

enum LinterError {
    IoError(std::io::Error),
    ParserError(ParserError),
    Unterminated,
}

impl From<std::io::Error> for LinterError {
    fn from(err: std::io::Error) -> Self {
        LinterError::IoError(err)
    }
}

impl From<ParserError> for LinterError {
    fn from(err: ParserError) -> Self {
        LinterError::ParserError(err)
    }
}

struct Linter {
    do_stats: bool,
    do_count: bool,
    parser: ElementStream,
    buffer_size: usize,
}

impl Linter {
    fn parse_file(&mut self, file: &str, is_stream: bool) -> Result<Handler, LinterError> {
        let mut f: Box<dyn Read> = if is_stream {
            Box::new(stdin())
        } else {
            Box::new(File::open(file)?)
        };
        let mut handler = Handler::default();
        let mut buffer = vec![0u8; self.buffer_size];
        loop {
            let bytes_read = f.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            self.parser.feed(&buffer[..bytes_read], &mut handler)?;
        }
        if !handler.ended {
            return Err(LinterError::Unterminated);
        }
        Ok(handler)
    }

    fn lint_file(&mut self, file: &str, is_stream: bool) -> bool {
        self.parser.reset();
        match self.parse_file(file, is_stream) {
            Ok(handler) => {
                handler.report(self.do_stats, self.do_count);
                true
            }
            Err(LinterError::IoError(e)) => {
                eprintln!("Error reading file '{}': {}", file, e);
                false
            }
            Err(LinterError::ParserError(e)) => {
                eprintln!("Error in file '{}' at {}: {}", file, self.parser.location(), e);
                false
            }
            Err(LinterError::Unterminated) => {
                eprintln!(
                    "Stream in file '{}' is not closed, {} element(s) open",
                    file,
                    self.parser.open_elements() + 1
                );
                false
            }
        }
    }
}

fn main() -> ExitCode {
    let mut args = env::args();

    let mut files = Vec::new();
    let mut do_stats = false;
    let mut do_count = false;
    let mut debug = false;
    let mut buffer_size = DEFAULT_BUFFER_SIZE;

    // Skip the first argument (program name)
    args.next();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-s" | "--stat" => {
                do_stats = true;
            }
            "-c" | "--count" => {
                do_count = true;
            }
            "-cs" | "-sc" => {
                do_stats = true;
                do_count = true;
            }
            "-b" | "--buffer" => {
                if let Some(size) = args.next() {
                    match size.parse::<usize>() {
                        Ok(size) if size > 0 => buffer_size = size,
                        _ => {
                            eprintln!("Invalid buffer size");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    eprintln!("Missing buffer size");
                    return ExitCode::FAILURE;
                }
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
                files.push(arg);
            }
        }
    }

    let level = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let mut linter = Linter {
        do_stats,
        do_count,
        parser: ElementStream::new(),
        buffer_size,
    };
    if files.is_empty() {
        if !linter.lint_file("stdin", true) {
            return ExitCode::FAILURE;
        }
    } else {
        for file in files {
            if !linter.lint_file(&file, false) {
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
