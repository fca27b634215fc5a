//! `restmap`: command-line companion to a restmap node.
//!
//! - **`sort`**: print `Accept` values in the order a server ranks them.
//! - **`negotiate`**: narrow an available list against an `Accept` header.
//! - **`request`**: send one request to a running node and print the result.

use std::fs;
use std::io::{self, Read};
use std::process;

use clap::{Parser, Subcommand};
use restmap::MediaTypeList;

/// restmap: media-type negotiation and request tool
#[derive(Parser)]
#[command(name = "restmap", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse one or more Accept values and print them highest preference first.
    ///
    /// Example:
    ///   restmap sort "text/*, text/html;level=1" "*/*;q=0.1"
    Sort {
        /// Raw Accept header values.
        #[arg(required = true, value_name = "ACCEPT")]
        accept: Vec<String>,
    },

    /// Filter the media types a server offers against an Accept header.
    ///
    /// Prints every match in rank order, then the chosen one. Exits 1 when
    /// nothing is acceptable.
    ///
    /// Example:
    ///   restmap negotiate --available "application/json, text/plain;q=0.5" "text/*"
    Negotiate {
        /// Media types offered, comma separated, with optional server-side q.
        #[arg(short, long, value_name = "LIST")]
        available: String,

        /// Raw Accept header values. Defaults to */*.
        #[arg(value_name = "ACCEPT")]
        accept: Vec<String>,
    },

    /// Send one request to a node and print status, key headers and body.
    ///
    /// Examples:
    ///   restmap request GET http://localhost:3000/mutable/numbers/2
    ///   restmap request PUT http://localhost:3000/int --data 42
    ///   restmap request POST http://localhost:3000/mutable/numbers --data @body.json
    Request {
        /// HTTP method, e.g. GET, PUT, OPTIONS.
        method: String,

        /// Full URL of the resource.
        url: String,

        /// Accept header to send.
        #[arg(long, value_name = "ACCEPT")]
        accept: Option<String>,

        /// Request body: literal text, `@path` to read a file, or `@-` for stdin.
        #[arg(short, long, value_name = "BODY")]
        data: Option<String>,

        /// Content-Type of the body.
        #[arg(long, value_name = "TYPE", default_value = "application/json")]
        content_type: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Sort { accept } => {
            for media in MediaTypeList::parse(&accept).sorted().iter() {
                println!("{media}");
            }
        }

        Command::Negotiate { available, accept } => {
            let available = MediaTypeList::parse([available]);
            let requested = if accept.is_empty() {
                MediaTypeList::any()
            } else {
                MediaTypeList::parse(&accept)
            };

            for media in available.filter(&requested).iter() {
                println!("{media}");
            }
            match available.choose(&requested) {
                Some(chosen) => println!("chosen: {}", chosen.essence()),
                None => {
                    eprintln!("restmap: none of [{available}] is acceptable");
                    process::exit(1);
                }
            }
        }

        Command::Request {
            method,
            url,
            accept,
            data,
            content_type,
        } => {
            let method = reqwest::Method::from_bytes(method.as_bytes())
                .unwrap_or_else(|e| fatal(&format!("invalid method {method:?}: {e}")));
            let client = reqwest::blocking::Client::new();
            let mut req = client.request(method, &url);
            if let Some(accept) = accept {
                req = req.header("accept", accept);
            }
            if let Some(data) = data {
                req = req.header("content-type", content_type).body(read_body(&data));
            }

            let resp = req
                .send()
                .unwrap_or_else(|e| fatal(&format!("request to {url} failed: {e}")));
            println!("{}", resp.status());
            for name in ["content-type", "location", "allow"] {
                if let Some(value) = resp.headers().get(name).and_then(|v| v.to_str().ok()) {
                    println!("{name}: {value}");
                }
            }
            let body = resp
                .text()
                .unwrap_or_else(|e| fatal(&format!("failed to read response body: {e}")));
            if !body.is_empty() {
                println!();
                println!("{}", pretty(&body));
            }
        }
    }
}

/// Resolve a `--data` argument: literal text, `@path`, or `@-` for stdin.
fn read_body(data: &str) -> Vec<u8> {
    match data.strip_prefix('@') {
        Some("-") => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .unwrap_or_else(|e| fatal(&format!("failed to read stdin: {e}")));
            buf
        }
        Some(path) => {
            fs::read(path).unwrap_or_else(|e| fatal(&format!("failed to read {path}: {e}")))
        }
        None => data.as_bytes().to_vec(),
    }
}

/// Pretty-print JSON bodies; anything else is returned unchanged.
fn pretty(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .filter(|v| v.is_object() || v.is_array())
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string())
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("restmap: {msg}");
    process::exit(2);
}
