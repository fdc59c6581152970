// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Prints the finalizer for a JSON schema document.
//!
//! ```text
//! cargo run -p lithos-finalize --example finalize_schema -- schema.json [target] [config.json]
//! ```
//!
//! Without arguments a small built-in schema is used.
use std::env;
use std::fs;
use std::process::ExitCode;

use lithos_finalize::{
    Attribute, Error, Finalizer, FinalizerConfig, ObjectAttribute, Primitive,
};

fn sample_schema() -> Attribute {
    let address = ObjectAttribute::new()
        .field("street", Primitive::String)
        .field_with_default("country", Primitive::String, "NL");
    ObjectAttribute::new()
        .field_with_default("retries", Primitive::Integer, 3)
        .field_with_default("ratio", Primitive::Number, 0.5)
        .field("address", address.clone())
        .field("history", Attribute::array(address))
        .into()
}

fn run() -> Result<String, Error> {
    let mut args = env::args().skip(1);
    let schema = match args.next() {
        Some(path) => Attribute::from_json_str(&fs::read_to_string(path)?)?,
        None => sample_schema(),
    };
    let target = args.next().unwrap_or_else(|| "v".to_string());
    let config = match args.next() {
        Some(path) => FinalizerConfig::from_path(path)?,
        None => FinalizerConfig::default(),
    };
    Finalizer::new(config)?.synthesize(&schema, &target, 1)
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => {
            println!("{code}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
