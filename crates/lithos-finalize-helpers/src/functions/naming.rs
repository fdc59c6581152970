// SPDX-License-Identifier: Apache-2.0 OR MIT
use heck::{ToSnakeCase, ToUpperCamelCase};
use lithos_finalize_engine::{Error, EvalContext, FunctionRegistryBuilder};
use serde_json::Value;

use super::{expect_exact_args, expect_string};

/// Words Go style spells in all capitals.
const INITIALISMS: &[&str] = &[
    "acl", "api", "ascii", "cpu", "css", "dns", "eof", "guid", "html", "http", "https", "id",
    "ip", "json", "jwt", "lhs", "qps", "ram", "rhs", "rpc", "sla", "smtp", "sql", "ssh", "tcp",
    "tls", "ttl", "udp", "ui", "uid", "uri", "url", "utf8", "uuid", "vm", "xml", "xmpp", "xsrf",
    "xss",
];

/// Converts a schema field name into an exported Go identifier.
///
/// Words are split on case changes and on any character that is not
/// alphanumeric, then joined in UpperCamelCase with common initialisms
/// capitalized (`user_id` becomes `UserID`). A result starting with a digit
/// gets an `F` prefix. Names without any alphanumeric character yield an
/// empty string.
pub fn goify(name: &str) -> String {
    let mut ident = String::with_capacity(name.len());
    for word in name.to_snake_case().split('_').filter(|word| !word.is_empty()) {
        if INITIALISMS.contains(&word) {
            ident.push_str(&word.to_ascii_uppercase());
        } else {
            ident.push_str(&word.to_upper_camel_case());
        }
    }
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, 'F');
    }
    ident
}

pub fn register(builder: &mut FunctionRegistryBuilder) {
    builder.register("goify", goify_helper);
}

fn goify_helper(_ctx: &mut EvalContext, args: &[Value]) -> Result<Value, Error> {
    expect_exact_args("goify", args, 1)?;
    let name = expect_string("goify", &args[0], 1)?;
    Ok(Value::String(goify(&name)))
}
