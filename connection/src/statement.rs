//! Statement execution helpers: `?`-placeholder substitution for direct execution, and
//! host-value → `Datatypes.Any` conversion for prepared-statement arguments.

use chrono_tz::Tz;
use common::err::{Error, XResult};

use crate::decimal::Decimal;
use crate::proto::mysqlx::datatypes::scalar::{Octets, Type as ScalarType};
use crate::proto::mysqlx::datatypes::{Any, Scalar};

/// A prepared statement handle: session-unique id plus the placeholder count computed when
/// it was prepared.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub stmt_id: u32,
    pub placeholder_count: usize,
}

/// Host-language argument to a statement. Covers every scalar `StmtExecute`/`Execute` can
/// carry; a `None` passed at the call site becomes [`Arg::Null`].
#[derive(Debug, Clone)]
pub enum Arg {
    Null,
    Bool(bool),
    SInt(i64),
    UInt(u64),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    Decimal(Decimal),
    DateTime(chrono::DateTime<Tz>),
    /// Joined with `,` into a single string, matching MySQL `SET` literal syntax.
    StringList(Vec<String>),
}

/// Counts `?` placeholders outside single- and double-quoted literals. Used to size a
/// freshly prepared statement's argument list.
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '?' => count += 1,
            None => {}
        }
    }
    count
}

/// Substitutes `?` placeholders outside quoted literals with `args` rendered as SQL
/// literals. Embedded quotes inside string arguments are **not** escaped — callers handling
/// untrusted input should use a prepared statement instead.
pub fn substitute_placeholders(sql: &str, args: &[Arg]) -> XResult<String> {
    let placeholders = count_placeholders(sql);
    if placeholders != args.len() {
        return Err(Error::argument(format!(
            "statement has {placeholders} placeholders but {} arguments were given",
            args.len()
        )));
    }

    let mut out = String::with_capacity(sql.len() + args.len() * 4);
    let mut quote: Option<char> = None;
    let mut args = args.iter();

    for c in sql.chars() {
        match quote {
            Some(q) if c == q => {
                quote = None;
                out.push(c);
            }
            Some(_) => out.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                out.push(c);
            }
            None if c == '?' => {
                let arg = args.next().expect("placeholder count already validated");
                out.push_str(&render_literal(arg)?);
            }
            None => out.push(c),
        }
    }

    Ok(out)
}

fn render_literal(arg: &Arg) -> XResult<String> {
    Ok(match arg {
        Arg::Null => "NULL".to_string(),
        Arg::Bool(b) => if *b { "1".to_string() } else { "0".to_string() },
        Arg::SInt(n) => n.to_string(),
        Arg::UInt(n) => n.to_string(),
        Arg::Double(f) => f.to_string(),
        Arg::Bytes(bytes) => format!("_binary'{}'", hex::encode(bytes)),
        Arg::Str(s) => format!("'{s}'"),
        Arg::Decimal(d) => d.to_string(),
        Arg::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.6f")),
        Arg::StringList(items) => format!("'{}'", items.join(",")),
    })
}

/// Converts a host argument into the `Datatypes.Any` scalar a prepared `Execute` carries.
pub fn arg_to_any(arg: &Arg) -> Any {
    let scalar = match arg {
        Arg::Null => Scalar { r#type: ScalarType::VNull as i32, ..Default::default() },
        Arg::Bool(b) => Scalar { r#type: ScalarType::VBool as i32, v_bool: Some(*b), ..Default::default() },
        Arg::SInt(n) => Scalar { r#type: ScalarType::VSint as i32, v_signed_int: Some(*n), ..Default::default() },
        Arg::UInt(n) => Scalar { r#type: ScalarType::VUint as i32, v_unsigned_int: Some(*n), ..Default::default() },
        Arg::Double(f) => Scalar { r#type: ScalarType::VDouble as i32, v_double: Some(*f), ..Default::default() },
        Arg::Bytes(bytes) => Scalar {
            r#type: ScalarType::VOctets as i32,
            v_octets: Some(Octets { value: bytes.clone(), content_type: None }),
            ..Default::default()
        },
        Arg::Str(s) => string_scalar(s.clone()),
        Arg::Decimal(d) => string_scalar(d.to_string()),
        Arg::DateTime(dt) => string_scalar(dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        Arg::StringList(items) => string_scalar(items.join(",")),
    };

    Any {
        r#type: crate::proto::mysqlx::datatypes::any::Type::Scalar as i32,
        scalar: Some(scalar),
        obj: None,
        array: None,
    }
}

fn string_scalar(s: String) -> Scalar {
    use crate::proto::mysqlx::datatypes::scalar::String as ScalarString;
    Scalar {
        r#type: ScalarType::VString as i32,
        v_string: Some(ScalarString { value: s.into_bytes(), collation: None }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_in_order_preserving_quoted_placeholders() {
        let sql = "SELECT ?, ?, '?', ? from dual";
        let args = [Arg::SInt(1), Arg::Str("one".into()), Arg::SInt(3)];
        let out = substitute_placeholders(sql, &args).unwrap();
        assert_eq!(out, "SELECT 1, 'one', '?', 3 from dual");
    }

    #[test]
    fn mismatched_count_is_rejected() {
        let sql = "SELECT ?, ?";
        let args = [Arg::Null];
        assert!(substitute_placeholders(sql, &args).is_err());
    }

    #[test]
    fn null_renders_as_null_literal() {
        assert_eq!(substitute_placeholders("?", &[Arg::Null]).unwrap(), "NULL");
    }

    #[test]
    fn bytes_render_as_binary_hex_literal() {
        let out = substitute_placeholders("?", &[Arg::Bytes(vec![0xDE, 0xAD])]).unwrap();
        assert_eq!(out, "_binary'dead'");
    }
}
