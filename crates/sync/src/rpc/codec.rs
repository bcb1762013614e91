//! XML-RPC wire codec.
//!
//! Encodes `<methodCall>` documents and decodes `<methodResponse>` documents
//! (including `<fault>`). The inverse pair, [`decode_call`] and
//! [`encode_response`], serves mock servers in tests.
//!
//! Decoding builds a small element tree with `quick-xml` first and then
//! interprets it, so unexpected whitespace or element order inside a value
//! never confuses the reader.

use std::fmt::Write as _;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::NaiveDateTime;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

use super::value::{RemoteStruct, RemoteValue};
use crate::error::SyncError;

const DATETIME_FORMAT: &str = "%Y%m%dT%H:%M:%S";
const DATETIME_FORMAT_DASHED: &str = "%Y-%m-%dT%H:%M:%S";

// =============================================================================
// Encoding
// =============================================================================

/// Encode a `<methodCall>` document.
#[must_use]
pub fn encode_call(method: &str, params: &[RemoteValue]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

/// Encode a `<methodResponse>` document. A `Fault` value becomes `<fault>`.
#[must_use]
pub fn encode_response(value: &RemoteValue) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodResponse>");
    if let RemoteValue::Fault { code, message } = value {
        out.push_str("<fault>");
        write_value(
            &mut out,
            &RemoteValue::structure([
                ("faultCode", RemoteValue::Int(*code)),
                ("faultString", RemoteValue::from(message.as_str())),
            ]),
        );
        out.push_str("</fault>");
    } else {
        out.push_str("<params><param>");
        write_value(&mut out, value);
        out.push_str("</param></params>");
    }
    out.push_str("</methodResponse>");
    out
}

fn write_value(out: &mut String, value: &RemoteValue) {
    out.push_str("<value>");
    match value {
        RemoteValue::Int(i) => {
            // i4 overflows above 2^31; Odoo accepts i8 for larger ids
            let tag = if i32::try_from(*i).is_ok() { "int" } else { "i8" };
            let _ = write!(out, "<{tag}>{i}</{tag}>");
        }
        RemoteValue::Bool(b) => {
            let _ = write!(out, "<boolean>{}</boolean>", u8::from(*b));
        }
        RemoteValue::Str(s) => {
            let _ = write!(out, "<string>{}</string>", escape(s.as_str()));
        }
        RemoteValue::Double(f) => {
            let f = if f.is_finite() { *f } else { 0.0 };
            let _ = write!(out, "<double>{f}</double>");
        }
        RemoteValue::DateTime(dt) => {
            let _ = write!(
                out,
                "<dateTime.iso8601>{}</dateTime.iso8601>",
                dt.format(DATETIME_FORMAT)
            );
        }
        RemoteValue::Base64(bytes) => {
            let _ = write!(out, "<base64>{}</base64>", BASE64.encode(bytes));
        }
        RemoteValue::Struct(members) => {
            out.push_str("<struct>");
            for (name, member) in members {
                let _ = write!(out, "<member><name>{}</name>", escape(name.as_str()));
                write_value(out, member);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
        RemoteValue::Array(items) => {
            out.push_str("<array><data>");
            for item in items {
                write_value(out, item);
            }
            out.push_str("</data></array>");
        }
        RemoteValue::Nil | RemoteValue::Fault { .. } => out.push_str("<nil/>"),
    }
    out.push_str("</value>");
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a `<methodResponse>` body.
///
/// A `<fault>` is returned as `RemoteValue::Fault`, not as an error; callers
/// must check it with [`RemoteValue::into_result`].
///
/// # Errors
///
/// Returns `SyncError::Parse` if the body is not a well-formed response.
pub fn decode_response(body: &str) -> Result<RemoteValue, SyncError> {
    let root = parse_tree(body)?;
    let response = root
        .child("methodResponse")
        .ok_or_else(|| SyncError::parse("decode response", "missing <methodResponse>"))?;

    if let Some(fault) = response.child("fault") {
        let value = fault
            .child("value")
            .ok_or_else(|| SyncError::parse("decode fault", "missing <value>"))
            .and_then(decode_value)?;
        let code = value
            .get("faultCode")
            .and_then(|c| c.as_i64().or_else(|| c.text()?.trim().parse().ok()))
            .unwrap_or_default();
        let message = value
            .get("faultString")
            .and_then(RemoteValue::text)
            .unwrap_or_default()
            .to_string();
        return Ok(RemoteValue::Fault { code, message });
    }

    let params = response
        .child("params")
        .ok_or_else(|| SyncError::parse("decode response", "missing <params> or <fault>"))?;
    match params.child("param").and_then(|p| p.child("value")) {
        Some(value) => decode_value(value),
        None => Ok(RemoteValue::Nil),
    }
}

/// Decode a `<methodCall>` body into its method name and parameters.
///
/// # Errors
///
/// Returns `SyncError::Parse` if the body is not a well-formed call.
pub fn decode_call(body: &str) -> Result<(String, Vec<RemoteValue>), SyncError> {
    let root = parse_tree(body)?;
    let call = root
        .child("methodCall")
        .ok_or_else(|| SyncError::parse("decode call", "missing <methodCall>"))?;
    let method = call
        .child("methodName")
        .map(|m| m.text.trim().to_string())
        .ok_or_else(|| SyncError::parse("decode call", "missing <methodName>"))?;
    let params = call
        .child("params")
        .map(|params| {
            params
                .children_named("param")
                .filter_map(|p| p.child("value"))
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();
    Ok((method, params))
}

fn decode_value(node: &Element) -> Result<RemoteValue, SyncError> {
    // Untyped <value>text</value> is a string
    let Some(typed) = node.children.first() else {
        return Ok(RemoteValue::Str(node.text.clone()));
    };
    let text = typed.text.as_str();

    match typed.name.as_str() {
        "int" | "i4" | "i8" => text
            .trim()
            .parse()
            .map(RemoteValue::Int)
            .map_err(|e| SyncError::parse("decode int", e)),
        "boolean" => match text.trim() {
            "1" | "true" => Ok(RemoteValue::Bool(true)),
            "0" | "false" => Ok(RemoteValue::Bool(false)),
            other => Err(SyncError::parse("decode boolean", format!("{other:?}"))),
        },
        "string" => Ok(RemoteValue::Str(text.to_string())),
        "double" => text
            .trim()
            .parse()
            .map(RemoteValue::Double)
            .map_err(|e| SyncError::parse("decode double", e)),
        "dateTime.iso8601" => {
            let raw = text.trim();
            NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT_DASHED))
                .map(RemoteValue::DateTime)
                .map_err(|e| SyncError::parse("decode dateTime", e))
        }
        "base64" => {
            let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            BASE64
                .decode(compact)
                .map(RemoteValue::Base64)
                .map_err(|e| SyncError::parse("decode base64", e))
        }
        "struct" => {
            let mut members = RemoteStruct::new();
            for member in typed.children_named("member") {
                let name = member
                    .child("name")
                    .map(|n| n.text.clone())
                    .ok_or_else(|| SyncError::parse("decode struct", "member without <name>"))?;
                let value = member
                    .child("value")
                    .ok_or_else(|| SyncError::parse("decode struct", "member without <value>"))
                    .and_then(decode_value)?;
                members.insert(name, value);
            }
            Ok(RemoteValue::Struct(members))
        }
        "array" => typed
            .child("data")
            .map(|data| {
                data.children_named("value")
                    .map(decode_value)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()
            .map(|items| RemoteValue::Array(items.unwrap_or_default())),
        "nil" => Ok(RemoteValue::Nil),
        other => Err(SyncError::parse("decode value", format!("unknown type <{other}>"))),
    }
}

// =============================================================================
// Element tree
// =============================================================================

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn named(name: &[u8]) -> Result<Self, SyncError> {
        let name = std::str::from_utf8(name).map_err(|e| SyncError::parse("element name", e))?;
        Ok(Self {
            name: name.to_string(),
            ..Self::default()
        })
    }

    fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn parse_tree(body: &str) -> Result<Element, SyncError> {
    let mut reader = Reader::from_str(body);
    let mut stack = vec![Element::default()];

    loop {
        let event = reader
            .read_event()
            .map_err(|e| SyncError::parse("malformed XML", e))?;
        match event {
            Event::Start(start) => stack.push(Element::named(start.local_name().as_ref())?),
            Event::Empty(start) => {
                let element = Element::named(start.local_name().as_ref())?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(element);
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| SyncError::parse("malformed XML", "unbalanced end tag"))?;
                let parent = stack
                    .last_mut()
                    .ok_or_else(|| SyncError::parse("malformed XML", "unbalanced end tag"))?;
                parent.children.push(element);
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| SyncError::parse("malformed XML text", e))?;
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text);
                }
            }
            Event::CData(cdata) => {
                if let Some(current) = stack.last_mut() {
                    current
                        .text
                        .push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(SyncError::parse("malformed XML", "unclosed element"));
    }
    stack
        .pop()
        .ok_or_else(|| SyncError::parse("malformed XML", "empty document"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_call() {
        let body = encode_call(
            "authenticate",
            &[
                "odoo".into(),
                "bot@acme.test".into(),
                "k&y".into(),
                RemoteValue::structure::<_, String>([]),
            ],
        );
        assert!(body.starts_with("<?xml version=\"1.0\"?><methodCall>"));
        assert!(body.contains("<methodName>authenticate</methodName>"));
        assert!(body.contains("<value><string>k&amp;y</string></value>"));
        assert!(body.contains("<value><struct></struct></value>"));
    }

    #[test]
    fn test_encode_scalars() {
        let body = encode_call(
            "m",
            &[
                RemoteValue::Int(5),
                RemoteValue::Int(5_000_000_000),
                RemoteValue::Bool(true),
                RemoteValue::Double(2.5),
                RemoteValue::Nil,
            ],
        );
        assert!(body.contains("<int>5</int>"));
        assert!(body.contains("<i8>5000000000</i8>"));
        assert!(body.contains("<boolean>1</boolean>"));
        assert!(body.contains("<double>2.5</double>"));
        assert!(body.contains("<nil/>"));
    }

    #[test]
    fn test_decode_int_response() {
        let body = r#"<?xml version="1.0"?>
<methodResponse>
  <params>
    <param>
      <value><int>7</int></value>
    </param>
  </params>
</methodResponse>"#;
        assert_eq!(decode_response(body).unwrap(), RemoteValue::Int(7));
    }

    #[test]
    fn test_decode_false_uid() {
        let body = "<methodResponse><params><param><value><boolean>0</boolean></value></param></params></methodResponse>";
        assert_eq!(decode_response(body).unwrap(), RemoteValue::Bool(false));
    }

    #[test]
    fn test_decode_fault() {
        let body = r"<?xml version='1.0'?>
<methodResponse>
<fault>
<value><struct>
<member>
<name>faultCode</name>
<value><int>2</int></value>
</member>
<member>
<name>faultString</name>
<value><string>Invalid field &apos;foo&apos; on model &apos;sale.order&apos;</string></value>
</member>
</struct></value>
</fault>
</methodResponse>";
        let value = decode_response(body).unwrap();
        assert_eq!(
            value,
            RemoteValue::Fault {
                code: 2,
                message: "Invalid field 'foo' on model 'sale.order'".to_string()
            }
        );
    }

    #[test]
    fn test_decode_search_read_records() {
        let body = r"<methodResponse><params><param><value><array><data>
<value><struct>
<member><name>id</name><value><int>12</int></value></member>
<member><name>name</name><value><string>Ana Gómez</string></value></member>
<member><name>phone</name><value><boolean>0</boolean></value></member>
<member><name>country_id</name><value><array><data><value><int>49</int></value><value><string>Colombia</string></value></data></array></value></member>
<member><name>list_price</name><value><double>19.5</double></value></member>
<member><name>note</name><value>untyped text</value></member>
</struct></value>
</data></array></value></param></params></methodResponse>";
        let value = decode_response(body).unwrap();
        let records = value.items().unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.get("id"), Some(&RemoteValue::Int(12)));
        assert_eq!(record.get("name").and_then(RemoteValue::text), Some("Ana Gómez"));
        assert_eq!(record.get("phone").and_then(RemoteValue::text), Some(""));
        assert_eq!(
            record.get("country_id").and_then(RemoteValue::many2one_id).map(|id| id.as_i64()),
            Some(49)
        );
        assert_eq!(record.get("list_price"), Some(&RemoteValue::Double(19.5)));
        assert_eq!(record.get("note").and_then(RemoteValue::text), Some("untyped text"));
    }

    #[test]
    fn test_decode_empty_array_and_datetime() {
        let body = "<methodResponse><params><param><value><array><data/></array></value></param></params></methodResponse>";
        assert_eq!(decode_response(body).unwrap(), RemoteValue::Array(vec![]));

        let body = "<methodResponse><params><param><value><dateTime.iso8601>20240131T08:30:00</dateTime.iso8601></value></param></params></methodResponse>";
        let RemoteValue::DateTime(dt) = decode_response(body).unwrap() else {
            panic!("expected dateTime");
        };
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-31 08:30");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_response("<html><body>502 Bad Gateway</body></html>"),
            Err(SyncError::Parse(_))
        ));
        assert!(matches!(
            decode_response("<methodResponse><params>"),
            Err(SyncError::Parse(_))
        ));
        assert!(matches!(
            decode_response("<methodResponse><params><param><value><int>x</int></value></param></params></methodResponse>"),
            Err(SyncError::Parse(_))
        ));
    }

    #[test]
    fn test_call_round_trip() {
        let params = vec![
            RemoteValue::from("odoo"),
            RemoteValue::Int(2),
            RemoteValue::from("sale.order"),
            RemoteValue::Array(vec![RemoteValue::Array(vec![
                "name".into(),
                "=".into(),
                "WC1001 <&>".into(),
            ])]),
            RemoteValue::structure([("limit", RemoteValue::Int(1))]),
            RemoteValue::Base64(b"hello".to_vec()),
        ];
        let (method, decoded) = decode_call(&encode_call("execute_kw", &params)).unwrap();
        assert_eq!(method, "execute_kw");
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_response_round_trip() {
        let fault = RemoteValue::Fault {
            code: 3,
            message: "Access Denied".to_string(),
        };
        assert_eq!(decode_response(&encode_response(&fault)).unwrap(), fault);

        let value = RemoteValue::structure([("server_version", "17.0".into())]);
        assert_eq!(decode_response(&encode_response(&value)).unwrap(), value);
    }
}
