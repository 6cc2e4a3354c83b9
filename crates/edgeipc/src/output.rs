use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use edgeipc_channel::{Notification, Received};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReceivedOutput<'a> {
    delivery: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<i32>,
    payload_size: usize,
    payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trailer_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    timestamp: String,
}

/// Print one received notification, its optional trailer and decoded result.
pub fn print_received(
    received: &Received,
    trailer: Option<&[u8]>,
    result: Option<&Value>,
    format: OutputFormat,
) {
    let (delivery, key) = match received.notification {
        Notification::Inline(_) => ("inline", None),
        Notification::Shared { key, .. } => ("shared", Some(key)),
    };
    let payload = received.payload.as_ref();

    match format {
        OutputFormat::Json => {
            let out = ReceivedOutput {
                delivery,
                key,
                payload_size: payload.len(),
                payload: payload_preview(payload),
                trailer_size: trailer.map(<[u8]>::len),
                result,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DELIVERY", "KEY", "SIZE", "TRAILER", "PAYLOAD"])
                .add_row(vec![
                    delivery.to_string(),
                    key.map(|k| k.to_string()).unwrap_or_default(),
                    payload.len().to_string(),
                    trailer.map(|t| t.len().to_string()).unwrap_or_default(),
                    match result {
                        Some(value) => value.to_string(),
                        None => payload_preview(payload),
                    },
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let mut line = format!("delivery={delivery} size={}", payload.len());
            if let Some(key) = key {
                line.push_str(&format!(" key={key}"));
            }
            if let Some(trailer) = trailer {
                line.push_str(&format!(" trailer={}", trailer.len()));
            }
            match result {
                Some(value) => line.push_str(&format!(" result={value}")),
                None => line.push_str(&format!(" payload={}", payload_preview(payload))),
            }
            println!("{line}");
        }
        OutputFormat::Raw => {
            print_raw(payload);
        }
    }
}

/// Print a payload read from a socket or segment.
pub fn print_payload(payload: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Raw => print_raw(payload),
        _ => print_fields(
            vec![
                ("size", Value::from(payload.len())),
                ("payload", Value::from(payload_preview(payload))),
            ],
            format,
        ),
    }
}

/// Print a flat set of named values.
pub fn print_fields(fields: Vec<(&'static str, Value)>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let object: Map<String, Value> = fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect();
            println!("{}", Value::Object(object));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in fields {
                table.add_row(vec![name.to_string(), display_value(&value)]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line: Vec<String> = fields
                .iter()
                .map(|(name, value)| format!("{name}={}", display_value(value)))
                .collect();
            println!("{}", line.join(" "));
        }
        OutputFormat::Raw => {
            for (_, value) in fields {
                println!("{}", display_value(&value));
            }
        }
    }
}

/// Print a JSON document returned by the control plane.
pub fn print_document(document: &Value, format: OutputFormat) {
    match (format, document) {
        (OutputFormat::Table, Value::Object(object)) => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KEY", "VALUE"]);
            for (key, value) in object {
                table.add_row(vec![key.clone(), display_value(value)]);
            }
            println!("{table}");
        }
        (OutputFormat::Pretty, _) => {
            println!(
                "{}",
                serde_json::to_string_pretty(document).unwrap_or_else(|_| document.to_string())
            );
        }
        _ => println!("{document}"),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

pub fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_text_and_binary() {
        assert_eq!(payload_preview(b"hello"), "hello");
        assert_eq!(payload_preview(&[0x81, 0xff]), "<binary 2 bytes>");
    }

    #[test]
    fn display_strips_string_quotes() {
        assert_eq!(display_value(&Value::from("on")), "on");
        assert_eq!(display_value(&Value::from(3)), "3");
        assert_eq!(display_value(&Value::Null), "-");
    }
}
