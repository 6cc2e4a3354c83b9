use std::collections::BTreeMap;

use edgeipc_control::{ControlClient, ControlConfig};
use serde_json::Value;

use crate::cmd::{parse_duration, parse_json, ControlAction, ControlArgs};
use crate::exit::{control_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_document, print_fields, OutputFormat};

pub fn run(args: ControlArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let client = ControlClient::new(ControlConfig {
        base_url: args.url,
        timeout,
    })
    .map_err(|err| control_error("client setup failed", err))?;

    match args.action {
        ControlAction::Status => {
            let status = client
                .status()
                .map_err(|err| control_error("status failed", err))?;
            print_document(&status, format);
        }
        ControlAction::Settings => {
            let settings = client
                .settings()
                .map_err(|err| control_error("settings failed", err))?;
            print_document(&settings, format);
        }
        ControlAction::Start => {
            client
                .start()
                .map_err(|err| control_error("start failed", err))?;
            print_fields(vec![("started", Value::Bool(true))], format);
        }
        ControlAction::Stop => {
            client
                .stop()
                .map_err(|err| control_error("stop failed", err))?;
            print_fields(vec![("stopped", Value::Bool(true))], format);
        }
        ControlAction::Patch { json } => {
            let settings = form_fields(parse_json("--json", &json)?)?;
            if !client.patch_settings(&settings) {
                return Err(CliError::new(
                    FAILURE,
                    format!("settings patch to {} failed", client.base_url()),
                ));
            }
            print_fields(vec![("patched", Value::from(settings.len()))], format);
        }
    }

    Ok(SUCCESS)
}

/// Flatten a JSON object into form fields. Strings are sent as-is, other
/// values in their JSON text form.
fn form_fields(document: Value) -> CliResult<BTreeMap<String, String>> {
    let Value::Object(object) = document else {
        return Err(CliError::new(USAGE, "--json must be a JSON object"));
    };
    Ok(object
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn form_fields_flatten_values() {
        let fields = form_fields(json!({ "name": "cam", "fps": 15, "on": true })).unwrap();
        assert_eq!(fields["name"], "cam");
        assert_eq!(fields["fps"], "15");
        assert_eq!(fields["on"], "true");
    }

    #[test]
    fn form_fields_require_object() {
        let err = form_fields(json!([1, 2])).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
