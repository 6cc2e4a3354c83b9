use edgeipc_channel::{ChannelConfig, Notification, Producer};
use serde_json::Value;

use crate::cmd::{parse_duration, parse_json, PublishArgs};
use crate::exit::{channel_error, codec_error, CliResult, SUCCESS};
use crate::output::{print_fields, OutputFormat};

pub fn run(args: PublishArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let result = edgeipc_codec::from_json(parse_json("--json", &args.json)?)
        .map_err(|err| codec_error("--json is not an inference result", err))?;

    let defaults = ChannelConfig::default();
    let mut producer = Producer::new(ChannelConfig {
        timeout,
        inline_threshold: args.inline_threshold.unwrap_or(defaults.inline_threshold),
        ..defaults
    });
    let notification = producer
        .publish(&args.path, &result)
        .map_err(|err| channel_error("publish failed", err))?;

    let fields = match notification {
        Notification::Inline(payload) => vec![
            ("delivery", Value::from("inline")),
            ("size", Value::from(payload.len())),
        ],
        Notification::Shared { key, size } => vec![
            ("delivery", Value::from("shared")),
            ("key", Value::from(key)),
            ("size", Value::from(size)),
        ],
    };
    print_fields(fields, format);
    Ok(SUCCESS)
}
