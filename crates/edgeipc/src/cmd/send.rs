use edgeipc_channel::{connect_and_send, connect_send_with_trailer, request};

use crate::cmd::{parse_duration, read_file, resolve_payload, SendArgs};
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_fields, print_payload, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = resolve_payload(args.json.as_deref(), args.data.as_deref(), args.file.as_ref())?;

    if args.wait {
        let response = request(&args.path, &payload, timeout)
            .map_err(|err| channel_error("request failed", err))?;
        print_payload(&response, format);
        return Ok(SUCCESS);
    }

    let trailer_size = match &args.trailer_file {
        Some(path) => {
            let trailer = read_file(path)?;
            connect_send_with_trailer(&args.path, &payload, &trailer, timeout)
                .map_err(|err| channel_error("send failed", err))?;
            Some(trailer.len())
        }
        None => {
            connect_and_send(&args.path, &payload, timeout)
                .map_err(|err| channel_error("send failed", err))?;
            None
        }
    };

    let mut fields = vec![("sent", serde_json::Value::from(payload.len()))];
    if let Some(size) = trailer_size {
        fields.push(("trailer", serde_json::Value::from(size)));
    }
    print_fields(fields, format);
    Ok(SUCCESS)
}
