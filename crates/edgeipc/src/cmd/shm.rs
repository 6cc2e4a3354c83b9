use edgeipc_transport::{read_by_key, remove_by_key, segment_capacity, SharedSegment};
use serde_json::Value;

use crate::cmd::{resolve_payload, ShmAction, ShmArgs, ShmKeyArgs, ShmWriteArgs};
use crate::exit::{transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{payload_preview, print_fields, print_raw, OutputFormat};

pub fn run(args: ShmArgs, format: OutputFormat) -> CliResult<i32> {
    match args.action {
        ShmAction::Write(args) => write(args, format),
        ShmAction::Read(args) => read(args, format),
        ShmAction::Remove(args) => remove(args, format),
    }
}

fn write(args: ShmWriteArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(None, args.data.as_deref(), args.file.as_ref())?;
    let capacity = args.capacity.unwrap_or(payload.len());
    if payload.len() > capacity {
        return Err(CliError::new(
            USAGE,
            format!(
                "payload is {} bytes but --capacity is {capacity}",
                payload.len()
            ),
        ));
    }

    let segment = match (args.key, args.key_path.as_ref()) {
        (Some(key), _) => SharedSegment::create_with_key(key, capacity),
        (None, Some(path)) => SharedSegment::create_for_path(path, args.project_id, capacity),
        (None, None) => SharedSegment::create(capacity),
    }
    .map_err(|err| transport_error("create failed", err))?;
    segment
        .write(&payload)
        .map_err(|err| transport_error("write failed", err))?;

    // The segment must survive this process so another one can read it.
    let key = segment.into_key();
    print_fields(
        vec![
            ("key", Value::from(key)),
            ("size", Value::from(payload.len())),
            ("capacity", Value::from(capacity)),
        ],
        format,
    );
    Ok(SUCCESS)
}

fn read(args: ShmKeyArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = read_by_key(args.key).map_err(|err| transport_error("read failed", err))?;
    if matches!(format, OutputFormat::Raw) {
        print_raw(&payload);
        return Ok(SUCCESS);
    }

    let capacity =
        segment_capacity(args.key).map_err(|err| transport_error("stat failed", err))?;
    print_fields(
        vec![
            ("key", Value::from(args.key)),
            ("size", Value::from(payload.len())),
            ("capacity", Value::from(capacity)),
            ("payload", Value::from(payload_preview(&payload))),
        ],
        format,
    );
    Ok(SUCCESS)
}

fn remove(args: ShmKeyArgs, format: OutputFormat) -> CliResult<i32> {
    remove_by_key(args.key).map_err(|err| transport_error("remove failed", err))?;
    print_fields(vec![("removed", Value::from(args.key))], format);
    Ok(SUCCESS)
}
