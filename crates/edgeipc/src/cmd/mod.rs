use clap::{Args, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use edgeipc_control::DEFAULT_BASE_URL;

use crate::exit::{codec_error, io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod control;
pub mod listen;
pub mod publish;
pub mod send;
pub mod shm;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Listen on a socket and print received frames.
    Listen(ListenArgs),
    /// Send a single frame.
    Send(SendArgs),
    /// Publish an inference result to a consumer socket.
    Publish(PublishArgs),
    /// Create, read and remove shared-memory segments.
    Shm(ShmArgs),
    /// Talk to the runtime's control plane.
    Control(ControlArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Publish(args) => publish::run(args, format),
        Command::Shm(args) => shm::run(args, format),
        Command::Control(args) => control::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Per-connection receive timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Decode each payload as an inference result.
    #[arg(long)]
    pub decode: bool,
    /// Read a raw trailer of N bytes after each frame.
    #[arg(long, value_name = "N")]
    pub trailer_size: Option<usize>,
    /// Octal permission bits for the socket file; 666 lets other users connect.
    #[arg(long, value_name = "MODE", default_value = "600", value_parser = parse_mode)]
    pub socket_mode: u32,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Inference result as JSON, sent MessagePack-encoded.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Send the contents of this file as an unprefixed trailer.
    #[arg(long, value_name = "FILE", conflicts_with = "wait")]
    pub trailer_file: Option<PathBuf>,
    /// Wait for one response frame and print it.
    #[arg(long)]
    pub wait: bool,
    /// Connect, send and response timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Consumer socket path.
    pub path: PathBuf,
    /// Inference result as JSON.
    #[arg(long)]
    pub json: String,
    /// Encoded results above this many bytes go through shared memory.
    #[arg(long, value_name = "BYTES")]
    pub inline_threshold: Option<usize>,
    /// Send and acknowledgement timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ShmArgs {
    #[command(subcommand)]
    pub action: ShmAction,
}

#[derive(Subcommand, Debug)]
pub enum ShmAction {
    /// Write a payload into a new segment and leave it in place.
    Write(ShmWriteArgs),
    /// Print the payload of a segment.
    Read(ShmKeyArgs),
    /// Remove a segment.
    Remove(ShmKeyArgs),
}

#[derive(Args, Debug)]
pub struct ShmWriteArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Segment capacity in bytes. Defaults to the payload size.
    #[arg(long)]
    pub capacity: Option<usize>,
    /// Explicit segment key (decimal or 0x-prefixed hex). Random if omitted.
    #[arg(long, value_parser = parse_key, conflicts_with = "key_path")]
    pub key: Option<i32>,
    /// Derive the key from an existing file with ftok(3).
    #[arg(long, value_name = "PATH")]
    pub key_path: Option<PathBuf>,
    /// Project id combined with --key-path.
    #[arg(long, default_value_t = 1)]
    pub project_id: u8,
}

#[derive(Args, Debug)]
pub struct ShmKeyArgs {
    /// Segment key (decimal or 0x-prefixed hex).
    #[arg(value_parser = parse_key, allow_negative_numbers = true)]
    pub key: i32,
}

#[derive(Args, Debug)]
pub struct ControlArgs {
    #[command(subcommand)]
    pub action: ControlAction,
    /// Control-plane base URL.
    #[arg(long, env = "EDGEIPC_CONTROL_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub url: String,
    /// Request timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s", global = true)]
    pub timeout: String,
}

#[derive(Subcommand, Debug)]
pub enum ControlAction {
    /// Print the runtime status.
    Status,
    /// Print the runtime settings.
    Settings,
    /// Start the runtime.
    Start,
    /// Stop the runtime.
    Stop,
    /// Patch runtime settings from a flat JSON object.
    Patch {
        #[arg(long)]
        json: String,
    },
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `500ms` or bare seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// Parse a segment key given in decimal or `0x` hex.
pub fn parse_key(input: &str) -> Result<i32, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).map(|v| v as i32),
        None => input.parse::<i32>(),
    };
    parsed.map_err(|_| format!("invalid segment key: {input}"))
}

/// Parse an octal permission mode such as `600` or `0o666`.
pub fn parse_mode(input: &str) -> Result<u32, String> {
    let input = input.trim();
    let digits = input.strip_prefix("0o").unwrap_or(input);
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if mode <= 0o777 => Ok(mode),
        _ => Err(format!("invalid socket mode: {input}")),
    }
}

/// Parse `--json` as a JSON document.
pub fn parse_json(flag: &str, input: &str) -> CliResult<serde_json::Value> {
    serde_json::from_str(input)
        .map_err(|err| CliError::new(USAGE, format!("{flag} is not valid JSON: {err}")))
}

/// Resolve the bytes to send from `--json`, `--data` or `--file`.
pub fn resolve_payload(
    json: Option<&str>,
    data: Option<&str>,
    file: Option<&PathBuf>,
) -> CliResult<Vec<u8>> {
    if let Some(json) = json {
        let result = edgeipc_codec::from_json(parse_json("--json", json)?)
            .map_err(|err| codec_error("--json is not an inference result", err))?;
        return edgeipc_codec::encode(&result)
            .map_err(|err| codec_error("encoding --json failed", err));
    }
    if let Some(data) = data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = file {
        return read_file(path);
    }
    Ok(Vec::new())
}

pub fn read_file(path: &PathBuf) -> CliResult<Vec<u8>> {
    fs::read(path).map_err(|err| io_error(&format!("failed reading {}", path.display()), err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_key_decimal_and_hex() {
        assert_eq!(parse_key("1234"), Ok(1234));
        assert_eq!(parse_key("-5"), Ok(-5));
        assert_eq!(parse_key("0x10"), Ok(16));
        assert_eq!(parse_key("0xFFFFFFFF"), Ok(-1));
        assert!(parse_key("key").is_err());
    }

    #[test]
    fn parse_mode_octal() {
        assert_eq!(parse_mode("600"), Ok(0o600));
        assert_eq!(parse_mode("0o666"), Ok(0o666));
        assert!(parse_mode("888").is_err());
        assert!(parse_mode("1777").is_err());
    }

    #[test]
    fn json_payload_is_msgpack() {
        let payload =
            resolve_payload(Some(r#"{"Identity":[1.0]}"#), None, None).expect("payload");
        let decoded = edgeipc_codec::decode(&payload).unwrap();
        assert_eq!(decoded.identity(), Some(&[1.0f32][..]));
    }

    #[test]
    fn data_payload_is_verbatim() {
        assert_eq!(resolve_payload(None, Some("hello"), None).unwrap(), b"hello");
        assert!(resolve_payload(None, None, None).unwrap().is_empty());
    }
}
