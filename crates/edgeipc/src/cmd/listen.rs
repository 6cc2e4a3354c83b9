use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use edgeipc_channel::{serve_connections, ChannelConfig, Consumer, ServeOptions, SocketServer};
use tracing::debug;

use crate::cmd::{parse_duration, ListenArgs};
use crate::exit::{channel_error, CliError, CliResult, SUCCESS};
use crate::output::{print_received, OutputFormat};

/// How often the accept loop wakes up to notice Ctrl-C.
const ACCEPT_POLL: Duration = Duration::from_millis(250);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mut config = ChannelConfig::with_timeout(timeout);
    config.socket_mode = args.socket_mode;
    let server = SocketServer::create(&args.path, config.clone())
        .map_err(|err| channel_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let consumer = Consumer::new(config);
    let options = ServeOptions {
        accept_timeout: ACCEPT_POLL,
        receive_timeout: timeout,
    };
    let mut printed = 0usize;

    serve_connections(&server, &options, &running, |conn| {
        let received = consumer.receive_from(conn)?;
        let trailer = match args.trailer_size {
            Some(len) if len > 0 => Some(conn.receive_trailer(len, timeout)?),
            _ => None,
        };
        let result = if args.decode {
            Some(edgeipc_codec::to_json(&received.decode()?))
        } else {
            None
        };

        // Plain senders hang up without waiting for the acknowledgement.
        if let Err(err) = Consumer::acknowledge(conn) {
            debug!(error = %err, "acknowledgement not delivered");
        }

        print_received(&received, trailer.as_deref(), result.as_ref(), format);
        printed = printed.saturating_add(1);
        if args.count.is_some_and(|count| printed >= count) {
            running.store(false, Ordering::SeqCst);
        }
        Ok(())
    })
    .map_err(|err| channel_error("accept failed", err))?;

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
