use std::{
    os::unix::net::UnixDatagram,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Error};
use serde::ser::{SerializeMap, Serializer as _};
use serde_json::Serializer;
use tracing::{Event, Level, Subscriber};
use tracing_serde::AsSerde;
use tracing_subscriber::{
    EnvFilter,
    filter::LevelFilter,
    fmt::layer,
    layer::{Context as TracingContext, Layer, SubscriberExt},
    registry::{LookupSpan, Registry},
};

use crate::cli::Log;

// Most of the entries are request logs which fit into that
const LOG_ENTRY_SIZE: usize = 512;
const JOURNALD_PATH: &str = "/run/systemd/journal/socket";

// Journald native protocol: a field with a binary-safe value is
// NAME\n<u64 LE length><value>\n
fn put_field(buf: &mut Vec<u8>, name: &str, value: &[u8]) {
    buf.extend_from_slice(name.as_bytes());
    buf.push(b'\n');
    buf.extend_from_slice(&(value.len() as u64).to_le_bytes());
    buf.extend_from_slice(value);
    buf.push(b'\n');
}

const fn priority(level: &Level) -> &'static [u8] {
    match *level {
        Level::ERROR => b"3",
        Level::WARN => b"4",
        Level::INFO => b"5",
        Level::DEBUG => b"6",
        Level::TRACE => b"7",
    }
}

fn journald_packet(level: &Level, target: &str, msg: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(msg.len() + 96);
    put_field(&mut buf, "PRIORITY", priority(level));
    put_field(&mut buf, "SYSLOG_IDENTIFIER", target.as_bytes());
    put_field(&mut buf, "MESSAGE", msg);
    buf
}

// Prepare the JSON-serialized message from a tracing event
fn event_to_json(event: &Event) -> Result<Vec<u8>, Error> {
    let mut msg = Vec::with_capacity(LOG_ENTRY_SIZE);
    let mut ser = Serializer::new(&mut msg);
    let mut ser = ser.serialize_map(None)?;

    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64;
    ser.serialize_entry("timestamp", &timestamp)?;
    ser.serialize_entry("level", &event.metadata().level().as_serde())?;
    ser.serialize_entry("target", event.metadata().target())?;

    // Event fields, including the message
    let mut visitor = tracing_serde::SerdeMapVisitor::new(ser);
    event.record(&mut visitor);
    ser = visitor.take_serializer()?;
    ser.end()?;

    Ok(msg)
}

// Logs the events to Journald in JSON format
struct JournaldLayer {
    socket: UnixDatagram,
}

impl JournaldLayer {
    fn new() -> Result<Self, Error> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(JOURNALD_PATH)?;
        // Ping journald to check the connection
        socket.send(&[])?;
        Ok(Self { socket })
    }
}

impl<S> Layer<S> for JournaldLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event, _ctx: TracingContext<'_, S>) {
        let Ok(msg) = event_to_json(event) else {
            return;
        };

        let meta = event.metadata();
        let buf = journald_packet(meta.level(), meta.target(), &msg);

        // Nowhere to report the failure to
        let _ = self.socket.send(&buf);
    }
}

// RUST_LOG can narrow down the level per module, --log-level is the default
fn filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

// Sets up logging
pub fn setup_logging(cli: &Log) -> Result<(), Error> {
    let journald_layer = if cli.log_journald {
        Some(
            JournaldLayer::new()
                .context("unable to setup JournalD")?
                .with_filter(filter(cli.log_level)),
        )
    } else {
        None
    };

    let subscriber = Registry::default()
        // Journald
        .with(journald_layer)
        // Stdout, plain or JSON
        .with(
            (cli.log_stdout && !cli.log_stdout_json)
                .then(|| layer().with_filter(filter(cli.log_level))),
        )
        .with((cli.log_stdout && cli.log_stdout_json).then(|| {
            layer()
                .json()
                .flatten_event(true)
                .with_filter(filter(cli.log_level))
        }))
        // Null
        .with(cli.log_null.then(|| {
            layer()
                .with_writer(std::io::sink)
                .json()
                .flatten_event(true)
                .with_filter(filter(cli.log_level))
        }));

    tracing::subscriber::set_global_default(subscriber).context("unable to set global subscriber")
}
