mod console;

extern crate pretty_env_logger;
#[macro_use]
extern crate log;

use std::time::Duration;

use eyre::{eyre, WrapErr};
use haier_home_device::command::{CommandRequest, CommandTranslator, RequestValue};
use haier_home_device::protocol::codec;
use haier_home_device::protocol::frame::{bytes_from_hex, CanonicalPayload, WireFrame};
use haier_home_device::session::{Session, SessionConfig};
use structopt::StructOpt;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use crate::console::ConsoleStore;

#[derive(StructOpt, Debug)]
struct ConnectionOpt {
    /// Address of the serial gateway
    #[structopt(short, long, default_value = "127.0.0.1")]
    host: String,

    #[structopt(short, long, default_value = "23")]
    port: u16,

    /// Milliseconds between state queries
    #[structopt(long, default_value = "2000")]
    poll_ms: u64,

    /// Seconds to wait before reconnecting
    #[structopt(long, default_value = "60")]
    reconnect_secs: u64,

    /// Reject commands with unrecognized values instead of sending them
    #[structopt(long)]
    strict: bool,
}

impl From<ConnectionOpt> for SessionConfig {
    fn from(opt: ConnectionOpt) -> Self {
        SessionConfig {
            host: opt.host,
            port: opt.port,
            poll_interval: Duration::from_millis(opt.poll_ms),
            reconnect_delay: Duration::from_secs(opt.reconnect_secs),
            strict_values: opt.strict,
            ..SessionConfig::default()
        }
    }
}

#[derive(StructOpt, Debug)]
enum Opt {
    /// Mirror the unit's state to stdout and send `field=value` lines from stdin
    Bridge(ConnectionOpt),
    /// Decode a received chunk
    Decode {
        /// Chunk as hex
        chunk: String,
    },
    /// Print the wire frame a command would be sent as
    Frame {
        field: String,

        value: RequestValue,

        /// Last received payload as hex, needed for everything but power, health and raw
        #[structopt(short, long)]
        template: Option<String>,

        #[structopt(long)]
        strict: bool,
    },
}

fn hex_arg(text: &str) -> Vec<u8> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    bytes_from_hex(&digits)
}

fn parse_command(line: &str) -> Option<CommandRequest> {
    let (field, value) = line.split_once('=')?;
    let value = value.trim().parse().ok()?;
    Some(CommandRequest::new(field.trim(), value))
}

async fn bridge(opt: ConnectionOpt) -> eyre::Result<()> {
    let config = SessionConfig::from(opt);
    println!("Bridging {}:{}", config.host, config.port);
    let session = Session::start(config, ConsoleStore::default());

    let mut lines = LinesStream::new(BufReader::new(stdin()).lines());
    loop {
        tokio::select! {
            line = lines.next() => match line {
                Some(line) => {
                    let line = line.wrap_err("Could not read from stdin")?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_command(&line) {
                        Some(request) => session.command(request)?,
                        None => warn!("expected field=value, got {:?}", line),
                    }
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.wrap_err("Could not listen for ctrl-c")?;
                break;
            }
        }
    }

    println!("Stopping");
    session.stop().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    pretty_env_logger::init();
    color_eyre::install()?;

    let opts = Opt::from_args();

    debug!("opts: {:?}", opts);

    match opts {
        Opt::Bridge(connection) => bridge(connection).await?,
        Opt::Decode { chunk } => {
            let payload = CanonicalPayload::normalize(&hex_arg(&chunk))
                .wrap_err("Could not normalize chunk")?;
            for (field, value) in codec::decode(&payload).values() {
                println!("{} = {}", field, value);
            }
        }
        Opt::Frame {
            field,
            value,
            template,
            strict,
        } => {
            let template = template
                .map(|t| CanonicalPayload::try_from(hex_arg(&t).as_slice()))
                .transpose()
                .wrap_err("Template must be a 34 byte payload")?;
            let command = CommandTranslator::new(strict)
                .translate(&CommandRequest::new(field, value))?;
            let payload = command.payload(template.as_ref())?;
            if payload.is_empty() {
                return Err(eyre!("Nothing to send"));
            }
            println!("{}", WireFrame::encode(payload));
        }
    }

    Ok(())
}
