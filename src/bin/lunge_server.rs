//! Lunge analysis server.
//!
//! Clients stream per-frame landmarks over TCP and get a verdict back for every frame.
//! Each connection is its own session with its own analyzer.

use anyhow::{Context, Result};
use futures::StreamExt as _;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

use lunge_tracker::config::Config;
use lunge_tracker::lunge::LungeAnalyzer;
use lunge_tracker::protocol::{self, ClientMessage, ServerMessage};

const CONFIG_PATH: &str = "config.toml";

async fn handle_client(stream: TcpStream, config: Config) -> Result<()> {
    let mut analyzer = LungeAnalyzer::new(config)?;
    let framed = protocol::message_stream(stream);
    let (mut sink, mut reader) = framed.split();

    while let Some(result) = reader.next().await {
        let bytes = result?;
        let msg: ClientMessage = bincode::deserialize(&bytes)?;
        let reply = match msg {
            ClientMessage::Landmarks { frame_index, landmarks } => {
                let verdict = analyzer.process_landmarks(frame_index, landmarks.as_deref());
                debug!(frame_index, status = ?verdict.status, errors = verdict.errors.len(), "frame");
                ServerMessage::Verdict(verdict)
            }
            ClientMessage::Reset => {
                analyzer.reset();
                ServerMessage::ResetAck
            }
            ClientMessage::RequestReport => ServerMessage::Report {
                text: analyzer.report(),
            },
        };
        protocol::send_to_sink(&mut sink, &reply).await?;
    }

    info!("session closed, reps: {}", analyzer.rep_counter().reps());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lunge_tracker=info,lunge_server=info")),
        )
        .init();

    let config = Config::load_or_default(CONFIG_PATH)?;
    // 接続前に設定の不備を検出する
    config.validate().context("invalid configuration")?;

    info!("Lunge Server ({})", env!("CARGO_PKG_VERSION"));
    let bind_addr: std::net::SocketAddr = config
        .server
        .listen_addr
        .parse()
        .context("invalid listen_addr")?;
    let listener = TcpListener::bind(bind_addr).await?;
    info!("Listening on {}", bind_addr);

    loop {
        let (tcp_stream, addr) = listener.accept().await?;
        tcp_stream.set_nodelay(true)?;
        info!("Client connected: {}", addr);

        let config = config.clone();
        tokio::spawn(async move {
            match handle_client(tcp_stream, config).await {
                Ok(()) => info!("Client disconnected: {}", addr),
                Err(e) => error!("client {}: {:#}", addr, e),
            }
        });
    }
}
