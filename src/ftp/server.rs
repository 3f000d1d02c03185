//! FTP control server.
//!
//! Accept loop spawning one task per control connection. Each task owns its
//! session and its data channel; nothing is shared between clients beyond
//! the store and settings handles.

use log::{info, warn};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::ftp::FtpContext;
use crate::ftp::commands::parse_command;
use crate::ftp::handlers::{handle_command, reply};
use crate::ftp::session::Session;

pub struct FtpServer {
    listener: TcpListener,
    ctx: FtpContext,
}

impl FtpServer {
    pub async fn bind(ctx: FtpContext) -> std::io::Result<Self> {
        let listener = TcpListener::bind(ctx.config.ftp_socket()).await?;
        info!("FTP server listening on {}", listener.local_addr()?);
        Ok(Self { listener, ctx })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(ctx, stream, peer).await {
                    warn!("FTP connection {} ended with error: {}", peer, e);
                }
            });
        }
    }
}

async fn handle_connection(
    ctx: FtpContext,
    stream: TcpStream,
    peer: SocketAddr,
) -> std::io::Result<()> {
    info!("FTP connection from {}", peer);
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let welcome = ctx.settings.read().await.welcome_message.clone();
    reply(&mut write_half, &format!("220 {}", welcome)).await?;

    let mut session = Session::new(peer);
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        if line.len() > ctx.config.max_command_length {
            reply(&mut write_half, "500 Command line too long").await?;
            continue;
        }

        let command = parse_command(&line);
        if !handle_command(&ctx, &mut session, &mut write_half, command).await? {
            break;
        }
    }

    info!("FTP connection {} closed", peer);
    Ok(())
}
