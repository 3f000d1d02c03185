//! Data channel transfers.
//!
//! Opens the stream negotiated by PASV or PORT and moves file bytes over it.
//! Uploads stream through a counting writer into a temp file so the quota
//! gate holds even when the client never announced a size; the temp file is
//! removed on any failure and renamed into place only on success.

use log::{info, warn};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::error::{QuotaError, TransferError};
use crate::ftp::session::DataChannel;
use crate::storage::EntryInfo;
use crate::storage::operations::temp_path;

const COPY_BUF: usize = 64 * 1024;

/// Limits a single upload: the per-write ceiling always applies, the quota
/// headroom only for accounts that have one.
#[derive(Debug, Clone, Copy)]
pub struct UploadBudget {
    pub ceiling: u64,
    pub quota_room: Option<u64>,
}

/// Turns the negotiated channel into a connected stream. PASV accepts the
/// client's incoming connection, PORT dials out to the address the client
/// registered; either way the wait is bounded.
pub async fn open_data_stream(
    channel: DataChannel,
    wait: Duration,
) -> Result<TcpStream, TransferError> {
    match channel {
        DataChannel::None => Err(TransferError::DataChannelNotInitialized),
        DataChannel::Pasv(listener) => match timeout(wait, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                info!("Accepted data connection from {}", peer);
                Ok(stream)
            }
            Ok(Err(e)) => Err(TransferError::TransferFailed(e)),
            Err(_) => Err(TransferError::ConnectionTimeout),
        },
        DataChannel::Port(addr) => match timeout(wait, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                info!("Opened data connection to {}", addr);
                Ok(stream)
            }
            Ok(Err(e)) => Err(TransferError::TransferFailed(e)),
            Err(_) => Err(TransferError::ConnectionTimeout),
        },
    }
}

/// Binds a listener on the first free port in the PASV range.
pub async fn bind_pasv_listener(
    bind_address: &str,
    ports: std::ops::Range<u16>,
) -> Result<(TcpListener, SocketAddr), TransferError> {
    for port in ports {
        if let Ok(listener) = TcpListener::bind((bind_address, port)).await {
            let addr = listener.local_addr()?;
            return Ok((listener, addr));
        }
    }
    Err(TransferError::NoAvailablePort)
}

/// Streams a file to the client and closes the data connection.
pub async fn send_file(mut stream: TcpStream, path: &Path) -> Result<u64, TransferError> {
    let mut file = File::open(path).await?;
    let sent = tokio::io::copy(&mut file, &mut stream).await?;
    stream.shutdown().await?;
    info!("Sent {} ({} bytes)", path.display(), sent);
    Ok(sent)
}

/// Sends a directory listing, one entry per line, directories marked with a
/// trailing slash.
pub async fn send_listing(
    mut stream: TcpStream,
    entries: &[EntryInfo],
) -> Result<(), TransferError> {
    let mut body = String::new();
    for entry in entries {
        body.push_str(&entry.name);
        if entry.is_dir {
            body.push('/');
        }
        body.push_str("\r\n");
    }
    stream.write_all(body.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Receives an upload into `path`, counting bytes against the budget as they
/// arrive. The stream is cut off as soon as a limit is crossed; partial data
/// never reaches the final path.
pub async fn receive_file(
    mut stream: TcpStream,
    path: &Path,
    budget: Option<UploadBudget>,
) -> Result<u64, TransferError> {
    let temp = temp_path(path);
    let mut file = File::create(&temp).await?;
    let mut buf = vec![0u8; COPY_BUF];
    let mut received: u64 = 0;

    let outcome = loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err(TransferError::TransferFailed(e)),
        };
        received += n as u64;

        if let Some(budget) = budget {
            if received > budget.ceiling {
                break Err(QuotaError::FileTooLarge {
                    attempted: received,
                    limit: budget.ceiling,
                }
                .into());
            }
            if let Some(room) = budget.quota_room {
                if received > room {
                    break Err(QuotaError::QuotaExceeded {
                        attempted: received,
                        limit: room,
                    }
                    .into());
                }
            }
        }

        if let Err(e) = file.write_all(&buf[..n]).await {
            break Err(TransferError::TransferFailed(e));
        }
    };

    if let Err(e) = outcome {
        drop(file);
        if let Err(rm) = tokio::fs::remove_file(&temp).await {
            warn!("Failed to remove partial upload {}: {}", temp.display(), rm);
        }
        return Err(e);
    }

    file.flush().await?;
    drop(file);
    tokio::fs::rename(&temp, path).await?;
    info!("Received {} ({} bytes)", path.display(), received);
    Ok(received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn upload_lands_atomically() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("up.bin");
        let (mut client, server) = pair().await;

        let payload = vec![7u8; 10_000];
        let send = {
            let payload = payload.clone();
            tokio::spawn(async move {
                client.write_all(&payload).await.unwrap();
                client.shutdown().await.unwrap();
            })
        };

        let received = receive_file(server, &dest, None).await.unwrap();
        send.await.unwrap();

        assert_eq!(received, 10_000);
        assert_eq!(std::fs::read(&dest).unwrap(), payload);
        assert!(!temp_path(&dest).exists());
    }

    #[tokio::test]
    async fn upload_over_ceiling_is_cut_off_and_cleaned_up() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("big.bin");
        let (mut client, server) = pair().await;

        tokio::spawn(async move {
            let chunk = vec![0u8; 4096];
            // Keep writing until the server hangs up on us.
            while client.write_all(&chunk).await.is_ok() {}
        });

        let budget = UploadBudget {
            ceiling: 8192,
            quota_room: None,
        };
        let result = receive_file(server, &dest, Some(budget)).await;

        assert!(matches!(
            result,
            Err(TransferError::LimitExceeded(QuotaError::FileTooLarge { .. }))
        ));
        assert!(!dest.exists());
        assert!(!temp_path(&dest).exists());
    }

    #[tokio::test]
    async fn upload_over_quota_room_reports_quota() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("q.bin");
        let (mut client, server) = pair().await;

        tokio::spawn(async move {
            let _ = client.write_all(&vec![1u8; 5000]).await;
            let _ = client.shutdown().await;
        });

        let budget = UploadBudget {
            ceiling: 1 << 20,
            quota_room: Some(1000),
        };
        let result = receive_file(server, &dest, Some(budget)).await;

        assert!(matches!(
            result,
            Err(TransferError::LimitExceeded(QuotaError::QuotaExceeded { .. }))
        ));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn download_round_trips() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("down.txt");
        std::fs::write(&src, b"hello over the wire").unwrap();
        let (mut client, server) = pair().await;

        let reader = tokio::spawn(async move {
            let mut out = Vec::new();
            client.read_to_end(&mut out).await.unwrap();
            out
        });

        let sent = send_file(server, &src).await.unwrap();
        assert_eq!(sent, 19);
        assert_eq!(reader.await.unwrap(), b"hello over the wire");
    }

    #[tokio::test]
    async fn pasv_binding_scans_the_range() {
        let (listener, addr) = bind_pasv_listener("127.0.0.1", 40000..41000)
            .await
            .unwrap();
        assert!((40000..41000).contains(&addr.port()));
        drop(listener);
    }
}
