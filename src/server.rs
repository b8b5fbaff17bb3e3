//! TCP accept loop.
//!
//! Every accepted socket gets its own task running a
//! [`ConnectionHandler`](crate::connection::ConnectionHandler). The loop, and
//! every connection it spawned, stops when the cancellation token fires.

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Accepts connections on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    cancel: CancellationToken,
) {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on {}", addr);
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Accept loop stopped");
                return;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        addr,
                        handler.clone(),
                        Arc::clone(&stats),
                        cancel.child_token(),
                    ));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
        }
    }
}
