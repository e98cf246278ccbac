use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use replikv_core::{PeerTransport, Router};

use crate::handler::handle_connection;

/// Accepts connections until `shutdown` resolves. Each connection runs on
/// its own task; connections already accepted are left to finish.
pub async fn run_until<T, F>(listener: TcpListener, router: Arc<Router<T>>, shutdown: F)
where
    T: PeerTransport,
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(node = router.id(), "server shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((socket, _)) => {
                    let router = Arc::clone(&router);
                    tokio::spawn(async move {
                        handle_connection(socket, router).await;
                    });
                }
                Err(e) => {
                    warn!(node = router.id(), error = %e, "failed to accept connection");
                }
            },
        }
    }
}
