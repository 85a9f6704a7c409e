use std::{future::Future, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use tokio::{
    net::{TcpListener, TcpStream, ToSocketAddrs},
    select,
    sync::watch,
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, info, warn};

use crate::{connection::handle_connection, inventory::MovieBooker};

/// Accepts connections and serves each one on its own task.
///
/// The listener stays bound for the life of the `Server`, so `run` can be
/// called again after [`Server::stop`] and resumes on the same port.
///
/// Stops are counted. A run remembers the count from the moment `run` (or
/// [`Server::spawn`]) is called and returns once it moves on, so a stop that
/// lands before the run's first poll still ends it.
pub struct Server {
    listener: TcpListener,
    booker: Arc<dyn MovieBooker>,
    stops: Arc<watch::Sender<u64>>,
}

/// Cloneable handle that stops a running [`Server`] from another task.
#[derive(Clone)]
pub struct StopHandle {
    stops: Arc<watch::Sender<u64>>,
}

impl StopHandle {
    /// Ends every run started before this call. Has no effect on a later
    /// `run`.
    pub fn stop(&self) {
        self.stops.send_modify(|count| *count += 1);
    }
}

impl Server {
    pub fn new(listener: TcpListener, booker: Arc<dyn MovieBooker>) -> Self {
        Self {
            listener,
            booker,
            stops: Arc::new(watch::channel(0).0),
        }
    }

    pub async fn bind<A: ToSocketAddrs>(addr: A, booker: Arc<dyn MovieBooker>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context("failed to bind listener")?;
        Ok(Self::new(listener, booker))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Actual bound port, useful after binding port 0.
    pub fn port(&self) -> std::io::Result<u16> {
        Ok(self.local_addr()?.port())
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stops: Arc::clone(&self.stops),
        }
    }

    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    /// Serves until [`Server::stop`] is called.
    pub fn run(&self) -> impl Future<Output = Result<()>> {
        self.run_until(std::future::pending())
    }

    /// Serves until `shutdown` resolves or [`Server::stop`] is called. Open
    /// connections are closed before returning.
    pub fn run_until<F>(&self, shutdown: F) -> impl Future<Output = Result<()>>
    where
        F: Future<Output = ()> + Send,
    {
        let started_after = *self.stops.borrow();
        self.serve(started_after, shutdown)
    }

    pub fn run_until_ctrl_c(&self) -> impl Future<Output = Result<()>> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
    }

    /// Runs the server on a new task. A [`Server::stop`] issued any time after
    /// this returns ends that run.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<Result<()>> {
        let server = Arc::clone(self);
        let started_after = *server.stops.borrow();
        tokio::spawn(async move {
            server
                .serve(started_after, std::future::pending())
                .await
        })
    }

    async fn serve<F>(&self, started_after: u64, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let mut stops = self.stops.subscribe();
        let stopped = stops.wait_for(|count| *count != started_after);
        tokio::pin!(stopped);
        tokio::pin!(shutdown);

        let mut connections = JoinSet::new();
        loop {
            select! {
                _ = &mut stopped => break,
                _ = &mut shutdown => break,
                accept_result = self.listener.accept() => {
                    self.handle_accept_result(accept_result, &mut connections);
                }
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(err) = finished {
                        warn!(error = ?err, "connection task failed");
                    }
                }
            }
        }

        info!(open = connections.len(), "server shutting down");
        connections.shutdown().await;
        Ok(())
    }

    fn handle_accept_result(
        &self,
        result: std::io::Result<(TcpStream, SocketAddr)>,
        connections: &mut JoinSet<()>,
    ) {
        match result {
            Ok((stream, peer)) => spawn_connection(stream, peer, &self.booker, connections),
            Err(err) => warn!(error = ?err, "failed to accept connection"),
        }
    }
}

fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    booker: &Arc<dyn MovieBooker>,
    connections: &mut JoinSet<()>,
) {
    let booker = Arc::clone(booker);
    debug!(peer = %peer, "client connected");
    connections.spawn(async move {
        match handle_connection(stream, booker).await {
            Ok(()) => info!(peer = %peer, "client disconnected"),
            Err(err) => warn!(peer = %peer, error = ?err, "client connection closed with error"),
        }
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{io::BufReader, time::timeout};

    use super::*;
    use crate::{
        inventory::Inventory,
        protocol::{GREETING, read_line},
    };

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let server = Server::bind("127.0.0.1:0", Arc::new(Inventory::new()))
            .await
            .expect("bind");
        let port = server.port().expect("port");
        assert_ne!(port, 0);
    }

    #[tokio::test]
    async fn stop_closes_open_connections() {
        let server = Arc::new(
            Server::bind("127.0.0.1:0", Arc::new(Inventory::new()))
                .await
                .expect("bind"),
        );
        let addr = server.local_addr().expect("addr");
        let running = server.spawn();

        let stream = TcpStream::connect(addr).await.expect("connect");
        let mut reader = BufReader::new(stream);
        let greeting = timeout(Duration::from_secs(1), read_line(&mut reader))
            .await
            .expect("greeting in time")
            .expect("read greeting");
        assert_eq!(greeting.as_deref(), Some(GREETING));

        server.stop();
        timeout(Duration::from_secs(1), running)
            .await
            .expect("run returns after stop")
            .expect("run task")
            .expect("run result");

        let closed = timeout(Duration::from_secs(1), read_line(&mut reader))
            .await
            .expect("eof in time");
        assert!(matches!(closed, Ok(None) | Err(_)));
    }

    #[tokio::test]
    async fn stop_before_first_poll_ends_the_run() {
        let server = Arc::new(
            Server::bind("127.0.0.1:0", Arc::new(Inventory::new()))
                .await
                .expect("bind"),
        );

        let running = server.spawn();
        server.stop();
        timeout(Duration::from_secs(1), running)
            .await
            .expect("spawned run returns")
            .expect("run task")
            .expect("run result");

        let run = server.run();
        server.stop();
        timeout(Duration::from_secs(1), run)
            .await
            .expect("unpolled run returns")
            .expect("run result");
    }

    #[tokio::test]
    async fn earlier_stop_does_not_end_a_later_run() {
        let server = Server::bind("127.0.0.1:0", Arc::new(Inventory::new()))
            .await
            .expect("bind");
        server.stop();

        let finished = timeout(Duration::from_millis(100), server.run()).await;
        assert!(finished.is_err(), "run returned on a stale stop");
    }
}
