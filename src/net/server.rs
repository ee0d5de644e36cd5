//! Connection server.
//!
//! The server owns the listening socket and nothing else. Each accepted
//! connection is handed to its own task, which:
//!
//! 1. reads the request head with [`read_request`],
//! 2. answers a malformed head with a 400 carrying the parse error,
//! 3. otherwise binds a [`ResponseWriter`] to the connection and calls the
//!    [`Handler`] once,
//! 4. closes the connection.
//!
//! Connections are never reused. Tasks are not tracked: closing the server
//! stops accepting, while connections already being served run to
//! completion.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_std::channel::{self, Receiver, Sender};
use async_std::net::{TcpListener, TcpStream};
use async_std::task::{self, JoinHandle};
use futures::future::{self, Either};
use tracing::{debug, error, info, warn};

use crate::config::{ParserConfig, ServerConfig};
use crate::handler::{Handler, HandlerError};
use crate::http::parser::read_request;
use crate::http::response::ResponseWriter;
use crate::http::status::StatusCode;

pub struct Server {
    local_addr: SocketAddr,
    closed: Arc<AtomicBool>,
    shutdown: Sender<()>,
    accept_loop: JoinHandle<()>,
}

/// State shared by every connection task.
struct Shared<H> {
    handler: H,
    parser: ParserConfig,
}

impl Server {
    /// Binds `0.0.0.0:port` and starts accepting in the background.
    pub async fn serve<H>(port: u16, handler: H) -> io::Result<Server>
    where
        H: Handler + 'static,
    {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        Self::bind(addr, ParserConfig::default(), handler).await
    }

    /// Binds the configured address and applies the configured parser
    /// limits.
    pub async fn serve_with<H>(config: &ServerConfig, handler: H) -> io::Result<Server>
    where
        H: Handler + 'static,
    {
        Self::bind(config.socket_addr(), config.parser.clone(), handler).await
    }

    async fn bind<H>(addr: SocketAddr, parser: ParserConfig, handler: H) -> io::Result<Server>
    where
        H: Handler + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "listening for connections");

        let closed = Arc::new(AtomicBool::new(false));
        let (shutdown, shutdown_rx) = channel::bounded(1);
        let shared = Arc::new(Shared { handler, parser });
        let accept_loop = task::spawn(Self::listen(
            listener,
            Arc::clone(&closed),
            shutdown_rx,
            shared,
        ));

        Ok(Server {
            local_addr,
            closed,
            shutdown,
            accept_loop,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops accepting connections and waits for the accept loop to exit,
    /// which drops the listening socket.
    pub async fn close(self) {
        self.closed.store(true, Ordering::Release);
        self.shutdown.close();
        self.accept_loop.await;
        info!(address = %self.local_addr, "server closed");
    }

    async fn listen<H>(
        listener: TcpListener,
        closed: Arc<AtomicBool>,
        shutdown: Receiver<()>,
        shared: Arc<Shared<H>>,
    ) where
        H: Handler + 'static,
    {
        loop {
            let accepted = {
                let accept = pin!(listener.accept());
                let stop = pin!(shutdown.recv());
                match future::select(accept, stop).await {
                    Either::Left((accepted, _)) => accepted,
                    Either::Right(_) => return,
                }
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(peer = %peer, "accepted connection");
                    task::spawn(Self::handle_client(stream, peer, Arc::clone(&shared)));
                }
                Err(_) if closed.load(Ordering::Acquire) => return,
                Err(e) => warn!(cause = %e, "failed to accept"),
            }
        }
    }

    /// Serves a single request; the stream is dropped, and so closed, on
    /// every return path.
    async fn handle_client<H>(mut stream: TcpStream, peer: SocketAddr, shared: Arc<Shared<H>>)
    where
        H: Handler + 'static,
    {
        let request = match read_request(&mut stream, &shared.parser).await {
            Ok(request) => request,
            Err(e) if e.is_transport() => {
                error!(peer = %peer, cause = %e, "failed to read request");
                return;
            }
            Err(e) => {
                info!(peer = %peer, cause = %e, "rejecting malformed request");
                let mut writer = ResponseWriter::new(&mut stream);
                if let Err(e) = HandlerError::new(StatusCode::BAD_REQUEST, &e).write(&mut writer).await {
                    warn!(peer = %peer, cause = %e, "failed to write 400 response");
                }
                return;
            }
        };

        if !request.is_complete() {
            debug!(peer = %peer, "client closed before end of headers");
        }

        let mut writer = ResponseWriter::new(&mut stream);
        shared.handler.handle(&mut writer, &request).await;
        debug!(peer = %peer, "connection done");
    }
}
