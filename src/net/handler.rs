//! Listener process main loop.
//!
//! # Responsibilities
//! - Bind the validation port and report the outcome to the parent
//! - Answer connections one at a time until teardown is requested
//! - Release sockets, confirm teardown, exit
//!
//! Runs only in the forked child. A per-connection failure is logged and the
//! loop moves on to the next connection.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use rand::rngs::StdRng;
use tokio::net::TcpStream;

use crate::lifecycle::control::{AsyncControlChannel, ControlMessage};
use crate::lifecycle::process::ListenerJob;
use crate::lifecycle::shutdown::TeardownHandles;
use crate::net::connection::{respond, ConnectionId, HandshakeOutcome};
use crate::net::listener::{BindError, ValidationListener};
use crate::net::sni::SniResolver;
use crate::observability::metrics;
use crate::tls::TlsError;

/// Why the serve loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeExit {
    /// Parent sent a teardown request.
    TeardownRequested,
    /// Control channel closed: the parent is gone.
    ParentGone,
}

enum AcceptEvent {
    Teardown(bool),
    Accepted(io::Result<(TcpStream, SocketAddr)>),
}

enum ConnectionEvent {
    Teardown(bool),
    Finished(Result<Result<HandshakeOutcome, TlsError>, tokio::time::error::Elapsed>),
}

/// Accept and answer connections until teardown.
pub async fn serve(
    listener: ValidationListener,
    resolver: &SniResolver,
    control: &mut AsyncControlChannel,
    rng: &mut StdRng,
    handshake_timeout: Duration,
) -> ServeExit {
    let mut handles = TeardownHandles::new(listener);

    let requested = loop {
        let Some(listener) = handles.listener() else {
            break false;
        };

        let event = tokio::select! {
            requested = control.teardown_requested() => AcceptEvent::Teardown(requested),
            accepted = listener.accept() => AcceptEvent::Accepted(accepted),
        };

        let (mut stream, peer) = match event {
            AcceptEvent::Teardown(requested) => break requested,
            AcceptEvent::Accepted(Ok(accepted)) => accepted,
            AcceptEvent::Accepted(Err(e)) => {
                tracing::warn!(error = %e, "Accept failed");
                continue;
            }
        };

        let id = ConnectionId::new();
        tracing::debug!(connection_id = %id, peer_addr = %peer, "Answering connection");

        let event = tokio::select! {
            requested = control.teardown_requested() => ConnectionEvent::Teardown(requested),
            finished = tokio::time::timeout(
                handshake_timeout,
                respond(&mut stream, resolver, rng, id),
            ) => ConnectionEvent::Finished(finished),
        };

        match event {
            ConnectionEvent::Teardown(requested) => {
                handles.set_connection(stream);
                break requested;
            }
            ConnectionEvent::Finished(Ok(Ok(outcome))) => {
                metrics::record_handshake(outcome.as_str());
            }
            ConnectionEvent::Finished(Ok(Err(e))) => {
                metrics::record_handshake("failed");
                tracing::warn!(connection_id = %id, peer_addr = %peer, error = %e, "Handshake failed");
            }
            ConnectionEvent::Finished(Err(_)) => {
                metrics::record_handshake("failed");
                tracing::warn!(
                    connection_id = %id,
                    peer_addr = %peer,
                    timeout_secs = handshake_timeout.as_secs(),
                    "Handshake timed out"
                );
            }
        }
    };

    let report = handles.release().await;
    tracing::info!(
        connection_closed = report.connection_closed,
        listener_closed = report.listener_closed,
        "Listener sockets released"
    );

    if let Err(e) = control.send(ControlMessage::TeardownComplete).await {
        tracing::debug!(error = %e, "Could not confirm teardown");
    }

    if requested {
        ServeExit::TeardownRequested
    } else {
        ServeExit::ParentGone
    }
}

/// Entry point of the forked listener process. Never returns.
pub fn run_child(job: ListenerJob) -> ! {
    // The parent owns Ctrl-C handling and stops us over the control channel.
    // SAFETY: SIG_IGN installs no handler code
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_IGN);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();

    let code = match runtime {
        Ok(runtime) => runtime.block_on(listen_and_serve(job)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build listener runtime");
            2
        }
    };

    std::process::exit(code)
}

async fn listen_and_serve(job: ListenerJob) -> i32 {
    let ListenerJob {
        port,
        key,
        registry,
        listener: listener_config,
        handshake_timeout,
        control,
        mut rng,
        parent_pid,
    } = job;
    // The flight ends at ServerHelloDone, so the private key is never used
    // here. Dropping it wipes the child's copy.
    drop(key);

    let mut control = match control.into_async() {
        Ok(control) => control,
        Err(e) => {
            tracing::error!(error = %e, "Failed to attach control channel");
            return 2;
        }
    };

    let addr = listener_config.socket_addr(port);
    let listener = match ValidationListener::bind(addr, listener_config.backlog) {
        Ok(listener) => listener,
        Err(e) => return report_bind_failure(addr, &e, &mut control).await,
    };

    if let Err(e) = control.send(ControlMessage::Ready).await {
        tracing::error!(error = %e, "Could not report readiness");
        return 2;
    }

    tracing::info!(
        address = %addr,
        parent_pid,
        hostnames = ?registry.hostnames(),
        "Serving validation handshakes"
    );

    let resolver = SniResolver::new(registry);
    let exit = serve(listener, &resolver, &mut control, &mut rng, handshake_timeout).await;
    tracing::info!(?exit, "Listener process exiting");
    0
}

/// Tell the parent why the port could not be bound. Returns the exit status.
async fn report_bind_failure(
    addr: SocketAddr,
    error: &BindError,
    control: &mut AsyncControlChannel,
) -> i32 {
    match error.outcome() {
        Some(message) => {
            tracing::warn!(address = %addr, error = %error, "Validation listener not started");
            if let Err(send_err) = control.send(message).await {
                tracing::debug!(error = %send_err, "Could not report bind failure");
            }
        }
        None => tracing::error!(address = %addr, error = %error, "Validation listener crashed"),
    }
    error.exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::{CertificateRecord, Registry, SigningKey};
    use crate::config::ListenerConfig;
    use crate::lifecycle::control::ControlChannel;
    use rand::SeedableRng;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn resolver() -> SniResolver {
        let mut registry = Registry::new();
        registry.insert("abc.acme.invalid", CertificateRecord::new(vec![0xde; 40]));
        SniResolver::new(registry)
    }

    #[tokio::test]
    async fn isolates_bad_connections_and_stops_on_teardown() {
        let listener = ValidationListener::bind("127.0.0.1:0".parse().unwrap(), 1).unwrap();
        let addr = listener.local_addr().unwrap();
        let (mut parent, child) = ControlChannel::pair().unwrap();
        let mut child = child.into_async().unwrap();

        let server = tokio::spawn(async move {
            let resolver = resolver();
            let mut rng = StdRng::seed_from_u64(3);
            serve(listener, &resolver, &mut child, &mut rng, Duration::from_secs(5)).await
        });

        // Garbage: answered with nothing, connection dropped.
        let mut bad = TcpStream::connect(addr).await.unwrap();
        bad.write_all(&[0x17, 0x03, 0x03, 0x00, 0x01, 0x00]).await.unwrap();
        let mut sink = Vec::new();
        bad.read_to_end(&mut sink).await.unwrap();
        assert!(sink.is_empty());

        // Listener still accepts afterwards.
        let second = TcpStream::connect(addr).await;
        assert!(second.is_ok());

        parent.send(ControlMessage::Teardown).unwrap();
        let exit = server.await.unwrap();
        assert_eq!(exit, ServeExit::TeardownRequested);

        let confirmed = tokio::task::spawn_blocking(move || {
            parent.recv_timeout(Duration::from_secs(5)).unwrap()
        })
        .await
        .unwrap();
        assert_eq!(confirmed, Some(ControlMessage::TeardownComplete));
    }

    #[tokio::test]
    async fn stalled_client_times_out() {
        let listener = ValidationListener::bind("127.0.0.1:0".parse().unwrap(), 1).unwrap();
        let addr = listener.local_addr().unwrap();
        let (parent, child) = ControlChannel::pair().unwrap();
        let mut child = child.into_async().unwrap();

        let server = tokio::spawn(async move {
            let resolver = resolver();
            let mut rng = StdRng::seed_from_u64(3);
            serve(listener, &resolver, &mut child, &mut rng, Duration::from_millis(100)).await
        });

        let mut stalled = TcpStream::connect(addr).await.unwrap();
        let mut sink = Vec::new();
        stalled.read_to_end(&mut sink).await.unwrap();
        assert!(sink.is_empty());

        drop(parent);
        assert_eq!(server.await.unwrap(), ServeExit::ParentGone);
    }

    fn job(port: u16, control: ControlChannel) -> ListenerJob {
        let key = rcgen::KeyPair::generate().unwrap();
        ListenerJob {
            port,
            key: SigningKey::from_pem(key.serialize_pem()).unwrap(),
            registry: Registry::new(),
            listener: ListenerConfig {
                bind_address: "127.0.0.1".into(),
                ..ListenerConfig::default()
            },
            handshake_timeout: Duration::from_secs(1),
            control,
            rng: StdRng::seed_from_u64(5),
            parent_pid: std::process::id(),
        }
    }

    #[tokio::test]
    async fn held_port_reports_in_use_and_exits_1() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = held.local_addr().unwrap().port();
        let (mut parent, child) = ControlChannel::pair().unwrap();

        let code = listen_and_serve(job(port, child)).await;

        assert_eq!(code, 1);
        assert_eq!(
            parent.recv_timeout(Duration::from_secs(1)).unwrap(),
            Some(ControlMessage::InUse)
        );
    }

    #[tokio::test]
    async fn permission_denied_reports_cannot_bind_and_exits_1() {
        let (mut parent, child) = ControlChannel::pair().unwrap();
        let mut child = child.into_async().unwrap();
        let denied = BindError::classify(io::Error::from(io::ErrorKind::PermissionDenied));

        let code = report_bind_failure("0.0.0.0:443".parse().unwrap(), &denied, &mut child).await;

        assert_eq!(code, 1);
        assert_eq!(
            parent.recv_timeout(Duration::from_secs(1)).unwrap(),
            Some(ControlMessage::CannotBind)
        );
    }

    #[tokio::test]
    async fn unexpected_bind_error_sends_nothing_and_exits_2() {
        let (mut parent, child) = ControlChannel::pair().unwrap();
        let mut child = child.into_async().unwrap();
        let other = BindError::classify(io::Error::from(io::ErrorKind::AddrNotAvailable));

        let code = report_bind_failure("127.0.0.1:443".parse().unwrap(), &other, &mut child).await;

        assert_eq!(code, 2);
        assert_eq!(parent.recv_timeout(Duration::from_millis(50)).unwrap(), None);
    }

    #[tokio::test]
    async fn free_port_reports_ready_and_stops_on_teardown() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let (mut parent, child) = ControlChannel::pair().unwrap();

        let server = tokio::spawn(listen_and_serve(job(port, child)));

        let parent = tokio::task::spawn_blocking(move || {
            assert_eq!(
                parent.recv_timeout(Duration::from_secs(5)).unwrap(),
                Some(ControlMessage::Ready)
            );
            parent.send(ControlMessage::Teardown).unwrap();
            parent
        })
        .await
        .unwrap();

        assert_eq!(server.await.unwrap(), 0);
        drop(parent);
    }
}
