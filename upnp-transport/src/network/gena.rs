//! GENA event reception.
//!
//! Spawns a thread with its own tokio runtime hosting the NOTIFY callback server
//! and the subscription renewal timer, while exposing a sync API to services.
//! Each subscription gets its own callback path `/event/{token}`, registered
//! before the SUBSCRIBE request so the initial event is never lost.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, UdpSocket};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use warp::http::{Method, StatusCode};
use warp::Filter;
use xmltree::{Element, XMLNode};

use super::config::NetworkConfig;
use super::soap::{renewal_interval, SoapClient};
use crate::error::{Result, TransportError};
use crate::handle::ServiceListener;
use crate::value::WireValue;

struct Route {
    listener: Arc<dyn ServiceListener>,
    /// Declared data type per state variable, used to type incoming values
    variable_types: HashMap<String, String>,
    event_url: String,
    sid: Option<String>,
}

struct Registry {
    soap: SoapClient,
    subscription_timeout_secs: u32,
    routes: Mutex<HashMap<u64, Route>>,
}

impl Registry {
    /// Deliver a NOTIFY body; false when the token is unknown or the body malformed
    fn deliver(&self, token: u64, body: &[u8]) -> bool {
        let Some((listener, types)) = self
            .routes
            .lock()
            .get(&token)
            .map(|r| (Arc::clone(&r.listener), r.variable_types.clone()))
        else {
            tracing::debug!("NOTIFY for unknown subscription token {}", token);
            return false;
        };

        let Some(changes) = parse_property_set(body) else {
            tracing::warn!("Malformed NOTIFY body for subscription token {}", token);
            return false;
        };

        for (name, text) in changes {
            let value = types
                .get(&name)
                .and_then(|declared| WireValue::parse(declared, &text).ok())
                .unwrap_or(WireValue::String(text));
            listener.state_variable_changed(&name, &value);
        }
        true
    }

    /// Renew every subscription; those the device refuses are reported dead
    fn renew_all(&self) {
        let active: Vec<(u64, String, String)> = self
            .routes
            .lock()
            .iter()
            .filter_map(|(token, r)| Some((*token, r.event_url.clone(), r.sid.clone()?)))
            .collect();

        for (token, event_url, sid) in active {
            match self.soap.renew(&event_url, &sid, self.subscription_timeout_secs) {
                Ok(granted) => tracing::debug!("Renewed {} for {}s", sid, granted),
                Err(e) => {
                    tracing::warn!("Renewal of {} failed: {}", sid, e);
                    if let Some(route) = self.routes.lock().remove(&token) {
                        route.listener.service_instance_died();
                    }
                }
            }
        }
    }
}

/// NOTIFY callback server shared by all network services of one transport
pub(crate) struct EventServer {
    registry: Arc<Registry>,
    next_token: AtomicU64,
    port: u16,
    shutdown: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

impl EventServer {
    /// Start the callback server on the first free port of the configured range
    pub fn start(config: &NetworkConfig, soap: SoapClient) -> Result<Self> {
        let port = find_available_port(config.callback_ports.clone()).ok_or_else(|| {
            TransportError::Subscription(format!(
                "no free callback port in {:?}",
                config.callback_ports
            ))
        })?;

        let registry = Arc::new(Registry {
            soap,
            subscription_timeout_secs: config.subscription_timeout_secs,
            routes: Mutex::new(HashMap::new()),
        });
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let renew_every = renewal_interval(config.subscription_timeout_secs);

        let worker_registry = Arc::clone(&registry);
        thread::Builder::new()
            .name("upnp-gena".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        tracing::error!("Failed to create tokio runtime for event server: {}", e);
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                rt.block_on(serve(worker_registry, port, renew_every, ready_tx, shutdown_rx));
            })
            .map_err(|e| TransportError::Subscription(format!("failed to spawn event server: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::info!("Event callback server listening on port {}", port);
                Ok(Self {
                    registry,
                    next_token: AtomicU64::new(1),
                    port,
                    shutdown: Mutex::new(Some(shutdown_tx)),
                })
            }
            Ok(Err(e)) => Err(TransportError::Subscription(e)),
            Err(_) => Err(TransportError::Subscription("event server exited during startup".to_string())),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Register `listener` and subscribe to `event_url`; returns the route token
    pub fn subscribe(
        &self,
        event_url: &str,
        local_ip: IpAddr,
        listener: Arc<dyn ServiceListener>,
        variable_types: HashMap<String, String>,
    ) -> Result<u64> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.registry.routes.lock().insert(
            token,
            Route {
                listener,
                variable_types,
                event_url: event_url.to_string(),
                sid: None,
            },
        );

        let callback = format!("http://{}/event/{token}", SocketAddr::new(local_ip, self.port));
        match self
            .registry
            .soap
            .subscribe(event_url, &callback, self.registry.subscription_timeout_secs)
        {
            Ok(subscription) => {
                tracing::debug!("Subscribed to {} as {}", event_url, subscription.sid);
                if let Some(route) = self.registry.routes.lock().get_mut(&token) {
                    route.sid = Some(subscription.sid);
                }
                Ok(token)
            }
            Err(e) => {
                self.registry.routes.lock().remove(&token);
                Err(TransportError::Subscription(format!("SUBSCRIBE to {event_url} failed: {e}")))
            }
        }
    }

    pub fn unsubscribe(&self, token: u64) {
        let Some(route) = self.registry.routes.lock().remove(&token) else {
            return;
        };
        if let Some(sid) = route.sid {
            if let Err(e) = self.registry.soap.unsubscribe(&route.event_url, &sid) {
                tracing::debug!("UNSUBSCRIBE {} failed: {}", sid, e);
            }
        }
    }
}

impl Drop for EventServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.lock().take() {
            let _ = shutdown.send(());
        }
    }
}

async fn serve(
    registry: Arc<Registry>,
    port: u16,
    renew_every: Duration,
    ready_tx: mpsc::Sender<std::result::Result<(), String>>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    let notify_registry = Arc::clone(&registry);
    let notify_route = warp::method()
        .and(warp::path!("event" / u64))
        .and(warp::header::optional::<String>("nt"))
        .and(warp::header::optional::<String>("nts"))
        .and(warp::body::bytes())
        .and_then(
            move |method: Method, token: u64, nt: Option<String>, nts: Option<String>, body: bytes::Bytes| {
                let registry = Arc::clone(&notify_registry);
                async move {
                    let status = if method.as_str() != "NOTIFY" {
                        StatusCode::METHOD_NOT_ALLOWED
                    } else if !valid_event_headers(nt.as_deref(), nts.as_deref()) {
                        StatusCode::BAD_REQUEST
                    } else {
                        let delivered = tokio::task::spawn_blocking(move || registry.deliver(token, &body))
                            .await
                            .unwrap_or(false);
                        if delivered {
                            StatusCode::OK
                        } else {
                            StatusCode::PRECONDITION_FAILED
                        }
                    };
                    Ok::<_, warp::Rejection>(warp::reply::with_status("", status))
                }
            },
        );

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    let bound = warp::serve(notify_route).try_bind_with_graceful_shutdown(addr, async move {
        let _ = shutdown_rx.await;
    });
    let server = match bound {
        Ok((_, server)) => server,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("failed to bind {addr}: {e}")));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    let renewals = async move {
        let mut ticker = tokio::time::interval(renew_every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let registry = Arc::clone(&registry);
            if tokio::task::spawn_blocking(move || registry.renew_all()).await.is_err() {
                tracing::error!("Subscription renewal task panicked");
            }
        }
    };

    tokio::select! {
        _ = server => tracing::debug!("Event callback server stopped"),
        _ = renewals => {}
    }
}

/// NT and NTS, when both present, must announce a property change
fn valid_event_headers(nt: Option<&str>, nts: Option<&str>) -> bool {
    match (nt, nts) {
        (Some(nt), Some(nts)) => nt == "upnp:event" && nts == "upnp:propchange",
        _ => true,
    }
}

/// `(variable, value)` pairs of an `e:propertyset` body
fn parse_property_set(body: &[u8]) -> Option<Vec<(String, String)>> {
    let root = Element::parse(body).ok()?;
    if !root.name.eq_ignore_ascii_case("propertyset") {
        return None;
    }

    let changes = root
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .filter(|p| p.name.eq_ignore_ascii_case("property"))
        .flat_map(|p| p.children.iter().filter_map(XMLNode::as_element))
        .map(|v| {
            let text = v.get_text().map(|t| t.into_owned()).unwrap_or_default();
            (v.name.clone(), text)
        })
        .collect();
    Some(changes)
}

fn find_available_port(ports: RangeInclusive<u16>) -> Option<u16> {
    ports.into_iter().find(|&port| {
        TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).is_ok()
    })
}

/// Local address used to reach `peer`; no data is sent
pub(crate) fn detect_local_ip(peer: IpAddr) -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(SocketAddr::new(peer, 1900)).ok()?;
    Some(socket.local_addr().ok()?.ip())
}
