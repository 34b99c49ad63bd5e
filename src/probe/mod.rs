//! The probe engine: one blocking request/response exchange per hop,
//! repeated while a follow policy keeps resolving redirects.

pub mod chunked;
pub mod classify;
pub mod connect;
pub mod freshness;
pub mod headers;
pub mod redirect;
pub mod request;
pub mod response;

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::settings::Settings;
use crate::tls::{self, TlsProvider};
use crate::verdict::{ProbeFailure, Severity, Verdict};
use crate::watchdog::Watchdog;
use self::connect::Connection;

/// Where one hop connects and what it asks for. The first hop comes from
/// the settings; later hops from resolved Location headers.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub use_ssl: bool,
    pub server_address: String,
    pub host_name: Option<String>,
    pub port: u16,
    pub path: String,
}

impl ProbeTarget {
    pub fn initial(settings: &Settings) -> Self {
        Self {
            use_ssl: settings.use_ssl,
            server_address: settings.server_address.clone(),
            host_name: settings.host_name.clone(),
            port: settings.port,
            path: settings.url.clone(),
        }
    }

    pub fn url_display(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        let host = self.host_name.as_deref().unwrap_or(&self.server_address);
        format!("{scheme}://{host}:{}{}", self.port, self.path)
    }
}

/// Phase durations of a single hop, reported as extended perfdata.
#[derive(Debug, Default)]
pub struct HopTimings {
    pub connect: Duration,
    pub tls: Option<Duration>,
    pub headers: Duration,
    pub firstbyte: Option<Duration>,
    pub transfer: Duration,
    pub total: Duration,
}

enum HopOutcome {
    Done(Verdict),
    Redirect(ProbeTarget),
}

/// Runs the probe to completion, iterating over redirect hops. Depth and
/// loop limits are enforced when each next hop is resolved.
pub fn run_probe(
    settings: &Settings,
    tls: &TlsProvider,
    watchdog: &Watchdog,
) -> Result<Verdict, ProbeFailure> {
    let mut target = ProbeTarget::initial(settings);
    let mut depth = 0;
    loop {
        debug!(url = %target.url_display(), depth, "probing");
        match probe_once(settings, tls, watchdog, &target, depth)? {
            HopOutcome::Done(verdict) => return Ok(verdict),
            HopOutcome::Redirect(next) => {
                info!(url = %next.url_display(), "following redirect");
                depth += 1;
                target = next;
            }
        }
    }
}

fn probe_once(
    settings: &Settings,
    tls: &TlsProvider,
    watchdog: &Watchdog,
    target: &ProbeTarget,
    depth: usize,
) -> Result<HopOutcome, ProbeFailure> {
    let started = Instant::now();
    let mut timings = HopTimings::default();

    let connect_start = Instant::now();
    let mut sock = connect::open_tcp(&target.server_address, target.port)?;
    timings.connect = connect_start.elapsed();

    if settings.proxy_protocol {
        sock.write_all(b"PROXY TCP4 0.0.0.0 0.0.0.0 80 80\r\n")
            .map_err(send_error)?;
    }

    // CONNECT with a virtual host and TLS means the address is a proxy
    // to tunnel through; the proxy's reply is read but not validated.
    let tunneled = settings.method == "CONNECT" && target.host_name.is_some() && target.use_ssl;
    if tunneled {
        if let Some(host_name) = &target.host_name {
            let preamble = request::build_connect_preamble(settings, host_name);
            trace!(%preamble, "tunnel preamble");
            sock.write_all(preamble.as_bytes()).map_err(send_error)?;
            let mut scratch = [0u8; 8192];
            let _ = sock.read(&mut scratch);
        }
    }

    let mut conn = if target.use_ssl {
        let tls_start = Instant::now();
        let server_name = target
            .host_name
            .as_deref()
            .unwrap_or(&target.server_address);
        let stream = tls.handshake(sock, server_name).map_err(|e| {
            debug!(error = format!("{e:#}"), "TLS handshake failed");
            ProbeFailure::critical("Cannot make SSL connection")
        })?;
        timings.tls = Some(tls_start.elapsed());
        Connection::Tls(Box::new(stream))
    } else {
        Connection::Plain(sock)
    };

    let mut result = Severity::Ok;
    let mut message = String::new();
    if let Some(expiry) = settings.check_cert {
        let cert = conn
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| ProbeFailure::critical("Cannot retrieve server certificate"))?;
        let (severity, cert_message) =
            tls::check_certificate(cert, expiry.warn_days, expiry.crit_days);
        if !settings.continue_after_check_cert {
            watchdog.disarm();
            return Ok(HopOutcome::Done(Verdict {
                severity,
                text: cert_message,
            }));
        }
        result = severity;
        message = format!("{cert_message} ");
    }

    let request = request::build_request(settings, target, tunneled);
    trace!(%request, "sending request");
    let send_start = Instant::now();
    conn.write_all(request.as_bytes())
        .and_then(|_| conn.flush())
        .map_err(send_error)?;
    timings.headers = send_start.elapsed();

    let transfer_start = Instant::now();
    let mut raw = response::read_response(&mut conn, settings.no_body)?;
    timings.transfer = transfer_start.elapsed();
    timings.firstbyte = raw.time_firstbyte;
    drop(conn);
    timings.total = started.elapsed();

    let raw_body = std::mem::take(&mut raw.body);
    let body = if !settings.no_body && headers::is_chunked(&raw.header_block) && !raw_body.is_empty()
    {
        chunked::decode_chunked(&raw_body)?
    } else {
        raw_body
    };

    match classify::evaluate_status(settings, target, &raw.status_line, result, message)? {
        classify::StatusOutcome::Redirect => {
            let next = redirect::resolve_redirect(settings, target, &raw, depth + 1)?;
            Ok(HopOutcome::Redirect(next))
        }
        classify::StatusOutcome::Continue { result, message } => {
            watchdog.disarm();
            Ok(HopOutcome::Done(classify::finish(
                settings,
                target,
                &raw.header_block,
                &body,
                &timings,
                result,
                message,
            )))
        }
    }
}

fn send_error(e: std::io::Error) -> ProbeFailure {
    debug!(error = %e, "send failed");
    ProbeFailure::critical("Error on send")
}
