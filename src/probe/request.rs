//! Request composition. The wire format is assembled by hand so the probe
//! controls every byte it sends, including deliberately unusual header
//! combinations supplied with -k.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::ProbeTarget;
use crate::settings::{HTTP_PORT, HTTPS_PORT, Settings};

/// Builds the full request for one hop. `tunneled` marks the inner
/// request sent through an established CONNECT tunnel, which the original
/// plugin always issues as a GET.
pub fn build_request(settings: &Settings, target: &ProbeTarget, tunneled: bool) -> String {
    let method = if tunneled { "GET" } else { settings.method.as_str() };
    let version = if target.host_name.is_some() {
        "HTTP/1.1"
    } else {
        "HTTP/1.0"
    };

    let mut buf = format!("{method} {} {version}\r\n", target.path);
    buf.push_str(&format!("User-Agent: {}\r\n", settings.user_agent));
    buf.push_str("Connection: close\r\n");

    // A Host header passed with -k replaces the generated one.
    let forced_host = settings
        .custom_headers
        .iter()
        .find(|h| h.starts_with("Host:"));
    if let Some(host_name) = &target.host_name {
        match forced_host {
            Some(header) => buf.push_str(&format!("{header}\r\n")),
            None => {
                // RFC 2616 §14.23: include the port only when it is not
                // the default for the scheme.
                let default_port = if target.use_ssl { HTTPS_PORT } else { HTTP_PORT };
                if target.port == default_port {
                    buf.push_str(&format!("Host: {host_name}\r\n"));
                } else {
                    buf.push_str(&format!("Host: {host_name}:{}\r\n", target.port));
                }
            }
        }
    }

    if !settings.have_accept {
        buf.push_str("Accept: */*\r\n");
    }

    for header in &settings.custom_headers {
        if Some(header) == forced_host {
            continue;
        }
        buf.push_str(header);
        buf.push_str("\r\n");
    }

    if let Some(auth) = &settings.user_auth {
        buf.push_str(&format!(
            "Authorization: Basic {}\r\n",
            BASE64.encode(auth)
        ));
    }
    if let Some(auth) = &settings.proxy_auth {
        buf.push_str(&format!(
            "Proxy-Authorization: Basic {}\r\n",
            BASE64.encode(auth)
        ));
    }

    match &settings.post_data {
        Some(data) => {
            buf.push_str(&format!("Content-Type: {}\r\n", settings.content_type));
            buf.push_str(&format!("Content-Length: {}\r\n\r\n", data.len()));
            buf.push_str(data);
            buf.push_str("\r\n");
        }
        None => buf.push_str("\r\n"),
    }

    buf
}

/// Builds the CONNECT preamble for tunnel mode: the proxy is asked to
/// open a relay to the virtual host on the HTTPS port.
pub fn build_connect_preamble(settings: &Settings, host_name: &str) -> String {
    let mut buf = format!(
        "CONNECT {host_name}:{HTTPS_PORT} HTTP/1.1\r\nUser-Agent: {}\r\n",
        settings.user_agent
    );
    buf.push_str("Proxy-Connection: keep-alive\r\n");
    if let Some(auth) = &settings.proxy_auth {
        buf.push_str(&format!(
            "Proxy-Authorization: Basic {}\r\n",
            BASE64.encode(auth)
        ));
    }
    buf.push_str(&format!("Host: {host_name}\r\n\r\n"));
    buf
}
