//! Location-header resolution. Redirect targets arrive in several
//! shapes, from absolute URLs down to bare relative paths, and are tried
//! against an ordered table of anchored patterns from most to least
//! specific.

use once_cell::sync::Lazy;
use regex::Regex;

use super::ProbeTarget;
use super::response::RawResponse;
use crate::settings::{HTTP_PORT, HTTPS_PORT, MAX_PORT, RedirectPolicy, Settings};
use crate::verdict::ProbeFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    SchemeHostPortPath,
    SchemeHostPath,
    SchemeHostPort,
    SchemeHost,
    ProtocolRelative,
    PathOnly,
}

const SCHEME: &str = r"(?P<scheme>[HTPShtps]{1,5})";
const HOST: &str = r"(?P<host>[-.A-Za-z0-9]{1,255})";
const PORT: &str = r"(?P<port>\d{1,6})";
const PATH_CLASS: &str = r"[-_.!~*'();/?:@&=+$,%#A-Za-z0-9]";

static MATCHERS: Lazy<Vec<(Shape, Regex)>> = Lazy::new(|| {
    let path = format!(r"(?P<path>/{PATH_CLASS}*)");
    let bare_path = format!(r"(?P<path>{PATH_CLASS}+)");
    let table = [
        (
            Shape::SchemeHostPortPath,
            format!(r"^{SCHEME}://{HOST}:{PORT}{path}"),
        ),
        (Shape::SchemeHostPath, format!(r"^{SCHEME}://{HOST}{path}")),
        (Shape::SchemeHostPort, format!(r"^{SCHEME}://{HOST}:{PORT}")),
        (Shape::SchemeHost, format!(r"^{SCHEME}://{HOST}")),
        (Shape::ProtocolRelative, format!(r"^//{HOST}{path}")),
        (Shape::PathOnly, format!(r"^{bare_path}")),
    ];
    table
        .into_iter()
        .map(|(shape, pattern)| (shape, Regex::new(&pattern).expect("static pattern")))
        .collect()
});

/// Resolves the Location header of a 3xx response into the next hop's
/// target, enforcing the depth limit, the loop check, and any sticky
/// pinning. `next_depth` is the 1-based number of the hop about to run.
pub fn resolve_redirect(
    settings: &Settings,
    current: &ProbeTarget,
    response: &RawResponse,
    next_depth: usize,
) -> Result<ProbeTarget, ProbeFailure> {
    let location = location_value(&response.header_block).ok_or_else(|| {
        ProbeFailure::unknown(format!(
            "Could not find redirect location - {}",
            response.status_line
        ))
    })?;
    if location.is_empty() {
        return Err(ProbeFailure::unknown("Empty redirect location"));
    }

    let (shape, caps) = MATCHERS
        .iter()
        .find_map(|(shape, regex)| regex.captures(&location).map(|caps| (*shape, caps)))
        .ok_or_else(|| {
            ProbeFailure::unknown(format!("Could not parse redirect location - {location}"))
        })?;

    let current_scheme = if current.use_ssl { "https" } else { "http" };
    let scheme = match shape {
        Shape::ProtocolRelative | Shape::PathOnly => current_scheme.to_string(),
        _ => caps["scheme"].to_string(),
    };
    // Only the exact lowercase spelling selects TLS; odd capitalizations
    // fall back to plain HTTP like any other scheme token.
    let use_ssl = scheme == "https";
    let default_port = if use_ssl { HTTPS_PORT } else { HTTP_PORT };

    let host = match shape {
        Shape::PathOnly => current
            .host_name
            .clone()
            .unwrap_or_else(|| current.server_address.clone()),
        _ => caps["host"].to_string(),
    };

    let port: u32 = match shape {
        Shape::SchemeHostPortPath | Shape::SchemeHostPort => {
            caps["port"].parse().unwrap_or(u32::from(default_port))
        }
        Shape::PathOnly => u32::from(current.port),
        _ => u32::from(default_port),
    };

    let path = match shape {
        Shape::SchemeHostPort | Shape::SchemeHost => "/".to_string(),
        Shape::PathOnly => {
            let relative = &caps["path"];
            if relative.starts_with('/') {
                relative.to_string()
            } else {
                // Resolve against the directory of the current path.
                let base = match current.path.rfind('/') {
                    Some(i) => &current.path[..i],
                    None => current.path.as_str(),
                };
                format!("{base}/{relative}")
            }
        }
        _ => caps["path"].to_string(),
    };

    let url = format!("{scheme}://{host}:{port}{path}");
    if next_depth > settings.max_depth {
        return Err(ProbeFailure::warning(format!(
            "maximum redirection depth {} exceeded - {url}",
            settings.max_depth
        )));
    }
    if u32::from(current.port) == port
        && current.server_address == host
        && current.host_name.as_deref() == Some(host.as_str())
        && current.path == path
    {
        return Err(ProbeFailure::warning(format!(
            "redirection creates an infinite loop - {url}"
        )));
    }

    let (sticky_host, sticky_port) = match settings.redirect_policy {
        RedirectPolicy::Follow {
            sticky_host,
            sticky_port,
        } => (sticky_host, sticky_port),
        RedirectPolicy::Fixed(_) => (false, false),
    };

    let server_address = if sticky_host {
        current.server_address.clone()
    } else {
        host.clone()
    };
    let port = if sticky_port {
        u32::from(current.port)
    } else {
        port
    };
    if port > MAX_PORT {
        return Err(ProbeFailure::unknown(format!(
            "Redirection to port above {MAX_PORT} - {url}"
        )));
    }

    Ok(ProbeTarget {
        use_ssl,
        server_address,
        host_name: Some(host),
        port: port as u16,
        path,
    })
}

/// First Location header value, with folded continuation lines appended
/// without separators.
fn location_value(block: &str) -> Option<String> {
    let lines: Vec<&str> = block
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    for (i, line) in lines.iter().enumerate() {
        if line.len() < 9 || !line[..9].eq_ignore_ascii_case("location:") {
            continue;
        }
        let mut value = line[9..].trim_matches([' ', '\t']).to_string();
        for continuation in &lines[i + 1..] {
            if !continuation.starts_with([' ', '\t']) {
                break;
            }
            value.push_str(continuation.trim_matches([' ', '\t']));
        }
        return Some(value);
    }
    None
}
