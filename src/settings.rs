use std::path::PathBuf;

use anyhow::{Context, Result, bail, ensure};
use regex::bytes::{Regex, RegexBuilder};

use crate::cli::{Cli, OnRedirect};
use crate::threshold::Thresholds;
use crate::verdict::Severity;

pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;
pub const MAX_PORT: u32 = 65_535;

const DEFAULT_EXPECT: &str = "HTTP/1.";
const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// TLS protocol pinning for the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersionSpec {
    Any,
    Tls12,
    Tls12OrNewer,
    Tls13,
    Tls13OrNewer,
}

/// Certificate-expiry thresholds in days.
#[derive(Debug, Clone, Copy)]
pub struct CertExpiry {
    pub warn_days: i64,
    pub crit_days: i64,
}

/// What to do when the server answers with a 3xx status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RedirectPolicy {
    /// Re-run the probe against the redirect target. The sticky flags pin
    /// the resolving address and/or port across hops.
    Follow { sticky_host: bool, sticky_port: bool },
    /// Report the 3xx with a fixed severity instead of following it.
    Fixed(Severity),
}

/// Validated, immutable probe configuration. Built once from the CLI and
/// passed by reference through every pipeline stage and redirect hop.
#[derive(Debug)]
pub struct Settings {
    pub server_address: String,
    pub host_name: Option<String>,
    pub port: u16,
    pub use_ssl: bool,
    pub ssl_version: TlsVersionSpec,
    pub sni: bool,
    pub verify_host: bool,
    pub check_cert: Option<CertExpiry>,
    pub continue_after_check_cert: bool,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,

    pub method: String,
    pub url: String,
    pub post_data: Option<String>,
    pub content_type: String,
    pub user_agent: String,
    pub custom_headers: Vec<String>,
    pub have_accept: bool,
    pub user_auth: Option<String>,
    pub proxy_auth: Option<String>,
    pub proxy_protocol: bool,

    pub server_expect: String,
    pub expect_is_custom: bool,
    pub header_expect: Option<String>,
    pub string_expect: Option<String>,
    pub body_regex: Option<Regex>,
    pub invert_regex: bool,
    pub min_page_len: i64,
    pub max_page_len: i64,
    pub max_age: Option<i64>,
    pub no_body: bool,

    pub redirect_policy: RedirectPolicy,
    pub max_depth: usize,
    pub timeout: u64,
    pub thresholds: Thresholds,

    pub extended_perfdata: bool,
    pub output_body_as_perfdata: bool,
    pub show_url: bool,
    pub verbose: u8,
}

impl Settings {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let mut positionals = [cli.address, cli.vhost].into_iter().flatten();
        let mut server_address = cli.server_address;
        if server_address.is_none() {
            server_address = positionals.next();
        }
        let mut host_name = cli.host_name;
        if host_name.is_none() {
            host_name = positionals.next();
        }

        ensure!(
            !cli.sni || host_name.is_some(),
            "server name indication requires that a host name is defined with -H"
        );

        // A port appended to the virtual host argument applies to the
        // connection too, unless -p overrides it.
        let mut host_port = None;
        if let Some(name) = host_name.take() {
            let (name, port) = split_host_port(&name)?;
            host_port = port;
            host_name = Some(name);
        }

        let server_address = match server_address {
            Some(address) => address,
            None => host_name
                .clone()
                .context("you must specify a server address or host name")?,
        };

        let use_ssl = cli.ssl.is_some()
            || cli.certificate.is_some()
            || cli.client_cert.is_some()
            || cli.private_key.is_some();
        let ssl_version = parse_tls_version(cli.ssl.as_deref())?;

        let port = match cli.port {
            Some(port) => {
                ensure!(
                    (1..=MAX_PORT).contains(&port),
                    "invalid port number {port}"
                );
                port as u16
            }
            None => host_port.unwrap_or(if use_ssl { HTTPS_PORT } else { HTTP_PORT }),
        };

        let check_cert = cli
            .certificate
            .as_deref()
            .map(parse_cert_expiry)
            .transpose()?;
        ensure!(
            cli.client_cert.is_none() || cli.private_key.is_some(),
            "if you use a client certificate you must also specify a private key file"
        );

        let method = match cli.method {
            Some(method) => method,
            None if cli.post.is_some() => "POST".to_string(),
            None => "GET".to_string(),
        };

        let (pattern, case_insensitive) = match (cli.regex, cli.eregi) {
            (Some(pattern), _) => (Some(pattern), false),
            (None, Some(pattern)) => (Some(pattern), true),
            (None, None) => (None, false),
        };
        let body_regex = pattern
            .map(|pattern| {
                RegexBuilder::new(&pattern)
                    .case_insensitive(case_insensitive)
                    .dot_matches_new_line(cli.linespan)
                    .multi_line(!cli.linespan)
                    .build()
                    .with_context(|| format!("could not compile regular expression '{pattern}'"))
            })
            .transpose()?;

        let (min_page_len, max_page_len) = match cli.pagesize.as_deref() {
            Some(spec) => parse_page_size(spec)?,
            None => (0, 0),
        };

        let max_age = cli.max_age.as_deref().map(parse_max_age).transpose()?;

        let thresholds = Thresholds::parse(cli.warning.as_deref(), cli.critical.as_deref())?;
        let mut timeout = cli.timeout;
        if let Some(critical) = &thresholds.critical {
            if critical.end() > timeout as f64 {
                timeout = critical.end() as u64 + 1;
            }
        }

        let (server_expect, expect_is_custom) = match cli.expect {
            Some(expect) => (expect, true),
            None => (DEFAULT_EXPECT.to_string(), false),
        };

        let have_accept = cli.headers.iter().any(|h| h.starts_with("Accept:"));

        let redirect_policy = match cli.onredirect {
            OnRedirect::Ok => RedirectPolicy::Fixed(Severity::Ok),
            OnRedirect::Warning => RedirectPolicy::Fixed(Severity::Warning),
            OnRedirect::Critical => RedirectPolicy::Fixed(Severity::Critical),
            OnRedirect::Unknown => RedirectPolicy::Fixed(Severity::Unknown),
            OnRedirect::Follow => RedirectPolicy::Follow {
                sticky_host: false,
                sticky_port: false,
            },
            OnRedirect::Sticky => RedirectPolicy::Follow {
                sticky_host: true,
                sticky_port: false,
            },
            OnRedirect::Stickyport => RedirectPolicy::Follow {
                sticky_host: true,
                sticky_port: true,
            },
        };

        let user_agent = cli
            .useragent
            .unwrap_or_else(|| format!("check_http-rs/v{}", env!("CARGO_PKG_VERSION")));

        Ok(Self {
            server_address,
            host_name,
            port,
            use_ssl,
            ssl_version,
            sni: cli.sni,
            verify_host: cli.verify_host,
            check_cert,
            continue_after_check_cert: cli.continue_after_certificate,
            client_cert: cli.client_cert,
            client_key: cli.private_key,
            method,
            url: cli.url,
            post_data: cli.post,
            content_type: cli
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            user_agent,
            custom_headers: cli.headers,
            have_accept,
            user_auth: cli.authorization.filter(|s| !s.is_empty()),
            proxy_auth: cli.proxy_authorization.filter(|s| !s.is_empty()),
            proxy_protocol: cli.proxy_protocol,
            server_expect,
            expect_is_custom,
            header_expect: cli.header_string,
            string_expect: cli.string,
            body_regex,
            invert_regex: cli.invert_regex,
            min_page_len,
            max_page_len,
            max_age,
            no_body: cli.no_body,
            redirect_policy,
            max_depth: cli.max_redirects,
            timeout,
            thresholds,
            extended_perfdata: cli.extended_perfdata,
            output_body_as_perfdata: cli.output_body_as_perfdata,
            show_url: cli.show_url,
            verbose: cli.verbose,
        })
    }
}

/// Splits an optional `:port` suffix off a host argument, handling the
/// bracketed IPv6 form `[2001:db8::1]:8080`. A bare IPv6 address (more
/// than one colon, no brackets) is returned unchanged.
fn split_host_port(value: &str) -> Result<(String, Option<u16>)> {
    if let Some(rest) = value.strip_prefix('[') {
        return match rest.split_once("]:") {
            Some((host, port)) => Ok((format!("[{host}]"), Some(parse_port(port)?))),
            None => Ok((value.to_string(), None)),
        };
    }
    match value.split_once(':') {
        Some((host, port)) if !port.contains(':') => Ok((host.to_string(), Some(parse_port(port)?))),
        _ => Ok((value.to_string(), None)),
    }
}

fn parse_port(value: &str) -> Result<u16> {
    let port: u32 = value
        .parse()
        .with_context(|| format!("invalid port number '{value}'"))?;
    ensure!((1..=MAX_PORT).contains(&port), "invalid port number {port}");
    Ok(port as u16)
}

fn parse_tls_version(spec: Option<&str>) -> Result<TlsVersionSpec> {
    let Some(spec) = spec else {
        return Ok(TlsVersionSpec::Any);
    };
    match spec {
        "any" => Ok(TlsVersionSpec::Any),
        "1.2" => Ok(TlsVersionSpec::Tls12),
        "1.2+" => Ok(TlsVersionSpec::Tls12OrNewer),
        "1.3" => Ok(TlsVersionSpec::Tls13),
        "1.3+" => Ok(TlsVersionSpec::Tls13OrNewer),
        "1" | "1+" | "1.1" | "1.1+" | "2" | "2+" | "3" | "3+" => {
            bail!("TLS version {spec} is not supported; use 1.2 or 1.3 (with optional '+' suffix)")
        }
        other => bail!("invalid TLS version '{other}'"),
    }
}

fn parse_cert_expiry(spec: &str) -> Result<CertExpiry> {
    let (warn, crit) = match spec.split_once(',') {
        Some((warn, crit)) => (warn, Some(crit)),
        None => (spec, None),
    };
    let warn_days: i64 = warn
        .trim()
        .parse()
        .with_context(|| format!("invalid certificate expiration period '{warn}'"))?;
    ensure!(warn_days >= 0, "invalid certificate expiration period '{warn}'");
    let crit_days = match crit {
        Some(crit) => {
            let days: i64 = crit
                .trim()
                .parse()
                .with_context(|| format!("invalid certificate expiration period '{crit}'"))?;
            ensure!(days >= 0, "invalid certificate expiration period '{crit}'");
            days
        }
        None => 0,
    };
    Ok(CertExpiry {
        warn_days,
        crit_days,
    })
}

fn parse_page_size(spec: &str) -> Result<(i64, i64)> {
    match spec.split_once(':') {
        Some((min, max)) => {
            let min = min
                .parse()
                .with_context(|| format!("bad page size format '{spec}': try MIN:MAX"))?;
            let max = max
                .parse()
                .with_context(|| format!("bad page size format '{spec}': try MIN:MAX"))?;
            Ok((min, max))
        }
        None => {
            let min = spec
                .parse()
                .with_context(|| format!("bad page size format '{spec}'"))?;
            Ok((min, 0))
        }
    }
}

/// Parses a max-age argument: plain seconds, or a number with an
/// `s`/`m`/`h`/`d` suffix.
fn parse_max_age(spec: &str) -> Result<i64> {
    let multiplier = match spec.chars().last() {
        Some('m') => 60,
        Some('h') => 60 * 60,
        Some('d') => 60 * 60 * 24,
        Some('s') => 1,
        Some(c) if c.is_ascii_digit() => 1,
        _ => bail!("unparsable max-age '{spec}'"),
    };
    let digits = spec.trim_end_matches(|c: char| !c.is_ascii_digit());
    let value: i64 = digits
        .parse()
        .with_context(|| format!("unparsable max-age '{spec}'"))?;
    Ok(value * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn settings(args: &[&str]) -> Settings {
        let mut full = vec!["httpcheck"];
        full.extend_from_slice(args);
        Settings::from_cli(Cli::parse_from(full)).expect("settings")
    }

    fn settings_err(args: &[&str]) -> anyhow::Error {
        let mut full = vec!["httpcheck"];
        full.extend_from_slice(args);
        Settings::from_cli(Cli::parse_from(full)).expect_err("should fail")
    }

    #[test]
    fn requires_an_address_or_host_name() {
        let err = settings_err(&[]);
        assert!(err.to_string().contains("server address or host name"));
    }

    #[test]
    fn host_name_doubles_as_address() {
        let s = settings(&["-H", "example.com"]);
        assert_eq!(s.server_address, "example.com");
        assert_eq!(s.host_name.as_deref(), Some("example.com"));
        assert_eq!(s.port, HTTP_PORT);
    }

    #[test]
    fn positionals_fill_address_then_vhost() {
        let s = settings(&["example.org", "vhost.example.org"]);
        assert_eq!(s.server_address, "example.org");
        assert_eq!(s.host_name.as_deref(), Some("vhost.example.org"));
    }

    #[test]
    fn host_argument_port_is_peeled_off() {
        let s = settings(&["-H", "example.com:5000"]);
        assert_eq!(s.host_name.as_deref(), Some("example.com"));
        assert_eq!(s.port, 5000);
    }

    #[test]
    fn bracketed_ipv6_host_port() {
        let s = settings(&["-H", "[2001:db8::1]:8080"]);
        assert_eq!(s.host_name.as_deref(), Some("[2001:db8::1]"));
        assert_eq!(s.port, 8080);
    }

    #[test]
    fn bare_ipv6_host_keeps_no_port() {
        let s = settings(&["-H", "2001:db8::1", "-S"]);
        assert_eq!(s.host_name.as_deref(), Some("2001:db8::1"));
        assert_eq!(s.port, HTTPS_PORT);
    }

    #[test]
    fn explicit_port_beats_host_suffix_and_scheme() {
        let s = settings(&["-H", "example.com:5000", "-p", "81", "-S"]);
        assert_eq!(s.port, 81);
        assert!(s.use_ssl);
    }

    #[test]
    fn ssl_defaults_port_to_443() {
        let s = settings(&["-H", "example.com", "-S"]);
        assert_eq!(s.port, HTTPS_PORT);
        assert_eq!(s.ssl_version, TlsVersionSpec::Any);
    }

    #[test]
    fn certificate_check_implies_ssl() {
        let s = settings(&["-H", "example.com", "-C", "30,14"]);
        assert!(s.use_ssl);
        let expiry = s.check_cert.unwrap();
        assert_eq!(expiry.warn_days, 30);
        assert_eq!(expiry.crit_days, 14);
    }

    #[test]
    fn old_tls_versions_are_rejected() {
        let err = settings_err(&["-H", "example.com", "-S", "1.1"]);
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn client_cert_requires_key() {
        let err = settings_err(&["-H", "example.com", "-J", "/tmp/cert.pem"]);
        assert!(err.to_string().contains("private key"));
    }

    #[test]
    fn post_data_implies_post_method() {
        let s = settings(&["-H", "example.com", "-P", "a=1"]);
        assert_eq!(s.method, "POST");
        assert_eq!(s.post_data.as_deref(), Some("a=1"));
        assert_eq!(s.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn max_age_suffixes() {
        assert_eq!(settings(&["-H", "h", "-M", "90"]).max_age, Some(90));
        assert_eq!(settings(&["-H", "h", "-M", "90s"]).max_age, Some(90));
        assert_eq!(settings(&["-H", "h", "-M", "5m"]).max_age, Some(300));
        assert_eq!(settings(&["-H", "h", "-M", "2h"]).max_age, Some(7200));
        assert_eq!(settings(&["-H", "h", "-M", "3d"]).max_age, Some(259_200));
        assert!(settings_err(&["-H", "h", "-M", "3w"]).to_string().contains("unparsable"));
    }

    #[test]
    fn pagesize_range() {
        let s = settings(&["-H", "h", "-m", "100:2000"]);
        assert_eq!((s.min_page_len, s.max_page_len), (100, 2000));
        let s = settings(&["-H", "h", "-m", "100"]);
        assert_eq!((s.min_page_len, s.max_page_len), (100, 0));
    }

    #[test]
    fn critical_threshold_widens_timeout() {
        let s = settings(&["-H", "h", "-c", "30"]);
        assert_eq!(s.timeout, 31);
        let s = settings(&["-H", "h", "-c", "5", "-t", "10"]);
        assert_eq!(s.timeout, 10);
    }

    #[test]
    fn default_expect_is_not_custom() {
        let s = settings(&["-H", "h"]);
        assert_eq!(s.server_expect, "HTTP/1.");
        assert!(!s.expect_is_custom);
        let s = settings(&["-H", "h", "-e", "200,301"]);
        assert_eq!(s.server_expect, "200,301");
        assert!(s.expect_is_custom);
    }

    #[test]
    fn accept_header_detection() {
        let s = settings(&["-H", "h", "-k", "Accept: text/html"]);
        assert!(s.have_accept);
        let s = settings(&["-H", "h", "-k", "X-Custom: 1"]);
        assert!(!s.have_accept);
    }

    #[test]
    fn sticky_redirect_policies() {
        let s = settings(&["-H", "h", "-f", "sticky"]);
        assert_eq!(
            s.redirect_policy,
            RedirectPolicy::Follow {
                sticky_host: true,
                sticky_port: false
            }
        );
        let s = settings(&["-H", "h", "-f", "critical"]);
        assert_eq!(s.redirect_policy, RedirectPolicy::Fixed(Severity::Critical));
    }

    #[test]
    fn sni_requires_host_name() {
        let err = settings_err(&["-I", "192.0.2.1", "--sni"]);
        assert!(err.to_string().contains("host name"));
    }
}
