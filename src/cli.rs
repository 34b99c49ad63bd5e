use std::path::PathBuf;

use clap::Parser;

/// Command-line surface of the probe. Semantics are validated and
/// normalized in [`crate::settings::Settings::from_cli`].
#[derive(Debug, Clone, Parser)]
#[command(
    name = "httpcheck",
    about = "Probes an HTTP(S) endpoint and reports an OK/WARNING/CRITICAL/UNKNOWN verdict",
    version
)]
pub struct Cli {
    /// Host name for servers using host headers (virtual host).
    /// Append a port to include it in the header (eg: example.com:5000).
    #[arg(short = 'H', long = "hostname")]
    pub host_name: Option<String>,

    /// IP address or name to connect to (bypasses DNS when numeric).
    #[arg(short = 'I', long = "ip-address")]
    pub server_address: Option<String>,

    /// Port number (default: 80, or 443 with --ssl).
    #[arg(short = 'p', long = "port")]
    pub port: Option<u32>,

    /// URL path to request.
    #[arg(short = 'u', long = "url", default_value = "/")]
    pub url: String,

    /// Connect via TLS. VERSION pins the protocol: 1.2, 1.3, or with a
    /// '+' suffix to also accept newer versions.
    #[arg(
        short = 'S',
        long = "ssl",
        value_name = "VERSION",
        num_args = 0..=1,
        default_missing_value = "any"
    )]
    pub ssl: Option<String>,

    /// Send the virtual host name in the TLS SNI extension.
    #[arg(long)]
    pub sni: bool,

    /// Verify the server certificate against the system trust store.
    #[arg(long = "verify-host")]
    pub verify_host: bool,

    /// Minimum days the certificate must remain valid: WARN[,CRIT].
    /// Unless --continue-after-certificate is given, the URL itself is
    /// not checked.
    #[arg(short = 'C', long = "certificate", value_name = "DAYS")]
    pub certificate: Option<String>,

    /// Continue with the HTTP check after the certificate check.
    #[arg(long = "continue-after-certificate")]
    pub continue_after_certificate: bool,

    /// Client certificate file (PEM) for the TLS session.
    #[arg(short = 'J', long = "client-cert", value_name = "FILE")]
    pub client_cert: Option<PathBuf>,

    /// Private key file (PEM) matching the client certificate.
    #[arg(short = 'K', long = "private-key", value_name = "FILE")]
    pub private_key: Option<PathBuf>,

    /// Comma-delimited strings, at least one expected in the status line.
    /// When given, all other status-line logic is skipped.
    #[arg(short = 'e', long = "expect")]
    pub expect: Option<String>,

    /// String expected in the response headers.
    #[arg(short = 'd', long = "header-string")]
    pub header_string: Option<String>,

    /// String expected in the response body.
    #[arg(short = 's', long = "string")]
    pub string: Option<String>,

    /// Regular expression expected to match the body.
    #[arg(short = 'r', long = "regex", visible_alias = "ereg")]
    pub regex: Option<String>,

    /// Case-insensitive regular expression expected to match the body.
    #[arg(short = 'R', long = "eregi", conflicts_with = "regex")]
    pub eregi: Option<String>,

    /// Allow the regex to span newlines.
    #[arg(short = 'l', long = "linespan")]
    pub linespan: bool,

    /// Return CRITICAL when the regex matches instead of when it does not.
    #[arg(long = "invert-regex")]
    pub invert_regex: bool,

    /// How to handle redirects: ok, warning, critical, unknown, follow,
    /// sticky (pin the address), stickyport (pin address and port).
    #[arg(short = 'f', long = "onredirect", value_enum, default_value_t = OnRedirect::Ok)]
    pub onredirect: OnRedirect,

    /// Maximum number of redirects followed before giving up.
    #[arg(long = "max-redirects", default_value_t = 15)]
    pub max_redirects: usize,

    /// HTTP method (GET, HEAD, POST, ...; CONNECT enables tunnel mode).
    #[arg(short = 'j', long = "method")]
    pub method: Option<String>,

    /// URL-encoded POST data (implies POST unless -j overrides it).
    #[arg(short = 'P', long = "post")]
    pub post: Option<String>,

    /// Content-Type for the request body.
    #[arg(short = 'T', long = "content-type")]
    pub content_type: Option<String>,

    /// Additional header line to send; may be repeated.
    #[arg(short = 'k', long = "header", action = clap::ArgAction::Append)]
    pub headers: Vec<String>,

    /// Basic auth credentials: username:password.
    #[arg(short = 'a', long = "authorization")]
    pub authorization: Option<String>,

    /// Proxy Basic auth credentials: username:password.
    #[arg(short = 'b', long = "proxy-authorization")]
    pub proxy_authorization: Option<String>,

    /// Send a PROXY protocol v1 preamble after connecting.
    #[arg(long = "proxy-protocol")]
    pub proxy_protocol: bool,

    /// Stop reading at the end of the headers.
    #[arg(short = 'N', long = "no-body")]
    pub no_body: bool,

    /// Warn if the document is older than this (seconds, or 5m/12h/3d).
    #[arg(short = 'M', long = "max-age")]
    pub max_age: Option<String>,

    /// Minimum page size, or MIN:MAX range, in bytes.
    #[arg(short = 'm', long = "pagesize")]
    pub pagesize: Option<String>,

    /// Probe timeout in seconds.
    #[arg(short = 't', long = "timeout", default_value_t = 10)]
    pub timeout: u64,

    /// Response time range resulting in WARNING.
    #[arg(short = 'w', long = "warning")]
    pub warning: Option<String>,

    /// Response time range resulting in CRITICAL.
    #[arg(short = 'c', long = "critical")]
    pub critical: Option<String>,

    /// User-Agent product string to send.
    #[arg(short = 'A', long = "useragent")]
    pub useragent: Option<String>,

    /// Emit extended timing perfdata (connect, TLS, first byte, transfer).
    #[arg(short = 'E', long = "extended-perfdata")]
    pub extended_perfdata: bool,

    /// Append the response body to the perfdata when the verdict is OK.
    #[arg(short = 'o', long = "output-body-as-perfdata")]
    pub output_body_as_perfdata: bool,

    /// Embed the probed URL in the verdict message.
    #[arg(short = 'U', long = "show-url")]
    pub show_url: bool,

    /// Increase log verbosity on stderr (repeatable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Positional fallbacks for --ip-address and --hostname.
    #[arg(value_name = "ADDRESS")]
    pub address: Option<String>,

    #[arg(value_name = "VHOST")]
    pub vhost: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OnRedirect {
    Ok,
    Warning,
    Critical,
    Unknown,
    Follow,
    Sticky,
    Stickyport,
}
