use std::fs::File;
use std::io::BufReader;
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{
    ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme,
    StreamOwned,
};
use time::OffsetDateTime;
use time::macros::format_description;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::settings::{Settings, TlsVersionSpec};
use crate::verdict::Severity;

/// Shared TLS client configuration, built once and reused for every hop
/// of a redirect chain.
pub struct TlsProvider {
    config: Arc<ClientConfig>,
}

impl TlsProvider {
    pub fn new(settings: &Settings) -> Result<Self> {
        let versions: &[&rustls::SupportedProtocolVersion] = match settings.ssl_version {
            TlsVersionSpec::Any | TlsVersionSpec::Tls12OrNewer => rustls::ALL_VERSIONS,
            TlsVersionSpec::Tls12 => &[&rustls::version::TLS12],
            TlsVersionSpec::Tls13 | TlsVersionSpec::Tls13OrNewer => &[&rustls::version::TLS13],
        };
        let builder = ClientConfig::builder_with_protocol_versions(versions);

        let builder = if settings.verify_host {
            let mut roots = RootCertStore::empty();
            let loaded = rustls_native_certs::load_native_certs();
            for cert in loaded.certs {
                roots
                    .add(cert)
                    .context("failed to add a system root certificate")?;
            }
            if roots.is_empty() {
                bail!("no usable root certificates found in the system trust store");
            }
            builder.with_root_certificates(roots)
        } else {
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(SkipVerification::default()))
        };

        let mut config = match (&settings.client_cert, &settings.client_key) {
            (Some(cert_path), Some(key_path)) => {
                let certs = load_certs(cert_path)?;
                let key = load_key(key_path)?;
                builder
                    .with_client_auth_cert(certs, key)
                    .context("invalid client certificate or key")?
            }
            _ => builder.with_no_client_auth(),
        };
        config.enable_sni = settings.sni;

        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Runs the TLS handshake over an already-connected socket and wraps
    /// it in a blocking stream.
    pub fn handshake(
        &self,
        sock: TcpStream,
        server_name: &str,
    ) -> Result<StreamOwned<ClientConnection, TcpStream>> {
        let name = ServerName::try_from(server_name.trim_matches(['[', ']']))
            .with_context(|| format!("invalid TLS server name '{server_name}'"))?
            .to_owned();
        let conn = ClientConnection::new(Arc::clone(&self.config), name)
            .context("failed to create TLS session")?;
        let mut stream = StreamOwned::new(conn, sock);
        while stream.conn.is_handshaking() {
            stream
                .conn
                .complete_io(&mut stream.sock)
                .context("TLS handshake failed")?;
        }
        Ok(stream)
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?,
    );
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("cannot parse certificates from {}", path.display()))?;
    if certs.is_empty() {
        bail!("no certificates found in {}", path.display());
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?,
    );
    rustls_pemfile::private_key(&mut reader)
        .with_context(|| format!("cannot parse private key from {}", path.display()))?
        .with_context(|| format!("no private key found in {}", path.display()))
}

/// Checks the peer certificate's remaining lifetime against the
/// configured warning and critical windows. Returns a full verdict line.
pub fn check_certificate(cert_der: &[u8], warn_days: i64, crit_days: i64) -> (Severity, String) {
    let cert = match X509Certificate::from_der(cert_der) {
        Ok((_, cert)) => cert,
        Err(e) => {
            return (
                Severity::Unknown,
                format!("UNKNOWN - Cannot parse server certificate: {e}"),
            );
        }
    };
    let cn = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|attr| attr.as_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let not_after = cert.validity().not_after.timestamp();
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let days_left = (not_after - now) / 86_400;
    let expires = format_timestamp(not_after);

    if not_after <= now {
        (
            Severity::Critical,
            format!("CRITICAL - Certificate '{cn}' expired on {expires}."),
        )
    } else if days_left < crit_days {
        (
            Severity::Critical,
            format!("CRITICAL - Certificate '{cn}' expires in {days_left} day(s) ({expires})."),
        )
    } else if days_left < warn_days {
        (
            Severity::Warning,
            format!("WARNING - Certificate '{cn}' expires in {days_left} day(s) ({expires})."),
        )
    } else {
        (
            Severity::Ok,
            format!("OK - Certificate '{cn}' will expire on {expires}."),
        )
    }
}

fn format_timestamp(unix: i64) -> String {
    let format = format_description!("[month]/[day]/[year] [hour]:[minute]");
    OffsetDateTime::from_unix_timestamp(unix)
        .ok()
        .and_then(|ts| ts.format(format).ok())
        .unwrap_or_else(|| unix.to_string())
}

/// Certificate verifier that accepts any chain. Used unless
/// --verify-host asks for real validation; expiry is still checked
/// separately when -C is given.
#[derive(Debug, Default)]
struct SkipVerification;

impl ServerCertVerifier for SkipVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
