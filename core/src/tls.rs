//! TLS setup for `https` connections.
//!
//! Native root certificates are loaded from the OS store once and the rustls
//! `ClientConfig` built from them is cached for the life of the process.

use std::io;
use std::net::IpAddr;
use std::sync::{Arc, OnceLock};

use rustls_pki_types::{CertificateDer, ServerName};
use url::{Host, Url};

use crate::error::Error;

static NATIVE_ROOTS: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();
static CLIENT_CONFIG: OnceLock<Arc<rustls::ClientConfig>> = OnceLock::new();

fn load_native_roots() -> Vec<CertificateDer<'static>> {
    let result = rustls_native_certs::load_native_certs();
    for err in &result.errors {
        tracing::warn!(error = %err, "error loading native root certificate");
    }
    if result.certs.is_empty() {
        tracing::warn!("no native root CA certificates found");
    } else {
        tracing::debug!(count = result.certs.len(), "loaded native root certificates");
    }
    result.certs
}

fn native_roots() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS.get_or_init(load_native_roots).as_slice()
}

fn tls_error(msg: impl Into<String>) -> Error {
    Error::Tls(io::Error::other(msg.into()))
}

/// Use the process-wide rustls provider if one is installed, else aws-lc-rs.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn build_client_config() -> Result<rustls::ClientConfig, Error> {
    let certs = native_roots();
    if certs.is_empty() {
        return Err(tls_error(
            "no native root CA certificates found in OS certificate store",
        ));
    }

    let mut roots = rustls::RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs.iter().cloned());
    if ignored > 0 {
        tracing::warn!(added, ignored, "some native root certificates could not be parsed");
    }
    if added == 0 {
        return Err(tls_error(format!(
            "no valid native root CA certificates parsed ({ignored} rejected)"
        )));
    }

    let config = rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| tls_error(format!("failed to set TLS protocol versions: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}

/// Shared client config backed by the system trust store.
pub(crate) fn client_config() -> Result<Arc<rustls::ClientConfig>, Error> {
    if let Some(config) = CLIENT_CONFIG.get() {
        return Ok(Arc::clone(config));
    }
    let config = Arc::new(build_client_config()?);
    // A racing thread may have won; either value is equivalent.
    Ok(Arc::clone(CLIENT_CONFIG.get_or_init(|| config)))
}

/// The name the server certificate must match: the URL host without port.
pub(crate) fn server_name(url: &Url) -> Result<ServerName<'static>, Error> {
    match url.host() {
        Some(Host::Domain(domain)) => ServerName::try_from(domain.to_string())
            .map_err(|e| tls_error(format!("invalid server name '{domain}': {e}"))),
        Some(Host::Ipv4(ip)) => Ok(ServerName::from(IpAddr::V4(ip))),
        Some(Host::Ipv6(ip)) => Ok(ServerName::from(IpAddr::V6(ip))),
        None => Err(Error::MissingHost(url.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn server_name_strips_port() {
        let name = server_name(&url("https://example.test:8443/path")).unwrap();
        assert_eq!(name, ServerName::try_from("example.test").unwrap());
    }

    #[test]
    fn server_name_for_ip_literals() {
        let v4 = server_name(&url("https://127.0.0.1:8443/")).unwrap();
        assert_eq!(v4, ServerName::from(IpAddr::from([127, 0, 0, 1])));

        let v6 = server_name(&url("https://[::1]:8443/")).unwrap();
        assert_eq!(v6, ServerName::from("::1".parse::<IpAddr>().unwrap()));
    }

    #[test]
    fn native_roots_are_cached() {
        let first = native_roots();
        let second = native_roots();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn client_config_is_shared_when_available() {
        // Minimal containers may have no OS certificates; only check sharing
        // when a config can be built at all.
        if let (Ok(a), Ok(b)) = (client_config(), client_config()) {
            assert!(Arc::ptr_eq(&a, &b));
        }
    }
}
