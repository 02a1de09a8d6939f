//! Concrete metric sources and orchestrators.
//!
//! `memory` is always available. The HTTP backends need the
//! `http-backends` feature.

pub mod memory;
#[cfg(feature = "http-backends")]
pub mod rabbitmq;
#[cfg(feature = "http-backends")]
pub mod swarm;

pub use memory::{InMemoryOrchestrator, StaticMetrics};
#[cfg(feature = "http-backends")]
pub use rabbitmq::RabbitMqMetrics;
#[cfg(feature = "http-backends")]
pub use swarm::DockerSwarm;

#[cfg(feature = "http-backends")]
use crate::error::{KogiaError, KogiaResult};

/// Management API port used for `amqp://` broker addresses
#[cfg(feature = "http-backends")]
pub const MANAGEMENT_PORT: u16 = 15672;
/// Management API port used for `amqps://` broker addresses
#[cfg(feature = "http-backends")]
pub const MANAGEMENT_TLS_PORT: u16 = 15671;
/// Docker daemon port used for `tcp://` addresses without one
#[cfg(feature = "http-backends")]
pub const DOCKER_PORT: u16 = 2375;

#[cfg(feature = "http-backends")]
fn parse_url(kind: &str, address: &str) -> KogiaResult<reqwest::Url> {
    reqwest::Url::parse(address)
        .map_err(|e| KogiaError::config(format!("invalid {} address '{}': {}", kind, address, e)))
}

#[cfg(feature = "http-backends")]
fn unsupported(kind: &str, scheme: &str, expected: &str) -> KogiaError {
    KogiaError::config(format!(
        "unsupported {} address scheme '{}', expected {}",
        kind, scheme, expected
    ))
}

/// Rebuild `url` as an http(s) URL, keeping credentials, host and path.
///
/// `Url::set_scheme` cannot switch between special and non-special schemes.
#[cfg(feature = "http-backends")]
fn rebase(kind: &str, url: &reqwest::Url, scheme: &str, port: u16) -> KogiaResult<reqwest::Url> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| KogiaError::config(format!("{} address '{}' has no host", kind, url)))?;

    let mut rebased = parse_url(kind, &format!("{}://{}:{}/", scheme, host, port))?;
    let invalid = || KogiaError::config(format!("invalid {} address '{}'", kind, url));
    rebased.set_username(url.username()).map_err(|_| invalid())?;
    rebased.set_password(url.password()).map_err(|_| invalid())?;
    rebased.set_path(url.path());
    Ok(rebased)
}

#[cfg(feature = "http-backends")]
fn ensure_base(kind: &str, url: reqwest::Url) -> KogiaResult<reqwest::Url> {
    if url.cannot_be_a_base() {
        return Err(KogiaError::config(format!(
            "{} address '{}' cannot be used as a base URL",
            kind, url
        )));
    }
    Ok(url)
}

/// Management API endpoint for a broker address.
///
/// `http(s)://` addresses are used as is. `amqp://` maps to
/// `http://host:15672` and `amqps://` to `https://host:15671`, keeping the
/// credentials and the vhost path.
#[cfg(feature = "http-backends")]
fn amqp_management_endpoint(address: &str) -> KogiaResult<reqwest::Url> {
    let url = parse_url("amqp", address)?;
    let url = match url.scheme() {
        "http" | "https" => url,
        "amqp" => rebase("amqp", &url, "http", MANAGEMENT_PORT)?,
        "amqps" => rebase("amqp", &url, "https", MANAGEMENT_TLS_PORT)?,
        other => return Err(unsupported("amqp", other, "amqp, amqps, http or https")),
    };
    ensure_base("amqp", url)
}

/// HTTP endpoint for a docker daemon address.
///
/// `tcp://host:port` maps to `http://host:port` (port 2375 if missing).
/// Unix sockets are rejected.
#[cfg(feature = "http-backends")]
fn docker_endpoint(address: &str) -> KogiaResult<reqwest::Url> {
    let url = parse_url("docker", address)?;
    let url = match url.scheme() {
        "http" | "https" => url,
        "tcp" => {
            let port = url.port().unwrap_or(DOCKER_PORT);
            rebase("docker", &url, "http", port)?
        }
        "unix" => {
            return Err(KogiaError::config(format!(
                "docker address '{}' is a unix socket, which is not supported; \
                 expose the daemon on tcp:// or http://",
                address
            )))
        }
        other => return Err(unsupported("docker", other, "tcp, http or https")),
    };
    ensure_base("docker", url)
}

/// Turn a non-2xx response into a backend error carrying the response body
#[cfg(feature = "http-backends")]
async fn expect_success(
    operation: &str,
    response: reqwest::Response,
) -> KogiaResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(KogiaError::backend(
        operation.to_string(),
        format!("{}: {}", status, body.trim()),
    ))
}
