//! Docker swarm services through the Docker Engine HTTP API.
//!
//! Only TCP endpoints (`tcp://host:2375`, `http://host:2375`,
//! `https://host:2376`) are supported; put a proxy in front of the unix
//! socket if needed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{docker_endpoint, expect_success};
use crate::callbacks::Orchestrator;
use crate::error::{KogiaError, KogiaResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectVersion {
    index: u64,
}

/// The parts of `GET /services/{id}` needed to scale a service
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceInspect {
    #[serde(rename = "ID")]
    id: String,
    version: ObjectVersion,
    /// Kept as raw JSON so an update sends back every field unchanged
    spec: Value,
}

impl ServiceInspect {
    fn replicas(&self, service: &str) -> KogiaResult<i64> {
        let replicated = self
            .spec
            .pointer("/Mode/Replicated")
            .ok_or_else(|| KogiaError::not_replicated(service))?;
        Ok(replicated
            .get("Replicas")
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    fn set_replicas(&mut self, service: &str, count: i64) -> KogiaResult<()> {
        let replicated = self
            .spec
            .pointer_mut("/Mode/Replicated")
            .and_then(Value::as_object_mut)
            .ok_or_else(|| KogiaError::not_replicated(service))?;
        replicated.insert("Replicas".to_string(), Value::from(count));
        Ok(())
    }
}

/// Orchestrator backed by a swarm manager
#[derive(Debug, Clone)]
pub struct DockerSwarm {
    client: Client,
    base: Url,
}

impl DockerSwarm {
    /// Build a client without contacting the daemon
    pub fn new(address: &str, timeout: Duration) -> KogiaResult<Self> {
        let base = docker_endpoint(address)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    /// Build a client and check that the daemon answers
    pub async fn connect(address: &str, timeout: Duration) -> KogiaResult<Self> {
        let swarm = Self::new(address, timeout)?;
        let response = swarm.client.get(swarm.endpoint(&["_ping"])?).send().await?;
        expect_success("connect", response).await?;
        debug!(host = ?swarm.base.host_str(), "connected to docker");
        Ok(swarm)
    }

    fn endpoint(&self, segments: &[&str]) -> KogiaResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| KogiaError::config("docker address cannot be used as a base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn inspect(&self, operation: &str, service: &str) -> KogiaResult<ServiceInspect> {
        let response = self
            .client
            .get(self.endpoint(&["services", service])?)
            .send()
            .await?;
        let body = expect_success(operation, response).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl Orchestrator for DockerSwarm {
    async fn get_replicas(&self, service: &str) -> KogiaResult<i64> {
        self.inspect("get_replicas", service).await?.replicas(service)
    }

    async fn set_replicas(&self, service: &str, count: i64) -> KogiaResult<()> {
        if count < 0 {
            return Err(KogiaError::backend(
                "set_replicas",
                format!("refusing to scale '{}' to {} replicas", service, count),
            ));
        }

        let mut inspect = self.inspect("set_replicas", service).await?;
        inspect.set_replicas(service, count)?;

        let mut url = self.endpoint(&["services", inspect.id.as_str(), "update"])?;
        url.query_pairs_mut()
            .append_pair("version", &inspect.version.index.to_string());

        let response = self.client.post(url).json(&inspect.spec).send().await?;
        expect_success("set_replicas", response).await?;
        Ok(())
    }
}
