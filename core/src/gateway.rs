/// Remote I/O Gateway
///
/// Reads and writes digital channel state over HTTP. Two flavors exist, one per
/// mock server variant; widgets only see the [`IoGateway`] trait.
use crate::channel::{ChannelKind, ChannelNum, StateBody, ValueBody};
use crate::config::{ApiFlavor, ClientConfig};
use crate::{PanelError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// GET/POST contract used by the digital widgets
#[async_trait]
pub trait IoGateway: Send + Sync {
    /// Current state of a digital channel
    async fn read(&self, kind: ChannelKind, num: ChannelNum) -> Result<bool>;

    /// Request a new output state; returns the state the server settled on
    async fn write_output(&self, num: ChannelNum, state: bool) -> Result<bool>;
}

/// Build the gateway matching `cfg.api`
pub fn build_gateway(cfg: &ClientConfig) -> Result<Arc<dyn IoGateway>> {
    Ok(match cfg.api {
        ApiFlavor::Routed => Arc::new(HttpGateway::new(cfg.clone())?),
        ApiFlavor::Single => Arc::new(SingleArrayGateway::new(cfg.clone())?),
    })
}

fn http_client(cfg: &ClientConfig) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(ms) = cfg.request_timeout_ms {
        builder = builder.timeout(Duration::from_millis(ms));
    }
    builder.build().map_err(PanelError::Http)
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        return Err(PanelError::Status(status.as_u16()));
    }
    Ok(response)
}

/// Gateway for the routed API: `/api/digital-{input,output}?id=<n>`
#[derive(Clone)]
pub struct HttpGateway {
    http: Client,
    cfg: ClientConfig,
}

impl HttpGateway {
    pub fn new(cfg: ClientConfig) -> Result<Self> {
        let http = http_client(&cfg)?;
        Ok(Self { http, cfg })
    }

    fn channel_url(&self, kind: ChannelKind, num: ChannelNum) -> String {
        self.cfg.endpoint(&format!("/api/{}?id={}", kind.as_str(), num))
    }
}

#[async_trait]
impl IoGateway for HttpGateway {
    async fn read(&self, kind: ChannelKind, num: ChannelNum) -> Result<bool> {
        if !kind.is_digital() {
            return Err(PanelError::Unsupported(format!("read of {kind}")));
        }
        let url = self.channel_url(kind, num);
        debug!(target: "gateway", url = %url, "GET channel state");

        let response = check_status(self.http.get(&url).send().await?)?;
        let body: StateBody = response.json().await?;
        Ok(body.state)
    }

    async fn write_output(&self, num: ChannelNum, state: bool) -> Result<bool> {
        let url = self.channel_url(ChannelKind::DigitalOutput, num);
        debug!(target: "gateway", url = %url, state, "POST channel state");

        let response = self
            .http
            .post(&url)
            .json(&StateBody { state })
            .send()
            .await?;
        let body: StateBody = check_status(response)?.json().await?;
        Ok(body.state)
    }
}

/// Gateway for the single-array API: `GET /api/output`, `POST /api/output/:id`.
///
/// This flavor has no input endpoints.
#[derive(Clone)]
pub struct SingleArrayGateway {
    http: Client,
    cfg: ClientConfig,
}

impl SingleArrayGateway {
    pub fn new(cfg: ClientConfig) -> Result<Self> {
        let http = http_client(&cfg)?;
        Ok(Self { http, cfg })
    }

    /// Whole output array
    pub async fn read_outputs(&self) -> Result<Vec<bool>> {
        let url = self.cfg.endpoint("/api/output");
        debug!(target: "gateway", url = %url, "GET output array");
        let response = check_status(self.http.get(&url).send().await?)?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl IoGateway for SingleArrayGateway {
    async fn read(&self, kind: ChannelKind, num: ChannelNum) -> Result<bool> {
        if kind != ChannelKind::DigitalOutput {
            return Err(PanelError::Unsupported(format!(
                "read of {kind} on the single-array API"
            )));
        }
        let outputs = self.read_outputs().await?;
        outputs
            .get(num as usize)
            .copied()
            .ok_or(PanelError::UnknownChannel { kind, num })
    }

    async fn write_output(&self, num: ChannelNum, state: bool) -> Result<bool> {
        let url = self.cfg.endpoint(&format!("/api/output/{}", num));
        debug!(target: "gateway", url = %url, state, "POST output");

        let response = self
            .http
            .post(&url)
            .json(&ValueBody { value: state })
            .send()
            .await?;
        check_status(response)?;
        // The POST answers with a bare "success"; the array holds what was committed
        self.read(ChannelKind::DigitalOutput, num).await
    }
}
