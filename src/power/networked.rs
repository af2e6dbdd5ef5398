use reqwest::blocking::{Client, RequestBuilder, Response};
use std::time::Duration;

use super::{Pause, PowerBackend};
use crate::error::PowerCommandError;
use crate::models::{Port, PowerAction, PowerOutcome, PowerState};

const TIMEOUT: Duration = Duration::from_secs(60);

/// 网络电源开关（DLI 风格 REST 接口）
///
/// 端口号对外从 1 开始，接口里的 outlet 下标从 0 开始。
pub struct NetworkedSwitch {
    client: Client,
    base_url: String,
    user: String,
    password: String,
}

impl NetworkedSwitch {
    pub fn new(host: &str, user: &str, password: &str) -> Result<Self, reqwest::Error> {
        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", host.trim_end_matches('/'))
        };

        Ok(Self {
            client: Client::builder().timeout(TIMEOUT).build()?,
            base_url,
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    /// 建立客户端并探测一次开关；探测失败只记录错误
    pub fn connect(host: &str, user: &str, password: &str) -> Result<Self, reqwest::Error> {
        let switch = Self::new(host, user, password)?;
        match switch.verify() {
            Ok(()) => log::info!("Connected to power switch at {}", switch.base_url),
            Err(e) => log::error!("Can't talk to the switch at {}: {}", switch.base_url, e),
        }
        Ok(switch)
    }

    pub fn verify(&self) -> Result<(), reqwest::Error> {
        self.authed(self.client.get(format!("{}/restapi/relay/outlets/", self.base_url)))
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn outlet_url(&self, port: Port, leaf: &str) -> String {
        format!(
            "{}/restapi/relay/outlets/{}/{}/",
            self.base_url,
            port.number() - 1,
            leaf
        )
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.user, Some(&self.password))
            .header("X-CSRF", "x")
            .header("Accept", "application/json")
    }

    fn send(
        &self,
        request: RequestBuilder,
        action: PowerAction,
        port: Port,
    ) -> Result<Response, PowerCommandError> {
        let response = self
            .authed(request)
            .send()
            .map_err(|source| PowerCommandError::Http {
                action,
                port,
                source,
            })?;

        if !response.status().is_success() {
            return Err(PowerCommandError::Rejected {
                action,
                port,
                status: response.status(),
            });
        }
        Ok(response)
    }
}

impl PowerBackend for NetworkedSwitch {
    fn name(&self) -> &'static str {
        "networked"
    }

    fn set(&self, port: Port, state: PowerState) -> Result<(), PowerCommandError> {
        let value = match state {
            PowerState::On => "true",
            PowerState::Off => "false",
        };
        let request = self
            .client
            .put(self.outlet_url(port, "state"))
            .form(&[("value", value)]);
        self.send(request, state.into(), port)?;
        Ok(())
    }

    fn cycle(&self, port: Port, _pause: &dyn Pause) -> Result<PowerOutcome, PowerCommandError> {
        let request = self.client.post(self.outlet_url(port, "cycle"));
        self.send(request, PowerAction::Cycle, port)?;
        Ok(PowerOutcome::Cycled)
    }

    fn query(&self, port: Port) -> Result<Option<PowerState>, PowerCommandError> {
        let request = self.client.get(self.outlet_url(port, "state"));
        let body = self
            .send(request, PowerAction::Status, port)?
            .text()
            .map_err(|source| PowerCommandError::Http {
                action: PowerAction::Status,
                port,
                source,
            })?;

        match serde_json::from_str::<bool>(body.trim()) {
            Ok(true) => Ok(Some(PowerState::On)),
            Ok(false) => Ok(Some(PowerState::Off)),
            Err(_) => Err(PowerCommandError::BadState { port, body }),
        }
    }
}
