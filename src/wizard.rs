//! `aiotctl configure` — interactive gateway configuration.
//!
//! Questions are asked in a fixed order and every accepted answer is persisted
//! immediately, so an interrupted run keeps what was already answered.
//! Re-running asks everything again and overwrites.

use anyhow::Result;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::cloud::CloudCli;
use crate::config::Layout;
use crate::error::GatewayError;
use crate::gateway::{self, DeviceType, GatewayConfig};
use crate::prompt::Prompter;
use crate::state::{self, room_label, StateKey, StateStore};

pub struct Wizard<'a> {
    layout: &'a Layout,
    store: &'a dyn StateStore,
    cloud: &'a dyn CloudCli,
    prompter: &'a mut dyn Prompter,
}

impl<'a> Wizard<'a> {
    pub fn new(
        layout: &'a Layout,
        store: &'a dyn StateStore,
        cloud: &'a dyn CloudCli,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self { layout, store, cloud, prompter }
    }

    pub fn configure(&mut self) -> Result<GatewayConfig> {
        // Everything after this depends on cloud access.
        self.cloud.verify_credentials()?;

        let device_type = self.ask_device_type()?;
        self.store.set(StateKey::DeviceType, device_type.as_str())?;

        let gateway_number = self.ask_positive("Gateway number")?;
        let thing_name = gateway::thing_name(device_type, gateway_number);
        self.store.set(StateKey::GatewayNumber, &gateway_number.to_string())?;
        self.store.set(StateKey::ThingName, &thing_name)?;
        info!(%thing_name, "thing name set");

        let room_number = self.ask_positive("Room number")?;
        self.store.set(StateKey::Room, &room_label(room_number))?;

        let cloud_endpoint = self.resolve_endpoint()?;
        self.store.set(StateKey::Endpoint, &cloud_endpoint)?;

        let config = GatewayConfig {
            device_type,
            gateway_number,
            thing_name,
            room_number,
            cloud_endpoint,
        };
        state::write_atomic(&self.layout.env_file(), &config.env_file_contents(self.layout))?;
        info!(env_file = %self.layout.env_file().display(), "environment file written");
        Ok(config)
    }

    fn ask_device_type(&mut self) -> Result<DeviceType> {
        let menu: Vec<String> = DeviceType::ALL
            .iter()
            .enumerate()
            .map(|(i, d)| format!("{}) {}", i + 1, d))
            .collect();
        let question = format!("Device type [{}]", menu.join(", "));
        self.ask_until(&question, |s| s.parse::<DeviceType>())
    }

    fn ask_positive(&mut self, question: &str) -> Result<u32> {
        self.ask_until(question, parse_positive)
    }

    /// Automatic discovery first; manual entry if the cloud CLI cannot answer.
    fn resolve_endpoint(&mut self) -> Result<String> {
        match self.cloud.describe_endpoint() {
            Ok(endpoint) => {
                info!(%endpoint, "cloud endpoint discovered");
                Ok(endpoint)
            }
            Err(e) => {
                warn!("endpoint discovery failed, falling back to manual entry: {:#}", e);
                self.ask_until("Cloud endpoint (host or host:port)", parse_endpoint)
            }
        }
    }

    /// Repeat `question` until `parse` accepts the answer.
    fn ask_until<T>(
        &mut self,
        question: &str,
        parse: impl Fn(&str) -> Result<T, GatewayError>,
    ) -> Result<T> {
        loop {
            let answer = self.prompter.ask(question)?;
            match parse(answer.trim()) {
                Ok(v) => return Ok(v),
                Err(e) => warn!("{}", e),
            }
        }
    }
}

fn parse_positive(s: &str) -> Result<u32, GatewayError> {
    match s.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(GatewayError::InvalidAnswer(format!(
            "{:?} is not a positive whole number",
            s
        ))),
    }
}

fn parse_endpoint(s: &str) -> Result<String, GatewayError> {
    static HOST: OnceLock<Regex> = OnceLock::new();
    let re = HOST.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)*(:[0-9]{1,5})?$")
            .expect("static pattern")
    });
    if re.is_match(s) {
        Ok(s.to_string())
    } else {
        Err(GatewayError::InvalidAnswer(format!(
            "{:?} is not a hostname or host:port",
            s
        )))
    }
}
