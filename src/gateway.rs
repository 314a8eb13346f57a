//! Gateway identity: device type, derived thing name, and the assembled config.

use anyhow::Result;
use std::fmt;
use std::str::FromStr;

use crate::config::Layout;
use crate::error::GatewayError;
use crate::state::{self, StateKey, StateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    RaspberryPi,
    JetsonNano,
}

impl DeviceType {
    pub const ALL: [DeviceType; 2] = [DeviceType::RaspberryPi, DeviceType::JetsonNano];

    /// Prefix of the cloud thing name. Raspberry Pi gateways are provisioned
    /// with Pi 5 certificates, hence `RaspberryPi5`.
    pub fn thing_prefix(self) -> &'static str {
        match self {
            DeviceType::RaspberryPi => "RaspberryPi5",
            DeviceType::JetsonNano => "JetsonNano",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceType::RaspberryPi => "RaspberryPi",
            DeviceType::JetsonNano => "JetsonNano",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the variant name in a few spellings or its 1-based menu number.
impl FromStr for DeviceType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match norm.as_str() {
            "1" | "raspberrypi" | "rpi" | "raspberry" => Ok(DeviceType::RaspberryPi),
            "2" | "jetsonnano" | "jetson" | "nano" => Ok(DeviceType::JetsonNano),
            _ => Err(GatewayError::InvalidAnswer(format!(
                "unknown device type {:?} — choose 1 (RaspberryPi) or 2 (JetsonNano)",
                s.trim()
            ))),
        }
    }
}

/// `<DeviceTypePrefix>_IoT_Thing_Gateway_<gatewayNumber>`
pub fn thing_name(device: DeviceType, gateway_number: u32) -> String {
    format!("{}_IoT_Thing_Gateway_{}", device.thing_prefix(), gateway_number)
}

/// A fully configured gateway, assembled from the State Store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub device_type: DeviceType,
    pub gateway_number: u32,
    pub thing_name: String,
    pub room_number: u32,
    pub cloud_endpoint: String,
}

impl GatewayConfig {
    /// Fails with `ConfigurationMissing` naming the first absent or unreadable key.
    pub fn load(store: &dyn StateStore) -> Result<Self> {
        let device_type = store
            .require(StateKey::DeviceType)?
            .parse::<DeviceType>()
            .map_err(|_| GatewayError::ConfigurationMissing(StateKey::DeviceType.name()))?;
        let gateway_number = store
            .require(StateKey::GatewayNumber)?
            .parse::<u32>()
            .map_err(|_| GatewayError::ConfigurationMissing(StateKey::GatewayNumber.name()))?;
        Ok(Self {
            device_type,
            gateway_number,
            thing_name: store.require(StateKey::ThingName)?,
            room_number: state::room_number(store)?,
            cloud_endpoint: store.require(StateKey::Endpoint)?,
        })
    }

    /// Environment file read by both pipeline units.
    pub fn env_file_contents(&self, layout: &Layout) -> String {
        let cert = |suffix: &str| layout.cert_dir.join(format!("{}{}", self.thing_name, suffix));
        format!(
            "# Generated by aiotctl configure. Edits are overwritten.\n\
             DB_PATH={db}\n\
             THING_NAME={thing}\n\
             IOT_ENDPOINT={endpoint}\n\
             CA_PATH={ca}\n\
             CERT_PATH={cert}\n\
             KEY_PATH={key}\n",
            db = layout.database_path().display(),
            thing = self.thing_name,
            endpoint = self.cloud_endpoint,
            ca = layout.cert_dir.join(crate::probe::ROOT_CA_FILE).display(),
            cert = cert(crate::probe::CERT_SUFFIX).display(),
            key = cert(crate::probe::KEY_SUFFIX).display(),
        )
    }
}
