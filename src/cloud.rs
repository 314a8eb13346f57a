//! AWS CLI adapter behind the `CloudCli` capability.

use anyhow::{Context, Result};
use std::process::Command;

use crate::config::CloudConfig;
use crate::error::GatewayError;

pub trait CloudCli {
    /// `Ok` when the CLI can authenticate; otherwise `CredentialsNotConfigured`.
    fn verify_credentials(&self) -> Result<()>;
    /// The account's data-plane endpoint hostname.
    fn describe_endpoint(&self) -> Result<String>;
}

pub struct AwsCli {
    region: Option<String>,
    timeout_secs: u64,
}

impl AwsCli {
    pub fn new(config: &CloudConfig) -> Self {
        Self {
            region: config.region.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        let timeout = self.timeout_secs.to_string();
        let mut cmd = Command::new("aws");
        cmd.args(args)
            .args(["--output", "json"])
            .args(["--cli-connect-timeout", timeout.as_str(), "--cli-read-timeout", timeout.as_str()]);
        if let Some(region) = &self.region {
            cmd.args(["--region", region.as_str()]);
        }
        tracing::debug!(?args, "aws");
        cmd.output().context("failed to run aws")
    }
}

impl CloudCli for AwsCli {
    fn verify_credentials(&self) -> Result<()> {
        let output = match self.run(&["sts", "get-caller-identity"]) {
            Ok(o) => o,
            Err(e) => return Err(GatewayError::CredentialsNotConfigured(format!("{:#}", e)).into()),
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GatewayError::CredentialsNotConfigured(stderr).into());
        }
        let identity: serde_json::Value =
            serde_json::from_slice(&output.stdout).unwrap_or(serde_json::Value::Null);
        tracing::info!(
            account = identity["Account"].as_str().unwrap_or("?"),
            arn = identity["Arn"].as_str().unwrap_or("?"),
            "cloud credentials verified"
        );
        Ok(())
    }

    fn describe_endpoint(&self) -> Result<String> {
        let output = self.run(&["iot", "describe-endpoint", "--endpoint-type", "iot:Data-ATS"])?;
        if !output.status.success() {
            anyhow::bail!(
                "aws iot describe-endpoint failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        parse_endpoint(&output.stdout)
    }
}

/// Extract `endpointAddress` from `describe-endpoint` JSON.
pub fn parse_endpoint(json: &[u8]) -> Result<String> {
    let value: serde_json::Value =
        serde_json::from_slice(json).context("describe-endpoint returned invalid JSON")?;
    value["endpointAddress"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .context("describe-endpoint response has no endpointAddress")
}
