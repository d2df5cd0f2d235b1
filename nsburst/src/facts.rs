//! System facts gathered from `get hostname` and `get system`.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::driver::Driver;
use crate::error::Result;

/// Command that reports the configured hostname.
pub const GET_HOSTNAME: &str = "get hostname";

/// Command that reports product, serial and software details.
pub const GET_SYSTEM: &str = "get system";

static HOSTNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Hostname: (.+)").expect("hostname pattern is valid"));

static PRODUCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Product Name: (.+)").expect("product pattern is valid"));

static SERIAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Serial Number: (\d+), Control Number: (\d+)").expect("serial pattern is valid")
});

static VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Software Version: (.+), Type: (.+)").expect("version pattern is valid")
});

/// Identity of one device, valid for one session.
///
/// Every field is empty until a matching line is seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFacts {
    pub hostname: String,
    pub product: String,
    pub serial_number: String,
    pub control_number: String,
    pub version: String,
    #[serde(rename = "type")]
    pub device_type: String,
}

impl DeviceFacts {
    /// Whether the product is known. Counter sampling needs it.
    pub fn is_available(&self) -> bool {
        !self.product.is_empty()
    }

    /// Fill `hostname` from `get hostname` output. The first match wins.
    pub fn parse_hostname(&mut self, output: &str) {
        for line in output.lines() {
            if !self.hostname.is_empty() {
                break;
            }
            if let Some(caps) = HOSTNAME_RE.captures(line) {
                self.hostname = caps[1].to_string();
            }
        }
    }

    /// Fill product, serial/control and version/type from `get system` output.
    ///
    /// Each line is tried against the product, serial and version patterns in
    /// that order and feeds at most one of them. A field, once set, is never
    /// overwritten by a later line.
    pub fn parse_system(&mut self, output: &str) {
        for line in output.lines() {
            if let Some(caps) = PRODUCT_RE.captures(line) {
                if self.product.is_empty() {
                    self.product = caps[1].to_string();
                }
            } else if let Some(caps) = SERIAL_RE.captures(line) {
                if self.serial_number.is_empty() {
                    self.serial_number = caps[1].to_string();
                    self.control_number = caps[2].to_string();
                }
            } else if let Some(caps) = VERSION_RE.captures(line) {
                if self.version.is_empty() {
                    self.version = caps[1].to_string();
                    self.device_type = caps[2].to_string();
                }
            }
        }
    }
}

/// Run `get hostname` and `get system` and parse the results.
///
/// An empty `product` in the returned facts means the device did not report
/// one; callers should treat the facts as unavailable.
pub async fn extract<D: Driver>(driver: &mut D) -> Result<DeviceFacts> {
    let mut facts = DeviceFacts::default();

    let response = driver.send_command(GET_HOSTNAME).await?;
    facts.parse_hostname(&response.result);

    let response = driver.send_command(GET_SYSTEM).await?;
    facts.parse_system(&response.result);

    debug!("facts: {:?}", facts);
    Ok(facts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM: &str = "\
Product Name: NetScreen-5400-III
Serial Number: 12345, Control Number: 00000000
Hardware Version: 4010(0)-(04), FPGA checksum: 00000000, VLAN1 IP (0.0.0.0)
Software Version: 6.2.0r9, Type: Firewall+VPN
Feature: High Availability
";

    #[test]
    fn test_parse_hostname() {
        let mut facts = DeviceFacts::default();
        facts.parse_hostname("Hostname: fw-edge-1\n");
        assert_eq!(facts.hostname, "fw-edge-1");
    }

    #[test]
    fn test_parse_hostname_first_match_wins() {
        let mut facts = DeviceFacts::default();
        facts.parse_hostname("noise\nHostname: first\nHostname: second\n");
        assert_eq!(facts.hostname, "first");
    }

    #[test]
    fn test_parse_system() {
        let mut facts = DeviceFacts::default();
        facts.parse_system(SYSTEM);
        assert_eq!(facts.product, "NetScreen-5400-III");
        assert_eq!(facts.serial_number, "12345");
        assert_eq!(facts.control_number, "00000000");
        assert_eq!(facts.version, "6.2.0r9");
        assert_eq!(facts.device_type, "Firewall+VPN");
        assert!(facts.is_available());
    }

    #[test]
    fn test_parse_system_first_match_per_field() {
        let mut facts = DeviceFacts::default();
        facts.parse_system(
            "Product Name: NetScreen-2000\nProduct Name: NetScreen-1000\nSoftware Version: 6.3.0r1-cu4.0, Type: Firewall+VPN\n",
        );
        assert_eq!(facts.product, "NetScreen-2000");
        assert_eq!(facts.version, "6.3.0r1-cu4.0");
        assert_eq!(facts.device_type, "Firewall+VPN");
        assert_eq!(facts.serial_number, "");
    }

    #[test]
    fn test_patterns_are_line_anchored() {
        let mut facts = DeviceFacts::default();
        facts.parse_system("  Product Name: indented\nOEM Product Name: other\n");
        assert!(!facts.is_available());
    }

    #[test]
    fn test_serialize_uses_type_key() {
        let facts = DeviceFacts {
            device_type: "Firewall+VPN".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&facts).unwrap();
        assert_eq!(json["type"], "Firewall+VPN");
        assert!(json.get("serialNumber").is_some());
    }
}
