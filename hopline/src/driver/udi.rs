//! Unique device identifier parsed from inventory output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)NAME: (?P<name>.*?),? DESCR").unwrap());
static DESCR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)DESCR: (?P<descr>.*)").unwrap());
static PID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)PID: (?P<pid>.*?),? ").unwrap());
static VID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)VID: (?P<vid>.*?),? ").unwrap());
static SN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)SN: (?P<sn>.*)").unwrap());

/// Chassis record: name, description, product id, version id and serial.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Udi {
    pub name: String,
    pub description: String,
    pub pid: String,
    pub vid: String,
    pub sn: String,
}

impl Udi {
    /// Parse the chassis record of `show inventory` style output.
    ///
    /// The block whose `NAME`/`DESCR` line mentions the chassis is preferred;
    /// otherwise the first record in the text is used. Missing fields stay
    /// empty.
    pub fn parse(inventory: &str) -> Self {
        let block = chassis_block(inventory);
        let block = block.as_deref().unwrap_or(inventory);

        let field = |re: &Regex, group: &str| {
            re.captures(block)
                .and_then(|caps| caps.name(group).map(|m| m.as_str().to_string()))
                .unwrap_or_default()
        };

        Self {
            name: field(&NAME, "name")
                .trim_matches(|c| c == '"' || c == ' ' || c == ',')
                .to_string(),
            description: field(&DESCR, "descr")
                .trim_matches(|c| c == '"' || c == ' ')
                .to_string(),
            pid: field(&PID, "pid").trim().to_string(),
            vid: field(&VID, "vid").trim().to_string(),
            sn: field(&SN, "sn").trim().to_string(),
        }
    }

    /// Whether nothing was parsed.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.description.is_empty() && self.pid.is_empty()
    }

    /// PID without a trailing power supply suffix (`-AC`, `-DC`).
    pub fn base_pid(&self) -> &str {
        self.pid
            .strip_suffix("-AC")
            .or_else(|| self.pid.strip_suffix("-DC"))
            .unwrap_or(&self.pid)
    }
}

/// The chassis `NAME` line and the line after it.
fn chassis_block(inventory: &str) -> Option<String> {
    let mut lines = inventory.lines();
    while let Some(line) = lines.next() {
        let lower = line.to_lowercase();
        if lower.contains("chassis") && lower.contains("name") {
            return Some(format!("{}\n{}", line, lines.next().unwrap_or_default()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASR9K: &str = "\
NAME: \"module 0/RSP0/CPU0\", DESCR: \"ASR9K Route Switch Processor with 440G/slot Fabric and 6GB\"
PID: A9K-RSP440-TR, VID: V05, SN: FOC1808NHAB

NAME: \"Rack 0\", DESCR: \"ASR 9006 4 Line Card Slot Chassis with V2 AC PEM\"
PID: ASR-9006-AC-V2, VID: V01, SN: FOX1523G7NQ
";

    const IOS: &str = "\
NAME: \"Chassis\", DESCR: \"Cisco ASR-903 Chassis\"
PID: ASR-903           , VID: V01  , SN: FOX1617P1D4

NAME: \"Power Supply Module 0\", DESCR: \"ASR 903 AC Power Supply\"
PID: A900-PWR550-A     , VID: V01  , SN: APS17270A2L
";

    #[test]
    fn test_prefers_chassis_record() {
        let udi = Udi::parse(ASR9K);
        assert_eq!(udi.name, "Rack 0");
        assert_eq!(udi.description, "ASR 9006 4 Line Card Slot Chassis with V2 AC PEM");
        assert_eq!(udi.pid, "ASR-9006-AC-V2");
        assert_eq!(udi.vid, "V01");
        assert_eq!(udi.sn, "FOX1523G7NQ");
    }

    #[test]
    fn test_padded_fields() {
        let udi = Udi::parse(IOS);
        assert_eq!(udi.name, "Chassis");
        assert_eq!(udi.pid, "ASR-903");
        assert_eq!(udi.vid, "V01");
        assert_eq!(udi.sn, "FOX1617P1D4");
    }

    #[test]
    fn test_base_pid() {
        let udi = Udi {
            pid: "ASR-9010-AC".to_string(),
            ..Udi::default()
        };
        assert_eq!(udi.base_pid(), "ASR-9010");
        assert_eq!(Udi::parse(ASR9K).base_pid(), "ASR-9006-AC-V2");
    }

    #[test]
    fn test_garbage_is_empty() {
        assert!(Udi::parse("% Invalid input detected").is_empty());
    }
}
