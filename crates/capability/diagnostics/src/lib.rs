//! 故障分类与面向操作员的提示。
//!
//! 输入是故障的文本描述（构造、连接或读取失败），输出两种呈现：
//! 详细的操作员提示（标题、说明、处理步骤、折叠的技术细节）与简短状态行。

use domain::AssetIdentity;
use serde::Serialize;

/// 故障类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Timeout,
    Reset,
    Refused,
    Unreachable,
    Other,
}

// 按优先级匹配，全部为小写
const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout", "10060"];
const RESET_MARKERS: &[&str] = &["connection reset", "forcibly closed", "10054"];
const REFUSED_MARKERS: &[&str] = &["refused", "10061"];
const UNREACHABLE_MARKERS: &[&str] = &["unreachable", "no route"];

const NOT_CONNECTED: &str = "not connected";

impl FaultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::Timeout => "timeout",
            FaultKind::Reset => "reset",
            FaultKind::Refused => "refused",
            FaultKind::Unreachable => "unreachable",
            FaultKind::Other => "other",
        }
    }
}

/// 按大小写不敏感的子串匹配分类故障文本。
pub fn classify(error_text: &str) -> FaultKind {
    let text = error_text.to_lowercase();
    let hit = |markers: &[&str]| markers.iter().any(|marker| text.contains(marker));

    if hit(TIMEOUT_MARKERS) {
        FaultKind::Timeout
    } else if hit(RESET_MARKERS) {
        FaultKind::Reset
    } else if hit(REFUSED_MARKERS) {
        FaultKind::Refused
    } else if hit(UNREACHABLE_MARKERS) {
        FaultKind::Unreachable
    } else {
        FaultKind::Other
    }
}

/// 是否为触发一次性重连的 "not connected" 信号
pub fn is_not_connected(error_text: &str) -> bool {
    error_text.to_lowercase().contains(NOT_CONNECTED)
}

/// 内联状态行，例如 `J65: NO LINK (unit not responding)`
pub fn status_line(asset_id: &str, error_text: &str) -> String {
    let summary = match classify(error_text) {
        FaultKind::Timeout => "NO LINK (unit not responding)",
        FaultKind::Reset => "LINK DROPPED (try again)",
        FaultKind::Unreachable => "UNIT UNREACHABLE (network problem)",
        FaultKind::Refused => "CONNECTION REFUSED (service not running)",
        FaultKind::Other => "LINK ERROR",
    };
    format!("{asset_id}: {summary}")
}

/// 连接失败时展示给操作员的提示
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorNotice {
    pub kind: FaultKind,
    pub title: String,
    pub header: String,
    pub body: String,
    /// 技术细节，默认折叠
    pub details: String,
}

impl OperatorNotice {
    pub fn connect_failure(
        asset: &AssetIdentity,
        driver_kind: &str,
        address: &str,
        raw_error: &str,
    ) -> Self {
        let kind = classify(raw_error);
        let (title, body) = explanation(kind);
        Self {
            kind,
            title: title.to_string(),
            header: format!(
                "Could not connect to fleet {} ({}).",
                asset.fleet_label(),
                asset.id
            ),
            body: body.to_string(),
            details: format!(
                "asset_id: {}\nfleet_no: {}\ntype: {}\naddress: {}\n\nraw_error: {}",
                asset.id, asset.fleet_no, driver_kind, address, raw_error
            ),
        }
    }
}

fn explanation(kind: FaultKind) -> (&'static str, &'static str) {
    match kind {
        FaultKind::Timeout => (
            "No link to unit",
            "The unit does not answer requests.\n\n\
             Possible causes:\n\
             - the unit is switched off or has no power\n\
             - the link is lost (network, cable, router)\n\n\
             What to do:\n\
             - check that the unit is switched on\n\
             - try again in 10-20 seconds\n\
             - if it keeps happening, tell an engineer",
        ),
        FaultKind::Reset => (
            "Link interrupted",
            "The connection was dropped while connecting.\n\n\
             Possible causes:\n\
             - the unit is rebooting\n\
             - a short network outage\n\n\
             What to do:\n\
             - wait 10-20 seconds and try again\n\
             - if it keeps happening, tell an engineer",
        ),
        FaultKind::Unreachable => (
            "Unit unreachable",
            "The unit cannot be reached over the network.\n\n\
             Possible causes:\n\
             - no network on site\n\
             - broken cable or switch turned off\n\n\
             What to do:\n\
             - check the network and cabling\n\
             - if that does not help, tell an engineer",
        ),
        FaultKind::Refused => (
            "Service not answering",
            "The connection was refused.\n\n\
             Possible causes:\n\
             - the service on the unit is not running\n\
             - wrong connection settings\n\n\
             What to do:\n\
             - try again later\n\
             - if it keeps happening, tell an engineer",
        ),
        FaultKind::Other => (
            "Connection error",
            "The connection could not be established.\n\n\
             What to do:\n\
             - try again\n\
             - if it keeps happening, tell an engineer",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_timeout_over_reset() {
        assert_eq!(
            classify("connection reset after read timed out"),
            FaultKind::Timeout
        );
    }

    #[test]
    fn test_platform_codes() {
        assert_eq!(classify("[WinError 10060] no response"), FaultKind::Timeout);
        assert_eq!(classify("[WinError 10054]"), FaultKind::Reset);
        assert_eq!(classify("[WinError 10061]"), FaultKind::Refused);
    }

    #[test]
    fn test_not_connected_is_distinct_from_categories() {
        assert!(is_not_connected("Not Connected"));
        assert!(!is_not_connected("connection refused"));
        assert_eq!(classify("not connected"), FaultKind::Other);
    }
}
