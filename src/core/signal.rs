use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Progressive,
    Interlaced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorFormat {
    #[serde(rename = "422")]
    Ycc422,
    #[serde(rename = "444")]
    Ycc444,
    #[serde(rename = "420")]
    Ycc420,
    #[serde(rename = "RGB")]
    Rgb,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl ColorFormat {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "422" => Some(ColorFormat::Ycc422),
            "444" => Some(ColorFormat::Ycc444),
            "420" => Some(ColorFormat::Ycc420),
            "RGB" => Some(ColorFormat::Rgb),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ColorFormat::Ycc422 => "422",
            ColorFormat::Ycc444 => "444",
            ColorFormat::Ycc420 => "420",
            ColorFormat::Rgb => "RGB",
            ColorFormat::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HdrFormat {
    #[default]
    #[serde(rename = "SDR")]
    Sdr,
    #[serde(rename = "HDR10")]
    Hdr10,
    #[serde(rename = "HDR10+")]
    Hdr10Plus,
    #[serde(rename = "HLG")]
    Hlg,
    #[serde(rename = "Dolby Vision")]
    DolbyVision,
    #[serde(rename = "LLDV")]
    Lldv,
}

impl HdrFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            HdrFormat::Sdr => "SDR",
            HdrFormat::Hdr10 => "HDR10",
            HdrFormat::Hdr10Plus => "HDR10+",
            HdrFormat::Hlg => "HLG",
            HdrFormat::DolbyVision => "Dolby Vision",
            HdrFormat::Lldv => "LLDV",
        }
    }

    pub const fn is_hdr(self) -> bool {
        !matches!(self, HdrFormat::Sdr)
    }
}

impl fmt::Display for HdrFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Colorimetry {
    #[serde(rename = "BT.709")]
    Bt709,
    #[serde(rename = "BT.2020")]
    Bt2020,
}

impl Colorimetry {
    pub const fn as_str(self) -> &'static str {
        match self {
            Colorimetry::Bt709 => "BT.709",
            Colorimetry::Bt2020 => "BT.2020",
        }
    }
}

/// One parsed status reading. `raw` is always the untouched device response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDescriptor {
    pub raw: String,
    pub resolution: Option<String>,
    pub refresh_rate: Option<u32>,
    pub scan_type: Option<ScanType>,
    pub color_format: ColorFormat,
    pub bit_depth: Option<String>,
    pub hdr_format: HdrFormat,
    pub colorimetry: Option<Colorimetry>,
}

impl SignalDescriptor {
    pub fn empty(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            ..Self::default()
        }
    }

    /// Compact one-line form such as `3840x2160p60 422 12B HDR10 BT.2020`.
    pub fn summary(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(res) = &self.resolution {
            let scan = match self.scan_type {
                Some(ScanType::Interlaced) => "i",
                _ => "p",
            };
            match self.refresh_rate {
                Some(hz) => parts.push(format!("{res}{scan}{hz}")),
                None => parts.push(res.clone()),
            }
        }
        if self.color_format != ColorFormat::Unknown {
            parts.push(self.color_format.as_str().to_string());
        }
        if let Some(depth) = &self.bit_depth {
            parts.push(depth.clone());
        }
        parts.push(self.hdr_format.as_str().to_string());
        if let Some(c) = self.colorimetry {
            parts.push(c.as_str().to_string());
        }
        parts.join(" ")
    }
}
