use crate::core::{
    ColorFormat, Colorimetry, HdrFormat, MetadataKind, ScanType, SignalDescriptor,
    SinkCapabilities, SpdInfo,
};

/// Parses one status line (for example `3840x2160p60 422 12b HDR BT2020`) into a descriptor.
///
/// Total over arbitrary input: anything that does not match a field leaves that field at
/// its null/SDR default. The raw response is kept as received.
pub fn parse_signal_status(response: &str) -> SignalDescriptor {
    let mut info = SignalDescriptor::empty(response);
    if response.trim().is_empty() {
        return info;
    }

    let upper = response.to_ascii_uppercase();
    let tokens: Vec<&str> = upper.split_whitespace().collect();

    if let Some(res) = tokens.iter().find_map(|t| match_resolution(t)) {
        info.resolution = Some(format!("{}x{}", res.width, res.height));
        info.refresh_rate = Some(res.refresh);
        info.scan_type = Some(res.scan);
    }

    info.color_format = tokens
        .iter()
        .find_map(|t| ColorFormat::from_token(t))
        .unwrap_or_default();

    info.bit_depth = tokens
        .iter()
        .find(|t| is_bit_depth(t))
        .map(|t| t.to_string());

    info.hdr_format = classify_hdr(&upper, &tokens);

    info.colorimetry = if upper.contains("BT2020") || upper.contains("BT.2020") {
        Some(Colorimetry::Bt2020)
    } else if upper.contains("BT709") || upper.contains("BT.709") {
        Some(Colorimetry::Bt709)
    } else {
        None
    };

    info
}

// Dolby Vision outranks HDR10+ when both appear; keep this order.
fn classify_hdr(upper: &str, tokens: &[&str]) -> HdrFormat {
    let has_token = |needle: &str| tokens.iter().any(|t| *t == needle);

    if mentions_dolby_vision(upper) {
        if has_token("LLDV") {
            HdrFormat::Lldv
        } else {
            HdrFormat::DolbyVision
        }
    } else if upper.contains("HDR10+") || upper.contains("HDR10PLUS") {
        HdrFormat::Hdr10Plus
    } else if upper.contains("HDR10") || has_token("HDR") {
        HdrFormat::Hdr10
    } else if has_token("HLG") {
        HdrFormat::Hlg
    } else {
        HdrFormat::Sdr
    }
}

/// `DV`/`LLDV` must stand alone (so `DVI` does not count); `DOLBY` may appear anywhere.
fn mentions_dolby_vision(upper: &str) -> bool {
    upper
        .split_whitespace()
        .any(|t| t == "DV" || t == "LLDV")
        || upper.contains("DOLBY")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Resolution {
    width: u32,
    height: u32,
    scan: ScanType,
    refresh: u32,
}

/// Matches `<digits>X<digits><P|I><digits>` at the start of an uppercased token.
fn match_resolution(token: &str) -> Option<Resolution> {
    let (width, rest) = take_digits(token)?;
    let rest = rest.strip_prefix('X')?;
    let (height, rest) = take_digits(rest)?;
    let mut chars = rest.chars();
    let scan = match chars.next()? {
        'P' => ScanType::Progressive,
        'I' => ScanType::Interlaced,
        _ => return None,
    };
    let (refresh, _) = take_digits(chars.as_str())?;
    Some(Resolution {
        width,
        height,
        scan,
        refresh,
    })
}

fn take_digits(s: &str) -> Option<(u32, &str)> {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let n = s[..end].parse::<u32>().ok()?;
    Some((n, &s[end..]))
}

fn is_bit_depth(token: &str) -> bool {
    let digits = token.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && token[digits..].starts_with('B')
}

/// Derives vendor/product and HDR metadata presence from an SPD port response.
pub fn parse_spd_status(response: &str, port: &str) -> SpdInfo {
    let upper = response.to_ascii_uppercase();
    let hdr_metadata = if mentions_dolby_vision(&upper) {
        Some(MetadataKind::DolbyVision)
    } else if upper.contains("HDR") {
        Some(MetadataKind::Hdr)
    } else {
        None
    };

    let mut words = response
        .split_whitespace()
        .filter(|w| !w.eq_ignore_ascii_case(port))
        .filter(|w| !w.eq_ignore_ascii_case("status"))
        .filter(|w| !w.ends_with(':'))
        .filter(|w| !is_metadata_marker(w));
    let vendor = words.next().map(str::to_string);
    let product: Vec<&str> = words.collect();
    let product = if product.is_empty() {
        None
    } else {
        Some(product.join(" "))
    };

    SpdInfo {
        vendor,
        product,
        hdr_metadata,
    }
}

fn is_metadata_marker(word: &str) -> bool {
    let w = word.to_ascii_uppercase();
    w.starts_with("HDR") || w.starts_with("DOLBY") || w == "DV" || w == "LLDV" || w == "HLG"
}

/// Capability flags advertised by a downstream sink, by substring presence.
pub fn parse_sink_capabilities(response: &str) -> SinkCapabilities {
    let upper = response.to_ascii_uppercase();
    let mut caps = SinkCapabilities::default();

    if upper.contains("HDR") {
        caps.hdr_capable = true;
        caps.supported_formats.push("HDR10".to_string());
    }
    if upper.contains("HLG") {
        caps.supported_formats.push("HLG".to_string());
    }
    if mentions_dolby_vision(&upper) {
        caps.dv_capable = true;
        caps.supported_formats.push("Dolby Vision".to_string());
    }
    if upper.contains("VRR") {
        caps.vrr_capable = true;
    }
    caps.max_resolution = upper
        .split_whitespace()
        .find_map(match_resolution)
        .map(|r| format!("{}x{}", r.width, r.height));

    caps
}
