//! Pure mappings from named option values to their wire encodings.
//!
//! Every enumerated option crosses the positional ABI as an integer code and
//! every tuple-shaped option as a fixed-length row-major array. The mappings
//! live here, in one place, so each one is individually testable and the
//! marshalling code in `store` stays a straight field-by-field walk.

/// Codestream progression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progression {
    Lrcp,
    Rlcp,
    Rpcl,
    Pcrl,
    Cprl,
}

impl Progression {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LRCP" => Some(Self::Lrcp),
            "RLCP" => Some(Self::Rlcp),
            "RPCL" => Some(Self::Rpcl),
            "PCRL" => Some(Self::Pcrl),
            "CPRL" => Some(Self::Cprl),
            _ => None,
        }
    }

    pub fn wire_code(self) -> i64 {
        match self {
            Self::Lrcp => 0,
            Self::Rlcp => 1,
            Self::Rpcl => 2,
            Self::Pcrl => 3,
            Self::Cprl => 4,
        }
    }
}

/// Stream container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    Unknown,
    J2k,
    Jp2,
}

impl StreamFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unknown" => Some(Self::Unknown),
            "j2k" => Some(Self::J2k),
            "jp2" => Some(Self::Jp2),
            _ => None,
        }
    }

    pub fn wire_code(self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::J2k => 1,
            Self::Jp2 => 2,
        }
    }
}

/// Conformance profile constraining the encoder output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    None,
    Cinema2k,
    Cinema4k,
    Broadcast,
    Imf,
}

impl Profile {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "cinema2k" => Some(Self::Cinema2k),
            "cinema4k" => Some(Self::Cinema4k),
            "broadcast" => Some(Self::Broadcast),
            "imf" => Some(Self::Imf),
            _ => None,
        }
    }

    pub fn wire_code(self) -> i64 {
        match self {
            Self::None => 0x0000,
            Self::Cinema2k => 0x0003,
            Self::Cinema4k => 0x0004,
            Self::Broadcast => 0x0100,
            Self::Imf => 0x0400,
        }
    }
}

/// Rate-control algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControlAlg {
    Bisect,
    PcrdOpt,
}

impl RateControlAlg {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bisect" => Some(Self::Bisect),
            "pcrd_opt" => Some(Self::PcrdOpt),
            _ => None,
        }
    }

    pub fn wire_code(self) -> i64 {
        match self {
            Self::Bisect => 0,
            Self::PcrdOpt => 1,
        }
    }
}

/// Interpretation of the quality layer targets. An empty `quality_mode`
/// option string means no quality specification (lossless unless the
/// irreversible flag is set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityMode {
    Rates,
    Psnr,
}

impl QualityMode {
    /// `""` parses to `None`: no quality specification.
    pub fn parse(s: &str) -> Option<Option<Self>> {
        match s {
            "" => Some(None),
            "rates" => Some(Some(Self::Rates)),
            "dB" => Some(Some(Self::Psnr)),
            _ => None,
        }
    }

    pub fn wire_str(self) -> &'static str {
        match self {
            Self::Rates => "rates",
            Self::Psnr => "dB",
        }
    }
}

/// Flatten a 2-tuple option into its row-major wire array.
pub fn pair(p: (i64, i64)) -> Vec<i64> {
    vec![p.0, p.1]
}
