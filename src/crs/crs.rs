use std::{fmt, sync::LazyLock};

use proj4rs::proj::Proj;
use regex::Regex;

use crate::error::SapError;

static EPSG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:epsg|urn:ogc:def:crs:epsg:[0-9.]*):(\d+)$").expect("valid EPSG pattern")
});

static CRS84_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:ogc:crs84|urn:ogc:def:crs:ogc:[0-9.]*:crs84)$").expect("valid CRS84 pattern")
});

/// A coordinate reference system, known by EPSG code or by a raw PROJ.4 definition.
#[derive(Debug, Clone)]
pub struct Crs {
    name: String,
    epsg: Option<u32>,
    proj4: String,
}

impl Crs {
    /// Parse `epsg:NNNN`, an OGC URN, `OGC:CRS84`, or a `+proj=...` definition.
    pub fn parse(input: &str) -> Result<Self, SapError> {
        let s = input.trim();

        if let Some(caps) = EPSG_PATTERN.captures(s) {
            let code = caps[1].parse::<u32>()
                .map_err(|_| SapError::config(format!("EPSG code out of range: {input}")))?;
            return Self::from_epsg(code);
        }
        if CRS84_PATTERN.is_match(s) {
            return Self::from_epsg(4326);
        }
        if s.starts_with('+') {
            Proj::from_proj_string(s)
                .map_err(|e| SapError::config(format!("malformed PROJ.4 string {s:?}: {e:?}")))?;
            return Ok(Self { name: s.to_string(), epsg: None, proj4: s.to_string() });
        }

        Err(SapError::config(format!("unrecognised CRS string: {input:?}")))
    }

    /// Look up a supported EPSG code.
    pub fn from_epsg(code: u32) -> Result<Self, SapError> {
        let proj4 = epsg_proj4(code)
            .ok_or_else(|| SapError::config(format!("unsupported EPSG code: {code}")))?;
        Ok(Self { name: format!("EPSG:{code}"), epsg: Some(code), proj4 })
    }

    /// WGS84 lon/lat, the fallback for sources that do not declare a CRS.
    pub fn wgs84() -> Self {
        Self { name: "EPSG:4326".into(), epsg: Some(4326), proj4: LONGLAT_WGS84.into() }
    }

    #[inline] pub fn name(&self) -> &str { &self.name }

    #[inline] pub fn epsg(&self) -> Option<u32> { self.epsg }

    #[inline] pub fn proj4(&self) -> &str { &self.proj4 }

    /// Lon/lat in degrees rather than projected units.
    #[inline]
    pub fn is_geographic(&self) -> bool {
        self.proj4.contains("+proj=longlat") || self.proj4.contains("+proj=latlong")
    }

    /// Build the proj4rs definition for this CRS.
    pub(crate) fn to_proj(&self) -> Result<Proj, SapError> {
        Proj::from_proj_string(&self.proj4)
            .map_err(|e| SapError::config(format!("failed to build PROJ.4 for {}: {e:?}", self.name)))
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        match (self.epsg, other.epsg) {
            (Some(a), Some(b)) => a == b,
            _ => self.proj4 == other.proj4,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.name) }
}

const LONGLAT_WGS84: &str = "+proj=longlat +datum=WGS84 +no_defs +type=crs";

/// PROJ.4 definitions for the EPSG codes this crate understands.
fn epsg_proj4(code: u32) -> Option<String> {
    let proj4 = match code {
        4326 => LONGLAT_WGS84.to_string(),
        4269 => "+proj=longlat +datum=NAD83 +no_defs +type=crs".to_string(),
        4258 => "+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs +type=crs".to_string(),
        3857 | 900913 => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs +type=crs".to_string(),
        3310 => "+proj=aea +lat_0=0 +lon_0=-120 +lat_1=34 +lat_2=40.5 +x_0=0 +y_0=-4000000 +datum=NAD83 +units=m +no_defs +type=crs".to_string(),
        3035 => "+proj=laea +lat_0=52 +lon_0=10 +x_0=4321000 +y_0=3210000 +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs +type=crs".to_string(),
        // WGS84 / UTM north and south
        32601..=32660 => format!("+proj=utm +zone={} +datum=WGS84 +units=m +no_defs +type=crs", code - 32600),
        32701..=32760 => format!("+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs +type=crs", code - 32700),
        // NAD83 / UTM north
        26901..=26923 => format!("+proj=utm +zone={} +datum=NAD83 +units=m +no_defs +type=crs", code - 26900),
        _ => return None,
    };
    Some(proj4)
}
