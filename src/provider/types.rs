//! Addresses, query descriptors, and payload/response shapes for the
//! enrichment provider.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::{ErrorContext, ProviderError};

/// A candidate residential address. The four fields are the caching identity
/// of every enrichment lookup, so the struct is immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    pub street: String,
    #[serde(rename = "buildingNumber")]
    pub building_number: String,
    #[serde(rename = "code")]
    pub postal_code: String,
}

impl Address {
    pub fn new(
        city: impl Into<String>,
        street: impl Into<String>,
        building_number: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        Self {
            city: city.into(),
            street: street.into(),
            building_number: building_number.into(),
            postal_code: postal_code.into(),
        }
    }

    /// Required-field validation at the client boundary.
    pub fn validate(&self) -> Result<(), ProviderError> {
        for (field, value) in [
            ("city", &self.city),
            ("street", &self.street),
            ("buildingNumber", &self.building_number),
            ("code", &self.postal_code),
        ] {
            if value.trim().is_empty() {
                return Err(ProviderError::InvalidAddress(format!(
                    "missing required field `{field}`"
                )));
            }
        }
        Ok(())
    }

    /// Human-readable label, e.g. `Dobra 42, Łódź`.
    pub fn label(&self) -> String {
        format!("{} {}, {}", self.street, self.building_number, self.city)
    }
}

/// One remote operation from the provider's fixed catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    /// Distance in metres to the nearest point of interest of a type.
    NearestPoi(&'static str),
    /// Count of points of interest of a type around the address.
    PoiCount(&'static str),
    /// Share of population in a demographic bucket.
    Demographic(&'static str),
    /// Wealth index component.
    Wealth(&'static str),
    /// Provider's aggregate 0-100 location score.
    Geoscore,
    /// Grid statistic (safety grid, green-space share, market concentration).
    AreaStatistic(&'static str),
    /// Coordinates derived from the grid-statistic response.
    Coordinates,
}

/// The section whose grid response carries the input coordinates. Shares a
/// payload with the market-concentration statistic, so both unpack from one
/// cached response.
const COORDS_SECTION: &str = "SR_CR3_KREDYTOBIORCY";

impl Query {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::NearestPoi(_) => "bik-api-4/punkty-zainteresowania-adres",
            Self::PoiCount(_) => "bik-api-4/liczba-poi-adres",
            Self::Demographic(_) => "bik-api-4/dane-demograficzne-adres",
            Self::Wealth(_) => "bik-api-4/zamoznosc-adres",
            Self::Geoscore => "bik-api-5/geoscore-adres",
            Self::AreaStatistic(_) | Self::Coordinates => "bik-api-6/address",
        }
    }

    /// Request payload: `{size, address, <query discriminator>}`.
    pub fn payload(&self, address: &Address) -> Value {
        match self {
            Self::NearestPoi(code) => json!({
                "size": "100",
                "address": address,
                "nearestPOI": code,
            }),
            Self::PoiCount(code) => json!({
                "size": "500",
                "address": address,
                "poinumber": code,
            }),
            Self::Demographic(code) => json!({
                "size": "100",
                "address": address,
                "demographicData": code,
            }),
            Self::Wealth(code) => json!({
                "size": "100",
                "address": address,
                "wealth": code,
            }),
            Self::Geoscore => json!({
                "size": "100",
                "address": address,
            }),
            Self::AreaStatistic(section) => json!({
                "size": "STAT_250M",
                "productCode": "ALL",
                "address": address,
                "section": section,
            }),
            Self::Coordinates => Self::AreaStatistic(COORDS_SECTION).payload(address),
        }
    }

    /// Unpack the provider's JSON into the value the catalog needs.
    pub fn unpack(&self, response: &Value) -> Result<RawValue, ProviderError> {
        let scalar = |value: Option<&Value>, what: &str| {
            value
                .and_then(Value::as_f64)
                .map(RawValue::Scalar)
                .ok_or_else(|| self.shape_error(what))
        };
        match self {
            Self::NearestPoi(code) => {
                scalar(response.pointer(&format!("/nearestPOI/{code}")), code)
            }
            Self::PoiCount(code) => scalar(response.pointer(&format!("/poinumber/{code}")), code),
            Self::Demographic(code) => {
                scalar(response.pointer(&format!("/demographicData/{code}")), code)
            }
            Self::Wealth(code) => scalar(response.pointer(&format!("/wealth/{code}")), code),
            Self::Geoscore => scalar(response.get("score"), "score"),
            Self::AreaStatistic(_) => scalar(response.pointer("/geostats/0/result"), "result"),
            Self::Coordinates => {
                let coords = response
                    .pointer("/geostats/0/inputDataCoordinates")
                    .ok_or_else(|| self.shape_error("inputDataCoordinates"))?;
                let x = coords.get("utm_x").and_then(Value::as_f64);
                let y = coords.get("utm_y").and_then(Value::as_f64);
                match (x, y) {
                    (Some(x), Some(y)) => Ok(RawValue::Coords(x, y)),
                    _ => Err(self.shape_error("utm_x/utm_y")),
                }
            }
        }
    }

    fn shape_error(&self, what: &str) -> ProviderError {
        ProviderError::invalid_response(
            format!("missing `{what}` in response"),
            ErrorContext::new().with_endpoint(self.endpoint()),
        )
    }
}

/// A raw measurement unpacked from a provider response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    Scalar(f64),
    Coords(f64, f64),
}

impl RawValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::Coords(_, _) => None,
        }
    }
}
