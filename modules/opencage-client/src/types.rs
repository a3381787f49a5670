use serde::Deserialize;

/// `GET /geocode/v1/json` envelope. Only the fields the resolver reads.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResponse {
    #[serde(default)]
    pub results: Vec<GeocodeResult>,
    pub status: Option<ResponseStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeResult {
    pub geometry: Geometry,
    pub formatted: Option<String>,
    pub confidence: Option<u8>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Geometry {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseStatus {
    pub code: u16,
    pub message: String,
}
