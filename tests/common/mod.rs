#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use geo_types::Geometry;
use serde_json::{json, Value};

use copernicus_odata::error::Result;
use copernicus_odata::geometry::{GeoEngine, GeometryEngine};
use copernicus_odata::transport::{HttpResponse, HttpTransport, TransportError};

pub type Params = Vec<(String, String)>;
type Handler = Box<dyn Fn(&[(String, String)]) -> std::result::Result<HttpResponse, TransportError> + Send + Sync>;

/// In-memory transport recording every request it receives.
pub struct FakeTransport {
    handler: Handler,
    calls: Mutex<Vec<Params>>,
}

impl FakeTransport {
    pub fn new(
        handler: impl Fn(&[(String, String)]) -> std::result::Result<HttpResponse, TransportError>
            + Send
            + Sync
            + 'static,
    ) -> Arc<Self> {
        Arc::new(FakeTransport { handler: Box::new(handler), calls: Mutex::new(Vec::new()) })
    }

    /// Answers with `responses` in order, then with HTTP 500.
    pub fn scripted(responses: Vec<std::result::Result<HttpResponse, TransportError>>) -> Arc<Self> {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse { status: 500, body: "script exhausted".to_string() }))
        })
    }

    /// Behaves like the catalogue for `products`: honours `$skip`, `$top` and `Name eq` filters.
    /// Names containing whitespace are rejected with HTTP 400.
    pub fn catalog(products: Vec<Value>) -> Arc<Self> {
        Self::new(move |params| {
            let filter = param(params, "$filter").unwrap_or_default();
            let matching: Vec<Value> = match filter.strip_prefix("Name eq '") {
                Some(rest) => {
                    let name = rest.trim_end_matches('\'').replace("''", "'");
                    if name.is_empty() || name.chars().any(char::is_whitespace) {
                        return Ok(HttpResponse {
                            status: 400,
                            body: r#"{"detail":"Invalid filter expression"}"#.to_string(),
                        });
                    }
                    products.iter().filter(|p| p["Name"] == name.as_str()).cloned().collect()
                }
                None => products.clone(),
            };
            let skip: usize = param(params, "$skip").and_then(|s| s.parse().ok()).unwrap_or(0);
            let top: usize = param(params, "$top").and_then(|s| s.parse().ok()).unwrap_or(20);
            let page: Vec<Value> = matching.iter().skip(skip).take(top).cloned().collect();
            Ok(ok_json(&json!({
                "@odata.context": "$metadata#Products",
                "@odata.count": matching.len(),
                "value": page,
            })))
        })
    }

    pub fn calls(&self) -> Vec<Params> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl HttpTransport for FakeTransport {
    fn get(
        &self,
        _url: &str,
        params: &[(String, String)],
        _timeout: Duration,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(params.to_vec());
        (self.handler)(params)
    }
}

pub fn param(params: &[(String, String)], key: &str) -> Option<String> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

pub fn ok_json(value: &Value) -> HttpResponse {
    HttpResponse { status: 200, body: value.to_string() }
}

pub fn status(code: u16) -> HttpResponse {
    HttpResponse { status: code, body: format!("{{\"detail\":\"status {code}\"}}") }
}

/// Keeps coordinates as they are, so areas are plain planar areas of the input.
pub struct PlanarEngine;

impl GeometryEngine for PlanarEngine {
    fn reproject(&self, geometry: &Geometry<f64>, _source_epsg: u16, _target_epsg: u16) -> Result<Geometry<f64>> {
        Ok(geometry.clone())
    }

    fn union(&self, geometries: &[Geometry<f64>]) -> Result<Geometry<f64>> {
        GeoEngine.union(geometries)
    }
}

pub fn planar() -> Arc<dyn GeometryEngine> {
    Arc::new(PlanarEngine)
}

pub fn square_wkt(x0: f64, y0: f64, x1: f64, y1: f64) -> String {
    format!("POLYGON (({x0} {y0}, {x1} {y0}, {x1} {y1}, {x0} {y1}, {x0} {y0}))")
}

/// A catalogue record with the usual fields filled in.
pub fn product(id: &str, name: &str, footprint: Option<&str>) -> Value {
    let mut record = json!({
        "@odata.mediaContentType": "application/octet-stream",
        "Id": id,
        "Name": name,
        "ContentType": "application/octet-stream",
        "ContentLength": 1_073_741_824u64,
        "OriginDate": "2023-07-06T12:01:02.123Z",
        "PublicationDate": "2023-07-06T13:45:10.5Z",
        "ModificationDate": "2023-07-06T13:45:20.000Z",
        "Online": true,
        "EvictionDate": "",
        "S3Path": format!("/eodata/Sentinel-2/MSI/L2A/2023/07/06/{name}"),
        "Checksum": [
            {"Value": "0123456789abcdef", "Algorithm": "MD5", "ChecksumDate": "2023-07-06T13:40:00.000Z"},
            {"Value": "fedcba9876543210", "Algorithm": "BLAKE3", "ChecksumDate": "2023-07-06T13:40:01.000Z"}
        ],
        "ContentDate": {"Start": "2023-07-06T10:36:31.024Z", "End": "2023-07-06T10:36:31.024Z"},
        "Attributes": [
            {"@odata.type": "#OData.CSC.DoubleAttribute", "Name": "cloudCover", "Value": 12.5, "ValueType": "Double"},
            {"@odata.type": "#OData.CSC.StringAttribute", "Name": "productType", "Value": "S2MSI2A", "ValueType": "String"}
        ]
    });
    if let Some(wkt) = footprint {
        record["Footprint"] = Value::String(format!("geography'SRID=4326;{wkt}'"));
    }
    record
}

pub fn s2_name(index: usize) -> String {
    format!("S2A_MSIL2A_20230706T1036{index:02}_N0509_R008_T32UNE_20230706T170032.SAFE")
}
