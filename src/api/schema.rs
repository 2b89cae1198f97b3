//! Request/response DTOs for the `/v1/` HTTP surface. Concrete
//! `serde::Deserialize` structs stand in for the JSON-Schema validation
//! described in spec.md §9 — `#[serde(deny_unknown_fields)]` wherever
//! the route's schema says `"additionalProperties": false`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    #[serde(rename = "authRequest")]
    pub auth_request: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDatastoreRequest {
    pub datastore_info: DatastoreInfo,
    pub datastore_sigs: String,
    pub root_tombstones: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatastoreInfo {
    pub id: String,
    pub pubkey: String,
    pub root_uuid: Uuid,
    pub drivers: Vec<String>,
    pub device_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct StoreIdQuery {
    pub blockchain_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct DeviceRootQuery {
    pub this_device_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteFileRequest {
    pub header: WriteFileHeader,
    pub payload_b64: String,
    pub signature: String,
    pub datastore_str: String,
    pub datastore_sig: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteFileHeader {
    pub name: String,
    pub timestamp: u64,
    pub writer_device_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplaceDeviceRootRequest {
    pub device_root: crate::datastore::types::DeviceRootPage,
}

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    #[serde(default)]
    pub sync: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteFileRequest {
    pub tombstones: Vec<crate::datastore::types::SignedTombstone>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteDatastoreRequest {
    pub datastore_tombstones: Vec<crate::datastore::types::SignedTombstone>,
    pub root_tombstones: Vec<crate::datastore::types::SignedTombstone>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceIdsQuery {
    pub device_ids: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub errno: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub since: Option<u64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTransaction {
    pub tx: String,
}
