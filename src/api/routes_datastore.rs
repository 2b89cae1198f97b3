//! Datastore core handlers (spec.md §4.4), mounted under `/v1/stores`.

use std::collections::HashMap;

use axum::extract::{Extension, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use base64::Engine;

use crate::crypto::hash::data_hash;
use crate::crypto::keys::{parse_pubkey_hex, verify_digest};
use crate::datastore::read::{apply_range, ByteRange};
use crate::datastore::types::{Datastore, DeviceRootPage, FileHeader, Session};
use crate::datastore::{datastore_id_for_pubkey, read, write};
use crate::error::{GatewayError, Result};

use super::schema::{
    CreateDatastoreRequest, DeleteDatastoreRequest, DeleteFileRequest, DeviceIdsQuery,
    DeviceRootQuery, PathQuery, ReplaceDeviceRootRequest, StoreIdQuery, SyncQuery,
    WriteFileRequest,
};
use super::AppState;

const B64: base64::engine::general_purpose::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// A tombstone's `fq_id` is `"{device_id}:{datastore_id}/{suffix}"`;
/// pull the datastore id back out of it the way `original_source`'s
/// `_delete_signed_datastore` derives it from the parsed tombstone's
/// `fq_data_id` rather than trusting anything else in the request.
fn datastore_id_from_fq_id(fq_id: &str) -> Option<&str> {
    let (_, rest) = fq_id.split_once(':')?;
    let (datastore_id, _) = rest.split_once('/')?;
    Some(datastore_id)
}

fn verify_signature_hex(payload: &[u8], signature_hex: &str, pubkey_hex: &str) -> Result<()> {
    let signature_bytes = hex::decode(signature_hex)
        .map_err(|e| GatewayError::InvalidRequest(format!("bad signature hex: {e}")))?;
    let signature = secp256k1::ecdsa::Signature::from_compact(&signature_bytes)
        .map_err(|e| GatewayError::InvalidRequest(format!("malformed signature: {e}")))?;
    let pubkey = parse_pubkey_hex(pubkey_hex)?;
    let digest = blake3::hash(payload).into();
    if verify_digest(&digest, &signature, &pubkey) {
        Ok(())
    } else {
        Err(GatewayError::auth_failed("signature verification failed"))
    }
}

pub async fn create_datastore(
    State(state): State<AppState>,
    Extension(_session): Extension<Session>,
    Json(request): Json<CreateDatastoreRequest>,
) -> Result<Json<Datastore>> {
    let info = request.datastore_info;
    let expected_id = datastore_id_for_pubkey(&info.pubkey)?;
    if info.id != expected_id {
        return Err(GatewayError::InvalidRequest(
            "datastore id does not match hash of pubkey".to_string(),
        ));
    }
    let payload = serde_json::to_vec(&info)?;
    verify_signature_hex(&payload, &request.datastore_sigs, &info.pubkey)?;

    let datastore = Datastore {
        id: info.id,
        pubkey: info.pubkey,
        root_uuid: info.root_uuid,
        drivers: info.drivers,
        device_ids: info.device_ids,
    };
    state.datastore.create_datastore(&datastore).await?;
    Ok(Json(datastore))
}

pub async fn delete_datastore(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(device_ids_query): Query<DeviceIdsQuery>,
    Json(request): Json<DeleteDatastoreRequest>,
) -> Result<()> {
    let required_devices: Vec<&str> = device_ids_query.device_ids.split(',').collect();

    let mut datastore_id = None;
    let mut verified = false;
    for device_key in session.device_public_keys() {
        let mut ok = true;
        let mut covered = Vec::new();
        for tombstone in request
            .datastore_tombstones
            .iter()
            .chain(request.root_tombstones.iter())
        {
            let plaintext = tombstone.to_plaintext();
            if verify_signature_hex(plaintext.as_bytes(), &tombstone.signature, device_key).is_err() {
                ok = false;
                break;
            }
            if let Some((fq_id, _)) = crate::datastore::types::SignedTombstone::parse_plaintext(&plaintext) {
                covered.push(fq_id);
            }
        }
        if ok && required_devices.iter().all(|d| covered.iter().any(|c| c.contains(d))) {
            if let Some(id) = covered.iter().find_map(|fq_id| datastore_id_from_fq_id(fq_id)) {
                verified = true;
                datastore_id = Some(id.to_string());
                break;
            }
        }
    }
    if !verified {
        return Err(GatewayError::auth_failed("tombstones do not cover required devices"));
    }
    let id = datastore_id.ok_or_else(|| GatewayError::InvalidRequest("no tombstones supplied".to_string()))?;
    let datastore = state.datastore.read_datastore_record(&id).await?;
    state.datastore.delete_datastore(&datastore).await
}

pub async fn read_datastore(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Query(_query): Query<StoreIdQuery>,
) -> Result<Json<Datastore>> {
    let record = state.datastore.read_datastore_record(&store_id).await?;
    Ok(Json(record))
}

fn device_pubkeys_for(datastore: &Datastore) -> HashMap<String, String> {
    // The datastore record itself only tracks device ids; the owning
    // pubkey is used to verify every device root until per-device keys
    // are published separately (no such publishing path exists yet).
    datastore
        .device_ids
        .iter()
        .map(|id| (id.clone(), datastore.pubkey.clone()))
        .collect()
}

pub async fn read_listing(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
) -> Result<Json<HashMap<String, FileHeader>>> {
    let datastore = state.datastore.read_datastore_record(&store_id).await?;
    let pubkeys = device_pubkeys_for(&datastore);
    let merged = state.datastore.read_merged_root(&store_id, &pubkeys).await?;
    Ok(Json(merged))
}

pub async fn read_device_root(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Query(query): Query<DeviceRootQuery>,
) -> Result<Json<DeviceRootPage>> {
    let datastore = state.datastore.read_datastore_record(&store_id).await?;
    let page = state
        .datastore
        .read_device_root(&store_id, &query.this_device_id, &datastore.pubkey)
        .await?;
    Ok(Json(page))
}

pub async fn write_device_root(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Query(sync_query): Query<SyncQuery>,
    Extension(session): Extension<Session>,
    Json(request): Json<ReplaceDeviceRootRequest>,
) -> Result<()> {
    let page = request.device_root;
    let declared_device = session
        .app_public_keys
        .iter()
        .find(|k| k.device_id == page.device_id)
        .ok_or_else(|| GatewayError::auth_failed("device_id not bound to this session"))?;

    if !crate::datastore::merge::verify_device_root_signature(&page, &declared_device.public_key) {
        return Err(GatewayError::auth_failed("device root signature invalid"));
    }

    let datastore = state.datastore.read_datastore_record(&store_id).await?;
    let sync = sync_query.sync.unwrap_or(1) != 0;
    state
        .datastore
        .write_device_root(&store_id, &datastore.drivers, page, sync)
        .await
}

pub async fn read_header(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Query(query): Query<PathQuery>,
) -> Result<Json<FileHeader>> {
    let datastore = state.datastore.read_datastore_record(&store_id).await?;
    let pubkeys = device_pubkeys_for(&datastore);
    let merged = state.datastore.read_merged_root(&store_id, &pubkeys).await?;
    merged
        .get(&query.path)
        .cloned()
        .map(Json)
        .ok_or_else(|| GatewayError::not_found(format!("no file named {}", query.path)))
}

fn parse_range_header(headers: &HeaderMap) -> Option<ByteRange> {
    let raw = headers.get(header::RANGE)?.to_str().ok()?;
    let spec = raw.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end = if end.is_empty() { None } else { end.parse().ok() };
    Some(ByteRange { start, end })
}

pub async fn read_file(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Query(query): Query<PathQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let datastore = state.datastore.read_datastore_record(&store_id).await?;
    let pubkeys = device_pubkeys_for(&datastore);
    let merged = state.datastore.read_merged_root(&store_id, &pubkeys).await?;
    let header = merged
        .get(&query.path)
        .cloned()
        .ok_or_else(|| GatewayError::not_found(format!("no file named {}", query.path)))?;

    let bytes = state.datastore.read_file_payload(&header).await?;
    let range = parse_range_header(&headers);
    let ranged = read::apply_range(bytes, range)?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::CONTENT_TYPE, "application/octet-stream".parse().unwrap());
    if let Some((start, end)) = ranged.range {
        response_headers.insert(
            header::CONTENT_RANGE,
            format!("bytes {start}-{end}/{}", ranged.total_len).parse().unwrap(),
        );
        Ok((StatusCode::PARTIAL_CONTENT, response_headers, ranged.bytes).into_response())
    } else {
        Ok((StatusCode::OK, response_headers, ranged.bytes).into_response())
    }
}

pub async fn write_file(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Query(query): Query<PathQuery>,
    Extension(session): Extension<Session>,
    Json(request): Json<WriteFileRequest>,
) -> Result<Json<FileHeader>> {
    let datastore = state.datastore.read_datastore_record(&store_id).await?;
    if !datastore.device_ids.contains(&request.header.writer_device_id) {
        return Err(GatewayError::InvalidRequest("unknown writer device".to_string()));
    }

    let declared_device = session
        .app_public_keys
        .iter()
        .find(|k| k.device_id == request.header.writer_device_id)
        .ok_or_else(|| GatewayError::auth_failed("writer device not bound to this session"))?;

    verify_signature_hex(
        request.datastore_str.as_bytes(),
        &request.datastore_sig,
        &declared_device.public_key,
    )?;

    let payload = B64
        .decode(&request.payload_b64)
        .map_err(|e| GatewayError::InvalidRequest(format!("bad base64 payload: {e}")))?;

    let urls = state
        .datastore
        .write_file_payload(
            &store_id,
            &request.header.writer_device_id,
            &query.path,
            &payload,
            &datastore.drivers,
        )
        .await?;

    let header = FileHeader {
        name: query.path,
        data_hash: data_hash(&payload),
        urls,
        timestamp: request.header.timestamp,
        writer_device_id: request.header.writer_device_id,
        signature: request.signature,
    };
    Ok(Json(header))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(store_id): Path<String>,
    Query(query): Query<PathQuery>,
    Extension(session): Extension<Session>,
    Json(request): Json<DeleteFileRequest>,
) -> Result<()> {
    let datastore = state.datastore.read_datastore_record(&store_id).await?;

    let mut writer_device_id = None;
    for tombstone in &request.tombstones {
        let declared = session
            .app_public_keys
            .iter()
            .find(|k| tombstone.fq_id.starts_with(&format!("{}:", k.device_id)))
            .ok_or_else(|| GatewayError::auth_failed("tombstone device not bound to this session"))?;
        verify_signature_hex(tombstone.to_plaintext().as_bytes(), &tombstone.signature, &declared.public_key)?;
        writer_device_id = Some(declared.device_id.clone());
    }
    let writer_device_id =
        writer_device_id.ok_or_else(|| GatewayError::InvalidRequest("no tombstones supplied".to_string()))?;

    state
        .datastore
        .delete_file_payload(&store_id, &writer_device_id, &query.path, &datastore.drivers)
        .await
}
