// Gateway
//
// A local, authenticated gateway mediating between co-located client
// applications and a decentralized naming and data fabric. It exposes a
// small HTTP API under `/v1/` for session issuance, datastore
// read/write/merge, name lookups, and blockchain queries, while hiding
// the details of which storage drivers and which naming backend are in
// use behind a stable interface.
//
// # Architecture
//
// * **API layer** (`api`): the listener and dispatcher — request
//   routing, auth middleware, CORS preflight, response shaping.
// * **Auth** (`auth`): master-password and session-token verification,
//   capability and origin enforcement.
// * **Datastore** (`datastore`): device root pages, the merged root
//   directory, file headers, tombstones, and the read/write pipelines
//   that enforce them.
// * **Drivers** (`drivers`): the pluggable storage backends datastore
//   operations read from and write through.
// * **Registrar** (`registrar`): the asynchronous queue for naming
//   operations that cannot complete synchronously.
// * **Blockchain** (`blockchain`): a thin, retrying proxy to an external
//   chain-query backend.
// * **Crypto** (`crypto`): content hashing, secp256k1 keys, and the
//   signed-token codec used by sessions and datastore writes.
//
// # Modules Overview

/// HTTP API: the listener, the dispatcher, and the `/v1/` route groups.
///
/// Builds the `axum::Router`, attaches the auth middleware and CORS
/// layer, and wires each route group to the underlying gateway state.
pub mod api;

/// Session and capability verification.
///
/// Covers the master-password check used by `GET /auth`, session-token
/// verification on every subsequent request, and origin/capability
/// enforcement against a session's granted scopes.
pub mod auth;

/// Blockchain query proxy.
///
/// Forwards name/address/transaction lookups to an external chain-query
/// backend over HTTP, with bounded retries and address re-encoding.
pub mod blockchain;

/// Gateway configuration.
///
/// Layered config-file-then-environment loading, following the pattern
/// used throughout this crate's ambient stack: a typed struct with
/// serde defaults, overridable by a handful of well-known environment
/// variables for secrets and bind address.
pub mod config;

/// Cryptographic primitives for the gateway.
///
/// Content hashing (`crypto::hash`), secp256k1 key handling
/// (`crypto::keys`), and the self-signed token codec (`crypto::jwt`,
/// `crypto::session_token`) used by the session manager and datastore
/// signatures.
pub mod crypto;

/// Datastore core: device root pages, the merged root directory, file
/// headers, tombstones, and the read/write pipelines.
///
/// # Features
///
/// * Deterministic merge of per-device root pages into one directory
/// * Content-addressed file headers verified against their payload hash
/// * Signed tombstones for deletion that survive the merge
/// * A write-ahead queue for device-root updates
pub mod datastore;

/// Error types for the gateway.
///
/// # Error Categories
///
/// * Request errors (malformed input, bad public keys)
/// * Auth errors (bad session, bad signature, capability mismatch)
/// * Storage errors (not found, conflict, upstream driver failure)
/// * Internal errors (everything else)
pub mod error;

/// Pluggable storage drivers and the registry that orders them.
pub mod drivers;

/// Structured operation logging for the gateway.
///
/// Tracks client-facing operations (auth, reads, writes, deletes) with
/// enough context to answer "what did this gateway do and when" without
/// reaching for an external log aggregator.
pub mod logging;

/// Registrar proxy: the queue for naming operations that cannot
/// complete synchronously within a request.
pub mod registrar;
