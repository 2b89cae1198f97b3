//! Cryptographic primitives for the gateway.
//!
//! Three concerns live here: content hashing (`hash`), secp256k1 key
//! handling and datastore-id derivation (`keys`), and the self-signed
//! JWT codec used by the session manager (`jwt`).

pub mod hash;
pub mod jwt;
pub mod keys;
pub mod session_token;

pub use hash::{data_hash, hash160, verify_data_hash};
pub use keys::{compress_pubkey, KeyPair};
pub use session_token::MasterDataKey;
