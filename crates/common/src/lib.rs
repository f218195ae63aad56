//! Envelope encryption, data key service clients, wire types and sample
//! records shared by the pipeline test utilities.

pub mod crypto;
pub mod dks;
pub mod envelope;
pub mod fixture;
pub mod protocol;
pub mod telemetry;

pub use crypto::{CipherError, KeyEncoding, PlaintextKey};
pub use dks::{DataKey, KeyService, KeyServiceError};
pub use protocol::EnvelopeMetadata;
