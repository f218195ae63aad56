//! Sample `addressDeclaration` database objects used as test payloads.

use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Where the identifier-like fields of a sample record come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuidSource {
    /// Every identifier is the same literal text.
    Literal(String),
    /// Every identifier is a fresh random UUID.
    Random,
}

impl GuidSource {
    /// Produce the next identifier.
    pub fn next_guid(&self) -> String {
        match self {
            GuidSource::Literal(text) => text.clone(),
            GuidSource::Random => Uuid::new_v4().to_string(),
        }
    }
}

/// Build a sample address declaration with the given `_id` object.
///
/// `contractId`, `addressNumber.cryptoId`, `townCity.cryptoId` and `processId`
/// are drawn from `guids`; everything else is fixed.
pub fn address_declaration(id: Map<String, Value>, guids: &GuidSource) -> Value {
    json!({
        "_id": Value::Object(id),
        "type": "addressDeclaration",
        "contractId": guids.next_guid(),
        "addressNumber": {
            "type": "AddressLine",
            "cryptoId": guids.next_guid()
        },
        "addressLine2": null,
        "townCity": {
            "type": "AddressLine",
            "cryptoId": guids.next_guid()
        },
        "postcode": "SM5 2LE",
        "processId": guids.next_guid(),
        "effectiveDate": {
            "type": "SPECIFIC_EFFECTIVE_DATE",
            "date": 20150320,
            "knownDate": 20150320
        },
        "paymentEffectiveDate": {
            "type": "SPECIFIC_EFFECTIVE_DATE",
            "date": 20150320,
            "knownDate": 20150320
        },
        "createdDateTime": {
            "$date": "2015-03-20T12:23:25.183Z"
        },
        "_version": 2,
        "_lastModifiedDateTime": {
            "$date": "2018-12-14T15:01:02.000+0000"
        }
    })
}

/// Build a single-entry `_id` object.
pub fn id_object(key: &str, value: impl Into<Value>) -> Map<String, Value> {
    let mut id = Map::new();
    id.insert(key.to_owned(), value.into());
    id
}
