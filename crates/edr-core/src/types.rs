use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Marker shown for any event field the portal did not send.
pub const NOT_AVAILABLE: &str = "N/A";

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

/// Portal fields arrive as strings, numbers or booleans depending on the endpoint.
/// Everything is kept as display text; `null` becomes `fallback`.
fn text_or(value: Option<Value>, fallback: &str) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => if b { "Y" } else { "N" }.to_string(),
        Some(Value::Null) | None => fallback.to_string(),
        Some(other) => other.to_string(),
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(text_or(Option::<Value>::deserialize(deserializer)?, NOT_AVAILABLE))
}

fn lenient_item_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(text_or(Option::<Value>::deserialize(deserializer)?, ""))
}

fn lenient_items<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ItemRecord>, D::Error> {
    Ok(Option::<Vec<ItemRecord>>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_instructions<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Instructions, D::Error> {
    Ok(Option::<Instructions>::deserialize(deserializer)?.unwrap_or_default())
}

/// Opaque bearer token proving an authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn bearer(&self) -> &str {
        &self.0
    }

    /// First characters of the token, safe for display
    pub fn preview(&self) -> String {
        let prefix: String = self.0.chars().take(8).collect();
        format!("{prefix}…")
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "demoId", default = "not_available", deserialize_with = "lenient_text")]
    pub event_id: String,
    #[serde(rename = "demoName", default = "not_available", deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(
        rename = "demoClassCode",
        default = "not_available",
        deserialize_with = "lenient_text"
    )]
    pub type_code: String,
    #[serde(
        rename = "demoStatusCode",
        default = "not_available",
        deserialize_with = "lenient_text"
    )]
    pub status_code: String,
    #[serde(rename = "demoDate", default = "not_available", deserialize_with = "lenient_text")]
    pub date: String,
    #[serde(
        rename = "demoLockInd",
        default = "not_available",
        deserialize_with = "lenient_text"
    )]
    pub locked: String,
    #[serde(
        rename = "demoInstructions",
        default,
        deserialize_with = "lenient_instructions"
    )]
    pub instructions: Instructions,
    #[serde(rename = "itemDetails", default, deserialize_with = "lenient_items")]
    pub items: Vec<ItemRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructions {
    #[serde(
        rename = "demoPrepnTxt",
        default = "not_available",
        deserialize_with = "lenient_text"
    )]
    pub preparation: String,
    #[serde(
        rename = "demoPortnTxt",
        default = "not_available",
        deserialize_with = "lenient_text"
    )]
    pub portion: String,
}

impl Default for Instructions {
    fn default() -> Self {
        Self {
            preparation: not_available(),
            portion: not_available(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(rename = "itemNbr", default, deserialize_with = "lenient_item_text")]
    pub item_number: String,
    #[serde(rename = "gtin", default, deserialize_with = "lenient_item_text")]
    pub primary_item_number: String,
    #[serde(rename = "itemDesc", default, deserialize_with = "lenient_item_text")]
    pub description: String,
    #[serde(rename = "vendorNbr", default, deserialize_with = "lenient_item_text")]
    pub vendor: String,
    #[serde(rename = "deptNbr", default, deserialize_with = "lenient_item_text")]
    pub department: String,
}

/// One row of the browse listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    #[serde(rename = "demoId", default = "not_available", deserialize_with = "lenient_text")]
    pub event_id: String,
    #[serde(rename = "demoName", default = "not_available", deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(rename = "demoDate", default = "not_available", deserialize_with = "lenient_text")]
    pub date: String,
    #[serde(
        rename = "demoClassCode",
        default = "not_available",
        deserialize_with = "lenient_text"
    )]
    pub type_code: String,
    #[serde(
        rename = "demoStatusCode",
        default = "not_available",
        deserialize_with = "lenient_text"
    )]
    pub status_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_payload_parses() {
        let record: EventRecord = serde_json::from_str(
            r#"{
                "demoId": "606034",
                "demoName": "Test Food Demo Event",
                "demoClassCode": "45",
                "demoStatusCode": "2",
                "demoDate": "2025-07-22",
                "demoLockInd": "N",
                "demoInstructions": {
                    "demoPrepnTxt": "Test preparation instructions",
                    "demoPortnTxt": "Test portion instructions"
                },
                "itemDetails": [
                    {"itemNbr": "12345", "gtin": "67890", "itemDesc": "Test Product",
                     "vendorNbr": "123", "deptNbr": "456"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(record.event_id, "606034");
        assert_eq!(record.type_code, "45");
        assert_eq!(record.instructions.portion, "Test portion instructions");
        assert_eq!(record.items.len(), 1);
        assert_eq!(record.items[0].primary_item_number, "67890");
    }

    #[test]
    fn missing_fields_become_not_available() {
        let record: EventRecord = serde_json::from_str(r#"{"demoId": "1"}"#).unwrap();
        assert_eq!(record.event_id, "1");
        assert_eq!(record.name, NOT_AVAILABLE);
        assert_eq!(record.status_code, NOT_AVAILABLE);
        assert_eq!(record.instructions.preparation, NOT_AVAILABLE);
        assert!(record.items.is_empty());
    }

    #[test]
    fn nulls_and_numbers_are_tolerated() {
        let record: EventRecord = serde_json::from_str(
            r#"{"demoId": 606034, "demoClassCode": 45, "demoName": null,
                "demoLockInd": true, "demoInstructions": null, "itemDetails": null}"#,
        )
        .unwrap();
        assert_eq!(record.event_id, "606034");
        assert_eq!(record.type_code, "45");
        assert_eq!(record.name, NOT_AVAILABLE);
        assert_eq!(record.locked, "Y");
        assert_eq!(record.instructions, Instructions::default());
        assert!(record.items.is_empty());
    }

    #[test]
    fn item_fields_default_to_empty() {
        let item: ItemRecord = serde_json::from_str(r#"{"itemNbr": 7}"#).unwrap();
        assert_eq!(item.item_number, "7");
        assert_eq!(item.description, "");
    }

    #[test]
    fn credential_never_prints_token() {
        let credential = Credential::new("secret-token-value");
        assert_eq!(format!("{credential:?}"), "Credential(<redacted>)");
        assert_eq!(credential.preview(), "secret-t…");
        assert_eq!(credential.bearer(), "secret-token-value");
    }
}
