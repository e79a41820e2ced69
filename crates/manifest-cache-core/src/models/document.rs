use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

static NULL: Value = Value::Null;

/// The full manifest body: table name to table contents.
///
/// Tables are normally objects keyed by definition hash, but the contents
/// are kept as opaque JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestDocument {
    tables: Map<String, Value>,
}

impl ManifestDocument {
    pub fn new(tables: Map<String, Value>) -> Self {
        Self { tables }
    }

    pub fn table(&self, name: &str) -> Option<&Value> {
        self.tables.get(name)
    }

    /// Look up a single definition. Returns `None` if the table is not an
    /// object or has no entry for `hash`.
    ///
    /// Some clients store hashes as signed 32-bit integers; a negative hash
    /// is also tried in its unsigned form.
    pub fn definition(&self, table: &str, hash: &str) -> Option<&Value> {
        let entries = self.tables.get(table)?.as_object()?;
        if let Some(value) = entries.get(hash) {
            return Some(value);
        }
        match hash.parse::<i32>() {
            Ok(signed) if signed < 0 => entries.get(&(signed as u32).to_string()),
            _ => None,
        }
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// One table of a shared manifest. Holds the document rather than a copy of
/// the table, so handing out large tables is cheap.
#[derive(Clone)]
pub struct ManifestTable {
    document: Arc<ManifestDocument>,
    name: String,
}

impl ManifestTable {
    /// `None` if the document has no table called `name`.
    pub fn new(document: Arc<ManifestDocument>, name: &str) -> Option<Self> {
        document.table(name)?;
        Some(Self {
            document,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        self.document.table(&self.name).unwrap_or(&NULL)
    }
}

impl Deref for ManifestTable {
    type Target = Value;

    fn deref(&self) -> &Value {
        self.value()
    }
}

impl PartialEq<Value> for ManifestTable {
    fn eq(&self, other: &Value) -> bool {
        self.value() == other
    }
}

impl Serialize for ManifestTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

impl fmt::Debug for ManifestTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestTable")
            .field("name", &self.name)
            .field("value", self.value())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ManifestDocument {
        serde_json::from_value(json!({
            "DestinyInventoryItemDefinition": {
                "123": {"displayProperties": {"name": "Gjallarhorn"}},
                "3588934839": {"displayProperties": {"name": "Le Monarque"}}
            },
            "DestinyStatDefinition": {},
            "Tables": {"x": 1}
        }))
        .unwrap()
    }

    #[test]
    fn test_table_lookup() {
        let doc = sample();
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.table("Tables"), Some(&json!({"x": 1})));
        assert_eq!(doc.table("DestinyStatDefinition"), Some(&json!({})));
        assert!(doc.table("Missing").is_none());
    }

    #[test]
    fn test_definition_lookup() {
        let doc = sample();
        assert_eq!(
            doc.definition("DestinyInventoryItemDefinition", "123"),
            Some(&json!({"displayProperties": {"name": "Gjallarhorn"}}))
        );
        assert!(doc.definition("DestinyInventoryItemDefinition", "124").is_none());
        assert!(doc.definition("Missing", "123").is_none());
    }

    #[test]
    fn test_definition_lookup_signed_hash() {
        let doc = sample();
        // 3588934839 as a signed 32-bit integer
        let signed = (3588934839u32 as i32).to_string();
        assert_eq!(signed, "-706032457");
        assert_eq!(
            doc.definition("DestinyInventoryItemDefinition", &signed),
            doc.definition("DestinyInventoryItemDefinition", "3588934839")
        );
        assert!(doc.definition("DestinyInventoryItemDefinition", "-1").is_none());
    }

    #[test]
    fn test_non_object_table_has_no_definitions() {
        let doc = sample();
        assert!(doc.definition("Tables", "x").is_some());
        let doc: ManifestDocument = serde_json::from_value(json!({"List": [1, 2]})).unwrap();
        assert!(doc.definition("List", "0").is_none());
    }

    #[test]
    fn test_table_view_shares_document() {
        let doc = Arc::new(sample());
        let table = ManifestTable::new(Arc::clone(&doc), "Tables").unwrap();
        assert_eq!(Arc::strong_count(&doc), 2);
        assert_eq!(table.name(), "Tables");
        assert_eq!(table, json!({"x": 1}));
        assert_eq!(table["x"], json!(1));
        assert_eq!(serde_json::to_string(&table).unwrap(), r#"{"x":1}"#);

        assert!(ManifestTable::new(doc, "Missing").is_none());
    }

    #[test]
    fn test_empty_document() {
        let doc: ManifestDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.is_empty());
        assert!(!sample().is_empty());
    }

    #[test]
    fn test_rejects_non_object_body() {
        assert!(serde_json::from_str::<ManifestDocument>("[1,2,3]").is_err());
        assert!(serde_json::from_str::<ManifestDocument>("\"text\"").is_err());
    }
}
