//! MRCP resource catalogue.
//!
//! A resource is a named service (`speechsynth`, `speechrecog`, …) with
//! its own method and event vocabulary and its own header table. The
//! catalogue resolves resources by id in constant time and by name with
//! a linear scan, and fills in the id/name pairing of a message's method
//! or event once the message is associated with a resource.

mod recognizer;
mod synthesizer;

pub use recognizer::recognizer_resource;
pub use synthesizer::synthesizer_resource;

use crate::error::{Error, Result};

/// Resource identifier; index into the catalogue.
pub type ResourceId = usize;

/// Value syntax of a resource-specific header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free-form text
    Text,
    /// Unsigned decimal integer
    Integer,
    /// Decimal float in `[0.0, 1.0]` or similar
    Float,
    /// `true` / `false`
    Boolean,
}

impl FieldKind {
    fn validate(&self, value: &str) -> bool {
        match self {
            FieldKind::Text => true,
            FieldKind::Integer => value.trim().parse::<u64>().is_ok(),
            FieldKind::Float => value.trim().parse::<f64>().is_ok(),
            FieldKind::Boolean => matches!(value.trim(), "true" | "false"),
        }
    }
}

/// Header table of one resource: field names, ids and value syntax.
///
/// Ids are local to the table (`0..field_count`); the message layer
/// offsets them past the generic table.
pub trait HeaderTable: Send + Sync {
    /// Number of fields in the table; bounds the id space.
    fn field_count(&self) -> usize;

    /// Canonical name for the id, `None` when out of bounds.
    fn field_name(&self, id: usize) -> Option<&'static str>;

    /// Case-insensitive id lookup by name.
    fn find_id(&self, name: &str) -> Option<usize>;

    /// Syntactic validation of a raw value for the id.
    fn parse_field(&self, id: usize, value: &str) -> Result<()>;
}

/// Header table backed by static name/kind arrays.
pub struct StaticHeaderTable {
    names: &'static [&'static str],
    kinds: &'static [FieldKind],
}

impl StaticHeaderTable {
    /// Build from parallel arrays; lengths must match.
    pub const fn new(names: &'static [&'static str], kinds: &'static [FieldKind]) -> Self {
        assert!(names.len() == kinds.len());
        Self { names, kinds }
    }
}

impl HeaderTable for StaticHeaderTable {
    fn field_count(&self) -> usize {
        self.names.len()
    }

    fn field_name(&self, id: usize) -> Option<&'static str> {
        self.names.get(id).copied()
    }

    fn find_id(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    fn parse_field(&self, id: usize, value: &str) -> Result<()> {
        let kind = self
            .kinds
            .get(id)
            .ok_or(Error::HeaderIdRejected(id))?;
        if !kind.validate(value) {
            return Err(Error::InvalidHeader(format!(
                "value '{}' rejected for '{}'",
                value,
                self.names[id]
            )));
        }
        Ok(())
    }
}

/// One entry of the catalogue; immutable after construction.
pub struct Resource {
    /// Resource identifier (catalogue index)
    pub id: ResourceId,
    /// Resource name as it appears in channel identifiers
    pub name: &'static str,
    /// Method vocabulary; index is the method id
    pub methods: &'static [&'static str],
    /// Event vocabulary; index is the event id
    pub events: &'static [&'static str],
    /// Resource-specific header table
    pub header_table: &'static StaticHeaderTable,
}

impl Resource {
    /// Method id by name (exact match, methods are upper-case on the wire).
    pub fn method_id(&self, name: &str) -> Option<usize> {
        self.methods.iter().position(|m| *m == name)
    }

    /// Method name by id.
    pub fn method_name(&self, id: usize) -> Option<&'static str> {
        self.methods.get(id).copied()
    }

    /// Event id by name.
    pub fn event_id(&self, name: &str) -> Option<usize> {
        self.events.iter().position(|e| *e == name)
    }

    /// Event name by id.
    pub fn event_name(&self, id: usize) -> Option<&'static str> {
        self.events.get(id).copied()
    }
}

/// Registry of the resources a factory or server supports.
pub struct ResourceCatalog {
    resources: Vec<Resource>,
}

impl ResourceCatalog {
    /// Empty catalogue.
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
        }
    }

    /// Catalogue with the synthesizer and recognizer resources.
    pub fn default_catalog() -> Self {
        let mut catalog = Self::new();
        catalog.register(synthesizer_resource(0));
        catalog.register(recognizer_resource(1));
        catalog
    }

    /// Register a resource; its id must equal its catalogue index.
    pub fn register(&mut self, resource: Resource) {
        debug_assert_eq!(resource.id, self.resources.len());
        self.resources.push(resource);
    }

    /// Constant-time lookup by id.
    pub fn get_by_id(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Linear lookup by name.
    pub fn get_by_name(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Lookup by name, failing with an error for unknown names.
    pub fn require_by_name(&self, name: &str) -> Result<&Resource> {
        self.get_by_name(name)
            .ok_or_else(|| Error::UnknownResource(name.to_string()))
    }

    /// Lookup by id, failing with an error for invalid ids.
    pub fn require_by_id(&self, id: ResourceId) -> Result<&Resource> {
        self.get_by_id(id)
            .ok_or_else(|| Error::UnknownResource(format!("id {id}")))
    }
}

impl Default for ResourceCatalog {
    fn default() -> Self {
        Self::default_catalog()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_lookup() {
        let catalog = ResourceCatalog::default_catalog();
        let synth = catalog.get_by_name("speechsynth").unwrap();
        assert_eq!(synth.id, 0);
        let recog = catalog.get_by_id(1).unwrap();
        assert_eq!(recog.name, "speechrecog");
        assert!(catalog.get_by_id(7).is_none());
        assert!(catalog.get_by_name("basicverify").is_none());
    }

    #[test]
    fn test_method_and_event_tables() {
        let catalog = ResourceCatalog::default_catalog();
        let synth = catalog.get_by_name("speechsynth").unwrap();
        let speak = synth.method_id("SPEAK").unwrap();
        assert_eq!(synth.method_name(speak), Some("SPEAK"));
        assert!(synth.method_id("RECOGNIZE").is_none());

        let recog = catalog.get_by_name("speechrecog").unwrap();
        assert!(recog.event_id("RECOGNITION-COMPLETE").is_some());
        assert!(recog.event_id("SPEAK-COMPLETE").is_none());
    }

    #[test]
    fn test_header_table_validation() {
        let catalog = ResourceCatalog::default_catalog();
        let recog = catalog.get_by_name("speechrecog").unwrap();
        let table = recog.header_table;

        let id = table.find_id("confidence-threshold").unwrap();
        assert!(table.parse_field(id, "0.5").is_ok());
        assert!(table.parse_field(id, "high").is_err());

        let id = table.find_id("No-Input-Timeout").unwrap();
        assert!(table.parse_field(id, "7000").is_ok());
        assert!(table.parse_field(id, "soon").is_err());
    }
}
