use once_cell::sync::Lazy;
use serde_json::{Map, Value};

/// Expected kind of a value in a stored event record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    Integer,
    Bool,
    List,
    /// A nested record with its own field set.
    Record(Schema),
}

impl FieldKind {
    /// The value inserted when a field is missing.
    pub fn default_value(&self) -> Value {
        match self {
            FieldKind::Text => Value::String(String::new()),
            FieldKind::Integer => Value::from(0),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::List => Value::Array(Vec::new()),
            FieldKind::Record(schema) => Value::Object(schema.default_record()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Bool => "bool",
            FieldKind::List => "list",
            FieldKind::Record(_) => "record",
        }
    }
}

/// An ordered field name → kind description of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: Vec<(&'static str, FieldKind)>,
}

impl Schema {
    pub fn new(fields: Vec<(&'static str, FieldKind)>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &FieldKind)> {
        self.fields.iter().map(|(name, kind)| (*name, kind))
    }

    pub fn get(&self, name: &str) -> Option<&FieldKind> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, kind)| kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A record holding every field at its zero value.
    pub fn default_record(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(name, kind)| (name.to_string(), kind.default_value()))
            .collect()
    }
}

/// Field set of the cover image sub-record.
pub static COVER_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    use FieldKind::*;
    Schema::new(vec![
        ("id", Text),
        ("mimetype", Text),
        ("format", Text),
        ("color_summary", List),
        ("filename", Text),
        ("width", Integer),
        ("height", Integer),
        ("thumbnail", Bool),
    ])
});

/// Field set every event record is reconciled against.
pub static EVENT_SCHEMA: Lazy<Schema> = Lazy::new(|| {
    use FieldKind::*;
    Schema::new(vec![
        ("id", Text),
        ("title", Text),
        // Short summary shown in listings
        ("lead_text", Text),
        ("description", Text),
        ("tags", List),
        ("date_start", Text),
        ("date_end", Text),
        ("updated_at", Text),
        // Human readable, may carry HTML line breaks
        ("date_description", Text),
        ("category", Text),
        ("occurrences", Text),
        ("programs", Text),
        ("contact_name", Text),
        ("price_detail", Text),
        ("price_type", Text),
        ("address_name", Text),
        ("address_street", Text),
        ("address_city", Text),
        ("address_zipcode", Text),
        ("lat_lon", List),
        ("access_type", Text),
        ("access_phone", Text),
        ("access_mail", Text),
        ("access_link", Text),
        ("contact_url", Text),
        ("contact_phone", Text),
        ("contact_mail", Text),
        ("contact_facebook", Text),
        ("contact_twitter", Text),
        ("cover_url", Text),
        ("cover", Record(COVER_SCHEMA.clone())),
        ("cover_alt", Text),
        ("cover_credit", Text),
        ("url", Text),
        ("transport", Text),
        ("pmr", Integer),
        ("deaf", Integer),
        ("blind", Integer),
    ])
});
