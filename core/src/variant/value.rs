use log::warn;
use std::collections::BTreeMap;

/// Type tag of a `Variant`. Values follow the OLE `VARTYPE` numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Empty = 0,
    I4 = 3,
    R8 = 5,
    Date = 7,
    Bstr = 8,
    Dispatch = 9,
    Bool = 11,
    I8 = 20,
    Array = 0x2000,
}

/**
 * Dynamically typed scalar exchanged with the Task Scheduler service.
 * Nested objects (actions, settings, etc) travel as `Bag` and collections as `Array`
 */
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Empty,
    I4(i32),
    I8(i64),
    R8(f64),
    /**OLE automation date. Days since 1899-12-30, fraction is the time of day */
    Date(f64),
    Bstr(String),
    Bool(bool),
    Bag(PropertyBag),
    Array(Vec<Variant>),
}

impl Variant {
    pub fn var_type(&self) -> VarType {
        match self {
            Variant::Empty => VarType::Empty,
            Variant::I4(_) => VarType::I4,
            Variant::I8(_) => VarType::I8,
            Variant::R8(_) => VarType::R8,
            Variant::Date(_) => VarType::Date,
            Variant::Bstr(_) => VarType::Bstr,
            Variant::Bool(_) => VarType::Bool,
            Variant::Bag(_) => VarType::Dispatch,
            Variant::Array(_) => VarType::Array,
        }
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Variant {
        Variant::Bstr(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Variant {
        Variant::Bstr(value)
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Variant {
        Variant::Bool(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Variant {
        Variant::I4(value)
    }
}

impl From<PropertyBag> for Variant {
    fn from(value: PropertyBag) -> Variant {
        Variant::Bag(value)
    }
}

impl From<Vec<Variant>> for Variant {
    fn from(value: Vec<Variant>) -> Variant {
        Variant::Array(value)
    }
}

/**
 * String keyed property dictionary. This is how the service represents a task definition
 * and every object inside it.
 *
 * Every typed getter treats an absent key and a wrong typed value the same way: the
 * provided (or type) default is returned and a warning is logged for the wrong type case
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    values: BTreeMap<String, Variant>,
}

impl PropertyBag {
    pub fn new() -> PropertyBag {
        PropertyBag::default()
    }

    pub fn set<V: Into<Variant>>(&mut self, name: &str, value: V) {
        self.values.insert(name.to_string(), value.into());
    }

    /// Set a string property only if the value is not empty
    pub fn set_text(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        self.set(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Variant> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variant> {
        self.values.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Variant> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Variant)> {
        self.values.iter()
    }

    pub fn string_or_default(&self, name: &str) -> String {
        match self.get(name) {
            Some(Variant::Bstr(value)) => value.clone(),
            Some(Variant::Empty) | None => String::new(),
            Some(other) => {
                mismatch(name, other);
                String::new()
            }
        }
    }

    /// Like `string_or_default`, but an absent value falls back to `default`. A present empty string stays empty
    pub fn string_or(&self, name: &str, default: &str) -> String {
        match self.get(name) {
            Some(Variant::Bstr(value)) => value.clone(),
            Some(Variant::Empty) | None => default.to_string(),
            Some(other) => {
                mismatch(name, other);
                default.to_string()
            }
        }
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        match self.get(name) {
            Some(Variant::Bool(value)) => *value,
            Some(Variant::Empty) | None => default,
            Some(other) => {
                mismatch(name, other);
                default
            }
        }
    }

    pub fn i32_or(&self, name: &str, default: i32) -> i32 {
        match self.get(name) {
            Some(Variant::I4(value)) => *value,
            Some(Variant::I8(value)) => i32::try_from(*value).unwrap_or(default),
            Some(Variant::Empty) | None => default,
            Some(other) => {
                mismatch(name, other);
                default
            }
        }
    }

    pub fn bag_or_default(&self, name: &str) -> PropertyBag {
        match self.get(name) {
            Some(Variant::Bag(value)) => value.clone(),
            Some(Variant::Empty) | None => PropertyBag::default(),
            Some(other) => {
                mismatch(name, other);
                PropertyBag::default()
            }
        }
    }

    pub fn array_or_default(&self, name: &str) -> Vec<Variant> {
        match self.get(name) {
            Some(Variant::Array(value)) => value.clone(),
            Some(Variant::Empty) | None => Vec::new(),
            Some(other) => {
                mismatch(name, other);
                Vec::new()
            }
        }
    }
}

fn mismatch(name: &str, value: &Variant) {
    warn!(
        "[taskmaster] Property {name} has unexpected type {:?}. Using default",
        value.var_type()
    );
}
