//! Typed accessors over the raw string-valued attribute maps that make up
//! parts, nodes, edges and components. Centralizing `read_bool`/`read_float`/
//! `read_uuid`/`read_str` here means no call site downstream re-implements
//! its own ad hoc string parsing.

use std::collections::HashMap;

use uuid::Uuid;

pub type AttrMap = HashMap<String, String>;

pub trait AttrReader {
    fn read_str(&self, key: &str) -> Option<&str>;

    fn read_bool(&self, key: &str) -> bool {
        self.read_str(key).is_some_and(|v| v == "true")
    }

    fn read_float(&self, key: &str, default: f64) -> f64 {
        self.read_str(key)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(default)
    }

    fn read_uuid(&self, key: &str) -> Option<Uuid> {
        self.read_str(key).and_then(|v| Uuid::parse_str(v).ok())
    }
}

impl AttrReader for AttrMap {
    fn read_str(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}
