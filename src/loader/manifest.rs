//! Route and middleware manifests.
//!
//! An API file names a registered handler instead of containing code:
//!
//! ```toml
//! handler = "article.list"
//!
//! [options]
//! table = "article"
//! ```
//!
//! A middleware file additionally carries the regex it applies to:
//!
//! ```toml
//! path = "^/admin"
//! handler = "require_header"
//!
//! [options]
//! header = "x-token"
//! ```

use serde::Deserialize;
use serde_json::Value;

/// Contents of an API route file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteManifest {
    pub handler: String,
    #[serde(default)]
    pub options: Option<Value>,
}

impl RouteManifest {
    pub fn parse(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn options(&self) -> Value {
        self.options.clone().unwrap_or(Value::Null)
    }
}

/// Contents of a middleware file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MiddlewareManifest {
    pub path: String,
    pub handler: String,
    #[serde(default)]
    pub options: Option<Value>,
}

impl MiddlewareManifest {
    pub fn parse(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn options(&self) -> Value {
        self.options.clone().unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn route_manifest_with_options() {
        let m = RouteManifest::parse("handler = \"article.list\"\n[options]\ntable = \"things\"\nlimit = 5\n").unwrap();
        assert_eq!(m.handler, "article.list");
        assert_eq!(m.options(), json!({"table": "things", "limit": 5}));
    }

    #[test]
    fn route_manifest_without_options() {
        let m = RouteManifest::parse("handler = \"article.create\"").unwrap();
        assert_eq!(m.options(), Value::Null);
    }

    #[test]
    fn rejects_missing_handler_and_unknown_keys() {
        assert!(RouteManifest::parse("[options]\na = 1").is_err());
        assert!(RouteManifest::parse("handler = \"x\"\nmethod = \"GET\"").is_err());
    }

    #[test]
    fn middleware_manifest() {
        let m = MiddlewareManifest::parse("path = \"^/admin\"\nhandler = \"require_header\"").unwrap();
        assert_eq!(m.path, "^/admin");
        assert_eq!(m.handler, "require_header");
        assert!(MiddlewareManifest::parse("handler = \"require_header\"").is_err());
    }
}
