use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::Value;

#[derive(Debug)]
pub enum FrontMatterError {
    Yaml(serde_yaml::Error),
    NotAMapping,
    NotSerializable(String),
}

impl std::fmt::Display for FrontMatterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrontMatterError::Yaml(e) => write!(f, "invalid front matter: {}", e),
            FrontMatterError::NotAMapping => write!(f, "front matter must be a key/value mapping"),
            FrontMatterError::NotSerializable(key) => write!(f, "not serializable: key {:?}", key),
        }
    }
}

impl std::error::Error for FrontMatterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrontMatterError::Yaml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for FrontMatterError {
    fn from(err: serde_yaml::Error) -> Self {
        FrontMatterError::Yaml(err)
    }
}

/// Metadata block at the top of a Markdown file.
///
/// The reserved keys get their own fields; everything else lands in `extra`
/// untouched so templates can read it as `meta.<key>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub template: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl FrontMatter {
    /// Parses the YAML text between the `---` fences. Every value must be a
    /// plain string.
    pub fn parse(yaml: &str) -> Result<Self, FrontMatterError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let mapping = match serde_yaml::from_str::<Value>(yaml)? {
            Value::Mapping(mapping) => mapping,
            Value::Null => return Ok(Self::default()),
            _ => return Err(FrontMatterError::NotAMapping),
        };

        let mut front_matter = Self::default();
        for (key, value) in mapping {
            let key = match key {
                Value::String(key) => key,
                other => return Err(FrontMatterError::NotSerializable(describe(&other))),
            };
            let Value::String(value) = value else {
                return Err(FrontMatterError::NotSerializable(key));
            };

            match key.as_str() {
                "title" => front_matter.title = Some(value),
                "date" => front_matter.date = Some(value),
                "description" => front_matter.description = Some(value),
                "template" => front_matter.template = Some(value),
                _ => {
                    front_matter.extra.insert(key, value);
                }
            }
        }

        Ok(front_matter)
    }
}

fn describe(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "<unprintable>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_and_extra_keys() {
        let fm = FrontMatter::parse(
            "title: Hello\ndate: \"2021-03-04\"\ntemplate: special.html\nauthor: Sam\n",
        )
        .unwrap();

        assert_eq!(fm.title.as_deref(), Some("Hello"));
        assert_eq!(fm.date.as_deref(), Some("2021-03-04"));
        assert_eq!(fm.description, None);
        assert_eq!(fm.template.as_deref(), Some("special.html"));
        assert_eq!(fm.extra.get("author").map(String::as_str), Some("Sam"));
    }

    #[test]
    fn test_unquoted_date_is_a_string() {
        let fm = FrontMatter::parse("date: 2020-01-02").unwrap();
        assert_eq!(fm.date.as_deref(), Some("2020-01-02"));
    }

    #[test]
    fn test_empty_block() {
        assert_eq!(FrontMatter::parse("").unwrap(), FrontMatter::default());
        assert_eq!(FrontMatter::parse("  \n").unwrap(), FrontMatter::default());
    }

    #[test]
    fn test_non_string_value_is_rejected() {
        let err = FrontMatter::parse("title: Hi\ndraft: true\n").unwrap_err();
        assert!(matches!(err, FrontMatterError::NotSerializable(ref key) if key == "draft"));

        let err = FrontMatter::parse("tags:\n  - a\n  - b\n").unwrap_err();
        assert!(matches!(err, FrontMatterError::NotSerializable(ref key) if key == "tags"));

        let err = FrontMatter::parse("count: 3").unwrap_err();
        assert!(err.to_string().contains("not serializable"));
    }

    #[test]
    fn test_list_at_top_level() {
        assert!(matches!(
            FrontMatter::parse("- a\n- b\n"),
            Err(FrontMatterError::NotAMapping)
        ));
    }
}
