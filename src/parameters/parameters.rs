use std::collections::{btree_map, BTreeMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml::{Table, Value};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Error deserializing parameters")]
    Deserialize(#[from] toml::de::Error),

    #[error("Parameter toml does not have the right structure (error in '{0}')")]
    BadToml(String),

    #[error("Element '{path}' not found")]
    NotFound { path: String },

    #[error("Cannot cast parameter '{path}' to {dtype}")]
    BadCast { path: String, dtype: String },

    #[error("Element '{path}' is not a parameter")]
    NotAParameter { path: String },

    #[error("Element '{path}' is not a map")]
    NotAMap { path: String },
}

/// A typed value, written in toml as `{ val = ..., type = "..." }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ParameterValue {
    #[serde(rename = "bool")]
    Bool { val: bool },
    #[serde(rename = "int")]
    Int { val: i64 },
    #[serde(rename = "float")]
    Float { val: f64 },
    #[serde(rename = "str")]
    String { val: String },

    #[serde(rename = "int[]")]
    IntArray { val: Vec<i64> },
    #[serde(rename = "float[]")]
    FloatArray { val: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    path: String,
    value: ParameterValue,
}

macro_rules! typed_getter {
    ($name:ident, $variant:ident, $ret:ty, $dtype:literal) => {
        pub fn $name(&self) -> Result<$ret, Error> {
            match &self.value {
                ParameterValue::$variant { val } => Ok(val.clone()),
                _ => Err(Error::BadCast {
                    path: self.path.clone(),
                    dtype: $dtype.to_string(),
                }),
            }
        }
    };
}

impl Parameter {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> &ParameterValue {
        &self.value
    }

    typed_getter!(value_bool, Bool, bool, "bool");
    typed_getter!(value_int, Int, i64, "int");
    typed_getter!(value_float, Float, f64, "float");
    typed_getter!(value_string, String, String, "str");
    typed_getter!(value_int_arr, IntArray, Vec<i64>, "int[]");
    typed_getter!(value_float_arr, FloatArray, Vec<f64>, "float[]");
}

/// Tree of parameters, addressed with dotted paths ("pipeline.window_s")
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterMap {
    path: String,
    map: BTreeMap<String, ParameterTree>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterTree {
    Node(ParameterMap),
    Leaf(Parameter),
}

impl ParameterMap {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, rel_path: &str) -> Result<&ParameterTree, Error> {
        let not_found = || Error::NotFound {
            path: append_path(&self.path, rel_path),
        };

        let mut map = self;
        let mut parts = rel_path.split('.').peekable();

        while let Some(part) = parts.next() {
            let elem = map.map.get(part).ok_or_else(not_found)?;

            match elem {
                _ if parts.peek().is_none() => return Ok(elem),
                ParameterTree::Node(inner) => map = inner,
                ParameterTree::Leaf(_) => return Err(not_found()),
            }
        }

        Err(not_found())
    }

    pub fn get_param(&self, rel_path: &str) -> Result<&Parameter, Error> {
        self.get(rel_path)?.as_param()
    }

    pub fn get_param_opt(&self, rel_path: &str) -> Result<Option<&Parameter>, Error> {
        match self.get_param(rel_path) {
            Ok(p) => Ok(Some(p)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_map(&self, rel_path: &str) -> Result<&ParameterMap, Error> {
        self.get(rel_path)?.as_map()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ParameterTree> {
        self.map.iter()
    }
}

impl ParameterTree {
    fn as_param(&self) -> Result<&Parameter, Error> {
        match self {
            Self::Leaf(p) => Ok(p),
            Self::Node(m) => Err(Error::NotAParameter {
                path: m.path.clone(),
            }),
        }
    }

    fn as_map(&self) -> Result<&ParameterMap, Error> {
        match self {
            Self::Node(m) => Ok(m),
            Self::Leaf(p) => Err(Error::NotAMap {
                path: p.path.clone(),
            }),
        }
    }
}

pub fn parse_string(toml_str: &str) -> Result<ParameterMap, Error> {
    let table = toml::from_str::<Table>(toml_str)?;

    parse_table(table, "")
}

fn parse_table(table: Table, root: &str) -> Result<ParameterMap, Error> {
    let mut map = BTreeMap::new();

    for (key, val) in table {
        let path = append_path(root, &key);

        let Value::Table(val) = val else {
            return Err(Error::BadToml(root.to_string()));
        };

        // A table is a leaf if it has the shape of a typed value, a map otherwise
        let elem = if val.contains_key("type") {
            let value = val
                .try_into::<ParameterValue>()
                .map_err(|_| Error::BadToml(path.clone()))?;
            ParameterTree::Leaf(Parameter { path, value })
        } else {
            ParameterTree::Node(parse_table(val, &path)?)
        };

        map.insert(key, elem);
    }

    Ok(ParameterMap {
        path: root.to_string(),
        map,
    })
}

fn append_path(root: &str, key: &str) -> String {
    format!("{root}.{key}")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_empty() {
        assert_eq!(parse_string(""), Ok(ParameterMap::default()))
    }

    fn leaf(path: &str, value: ParameterValue) -> ParameterTree {
        ParameterTree::Leaf(Parameter {
            path: path.to_string(),
            value,
        })
    }

    fn check_type(good: Vec<(&str, ParameterValue)>, dtype: &str, bad: Vec<&str>) {
        for (val, expected) in good {
            let str = format!("val = {{ val = {val}, type = \"{dtype}\" }}");
            assert_eq!(
                parse_string(&str),
                Ok(ParameterMap {
                    path: "".to_string(),
                    map: BTreeMap::from([("val".to_string(), leaf(".val", expected))]),
                })
            );
        }

        for val in bad {
            let str = format!("val = {{ val = {val}, type = \"{dtype}\" }}");
            assert_eq!(parse_string(&str), Err(Error::BadToml(".val".to_string())));
        }

        let str = format!("val = {{ val = 1, type = \"badtype\" }}");
        assert_eq!(parse_string(&str), Err(Error::BadToml(".val".to_string())));
    }

    #[test]
    fn test_bool() {
        check_type(
            vec![
                ("true", ParameterValue::Bool { val: true }),
                ("false", ParameterValue::Bool { val: false }),
            ],
            "bool",
            vec!["1.0", "1", "\"true\""],
        );
    }

    #[test]
    fn test_int() {
        check_type(
            vec![
                ("-1", ParameterValue::Int { val: -1 }),
                ("2", ParameterValue::Int { val: 2 }),
            ],
            "int",
            vec!["1.5", "true", "\"hello\""],
        );
    }

    #[test]
    fn test_float() {
        check_type(
            vec![
                ("inf", ParameterValue::Float { val: f64::INFINITY }),
                ("-1.0", ParameterValue::Float { val: -1.0 }),
                ("1", ParameterValue::Float { val: 1.0 }),
                ("20.0", ParameterValue::Float { val: 20.0 }),
            ],
            "float",
            vec!["true", "\"hello\""],
        );
    }

    #[test]
    fn test_string() {
        check_type(
            vec![
                (
                    "\"/sensors/position\"",
                    ParameterValue::String {
                        val: "/sensors/position".to_string(),
                    },
                ),
                ("\"\"", ParameterValue::String { val: "".to_string() }),
            ],
            "str",
            vec!["1.123", "1", "true"],
        );
    }

    #[test]
    fn test_float_array() {
        check_type(
            vec![
                (
                    "[ 1.0, 2.0, 3 ]",
                    ParameterValue::FloatArray {
                        val: vec![1.0, 2.0, 3.0],
                    },
                ),
                ("[ ]", ParameterValue::FloatArray { val: vec![] }),
            ],
            "float[]",
            vec!["1.0", "[ 1.0, \"2.0\" ]"],
        );
    }

    #[test]
    fn test_nested_lookup() -> anyhow::Result<()> {
        let params = parse_string(
            "
            [pipeline]
            window_s = { val = 5.0, type = \"float\" }
            workers = { val = 2, type = \"int\" }

            [pipeline.channels]
            position = { val = \"/sensors/position\", type = \"str\" }
            ",
        )?;

        assert_eq!(params.get_param("pipeline.window_s")?.value_float()?, 5.0);
        assert_eq!(params.get_param("pipeline.workers")?.value_int()?, 2);

        let channels = params.get_map("pipeline.channels")?;
        assert_eq!(channels.path(), ".pipeline.channels");
        assert_eq!(
            channels.get_param("position")?.value_string()?,
            "/sensors/position"
        );
        assert_eq!(
            channels.get_param("position")?.path(),
            ".pipeline.channels.position"
        );

        assert_eq!(
            params.get_param("pipeline.missing"),
            Err(Error::NotFound {
                path: ".pipeline.missing".to_string()
            })
        );
        assert_eq!(params.get_param_opt("pipeline.missing")?, None);
        assert!(params.get_param_opt("pipeline.workers")?.is_some());

        // Descending into a leaf
        assert!(matches!(
            params.get_param("pipeline.workers.x"),
            Err(Error::NotFound { .. })
        ));

        assert_eq!(
            params.get_param("pipeline"),
            Err(Error::NotAParameter {
                path: ".pipeline".to_string()
            })
        );
        assert_eq!(
            params.get_map("pipeline.workers"),
            Err(Error::NotAMap {
                path: ".pipeline.workers".to_string()
            })
        );
        assert_eq!(
            params.get_param("pipeline.workers")?.value_float(),
            Err(Error::BadCast {
                path: ".pipeline.workers".to_string(),
                dtype: "float".to_string()
            })
        );

        Ok(())
    }

    #[test]
    fn test_scalar_at_top_level_is_rejected() {
        assert_eq!(
            parse_string("window_s = 5.0"),
            Err(Error::BadToml("".to_string()))
        );
    }
}
