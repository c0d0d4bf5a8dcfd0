use std::{collections::HashMap, fmt};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{ArgType, Error, ScalarType};

/// One named input of a SQL template
///
/// Deserializes from the host's JSON declarations:
/// ```json
/// {"key": "user_id", "type": "int", "value": 1, "ignore_alchemy": false}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateArg {
    pub key: String,
    /// `None` when the type could not be inferred
    #[serde(rename = "type", default)]
    pub ty: Option<ArgType>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub value: Value,
    /// Keeps the argument out of the bound parameters while leaving it
    /// visible to the template.
    #[serde(default, alias = "ignore_alchemy")]
    pub ignore: bool,
}

impl TemplateArg {
    pub fn new(key: impl Into<String>, ty: impl Into<ArgType>) -> Self {
        TemplateArg {
            key: key.into(),
            ty: Some(ty.into()),
            multiple: false,
            value: Value::Null,
            ignore: false,
        }
    }

    /// Creates a declaration from a textual type name
    ///
    /// # Errors
    /// Returns [`Error::Declaration`] for type names outside
    /// `string`, `int`, `float` and `list`
    pub fn typed(key: impl Into<String>, ty: &str) -> Result<Self, Error> {
        let key = key.into();
        let ty: ArgType = ty
            .parse()
            .map_err(|e: crate::UnknownArgType| Error::declaration(&key, e.to_string()))?;
        Ok(Self::new(key, ty))
    }

    pub fn untyped(key: impl Into<String>) -> Self {
        TemplateArg {
            key: key.into(),
            ty: None,
            multiple: false,
            value: Value::Null,
            ignore: false,
        }
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    pub fn ignore(mut self, ignore: bool) -> Self {
        self.ignore = ignore;
        self
    }

    fn is_list(&self) -> bool {
        self.ty == Some(ArgType::List)
    }

    /// Whether this argument is sent to the database as a bound parameter
    pub fn is_bindable(&self) -> bool {
        !self.value.is_null() && !self.is_list() && !self.ignore
    }
}

/// Zero-argument predicate evaluated by key from templates
pub type Condition = Box<dyn Fn() -> Value + Send + Sync>;

/// Argument set and conditions a SQL template is rendered against
///
/// Arguments keep their insertion order. The first declaration of a key wins;
/// later declarations with the same key are ignored.
#[derive(Default)]
pub struct TemplateArgs {
    args: IndexMap<String, TemplateArg>,
    conditions: HashMap<String, Condition>,
    count: bool,
}

impl fmt::Debug for TemplateArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateArgs")
            .field("args", &self.args)
            .field("conditions", &self.conditions.keys().collect::<Vec<_>>())
            .field("count", &self.count)
            .finish()
    }
}

impl TemplateArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_count(&mut self, count: bool) {
        self.count = count;
    }

    /// Merges declarations into the set.
    ///
    /// A `list` argument is stored whole, and each mapping element at position
    /// `i` is also flattened into scalar arguments keyed `<field>_<i>` whose
    /// type is inferred from the field value.
    pub fn set_args(&mut self, args: impl IntoIterator<Item = TemplateArg>) {
        for arg in args {
            if self.args.contains_key(&arg.key) {
                continue;
            }
            if arg.is_list() {
                let items = match &arg.value {
                    Value::Array(items) => items.clone(),
                    _ => Vec::new(),
                };
                self.args.insert(arg.key.clone(), arg);
                for (index, item) in items.iter().enumerate() {
                    if let Value::Object(fields) = item {
                        self.flatten_item(index, fields);
                    }
                }
            } else {
                self.args.insert(arg.key.clone(), arg);
            }
        }
    }

    fn flatten_item(&mut self, index: usize, fields: &Map<String, Value>) {
        for (field, value) in fields {
            let key = format!("{field}_{index}");
            if self.args.contains_key(&key) {
                continue;
            }
            let arg = TemplateArg {
                key: key.clone(),
                ty: ScalarType::infer(value).map(ArgType::Scalar),
                multiple: false,
                value: value.clone(),
                ignore: false,
            };
            self.args.insert(key, arg);
        }
    }

    pub fn arg(&self, key: &str) -> Option<&TemplateArg> {
        self.args.get(key)
    }

    pub fn args(&self) -> impl Iterator<Item = &TemplateArg> {
        self.args.values()
    }

    /// Value of a declared argument
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.args.get(key).map(|arg| &arg.value)
    }

    /// Declarations eligible to become bound parameters, in insertion order
    pub fn get_args_as_to_query(&self) -> Vec<TemplateArg> {
        self.args
            .values()
            .filter(|arg| arg.is_bindable())
            .cloned()
            .collect()
    }

    /// Same selection as [`Self::get_args_as_to_query`], keyed by argument
    pub fn get_args_as_to_exec(&self) -> IndexMap<String, Value> {
        self.args
            .values()
            .filter(|arg| arg.is_bindable())
            .map(|arg| (arg.key.clone(), arg.value.clone()))
            .collect()
    }

    /// Registers a condition evaluable from templates through [`Self::check`]
    /// and [`Self::render`]
    ///
    /// # Errors
    /// Returns [`Error::ConditionExists`] when `key` already has a condition
    pub fn set_condition<F, V>(&mut self, key: impl Into<String>, condition: F) -> Result<(), Error>
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        let key = key.into();
        if self.conditions.contains_key(&key) {
            return Err(Error::ConditionExists(key));
        }
        self.conditions
            .insert(key, Box::new(move || condition().into()));
        Ok(())
    }

    fn condition(&self, key: &str) -> Option<Value> {
        self.conditions.get(key).map(|condition| condition())
    }

    /// True when `key` is a declared argument with a truthy value, otherwise
    /// the truth of the condition registered under `key`.
    pub fn check(&self, key: &str) -> bool {
        if let Some(arg) = self.args.get(key) {
            return is_truthy(&arg.value);
        }
        self.condition(key).is_some_and(|v| is_truthy(&v))
    }

    /// Text of a truthy argument value, or of the condition result, or
    /// empty text.
    ///
    /// Boolean arguments render as `true`; boolean condition results as
    /// `1`/`0`.
    pub fn render(&self, key: &str) -> String {
        if let Some(arg) = self.args.get(key) {
            return if is_truthy(&arg.value) {
                value_text(&arg.value)
            } else {
                String::new()
            };
        }
        self.condition(key)
            .map(|v| match v {
                Value::Bool(b) => u8::from(b).to_string(),
                other => value_text(&other),
            })
            .unwrap_or_default()
    }

    /// Whether the template should wrap the statement in a COUNT
    pub fn count(&self) -> bool {
        self.count
    }

    pub fn not_count(&self) -> bool {
        !self.count
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> TemplateArgs {
        let mut args = TemplateArgs::new();
        args.set_args([
            TemplateArg::new("a", ScalarType::Int).value(5),
            TemplateArg::new("b", ArgType::List).value(json!([{"x": 1}])),
            TemplateArg::new("c", ScalarType::Int),
        ]);
        args
    }

    #[test]
    fn test_query_args_filter() {
        let args = sample();
        let keys: Vec<_> = args
            .get_args_as_to_query()
            .into_iter()
            .map(|a| a.key)
            .collect();
        // `x_0` comes from flattening `b`
        assert_eq!(keys, vec!["a", "x_0"]);

        let mut args = TemplateArgs::new();
        args.set_args([
            TemplateArg::new("a", ScalarType::Int).value(5),
            TemplateArg::new("b", ArgType::List).value(json!([])),
            TemplateArg::new("c", ScalarType::Int),
            TemplateArg::new("d", ScalarType::String).value("x").ignore(true),
        ]);
        let keys: Vec<_> = args
            .get_args_as_to_query()
            .into_iter()
            .map(|a| a.key)
            .collect();
        assert_eq!(keys, vec!["a"]);
        let exec = args.get_args_as_to_exec();
        assert_eq!(exec.len(), 1);
        assert_eq!(exec["a"], json!(5));
    }

    #[test]
    fn test_first_declaration_wins() {
        let mut args = TemplateArgs::new();
        args.set_args([TemplateArg::new("name", ScalarType::String).value("first")]);
        args.set_args([TemplateArg::new("name", ScalarType::String).value("second")]);
        assert_eq!(args.get("name"), Some(&json!("first")));
    }

    #[test]
    fn test_list_flattening() {
        let mut args = TemplateArgs::new();
        args.set_args([TemplateArg::new("rows", ArgType::List).value(json!([
            {"id": 1, "name": "a", "score": 1.5},
            {"id": 2, "name": "b", "meta": null, "active": true},
        ]))]);

        assert!(args.arg("rows").is_some());
        assert_eq!(
            args.arg("id_0").unwrap().ty,
            Some(ArgType::Scalar(ScalarType::Int))
        );
        assert_eq!(
            args.arg("name_1").unwrap().ty,
            Some(ArgType::Scalar(ScalarType::String))
        );
        assert_eq!(
            args.arg("score_0").unwrap().ty,
            Some(ArgType::Scalar(ScalarType::Float))
        );
        assert_eq!(args.arg("meta_1").unwrap().ty, None);
        assert_eq!(
            args.arg("active_1").unwrap().ty,
            Some(ArgType::Scalar(ScalarType::Int))
        );
        assert_eq!(args.get("id_1"), Some(&json!(2)));
    }

    #[test]
    fn test_check_and_render() {
        let mut args = TemplateArgs::new();
        args.set_args([
            TemplateArg::new("name", ScalarType::String).value("bob"),
            TemplateArg::new("empty", ScalarType::String).value(""),
            TemplateArg::new("limit", ScalarType::Int).value(10),
            TemplateArg::new("verbose", ScalarType::Int).value(true),
            TemplateArg::new("quiet", ScalarType::Int).value(false),
        ]);
        args.set_condition("active", || true).unwrap();
        args.set_condition("archived", || false).unwrap();
        args.set_condition("order", || "name desc").unwrap();

        assert!(args.check("name"));
        assert!(!args.check("empty"));
        assert!(args.check("active"));
        assert!(!args.check("flag"));

        assert_eq!(args.render("name"), "bob");
        assert_eq!(args.render("limit"), "10");
        assert_eq!(args.render("empty"), "");
        assert_eq!(args.render("active"), "1");
        assert_eq!(args.render("archived"), "0");
        assert_eq!(args.render("verbose"), "true");
        assert_eq!(args.render("quiet"), "");
        assert_eq!(args.render("order"), "name desc");
        assert_eq!(args.render("flag"), "");
    }

    #[test]
    fn test_duplicate_condition() {
        let mut args = TemplateArgs::new();
        args.set_condition("active", || true).unwrap();
        let err = args.set_condition("active", || false).unwrap_err();
        assert!(matches!(err, Error::ConditionExists(key) if key == "active"));
        assert!(args.check("active"));
    }

    #[test]
    fn test_deserialize_declarations() {
        let args: Vec<TemplateArg> = serde_json::from_value(json!([
            {"key": "id", "type": "int", "value": 3},
            {"key": "tags", "type": "string", "multiple": true, "value": ["a"], "ignore_alchemy": true},
        ]))
        .unwrap();
        assert_eq!(args[0].ty, Some(ArgType::Scalar(ScalarType::Int)));
        assert!(args[1].multiple && args[1].ignore);

        let bad = serde_json::from_value::<TemplateArg>(json!({"key": "d", "type": "date"}));
        assert!(bad.is_err());
        assert!(matches!(
            TemplateArg::typed("d", "date"),
            Err(Error::Declaration { .. })
        ));
    }
}
