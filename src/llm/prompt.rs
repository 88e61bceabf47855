//! Prompt construction from a task and a field schema.
//!
//! A [`Schema`] lists the attributes the model should return, in order, with
//! a definition and an example for each. [`PromptBuilder`] renders a task, a
//! schema and a JSON input into a single prompt, or into one prompt per
//! `parallel_key` group so independent attributes can be requested
//! concurrently.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default opening instruction.
pub const DEFAULT_INTRO: &str = "You speak perfect single line JSON only. You will read a JSON file and \
return a valid single line JSON after following the instructions step by step.";

/// Default rules every prompt carries.
pub const DEFAULT_LAWS: &[&str] = &[
    "You will not ask the user to give you more information",
    "You will not mention JSON or that you are doing a JSON analysis",
    "You must always only return responses in JSON format, and you must avoid providing a json \
     that may trigger an Unexpected end of JSON input error.",
    "You will always return all attributes specified to the best of your ability. Use null and \
     empty array sparingly if not given enough info",
    "Remove any bullet points, special characters for any strings returned",
    "You will not return the example given as an answer.",
    "If you are not given enough information it is better to return less information and \
     potentially return null for that specific attribute.",
];

/// Default lead-in for the JSON input.
pub const DEFAULT_INPUT_INTRO: &str =
    "This is the JSON that contains information to be used for your task:";

const DEFAULT_KIND: &str = "string";

fn whitespace_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\s{2,}|\n").ok())
        .as_ref()
}

/// Collapses runs of two or more whitespace characters, and any newline, to a
/// single space.
pub fn normalize_whitespace(text: &str) -> String {
    match whitespace_pattern() {
        Some(pattern) => pattern.replace_all(text, " ").into_owned(),
        None => text.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// Description of one attribute the model should return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    /// Declared type; `"string"` when absent.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// What the attribute means.
    #[serde(default)]
    pub definition: String,

    /// Example value shown to the model.
    #[serde(default)]
    pub example: Option<String>,

    /// Fields sharing a key are requested together by
    /// [`PromptBuilder::create_prompts`].
    #[serde(default)]
    pub parallel_key: Option<String>,
}

impl FieldSpec {
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    pub fn with_parallel_key(mut self, key: impl Into<String>) -> Self {
        self.parallel_key = Some(key.into());
        self
    }

    /// Declared type, defaulting to `"string"`.
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(DEFAULT_KIND)
    }
}

/// A named attribute in a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub spec: FieldSpec,
}

/// Ordered set of attributes.
///
/// Deserializes from a JSON object whose keys are attribute names; document
/// order is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Schema {
    fields: Vec<Field>,
}

impl TryFrom<Map<String, Value>> for Schema {
    type Error = serde_json::Error;

    fn try_from(object: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut schema = Schema::new();
        for (name, spec) in object {
            schema = schema.with_field(name, serde_json::from_value(spec)?);
        }
        Ok(schema)
    }
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a schema from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Appends a field, replacing any existing field with the same name.
    pub fn with_field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|field| field.name == name) {
            Some(field) => field.spec = spec,
            None => self.fields.push(Field { name, spec }),
        }
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Groups fields by `parallel_key`, in order of each key's first
    /// appearance. Fields without a key belong to no group.
    pub fn split_by_parallel_key(&self) -> Vec<(String, Schema)> {
        let mut groups: Vec<(String, Schema)> = Vec::new();
        for field in &self.fields {
            let Some(key) = field.spec.parallel_key.as_deref() else {
                continue;
            };
            match groups.iter_mut().find(|(existing, _)| existing == key) {
                Some((_, schema)) => schema.fields.push(field.clone()),
                None => groups.push((
                    key.to_string(),
                    Schema {
                        fields: vec![field.clone()],
                    },
                )),
            }
        }
        groups
    }

    /// Comma separated attribute names.
    fn param_list(&self) -> String {
        self.fields
            .iter()
            .map(|field| field.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Example object built from every field's example.
    fn example(&self) -> Value {
        let object: Map<String, Value> = self
            .fields
            .iter()
            .map(|field| {
                let example = field
                    .spec
                    .example
                    .as_deref()
                    .map(|example| Value::String(normalize_whitespace(example)))
                    .unwrap_or(Value::Null);
                (field.name.clone(), example)
            })
            .collect();
        Value::Object(object)
    }
}

/// Per-call prompt options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptOptions {
    /// Extra rules appended after the attribute definitions.
    pub additional_laws: Vec<String>,
}

impl PromptOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_additional_law(mut self, law: impl Into<String>) -> Self {
        self.additional_laws.push(law.into());
        self
    }
}

/// Renders prompts from a task, a schema and a JSON input.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    intro: String,
    laws: Vec<String>,
    input_intro: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            intro: DEFAULT_INTRO.to_string(),
            laws: DEFAULT_LAWS.iter().map(|law| law.to_string()).collect(),
            input_intro: DEFAULT_INPUT_INTRO.to_string(),
        }
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the opening instruction.
    pub fn with_intro(mut self, intro: impl Into<String>) -> Self {
        self.intro = intro.into();
        self
    }

    /// Replaces the built-in rules.
    pub fn with_laws<I, S>(mut self, laws: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.laws = laws.into_iter().map(Into::into).collect();
        self
    }

    /// Renders one prompt asking for every field of `schema`.
    pub fn create_prompt(
        &self,
        task: &str,
        schema: &Schema,
        input: &Value,
        options: &PromptOptions,
    ) -> String {
        let mut sections = Vec::with_capacity(8);

        sections.push(self.intro.clone());
        sections.push(self.render_laws());
        sections.push(task.to_string());
        sections.push(format!(
            "Instructions for how analyze the request.\n\
             You will return a JSON that contains the following attributes in this order:\n{}",
            schema.param_list()
        ));

        let definitions: Vec<String> = schema
            .fields()
            .iter()
            .map(|field| format!("{} - {}", field.name, field.spec.definition))
            .collect();
        sections.push(format!(
            "The attributes have the following definitions, please read carefully.\n{}",
            definitions.join("\n")
        ));

        if !options.additional_laws.is_empty() {
            sections.push(options.additional_laws.join("\n"));
        }

        sections.push(format!(
            "Example of the structure you should return:\n{}",
            schema.example()
        ));
        sections.push(format!("{}\n{}", self.input_intro, input));

        sections.join("\n\n")
    }

    /// Renders one prompt per `parallel_key` group of `schema`.
    ///
    /// Fields without a `parallel_key` are not requested. Returns no prompts
    /// when no field has a key.
    pub fn create_prompts(
        &self,
        task: &str,
        schema: &Schema,
        input: &Value,
        options: &PromptOptions,
    ) -> Vec<String> {
        schema
            .split_by_parallel_key()
            .iter()
            .map(|(_, group)| self.create_prompt(task, group, input, options))
            .collect()
    }

    fn render_laws(&self) -> String {
        let laws: Vec<String> = self
            .laws
            .iter()
            .enumerate()
            .map(|(index, law)| format!("Law {}: {}", index + 1, law))
            .collect();
        format!(
            "You will abide by the following laws:\n{}",
            laws.join("\n")
        )
    }
}
