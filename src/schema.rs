use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TITLE_MAX_LENGTH: usize = 200;

/// Key for errors that belong to the payload as a whole.
pub const NON_FIELD_ERRORS: &str = "__all__";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub message: String,
    pub code: &'static str,
}

impl FieldError {
    fn new(message: impl Into<String>, code: &'static str) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    fn required() -> Self {
        Self::new("This field is required.", "required")
    }

    fn invalid(message: &str) -> Self {
        Self::new(message, "invalid")
    }
}

/// Field name to the list of problems found with it, serialized as a plain map.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<FieldError>>);

impl FieldErrors {
    pub fn single(field: &str, error: FieldError) -> Self {
        let mut errors = Self::default();
        errors.add(field, error);
        errors
    }

    pub fn add(&mut self, field: &str, error: FieldError) {
        self.0.entry(field.to_owned()).or_default().push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[FieldError]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn collect<T>(&mut self, field: &str, result: Result<T, FieldError>) -> Option<T> {
        result.map_err(|error| self.add(field, error)).ok()
    }
}

/// Validated values of every editable task field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFields {
    pub title: String,
    pub description: String,
    pub due_on: Option<NaiveDate>,
    pub show_on: Option<NaiveDate>,
    pub completed: bool,
}

/// Raw, unvalidated task values as they arrived in a payload. `None` means
/// the key was absent; an explicit JSON `null` is `Some(Value::Null)`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TaskPatch {
    pub title: Option<Value>,
    pub description: Option<Value>,
    pub due_on: Option<Value>,
    pub show_on: Option<Value>,
    pub completed: Option<Value>,
}

impl TaskPatch {
    pub fn from_payload(payload: Option<&Value>) -> Result<Self, FieldErrors> {
        match payload {
            None => Ok(Self::default()),
            Some(Value::Object(map)) => Ok(Self {
                title: map.get("title").cloned(),
                description: map.get("description").cloned(),
                due_on: map.get("due_on").cloned(),
                show_on: map.get("show_on").cloned(),
                completed: map.get("completed").cloned(),
            }),
            Some(_) => Err(expected_object()),
        }
    }

    /// Fills every field the payload left out with the stored value.
    pub fn merge(self, current: &TaskFields) -> Self {
        let stored = Self::from(current);
        Self {
            title: self.title.or(stored.title),
            description: self.description.or(stored.description),
            due_on: self.due_on.or(stored.due_on),
            show_on: self.show_on.or(stored.show_on),
            completed: self.completed.or(stored.completed),
        }
    }

    pub fn validate(&self) -> Result<TaskFields, FieldErrors> {
        let mut errors = FieldErrors::default();

        let title = errors.collect("title", clean_title(self.title.as_ref()));
        let description =
            errors.collect("description", clean_text(self.description.as_ref(), true));
        let due_on = errors.collect("due_on", clean_date(self.due_on.as_ref()));
        let show_on = errors.collect("show_on", clean_date(self.show_on.as_ref()));
        let completed = errors.collect("completed", clean_boolean(self.completed.as_ref()));

        match (title, description, due_on, show_on, completed) {
            (Some(title), Some(description), Some(due_on), Some(show_on), Some(completed)) => {
                Ok(TaskFields {
                    title,
                    description,
                    due_on,
                    show_on,
                    completed,
                })
            }
            _ => Err(errors),
        }
    }
}

impl From<&TaskFields> for TaskPatch {
    fn from(fields: &TaskFields) -> Self {
        Self {
            title: Some(Value::from(fields.title.as_str())),
            description: Some(Value::from(fields.description.as_str())),
            due_on: Some(date_value(fields.due_on)),
            show_on: Some(date_value(fields.show_on)),
            completed: Some(Value::from(fields.completed)),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct NotePatch {
    pub text: Option<Value>,
}

impl NotePatch {
    pub fn from_payload(payload: Option<&Value>) -> Result<Self, FieldErrors> {
        match payload {
            None => Ok(Self::default()),
            Some(Value::Object(map)) => Ok(Self {
                text: map.get("text").cloned(),
            }),
            Some(_) => Err(expected_object()),
        }
    }

    pub fn merge(self, current_text: &str) -> Self {
        Self {
            text: self.text.or_else(|| Some(Value::from(current_text))),
        }
    }

    /// Note text keeps its whitespace; it is free-form.
    pub fn validate(&self) -> Result<String, FieldErrors> {
        clean_text(self.text.as_ref(), false).map_err(|error| FieldErrors::single("text", error))
    }
}

/// Named subsets of a user's tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskGroup {
    Current,
    Future,
    Complete,
}

impl TaskGroup {
    pub fn parse(value: &str) -> Result<Self, FieldErrors> {
        match value {
            "current" => Ok(Self::Current),
            "future" => Ok(Self::Future),
            "complete" => Ok(Self::Complete),
            other => Err(FieldErrors::single(
                "group",
                FieldError::new(
                    format!("Select a valid choice. {other} is not one of the available choices."),
                    "invalid_choice",
                ),
            )),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListTasksParams {
    pub group: Option<String>,
}

impl ListTasksParams {
    pub fn group(&self) -> Result<Option<TaskGroup>, FieldErrors> {
        self.group.as_deref().map(TaskGroup::parse).transpose()
    }
}

fn expected_object() -> FieldErrors {
    FieldErrors::single(NON_FIELD_ERRORS, FieldError::invalid("Expected a JSON object."))
}

fn date_value(date: Option<NaiveDate>) -> Value {
    date.map_or(Value::Null, |date| {
        Value::from(date.format(DATE_FORMAT).to_string())
    })
}

fn clean_title(value: Option<&Value>) -> Result<String, FieldError> {
    let title = match value {
        None | Some(Value::Null) => return Err(FieldError::required()),
        Some(value) => scalar_text(value).ok_or_else(|| FieldError::invalid("Enter a valid value."))?,
    };
    let title = title.trim();
    if title.is_empty() {
        return Err(FieldError::required());
    }

    let length = title.chars().count();
    if length > TITLE_MAX_LENGTH {
        return Err(FieldError::new(
            format!("Ensure this value has at most {TITLE_MAX_LENGTH} characters (it has {length})."),
            "max_length",
        ));
    }
    Ok(title.to_owned())
}

fn clean_text(value: Option<&Value>, strip: bool) -> Result<String, FieldError> {
    let text = match value {
        None | Some(Value::Null) => return Ok(String::new()),
        Some(value) => scalar_text(value).ok_or_else(|| FieldError::invalid("Enter a valid value."))?,
    };
    Ok(if strip { text.trim().to_owned() } else { text })
}

/// Text form of a JSON scalar. Numbers and booleans are accepted in text
/// fields and stored as they print (`42`, `True`); arrays and objects are not.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(true) => Some("True".to_owned()),
        Value::Bool(false) => Some("False".to_owned()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn clean_date(value: Option<&Value>) -> Result<Option<NaiveDate>, FieldError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
            .map(Some)
            .map_err(|_| FieldError::invalid("Enter a valid date.")),
        Some(_) => Err(FieldError::invalid("Enter a valid date.")),
    }
}

fn clean_boolean(value: Option<&Value>) -> Result<bool, FieldError> {
    match value {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::Number(number)) => Ok(number.as_f64() != Some(0.0)),
        Some(Value::String(text)) => Ok(!matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "" | "false" | "0"
        )),
        Some(_) => Err(FieldError::invalid("Enter a valid boolean.")),
    }
}
