use thiserror::Error;

/// Default name for the nested exception section.
pub const EXCEPTION_DEFAULT: &str = "exception";
/// Default name for the nested caller section.
pub const CALLER_DEFAULT: &str = "caller";
/// Default name for the nested context (MDC) section.
pub const CONTEXT_DEFAULT: &str = "mdc";

/// Error type returned when configuring field names.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown field-name scheme: {0}")]
    UnknownScheme(String),

    #[error("grouping key must be non-empty")]
    EmptyGroupName,

    #[error("grouping key {0:?} collides with another configured field name")]
    GroupNameCollision(String),
}

/// Names of the fields that appear in the JSON output.
///
/// One registry instance belongs to one layout and maps logical field
/// concepts to their output keys. The three grouping slots (`exception`,
/// `caller`, `context`) decide output shape: while a slot holds a name, that
/// section is nested under it; while it is absent, the section's keys are
/// merged into the root document. [`set_flatten_output`] toggles all three
/// slots together.
///
/// [`set_flatten_output`]: FieldNames::set_flatten_output
#[derive(Debug, Clone)]
pub struct FieldNames {
    pub timestamp: String,
    pub version: String,
    pub message: String,
    pub host_name: String,
    pub logger: String,
    pub thread: String,
    pub level: String,
    pub caller_class: String,
    pub caller_method: String,
    pub caller_file: String,
    pub caller_line: String,
    pub exception_class: String,
    pub exception_message: String,
    pub stack_trace: String,
    pub ndc: String,
    exception_group: Option<String>,
    caller_group: Option<String>,
    context_group: Option<String>,
    // Last non-empty grouping names, restored when flattening is disabled.
    saved_exception_group: String,
    saved_caller_group: String,
    saved_context_group: String,
}

impl Default for FieldNames {
    /// The configurable-name scheme: lowercase single-word keys, grouping
    /// slots empty so the output starts out flattened.
    fn default() -> Self {
        FieldNames {
            timestamp: "@timestamp".to_string(),
            version: "@version".to_string(),
            message: "message".to_string(),
            host_name: "hostname".to_string(),
            logger: "loggername".to_string(),
            thread: "threadname".to_string(),
            level: "level".to_string(),
            caller_class: "classname".to_string(),
            caller_method: "methodname".to_string(),
            caller_file: "filename".to_string(),
            caller_line: "linenumber".to_string(),
            exception_class: "exceptionclass".to_string(),
            exception_message: "exceptionmessage".to_string(),
            stack_trace: "stacktrace".to_string(),
            ndc: "ndc".to_string(),
            exception_group: None,
            caller_group: None,
            context_group: None,
            saved_exception_group: EXCEPTION_DEFAULT.to_string(),
            saved_caller_group: CALLER_DEFAULT.to_string(),
            saved_context_group: CONTEXT_DEFAULT.to_string(),
        }
    }
}

impl FieldNames {
    /// Names used by the oldest wire format: `@`-prefixed root keys,
    /// camel-case logger/thread keys, exception and context nested.
    pub fn logstash_v0() -> Self {
        FieldNames {
            timestamp: "@timestamp".to_string(),
            version: "@version".to_string(),
            message: "@message".to_string(),
            host_name: "@source_host".to_string(),
            logger: "loggerName".to_string(),
            thread: "threadName".to_string(),
            caller_file: "file".to_string(),
            caller_line: "line_number".to_string(),
            caller_class: "class".to_string(),
            caller_method: "method".to_string(),
            exception_class: "exception_class".to_string(),
            exception_message: "exception_message".to_string(),
            exception_group: Some(EXCEPTION_DEFAULT.to_string()),
            caller_group: None,
            context_group: Some(CONTEXT_DEFAULT.to_string()),
            ..Self::default()
        }
    }

    /// Names used by the v1 wire format: snake-case keys at the root,
    /// exception and context nested, caller keys flat.
    pub fn logstash_v1() -> Self {
        FieldNames {
            message: "message".to_string(),
            host_name: "source_host".to_string(),
            logger: "logger_name".to_string(),
            thread: "thread_name".to_string(),
            caller_file: "file".to_string(),
            caller_line: "line_number".to_string(),
            caller_class: "class".to_string(),
            caller_method: "method".to_string(),
            exception_class: "exception_class".to_string(),
            exception_message: "exception_message".to_string(),
            exception_group: Some(EXCEPTION_DEFAULT.to_string()),
            caller_group: None,
            context_group: Some(CONTEXT_DEFAULT.to_string()),
            ..Self::default()
        }
    }

    /// Look up a registry by identifier.
    ///
    /// Known identifiers: `default`/`logstash`/`v2`, `v0`/`logstash-v0`,
    /// `v1`/`logstash-v1`. Unknown identifiers are a configuration error;
    /// callers are expected to keep their previous registry in that case.
    pub fn for_scheme(id: &str) -> Result<Self, ConfigError> {
        match id {
            "default" | "logstash" | "v2" => Ok(Self::default()),
            "v0" | "logstash-v0" => Ok(Self::logstash_v0()),
            "v1" | "logstash-v1" => Ok(Self::logstash_v1()),
            other => Err(ConfigError::UnknownScheme(other.to_string())),
        }
    }

    pub fn exception_group(&self) -> Option<&str> {
        self.exception_group.as_deref()
    }

    pub fn caller_group(&self) -> Option<&str> {
        self.caller_group.as_deref()
    }

    pub fn context_group(&self) -> Option<&str> {
        self.context_group.as_deref()
    }

    /// Name the nested exception section. Fails on empty or colliding names
    /// and leaves the registry unchanged in that case.
    pub fn set_exception_group(&mut self, name: impl Into<String>) -> Result<(), ConfigError> {
        let name = name.into();
        self.validate_group_name(&name, Slot::Exception)?;
        self.saved_exception_group = name.clone();
        self.exception_group = Some(name);
        Ok(())
    }

    /// Name the nested caller section. Same validation as
    /// [`set_exception_group`](FieldNames::set_exception_group).
    pub fn set_caller_group(&mut self, name: impl Into<String>) -> Result<(), ConfigError> {
        let name = name.into();
        self.validate_group_name(&name, Slot::Caller)?;
        self.saved_caller_group = name.clone();
        self.caller_group = Some(name);
        Ok(())
    }

    /// Name the nested context section. Same validation as
    /// [`set_exception_group`](FieldNames::set_exception_group).
    pub fn set_context_group(&mut self, name: impl Into<String>) -> Result<(), ConfigError> {
        let name = name.into();
        self.validate_group_name(&name, Slot::Context)?;
        self.saved_context_group = name.clone();
        self.context_group = Some(name);
        Ok(())
    }

    /// Toggle flattened output for all three grouped sections at once.
    ///
    /// Enabling clears every grouping slot so the exception, caller and
    /// context keys merge into the root document. Disabling restores each
    /// slot to its last non-empty name, falling back to the documented
    /// defaults for slots that never held one.
    pub fn set_flatten_output(&mut self, flatten: bool) {
        if flatten {
            if let Some(name) = self.exception_group.take() {
                self.saved_exception_group = name;
            }
            if let Some(name) = self.caller_group.take() {
                self.saved_caller_group = name;
            }
            if let Some(name) = self.context_group.take() {
                self.saved_context_group = name;
            }
        } else {
            self.exception_group = Some(self.saved_exception_group.clone());
            self.caller_group = Some(self.saved_caller_group.clone());
            self.context_group = Some(self.saved_context_group.clone());
        }
    }

    /// The names every schema version emits regardless of configuration.
    pub fn list_common_names(&self) -> Vec<&str> {
        vec![&self.timestamp, &self.message, &self.version]
    }

    /// All currently configured output keys, for completeness checks.
    pub fn list_names(&self) -> Vec<&str> {
        let mut names = self.list_common_names();
        names.extend([
            self.host_name.as_str(),
            self.logger.as_str(),
            self.thread.as_str(),
            self.level.as_str(),
            self.caller_class.as_str(),
            self.caller_method.as_str(),
            self.caller_file.as_str(),
            self.caller_line.as_str(),
            self.exception_class.as_str(),
            self.exception_message.as_str(),
            self.stack_trace.as_str(),
            self.ndc.as_str(),
        ]);
        names
    }

    fn validate_group_name(&self, name: &str, slot: Slot) -> Result<(), ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::EmptyGroupName);
        }
        let collides_with_group = |other: Option<&str>| other == Some(name);
        let taken = self.list_names().contains(&name)
            || (slot != Slot::Exception && collides_with_group(self.exception_group()))
            || (slot != Slot::Caller && collides_with_group(self.caller_group()))
            || (slot != Slot::Context && collides_with_group(self.context_group()));
        if taken {
            return Err(ConfigError::GroupNameCollision(name.to_string()));
        }
        Ok(())
    }
}

#[derive(PartialEq)]
enum Slot {
    Exception,
    Caller,
    Context,
}
