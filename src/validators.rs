//! Request payload validation
//!
//! Each payload is checked by an explicit function built from small rules.
//! Problems are collected per field instead of stopping at the first one,
//! and the summary message groups them into missing keys, invalid values
//! and keys that are not allowed.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::Role;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MAX_LOCAL_PART_LENGTH: usize = 64;
const MIN_NAME_LENGTH: usize = 3;
const MAX_NAME_LENGTH: usize = 20;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;
const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).unwrap();

    static ref NAME_START_REGEX: Regex = Regex::new(r"^[a-zA-Z_]").unwrap();
    static ref NAME_CHARSET_REGEX: Regex = Regex::new(r"^[a-zA-Z. _-]+$").unwrap();
}

/// Messages collected for a single payload key
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldError {
    pub key: String,
    pub messages: Vec<String>,
}

/// A rejected payload: summary message plus per-field detail
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors {
    pub message: String,
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Rejection of the body as a whole (not an object, not JSON, ...).
    pub fn body(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn field(&self, key: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.key == key)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IssueKind {
    Required,
    Invalid,
    Unknown,
}

/// Collects issues while a payload is being checked
#[derive(Debug, Default)]
pub struct FieldErrors {
    issues: Vec<(IssueKind, String, String)>,
}

impl FieldErrors {
    fn push(&mut self, kind: IssueKind, key: &str, message: impl Into<String>) {
        self.issues.push((kind, key.to_string(), message.into()));
    }

    pub fn required(&mut self, key: &str, message: impl Into<String>) {
        self.push(IssueKind::Required, key, message);
    }

    pub fn invalid(&mut self, key: &str, message: impl Into<String>) {
        self.push(IssueKind::Invalid, key, message);
    }

    pub fn unknown(&mut self, key: &str) {
        self.push(IssueKind::Unknown, key, format!("{} is not allowed", key));
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.issues.is_empty() {
            return Ok(value());
        }

        let mut parts = Vec::new();
        let mut errors = Vec::new();

        for kind in [IssueKind::Required, IssueKind::Invalid, IssueKind::Unknown] {
            let grouped = self.group(kind);
            if grouped.is_empty() {
                continue;
            }
            let keys: Vec<&str> = grouped.iter().map(|e| e.key.as_str()).collect();
            let plural = keys.len() > 1;
            let summary = match kind {
                IssueKind::Required if plural => "keys are required",
                IssueKind::Required => "key is required",
                IssueKind::Invalid if plural => "are invalid input values",
                IssueKind::Invalid => "is invalid input value",
                IssueKind::Unknown if plural => "are extra keys not allowed",
                IssueKind::Unknown => "is extra key not allowed",
            };
            parts.push(format!("{} {}", keys.join(", "), summary));
            errors.extend(grouped);
        }

        Err(ValidationErrors {
            message: parts.join(" and "),
            errors,
        })
    }

    fn group(&self, kind: IssueKind) -> Vec<FieldError> {
        let mut grouped: Vec<FieldError> = Vec::new();
        for (_, key, message) in self.issues.iter().filter(|(k, _, _)| *k == kind) {
            match grouped.iter_mut().find(|e| &e.key == key) {
                Some(existing) => existing.messages.push(message.clone()),
                None => grouped.push(FieldError {
                    key: key.clone(),
                    messages: vec![message.clone()],
                }),
            }
        }
        grouped
    }
}

/// A single check on a string value
#[derive(Clone, Copy)]
pub enum Rule {
    NonEmpty(&'static str),
    MinLen(usize, &'static str),
    MaxLen(usize, &'static str),
    Trimmed(&'static str),
    Holds(fn(&str) -> bool, &'static str),
}

impl Rule {
    /// Returns the failure message, or `None` when the value passes.
    pub fn check(&self, value: &str) -> Option<&'static str> {
        let ok = match self {
            Rule::NonEmpty(_) => !value.is_empty(),
            Rule::MinLen(min, _) => value.chars().count() >= *min,
            Rule::MaxLen(max, _) => value.chars().count() <= *max,
            Rule::Trimmed(_) => value == value.trim(),
            Rule::Holds(predicate, _) => predicate(value),
        };
        if ok {
            return None;
        }
        Some(match self {
            Rule::NonEmpty(m)
            | Rule::MinLen(_, m)
            | Rule::MaxLen(_, m)
            | Rule::Trimmed(m)
            | Rule::Holds(_, m) => *m,
        })
    }
}

/// Runs every rule and records each failure under `key`.
pub fn apply_rules(key: &str, value: &str, rules: &[Rule], errors: &mut FieldErrors) -> bool {
    let mut passed = true;
    for rule in rules {
        if let Some(message) = rule.check(value) {
            errors.invalid(key, message);
            passed = false;
        }
    }
    passed
}

pub const EMAIL_RULES: &[Rule] = &[
    Rule::MaxLen(MAX_EMAIL_LENGTH, "Email is too long"),
    Rule::Holds(is_email_format, "Invalid email format"),
];

pub const LOGIN_PASSWORD_RULES: &[Rule] = &[Rule::NonEmpty("Password is required")];

pub const NAME_RULES: &[Rule] = &[
    Rule::MinLen(MIN_NAME_LENGTH, "Name must be at least 3 characters long"),
    Rule::MaxLen(MAX_NAME_LENGTH, "Name cannot exceed 20 characters"),
    Rule::Holds(
        starts_with_letter_or_underscore,
        "Name must start with a letter (a-z, A-Z) or an underscore (_)",
    ),
    Rule::Holds(
        has_name_charset,
        "Name can only include letters, dots (.), hyphens (-), and underscores (_)",
    ),
    Rule::Holds(no_trailing_dot_or_hyphen, "Name cannot end with a dot (.) or hyphen (-)"),
    Rule::Holds(
        no_repeated_separators,
        "Name cannot contain consecutive dots (..) or hyphens (--)",
    ),
    Rule::Holds(
        no_mixed_separators,
        "Name cannot have mixed consecutive special characters like '.-' or '-.'",
    ),
];

pub const PASSWORD_RULES: &[Rule] = &[
    Rule::MinLen(MIN_PASSWORD_LENGTH, "Password must be at least 8 characters"),
    Rule::MaxLen(MAX_PASSWORD_LENGTH, "Password cannot exceed 128 characters"),
    Rule::Trimmed("Password cannot start or end with whitespace"),
    Rule::Holds(has_lowercase, "Password must include at least one lowercase letter"),
    Rule::Holds(has_uppercase, "Password must include at least one uppercase letter"),
    Rule::Holds(has_digit, "Password must include at least one digit"),
];

/// Checks email shape: one `@`, bounded local part, no NUL, RFC 5322-ish.
pub fn is_email_format(email: &str) -> bool {
    if email.contains('\0') || email.matches('@').count() != 1 {
        return false;
    }
    match email.find('@') {
        Some(at) if at <= MAX_LOCAL_PART_LENGTH => EMAIL_REGEX.is_match(email),
        _ => false,
    }
}

/// Lower-cased, trimmed form used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn starts_with_letter_or_underscore(v: &str) -> bool {
    NAME_START_REGEX.is_match(v)
}

fn has_name_charset(v: &str) -> bool {
    NAME_CHARSET_REGEX.is_match(v)
}

fn no_trailing_dot_or_hyphen(v: &str) -> bool {
    !(v.ends_with('.') || v.ends_with('-'))
}

fn no_repeated_separators(v: &str) -> bool {
    !(v.contains("..") || v.contains("--"))
}

fn no_mixed_separators(v: &str) -> bool {
    !(v.contains(".-") || v.contains("-."))
}

fn has_lowercase(v: &str) -> bool {
    v.chars().any(|c| c.is_ascii_lowercase())
}

fn has_uppercase(v: &str) -> bool {
    v.chars().any(|c| c.is_ascii_uppercase())
}

fn has_digit(v: &str) -> bool {
    v.chars().any(|c| c.is_ascii_digit())
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, ValidationErrors> {
    body.as_object()
        .ok_or_else(|| ValidationErrors::body("Request body must be a JSON object"))
}

fn reject_unknown_keys(object: &Map<String, Value>, allowed: &[&str], errors: &mut FieldErrors) {
    for key in object.keys() {
        if !allowed.contains(&key.as_str()) {
            errors.unknown(key);
        }
    }
}

/// Reads a mandatory string; missing, null or non-string values are recorded.
fn required_string(
    object: &Map<String, Value>,
    key: &str,
    missing: &str,
    not_string: &str,
    errors: &mut FieldErrors,
) -> Option<String> {
    match object.get(key) {
        None | Some(Value::Null) => {
            errors.required(key, missing);
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.required(key, not_string);
            None
        }
    }
}

fn email_field(object: &Map<String, Value>, errors: &mut FieldErrors) -> Option<String> {
    let raw = required_string(object, "email", "Email is required", "Invalid email format", errors)?;
    let trimmed = raw.trim();
    if apply_rules("email", trimmed, EMAIL_RULES, errors) {
        Some(normalize_email(trimmed))
    } else {
        None
    }
}

/// Validated login payload
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

/// `{ email, password }`, strict.
pub fn validate_login(body: &Value) -> Result<LoginCredentials, ValidationErrors> {
    let object = as_object(body)?;
    let mut errors = FieldErrors::default();

    let email = email_field(object, &mut errors);
    let password = required_string(
        object,
        "password",
        "Password is required",
        "Password must be a string",
        &mut errors,
    )
    .filter(|p| apply_rules("password", p, LOGIN_PASSWORD_RULES, &mut errors));
    reject_unknown_keys(object, &["email", "password"], &mut errors);

    errors.finish(|| LoginCredentials {
        email: email.unwrap_or_default(),
        password: password.unwrap_or_default(),
    })
}

/// Validated signup payload
#[derive(Debug, Clone)]
pub struct SignupData {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// `{ name, email, password }`, strict.
pub fn validate_signup(body: &Value) -> Result<SignupData, ValidationErrors> {
    let object = as_object(body)?;
    let mut errors = FieldErrors::default();

    let name = required_string(object, "name", "Name is required", "Name must be a string", &mut errors)
        .map(|n| n.trim().to_string())
        .filter(|n| apply_rules("name", n, NAME_RULES, &mut errors));
    let email = email_field(object, &mut errors);
    let password = required_string(
        object,
        "password",
        "Password is required",
        "Password must be a string",
        &mut errors,
    )
    .filter(|p| apply_rules("password", p, PASSWORD_RULES, &mut errors));
    reject_unknown_keys(object, &["name", "email", "password"], &mut errors);

    errors.finish(|| SignupData {
        name: name.unwrap_or_default(),
        email: email.unwrap_or_default(),
        password: password.unwrap_or_default(),
    })
}

/// Validated admin update of a user account
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub email_verified: bool,
    pub banned: Option<bool>,
    /// `Some(None)` when the payload sent an explicit `null`.
    pub ban_reason: Option<Option<String>>,
    pub restore: bool,
}

const USER_UPDATE_KEYS: &[&str] = &["name", "role", "emailVerified", "banned", "banReason", "restore"];

/// Admin `PATCH` payload; `restore` excludes every other non-null field.
pub fn validate_user_update(body: &Value) -> Result<UserUpdate, ValidationErrors> {
    let object = as_object(body)?;
    let mut errors = FieldErrors::default();
    let mut update = UserUpdate::default();

    match object.get("name") {
        None => {}
        Some(Value::String(s)) => {
            let trimmed = s.trim().to_string();
            if apply_rules("name", &trimmed, NAME_RULES, &mut errors) {
                update.name = Some(trimmed);
            }
        }
        Some(_) => errors.required("name", "Name must be a string"),
    }

    match object.get("role") {
        None => {}
        Some(Value::String(s)) if Role::parse(s).is_some() => update.role = Role::parse(s),
        Some(_) => errors.invalid("role", "role expected only user or admin"),
    }

    match object.get("emailVerified") {
        None => {}
        Some(Value::Bool(true)) => update.email_verified = true,
        Some(_) => errors.invalid("emailVerified", "emailVerified expected true"),
    }

    match object.get("banned") {
        None => {}
        Some(Value::Bool(b)) => update.banned = Some(*b),
        Some(_) => errors.required("banned", "banned expected boolean"),
    }

    match object.get("banReason") {
        None => {}
        Some(Value::Null) => update.ban_reason = Some(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim().to_string();
            if apply_rules("banReason", &trimmed, &[Rule::NonEmpty("Banned reason is required")], &mut errors) {
                update.ban_reason = Some(Some(trimmed));
            }
        }
        Some(_) => errors.required("banReason", "banReason expected string"),
    }

    match object.get("restore") {
        None => {}
        Some(Value::Bool(true)) => {
            let others = object
                .iter()
                .filter(|(k, v)| k.as_str() != "restore" && !v.is_null())
                .count();
            if others > 0 {
                errors.invalid("restore", "No other fields allowed when restore is true");
            } else {
                update.restore = true;
            }
        }
        Some(_) => errors.invalid("restore", "restore expected true"),
    }

    reject_unknown_keys(object, USER_UPDATE_KEYS, &mut errors);

    errors.finish(|| update)
}

/// Raw query string of the admin user listing
#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub role: Option<String>,
    pub search: Option<String>,
}

/// Validated admin user listing request
#[derive(Debug, Clone, PartialEq)]
pub struct UserListQuery {
    pub page: i64,
    pub limit: i64,
    pub role: Role,
    pub search: Option<String>,
}

impl UserListQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

fn bounded_number(value: Option<&str>, default: i64, max: i64) -> Option<i64> {
    match value.map(str::trim) {
        None | Some("") => Some(default),
        Some(raw) => raw.parse::<i64>().ok().filter(|n| (1..=max).contains(n)),
    }
}

/// Defaults: page 1, 10 per page, role `user`, no search.
pub fn validate_user_list(params: &UserListParams) -> Result<UserListQuery, ValidationErrors> {
    let mut errors = FieldErrors::default();

    // Page numbers beyond this would overflow the offset.
    let page = bounded_number(params.page.as_deref(), 1, i64::MAX / MAX_PAGE_SIZE);
    if page.is_none() {
        errors.invalid("page", "page expected a positive number");
    }

    let limit = bounded_number(params.limit.as_deref(), DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    if limit.is_none() {
        errors.invalid("limit", format!("limit expected a number from 1 to {}", MAX_PAGE_SIZE));
    }

    let role = match params.role.as_deref() {
        None => Some(Role::User),
        Some(s) => Role::parse(s),
    };
    if role.is_none() {
        errors.invalid("role", "role expected only user or admin");
    }

    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    errors.finish(|| UserListQuery {
        page: page.unwrap_or(1),
        limit: limit.unwrap_or(DEFAULT_PAGE_SIZE),
        role: role.unwrap_or(Role::User),
        search,
    })
}
