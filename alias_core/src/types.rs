use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::paths::{like_contains, like_eq};

/// Maximum length of a context identifier (the width of the `context`
/// column).
pub const MAX_CONTEXT_LENGTH: usize = 32;

/// Opaque identifier of a persisted alias row. Assigned on insert, never
/// reused; ordering follows insertion order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AliasId(i64);

impl AliasId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for AliasId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Language tag of an alias, or the "not specified" sentinel `und`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Langcode(String);

impl Langcode {
    pub const NOT_SPECIFIED: &'static str = "und";

    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn not_specified() -> Self {
        Self(Self::NOT_SPECIFIED.to_string())
    }

    pub fn is_not_specified(&self) -> bool {
        self.0 == Self::NOT_SPECIFIED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Languages a lookup for `self` may match, most preferred first.
    pub fn lookup_candidates(&self) -> Vec<Langcode> {
        if self.is_not_specified() {
            vec![self.clone()]
        } else {
            vec![self.clone(), Self::not_specified()]
        }
    }
}

impl Default for Langcode {
    fn default() -> Self {
        Self::not_specified()
    }
}

impl std::fmt::Display for Langcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Langcode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Identifier of a context partition (tenant, brand, ...).
///
/// Non-empty and at most [`MAX_CONTEXT_LENGTH`] characters. The absence of a
/// context ("global") is modelled as `Option::<ContextId>::None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContextId(String);

impl ContextId {
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() || id.chars().count() > MAX_CONTEXT_LENGTH {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ContextId {
    type Error = errors::AliasError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id).ok_or_else(|| {
            errors::AliasError::invalid_input(
                "context",
                format!("context identifier must be 1 to {MAX_CONTEXT_LENGTH} characters"),
            )
        })
    }
}

impl From<ContextId> for String {
    fn from(id: ContextId) -> Self {
        id.0
    }
}

impl std::str::FromStr for ContextId {
    type Err = errors::AliasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

/// A persisted alias row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRecord {
    pub pid: AliasId,
    pub source: String,
    pub alias: String,
    pub langcode: Langcode,
    pub context: Option<ContextId>,
}

impl AliasRecord {
    pub fn fields(&self) -> AliasFields {
        AliasFields {
            source: self.source.clone(),
            alias: self.alias.clone(),
            langcode: self.langcode.clone(),
            context: self.context.clone(),
        }
    }
}

/// Column values written on insert or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasFields {
    pub source: String,
    pub alias: String,
    pub langcode: Langcode,
    pub context: Option<ContextId>,
}

impl AliasFields {
    pub fn into_record(self, pid: AliasId) -> AliasRecord {
        AliasRecord {
            pid,
            source: self.source,
            alias: self.alias,
            langcode: self.langcode,
            context: self.context,
        }
    }

    /// Whether two rows occupy the same `(alias, langcode, context)` slot.
    pub fn collides_with(&self, other: &AliasFields) -> bool {
        like_eq(&self.alias, &other.alias)
            && self.langcode == other.langcode
            && self.context == other.context
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SaveOperation {
    Insert,
    Update,
}

/// Payload handed to save-hook observers after a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasSaveEvent {
    pub operation: SaveOperation,
    pub pid: AliasId,
    pub fields: AliasFields,
    /// Row as it was before an update; `None` for inserts or when the prior
    /// row could not be read.
    pub original: Option<AliasRecord>,
}

/// How a query restricts the `context` column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContextFilter {
    #[default]
    Any,
    /// Only rows without a context.
    Global,
    Exactly(ContextId),
    /// Rows tagged with the context plus the global fallback layer.
    ExactOrGlobal(ContextId),
}

impl ContextFilter {
    /// Filter for "this context with global fallback", or global only when
    /// there is no context.
    pub fn scoped_to(context: Option<&ContextId>) -> Self {
        match context {
            Some(context) => Self::ExactOrGlobal(context.clone()),
            None => Self::Global,
        }
    }

    pub fn matches(&self, context: Option<&ContextId>) -> bool {
        match (self, context) {
            (Self::Any, _) => true,
            (Self::Global, row) => row.is_none(),
            (Self::Exactly(wanted), Some(row)) => wanted == row,
            (Self::Exactly(_), None) => false,
            (Self::ExactOrGlobal(_), None) => true,
            (Self::ExactOrGlobal(wanted), Some(row)) => wanted == row,
        }
    }
}

/// Conditions for selecting alias rows. `source`/`alias` match
/// case-insensitively and literally; everything else matches exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasQuery {
    pub pid: Option<AliasId>,
    /// Match any of these sources; empty means no restriction.
    pub sources: Vec<String>,
    pub exclude_source: Option<String>,
    pub alias: Option<String>,
    /// Match any of these languages; empty means no restriction.
    pub langcodes: Vec<Langcode>,
    pub context: ContextFilter,
    pub limit: Option<usize>,
}

impl AliasQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pid(mut self, pid: AliasId) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources.extend(sources.into_iter().map(Into::into));
        self
    }

    pub fn exclude_source(mut self, source: impl Into<String>) -> Self {
        self.exclude_source = Some(source.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn langcode(mut self, langcode: Langcode) -> Self {
        self.langcodes.push(langcode);
        self
    }

    pub fn langcodes(mut self, langcodes: Vec<Langcode>) -> Self {
        self.langcodes.extend(langcodes);
        self
    }

    pub fn context(mut self, filter: ContextFilter) -> Self {
        self.context = filter;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate the conditions against a row in process.
    pub fn matches(&self, record: &AliasRecord) -> bool {
        if self.pid.is_some_and(|pid| pid != record.pid) {
            return false;
        }
        if !self.sources.is_empty() && !self.sources.iter().any(|s| like_eq(s, &record.source)) {
            return false;
        }
        if self
            .exclude_source
            .as_deref()
            .is_some_and(|s| like_eq(s, &record.source))
        {
            return false;
        }
        if self
            .alias
            .as_deref()
            .is_some_and(|a| !like_eq(a, &record.alias))
        {
            return false;
        }
        if !self.langcodes.is_empty() && !self.langcodes.contains(&record.langcode) {
            return false;
        }
        self.context.matches(record.context.as_ref())
    }
}

/// Paged, alias-ordered listing filter for administrative overviews.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    pub alias_contains: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            alias_contains: None,
            offset: 0,
            limit: 50,
        }
    }
}

impl ListFilter {
    pub fn matches(&self, record: &AliasRecord) -> bool {
        self.alias_contains
            .as_deref()
            .is_none_or(|needle| like_contains(&record.alias, needle))
    }
}

/// A legacy redirect as returned by the redirect subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub id: i64,
    pub source_path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    pub redirect_uri: String,
    pub langcode: Langcode,
    pub status_code: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pid: i64, source: &str, alias: &str, lang: &str, ctx: Option<&str>) -> AliasRecord {
        AliasRecord {
            pid: AliasId::new(pid),
            source: source.to_string(),
            alias: alias.to_string(),
            langcode: Langcode::new(lang),
            context: ctx.and_then(ContextId::new),
        }
    }

    #[test]
    fn test_context_id_length_limits() {
        assert!(ContextId::new("").is_none());
        assert!(ContextId::new("a".repeat(MAX_CONTEXT_LENGTH)).is_some());
        assert!(ContextId::new("a".repeat(MAX_CONTEXT_LENGTH + 1)).is_none());
    }

    #[test]
    fn test_context_id_from_str() {
        let ctx: ContextId = "one".parse().unwrap();
        assert_eq!(ctx.as_str(), "one");
        assert!("".parse::<ContextId>().is_err());
    }

    #[test]
    fn test_context_id_deserialize_is_validated() {
        let ctx: ContextId = serde_json::from_str("\"one\"").unwrap();
        assert_eq!(ctx.as_str(), "one");
        assert_eq!(serde_json::to_string(&ctx).unwrap(), "\"one\"");

        assert!(serde_json::from_str::<ContextId>("\"\"").is_err());
        let too_long = format!("\"{}\"", "a".repeat(MAX_CONTEXT_LENGTH + 1));
        assert!(serde_json::from_str::<ContextId>(&too_long).is_err());

        let event = serde_json::json!({
            "operation": "insert",
            "pid": 1,
            "fields": {"source": "/a", "alias": "/A", "langcode": "und", "context": ""},
            "original": null
        });
        assert!(serde_json::from_value::<AliasSaveEvent>(event).is_err());
    }

    #[test]
    fn test_langcode_candidates() {
        let en = Langcode::new("en");
        assert_eq!(en.lookup_candidates(), vec![en.clone(), Langcode::not_specified()]);
        assert_eq!(
            Langcode::not_specified().lookup_candidates(),
            vec![Langcode::not_specified()]
        );
        assert_eq!(Langcode::default().as_str(), "und");
    }

    #[test]
    fn test_context_filter_matches() {
        let one = ContextId::new("one").unwrap();
        let two = ContextId::new("two").unwrap();

        assert!(ContextFilter::Any.matches(Some(&one)));
        assert!(ContextFilter::Global.matches(None));
        assert!(!ContextFilter::Global.matches(Some(&one)));
        assert!(ContextFilter::Exactly(one.clone()).matches(Some(&one)));
        assert!(!ContextFilter::Exactly(one.clone()).matches(None));
        assert!(ContextFilter::ExactOrGlobal(one.clone()).matches(None));
        assert!(ContextFilter::ExactOrGlobal(one.clone()).matches(Some(&one)));
        assert!(!ContextFilter::ExactOrGlobal(one).matches(Some(&two)));
    }

    #[test]
    fn test_scoped_to() {
        let one = ContextId::new("one").unwrap();
        assert_eq!(
            ContextFilter::scoped_to(Some(&one)),
            ContextFilter::ExactOrGlobal(one)
        );
        assert_eq!(ContextFilter::scoped_to(None), ContextFilter::Global);
    }

    #[test]
    fn test_query_matches_case_insensitive_source() {
        let row = record(1, "/Node/1", "/About", "en", None);
        assert!(AliasQuery::new().source("/node/1").matches(&row));
        assert!(AliasQuery::new().alias("/about").matches(&row));
        assert!(!AliasQuery::new().alias("/about%").matches(&row));
    }

    #[test]
    fn test_query_matches_exclude_and_language() {
        let row = record(1, "/a", "/A", "en", Some("one"));
        assert!(!AliasQuery::new().exclude_source("/A").matches(&row));
        assert!(
            AliasQuery::new()
                .langcodes(Langcode::new("en").lookup_candidates())
                .matches(&row)
        );
        assert!(!AliasQuery::new().langcode(Langcode::new("de")).matches(&row));
    }

    #[test]
    fn test_query_matches_context() {
        let row = record(1, "/a", "/A", "en", Some("one"));
        assert!(!AliasQuery::new().context(ContextFilter::Global).matches(&row));
        assert!(
            AliasQuery::new()
                .context(ContextFilter::Exactly(ContextId::new("one").unwrap()))
                .matches(&row)
        );
    }

    #[test]
    fn test_fields_collide_on_alias_language_context() {
        let a = record(1, "/a", "/A", "en", Some("one")).fields();
        let b = record(2, "/b", "/a", "en", Some("one")).fields();
        let c = record(3, "/c", "/A", "en", Some("two")).fields();
        assert!(a.collides_with(&b));
        assert!(!a.collides_with(&c));
    }

    #[test]
    fn test_save_operation_display() {
        assert_eq!(SaveOperation::Insert.to_string(), "insert");
        assert_eq!("update".parse::<SaveOperation>().unwrap(), SaveOperation::Update);
    }

    #[test]
    fn test_save_event_serde() {
        let event = AliasSaveEvent {
            operation: SaveOperation::Update,
            pid: AliasId::new(7),
            fields: record(7, "/a", "/A", "en", Some("one")).fields(),
            original: None,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["operation"], "update");
        assert_eq!(json["pid"], 7);
        assert_eq!(json["fields"]["context"], "one");

        let back: AliasSaveEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_list_filter_matches() {
        let row = record(1, "/a", "/Shoes/Red", "en", None);
        let filter = ListFilter {
            alias_contains: Some("shoes".to_string()),
            ..ListFilter::default()
        };
        assert!(filter.matches(&row));
        assert!(ListFilter::default().matches(&row));
    }
}
