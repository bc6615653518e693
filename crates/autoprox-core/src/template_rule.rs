//! Declarative rules written in TOML.
//!
//! A rule file names one matcher and templates for the stores it can
//! synthesize:
//!
//! ```toml
//! [match]
//! regex = "^foo-(\\d+)$"
//! package_types = ["maven"]
//!
//! [remote]
//! url = "http://example.test/foo/{1}"
//!
//! [group]
//! constituents = ["hosted:{name}", "remote:{name}"]
//!
//! [validation]
//! path = "/health"
//! ```
//!
//! Templates understand `{name}`, `{package_type}`, `{type}` and the
//! matcher's capture groups `{1}` to `{9}`. A wildcard `pattern` captures
//! one group per `*`.

use std::sync::Arc;

use regex::{Captures, Regex};
use remote_transfer::Url;
use repo_state::{Group, HostedRepository, RemoteRepository, StoreKey};
use serde::Deserialize;
use tracing::debug;

use crate::parser::{RuleParseError, RuleParser};
use crate::rule::{AutoProxRule, RuleError};

// ---------------------------------------------------------------------------
// Source format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSource {
    #[serde(rename = "match")]
    matcher: MatchSection,
    remote: Option<RemoteTemplate>,
    hosted: Option<HostedTemplate>,
    group: Option<GroupTemplate>,
    #[serde(default)]
    validation: ValidationSection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MatchSection {
    pattern: Option<String>,
    regex: Option<String>,
    #[serde(default)]
    any: bool,
    #[serde(default)]
    package_types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RemoteTemplate {
    url: String,
    description: Option<String>,
    #[serde(default)]
    timeout_seconds: u32,
    #[serde(default)]
    cache_timeout_seconds: u32,
    #[serde(default)]
    nfc_timeout_seconds: u32,
    #[serde(default)]
    passthrough: bool,
    user: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct HostedTemplate {
    description: Option<String>,
    #[serde(default = "default_true")]
    allow_releases: bool,
    #[serde(default)]
    allow_snapshots: bool,
    #[serde(default)]
    readonly: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupTemplate {
    description: Option<String>,
    #[serde(default)]
    constituents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ValidationSection {
    #[serde(default = "default_true")]
    enabled: bool,
    path: Option<String>,
    url: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            url: None,
            user: None,
            password: None,
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum NameMatcher {
    Any,
    Regex(Regex),
}

impl NameMatcher {
    fn from_section(name: &str, section: &MatchSection) -> Result<Self, RuleParseError> {
        let chosen = [section.pattern.is_some(), section.regex.is_some(), section.any]
            .iter()
            .filter(|set| **set)
            .count();
        if chosen != 1 {
            return Err(RuleParseError::new(
                name,
                "[match] needs exactly one of 'pattern', 'regex' or 'any = true'",
            ));
        }

        let source = match (&section.pattern, &section.regex) {
            (Some(pattern), _) => wildcard_to_regex(pattern),
            (_, Some(regex)) => regex.clone(),
            _ => return Ok(NameMatcher::Any),
        };
        Regex::new(&source)
            .map(NameMatcher::Regex)
            .map_err(|e| RuleParseError::new(name, format!("bad matcher: {}", e)))
    }

    fn captures<'n>(&self, name: &'n str) -> Option<Option<Captures<'n>>> {
        match self {
            NameMatcher::Any => Some(None),
            NameMatcher::Regex(re) => re.captures(name).map(Some),
        }
    }
}

/// `*` matches any run of characters (captured), `?` any single one.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => out.push_str("(.*)"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    out.push('$');
    out
}

/// Values substituted into templates for one key.
struct TemplateContext<'k> {
    key: &'k StoreKey,
    groups: Vec<String>,
}

impl<'k> TemplateContext<'k> {
    fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            let substituted = tail
                .find('}')
                .and_then(|end| self.lookup(&tail[1..end]).map(|value| (end, value)));
            match substituted {
                Some((end, value)) => {
                    out.push_str(&value);
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Unknown placeholders are left verbatim; unmatched groups render empty.
    fn lookup(&self, placeholder: &str) -> Option<String> {
        match placeholder {
            "name" => Some(self.key.name().to_string()),
            "package_type" => Some(self.key.package_type().to_string()),
            "type" => Some(self.key.store_type().to_string()),
            index => {
                let i: usize = index.parse().ok()?;
                (1..=9)
                    .contains(&i)
                    .then(|| self.groups.get(i - 1).cloned().unwrap_or_default())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A rule compiled from a TOML source.
#[derive(Debug, Clone)]
pub struct TemplateRule {
    name: String,
    matcher: NameMatcher,
    package_types: Vec<String>,
    remote: Option<RemoteTemplate>,
    hosted: Option<HostedTemplate>,
    group: Option<GroupTemplate>,
    validation: ValidationSection,
}

impl TemplateRule {
    pub fn parse(name: &str, spec: &str) -> Result<Self, RuleParseError> {
        let source: RuleSource =
            toml::from_str(spec).map_err(|e| RuleParseError::new(name, e.to_string()))?;

        if source.remote.is_none() && source.hosted.is_none() && source.group.is_none() {
            return Err(RuleParseError::new(
                name,
                "rule defines no [remote], [hosted] or [group] section",
            ));
        }

        let matcher = NameMatcher::from_section(name, &source.matcher)?;
        Ok(Self {
            name: name.to_string(),
            matcher,
            package_types: source.matcher.package_types,
            remote: source.remote,
            hosted: source.hosted,
            group: source.group,
            validation: source.validation,
        })
    }

    fn context<'k>(&self, key: &'k StoreKey) -> Option<TemplateContext<'k>> {
        if !self.package_types.is_empty()
            && !self.package_types.iter().any(|p| p == key.package_type())
        {
            return None;
        }
        let caps = self.matcher.captures(key.name())?;
        let groups = caps
            .map(|c| {
                c.iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();
        Some(TemplateContext { key, groups })
    }

    fn context_or_err<'k>(&self, key: &'k StoreKey) -> Result<TemplateContext<'k>, RuleError> {
        self.context(key)
            .ok_or_else(|| RuleError::new(key, format!("rule '{}' does not match", self.name)))
    }

    fn render_url(
        &self,
        ctx: &TemplateContext<'_>,
        template: &str,
    ) -> Result<String, RuleError> {
        let url = ctx.render(template);
        Url::parse(&url).map_err(|e| RuleError::invalid_url(ctx.key, &url, e))?;
        Ok(url)
    }

    fn remote_for(
        &self,
        ctx: &TemplateContext<'_>,
        template: &RemoteTemplate,
    ) -> Result<RemoteRepository, RuleError> {
        let url = self.render_url(ctx, &template.url)?;
        let mut remote = RemoteRepository::new(ctx.key.package_type(), ctx.key.name(), url);
        remote.description = template.description.as_deref().map(|d| ctx.render(d));
        remote.timeout_seconds = template.timeout_seconds;
        remote.cache_timeout_seconds = template.cache_timeout_seconds;
        remote.nfc_timeout_seconds = template.nfc_timeout_seconds;
        remote.passthrough = template.passthrough;
        remote.user = template.user.clone();
        remote.password = template.password.clone();
        Ok(remote)
    }
}

impl AutoProxRule for TemplateRule {
    fn matches(&self, key: &StoreKey) -> bool {
        let matched = self.context(key).is_some();
        debug!(rule = %self.name, key = %key, matched, "checked rule");
        matched
    }

    fn create_remote_repository(
        &self,
        key: &StoreKey,
    ) -> Result<Option<RemoteRepository>, RuleError> {
        let Some(template) = &self.remote else {
            return Ok(None);
        };
        let ctx = self.context_or_err(key)?;
        self.remote_for(&ctx, template).map(Some)
    }

    fn create_hosted_repository(
        &self,
        key: &StoreKey,
    ) -> Result<Option<HostedRepository>, RuleError> {
        let Some(template) = &self.hosted else {
            return Ok(None);
        };
        let ctx = self.context_or_err(key)?;
        let mut hosted = HostedRepository::new(key.package_type(), key.name());
        hosted.description = template.description.as_deref().map(|d| ctx.render(d));
        hosted.allow_releases = template.allow_releases;
        hosted.allow_snapshots = template.allow_snapshots;
        hosted.readonly = template.readonly;
        Ok(Some(hosted))
    }

    fn create_group(&self, key: &StoreKey) -> Result<Option<Group>, RuleError> {
        let Some(template) = &self.group else {
            return Ok(None);
        };
        let ctx = self.context_or_err(key)?;
        let constituents = template
            .constituents
            .iter()
            .map(|member| {
                let rendered = ctx.render(member);
                StoreKey::parse_with_default(&rendered, key.package_type())
                    .map_err(|e| RuleError::new(key, format!("bad constituent: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut group = Group::new(key.package_type(), key.name(), constituents);
        group.description = template.description.as_deref().map(|d| ctx.render(d));
        Ok(Some(group))
    }

    fn is_validation_enabled(&self) -> bool {
        self.validation.enabled
    }

    fn remote_validation_path(&self) -> Option<String> {
        self.validation.path.clone()
    }

    fn create_validation_remote(
        &self,
        key: &StoreKey,
    ) -> Result<Option<RemoteRepository>, RuleError> {
        let ctx = self.context_or_err(key)?;
        if let Some(template) = &self.validation.url {
            let url = self.render_url(&ctx, template)?;
            let mut remote = RemoteRepository::new(key.package_type(), key.name(), url);
            remote.user = self.validation.user.clone();
            remote.password = self.validation.password.clone();
            return Ok(Some(remote));
        }
        match &self.remote {
            Some(template) => self.remote_for(&ctx, template).map(Some),
            None => Ok(None),
        }
    }
}

/// Parses `*.toml` rule sources into [`TemplateRule`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlRuleParser;

impl TomlRuleParser {
    pub const EXTENSION: &'static str = "toml";
}

impl RuleParser for TomlRuleParser {
    fn extension(&self) -> &str {
        Self::EXTENSION
    }

    fn parse(&self, name: &str, spec: &str) -> Result<Arc<dyn AutoProxRule>, RuleParseError> {
        Ok(Arc::new(TemplateRule::parse(name, spec)?))
    }
}
