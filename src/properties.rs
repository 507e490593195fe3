//! Deployment trust policy.
//!
//! [`SignatureValidationProperties`] is a lookup table keyed by
//! [`ContextSelector`]s. A selector leaves any of the three context axes as a
//! wildcard; a lookup consults the most specific matching selector first and
//! falls back towards the all-wildcard defaults, field by field.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::{CertificateSource, TimeBasedContext, ValidationContext, ValidatorContext};
use crate::error::Error;

const DEFAULT_FRESHNESS_PRESENT: Duration = Duration::from_secs(30 * 24 * 60 * 60);
const DEFAULT_FRESHNESS_HISTORICAL: Duration = Duration::from_secs(60);
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// When revocation evidence may be fetched over the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnlineFetching {
    /// Only embedded evidence is used.
    NeverFetch,
    /// Fetch when embedded evidence is missing or not usable.
    FetchIfStale,
    /// Always fetch and weigh online evidence together with embedded evidence.
    AlwaysFetch,
}

/// Which revocation sources are consulted, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationSources {
    OcspWithCrlFallback,
    OcspOnly,
    CrlOnly,
}

impl RevocationSources {
    pub fn allows_ocsp(self) -> bool {
        !matches!(self, RevocationSources::CrlOnly)
    }

    pub fn allows_crl(self) -> bool {
        !matches!(self, RevocationSources::OcspOnly)
    }
}

/// Selects validation contexts; `None` on an axis matches anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<ValidatorContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<CertificateSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_based: Option<TimeBasedContext>,
}

impl ContextSelector {
    /// Matches every context.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn validator(mut self, validator: ValidatorContext) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn source(mut self, source: CertificateSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn time_based(mut self, time_based: TimeBasedContext) -> Self {
        self.time_based = Some(time_based);
        self
    }

    pub fn matches(&self, ctx: &ValidationContext) -> bool {
        self.validator.map_or(true, |v| v == ctx.validator)
            && self.source.map_or(true, |s| s == ctx.source)
            && self.time_based.map_or(true, |t| t == ctx.time_based)
    }

    /// Number of fixed axes first, then validator over source over time.
    fn specificity(&self) -> (u8, bool, bool, bool) {
        let fixed = [
            self.validator.is_some(),
            self.source.is_some(),
            self.time_based.is_some(),
        ];
        (
            fixed.iter().filter(|f| **f).count() as u8,
            fixed[0],
            fixed[1],
            fixed[2],
        )
    }
}

/// Policy values for one selector. Unset fields defer to less specific
/// selectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_fetching: Option<OnlineFetching>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freshness: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_after_failure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_trust_anchor_expiry: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_required_extensions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_sources: Option<RevocationSources>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PolicyEntry {
    selector: ContextSelector,
    properties: ContextProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureValidationProperties {
    entries: Vec<PolicyEntry>,
    #[serde(default = "default_fetch_timeout")]
    fetch_timeout: Duration,
}

fn default_fetch_timeout() -> Duration {
    DEFAULT_FETCH_TIMEOUT
}

impl Default for SignatureValidationProperties {
    fn default() -> Self {
        let mut properties = Self {
            entries: Vec::new(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        };
        *properties.entry_mut(ContextSelector::any()) = ContextProperties {
            online_fetching: Some(OnlineFetching::FetchIfStale),
            freshness: Some(DEFAULT_FRESHNESS_PRESENT),
            continue_after_failure: Some(true),
            check_trust_anchor_expiry: Some(true),
            check_required_extensions: Some(true),
            revocation_sources: Some(RevocationSources::OcspWithCrlFallback),
        };
        properties.set_freshness(
            ContextSelector::any().time_based(TimeBasedContext::Historical),
            DEFAULT_FRESHNESS_HISTORICAL,
        );
        properties
    }
}

impl SignatureValidationProperties {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_mut(&mut self, selector: ContextSelector) -> &mut ContextProperties {
        let index = match self.entries.iter().position(|e| e.selector == selector) {
            Some(index) => index,
            None => {
                self.entries.push(PolicyEntry {
                    selector,
                    properties: ContextProperties::default(),
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].properties
    }

    fn lookup<T>(
        &self,
        ctx: &ValidationContext,
        field: impl Fn(&ContextProperties) -> Option<T>,
    ) -> Option<T> {
        let mut matching: Vec<&PolicyEntry> = self
            .entries
            .iter()
            .filter(|e| e.selector.matches(ctx))
            .collect();
        matching.sort_by(|a, b| b.selector.specificity().cmp(&a.selector.specificity()));
        matching.into_iter().find_map(|e| field(&e.properties))
    }

    pub fn set_online_fetching(
        &mut self,
        selector: ContextSelector,
        fetching: OnlineFetching,
    ) -> &mut Self {
        self.entry_mut(selector).online_fetching = Some(fetching);
        self
    }

    pub fn set_freshness(&mut self, selector: ContextSelector, freshness: Duration) -> &mut Self {
        self.entry_mut(selector).freshness = Some(freshness);
        self
    }

    pub fn set_continue_after_failure(
        &mut self,
        selector: ContextSelector,
        continue_after_failure: bool,
    ) -> &mut Self {
        self.entry_mut(selector).continue_after_failure = Some(continue_after_failure);
        self
    }

    pub fn set_check_trust_anchor_expiry(
        &mut self,
        selector: ContextSelector,
        check: bool,
    ) -> &mut Self {
        self.entry_mut(selector).check_trust_anchor_expiry = Some(check);
        self
    }

    pub fn set_check_required_extensions(
        &mut self,
        selector: ContextSelector,
        check: bool,
    ) -> &mut Self {
        self.entry_mut(selector).check_required_extensions = Some(check);
        self
    }

    pub fn set_revocation_sources(
        &mut self,
        selector: ContextSelector,
        sources: RevocationSources,
    ) -> &mut Self {
        self.entry_mut(selector).revocation_sources = Some(sources);
        self
    }

    pub fn set_fetch_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn online_fetching(&self, ctx: &ValidationContext) -> OnlineFetching {
        self.lookup(ctx, |p| p.online_fetching)
            .unwrap_or(OnlineFetching::FetchIfStale)
    }

    /// Maximum tolerated age of revocation evidence relative to the check time.
    pub fn freshness(&self, ctx: &ValidationContext) -> chrono::Duration {
        let freshness = self.lookup(ctx, |p| p.freshness).unwrap_or(match ctx.time_based {
            TimeBasedContext::Present => DEFAULT_FRESHNESS_PRESENT,
            TimeBasedContext::Historical => DEFAULT_FRESHNESS_HISTORICAL,
        });
        chrono::Duration::from_std(freshness).unwrap_or_else(|_| chrono::Duration::days(36_500))
    }

    pub fn continue_after_failure(&self, ctx: &ValidationContext) -> bool {
        self.lookup(ctx, |p| p.continue_after_failure).unwrap_or(true)
    }

    pub fn check_trust_anchor_expiry(&self, ctx: &ValidationContext) -> bool {
        self.lookup(ctx, |p| p.check_trust_anchor_expiry)
            .unwrap_or(true)
    }

    pub fn check_required_extensions(&self, ctx: &ValidationContext) -> bool {
        self.lookup(ctx, |p| p.check_required_extensions)
            .unwrap_or(true)
    }

    pub fn revocation_sources(&self, ctx: &ValidationContext) -> RevocationSources {
        self.lookup(ctx, |p| p.revocation_sources)
            .unwrap_or(RevocationSources::OcspWithCrlFallback)
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// Serialize the policy table to JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a policy table from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero fetch timeout or a selector that
    /// appears twice, and [`Error::Json`] for malformed input.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let properties: Self = serde_json::from_str(json)?;
        if properties.fetch_timeout.is_zero() {
            return Err(Error::Config("fetch_timeout must be positive".to_string()));
        }
        for (i, entry) in properties.entries.iter().enumerate() {
            if properties.entries[..i]
                .iter()
                .any(|e| e.selector == entry.selector)
            {
                return Err(Error::Config(format!(
                    "duplicate policy selector {:?}",
                    entry.selector
                )));
            }
        }
        Ok(properties)
    }
}
