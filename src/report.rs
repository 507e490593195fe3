//! Structured validation findings.
//!
//! Every validator appends [`ReportItem`]s to a [`ValidationReport`]; child
//! reports are merged into their caller's report in order. A report with no
//! INVALID or INDETERMINATE item is VALID.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::certificate::{Certificate, CertificateId};

/// Severity of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportItemStatus {
    Info,
    Indeterminate,
    Invalid,
}

/// Aggregate verdict of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationResult {
    Valid,
    Indeterminate,
    Invalid,
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidationResult::Valid => "VALID",
            ValidationResult::Indeterminate => "INDETERMINATE",
            ValidationResult::Invalid => "INVALID",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportItem {
    /// Name of the check that produced the finding.
    pub check: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateId>,
    pub status: ReportItemStatus,
}

impl ReportItem {
    pub fn new(check: &str, message: impl Into<String>, status: ReportItemStatus) -> Self {
        Self {
            check: check.to_string(),
            message: message.into(),
            certificate: None,
            status,
        }
    }

    pub fn for_certificate(
        check: &str,
        certificate: &Certificate,
        message: impl Into<String>,
        status: ReportItemStatus,
    ) -> Self {
        Self {
            certificate: Some(certificate.id()),
            ..Self::new(check, message, status)
        }
    }
}

impl fmt::Display for ReportItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            ReportItemStatus::Info => "INFO",
            ReportItemStatus::Indeterminate => "INDETERMINATE",
            ReportItemStatus::Invalid => "INVALID",
        };
        write!(f, "[{}] {}: {}", status, self.check, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    items: Vec<ReportItem>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: ReportItem) {
        self.items.push(item);
    }

    pub fn info(&mut self, check: &str, cert: &Certificate, message: impl Into<String>) {
        self.add(ReportItem::for_certificate(
            check,
            cert,
            message,
            ReportItemStatus::Info,
        ));
    }

    pub fn indeterminate(&mut self, check: &str, cert: &Certificate, message: impl Into<String>) {
        self.add(ReportItem::for_certificate(
            check,
            cert,
            message,
            ReportItemStatus::Indeterminate,
        ));
    }

    pub fn invalid(&mut self, check: &str, cert: &Certificate, message: impl Into<String>) {
        self.add(ReportItem::for_certificate(
            check,
            cert,
            message,
            ReportItemStatus::Invalid,
        ));
    }

    pub fn items(&self) -> &[ReportItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items that are not INFO.
    pub fn failures(&self) -> impl Iterator<Item = &ReportItem> {
        self.items
            .iter()
            .filter(|i| i.status != ReportItemStatus::Info)
    }

    pub fn result(&self) -> ValidationResult {
        match self.items.iter().map(|i| i.status).max() {
            Some(ReportItemStatus::Invalid) => ValidationResult::Invalid,
            Some(ReportItemStatus::Indeterminate) => ValidationResult::Indeterminate,
            _ => ValidationResult::Valid,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.result() == ValidationResult::Valid
    }

    /// Append all items of `other`, preserving order.
    pub fn merge(&mut self, other: ValidationReport) {
        self.items.extend(other.items);
    }

    /// Append `other` with INVALID findings downgraded to INDETERMINATE.
    ///
    /// Used for reports about evidence signers: a signer that fails validation
    /// makes the evidence unusable but says nothing about the subject.
    pub fn merge_downgraded(&mut self, other: ValidationReport) {
        self.items.extend(other.items.into_iter().map(|mut item| {
            if item.status == ReportItemStatus::Invalid {
                item.status = ReportItemStatus::Indeterminate;
            }
            item
        }));
    }

    /// Append `other` with every finding downgraded to INFO.
    ///
    /// Records an attempt that was superseded by a conclusive one.
    pub fn merge_as_info(&mut self, other: ValidationReport) {
        self.items.extend(other.items.into_iter().map(|mut item| {
            item.status = ReportItemStatus::Info;
            item
        }));
    }

    /// Whether any item message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.items.iter().any(|i| i.message.contains(needle))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation result: {}", self.result())?;
        for item in &self.items {
            writeln!(f, "  {}", item)?;
        }
        Ok(())
    }
}
