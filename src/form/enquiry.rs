//! Sales enquiry dialog: contact details, a product, one of that product's
//! packages, and a follow-up status.

use super::cascade::{OpenMode, SelectionError};
use super::controller::CascadeController;
use super::record::EnquiryRecord;
use super::sink::{Submission, SubmissionSink};
use super::validation::ValidationErrors;
use super::{DialogMode, SubmitError};
use crate::catalog::{OptionId, OptionsProvider};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Follow-up state of an enquiry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum EnquiryStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl EnquiryStatus {
    pub const ALL: [EnquiryStatus; 3] = [
        EnquiryStatus::Pending,
        EnquiryStatus::InProgress,
        EnquiryStatus::Resolved,
    ];

    pub fn as_wire(&self) -> &'static str {
        match self {
            EnquiryStatus::Pending => "Pending",
            EnquiryStatus::InProgress => "In Progress",
            EnquiryStatus::Resolved => "Resolved",
        }
    }

    pub fn from_wire(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_wire() == raw.trim())
    }
}

impl fmt::Display for EnquiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Free-text fields of the dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnquiryFields {
    pub name: String,
    pub institute_name: String,
    pub email: String,
    pub contact: String,
    pub message: String,
    pub status: EnquiryStatus,
}

/// The payload handed to the submission sink, keyed as the API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnquirySubmission {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Institute_Name")]
    pub institute_name: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Contact")]
    pub contact: String,
    #[serde(rename = "Product")]
    pub product: OptionId,
    #[serde(rename = "Package")]
    pub package: OptionId,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Enquiry_Status")]
    pub status: EnquiryStatus,
}

pub struct EnquiryDialog {
    mode: DialogMode,
    pub fields: EnquiryFields,
    cascade: CascadeController,
}

impl EnquiryDialog {
    /// Open the dialog. With a record it opens in edit mode, pre-selecting the
    /// record's product and package; products load in both modes.
    pub fn open(provider: Arc<dyn OptionsProvider>, record: Option<EnquiryRecord>) -> Self {
        let Some(record) = record else {
            return Self {
                mode: DialogMode::Create,
                fields: EnquiryFields::default(),
                cascade: CascadeController::open(provider, OpenMode::Create),
            };
        };

        let fields = EnquiryFields {
            name: record.name.unwrap_or_default(),
            institute_name: record.institute_name.unwrap_or_default(),
            email: record.email.unwrap_or_default(),
            contact: record.contact.unwrap_or_default(),
            message: record.message.unwrap_or_default(),
            status: record.status.unwrap_or_default(),
        };
        let cascade = CascadeController::open(
            provider,
            OpenMode::Edit {
                primary: record.product_id,
                dependent: record.package_id,
            },
        );
        Self {
            mode: DialogMode::Edit {
                record_id: record.id,
            },
            fields,
            cascade,
        }
    }

    pub fn mode(&self) -> &DialogMode {
        &self.mode
    }

    pub fn title(&self) -> &'static str {
        match self.mode {
            DialogMode::Create => "Add New Enquiry",
            DialogMode::Edit { .. } => "Update Enquiry",
        }
    }

    pub fn submit_label(&self) -> &'static str {
        match self.mode {
            DialogMode::Create => "Save",
            DialogMode::Edit { .. } => "Update",
        }
    }

    /// Name, institute, contact, email and message are only editable when
    /// creating; an update changes the product, package and status.
    pub fn shows_contact_fields(&self) -> bool {
        self.mode == DialogMode::Create
    }

    pub fn cascade(&self) -> &CascadeController {
        &self.cascade
    }

    pub fn select_product(&mut self, raw: &str) {
        self.cascade.select_primary(raw);
    }

    pub fn select_package(&mut self, raw: &str) -> Result<(), SelectionError> {
        self.cascade.select_dependent(raw)
    }

    /// Wait for outstanding product/package fetches.
    pub async fn settle(&mut self) {
        self.cascade.settle().await;
    }

    /// Product and package must both be chosen.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        self.validation_errors().into_result()
    }

    fn validation_errors(&self) -> ValidationErrors {
        let selection = self.cascade.selector().selection();
        let mut errors = ValidationErrors::new();
        errors.required(
            "Product",
            selection.primary.as_ref().map(OptionId::as_str),
            "Product is required",
        );
        errors.required(
            "Package",
            selection.dependent.as_ref().map(OptionId::as_str),
            "Package is required",
        );
        errors
    }

    pub fn to_submission(&self) -> Result<Submission<EnquirySubmission>, SubmitError> {
        let selection = self.cascade.selector().selection();
        let (Some(product), Some(package)) = (&selection.primary, &selection.dependent) else {
            return Err(SubmitError::Validation(self.validation_errors()));
        };
        Ok(Submission {
            target: self.mode.target()?,
            record: EnquirySubmission {
                name: self.fields.name.trim().to_string(),
                institute_name: self.fields.institute_name.trim().to_string(),
                email: self.fields.email.trim().to_string(),
                contact: self.fields.contact.trim().to_string(),
                product: product.clone(),
                package: package.clone(),
                message: self.fields.message.clone(),
                status: self.fields.status,
            },
        })
    }

    pub async fn submit(
        &self,
        sink: &dyn SubmissionSink<EnquirySubmission>,
    ) -> Result<(), SubmitError> {
        let submission = self.to_submission()?;
        tracing::debug!(submit_target = ?submission.target, "Submitting enquiry");
        sink.submit(submission).await.map_err(SubmitError::Sink)
    }
}
