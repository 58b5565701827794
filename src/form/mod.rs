//! Form dialogs for client records and sales enquiries.
//!
//! # Architecture
//!
//! - [`cascade`] - pure state for a product → package dropdown pair
//! - [`controller`] - runs the cascade's fetches on Tokio and applies results
//! - [`record`] - typed parsing of existing records (edit mode)
//! - [`validation`] - fixed per-form field rules
//! - [`sink`] - where confirmed submissions go
//! - [`enquiry`], [`client`] - the two dialogs

pub mod cascade;
pub mod client;
pub mod controller;
pub mod enquiry;
pub mod record;
pub mod sink;
pub mod validation;

pub use cascade::{
    CascadingSelector, DependentRequest, FetchStatus, OpenMode, OptionList, PrimaryRequest,
    Selection, SelectionError,
};
pub use client::{ClientDialog, ClientFields, ClientSubmission};
pub use controller::{CascadeController, EventOutcome, FormEvent, ListKind};
pub use enquiry::{EnquiryDialog, EnquiryFields, EnquiryStatus, EnquirySubmission};
pub use record::{ClientRecord, EnquiryRecord, RecordError};
pub use sink::{HttpSink, Submission, SubmissionSink, SubmitTarget};
pub use validation::{ValidationError, ValidationErrors};

use thiserror::Error;

/// Whether a dialog creates a new record or edits an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogMode {
    Create,
    Edit { record_id: Option<String> },
}

impl DialogMode {
    fn target(&self) -> Result<SubmitTarget, SubmitError> {
        match self {
            DialogMode::Create => Ok(SubmitTarget::Create),
            DialogMode::Edit {
                record_id: Some(id),
            } => Ok(SubmitTarget::Update(id.clone())),
            DialogMode::Edit { record_id: None } => Err(SubmitError::MissingRecordId),
        }
    }
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Form has errors: {0}")]
    Validation(ValidationErrors),
    #[error("Record being edited has no id")]
    MissingRecordId,
    #[error("Dropdown data is still loading")]
    NotReady,
    #[error("Submission failed: {0:#}")]
    Sink(anyhow::Error),
}
