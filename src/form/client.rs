//! Client record dialog.
//!
//! Unlike the enquiry dialog, the product and plan lists here are
//! independent: both are loaded once when the dialog opens and neither
//! scopes the other.

use super::record::ClientRecord;
use super::sink::{Submission, SubmissionSink};
use super::validation::{is_valid_email, ValidationErrors};
use super::{DialogMode, SubmitError};
use crate::catalog::{HttpCatalog, OptionId, ProviderError, SelectOption};
use chrono::NaiveDate;
use serde::Serialize;

const LOAD_ERROR: &str = "Failed to load dropdown data";

/// Editable values, as typed into the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientFields {
    pub user_name: String,
    pub institute_name: String,
    pub contact: String,
    pub email: String,
    pub product: String,
    pub plan: String,
    /// `YYYY-MM-DD`.
    pub start_date: String,
}

/// The payload handed to the submission sink, keyed as the API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSubmission {
    #[serde(rename = "user_Name")]
    pub user_name: String,
    #[serde(rename = "institute_Name")]
    pub institute_name: String,
    pub contact: String,
    pub email: String,
    pub product: OptionId,
    pub plan: OptionId,
    #[serde(rename = "start_Date")]
    pub start_date: NaiveDate,
}

pub struct ClientDialog {
    mode: DialogMode,
    pub fields: ClientFields,
    products: Vec<SelectOption>,
    plans: Vec<SelectOption>,
    loading: bool,
    error: Option<String>,
}

impl ClientDialog {
    /// A dialog waiting for its dropdown lists. With a record it opens in
    /// edit mode with the record's values filled in.
    pub fn new(record: Option<ClientRecord>) -> Self {
        let (mode, fields) = match record {
            None => (DialogMode::Create, ClientFields::default()),
            Some(record) => (
                DialogMode::Edit {
                    record_id: record.id,
                },
                ClientFields {
                    user_name: record.user_name.unwrap_or_default(),
                    institute_name: record.institute_name.unwrap_or_default(),
                    contact: record.contact.unwrap_or_default(),
                    email: record.email.unwrap_or_default(),
                    product: record.product.map(|id| id.to_string()).unwrap_or_default(),
                    plan: record.plan.map(|id| id.to_string()).unwrap_or_default(),
                    start_date: record
                        .start_date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                },
            ),
        };
        Self {
            mode,
            fields,
            products: Vec::new(),
            plans: Vec::new(),
            loading: true,
            error: None,
        }
    }

    /// Fetch products and plans concurrently and apply them.
    pub async fn load(&mut self, catalog: &HttpCatalog) {
        let (products, plans) = tokio::join!(catalog.client_products(), catalog.plans());
        self.apply_lists(products, plans);
    }

    /// Fill the dropdowns. A failed list stays empty and sets the dialog's
    /// error message; the other list is still used.
    pub fn apply_lists(
        &mut self,
        products: Result<Vec<SelectOption>, ProviderError>,
        plans: Result<Vec<SelectOption>, ProviderError>,
    ) {
        self.loading = false;
        self.error = None;
        self.products = self.take_list("products", products);
        self.plans = self.take_list("plans", plans);
    }

    fn take_list(
        &mut self,
        list: &'static str,
        result: Result<Vec<SelectOption>, ProviderError>,
    ) -> Vec<SelectOption> {
        match result {
            Ok(options) => options,
            Err(e) => {
                tracing::warn!(list, error = %e, "Failed to load client dropdown");
                self.error = Some(LOAD_ERROR.to_string());
                Vec::new()
            }
        }
    }

    pub fn mode(&self) -> &DialogMode {
        &self.mode
    }

    pub fn title(&self) -> &'static str {
        match self.mode {
            DialogMode::Create => "Add New Client",
            DialogMode::Edit { .. } => "Edit Client",
        }
    }

    pub fn products(&self) -> &[SelectOption] {
        &self.products
    }

    pub fn plans(&self) -> &[SelectOption] {
        &self.plans
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn products_enabled(&self) -> bool {
        !self.loading && !self.products.is_empty()
    }

    pub fn plans_enabled(&self) -> bool {
        !self.loading && !self.plans.is_empty()
    }

    /// Saving is disabled while the dropdowns load.
    pub fn can_submit(&self) -> bool {
        !self.loading
    }

    /// Notices shown under empty dropdowns once loading finished cleanly.
    pub fn empty_list_notices(&self) -> Vec<&'static str> {
        if self.loading || self.error.is_some() {
            return Vec::new();
        }
        let mut notices = Vec::new();
        if self.products.is_empty() {
            notices.push("No products available");
        }
        if self.plans.is_empty() {
            notices.push("No plans available");
        }
        notices
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        self.validation_errors().into_result()
    }

    fn validation_errors(&self) -> ValidationErrors {
        let f = &self.fields;
        let mut errors = ValidationErrors::new();
        errors.required("user_Name", Some(f.user_name.as_str()), "Client Name is required");
        errors.required(
            "institute_Name",
            Some(f.institute_name.as_str()),
            "Institute Name is required",
        );
        errors.required("contact", Some(f.contact.as_str()), "Contact is required");
        if f.email.trim().is_empty() {
            errors.push("email", "Email is required");
        } else if !is_valid_email(&f.email) {
            errors.push("email", "Invalid email");
        }
        errors.required("product", Some(f.product.as_str()), "Product is required");
        errors.required("plan", Some(f.plan.as_str()), "Plan is required");
        if f.start_date.trim().is_empty() {
            errors.push("start_Date", "Start Date is required");
        } else if parse_date(&f.start_date).is_none() {
            errors.push("start_Date", "Start Date must be a valid date");
        }
        errors
    }

    pub fn to_submission(&self) -> Result<Submission<ClientSubmission>, SubmitError> {
        let errors = self.validation_errors();
        let f = &self.fields;
        let (Some(product), Some(plan), Some(start_date)) = (
            OptionId::parse(&f.product),
            OptionId::parse(&f.plan),
            parse_date(&f.start_date),
        ) else {
            return Err(SubmitError::Validation(errors));
        };
        errors.into_result().map_err(SubmitError::Validation)?;

        Ok(Submission {
            target: self.mode.target()?,
            record: ClientSubmission {
                user_name: f.user_name.trim().to_string(),
                institute_name: f.institute_name.trim().to_string(),
                contact: f.contact.trim().to_string(),
                email: f.email.trim().to_string(),
                product,
                plan,
                start_date,
            },
        })
    }

    pub async fn submit(
        &self,
        sink: &dyn SubmissionSink<ClientSubmission>,
    ) -> Result<(), SubmitError> {
        if !self.can_submit() {
            tracing::debug!("Client dialog still loading, submit ignored");
            return Err(SubmitError::NotReady);
        }
        let submission = self.to_submission()?;
        tracing::debug!(submit_target = ?submission.target, "Submitting client");
        sink.submit(submission).await.map_err(SubmitError::Sink)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}
