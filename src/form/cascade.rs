//! Cascading selection state: a primary dropdown whose value scopes the
//! options of a dependent dropdown.
//!
//! This type is a pure state machine. Operations that need a fetch return a
//! request value carrying the generation it was issued under; whoever runs
//! the fetch hands the request back with the result. Results whose
//! generation (or primary id) no longer matches are discarded, so a slow
//! response for an earlier product can never overwrite the packages of the
//! current one. See [`CascadeController`](super::CascadeController) for the
//! async driver.

use crate::catalog::{OptionId, ProviderError, SelectOption};
use thiserror::Error;

// ============================================================================
// Option Lists
// ============================================================================

/// Per-list loading state shown to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// A dropdown's options plus its fetch bookkeeping.
#[derive(Debug, Clone)]
pub struct OptionList {
    status: FetchStatus,
    options: Vec<SelectOption>,
    error: Option<String>,
    generation: u64,
}

impl OptionList {
    fn idle() -> Self {
        Self {
            status: FetchStatus::Idle,
            options: Vec::new(),
            error: None,
            generation: 0,
        }
    }

    pub fn status(&self) -> FetchStatus {
        self.status
    }

    pub fn options(&self) -> &[SelectOption] {
        &self.options
    }

    /// Message of the last failed fetch, cleared by the next fetch.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// A loading list is rendered disabled.
    pub fn is_interactive(&self) -> bool {
        self.status != FetchStatus::Loading
    }

    pub fn contains(&self, id: &OptionId) -> bool {
        self.options.iter().any(|o| &o.id == id)
    }

    pub fn label_of(&self, id: &OptionId) -> Option<&str> {
        self.options
            .iter()
            .find(|o| &o.id == id)
            .map(|o| o.label.as_str())
    }

    /// Start a fetch. Existing options stay visible until it resolves.
    fn begin(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.status = FetchStatus::Loading;
        self.error = None;
        self.generation
    }

    /// Drop options and invalidate any in-flight fetch.
    fn reset(&mut self, status: FetchStatus) {
        self.generation = self.generation.wrapping_add(1);
        self.status = status;
        self.options.clear();
        self.error = None;
    }

    fn resolve(&mut self, result: Result<Vec<SelectOption>, ProviderError>) {
        match result {
            Ok(options) => {
                self.status = FetchStatus::Ready;
                self.options = options;
                self.error = None;
            }
            Err(e) => {
                self.status = FetchStatus::Failed;
                self.options.clear();
                self.error = Some(e.to_string());
            }
        }
    }
}

// ============================================================================
// Selection and Requests
// ============================================================================

/// The two selected identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub primary: Option<OptionId>,
    pub dependent: Option<OptionId>,
}

/// How a dialog was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenMode {
    Create,
    /// Editing an existing record whose selections seed the state.
    Edit {
        primary: Option<OptionId>,
        dependent: Option<OptionId>,
    },
}

/// A primary-list fetch to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryRequest {
    pub generation: u64,
}

/// A dependent-list fetch to run for `primary_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependentRequest {
    pub primary_id: OptionId,
    pub generation: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Options are not loaded yet")]
    NotReady,
    #[error("Unknown option: {0}")]
    UnknownOption(OptionId),
}

// ============================================================================
// Cascading Selector
// ============================================================================

#[derive(Debug, Clone)]
pub struct CascadingSelector {
    selection: Selection,
    primary: OptionList,
    dependent: OptionList,
}

impl CascadingSelector {
    /// Build the initial state for a freshly opened dialog.
    ///
    /// In edit mode with a primary id, the dependent id is held tentatively
    /// and a single dependent fetch is returned; the id survives only if that
    /// fetch lists it. Without a primary id there is nothing to scope the
    /// dependent id to, so it is dropped.
    pub fn initialize(mode: OpenMode) -> (Self, Option<DependentRequest>) {
        let mut selector = Self {
            selection: Selection::default(),
            primary: OptionList::idle(),
            dependent: OptionList::idle(),
        };

        let OpenMode::Edit { primary, dependent } = mode else {
            return (selector, None);
        };
        let Some(primary_id) = primary else {
            if dependent.is_some() {
                tracing::debug!("Edit record has a dependent id but no primary id, dropping it");
            }
            return (selector, None);
        };

        selector.selection = Selection {
            primary: Some(primary_id.clone()),
            dependent,
        };
        let generation = selector.dependent.begin();
        tracing::debug!(primary_id = %primary_id, generation, "Hydrating from edit record");
        (
            selector,
            Some(DependentRequest {
                primary_id,
                generation,
            }),
        )
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn primary(&self) -> &OptionList {
        &self.primary
    }

    pub fn dependent(&self) -> &OptionList {
        &self.dependent
    }

    /// The dependent dropdown is usable once it has loaded something.
    pub fn dependent_enabled(&self) -> bool {
        self.dependent.is_interactive() && !self.dependent.options.is_empty()
    }

    /// True when neither list is waiting on a fetch.
    pub fn is_settled(&self) -> bool {
        self.primary.status != FetchStatus::Loading && self.dependent.status != FetchStatus::Loading
    }

    /// Mark the primary list as loading and return the fetch to run.
    ///
    /// Does not touch the selection.
    pub fn begin_primary_load(&mut self) -> PrimaryRequest {
        PrimaryRequest {
            generation: self.primary.begin(),
        }
    }

    /// Apply a primary-list result. Returns false if it was stale.
    pub fn apply_primary(
        &mut self,
        request: PrimaryRequest,
        result: Result<Vec<SelectOption>, ProviderError>,
    ) -> bool {
        if request.generation != self.primary.generation {
            tracing::debug!(
                expected = self.primary.generation,
                got = request.generation,
                "Ignoring stale primary options (generation mismatch)"
            );
            return false;
        }
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Failed to load primary options");
        }
        self.primary.resolve(result);
        true
    }

    /// React to a change of the primary dropdown.
    ///
    /// Blank input clears both selections and the dependent list (status
    /// `Idle`) without a fetch. Re-selecting the current id does nothing.
    /// Any other id clears the dependent selection and list and returns the
    /// fetch for the new id's options. Either way, in-flight dependent
    /// fetches become stale.
    pub fn select_primary(&mut self, raw: &str) -> Option<DependentRequest> {
        let Some(primary_id) = OptionId::parse(raw) else {
            tracing::debug!("Primary selection cleared");
            self.selection = Selection::default();
            self.dependent.reset(FetchStatus::Idle);
            return None;
        };

        if self.selection.primary.as_ref() == Some(&primary_id) {
            return None;
        }

        self.selection.primary = Some(primary_id.clone());
        self.selection.dependent = None;
        self.dependent.reset(FetchStatus::Idle);
        let generation = self.dependent.begin();
        tracing::debug!(primary_id = %primary_id, generation, "Primary selection changed");
        Some(DependentRequest {
            primary_id,
            generation,
        })
    }

    /// Apply a dependent-list result. Returns false if it was stale.
    ///
    /// On success the held dependent id is kept only if the new list has it.
    /// On failure the list is emptied and the dependent id is dropped.
    pub fn apply_dependent(
        &mut self,
        request: DependentRequest,
        result: Result<Vec<SelectOption>, ProviderError>,
    ) -> bool {
        let current = self.selection.primary.as_ref();
        if request.generation != self.dependent.generation || current != Some(&request.primary_id) {
            tracing::debug!(
                primary_id = %request.primary_id,
                expected = self.dependent.generation,
                got = request.generation,
                "Ignoring stale dependent options"
            );
            return false;
        }

        if let Err(e) = &result {
            tracing::warn!(primary_id = %request.primary_id, error = %e, "Failed to load dependent options");
        }
        self.dependent.resolve(result);

        if let Some(held) = &self.selection.dependent {
            if !self.dependent.contains(held) {
                tracing::debug!(dependent_id = %held, "Held dependent id not offered, clearing");
                self.selection.dependent = None;
            }
        }
        true
    }

    /// Set the dependent selection. Blank input clears it.
    ///
    /// Only ids offered by the loaded dependent list are accepted.
    pub fn select_dependent(&mut self, raw: &str) -> Result<(), SelectionError> {
        let Some(dependent_id) = OptionId::parse(raw) else {
            self.selection.dependent = None;
            return Ok(());
        };
        if self.dependent.status != FetchStatus::Ready {
            return Err(SelectionError::NotReady);
        }
        if !self.dependent.contains(&dependent_id) {
            return Err(SelectionError::UnknownOption(dependent_id));
        }
        self.selection.dependent = Some(dependent_id);
        Ok(())
    }

    /// Refetch the dependent list for the current primary id.
    ///
    /// Only used on explicit user request; failures are never retried
    /// automatically. Returns `None` when no primary id is selected.
    pub fn reload_dependent(&mut self) -> Option<DependentRequest> {
        let primary_id = self.selection.primary.clone()?;
        let generation = self.dependent.begin();
        tracing::debug!(primary_id = %primary_id, generation, "Reloading dependent options");
        Some(DependentRequest {
            primary_id,
            generation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TransportError;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn id(raw: &str) -> OptionId {
        OptionId::parse(raw).unwrap()
    }

    fn opts(ids: &[&str]) -> Vec<SelectOption> {
        ids.iter()
            .map(|i| SelectOption::new(i, &format!("Option {}", i)))
            .collect()
    }

    fn failure() -> ProviderError {
        ProviderError::Transport(TransportError::HttpStatus(500))
    }

    fn edit(primary: &str, dependent: &str) -> OpenMode {
        OpenMode::Edit {
            primary: OptionId::parse(primary),
            dependent: OptionId::parse(dependent),
        }
    }

    #[test]
    fn test_create_mode_starts_empty() {
        let (selector, request) = CascadingSelector::initialize(OpenMode::Create);
        assert!(request.is_none());
        assert_eq!(selector.selection(), &Selection::default());
        assert_eq!(selector.dependent().status(), FetchStatus::Idle);
        assert!(selector.dependent().options().is_empty());
        assert!(selector.is_settled());
    }

    #[test]
    fn test_primary_load_success_keeps_selection() {
        let (mut selector, _) = CascadingSelector::initialize(edit("7", "42"));
        let request = selector.begin_primary_load();
        assert_eq!(selector.primary().status(), FetchStatus::Loading);
        assert!(!selector.primary().is_interactive());

        assert!(selector.apply_primary(request, Ok(opts(&["7", "8"]))));
        assert_eq!(selector.primary().status(), FetchStatus::Ready);
        assert_eq!(selector.primary().options().len(), 2);
        assert_eq!(selector.selection().primary, Some(id("7")));
        assert_eq!(selector.selection().dependent, Some(id("42")));
    }

    #[test]
    fn test_primary_load_failure_is_failed_and_empty() {
        let (mut selector, _) = CascadingSelector::initialize(OpenMode::Create);
        let request = selector.begin_primary_load();
        assert!(selector.apply_primary(request, Err(failure())));
        assert_eq!(selector.primary().status(), FetchStatus::Failed);
        assert!(selector.primary().options().is_empty());
        assert!(selector.primary().error().is_some());
    }

    #[test]
    fn test_select_primary_issues_request_and_clears_dependent() {
        let (mut selector, _) = CascadingSelector::initialize(OpenMode::Create);
        let first = selector.select_primary("1").unwrap();
        selector.apply_dependent(first, Ok(opts(&["11", "12"])));
        selector.select_dependent("11").unwrap();

        let second = selector.select_primary("2").unwrap();
        assert_eq!(second.primary_id, id("2"));
        assert_eq!(selector.selection().dependent, None);
        assert!(selector.dependent().options().is_empty());
        assert_eq!(selector.dependent().status(), FetchStatus::Loading);
        assert!(!selector.dependent_enabled());
    }

    #[test]
    fn test_reselecting_same_primary_is_noop() {
        let (mut selector, _) = CascadingSelector::initialize(OpenMode::Create);
        let request = selector.select_primary("1").unwrap();
        selector.apply_dependent(request, Ok(opts(&["11"])));
        selector.select_dependent("11").unwrap();

        assert!(selector.select_primary("1").is_none());
        assert_eq!(selector.selection().dependent, Some(id("11")));
        assert_eq!(selector.dependent().status(), FetchStatus::Ready);
    }

    #[test]
    fn test_blank_primary_short_circuits() {
        let (mut selector, _) = CascadingSelector::initialize(OpenMode::Create);
        let request = selector.select_primary("1").unwrap();
        selector.apply_dependent(request, Ok(opts(&["11"])));

        assert!(selector.select_primary("").is_none());
        assert_eq!(selector.selection(), &Selection::default());
        assert!(selector.dependent().options().is_empty());
        assert_eq!(selector.dependent().status(), FetchStatus::Idle);
    }

    #[test]
    fn test_blank_primary_invalidates_in_flight_fetch() {
        let (mut selector, _) = CascadingSelector::initialize(OpenMode::Create);
        let request = selector.select_primary("1").unwrap();
        assert!(selector.select_primary("  ").is_none());

        assert!(!selector.apply_dependent(request, Ok(opts(&["11"]))));
        assert_eq!(selector.dependent().status(), FetchStatus::Idle);
        assert!(selector.dependent().options().is_empty());
    }

    #[test]
    fn test_a_b_a_with_late_b_response_keeps_a() {
        let (mut selector, _) = CascadingSelector::initialize(OpenMode::Create);
        let a1 = selector.select_primary("A").unwrap();
        let b = selector.select_primary("B").unwrap();
        let a2 = selector.select_primary("A").unwrap();

        assert!(selector.apply_dependent(a2, Ok(opts(&["a-1", "a-2"]))));
        assert!(!selector.apply_dependent(b, Ok(opts(&["b-1"]))));
        assert!(!selector.apply_dependent(a1, Ok(opts(&["a-stale"]))));

        assert_eq!(selector.selection().primary, Some(id("A")));
        assert_eq!(selector.dependent().options(), opts(&["a-1", "a-2"]).as_slice());
        assert_eq!(selector.dependent().status(), FetchStatus::Ready);
    }

    #[test]
    fn test_edit_mode_keeps_offered_dependent() {
        let (mut selector, request) = CascadingSelector::initialize(edit("7", "42"));
        let request = request.unwrap();
        assert_eq!(request.primary_id, id("7"));
        assert_eq!(selector.selection().dependent, Some(id("42")));
        assert_eq!(selector.dependent().status(), FetchStatus::Loading);

        assert!(selector.apply_dependent(request, Ok(opts(&["42"]))));
        assert_eq!(selector.selection().dependent, Some(id("42")));
    }

    #[test]
    fn test_edit_mode_drops_unoffered_dependent() {
        let (mut selector, request) = CascadingSelector::initialize(edit("7", "42"));
        assert!(selector.apply_dependent(request.unwrap(), Ok(opts(&["99"]))));
        assert_eq!(selector.selection().dependent, None);
        assert_eq!(selector.selection().primary, Some(id("7")));
    }

    #[test]
    fn test_edit_mode_without_primary_issues_no_fetch() {
        let (selector, request) = CascadingSelector::initialize(edit("", "42"));
        assert!(request.is_none());
        assert_eq!(selector.selection(), &Selection::default());
    }

    #[test]
    fn test_dependent_failure_is_failed_and_drops_selection() {
        let (mut selector, request) = CascadingSelector::initialize(edit("7", "42"));
        assert!(selector.apply_dependent(request.unwrap(), Err(failure())));
        assert_eq!(selector.dependent().status(), FetchStatus::Failed);
        assert!(selector.dependent().options().is_empty());
        assert_eq!(selector.selection().dependent, None);
        assert!(selector.is_settled());
    }

    #[test]
    fn test_select_dependent_rejects_unknown_and_not_ready() {
        let (mut selector, _) = CascadingSelector::initialize(OpenMode::Create);
        let request = selector.select_primary("1").unwrap();
        assert_eq!(selector.select_dependent("11"), Err(SelectionError::NotReady));

        selector.apply_dependent(request, Ok(opts(&["11"])));
        assert_eq!(
            selector.select_dependent("12"),
            Err(SelectionError::UnknownOption(id("12")))
        );
        assert_eq!(selector.select_dependent("11"), Ok(()));
        assert_eq!(selector.select_dependent(""), Ok(()));
        assert_eq!(selector.selection().dependent, None);
    }

    #[test]
    fn test_reload_dependent_after_failure() {
        let (mut selector, _) = CascadingSelector::initialize(OpenMode::Create);
        assert!(selector.reload_dependent().is_none());

        let request = selector.select_primary("1").unwrap();
        selector.apply_dependent(request, Err(failure()));
        let retry = selector.reload_dependent().unwrap();
        assert_eq!(selector.dependent().status(), FetchStatus::Loading);
        assert!(selector.apply_dependent(retry, Ok(opts(&["11"]))));
        assert_eq!(selector.dependent().status(), FetchStatus::Ready);
    }

    #[test]
    fn test_stale_primary_load_ignored() {
        let (mut selector, _) = CascadingSelector::initialize(OpenMode::Create);
        let old = selector.begin_primary_load();
        let new = selector.begin_primary_load();
        assert!(selector.apply_primary(new, Ok(opts(&["1"]))));
        assert!(!selector.apply_primary(old, Err(failure())));
        assert_eq!(selector.primary().status(), FetchStatus::Ready);
    }

    // ========================================================================
    // Consistency invariant over arbitrary interleavings
    // ========================================================================

    #[derive(Debug, Clone)]
    enum Op {
        SelectPrimary(u8),
        SelectDependent(u8, u8),
        Resolve(usize, bool),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..4).prop_map(Op::SelectPrimary),
            (0u8..4, 0u8..3).prop_map(|(p, d)| Op::SelectDependent(p, d)),
            (0usize..8, any::<bool>()).prop_map(|(i, ok)| Op::Resolve(i, ok)),
        ]
    }

    /// Options served for a primary id are prefixed with it.
    fn served_for(primary: &OptionId) -> Vec<SelectOption> {
        let first = format!("{}-1", primary);
        let second = format!("{}-2", primary);
        opts(&[first.as_str(), second.as_str()])
    }

    fn primary_input(n: u8) -> String {
        if n == 0 {
            String::new()
        } else {
            format!("p{}", n)
        }
    }

    fn resolve(selector: &mut CascadingSelector, request: DependentRequest, ok: bool) {
        let result = if ok {
            Ok(served_for(&request.primary_id))
        } else {
            Err(failure())
        };
        selector.apply_dependent(request, result);
    }

    proptest! {
        #[test]
        fn prop_settled_dependent_is_offered_for_current_primary(
            ops in proptest::collection::vec(op_strategy(), 0..40),
            edit_primary in 0u8..4,
            final_ok in any::<bool>(),
        ) {
            let mode = match edit_primary {
                0 => OpenMode::Create,
                n => OpenMode::Edit {
                    primary: OptionId::parse(&primary_input(n)),
                    dependent: OptionId::parse(&format!("p{}-1", n)),
                },
            };
            let (mut selector, initial) = CascadingSelector::initialize(mode);
            let mut pending: Vec<DependentRequest> = initial.into_iter().collect();

            for op in ops {
                match op {
                    Op::SelectPrimary(n) => {
                        if let Some(request) = selector.select_primary(&primary_input(n)) {
                            pending.push(request);
                        }
                    }
                    Op::SelectDependent(p, d) => {
                        let _ = selector.select_dependent(&format!("p{}-{}", p, d));
                    }
                    Op::Resolve(i, ok) if !pending.is_empty() => {
                        let request = pending.remove(i % pending.len());
                        resolve(&mut selector, request, ok);
                    }
                    Op::Resolve(..) => {}
                }
            }

            // Drain remaining fetches, oldest last so stale ones arrive late.
            while let Some(request) = pending.pop() {
                resolve(&mut selector, request, final_ok);
            }

            prop_assert!(selector.is_settled());
            let selection = selector.selection().clone();
            if let Some(dependent) = &selection.dependent {
                prop_assert!(selector.dependent().contains(dependent));
            }
            match &selection.primary {
                Some(primary) => {
                    if selector.dependent().status() == FetchStatus::Ready {
                        let served = served_for(primary);
                        prop_assert_eq!(selector.dependent().options(), served.as_slice());
                    }
                }
                None => {
                    prop_assert_eq!(selection.dependent, None);
                    prop_assert!(selector.dependent().options().is_empty());
                }
            }
        }
    }
}
