//! crates/lead_review_core/src/review.rs
//!
//! The review state machine for a single lead. It owns the operator's
//! in-progress selection of recommended products and decides which actions
//! are legal at each point of the review.
//!
//! The machine is sans-io: `begin_submit` hands back the payload to send to
//! the repository and `finish_submit` is told how the call went. That keeps
//! every guard (status gating, approve/reject exclusivity, single-flight)
//! testable without a network.

use std::collections::BTreeSet;

use crate::domain::{Lead, LeadStatus, Product};

/// The two terminal decisions an operator can take on a pending lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    /// Accept the currently selected subset of recommended products.
    Approve,
    /// Reject the entire recommendation set.
    RejectAll,
}

/// Where the review currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStage {
    /// Read-only. The stage for every non-pending lead, and for a pending
    /// lead before selection starts or after a successful decision.
    Viewing,
    /// The operator is toggling product indices. Pending leads only.
    Selecting,
    /// A decision call is in flight; all further input is rejected.
    Submitting(DecisionKind),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    #[error("Lead {0} has already been decided")]
    NotPending(i64),
    #[error("No selection is in progress")]
    NotSelecting,
    #[error("A decision is already in flight")]
    DecisionInFlight,
    #[error("No decision is in flight")]
    NoDecisionInFlight,
    #[error("Product index {index} is out of range for {len} recommended products")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Approval requires at least one selected product")]
    EmptySelection,
    #[error("Reject-all is unavailable while products are selected")]
    SelectionNotEmpty,
}

/// What `begin_submit` resolved the operator's choice to. `approved` is
/// `None` for a reject-all; for an approval it holds the products at the
/// selected offsets, in their original relative order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPayload {
    pub lead_id: i64,
    pub approved: Option<Vec<Product>>,
}

/// Review state for one lead, held for the lifetime of the detail view.
///
/// Selected products are tracked by their offset into the recommended
/// sequence as fetched. A reorder of that sequence upstream between fetch
/// and submit would silently invalidate the selection; the workflow
/// accepts that because the upstream service assigns products no stable id.
#[derive(Debug, Clone)]
pub struct LeadReview {
    lead_id: i64,
    status: LeadStatus,
    recommended: Vec<Product>,
    selection: BTreeSet<usize>,
    stage: ReviewStage,
}

impl LeadReview {
    /// Starts a review over a freshly fetched lead, in the `Viewing` stage.
    pub fn new(lead: &Lead) -> Self {
        Self {
            lead_id: lead.lead_id,
            status: lead.status,
            recommended: lead.recommended_product.clone().unwrap_or_default(),
            selection: BTreeSet::new(),
            stage: ReviewStage::Viewing,
        }
    }

    pub fn lead_id(&self) -> i64 {
        self.lead_id
    }

    pub fn status(&self) -> LeadStatus {
        self.status
    }

    pub fn stage(&self) -> ReviewStage {
        self.stage
    }

    pub fn selection(&self) -> &BTreeSet<usize> {
        &self.selection
    }

    pub fn recommended(&self) -> &[Product] {
        &self.recommended
    }

    /// Moves into `Selecting`. Only a pending lead is selectable; for any
    /// other status the review stays read-only. Calling this while already
    /// selecting is a no-op.
    pub fn begin_selection(&mut self) -> Result<(), ReviewError> {
        match self.stage {
            ReviewStage::Submitting(_) => Err(ReviewError::DecisionInFlight),
            _ if !self.status.is_pending() => Err(ReviewError::NotPending(self.lead_id)),
            _ => {
                self.stage = ReviewStage::Selecting;
                Ok(())
            }
        }
    }

    /// Flips membership of `index` in the selection. Returns whether the
    /// index is selected afterwards. Toggling twice restores the set.
    pub fn toggle(&mut self, index: usize) -> Result<bool, ReviewError> {
        match self.stage {
            ReviewStage::Submitting(_) => return Err(ReviewError::DecisionInFlight),
            ReviewStage::Viewing => return Err(ReviewError::NotSelecting),
            ReviewStage::Selecting => {}
        }
        if index >= self.recommended.len() {
            return Err(ReviewError::IndexOutOfRange {
                index,
                len: self.recommended.len(),
            });
        }
        if self.selection.remove(&index) {
            Ok(false)
        } else {
            self.selection.insert(index);
            Ok(true)
        }
    }

    /// Approve is only offered while something is selected.
    pub fn can_approve(&self) -> bool {
        self.stage == ReviewStage::Selecting && !self.selection.is_empty()
    }

    /// Reject-all is the complement: only offered while nothing is selected.
    pub fn can_reject_all(&self) -> bool {
        self.stage == ReviewStage::Selecting && self.selection.is_empty()
    }

    /// Locks the machine into `Submitting` and resolves the payload for the
    /// repository call. While a decision is in flight every further toggle
    /// or submit is rejected, so at most one decision call per review can
    /// be outstanding.
    pub fn begin_submit(&mut self, kind: DecisionKind) -> Result<DecisionPayload, ReviewError> {
        match self.stage {
            ReviewStage::Submitting(_) => return Err(ReviewError::DecisionInFlight),
            ReviewStage::Viewing => return Err(ReviewError::NotSelecting),
            ReviewStage::Selecting => {}
        }
        let approved = match kind {
            DecisionKind::Approve => {
                if self.selection.is_empty() {
                    return Err(ReviewError::EmptySelection);
                }
                Some(
                    self.selection
                        .iter()
                        .map(|&i| self.recommended[i].clone())
                        .collect(),
                )
            }
            DecisionKind::RejectAll => {
                if !self.selection.is_empty() {
                    return Err(ReviewError::SelectionNotEmpty);
                }
                None
            }
        };
        self.stage = ReviewStage::Submitting(kind);
        Ok(DecisionPayload {
            lead_id: self.lead_id,
            approved,
        })
    }

    /// Reports the outcome of the in-flight decision call. Success settles
    /// the lead into its terminal status and discards the selection; failure
    /// returns to `Selecting` with the selection preserved so the operator
    /// can retry. The machine never stays in `Submitting`.
    pub fn finish_submit(&mut self, succeeded: bool) -> Result<LeadStatus, ReviewError> {
        let kind = match self.stage {
            ReviewStage::Submitting(kind) => kind,
            _ => return Err(ReviewError::NoDecisionInFlight),
        };
        if succeeded {
            self.status = match kind {
                DecisionKind::Approve => LeadStatus::Accepted,
                DecisionKind::RejectAll => LeadStatus::Rejected,
            };
            self.selection.clear();
            self.stage = ReviewStage::Viewing;
        } else {
            self.stage = ReviewStage::Selecting;
        }
        Ok(self.status)
    }
}
