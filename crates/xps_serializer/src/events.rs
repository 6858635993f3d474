//! Notifications exchanged with the caller during a session.
//!
//! Handlers are injected when the manager is built
//! ([`SerializationManagerBuilder`](crate::SerializationManagerBuilder)) or
//! registered on the asynchronous engine
//! ([`AsyncSerializationManager::on_completed`](crate::AsyncSerializationManager::on_completed)).

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::fmt;

use crate::SerializationError;
use crate::model::PrintTicket;

// -----------------------------------------------------------------------------
// Print tickets

/// Scope a print ticket applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrintTicketLevel {
    FixedDocumentSequence,
    FixedDocument,
    FixedPage,
}

/// Raised before a sequence, document or page is written.
///
/// `print_ticket` holds the ticket the object already carries. A handler may
/// replace or remove it; whatever is left afterwards is persisted.
#[derive(Debug, Clone)]
pub struct PrintTicketRequiredEventArgs {
    pub level: PrintTicketLevel,
    /// 1-based number of the document or page at this level.
    pub sequence: usize,
    pub print_ticket: Option<Rc<PrintTicket>>,
}

// -----------------------------------------------------------------------------
// Progress

/// What just finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressLevel {
    FixedDocumentSequence,
    FixedDocument,
    FixedPage,
}

/// Raised after each sequence, document and page boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressChangedEventArgs {
    pub level: ProgressLevel,
    /// 1-based number of the item: pages count within their document,
    /// documents within the session.
    pub number: usize,
}

// -----------------------------------------------------------------------------
// Completion

/// Delivered once an asynchronous session ends.
#[derive(Debug, Clone, Default)]
pub struct SerializationCompletedEventArgs {
    pub canceled: bool,
    pub error: Option<Rc<SerializationError>>,
}

impl SerializationCompletedEventArgs {
    /// Finished without cancellation or error.
    #[inline]
    pub fn is_success(&self) -> bool {
        !self.canceled && self.error.is_none()
    }
}

// -----------------------------------------------------------------------------
// SerializationHooks

pub(crate) type PrintTicketHandler = Box<dyn Fn(&mut PrintTicketRequiredEventArgs)>;
pub(crate) type ProgressHandler = Box<dyn Fn(&ProgressChangedEventArgs)>;

/// The caller's handlers for one manager.
#[derive(Default)]
pub struct SerializationHooks {
    pub(crate) print_ticket_required: Option<PrintTicketHandler>,
    pub(crate) progress_changed: Option<ProgressHandler>,
}

impl SerializationHooks {
    pub(crate) fn print_ticket_required(&self, args: &mut PrintTicketRequiredEventArgs) {
        if let Some(handler) = &self.print_ticket_required {
            handler(args);
        }
    }

    pub(crate) fn progress_changed(&self, args: &ProgressChangedEventArgs) {
        if let Some(handler) = &self.progress_changed {
            handler(args);
        }
    }
}

impl fmt::Debug for SerializationHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationHooks")
            .field("print_ticket_required", &self.print_ticket_required.is_some())
            .field("progress_changed", &self.progress_changed.is_some())
            .finish()
    }
}
