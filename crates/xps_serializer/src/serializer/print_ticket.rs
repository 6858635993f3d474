use alloc::vec::Vec;

use xps_reflect::context::{ContextKey, SerializableObjectContext};

use crate::engine::Operation;
use crate::events::PrintTicketLevel;
use crate::model::{FixedDocument, FixedDocumentSequence, PaginatedDocument, PrintTicket};
use crate::serializer::{ReachSerializer, names};
use crate::{Result, SerializationManager};

/// Hands a print ticket to the packaging policy. Nothing is written into the
/// markup; the level follows from the node the ticket belongs to.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintTicketSerializer;

impl ReachSerializer for PrintTicketSerializer {
    fn name(&self) -> &'static str {
        names::PRINT_TICKET
    }

    fn persist_object_data(&self, context: ContextKey, manager: &SerializationManager) -> Result<Vec<Operation>> {
        let ticket = manager.target_as::<PrintTicket>(context)?;
        let level = {
            let graph = manager.graph();
            let owner = graph.context(context)?.parent().map(|key| graph.context(key)).transpose()?;
            owner.map_or(PrintTicketLevel::FixedPage, level_of)
        };
        manager.packaging().persist_print_ticket(&ticket, level)?;
        Ok(Vec::new())
    }
}

fn level_of(owner: &SerializableObjectContext) -> PrintTicketLevel {
    if owner.is::<FixedDocumentSequence>() {
        PrintTicketLevel::FixedDocumentSequence
    } else if owner.is::<FixedDocument>() || owner.is::<PaginatedDocument>() {
        PrintTicketLevel::FixedDocument
    } else {
        PrintTicketLevel::FixedPage
    }
}
