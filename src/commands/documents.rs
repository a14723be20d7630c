use super::CommandError;
use crate::agent::{AttachmentKind, FileInput};
use crate::db::models::{DocumentSource, NewDocument, ProcessedDocument};
use crate::state::AppState;
use crate::store::documents::DocumentError;

pub fn list_documents(state: &AppState, chat_id: &str) -> Vec<ProcessedDocument> {
    state.documents().documents(chat_id).to_vec()
}

pub fn remove_document(state: &AppState, chat_id: &str, id: &str) -> Result<ProcessedDocument, CommandError> {
    state
        .documents()
        .remove(chat_id, id)
        .ok_or_else(|| DocumentError::NotFound(id.to_string()).into())
}

/// Register an upload, run it through the document processor and return the
/// final record. A processing failure is recorded on the document rather
/// than returned as an error.
pub async fn upload_document(
    state: &AppState,
    chat_id: &str,
    file: FileInput,
    source: DocumentSource,
) -> Result<ProcessedDocument, CommandError> {
    if state.store().chat(chat_id).is_none() {
        return Err(CommandError::ChatNotFound(chat_id.to_string()));
    }
    if file.is_empty() {
        return Err(DocumentError::Processing(format!("{} is empty", file.name)).into());
    }

    let doc = state.documents().register(
        chat_id,
        NewDocument {
            name: file.name.clone(),
            size: file.size,
            is_image: file.kind() == AttachmentKind::Image,
            url: None,
            source,
        },
    );
    state.documents().start_processing(chat_id, &doc.id)?;

    let result = state.processor.process(&file).await;

    let mut documents = state.documents();
    let finished = match result {
        Ok(data) => documents.complete(chat_id, &doc.id, Some(data))?,
        Err(e) => {
            tracing::warn!(document_id = %doc.id, name = %doc.name, error = %e, "document processing failed");
            documents.fail(chat_id, &doc.id, &e.to_string())?
        }
    };
    Ok(finished.clone())
}
