use std::path::Path;

use tracing::{info, warn};

use crate::api::{ApiClient, ApiResult};
use crate::errors::AppError;
use crate::models::{AccountSummary, DocumentInfo, SystemStats, UploadFile, UploadReceipt};

pub const PDF_ONLY: &str = "Por favor, selecione apenas arquivos PDF.";
pub const PDF_REQUIRED: &str = "Por favor, selecione um arquivo PDF.";

const PDF_MIME: &str = "application/pdf";

/// Everything the admin screen shows. Each part loads independently.
#[derive(Debug)]
pub struct Dashboard {
    pub documents: ApiResult<Vec<DocumentInfo>>,
    pub users: ApiResult<Vec<AccountSummary>>,
    pub stats: ApiResult<SystemStats>,
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub receipt: UploadReceipt,
    /// The reloaded corpus listing; `None` when the reload failed.
    pub documents: Option<Vec<DocumentInfo>>,
}

/// Corpus management and usage statistics. Whether the backend accepts these
/// calls is decided by the backend; the client only hides the screen.
#[derive(Clone)]
pub struct AdminService {
    api: ApiClient,
}

impl AdminService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn load_dashboard(&self) -> Dashboard {
        let (documents, users, stats) = tokio::join!(
            self.api.list_documents(),
            self.api.list_users(),
            self.api.get_stats(),
        );
        Dashboard { documents, users, stats }
    }

    pub async fn documents(&self) -> ApiResult<Vec<DocumentInfo>> {
        self.api.list_documents().await
    }

    /// Uploads a PDF and reloads the corpus listing.
    pub async fn upload(&self, file: UploadFile) -> ApiResult<UploadOutcome> {
        validate_pdf(&file)?;
        let name = file.file_name.clone();
        let receipt = self.api.upload_document(file).await?;
        info!("Uploaded {name}: {} chunks", receipt.chunks);

        let documents = match self.api.list_documents().await {
            Ok(docs) => Some(docs),
            Err(e) => {
                warn!("Document list reload after upload failed: {e}");
                None
            }
        };
        Ok(UploadOutcome { receipt, documents })
    }

    /// Reads a file from disk for [`AdminService::upload`].
    pub async fn read_upload(path: &Path) -> Result<UploadFile, AppError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::validation(PDF_REQUIRED))?
            .to_string();
        if !has_pdf_extension(&file_name) {
            return Err(AppError::validation(PDF_ONLY));
        }
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            warn!("Could not read {}: {e}", path.display());
            AppError::validation(PDF_REQUIRED)
        })?;
        Ok(UploadFile {
            file_name,
            content_type: Some(PDF_MIME.to_string()),
            bytes,
        })
    }
}

fn has_pdf_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Local check run before any upload reaches the network.
pub fn validate_pdf(file: &UploadFile) -> Result<(), AppError> {
    if file.file_name.trim().is_empty() || file.bytes.is_empty() {
        return Err(AppError::validation(PDF_REQUIRED));
    }
    let is_pdf = match file.content_type.as_deref() {
        Some(mime) => mime.eq_ignore_ascii_case(PDF_MIME),
        None => has_pdf_extension(&file.file_name),
    };
    if !is_pdf {
        return Err(AppError::validation(PDF_ONLY));
    }
    Ok(())
}
