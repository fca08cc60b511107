//! Receipt assembly: purchase history lookup and document rendering.

use askama::Template;
use async_trait::async_trait;
use thiserror::Error;

use paperslip_core::{Email, ProductId, UserId, Yen};

use crate::db::RepositoryError;
use crate::models::{Product, Purchase, PurchaseWithProduct, User};

/// Read-only lookups the assembler needs from persistence.
///
/// One function-shaped capability per lookup; the production implementation
/// is [`super::store::PgReceiptStore`], tests substitute in-memory stubs.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Look up a user by email address.
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// List a user's purchases, oldest first.
    async fn find_purchases_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Purchase>, RepositoryError>;

    /// Look up a product by ID.
    async fn find_product(&self, product_id: ProductId) -> Result<Option<Product>, RepositoryError>;
}

/// Errors from assembling one user's receipt.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// A required entity was absent. Expected for rows whose address is not
    /// in the system, hence distinct from storage failures.
    #[error("{0}")]
    NotFound(&'static str),

    /// A lookup failed at the storage layer.
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),

    /// The receipt template failed to render.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

/// A fully rendered receipt document, ready for PDF conversion.
///
/// Ephemeral; built fresh per dispatch and discarded after the send.
#[derive(Debug, Clone)]
pub struct ReceiptDocument {
    /// Rendered HTML.
    pub html: String,
    /// Total over all purchases: Σ product.price × purchase.quantity.
    pub total: Yen,
}

/// Receipt document template (A4, background printed - fixed layout).
#[derive(Template)]
#[template(path = "receipt.html")]
struct ReceiptTemplate<'a> {
    issued_on: String,
    user: &'a User,
    lines: &'a [LineItem],
    total: Yen,
}

/// One rendered line-item block.
struct LineItem {
    name: String,
    quantity: i32,
    unit_price: Yen,
    subtotal: Yen,
}

impl From<&PurchaseWithProduct> for LineItem {
    fn from(entry: &PurchaseWithProduct) -> Self {
        Self {
            name: entry.product.name.clone(),
            quantity: entry.purchase.quantity,
            unit_price: entry.product.price,
            subtotal: entry.subtotal(),
        }
    }
}

/// Assemble one user's receipt document.
///
/// The lookups run sequentially because each needs the prior step's key:
/// user by email, purchases by user ID, then the product behind every
/// purchase. Any missing entity fails the whole document - no partial
/// receipts.
///
/// # Errors
///
/// Returns [`AssembleError::NotFound`] with `"User not Found"`,
/// `"Purchase not Found"`, or `"Product not Found"` for the first absent
/// entity, or propagates storage/template failures.
pub async fn build_receipt<S>(store: &S, email: &Email) -> Result<ReceiptDocument, AssembleError>
where
    S: ReceiptStore + ?Sized,
{
    let user = store
        .find_user_by_email(email)
        .await?
        .ok_or(AssembleError::NotFound("User not Found"))?;

    let purchases = store.find_purchases_by_user(user.id).await?;
    if purchases.is_empty() {
        return Err(AssembleError::NotFound("Purchase not Found"));
    }

    let mut entries = Vec::with_capacity(purchases.len());
    for purchase in purchases {
        let product = store
            .find_product(purchase.product_id)
            .await?
            .ok_or(AssembleError::NotFound("Product not Found"))?;
        entries.push(PurchaseWithProduct { purchase, product });
    }

    render_document(&user, &entries)
}

/// Render the receipt HTML from a user and their joined purchase entries.
fn render_document(
    user: &User,
    entries: &[PurchaseWithProduct],
) -> Result<ReceiptDocument, AssembleError> {
    let total: Yen = entries.iter().map(PurchaseWithProduct::subtotal).sum();
    let lines: Vec<LineItem> = entries.iter().map(LineItem::from).collect();

    let html = ReceiptTemplate {
        issued_on: chrono::Utc::now().format("%Y/%m/%d").to_string(),
        user,
        lines: &lines,
        total,
    }
    .render()?;

    Ok(ReceiptDocument { html, total })
}
