//! Product family resolution for journal routing.

use super::Reconciler;
use crate::error::SyncResult;
use crate::models::remote::RemoteLineItem;
use crate::models::Family;
use tracing::{debug, warn};

/// Item id embedded in a price id of the form `<item>-<currency>-<period>`.
pub fn item_id_from_price_id(price_id: &str) -> &str {
    let mut parts = price_id.rsplitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(item)) if !item.is_empty() => item,
        _ => price_id,
    }
}

impl Reconciler {
    /// Remote item id a line refers to, dereferencing prices when needed.
    pub async fn resolve_item_id(&self, line: &RemoteLineItem) -> Option<String> {
        if let Some(item_id) = line.item_id() {
            return Some(item_id.to_string());
        }
        let price_id = line.price_id()?;
        match self.api().retrieve_item_price(price_id).await {
            Ok(price) => Some(
                price
                    .item_id
                    .unwrap_or_else(|| item_id_from_price_id(price_id).to_string()),
            ),
            Err(e) => {
                warn!(price_id = %price_id, error = %e, "Item price lookup failed, deriving item id");
                Some(item_id_from_price_id(price_id).to_string())
            }
        }
    }

    /// Classifies a document by its first line only. `None` means "use the
    /// company-wide journals".
    pub async fn resolve_family(&self, line_items: &[RemoteLineItem]) -> Option<Family> {
        let first = line_items.first()?;
        let item_id = self.resolve_item_id(first).await?;

        let item = match self.api().retrieve_item(&item_id).await {
            Ok(item) => item,
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "Item lookup failed, no family");
                return None;
            }
        };
        let family_id = item.item_family_id?;

        match self.family_for_remote_id(&family_id).await {
            Ok(family) => Some(family),
            Err(e) => {
                warn!(family_id = %family_id, error = %e, "Family lookup failed");
                None
            }
        }
    }

    /// Local family for a remote family id, created with its remote name if new.
    pub async fn family_for_remote_id(&self, remote_id: &str) -> SyncResult<Family> {
        if let Some(family) = self.store().find_family_by_remote_id(remote_id).await? {
            return Ok(family);
        }
        let name = match self.api().retrieve_item_family(remote_id).await {
            Ok(remote) => remote.name.unwrap_or_else(|| remote_id.to_string()),
            Err(e) => {
                debug!(family_id = %remote_id, error = %e, "Family name unavailable");
                remote_id.to_string()
            }
        };
        self.store().upsert_family(remote_id, &name).await
    }
}
